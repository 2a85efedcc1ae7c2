use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use csv::WriterBuilder;

use crate::recipe::Recipe;

/// Combines the ingredient lists of `recipes` into one shopping list.
///
/// Numeric quantities for the same item are summed; anything else is joined
/// with `" + "` (e.g. `"1 can + 2 cups"`). Blank items are skipped.
pub fn aggregate_ingredients(recipes: &[&Recipe]) -> BTreeMap<String, String> {
    let mut need: BTreeMap<String, String> = BTreeMap::new();

    for recipe in recipes {
        for ingredient in &recipe.ingredients {
            let item = ingredient.item.trim();
            if item.is_empty() {
                continue;
            }
            let qty = ingredient.qty.trim();
            let merged = match need.get(item).filter(|prev| !prev.is_empty()) {
                None => match qty.parse::<f64>() {
                    Ok(value) => value.to_string(),
                    Err(_) => qty.to_string(),
                },
                Some(prev) => match (prev.parse::<f64>(), qty.parse::<f64>()) {
                    (Ok(a), Ok(b)) => (a + b).to_string(),
                    (Err(_), Ok(b)) => format!("{prev} + {b}"),
                    _ => format!("{prev} + {qty}"),
                },
            };
            need.insert(item.to_string(), merged);
        }
    }

    need
}

/// Writes the aggregated list as an `item,qty` CSV, sorted by item.
pub fn write_shopping_list(path: &Path, need: &BTreeMap<String, String>) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to create shopping list at {:?}", path))?;
    writer.write_record(["item", "qty"])?;
    for (item, qty) in need {
        writer
            .write_record([item.as_str(), qty.as_str()])
            .with_context(|| format!("Failed to write shopping list row for '{}'", item))?;
    }
    writer.flush()?;
    Ok(())
}
