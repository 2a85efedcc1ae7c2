use serde::Serialize;
use serde_json::Value;

use crate::recipe::Recipe;

pub const REQUIRED_RECIPE_KEYS: &[&str] = &[
    "cost_usd", "id", "ingredients", "macros", "method", "minutes", "name", "tags",
];
pub const REQUIRED_MACRO_KEYS: &[&str] = &["fiber_g", "kcals", "protein_g"];

/// Outcome of checking one record. Errors accumulate instead of failing fast.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            ok: errors.is_empty(),
            errors,
        }
    }
}

/// Checks an untyped record against the recipe shape. Never panics.
pub fn validate(record: &Value) -> ValidationReport {
    let mut errors = Vec::new();

    let object = record.as_object();
    let missing: Vec<&str> = REQUIRED_RECIPE_KEYS
        .iter()
        .copied()
        .filter(|key| object.map_or(true, |o| !o.contains_key(*key)))
        .collect();
    if !missing.is_empty() {
        errors.push(format!("missing keys: {:?}", missing));
    }

    let missing_macros: Vec<&str> = match record.get("macros").and_then(Value::as_object) {
        Some(macros) => REQUIRED_MACRO_KEYS
            .iter()
            .copied()
            .filter(|key| !macros.contains_key(*key))
            .collect(),
        None => REQUIRED_MACRO_KEYS.to_vec(),
    };
    if !missing_macros.is_empty() {
        errors.push(format!("macros missing keys: {:?}", missing_macros));
    }

    if !record.get("ingredients").is_some_and(Value::is_array) {
        errors.push("ingredients must be a list".to_string());
    }
    if !record.get("tags").is_some_and(Value::is_array) {
        errors.push("tags must be a list".to_string());
    }

    ValidationReport::from_errors(errors)
}

/// Re-validates a typed recipe through its serialized shape.
pub fn validate_recipe(recipe: &Recipe) -> ValidationReport {
    match serde_json::to_value(recipe) {
        Ok(value) => validate(&value),
        Err(e) => ValidationReport::from_errors(vec![format!("unserializable recipe: {}", e)]),
    }
}
