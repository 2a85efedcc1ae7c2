use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::recipe::{Preferences, Recipe};
use crate::validation::schema::validate;

/// One catalog record that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaFailure {
    pub id: String,
    pub errors: Vec<String>,
}

impl fmt::Display for SchemaFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.errors.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("recipe catalog failed validation:\n{}", format_failures(.0))]
    InvalidSchema(Vec<SchemaFailure>),
    #[error("recipe catalog must be a JSON array of recipes")]
    NotAList,
}

fn format_failures(failures: &[SchemaFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("  - {failure}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn record_label(record: &Value, index: usize) -> String {
    record
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("<record {index}>"))
}

/// Parses and validates a curated catalog held in memory.
///
/// Every record is checked; all failures are reported together.
pub fn parse_recipes(text: &str) -> Result<Vec<Recipe>> {
    let data: Value = serde_json::from_str(text).context("Failed to parse recipe catalog JSON")?;
    let Value::Array(records) = data else {
        return Err(CatalogError::NotAList.into());
    };

    let mut recipes = Vec::with_capacity(records.len());
    let mut failures = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        let report = validate(&record);
        if !report.ok {
            failures.push(SchemaFailure {
                id: record_label(&record, index),
                errors: report.errors,
            });
            continue;
        }
        let label = record_label(&record, index);
        match serde_json::from_value::<Recipe>(record) {
            Ok(recipe) => recipes.push(recipe),
            Err(e) => failures.push(SchemaFailure {
                id: label,
                errors: vec![e.to_string()],
            }),
        }
    }

    if !failures.is_empty() {
        return Err(CatalogError::InvalidSchema(failures).into());
    }
    debug!(count = recipes.len(), "parsed recipe catalog");
    Ok(recipes)
}

pub fn load_recipes(path: &Path) -> Result<Vec<Recipe>> {
    if !path.exists() {
        return Err(anyhow::anyhow!("Recipe catalog not found at: {:?}", path));
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read recipe catalog at {:?}", path))?;
    let recipes = parse_recipes(&text).with_context(|| format!("Invalid recipe catalog {:?}", path))?;
    info!(count = recipes.len(), path = %path.display(), "loaded curated recipes");
    Ok(recipes)
}

/// Reads household preferences; a missing file means defaults.
pub fn load_preferences(path: &Path) -> Result<Preferences> {
    if !path.exists() {
        debug!(path = %path.display(), "no preferences file, using defaults");
        return Ok(Preferences::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read preferences at {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse preferences at {:?}", path))
}
