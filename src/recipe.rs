use serde::{Deserialize, Deserializer, Serialize};

/// Where a recipe came from. Curated recipes are trusted; generated ones are
/// admitted only after normalization and guardrail filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Curated,
    Llm,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Curated => "curated",
            Source::Llm => "llm",
        }
    }

    /// Short label used in the rendered plan.
    pub fn label(&self) -> &'static str {
        match self {
            Source::Curated => "curated",
            Source::Llm => "LLM",
        }
    }
}

/// Cooking methods the generator is asked to choose from.
pub const COOKING_METHODS: &[&str] = &[
    "stovetop", "oven", "grill", "air_fryer", "sheetpan", "onepot", "smoker",
];

pub const DEFAULT_METHOD: &str = "stovetop";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ingredient {
    pub item: String,
    /// Numeric text ("600") or free text ("1 can").
    #[serde(default, deserialize_with = "qty_from_any")]
    pub qty: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Macros {
    pub protein_g: f64,
    pub fiber_g: f64,
    pub kcals: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub method: String,
    /// Whole minutes; `30.0` and `"30"` are accepted and truncated.
    #[serde(deserialize_with = "minutes_from_any")]
    pub minutes: u32,
    pub ingredients: Vec<Ingredient>,
    pub macros: Macros,
    pub cost_usd: f64,
    #[serde(default)]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions_md: Option<String>,
}

impl Recipe {
    pub fn is_generated(&self) -> bool {
        self.source == Source::Llm
    }
}

/// Household preferences read from `user_prefs.json`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Preferences {
    pub people: u32,
    pub dislikes: Vec<String>,
    pub avoid_whole_tomatoes: bool,
    pub appliances: Vec<String>,
    pub effort: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            people: 2,
            dislikes: Vec::new(),
            avoid_whole_tomatoes: true,
            appliances: Vec::new(),
            effort: "low".to_string(),
        }
    }
}

fn qty_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn minutes_from_any<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = match &value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(m) if m.is_finite() && m >= 0.0 && m <= f64::from(u32::MAX) => Ok(m.trunc() as u32),
        _ => Err(serde::de::Error::custom(format!(
            "minutes must be a non-negative number, got {value}"
        ))),
    }
}
