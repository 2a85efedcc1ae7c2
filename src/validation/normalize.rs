use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::recipe::{Ingredient, Macros, Recipe, Source, DEFAULT_METHOD};

pub const MAX_SLUG_LEN: usize = 40;

/// Loosely-typed record proposed by the generator. Only the normalizer reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCandidate(Map<String, Value>);

impl RawCandidate {
    /// Wraps arbitrary JSON; anything that is not an object becomes an empty record.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set_id(&mut self, id: String) {
        self.0.insert("id".to_string(), Value::String(id));
    }

    /// Identifier preference: own `id`, then `name`, then a random token.
    pub fn derive_id<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let raw = ["id", "name"]
            .iter()
            .filter_map(|key| self.get(key).and_then(truthy_text))
            .next()
            .unwrap_or_else(|| format!("r-{}", random_token(rng, 3)));
        slugify(&raw, rng)
    }
}

impl From<Map<String, Value>> for RawCandidate {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Lower-case kebab slug limited to `[a-z0-9-]` and 40 characters.
pub fn slugify<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let lowered = text
        .trim()
        .to_lowercase()
        .replace('&', "and")
        .replace('/', "-");

    let mut hyphenated = String::with_capacity(lowered.len());
    let mut in_whitespace = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                hyphenated.push('-');
            }
            in_whitespace = true;
        } else {
            hyphenated.push(c);
            in_whitespace = false;
        }
    }

    let slug: String = hyphenated
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .take(MAX_SLUG_LEN)
        .collect();

    if slug.is_empty() {
        format!("r-{}", random_token(rng, 3))
    } else {
        slug
    }
}

/// Hex string of `bytes` random bytes.
pub fn random_token<R: Rng + ?Sized>(rng: &mut R, bytes: usize) -> String {
    (0..bytes).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
}

/// Best-effort coercion into the internal recipe shape. Never fails; schema and
/// guardrail checks run afterwards as separate stages.
pub fn normalize(raw: &RawCandidate) -> Recipe {
    let id = raw.get("id").and_then(text).unwrap_or_default();
    let name = raw
        .get("name")
        .and_then(text)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| id.clone());
    let method = raw
        .get("method")
        .and_then(text)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_METHOD.to_string());

    let macros = raw.get("macros");
    let macro_field = |key: &str| macros.and_then(|m| m.get(key)).and_then(number).unwrap_or(0.0);

    Recipe {
        id,
        name,
        tags: raw.get("tags").map(tags).unwrap_or_default(),
        method,
        minutes: raw.get("minutes").and_then(minutes).unwrap_or(0),
        ingredients: raw.get("ingredients").map(ingredients).unwrap_or_default(),
        macros: Macros {
            protein_g: macro_field("protein_g"),
            fiber_g: macro_field("fiber_g"),
            kcals: macro_field("kcals"),
        },
        cost_usd: raw.get("cost_usd").and_then(number).unwrap_or(0.0),
        source: Source::Llm,
        instructions_md: None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-negative finite number from a JSON number or numeric string.
fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite() && *v >= 0.0)
}

fn minutes(value: &Value) -> Option<u32> {
    number(value).map(|m| m.trunc().min(u32::MAX as f64) as u32)
}

fn tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(text).collect(),
        _ => Vec::new(),
    }
}

fn ingredients(value: &Value) -> Vec<Ingredient> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|entry| match entry {
            Value::Object(fields) => Some(Ingredient {
                item: fields.get("item").and_then(text).unwrap_or_default(),
                qty: fields.get("qty").and_then(text).unwrap_or_default(),
            }),
            Value::String(item) => Some(Ingredient {
                item: item.clone(),
                qty: String::new(),
            }),
            _ => None,
        })
        .collect()
}
