use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::api_connection::{ApiConnectionError, ChatMessage, Provider};
use crate::recipe::{Preferences, Recipe, COOKING_METHODS};
use crate::validation::guardrails::{MAX_MEAL_COST, MIN_FIBER_G, MIN_PROTEIN_G};
use crate::validation::normalize::RawCandidate;

pub const CANDIDATES_REQUESTED: usize = 12;
const CANDIDATE_TEMPERATURE: f32 = 0.6;
const INSTRUCTIONS_TEMPERATURE: f32 = 0.5;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Api(#[from] ApiConnectionError),
    #[error("generator returned malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("generator returned no candidates")]
    NoCandidates,
}

/// What the generator is told about the household and what to avoid.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CandidateContext {
    pub people: u32,
    pub budget_week_usd: f64,
    pub dislikes: Vec<String>,
    pub avoid_whole_tomatoes: bool,
    pub appliances: Vec<String>,
    pub effort: String,
    pub avoid_ids: Vec<String>,
    pub avoid_names: Vec<String>,
}

impl CandidateContext {
    pub fn new(
        prefs: &Preferences,
        budget_week_usd: f64,
        avoid_ids: impl IntoIterator<Item = String>,
        avoid_names: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut avoid_ids: Vec<String> = avoid_ids.into_iter().collect();
        avoid_ids.sort();
        avoid_ids.dedup();
        let mut avoid_names: Vec<String> = avoid_names.into_iter().collect();
        avoid_names.sort();
        avoid_names.dedup();
        Self {
            people: prefs.people,
            budget_week_usd,
            dislikes: prefs.dislikes.clone(),
            avoid_whole_tomatoes: prefs.avoid_whole_tomatoes,
            appliances: prefs.appliances.clone(),
            effort: prefs.effort.clone(),
            avoid_ids,
            avoid_names,
        }
    }
}

fn join_or_empty(items: &[String]) -> String {
    if items.is_empty() {
        "[]".to_string()
    } else {
        items.join(", ")
    }
}

pub fn candidates_system_prompt() -> String {
    format!(
        "You are a dinner planning assistant. Output JSON ONLY, no prose.

Propose dinners for a household that are high-protein, high-fiber and low effort.

Hard diet rules:
- Exclude shellfish, raw onion, kale and very spicy dishes.
- Tomatoes only blended or as passata, never whole chunks.
- Common US grocery items; weeknight friendly, ideally 20-35 minutes.

Hard bounds per recipe:
- macros.protein_g >= {protein}
- macros.fiber_g >= {fiber}
- macros.kcals between 450 and 850
- cost_usd <= {cost:.2} for the whole dish

Methods: one of [{methods}]; keep methods varied across the set.

Provide exactly {count} candidates, each with a unique kebab-case 'id' (letters, digits, hyphens, max 40 chars).

Return exactly this shape:
{{
  \"candidates\": [
    {{
      \"id\": \"kebab-case-unique-id\",
      \"name\": \"Readable Dish Name\",
      \"minutes\": 25,
      \"method\": \"stovetop\",
      \"tags\": [\"mild\", \"blend_tomatoes_ok\"],
      \"macros\": {{\"protein_g\": 45, \"fiber_g\": 8, \"kcals\": 650}},
      \"cost_usd\": 11.5,
      \"ingredients\": [{{\"item\": \"boneless skinless chicken thighs\", \"qty\": \"600 g\"}}]
    }}
  ]
}}",
        protein = MIN_PROTEIN_G,
        fiber = MIN_FIBER_G,
        cost = MAX_MEAL_COST,
        methods = COOKING_METHODS.join(", "),
        count = CANDIDATES_REQUESTED,
    )
}

pub fn candidates_user_prompt(context: &CandidateContext) -> String {
    format!(
        "Preferences:
people: {}
budget_week_usd: {}
dislikes: {}
avoid_whole_tomatoes: {}
appliances: {}
effort: {}

Avoid these recent recipe IDs: {}
Avoid these known dishes by name (suggest something else): {}

Mix cuisines and methods. Return {} diverse dinner candidates that honor every rule and bound.",
        context.people,
        context.budget_week_usd,
        context.dislikes.join(", "),
        context.avoid_whole_tomatoes,
        context.appliances.join(", "),
        context.effort,
        join_or_empty(&context.avoid_ids),
        join_or_empty(&context.avoid_names),
        CANDIDATES_REQUESTED,
    )
}

/// Removes a surrounding Markdown code fence (with or without a `json` tag).
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    if !(trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() >= 6) {
        return trimmed;
    }
    let inner = &trimmed[3..trimmed.len() - 3];
    inner.strip_prefix("json").unwrap_or(inner).trim()
}

/// Extracts the `candidates` array from generator output.
pub fn parse_candidates(content: &str) -> Result<Vec<RawCandidate>, GenerationError> {
    let data: Value = serde_json::from_str(strip_code_fences(content))?;
    match data.get("candidates") {
        Some(Value::Array(items)) if !items.is_empty() => {
            Ok(items.iter().cloned().map(RawCandidate::from_value).collect())
        }
        _ => Err(GenerationError::NoCandidates),
    }
}

pub async fn propose_candidates(
    provider: &Provider,
    context: &CandidateContext,
) -> Result<Vec<RawCandidate>, GenerationError> {
    info!(provider = provider.name(), model = provider.model(), "requesting recipe candidates");
    let content = provider
        .complete(
            vec![
                ChatMessage::system(candidates_system_prompt()),
                ChatMessage::user(candidates_user_prompt(context)),
            ],
            CANDIDATE_TEMPERATURE,
            true,
        )
        .await?;
    debug!(bytes = content.len(), "received candidate payload");
    parse_candidates(&content)
}

const INSTRUCTIONS_SYSTEM_PROMPT: &str = "You write concise, fail-safe cooking instructions as Markdown.
Constraints:
- Weeknight friendly, sized for the household.
- No shellfish, no raw onion, no kale, nothing very spicy, tomatoes only blended.
- Include: title, time summary, equipment, ingredients with the given quantities, numbered steps with timers and doneness cues, serving suggestions, optional swaps.
- Use Fahrenheit and safe internal temperatures (chicken 165F, pork 145F).
- Roughly 12-18 lines. Just the recipe.";

pub fn instructions_user_prompt(recipe: &Recipe) -> String {
    let lines: Vec<String> = recipe
        .ingredients
        .iter()
        .filter(|ing| !ing.item.trim().is_empty())
        .map(|ing| {
            let qty = ing.qty.trim();
            if qty.is_empty() {
                format!("- {}", ing.item.trim())
            } else {
                format!("- {} {}", qty, ing.item.trim())
            }
        })
        .collect();
    let ingredients = if lines.is_empty() {
        "- See ingredients list above".to_string()
    } else {
        lines.join("\n")
    };

    format!(
        "Dish: {}\nMethod: {}\nTotal minutes: {}\nIngredients:\n{}\n\nNotes:\n- Prioritize high protein and decent fiber.\n- Keep heat level mild.\n",
        recipe.name, recipe.method, recipe.minutes, ingredients
    )
}

pub async fn generate_instructions(provider: &Provider, recipe: &Recipe) -> Result<String, GenerationError> {
    debug!(recipe_id = %recipe.id, "requesting instructions");
    let markdown = provider
        .complete(
            vec![
                ChatMessage::system(INSTRUCTIONS_SYSTEM_PROMPT),
                ChatMessage::user(instructions_user_prompt(recipe)),
            ],
            INSTRUCTIONS_TEMPERATURE,
            false,
        )
        .await?;
    Ok(markdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{Ingredient, Macros, Source};

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
        assert_eq!(strip_code_fences("```"), "```");
    }

    #[test]
    fn test_parse_candidates_keeps_non_object_entries_as_empty_records() {
        let parsed = parse_candidates(r#"{"candidates": [{"name": "Bean Chili"}, "junk"]}"#).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1], RawCandidate::default());
    }

    #[test]
    fn test_parse_candidates_errors() {
        assert!(matches!(parse_candidates(r#"{"candidates": []}"#), Err(GenerationError::NoCandidates)));
        assert!(matches!(parse_candidates(r#"{"recipes": [{}]}"#), Err(GenerationError::NoCandidates)));
        assert!(matches!(parse_candidates("not json"), Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn test_context_sorts_and_renders_avoid_lists() {
        let context = CandidateContext::new(
            &Preferences::default(),
            95.0,
            vec!["b-id".to_string(), "a-id".to_string(), "a-id".to_string()],
            Vec::<String>::new(),
        );
        assert_eq!(context.avoid_ids, vec!["a-id", "b-id"]);
        let prompt = candidates_user_prompt(&context);
        assert!(prompt.contains("Avoid these recent recipe IDs: a-id, b-id"));
        assert!(prompt.contains("(suggest something else): []"));
        assert!(prompt.contains("budget_week_usd: 95"));
    }

    #[test]
    fn test_system_prompt_carries_bounds() {
        let prompt = candidates_system_prompt();
        assert!(prompt.contains("macros.protein_g >= 40"));
        assert!(prompt.contains("cost_usd <= 18.00"));
        assert!(prompt.contains("air_fryer"));
    }

    #[test]
    fn test_instructions_prompt_lists_quantities() {
        let recipe = Recipe {
            id: "x".to_string(),
            name: "Chicken Traybake".to_string(),
            tags: vec![],
            method: "sheetpan".to_string(),
            minutes: 35,
            ingredients: vec![
                Ingredient { item: "chicken thighs".to_string(), qty: "600 g".to_string() },
                Ingredient { item: "paprika".to_string(), qty: String::new() },
                Ingredient { item: " ".to_string(), qty: "1".to_string() },
            ],
            macros: Macros::default(),
            cost_usd: 10.0,
            source: Source::Curated,
            instructions_md: None,
        };
        let prompt = instructions_user_prompt(&recipe);
        assert!(prompt.contains("- 600 g chicken thighs\n- paprika\n\n"));
        assert!(prompt.starts_with("Dish: Chicken Traybake\nMethod: sheetpan\nTotal minutes: 35"));
    }
}
