use std::fmt;

use crate::recipe::Recipe;

pub const BANNED_TOKENS: &[&str] = &["shellfish", "raw onion", "kale"];
/// Hard cap per dinner for the household.
pub const MAX_MEAL_COST: f64 = 18.0;
pub const MIN_PROTEIN_G: f64 = 40.0;
pub const MIN_FIBER_G: f64 = 6.0;

const VERY_SPICY_TAG: &str = "very_spicy";
const EXTRA_SPICY_PHRASE: &str = "extra spicy";
const WHOLE_TOMATOES_TAG: &str = "whole_tomatoes";

/// First hard rule a recipe breaks.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardrailViolation {
    BannedToken(&'static str),
    TooSpicy,
    WholeTomatoes,
    LowProtein(f64),
    LowFiber(f64),
    OverCost(f64),
}

impl fmt::Display for GuardrailViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardrailViolation::BannedToken(token) => write!(f, "contains banned token '{}'", token),
            GuardrailViolation::TooSpicy => write!(f, "marked very spicy"),
            GuardrailViolation::WholeTomatoes => write!(f, "uses whole tomatoes"),
            GuardrailViolation::LowProtein(g) => {
                write!(f, "protein {:.1} g below {:.0} g floor", g, MIN_PROTEIN_G)
            }
            GuardrailViolation::LowFiber(g) => {
                write!(f, "fiber {:.1} g below {:.0} g floor", g, MIN_FIBER_G)
            }
            GuardrailViolation::OverCost(usd) => {
                write!(f, "cost ${:.2} above ${:.2} cap", usd, MAX_MEAL_COST)
            }
        }
    }
}

pub fn check_guardrails(recipe: &Recipe, avoid_whole_tomatoes: bool) -> Option<GuardrailViolation> {
    let name = recipe.name.to_lowercase();
    let tags: Vec<String> = recipe.tags.iter().map(|t| t.to_lowercase()).collect();
    // Multi-word tokens may be split across adjacent tags.
    let joined_tags = tags.join(" ");

    for &token in BANNED_TOKENS {
        if name.contains(token) || joined_tags.contains(token) {
            return Some(GuardrailViolation::BannedToken(token));
        }
    }
    if tags.iter().any(|t| t.contains(VERY_SPICY_TAG)) || name.contains(EXTRA_SPICY_PHRASE) {
        return Some(GuardrailViolation::TooSpicy);
    }
    if avoid_whole_tomatoes && tags.iter().any(|t| t.contains(WHOLE_TOMATOES_TAG)) {
        return Some(GuardrailViolation::WholeTomatoes);
    }
    if recipe.macros.protein_g < MIN_PROTEIN_G {
        return Some(GuardrailViolation::LowProtein(recipe.macros.protein_g));
    }
    if recipe.macros.fiber_g < MIN_FIBER_G {
        return Some(GuardrailViolation::LowFiber(recipe.macros.fiber_g));
    }
    if recipe.cost_usd > MAX_MEAL_COST {
        return Some(GuardrailViolation::OverCost(recipe.cost_usd));
    }
    None
}

pub fn passes_guardrails(recipe: &Recipe, avoid_whole_tomatoes: bool) -> bool {
    check_guardrails(recipe, avoid_whole_tomatoes).is_none()
}
