use std::collections::HashSet;
use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::scoring::{RatingSignals, SelectionState};
use super::selection::greedy_pick;
use crate::recipe::{Preferences, Recipe};
use crate::validation::guardrails::passes_guardrails;

pub const DAYS_PER_WEEK: usize = 7;
/// Upper bound on one-for-one swaps during budget repair.
pub const MAX_BUDGET_SWAPS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Day {
    pub const ALL: [Day; DAYS_PER_WEEK] = [
        Day::Mon,
        Day::Tue,
        Day::Wed,
        Day::Thu,
        Day::Fri,
        Day::Sat,
        Day::Sun,
    ];

    /// Zero-based position in the week, Monday first.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Day> {
        Day::ALL.get(index).copied()
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub day: Day,
    pub recipe_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanMeta {
    /// Recency exclusions were dropped because too few recipes were eligible.
    pub fallback_used: bool,
    /// Swaps made by budget repair; 0 when the week already fit.
    #[serde(default)]
    pub budget_swaps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekPlan {
    pub items: Vec<PlanItem>,
    pub total_cost_usd: f64,
    pub protein_g_total: f64,
    pub fiber_g_total: f64,
    pub meta: PlanMeta,
}

impl WeekPlan {
    pub fn exceeds_budget(&self, budget: f64) -> bool {
        self.total_cost_usd > budget
    }

    pub fn recipe_ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.recipe_id.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("need {required} distinct eligible recipes to fill the week, only {available} available")]
    InsufficientRecipes { required: usize, available: usize },
}

/// Inputs for one planning run besides the recipe pool and preferences.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub budget: f64,
    pub exclude_ids: HashSet<String>,
    pub ratings: RatingSignals,
    pub fallback_on_shortage: bool,
    pub min_llm: usize,
    pub seed: Option<u64>,
    pub rating_weight: f64,
}

impl Default for PlanRequest {
    fn default() -> Self {
        Self {
            budget: 100.0,
            exclude_ids: HashSet::new(),
            ratings: RatingSignals::default(),
            fallback_on_shortage: true,
            min_llm: 2,
            seed: None,
            rating_weight: 1.2,
        }
    }
}

fn eligible<'a>(
    recipes: &'a [Recipe],
    prefs: &Preferences,
    exclude_ids: Option<&HashSet<String>>,
) -> Vec<&'a Recipe> {
    recipes
        .iter()
        .filter(|r| passes_guardrails(r, prefs.avoid_whole_tomatoes))
        .filter(|r| exclude_ids.map_or(true, |ids| !ids.contains(&r.id)))
        .collect()
}

fn total_cost(chosen: &[&Recipe]) -> f64 {
    chosen.iter().map(|r| r.cost_usd).sum()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn by_cost_ascending<'a>(candidates: &[&'a Recipe], state: &SelectionState) -> Vec<&'a Recipe> {
    let mut queue: Vec<&'a Recipe> = candidates
        .iter()
        .copied()
        .filter(|r| !state.is_chosen(r))
        .collect();
    queue.sort_by(|a, b| a.cost_usd.total_cmp(&b.cost_usd));
    queue
}

/// Swaps the priciest pick for the cheapest unused candidate until the week
/// fits the budget, the queue offers nothing cheaper, or the swap cap is hit.
/// Never raises the total.
fn repair_budget<'a>(chosen: &mut [&'a Recipe], queue: Vec<&'a Recipe>, budget: f64) -> usize {
    let mut swaps = 0;
    let mut queue = queue.into_iter();
    while swaps < MAX_BUDGET_SWAPS && !chosen.is_empty() && total_cost(chosen) > budget {
        let mut priciest = 0;
        for (idx, r) in chosen.iter().enumerate() {
            if r.cost_usd > chosen[priciest].cost_usd {
                priciest = idx;
            }
        }
        let Some(cheaper) = queue.next() else {
            break;
        };
        if cheaper.cost_usd >= chosen[priciest].cost_usd {
            break;
        }
        chosen[priciest] = cheaper;
        swaps += 1;
    }
    swaps
}

/// Builds a seven-dinner plan from `recipes`.
///
/// Order of passes: eligibility (with shortage fallback), generated-recipe
/// quota, combined fill, cheapest-first padding, budget repair. Fails only
/// when fewer than seven distinct eligible recipes exist.
pub fn plan_week(
    recipes: &[Recipe],
    prefs: &Preferences,
    request: &PlanRequest,
) -> Result<WeekPlan, PlanError> {
    let mut rng = match request.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut candidates = eligible(recipes, prefs, Some(&request.exclude_ids));
    let mut fallback_used = false;
    if candidates.len() < DAYS_PER_WEEK && request.fallback_on_shortage {
        candidates = eligible(recipes, prefs, None);
        fallback_used = true;
    }

    let (generated_pool, curated_pool): (Vec<&Recipe>, Vec<&Recipe>) =
        candidates.iter().copied().partition(|r| r.is_generated());

    let mut state = SelectionState::default();
    let mut chosen: Vec<&Recipe> = Vec::with_capacity(DAYS_PER_WEEK);

    if !generated_pool.is_empty() {
        let quota = request.min_llm.min(DAYS_PER_WEEK).min(generated_pool.len());
        let (picks, next) = greedy_pick(
            &generated_pool,
            quota,
            &request.ratings,
            state,
            &mut rng,
            request.rating_weight,
        );
        chosen.extend(picks);
        state = next;
    }

    let remaining_slots = DAYS_PER_WEEK.saturating_sub(chosen.len());
    if remaining_slots > 0 {
        let combined: Vec<&Recipe> = generated_pool.iter().chain(curated_pool.iter()).copied().collect();
        let (picks, next) = greedy_pick(
            &combined,
            remaining_slots,
            &request.ratings,
            state,
            &mut rng,
            request.rating_weight,
        );
        chosen.extend(picks);
        state = next;
    }

    if chosen.len() < DAYS_PER_WEEK {
        for pad in by_cost_ascending(&candidates, &state) {
            if chosen.len() == DAYS_PER_WEEK {
                break;
            }
            if state.is_chosen(pad) {
                continue;
            }
            state.record(pad);
            chosen.push(pad);
        }
    }

    if chosen.len() < DAYS_PER_WEEK {
        return Err(PlanError::InsufficientRecipes {
            required: DAYS_PER_WEEK,
            available: chosen.len(),
        });
    }

    let mut budget_swaps = 0;
    if total_cost(&chosen) > request.budget {
        let queue = by_cost_ascending(&candidates, &state);
        budget_swaps = repair_budget(&mut chosen, queue, request.budget);
    }

    let items = Day::ALL
        .iter()
        .zip(&chosen)
        .map(|(day, recipe)| PlanItem {
            day: *day,
            recipe_id: recipe.id.clone(),
        })
        .collect();

    Ok(WeekPlan {
        items,
        total_cost_usd: round_to(total_cost(&chosen), 2),
        protein_g_total: round_to(chosen.iter().map(|r| r.macros.protein_g).sum(), 1),
        fiber_g_total: round_to(chosen.iter().map(|r| r.macros.fiber_g).sum(), 1),
        meta: PlanMeta {
            fallback_used,
            budget_swaps,
        },
    })
}
