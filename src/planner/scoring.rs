use std::collections::{HashMap, HashSet};

use rand::Rng;

use crate::recipe::Recipe;

const PROTEIN_WEIGHT: f64 = 0.30;
const FIBER_WEIGHT: f64 = 0.15;
const COST_WEIGHT: f64 = 0.25;
const RATING_SCALE: f64 = 0.75;
const NEUTRAL_RATING: f64 = 3.0;
const METHOD_BONUS: f64 = 0.15;
const GROUP_BONUS: f64 = 0.15;
const NOVELTY_BONUS: f64 = 0.10;
pub const JITTER: f64 = 0.02;

pub const DEFAULT_PROTEIN_GROUP: &str = "other";

/// Keyword -> protein group, checked in order.
const PROTEIN_KEYWORDS: &[(&str, &str)] = &[
    ("chicken", "chicken"),
    ("beef", "beef"),
    ("salmon", "fish"),
    ("fish", "fish"),
    ("egg", "eggs"),
    ("eggs", "eggs"),
    ("turkey", "turkey"),
    ("pork", "pork"),
    ("tofu", "veg"),
    ("bean", "veg"),
    ("lentil", "veg"),
];

fn match_keyword(text: &str) -> Option<&'static str> {
    let text = text.to_lowercase();
    PROTEIN_KEYWORDS
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map(|(_, group)| *group)
}

/// Infers the protein group from the name first, then each ingredient in order.
pub fn protein_group(recipe: &Recipe) -> &'static str {
    match_keyword(&recipe.name)
        .or_else(|| {
            recipe
                .ingredients
                .iter()
                .find_map(|ingredient| match_keyword(&ingredient.item))
        })
        .unwrap_or(DEFAULT_PROTEIN_GROUP)
}

/// Read-only rating snapshot for one planning run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingSignals {
    pub average: HashMap<String, f64>,
    pub count: HashMap<String, u32>,
}

impl RatingSignals {
    pub fn new(average: HashMap<String, f64>, count: HashMap<String, u32>) -> Self {
        Self { average, count }
    }

    /// Cold-start dampening: no history counts for nothing, a single rating for half.
    pub fn strength(&self, recipe_id: &str) -> f64 {
        match self.count.get(recipe_id).copied().unwrap_or(0) {
            0 => 0.0,
            1 => 0.5,
            _ => 1.0,
        }
    }

    pub fn bias(&self, recipe_id: &str, rating_weight: f64) -> f64 {
        self.average.get(recipe_id).map_or(0.0, |avg| {
            (avg - NEUTRAL_RATING) * RATING_SCALE * self.strength(recipe_id) * rating_weight
        })
    }
}

/// Diversity bookkeeping threaded through every selection round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    pub used_methods: HashSet<String>,
    pub used_groups: HashSet<&'static str>,
    pub chosen_ids: HashSet<String>,
}

impl SelectionState {
    pub fn is_chosen(&self, recipe: &Recipe) -> bool {
        self.chosen_ids.contains(&recipe.id)
    }

    pub fn record(&mut self, recipe: &Recipe) {
        self.chosen_ids.insert(recipe.id.clone());
        self.used_methods.insert(recipe.method.clone());
        self.used_groups.insert(protein_group(recipe));
    }
}

/// Everything in the score except the jitter term.
pub fn base_score(
    recipe: &Recipe,
    ratings: &RatingSignals,
    state: &SelectionState,
    rating_weight: f64,
) -> f64 {
    let nutrition = PROTEIN_WEIGHT * recipe.macros.protein_g + FIBER_WEIGHT * recipe.macros.fiber_g
        - COST_WEIGHT * recipe.cost_usd;

    let rating_bias = ratings.bias(&recipe.id, rating_weight);

    let method_bonus = if state.used_methods.contains(&recipe.method) {
        0.0
    } else {
        METHOD_BONUS
    };
    let group_bonus = if state.used_groups.contains(protein_group(recipe)) {
        0.0
    } else {
        GROUP_BONUS
    };
    let novelty = if recipe.is_generated() { NOVELTY_BONUS } else { 0.0 };

    nutrition + rating_bias + method_bonus + group_bonus + novelty
}

pub fn score<R: Rng + ?Sized>(
    recipe: &Recipe,
    ratings: &RatingSignals,
    state: &SelectionState,
    rng: &mut R,
    rating_weight: f64,
) -> f64 {
    base_score(recipe, ratings, state, rating_weight) + rng.gen_range(-JITTER..=JITTER)
}
