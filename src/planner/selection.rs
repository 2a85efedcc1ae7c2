use rand::Rng;

use super::scoring::{score, RatingSignals, SelectionState};
use crate::recipe::Recipe;

/// Greedily picks up to `k` recipes from `pool`, one strict maximum per round.
///
/// Every round re-scores all remaining candidates with fresh jitter, so exact
/// ties are broken randomly rather than by position. Diversity bonuses only
/// discourage repeats. Returns the picks together with the advanced state.
pub fn greedy_pick<'a, R: Rng + ?Sized>(
    pool: &[&'a Recipe],
    k: usize,
    ratings: &RatingSignals,
    mut state: SelectionState,
    rng: &mut R,
    rating_weight: f64,
) -> (Vec<&'a Recipe>, SelectionState) {
    let mut chosen = Vec::with_capacity(k);
    let mut remaining: Vec<&'a Recipe> = pool.iter().copied().filter(|r| !state.is_chosen(r)).collect();

    while chosen.len() < k && !remaining.is_empty() {
        let mut best: Option<(usize, f64)> = None;
        for (idx, recipe) in remaining.iter().enumerate() {
            let s = score(recipe, ratings, &state, rng, rating_weight);
            if best.map_or(true, |(_, best_score)| s > best_score) {
                best = Some((idx, s));
            }
        }
        let Some((idx, _)) = best else {
            break;
        };

        let pick = remaining[idx];
        state.record(pick);
        chosen.push(pick);
        remaining.retain(|r| !state.is_chosen(r));
    }

    (chosen, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{Macros, Source};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn recipe(id: &str, name: &str, method: &str, protein: f64, cost: f64) -> Recipe {
        Recipe {
            id: id.to_string(),
            name: name.to_string(),
            tags: vec![],
            method: method.to_string(),
            minutes: 30,
            ingredients: vec![],
            macros: Macros {
                protein_g: protein,
                fiber_g: 8.0,
                kcals: 600.0,
            },
            cost_usd: cost,
            source: Source::Curated,
            instructions_md: None,
        }
    }

    #[test]
    fn test_picks_highest_scores_first() {
        let a = recipe("a", "Chicken A", "oven", 60.0, 10.0);
        let b = recipe("b", "Beef B", "grill", 50.0, 10.0);
        let c = recipe("c", "Tofu C", "stovetop", 42.0, 10.0);
        let pool = vec![&c, &b, &a];
        let mut rng = StdRng::seed_from_u64(1);
        let (picks, state) =
            greedy_pick(&pool, 2, &RatingSignals::default(), SelectionState::default(), &mut rng, 1.2);
        let ids: Vec<&str> = picks.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(state.chosen_ids.contains("a") && state.chosen_ids.contains("b"));
        assert!(state.used_methods.contains("grill"));
        assert!(state.used_groups.contains("beef"));
    }

    #[test]
    fn test_diversity_bonus_reorders_near_ties() {
        // Same nutrition; the second oven/chicken dish loses its bonuses after the first pick.
        let first = recipe("first", "Chicken One", "oven", 50.0, 10.0);
        let repeat = recipe("repeat", "Chicken Two", "oven", 50.5, 10.0);
        let fresh = recipe("fresh", "Lentil Soup", "onepot", 50.0, 10.0);
        let pool = vec![&first, &repeat, &fresh];
        let mut state = SelectionState::default();
        state.record(&first);
        let mut rng = StdRng::seed_from_u64(3);
        let (picks, _) = greedy_pick(&pool, 1, &RatingSignals::default(), state, &mut rng, 1.2);
        assert_eq!(picks[0].id, "fresh");
    }

    #[test]
    fn test_stops_when_pool_exhausted_and_skips_chosen() {
        let a = recipe("a", "A", "oven", 50.0, 10.0);
        let b = recipe("b", "B", "grill", 45.0, 10.0);
        let pool = vec![&a, &b];
        let mut state = SelectionState::default();
        state.chosen_ids.insert("a".to_string());
        let mut rng = StdRng::seed_from_u64(9);
        let (picks, _) = greedy_pick(&pool, 5, &RatingSignals::default(), state, &mut rng, 1.2);
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].id, "b");
    }

    #[test]
    fn test_same_seed_same_picks() {
        let recipes: Vec<Recipe> = (0..10)
            .map(|i| recipe(&format!("r{i}"), "Dish", "oven", 45.0, 10.0))
            .collect();
        let pool: Vec<&Recipe> = recipes.iter().collect();
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let (picks, _) =
                greedy_pick(&pool, 4, &RatingSignals::default(), SelectionState::default(), &mut rng, 1.2);
            picks.iter().map(|r| r.id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(run(11), run(11));
    }
}
