use std::collections::HashSet;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::recipe::{Recipe, Source};
use crate::validation::guardrails::check_guardrails;
use crate::validation::normalize::{normalize, random_token, RawCandidate};
use crate::validation::schema::validate_recipe;

/// Counters and survivors of one batch of generated candidates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntakeReport {
    pub raw: usize,
    pub normalized: usize,
    pub rejected_schema: usize,
    pub rejected_guardrails: usize,
    pub rejected_recent_ban: usize,
    pub accepted: Vec<Recipe>,
}

impl IntakeReport {
    pub fn summary(&self) -> String {
        format!(
            "LLM candidates raw={}, normalized={}, accepted={}; rejected schema={}, guardrails={}, recent-ban={}",
            self.raw,
            self.normalized,
            self.accepted.len(),
            self.rejected_schema,
            self.rejected_guardrails,
            self.rejected_recent_ban
        )
    }
}

/// Runs generated candidates through id derivation, normalization, schema
/// validation, guardrails, the recent-ban check and id de-duplication.
///
/// `existing_ids` holds ids already in the pool (curated recipes); accepted
/// candidates whose slug collides get a short random suffix.
pub fn admit_candidates<R: Rng + ?Sized>(
    raw_candidates: Vec<RawCandidate>,
    existing_ids: &HashSet<String>,
    exclude_ids: &HashSet<String>,
    avoid_whole_tomatoes: bool,
    rng: &mut R,
) -> IntakeReport {
    let mut report = IntakeReport {
        raw: raw_candidates.len(),
        ..IntakeReport::default()
    };

    let mut normalized = Vec::with_capacity(raw_candidates.len());
    for mut candidate in raw_candidates {
        let id = candidate.derive_id(rng);
        candidate.set_id(id);
        let recipe = normalize(&candidate);
        let validation = validate_recipe(&recipe);
        if validation.ok {
            normalized.push(recipe);
        } else {
            debug!(recipe_id = %recipe.id, errors = ?validation.errors, "candidate failed schema");
            report.rejected_schema += 1;
        }
    }
    report.normalized = normalized.len();

    let mut seen_ids = existing_ids.clone();
    for mut recipe in normalized {
        if let Some(violation) = check_guardrails(&recipe, avoid_whole_tomatoes) {
            debug!(recipe_id = %recipe.id, %violation, "candidate rejected by guardrails");
            report.rejected_guardrails += 1;
            continue;
        }
        if exclude_ids.contains(&recipe.id) {
            debug!(recipe_id = %recipe.id, "candidate recently used or banned");
            report.rejected_recent_ban += 1;
            continue;
        }
        if seen_ids.contains(&recipe.id) {
            recipe.id = format!("{}-{}", recipe.id, random_token(rng, 2));
        }
        seen_ids.insert(recipe.id.clone());
        recipe.source = Source::Llm;
        report.accepted.push(recipe);
    }

    info!("{}", report.summary());
    report
}
