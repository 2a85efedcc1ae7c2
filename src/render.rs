use std::collections::HashMap;
use std::fmt::Write as _;

use crate::planner::WeekPlan;
use crate::recipe::Recipe;
use crate::storage::{PlanHistory, LOW_RATING_THRESHOLD};

pub const COOKBOOK_SEPARATOR: &str = "\n\n---\n\n";

/// Human-readable week plan, as written to `mealplan.txt`.
pub fn plan_text(
    plan: &WeekPlan,
    recipes_by_id: &HashMap<&str, &Recipe>,
    intake_summary: Option<&str>,
    low_rated_weeks: u32,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Estimated weekly cost: ${:.2}", plan.total_cost_usd);
    let _ = writeln!(
        out,
        "Weekly protein: {:.0} g | Weekly fiber: {:.0} g",
        plan.protein_g_total, plan.fiber_g_total
    );
    if plan.meta.fallback_used {
        out.push_str("(Note: not enough fresh recipes; some exclusions were relaxed.)\n");
    }
    if let Some(summary) = intake_summary {
        let _ = writeln!(out, "(Info: {summary})");
    }
    if low_rated_weeks > 0 {
        let _ = writeln!(
            out,
            "(Low-rated blocker: hiding ≤{LOW_RATING_THRESHOLD}★ from last {low_rated_weeks} weeks.)"
        );
    }
    out.push('\n');

    for item in &plan.items {
        match recipes_by_id.get(item.recipe_id.as_str()) {
            Some(r) => {
                let _ = writeln!(
                    out,
                    "{}: {} [{}] ({} min, {})  [Protein {} g | Fiber {} g | ${:.2}]",
                    item.day,
                    r.name,
                    r.source.label(),
                    r.minutes,
                    r.method,
                    r.macros.protein_g,
                    r.macros.fiber_g,
                    r.cost_usd
                );
            }
            None => {
                let _ = writeln!(out, "{}: {}", item.day, item.recipe_id);
            }
        }
    }
    out
}

/// Minimal Markdown scaffold used when no instructions can be generated.
pub fn fallback_instructions(recipe: &Recipe) -> String {
    let ingredients: Vec<String> = recipe
        .ingredients
        .iter()
        .map(|ing| {
            let words: Vec<&str> = [ing.qty.trim(), ing.item.trim()]
                .into_iter()
                .filter(|w| !w.is_empty())
                .collect();
            format!("- {}", words.join(" "))
        })
        .collect();
    format!(
        "# {}\n\n_Time_: ~{} min  \n_Method_: {}\n\n## Ingredients\n{}\n\n## Steps\n1. Prep ingredients.\n2. Cook using listed method.\n3. Season to taste.\n",
        recipe.name,
        recipe.minutes,
        recipe.method,
        ingredients.join("\n")
    )
}

pub fn cookbook<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|md| format!("{}\n", md.as_ref().trim()))
        .collect::<Vec<_>>()
        .join(COOKBOOK_SEPARATOR)
}

/// One block per stored plan, for the `history` command.
pub fn history_text(plans: &[PlanHistory]) -> String {
    if plans.is_empty() {
        return "No plans found.\n".to_string();
    }
    let mut out = String::new();
    for plan in plans {
        let _ = writeln!(
            out,
            "Week {} | cost ${:.2} | protein {:.0}g | fiber {:.0}g",
            plan.week_start, plan.total_cost_usd, plan.total_protein_g, plan.total_fiber_g
        );
        for item in &plan.items {
            let _ = writeln!(out, "  {}: {}", item.day, item.name.as_deref().unwrap_or(&item.recipe_id));
        }
        out.push('\n');
    }
    out
}
