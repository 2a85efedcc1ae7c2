use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use chrono::Local;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use meal_planner::api_connection::Provider;
use meal_planner::catalog::{load_preferences, load_recipes};
use meal_planner::cli::{parse_args, Command, HistoryArgs, PlanArgs, RateArgs};
use meal_planner::config::AppConfig;
use meal_planner::groceries::{aggregate_ingredients, write_shopping_list};
use meal_planner::intake::{admit_candidates, IntakeReport};
use meal_planner::planner::{plan_week, PlanRequest};
use meal_planner::recipe::Recipe;
use meal_planner::recipe_generator::{generate_instructions, propose_candidates, CandidateContext};
use meal_planner::render;
use meal_planner::storage::{HistorySnapshot, HistoryWindow, SqliteStore};

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Asks the generator for candidates and admits the ones that pass intake.
async fn gather_generated(
    provider: &Provider,
    context: &CandidateContext,
    existing_ids: &HashSet<String>,
    exclude_ids: &HashSet<String>,
    avoid_whole_tomatoes: bool,
    seed: Option<u64>,
) -> IntakeReport {
    let raw = match propose_candidates(provider, context).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "LLM disabled this run");
            return IntakeReport::default();
        }
    };
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    admit_candidates(raw, existing_ids, exclude_ids, avoid_whole_tomatoes, &mut rng)
}

async fn run_plan(args: PlanArgs, config: &AppConfig) -> Result<()> {
    let today = Local::now().date_naive();
    let week_start = args.week_start.unwrap_or(today);

    fs::create_dir_all(&args.out)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", args.out))?;

    let curated = load_recipes(&config.recipes_path())?;
    let prefs = load_preferences(&config.prefs_path())?;

    let mut store = match &args.db {
        Some(path) => Some(SqliteStore::open(path)?),
        None => None,
    };
    let history = match store.as_mut() {
        Some(store) => {
            store.upsert_recipes(&curated)?;
            let window = HistoryWindow {
                no_repeat_weeks: args.no_repeat_weeks,
                block_low_rated_weeks: args.block_low_rated_weeks,
            };
            store.history_snapshot(window, today)?
        }
        None => HistorySnapshot::default(),
    };

    let provider = if args.no_llm {
        None
    } else {
        match Provider::from_settings(&config.llm) {
            Ok(provider) => Some(provider),
            Err(e) => {
                warn!(error = %e, "LLM disabled this run");
                None
            }
        }
    };

    let mut all_recipes: Vec<Recipe> = curated.clone();
    let mut intake_summary = None;
    if !args.no_llm {
        let mut report = IntakeReport::default();
        if let Some(provider) = &provider {
            let existing_ids: HashSet<String> = curated.iter().map(|r| r.id.clone()).collect();
            let context = CandidateContext::new(
                &prefs,
                args.budget,
                history.exclude_ids.iter().chain(&existing_ids).cloned(),
                curated.iter().map(|r| r.name.clone()),
            );
            report = gather_generated(
                provider,
                &context,
                &existing_ids,
                &history.exclude_ids,
                prefs.avoid_whole_tomatoes,
                args.seed,
            )
            .await;
            if let Some(store) = store.as_mut() {
                if !report.accepted.is_empty() {
                    store.upsert_recipes(&report.accepted)?;
                }
            }
        }
        intake_summary = Some(report.summary());
        all_recipes.extend(report.accepted);
    }

    let request = PlanRequest {
        budget: args.budget,
        exclude_ids: history.exclude_ids,
        ratings: history.ratings,
        fallback_on_shortage: true,
        min_llm: args.min_llm,
        seed: args.seed,
        rating_weight: args.rating_weight,
    };
    let plan = plan_week(&all_recipes, &prefs, &request)?;
    if plan.meta.fallback_used {
        warn!("not enough fresh recipes; recency exclusions were relaxed");
    }
    if plan.meta.budget_swaps > 0 {
        info!(
            swaps = plan.meta.budget_swaps,
            total = plan.total_cost_usd,
            "budget repair swapped in cheaper recipes"
        );
    }
    if plan.exceeds_budget(args.budget) {
        warn!(
            total = plan.total_cost_usd,
            budget = args.budget,
            "plan exceeds budget after repair"
        );
    }

    let by_id: HashMap<&str, &Recipe> = all_recipes.iter().map(|r| (r.id.as_str(), r)).collect();

    let plan_path = args.out.join("mealplan.txt");
    let text = render::plan_text(&plan, &by_id, intake_summary.as_deref(), args.block_low_rated_weeks);
    fs::write(&plan_path, text)
        .await
        .with_context(|| format!("Failed to write {:?}", plan_path))?;

    let mut chosen: Vec<Recipe> = plan
        .recipe_ids()
        .filter_map(|id| by_id.get(id).map(|r| (*r).clone()))
        .collect();

    let shopping_path = args.out.join("shopping_list.csv");
    let need = aggregate_ingredients(&chosen.iter().collect::<Vec<_>>());
    write_shopping_list(&shopping_path, &need)?;

    let recipes_dir = args.out.join("recipes");
    fs::create_dir_all(&recipes_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", recipes_dir))?;

    let mut cookbook_parts = Vec::with_capacity(chosen.len());
    let mut newly_instructed = 0usize;
    for recipe in chosen.iter_mut() {
        if recipe.instructions_md.is_none() {
            if let Some(store) = &store {
                recipe.instructions_md = store.stored_instructions(&recipe.id)?;
            }
        }
        let markdown = if let Some(md) = recipe.instructions_md.clone() {
            md
        } else if let Some(provider) = &provider {
            match generate_instructions(provider, recipe).await {
                Ok(md) => {
                    recipe.instructions_md = Some(md.clone());
                    newly_instructed += 1;
                    md
                }
                Err(e) => {
                    warn!(recipe_id = %recipe.id, error = %e, "instruction generation failed, using scaffold");
                    render::fallback_instructions(recipe)
                }
            }
        } else {
            render::fallback_instructions(recipe)
        };
        let card_path = recipes_dir.join(format!("{}.md", recipe.id));
        fs::write(&card_path, &markdown)
            .await
            .with_context(|| format!("Failed to write {:?}", card_path))?;
        cookbook_parts.push(markdown);
    }

    let cookbook_path = recipes_dir.join("COOKBOOK.md");
    fs::write(&cookbook_path, render::cookbook(&cookbook_parts))
        .await
        .with_context(|| format!("Failed to write {:?}", cookbook_path))?;

    println!("✓ Plan written to {}", plan_path.display());
    println!("✓ Shopping list written to {}", shopping_path.display());
    println!("✓ Recipes written to {} (including COOKBOOK.md)", recipes_dir.display());

    if let Some(store) = store.as_mut() {
        if newly_instructed > 0 {
            store.upsert_recipes(&chosen)?;
            info!(count = newly_instructed, "stored new instructions");
        }
        let plan_id = store.save_plan(week_start, prefs.people, args.budget, &plan)?;
        if let Some(db) = &args.db {
            println!("✓ Saved plan to DB: {} (plan_id={})", db.display(), plan_id);
        }
    }
    Ok(())
}

fn run_rate(args: RateArgs) -> Result<()> {
    let cooked_on = args.date.unwrap_or_else(|| Local::now().date_naive());
    let store = SqliteStore::open(&args.db)?;
    store.add_rating(&args.recipe_id, cooked_on, args.rating, args.comments.as_deref())?;
    println!("✓ Rated {} = {} on {}", args.recipe_id, args.rating, cooked_on);
    Ok(())
}

fn run_history(args: HistoryArgs) -> Result<()> {
    let store = SqliteStore::open(&args.db)?;
    let plans = store.recent_plans(args.weeks)?;
    print!("{}", render::history_text(&plans));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = parse_args();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Plan(args) => {
            let config = AppConfig::resolve();
            run_plan(args, &config).await
        }
        Command::Rate(args) => run_rate(args),
        Command::History(args) => run_history(args),
    }
}
