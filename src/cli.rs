use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "mealplanner",
    author,
    version,
    about = "Budget-aware weekly dinner planner with generated variety and ratings bias",
    long_about = None
)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a weekly plan, shopping list and recipe cards
    Plan(PlanArgs),
    /// Rate a cooked recipe 1..5
    Rate(RateArgs),
    /// Show recent plans
    History(HistoryArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Weekly budget in USD
    #[arg(long, default_value_t = 100.0, value_parser = parse_budget)]
    pub budget: f64,

    /// Output directory
    #[arg(long, default_value = "out")]
    pub out: PathBuf,

    /// SQLite database path; enables history, ratings and plan saving
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Week start date, YYYY-MM-DD (default: today)
    #[arg(long, value_parser = parse_date)]
    pub week_start: Option<NaiveDate>,

    /// Avoid recipes planned within this many weeks (requires --db, max 520)
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(0..=520))]
    pub no_repeat_weeks: u32,

    /// Disable generated recipe proposals for this run
    #[arg(long)]
    pub no_llm: bool,

    /// Minimum generated recipes to include when available
    #[arg(long, default_value_t = 2)]
    pub min_llm: usize,

    /// Random seed for tie-breaks
    #[arg(long)]
    pub seed: Option<u64>,

    /// Strength of the ratings bias
    #[arg(long, default_value_t = 1.2)]
    pub rating_weight: f64,

    /// Block recipes rated 2 stars or lower in the last N weeks (0 disables, max 520)
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(0..=520))]
    pub block_low_rated_weeks: u32,
}

#[derive(Args, Debug, Clone)]
pub struct RateArgs {
    /// SQLite database path
    #[arg(long)]
    pub db: PathBuf,

    /// Recipe id to rate
    #[arg(long)]
    pub recipe_id: String,

    /// 1..5 stars
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub rating: u8,

    /// Cooked on, YYYY-MM-DD (default: today)
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Optional comments
    #[arg(long)]
    pub comments: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// SQLite database path
    #[arg(long)]
    pub db: PathBuf,

    /// How many recent plans to show
    #[arg(long, default_value_t = 6)]
    pub weeks: u32,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("'{s}' must be YYYY-MM-DD"))
}

fn parse_budget(s: &str) -> Result<f64, String> {
    let budget: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if budget > 0.0 && budget.is_finite() {
        Ok(budget)
    } else {
        Err("budget must be > 0".to_string())
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
