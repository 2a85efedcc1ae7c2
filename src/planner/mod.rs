pub mod scoring;
pub mod selection;
pub mod week;

pub use scoring::{protein_group, score, RatingSignals, SelectionState};
pub use selection::greedy_pick;
pub use week::{plan_week, Day, PlanError, PlanItem, PlanMeta, PlanRequest, WeekPlan, DAYS_PER_WEEK};
