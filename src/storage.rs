use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{anyhow, ensure, Context, Result};
use chrono::{Days, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::planner::{Day, RatingSignals, WeekPlan};
use crate::recipe::Recipe;

/// Ratings at or below this count as "low" for the temporary ban.
pub const LOW_RATING_THRESHOLD: u8 = 2;

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS recipes (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  source TEXT NOT NULL CHECK (source IN ('curated','llm')),
  minutes INTEGER,
  method TEXT,
  protein_g REAL,
  fiber_g REAL,
  kcals REAL,
  cost_usd REAL,
  tags TEXT,
  ingredients_json TEXT,
  instructions_md TEXT
);

CREATE TABLE IF NOT EXISTS plans (
  plan_id TEXT PRIMARY KEY,
  week_start DATE NOT NULL,
  people INTEGER NOT NULL,
  budget_usd REAL NOT NULL,
  total_cost_usd REAL,
  total_protein_g REAL,
  total_fiber_g REAL
);

CREATE TABLE IF NOT EXISTS plan_items (
  plan_id TEXT NOT NULL,
  day_index INTEGER NOT NULL CHECK (day_index BETWEEN 0 AND 6),
  recipe_id TEXT NOT NULL,
  PRIMARY KEY (plan_id, day_index),
  FOREIGN KEY (plan_id) REFERENCES plans(plan_id) ON DELETE CASCADE,
  FOREIGN KEY (recipe_id) REFERENCES recipes(id) ON DELETE RESTRICT
);

CREATE TABLE IF NOT EXISTS ratings (
  recipe_id TEXT NOT NULL,
  cooked_on DATE NOT NULL,
  rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
  comments TEXT,
  PRIMARY KEY (recipe_id, cooked_on),
  FOREIGN KEY (recipe_id) REFERENCES recipes(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_plans_week_start ON plans(week_start);
CREATE INDEX IF NOT EXISTS idx_plan_items_recipe ON plan_items(recipe_id);
CREATE INDEX IF NOT EXISTS idx_ratings_recipe ON ratings(recipe_id);
";

const UPSERT_RECIPE_SQL: &str = r"
INSERT INTO recipes (id, name, source, minutes, method,
                     protein_g, fiber_g, kcals, cost_usd,
                     tags, ingredients_json, instructions_md)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
ON CONFLICT(id) DO UPDATE SET
    name = excluded.name,
    source = excluded.source,
    minutes = excluded.minutes,
    method = excluded.method,
    protein_g = excluded.protein_g,
    fiber_g = excluded.fiber_g,
    kcals = excluded.kcals,
    cost_usd = excluded.cost_usd,
    tags = excluded.tags,
    ingredients_json = excluded.ingredients_json,
    instructions_md = COALESCE(excluded.instructions_md, instructions_md)
";

/// How far back the recency and low-rating exclusions reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub no_repeat_weeks: u32,
    pub block_low_rated_weeks: u32,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self {
            no_repeat_weeks: 4,
            block_low_rated_weeks: 4,
        }
    }
}

/// Everything the planner reads from history for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySnapshot {
    pub exclude_ids: HashSet<String>,
    pub ratings: RatingSignals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanHistoryItem {
    pub day: Day,
    pub recipe_id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanHistory {
    pub plan_id: String,
    pub week_start: NaiveDate,
    pub total_cost_usd: f64,
    pub total_protein_g: f64,
    pub total_fiber_g: f64,
    pub items: Vec<PlanHistoryItem>,
}

pub struct SqliteStore {
    conn: Connection,
}

/// First day of a look-back window of `days` ending at `as_of`.
fn window_start(as_of: NaiveDate, days: u64) -> Result<NaiveDate> {
    as_of
        .checked_sub_days(Days::new(days))
        .ok_or_else(|| anyhow!("look-back window of {days} days from {as_of} is out of range"))
}

impl SqliteStore {
    /// Opens (creating if needed) and migrates the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .context("failed to configure sqlite pragmas")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("failed to configure sqlite pragmas")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Creates missing tables and adds columns introduced after the first release.
    pub fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA_SQL)
            .context("failed to apply schema")?;
        if !table_has_column(&self.conn, "recipes", "instructions_md")? {
            self.conn
                .execute_batch("ALTER TABLE recipes ADD COLUMN instructions_md TEXT;")
                .context("failed to add recipes.instructions_md")?;
        }
        Ok(())
    }

    pub fn upsert_recipes<'a>(&mut self, recipes: impl IntoIterator<Item = &'a Recipe>) -> Result<usize> {
        let tx = self.conn.transaction().context("failed to start recipe upsert")?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(UPSERT_RECIPE_SQL)?;
            for r in recipes {
                let ingredients_json = serde_json::to_string(&r.ingredients)
                    .with_context(|| format!("failed to encode ingredients for {}", r.id))?;
                stmt.execute(params![
                    r.id,
                    r.name,
                    r.source.as_str(),
                    r.minutes,
                    r.method,
                    r.macros.protein_g,
                    r.macros.fiber_g,
                    r.macros.kcals,
                    r.cost_usd,
                    r.tags.join(","),
                    ingredients_json,
                    r.instructions_md,
                ])
                .with_context(|| format!("failed to upsert recipe {}", r.id))?;
                written += 1;
            }
        }
        tx.commit().context("failed to commit recipe upsert")?;
        debug!(written, "upserted recipes");
        Ok(written)
    }

    pub fn stored_instructions(&self, recipe_id: &str) -> Result<Option<String>> {
        let md = self
            .conn
            .query_row(
                "SELECT instructions_md FROM recipes WHERE id = ?1",
                params![recipe_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(md.flatten())
    }

    /// Persists a plan and its seven items; returns the new plan id.
    pub fn save_plan(
        &mut self,
        week_start: NaiveDate,
        people: u32,
        budget_usd: f64,
        plan: &WeekPlan,
    ) -> Result<String> {
        let plan_id = Uuid::new_v4().simple().to_string();
        let tx = self.conn.transaction().context("failed to start plan transaction")?;
        tx.execute(
            "INSERT INTO plans (plan_id, week_start, people, budget_usd,
                                total_cost_usd, total_protein_g, total_fiber_g)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                plan_id,
                week_start.to_string(),
                people,
                budget_usd,
                plan.total_cost_usd,
                plan.protein_g_total,
                plan.fiber_g_total,
            ],
        )
        .context("failed to insert plan")?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO plan_items (plan_id, day_index, recipe_id) VALUES (?1, ?2, ?3)")?;
            for item in &plan.items {
                stmt.execute(params![plan_id, item.day.index() as i64, item.recipe_id])
                    .with_context(|| format!("failed to insert plan item for {}", item.day))?;
            }
        }
        tx.commit().context("failed to commit plan")?;
        Ok(plan_id)
    }

    pub fn add_rating(
        &self,
        recipe_id: &str,
        cooked_on: NaiveDate,
        rating: u8,
        comments: Option<&str>,
    ) -> Result<()> {
        ensure!((1..=5).contains(&rating), "rating must be between 1 and 5");
        self.conn
            .execute(
                "INSERT INTO ratings (recipe_id, cooked_on, rating, comments)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(recipe_id, cooked_on) DO UPDATE SET
                     rating = excluded.rating,
                     comments = COALESCE(excluded.comments, comments)",
                params![recipe_id, cooked_on.to_string(), rating, comments],
            )
            .with_context(|| format!("failed to rate {recipe_id}; is it a known recipe id?"))?;
        Ok(())
    }

    /// Recipes planned for weeks starting within `days` of `as_of`.
    pub fn recent_recipe_ids(&self, days: u32, as_of: NaiveDate) -> Result<Vec<String>> {
        let cutoff = window_start(as_of, u64::from(days))?;
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT pi.recipe_id
             FROM plan_items pi
             JOIN plans p ON p.plan_id = pi.plan_id
             WHERE date(p.week_start) >= date(?1)
             ORDER BY pi.recipe_id",
        )?;
        let ids = stmt
            .query_map(params![cutoff.to_string()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Recipes rated at or below `threshold` within the last `weeks` weeks.
    pub fn recent_low_rated(&self, weeks: u32, threshold: u8, as_of: NaiveDate) -> Result<Vec<String>> {
        if weeks == 0 {
            return Ok(Vec::new());
        }
        let cutoff = window_start(as_of, 7 * u64::from(weeks))?;
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT recipe_id
             FROM ratings
             WHERE rating <= ?1 AND date(cooked_on) >= date(?2)
             ORDER BY recipe_id",
        )?;
        let ids = stmt
            .query_map(params![threshold, cutoff.to_string()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    pub fn average_ratings(&self) -> Result<HashMap<String, f64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT recipe_id, AVG(rating) FROM ratings GROUP BY recipe_id")?;
        let map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(map)
    }

    pub fn rating_counts(&self) -> Result<HashMap<String, u32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT recipe_id, COUNT(*) FROM ratings GROUP BY recipe_id")?;
        let map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(map)
    }

    pub fn history_snapshot(&self, window: HistoryWindow, as_of: NaiveDate) -> Result<HistorySnapshot> {
        let mut exclude_ids = HashSet::new();
        if window.no_repeat_weeks > 0 {
            let days = window.no_repeat_weeks.checked_mul(7).ok_or_else(|| {
                anyhow!("no-repeat window of {} weeks is too long", window.no_repeat_weeks)
            })?;
            exclude_ids.extend(self.recent_recipe_ids(days, as_of)?);
        }
        exclude_ids.extend(self.recent_low_rated(
            window.block_low_rated_weeks,
            LOW_RATING_THRESHOLD,
            as_of,
        )?);
        Ok(HistorySnapshot {
            exclude_ids,
            ratings: RatingSignals::new(self.average_ratings()?, self.rating_counts()?),
        })
    }

    /// The `limit` most recent plans, newest first.
    pub fn recent_plans(&self, limit: u32) -> Result<Vec<PlanHistory>> {
        let mut plan_stmt = self.conn.prepare(
            "SELECT plan_id, week_start, total_cost_usd, total_protein_g, total_fiber_g
             FROM plans
             ORDER BY date(week_start) DESC, rowid DESC
             LIMIT ?1",
        )?;
        let rows = plan_stmt
            .query_map(params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                    row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                    row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut item_stmt = self.conn.prepare(
            "SELECT pi.day_index, pi.recipe_id, r.name
             FROM plan_items pi
             LEFT JOIN recipes r ON r.id = pi.recipe_id
             WHERE pi.plan_id = ?1
             ORDER BY pi.day_index",
        )?;

        let mut plans = Vec::with_capacity(rows.len());
        for (plan_id, week_start, total_cost_usd, total_protein_g, total_fiber_g) in rows {
            let week_start = NaiveDate::parse_from_str(&week_start, "%Y-%m-%d")
                .with_context(|| format!("plan {plan_id} has invalid week_start '{week_start}'"))?;
            let raw_items = item_stmt
                .query_map(params![plan_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let items = raw_items
                .into_iter()
                .map(|(day_index, recipe_id, name)| {
                    let day = usize::try_from(day_index)
                        .ok()
                        .and_then(Day::from_index)
                        .ok_or_else(|| anyhow!("plan {plan_id} has invalid day_index {day_index}"))?;
                    Ok(PlanHistoryItem { day, recipe_id, name })
                })
                .collect::<Result<Vec<_>>>()?;
            plans.push(PlanHistory {
                plan_id,
                week_start,
                total_cost_usd,
                total_protein_g,
                total_fiber_g,
                items,
            });
        }
        Ok(plans)
    }
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("failed to inspect table_info for {table}"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{PlanItem, PlanMeta};
    use crate::recipe::{Macros, Source};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn recipe(id: &str) -> Recipe {
        Recipe {
            id: id.to_string(),
            name: format!("Dish {id}"),
            tags: vec!["mild".to_string(), "quick".to_string()],
            method: "oven".to_string(),
            minutes: 30,
            ingredients: vec![],
            macros: Macros {
                protein_g: 45.0,
                fiber_g: 7.0,
                kcals: 600.0,
            },
            cost_usd: 10.0,
            source: Source::Curated,
            instructions_md: None,
        }
    }

    fn seeded_store(ids: &[&str]) -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let recipes: Vec<Recipe> = ids.iter().map(|id| recipe(id)).collect();
        store.upsert_recipes(&recipes).unwrap();
        store
    }

    fn plan(ids: &[&str]) -> WeekPlan {
        WeekPlan {
            items: Day::ALL
                .iter()
                .zip(ids)
                .map(|(day, id)| PlanItem {
                    day: *day,
                    recipe_id: id.to_string(),
                })
                .collect(),
            total_cost_usd: 70.0,
            protein_g_total: 315.0,
            fiber_g_total: 49.0,
            meta: PlanMeta::default(),
        }
    }

    const WEEK: [&str; 7] = ["a", "b", "c", "d", "e", "f", "g"];

    #[test]
    fn test_upsert_keeps_existing_instructions() {
        let mut store = seeded_store(&["a"]);
        let mut with_md = recipe("a");
        with_md.instructions_md = Some("# Dish a".to_string());
        store.upsert_recipes([&with_md]).unwrap();
        store.upsert_recipes([&recipe("a")]).unwrap();
        assert_eq!(store.stored_instructions("a").unwrap().as_deref(), Some("# Dish a"));
        assert_eq!(store.stored_instructions("missing").unwrap(), None);
    }

    #[test]
    fn test_ratings_average_and_count() {
        let store = seeded_store(&["a", "b"]);
        store.add_rating("a", date("2026-10-01"), 5, None).unwrap();
        store.add_rating("a", date("2026-10-08"), 4, Some("good")).unwrap();
        store.add_rating("b", date("2026-10-08"), 2, None).unwrap();
        // Same day re-rating overwrites.
        store.add_rating("b", date("2026-10-08"), 1, None).unwrap();

        let avg = store.average_ratings().unwrap();
        let count = store.rating_counts().unwrap();
        assert_eq!(avg["a"], 4.5);
        assert_eq!(avg["b"], 1.0);
        assert_eq!(count["a"], 2);
        assert_eq!(count["b"], 1);
    }

    #[test]
    fn test_rating_bounds_and_unknown_recipe() {
        let store = seeded_store(&["a"]);
        assert!(store.add_rating("a", date("2026-10-01"), 0, None).is_err());
        assert!(store.add_rating("a", date("2026-10-01"), 6, None).is_err());
        assert!(store.add_rating("nope", date("2026-10-01"), 3, None).is_err());
    }

    #[test]
    fn test_recent_low_rated_window() {
        let store = seeded_store(&["a", "b", "c"]);
        let today = date("2026-10-19");
        store.add_rating("a", date("2026-10-10"), 2, None).unwrap();
        store.add_rating("b", date("2026-08-01"), 1, None).unwrap();
        store.add_rating("c", date("2026-10-12"), 4, None).unwrap();
        assert_eq!(store.recent_low_rated(4, 2, today).unwrap(), vec!["a".to_string()]);
        assert!(store.recent_low_rated(0, 2, today).unwrap().is_empty());
    }

    #[test]
    fn test_save_plan_and_history() {
        let mut store = seeded_store(&WEEK);
        let older = store.save_plan(date("2026-09-01"), 2, 100.0, &plan(&WEEK)).unwrap();
        let newer = store.save_plan(date("2026-10-12"), 2, 100.0, &plan(&WEEK)).unwrap();
        assert_eq!(newer.len(), 32);

        let history = store.recent_plans(6).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].plan_id, newer);
        assert_eq!(history[1].plan_id, older);
        assert_eq!(history[0].items.len(), 7);
        assert_eq!(history[0].items[6].day, Day::Sun);
        assert_eq!(history[0].items[0].name.as_deref(), Some("Dish a"));
        assert_eq!(store.recent_plans(1).unwrap().len(), 1);
    }

    #[test]
    fn test_history_snapshot_combines_exclusions() {
        let mut ids: Vec<&str> = WEEK.to_vec();
        ids.push("h");
        let mut store = seeded_store(&ids);
        let today = date("2026-10-19");
        store.save_plan(date("2026-10-05"), 2, 100.0, &plan(&WEEK)).unwrap();
        store.add_rating("h", date("2026-10-15"), 1, None).unwrap();
        store.add_rating("a", date("2026-10-06"), 5, None).unwrap();

        let snapshot = store.history_snapshot(HistoryWindow::default(), today).unwrap();
        assert_eq!(snapshot.exclude_ids.len(), 8);
        assert!(snapshot.exclude_ids.contains("h"));
        assert_eq!(snapshot.ratings.count["a"], 1);

        let relaxed = HistoryWindow {
            no_repeat_weeks: 0,
            block_low_rated_weeks: 0,
        };
        let snapshot = store.history_snapshot(relaxed, today).unwrap();
        assert!(snapshot.exclude_ids.is_empty());
    }

    #[test]
    fn test_oversized_windows_are_errors() {
        let store = seeded_store(&["a"]);
        let today = date("2026-10-19");

        let huge_repeat = HistoryWindow {
            no_repeat_weeks: 700_000_000,
            block_low_rated_weeks: 0,
        };
        let err = store.history_snapshot(huge_repeat, today).unwrap_err();
        assert!(err.to_string().contains("no-repeat window"));

        let huge_block = HistoryWindow {
            no_repeat_weeks: 0,
            block_low_rated_weeks: u32::MAX,
        };
        assert!(store.history_snapshot(huge_block, today).is_err());
        assert!(store.recent_recipe_ids(u32::MAX, today).is_err());

        // Ten years back is still a valid window.
        assert!(store.recent_low_rated(520, 2, today).unwrap().is_empty());
    }

    #[test]
    fn test_open_file_database_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meals.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.upsert_recipes([&recipe("a")]).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(table_has_column(&store.conn, "recipes", "instructions_md").unwrap());
        store.add_rating("a", date("2026-10-01"), 3, None).unwrap();
    }
}
