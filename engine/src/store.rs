//! Entity Store — SQLite persistence for the habit engine
//!
//! Five tables: goals, systems, micro_actions, daily_logs, completed_actions.
//! Two composite uniqueness invariants do the heavy lifting:
//! - one DailyLog per (user, date)
//! - one CompletedAction per (daily_log, micro_action)
//!
//! Duplicate writes fail with `EngineError::Conflict`, which callers treat
//! as "already recorded". The completed_actions ledger is append-only:
//! streaks and stats are derived from history on read, never cached.

use chrono::{Datelike, NaiveDate, Weekday};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::EngineError;
use crate::generator::RitualPlan;

/// Which variant of a micro-action was completed. Fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionVersion {
    Ideal,
    BadDay,
}

impl ActionVersion {
    /// Completion-time policy: a "hard" day records the minimum-viable
    /// variant, anything else records the full version.
    pub fn from_mood(mood: &str) -> Self {
        if mood == "hard" {
            ActionVersion::BadDay
        } else {
            ActionVersion::Ideal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionVersion::Ideal => "ideal",
            ActionVersion::BadDay => "bad_day",
        }
    }

    fn from_db(raw: &str) -> Self {
        if raw == "bad_day" {
            ActionVersion::BadDay
        } else {
            ActionVersion::Ideal
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub pillar: String,
    pub status: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct System {
    pub id: String,
    pub goal_id: String,
    pub title: String,
    pub description: String,
    /// "daily" or a comma-separated set of weekday tokens (mon..sun)
    pub frequency: String,
    pub time_of_day: String,
    pub created_at: i64,
}

impl System {
    /// Applies the frequency to a calendar date.
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        if self.frequency == "daily" {
            return true;
        }
        let token = weekday_token(date);
        self.frequency.split(',').any(|t| t.trim() == token)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MicroAction {
    pub id: String,
    pub system_id: String,
    pub action_ideal: String,
    pub action_bad_day: String,
    pub duration_minutes: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyLog {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub mood: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedAction {
    pub id: String,
    pub daily_log_id: String,
    pub micro_action_id: String,
    pub version_completed: ActionVersion,
    pub completed_at: i64,
}

/// A goal with its systems and their micro-actions eagerly loaded.
#[derive(Debug, Clone)]
pub struct GoalBundle {
    pub goal: Goal,
    pub systems: Vec<SystemBundle>,
}

#[derive(Debug, Clone)]
pub struct SystemBundle {
    pub system: System,
    pub actions: Vec<MicroAction>,
}

/// Ids created by an atomic goal+system+actions insert.
#[derive(Debug, Clone)]
pub struct CreatedRitual {
    pub goal_id: String,
    pub system_id: String,
    pub action_ids: Vec<String>,
}

/// SQLite-backed entity store
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn new(db_path: &str) -> Result<Self, EngineError> {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::Storage(e.to_string()))?;
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS goals (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                pillar TEXT NOT NULL DEFAULT 'general',
                status TEXT NOT NULL DEFAULT 'active',
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS systems (
                id TEXT PRIMARY KEY,
                goal_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                frequency TEXT NOT NULL DEFAULT 'daily',
                time_of_day TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                FOREIGN KEY (goal_id) REFERENCES goals(id)
            );

            CREATE TABLE IF NOT EXISTS micro_actions (
                id TEXT PRIMARY KEY,
                system_id TEXT NOT NULL,
                action_ideal TEXT NOT NULL,
                action_bad_day TEXT NOT NULL,
                duration_minutes INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (system_id) REFERENCES systems(id)
            );

            CREATE TABLE IF NOT EXISTS daily_logs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                mood TEXT NOT NULL DEFAULT 'normal',
                created_at INTEGER NOT NULL,
                UNIQUE (user_id, date)
            );

            CREATE TABLE IF NOT EXISTS completed_actions (
                id TEXT PRIMARY KEY,
                daily_log_id TEXT NOT NULL,
                micro_action_id TEXT NOT NULL,
                version_completed TEXT NOT NULL,
                completed_at INTEGER NOT NULL,
                UNIQUE (daily_log_id, micro_action_id),
                FOREIGN KEY (daily_log_id) REFERENCES daily_logs(id),
                FOREIGN KEY (micro_action_id) REFERENCES micro_actions(id)
            );

            CREATE INDEX IF NOT EXISTS idx_goals_user ON goals(user_id, status);
            CREATE INDEX IF NOT EXISTS idx_systems_goal ON systems(goal_id);
            CREATE INDEX IF NOT EXISTS idx_actions_system ON micro_actions(system_id);
            CREATE INDEX IF NOT EXISTS idx_completed_log ON completed_actions(daily_log_id);
            CREATE INDEX IF NOT EXISTS idx_completed_action ON completed_actions(micro_action_id);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, EngineError> {
        self.conn
            .lock()
            .map_err(|e| EngineError::Storage(format!("lock error: {e}")))
    }

    /// Creates a Goal, its System, and the System's MicroActions in one
    /// transaction. The free-plan cap on active goals is checked inside the
    /// transaction so two concurrent creations cannot both pass it.
    pub fn create_ritual(
        &self,
        user_id: &str,
        goal_title: &str,
        pillar: &str,
        plan: &RitualPlan,
        active_goal_limit: u32,
    ) -> Result<CreatedRitual, EngineError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(EngineError::from)?;
        let now = chrono::Utc::now().timestamp();

        let active: i64 = tx.query_row(
            "SELECT COUNT(*) FROM goals WHERE user_id = ?1 AND status = 'active'",
            params![user_id],
            |row| row.get(0),
        )?;
        if active >= active_goal_limit as i64 {
            return Err(EngineError::PlanLimitExceeded);
        }

        let goal_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO goals (id, user_id, title, pillar, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'active', ?5)",
            params![goal_id, user_id, goal_title, pillar, now],
        )?;

        let system_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO systems (id, goal_id, title, description, frequency, time_of_day, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                system_id,
                goal_id,
                plan.system_title,
                plan.description,
                plan.frequency,
                plan.time_of_day,
                now,
            ],
        )?;

        let mut action_ids = Vec::with_capacity(plan.micro_actions.len());
        for action in &plan.micro_actions {
            let action_id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO micro_actions (id, system_id, action_ideal, action_bad_day, duration_minutes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    action_id,
                    system_id,
                    action.action_ideal,
                    action.action_bad_day,
                    action.duration_minutes,
                    now,
                ],
            )?;
            action_ids.push(action_id);
        }

        tx.commit().map_err(EngineError::from)?;

        Ok(CreatedRitual {
            goal_id,
            system_id,
            action_ids,
        })
    }

    /// Active goals for a user, with systems and micro-actions eagerly
    /// loaded, all ordered by creation.
    pub fn active_goals(&self, user_id: &str) -> Result<Vec<GoalBundle>, EngineError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, pillar, status, created_at
             FROM goals WHERE user_id = ?1 AND status = 'active'
             ORDER BY created_at ASC",
        )?;
        let goals: Vec<Goal> = stmt
            .query_map(params![user_id], |row| {
                Ok(Goal {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    title: row.get(2)?,
                    pillar: row.get(3)?,
                    status: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        let mut bundles = Vec::with_capacity(goals.len());
        for goal in goals {
            let mut sys_stmt = conn.prepare(
                "SELECT id, goal_id, title, description, frequency, time_of_day, created_at
                 FROM systems WHERE goal_id = ?1 ORDER BY created_at ASC",
            )?;
            let systems: Vec<System> = sys_stmt
                .query_map(params![goal.id], |row| {
                    Ok(System {
                        id: row.get(0)?,
                        goal_id: row.get(1)?,
                        title: row.get(2)?,
                        description: row.get(3)?,
                        frequency: row.get(4)?,
                        time_of_day: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<rusqlite::Result<_>>()?;

            let mut system_bundles = Vec::with_capacity(systems.len());
            for system in systems {
                let mut act_stmt = conn.prepare(
                    "SELECT id, system_id, action_ideal, action_bad_day, duration_minutes, created_at
                     FROM micro_actions WHERE system_id = ?1 ORDER BY created_at ASC, rowid ASC",
                )?;
                let actions: Vec<MicroAction> = act_stmt
                    .query_map(params![system.id], |row| {
                        Ok(MicroAction {
                            id: row.get(0)?,
                            system_id: row.get(1)?,
                            action_ideal: row.get(2)?,
                            action_bad_day: row.get(3)?,
                            duration_minutes: row.get(4)?,
                            created_at: row.get(5)?,
                        })
                    })?
                    .collect::<rusqlite::Result<_>>()?;
                system_bundles.push(SystemBundle { system, actions });
            }

            bundles.push(GoalBundle {
                goal,
                systems: system_bundles,
            });
        }

        Ok(bundles)
    }

    pub fn micro_action(&self, action_id: &str) -> Result<Option<MicroAction>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, system_id, action_ideal, action_bad_day, duration_minutes, created_at
             FROM micro_actions WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![action_id], |row| {
            Ok(MicroAction {
                id: row.get(0)?,
                system_id: row.get(1)?,
                action_ideal: row.get(2)?,
                action_bad_day: row.get(3)?,
                duration_minutes: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        rows.next().transpose().map_err(EngineError::from)
    }

    pub fn daily_log(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyLog>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, date, mood, created_at
             FROM daily_logs WHERE user_id = ?1 AND date = ?2",
        )?;
        let mut rows = stmt.query_map(params![user_id, iso_date(date)], |row| {
            let raw: String = row.get(2)?;
            Ok(DailyLog {
                id: row.get(0)?,
                user_id: row.get(1)?,
                date: parse_date(2, &raw)?,
                mood: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        rows.next().transpose().map_err(EngineError::from)
    }

    /// Fails with `Conflict` when a log already exists for (user, date).
    pub fn create_daily_log(
        &self,
        user_id: &str,
        date: NaiveDate,
        mood: &str,
    ) -> Result<DailyLog, EngineError> {
        let conn = self.lock()?;
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO daily_logs (id, user_id, date, mood, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, user_id, iso_date(date), mood, now],
        )?;
        Ok(DailyLog {
            id,
            user_id: user_id.to_string(),
            date,
            mood: mood.to_string(),
            created_at: now,
        })
    }

    /// Fails with `Conflict` when the (daily_log, micro_action) pair already
    /// has a completion. The ledger is append-only; rows are never updated.
    pub fn insert_completion(
        &self,
        daily_log_id: &str,
        micro_action_id: &str,
        version: ActionVersion,
    ) -> Result<CompletedAction, EngineError> {
        let conn = self.lock()?;
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO completed_actions (id, daily_log_id, micro_action_id, version_completed, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, daily_log_id, micro_action_id, version.as_str(), now],
        )?;
        Ok(CompletedAction {
            id,
            daily_log_id: daily_log_id.to_string(),
            micro_action_id: micro_action_id.to_string(),
            version_completed: version,
            completed_at: now,
        })
    }

    pub fn completion_for(
        &self,
        daily_log_id: &str,
        micro_action_id: &str,
    ) -> Result<Option<CompletedAction>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, daily_log_id, micro_action_id, version_completed, completed_at
             FROM completed_actions WHERE daily_log_id = ?1 AND micro_action_id = ?2",
        )?;
        let mut rows = stmt.query_map(params![daily_log_id, micro_action_id], |row| {
            let version: String = row.get(3)?;
            Ok(CompletedAction {
                id: row.get(0)?,
                daily_log_id: row.get(1)?,
                micro_action_id: row.get(2)?,
                version_completed: ActionVersion::from_db(&version),
                completed_at: row.get(4)?,
            })
        })?;
        rows.next().transpose().map_err(EngineError::from)
    }

    pub fn completions_for_log(
        &self,
        daily_log_id: &str,
    ) -> Result<Vec<CompletedAction>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, daily_log_id, micro_action_id, version_completed, completed_at
             FROM completed_actions WHERE daily_log_id = ?1 ORDER BY completed_at ASC",
        )?;
        let completions = stmt
            .query_map(params![daily_log_id], |row| {
                let version: String = row.get(3)?;
                Ok(CompletedAction {
                    id: row.get(0)?,
                    daily_log_id: row.get(1)?,
                    micro_action_id: row.get(2)?,
                    version_completed: ActionVersion::from_db(&version),
                    completed_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;
        Ok(completions)
    }

    /// Distinct dates on which at least one of the system's micro-actions
    /// was completed by the user. Feeds the streak walk.
    pub fn completion_dates_for_system(
        &self,
        user_id: &str,
        system_id: &str,
    ) -> Result<HashSet<NaiveDate>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT dl.date
             FROM completed_actions ca
             JOIN daily_logs dl ON dl.id = ca.daily_log_id
             JOIN micro_actions ma ON ma.id = ca.micro_action_id
             WHERE dl.user_id = ?1 AND ma.system_id = ?2",
        )?;
        let dates = stmt
            .query_map(params![user_id, system_id], |row| {
                let raw: String = row.get(0)?;
                parse_date(0, &raw)
            })?
            .collect::<rusqlite::Result<_>>()?;
        Ok(dates)
    }

    /// Per-day completion counts for the user over [start, end]. Days with
    /// no activity are absent; the aggregator zero-fills.
    pub fn daily_completion_counts(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<NaiveDate, i64>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT dl.date, COUNT(ca.id)
             FROM completed_actions ca
             JOIN daily_logs dl ON dl.id = ca.daily_log_id
             WHERE dl.user_id = ?1 AND dl.date >= ?2 AND dl.date <= ?3
             GROUP BY dl.date",
        )?;
        let counts = stmt
            .query_map(
                params![user_id, iso_date(start), iso_date(end)],
                |row| {
                    let raw: String = row.get(0)?;
                    Ok((parse_date(0, &raw)?, row.get::<_, i64>(1)?))
                },
            )?
            .collect::<rusqlite::Result<_>>()?;
        Ok(counts)
    }

    /// Micro-action ids the user completed on the given date.
    pub fn completed_action_ids_on(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<HashSet<String>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT ca.micro_action_id
             FROM completed_actions ca
             JOIN daily_logs dl ON dl.id = ca.daily_log_id
             WHERE dl.user_id = ?1 AND dl.date = ?2",
        )?;
        let ids = stmt
            .query_map(params![user_id, iso_date(date)], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        Ok(ids)
    }
}

fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn weekday_token(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::fallback_ritual;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn store_with_ritual() -> (Store, CreatedRitual) {
        let store = Store::new(":memory:").unwrap();
        let plan = fallback_ritual("Run 5km");
        let created = store
            .create_ritual("user-1", "Run 5km", "health", &plan, 1)
            .unwrap();
        (store, created)
    }

    #[test]
    fn test_create_ritual_and_fetch_active_goals() {
        let (store, created) = store_with_ritual();

        let bundles = store.active_goals("user-1").unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].goal.title, "Run 5km");
        assert_eq!(bundles[0].goal.pillar, "health");
        assert_eq!(bundles[0].goal.status, "active");
        assert_eq!(bundles[0].systems.len(), 1);

        let system = &bundles[0].systems[0];
        assert_eq!(system.system.id, created.system_id);
        assert_eq!(system.actions.len(), 1);
        assert_eq!(system.actions[0].id, created.action_ids[0]);
        assert!(system.actions[0].duration_minutes > 0);
    }

    #[test]
    fn test_active_goal_limit_enforced() {
        let (store, _) = store_with_ritual();
        let plan = fallback_ritual("Read more");
        let err = store
            .create_ritual("user-1", "Read more", "mind", &plan, 1)
            .unwrap_err();
        assert!(matches!(err, EngineError::PlanLimitExceeded));

        // Other users are unaffected
        store
            .create_ritual("user-2", "Read more", "mind", &plan, 1)
            .unwrap();
    }

    #[test]
    fn test_higher_limit_allows_more_goals() {
        let (store, _) = store_with_ritual();
        let plan = fallback_ritual("Read more");
        store
            .create_ritual("user-1", "Read more", "mind", &plan, 3)
            .unwrap();
        assert_eq!(store.active_goals("user-1").unwrap().len(), 2);
    }

    #[test]
    fn test_daily_log_unique_per_user_and_date() {
        let store = Store::new(":memory:").unwrap();
        let d = date("2026-08-06");
        store.create_daily_log("user-1", d, "normal").unwrap();

        let err = store.create_daily_log("user-1", d, "hard").unwrap_err();
        assert!(matches!(err, EngineError::Conflict));

        // Same date for another user is fine
        store.create_daily_log("user-2", d, "normal").unwrap();
        // Another date for the same user is fine
        store
            .create_daily_log("user-1", date("2026-08-07"), "normal")
            .unwrap();

        let log = store.daily_log("user-1", d).unwrap().unwrap();
        assert_eq!(log.mood, "normal");
    }

    #[test]
    fn test_completed_action_unique_per_log_and_action() {
        let (store, created) = store_with_ritual();
        let log = store
            .create_daily_log("user-1", date("2026-08-06"), "normal")
            .unwrap();

        store
            .insert_completion(&log.id, &created.action_ids[0], ActionVersion::Ideal)
            .unwrap();
        let err = store
            .insert_completion(&log.id, &created.action_ids[0], ActionVersion::BadDay)
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict));

        let completions = store.completions_for_log(&log.id).unwrap();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].version_completed, ActionVersion::Ideal);
    }

    #[test]
    fn test_completion_requires_existing_log_and_action() {
        let (store, created) = store_with_ritual();
        let log = store
            .create_daily_log("user-1", date("2026-08-06"), "normal")
            .unwrap();

        let err = store
            .insert_completion("no-such-log", &created.action_ids[0], ActionVersion::Ideal)
            .unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));

        let err = store
            .insert_completion(&log.id, "no-such-action", ActionVersion::Ideal)
            .unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
    }

    #[test]
    fn test_micro_action_lookup() {
        let (store, created) = store_with_ritual();
        let action = store.micro_action(&created.action_ids[0]).unwrap().unwrap();
        assert_eq!(action.system_id, created.system_id);
        assert!(store.micro_action("missing").unwrap().is_none());
    }

    #[test]
    fn test_completion_dates_for_system() {
        let (store, created) = store_with_ritual();
        for day in ["2026-08-04", "2026-08-05"] {
            let log = store.create_daily_log("user-1", date(day), "normal").unwrap();
            store
                .insert_completion(&log.id, &created.action_ids[0], ActionVersion::Ideal)
                .unwrap();
        }

        let dates = store
            .completion_dates_for_system("user-1", &created.system_id)
            .unwrap();
        assert_eq!(dates.len(), 2);
        assert!(dates.contains(&date("2026-08-04")));
        assert!(dates.contains(&date("2026-08-05")));

        // Another user's history does not leak in
        let dates = store
            .completion_dates_for_system("user-2", &created.system_id)
            .unwrap();
        assert!(dates.is_empty());
    }

    #[test]
    fn test_daily_completion_counts_windowed() {
        let (store, created) = store_with_ritual();
        let plan = fallback_ritual("Meditate");
        let other = store
            .create_ritual("user-1", "Meditate", "mind", &plan, 2)
            .unwrap();

        let log = store
            .create_daily_log("user-1", date("2026-08-05"), "normal")
            .unwrap();
        store
            .insert_completion(&log.id, &created.action_ids[0], ActionVersion::Ideal)
            .unwrap();
        store
            .insert_completion(&log.id, &other.action_ids[0], ActionVersion::Ideal)
            .unwrap();

        let outside = store
            .create_daily_log("user-1", date("2026-07-01"), "normal")
            .unwrap();
        store
            .insert_completion(&outside.id, &created.action_ids[0], ActionVersion::Ideal)
            .unwrap();

        let counts = store
            .daily_completion_counts("user-1", date("2026-07-31"), date("2026-08-06"))
            .unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[&date("2026-08-05")], 2);
    }

    #[test]
    fn test_completed_action_ids_on_date() {
        let (store, created) = store_with_ritual();
        let log = store
            .create_daily_log("user-1", date("2026-08-06"), "normal")
            .unwrap();
        store
            .insert_completion(&log.id, &created.action_ids[0], ActionVersion::BadDay)
            .unwrap();

        let ids = store
            .completed_action_ids_on("user-1", date("2026-08-06"))
            .unwrap();
        assert!(ids.contains(&created.action_ids[0]));
        let ids = store
            .completed_action_ids_on("user-1", date("2026-08-05"))
            .unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("engine.db");
        let db_path = db_path.to_str().unwrap();

        {
            let store = Store::new(db_path).unwrap();
            let plan = fallback_ritual("Run 5km");
            store
                .create_ritual("user-1", "Run 5km", "health", &plan, 1)
                .unwrap();
        }

        let store = Store::new(db_path).unwrap();
        let bundles = store.active_goals("user-1").unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].goal.title, "Run 5km");
    }

    #[test]
    fn test_is_due_on_daily_and_weekdays() {
        let mut system = System {
            id: "s".into(),
            goal_id: "g".into(),
            title: "t".into(),
            description: String::new(),
            frequency: "daily".into(),
            time_of_day: String::new(),
            created_at: 0,
        };
        // 2026-08-03 is a Monday
        assert!(system.is_due_on(date("2026-08-03")));
        assert!(system.is_due_on(date("2026-08-04")));

        system.frequency = "mon,wed,fri".into();
        assert!(system.is_due_on(date("2026-08-03")));
        assert!(!system.is_due_on(date("2026-08-04")));
        assert!(system.is_due_on(date("2026-08-05")));
    }

    #[test]
    fn test_action_version_from_mood() {
        assert_eq!(ActionVersion::from_mood("hard"), ActionVersion::BadDay);
        assert_eq!(ActionVersion::from_mood("normal"), ActionVersion::Ideal);
        assert_eq!(ActionVersion::from_mood(""), ActionVersion::Ideal);
        assert_eq!(ActionVersion::from_mood("great"), ActionVersion::Ideal);
    }
}
