//! Persistence boundary for plans and their steps.
//!
//! `plans`/`steps` storage is one of spec.md §6's external repository
//! contracts; the real database is out of scope. This module ships a
//! reference pair grounded in the teacher's `loom-workspace::Store`: a single
//! `rusqlite::Connection` behind a `std::sync::Mutex`, schema created with
//! `CREATE TABLE IF NOT EXISTS`, blocking calls wrapped in
//! `tokio::task::block_in_place`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use rusqlite::params;

use crate::plan::error::PlanError;
use crate::plan::model::{Plan, PlanEvent, Step};

/// Repository boundary for plan/step persistence and event logging.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>, PlanError>;
    async fn save_plan(&self, plan: &Plan) -> Result<(), PlanError>;
    async fn delete_plan(&self, plan_id: &str) -> Result<bool, PlanError>;
    async fn list_steps(&self, plan_id: &str) -> Result<Vec<Step>, PlanError>;
    async fn save_step(&self, step: &Step) -> Result<(), PlanError>;
    async fn log_event(&self, event: &PlanEvent) -> Result<(), PlanError>;
}

/// In-memory `PlanRepository`, keyed by plan id. Used by tests and as the
/// default when no durable store is configured.
#[derive(Default)]
pub struct InMemoryPlanRepository {
    plans: DashMap<String, Plan>,
    steps: DashMap<String, Vec<Step>>,
    events: Mutex<Vec<PlanEvent>>,
}

impl InMemoryPlanRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a plan and its steps, as a test/demo convenience.
    pub fn seed(&self, plan: Plan, steps: Vec<Step>) {
        self.steps.insert(plan.plan_id.clone(), steps);
        self.plans.insert(plan.plan_id.clone(), plan);
    }

    pub fn events(&self) -> Vec<PlanEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlanRepository for InMemoryPlanRepository {
    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>, PlanError> {
        Ok(self.plans.get(plan_id).map(|p| p.clone()))
    }

    async fn save_plan(&self, plan: &Plan) -> Result<(), PlanError> {
        self.plans.insert(plan.plan_id.clone(), plan.clone());
        Ok(())
    }

    async fn delete_plan(&self, plan_id: &str) -> Result<bool, PlanError> {
        let had_plan = self.plans.remove(plan_id).is_some();
        self.steps.remove(plan_id);
        Ok(had_plan)
    }

    async fn list_steps(&self, plan_id: &str) -> Result<Vec<Step>, PlanError> {
        Ok(self.steps.get(plan_id).map(|s| s.clone()).unwrap_or_default())
    }

    async fn save_step(&self, step: &Step) -> Result<(), PlanError> {
        let mut entry = self.steps.entry(step.plan_id.clone()).or_default();
        if let Some(existing) = entry.iter_mut().find(|s| s.step_id == step.step_id) {
            *existing = step.clone();
        } else {
            entry.push(step.clone());
        }
        Ok(())
    }

    async fn log_event(&self, event: &PlanEvent) -> Result<(), PlanError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// SQLite-backed `PlanRepository`. One connection, serialized through a
/// `Mutex`, matching the single-writer-access invariant spec.md §5 requires
/// for step status transitions.
pub struct SqlitePlanRepository {
    conn: Mutex<rusqlite::Connection>,
}

impl SqlitePlanRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let conn = rusqlite::Connection::open(path).map_err(|e| PlanError::Repository(e.to_string()))?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, PlanError> {
        let conn = rusqlite::Connection::open_in_memory().map_err(|e| PlanError::Repository(e.to_string()))?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init_schema(conn: &rusqlite::Connection) -> Result<(), PlanError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS plans (
                plan_id TEXT PRIMARY KEY,
                data TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS steps (
                plan_id TEXT NOT NULL,
                step_id TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (plan_id, step_id)
            );
            CREATE TABLE IF NOT EXISTS plan_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                data TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| PlanError::Repository(e.to_string()))
    }
}

#[async_trait]
impl PlanRepository for SqlitePlanRepository {
    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>, PlanError> {
        tokio::task::block_in_place(|| {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn
                .prepare("SELECT data FROM plans WHERE plan_id = ?1")
                .map_err(|e| PlanError::Repository(e.to_string()))?;
            let mut rows = stmt
                .query(params![plan_id])
                .map_err(|e| PlanError::Repository(e.to_string()))?;
            match rows.next().map_err(|e| PlanError::Repository(e.to_string()))? {
                Some(row) => {
                    let data: String = row.get(0).map_err(|e| PlanError::Repository(e.to_string()))?;
                    let plan: Plan = serde_json::from_str(&data).map_err(|e| PlanError::Repository(e.to_string()))?;
                    Ok(Some(plan))
                }
                None => Ok(None),
            }
        })
    }

    async fn save_plan(&self, plan: &Plan) -> Result<(), PlanError> {
        let data = serde_json::to_string(plan).map_err(|e| PlanError::Repository(e.to_string()))?;
        tokio::task::block_in_place(|| {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO plans (plan_id, data) VALUES (?1, ?2)
                 ON CONFLICT(plan_id) DO UPDATE SET data = excluded.data",
                params![plan.plan_id, data],
            )
            .map_err(|e| PlanError::Repository(e.to_string()))?;
            Ok(())
        })
    }

    async fn delete_plan(&self, plan_id: &str) -> Result<bool, PlanError> {
        tokio::task::block_in_place(|| {
            let conn = self.conn.lock().unwrap();
            conn.execute("DELETE FROM steps WHERE plan_id = ?1", params![plan_id])
                .map_err(|e| PlanError::Repository(e.to_string()))?;
            let removed = conn
                .execute("DELETE FROM plans WHERE plan_id = ?1", params![plan_id])
                .map_err(|e| PlanError::Repository(e.to_string()))?;
            Ok(removed > 0)
        })
    }

    async fn list_steps(&self, plan_id: &str) -> Result<Vec<Step>, PlanError> {
        tokio::task::block_in_place(|| {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn
                .prepare("SELECT data FROM steps WHERE plan_id = ?1")
                .map_err(|e| PlanError::Repository(e.to_string()))?;
            let rows = stmt
                .query_map(params![plan_id], |row| row.get::<_, String>(0))
                .map_err(|e| PlanError::Repository(e.to_string()))?;
            let mut steps = Vec::new();
            for row in rows {
                let data = row.map_err(|e| PlanError::Repository(e.to_string()))?;
                let step: Step = serde_json::from_str(&data).map_err(|e| PlanError::Repository(e.to_string()))?;
                steps.push(step);
            }
            steps.sort_by_key(|s| s.order_num);
            Ok(steps)
        })
    }

    async fn save_step(&self, step: &Step) -> Result<(), PlanError> {
        let data = serde_json::to_string(step).map_err(|e| PlanError::Repository(e.to_string()))?;
        tokio::task::block_in_place(|| {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO steps (plan_id, step_id, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(plan_id, step_id) DO UPDATE SET data = excluded.data",
                params![step.plan_id, step.step_id, data],
            )
            .map_err(|e| PlanError::Repository(e.to_string()))?;
            Ok(())
        })
    }

    async fn log_event(&self, event: &PlanEvent) -> Result<(), PlanError> {
        let data = serde_json::to_string(event).map_err(|e| PlanError::Repository(e.to_string()))?;
        tokio::task::block_in_place(|| {
            let conn = self.conn.lock().unwrap();
            conn.execute("INSERT INTO plan_events (data) VALUES (?1)", params![data])
                .map_err(|e| PlanError::Repository(e.to_string()))?;
            Ok(())
        })
    }
}

/// Convenience: loads plan+steps together, the shape the executor actually wants.
pub async fn load_plan_with_steps(
    repo: &dyn PlanRepository,
    plan_id: &str,
) -> Result<Option<(Plan, Vec<Step>)>, PlanError> {
    match repo.get_plan(plan_id).await? {
        Some(plan) => {
            let steps = repo.list_steps(plan_id).await?;
            Ok(Some((plan, steps)))
        }
        None => Ok(None),
    }
}

/// Builds a lookup of `previousResults` (stepId -> result) from completed steps,
/// the shape handlers receive in their execution context.
pub fn previous_results(steps: &[Step]) -> HashMap<String, serde_json::Value> {
    steps
        .iter()
        .filter_map(|s| s.result.clone().map(|r| (s.step_id.clone(), r)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::model::{PlanStatus, Step};

    /// **Scenario**: saving then fetching a plan through the in-memory repository round-trips.
    #[tokio::test]
    async fn in_memory_save_and_get_round_trips() {
        let repo = InMemoryPlanRepository::new();
        let mut plan = Plan::new("p1", "u1", "demo", "goal", 1);
        plan.status = PlanStatus::Running;
        repo.save_plan(&plan).await.unwrap();
        let fetched = repo.get_plan("p1").await.unwrap().unwrap();
        assert_eq!(fetched.status, PlanStatus::Running);
    }

    /// **Scenario**: the SQLite repository persists a plan and its steps across save/get calls.
    #[tokio::test(flavor = "multi_thread")]
    async fn sqlite_round_trips_plan_and_steps() {
        let repo = SqlitePlanRepository::open_in_memory().unwrap();
        let plan = Plan::new("p1", "u1", "demo", "goal", 1);
        repo.save_plan(&plan).await.unwrap();
        let step = Step::new("s1", "p1", 1, "tool_call", "do it", serde_json::json!({}));
        repo.save_step(&step).await.unwrap();

        let fetched_plan = repo.get_plan("p1").await.unwrap().unwrap();
        assert_eq!(fetched_plan.plan_id, "p1");
        let steps = repo.list_steps("p1").await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step_id, "s1");
    }

    /// **Scenario**: deleting a plan removes it and its steps.
    #[tokio::test]
    async fn delete_plan_removes_steps_too() {
        let repo = InMemoryPlanRepository::new();
        let plan = Plan::new("p1", "u1", "demo", "goal", 1);
        let step = Step::new("s1", "p1", 1, "tool_call", "do it", serde_json::json!({}));
        repo.save_plan(&plan).await.unwrap();
        repo.save_step(&step).await.unwrap();
        assert!(repo.delete_plan("p1").await.unwrap());
        assert!(repo.get_plan("p1").await.unwrap().is_none());
        assert!(repo.list_steps("p1").await.unwrap().is_empty());
    }

    /// **Scenario**: a plan saved to a real on-disk SQLite file survives
    /// reopening the repository against the same path.
    #[tokio::test(flavor = "multi_thread")]
    async fn sqlite_file_backed_repository_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("plans.sqlite3");

        {
            let repo = SqlitePlanRepository::open(&db_path).unwrap();
            let plan = Plan::new("p1", "u1", "demo", "goal", 1);
            repo.save_plan(&plan).await.unwrap();
        }

        let repo = SqlitePlanRepository::open(&db_path).unwrap();
        let fetched = repo.get_plan("p1").await.unwrap().unwrap();
        assert_eq!(fetched.plan_id, "p1");
    }
}
