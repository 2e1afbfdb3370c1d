//! Persistence contracts (spec.md §6) for memories, goals, and custom tools:
//! this crate's boundary to the out-of-scope real database. Unlike
//! [`crate::plan::PlanRepository`], which ships a concrete SQLite-backed
//! implementation because the Plan Executor needs one to run against, these
//! three are trait-only - callers (the Agent Cache's system-prompt assembly,
//! the orchestrator's post-turn memory-save hints) depend on the boundary,
//! not a bundled store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A remembered fact, preference, event, or skill (spec.md §6 memory-hint kinds).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub user_id: String,
    pub memory_type: String,
    pub content: String,
    pub importance: f32,
}

#[async_trait]
pub trait MemoryRepository: Send + Sync {
    async fn get_important(&self, user_id: &str, threshold: f32, limit: usize) -> Result<Vec<Memory>, PersistenceError>;
    async fn add(&self, memory: Memory) -> Result<String, PersistenceError>;
    async fn search(&self, user_id: &str, query: &str, limit: usize) -> Result<Vec<Memory>, PersistenceError>;
    async fn delete(&self, user_id: &str, id: &str) -> Result<(), PersistenceError>;
    async fn list(&self, user_id: &str) -> Result<Vec<Memory>, PersistenceError>;
}

/// A multi-step goal tracked alongside a user's plans.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub description: String,
    pub status: String,
    pub next_actions: Vec<String>,
}

#[async_trait]
pub trait GoalRepository: Send + Sync {
    async fn get_active(&self, user_id: &str, limit: usize) -> Result<Vec<Goal>, PersistenceError>;
    async fn get_next_actions(&self, user_id: &str, limit: usize) -> Result<Vec<String>, PersistenceError>;
    async fn create(&self, goal: Goal) -> Result<String, PersistenceError>;
    async fn update(&self, goal: Goal) -> Result<(), PersistenceError>;
    async fn complete_step(&self, user_id: &str, goal_id: &str, step: &str) -> Result<(), PersistenceError>;
}

/// A user-authored tool awaiting or past moderation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomTool {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub code: String,
    pub enabled: bool,
    pub approved: bool,
    pub usage_count: u64,
}

/// Filter for [`CustomToolRepository::list`]; every field is an optional AND condition.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CustomToolFilter {
    pub enabled: Option<bool>,
    pub approved: Option<bool>,
}

#[async_trait]
pub trait CustomToolRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<CustomTool>, PersistenceError>;
    async fn get_by_name(&self, user_id: &str, name: &str) -> Result<Option<CustomTool>, PersistenceError>;
    async fn list(&self, user_id: &str, filter: CustomToolFilter) -> Result<Vec<CustomTool>, PersistenceError>;
    async fn create(&self, tool: CustomTool) -> Result<String, PersistenceError>;
    async fn update(&self, tool: CustomTool) -> Result<(), PersistenceError>;
    async fn delete(&self, user_id: &str, id: &str) -> Result<(), PersistenceError>;
    async fn enable(&self, user_id: &str, id: &str) -> Result<(), PersistenceError>;
    async fn disable(&self, user_id: &str, id: &str) -> Result<(), PersistenceError>;
    async fn approve(&self, user_id: &str, id: &str) -> Result<(), PersistenceError>;
    async fn reject(&self, user_id: &str, id: &str) -> Result<(), PersistenceError>;
    async fn record_usage(&self, user_id: &str, id: &str) -> Result<(), PersistenceError>;
    async fn get_active_tools(&self, user_id: &str) -> Result<Vec<CustomTool>, PersistenceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    /// A trivial in-memory memory store, enough to prove the trait is object-safe
    /// and usable the way the Agent Cache's prompt assembly step would use it.
    struct InMemoryMemories(DashMap<String, Memory>);

    #[async_trait]
    impl MemoryRepository for InMemoryMemories {
        async fn get_important(&self, user_id: &str, threshold: f32, limit: usize) -> Result<Vec<Memory>, PersistenceError> {
            let mut matches: Vec<Memory> = self
                .0
                .iter()
                .map(|e| e.value().clone())
                .filter(|m| m.user_id == user_id && m.importance >= threshold)
                .collect();
            matches.truncate(limit);
            Ok(matches)
        }

        async fn add(&self, memory: Memory) -> Result<String, PersistenceError> {
            let id = memory.id.clone();
            self.0.insert(id.clone(), memory);
            Ok(id)
        }

        async fn search(&self, user_id: &str, query: &str, limit: usize) -> Result<Vec<Memory>, PersistenceError> {
            let mut matches: Vec<Memory> = self
                .0
                .iter()
                .map(|e| e.value().clone())
                .filter(|m| m.user_id == user_id && m.content.contains(query))
                .collect();
            matches.truncate(limit);
            Ok(matches)
        }

        async fn delete(&self, _user_id: &str, id: &str) -> Result<(), PersistenceError> {
            self.0.remove(id);
            Ok(())
        }

        async fn list(&self, user_id: &str) -> Result<Vec<Memory>, PersistenceError> {
            Ok(self.0.iter().map(|e| e.value().clone()).filter(|m| m.user_id == user_id).collect())
        }
    }

    /// **Scenario**: `get_important` filters by user and importance threshold.
    #[tokio::test]
    async fn get_important_filters_by_threshold() {
        let store = InMemoryMemories(DashMap::new());
        store
            .add(Memory {
                id: "m1".into(),
                user_id: "u1".into(),
                memory_type: "fact".into(),
                content: "likes tea".into(),
                importance: 0.9,
            })
            .await
            .unwrap();
        store
            .add(Memory {
                id: "m2".into(),
                user_id: "u1".into(),
                memory_type: "fact".into(),
                content: "likes coffee".into(),
                importance: 0.2,
            })
            .await
            .unwrap();
        let important = store.get_important("u1", 0.5, 10).await.unwrap();
        assert_eq!(important.len(), 1);
        assert_eq!(important[0].id, "m1");
    }
}
