//! Data model for plans and steps: the DAG-of-steps state machine the
//! [`PlanExecutor`](super::PlanExecutor) drives to completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a plan. Transitions form the DAG
/// `pending -> running <-> paused -> (completed|failed|cancelled)`;
/// the last three are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl PlanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PlanStatus::Completed | PlanStatus::Failed | PlanStatus::Cancelled)
    }
}

/// Status of a single step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Blocked,
}

/// What to do when a step exhausts its retries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    Abort,
    Skip,
    JumpTo(String),
}

impl OnFailure {
    /// Parses the `onFailure` config field: `None`/`"abort"` -> Abort,
    /// `"skip"` -> Skip, anything else -> a step id to jump to.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None => OnFailure::Abort,
            Some("abort") => OnFailure::Abort,
            Some("skip") => OnFailure::Skip,
            Some(step_id) => OnFailure::JumpTo(step_id.to_string()),
        }
    }
}

/// One step in a plan's DAG.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Step {
    pub step_id: String,
    pub plan_id: String,
    pub order_num: u32,
    pub step_type: String,
    pub name: String,
    pub config: serde_json::Value,
    pub status: StepStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub dependencies: Vec<String>,
    pub timeout_ms: Option<u64>,
    pub on_failure: Option<String>,
}

impl Step {
    pub fn new(
        step_id: impl Into<String>,
        plan_id: impl Into<String>,
        order_num: u32,
        step_type: impl Into<String>,
        name: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            plan_id: plan_id.into(),
            order_num,
            step_type: step_type.into(),
            name: name.into(),
            config,
            status: StepStatus::Pending,
            result: None,
            error: None,
            duration_ms: None,
            retry_count: 0,
            max_retries: 0,
            dependencies: Vec::new(),
            timeout_ms: None,
            on_failure: None,
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_on_failure(mut self, on_failure: impl Into<String>) -> Self {
        self.on_failure = Some(on_failure.into());
        self
    }

    pub fn on_failure_policy(&self) -> OnFailure {
        OnFailure::parse(self.on_failure.as_deref())
    }

    pub fn effective_timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(60_000)
    }
}

/// A plan: a named, prioritised DAG of steps owned by one user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub user_id: String,
    pub name: String,
    pub goal: String,
    pub status: PlanStatus,
    pub progress: u8,
    pub total_steps: u32,
    pub current_step: u32,
    pub priority: i32,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub checkpoint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(plan_id: impl Into<String>, user_id: impl Into<String>, name: impl Into<String>, goal: impl Into<String>, total_steps: u32) -> Self {
        let now = Utc::now();
        Self {
            plan_id: plan_id.into(),
            user_id: user_id.into(),
            name: name.into(),
            goal: goal.into(),
            status: PlanStatus::Pending,
            progress: 0,
            total_steps,
            current_step: 0,
            priority: 0,
            error: None,
            started_at: None,
            completed_at: None,
            checkpoint: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Typed event envelope emitted during plan execution (spec.md §8 names these
/// by string; this is their one typed home).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanEvent {
    PlanStarted { plan_id: String },
    PlanCompleted { plan_id: String, completed_steps: u32, total_steps: u32 },
    PlanFailed { plan_id: String, error: String },
    StepStarted { plan_id: String, step_id: String },
    StepCompleted { plan_id: String, step_id: String },
    StepFailed { plan_id: String, step_id: String, error: String },
    StepSkipped { plan_id: String, step_id: String, reason: String },
    Checkpoint { plan_id: String, timestamp: DateTime<Utc> },
    ApprovalRequired { plan_id: String, step_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: onFailure string parsing follows the three-way rule.
    #[test]
    fn on_failure_parses_abort_skip_and_jump() {
        assert_eq!(OnFailure::parse(None), OnFailure::Abort);
        assert_eq!(OnFailure::parse(Some("abort")), OnFailure::Abort);
        assert_eq!(OnFailure::parse(Some("skip")), OnFailure::Skip);
        assert_eq!(OnFailure::parse(Some("step-7")), OnFailure::JumpTo("step-7".to_string()));
    }

    /// **Scenario**: terminal plan statuses are exactly completed/failed/cancelled.
    #[test]
    fn terminal_statuses() {
        assert!(PlanStatus::Completed.is_terminal());
        assert!(PlanStatus::Failed.is_terminal());
        assert!(PlanStatus::Cancelled.is_terminal());
        assert!(!PlanStatus::Running.is_terminal());
        assert!(!PlanStatus::Paused.is_terminal());
    }

    /// **Scenario**: a step without an explicit timeout defaults to 60s.
    #[test]
    fn default_timeout_is_60s() {
        let step = Step::new("s1", "p1", 1, "tool_call", "do thing", serde_json::json!({}));
        assert_eq!(step.effective_timeout_ms(), 60_000);
    }
}
