//! The durable, suspendable plan executor (spec.md §4.B): walks a plan's
//! step DAG to completion with retries, timeouts, pause/resume/abort, and
//! deadlock detection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use tokio::sync::watch;

use crate::plan::error::PlanError;
use crate::plan::handlers::{PlanExecutionContext, StepHandler, SubPlanRunner};
use crate::plan::logging;
use crate::plan::model::{OnFailure, Plan, PlanEvent, PlanStatus, Step, StepStatus};
use crate::plan::repository::{previous_results, PlanRepository};

const STALL_SLEEP_MS: u64 = 1000;
const MAX_STALL_COUNT: u32 = 3;

/// Outcome of [`PlanExecutor::execute`]/`resume`.
#[derive(Clone, Debug)]
pub struct PlanResult {
    pub status: PlanStatus,
    pub completed_steps: u32,
    pub total_steps: u32,
    pub duration_ms: u64,
    pub results: HashMap<String, serde_json::Value>,
    pub error: Option<String>,
}

/// Signal from running a single step back to the main loop.
enum StepSignal {
    Continue,
    PlanFailed(String),
}

/// Durable plan executor. One instance is shared across all plans; per-plan
/// state (`runningPlans`, `pausedPlans`) lives in concurrent maps so reads
/// stay lock-free.
pub struct PlanExecutor {
    repository: Arc<dyn PlanRepository>,
    handlers: DashMap<String, Arc<dyn StepHandler>>,
    running_plans: DashMap<String, watch::Sender<bool>>,
    paused_plans: DashSet<String>,
}

impl PlanExecutor {
    pub fn new(repository: Arc<dyn PlanRepository>) -> Self {
        Self {
            repository,
            handlers: DashMap::new(),
            running_plans: DashMap::new(),
            paused_plans: DashSet::new(),
        }
    }

    pub fn register_handler(&self, step_type: impl Into<String>, handler: Arc<dyn StepHandler>) {
        self.handlers.insert(step_type.into(), handler);
    }

    pub fn is_running(&self, plan_id: &str) -> bool {
        self.running_plans.contains_key(plan_id)
    }

    pub fn is_paused(&self, plan_id: &str) -> bool {
        self.paused_plans.contains(plan_id)
    }

    pub fn running_plan_ids(&self) -> Vec<String> {
        self.running_plans.iter().map(|e| e.key().clone()).collect()
    }

    /// Cooperative pause: returns false if the plan isn't currently running.
    /// The executor checks `paused_plans` at the top of each loop iteration.
    pub async fn pause(&self, plan_id: &str) -> Result<bool, PlanError> {
        if !self.running_plans.contains_key(plan_id) {
            return Ok(false);
        }
        if let Some(mut plan) = self.repository.get_plan(plan_id).await? {
            plan.status = PlanStatus::Paused;
            plan.updated_at = Utc::now();
            self.repository.save_plan(&plan).await?;
        }
        self.paused_plans.insert(plan_id.to_string());
        logging::log_plan_paused(plan_id);
        Ok(true)
    }

    /// Signals cancellation; the executor checks this flag at the top of
    /// each loop iteration only (no mid-step interruption).
    pub fn abort(&self, plan_id: &str) {
        if let Some(entry) = self.running_plans.get(plan_id) {
            let _ = entry.send(true);
        }
    }

    /// Stores `{timestamp, data}` as an opaque blob on the plan and emits a
    /// `checkpoint` event.
    pub async fn checkpoint(&self, plan_id: &str, data: serde_json::Value) -> Result<(), PlanError> {
        let mut plan = self
            .repository
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| PlanError::NotFound(plan_id.to_string()))?;
        let blob = serde_json::json!({ "timestamp": Utc::now(), "data": data });
        plan.checkpoint = Some(blob.to_string());
        plan.updated_at = Utc::now();
        self.repository.save_plan(&plan).await?;
        self.repository
            .log_event(&PlanEvent::Checkpoint { plan_id: plan_id.to_string(), timestamp: Utc::now() })
            .await?;
        Ok(())
    }

    /// Returns the parsed checkpoint blob's `data` field, or `None` if absent
    /// or malformed.
    pub async fn restore_from_checkpoint(&self, plan_id: &str) -> Result<Option<serde_json::Value>, PlanError> {
        let plan = self
            .repository
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| PlanError::NotFound(plan_id.to_string()))?;
        Ok(plan
            .checkpoint
            .as_deref()
            .and_then(|blob| serde_json::from_str::<serde_json::Value>(blob).ok())
            .and_then(|v| v.get("data").cloned()))
    }

    /// Only valid from `paused`; clears the pause and re-enters `execute`.
    pub async fn resume(&self, plan_id: &str) -> Result<PlanResult, PlanError> {
        if !self.paused_plans.contains(plan_id) {
            return Err(PlanError::IllegalState(format!("plan '{}' is not paused", plan_id)));
        }
        self.paused_plans.remove(plan_id);
        self.execute(plan_id).await
    }

    /// Runs the plan to quiescence: completion, failure, cancellation, or a
    /// cooperative pause.
    pub async fn execute(&self, plan_id: &str) -> Result<PlanResult, PlanError> {
        if self.running_plans.contains_key(plan_id) {
            return Err(PlanError::AlreadyRunning(plan_id.to_string()));
        }

        let mut plan = self
            .repository
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| PlanError::NotFound(plan_id.to_string()))?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.running_plans.insert(plan_id.to_string(), cancel_tx);

        if plan.started_at.is_none() {
            plan.started_at = Some(Utc::now());
        }
        plan.status = PlanStatus::Running;
        plan.updated_at = Utc::now();
        self.repository.save_plan(&plan).await?;
        self.repository
            .log_event(&PlanEvent::PlanStarted { plan_id: plan_id.to_string() })
            .await?;
        logging::log_plan_start(plan_id, plan.total_steps);

        let start = Instant::now();
        let mut stall_count: u32 = 0;

        let result = loop {
            tokio::task::yield_now().await;

            if *cancel_rx.borrow() {
                plan.status = PlanStatus::Cancelled;
                plan.updated_at = Utc::now();
                self.repository.save_plan(&plan).await?;
                break Err(PlanError::Aborted);
            }

            if self.paused_plans.contains(plan_id) {
                break Ok(self.to_result(&plan, &[], start.elapsed()));
            }

            // Plan-deletion safety: refetch before running each step.
            let Some(fresh_plan) = self.repository.get_plan(plan_id).await? else {
                break Err(PlanError::PlanDeleted);
            };
            plan = fresh_plan;

            let mut steps = self.repository.list_steps(plan_id).await?;

            let next_ready = Self::next_ready_step(&steps);
            let next_ready = match next_ready {
                Some(idx) => idx,
                None => {
                    if steps.iter().all(|s| matches!(s.status, StepStatus::Completed | StepStatus::Skipped | StepStatus::Failed | StepStatus::Blocked)) {
                        plan.status = PlanStatus::Completed;
                        plan.completed_at = Some(Utc::now());
                        plan.progress = 100;
                        plan.updated_at = Utc::now();
                        self.repository.save_plan(&plan).await?;
                        let completed = steps.iter().filter(|s| s.status == StepStatus::Completed).count() as u32;
                        self.repository
                            .log_event(&PlanEvent::PlanCompleted {
                                plan_id: plan_id.to_string(),
                                completed_steps: completed,
                                total_steps: plan.total_steps,
                            })
                            .await?;
                        logging::log_plan_complete(plan_id, completed, plan.total_steps, start.elapsed().as_millis() as u64);
                        break Ok(self.to_result(&plan, &steps, start.elapsed()));
                    }

                    stall_count += 1;
                    logging::log_stall(plan_id, stall_count);
                    if stall_count >= MAX_STALL_COUNT {
                        for step in steps.iter_mut() {
                            if step.status == StepStatus::Pending {
                                step.status = StepStatus::Blocked;
                                self.repository.save_step(step).await?;
                            }
                        }
                        logging::log_deadlock(plan_id);
                        plan.status = PlanStatus::Failed;
                        plan.error = Some("Dependency deadlock: all pending steps have unmet dependencies".to_string());
                        plan.updated_at = Utc::now();
                        self.repository.save_plan(&plan).await?;
                        self.repository
                            .log_event(&PlanEvent::PlanFailed { plan_id: plan_id.to_string(), error: plan.error.clone().unwrap() })
                            .await?;
                        break Err(PlanError::Deadlock);
                    }
                    tokio::time::sleep(Duration::from_millis(STALL_SLEEP_MS)).await;
                    continue;
                }
            };

            stall_count = 0;

            match self.run_step(&mut plan, &mut steps, next_ready, cancel_rx.clone()).await {
                Ok(StepSignal::Continue) => {
                    Self::recalc_progress(&mut plan, &steps);
                    plan.updated_at = Utc::now();
                    self.repository.save_plan(&plan).await?;
                }
                Ok(StepSignal::PlanFailed(message)) => {
                    plan.status = PlanStatus::Failed;
                    plan.error = Some(message.clone());
                    plan.updated_at = Utc::now();
                    self.repository.save_plan(&plan).await?;
                    self.repository
                        .log_event(&PlanEvent::PlanFailed { plan_id: plan_id.to_string(), error: message.clone() })
                        .await?;
                    logging::log_plan_failed(plan_id, &message);
                    break Ok(self.to_result(&plan, &steps, start.elapsed()));
                }
                Err(e) => break Err(e),
            }
        };

        self.running_plans.remove(plan_id);
        result
    }

    fn to_result(&self, plan: &Plan, steps: &[Step], elapsed: Duration) -> PlanResult {
        PlanResult {
            status: plan.status,
            completed_steps: steps.iter().filter(|s| s.status == StepStatus::Completed).count() as u32,
            total_steps: plan.total_steps,
            duration_ms: elapsed.as_millis() as u64,
            results: previous_results(steps),
            error: plan.error.clone(),
        }
    }

    fn recalc_progress(plan: &mut Plan, steps: &[Step]) {
        if plan.total_steps == 0 {
            plan.progress = 100;
            return;
        }
        let completed = steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Completed | StepStatus::Skipped))
            .count() as u32;
        plan.current_step = completed;
        plan.progress = ((completed as f64 / plan.total_steps as f64) * 100.0).round() as u8;
    }

    /// First pending step (in `order_num` order) whose dependencies are all completed.
    fn next_ready_step(steps: &[Step]) -> Option<usize> {
        let mut pending: Vec<usize> = steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.status == StepStatus::Pending)
            .map(|(i, _)| i)
            .collect();
        pending.sort_by_key(|&i| steps[i].order_num);

        pending.into_iter().find(|&i| {
            steps[i]
                .dependencies
                .iter()
                .all(|dep_id| steps.iter().any(|s| &s.step_id == dep_id && s.status == StepStatus::Completed))
        })
    }

    async fn run_step(
        &self,
        plan: &mut Plan,
        steps: &mut [Step],
        index: usize,
        cancellation: watch::Receiver<bool>,
    ) -> Result<StepSignal, PlanError> {
        let step_id = steps[index].step_id.clone();
        let plan_id = plan.plan_id.clone();

        steps[index].status = StepStatus::Running;
        self.repository.save_step(&steps[index]).await?;
        self.repository
            .log_event(&PlanEvent::StepStarted { plan_id: plan_id.clone(), step_id: step_id.clone() })
            .await?;
        logging::log_step_start(&plan_id, &step_id, &steps[index].step_type);

        let handler = self
            .handlers
            .get(&steps[index].step_type)
            .map(|h| Arc::clone(&h))
            .ok_or_else(|| PlanError::HandlerNotFound(steps[index].step_type.clone()))?;

        let ctx = PlanExecutionContext {
            plan: plan.clone(),
            step: steps[index].clone(),
            previous_results: previous_results(steps),
            cancellation,
        };

        let timeout_ms = steps[index].effective_timeout_ms();
        let started = Instant::now();
        let outcome = tokio::time::timeout(Duration::from_millis(timeout_ms), handler.handle(&ctx)).await;

        let (success, data, error_message, next_step, should_pause, requires_approval) = match outcome {
            Ok(Ok(outcome)) => (
                outcome.success,
                outcome.data,
                outcome.error,
                outcome.next_step,
                outcome.should_pause,
                outcome.requires_approval,
            ),
            Ok(Err(e)) => (false, None, Some(e.to_string()), None, false, false),
            Err(_) => (false, None, Some(format!("Step timed out after {}ms", timeout_ms)), None, false, false),
        };

        let duration_ms = started.elapsed().as_millis() as u64;

        if success {
            steps[index].status = StepStatus::Completed;
            steps[index].result = data;
            steps[index].duration_ms = Some(duration_ms);
            steps[index].error = None;
            self.repository.save_step(&steps[index]).await?;
            self.repository
                .log_event(&PlanEvent::StepCompleted { plan_id: plan_id.clone(), step_id: step_id.clone() })
                .await?;
            logging::log_step_complete(&plan_id, &step_id, Some(duration_ms));

            if let Some(target_id) = next_step {
                self.apply_branch(plan, steps, index, &target_id).await?;
            }

            if requires_approval {
                plan.status = PlanStatus::Paused;
                self.paused_plans.insert(plan_id.clone());
                self.repository
                    .log_event(&PlanEvent::ApprovalRequired { plan_id: plan_id.clone(), step_id: step_id.clone() })
                    .await?;
            } else if should_pause {
                plan.status = PlanStatus::Paused;
                self.paused_plans.insert(plan_id.clone());
            }

            return Ok(StepSignal::Continue);
        }

        let error_message = error_message.unwrap_or_else(|| "step failed".to_string());

        if steps[index].retry_count < steps[index].max_retries {
            steps[index].status = StepStatus::Pending;
            steps[index].retry_count += 1;
            steps[index].error = Some(error_message.clone());
            self.repository.save_step(&steps[index]).await?;
            logging::log_step_failed(&plan_id, &step_id, &error_message, steps[index].retry_count, steps[index].max_retries);

            let backoff_ms = (1000u64.saturating_mul(1u64 << steps[index].retry_count.min(20))).min(30_000);
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            return Ok(StepSignal::Continue);
        }

        steps[index].status = StepStatus::Failed;
        steps[index].error = Some(error_message.clone());
        steps[index].duration_ms = Some(duration_ms);
        self.repository.save_step(&steps[index]).await?;
        self.repository
            .log_event(&PlanEvent::StepFailed { plan_id: plan_id.clone(), step_id: step_id.clone(), error: error_message.clone() })
            .await?;
        logging::log_step_failed(&plan_id, &step_id, &error_message, steps[index].retry_count, steps[index].max_retries);

        match steps[index].on_failure_policy() {
            OnFailure::Abort => Ok(StepSignal::PlanFailed(error_message)),
            OnFailure::Skip => Ok(StepSignal::Continue),
            OnFailure::JumpTo(target_id) => {
                self.apply_branch(plan, steps, index, &target_id).await?;
                Ok(StepSignal::Continue)
            }
        }
    }

    /// Marks every pending step with `order_num` strictly between the current
    /// step and `target_id` as skipped.
    async fn apply_branch(&self, plan: &Plan, steps: &mut [Step], current_index: usize, target_id: &str) -> Result<(), PlanError> {
        let current_order = steps[current_index].order_num;
        let Some(target_order) = steps.iter().find(|s| s.step_id == target_id).map(|s| s.order_num) else {
            return Ok(());
        };
        let (lo, hi) = if current_order < target_order {
            (current_order, target_order)
        } else {
            (target_order, current_order)
        };

        for step in steps.iter_mut() {
            if step.order_num > lo && step.order_num < hi && step.status == StepStatus::Pending {
                step.status = StepStatus::Skipped;
                self.repository.save_step(step).await?;
                self.repository
                    .log_event(&PlanEvent::StepSkipped {
                        plan_id: plan.plan_id.clone(),
                        step_id: step.step_id.clone(),
                        reason: "Skipped due to condition branch".to_string(),
                    })
                    .await?;
                logging::log_step_skipped(&plan.plan_id, &step.step_id, "Skipped due to condition branch");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SubPlanRunner for PlanExecutor {
    async fn run_sub_plan(&self, plan_id: &str) -> Result<PlanStatus, PlanError> {
        let result = self.execute(plan_id).await?;
        Ok(result.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::handlers::{PlanExecutionContext as Ctx, StepHandler as _, StepOutcome};
    use crate::plan::repository::InMemoryPlanRepository;

    struct AlwaysSucceeds;
    #[async_trait]
    impl StepHandler for AlwaysSucceeds {
        async fn handle(&self, _ctx: &Ctx) -> Result<StepOutcome, PlanError> {
            Ok(StepOutcome::ok(serde_json::json!({ "ok": true })))
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl StepHandler for AlwaysFails {
        async fn handle(&self, _ctx: &Ctx) -> Result<StepOutcome, PlanError> {
            Ok(StepOutcome::failure("nope"))
        }
    }

    struct SucceedsOnSecondTry {
        attempts: std::sync::atomic::AtomicU32,
    }
    #[async_trait]
    impl StepHandler for SucceedsOnSecondTry {
        async fn handle(&self, _ctx: &Ctx) -> Result<StepOutcome, PlanError> {
            let n = self.attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 0 {
                Ok(StepOutcome::failure("first try fails"))
            } else {
                Ok(StepOutcome::ok(serde_json::json!({ "attempt": n })))
            }
        }
    }

    fn executor_with(handler_type: &str, handler: Arc<dyn StepHandler>) -> (PlanExecutor, Arc<InMemoryPlanRepository>) {
        let repo = Arc::new(InMemoryPlanRepository::new());
        let executor = PlanExecutor::new(repo.clone());
        executor.register_handler(handler_type, handler);
        (executor, repo)
    }

    /// **Scenario**: a single-step plan with a succeeding handler completes (happy path).
    #[tokio::test]
    async fn single_step_happy_path_completes() {
        let (executor, repo) = executor_with("noop", Arc::new(AlwaysSucceeds));
        let plan = Plan::new("p1", "u1", "n", "g", 1);
        let step = Step::new("s1", "p1", 1, "noop", "do it", serde_json::json!({}));
        repo.seed(plan, vec![step]);

        let result = executor.execute("p1").await.unwrap();
        assert_eq!(result.status, PlanStatus::Completed);
        assert_eq!(result.completed_steps, 1);
    }

    /// **Scenario**: a step that fails once then succeeds completes the plan via retry.
    #[tokio::test]
    async fn retry_then_success_completes_plan() {
        let handler = Arc::new(SucceedsOnSecondTry { attempts: std::sync::atomic::AtomicU32::new(0) });
        let (executor, repo) = executor_with("flaky", handler);
        let plan = Plan::new("p1", "u1", "n", "g", 1);
        let step = Step::new("s1", "p1", 1, "flaky", "retry me", serde_json::json!({})).with_max_retries(2);
        repo.seed(plan, vec![step]);

        let result = executor.execute("p1").await.unwrap();
        assert_eq!(result.status, PlanStatus::Completed);
    }

    /// **Scenario**: a step that exhausts retries with onFailure=abort fails the whole plan.
    #[tokio::test]
    async fn exhausted_retries_aborts_plan() {
        let (executor, repo) = executor_with("boom", Arc::new(AlwaysFails));
        let plan = Plan::new("p1", "u1", "n", "g", 1);
        let step = Step::new("s1", "p1", 1, "boom", "always fails", serde_json::json!({}));
        repo.seed(plan, vec![step]);

        let result = executor.execute("p1").await.unwrap();
        assert_eq!(result.status, PlanStatus::Failed);
    }

    /// **Scenario**: a step whose dependency never completes (missing dependency id) deadlocks.
    #[tokio::test]
    async fn unmet_dependency_causes_deadlock() {
        let (executor, repo) = executor_with("noop", Arc::new(AlwaysSucceeds));
        let plan = Plan::new("p1", "u1", "n", "g", 1);
        let step = Step::new("s1", "p1", 1, "noop", "blocked", serde_json::json!({}))
            .with_dependencies(vec!["ghost".to_string()]);
        repo.seed(plan, vec![step]);

        let err = executor.execute("p1").await.unwrap_err();
        assert!(matches!(err, PlanError::Deadlock));
    }

    /// **Scenario**: executing an already-running plan is rejected.
    #[tokio::test]
    async fn already_running_plan_rejects_second_execute() {
        let (executor, repo) = executor_with("noop", Arc::new(AlwaysSucceeds));
        let plan = Plan::new("p1", "u1", "n", "g", 1);
        let step = Step::new("s1", "p1", 1, "noop", "do it", serde_json::json!({}));
        repo.seed(plan, vec![step]);

        executor.running_plans.insert("p1".to_string(), watch::channel(false).0);
        let err = executor.execute("p1").await.unwrap_err();
        assert!(matches!(err, PlanError::AlreadyRunning(_)));
    }

    /// **Scenario**: a condition branch skips the steps strictly between current and target.
    #[tokio::test]
    async fn condition_branch_skips_intermediate_steps() {
        use crate::plan::handlers::ConditionHandler;
        let repo = Arc::new(InMemoryPlanRepository::new());
        let executor = PlanExecutor::new(repo.clone());
        executor.register_handler("condition", Arc::new(ConditionHandler));
        executor.register_handler("noop", Arc::new(AlwaysSucceeds));

        let plan = Plan::new("p1", "u1", "n", "g", 3);
        let s1 = Step::new("s1", "p1", 1, "condition", "branch", serde_json::json!({
            "condition": "true", "true_step": "s3", "false_step": "s2"
        }));
        let s2 = Step::new("s2", "p1", 2, "noop", "skipped", serde_json::json!({}));
        let s3 = Step::new("s3", "p1", 3, "noop", "target", serde_json::json!({}));
        repo.seed(plan, vec![s1, s2, s3]);

        let result = executor.execute("p1").await.unwrap();
        assert_eq!(result.status, PlanStatus::Completed);
        let steps = repo.list_steps("p1").await.unwrap();
        let s2 = steps.iter().find(|s| s.step_id == "s2").unwrap();
        assert_eq!(s2.status, StepStatus::Skipped);
    }
}
