//! `tracing` helpers for plan/step lifecycle events, mirroring the teacher's
//! `graph::{log_graph_start, log_node_start, ...}` logging idiom.

use tracing::{debug, error, info, warn};

pub fn log_plan_start(plan_id: &str, total_steps: u32) {
    info!(plan_id, total_steps, "plan started");
}

pub fn log_plan_complete(plan_id: &str, completed_steps: u32, total_steps: u32, duration_ms: u64) {
    info!(plan_id, completed_steps, total_steps, duration_ms, "plan completed");
}

pub fn log_plan_failed(plan_id: &str, error_message: &str) {
    error!(plan_id, error = error_message, "plan failed");
}

pub fn log_plan_paused(plan_id: &str) {
    info!(plan_id, "plan paused");
}

pub fn log_step_start(plan_id: &str, step_id: &str, step_type: &str) {
    debug!(plan_id, step_id, step_type, "step started");
}

pub fn log_step_complete(plan_id: &str, step_id: &str, duration_ms: Option<u64>) {
    debug!(plan_id, step_id, duration_ms, "step completed");
}

pub fn log_step_failed(plan_id: &str, step_id: &str, error_message: &str, retry_count: u32, max_retries: u32) {
    warn!(plan_id, step_id, error = error_message, retry_count, max_retries, "step failed");
}

pub fn log_step_skipped(plan_id: &str, step_id: &str, reason: &str) {
    debug!(plan_id, step_id, reason, "step skipped");
}

pub fn log_stall(plan_id: &str, stall_count: u32) {
    warn!(plan_id, stall_count, "plan executor stalled waiting on dependencies");
}

pub fn log_deadlock(plan_id: &str) {
    error!(plan_id, "dependency deadlock detected, blocking remaining steps");
}
