//! Lifecycle events: the engine emits; collaborators subscribe.
//! No observer pattern exists in the corpus — it logs directly via
//! `tracing::info!` at each stage of `execute_step_with_retry`/`DagPlanner`.
//! This module keeps that as the default (`TracingObserver`) while exposing
//! a `trait Observer` with no-op defaults so other collaborators (a
//! reporter, a realtime-events server — both out of scope for the kernel)
//! can subscribe without re-implementing every hook.

use crate::collaborators::DiscoveredSuite;
use crate::model::{ExecutionSummary, Step, Suite, SuiteResult};

#[derive(Debug, Clone, Default)]
pub struct StepContextInfo {
    pub suite_node_id: String,
    pub qualified_step_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionStats {
    pub total_suites: usize,
}

pub trait Observer: Send + Sync {
    fn on_execution_start(&self, _stats: &ExecutionStats) {}
    fn on_test_discovered(&self, _suite: &DiscoveredSuite) {}
    fn on_suite_start(&self, _suite: &Suite) {}
    fn on_step_start(&self, _step: &Step, _ctx: &StepContextInfo) {}
    fn on_step_end(&self, _step: &Step, _result: &crate::model::StepResult, _ctx: &StepContextInfo) {}
    fn on_suite_end(&self, _suite: &Suite, _result: &SuiteResult) {}
    fn on_error(&self, _error: &str) {}
    fn on_execution_end(&self, _summary: &ExecutionSummary) {}
}

/// Default collaborator: every lifecycle event also emits a `tracing`
/// span/event, matching the reference ambient logging style.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_execution_start(&self, stats: &ExecutionStats) {
        tracing::info!(total_suites = stats.total_suites, "execution started");
    }

    fn on_test_discovered(&self, suite: &DiscoveredSuite) {
        tracing::debug!(node_id = %suite.node_id, priority = ?suite.priority, "suite discovered");
    }

    fn on_suite_start(&self, suite: &Suite) {
        tracing::info!(node_id = %suite.node_id, suite_name = %suite.suite_name, "suite started");
    }

    fn on_step_start(&self, step: &Step, ctx: &StepContextInfo) {
        tracing::info!(qualified_step_id = %ctx.qualified_step_id, name = %step.name, "step started");
    }

    fn on_step_end(&self, _step: &Step, result: &crate::model::StepResult, ctx: &StepContextInfo) {
        tracing::info!(
            qualified_step_id = %ctx.qualified_step_id,
            status = ?result.status,
            duration_ms = result.duration_ms,
            "step finished"
        );
    }

    fn on_suite_end(&self, suite: &Suite, result: &SuiteResult) {
        tracing::info!(node_id = %suite.node_id, status = ?result.status, cached = result.cached, "suite finished");
    }

    fn on_error(&self, error: &str) {
        tracing::error!(%error, "execution error");
    }

    fn on_execution_end(&self, summary: &ExecutionSummary) {
        tracing::info!(
            resolved = summary.resolved,
            failed = summary.failed,
            skipped = summary.skipped,
            total_duration_ms = summary.total_duration_ms,
            "execution finished"
        );
    }
}

/// No-op collaborator, useful when embedding the engine as a library
/// without wanting ambient logging.
#[derive(Debug, Default)]
pub struct NullObserver;

impl Observer for NullObserver {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_observer_is_inert() {
        let observer = NullObserver;
        observer.on_execution_start(&ExecutionStats { total_suites: 3 });
        observer.on_error("boom");
    }
}
