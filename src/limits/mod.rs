//! Execution limits that guard against malformed or oversized suites.
//!
//! | Limit               | Default | Description                                |
//! |----------------------|--------|----------------------------------------------|
//! | max_steps            | 100    | max steps per suite                          |
//! | max_parallel          | 10    | max steps running concurrently within a suite |
//! | max_parallel_suites  | 5      | max suites running concurrently              |
//! | max_call_depth        | 16    | max nested `call` recursion                  |
//! | max_retries_total     | 50    | cumulative retries across a suite            |
//! | max_execution_secs    | 300   | wall-clock budget for a full run              |
//! | max_step_timeout_secs | 30    | per-step timeout                             |

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_STEPS: usize = 100;
pub const DEFAULT_MAX_PARALLEL: usize = 10;
pub const DEFAULT_MAX_PARALLEL_SUITES: usize = 5;
pub const DEFAULT_MAX_CALL_DEPTH: u32 = 16;
pub const DEFAULT_MAX_RETRIES_TOTAL: u32 = 50;
pub const DEFAULT_MAX_EXECUTION_SECS: u64 = 300;
pub const DEFAULT_MAX_STEP_TIMEOUT_SECS: u64 = 30;

/// Resource ceilings applied before and during a run. All fields have safe
/// defaults; override via `from_env()` or by constructing directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Max steps in a single suite. Suites above this are rejected at load.
    pub max_steps: usize,
    /// Max steps executing concurrently within one suite.
    pub max_parallel: usize,
    /// Max suites executing concurrently across the scheduler.
    pub max_parallel_suites: usize,
    /// Max `call` nesting depth before `EngineError::CallDepthExceeded`.
    pub max_call_depth: u32,
    /// Cumulative retry budget across an entire suite run.
    pub max_retries_total: u32,
    /// Wall-clock budget for the whole execution.
    pub max_execution_time: Duration,
    /// Per-step timeout; a step's own timeout is capped to this.
    pub max_step_timeout: Duration,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_parallel: DEFAULT_MAX_PARALLEL,
            max_parallel_suites: DEFAULT_MAX_PARALLEL_SUITES,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_retries_total: DEFAULT_MAX_RETRIES_TOTAL,
            max_execution_time: Duration::from_secs(DEFAULT_MAX_EXECUTION_SECS),
            max_step_timeout: Duration::from_secs(DEFAULT_MAX_STEP_TIMEOUT_SECS),
        }
    }
}

impl ExecutionLimits {
    /// Overrides defaults from environment variables, ignoring unparsable values.
    ///
    /// Supported: `FLOWTEST_MAX_STEPS`, `FLOWTEST_MAX_PARALLEL`,
    /// `FLOWTEST_MAX_PARALLEL_SUITES`, `FLOWTEST_MAX_CALL_DEPTH`,
    /// `FLOWTEST_MAX_RETRIES`, `FLOWTEST_MAX_EXECUTION_SECS`,
    /// `FLOWTEST_MAX_STEP_TIMEOUT`.
    pub fn from_env() -> Self {
        let mut limits = Self::default();

        if let Ok(val) = std::env::var("FLOWTEST_MAX_STEPS") {
            if let Ok(n) = val.parse() {
                limits.max_steps = n;
            }
        }
        if let Ok(val) = std::env::var("FLOWTEST_MAX_PARALLEL") {
            if let Ok(n) = val.parse() {
                limits.max_parallel = n;
            }
        }
        if let Ok(val) = std::env::var("FLOWTEST_MAX_PARALLEL_SUITES") {
            if let Ok(n) = val.parse() {
                limits.max_parallel_suites = n;
            }
        }
        if let Ok(val) = std::env::var("FLOWTEST_MAX_CALL_DEPTH") {
            if let Ok(n) = val.parse() {
                limits.max_call_depth = n;
            }
        }
        if let Ok(val) = std::env::var("FLOWTEST_MAX_RETRIES") {
            if let Ok(n) = val.parse() {
                limits.max_retries_total = n;
            }
        }
        if let Ok(val) = std::env::var("FLOWTEST_MAX_EXECUTION_SECS") {
            if let Ok(n) = val.parse() {
                limits.max_execution_time = Duration::from_secs(n);
            }
        }
        if let Ok(val) = std::env::var("FLOWTEST_MAX_STEP_TIMEOUT") {
            if let Ok(n) = val.parse() {
                limits.max_step_timeout = Duration::from_secs(n);
            }
        }

        limits
    }

    pub fn strict() -> Self {
        Self {
            max_steps: 10,
            max_parallel: 2,
            max_parallel_suites: 2,
            max_call_depth: 4,
            max_retries_total: 5,
            max_execution_time: Duration::from_secs(30),
            max_step_timeout: Duration::from_secs(5),
        }
    }

    pub fn relaxed() -> Self {
        Self {
            max_steps: 500,
            max_parallel: 50,
            max_parallel_suites: 20,
            max_call_depth: 32,
            max_retries_total: 200,
            max_execution_time: Duration::from_secs(3600),
            max_step_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug)]
pub struct LimitValidationResult {
    pub passed: bool,
    pub violations: Vec<LimitViolation>,
}

#[derive(Debug, Clone)]
pub struct LimitViolation {
    pub limit_name: String,
    pub limit_value: String,
    pub actual_value: String,
    pub message: String,
}

/// Checks a suite's step count and aggregate retry budget against `limits`.
pub fn validate_limits(
    step_count: usize,
    total_retries: u32,
    limits: &ExecutionLimits,
) -> LimitValidationResult {
    let mut violations = Vec::new();

    if step_count > limits.max_steps {
        violations.push(LimitViolation {
            limit_name: "max_steps".to_string(),
            limit_value: limits.max_steps.to_string(),
            actual_value: step_count.to_string(),
            message: format!(
                "suite has {} steps, max allowed is {}",
                step_count, limits.max_steps
            ),
        });
    }

    if total_retries > limits.max_retries_total {
        violations.push(LimitViolation {
            limit_name: "max_retries_total".to_string(),
            limit_value: limits.max_retries_total.to_string(),
            actual_value: total_retries.to_string(),
            message: format!(
                "suite may retry up to {} times, max allowed is {}",
                total_retries, limits.max_retries_total
            ),
        });
    }

    LimitValidationResult {
        passed: violations.is_empty(),
        violations,
    }
}

/// Runtime counter used to enforce `max_retries_total` and `max_call_depth`.
#[derive(Debug, Default)]
pub struct BoundedCounter {
    count: std::sync::atomic::AtomicU32,
    limit: u32,
}

impl BoundedCounter {
    pub fn new(limit: u32) -> Self {
        Self {
            count: std::sync::atomic::AtomicU32::new(0),
            limit,
        }
    }

    /// Increments and reports whether the counter is still within bounds.
    pub fn try_increment(&self) -> bool {
        let current = self.count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        current < self.limit
    }

    pub fn current(&self) -> u32 {
        self.count.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_match_documented_values() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.max_steps, 100);
        assert_eq!(limits.max_parallel, 10);
        assert_eq!(limits.max_parallel_suites, 5);
        assert_eq!(limits.max_call_depth, 16);
        assert_eq!(limits.max_retries_total, 50);
    }

    #[test]
    fn strict_limits_are_tighter() {
        let limits = ExecutionLimits::strict();
        assert_eq!(limits.max_steps, 10);
        assert_eq!(limits.max_call_depth, 4);
    }

    #[test]
    fn validate_limits_passes_within_bounds() {
        let limits = ExecutionLimits::default();
        let result = validate_limits(50, 20, &limits);
        assert!(result.passed);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn validate_limits_flags_step_overflow() {
        let limits = ExecutionLimits::default();
        let result = validate_limits(150, 20, &limits);
        assert!(!result.passed);
        assert_eq!(result.violations[0].limit_name, "max_steps");
    }

    #[test]
    fn validate_limits_flags_retry_overflow() {
        let limits = ExecutionLimits::default();
        let result = validate_limits(10, 100, &limits);
        assert!(!result.passed);
        assert_eq!(result.violations[0].limit_name, "max_retries_total");
    }

    #[test]
    fn bounded_counter_rejects_past_limit() {
        let counter = BoundedCounter::new(3);
        assert!(counter.try_increment());
        assert!(counter.try_increment());
        assert!(counter.try_increment());
        assert!(!counter.try_increment());
        assert_eq!(counter.current(), 4);
    }
}
