//! Structured error taxonomy for the flow test engine.
//!
//! Codes are grouped by category the way the original runner grouped them
//! (`E1xxx` validation, `E2xxx` HTTP, `E3xxx` assertions, `E4xxx`
//! configuration, `E5xxx` internal), extended with the categories this
//! engine's scheduler, variable system and hook executor introduce.
//!
//! | Range | Category               |
//! |-------|------------------------|
//! | E1xxx | Validation / parsing   |
//! | E2xxx | HTTP execution         |
//! | E3xxx | Assertion              |
//! | E4xxx | Configuration          |
//! | E5xxx | Internal               |
//! | E6xxx | Scheduler              |
//! | E7xxx | Variables / calls      |
//! | E8xxx | Hooks                  |

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(u16);

impl ErrorCode {
    // E1xxx: validation / parsing
    pub const EMPTY_PLAN: Self = Self(1001);
    pub const UNSUPPORTED_SPEC_VERSION: Self = Self(1002);
    pub const UNKNOWN_ACTION: Self = Self(1003);
    pub const MISSING_PARAM: Self = Self(1004);
    pub const UNKNOWN_DEPENDENCY: Self = Self(1005);
    pub const CIRCULAR_DEPENDENCY: Self = Self(1006);
    pub const INVALID_HTTP_METHOD: Self = Self(1007);
    pub const EMPTY_STEP_ID: Self = Self(1008);
    pub const INVALID_PLAN_FORMAT: Self = Self(1009);
    pub const DUPLICATE_NODE_ID: Self = Self(1010);

    // E2xxx: HTTP execution
    pub const HTTP_TIMEOUT: Self = Self(2001);
    pub const HTTP_CONNECTION_ERROR: Self = Self(2002);
    pub const HTTP_ERROR_STATUS: Self = Self(2003);
    pub const HTTP_INVALID_JSON: Self = Self(2004);
    pub const HTTP_TLS_ERROR: Self = Self(2005);
    pub const HTTP_TRANSPORT_CANCELLED: Self = Self(2006);

    // E3xxx: assertions
    pub const ASSERTION_STATUS_CODE: Self = Self(3001);
    pub const ASSERTION_JSON_BODY: Self = Self(3002);
    pub const ASSERTION_HEADER: Self = Self(3003);
    pub const ASSERTION_LATENCY: Self = Self(3004);
    pub const ASSERTION_PATH_NOT_FOUND: Self = Self(3005);
    pub const ASSERTION_CUSTOM_JS: Self = Self(3006);
    pub const EXTRACTION_INVALID_SOURCE: Self = Self(3007);

    // E4xxx: configuration / environment
    pub const ENV_VAR_NOT_FOUND: Self = Self(4001);
    pub const CONTEXT_VAR_NOT_FOUND: Self = Self(4002);
    pub const PLAN_FILE_NOT_FOUND: Self = Self(4003);
    pub const FILE_PERMISSION_ERROR: Self = Self(4004);

    // E5xxx: internal
    pub const INTERNAL_ERROR: Self = Self(5001);
    pub const NO_EXECUTOR_FOR_ACTION: Self = Self(5002);
    pub const SERIALIZATION_ERROR: Self = Self(5003);

    // E6xxx: scheduler
    pub const CYCLE_DETECTED: Self = Self(6001);
    pub const REQUIRED_SUITE_FAILED: Self = Self(6002);
    pub const MISSING_DEPENDENCY: Self = Self(6003);

    // E7xxx: variables / calls
    pub const INTERPOLATION_MISSING: Self = Self(7001);
    pub const JS_EVAL_ERROR: Self = Self(7002);
    pub const JMES_EVAL_ERROR: Self = Self(7003);
    pub const CALL_RESOLUTION_ERROR: Self = Self(7004);
    pub const CALL_CYCLE_ERROR: Self = Self(7005);
    pub const CALL_DEPTH_EXCEEDED: Self = Self(7006);
    pub const INVALID_ITERATION: Self = Self(7007);
    pub const EXPORT_MISSING: Self = Self(7008);
    pub const FAKER_ERROR: Self = Self(7009);

    // E8xxx: hooks / input
    pub const HOOK_SCRIPT_ERROR: Self = Self(8001);
    pub const HOOK_CALL_UNAVAILABLE: Self = Self(8002);
    pub const INPUT_VALIDATION_ERROR: Self = Self(8003);

    pub fn code(&self) -> u16 {
        self.0
    }

    pub fn formatted(&self) -> String {
        format!("E{:04}", self.0)
    }

    pub fn category(&self) -> ErrorCategory {
        match self.0 / 1000 {
            1 => ErrorCategory::Validation,
            2 => ErrorCategory::HttpExecution,
            3 => ErrorCategory::Assertion,
            4 => ErrorCategory::Configuration,
            5 => ErrorCategory::Internal,
            6 => ErrorCategory::Scheduler,
            7 => ErrorCategory::Variables,
            8 => ErrorCategory::Hooks,
            _ => ErrorCategory::Unknown,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    HttpExecution,
    Assertion,
    Configuration,
    Internal,
    Scheduler,
    Variables,
    Hooks,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::HttpExecution => "http_execution",
            Self::Assertion => "assertion",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
            Self::Scheduler => "scheduler",
            Self::Variables => "variables",
            Self::Hooks => "hooks",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Additional context attached to a `StructuredError`.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub suite_id: Option<String>,
    pub step_id: Option<String>,
    pub path: Option<String>,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

#[derive(Debug)]
pub struct StructuredError {
    pub code: ErrorCode,
    pub message: String,
    pub context: Option<ErrorContext>,
}

impl StructuredError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_step_id(mut self, step_id: impl Into<String>) -> Self {
        self.context.get_or_insert_with(Default::default).step_id = Some(step_id.into());
        self
    }

    pub fn with_suite_id(mut self, suite_id: impl Into<String>) -> Self {
        self.context.get_or_insert_with(Default::default).suite_id = Some(suite_id.into());
        self
    }

    pub fn user_message(&self) -> String {
        let mut msg = format!("[{}] {}", self.code, self.message);
        if let Some(ctx) = &self.context {
            if let Some(suite_id) = &ctx.suite_id {
                msg.push_str(&format!(" (suite: {})", suite_id));
            }
            if let Some(step_id) = &ctx.step_id {
                msg.push_str(&format!(" (step: {})", step_id));
            }
            if let (Some(expected), Some(actual)) = (&ctx.expected, &ctx.actual) {
                msg.push_str(&format!(" [expected: {}, actual: {}]", expected, actual));
            }
        }
        msg
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for StructuredError {}

/// Kernel-boundary error enum. Every spec-named error kind gets a variant;
/// each carries the `ErrorCode` an operator would search for.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    #[error("http timeout: {0}")]
    HttpTimeout(String),

    #[error("http network error: {0}")]
    HttpNetwork(String),

    #[error("http transport cancelled")]
    HttpTransportCancelled,

    #[error("js evaluation error: {0}")]
    JsEvalError(String),

    #[error("jmespath evaluation error: {0}")]
    JmesEvalError(String),

    #[error("call resolution error: {0}")]
    CallResolutionError(String),

    #[error("call cycle detected: {0}")]
    CallCycleError(String),

    #[error("call depth exceeded (max {max})")]
    CallDepthExceeded { max: u32 },

    #[error("invalid iteration: {0}")]
    InvalidIteration(String),

    #[error("input validation error: {0}")]
    InputValidationError(String),

    #[error("duplicate node_id: {0}")]
    DuplicateNodeId(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AssertionFailed(_) => ErrorCode::ASSERTION_STATUS_CODE,
            Self::HttpTimeout(_) => ErrorCode::HTTP_TIMEOUT,
            Self::HttpNetwork(_) => ErrorCode::HTTP_CONNECTION_ERROR,
            Self::HttpTransportCancelled => ErrorCode::HTTP_TRANSPORT_CANCELLED,
            Self::JsEvalError(_) => ErrorCode::JS_EVAL_ERROR,
            Self::JmesEvalError(_) => ErrorCode::JMES_EVAL_ERROR,
            Self::CallResolutionError(_) => ErrorCode::CALL_RESOLUTION_ERROR,
            Self::CallCycleError(_) => ErrorCode::CALL_CYCLE_ERROR,
            Self::CallDepthExceeded { .. } => ErrorCode::CALL_DEPTH_EXCEEDED,
            Self::InvalidIteration(_) => ErrorCode::INVALID_ITERATION,
            Self::InputValidationError(_) => ErrorCode::INPUT_VALIDATION_ERROR,
            Self::DuplicateNodeId(_) => ErrorCode::DUPLICATE_NODE_ID,
            Self::Internal(_) => ErrorCode::INTERNAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_category_prefix() {
        assert_eq!(ErrorCode::EMPTY_PLAN.formatted(), "E1001");
        assert_eq!(ErrorCode::CYCLE_DETECTED.formatted(), "E6001");
        assert_eq!(ErrorCode::CALL_DEPTH_EXCEEDED.formatted(), "E7006");
    }

    #[test]
    fn categorizes_by_leading_digit() {
        assert_eq!(ErrorCode::CYCLE_DETECTED.category(), ErrorCategory::Scheduler);
        assert_eq!(ErrorCode::JS_EVAL_ERROR.category(), ErrorCategory::Variables);
        assert_eq!(ErrorCode::HOOK_SCRIPT_ERROR.category(), ErrorCategory::Hooks);
    }

    #[test]
    fn structured_error_renders_context() {
        let err = StructuredError::new(ErrorCode::CALL_CYCLE_ERROR, "cycle in call stack")
            .with_suite_id("checkout")
            .with_step_id("login");
        let msg = err.user_message();
        assert!(msg.contains("E7005"));
        assert!(msg.contains("checkout"));
        assert!(msg.contains("login"));
    }

    #[test]
    fn engine_error_maps_to_expected_code() {
        assert_eq!(EngineError::CallDepthExceeded { max: 16 }.code(), ErrorCode::CALL_DEPTH_EXCEEDED);
    }
}
