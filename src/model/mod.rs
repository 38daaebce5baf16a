//! Suite/step data model, materialized from the YAML suite format the
//! same way the reference `protocol` module materialized UTDL JSON into
//! `Plan`/`Step`/`Assertion` structs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// `{critical, high, medium, low}`; weights used for scheduler tie-breaks
/// (critical=4, high=3, medium=2, low=1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    pub fn weight(&self) -> u8 {
        match self {
            Priority::Critical => 4,
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    /// A suite is required by default iff its priority is critical or high.
    pub fn is_required_by_default(&self) -> bool {
        matches!(self, Priority::Critical | Priority::High)
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteMetadata {
    #[serde(default)]
    pub priority: Priority,
    /// Overrides the default required-by-priority policy when present.
    #[serde(default)]
    pub required: Option<bool>,
    /// Estimated duration used as a scheduler tie-break (ascending).
    #[serde(default)]
    pub estimated_duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificateRef {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
    pub ca_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Suite {
    pub node_id: String,
    pub suite_name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default)]
    pub exports_optional: Vec<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub metadata: Option<SuiteMetadata>,
    #[serde(default)]
    pub certificate: Option<CertificateRef>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Suite {
    pub fn priority(&self) -> Priority {
        self.metadata.as_ref().map(|m| m.priority).unwrap_or_default()
    }

    pub fn is_required(&self) -> bool {
        match self.metadata.as_ref().and_then(|m| m.required) {
            Some(flag) => flag,
            None => self.priority().is_required_by_default(),
        }
    }
}

/// `when ∈ {pre_execution, post_capture}`; bare-string form is sugar for
/// `{condition, when: pre_execution}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipWhen {
    PreExecution,
    PostCapture,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SkipSpec {
    Condition(String),
    Full {
        condition: String,
        #[serde(default = "default_skip_when")]
        when: SkipWhen,
    },
}

fn default_skip_when() -> SkipWhen {
    SkipWhen::PreExecution
}

impl SkipSpec {
    pub fn condition(&self) -> &str {
        match self {
            SkipSpec::Condition(c) => c,
            SkipSpec::Full { condition, .. } => condition,
        }
    }

    pub fn when(&self) -> SkipWhen {
        match self {
            SkipSpec::Condition(_) => SkipWhen::PreExecution,
            SkipSpec::Full { when, .. } => *when,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelaySpec {
    Fixed(u64),
    Templated(String),
    Range { min: u64, max: u64 },
}

/// Action keys fire in the fixed order compute→capture→validate→log→
/// metric→script→call→wait→exports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hook {
    #[serde(default)]
    pub compute: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub capture: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub validate: Option<Vec<ValidateEntry>>,
    #[serde(default)]
    pub log: Option<LogEntry>,
    #[serde(default)]
    pub metric: Option<MetricEntry>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub call: Option<CallSpec>,
    #[serde(default)]
    pub wait: Option<u64>,
    #[serde(default)]
    pub exports: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Error
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateEntry {
    pub expression: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub metadata: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEntry {
    pub name: String,
    pub value: Value,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpec {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub query: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub certificate: Option<CertificateRef>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub pre_script: Option<String>,
    #[serde(default)]
    pub post_script: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Text,
    Email,
    Url,
    Password,
    Number,
    Select,
    Confirm,
    Multiline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputPromptSpec {
    pub variable: String,
    pub prompt: String,
    #[serde(default)]
    pub kind: Option<InputKind>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub ci_default: Option<Value>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    pub prompts: Vec<InputPromptSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSpec {
    pub test: String,
    pub step: String,
    #[serde(default)]
    pub variables: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub isolate_context: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioBranch {
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub then: Option<ScenarioThen>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioThen {
    #[serde(default)]
    pub assertions: Option<Value>,
    #[serde(default)]
    pub capture: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub set: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub call: Option<CallSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    #[serde(default)]
    pub request: Option<RequestSpec>,
    pub branches: Vec<ScenarioBranch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IterateSpec {
    Over { over: String, r#as: String },
    Range { range: String, r#as: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub step_id: Option<String>,
    #[serde(default)]
    pub skip: Option<SkipSpec>,
    #[serde(default)]
    pub continue_on_failure: bool,
    #[serde(default)]
    pub before: Vec<Hook>,
    #[serde(default)]
    pub after: Vec<Hook>,
    #[serde(default)]
    pub iterate: Option<IterateSpec>,
    #[serde(default)]
    pub scenarios: Option<ScenarioSpec>,
    #[serde(default)]
    pub input: Option<InputSpec>,
    #[serde(default)]
    pub call: Option<CallSpec>,
    #[serde(default)]
    pub request: Option<RequestSpec>,
    #[serde(default)]
    pub assertions: Option<Value>,
    #[serde(default)]
    pub capture: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub delay: Option<DelaySpec>,
}

/// Dispatch priority, highest first: Iterated, Call, Scenario, Input, Request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Iterated,
    Call,
    Scenario,
    Input,
    Request,
}

impl Step {
    pub fn kind(&self) -> StepKind {
        if self.iterate.is_some() {
            StepKind::Iterated
        } else if self.call.is_some() {
            StepKind::Call
        } else if self.scenarios.is_some() {
            StepKind::Scenario
        } else if self.input.is_some() {
            StepKind::Input
        } else {
            StepKind::Request
        }
    }

    /// Returns a copy of this step with `iterate` cleared, used by the
    /// iterated strategy to re-dispatch each expanded iteration.
    pub fn without_iterate(&self) -> Step {
        let mut clone = self.clone();
        clone.iterate = None;
        clone
    }
}

/// `{stepId, qualifiedStepId, normalizedQualifiedStepId}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepIdentifier {
    pub step_id: String,
    pub qualified_step_id: String,
    pub normalized_qualified_step_id: String,
}

impl StepIdentifier {
    pub fn new(suite_node_id: &str, step: &Step, index: usize) -> Self {
        let step_id = step
            .step_id
            .clone()
            .unwrap_or_else(|| format!("step-{}", index + 1));
        let qualified_step_id = format!("{}::{}", suite_node_id, step_id);
        let normalized_qualified_step_id = normalize_step_id(&qualified_step_id);
        Self {
            step_id,
            qualified_step_id,
            normalized_qualified_step_id,
        }
    }
}

/// lowercase, spaces→`-`, non-`[a-z0-9_.:-]`→`-`, collapse/strip `-`;
/// empty result falls back to `step-1` (caller supplies the index-based
/// default separately when normalizing a bare, unindexed id).
pub fn normalize_step_id(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        if ch == ' ' {
            out.push('-');
        } else if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | ':' | '-') {
            out.push(ch);
        } else {
            out.push('-');
        }
    }
    let collapsed = collapse_dashes(&out);
    let trimmed = collapsed.trim_matches('-').to_string();
    if trimmed.is_empty() {
        "step-1".to_string()
    } else {
        trimmed
    }
}

fn collapse_dashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_dash = false;
    for ch in s.chars() {
        if ch == '-' {
            if !prev_dash {
                out.push(ch);
            }
            prev_dash = true;
        } else {
            out.push(ch);
            prev_dash = false;
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failure,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionResult {
    pub field: String,
    pub expected: Value,
    pub actual: Value,
    pub passed: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioMeta {
    pub selected_branch: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IterationResult {
    pub children: Vec<StepResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub qualified_step_id: String,
    pub name: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub raw_url: Option<String>,
    pub status_code: Option<u16>,
    pub response_headers: Option<HashMap<String, String>>,
    pub response_body: Option<Value>,
    pub size_bytes: Option<u64>,
    pub assertions_results: Vec<AssertionResult>,
    pub captured_variables: HashMap<String, Value>,
    pub propagated_variables: HashMap<String, Value>,
    pub available_variables: HashMap<String, Value>,
    pub scenario_meta: Option<ScenarioMeta>,
    pub iteration_result: Option<IterationResult>,
    pub error_message: Option<String>,
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, StepStatus::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteStatus {
    Resolved,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyResult {
    pub node_id: String,
    pub status: SuiteStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub node_id: String,
    pub suite_name: String,
    pub status: SuiteStatus,
    pub cached: bool,
    pub duration_ms: u64,
    pub step_results: Vec<StepResult>,
    pub error_message: Option<String>,
    pub dependency_results: Vec<DependencyResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_suites: usize,
    pub resolved: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub summary: ExecutionSummary,
    pub suite_results: Vec<SuiteResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_weights_order_critical_high_medium_low() {
        assert!(Priority::Critical.weight() > Priority::High.weight());
        assert!(Priority::High.weight() > Priority::Medium.weight());
        assert!(Priority::Medium.weight() > Priority::Low.weight());
    }

    #[test]
    fn required_by_default_only_for_critical_and_high() {
        assert!(Priority::Critical.is_required_by_default());
        assert!(Priority::High.is_required_by_default());
        assert!(!Priority::Medium.is_required_by_default());
        assert!(!Priority::Low.is_required_by_default());
    }

    #[test]
    fn normalize_step_id_is_idempotent() {
        let raw = "  Login User!! --Flow  ";
        let once = normalize_step_id(raw);
        let twice = normalize_step_id(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "login-user-flow");
    }

    #[test]
    fn normalize_step_id_empty_falls_back() {
        assert_eq!(normalize_step_id("!!!"), "step-1");
    }

    #[test]
    fn step_kind_dispatch_priority_iterated_beats_call() {
        let step = Step {
            name: "x".into(),
            step_id: None,
            skip: None,
            continue_on_failure: false,
            before: vec![],
            after: vec![],
            iterate: Some(IterateSpec::Range {
                range: "1..2".into(),
                r#as: "i".into(),
            }),
            scenarios: None,
            input: None,
            call: Some(CallSpec {
                test: "other".into(),
                step: "s".into(),
                variables: None,
                alias: None,
                timeout: None,
                isolate_context: None,
            }),
            request: None,
            assertions: None,
            capture: None,
            delay: None,
        };
        assert_eq!(step.kind(), StepKind::Iterated);
    }
}
