//! Suite executor: runs one `Suite`'s steps against a shared
//! `GlobalRegistry`, and (via `dispatch_single_step`) the single-step path
//! the call and iterated strategies recurse through.
//!
//! Grounded in the pack's `execute_step_with_retry`/`execute_sequential`
//! control flow (ordered pre-checks, dispatch, post-checks, halt-on-failure)
//! generalized from "one linear plan" to the filter/skip/hook/dispatch
//! pipeline, and the reference `planner` module for the surrounding
//! per-suite bookkeeping (export registration, duration accounting).

use crate::assertions::{self};
use crate::capture;
use crate::collaborators::certificate::CertificateService;
use crate::collaborators::http::HttpClient;
use crate::collaborators::input::InputPrompter;
use crate::collaborators::SuiteSource;
use crate::context::{skip, GlobalRegistry, Interpolator, VariableContext};
use crate::dispatch;
use crate::faker::FakerProvider;
use crate::limits::ExecutionLimits;
use crate::model::{
    AssertionResult, DependencyResult, ScenarioMeta, Step, StepIdentifier, StepKind, StepResult,
    StepStatus, Suite, SuiteResult, SuiteStatus,
};
use crate::observer::{Observer, StepContextInfo};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Variable names never surfaced in a `StepResult.available_variables`
/// projection, matching the ambient process environment the reference own
/// `std::env::vars()` reads would otherwise leak into reports.
const ALWAYS_EXCLUDE_VARIABLES: &[&str] = &[
    "PATH", "HOME", "USER", "SHELL", "PWD", "LANG", "TERM", "HOSTNAME", "SSH_AUTH_SOCK",
];

/// Upper bound on how many entries `available_variables` carries, so a
/// suite with hundreds of captured variables doesn't balloon every
/// `StepResult`.
const MAX_AVAILABLE_VARIABLES: usize = 200;

/// Parsed `step_ids` runtime filter: a bare entry matches any
/// suite's step by its own `step_id`; a `suite::step`/`suite:step` entry
/// matches only that suite, compared against the normalized qualified id.
#[derive(Debug, Clone, Default)]
pub struct StepFilter {
    simple: HashSet<String>,
    qualified: HashSet<String>,
}

impl StepFilter {
    pub fn from_entries(entries: &[String]) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        let mut simple = HashSet::new();
        let mut qualified = HashSet::new();
        for entry in entries {
            match split_qualified(entry) {
                Some((suite, step)) => {
                    qualified.insert(crate::model::normalize_step_id(&format!("{}::{}", suite, step)));
                }
                None => {
                    simple.insert(entry.clone());
                }
            }
        }
        Some(Self { simple, qualified })
    }

    fn allows(&self, identifier: &StepIdentifier) -> bool {
        self.simple.contains(&identifier.step_id) || self.qualified.contains(&identifier.normalized_qualified_step_id)
    }
}

fn split_qualified(entry: &str) -> Option<(&str, &str)> {
    entry.split_once("::").or_else(|| entry.split_once(':'))
}

/// The collaborators a `SuiteExecutor` drives (the kernel's "explicitly out
/// of scope" list, made concrete): HTTP transport, suite discovery,
/// interactive prompting, certificate resolution, faker data, lifecycle
/// observation, and the resource limits/step filter that bound a run.
pub struct Services {
    pub source: Arc<dyn SuiteSource>,
    pub http: Arc<dyn HttpClient>,
    pub prompter: Arc<dyn InputPrompter>,
    pub certificate_service: Arc<dyn CertificateService>,
    pub faker: Arc<dyn FakerProvider>,
    pub observer: Arc<dyn Observer>,
    pub limits: ExecutionLimits,
    pub ci_mode: bool,
    pub step_filter: Option<StepFilter>,
    /// Process environment snapshot installed into a fresh suite's
    /// `environment` scope; taken once so every suite in a run sees the
    /// same values regardless of when it executes.
    pub environment: HashMap<String, Value>,
}

impl Services {
    pub fn from_env(
        source: Arc<dyn SuiteSource>,
        http: Arc<dyn HttpClient>,
        prompter: Arc<dyn InputPrompter>,
        certificate_service: Arc<dyn CertificateService>,
        faker: Arc<dyn FakerProvider>,
        observer: Arc<dyn Observer>,
        limits: ExecutionLimits,
        ci_mode: bool,
        step_filter: Option<StepFilter>,
    ) -> Self {
        let environment = std::env::vars().map(|(k, v)| (k, Value::String(v))).collect();
        Self {
            source,
            http,
            prompter,
            certificate_service,
            faker,
            observer,
            limits,
            ci_mode,
            step_filter,
            environment,
        }
    }
}

pub struct SuiteExecutor {
    pub services: Services,
    pub call_guard: crate::call::CallGuard,
}

impl SuiteExecutor {
    pub fn new(services: Services) -> Self {
        let call_guard = crate::call::CallGuard::new(services.limits.max_call_depth);
        Self { services, call_guard }
    }

    /// Runs every step of `suite` against a fresh variable context, per the
    /// eight-step per-suite protocol.
    pub async fn run_suite(&self, suite: Suite, registry: Arc<Mutex<GlobalRegistry>>) -> SuiteResult {
        let start = Instant::now();
        self.services.observer.on_suite_start(&suite);

        // 2) register this suite's exports/exports_optional names so
        // downstream hooks (and this suite's own `hook_*` exports) can
        // publish against the right node_id from the very first step.
        let export_names: HashSet<String> = suite
            .exports
            .iter()
            .chain(suite.exports_optional.iter())
            .cloned()
            .collect();
        {
            let mut guard = registry.lock().await;
            guard.register_node(&suite.node_id, &suite.suite_name, export_names);
        }

        // 3) scope cleanup: fresh runtime/suite/imported scopes; environment
        // is installed from the process snapshot taken at executor
        // construction, and the global registry is untouched.
        let mut vars = VariableContext::new();
        vars.clear_non_global();
        vars.environment = self.services.environment.clone();

        // 4) install suite-level variables, interpolated against the
        // scopes already loaded (environment only, at this point).
        {
            let snapshot = registry.lock().await.clone();
            let interp = Interpolator::new(&vars, &snapshot, self.services.faker.as_ref());
            let resolved: Vec<(String, Value)> = suite
                .variables
                .iter()
                .map(|(k, v)| (k.clone(), interp.interpolate_value(v)))
                .collect();
            for (k, v) in resolved {
                vars.suite.insert(k, v);
            }
        }

        // 5) base_url, if present, is interpolated and installed on the
        // shared HttpClient; its timeout is capped (never raised) to the
        // configured per-step ceiling.
        if let Some(base_url) = &suite.base_url {
            let snapshot = registry.lock().await.clone();
            let interp = Interpolator::new(&vars, &snapshot, self.services.faker.as_ref());
            let resolved = interp.interpolate_str(base_url);
            // Installed into suite scope (not just the HttpClient) so a
            // literal `{{base_url}}` token in a request/scenario URL
            // template resolves through the ordinary interpolator.
            vars.suite.insert("base_url".to_string(), Value::String(resolved.clone()));
            self.services.http.set_base_url(Some(resolved));
            let capped = self.services.http.timeout().min(self.services.limits.max_step_timeout);
            self.services.http.set_timeout(capped);
        }

        // 6) the step filter set is computed once for the whole run, at
        // `Services` construction; nothing to recompute here.

        let mut step_results = Vec::with_capacity(suite.steps.len());
        let mut halted = false;

        for (index, step) in suite.steps.iter().enumerate() {
            let identifier = StepIdentifier::new(&suite.node_id, step, index);

            let included = match &self.services.step_filter {
                Some(filter) => filter.allows(&identifier),
                None => true,
            };
            if !included {
                continue;
            }

            let ctx_info = StepContextInfo {
                suite_node_id: suite.node_id.clone(),
                qualified_step_id: identifier.qualified_step_id.clone(),
            };
            self.services.observer.on_step_start(step, &ctx_info);

            let result = self.dispatch_single_step(&suite, step, index, &mut vars, &registry).await;

            self.services.observer.on_step_end(step, &result, &ctx_info);
            let failed = matches!(result.status, StepStatus::Failure);
            step_results.push(result);

            if failed && !step.continue_on_failure {
                halted = true;
                break;
            }
        }

        // 8) resolve and publish this suite's declared exports.
        {
            let mut guard = registry.lock().await;
            for name in &suite.exports {
                match vars.runtime.get(name).or_else(|| vars.suite.get(name)) {
                    Some(value) => guard.set_exported(&suite.node_id, name, value.clone()),
                    None => tracing::warn!(
                        export = %name,
                        node_id = %suite.node_id,
                        "required export not found in suite scope"
                    ),
                }
            }
            for name in &suite.exports_optional {
                if let Some(value) = vars.runtime.get(name).or_else(|| vars.suite.get(name)) {
                    guard.set_exported(&suite.node_id, name, value.clone());
                }
            }
        }

        let status = if halted {
            SuiteStatus::Failed
        } else {
            SuiteStatus::Resolved
        };
        let error_message = if halted {
            step_results
                .last()
                .and_then(|r| r.error_message.clone())
                .or_else(|| Some(format!("suite '{}' halted on a required step failure", suite.node_id)))
        } else {
            None
        };

        let dependency_results = suite
            .depends
            .iter()
            .map(|d| DependencyResult {
                node_id: d.clone(),
                status: SuiteStatus::Resolved,
            })
            .collect();

        let result = SuiteResult {
            node_id: suite.node_id.clone(),
            suite_name: suite.suite_name.clone(),
            status,
            cached: false,
            duration_ms: start.elapsed().as_millis() as u64,
            step_results,
            error_message,
            dependency_results,
        };
        self.services.observer.on_suite_end(&suite, &result);
        result
    }

    /// Runs one step end to end: pre_execution skip check, before-hooks,
    /// strategy dispatch, post_capture skip check, after-hooks. Shared by
    /// the per-suite step loop above and the call/iterated strategies,
    /// which recurse into this same path for a single nested step.
    pub async fn dispatch_single_step(
        &self,
        suite: &Suite,
        step: &Step,
        index: usize,
        vars: &mut VariableContext,
        registry: &Mutex<GlobalRegistry>,
    ) -> StepResult {
        let start = Instant::now();
        let identifier = StepIdentifier::new(&suite.node_id, step, index);

        if let Some(skip_spec) = &step.skip {
            if skip_spec.when() == crate::model::SkipWhen::PreExecution {
                let snapshot = registry.lock().await.clone();
                let interp = Interpolator::new(vars, &snapshot, self.services.faker.as_ref());
                let context = hook_context(vars, None, None, None, &HashMap::new(), &[]);
                if skip::should_skip(skip_spec.condition(), &interp, &context) {
                    return skipped_result(&identifier, step, start.elapsed());
                }
            }
        }

        let call_delegate: &dyn crate::hooks::CallDelegate = self;
        {
            let mut guard = registry.lock().await;
            let pre_context = hook_context(vars, None, None, None, &HashMap::new(), &[]);
            crate::hooks::run_hooks(&step.before, vars, &mut guard, &step.name, &pre_context, Some(call_delegate)).await;
        }

        let outcome = self.run_strategy(suite, step, index, vars, registry).await;

        let mut result = StepResult {
            step_id: identifier.step_id.clone(),
            qualified_step_id: identifier.qualified_step_id.clone(),
            name: step.name.clone(),
            status: if outcome.success { StepStatus::Success } else { StepStatus::Failure },
            duration_ms: 0,
            raw_url: outcome.raw_url,
            status_code: outcome.status_code,
            response_headers: outcome.response_headers.clone(),
            response_body: outcome.response_body.clone(),
            size_bytes: outcome.size_bytes,
            assertions_results: outcome.assertions_results,
            captured_variables: outcome.captured_variables.clone(),
            propagated_variables: outcome.propagated_variables,
            available_variables: project_available_variables(vars, suite),
            scenario_meta: outcome.scenario_meta,
            iteration_result: outcome.iteration_result,
            error_message: outcome.error_message,
        };

        if let Some(skip_spec) = &step.skip {
            if skip_spec.when() == crate::model::SkipWhen::PostCapture {
                let snapshot = registry.lock().await.clone();
                let interp = Interpolator::new(vars, &snapshot, self.services.faker.as_ref());
                let response_ctx = response_context(&result);
                let context = hook_context(
                    vars,
                    Some(&response_ctx),
                    None,
                    None,
                    &result.captured_variables,
                    &result.assertions_results,
                );
                if skip::should_skip(skip_spec.condition(), &interp, &context) {
                    result.status = StepStatus::Skipped;
                }
            }
        }

        {
            let mut guard = registry.lock().await;
            let response_ctx = response_context(&result);
            let post_context = hook_context(
                vars,
                Some(&response_ctx),
                None,
                None,
                &result.captured_variables,
                &result.assertions_results,
            );
            crate::hooks::run_hooks(&step.after, vars, &mut guard, &step.name, &post_context, Some(call_delegate)).await;
        }

        if let Some(delay) = &step.delay {
            apply_delay(delay, vars, registry, self.services.faker.as_ref()).await;
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }

    async fn run_strategy(
        &self,
        suite: &Suite,
        step: &Step,
        index: usize,
        vars: &mut VariableContext,
        registry: &Mutex<GlobalRegistry>,
    ) -> StrategyOutcome {
        match step.kind() {
            StepKind::Iterated => {
                let spec = step.iterate.as_ref().expect("iterate present by StepKind::Iterated");
                let outcome = dispatch::iterated::run(self, suite, step, index, spec, vars, registry).await;
                StrategyOutcome {
                    iteration_result: Some(outcome.iteration_result),
                    success: outcome.success,
                    error_message: outcome.error_message,
                    ..StrategyOutcome::empty()
                }
            }
            StepKind::Call => {
                let spec = step.call.as_ref().expect("call present by StepKind::Call");
                let outcome = dispatch::call::run(self, spec, vars, registry).await;
                for (name, value) in &outcome.propagated_variables {
                    vars.set_runtime(name.clone(), value.clone());
                }
                StrategyOutcome {
                    propagated_variables: outcome.propagated_variables,
                    success: outcome.success,
                    error_message: outcome.error_message,
                    ..StrategyOutcome::empty()
                }
            }
            StepKind::Scenario => {
                let spec = step.scenarios.as_ref().expect("scenarios present by StepKind::Scenario");
                let outcome = dispatch::scenario::run(
                    self,
                    &identifier_step_id(suite, step, index),
                    spec,
                    suite.certificate.as_ref(),
                    step.assertions.as_ref(),
                    step.capture.as_ref(),
                    vars,
                    registry,
                )
                .await;
                StrategyOutcome {
                    status_code: outcome.status_code,
                    response_headers: outcome.response_headers,
                    response_body: outcome.response_body,
                    size_bytes: outcome.size_bytes,
                    raw_url: outcome.raw_url,
                    assertions_results: outcome.assertions_results,
                    captured_variables: outcome.captured_variables,
                    propagated_variables: outcome.propagated_variables,
                    scenario_meta: Some(ScenarioMeta {
                        selected_branch: outcome.selected_branch,
                    }),
                    success: outcome.success,
                    error_message: outcome.error_message,
                    iteration_result: None,
                }
            }
            StepKind::Input => {
                let spec = step.input.as_ref().expect("input present by StepKind::Input");
                let outcome = dispatch::input::run(spec, vars, self.services.prompter.as_ref(), self.services.ci_mode).await;
                StrategyOutcome {
                    captured_variables: outcome.captured,
                    success: outcome.success,
                    error_message: outcome.error_message,
                    ..StrategyOutcome::empty()
                }
            }
            StepKind::Request => {
                let spec = step.request.as_ref().expect("request present by StepKind::Request");
                let snapshot = registry.lock().await.clone();
                let outcome = dispatch::request::run(
                    &identifier_step_id(suite, step, index),
                    spec,
                    suite.certificate.as_ref(),
                    vars,
                    &snapshot,
                    self.services.http.as_ref(),
                    self.services.faker.as_ref(),
                    self.services.certificate_service.as_ref(),
                    self.services.http.timeout(),
                )
                .await;

                if !outcome.success {
                    return StrategyOutcome {
                        status_code: outcome.status_code,
                        response_headers: outcome.response_headers,
                        response_body: outcome.response_body,
                        size_bytes: outcome.size_bytes,
                        raw_url: outcome.raw_url,
                        success: false,
                        error_message: outcome.error_message,
                        ..StrategyOutcome::empty()
                    };
                }

                let response_ctx = assertions::build_context(
                    outcome.status_code.unwrap_or(0),
                    outcome.response_headers.as_ref().unwrap_or(&HashMap::new()),
                    outcome.response_body.as_ref().unwrap_or(&Value::Null),
                    outcome.duration_ms,
                    outcome.size_bytes.unwrap_or(0),
                );

                let mut assertions_results = Vec::new();
                let mut success = true;
                if let Some(raw) = &step.assertions {
                    let normalized = assertions::normalize(raw);
                    assertions_results = assertions::evaluate(&normalized, &response_ctx);
                    success = assertions_results.iter().all(|r| r.passed);
                }

                let mut captured_variables = HashMap::new();
                if let Some(capture_spec) = &step.capture {
                    let captured = capture::capture_all(capture_spec, &response_ctx);
                    for (name, value) in captured {
                        vars.set_runtime(name.clone(), value.clone());
                        captured_variables.insert(name, value);
                    }
                }

                StrategyOutcome {
                    status_code: outcome.status_code,
                    response_headers: outcome.response_headers,
                    response_body: outcome.response_body,
                    size_bytes: outcome.size_bytes,
                    raw_url: outcome.raw_url,
                    assertions_results,
                    captured_variables,
                    success,
                    error_message: None,
                    ..StrategyOutcome::empty()
                }
            }
        }
    }
}

/// Bridges the call strategy's recursive dispatch without re-deriving a
/// request identifier: `suite::step` by index matches how the dispatcher
/// already names a step for retry/telemetry purposes.
fn identifier_step_id(suite: &Suite, step: &Step, index: usize) -> String {
    StepIdentifier::new(&suite.node_id, step, index).qualified_step_id
}

#[derive(Default)]
struct StrategyOutcome {
    status_code: Option<u16>,
    response_headers: Option<HashMap<String, String>>,
    response_body: Option<Value>,
    size_bytes: Option<u64>,
    raw_url: Option<String>,
    assertions_results: Vec<AssertionResult>,
    captured_variables: HashMap<String, Value>,
    propagated_variables: HashMap<String, Value>,
    scenario_meta: Option<ScenarioMeta>,
    iteration_result: Option<crate::model::IterationResult>,
    success: bool,
    error_message: Option<String>,
}

impl StrategyOutcome {
    fn empty() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }
}

fn skipped_result(identifier: &StepIdentifier, step: &Step, elapsed: Duration) -> StepResult {
    StepResult {
        step_id: identifier.step_id.clone(),
        qualified_step_id: identifier.qualified_step_id.clone(),
        name: step.name.clone(),
        status: StepStatus::Skipped,
        duration_ms: elapsed.as_millis() as u64,
        raw_url: None,
        status_code: None,
        response_headers: None,
        response_body: None,
        size_bytes: None,
        assertions_results: Vec::new(),
        captured_variables: HashMap::new(),
        propagated_variables: HashMap::new(),
        available_variables: HashMap::new(),
        scenario_meta: None,
        iteration_result: None,
        error_message: None,
    }
}

fn response_context(result: &StepResult) -> Value {
    assertions::build_context(
        result.status_code.unwrap_or(0),
        result.response_headers.as_ref().unwrap_or(&HashMap::new()),
        result.response_body.as_ref().unwrap_or(&Value::Null),
        result.duration_ms,
        result.size_bytes.unwrap_or(0),
    )
}

/// Builds the merged JMESPath context hooks see for `capture`/`validate`
/// the response fields (if any) plus `variables`,
/// `captured`, and `assertionResults`.
fn hook_context(
    vars: &VariableContext,
    response: Option<&Value>,
    input_result: Option<&Value>,
    call_result: Option<&Value>,
    captured: &HashMap<String, Value>,
    assertion_results: &[AssertionResult],
) -> Value {
    let mut map = match response {
        Some(Value::Object(m)) => m.clone(),
        _ => serde_json::Map::new(),
    };

    let mut variables = serde_json::Map::new();
    for (k, v) in &vars.runtime {
        variables.insert(k.clone(), v.clone());
    }
    for (k, v) in &vars.suite {
        variables.entry(k.clone()).or_insert_with(|| v.clone());
    }
    for (k, v) in &vars.imported {
        variables.entry(k.clone()).or_insert_with(|| v.clone());
    }
    for (k, v) in &vars.environment {
        variables.entry(k.clone()).or_insert_with(|| v.clone());
    }
    map.insert("variables".to_string(), Value::Object(variables));

    if let Some(input) = input_result {
        map.insert("input".to_string(), input.clone());
    }
    if let Some(call_result) = call_result {
        map.insert("call_result".to_string(), call_result.clone());
    }
    if !captured.is_empty() {
        let captured_obj: serde_json::Map<String, Value> =
            captured.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        map.insert("captured".to_string(), Value::Object(captured_obj));
    }
    if !assertion_results.is_empty() {
        let arr = assertion_results
            .iter()
            .map(|r| serde_json::to_value(r).unwrap_or(Value::Null))
            .collect();
        map.insert("assertionResults".to_string(), Value::Array(arr));
    }

    Value::Object(map)
}

/// Always-include keys plus a masked/size-bounded snapshot of every scope,
/// in precedence order (later scopes filling gaps only), excluding the
/// process environment's ambient noise (the "available-variable
/// projection"; algorithmic details beyond the include/exclude lists are
/// resolved as documented in DESIGN.md).
fn project_available_variables(vars: &VariableContext, suite: &Suite) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    out.insert("suite_name".to_string(), Value::String(suite.suite_name.clone()));
    out.insert("node_id".to_string(), Value::String(suite.node_id.clone()));
    if let Some(base_url) = &suite.base_url {
        out.insert("base_url".to_string(), Value::String(base_url.clone()));
    }

    for scope in [&vars.runtime, &vars.suite, &vars.imported, &vars.environment] {
        for (k, v) in scope {
            if out.len() >= MAX_AVAILABLE_VARIABLES {
                return out;
            }
            if ALWAYS_EXCLUDE_VARIABLES.contains(&k.as_str()) {
                continue;
            }
            out.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
    out
}

async fn apply_delay(
    delay: &crate::model::DelaySpec,
    vars: &VariableContext,
    registry: &Mutex<GlobalRegistry>,
    faker: &dyn FakerProvider,
) {
    let ms = match delay {
        crate::model::DelaySpec::Fixed(ms) => *ms,
        crate::model::DelaySpec::Templated(template) => {
            let snapshot = registry.lock().await.clone();
            let interp = Interpolator::new(vars, &snapshot, faker);
            interp
                .interpolate_string_value(template)
                .as_u64()
                .unwrap_or(0)
        }
        crate::model::DelaySpec::Range { min, max } => {
            if *max <= *min {
                *min
            } else {
                rand::Rng::gen_range(&mut rand::thread_rng(), *min..=*max)
            }
        }
    };
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_filter_matches_bare_and_qualified_entries() {
        let filter = StepFilter::from_entries(&["login".to_string(), "checkout::pay".to_string()]).unwrap();
        let bare = StepIdentifier {
            step_id: "login".to_string(),
            qualified_step_id: "any::login".to_string(),
            normalized_qualified_step_id: "any::login".to_string(),
        };
        assert!(filter.allows(&bare));

        let qualified = StepIdentifier {
            step_id: "pay".to_string(),
            qualified_step_id: "checkout::pay".to_string(),
            normalized_qualified_step_id: "checkout::pay".to_string(),
        };
        assert!(filter.allows(&qualified));

        let excluded = StepIdentifier {
            step_id: "pay".to_string(),
            qualified_step_id: "other::pay".to_string(),
            normalized_qualified_step_id: "other::pay".to_string(),
        };
        assert!(!filter.allows(&excluded));
    }

    #[test]
    fn empty_filter_entries_yield_no_filter() {
        assert!(StepFilter::from_entries(&[]).is_none());
    }

    #[test]
    fn available_variables_always_includes_suite_identity() {
        let vars = VariableContext::new();
        let suite = Suite {
            node_id: "checkout".to_string(),
            suite_name: "Checkout".to_string(),
            base_url: Some("http://api.test".to_string()),
            variables: HashMap::new(),
            exports: vec![],
            exports_optional: vec![],
            depends: vec![],
            metadata: None,
            certificate: None,
            steps: vec![],
        };
        let projected = project_available_variables(&vars, &suite);
        assert_eq!(projected.get("node_id"), Some(&Value::from("checkout")));
        assert_eq!(projected.get("base_url"), Some(&Value::from("http://api.test")));
    }

    #[test]
    fn available_variables_excludes_ambient_process_keys() {
        let mut vars = VariableContext::new();
        vars.environment.insert("PATH".to_string(), Value::from("/bin"));
        vars.environment.insert("API_KEY".to_string(), Value::from("abc"));
        let suite = Suite {
            node_id: "n".to_string(),
            suite_name: "N".to_string(),
            base_url: None,
            variables: HashMap::new(),
            exports: vec![],
            exports_optional: vec![],
            depends: vec![],
            metadata: None,
            certificate: None,
            steps: vec![],
        };
        let projected = project_available_variables(&vars, &suite);
        assert!(!projected.contains_key("PATH"));
        assert_eq!(projected.get("API_KEY"), Some(&Value::from("abc")));
    }

    use crate::collaborators::certificate::NoopCertificateService;
    use crate::collaborators::http::{HttpResponse, MockHttpClient};
    use crate::collaborators::input::DialoguerInputPrompter;
    use crate::collaborators::source::FileSuiteSource;
    use crate::faker::DefaultFakerProvider;
    use crate::observer::NullObserver;
    use serde_json::json;
    use std::io::Write;

    fn write_suite(dir: &std::path::Path, file_name: &str, yaml: &str) {
        let mut f = std::fs::File::create(dir.join(file_name)).unwrap();
        f.write_all(yaml.as_bytes()).unwrap();
    }

    fn test_executor(source_dir: &std::path::Path, http: Arc<MockHttpClient>) -> SuiteExecutor {
        let source = Arc::new(FileSuiteSource::new(source_dir));
        let services = Services::from_env(
            source,
            http,
            Arc::new(DialoguerInputPrompter),
            Arc::new(NoopCertificateService),
            Arc::new(DefaultFakerProvider),
            Arc::new(NullObserver),
            ExecutionLimits::default(),
            true,
            None,
        );
        SuiteExecutor::new(services)
    }

    #[tokio::test]
    async fn post_capture_skip_retags_status_but_keeps_captures_visible_downstream() {
        let dir = tempfile::tempdir().unwrap();
        write_suite(
            dir.path(),
            "flow.yaml",
            "node_id: flow\n\
             suite_name: Flow\n\
             base_url: http://api.test\n\
             steps:\n\
             \x20\x20- name: maybe-skip\n\
             \x20\x20\x20\x20step_id: maybe-skip\n\
             \x20\x20\x20\x20skip:\n\
             \x20\x20\x20\x20\x20\x20condition: \"body.skip == true\"\n\
             \x20\x20\x20\x20\x20\x20when: post_capture\n\
             \x20\x20\x20\x20request:\n\
             \x20\x20\x20\x20\x20\x20method: GET\n\
             \x20\x20\x20\x20\x20\x20url: /flag\n\
             \x20\x20\x20\x20capture:\n\
             \x20\x20\x20\x20\x20\x20flag: body.flag\n\
             \x20\x20- name: downstream\n\
             \x20\x20\x20\x20step_id: downstream\n\
             \x20\x20\x20\x20request:\n\
             \x20\x20\x20\x20\x20\x20method: GET\n\
             \x20\x20\x20\x20\x20\x20url: /next\n",
        );

        let http = Arc::new(MockHttpClient::new());
        http.on(
            "GET",
            "http://api.test/flag",
            HttpResponse {
                status_code: 200,
                headers: HashMap::new(),
                body: json!({"skip": true, "flag": "carried-over"}),
                size_bytes: 10,
                duration_ms: 1,
            },
        );
        http.on(
            "GET",
            "http://api.test/next",
            HttpResponse {
                status_code: 200,
                headers: HashMap::new(),
                body: Value::Null,
                size_bytes: 0,
                duration_ms: 1,
            },
        );
        let executor = test_executor(dir.path(), Arc::clone(&http));
        let source = FileSuiteSource::new(dir.path());
        let suite = source.load("flow").unwrap();
        let registry = Arc::new(Mutex::new(GlobalRegistry::new()));

        let result = executor.run_suite(suite, registry).await;

        assert_eq!(result.step_results.len(), 2);
        assert_eq!(result.step_results[0].status, StepStatus::Skipped);
        assert_eq!(
            result.step_results[0].captured_variables.get("flag"),
            Some(&Value::from("carried-over"))
        );
        assert_eq!(
            result.step_results[1].available_variables.get("flag"),
            Some(&Value::from("carried-over")),
            "a capture from a post_capture-skipped step must stay visible to later steps"
        );
    }
}
