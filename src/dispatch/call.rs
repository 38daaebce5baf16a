//! Call dispatch strategy: resolves `test`/`step`, pushes
//! onto the shared `CallGuard`, swaps the `HttpClient` base URL/timeout to
//! the target suite's own for the duration of the call, dispatches a single
//! step of the target suite through the same executor, then restores
//! transport state and namespaces the callee's runtime variables back into
//! the caller under `alias`/`node_id`.
//!
//! No direct precedent in the corpus; grounded in the `context::VariableContext::
//! snapshot`/`restore` pair for isolation and the same
//! `validation::detect_cycle_dfs` shape (now dynamic, via `call::CallGuard`).

use crate::context::{GlobalRegistry, VariableContext};
use crate::errors::EngineError;
use crate::executor::SuiteExecutor;
use crate::model::{CallSpec, Step, StepResult};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

pub struct CallOutcome {
    pub propagated_variables: HashMap<String, Value>,
    pub child_result: Option<StepResult>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Executes a `call` step. `isolate_context` defaults to `true`: the callee
/// runs against a fresh scope seeded from its own suite variables and the
/// call's `variables` overlay, leaving the caller's `vars` untouched except
/// for the namespaced `propagated_variables` merge the caller applies
/// afterward. Set `isolate_context: false` to run the callee directly
/// against the caller's live scope.
pub async fn run(
    executor: &SuiteExecutor,
    spec: &CallSpec,
    vars: &VariableContext,
    registry: &Mutex<GlobalRegistry>,
) -> CallOutcome {
    if let Err(e) = executor.call_guard.push(&spec.test).await {
        return CallOutcome {
            propagated_variables: HashMap::new(),
            child_result: None,
            success: false,
            error_message: Some(e.to_string()),
        };
    }

    let outcome = run_guarded(executor, spec, vars, registry).await;
    executor.call_guard.pop().await;
    outcome
}

async fn run_guarded(
    executor: &SuiteExecutor,
    spec: &CallSpec,
    vars: &VariableContext,
    registry: &Mutex<GlobalRegistry>,
) -> CallOutcome {
    let target_suite = match executor.services.source.load_by_ref(&spec.test) {
        Ok(s) => s,
        Err(e) => {
            return CallOutcome {
                propagated_variables: HashMap::new(),
                child_result: None,
                success: false,
                error_message: Some(format!("call target '{}' could not be resolved: {}", spec.test, e)),
            };
        }
    };

    let target_step_idx = target_suite
        .steps
        .iter()
        .position(|s| matches_step_ref(s, &spec.step));
    let Some(target_step_idx) = target_step_idx else {
        return CallOutcome {
            propagated_variables: HashMap::new(),
            child_result: None,
            success: false,
            error_message: Some(format!(
                "call target '{}' has no step matching '{}'",
                spec.test, spec.step
            )),
        };
    };

    let isolate = spec.isolate_context.unwrap_or(true);
    let mut call_vars = if isolate {
        let mut fresh = VariableContext::new();
        fresh.suite = target_suite.variables.clone();
        fresh.environment = vars.environment.clone();
        fresh
    } else {
        let mut reused = vars.clone();
        for (k, v) in &target_suite.variables {
            reused.suite.entry(k.clone()).or_insert_with(|| v.clone());
        }
        reused
    };
    if let Some(overlay) = &spec.variables {
        for (k, v) in overlay {
            call_vars.runtime.insert(k.clone(), v.clone());
        }
    }

    let previous_base_url = executor.services.http.base_url();
    let previous_timeout = executor.services.http.timeout();
    executor.services.http.set_base_url(target_suite.base_url.clone());
    if let Some(timeout_ms) = spec.timeout {
        executor
            .services
            .http
            .set_timeout(std::time::Duration::from_millis(timeout_ms));
    }

    let target_step = target_suite.steps[target_step_idx].clone();
    // Boxed: `dispatch_single_step` dispatches back into this module for
    // `Call`-kind steps, so the recursion must cross a heap-allocated
    // future at least once to stay a finite-sized type.
    let child_result = Box::pin(executor.dispatch_single_step(
        &target_suite,
        &target_step,
        target_step_idx,
        &mut call_vars,
        registry,
    ))
    .await;

    executor.services.http.set_base_url(previous_base_url);
    executor.services.http.set_timeout(previous_timeout);

    let namespace = spec.alias.clone().unwrap_or_else(|| target_suite.node_id.clone());
    let mut propagated = HashMap::new();
    for (name, value) in &call_vars.runtime {
        propagated.insert(format!("{}.{}", namespace, name), value.clone());
        if !isolate {
            propagated.insert(name.clone(), value.clone());
        }
    }

    CallOutcome {
        propagated_variables: propagated,
        success: child_result.is_success(),
        error_message: child_result.error_message.clone(),
        child_result: Some(child_result),
    }
}

fn matches_step_ref(step: &Step, step_ref: &str) -> bool {
    step.step_id.as_deref() == Some(step_ref) || step.name == step_ref
}

/// Bridges `hooks::CallDelegate` so a hook's `call:` action reuses this same
/// strategy instead of a second implementation.
#[async_trait::async_trait]
impl crate::hooks::CallDelegate for SuiteExecutor {
    async fn invoke(
        &self,
        spec: &CallSpec,
        vars: &mut VariableContext,
        registry: &mut GlobalRegistry,
    ) -> Result<HashMap<String, Value>, String> {
        let shared_registry = Mutex::new(registry.clone());
        let outcome = run(self, spec, vars, &shared_registry).await;
        *registry = shared_registry.into_inner();
        if outcome.success {
            Ok(outcome.propagated_variables)
        } else {
            Err(outcome.error_message.unwrap_or_else(|| "call failed".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{matches_step_ref, run};
    use crate::collaborators::certificate::NoopCertificateService;
    use crate::collaborators::http::{HttpResponse, MockHttpClient};
    use crate::collaborators::input::DialoguerInputPrompter;
    use crate::collaborators::source::FileSuiteSource;
    use crate::context::{GlobalRegistry, VariableContext};
    use crate::executor::{Services, SuiteExecutor};
    use crate::faker::DefaultFakerProvider;
    use crate::limits::ExecutionLimits;
    use crate::model::{CallSpec, Step};
    use crate::observer::NullObserver;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn step(name: &str, step_id: Option<&str>) -> Step {
        Step {
            name: name.to_string(),
            step_id: step_id.map(|s| s.to_string()),
            skip: None,
            continue_on_failure: false,
            before: vec![],
            after: vec![],
            iterate: None,
            scenarios: None,
            input: None,
            call: None,
            request: None,
            assertions: None,
            capture: None,
            delay: None,
        }
    }

    #[test]
    fn matches_by_step_id() {
        let s = step("Login user", Some("login"));
        assert!(matches_step_ref(&s, "login"));
        assert!(!matches_step_ref(&s, "some-other-id"));
    }

    #[test]
    fn matches_by_name_when_no_step_id() {
        let s = step("Login user", None);
        assert!(matches_step_ref(&s, "Login user"));
    }

    #[test]
    fn call_spec_defaults_to_isolated_context() {
        let spec = CallSpec {
            test: "other".to_string(),
            step: "login".to_string(),
            variables: None,
            alias: None,
            timeout: None,
            isolate_context: None,
        };
        assert_eq!(spec.isolate_context.unwrap_or(true), true);
    }

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
    async fn isolated_call_namespaces_propagated_variables_under_alias() {
        let dir = tempfile::tempdir().unwrap();
        write_suite(
            dir.path(),
            "auth.yaml",
            "node_id: auth\n\
             suite_name: Auth\n\
             base_url: http://auth.test\n\
             steps:\n\
             \x20\x20- name: login\n\
             \x20\x20\x20\x20step_id: login\n\
             \x20\x20\x20\x20request:\n\
             \x20\x20\x20\x20\x20\x20method: GET\n\
             \x20\x20\x20\x20\x20\x20url: /login\n\
             \x20\x20\x20\x20capture:\n\
             \x20\x20\x20\x20\x20\x20token: body.token\n",
        );

        let http = Arc::new(MockHttpClient::new());
        http.on(
            "GET",
            "http://auth.test/login",
            HttpResponse {
                status_code: 200,
                headers: HashMap::new(),
                body: json!({"token": "secret-token"}),
                size_bytes: 20,
                duration_ms: 1,
            },
        );
        let executor = test_executor(dir.path(), Arc::clone(&http));

        let spec = CallSpec {
            test: "auth".to_string(),
            step: "login".to_string(),
            variables: None,
            alias: Some("auth".to_string()),
            timeout: None,
            isolate_context: Some(true),
        };
        let vars = VariableContext::new();
        let registry = Mutex::new(GlobalRegistry::new());

        let outcome = run(&executor, &spec, &vars, &registry).await;

        assert!(outcome.success);
        assert_eq!(
            outcome.propagated_variables.get("auth.token"),
            Some(&Value::from("secret-token"))
        );
        assert!(
            !outcome.propagated_variables.contains_key("token"),
            "isolated call must not leak an unnamespaced copy"
        );
    }
}
