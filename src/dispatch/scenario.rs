//! Scenario dispatch strategy: runs the inner `request`
//! first when present, picks the first branch whose `condition` evaluates
//! truthy (falling back to the branch marked `default`), then applies that
//! branch's `then` block — extra assertions, captures, variable sets, and
//! an optional nested `call`.
//!
//! No direct precedent in the corpus; grounded in `dispatch::request::run` for the
//! inner HTTP leg and `dispatch::call::run` for `then.call`, reusing both
//! rather than re-implementing either.

use crate::assertions::{self};
use crate::context::{GlobalRegistry, Interpolator, VariableContext};
use crate::executor::SuiteExecutor;
use crate::expr::ExprContext;
use crate::model::{AssertionResult, CertificateRef, ScenarioBranch, ScenarioSpec};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

pub struct ScenarioOutcome {
    pub status_code: Option<u16>,
    pub response_headers: Option<HashMap<String, String>>,
    pub response_body: Option<Value>,
    pub size_bytes: Option<u64>,
    pub duration_ms: u64,
    pub raw_url: Option<String>,
    pub assertions_results: Vec<AssertionResult>,
    pub captured_variables: HashMap<String, Value>,
    pub propagated_variables: HashMap<String, Value>,
    pub selected_branch: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    executor: &SuiteExecutor,
    step_id: &str,
    spec: &ScenarioSpec,
    suite_certificate: Option<&CertificateRef>,
    base_assertions: Option<&Value>,
    base_capture: Option<&IndexMap<String, String>>,
    vars: &mut VariableContext,
    registry: &Mutex<GlobalRegistry>,
) -> ScenarioOutcome {
    let (status_code, response_headers, response_body, size_bytes, duration_ms, raw_url, mut success, mut error_message) =
        match &spec.request {
            Some(request_spec) => {
                let snapshot = registry.lock().await.clone();
                let outcome = crate::dispatch::request::run(
                    step_id,
                    request_spec,
                    suite_certificate,
                    vars,
                    &snapshot,
                    executor.services.http.as_ref(),
                    executor.services.faker.as_ref(),
                    executor.services.certificate_service.as_ref(),
                    executor.services.limits.max_step_timeout,
                )
                .await;
                (
                    outcome.status_code,
                    outcome.response_headers,
                    outcome.response_body,
                    outcome.size_bytes,
                    outcome.duration_ms,
                    outcome.raw_url,
                    outcome.success,
                    outcome.error_message,
                )
            }
            None => (None, None, None, None, 0, None, true, None),
        };

    let response_ctx = assertions::build_context(
        status_code.unwrap_or(0),
        response_headers.as_ref().unwrap_or(&HashMap::new()),
        response_body.as_ref().unwrap_or(&Value::Null),
        duration_ms,
        size_bytes.unwrap_or(0),
    );

    let mut assertions_results = Vec::new();
    let mut captured_variables = HashMap::new();
    let mut propagated_variables = HashMap::new();

    // Base layer: the step's own `assertions`/`capture`, same fields every
    // other step kind honors, evaluated before the branch's `then` adds to
    // them (a branch `then.capture` of the same name overwrites this).
    if let Some(raw_assertions) = base_assertions {
        let normalized = assertions::normalize(raw_assertions);
        let results = assertions::evaluate(&normalized, &response_ctx);
        if results.iter().any(|r| !r.passed) {
            success = false;
        }
        assertions_results.extend(results);
    }
    if let Some(capture_spec) = base_capture {
        let captured = crate::capture::capture_all(capture_spec, &response_ctx);
        for (name, value) in captured {
            vars.set_runtime(name.clone(), value.clone());
            captured_variables.insert(name, value);
        }
    }

    let selected = select_branch(&spec.branches, vars, &response_ctx);
    let selected_branch = selected.as_ref().map(|(label, _)| label.clone());

    if let Some((_, branch)) = selected {
        if let Some(then) = &branch.then {
            if let Some(raw_assertions) = &then.assertions {
                let normalized = assertions::normalize(raw_assertions);
                let results = assertions::evaluate(&normalized, &response_ctx);
                if results.iter().any(|r| !r.passed) {
                    success = false;
                }
                assertions_results.extend(results);
            }

            if let Some(capture) = &then.capture {
                let captured = crate::capture::capture_all(capture, &response_ctx);
                for (name, value) in captured {
                    vars.set_runtime(name.clone(), value.clone());
                    captured_variables.insert(name, value);
                }
            }

            if let Some(set) = &then.set {
                let snapshot = registry.lock().await.clone();
                let interp = Interpolator::new(vars, &snapshot, executor.services.faker.as_ref());
                let resolved: Vec<(String, Value)> = set
                    .iter()
                    .map(|(name, template)| (name.clone(), interp.interpolate_value(template)))
                    .collect();
                for (name, value) in resolved {
                    vars.set_runtime(name, value);
                }
            }

            if let Some(call_spec) = &then.call {
                let outcome = crate::dispatch::call::run(executor, call_spec, vars, registry).await;
                for (name, value) in &outcome.propagated_variables {
                    vars.set_runtime(name.clone(), value.clone());
                }
                propagated_variables = outcome.propagated_variables;
                if !outcome.success {
                    success = false;
                    error_message = error_message.or(outcome.error_message);
                }
            }
        }
    }

    ScenarioOutcome {
        status_code,
        response_headers,
        response_body,
        size_bytes,
        duration_ms,
        raw_url,
        assertions_results,
        captured_variables,
        propagated_variables,
        selected_branch,
        success,
        error_message,
    }
}

/// Returns the first non-default branch whose condition is truthy, else the
/// branch marked `default`. The label recorded for `scenario_meta` is the
/// condition text for a matched branch, or `"default"`.
fn select_branch<'a>(
    branches: &'a [ScenarioBranch],
    vars: &VariableContext,
    response_ctx: &Value,
) -> Option<(String, &'a ScenarioBranch)> {
    let ctx = condition_context(vars, response_ctx);
    for branch in branches {
        if branch.default {
            continue;
        }
        let Some(condition) = &branch.condition else {
            continue;
        };
        match crate::expr::eval_truthy(condition, &ctx) {
            Ok(true) => return Some((condition.clone(), branch)),
            Ok(false) => continue,
            Err(e) => {
                tracing::warn!(error = %e, condition = %condition, "scenario branch condition failed to evaluate");
                continue;
            }
        }
    }
    branches
        .iter()
        .find(|b| b.default)
        .map(|b| ("default".to_string(), b))
}

fn condition_context(vars: &VariableContext, response_ctx: &Value) -> ExprContext {
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
    ExprContext::new()
        .bind("variables", Value::Object(variables))
        .bind("response", response_ctx.clone())
        .bind("captured", Value::Object(serde_json::Map::new()))
        .bind(
            "status_code",
            response_ctx.get("status_code").cloned().unwrap_or(Value::Null),
        )
        .bind("body", response_ctx.get("body").cloned().unwrap_or(Value::Null))
        .bind("headers", response_ctx.get("headers").cloned().unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScenarioThen;

    #[test]
    fn selects_first_truthy_condition_over_default() {
        let branches = vec![
            ScenarioBranch {
                condition: Some("status_code === 200".to_string()),
                default: false,
                then: None,
            },
            ScenarioBranch {
                condition: None,
                default: true,
                then: Some(ScenarioThen::default()),
            },
        ];
        let vars = VariableContext::new();
        let ctx = assertions::build_context(200, &HashMap::new(), &Value::Null, 5, 10);
        let (label, branch) = select_branch(&branches, &vars, &ctx).unwrap();
        assert_eq!(label, "status_code === 200");
        assert!(!branch.default);
    }

    #[test]
    fn falls_back_to_default_branch() {
        let branches = vec![
            ScenarioBranch {
                condition: Some("status_code === 404".to_string()),
                default: false,
                then: None,
            },
            ScenarioBranch {
                condition: None,
                default: true,
                then: None,
            },
        ];
        let vars = VariableContext::new();
        let ctx = assertions::build_context(200, &HashMap::new(), &Value::Null, 5, 10);
        let (label, branch) = select_branch(&branches, &vars, &ctx).unwrap();
        assert_eq!(label, "default");
        assert!(branch.default);
    }
}
