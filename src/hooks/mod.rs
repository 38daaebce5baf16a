//! Hook executor: compute → capture → validate → log → metric → script →
//! call → wait → exports, in that fixed order within one hook. Multiple
//! hooks run in list order; the first hook whose `success=false` stops
//! further hooks for the step.
//!
//! No direct precedent for hooks exists in the corpus; grounded
//! in the reference `execute_step_with_retry` control-flow shape (ordered,
//! early-exit-capable checks) generalized to this fixed action sequence.

use crate::context::{GlobalRegistry, Interpolator, VariableContext};
use crate::expr::{self, ExprContext};
use crate::model::{Hook, LogLevel, Severity};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Delegation point for the `call:` hook action; implemented by the step
/// dispatcher's call strategy. Kept as a trait here so `hooks` does not
/// depend on `executors`.
#[async_trait]
pub trait CallDelegate: Send + Sync {
    async fn invoke(
        &self,
        spec: &crate::model::CallSpec,
        vars: &mut VariableContext,
        registry: &mut GlobalRegistry,
    ) -> Result<HashMap<String, Value>, String>;
}

#[derive(Debug, Clone, Default)]
pub struct ValidationFailure {
    pub expression: String,
    pub message: Option<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub failures: Vec<ValidationFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct HookResult {
    pub success: bool,
    pub validations: ValidationOutcome,
    pub error_message: Option<String>,
}

/// Runs `hooks` in list order, stopping at (and returning) the first whose
/// `success=false`.
pub async fn run_hooks(
    hooks: &[Hook],
    vars: &mut VariableContext,
    registry: &mut GlobalRegistry,
    node_id: &str,
    context: &Value,
    call_delegate: Option<&dyn CallDelegate>,
) -> Vec<HookResult> {
    let mut results = Vec::with_capacity(hooks.len());
    for hook in hooks {
        let result = run_hook(hook, vars, registry, node_id, context, call_delegate).await;
        let stop = !result.success;
        results.push(result);
        if stop {
            break;
        }
    }
    results
}

async fn run_hook(
    hook: &Hook,
    vars: &mut VariableContext,
    registry: &mut GlobalRegistry,
    node_id: &str,
    context: &Value,
    call_delegate: Option<&dyn CallDelegate>,
) -> HookResult {
    let mut result = HookResult {
        success: true,
        validations: ValidationOutcome {
            passed: true,
            failures: Vec::new(),
        },
        error_message: None,
    };

    // compute: interpolate each template, assign to runtime; per-variable
    // failures are logged but do not stop the action.
    if let Some(compute) = &hook.compute {
        let faker = crate::faker::DefaultFakerProvider;
        for (name, template) in compute {
            let interp = Interpolator::new(vars, registry, &faker);
            let value = interp.interpolate_string_value(template);
            vars.set_runtime(name.clone(), value);
        }
    }

    // capture: extract from the merged context into runtime scope.
    if let Some(capture) = &hook.capture {
        let captured = crate::capture::capture_all(capture, context);
        for (name, value) in captured {
            vars.set_runtime(name, value);
        }
    }

    // validate: each expression evaluated as JS; falsy → recorded failure
    // with severity, never fails the hook itself.
    if let Some(validations) = &hook.validate {
        for entry in validations {
            let ctx = build_expr_ctx(vars, context);
            let passed = expr::eval_truthy(&entry.expression, &ctx).unwrap_or(false);
            if !passed {
                result.validations.passed = false;
                result.validations.failures.push(ValidationFailure {
                    expression: entry.expression.clone(),
                    message: entry.message.clone(),
                    severity: entry.severity,
                });
            }
        }
    }

    // log: interpolate and emit via tracing at the requested level.
    if let Some(log_entry) = &hook.log {
        let faker = crate::faker::DefaultFakerProvider;
        let interp = Interpolator::new(vars, registry, &faker);
        let message = interp.interpolate_str(&log_entry.message);
        match log_entry.level {
            LogLevel::Debug => tracing::debug!(%message, "hook log"),
            LogLevel::Info => tracing::info!(%message, "hook log"),
            LogLevel::Warn => tracing::warn!(%message, "hook log"),
            LogLevel::Error => tracing::error!(%message, "hook log"),
        }
    }

    // metric: interpolate name/value/tags; coerce numeric values back to
    // number when the original was numeric.
    if let Some(metric) = &hook.metric {
        let faker = crate::faker::DefaultFakerProvider;
        let interp = Interpolator::new(vars, registry, &faker);
        let name = interp.interpolate_str(&metric.name);
        let value = if metric.value.is_number() {
            match &metric.value {
                Value::String(s) => interp.interpolate_string_value(s),
                other => other.clone(),
            }
        } else {
            interp.interpolate_value(&metric.value)
        };
        tracing::info!(metric.name = %name, metric.value = %value, "hook metric");
    }

    // script: execute as a code block in the sandbox; errors fail the hook.
    if let Some(script) = &hook.script {
        let ctx = build_expr_ctx(vars, context);
        if let Err(e) = expr::eval(script, &ctx) {
            result.success = false;
            result.error_message = Some(format!("script hook failed: {}", e));
            return result;
        }
    }

    // call: delegate to the call strategy; fails the hook if unavailable.
    if let Some(call_spec) = &hook.call {
        match call_delegate {
            Some(delegate) => match delegate.invoke(call_spec, vars, registry).await {
                Ok(propagated) => {
                    for (k, v) in propagated {
                        vars.set_runtime(k, v);
                    }
                }
                Err(e) => {
                    result.success = false;
                    result.error_message = Some(format!("call hook failed: {}", e));
                    return result;
                }
            },
            None => {
                result.success = false;
                result.error_message = Some("call hook failed: no call service attached".to_string());
                return result;
            }
        }
    }

    // wait: sleep for the configured number of milliseconds.
    if let Some(ms) = hook.wait {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    // exports: for each present name, publish to the global registry under
    // `hook_<kebab-step-name>`.
    if let Some(export_names) = &hook.exports {
        let hook_node_id = format!("hook_{}", crate::model::normalize_step_id(node_id));
        for name in export_names {
            if let Some(value) = vars.runtime.get(name).cloned() {
                registry.set_exported(&hook_node_id, name, value);
            }
        }
    }

    result
}

fn build_expr_ctx(vars: &VariableContext, context: &Value) -> ExprContext {
    let mut variables = serde_json::Map::new();
    for (k, v) in &vars.runtime {
        variables.insert(k.clone(), v.clone());
    }
    ExprContext::new()
        .bind("variables", Value::Object(variables))
        .bind("response", context.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogEntry, ValidateEntry};

    #[tokio::test]
    async fn compute_then_capture_write_runtime_in_order() {
        let hook = Hook {
            compute: Some(indexmap::indexmap! { "greeting".to_string() => "hi".to_string() }),
            capture: Some(indexmap::indexmap! { "uid".to_string() => "body.id".to_string() }),
            ..Default::default()
        };
        let mut vars = VariableContext::new();
        let mut registry = GlobalRegistry::new();
        let context = serde_json::json!({"body": {"id": 5}});

        let results = run_hooks(&[hook], &mut vars, &mut registry, "step", &context, None).await;

        assert!(results[0].success);
        assert_eq!(vars.runtime.get("greeting"), Some(&Value::from("hi")));
        assert_eq!(vars.runtime.get("uid"), Some(&Value::from(5)));
    }

    #[tokio::test]
    async fn validate_failure_does_not_fail_hook() {
        let hook = Hook {
            validate: Some(vec![ValidateEntry {
                expression: "variables.missing === 1".to_string(),
                message: Some("missing var".to_string()),
                severity: Severity::Warning,
            }]),
            ..Default::default()
        };
        let mut vars = VariableContext::new();
        let mut registry = GlobalRegistry::new();
        let context = Value::Null;

        let results = run_hooks(&[hook], &mut vars, &mut registry, "step", &context, None).await;

        assert!(results[0].success);
        assert!(!results[0].validations.passed);
    }

    #[tokio::test]
    async fn script_error_fails_the_hook() {
        let hook = Hook {
            script: Some("nonexistent_binding".to_string()),
            ..Default::default()
        };
        let mut vars = VariableContext::new();
        let mut registry = GlobalRegistry::new();

        let results = run_hooks(&[hook], &mut vars, &mut registry, "step", &Value::Null, None).await;

        assert!(!results[0].success);
    }

    #[tokio::test]
    async fn call_without_delegate_fails_hook() {
        let hook = Hook {
            call: Some(crate::model::CallSpec {
                test: "other".to_string(),
                step: "login".to_string(),
                variables: None,
                alias: None,
                timeout: None,
                isolate_context: None,
            }),
            ..Default::default()
        };
        let mut vars = VariableContext::new();
        let mut registry = GlobalRegistry::new();

        let results = run_hooks(&[hook], &mut vars, &mut registry, "step", &Value::Null, None).await;

        assert!(!results[0].success);
    }

    #[test]
    fn log_entry_default_level_is_info() {
        let entry = LogEntry {
            level: LogLevel::default(),
            message: "x".to_string(),
            metadata: None,
        };
        assert_eq!(entry.level, LogLevel::Info);
    }
}
