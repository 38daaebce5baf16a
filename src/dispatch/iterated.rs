//! Iterated dispatch strategy: expands `iterate.over`
//! (must resolve to an array) or `iterate.range` (inclusive `"a..b"`
//! integers) into a sequence of iterations. For each, installs
//! `variableName`/`variableName_meta` (`{index, isFirst, isLast}`) into
//! runtime scope and re-dispatches the same step with `iterate` cleared
//! through the full step-dispatch path, so an iterated `call` or iterated
//! `request` works uniformly.
//!
//! No direct precedent in the corpus; grounded in the same recursive-dispatch shape as
//! `dispatch::call`, reusing `SuiteExecutor::dispatch_single_step` rather
//! than duplicating the strategy-selection switch.

use crate::context::{GlobalRegistry, Interpolator, VariableContext};
use crate::executor::SuiteExecutor;
use crate::model::{IterateSpec, IterationResult, Step, StepResult, Suite};
use serde_json::Value;
use tokio::sync::Mutex;

pub struct IteratedOutcome {
    pub iteration_result: IterationResult,
    pub success: bool,
    pub error_message: Option<String>,
}

pub async fn run(
    executor: &SuiteExecutor,
    suite: &Suite,
    step: &Step,
    index: usize,
    spec: &IterateSpec,
    vars: &mut VariableContext,
    registry: &Mutex<GlobalRegistry>,
) -> IteratedOutcome {
    let items = match expand(executor, spec, vars, registry).await {
        Ok(items) => items,
        Err(message) => {
            return IteratedOutcome {
                iteration_result: IterationResult::default(),
                success: false,
                error_message: Some(message),
            };
        }
    };

    let variable_name = as_name(spec).to_string();
    let inner_step = step.without_iterate();
    let total = items.len();
    let mut children: Vec<StepResult> = Vec::with_capacity(total);
    let mut success = true;

    for (i, value) in items.into_iter().enumerate() {
        let is_first = i == 0;
        let is_last = i + 1 == total;
        vars.set_runtime(variable_name.clone(), value);
        vars.set_runtime(
            format!("{}_meta", variable_name),
            serde_json::json!({"index": i, "isFirst": is_first, "isLast": is_last}),
        );

        // Boxed: re-enters `dispatch_single_step`, which dispatches back
        // here whenever a nested step is itself iterated.
        let child = Box::pin(executor.dispatch_single_step(suite, &inner_step, index, vars, registry)).await;
        let child_failed = !child.is_success();
        children.push(child);
        if child_failed {
            success = false;
            if !step.continue_on_failure {
                break;
            }
        }
    }

    IteratedOutcome {
        iteration_result: IterationResult { children },
        success,
        error_message: if success {
            None
        } else {
            Some("one or more iterations failed".to_string())
        },
    }
}

fn as_name(spec: &IterateSpec) -> &str {
    match spec {
        IterateSpec::Over { r#as, .. } => r#as,
        IterateSpec::Range { r#as, .. } => r#as,
    }
}

async fn expand(
    executor: &SuiteExecutor,
    spec: &IterateSpec,
    vars: &VariableContext,
    registry: &Mutex<GlobalRegistry>,
) -> Result<Vec<Value>, String> {
    match spec {
        IterateSpec::Over { over, .. } => {
            let snapshot = registry.lock().await.clone();
            let interp = Interpolator::new(vars, &snapshot, executor.services.faker.as_ref());
            match interp.interpolate_string_value(over) {
                Value::Array(items) => Ok(items),
                other => Err(format!(
                    "iterate.over '{}' did not resolve to an array (got {})",
                    over, other
                )),
            }
        }
        IterateSpec::Range { range, .. } => {
            let (start, end) = parse_range(range)?;
            if start > end {
                return Err(format!("iterate.range '{}' requires a <= b", range));
            }
            Ok((start..=end).map(Value::from).collect())
        }
    }
}

fn parse_range(range: &str) -> Result<(i64, i64), String> {
    let (a, b) = range
        .split_once("..")
        .ok_or_else(|| format!("invalid range '{}': expected 'a..b'", range))?;
    let a: i64 = a
        .trim()
        .parse()
        .map_err(|_| format!("invalid range start in '{}'", range))?;
    let b: i64 = b
        .trim()
        .parse()
        .map_err(|_| format!("invalid range end in '{}'", range))?;
    Ok((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inclusive_integer_range() {
        assert_eq!(parse_range("1..3").unwrap(), (1, 3));
    }

    #[test]
    fn rejects_malformed_range() {
        assert!(parse_range("abc").is_err());
    }

    #[test]
    fn as_name_reads_the_binding_identifier() {
        let spec = IterateSpec::Range {
            range: "1..2".to_string(),
            r#as: "n".to_string(),
        };
        assert_eq!(as_name(&spec), "n");
    }
}
