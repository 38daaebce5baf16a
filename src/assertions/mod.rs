//! Assertion engine: flat/structured normalisation plus the check table.
//!
//! Grounded in the pack's `HttpExecutor::validate_assertions`
//! (per-assertion-type match, case-insensitive header lookup, numeric
//! `compare_values` helper), generalized to the full check table, flat vs.
//! structured normalisation, and custom JS assertions via `crate::expr`.

use crate::expr::{self, ExprContext};
use crate::jmes;
use crate::model::AssertionResult;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Normalised per-field assertion spec: a JMESPath path and its checks.
#[derive(Debug, Clone)]
pub struct FieldAssertion {
    pub field: String,
    pub checks: Value,
}

#[derive(Debug, Clone)]
pub struct CustomAssertion {
    pub name: String,
    pub condition: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedAssertions {
    pub status_code: Option<Value>,
    pub fields: Vec<FieldAssertion>,
    pub response_time: Option<Value>,
    pub custom: Vec<CustomAssertion>,
}

/// Normalizes either the flat (`"body.x": {..}` top-level keys) or
/// structured (`{status_code, headers, body, response_time_ms, custom}`)
/// assertion syntax into one shape. Idempotent: running it twice on its
/// own structured output yields the same result.
pub fn normalize(raw: &Value) -> NormalizedAssertions {
    let mut out = NormalizedAssertions::default();
    let Value::Object(map) = raw else {
        return out;
    };

    let is_structured = map.keys().any(|k| {
        matches!(
            k.as_str(),
            "status_code" | "headers" | "body" | "response_time_ms" | "custom"
        )
    });

    if is_structured {
        if let Some(sc) = map.get("status_code") {
            out.status_code = Some(sc.clone());
        }
        if let Some(Value::Object(headers)) = map.get("headers") {
            for (name, checks) in headers {
                out.fields.push(FieldAssertion {
                    field: format!("headers.{}", quote_if_needed(name)),
                    checks: checks.clone(),
                });
            }
        }
        if let Some(body) = map.get("body") {
            flatten_body(body, "body", &mut out.fields);
        }
        if let Some(rt) = map.get("response_time_ms") {
            out.response_time = Some(rt.clone());
        }
        if let Some(Value::Array(customs)) = map.get("custom") {
            for c in customs {
                if let Value::Object(co) = c {
                    let name = co
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("custom")
                        .to_string();
                    let condition = co
                        .get("condition")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    let message = co.get("message").and_then(|v| v.as_str()).map(String::from);
                    out.custom.push(CustomAssertion {
                        name,
                        condition,
                        message,
                    });
                }
            }
        }
    } else {
        for (key, checks) in map {
            if key == "status_code" {
                out.status_code = Some(checks.clone());
                continue;
            }
            out.fields.push(FieldAssertion {
                field: key.clone(),
                checks: checks.clone(),
            });
        }
    }

    out
}

fn flatten_body(value: &Value, prefix: &str, out: &mut Vec<FieldAssertion>) {
    match value {
        Value::Object(map) if is_check_object(map) => {
            out.push(FieldAssertion {
                field: prefix.to_string(),
                checks: value.clone(),
            });
        }
        Value::Object(map) => {
            for (k, v) in map {
                let path = format!("{}.{}", prefix, quote_if_needed(k));
                flatten_body(v, &path, out);
            }
        }
        _ => out.push(FieldAssertion {
            field: prefix.to_string(),
            checks: serde_json::json!({ "equals": value }),
        }),
    }
}

const CHECK_KEYS: &[&str] = &[
    "equals",
    "not_equals",
    "contains",
    "greater_than",
    "less_than",
    "regex",
    "pattern",
    "exists",
    "not_null",
    "type",
    "length",
    "minLength",
    "notEmpty",
];

fn is_check_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| CHECK_KEYS.contains(&k.as_str()))
}

/// Quotes a field segment per JMESPath literal rules if it contains
/// characters outside `[A-Za-z0-9_.]`.
fn quote_if_needed(name: &str) -> String {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\\\""))
    }
}

/// Context object assertions are evaluated against: `{status_code, headers,
/// body, duration_ms, size_bytes}` plus case-insensitive header lookup via a
/// lower-cased shadow key set under `headers`.
pub fn build_context(
    status_code: u16,
    headers: &HashMap<String, String>,
    body: &Value,
    duration_ms: u64,
    size_bytes: u64,
) -> Value {
    let mut header_map = Map::new();
    for (k, v) in headers {
        header_map.insert(k.to_lowercase(), Value::String(v.clone()));
    }
    serde_json::json!({
        "status_code": status_code,
        "headers": header_map,
        "body": body,
        "duration_ms": duration_ms,
        "size_bytes": size_bytes,
    })
}

/// Runs every assertion in `normalized` against `context`, returning one
/// `AssertionResult` per check. Overall step success is the caller's AND of
/// `passed` across the returned vec.
pub fn evaluate(normalized: &NormalizedAssertions, context: &Value) -> Vec<AssertionResult> {
    let mut results = Vec::new();

    if let Some(sc_checks) = &normalized.status_code {
        let actual = context.get("status_code").cloned().unwrap_or(Value::Null);
        results.push(evaluate_field("status_code", sc_checks, &actual));
    }

    for field_assertion in &normalized.fields {
        let path = if field_assertion.field.starts_with("headers.") {
            let rest = &field_assertion.field["headers.".len()..];
            format!("headers.{}", rest.to_lowercase())
        } else {
            field_assertion.field.clone()
        };
        let actual = jmes::search(&path, context).unwrap_or(Value::Null);
        results.push(evaluate_field(
            &field_assertion.field,
            &field_assertion.checks,
            &actual,
        ));
    }

    if let Some(rt_checks) = &normalized.response_time {
        let actual = context.get("duration_ms").cloned().unwrap_or(Value::Null);
        results.push(evaluate_response_time(rt_checks, &actual));
    }

    for custom in &normalized.custom {
        results.push(evaluate_custom(custom, context));
    }

    results
}

fn evaluate_field(field: &str, checks: &Value, actual: &Value) -> AssertionResult {
    let Value::Object(check_map) = checks else {
        let passed = expr::loose_equal(actual, checks);
        return AssertionResult {
            field: field.to_string(),
            expected: checks.clone(),
            actual: actual.clone(),
            passed,
            message: None,
        };
    };

    let mut passed = true;
    let mut messages = Vec::new();

    for (check, expected) in check_map {
        let ok = run_check(check, expected, actual);
        if !ok {
            passed = false;
            messages.push(format!("{} check failed for field '{}'", check, field));
        }
    }

    AssertionResult {
        field: field.to_string(),
        expected: checks.clone(),
        actual: actual.clone(),
        passed,
        message: if messages.is_empty() {
            None
        } else {
            Some(messages.join("; "))
        },
    }
}

fn run_check(check: &str, expected: &Value, actual: &Value) -> bool {
    match check {
        "equals" => expr::loose_equal(actual, expected),
        "not_equals" => !expr::loose_equal(actual, expected),
        "contains" => check_contains(actual, expected),
        "greater_than" => numeric_gt(actual, expected),
        "less_than" => numeric_lt(actual, expected),
        "regex" | "pattern" => check_regex(actual, expected),
        "exists" | "not_null" => !actual.is_null(),
        "type" => check_type(actual, expected),
        "length" => check_length(actual, expected),
        "minLength" => check_min_length(actual, expected),
        "notEmpty" => !is_empty(actual),
        _ => true,
    }
}

fn check_contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(s) => expected
            .as_str()
            .map(|needle| s.contains(needle))
            .unwrap_or(false),
        Value::Array(items) => items.iter().any(|v| expr::loose_equal(v, expected)),
        Value::Object(map) => map.values().any(|v| expr::loose_equal(v, expected)),
        _ => false,
    }
}

fn numeric_gt(actual: &Value, expected: &Value) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => a > b,
        _ => false,
    }
}

fn numeric_lt(actual: &Value, expected: &Value) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => a < b,
        _ => false,
    }
}

fn check_regex(actual: &Value, expected: &Value) -> bool {
    let (Some(s), Some(pattern)) = (actual.as_str(), expected.as_str()) else {
        return false;
    };
    match Regex::new(pattern) {
        Ok(re) => re.is_match(s),
        Err(_) => false,
    }
}

fn check_type(actual: &Value, expected: &Value) -> bool {
    let expected_label = expected.as_str().unwrap_or("");
    let actual_label = match actual {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    actual_label == expected_label
}

fn check_length(actual: &Value, expected: &Value) -> bool {
    let Some(len) = value_len(actual) else {
        return false;
    };
    match expected {
        Value::Number(_) => expected.as_u64().map(|n| len as u64 == n).unwrap_or(false),
        Value::Object(sub) => sub.iter().all(|(k, v)| match k.as_str() {
            "greater_than" => v.as_f64().map(|n| (len as f64) > n).unwrap_or(false),
            "less_than" => v.as_f64().map(|n| (len as f64) < n).unwrap_or(false),
            "equals" => v.as_u64().map(|n| len as u64 == n).unwrap_or(false),
            _ => true,
        }),
        _ => false,
    }
}

fn check_min_length(actual: &Value, expected: &Value) -> bool {
    let (Some(len), Some(min)) = (value_len(actual), expected.as_u64()) else {
        return false;
    };
    (len as u64) >= min
}

fn value_len(v: &Value) -> Option<usize> {
    match v {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn is_empty(v: &Value) -> bool {
    match v {
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

/// Response time supports both `less_than` and `greater_than`; each
/// produces its own `AssertionResult`. Strict comparisons: `actual == limit`
/// under `less_than` is a failure (strict, not `<=`).
fn evaluate_response_time(checks: &Value, actual: &Value) -> AssertionResult {
    let mut passed = true;
    let mut messages = Vec::new();
    if let Some(limit) = checks.get("less_than") {
        if !numeric_lt(actual, limit) {
            passed = false;
            messages.push("response_time_ms.less_than failed".to_string());
        }
    }
    if let Some(limit) = checks.get("greater_than") {
        if !numeric_gt(actual, limit) {
            passed = false;
            messages.push("response_time_ms.greater_than failed".to_string());
        }
    }
    AssertionResult {
        field: "response_time_ms".to_string(),
        expected: checks.clone(),
        actual: actual.clone(),
        passed,
        message: if messages.is_empty() {
            None
        } else {
            Some(messages.join("; "))
        },
    }
}

/// `condition` may carry a `js:`/`$js:` prefix; evaluated with bound names
/// `status_code, headers, body, response_time`. Truthy → pass; evaluation
/// errors fail with the error text appended to the message.
fn evaluate_custom(custom: &CustomAssertion, context: &Value) -> AssertionResult {
    let source = custom
        .condition
        .strip_prefix("$js:")
        .or_else(|| custom.condition.strip_prefix("js:"))
        .unwrap_or(&custom.condition);

    let ctx = ExprContext::new()
        .bind("status_code", context.get("status_code").cloned().unwrap_or(Value::Null))
        .bind("headers", context.get("headers").cloned().unwrap_or(Value::Null))
        .bind("body", context.get("body").cloned().unwrap_or(Value::Null))
        .bind(
            "response_time",
            context.get("duration_ms").cloned().unwrap_or(Value::Null),
        );

    match expr::eval_truthy(source, &ctx) {
        Ok(passed) => AssertionResult {
            field: custom.name.clone(),
            expected: Value::Bool(true),
            actual: Value::Bool(passed),
            passed,
            message: if passed { None } else { custom.message.clone() },
        },
        Err(e) => AssertionResult {
            field: custom.name.clone(),
            expected: Value::Bool(true),
            actual: Value::Null,
            passed: false,
            message: Some(format!(
                "{}: {}",
                custom.message.clone().unwrap_or_default(),
                e
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn normalize_is_idempotent() {
        let raw = serde_json::json!({
            "status_code": 200,
            "body": { "user": { "id": { "not_null": true } } }
        });
        let once = normalize(&raw);
        let once_json = serde_json::json!({
            "status_code": once.status_code,
            "fields": once.fields.iter().map(|f| (f.field.clone(), f.checks.clone())).collect::<Vec<_>>(),
        });
        let twice = normalize(&serde_json::to_value(&once_json).unwrap());
        assert_eq!(once.status_code, twice.status_code);
    }

    #[test]
    fn scenario_c_assertion_flattening() {
        let raw = serde_json::json!({
            "body.user.id": { "not_null": true, "type": "number" },
            "status_code": 200,
            "headers.content-type": { "contains": "application/json" }
        });
        let normalized = normalize(&raw);

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json; charset=utf-8".to_string());
        let body = serde_json::json!({"user": {"id": 7}});
        let context = build_context(200, &headers, &body, 10, 100);

        let results = evaluate(&normalized, &context);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.passed), "{:?}", results);
    }

    #[test]
    fn response_time_less_than_is_strict() {
        let checks = serde_json::json!({"less_than": 100});
        let result = evaluate_response_time(&checks, &Value::from(100));
        assert!(!result.passed);
    }

    #[test]
    fn custom_js_assertion_evaluates_condition() {
        let custom = CustomAssertion {
            name: "status-ok".to_string(),
            condition: "$js:status_code === 200".to_string(),
            message: Some("expected 200".to_string()),
        };
        let context = serde_json::json!({"status_code": 200});
        let result = evaluate_custom(&custom, &context);
        assert!(result.passed);
    }

    #[test]
    fn length_check_supports_sub_operators() {
        let actual = Value::from("hello");
        let checks = serde_json::json!({"greater_than": 2, "less_than": 10});
        assert!(check_length(&actual, &checks));
    }
}
