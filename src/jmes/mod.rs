//! Thin wrapper around the `jmespath` crate.
//!
//! Chosen over the reference ad hoc dot-notation navigation (and over the
//! pack's JSONPath crates) because the suite format names JMESPath
//! specifically for capture paths, assertion field paths, and the
//! skip-condition sugar rewrite — a different query language with
//! different syntax from JSONPath.

use jmespath::Expression;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone)]
pub struct JmesError(pub String);

impl fmt::Display for JmesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for JmesError {}

/// Compiles `expr` and runs it against `data`, converting the result back
/// to `serde_json::Value`. `jmespath::Variable` is converted through its
/// JSON `Display` representation rather than assumed to implement
/// `Serialize` directly, since that's the safer of the two plausible API
/// surfaces for the crate's 0.3 line.
pub fn search(expr: &str, data: &Value) -> Result<Value, JmesError> {
    let compiled: Expression = jmespath::compile(expr).map_err(|e| JmesError(e.to_string()))?;
    let var = jmespath::Variable::from(data.clone());
    let result = compiled
        .search(var)
        .map_err(|e| JmesError(e.to_string()))?;
    let text = result.to_string();
    serde_json::from_str(&text).map_err(|e| JmesError(e.to_string()))
}

/// Runs `search` and coerces the result to bool via JSON-truthiness
/// (non-null, non-false, non-zero, non-empty).
pub fn search_bool(expr: &str, data: &Value) -> Result<bool, JmesError> {
    let value = search(expr, data)?;
    Ok(crate::expr::truthy(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_nested_field() {
        let data = json!({"body": {"id": 42, "name": "x"}});
        let result = search("body.id", &data).unwrap();
        assert_eq!(result, json!(42));
    }

    #[test]
    fn missing_path_yields_null() {
        let data = json!({"body": {}});
        let result = search("body.missing", &data).unwrap();
        assert_eq!(result, Value::Null);
    }

    #[test]
    fn search_bool_truthiness() {
        let data = json!({"status_code": 200});
        assert!(search_bool("status_code", &data).unwrap());
    }

    #[test]
    fn invalid_expression_is_an_error() {
        let data = json!({});
        assert!(search("body.[", &data).is_err());
    }
}
