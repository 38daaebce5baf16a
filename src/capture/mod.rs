//! Capture engine: JMESPath extraction into the runtime scope.
//!
//! Each `capture` entry is `{varName: jmesPathExpression}`. Extraction
//! errors are logged and set that variable to `null`; other captures in the
//! same map proceed independently (per-capture error isolation).

use crate::jmes;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;

/// Runs every `{varName: jmesPathExpression}` entry against `context`,
/// returning the captured values in declaration order. A failing
/// expression yields `Value::Null` for that name and is logged, but does
/// not stop the remaining captures.
pub fn capture_all(entries: &IndexMap<String, String>, context: &Value) -> HashMap<String, Value> {
    let mut out = HashMap::with_capacity(entries.len());
    for (name, expr) in entries {
        let value = match jmes::search(expr, context) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(variable = %name, expr = %expr, error = %e, "capture failed");
                Value::Null
            }
        };
        out.insert(name.clone(), value);
    }
    out
}
