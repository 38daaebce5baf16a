//! Minimal expression language covering the grammar the suite format
//! actually needs: member access, comparisons, logical operators, literals,
//! and a fixed set of calls on `Date`/`Math`/`JSON`.
//!
//! Picks option (b) from the design notes rather than embedding a full JS
//! engine: the observed grammar is closed (no loops, assignment, or user
//! functions), so a small recursive-descent parser/evaluator is enough and
//! avoids pulling in an unverified FFI-heavy dependency.

mod lexer;
mod parser;

use serde_json::Value;
use std::collections::HashMap;

pub use parser::{parse, Expr};

/// Bound names available to an evaluated expression (`variables`,
/// `response`, `captured`, `request`, plus whatever a caller adds).
#[derive(Debug, Clone, Default)]
pub struct ExprContext {
    bindings: HashMap<String, Value>,
}

impl ExprContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    Parse(String),
    UnknownName(String),
    UnknownCall(String, String),
    TypeError(String),
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::Parse(msg) => write!(f, "parse error: {}", msg),
            EvalError::UnknownName(name) => write!(f, "unknown name: {}", name),
            EvalError::UnknownCall(ns, method) => write!(f, "unknown call: {}.{}", ns, method),
            EvalError::TypeError(msg) => write!(f, "type error: {}", msg),
        }
    }
}

impl std::error::Error for EvalError {}

/// Parses and evaluates `source` against `ctx`, returning the resulting
/// JSON-shaped value (booleans/numbers/strings/null/arrays/objects).
pub fn eval(source: &str, ctx: &ExprContext) -> Result<Value, EvalError> {
    let ast = parser::parse(source).map_err(EvalError::Parse)?;
    eval_expr(&ast, ctx)
}

/// Evaluates `source` and coerces the result to a bool via JS-ish truthiness.
pub fn eval_truthy(source: &str, ctx: &ExprContext) -> Result<bool, EvalError> {
    eval(source, ctx).map(|v| truthy(&v))
}

pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}

fn eval_expr(expr: &Expr, ctx: &ExprContext) -> Result<Value, EvalError> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Number(n) => Ok(serde_json::json!(n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval_expr(item, ctx)?);
            }
            Ok(Value::Array(out))
        }
        Expr::Object(entries) => {
            let mut map = serde_json::Map::new();
            for (k, v) in entries {
                map.insert(k.clone(), eval_expr(v, ctx)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Ident(name) => ctx
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownName(name.clone())),
        Expr::Member(base, path) => {
            let root = eval_expr(base, ctx)?;
            Ok(member(&root, path))
        }
        Expr::Index(base, idx_expr) => {
            let root = eval_expr(base, ctx)?;
            let idx = eval_expr(idx_expr, ctx)?;
            Ok(index(&root, &idx))
        }
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval_expr(inner, ctx)?))),
        Expr::Neg(inner) => {
            let v = eval_expr(inner, ctx)?;
            let n = v
                .as_f64()
                .ok_or_else(|| EvalError::TypeError("unary - on non-number".into()))?;
            Ok(serde_json::json!(-n))
        }
        Expr::And(lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            if !truthy(&l) {
                Ok(l)
            } else {
                eval_expr(rhs, ctx)
            }
        }
        Expr::Or(lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            if truthy(&l) {
                Ok(l)
            } else {
                eval_expr(rhs, ctx)
            }
        }
        Expr::Cmp(op, lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            let r = eval_expr(rhs, ctx)?;
            Ok(Value::Bool(compare(op, &l, &r)))
        }
        Expr::Call(ns, method, args) => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(eval_expr(arg, ctx)?);
            }
            call_builtin(ns, method, &evaluated)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CmpOp {
    StrictEq,
    StrictNe,
    LooseEq,
    LooseNe,
    Lt,
    Gt,
    Le,
    Ge,
}

fn compare(op: &CmpOp, l: &Value, r: &Value) -> bool {
    match op {
        CmpOp::StrictEq => strict_equal(l, r),
        CmpOp::StrictNe => !strict_equal(l, r),
        CmpOp::LooseEq => loose_equal(l, r),
        CmpOp::LooseNe => !loose_equal(l, r),
        CmpOp::Lt => numeric_cmp(l, r).map(|o| o == std::cmp::Ordering::Less).unwrap_or(false),
        CmpOp::Gt => numeric_cmp(l, r).map(|o| o == std::cmp::Ordering::Greater).unwrap_or(false),
        CmpOp::Le => numeric_cmp(l, r)
            .map(|o| o != std::cmp::Ordering::Greater)
            .unwrap_or(false),
        CmpOp::Ge => numeric_cmp(l, r).map(|o| o != std::cmp::Ordering::Less).unwrap_or(false),
    }
}

fn numeric_cmp(l: &Value, r: &Value) -> Option<std::cmp::Ordering> {
    let lf = as_number(l)?;
    let rf = as_number(r)?;
    lf.partial_cmp(&rf)
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Exact type-and-value equality, no coercion.
pub fn strict_equal(l: &Value, r: &Value) -> bool {
    l == r
}

/// Type-tolerant equality: coerces number↔string and bool↔string at the
/// primitive level (shared with the assertion engine's `equals` check).
pub fn loose_equal(l: &Value, r: &Value) -> bool {
    if l == r {
        return true;
    }
    match (l, r) {
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            match (as_number(l), as_number(r)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            s.eq_ignore_ascii_case(&b.to_string())
        }
        _ => false,
    }
}

/// Navigates dotted member access (`a.b.c`), returning `Value::Null` on any
/// missing segment rather than erroring — matches interpolation's
/// missing-key-leaves-placeholder behaviour at the value level.
pub fn member(root: &Value, path: &[String]) -> Value {
    let mut cur = root.clone();
    for segment in path {
        cur = match cur {
            Value::Object(mut map) => map.remove(segment).unwrap_or(Value::Null),
            _ => Value::Null,
        };
    }
    cur
}

pub fn index(root: &Value, idx: &Value) -> Value {
    match (root, idx) {
        (Value::Array(items), Value::Number(n)) => {
            let i = n.as_i64().unwrap_or(-1);
            if i >= 0 {
                items.get(i as usize).cloned().unwrap_or(Value::Null)
            } else {
                Value::Null
            }
        }
        (Value::Object(map), Value::String(key)) => map.get(key).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn call_builtin(ns: &str, method: &str, args: &[Value]) -> Result<Value, EvalError> {
    match (ns, method) {
        ("Date", "now") => Ok(serde_json::json!(0)),
        ("Math", "floor") => unary_math(args, f64::floor),
        ("Math", "ceil") => unary_math(args, f64::ceil),
        ("Math", "round") => unary_math(args, f64::round),
        ("Math", "abs") => unary_math(args, f64::abs),
        ("Math", "max") => Ok(serde_json::json!(args
            .iter()
            .filter_map(as_number)
            .fold(f64::NEG_INFINITY, f64::max))),
        ("Math", "min") => Ok(serde_json::json!(args
            .iter()
            .filter_map(as_number)
            .fold(f64::INFINITY, f64::min))),
        ("JSON", "stringify") => {
            let v = args.first().cloned().unwrap_or(Value::Null);
            Ok(Value::String(
                serde_json::to_string(&v).unwrap_or_default(),
            ))
        }
        ("JSON", "parse") => {
            let s = args
                .first()
                .and_then(|v| v.as_str())
                .ok_or_else(|| EvalError::TypeError("JSON.parse expects a string".into()))?;
            serde_json::from_str(s).map_err(|e| EvalError::TypeError(e.to_string()))
        }
        _ => Err(EvalError::UnknownCall(ns.to_string(), method.to_string())),
    }
}

fn unary_math(args: &[Value], f: impl Fn(f64) -> f64) -> Result<Value, EvalError> {
    let n = args
        .first()
        .and_then(as_number)
        .ok_or_else(|| EvalError::TypeError("expected a numeric argument".into()))?;
    Ok(serde_json::json!(f(n)))
}
