//! Variable scopes, interpolation, the global cross-suite registry, and
//! snapshot/restore.
//!
//! Grounded in the pack's `context::Context` (`${token}` regex
//! interpolation, recursive `interpolate_value`, `ENV_`-prefixed token
//! resolution), generalized to the five-layer precedence chain (runtime,
//! global-registry-exports, suite, imported, environment) and the
//! `{{...}}` interpolation grammar.

pub mod skip;

use crate::expr::{self, ExprContext};
use crate::faker::FakerProvider;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap());
static FAKER_CALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^faker\.([A-Za-z0-9_]+)\.([A-Za-z0-9_]+)\((.*)\)$").unwrap());

/// One exported-variable record for a single suite node_id.
#[derive(Debug, Clone, Default)]
pub struct NodeRecord {
    pub suite_name: String,
    pub export_names: HashSet<String>,
    pub values: HashMap<String, Value>,
}

/// Process-lifetime store of cross-suite exports, keyed by `node_id`.
#[derive(Debug, Default, Clone)]
pub struct GlobalRegistry {
    nodes: HashMap<String, NodeRecord>,
}

impl GlobalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a node's declared export name set, called at
    /// suite start so downstream hooks can publish against the right
    /// node_id even before any value has been captured.
    pub fn register_node(&mut self, node_id: &str, suite_name: &str, export_names: HashSet<String>) {
        self.nodes.insert(
            node_id.to_string(),
            NodeRecord {
                suite_name: suite_name.to_string(),
                export_names,
                values: HashMap::new(),
            },
        );
    }

    pub fn set_exported(&mut self, node_id: &str, name: &str, value: Value) {
        let entry = self.nodes.entry(node_id.to_string()).or_default();
        entry.values.insert(name.to_string(), value);
    }

    pub fn get(&self, node_id: &str, name: &str) -> Option<&Value> {
        self.nodes.get(node_id).and_then(|n| n.values.get(name))
    }

    /// Flat `{"nodeId.name": value}` map across all registered nodes.
    pub fn get_all_exported(&self) -> HashMap<String, Value> {
        let mut out = HashMap::new();
        for (node_id, record) in &self.nodes {
            for (name, value) in &record.values {
                out.insert(format!("{}.{}", node_id, name), value.clone());
            }
        }
        out
    }

    /// Resolves `{{varName}}` (un-dotted) against exported values only if
    /// the name is unambiguous across all registered nodes.
    pub fn resolve_unqualified(&self, name: &str) -> Option<Value> {
        let mut found: Option<&Value> = None;
        for record in self.nodes.values() {
            if let Some(v) = record.values.get(name) {
                if found.is_some() {
                    return None;
                }
                found = Some(v);
            }
        }
        found.cloned()
    }

    /// Resolves a dotted `nodeId.varName` reference directly.
    pub fn resolve_dotted(&self, dotted: &str) -> Option<Value> {
        let (node_id, name) = dotted.split_once('.')?;
        self.get(node_id, name).cloned()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    pub runtime: HashMap<String, Value>,
    pub suite: HashMap<String, Value>,
    pub imported: HashMap<String, Value>,
    pub environment: HashMap<String, Value>,
}

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope-cleanup step of the per-suite protocol: clears runtime, suite,
    /// and imported scopes. Environment scope survives.
    pub fn clear_non_global(&mut self) {
        self.runtime.clear();
        self.suite.clear();
        self.imported.clear();
    }

    pub fn set_runtime(&mut self, name: impl Into<String>, value: Value) {
        self.runtime.insert(name.into(), value);
    }

    /// Looks up `name` (a possibly dotted path) across the five-layer
    /// precedence: runtime, registry-exports, suite, imported, environment.
    /// A dotted path with no direct hit falls back to navigating the first
    /// scope whose top-level key matches the path's first segment.
    pub fn lookup(&self, name: &str, registry: &GlobalRegistry) -> Option<Value> {
        if let Some(v) = self.runtime.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = registry.resolve_dotted(name) {
            return Some(v);
        }
        if !name.contains('.') {
            if let Some(v) = registry.resolve_unqualified(name) {
                return Some(v);
            }
        }
        if let Some(v) = self.suite.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = self.imported.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = self.environment.get(name) {
            return Some(v.clone());
        }

        if let Some((head, rest)) = name.split_once('.') {
            for scope in [&self.runtime, &self.suite, &self.imported, &self.environment] {
                if let Some(root) = scope.get(head) {
                    let path: Vec<String> = rest.split('.').map(|s| s.to_string()).collect();
                    let navigated = expr::member(root, &path);
                    if navigated != Value::Null {
                        return Some(navigated);
                    }
                }
            }
        }

        None
    }

    /// Captures current mutable scopes plus a shallow copy of the registry
    /// index. Returns a closure that, when called, restores this snapshot.
    /// Environment scope is not captured.
    pub fn snapshot(&self, registry: &GlobalRegistry) -> Snapshot {
        Snapshot {
            runtime: self.runtime.clone(),
            suite: self.suite.clone(),
            imported: self.imported.clone(),
            registry: registry.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot, registry: &mut GlobalRegistry) {
        self.runtime = snapshot.runtime;
        self.suite = snapshot.suite;
        self.imported = snapshot.imported;
        *registry = snapshot.registry;
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    runtime: HashMap<String, Value>,
    suite: HashMap<String, Value>,
    imported: HashMap<String, Value>,
    registry: GlobalRegistry,
}

/// Recursive template interpolation over JSON-shaped values.
pub struct Interpolator<'a> {
    pub vars: &'a VariableContext,
    pub registry: &'a GlobalRegistry,
    pub faker: &'a dyn FakerProvider,
    /// Extra bindings layered on top of `vars` for expression evaluation
    /// (`response`, `captured`, `request`, etc.) — not part of the scope
    /// precedence chain, only visible to `{{$js:...}}` blocks.
    pub expr_extra: ExprContext,
}

impl<'a> Interpolator<'a> {
    pub fn new(
        vars: &'a VariableContext,
        registry: &'a GlobalRegistry,
        faker: &'a dyn FakerProvider,
    ) -> Self {
        Self {
            vars,
            registry,
            faker,
            expr_extra: ExprContext::new(),
        }
    }

    pub fn with_expr_extra(mut self, extra: ExprContext) -> Self {
        self.expr_extra = extra;
        self
    }

    /// Recurses into arrays/objects element-wise, preserving structure and
    /// non-string leaves; strings are run through `interpolate_string_value`.
    pub fn interpolate_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => self.interpolate_string_value(s),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.interpolate_value(v)).collect())
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.interpolate_value(v));
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }

    /// Whole-placeholder templates return the raw typed value; placeholders
    /// embedded in a larger string coerce to their string form.
    pub fn interpolate_string_value(&self, template: &str) -> Value {
        if let Some(caps) = full_placeholder(template) {
            return self.resolve_placeholder(&caps);
        }
        Value::String(self.interpolate_str(template))
    }

    pub fn interpolate_str(&self, template: &str) -> String {
        PLACEHOLDER_RE
            .replace_all(template, |caps: &regex::Captures| {
                let inner = caps[1].trim();
                match self.resolve_placeholder(inner) {
                    Value::String(s) => s,
                    Value::Null => caps[0].to_string(),
                    other => value_to_display_string(&other),
                }
            })
            .into_owned()
    }

    fn resolve_placeholder(&self, inner: &str) -> Value {
        let inner = inner.trim();
        if let Some(expr_src) = inner.strip_prefix("$js:") {
            return self.eval_js(expr_src);
        }
        if let Some(caps) = FAKER_CALL_RE.captures(inner) {
            return self.eval_faker(&caps[1], &caps[2], &caps[3]);
        }
        match self.vars.lookup(inner, self.registry) {
            Some(v) => v,
            None => {
                tracing::warn!(placeholder = inner, "interpolation: variable not resolved");
                Value::Null
            }
        }
    }

    fn eval_js(&self, source: &str) -> Value {
        let ctx = self.build_expr_ctx();
        match expr::eval(source, &ctx) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, expr = source, "js evaluation failed");
                Value::Null
            }
        }
    }

    fn eval_faker(&self, category: &str, method: &str, raw_args: &str) -> Value {
        let args = parse_faker_args(raw_args);
        match self.faker.generate(category, method, &args) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "faker evaluation failed");
                Value::Null
            }
        }
    }

    fn build_expr_ctx(&self) -> ExprContext {
        let mut ctx = self.expr_extra.clone();
        let mut variables = serde_json::Map::new();
        for (k, v) in &self.vars.runtime {
            variables.insert(k.clone(), v.clone());
        }
        for (k, v) in &self.vars.suite {
            variables.entry(k.clone()).or_insert_with(|| v.clone());
        }
        for (k, v) in &self.vars.imported {
            variables.entry(k.clone()).or_insert_with(|| v.clone());
        }
        for (k, v) in &self.vars.environment {
            variables.entry(k.clone()).or_insert_with(|| v.clone());
        }
        if ctx.get("variables").is_none() {
            ctx.set("variables", Value::Object(variables));
        }
        ctx
    }
}

fn full_placeholder(template: &str) -> Option<String> {
    let trimmed = template.trim();
    let caps = PLACEHOLDER_RE.captures(trimmed)?;
    if caps.get(0)?.as_str() == trimmed {
        Some(caps[1].trim().to_string())
    } else {
        None
    }
}

fn value_to_display_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_faker_args(raw: &str) -> Vec<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(',')
        .map(|part| {
            let part = part.trim();
            serde_json::from_str(part).unwrap_or_else(|_| Value::String(part.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faker::DefaultFakerProvider;

    fn interpolator<'a>(
        vars: &'a VariableContext,
        registry: &'a GlobalRegistry,
        faker: &'a DefaultFakerProvider,
    ) -> Interpolator<'a> {
        Interpolator::new(vars, registry, faker)
    }

    #[test]
    fn whole_placeholder_returns_typed_value() {
        let mut vars = VariableContext::new();
        vars.set_runtime("uid", Value::from(42));
        let registry = GlobalRegistry::new();
        let faker = DefaultFakerProvider;
        let interp = interpolator(&vars, &registry, &faker);
        assert_eq!(interp.interpolate_string_value("{{uid}}"), Value::from(42));
    }

    #[test]
    fn embedded_placeholder_coerces_to_string() {
        let mut vars = VariableContext::new();
        vars.set_runtime("uid", Value::from(42));
        let registry = GlobalRegistry::new();
        let faker = DefaultFakerProvider;
        let interp = interpolator(&vars, &registry, &faker);
        assert_eq!(interp.interpolate_str("/v1/u/{{uid}}"), "/v1/u/42");
    }

    #[test]
    fn lookup_precedence_runtime_over_suite() {
        let mut vars = VariableContext::new();
        vars.suite.insert("x".to_string(), Value::from("suite"));
        vars.set_runtime("x", Value::from("runtime"));
        let registry = GlobalRegistry::new();
        assert_eq!(vars.lookup("x", &registry), Some(Value::from("runtime")));
    }

    #[test]
    fn registry_dotted_and_unqualified_lookup() {
        let mut registry = GlobalRegistry::new();
        registry.register_node("login", "Login", HashSet::from(["token".to_string()]));
        registry.set_exported("login", "token", Value::from("abc"));
        let vars = VariableContext::new();
        assert_eq!(vars.lookup("login.token", &registry), Some(Value::from("abc")));
        assert_eq!(vars.lookup("token", &registry), Some(Value::from("abc")));
    }

    #[test]
    fn snapshot_restore_round_trips_state() {
        let mut vars = VariableContext::new();
        vars.set_runtime("a", Value::from(1));
        let mut registry = GlobalRegistry::new();
        registry.register_node("n", "N", HashSet::new());
        registry.set_exported("n", "x", Value::from(1));

        let snap = vars.snapshot(&registry);

        vars.set_runtime("a", Value::from(2));
        registry.set_exported("n", "x", Value::from(2));

        vars.restore(snap, &mut registry);

        assert_eq!(vars.runtime.get("a"), Some(&Value::from(1)));
        assert_eq!(registry.get("n", "x"), Some(&Value::from(1)));
    }
}
