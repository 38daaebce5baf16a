//! Skip-condition evaluation algorithm, shared by `pre_execution` and
//! `post_capture` skip checks.
//!
//! 1. Literal `"true"`/`"false"` (trimmed) resolve without interpolation.
//! 2. Interpolate the expression.
//! 3. `===`/`!==`/`&&`/`||`/leading `!` routes to the JS expression bridge.
//! 4. Otherwise, evaluate as JMESPath against the merged context, applying
//!    sugar: `== 'x'` → `` == `x` ``, and bare numeric/boolean/null literals
//!    get backtick-quoted.
//! 5. Any evaluation error means do-not-skip (`false`), logged as a warning.

use super::Interpolator;
use crate::expr;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static EQ_STR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"==\s*'([^']*)'"#).unwrap());
static EQ_BARE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"==\s*(true|false|null|-?\d+(?:\.\d+)?)\b").unwrap()
});

fn needs_js(expr_str: &str) -> bool {
    expr_str.contains("===")
        || expr_str.contains("!==")
        || expr_str.contains("&&")
        || expr_str.contains("||")
        || expr_str.trim_start().starts_with('!')
}

/// Rewrites JMESPath comparison sugar into backtick-literal form.
pub fn jmes_sugar(expr_str: &str) -> String {
    let with_strings = EQ_STR_RE.replace_all(expr_str, "== `$1`");
    EQ_BARE_RE
        .replace_all(&with_strings, "== `$1`")
        .into_owned()
}

/// Evaluates a skip expression against the merged context, returning
/// whether the step should be skipped.
pub fn should_skip(condition: &str, interpolator: &Interpolator<'_>, context: &Value) -> bool {
    let trimmed = condition.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return true;
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return false;
    }

    let interpolated = interpolator.interpolate_str(condition);

    if needs_js(&interpolated) {
        let ctx = interpolator
            .expr_extra
            .clone()
            .bind("variables", context.get("variables").cloned().unwrap_or(Value::Null));
        return match expr::eval_truthy(&interpolated, &ctx) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, expr = %interpolated, "skip: js evaluation failed, not skipping");
                false
            }
        };
    }

    let sugared = jmes_sugar(&interpolated);
    match crate::jmes::search_bool(&sugared, context) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, expr = %sugared, "skip: jmespath evaluation failed, not skipping");
            false
        }
    }
}
