//! Interactive input collaborator (the `InputPrompter` contract).
//! No prior interactive-input step exists in the corpus; this is grounded in the pack's use
//! of `dialoguer` for CLI prompts, generalized into the six input-type
//! strategies plus non-interactive `ci_default` mode.

use crate::errors::EngineError;
use crate::model::{InputKind, InputPromptSpec};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait InputPrompter: Send + Sync {
    /// Resolves one prompt to a typed value. In `ci_mode`, every prompt
    /// resolves to `ci_default` (if present) or `default`, without reading
    /// stdin.
    async fn prompt(&self, spec: &InputPromptSpec, ci_mode: bool) -> Result<Value, EngineError>;
}

const MAX_RETRIES: u32 = 5;

/// Default collaborator backing the CLI binary: reads from stdin via
/// `dialoguer`.
pub struct DialoguerInputPrompter;

#[async_trait]
impl InputPrompter for DialoguerInputPrompter {
    async fn prompt(&self, spec: &InputPromptSpec, ci_mode: bool) -> Result<Value, EngineError> {
        if ci_mode {
            return resolve_ci(spec);
        }
        let spec = spec.clone();
        tokio::task::spawn_blocking(move || prompt_blocking(&spec))
            .await
            .map_err(|e| EngineError::InputValidationError(e.to_string()))?
    }
}

fn resolve_ci(spec: &InputPromptSpec) -> Result<Value, EngineError> {
    if let Some(v) = &spec.ci_default {
        return Ok(v.clone());
    }
    if let Some(v) = &spec.default {
        return Ok(v.clone());
    }
    if spec.required {
        return Err(EngineError::InputValidationError(format!(
            "no ci_default/default for required prompt '{}' in CI mode",
            spec.variable
        )));
    }
    Ok(Value::Null)
}

fn prompt_blocking(spec: &InputPromptSpec) -> Result<Value, EngineError> {
    use dialoguer::{Confirm, Input, Password, Select};

    let kind = spec.kind.unwrap_or(InputKind::Text);
    match kind {
        InputKind::Text | InputKind::Email | InputKind::Url => {
            let mut input = Input::<String>::new().with_prompt(&spec.prompt);
            if let Some(default) = spec.default.as_ref().and_then(|v| v.as_str()) {
                input = input.default(default.to_string());
            }
            let value = input
                .interact_text()
                .map_err(|e| EngineError::InputValidationError(e.to_string()))?;
            Ok(Value::String(value))
        }
        InputKind::Password => {
            let value = Password::new()
                .with_prompt(&spec.prompt)
                .interact()
                .map_err(|e| EngineError::InputValidationError(e.to_string()))?;
            Ok(Value::String(value))
        }
        InputKind::Number => {
            let raw = Input::<String>::new()
                .with_prompt(&spec.prompt)
                .allow_empty(true)
                .interact_text()
                .map_err(|e| EngineError::InputValidationError(e.to_string()))?;
            match raw.trim().parse::<f64>() {
                Ok(n) => Ok(Value::from(n)),
                Err(_) => Ok(spec.default.clone().unwrap_or(Value::Null)),
            }
        }
        InputKind::Select => {
            let options = spec.options.clone().unwrap_or_default();
            if options.is_empty() {
                return Ok(spec.default.clone().unwrap_or(Value::Null));
            }
            for _ in 0..MAX_RETRIES {
                let selection = Select::new()
                    .with_prompt(&spec.prompt)
                    .items(&options)
                    .interact_opt()
                    .map_err(|e| EngineError::InputValidationError(e.to_string()))?;
                if let Some(idx) = selection {
                    return Ok(Value::String(options[idx].clone()));
                }
            }
            Ok(spec.default.clone().unwrap_or(Value::Null))
        }
        InputKind::Confirm => {
            let mut confirm = Confirm::new().with_prompt(&spec.prompt);
            if let Some(default) = spec.default.as_ref().and_then(|v| v.as_bool()) {
                confirm = confirm.default(default);
            }
            let value = confirm
                .interact()
                .map_err(|e| EngineError::InputValidationError(e.to_string()))?;
            Ok(Value::Bool(value))
        }
        InputKind::Multiline => {
            println!("{} (end with a line containing only END)", spec.prompt);
            let mut lines = Vec::new();
            loop {
                let mut line = String::new();
                let read = std::io::stdin()
                    .read_line(&mut line)
                    .map_err(|e| EngineError::InputValidationError(e.to_string()))?;
                if read == 0 || line.trim_end() == "END" {
                    break;
                }
                lines.push(line.trim_end_matches('\n').to_string());
            }
            Ok(Value::String(lines.join("\n")))
        }
    }
}

/// Parses the `{y,yes}`/`{n,no}` grammar for confirm-type prompts supplied
/// non-interactively (e.g. from `ci_default` as a string rather than bool).
pub fn parse_confirm_string(raw: &str, default: Option<bool>) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        "" => default,
        _ => None,
    }
}
