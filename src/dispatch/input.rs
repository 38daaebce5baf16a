//! Input dispatch strategy: resolves every prompt in
//! declaration order, writing each into the runtime scope under its
//! `variable` name. No direct precedent in the corpus; grounded in the
//! `collaborators::input::InputPrompter` contract this strategy drives.

use crate::collaborators::input::InputPrompter;
use crate::context::VariableContext;
use crate::errors::EngineError;
use crate::model::InputSpec;
use serde_json::Value;
use std::collections::HashMap;

pub struct InputOutcome {
    pub captured: HashMap<String, Value>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Runs every prompt in `spec.prompts` through `prompter`, writing each
/// resolved value into `vars.runtime` as it goes so later prompts in the
/// same step can reference earlier answers via interpolation if needed.
pub async fn run(spec: &InputSpec, vars: &mut VariableContext, prompter: &dyn InputPrompter, ci_mode: bool) -> InputOutcome {
    let mut captured = HashMap::new();
    for prompt in &spec.prompts {
        match prompter.prompt(prompt, ci_mode).await {
            Ok(value) => {
                vars.set_runtime(prompt.variable.clone(), value.clone());
                captured.insert(prompt.variable.clone(), value);
            }
            Err(e) => {
                return InputOutcome {
                    captured,
                    success: false,
                    error_message: Some(fail_message(&prompt.variable, &e)),
                };
            }
        }
    }
    InputOutcome {
        captured,
        success: true,
        error_message: None,
    }
}

fn fail_message(variable: &str, error: &EngineError) -> String {
    format!("input prompt '{}' failed: {}", variable, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::input::DialoguerInputPrompter;
    use crate::model::{InputKind, InputPromptSpec};

    #[tokio::test]
    async fn resolves_every_prompt_in_ci_mode() {
        let spec = InputSpec {
            prompts: vec![
                InputPromptSpec {
                    variable: "env".to_string(),
                    prompt: "env?".to_string(),
                    kind: Some(InputKind::Text),
                    default: Some(Value::from("staging")),
                    ci_default: None,
                    options: None,
                    required: false,
                },
                InputPromptSpec {
                    variable: "confirmed".to_string(),
                    prompt: "ok?".to_string(),
                    kind: Some(InputKind::Confirm),
                    default: Some(Value::Bool(true)),
                    ci_default: None,
                    options: None,
                    required: false,
                },
            ],
        };
        let mut vars = VariableContext::new();
        let prompter = DialoguerInputPrompter;

        let outcome = run(&spec, &mut vars, &prompter, true).await;

        assert!(outcome.success);
        assert_eq!(vars.runtime.get("env"), Some(&Value::from("staging")));
        assert_eq!(vars.runtime.get("confirmed"), Some(&Value::Bool(true)));
    }

    #[tokio::test]
    async fn required_prompt_without_default_fails_in_ci_mode() {
        let spec = InputSpec {
            prompts: vec![InputPromptSpec {
                variable: "token".to_string(),
                prompt: "token?".to_string(),
                kind: Some(InputKind::Text),
                default: None,
                ci_default: None,
                options: None,
                required: true,
            }],
        };
        let mut vars = VariableContext::new();
        let prompter = DialoguerInputPrompter;

        let outcome = run(&spec, &mut vars, &prompter, true).await;

        assert!(!outcome.success);
    }
}
