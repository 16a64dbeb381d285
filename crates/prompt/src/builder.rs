//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use std::collections::HashMap;
use unichat_core::{AppError, AppResult};

/// Build a prompt from a definition and template variables.
///
/// Every variable the definition declares must be present; values may be empty.
///
/// # Example
/// ```no_run
/// use unichat_prompt::{build_prompt, builtin_prompt, ANSWER_PROMPT_ID};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = builtin_prompt(ANSWER_PROMPT_ID)?;
/// let mut vars = HashMap::new();
/// vars.insert("context".to_string(), "Paris is the capital of France.".to_string());
/// let built = build_prompt(&def, vars)?;
/// println!("System prompt: {}", built.system);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let missing = definition.missing_variables(&variables);
    if !missing.is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt {} is missing variables: {}",
            definition.id,
            missing.join(", ")
        )));
    }

    let system = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt::new(system, &definition.id, &variables))
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
