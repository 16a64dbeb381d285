//! Prompt types for Unichat.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Variables the template requires; rendering fails if one is missing
    #[serde(default)]
    pub variables: Vec<String>,

    /// Template string with Handlebars syntax, rendered as the system message
    pub template: String,
}

impl PromptDefinition {
    /// Declared variables absent from `provided`, in declaration order.
    pub fn missing_variables(&self, provided: &HashMap<String, String>) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|name| !provided.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// A rendered system message and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltPrompt {
    pub system: String,

    /// Id of the definition that was rendered
    pub prompt_id: String,

    /// Names of the variables supplied at render time, sorted
    pub variables: Vec<String>,
}

impl BuiltPrompt {
    pub fn new(system: String, prompt_id: &str, variables: &HashMap<String, String>) -> Self {
        let mut names: Vec<String> = variables.keys().cloned().collect();
        names.sort();
        Self {
            system,
            prompt_id: prompt_id.to_string(),
            variables: names,
        }
    }
}
