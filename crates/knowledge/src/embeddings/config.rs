//! Embedding backend configuration.

use serde::{Deserialize, Serialize};

/// Settings for one embedding backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "ollama", "openai", "zhipuai", ...
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Base URL, the provider default when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Vector size for local providers; remote providers report their own
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Maximum number of texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_dimensions() -> usize {
    384
}

fn default_batch_size() -> usize {
    100
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            endpoint: None,
            api_key: None,
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
        }
    }
}

impl EmbeddingConfig {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }
}
