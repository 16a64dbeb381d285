//! Command handlers for the Unichat CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod chat;
pub mod clean_docs;
pub mod docs;
pub mod models;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use clean_docs::CleanDocsCommand;
pub use docs::DocsCommand;
pub use models::ModelsCommand;

use std::sync::Arc;
use unichat_core::config::AppConfig;
use unichat_core::AppResult;
use unichat_knowledge::{ConversationPipeline, FileConfigSource, ProviderRegistry};

/// Resolved configuration shared by every command.
#[derive(Debug)]
pub struct CommandContext {
    pub config: AppConfig,
    source: FileConfigSource,
}

impl CommandContext {
    pub fn new(config: AppConfig, source: FileConfigSource) -> Self {
        Self { config, source }
    }

    /// The configuration file as stored, without environment or flag
    /// overrides. Updates are applied to this and written back.
    pub fn stored_config(&self) -> AppResult<AppConfig> {
        AppConfig::load_stored(
            Some(self.config.workspace.clone()),
            self.config.config_file.clone(),
        )
    }

    /// A fresh, uninitialized pipeline reading the same configuration.
    pub fn pipeline(&self) -> ConversationPipeline {
        ConversationPipeline::new(Arc::new(self.source.clone()), Arc::new(ProviderRegistry))
    }
}
