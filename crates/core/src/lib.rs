//! Unichat Core Library
//!
//! This crate provides the foundational utilities shared by every Unichat crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management (deployment profile, knowledge base, RAG settings)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, DeploymentProfile, KnowledgeConfig, ProviderEntry, RagSettings};
pub use error::{AppError, AppResult};
