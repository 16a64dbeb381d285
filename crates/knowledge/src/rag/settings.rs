//! What the pipeline reads from configuration at setup and restart.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use unichat_core::{AppConfig, AppResult, DeploymentProfile, RagSettings};

/// How to reach one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderAccess {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

/// Configuration snapshot taken at setup or restart.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub workspace: PathBuf,
    pub documents_dir: PathBuf,

    /// Filenames relative to `documents_dir`
    pub documents: Vec<String>,

    /// Robot description heading the answer prompt
    pub persona: String,

    pub profile: DeploymentProfile,

    /// Factory profile used when a local model is missing
    pub fallback: DeploymentProfile,

    pub rag: RagSettings,

    pub providers: HashMap<String, ProviderAccess>,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let providers = config
            .providers
            .iter()
            .map(|(name, entry)| {
                (
                    name.clone(),
                    ProviderAccess {
                        endpoint: entry.endpoint.clone(),
                        api_key: config.resolve_api_key(name),
                    },
                )
            })
            .collect();

        Self {
            workspace: config.workspace.clone(),
            documents_dir: config.documents_dir(),
            documents: config.knowledge.documents.clone(),
            persona: config.knowledge.robot_desc.clone(),
            profile: config.deployment.clone(),
            fallback: config.defaults.clone(),
            rag: config.rag.clone(),
            providers,
        }
    }

    /// Access settings for `provider`; defaults when it has no catalogue entry.
    pub fn access(&self, provider: &str) -> ProviderAccess {
        self.providers
            .get(&provider.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }
}

/// Where the pipeline gets its settings from.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> AppResult<PipelineSettings>;
}

/// Reads `.unichat/config.yaml` and the environment on every load.
#[derive(Debug, Clone, Default)]
pub struct FileConfigSource {
    workspace: Option<PathBuf>,
    config_file: Option<PathBuf>,
    llm_provider: Option<String>,
    llm_model: Option<String>,
    emb_provider: Option<String>,
    emb_model: Option<String>,
}

impl FileConfigSource {
    pub fn new(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> Self {
        Self {
            workspace,
            config_file,
            ..Default::default()
        }
    }

    /// Command-line model selection, re-applied on every load.
    pub fn with_profile_overrides(
        mut self,
        llm_provider: Option<String>,
        llm_model: Option<String>,
        emb_provider: Option<String>,
        emb_model: Option<String>,
    ) -> Self {
        self.llm_provider = llm_provider;
        self.llm_model = llm_model;
        self.emb_provider = emb_provider;
        self.emb_model = emb_model;
        self
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> AppResult<PipelineSettings> {
        let config = AppConfig::load_from(self.workspace.clone(), self.config_file.clone())?
            .with_overrides(
                self.llm_provider.clone(),
                self.llm_model.clone(),
                self.emb_provider.clone(),
                self.emb_model.clone(),
                None,
                false,
                false,
            );
        config.validate()?;

        tracing::debug!(
            config = ?config.config_path(),
            llm = %format!("{}/{}", config.deployment.llm_provider, config.deployment.llm_model),
            emb = %format!("{}/{}", config.deployment.emb_provider, config.deployment.emb_model),
            "Loaded pipeline configuration"
        );

        Ok(PipelineSettings::from_config(&config))
    }
}

/// Settings held in memory, replaceable between restarts.
#[derive(Debug)]
pub struct StaticConfigSource {
    settings: Mutex<PipelineSettings>,
}

impl StaticConfigSource {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }

    pub fn set(&self, settings: PipelineSettings) {
        *self.settings.lock().unwrap_or_else(|e| e.into_inner()) = settings;
    }

    pub fn update(&self, change: impl FnOnce(&mut PipelineSettings)) {
        change(&mut self.settings.lock().unwrap_or_else(|e| e.into_inner()));
    }
}

impl ConfigSource for StaticConfigSource {
    fn load(&self) -> AppResult<PipelineSettings> {
        Ok(self
            .settings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}
