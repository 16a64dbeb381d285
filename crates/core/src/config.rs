//! Configuration management for Unichat.
//!
//! Configuration is merged from several sources, lowest precedence first:
//! - Built-in factory defaults and provider catalogue
//! - The workspace config file (`.unichat/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! Updates made at runtime (deployment profile, knowledge base) are written
//! back atomically: the whole file is serialized to a sibling temp file which
//! is then renamed over the original.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers that can serve chat completions.
pub const LLM_PROVIDERS: &[&str] = &[
    "openai",
    "moonshot",
    "baichuan",
    "zhipuai",
    "deepseek",
    "dashscope",
    "ollama",
];

/// Providers that can serve embeddings. `trigram` is a local, offline embedder.
pub const EMBEDDING_PROVIDERS: &[&str] = &[
    "openai",
    "baichuan",
    "zhipuai",
    "dashscope",
    "ollama",
    "trigram",
];

/// Which language model and embedding model the pipeline is bound to.
///
/// Provider names are lowercase. Empty fields are filled from the factory
/// defaults when the configuration is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentProfile {
    pub llm_provider: String,
    pub llm_model: String,
    pub emb_provider: String,
    pub emb_model: String,
}

impl DeploymentProfile {
    pub fn new(
        llm_provider: impl Into<String>,
        llm_model: impl Into<String>,
        emb_provider: impl Into<String>,
        emb_model: impl Into<String>,
    ) -> Self {
        Self {
            llm_provider: llm_provider.into(),
            llm_model: llm_model.into(),
            emb_provider: emb_provider.into(),
            emb_model: emb_model.into(),
        }
    }

    /// Fill every empty field from `defaults`.
    pub fn fill_from(&mut self, defaults: &DeploymentProfile) {
        fill_if_empty(&mut self.llm_provider, &defaults.llm_provider);
        fill_if_empty(&mut self.llm_model, &defaults.llm_model);
        fill_if_empty(&mut self.emb_provider, &defaults.emb_provider);
        fill_if_empty(&mut self.emb_model, &defaults.emb_model);
    }

    fn normalize(&mut self) {
        self.llm_provider = self.llm_provider.trim().to_lowercase();
        self.emb_provider = self.emb_provider.trim().to_lowercase();
        self.llm_model = self.llm_model.trim().to_string();
        self.emb_model = self.emb_model.trim().to_string();
    }
}

fn fill_if_empty(target: &mut String, source: &str) {
    if target.trim().is_empty() {
        *target = source.to_string();
    }
}

/// The knowledge base: which documents to ingest and the assistant persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Filenames relative to the documents directory
    pub documents: Vec<String>,

    /// Persona / robot description placed at the head of the answer prompt
    pub robot_desc: String,

    /// Documents directory, relative to the workspace unless absolute
    pub documents_dir: PathBuf,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
            robot_desc: "You are a helpful assistant that answers questions about the documents you were given.".to_string(),
            documents_dir: PathBuf::from("local_docs"),
        }
    }
}

/// One entry of the provider catalogue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEntry {
    /// Base URL of the provider's API
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Language models offered; the first one is used when none is configured
    pub llm_models: Vec<String>,

    /// Embedding models offered
    pub emb_models: Vec<String>,

    /// Short human-readable introduction
    pub intro: String,
}

/// Provider catalogue entry as presented to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderOption {
    pub provider: String,
    pub llm_models: Vec<String>,
    pub emb_models: Vec<String>,
    pub intro: String,
}

/// Retrieval and conversation tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Target chunk length in characters
    pub chunk_size: usize,

    /// Characters of the previous chunk re-included at the head of the next
    pub chunk_overlap: usize,

    /// Number of chunks handed to the answer generator
    pub top_k: usize,

    /// Candidates fetched by similarity before diversity re-ranking
    pub fetch_k: usize,

    /// Relevance/diversity trade-off, 1.0 is pure relevance
    pub mmr_lambda: f32,

    /// Maximum messages kept per session
    pub history_cap: usize,

    /// Language the assistant answers in
    pub language: String,

    /// Sampling temperature for both model calls
    pub temperature: f32,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 300,
            chunk_overlap: 20,
            top_k: 3,
            fetch_k: 20,
            mmr_lambda: 0.5,
            history_cap: 128,
            language: "English".to_string(),
            temperature: 0.3,
        }
    }
}

impl RagSettings {
    /// Reject settings the chunker, retriever or history store cannot honour.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("rag.chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 || self.fetch_k < self.top_k {
            return Err(AppError::Config(format!(
                "rag.top_k ({}) must be positive and at most rag.fetch_k ({})",
                self.top_k, self.fetch_k
            )));
        }
        if !(0.0..=1.0).contains(&self.mmr_lambda) {
            return Err(AppError::Config(format!(
                "rag.mmr_lambda must be within [0, 1], got {}",
                self.mmr_lambda
            )));
        }
        if self.history_cap < 2 {
            return Err(AppError::Config(
                "rag.history_cap must hold at least one exchange (2 messages)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    deployment: Option<DeploymentProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    defaults: Option<DeploymentProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    knowledge: Option<KnowledgeConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    providers: Option<BTreeMap<String, ProviderEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rag: Option<RagSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the workspace root (contains .unichat/)
    pub workspace: PathBuf,

    /// Optional config file path, overrides `.unichat/config.yaml`
    pub config_file: Option<PathBuf>,

    /// Active deployment profile
    pub deployment: DeploymentProfile,

    /// Factory defaults, used for empty fields and as the local-model fallback
    pub defaults: DeploymentProfile,

    pub knowledge: KnowledgeConfig,

    /// Provider catalogue keyed by lowercase provider name
    pub providers: BTreeMap<String, ProviderEntry>,

    pub rag: RagSettings,

    /// Log level override
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            deployment: DeploymentProfile::default(),
            defaults: DeploymentProfile::new("ollama", "qwen2.5", "ollama", "nomic-embed-text"),
            knowledge: KnowledgeConfig::default(),
            providers: builtin_providers(),
            rag: RagSettings::default(),
            log_level: None,
            log_json: false,
            verbose: false,
            no_color: false,
        }
    }
}

fn provider_entry(
    endpoint: &str,
    api_key_env: Option<&str>,
    llm_models: &[&str],
    emb_models: &[&str],
    intro: &str,
) -> ProviderEntry {
    ProviderEntry {
        endpoint: Some(endpoint.to_string()),
        api_key_env: api_key_env.map(str::to_string),
        llm_models: llm_models.iter().map(|m| m.to_string()).collect(),
        emb_models: emb_models.iter().map(|m| m.to_string()).collect(),
        intro: intro.to_string(),
    }
}

fn builtin_providers() -> BTreeMap<String, ProviderEntry> {
    let mut providers = BTreeMap::new();
    providers.insert(
        "openai".to_string(),
        provider_entry(
            "https://api.openai.com/v1",
            Some("OPENAI_API_KEY"),
            &["gpt-4o-mini", "gpt-4o"],
            &["text-embedding-3-small", "text-embedding-3-large"],
            "OpenAI hosted models",
        ),
    );
    providers.insert(
        "moonshot".to_string(),
        provider_entry(
            "https://api.moonshot.cn/v1",
            Some("MOONSHOT_API_KEY"),
            &["moonshot-v1-8k", "moonshot-v1-32k"],
            &[],
            "Moonshot AI (Kimi) hosted models",
        ),
    );
    providers.insert(
        "baichuan".to_string(),
        provider_entry(
            "https://api.baichuan-ai.com/v1",
            Some("BAICHUAN_API_KEY"),
            &["Baichuan4", "Baichuan3-Turbo"],
            &["Baichuan-Text-Embedding"],
            "Baichuan hosted models",
        ),
    );
    providers.insert(
        "zhipuai".to_string(),
        provider_entry(
            "https://open.bigmodel.cn/api/paas/v4",
            Some("ZHIPUAI_API_KEY"),
            &["glm-4-flash", "glm-4-plus"],
            &["embedding-3"],
            "Zhipu AI GLM hosted models",
        ),
    );
    providers.insert(
        "deepseek".to_string(),
        provider_entry(
            "https://api.deepseek.com/v1",
            Some("DEEPSEEK_API_KEY"),
            &["deepseek-chat", "deepseek-reasoner"],
            &[],
            "DeepSeek hosted models",
        ),
    );
    providers.insert(
        "dashscope".to_string(),
        provider_entry(
            "https://dashscope.aliyuncs.com/compatible-mode/v1",
            Some("DASHSCOPE_API_KEY"),
            &["qwen-plus", "qwen-turbo"],
            &["text-embedding-v3"],
            "Alibaba DashScope (Qwen) hosted models",
        ),
    );
    providers.insert(
        "ollama".to_string(),
        provider_entry(
            "http://localhost:11434",
            None,
            &["qwen2.5", "deepseek-r1", "llama3.2"],
            &["nomic-embed-text", "bge-m3"],
            "Models served by a local Ollama instance",
        ),
    );
    providers
}

impl AppConfig {
    /// Load configuration for the current directory (or `UNICHAT_WORKSPACE`).
    ///
    /// Environment variables:
    /// - `UNICHAT_WORKSPACE`: Override workspace path
    /// - `UNICHAT_CONFIG`: Path to config file
    /// - `UNICHAT_LLM_PROVIDER`, `UNICHAT_LLM_MODEL`: Language model selection
    /// - `UNICHAT_EMB_PROVIDER`, `UNICHAT_EMB_MODEL`: Embedding model selection
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use unichat_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Load configuration with an explicit workspace and/or config file.
    ///
    /// Explicit arguments win over `UNICHAT_WORKSPACE` and `UNICHAT_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::read(workspace, config_file)?;

        // Environment variables override the YAML config
        if let Ok(provider) = std::env::var("UNICHAT_LLM_PROVIDER") {
            config.deployment.llm_provider = provider;
        }
        if let Ok(model) = std::env::var("UNICHAT_LLM_MODEL") {
            config.deployment.llm_model = model;
        }
        if let Ok(provider) = std::env::var("UNICHAT_EMB_PROVIDER") {
            config.deployment.emb_provider = provider;
        }
        if let Ok(model) = std::env::var("UNICHAT_EMB_MODEL") {
            config.deployment.emb_model = model;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        config.apply_factory_defaults();
        Ok(config)
    }

    /// Load only what the config file holds, without environment overrides.
    ///
    /// This is the base for `update_*` calls, so that one-off overrides are
    /// never written back to the file.
    pub fn load_stored(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::read(workspace, config_file)?;
        config.apply_factory_defaults();
        Ok(config)
    }

    /// Built-in defaults merged with the config file, if there is one.
    fn read(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        } else if let Ok(workspace) = std::env::var("UNICHAT_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Some(config_file) = config_file {
            config.config_file = Some(config_file);
        } else if let Ok(config_file) = std::env::var("UNICHAT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config.config_path();
        if config_path.exists() {
            config.merge_yaml(&config_path)?;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &Path) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        if let Some(deployment) = config_file.deployment {
            self.deployment = deployment;
        }

        if let Some(defaults) = config_file.defaults {
            let mut defaults = defaults;
            defaults.fill_from(&self.defaults);
            self.defaults = defaults;
        }

        if let Some(knowledge) = config_file.knowledge {
            self.knowledge = knowledge;
        }

        // File entries replace built-in entries of the same name
        if let Some(providers) = config_file.providers {
            for (name, entry) in providers {
                self.providers.insert(name.to_lowercase(), entry);
            }
        }

        if let Some(rag) = config_file.rag {
            self.rag = rag;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
            if let Some(json) = logging.json {
                self.log_json = json;
            }
        }

        Ok(())
    }

    /// Fill empty deployment fields from the factory defaults.
    ///
    /// An empty language model is taken from the provider's catalogue first,
    /// so switching provider without naming a model picks its primary model.
    pub fn apply_factory_defaults(&mut self) {
        self.deployment.normalize();
        self.defaults.normalize();

        if self.deployment.llm_model.is_empty() && !self.deployment.llm_provider.is_empty() {
            if let Some(model) = self
                .providers
                .get(&self.deployment.llm_provider)
                .and_then(|entry| entry.llm_models.first())
            {
                self.deployment.llm_model = model.clone();
            }
        }

        let defaults = self.defaults.clone();
        self.deployment.fill_from(&defaults);
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        llm_provider: Option<String>,
        llm_model: Option<String>,
        emb_provider: Option<String>,
        emb_model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(provider) = llm_provider {
            self.deployment.llm_provider = provider;
            // A different provider's model id is meaningless here
            self.deployment.llm_model.clear();
        }

        if let Some(model) = llm_model {
            self.deployment.llm_model = model;
        }

        if let Some(provider) = emb_provider {
            self.deployment.emb_provider = provider;
            self.deployment.emb_model.clear();
        }

        if let Some(model) = emb_model {
            self.deployment.emb_model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self.apply_factory_defaults();
        self
    }

    /// Get the path to the .unichat directory.
    pub fn unichat_dir(&self) -> PathBuf {
        self.workspace.join(".unichat")
    }

    /// Ensure the .unichat directory exists.
    pub fn ensure_unichat_dir(&self) -> AppResult<()> {
        let dir = self.unichat_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .unichat directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Path of the config file this configuration reads and writes.
    pub fn config_path(&self) -> PathBuf {
        match self.config_file {
            Some(ref path) => path.clone(),
            None => self.unichat_dir().join("config.yaml"),
        }
    }

    /// Directory holding the document corpus.
    pub fn documents_dir(&self) -> PathBuf {
        if self.knowledge.documents_dir.is_absolute() {
            self.knowledge.documents_dir.clone()
        } else {
            self.workspace.join(&self.knowledge.documents_dir)
        }
    }

    /// Directory holding prompt overrides.
    pub fn prompts_dir(&self) -> PathBuf {
        self.unichat_dir().join("prompts")
    }

    /// Look up a provider catalogue entry.
    pub fn provider(&self, name: &str) -> Option<&ProviderEntry> {
        self.providers.get(&name.to_lowercase())
    }

    /// Resolve a provider's API key from its configured environment variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        self.provider(provider)
            .and_then(|entry| entry.api_key_env.as_deref())
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }

    /// Providers with the models they offer.
    pub fn provider_catalogue(&self) -> Vec<ProviderOption> {
        self.providers
            .iter()
            .map(|(name, entry)| ProviderOption {
                provider: name.clone(),
                llm_models: entry.llm_models.clone(),
                emb_models: entry.emb_models.clone(),
                intro: entry.intro.clone(),
            })
            .collect()
    }

    /// Validate the active deployment profile and retrieval settings.
    pub fn validate(&self) -> AppResult<()> {
        let profile = &self.deployment;

        if !LLM_PROVIDERS.contains(&profile.llm_provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown LLM provider: {}. Supported: {}",
                profile.llm_provider,
                LLM_PROVIDERS.join(", ")
            )));
        }

        if !EMBEDDING_PROVIDERS.contains(&profile.emb_provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                profile.emb_provider,
                EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if profile.llm_model.is_empty() {
            return Err(AppError::Config(format!(
                "No language model configured for provider {}",
                profile.llm_provider
            )));
        }

        if profile.emb_model.is_empty() && profile.emb_provider != "trigram" {
            return Err(AppError::Config(format!(
                "No embedding model configured for provider {}",
                profile.emb_provider
            )));
        }

        self.rag.validate()
    }

    /// Persist a new deployment profile.
    ///
    /// The profile is validated first; an invalid one leaves both this config
    /// and the file untouched.
    pub fn update_deployment_profile(&mut self, profile: DeploymentProfile) -> AppResult<()> {
        let previous = std::mem::replace(&mut self.deployment, profile);
        self.apply_factory_defaults();
        if let Err(e) = self.validate() {
            self.deployment = previous;
            return Err(e);
        }
        self.save()
    }

    /// Persist knowledge base changes. `None` leaves a field untouched.
    pub fn update_knowledge(
        &mut self,
        documents: Option<Vec<String>>,
        robot_desc: Option<String>,
    ) -> AppResult<()> {
        if documents.is_none() && robot_desc.is_none() {
            return Ok(());
        }
        if let Some(documents) = documents {
            self.knowledge.documents = documents
                .into_iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect();
        }
        if let Some(robot_desc) = robot_desc {
            self.knowledge.robot_desc = robot_desc.trim().to_string();
        }
        self.save()
    }

    /// Write the configuration file atomically.
    ///
    /// Readers see either the previous file or the new one, never a partial write.
    pub fn save(&self) -> AppResult<()> {
        let path = self.config_path();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let yaml = serde_yaml::to_string(&self.to_file())?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(yaml.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| AppError::Io(e.error))?;

        tracing::debug!(path = ?path, "Configuration saved");
        Ok(())
    }

    fn to_file(&self) -> ConfigFile {
        ConfigFile {
            deployment: Some(self.deployment.clone()),
            defaults: Some(self.defaults.clone()),
            knowledge: Some(self.knowledge.clone()),
            providers: Some(self.providers.clone()),
            rag: Some(self.rag.clone()),
            logging: Some(LoggingConfig {
                level: self.log_level.clone(),
                color: Some(!self.no_color),
                json: Some(self.log_json),
            }),
        }
    }
}
