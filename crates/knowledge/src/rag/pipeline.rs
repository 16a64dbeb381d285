//! Conversation pipeline lifecycle.
//!
//! One pipeline instance serves every session of the process. Lifecycle
//! transitions take the write side of the state lock; `ask` holds the read
//! side for the whole call, so no question ever sees a half-built index.

use crate::chunker::Chunker;
use crate::index::{EmbeddingIndex, RetrievalOptions};
use crate::loader::{self, DocumentLoader};
use crate::rag::answer::{AnswerGenerator, AnswerPersona};
use crate::rag::backends::BackendFactory;
use crate::rag::contextualize::QueryContextualizer;
use crate::rag::history::{Message, SessionHistoryStore};
use crate::rag::postprocess;
use crate::rag::settings::{ConfigSource, PipelineSettings};
use crate::rag::types::{AnswerResult, PipelineStatus, SourceRef};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use unichat_core::{AppError, AppResult, DeploymentProfile};
use unichat_prompt::{list_prompts, resolve_prompt, ANSWER_PROMPT_ID, CONTEXTUALIZE_PROMPT_ID};

/// Everything bound by a successful setup or restart.
#[derive(Debug)]
struct ReadyState {
    profile: DeploymentProfile,
    index: EmbeddingIndex,
    contextualizer: QueryContextualizer,
    generator: AnswerGenerator,
    top_k: usize,
    documents_dir: PathBuf,
}

#[derive(Debug)]
enum PipelineState {
    Uninitialized,
    Ready(Box<ReadyState>),
    Stopped,
}

#[derive(Debug)]
struct Inner {
    state: PipelineState,

    /// Documents directory passed to `setup`, kept across restarts
    documents_dir: Option<PathBuf>,
}

pub struct ConversationPipeline {
    config: Arc<dyn ConfigSource>,
    backends: Arc<dyn BackendFactory>,
    history: SessionHistoryStore,
    reconfiguring: AtomicBool,
    inner: RwLock<Inner>,
}

/// Clears the reconfiguring flag however the restart ends.
struct ReconfiguringGuard<'a>(&'a AtomicBool);

impl<'a> ReconfiguringGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ReconfiguringGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ConversationPipeline {
    pub fn new(config: Arc<dyn ConfigSource>, backends: Arc<dyn BackendFactory>) -> Self {
        Self {
            config,
            backends,
            history: SessionHistoryStore::default(),
            reconfiguring: AtomicBool::new(false),
            inner: RwLock::new(Inner {
                state: PipelineState::Uninitialized,
                documents_dir: None,
            }),
        }
    }

    /// Use `documents_dir` instead of the configured directory, for setup,
    /// restarts and document cleanup alike.
    pub fn with_documents_dir(mut self, documents_dir: Option<PathBuf>) -> Self {
        self.inner.get_mut().documents_dir = documents_dir;
        self
    }

    /// Load configuration, ingest the document set and bind the models.
    ///
    /// `documents_dir` overrides the configured directory and is kept for
    /// later restarts. Calling this on a ready pipeline does nothing.
    ///
    /// # Errors
    /// Any ingestion, embedding or configuration failure; the pipeline stays
    /// uninitialized.
    pub async fn setup(&self, documents_dir: Option<PathBuf>) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        match inner.state {
            PipelineState::Stopped => {
                return Err(AppError::NotReady("pipeline has been stopped".to_string()))
            }
            PipelineState::Ready(_) => {
                tracing::debug!("Pipeline already set up");
                return Ok(());
            }
            PipelineState::Uninitialized => {}
        }

        let documents_dir = documents_dir.or_else(|| inner.documents_dir.clone());
        let (ready, history_cap) = self.load_and_build(documents_dir.as_deref()).await?;

        self.history.set_cap(history_cap);
        inner.documents_dir = documents_dir;
        inner.state = PipelineState::Ready(Box::new(ready));
        tracing::info!("Pipeline ready");
        Ok(())
    }

    /// Reload configuration and rebuild everything, dropping every session
    /// history once the new state is in place.
    ///
    /// On failure the previous ready state and histories are kept.
    pub async fn restart(&self) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if matches!(inner.state, PipelineState::Stopped) {
            return Err(AppError::NotReady("pipeline has been stopped".to_string()));
        }
        if matches!(inner.state, PipelineState::Uninitialized) {
            drop(inner);
            tracing::info!("Restart before setup, running setup");
            return self.setup(None).await;
        }

        let _reconfiguring = ReconfiguringGuard::enter(&self.reconfiguring);
        tracing::info!("Reconfiguring pipeline");

        let documents_dir = inner.documents_dir.clone();
        let (ready, history_cap) = match self.load_and_build(documents_dir.as_deref()).await {
            Ok(built) => built,
            Err(e) => {
                tracing::error!("Restart failed, keeping previous configuration: {}", e);
                return Err(e);
            }
        };

        self.history.clear_all();
        self.history.set_cap(history_cap);
        inner.state = PipelineState::Ready(Box::new(ready));
        tracing::info!("Pipeline reconfigured");
        Ok(())
    }

    /// Move to the terminal state. Later `ask`, `setup` and `restart` calls
    /// fail with `NotReady`.
    pub async fn stop(&self) {
        let mut inner = self.inner.write().await;
        inner.state = PipelineState::Stopped;
        self.history.clear_all();
        tracing::info!("Pipeline stopped");
    }

    pub async fn state(&self) -> PipelineStatus {
        if self.reconfiguring.load(Ordering::SeqCst) {
            return PipelineStatus::Reconfiguring;
        }
        match self.inner.read().await.state {
            PipelineState::Uninitialized => PipelineStatus::Uninitialized,
            PipelineState::Ready(_) => PipelineStatus::Ready,
            PipelineState::Stopped => PipelineStatus::Stopped,
        }
    }

    /// Answer `question` within `session_id`.
    ///
    /// History is only appended after generation completes, so a failed or
    /// cancelled call leaves the session untouched.
    pub async fn ask(&self, session_id: &str, question: &str) -> AppResult<AnswerResult> {
        let inner = self.inner.read().await;
        let ready = match &inner.state {
            PipelineState::Ready(ready) => ready,
            PipelineState::Uninitialized => {
                return Err(AppError::NotReady(
                    "pipeline has not been set up".to_string(),
                ))
            }
            PipelineState::Stopped => {
                return Err(AppError::NotReady("pipeline has been stopped".to_string()))
            }
        };

        let history = self.history.snapshot(session_id);
        tracing::debug!(session = %session_id, turns = history.len(), "Handling question");

        let standalone = ready.contextualizer.rewrite(&history, question).await?;
        let chunks = ready.index.retrieve(&standalone, ready.top_k).await?;
        let raw = ready.generator.answer(&standalone, &chunks, &history).await?;
        let (answer, reasoning) = postprocess::split(&raw);

        self.history.record_exchange(session_id, question, &answer);

        Ok(AnswerResult {
            answer,
            reasoning,
            standalone_question: standalone,
            sources: chunks.iter().map(SourceRef::from).collect(),
        })
    }

    /// Messages recorded for `session_id`, if it has asked anything.
    pub fn session_history(&self, session_id: &str) -> Option<Vec<Message>> {
        self.history.get(session_id)
    }

    /// Deployment profile bound by the last successful setup or restart.
    pub async fn profile(&self) -> Option<DeploymentProfile> {
        match &self.inner.read().await.state {
            PipelineState::Ready(ready) => Some(ready.profile.clone()),
            _ => None,
        }
    }

    /// Delete files in the documents directory that are not in `keep`.
    ///
    /// Destructive; never called by the pipeline itself.
    pub async fn remove_stale_documents(&self, keep: &[String]) -> AppResult<Vec<PathBuf>> {
        let dir = self.documents_dir().await?;
        tracing::info!(dir = %dir.display(), keep = keep.len(), "Removing stale documents");
        loader::remove_stale_documents(&dir, keep)
    }

    /// The directory documents are loaded from.
    pub async fn documents_dir(&self) -> AppResult<PathBuf> {
        let inner = self.inner.read().await;
        if let PipelineState::Ready(ready) = &inner.state {
            return Ok(ready.documents_dir.clone());
        }
        match &inner.documents_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.config.load()?.documents_dir),
        }
    }

    async fn load_and_build(
        &self,
        documents_dir: Option<&Path>,
    ) -> AppResult<(ReadyState, usize)> {
        let mut settings = self.config.load()?;
        settings.rag.validate()?;
        if let Some(dir) = documents_dir {
            settings.documents_dir = dir.to_path_buf();
        }
        let history_cap = settings.rag.history_cap;
        let ready = self.build_ready(settings).await?;
        Ok((ready, history_cap))
    }

    async fn build_ready(&self, settings: PipelineSettings) -> AppResult<ReadyState> {
        let profile = self.resolve_profile(&settings).await?;
        tracing::info!(
            llm = %format!("{}/{}", profile.llm_provider, profile.llm_model),
            emb = %format!("{}/{}", profile.emb_provider, profile.emb_model),
            documents = settings.documents.len(),
            dir = %settings.documents_dir.display(),
            "Building pipeline"
        );

        let loader = DocumentLoader::new(settings.documents_dir.clone());
        let documents = settings.documents.clone();
        let report = tokio::task::spawn_blocking(move || loader.load(&documents))
            .await
            .map_err(|e| AppError::Other(format!("Document loading task failed: {}", e)))??;

        let chunker = Chunker::new(settings.rag.chunk_size, settings.rag.chunk_overlap)?;
        let chunks = chunker.chunk(&report.documents);
        if chunks.is_empty() {
            let skipped: Vec<String> = report
                .skipped
                .iter()
                .map(|(name, e)| format!("{} ({})", name, e))
                .collect();
            return Err(AppError::Ingestion(if skipped.is_empty() {
                "no documents configured".to_string()
            } else {
                format!("no chunks produced; skipped: {}", skipped.join(", "))
            }));
        }
        tracing::info!(
            documents = report.documents.len(),
            skipped = report.skipped.len(),
            chunks = chunks.len(),
            "Documents chunked"
        );

        let embedder = self
            .backends
            .embedding_model(
                &profile.emb_provider,
                &profile.emb_model,
                &settings.access(&profile.emb_provider),
            )
            .await?;
        let options = RetrievalOptions {
            fetch_k: settings.rag.fetch_k,
            lambda: settings.rag.mmr_lambda,
            ..RetrievalOptions::default()
        };
        let index = EmbeddingIndex::build(chunks, embedder, options).await?;

        let llm = self
            .backends
            .language_model(&profile.llm_provider, &settings.access(&profile.llm_provider))?;

        let overrides = list_prompts(&settings.workspace)?;
        if !overrides.is_empty() {
            tracing::info!(prompts = ?overrides, "Workspace prompt overrides present");
        }
        let contextualize_prompt = resolve_prompt(&settings.workspace, CONTEXTUALIZE_PROMPT_ID)?;
        let answer_prompt = resolve_prompt(&settings.workspace, ANSWER_PROMPT_ID)?;

        let contextualizer = QueryContextualizer::new(
            llm.clone(),
            profile.llm_model.clone(),
            &contextualize_prompt,
            settings.rag.temperature,
        )?;
        let generator = AnswerGenerator::new(
            llm,
            AnswerPersona {
                description: settings.persona.clone(),
                language: settings.rag.language.clone(),
                llm_provider: profile.llm_provider.clone(),
                llm_model: profile.llm_model.clone(),
            },
            answer_prompt,
            settings.rag.temperature,
        );

        Ok(ReadyState {
            profile,
            index,
            contextualizer,
            generator,
            top_k: settings.rag.top_k,
            documents_dir: settings.documents_dir,
        })
    }

    /// Swap missing local models for the factory defaults.
    async fn resolve_profile(&self, settings: &PipelineSettings) -> AppResult<DeploymentProfile> {
        let mut profile = settings.profile.clone();
        let fallback = &settings.fallback;

        (profile.llm_provider, profile.llm_model) = self
            .available_model(
                settings,
                ModelKind::Language,
                (profile.llm_provider.as_str(), profile.llm_model.as_str()),
                (fallback.llm_provider.as_str(), fallback.llm_model.as_str()),
            )
            .await?;

        (profile.emb_provider, profile.emb_model) = self
            .available_model(
                settings,
                ModelKind::Embedding,
                (profile.emb_provider.as_str(), profile.emb_model.as_str()),
                (fallback.emb_provider.as_str(), fallback.emb_model.as_str()),
            )
            .await?;

        Ok(profile)
    }

    async fn available_model(
        &self,
        settings: &PipelineSettings,
        kind: ModelKind,
        (provider, model): (&str, &str),
        (fallback_provider, fallback_model): (&str, &str),
    ) -> AppResult<(String, String)> {
        if !is_ollama(provider) || self.is_downloaded(settings, kind, provider, model).await? {
            return Ok((provider.to_string(), model.to_string()));
        }

        tracing::warn!(
            "Ollama {} model '{}' is not downloaded, falling back to {}/{}",
            kind,
            model,
            fallback_provider,
            fallback_model
        );

        if !is_ollama(fallback_provider)
            || self
                .is_downloaded(settings, kind, fallback_provider, fallback_model)
                .await?
        {
            return Ok((fallback_provider.to_string(), fallback_model.to_string()));
        }

        Err(AppError::Config(format!(
            "Ollama {} model '{}' is not available and the default '{}' is not downloaded either; run 'ollama pull {}'",
            kind, model, fallback_model, fallback_model
        )))
    }

    async fn is_downloaded(
        &self,
        settings: &PipelineSettings,
        kind: ModelKind,
        provider: &str,
        model: &str,
    ) -> AppResult<bool> {
        self.backends
            .is_model_downloaded(model, &settings.access(provider))
            .await
            .map_err(|e| match kind {
                ModelKind::Embedding => AppError::EmbeddingBackend(e.to_string()),
                ModelKind::Language => e,
            })
    }
}

#[derive(Debug, Clone, Copy)]
enum ModelKind {
    Language,
    Embedding,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Language => f.write_str("language"),
            Self::Embedding => f.write_str("embedding"),
        }
    }
}

fn is_ollama(provider: &str) -> bool {
    provider.eq_ignore_ascii_case("ollama")
}

impl std::fmt::Debug for ConversationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationPipeline")
            .field("sessions", &self.history.len())
            .field("reconfiguring", &self.reconfiguring.load(Ordering::SeqCst))
            .finish()
    }
}
