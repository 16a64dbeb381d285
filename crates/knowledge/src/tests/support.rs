//! Scripted model clients and backends for pipeline tests.

use crate::embeddings::providers::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::rag::backends::BackendFactory;
use crate::rag::settings::{PipelineSettings, ProviderAccess};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use unichat_core::{AppConfig, AppError, AppResult};
use unichat_llm::{ChatRole, LlmClient, LlmRequest, LlmResponse, LlmUsage};

type Responder = Box<dyn Fn(&LlmRequest) -> AppResult<String> + Send + Sync>;

/// An `LlmClient` that answers from a closure and records every request.
pub(crate) struct ScriptedLlm {
    responder: Responder,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub(crate) fn new(
        responder: impl Fn(&LlmRequest) -> AppResult<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replies in order, repeating the last reply once the script runs out.
    pub(crate) fn replying(replies: &[&str]) -> Self {
        let replies: Vec<String> = replies.iter().map(|r| r.to_string()).collect();
        let next = AtomicUsize::new(0);
        Self::new(move |_| {
            let i = next.fetch_add(1, Ordering::SeqCst);
            Ok(replies.get(i).or(replies.last()).cloned().unwrap_or_default())
        })
    }

    pub(crate) fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_| Err(AppError::Other(message.clone())))
    }

    /// A small conversational model.
    ///
    /// Rewrite requests replace "it"/"its" with the first word of the last
    /// assistant turn. Answer requests reply with a short reasoning block
    /// followed by the first line of the known information.
    pub(crate) fn assistant() -> Self {
        Self::new(|request| {
            let system = request.system().unwrap_or_default();
            let question = request.last_user_message().unwrap_or_default();

            if system.contains("standalone question") {
                return Ok(resolve_pronouns(request, question));
            }

            let context = system
                .split_once("Known information:\n")
                .and_then(|(_, context)| context.lines().next())
                .unwrap_or_default();
            Ok(format!("<think>Looking for: {}</think>{}", question, context))
        })
    }

    pub(crate) fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Requests that were answer generations rather than rewrites.
    pub(crate) fn answer_requests(&self) -> Vec<LlmRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.system().is_some_and(|s| s.contains("Known information")))
            .collect()
    }

    pub(crate) fn rewrite_requests(&self) -> Vec<LlmRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.system().is_some_and(|s| s.contains("standalone question")))
            .collect()
    }
}

fn resolve_pronouns(request: &LlmRequest, question: &str) -> String {
    let subject = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::Assistant)
        .and_then(|m| m.content.split_whitespace().next())
        .unwrap_or("it")
        .to_string();

    question
        .split(' ')
        .map(|word| {
            let (core, rest) = word.split_at(word.trim_end_matches(['?', '.', ',']).len());
            match core {
                "it" => format!("{}{}", subject, rest),
                "its" => format!("{}'s{}", subject, rest),
                _ => word.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let content = (self.responder)(request)?;
        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}

/// Backends that never leave the process: one shared scripted model and the
/// trigram embedder, with a configurable set of "downloaded" Ollama models.
pub(crate) struct FakeBackends {
    pub(crate) llm: Arc<ScriptedLlm>,
    downloaded: Mutex<HashSet<String>>,
    embedding_failure: Mutex<Option<String>>,
    embedding_gate: Mutex<Option<Arc<Gate>>>,
    bound: Mutex<Vec<String>>,
}

/// Pauses the next `embedding_model` call until released.
#[derive(Default)]
pub(crate) struct Gate {
    /// Signalled once the held call has started
    pub(crate) reached: Notify,
    pub(crate) release: Notify,
}

impl FakeBackends {
    pub(crate) fn new(llm: ScriptedLlm) -> Self {
        let downloaded = ["qwen2.5", "nomic-embed-text"]
            .iter()
            .map(|m| m.to_string())
            .collect();
        Self {
            llm: Arc::new(llm),
            downloaded: Mutex::new(downloaded),
            embedding_failure: Mutex::new(None),
            embedding_gate: Mutex::new(None),
            bound: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_downloaded(&self, models: &[&str]) {
        *self.downloaded.lock().unwrap_or_else(|e| e.into_inner()) =
            models.iter().map(|m| m.to_string()).collect();
    }

    /// Make every later `embedding_model` call fail with `message`.
    pub(crate) fn fail_embeddings(&self, message: &str) {
        *self
            .embedding_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(message.to_string());
    }

    /// Hold the next `embedding_model` call until the returned gate is released.
    pub(crate) fn hold_embeddings(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.embedding_gate.lock().unwrap_or_else(|e| e.into_inner()) = Some(gate.clone());
        gate
    }

    /// `provider/model` pairs bound so far, language and embedding models
    /// interleaved in binding order.
    pub(crate) fn bound(&self) -> Vec<String> {
        self.bound.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, provider: &str, model: &str) {
        self.bound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(format!("{}/{}", provider, model));
    }
}

#[async_trait]
impl BackendFactory for FakeBackends {
    fn language_model(
        &self,
        provider: &str,
        _access: &ProviderAccess,
    ) -> AppResult<Arc<dyn LlmClient>> {
        self.record(provider, "llm");
        Ok(self.llm.clone())
    }

    async fn embedding_model(
        &self,
        provider: &str,
        model: &str,
        _access: &ProviderAccess,
    ) -> AppResult<Arc<dyn EmbeddingProvider>> {
        let gate = self
            .embedding_gate
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(gate) = gate {
            gate.reached.notify_one();
            gate.release.notified().await;
        }

        if let Some(message) = self
            .embedding_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(AppError::EmbeddingBackend(message));
        }
        self.record(provider, model);
        Ok(Arc::new(TrigramProvider::new(256)))
    }

    async fn is_model_downloaded(&self, model: &str, _access: &ProviderAccess) -> AppResult<bool> {
        Ok(self
            .downloaded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(model))
    }
}

/// Settings for a workspace with default configuration and `documents`.
pub(crate) fn settings(workspace: &Path, documents: &[&str]) -> PipelineSettings {
    let config = AppConfig::load_from(Some(workspace.to_path_buf()), None).unwrap();
    let mut settings = PipelineSettings::from_config(&config);
    settings.documents = documents.iter().map(|d| d.to_string()).collect();
    settings
}

/// Write `files` into the workspace's default documents directory.
pub(crate) fn write_documents(workspace: &Path, files: &[(&str, &str)]) {
    let dir = workspace.join("local_docs");
    std::fs::create_dir_all(&dir).unwrap();
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
}
