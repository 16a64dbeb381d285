//! Grounded answer generation.

use crate::rag::generation_error;
use crate::rag::history::Message;
use crate::types::Chunk;
use std::collections::HashMap;
use std::sync::Arc;
use unichat_core::AppResult;
use unichat_llm::{ChatMessage, LlmClient, LlmRequest};
use unichat_prompt::{build_prompt, PromptDefinition};

/// Everything the answer prompt is rendered from besides the retrieved context.
#[derive(Debug, Clone)]
pub struct AnswerPersona {
    /// Robot description placed at the head of the system prompt
    pub description: String,

    /// Language the model is told to answer in
    pub language: String,

    pub llm_provider: String,
    pub llm_model: String,
}

pub struct AnswerGenerator {
    llm: Arc<dyn LlmClient>,
    persona: AnswerPersona,
    prompt: PromptDefinition,
    temperature: f32,
}

impl AnswerGenerator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        persona: AnswerPersona,
        prompt: PromptDefinition,
        temperature: f32,
    ) -> Self {
        Self {
            llm,
            persona,
            prompt,
            temperature,
        }
    }

    pub fn persona(&self) -> &AnswerPersona {
        &self.persona
    }

    /// Render the system prompt around the retrieved chunks.
    pub fn system_prompt(&self, chunks: &[Chunk]) -> AppResult<String> {
        let context = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut variables = HashMap::new();
        variables.insert("persona".to_string(), self.persona.description.clone());
        variables.insert("language".to_string(), self.persona.language.clone());
        variables.insert("llm_provider".to_string(), self.persona.llm_provider.clone());
        variables.insert("llm_model".to_string(), self.persona.llm_model.clone());
        variables.insert("context".to_string(), context);

        Ok(build_prompt(&self.prompt, variables)?.system)
    }

    /// One model call answering `question` from `chunks`, with `history` as
    /// prior turns. Returns the raw model output, reasoning included.
    pub async fn answer(
        &self,
        question: &str,
        chunks: &[Chunk],
        history: &[Message],
    ) -> AppResult<String> {
        let system = self.system_prompt(chunks)?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(history.iter().map(Message::to_chat));
        messages.push(ChatMessage::user(question));

        let request = LlmRequest::new(self.persona.llm_model.clone(), messages)
            .with_temperature(self.temperature);

        tracing::debug!(
            provider = %self.persona.llm_provider,
            model = %self.persona.llm_model,
            context_chunks = chunks.len(),
            history = history.len(),
            "Generating answer"
        );

        let response = self
            .llm
            .complete(&request)
            .await
            .map_err(generation_error)?;

        tracing::debug!(chars = response.content.len(), "Received answer");
        Ok(response.content)
    }
}

impl std::fmt::Debug for AnswerGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerGenerator")
            .field("persona", &self.persona)
            .field("prompt", &self.prompt.id)
            .finish()
    }
}
