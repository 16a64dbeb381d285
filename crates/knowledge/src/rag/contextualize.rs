//! Rewriting follow-up questions into standalone ones.

use crate::rag::history::Message;
use crate::rag::{generation_error, postprocess};
use std::collections::HashMap;
use std::sync::Arc;
use unichat_core::AppResult;
use unichat_llm::{ChatMessage, LlmClient, LlmRequest};
use unichat_prompt::{build_prompt, PromptDefinition};

pub struct QueryContextualizer {
    llm: Arc<dyn LlmClient>,
    model: String,
    instruction: String,
    temperature: f32,
}

impl QueryContextualizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompt: &PromptDefinition,
        temperature: f32,
    ) -> AppResult<Self> {
        let instruction = build_prompt(prompt, HashMap::new())?.system;
        Ok(Self {
            llm,
            model: model.into(),
            instruction,
            temperature,
        })
    }

    /// Reformulate `question` so it can be understood without `history`.
    ///
    /// With no history the question is returned unchanged and the model is
    /// not called. Reasoning the model emits is discarded, and an empty
    /// rewrite falls back to the original question.
    pub async fn rewrite(&self, history: &[Message], question: &str) -> AppResult<String> {
        if history.is_empty() {
            tracing::debug!("No history, question is already standalone");
            return Ok(question.to_string());
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.instruction.clone()));
        messages.extend(history.iter().map(Message::to_chat));
        messages.push(ChatMessage::user(question));

        let request =
            LlmRequest::new(self.model.clone(), messages).with_temperature(self.temperature);

        let response = self
            .llm
            .complete(&request)
            .await
            .map_err(generation_error)?;

        let (rewritten, _) = postprocess::split(&response.content);
        if rewritten.is_empty() {
            tracing::warn!("Contextualizer returned an empty question, using the original");
            return Ok(question.to_string());
        }

        tracing::debug!(original = %question, standalone = %rewritten, "Rewrote question");
        Ok(rewritten)
    }
}

impl std::fmt::Debug for QueryContextualizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryContextualizer")
            .field("provider", &self.llm.provider_name())
            .field("model", &self.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::ScriptedLlm;
    use unichat_core::AppError;
    use unichat_prompt::{builtin_prompt, CONTEXTUALIZE_PROMPT_ID};

    fn contextualizer(llm: Arc<ScriptedLlm>) -> QueryContextualizer {
        let prompt = builtin_prompt(CONTEXTUALIZE_PROMPT_ID).unwrap();
        QueryContextualizer::new(llm, "test-model", &prompt, 0.3).unwrap()
    }

    #[tokio::test]
    async fn test_empty_history_is_passthrough_without_call() {
        let llm = Arc::new(ScriptedLlm::replying(&["should not be used"]));
        let rewritten = contextualizer(llm.clone())
            .rewrite(&[], "What is the capital of France?")
            .await
            .unwrap();

        assert_eq!(rewritten, "What is the capital of France?");
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_rewrite_sends_history_between_instruction_and_question() {
        let llm = Arc::new(ScriptedLlm::replying(&[
            "<think>resolve it</think> How large is Paris?",
        ]));
        let history = vec![
            Message::human("What is the capital of France?"),
            Message::ai("Paris."),
        ];

        let rewritten = contextualizer(llm.clone())
            .rewrite(&history, "How large is it?")
            .await
            .unwrap();
        assert_eq!(rewritten, "How large is Paris?");

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        let roles: Vec<&str> = requests[0].messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert!(requests[0].system().unwrap().contains("standalone question"));
        assert_eq!(requests[0].last_user_message(), Some("How large is it?"));
        assert_eq!(requests[0].model, "test-model");
    }

    #[tokio::test]
    async fn test_blank_rewrite_falls_back() {
        let llm = Arc::new(ScriptedLlm::replying(&["   "]));
        let history = vec![Message::human("q"), Message::ai("a")];
        let rewritten = contextualizer(llm).rewrite(&history, "original").await.unwrap();
        assert_eq!(rewritten, "original");
    }

    #[tokio::test]
    async fn test_failure_is_generation_error() {
        let llm = Arc::new(ScriptedLlm::failing("model offline"));
        let history = vec![Message::human("q"), Message::ai("a")];
        let result = contextualizer(llm).rewrite(&history, "next").await;
        assert!(matches!(result, Err(AppError::Generation(_))));
    }
}
