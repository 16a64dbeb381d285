//! Multi-turn conversations through a ready pipeline.

use super::support::{settings, write_documents, FakeBackends, ScriptedLlm};
use crate::rag::{ConversationPipeline, MessageRole, StaticConfigSource};
use std::sync::Arc;
use tempfile::TempDir;
use unichat_core::AppError;

const PARIS: &str = "Paris is the capital of France and home to about two million residents.";
const BANANAS: &str = "Bananas are yellow tropical fruit rich in potassium.";

async fn ready_pipeline(
    llm: ScriptedLlm,
    history_cap: Option<usize>,
) -> (TempDir, ConversationPipeline, Arc<FakeBackends>) {
    let temp = TempDir::new().unwrap();
    write_documents(temp.path(), &[("paris.txt", PARIS), ("bananas.txt", BANANAS)]);

    let mut settings = settings(temp.path(), &["paris.txt", "bananas.txt"]);
    if let Some(cap) = history_cap {
        settings.rag.history_cap = cap;
    }

    let backends = Arc::new(FakeBackends::new(llm));
    let pipeline =
        ConversationPipeline::new(Arc::new(StaticConfigSource::new(settings)), backends.clone());
    pipeline.setup(None).await.unwrap();
    (temp, pipeline, backends)
}

#[tokio::test]
async fn test_first_question_is_answered_from_documents() {
    let (_temp, pipeline, backends) = ready_pipeline(ScriptedLlm::assistant(), None).await;

    let result = pipeline
        .ask("s1", "What is the capital of France?")
        .await
        .unwrap();

    assert!(!result.answer.is_empty());
    assert!(result.answer.starts_with("Paris is the capital"));
    assert!(!result.answer.contains("<think>"));
    assert_eq!(result.reasoning, "Looking for: What is the capital of France?");
    assert_eq!(result.standalone_question, "What is the capital of France?");
    assert_eq!(result.sources[0].source, "paris.txt");

    // First turn has no history, so no rewrite call is made.
    assert!(backends.llm.rewrite_requests().is_empty());
    assert_eq!(backends.llm.answer_requests().len(), 1);
}

#[tokio::test]
async fn test_follow_up_is_rewritten_from_history() {
    let (_temp, pipeline, backends) = ready_pipeline(ScriptedLlm::assistant(), None).await;

    pipeline
        .ask("s1", "What is the capital of France?")
        .await
        .unwrap();
    let result = pipeline
        .ask("s1", "How many people live in it?")
        .await
        .unwrap();

    assert_eq!(result.standalone_question, "How many people live in Paris?");

    let rewrites = backends.llm.rewrite_requests();
    assert_eq!(rewrites.len(), 1);
    // system, prior question, prior answer, follow-up
    assert_eq!(rewrites[0].messages.len(), 4);

    let answers = backends.llm.answer_requests();
    assert_eq!(
        answers[1].last_user_message(),
        Some("How many people live in Paris?")
    );
}

#[tokio::test]
async fn test_history_records_question_and_summary() {
    let (_temp, pipeline, _backends) = ready_pipeline(ScriptedLlm::assistant(), None).await;

    let result = pipeline
        .ask("s1", "What is the capital of France?")
        .await
        .unwrap();

    let history = pipeline.session_history("s1").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, MessageRole::Human);
    assert_eq!(history[0].content, "What is the capital of France?");
    assert_eq!(history[1].role, MessageRole::Ai);
    assert_eq!(history[1].content, result.answer);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let (_temp, pipeline, backends) = ready_pipeline(ScriptedLlm::assistant(), None).await;

    pipeline
        .ask("alice", "What is the capital of France?")
        .await
        .unwrap();
    let result = pipeline
        .ask("bob", "What colour are bananas?")
        .await
        .unwrap();

    assert_eq!(result.standalone_question, "What colour are bananas?");
    assert!(backends.llm.rewrite_requests().is_empty());
    assert_eq!(pipeline.session_history("alice").unwrap().len(), 2);
    assert_eq!(pipeline.session_history("bob").unwrap().len(), 2);
    assert!(pipeline.session_history("carol").is_none());
}

#[tokio::test]
async fn test_concurrent_sessions() {
    let (_temp, pipeline, _backends) = ready_pipeline(ScriptedLlm::assistant(), None).await;

    let sessions: Vec<String> = (0..4).map(|i| format!("session-{}", i)).collect();
    let results = futures::future::join_all(
        sessions
            .iter()
            .map(|s| pipeline.ask(s, "What is the capital of France?")),
    )
    .await;

    for (session, result) in sessions.iter().zip(results) {
        assert!(result.is_ok());
        assert_eq!(pipeline.session_history(session).unwrap().len(), 2);
    }
}

#[tokio::test]
async fn test_history_cap_evicts_oldest_pair() {
    let (_temp, pipeline, _backends) = ready_pipeline(ScriptedLlm::assistant(), Some(4)).await;

    for question in ["first question", "second question", "third question"] {
        pipeline.ask("s1", question).await.unwrap();
    }

    let history = pipeline.session_history("s1").unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].role, MessageRole::Human);
    assert_eq!(history[0].content, "second question");
    assert_eq!(history[2].content, "third question");
}

#[tokio::test]
async fn test_generation_failure_leaves_history_untouched() {
    let llm = ScriptedLlm::new(|request| {
        if request
            .system()
            .is_some_and(|s| s.contains("Known information"))
        {
            Err(AppError::Other("model overloaded".to_string()))
        } else {
            Ok("unused".to_string())
        }
    });
    let (_temp, pipeline, _backends) = ready_pipeline(llm, None).await;

    let result = pipeline.ask("s1", "What is the capital of France?").await;
    match result {
        Err(AppError::Generation(message)) => assert!(message.contains("model overloaded")),
        other => panic!("expected Generation error, got {:?}", other),
    }

    assert!(pipeline.session_history("s1").unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_answer_without_reasoning() {
    let (_temp, pipeline, _backends) =
        ready_pipeline(ScriptedLlm::replying(&["  Plain answer.  "]), None).await;

    let result = pipeline.ask("s1", "Anything?").await.unwrap();
    assert_eq!(result.answer, "Plain answer.");
    assert!(result.reasoning.is_empty());
    assert_eq!(result.display(), "Plain answer.");
}
