//! Setup, restart and stop transitions.

use super::support::{settings, write_documents, FakeBackends, ScriptedLlm};
use crate::rag::{ConversationPipeline, PipelineStatus, StaticConfigSource};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use unichat_core::AppError;

const PARIS: &str = "Paris is the capital of France.";
const ROME: &str = "Rome is the capital of Italy.";

struct Fixture {
    temp: TempDir,
    source: Arc<StaticConfigSource>,
    backends: Arc<FakeBackends>,
    pipeline: ConversationPipeline,
}

fn fixture(documents: &[&str]) -> Fixture {
    let temp = TempDir::new().unwrap();
    write_documents(temp.path(), &[("paris.txt", PARIS), ("rome.txt", ROME)]);

    let source = Arc::new(StaticConfigSource::new(settings(temp.path(), documents)));
    let backends = Arc::new(FakeBackends::new(ScriptedLlm::assistant()));
    let pipeline = ConversationPipeline::new(source.clone(), backends.clone());

    Fixture {
        temp,
        source,
        backends,
        pipeline,
    }
}

#[tokio::test]
async fn test_ask_before_setup_is_not_ready() {
    let f = fixture(&["paris.txt"]);
    assert_eq!(f.pipeline.state().await, PipelineStatus::Uninitialized);

    let result = f.pipeline.ask("s1", "What is the capital of France?").await;
    assert!(matches!(result, Err(AppError::NotReady(_))));
    assert!(f.backends.llm.requests().is_empty());
}

#[tokio::test]
async fn test_setup_reaches_ready() {
    let f = fixture(&["paris.txt"]);
    f.pipeline.setup(None).await.unwrap();

    assert_eq!(f.pipeline.state().await, PipelineStatus::Ready);
    let profile = f.pipeline.profile().await.unwrap();
    assert_eq!(profile.llm_model, "qwen2.5");
    assert_eq!(profile.emb_model, "nomic-embed-text");

    // A second setup is a no-op.
    f.pipeline.setup(None).await.unwrap();
    assert_eq!(f.backends.bound().len(), 2);
}

#[tokio::test]
async fn test_unsupported_file_is_skipped() {
    let f = fixture(&["notes.xyz", "paris.txt"]);
    std::fs::write(f.temp.path().join("local_docs/notes.xyz"), "opaque").unwrap();

    f.pipeline.setup(None).await.unwrap();
    let result = f
        .pipeline
        .ask("s1", "What is the capital of France?")
        .await
        .unwrap();
    assert!(result.answer.starts_with("Paris"));
}

#[tokio::test]
async fn test_setup_without_usable_documents_fails() {
    let f = fixture(&["notes.xyz", "missing.txt"]);
    std::fs::write(f.temp.path().join("local_docs/notes.xyz"), "opaque").unwrap();

    match f.pipeline.setup(None).await {
        Err(AppError::Ingestion(message)) => {
            assert!(message.contains("notes.xyz"));
            assert!(message.contains("missing.txt"));
        }
        other => panic!("expected Ingestion error, got {:?}", other),
    }
    assert_eq!(f.pipeline.state().await, PipelineStatus::Uninitialized);
}

#[tokio::test]
async fn test_setup_with_documents_dir_override() {
    let f = fixture(&["berlin.txt"]);
    let other = TempDir::new().unwrap();
    std::fs::write(
        other.path().join("berlin.txt"),
        "Berlin is the capital of Germany.",
    )
    .unwrap();

    f.pipeline
        .setup(Some(other.path().to_path_buf()))
        .await
        .unwrap();
    assert_eq!(f.pipeline.documents_dir().await.unwrap(), other.path());

    let result = f
        .pipeline
        .ask("s1", "What is the capital of Germany?")
        .await
        .unwrap();
    assert!(result.answer.starts_with("Berlin"));

    // The override survives a restart.
    f.pipeline.restart().await.unwrap();
    assert_eq!(f.pipeline.documents_dir().await.unwrap(), other.path());
}

#[tokio::test]
async fn test_workspace_prompt_override_is_used() {
    let f = fixture(&["paris.txt"]);
    let prompts = f.temp.path().join(".unichat/prompts");
    std::fs::create_dir_all(&prompts).unwrap();
    std::fs::write(
        prompts.join("rag.answer.yml"),
        "id: rag.answer\ntitle: Terse\napiVersion: \"1.0\"\nvariables: [context]\ntemplate: \"Be terse.\\nKnown information:\\n{{context}}\"\n",
    )
    .unwrap();

    f.pipeline.setup(None).await.unwrap();
    let result = f
        .pipeline
        .ask("s1", "What is the capital of France?")
        .await
        .unwrap();
    assert!(result.answer.starts_with("Paris"));

    let request = &f.backends.llm.answer_requests()[0];
    assert!(request.system().unwrap().starts_with("Be terse."));
}

#[tokio::test]
async fn test_embedding_backend_failure_keeps_uninitialized() {
    let f = fixture(&["paris.txt"]);
    f.backends.fail_embeddings("connection refused");

    let result = f.pipeline.setup(None).await;
    assert!(matches!(result, Err(AppError::EmbeddingBackend(_))));
    assert_eq!(f.pipeline.state().await, PipelineStatus::Uninitialized);
}

#[tokio::test]
async fn test_missing_local_model_falls_back_to_defaults() {
    let f = fixture(&["paris.txt"]);
    f.source.update(|s| s.profile.llm_model = "llama3.2".to_string());

    f.pipeline.setup(None).await.unwrap();
    assert_eq!(f.pipeline.profile().await.unwrap().llm_model, "qwen2.5");

    f.pipeline
        .ask("s1", "What is the capital of France?")
        .await
        .unwrap();
    assert_eq!(f.backends.llm.answer_requests()[0].model, "qwen2.5");
}

#[tokio::test]
async fn test_missing_fallback_model_is_configuration_error() {
    let f = fixture(&["paris.txt"]);
    f.source.update(|s| s.profile.llm_model = "llama3.2".to_string());
    f.backends.set_downloaded(&["nomic-embed-text"]);

    match f.pipeline.setup(None).await {
        Err(AppError::Config(message)) => assert!(message.contains("ollama pull qwen2.5")),
        other => panic!("expected Config error, got {:?}", other),
    }
    assert_eq!(f.pipeline.state().await, PipelineStatus::Uninitialized);
}

#[tokio::test]
async fn test_hosted_provider_skips_availability_check() {
    let f = fixture(&["paris.txt"]);
    f.source.update(|s| {
        s.profile.llm_provider = "deepseek".to_string();
        s.profile.llm_model = "deepseek-chat".to_string();
    });
    f.backends.set_downloaded(&["nomic-embed-text"]);

    f.pipeline.setup(None).await.unwrap();
    assert_eq!(f.pipeline.profile().await.unwrap().llm_model, "deepseek-chat");
}

#[tokio::test]
async fn test_restart_clears_every_history() {
    let f = fixture(&["paris.txt"]);
    f.pipeline.setup(None).await.unwrap();

    f.pipeline
        .ask("s1", "What is the capital of France?")
        .await
        .unwrap();
    f.pipeline
        .ask("s2", "What is the capital of France?")
        .await
        .unwrap();

    f.pipeline.restart().await.unwrap();
    assert_eq!(f.pipeline.state().await, PipelineStatus::Ready);
    assert!(f.pipeline.session_history("s1").is_none());
    assert!(f.pipeline.session_history("s2").is_none());

    // The next turn behaves like a first turn: no rewrite.
    let result = f
        .pipeline
        .ask("s1", "How many people live in it?")
        .await
        .unwrap();
    assert_eq!(result.standalone_question, "How many people live in it?");
    assert!(f.backends.llm.rewrite_requests().is_empty());
}

#[tokio::test]
async fn test_restart_picks_up_new_documents() {
    let f = fixture(&["paris.txt"]);
    f.pipeline.setup(None).await.unwrap();

    f.source
        .update(|s| s.documents = vec!["rome.txt".to_string()]);
    f.pipeline.restart().await.unwrap();

    let result = f
        .pipeline
        .ask("s1", "What is the capital of Italy?")
        .await
        .unwrap();
    assert!(result.answer.starts_with("Rome"));
    assert!(result.sources.iter().all(|s| s.source == "rome.txt"));
}

#[tokio::test]
async fn test_failed_restart_keeps_previous_state() {
    let f = fixture(&["paris.txt"]);
    f.pipeline.setup(None).await.unwrap();
    f.pipeline
        .ask("s1", "What is the capital of France?")
        .await
        .unwrap();

    f.source
        .update(|s| s.documents = vec!["missing.txt".to_string()]);
    let result = f.pipeline.restart().await;
    assert!(matches!(result, Err(AppError::Ingestion(_))));

    assert_eq!(f.pipeline.state().await, PipelineStatus::Ready);
    assert_eq!(f.pipeline.session_history("s1").unwrap().len(), 2);

    let result = f
        .pipeline
        .ask("s2", "What is the capital of France?")
        .await
        .unwrap();
    assert!(result.answer.starts_with("Paris"));
}

#[tokio::test]
async fn test_ask_waits_for_restart_to_finish() {
    let f = fixture(&["paris.txt"]);
    f.pipeline.setup(None).await.unwrap();
    f.pipeline
        .ask("s1", "What is the capital of France?")
        .await
        .unwrap();

    f.source
        .update(|s| s.documents = vec!["rome.txt".to_string()]);
    let gate = f.backends.hold_embeddings();
    let order = Mutex::new(Vec::new());

    let (restarted, answered) = tokio::join!(
        async {
            let result = f.pipeline.restart().await;
            order.lock().unwrap().push("restarted");
            result
        },
        async {
            gate.reached.notified().await;
            assert_eq!(f.pipeline.state().await, PipelineStatus::Reconfiguring);

            let ask = f.pipeline.ask("s1", "What is the capital of Italy?");
            tokio::pin!(ask);
            // The rebuild is parked inside the write lock, so the question cannot start.
            assert!(tokio::time::timeout(Duration::from_millis(50), &mut ask)
                .await
                .is_err());

            gate.release.notify_one();
            let result = ask.await;
            order.lock().unwrap().push("answered");
            result
        }
    );

    restarted.unwrap();
    let result = answered.unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["restarted", "answered"]);

    // Served by the new index, with the pre-restart exchange already gone.
    assert!(result.answer.starts_with("Rome"));
    assert!(result.sources.iter().all(|s| s.source == "rome.txt"));
    assert_eq!(result.standalone_question, "What is the capital of Italy?");
    assert!(f.backends.llm.rewrite_requests().is_empty());
    assert_eq!(f.pipeline.session_history("s1").unwrap().len(), 2);
}

#[tokio::test]
async fn test_setup_rejects_history_cap_below_one_exchange() {
    let f = fixture(&["paris.txt"]);
    f.source.update(|s| s.rag.history_cap = 1);

    assert!(matches!(
        f.pipeline.setup(None).await,
        Err(AppError::Config(_))
    ));
    assert_eq!(f.pipeline.state().await, PipelineStatus::Uninitialized);
}

#[tokio::test]
async fn test_restart_before_setup_sets_up() {
    let f = fixture(&["paris.txt"]);
    f.pipeline.restart().await.unwrap();
    assert_eq!(f.pipeline.state().await, PipelineStatus::Ready);
}

#[tokio::test]
async fn test_stop_is_terminal() {
    let f = fixture(&["paris.txt"]);
    f.pipeline.setup(None).await.unwrap();
    f.pipeline.stop().await;

    assert_eq!(f.pipeline.state().await, PipelineStatus::Stopped);
    assert!(matches!(
        f.pipeline.ask("s1", "q").await,
        Err(AppError::NotReady(_))
    ));
    assert!(matches!(
        f.pipeline.restart().await,
        Err(AppError::NotReady(_))
    ));
    assert!(matches!(
        f.pipeline.setup(None).await,
        Err(AppError::NotReady(_))
    ));
}

#[tokio::test]
async fn test_remove_stale_documents_before_setup_uses_override() {
    let f = fixture(&["paris.txt"]);
    let other = TempDir::new().unwrap();
    std::fs::write(other.path().join("keep.txt"), "k").unwrap();
    std::fs::write(other.path().join("drop.txt"), "d").unwrap();

    let pipeline = ConversationPipeline::new(f.source.clone(), f.backends.clone())
        .with_documents_dir(Some(other.path().to_path_buf()));
    let removed = pipeline
        .remove_stale_documents(&["keep.txt".to_string()])
        .await
        .unwrap();

    assert_eq!(removed, vec![other.path().join("drop.txt")]);
    assert!(f.temp.path().join("local_docs/rome.txt").exists());
    assert_eq!(pipeline.state().await, PipelineStatus::Uninitialized);
}

#[tokio::test]
async fn test_remove_stale_documents_through_pipeline() {
    let f = fixture(&["paris.txt"]);
    f.pipeline.setup(None).await.unwrap();

    let removed = f
        .pipeline
        .remove_stale_documents(&["paris.txt".to_string()])
        .await
        .unwrap();

    assert_eq!(removed, vec![f.temp.path().join("local_docs/rome.txt")]);
    assert!(f.temp.path().join("local_docs/paris.txt").exists());
}
