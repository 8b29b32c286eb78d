//! Integration tests for context assembly and replies

use std::sync::Arc;
use std::time::Duration;

use recall::config::ContextConfig;
use recall::context::{ChatMessage, ContextAssembler, Role};
use recall::error::RecallError;
use recall::memory::ConversationStore;
use recall::provider::ProviderError;
use recall::testing::{MockCompletionProvider, MockEmbeddingProvider};
use tempfile::tempdir;

async fn create_test_store() -> (Arc<ConversationStore>, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let store = ConversationStore::open(
        dir.path(),
        "conversations",
        Arc::new(MockEmbeddingProvider::new()),
    )
    .await
    .unwrap();
    (Arc::new(store), dir)
}

fn config() -> ContextConfig {
    ContextConfig {
        system_prompt: "You remember things.".to_string(),
        ..ContextConfig::default()
    }
}

#[tokio::test]
async fn test_six_stored_turns_give_five_pairs() {
    let (store, _dir) = create_test_store().await;
    for i in 0..6 {
        store
            .save(&format!("question {i}"), &format!("answer {i}"))
            .await
            .unwrap();
    }

    let completion = Arc::new(MockCompletionProvider::replying("sure"));
    let assembler = ContextAssembler::new(store.clone(), completion.clone(), config());

    let reply = assembler.respond("what did I ask first?").await.unwrap();
    assert_eq!(reply, "sure");

    let requests = completion.requests();
    assert_eq!(requests.len(), 1);
    let messages = &requests[0];

    assert_eq!(messages.len(), 12);
    assert_eq!(messages[0], ChatMessage::system("You remember things."));
    assert_eq!(messages[1], ChatMessage::user("question 1"));
    assert_eq!(messages[2], ChatMessage::assistant("answer 1"));
    assert_eq!(messages[10], ChatMessage::assistant("answer 5"));
    assert_eq!(messages[11], ChatMessage::user("what did I ask first?"));

    for pair in messages[1..11].chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Assistant);
    }
}

#[tokio::test]
async fn test_build_context_from_store_history() {
    let (store, _dir) = create_test_store().await;
    store.save("hi", "hello").await.unwrap();

    let assembler = ContextAssembler::new(
        store.clone(),
        Arc::new(MockCompletionProvider::replying("unused")),
        config(),
    );

    let history = store.recent(20, None).await.unwrap();
    let window = assembler.build_context(&history, "again");
    assert_eq!(
        window.messages(),
        &[
            ChatMessage::system("You remember things."),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("again"),
        ]
    );
}

#[tokio::test]
async fn test_respond_empty_store() {
    let (store, _dir) = create_test_store().await;
    let completion = Arc::new(MockCompletionProvider::replying("hello!"));
    let assembler = ContextAssembler::new(store, completion.clone(), config());

    assert_eq!(assembler.respond("hi").await.unwrap(), "hello!");
    assert_eq!(completion.requests()[0].len(), 2);
}

#[tokio::test]
async fn test_reply_returned_unmodified() {
    let (store, _dir) = create_test_store().await;
    let raw = "  Line one\n\nError: this is just text, not a failure  ";
    let assembler = ContextAssembler::new(
        store,
        Arc::new(MockCompletionProvider::replying(raw)),
        config(),
    );

    assert_eq!(assembler.respond("hi").await.unwrap(), raw);
}

#[tokio::test]
async fn test_provider_failure_is_error_not_reply() {
    let (store, _dir) = create_test_store().await;
    let assembler = ContextAssembler::new(
        store,
        Arc::new(MockCompletionProvider::failing("upstream 503")),
        config(),
    );

    let err = assembler.respond("hi").await.unwrap_err();
    assert!(matches!(err, RecallError::Provider(ProviderError::Api(_))));
    assert_eq!(err.code().as_str(), "E50002");
}

#[tokio::test]
async fn test_completion_timeout() {
    let (store, _dir) = create_test_store().await;
    let assembler = ContextAssembler::new(
        store,
        Arc::new(MockCompletionProvider::replying("late").with_delay(Duration::from_secs(5))),
        config(),
    )
    .with_timeout(Duration::from_millis(50));

    let err = assembler.respond("hi").await.unwrap_err();
    assert!(matches!(
        err,
        RecallError::Provider(ProviderError::Timeout { .. })
    ));
}

#[tokio::test]
async fn test_empty_message_rejected() {
    let (store, _dir) = create_test_store().await;
    let completion = Arc::new(MockCompletionProvider::replying("x"));
    let assembler = ContextAssembler::new(store, completion.clone(), config());

    assert!(matches!(
        assembler.respond("  ").await,
        Err(RecallError::Validation(_))
    ));
    assert!(completion.requests().is_empty());
}
