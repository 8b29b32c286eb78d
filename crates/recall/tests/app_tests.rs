//! Integration tests for the application context

use std::sync::Arc;

use recall::config::Config;
use recall::error::RecallError;
use recall::retrieval::RawListParams;
use recall::testing::{FailingEmbeddingProvider, MockCompletionProvider, MockEmbeddingProvider};
use recall::AppContext;
use tempfile::tempdir;

fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.join("data");
    config.storage.collection = "chat_test".to_string();
    config
}

#[tokio::test]
async fn test_chat_saves_turn_and_uses_it_next_time() {
    let dir = tempdir().unwrap();
    let completion = Arc::new(MockCompletionProvider::replying("Noted."));
    let app = AppContext::new(
        test_config(dir.path()),
        Arc::new(MockEmbeddingProvider::new()),
        completion.clone(),
    )
    .await
    .unwrap();

    let first = app.chat("My password is 1234").await.unwrap();
    assert_eq!(first.reply, "Noted.");
    let id = first.record_id.unwrap();

    let record = app.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.privacy_level.as_str(), "high");

    app.chat("What did I tell you?").await.unwrap();
    let second_request = &completion.requests()[1];
    assert_eq!(second_request.len(), 4);
    assert_eq!(second_request[1].content, "My password is 1234");
    assert_eq!(second_request[2].content, "Noted.");
}

#[tokio::test]
async fn test_chat_failure_saves_nothing() {
    let dir = tempdir().unwrap();
    let app = AppContext::new(
        test_config(dir.path()),
        Arc::new(MockEmbeddingProvider::new()),
        Arc::new(MockCompletionProvider::failing("down")),
    )
    .await
    .unwrap();

    let err = app.chat("hello").await.unwrap_err();
    assert!(err.user_message().contains("unavailable"));
    assert_eq!(app.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_reply_survives_failed_save() {
    let dir = tempdir().unwrap();
    let app = AppContext::new(
        test_config(dir.path()),
        Arc::new(FailingEmbeddingProvider),
        Arc::new(MockCompletionProvider::replying("still here")),
    )
    .await
    .unwrap();

    let reply = app.chat("hello").await.unwrap();
    assert_eq!(reply.reply, "still here");
    assert!(reply.record_id.is_none());
}

#[tokio::test]
async fn test_filter_uses_configured_limits() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.retrieval.list_limit = 7;

    let app = AppContext::new(
        config,
        Arc::new(MockEmbeddingProvider::new()),
        Arc::new(MockCompletionProvider::replying("ok")),
    )
    .await
    .unwrap();

    let query = app.filter.list(&RawListParams::default()).unwrap();
    assert_eq!(query.limit, 7);
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.context.max_turns = 0;

    let result = AppContext::new(
        config,
        Arc::new(MockEmbeddingProvider::new()),
        Arc::new(MockCompletionProvider::replying("ok")),
    )
    .await;
    assert!(matches!(result, Err(RecallError::Config(_))));
}
