mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use vsmq::client::{ResponseWaiter, VectorStoreClient};
use vsmq::config::Config;
use vsmq::core::{MemoryQueue, Payload, Publisher, QueueTransport, Response, Status};
use vsmq::store::MemoryVectorStore;
use vsmq::VectorStoreService;

fn fast_config() -> Config {
    let mut config = Config::default();
    config.queue.poll_timeout_ms = 20;
    config.queue.error_backoff_ms = 20;
    config
}

async fn client_for(queue: &MemoryQueue, config: &Config) -> VectorStoreClient<ResponseWaiter> {
    let waiter = ResponseWaiter::connect(queue, config.queue.work_queue.clone(), config.queue.response_queue.clone())
        .await
        .unwrap()
        .with_poll_timeout(Duration::from_millis(20));
    VectorStoreClient::new(waiter, Duration::from_secs(2))
}

#[tokio::test]
async fn create_add_search_round_trip() {
    common::init_logging();
    let queue = MemoryQueue::new();
    let config = fast_config();
    let service = VectorStoreService::start(&queue, &config, Arc::new(MemoryVectorStore::default()))
        .await
        .unwrap();
    assert!(service.is_running());
    let client = client_for(&queue, &config).await;

    let created = client.create_collection("c").await.unwrap();
    assert_eq!(created.status, Status::Success);
    assert_eq!(created.message.as_deref(), Some("Collection c created"));

    let added = client
        .add_data(
            "c",
            [
                ("doc1", "This is a test document about artificial intelligence."),
                ("doc2", "Vector databases are useful for semantic search."),
                ("doc3", "ChromaDB is a vector database for AI applications."),
            ],
        )
        .await
        .unwrap();
    assert_eq!(added.message.as_deref(), Some("Added 3 items to c"));

    let found = client.search("c", "vector database", Some(2)).await.unwrap();
    let hits = found.results.expect("search results");
    assert!(hits.len() <= 2);
    assert!(!hits.is_empty());
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

    let listed = client.list_collections().await.unwrap();
    assert_eq!(listed.collections, Some(vec!["c".to_string()]));
    assert_eq!(client.collection_exists("c").await.unwrap().exists, Some(true));

    let deleted = client.delete_collection("c").await.unwrap();
    assert_eq!(deleted.message.as_deref(), Some("Collection 'c' deleted"));
    assert_eq!(client.collection_exists("c").await.unwrap().exists, Some(false));

    service.shutdown().await.unwrap();
    assert!(!service.is_running());
}

#[tokio::test]
async fn responses_echo_the_request_id() {
    let queue = MemoryQueue::new();
    let config = fast_config();
    let service = VectorStoreService::start(&queue, &config, Arc::new(MemoryVectorStore::default()))
        .await
        .unwrap();
    let client = client_for(&queue, &config).await;

    let mut message = serde_json::Map::new();
    message.insert("action".into(), json!("list_collections"));
    message.insert("request_id".into(), json!("req-42"));
    let response = client.send(message).await.unwrap();
    assert_eq!(response.request_id, "req-42");
    assert_eq!(response.status, Status::Success);

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn bad_messages_get_error_responses_and_the_service_keeps_running() {
    let queue = MemoryQueue::new();
    let config = fast_config();
    let service = VectorStoreService::start(&queue, &config, Arc::new(MemoryVectorStore::default()))
        .await
        .unwrap();
    let client = client_for(&queue, &config).await;

    let mut unknown = serde_json::Map::new();
    unknown.insert("action".into(), json!("drop_table"));
    let response = client.send(unknown).await.unwrap();
    assert_eq!(response.status, Status::Error);
    assert_eq!(response.error.as_deref(), Some("Unknown action: drop_table"));

    let missing = client.delete_collection("nope").await.unwrap();
    assert_eq!(missing.status, Status::Error);
    assert_eq!(missing.error.as_deref(), Some("Collection 'nope' not found"));

    // a message with no action carries no request id of ours; read it raw
    let publisher = Publisher::new(Arc::new(queue.clone()));
    publisher
        .publish(&config.queue.work_queue, &Payload::from(json!({"request_id": "no-action"})))
        .await
        .unwrap();
    let text = queue
        .pop(&config.queue.response_queue, Duration::from_secs(2))
        .await
        .unwrap()
        .expect("error response");
    let response: Response = serde_json::from_str(&text).unwrap();
    assert_eq!(response.request_id, "no-action");
    assert_eq!(response.error.as_deref(), Some("Message missing 'action' field"));

    assert!(service.is_running());
    service.shutdown().await.unwrap();
}
