mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};

use vsmq::client::{ResponseRouter, ResponseWaiter, VectorStoreClient};
use vsmq::core::{MemoryQueue, Message, Publisher, QueueError, QueueTransport, Response};

fn list_request(id: &str) -> Message {
    let mut message = Map::new();
    message.insert("action".into(), json!("list_collections"));
    message.insert("request_id".into(), json!(id));
    message
}

/// Waits for `count` requests, then answers them newest first.
async fn answer_in_reverse(queue: MemoryQueue, count: usize) {
    let publisher = Publisher::new(Arc::new(queue.clone()));
    let mut ids = Vec::new();
    while ids.len() < count {
        if let Some(text) = queue.pop("requests", Duration::from_millis(50)).await.unwrap() {
            let message: Message = serde_json::from_str(&text).unwrap();
            ids.push(message["request_id"].as_str().unwrap().to_string());
        }
    }
    for id in ids.iter().rev() {
        let response = Response::success(id.clone(), format!("answer for {id}"));
        publisher.publish_json("responses", &response).await.unwrap();
    }
}

#[tokio::test]
async fn concurrent_requests_each_get_their_own_response() {
    common::init_logging();
    let queue = MemoryQueue::new();
    let router = ResponseRouter::start(&queue, "requests", "responses", Duration::from_millis(20))
        .await
        .unwrap();
    let responder = tokio::spawn(answer_in_reverse(queue.clone(), 2));

    let timeout = Duration::from_secs(2);
    let (a, b) = tokio::join!(
        router.request(list_request("req-a"), timeout),
        router.request(list_request("req-b"), timeout),
    );
    responder.await.unwrap();

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.request_id, "req-a");
    assert_eq!(a.message.as_deref(), Some("answer for req-a"));
    assert_eq!(b.request_id, "req-b");
    assert_eq!(b.message.as_deref(), Some("answer for req-b"));
    assert_eq!(router.pending(), 0);

    router.shutdown().await.unwrap();
}

#[tokio::test]
async fn router_times_out_and_forgets_the_request() {
    let queue = MemoryQueue::new();
    let router = ResponseRouter::start(&queue, "requests", "responses", Duration::from_millis(20))
        .await
        .unwrap();

    let err = router
        .request(list_request("lonely"), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::ResponseTimeout { ref request_id, .. } if request_id == "lonely"));
    assert_eq!(router.pending(), 0);

    router.shutdown().await.unwrap();
}

#[tokio::test]
async fn typed_client_works_over_the_router() {
    let queue = MemoryQueue::new();
    let router = ResponseRouter::start(&queue, "requests", "responses", Duration::from_millis(20))
        .await
        .unwrap();
    let responder = tokio::spawn(answer_in_reverse(queue.clone(), 1));

    let client = VectorStoreClient::new(router, Duration::from_secs(2));
    let response = client.list_collections().await.unwrap();
    responder.await.unwrap();

    assert!(response.is_success());
    assert!(response.message.unwrap().starts_with("answer for "));
    client.into_inner().shutdown().await.unwrap();
}

#[tokio::test]
async fn waiter_assigns_an_id_and_matches_on_it() {
    let queue = MemoryQueue::new();
    let waiter = ResponseWaiter::connect(&queue, "requests", "responses")
        .await
        .unwrap()
        .with_poll_timeout(Duration::from_millis(20));
    let responder = tokio::spawn(answer_in_reverse(queue.clone(), 1));

    let mut message = Map::new();
    message.insert("action".into(), Value::from("list_collections"));
    let response = waiter.request(message, Duration::from_secs(2)).await.unwrap();
    responder.await.unwrap();

    assert!(uuid::Uuid::parse_str(&response.request_id).is_ok());
    assert!(response.is_success());
}

#[tokio::test]
async fn duplicate_pending_id_is_rejected_and_the_first_caller_keeps_its_slot() {
    let queue = MemoryQueue::new();
    let router = Arc::new(
        ResponseRouter::start(&queue, "requests", "responses", Duration::from_millis(20))
            .await
            .unwrap(),
    );
    let first = {
        let router = Arc::clone(&router);
        tokio::spawn(async move { router.request(list_request("twin"), Duration::from_secs(2)).await })
    };
    assert!(common::eventually(Duration::from_secs(1), || router.pending() == 1).await);

    let err = router
        .request(list_request("twin"), Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::DuplicateRequest(ref id) if id == "twin"));

    // the original waiter still receives its answer
    answer_in_reverse(queue.clone(), 1).await;
    let response = first.await.unwrap().unwrap();
    assert_eq!(response.message.as_deref(), Some("answer for twin"));

    router.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_fails_outstanding_requests_as_closed() {
    let queue = MemoryQueue::new();
    let router = Arc::new(
        ResponseRouter::start(&queue, "requests", "responses", Duration::from_millis(20))
            .await
            .unwrap(),
    );
    let waiting = {
        let router = Arc::clone(&router);
        tokio::spawn(async move { router.request(list_request("orphan"), Duration::from_secs(5)).await })
    };
    assert!(common::eventually(Duration::from_secs(1), || router.pending() == 1).await);

    router.shutdown().await.unwrap();
    let err = waiting.await.unwrap().unwrap_err();
    assert!(matches!(err, QueueError::RouterClosed(ref id) if id == "orphan"));
}
