//! Concurrent correctness tests against real Redis (via testcontainers).
//!
//! Run with: `cargo test -p webhook-redis --test concurrent`
//! Skip if Docker unavailable: tests will fail with connection errors.

use std::collections::HashSet;
use std::sync::Arc;

use webhook_core::dispatcher::{DispatchOperation, Dispatcher};
use webhook_redis::RedisDispatcher;

async fn make_dispatcher(redis_url: &str) -> RedisDispatcher {
    let client = redis::Client::open(redis_url).unwrap();
    let conn = client.get_multiplexed_async_connection().await.unwrap();
    RedisDispatcher::new(conn, "test:events", "test:retries", "test:balancing")
}

async fn flush_redis(redis_url: &str) {
    let client = redis::Client::open(redis_url).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    redis::cmd("FLUSHALL").query_async::<()>(&mut conn).await.unwrap();
}

#[tokio::test]
async fn concurrent_publishers_deliver_every_message_exactly_once() {
    let container =
        testcontainers::runners::AsyncRunner::start(testcontainers_modules::redis::Redis::default())
            .await
            .unwrap();
    let port = container.get_host_port_ipv4(6379).await.unwrap();
    let redis_url = format!("redis://127.0.0.1:{port}");
    flush_redis(&redis_url).await;

    let dispatcher = Arc::new(make_dispatcher(&redis_url).await);
    let count = 50;

    let mut handles = Vec::new();
    for i in 0..count {
        let dispatcher = Arc::clone(&dispatcher);
        handles.push(tokio::spawn(async move {
            dispatcher.publish_event(&format!("msg_{i}")).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut seen = HashSet::new();
    for _ in 0..count {
        let (id, op) = dispatcher.next().await.unwrap().expect("message available");
        assert_eq!(op, DispatchOperation::Process);
        seen.insert(id);
    }
    assert_eq!(seen.len(), count, "every published message id must be delivered exactly once");
}

#[tokio::test]
async fn retries_are_drained_before_events() {
    let container =
        testcontainers::runners::AsyncRunner::start(testcontainers_modules::redis::Redis::default())
            .await
            .unwrap();
    let port = container.get_host_port_ipv4(6379).await.unwrap();
    let redis_url = format!("redis://127.0.0.1:{port}");
    flush_redis(&redis_url).await;

    let dispatcher = make_dispatcher(&redis_url).await;
    dispatcher.publish_event("event-msg").await.unwrap();
    dispatcher.publish_retry("retry-msg").await.unwrap();

    let (first_id, first_op) = dispatcher.next().await.unwrap().unwrap();
    assert_eq!(first_id, "retry-msg");
    assert_eq!(first_op, DispatchOperation::Retry);

    let (second_id, second_op) = dispatcher.next().await.unwrap().unwrap();
    assert_eq!(second_id, "event-msg");
    assert_eq!(second_op, DispatchOperation::Process);
}

#[tokio::test]
async fn next_times_out_to_none_on_empty_queues() {
    let container =
        testcontainers::runners::AsyncRunner::start(testcontainers_modules::redis::Redis::default())
            .await
            .unwrap();
    let port = container.get_host_port_ipv4(6379).await.unwrap();
    let redis_url = format!("redis://127.0.0.1:{port}");
    flush_redis(&redis_url).await;

    let dispatcher = make_dispatcher(&redis_url).await;
    let result = dispatcher.next().await.unwrap();
    assert!(result.is_none());
}
