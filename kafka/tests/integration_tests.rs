//! Integration tests for [`KafkaBrokerConsumer`] with a real Kafka instance.
//!
//! These tests use testcontainers to spin up a real Kafka broker and
//! validate:
//! - Produce/consume round-trip through the consumer adapter
//! - Batch ordering
//! - The full listener pipeline against a live broker
//!
//! # Running These Tests
//!
//! They are `#[ignore]`d by default because they:
//! - Require Docker to be running (for testcontainers)
//! - Take 15-60 seconds per test to spin up Kafka
//! - Can be flaky due to Kafka's distributed nature and timing
//!
//! To run explicitly:
//! ```bash
//! cargo test -p topic-listener-kafka --test integration_tests -- --ignored
//! ```
//!
//! # Panics
//!
//! These tests use `expect()` and `panic!()` for setup failures, which is
//! acceptable in test code.

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

use topic_listener::{ListenerConfig, TopicListener, TracingEventLogger};
use topic_listener_core::BrokerConsumer;
use topic_listener_kafka::KafkaBrokerConsumer;
use topic_listener_testing::RecordingHandler;

/// Helper to create a producer for test messages.
fn test_producer(brokers: &str) -> FutureProducer {
    ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("message.timeout.ms", "5000")
        .create()
        .expect("Failed to create producer")
}

/// Helper to publish one bincode-encoded string payload.
async fn send_string(producer: &FutureProducer, topic: &str, key: &str, value: &str) {
    let payload = bincode::serialize(&value.to_string()).expect("Failed to serialize payload");
    producer
        .send(
            FutureRecord::to(topic).payload(&payload).key(key),
            Timeout::After(Duration::from_secs(5)),
        )
        .await
        .map_err(|(e, _)| e)
        .expect("Failed to send message");
}

/// Helper to wait for Kafka to accept produces (topic auto-creation
/// included).
async fn wait_for_kafka_ready(producer: &FutureProducer, topic: &str) {
    let max_attempts = 60;
    for attempt in 1..=max_attempts {
        let payload = bincode::serialize(&"warmup".to_string()).expect("serialize warmup");
        let sent = producer
            .send(
                FutureRecord::to(topic).payload(&payload).key("warmup"),
                Timeout::After(Duration::from_secs(2)),
            )
            .await;
        if sent.is_ok() {
            // Give the cluster time to propagate topic metadata.
            tokio::time::sleep(Duration::from_secs(2)).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(
            attempt != max_attempts,
            "Kafka failed to become ready after {max_attempts} attempts"
        );
    }
}

#[tokio::test]
#[ignore]
async fn consume_round_trip() {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    let brokers = format!("{host}:{port}");

    let producer = test_producer(&brokers);
    wait_for_kafka_ready(&producer, "round-trip").await;

    send_string(&producer, "round-trip", "k1", "first").await;
    send_string(&producer, "round-trip", "k2", "second").await;

    let mut consumer = KafkaBrokerConsumer::<String>::builder()
        .brokers(&brokers)
        .group_id("round-trip-test")
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create consumer");

    consumer
        .subscribe(&["round-trip"])
        .expect("Failed to subscribe");

    // Poll until both payloads arrive (skipping warmups), bounded overall.
    let mut received = Vec::new();
    let deadline = tokio::time::timeout(Duration::from_secs(30), async {
        while received.len() < 2 {
            let batch = consumer
                .poll(Duration::from_secs(2))
                .await
                .expect("Poll failed");
            for record in batch {
                if record.value != "warmup" {
                    received.push(record);
                }
            }
        }
    });
    deadline.await.expect("Timeout waiting for records");

    assert_eq!(received.len(), 2);
    assert_eq!(received[0].value, "first");
    assert_eq!(received[0].key.as_deref(), Some("k1"));
    assert_eq!(received[1].value, "second");

    consumer.close();
}

#[tokio::test]
#[ignore]
async fn listener_pipeline_against_live_broker() {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    let brokers = format!("{host}:{port}");

    let producer = test_producer(&brokers);
    wait_for_kafka_ready(&producer, "pipeline").await;

    let consumer = KafkaBrokerConsumer::<String>::builder()
        .brokers(&brokers)
        .group_id("pipeline-test")
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create consumer");

    let handler = Arc::new(RecordingHandler::succeeding());
    let handler_probe = handler.probe();

    let mut listener = TopicListener::with_config(
        "pipeline",
        consumer,
        handler,
        Arc::new(TracingEventLogger::new()),
        ListenerConfig::new().with_poll_timeout(Duration::from_secs(2)),
    )
    .expect("Failed to create listener");

    listener.start().expect("Failed to start listener");

    send_string(&producer, "pipeline", "k1", "alpha").await;
    send_string(&producer, "pipeline", "k2", "beta").await;

    let deadline = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let seen = handler_probe.seen();
            if seen.contains(&"alpha".to_string()) && seen.contains(&"beta".to_string()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    });
    deadline.await.expect("Timeout waiting for handled records");

    listener.stop().await.expect("Failed to stop listener");
    assert!(!listener.is_running());
    assert_eq!(listener.records_lost(), 0);
}
