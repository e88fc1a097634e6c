#![allow(dead_code)]

use async_trait::async_trait;
use kafka_event_bus::broker::{ConsumerClient, InboundRecord, ProducerClient, SerializedMessage};
use kafka_event_bus::config::{Config, ConsumerConfig, KafkaConfig, ProducerConfig};
use kafka_event_bus::delivery::DeliveryErrorHandler;
use kafka_event_bus::{Error, MessageEnvelope, MessageHandler, Result};
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::env;
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub user: String,
    pub action: String,
}

impl AuditEvent {
    pub fn new(user: &str, action: &str) -> Self {
        Self {
            user: user.to_string(),
            action: action.to_string(),
        }
    }
}

/// Get test configuration from environment variables
pub fn get_test_config() -> Config {
    let kafka = KafkaConfig {
        brokers: env::var("TEST_KAFKA_BROKERS")
            .unwrap_or_else(|_| "localhost:9092".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect(),
        client_id: format!("event-bus-test-{}", std::process::id()),
        properties: HashMap::new(),
    };

    let producer = ProducerConfig {
        buffer_length: NonZeroUsize::new(100).unwrap(),
        delivery_timeout_ms: 200,
        drain_interval_ms: 10, // Fast ticks for tests
        acks: "all".to_string(),
        compression: "none".to_string(), // No compression for tests
        linger_ms: 0,
    };

    let consumer = ConsumerConfig {
        group_id: format!("event-bus-test-{}", std::process::id()),
        pull_timeout_ms: 20,
        poll_interval_ms: 50,
        batch_size: NonZeroU32::new(100).unwrap(),
        auto_offset_reset: "earliest".to_string(),
        enable_partition_eof: false,
    };

    Config {
        kafka,
        topics: HashMap::new(),
        producer,
        consumer,
    }
}

/// Waits until `condition` holds, panicking after five seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

#[derive(Default)]
pub struct ProducerState {
    /// Keys in the order `produce` was called, including refused ones.
    pub attempts: Mutex<Vec<String>>,
    pub accepted: Mutex<Vec<MessageEnvelope<String, AuditEvent>>>,
    in_flight: Mutex<Vec<MessageEnvelope<String, AuditEvent>>>,
    pub flushes: Mutex<Vec<Duration>>,
    /// Keys the client refuses at produce time.
    pub refused: Mutex<HashSet<String>>,
    /// Keys the broker never acknowledges.
    pub undeliverable: Mutex<HashSet<String>>,
    /// Remaining counts reported by successive flushes once in-flight
    /// messages are settled; empty means 0.
    pub stuck: Mutex<VecDeque<usize>>,
    /// When set, every flush reports this many remaining messages.
    pub always_stuck: Mutex<Option<usize>>,
}

/// In-memory producer client. Deliveries settle on flush; failures are
/// reported to the error handler the way the rdkafka delivery callback does.
pub struct FakeProducerClient {
    pub state: Arc<ProducerState>,
    handler: Arc<dyn DeliveryErrorHandler<String, AuditEvent>>,
}

impl FakeProducerClient {
    pub fn new(handler: Arc<dyn DeliveryErrorHandler<String, AuditEvent>>) -> (Self, Arc<ProducerState>) {
        let state = Arc::new(ProducerState::default());
        (
            Self {
                state: Arc::clone(&state),
                handler,
            },
            state,
        )
    }
}

impl ProducerClient<String, AuditEvent> for FakeProducerClient {
    fn produce(
        &self,
        _topic: &str,
        envelope: MessageEnvelope<String, AuditEvent>,
        serialized: SerializedMessage,
    ) -> Result<()> {
        let key = envelope.key().clone();
        self.state.attempts.lock().unwrap().push(key.clone());
        if self.state.refused.lock().unwrap().contains(&key) {
            return Err(Error::Kafka(KafkaError::MessageProduction(
                RDKafkaErrorCode::QueueFull,
            )));
        }
        assert_eq!(serialized.key, serde_json::to_vec(&key).unwrap());
        self.state.accepted.lock().unwrap().push(envelope.clone());
        self.state.in_flight.lock().unwrap().push(envelope);
        Ok(())
    }

    fn flush(&self, timeout: Duration) -> usize {
        self.state.flushes.lock().unwrap().push(timeout);

        let settled: Vec<_> = self.state.in_flight.lock().unwrap().drain(..).collect();
        let undeliverable = self.state.undeliverable.lock().unwrap().clone();
        for envelope in settled {
            if undeliverable.contains(envelope.key()) {
                self.handler
                    .handle_error("Local: Message timed out", envelope.key(), envelope.value());
            }
        }

        if let Some(remaining) = *self.state.always_stuck.lock().unwrap() {
            // A broker that never acknowledges uses up the flush timeout.
            std::thread::sleep(Duration::from_millis(1));
            return remaining;
        }
        self.state.stuck.lock().unwrap().pop_front().unwrap_or(0)
    }
}

/// Delivery error handler that remembers every failure.
#[derive(Default)]
pub struct RecordingErrorHandler {
    pub failures: Mutex<Vec<(String, String, AuditEvent)>>,
}

impl DeliveryErrorHandler<String, AuditEvent> for RecordingErrorHandler {
    fn handle_error(&self, reason: &str, key: &String, value: &AuditEvent) {
        self.failures
            .lock()
            .unwrap()
            .push((reason.to_string(), key.clone(), value.clone()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerEvent {
    Subscribe(String),
    Poll,
    Commit,
}

#[derive(Default)]
pub struct ConsumerState {
    pub records: Mutex<VecDeque<InboundRecord>>,
    pub events: Mutex<Vec<ConsumerEvent>>,
}

impl ConsumerState {
    pub fn push(&self, offset: i64, key: &str, event: &AuditEvent) {
        self.records.lock().unwrap().push_back(InboundRecord {
            topic: "audit".to_string(),
            partition: 0,
            offset,
            key: Some(serde_json::to_vec(key).unwrap()),
            payload: Some(serde_json::to_vec(event).unwrap()),
        });
    }

    pub fn polls(&self) -> usize {
        self.count(&ConsumerEvent::Poll)
    }

    pub fn commits(&self) -> usize {
        self.count(&ConsumerEvent::Commit)
    }

    fn count(&self, kind: &ConsumerEvent) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == kind)
            .count()
    }
}

pub struct FakeConsumerClient {
    pub state: Arc<ConsumerState>,
}

impl FakeConsumerClient {
    pub fn new() -> (Self, Arc<ConsumerState>) {
        let state = Arc::new(ConsumerState::default());
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl ConsumerClient for FakeConsumerClient {
    fn subscribe(&self, topic: &str) -> Result<()> {
        self.state
            .events
            .lock()
            .unwrap()
            .push(ConsumerEvent::Subscribe(topic.to_string()));
        Ok(())
    }

    fn poll(&self, timeout: Duration) -> Result<Option<InboundRecord>> {
        self.state.events.lock().unwrap().push(ConsumerEvent::Poll);
        let next = self.state.records.lock().unwrap().pop_front();
        if next.is_none() {
            // Behave like a real poll that waits out its timeout.
            std::thread::sleep(timeout);
        }
        Ok(next)
    }

    fn commit(&self) -> Result<()> {
        self.state.events.lock().unwrap().push(ConsumerEvent::Commit);
        Ok(())
    }
}

/// Handler that records batches and optionally fails on the first one.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    pub batches: Arc<Mutex<Vec<Vec<(String, AuditEvent)>>>>,
    pub fail: bool,
}

impl RecordingHandler {
    pub fn handled(&self) -> usize {
        self.batches.lock().unwrap().iter().map(Vec::len).sum()
    }
}

#[async_trait]
impl MessageHandler<String, AuditEvent> for RecordingHandler {
    async fn handle(
        &self,
        messages: Vec<(String, AuditEvent)>,
        _token: &CancellationToken,
    ) -> anyhow::Result<()> {
        self.batches.lock().unwrap().push(messages);
        if self.fail {
            anyhow::bail!("downstream store unavailable");
        }
        Ok(())
    }
}
