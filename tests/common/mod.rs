#![allow(dead_code)]

use ddb_kafka_relay::config::{Config, KafkaConfig, RelayConfig};
use ddb_kafka_relay::kafka::{BrokerClient, EncodedMessage, PublishDispatcher, PublishOutcome};
use ddb_kafka_relay::stream::{ChangeRecord, StreamEvent};
use ddb_kafka_relay::BatchCoordinator;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::env;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOPIC: &str = "land-obs-test";

/// Bookkeeping shared between a [`StubBroker`] and its pending deliveries.
#[derive(Default)]
pub struct BrokerStats {
    pub submitted: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub messages: Mutex<Vec<(String, EncodedMessage)>>,
}

impl BrokerStats {
    pub fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<(String, EncodedMessage)> {
        self.messages.lock().unwrap().clone()
    }
}

struct InFlightGuard(Arc<BrokerStats>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-process broker double with scripted latency and failures.
#[derive(Default)]
pub struct StubBroker {
    stats: Arc<BrokerStats>,
    delay: Duration,
    key_delays: HashMap<String, Duration>,
    fail_all: bool,
    fail_keys: HashSet<String>,
    next_offset: AtomicI64,
}

impl StubBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_key_delay(mut self, key: &str, delay: Duration) -> Self {
        self.key_delays.insert(key.to_string(), delay);
        self
    }

    pub fn failing_key(mut self, key: &str) -> Self {
        self.fail_keys.insert(key.to_string());
        self
    }

    pub fn stats(&self) -> Arc<BrokerStats> {
        self.stats.clone()
    }
}

impl BrokerClient for StubBroker {
    fn submit(&self, topic: &str, message: &EncodedMessage) -> BoxFuture<'static, PublishOutcome> {
        let stats = self.stats.clone();
        stats.submitted.fetch_add(1, Ordering::SeqCst);
        stats
            .messages
            .lock()
            .unwrap()
            .push((topic.to_string(), message.clone()));

        let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlightGuard(stats);

        let delay = self.key_delays.get(&message.key).copied().unwrap_or(self.delay);
        let fail = self.fail_all || self.fail_keys.contains(&message.key);
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        let topic = topic.to_string();

        async move {
            let _guard = guard;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if fail {
                PublishOutcome::Failure {
                    cause: "Message production error: NotLeaderForPartition".to_string(),
                }
            } else {
                PublishOutcome::Success {
                    topic,
                    partition: 0,
                    offset,
                }
            }
        }
        .boxed()
    }
}

pub fn coordinator(broker: StubBroker, relay: RelayConfig) -> (BatchCoordinator, Arc<BrokerStats>) {
    let stats = broker.stats();
    let dispatcher = PublishDispatcher::new(Arc::new(broker), TOPIC);
    (BatchCoordinator::new(&relay, dispatcher), stats)
}

/// A well-formed insert for `key` whose hourly map holds `fields`.
pub fn observation(key: &str, fields: &[(&str, &str)]) -> Value {
    let hourly: serde_json::Map<String, Value> = fields
        .iter()
        .map(|(name, value)| (name.to_string(), json!({ "S": value })))
        .collect();

    json!({
        "eventID": format!("evt-{}", key),
        "eventName": "INSERT",
        "eventSource": "aws:dynamodb",
        "dynamodb": {
            "Keys": { "id": { "S": key } },
            "NewImage": {
                "id": { "S": key },
                "land_obs_hourly": { "M": hourly }
            }
        }
    })
}

/// An insert for `key` that lacks the hourly map.
pub fn malformed(key: &str) -> Value {
    json!({
        "eventName": "INSERT",
        "dynamodb": {
            "Keys": { "id": { "S": key } },
            "NewImage": { "id": { "S": key } }
        }
    })
}

pub fn event(records: Vec<Value>) -> StreamEvent {
    serde_json::from_value(json!({ "Records": records })).unwrap()
}

pub fn change_record(record: Value) -> ChangeRecord {
    let record = serde_json::from_value(record).unwrap();
    ChangeRecord::from_stream_record(record, &Default::default()).unwrap()
}

/// Get test configuration from environment variables
pub fn get_test_config() -> Config {
    let kafka = KafkaConfig {
        brokers: env::var("TEST_KAFKA_BROKERS")
            .unwrap_or_else(|_| "localhost:9092".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect(),
        topic: format!("land_obs_test_{}", std::process::id()),
        compression: "none".to_string(),
        acks: "all".to_string(),
        linger_ms: 0,
        batch_size: 1,
        message_timeout_ms: 10_000,
        properties: HashMap::new(),
    };

    Config {
        kafka,
        relay: RelayConfig::default(),
    }
}
