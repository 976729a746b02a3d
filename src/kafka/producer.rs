use futures::future::{self, BoxFuture, FutureExt};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use super::serializer::EncodedMessage;
use crate::{config::KafkaConfig, Error, Result};

/// How the broker resolved one submitted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    Success {
        topic: String,
        partition: i32,
        offset: i64,
    },
    Failure {
        cause: String,
    },
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Success { .. })
    }
}

/// A shared broker connection that accepts messages without blocking the
/// caller and resolves each one to exactly one [`PublishOutcome`].
pub trait BrokerClient: Send + Sync {
    fn submit(&self, topic: &str, message: &EncodedMessage) -> BoxFuture<'static, PublishOutcome>;
}

pub struct KafkaProducer {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", config.brokers.join(","))
            .set("compression.type", &config.compression)
            .set("acks", &config.acks)
            .set("linger.ms", config.linger_ms.to_string())
            .set("batch.size", config.batch_size.to_string())
            .set("message.timeout.ms", config.message_timeout_ms.to_string());

        for (name, value) in &config.properties {
            client_config.set(name, value);
        }

        let producer: FutureProducer = client_config.create().map_err(Error::Kafka)?;

        info!(brokers = ?config.brokers, "Kafka producer created");

        Ok(Self {
            producer,
            queue_timeout: Duration::from_millis(config.message_timeout_ms),
        })
    }
}

impl BrokerClient for KafkaProducer {
    /// Enqueues the message on the producer before returning, so delivery
    /// starts whether or not the returned future is polled. Only a full local
    /// queue defers the enqueue to the future, which then waits up to the
    /// queue timeout for room.
    fn submit(&self, topic: &str, message: &EncodedMessage) -> BoxFuture<'static, PublishOutcome> {
        let record = FutureRecord::to(topic)
            .key(message.key.as_str())
            .payload(message.payload.as_str());

        match self.producer.send_result(record) {
            Ok(delivery) => {
                let topic = topic.to_string();
                async move {
                    match delivery.await {
                        Ok(Ok((partition, offset))) => PublishOutcome::Success {
                            topic,
                            partition,
                            offset,
                        },
                        Ok(Err((e, _))) => PublishOutcome::Failure { cause: e.to_string() },
                        Err(_) => PublishOutcome::Failure {
                            cause: "delivery canceled".to_string(),
                        },
                    }
                }
                .boxed()
            }
            Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), _)) => {
                debug!(topic, "Producer queue full, waiting for room");
                self.send_when_queue_has_room(topic, message)
            }
            Err((e, _)) => future::ready(PublishOutcome::Failure { cause: e.to_string() }).boxed(),
        }
    }
}

impl KafkaProducer {
    fn send_when_queue_has_room(
        &self,
        topic: &str,
        message: &EncodedMessage,
    ) -> BoxFuture<'static, PublishOutcome> {
        let producer = self.producer.clone();
        let queue_timeout = self.queue_timeout;
        let topic = topic.to_string();
        let key = message.key.clone();
        let payload = message.payload.clone();

        async move {
            let record = FutureRecord::to(&topic)
                .key(key.as_str())
                .payload(payload.as_str());

            match producer.send(record, Timeout::After(queue_timeout)).await {
                Ok((partition, offset)) => PublishOutcome::Success {
                    topic: topic.clone(),
                    partition,
                    offset,
                },
                Err((e, _)) => PublishOutcome::Failure { cause: e.to_string() },
            }
        }
        .boxed()
    }
}
