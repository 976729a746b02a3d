use std::sync::Arc;
use tracing::{error, info};

use crate::coordinator::{BatchCoordinator, BatchResult};
use crate::kafka::{BrokerClient, KafkaProducer, KeyStrategy, PublishDispatcher};
use crate::stream::StreamEvent;
use crate::Config;

/// Entry point for relaying stream events: owns the shared broker client
/// and hands each incoming event to a [`BatchCoordinator`].
pub struct Relay {
    coordinator: std::result::Result<BatchCoordinator, String>,
    keys: KeyStrategy,
    skip_remove_events: bool,
}

impl Relay {
    /// Builds the Kafka client once. If that fails the relay still
    /// constructs, and every event it handles is reported as failed.
    pub fn new(config: &Config) -> Self {
        match KafkaProducer::new(&config.kafka) {
            Ok(producer) => Self::with_client(config, Arc::new(producer)),
            Err(e) => {
                error!("Failed to create Kafka producer: {}", e);
                Self {
                    coordinator: Err(e.to_string()),
                    keys: KeyStrategy::from_attributes(&config.relay.key_attributes),
                    skip_remove_events: config.relay.skip_remove_events,
                }
            }
        }
    }

    pub fn with_client(config: &Config, client: Arc<dyn BrokerClient>) -> Self {
        let dispatcher = PublishDispatcher::new(client, config.kafka.topic.clone());
        let coordinator = BatchCoordinator::new(&config.relay, dispatcher);

        info!(
            topic = %config.kafka.topic,
            image_path = %config.relay.image_path,
            max_in_flight = config.relay.max_in_flight,
            "Relay ready"
        );

        Self {
            keys: coordinator.key_strategy().clone(),
            coordinator: Ok(coordinator),
            skip_remove_events: config.relay.skip_remove_events,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.coordinator.is_ok()
    }

    pub async fn handle(&self, event: StreamEvent) -> BatchResult {
        match &self.coordinator {
            Ok(coordinator) => coordinator.process_event(event).await,
            Err(cause) => {
                error!(
                    records = event.records.len(),
                    "Broker client unavailable, failing whole batch"
                );
                BatchResult::all_failed(&event, &self.keys, self.skip_remove_events, cause)
            }
        }
    }
}
