use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};

use super::producer::{BrokerClient, PublishOutcome};
use super::serializer::EncodedMessage;

/// Submits encoded messages to the configured topic and reports how each
/// one was acknowledged.
#[derive(Clone)]
pub struct PublishDispatcher {
    client: Arc<dyn BrokerClient>,
    topic: String,
}

impl PublishDispatcher {
    pub fn new(client: Arc<dyn BrokerClient>, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Hands `message` to the broker client immediately and returns a future
    /// for its acknowledgment. Failed deliveries are not retried here.
    pub fn publish(&self, message: EncodedMessage) -> impl Future<Output = PublishOutcome> + Send + 'static {
        let ack = self.client.submit(&self.topic, &message);
        let key = message.key;

        async move {
            let outcome = ack.await;
            match &outcome {
                PublishOutcome::Success { topic, partition, offset } => {
                    debug!(
                        key = %key,
                        topic = %topic,
                        partition = partition,
                        offset = offset,
                        "Message produced"
                    );
                }
                PublishOutcome::Failure { cause } => {
                    error!(key = %key, cause = %cause, "Unable to produce message to Kafka topic");
                }
            }
            outcome
        }
    }
}
