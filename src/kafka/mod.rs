pub mod dispatcher;
pub mod key_strategy;
pub mod producer;
pub mod serializer;

pub use dispatcher::PublishDispatcher;
pub use key_strategy::KeyStrategy;
pub use producer::{BrokerClient, KafkaProducer, PublishOutcome};
pub use serializer::{EncodedMessage, JsonSerializer};
