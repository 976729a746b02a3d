use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_acks")]
    pub acks: String,
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Upper bound librdkafka spends retrying a message before reporting
    /// it as failed.
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
    /// Extra librdkafka properties, applied last.
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Dot-separated path of the map attribute inside `NewImage`.
    #[serde(default = "default_image_path")]
    pub image_path: String,
    #[serde(default = "default_key_attributes")]
    pub key_attributes: Vec<String>,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Wall-clock budget for one batch; unset means no deadline.
    #[serde(default)]
    pub batch_timeout_ms: Option<u64>,
    #[serde(default = "default_skip_remove_events")]
    pub skip_remove_events: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            image_path: default_image_path(),
            key_attributes: default_key_attributes(),
            max_in_flight: default_max_in_flight(),
            batch_timeout_ms: None,
            skip_remove_events: default_skip_remove_events(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("DDB_RELAY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kafka.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(Error::Config("kafka.brokers must list at least one broker".to_string()));
        }
        if self.kafka.topic.trim().is_empty() {
            return Err(Error::Config("kafka.topic must not be empty".to_string()));
        }
        if self.relay.max_in_flight == 0 {
            return Err(Error::Config("relay.max_in_flight must be greater than zero".to_string()));
        }
        if self.relay.key_attributes.is_empty() {
            return Err(Error::Config("relay.key_attributes must name at least one attribute".to_string()));
        }
        if self.relay.image_path.split('.').any(str::is_empty) {
            return Err(Error::Config(format!(
                "relay.image_path '{}' has an empty segment",
                self.relay.image_path
            )));
        }
        Ok(())
    }
}

impl RelayConfig {
    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_ms.map(Duration::from_millis)
    }
}

fn default_compression() -> String {
    "snappy".to_string()
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_linger_ms() -> u32 {
    5
}

fn default_batch_size() -> usize {
    16384
}

fn default_message_timeout_ms() -> u64 {
    30_000
}

fn default_image_path() -> String {
    "land_obs_hourly".to_string()
}

fn default_key_attributes() -> Vec<String> {
    vec!["id".to_string()]
}

fn default_max_in_flight() -> usize {
    64
}

fn default_skip_remove_events() -> bool {
    true
}
