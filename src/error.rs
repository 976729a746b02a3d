//! Error types and result handling for ddb-kafka-relay.
//!
//! This module defines the crate-level error type [`Error`], the
//! per-record [`ExtractionError`], and a convenience [`Result`] alias.
//!
//! Per-record problems never surface as [`Error`]: they are captured in the
//! batch result instead. [`Error`] is reserved for startup and I/O concerns
//! such as loading configuration or building the Kafka client.
//!
//! # Example
//!
//! ```rust
//! use ddb_kafka_relay::{Error, Result};
//!
//! fn load_settings() -> Result<()> {
//!     Err(Error::Config("kafka.topic must not be empty".to_string()))
//! }
//!
//! match load_settings() {
//!     Ok(()) => println!("Loaded"),
//!     Err(Error::Config(msg)) => eprintln!("Configuration error: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

/// The main error type for relay operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, from an invalid file or environment override.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kafka client or producer error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// JSON error when decoding stream events or encoding results.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error, typically while reading event input.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stream event document that could not be interpreted at all.
    #[error("Invalid event: {message}")]
    InvalidEvent {
        /// Description of what was invalid
        message: String,
    },
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

/// Why a single change record could not be turned into message fields.
///
/// These are permanent data-shape errors: the record is marked failed and
/// never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractionError {
    /// The attribute at `path` is not present on the record.
    #[error("missing field '{path}'")]
    MissingField { path: String },

    /// The attribute `field` exists but its value is not a plain string.
    #[error("unsupported value shape for field '{field}'")]
    UnsupportedValueShape { field: String },

    /// The record itself does not have the stream record shape.
    #[error("invalid record: {reason}")]
    InvalidRecord { reason: String },
}

/// A convenient Result type alias for relay operations.
///
/// This is equivalent to `std::result::Result<T, ddb_kafka_relay::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
