pub mod config;
pub mod coordinator;
pub mod error;
pub mod relay;

pub mod kafka;
pub mod stream;

pub use config::Config;
pub use coordinator::{BatchCoordinator, BatchResult, FailureCause, RecordFailure, RecordStage};
pub use error::{Error, ExtractionError, Result};
pub use relay::Relay;
