//! Batch coordination: fans a batch of change records out through
//! extraction, encoding and publishing, and joins every record's outcome
//! into a single [`BatchResult`].
//!
//! Records are processed concurrently up to `max_in_flight` at a time. A
//! record that fails never affects its siblings, and the coordinator never
//! returns early: every record in the batch reaches a terminal state before
//! the result is produced.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, instrument, trace, warn};

use crate::config::RelayConfig;
use crate::error::ExtractionError;
use crate::kafka::{JsonSerializer, KeyStrategy, PublishDispatcher, PublishOutcome};
use crate::stream::{ChangeRecord, FieldExtractor, StreamEvent, StreamRecord};

/// The pipeline stage at which a record failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStage {
    Extracting,
    Publishing,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureCause {
    #[error("extraction failed: {0}")]
    Extraction(ExtractionError),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("no acknowledgment within {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("broker client unavailable: {0}")]
    ClientUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    /// Position of the record in the incoming batch.
    pub index: usize,
    /// Partition key, when it could be resolved.
    pub key: Option<String>,
    pub stage: RecordStage,
    pub cause: FailureCause,
}

/// Aggregate outcome of one batch invocation.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Ordered by batch index.
    pub failures: Vec<RecordFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchResult {
    fn from_outcomes(started_at: DateTime<Utc>, outcomes: Vec<RecordOutcome>) -> Self {
        let total = outcomes.len();
        let mut succeeded = 0;
        let mut skipped = 0;
        let mut failures = Vec::new();

        for outcome in outcomes {
            match outcome {
                RecordOutcome::Completed => succeeded += 1,
                RecordOutcome::Skipped => skipped += 1,
                RecordOutcome::Failed(failure) => failures.push(failure),
            }
        }
        failures.sort_by_key(|f| f.index);

        Self {
            total,
            succeeded,
            failed: failures.len(),
            skipped,
            failures,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Marks every record of `event` failed without attempting any of them.
    /// Used when a resource shared by all records, such as the broker client,
    /// is unavailable. REMOVE events are still counted as skipped when
    /// `skip_remove_events` is set, since they would never reach the client.
    pub fn all_failed(
        event: &StreamEvent,
        keys: &KeyStrategy,
        skip_remove_events: bool,
        cause: &str,
    ) -> Self {
        let started_at = Utc::now();
        let outcomes = event
            .records
            .iter()
            .enumerate()
            .map(|(index, value)| {
                let record = StreamRecord::from_value(value).ok();
                if skip_remove_events && record.as_ref().is_some_and(StreamRecord::is_remove) {
                    return RecordOutcome::Skipped;
                }
                RecordOutcome::Failed(RecordFailure {
                    index,
                    key: record.and_then(|r| keys.resolve(&r.dynamodb.keys).ok()),
                    stage: RecordStage::Publishing,
                    cause: FailureCause::ClientUnavailable(cause.to_string()),
                })
            })
            .collect();

        Self::from_outcomes(started_at, outcomes)
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "Processed {} records: {} produced, {} failed, {} skipped",
            self.total, self.succeeded, self.failed, self.skipped
        )
    }
}

#[derive(Debug)]
enum RecordOutcome {
    Completed,
    Skipped,
    Failed(RecordFailure),
}

enum PendingRecord {
    Ready(ChangeRecord),
    Rejected(ExtractionError),
}

pub struct BatchCoordinator {
    extractor: FieldExtractor,
    keys: KeyStrategy,
    dispatcher: PublishDispatcher,
    max_in_flight: usize,
    batch_timeout: Option<Duration>,
    skip_remove_events: bool,
}

impl BatchCoordinator {
    pub fn new(config: &RelayConfig, dispatcher: PublishDispatcher) -> Self {
        Self {
            extractor: FieldExtractor::new(&config.image_path),
            keys: KeyStrategy::from_attributes(&config.key_attributes),
            dispatcher,
            max_in_flight: config.max_in_flight.max(1),
            batch_timeout: config.batch_timeout(),
            skip_remove_events: config.skip_remove_events,
        }
    }

    pub fn key_strategy(&self) -> &KeyStrategy {
        &self.keys
    }

    /// Relays a raw stream event. Records that do not decode, or whose
    /// identity key cannot be resolved, are failed individually.
    #[instrument(skip_all, fields(records = event.records.len(), topic = %self.dispatcher.topic()))]
    pub async fn process_event(&self, event: StreamEvent) -> BatchResult {
        let pending = event
            .records
            .into_iter()
            .map(|value| {
                StreamRecord::from_value(&value)
                    .and_then(|record| ChangeRecord::from_stream_record(record, &self.keys))
            })
            .map(|decoded| match decoded {
                Ok(change) => PendingRecord::Ready(change),
                Err(e) => PendingRecord::Rejected(e),
            })
            .collect();

        self.run(pending).await
    }

    #[instrument(skip_all, fields(records = records.len(), topic = %self.dispatcher.topic()))]
    pub async fn process_batch(&self, records: Vec<ChangeRecord>) -> BatchResult {
        self.run(records.into_iter().map(PendingRecord::Ready).collect()).await
    }

    async fn run(&self, pending: Vec<PendingRecord>) -> BatchResult {
        let started_at = Utc::now();
        let deadline = self.batch_timeout.map(|budget| (Instant::now() + budget, budget));

        let outcomes: Vec<RecordOutcome> = stream::iter(pending.into_iter().enumerate())
            .map(|(index, record)| self.process_record(index, record, deadline))
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        let result = BatchResult::from_outcomes(started_at, outcomes);
        if result.is_success() {
            info!(
                total = result.total,
                succeeded = result.succeeded,
                skipped = result.skipped,
                "Batch relayed"
            );
        } else {
            warn!(
                total = result.total,
                succeeded = result.succeeded,
                failed = result.failed,
                skipped = result.skipped,
                "Batch relayed with failures"
            );
        }
        result
    }

    async fn process_record(
        &self,
        index: usize,
        pending: PendingRecord,
        deadline: Option<(Instant, Duration)>,
    ) -> RecordOutcome {
        let record = match pending {
            PendingRecord::Ready(record) => record,
            PendingRecord::Rejected(e) => {
                warn!(index, error = %e, "Unable to decode record");
                return RecordOutcome::Failed(RecordFailure {
                    index,
                    key: None,
                    stage: RecordStage::Extracting,
                    cause: FailureCause::Extraction(e),
                });
            }
        };

        if self.skip_remove_events && record.is_remove() {
            trace!(index, key = %record.identity_key, "Skipping REMOVE event");
            return RecordOutcome::Skipped;
        }

        let fields = match self.extractor.extract(&record) {
            Ok(fields) => fields,
            Err(e) => {
                warn!(index, key = %record.identity_key, error = %e, "Unable to extract record fields");
                return RecordOutcome::Failed(RecordFailure {
                    index,
                    key: Some(record.identity_key),
                    stage: RecordStage::Extracting,
                    cause: FailureCause::Extraction(e),
                });
            }
        };

        let key = record.identity_key;
        let message = JsonSerializer::encode(key.clone(), fields);
        trace!(key = %message.key, payload = %message.payload, "New change record from stream");

        let timed_out = |budget: Duration| {
            warn!(index, key = %key, "Acknowledgment deadline exceeded");
            RecordOutcome::Failed(RecordFailure {
                index,
                key: Some(key.clone()),
                stage: RecordStage::Publishing,
                cause: FailureCause::Timeout {
                    after_ms: budget.as_millis() as u64,
                },
            })
        };

        let outcome = match deadline {
            Some((at, budget)) => {
                if Instant::now() >= at {
                    return timed_out(budget);
                }
                match tokio::time::timeout_at(at, self.dispatcher.publish(message)).await {
                    Ok(outcome) => outcome,
                    Err(_) => return timed_out(budget),
                }
            }
            None => self.dispatcher.publish(message).await,
        };

        match outcome {
            PublishOutcome::Success { .. } => RecordOutcome::Completed,
            PublishOutcome::Failure { cause } => RecordOutcome::Failed(RecordFailure {
                index,
                key: Some(key),
                stage: RecordStage::Publishing,
                cause: FailureCause::Publish(cause),
            }),
        }
    }
}
