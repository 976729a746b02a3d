use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, ExtractionError};
use crate::kafka::KeyStrategy;

pub type AttributeMap = HashMap<String, AttributeValue>;

/// A typed attribute value as it appears on the stream wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    S(String),
    N(String),
    B(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    M(AttributeMap),
    L(Vec<AttributeValue>),
    SS(Vec<String>),
    NS(Vec<String>),
    BS(Vec<String>),
    /// Any value that is not a type-tagged object.
    #[serde(untagged)]
    Unrecognized(serde_json::Value),
}

impl AttributeValue {
    /// The plain string form of a scalar string or number, if it has one.
    pub fn as_plain_str(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) | AttributeValue::N(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&AttributeMap> {
        match self {
            AttributeValue::M(map) => Some(map),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventName {
    Insert,
    Modify,
    Remove,
}

/// One invocation's worth of change-stream records.
///
/// Records stay undecoded here so that one malformed record is rejected on
/// its own instead of failing the whole document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "Records")]
    pub records: Vec<serde_json::Value>,
}

impl StreamEvent {
    /// Parses a document that must be an object with a `Records` array.
    pub fn from_json(input: &str) -> crate::Result<Self> {
        serde_json::from_str(input).map_err(|e| Error::InvalidEvent {
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "eventID", default)]
    pub event_id: Option<String>,
    #[serde(rename = "eventName", default)]
    pub event_name: Option<EventName>,
    #[serde(rename = "eventSource", default)]
    pub event_source: Option<String>,
    pub dynamodb: StreamRecordData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamRecordData {
    #[serde(default)]
    pub keys: AttributeMap,
    #[serde(default)]
    pub new_image: Option<AttributeMap>,
    #[serde(default)]
    pub old_image: Option<AttributeMap>,
    #[serde(default)]
    pub sequence_number: Option<String>,
    #[serde(rename = "ApproximateCreationDateTime", default)]
    pub approximate_creation_time: Option<f64>,
}

/// A change record reduced to what the relay needs: the partition key and
/// the post-change image.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub identity_key: String,
    pub event_name: Option<EventName>,
    pub new_image: Option<AttributeMap>,
}

impl StreamRecord {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ExtractionError> {
        StreamRecord::deserialize(value).map_err(|e| ExtractionError::InvalidRecord {
            reason: e.to_string(),
        })
    }

    pub fn is_remove(&self) -> bool {
        self.event_name == Some(EventName::Remove)
    }
}

impl ChangeRecord {
    pub fn new(identity_key: impl Into<String>, new_image: AttributeMap) -> Self {
        Self {
            identity_key: identity_key.into(),
            event_name: Some(EventName::Insert),
            new_image: Some(new_image),
        }
    }

    pub fn from_stream_record(
        record: StreamRecord,
        keys: &KeyStrategy,
    ) -> Result<Self, ExtractionError> {
        let identity_key = keys.resolve(&record.dynamodb.keys)?;

        Ok(Self {
            identity_key,
            event_name: record.event_name,
            new_image: record.dynamodb.new_image,
        })
    }

    pub fn is_remove(&self) -> bool {
        self.event_name == Some(EventName::Remove)
    }
}
