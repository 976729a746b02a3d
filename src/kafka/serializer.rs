use serde::Serialize;
use serde_json::{Map, Value};

use crate::stream::FlattenedFields;

/// A message ready for the broker: partition key plus JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedMessage {
    pub key: String,
    pub payload: String,
}

pub struct JsonSerializer;

impl JsonSerializer {
    /// Encodes `fields` as a compact JSON object with keys in lexicographic
    /// order. Identical fields always produce byte-identical payloads.
    pub fn encode(key: impl Into<String>, fields: FlattenedFields) -> EncodedMessage {
        let object: Map<String, Value> = fields
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();

        EncodedMessage {
            key: key.into(),
            payload: Value::Object(object).to_string(),
        }
    }
}
