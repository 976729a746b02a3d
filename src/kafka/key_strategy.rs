use crate::error::ExtractionError;
use crate::stream::AttributeMap;
use tracing::debug;

/// How the partition key is derived from a stream record's `Keys`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStrategy {
    Attribute(String),
    Composite(Vec<String>),
}

impl KeyStrategy {
    pub fn from_attributes(attributes: &[String]) -> Self {
        match attributes {
            [single] => KeyStrategy::Attribute(single.clone()),
            _ => KeyStrategy::Composite(attributes.to_vec()),
        }
    }

    pub fn resolve(&self, keys: &AttributeMap) -> Result<String, ExtractionError> {
        match self {
            KeyStrategy::Attribute(name) => extract_key_value(keys, name),

            KeyStrategy::Composite(names) => {
                if names.is_empty() {
                    return Err(ExtractionError::MissingField {
                        path: "Keys".to_string(),
                    });
                }

                let mut key_parts = Vec::with_capacity(names.len());
                for name in names {
                    key_parts.push(extract_key_value(keys, name)?);
                }
                Ok(key_parts.join(":"))
            }
        }
    }
}

fn extract_key_value(keys: &AttributeMap, name: &str) -> Result<String, ExtractionError> {
    match keys.get(name) {
        Some(value) => value
            .as_plain_str()
            .map(str::to_string)
            .ok_or_else(|| ExtractionError::UnsupportedValueShape {
                field: format!("Keys.{}", name),
            }),
        None => {
            debug!("Key attribute '{}' not found in record", name);
            Err(ExtractionError::MissingField {
                path: format!("Keys.{}", name),
            })
        }
    }
}

impl Default for KeyStrategy {
    fn default() -> Self {
        KeyStrategy::Attribute("id".to_string())
    }
}
