use std::collections::BTreeMap;
use tracing::trace;

use super::types::{AttributeMap, AttributeValue, ChangeRecord};
use crate::error::ExtractionError;

/// Field name to plain string value, iterated in key order.
pub type FlattenedFields = BTreeMap<String, String>;

/// Flattens the map attribute at a fixed path inside a record's new image.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    path: Vec<String>,
}

impl FieldExtractor {
    /// `path` is dot-separated, e.g. `land_obs_hourly` or `payload.hourly`.
    pub fn new(path: &str) -> Self {
        Self {
            path: path.split('.').map(str::to_string).collect(),
        }
    }

    pub fn path(&self) -> String {
        self.path.join(".")
    }

    pub fn extract(&self, record: &ChangeRecord) -> Result<FlattenedFields, ExtractionError> {
        let image = record.new_image.as_ref().ok_or_else(|| ExtractionError::MissingField {
            path: "NewImage".to_string(),
        })?;

        let collection = self.locate(image)?;

        let mut fields = FlattenedFields::new();
        for (name, value) in collection {
            let text = value.as_plain_str().ok_or_else(|| ExtractionError::UnsupportedValueShape {
                field: format!("{}.{}", self.path(), name),
            })?;
            fields.insert(name.clone(), text.to_string());
        }

        trace!(key = %record.identity_key, fields = fields.len(), "Flattened record fields");
        Ok(fields)
    }

    fn locate<'a>(&self, image: &'a AttributeMap) -> Result<&'a AttributeMap, ExtractionError> {
        let mut current = image;

        for (depth, segment) in self.path.iter().enumerate() {
            let walked = self.path[..=depth].join(".");
            let value = current
                .get(segment)
                .ok_or_else(|| ExtractionError::MissingField { path: walked.clone() })?;

            current = match value {
                AttributeValue::M(map) => map,
                _ => return Err(ExtractionError::UnsupportedValueShape { field: walked }),
            };
        }

        Ok(current)
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new("land_obs_hourly")
    }
}
