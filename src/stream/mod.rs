pub mod extractor;
pub mod types;

pub use extractor::{FieldExtractor, FlattenedFields};
pub use types::*;
