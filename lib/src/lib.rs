pub mod admission;
pub mod aggregation;
pub mod config;
pub mod derived_fields;
pub mod error;
pub mod log_parser;
pub mod pipeline;
pub mod record_schema;
pub mod records;
pub mod table;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod variant_comparator;

pub use error::{AnalysisError, Result};
