//! # Specification Ingest Pipeline
//!
//! Turns an OpenAPI/Swagger file into canonical records ready for storage.
//! The pipeline runs strictly left to right: the streaming parser feeds the
//! normalizer entry by entry, the normalizer produces canonical records, and
//! a set of sub-passes (reference resolution, usage inversion, consistency
//! validation) finish the document before it is committed to the store in a
//! single transaction.
//!
//! Structural problems become errors, stylistic problems and circular
//! references become warnings. Neither is thrown; both are aggregated on the
//! [`model::NormalizedDocument`].

pub mod consistency;
pub mod model;
pub mod normalizer;
pub mod parser;
pub mod references;

pub use model::{IngestIssue, NormalizedDocument, ParseMetrics};
pub use normalizer::Normalizer;
pub use parser::{ParseOutcome, SpecFormat, SpecParser, SpecSink};

use crate::errors::Result;
use std::path::Path;

/// Run the full ingest pipeline against a specification file.
///
/// Convenience wrapper used by the CLI and tests: parse, normalize, and run
/// every finishing sub-pass. The caller commits the returned document to the
/// store.
pub fn ingest_file(path: &Path, config: &crate::config::IngestConfig) -> Result<NormalizedDocument> {
    let parser = SpecParser::new(config.clone());
    let mut normalizer = Normalizer::new(path);
    let outcome = parser.parse(path, &mut normalizer)?;
    Ok(normalizer.finish(outcome))
}
