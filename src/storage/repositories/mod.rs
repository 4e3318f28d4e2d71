//! Repository modules for data access
//!
//! Read-side access to the canonical records. Records are immutable once
//! written: the only write path is [`crate::storage::writer`], which commits
//! one document per transaction. Each repository handles lookups for a
//! single record type.

pub mod api_document;
pub mod cross_reference;
pub mod endpoint;
pub mod schema;
pub mod security_scheme;

pub use api_document::{ApiDocumentData, ApiDocumentRepository};
pub use cross_reference::{CrossReferenceData, CrossReferenceRepository};
pub use endpoint::{EndpointData, EndpointRepository};
pub use schema::{SchemaData, SchemaRepository};
pub use security_scheme::{SecuritySchemeData, SecuritySchemeRepository};
