//! Domain ID Types
//!
//! Type-safe wrappers for identifiers used across the crate. Record ids in
//! the store are plain `i64` rowids assigned at ingest; the types here cover
//! the identifiers that cross module boundaries as strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Short opaque correlation id assigned to every MCP tool request.
///
/// Twelve hex characters from a v4 UUID: long enough to be unique within any
/// realistic log window, short enough to read in error output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        let mut buf = Uuid::new_v4().simple().to_string();
        buf.truncate(12);
        Self(buf)
    }

    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
