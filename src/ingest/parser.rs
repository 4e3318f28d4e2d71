//! # Streaming Specification Parser
//!
//! Incremental JSON/YAML decode of an OpenAPI/Swagger file. The parser never
//! materializes the top-level `paths` or `components.schemas` maps as one
//! tree for JSON input: each entry is deserialized on its own and handed to
//! a [`SpecSink`] immediately, so peak memory tracks the largest single
//! entry rather than the whole document.
//!
//! Format detection goes by file extension first, then by the first
//! non-whitespace byte. Progress events fire at a configurable byte
//! interval while the file is being consumed.

use crate::config::IngestConfig;
use crate::errors::{ApiscopeError, Result};
use crate::ingest::model::{IngestIssue, ParseMetrics, Severity};
use serde::de::{DeserializeSeed, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Receiver for streamed specification entries. The normalizer implements
/// this; tests implement it with plain collectors.
pub trait SpecSink {
    /// The `openapi` / `swagger` version string.
    fn envelope_version(&mut self, version: String);
    /// The `info` object.
    fn info(&mut self, info: Value);
    /// The OpenAPI 3.x `servers` array.
    fn servers(&mut self, servers: Value);
    /// A Swagger 2.0 top-level key that contributes to the base URL
    /// (`host`, `basePath`, `schemes`).
    fn swagger_host_field(&mut self, key: &str, value: Value);
    /// The document-level `security` array.
    fn root_security(&mut self, security: Value);
    /// One `paths` entry.
    fn path_item(&mut self, path: String, item: Value);
    /// One named schema from `components.schemas` or `definitions`.
    fn named_schema(&mut self, name: String, body: Value);
    /// One named scheme from `components.securitySchemes` or
    /// `securityDefinitions`.
    fn security_scheme(&mut self, name: String, body: Value);
    /// A top-level vendor extension (`x-*`).
    fn extension(&mut self, key: String, value: Value);
    /// A recoverable problem found during parsing.
    fn issue(&mut self, severity: Severity, issue: IngestIssue);
}

/// Input format of a specification file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Yaml,
}

/// Result of a successful parse: metrics plus the source content hash.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub metrics: ParseMetrics,
    pub content_hash: String,
    pub file_size: u64,
    pub format: SpecFormat,
}

/// Envelope bookkeeping accumulated during the streaming pass.
#[derive(Debug, Default)]
struct DocState {
    version: Option<String>,
    saw_info: bool,
    saw_paths: bool,
    path_count: usize,
    schema_count: usize,
    security_scheme_count: usize,
}

/// Streaming specification parser.
#[derive(Debug, Clone)]
pub struct SpecParser {
    config: IngestConfig,
}

impl SpecParser {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    /// Parse the file at `path`, feeding entries to `sink` as they decode.
    ///
    /// Returns `Err` only when the document cannot yield `info`, `paths`,
    /// and a well-formed schema map; every recoverable problem is reported
    /// through [`SpecSink::issue`] instead.
    pub fn parse(&self, path: &Path, sink: &mut dyn SpecSink) -> Result<ParseOutcome> {
        let started = std::time::Instant::now();
        let metadata = std::fs::metadata(path).map_err(|e| ApiscopeError::Io {
            source: e,
            context: format!("Failed to stat specification file {}", path.display()),
        })?;
        let file_size = metadata.len();
        if file_size > self.config.max_spec_bytes {
            return Err(ApiscopeError::validation(format!(
                "Specification file is {} bytes, above the configured limit of {}",
                file_size, self.config.max_spec_bytes
            )));
        }

        let format = detect_format(path)?;
        debug!(path = %path.display(), ?format, size = file_size, "Parsing specification");

        let bytes_read = Arc::new(AtomicU64::new(0));
        let mut state = DocState::default();
        let content_hash = match format {
            SpecFormat::Json => {
                self.parse_json(path, sink, &mut state, Arc::clone(&bytes_read))?
            }
            SpecFormat::Yaml => {
                self.parse_yaml(path, sink, &mut state, Arc::clone(&bytes_read))?
            }
        };

        if self.config.validate_envelope && state.version.is_none() {
            sink.issue(
                Severity::Error,
                IngestIssue::new("/", "Missing 'openapi' or 'swagger' version field"),
            );
        }
        if !state.saw_info || !state.saw_paths {
            let mut missing = Vec::new();
            if !state.saw_info {
                missing.push("info");
            }
            if !state.saw_paths {
                missing.push("paths");
            }
            return Err(ApiscopeError::parse(format!(
                "Specification is missing required top-level sections: {}",
                missing.join(", ")
            )));
        }

        let metrics = ParseMetrics {
            bytes_read: bytes_read.load(Ordering::Relaxed).max(file_size),
            duration_ms: started.elapsed().as_millis() as u64,
            path_count: state.path_count,
            schema_count: state.schema_count,
            security_scheme_count: state.security_scheme_count,
        };
        info!(
            path = %path.display(),
            paths = metrics.path_count,
            schemas = metrics.schema_count,
            duration_ms = metrics.duration_ms,
            "Specification parsed"
        );

        Ok(ParseOutcome { metrics, content_hash, file_size, format })
    }

    fn parse_json(
        &self,
        path: &Path,
        sink: &mut dyn SpecSink,
        state: &mut DocState,
        bytes_read: Arc<AtomicU64>,
    ) -> Result<String> {
        let file = std::fs::File::open(path).map_err(|e| ApiscopeError::Io {
            source: e,
            context: format!("Failed to open specification file {}", path.display()),
        })?;
        let reader = CountingReader::new(
            BufReader::new(file),
            Arc::clone(&bytes_read),
            self.config.progress_interval_bytes,
        );
        let mut hashing = HashingReader::new(reader);

        let result = {
            let mut deserializer = serde_json::Deserializer::from_reader(&mut hashing);
            DocumentSeed { sink, state }
                .deserialize(&mut deserializer)
                .and_then(|_| deserializer.end())
        };

        if let Err(e) = result {
            let offset = bytes_read.load(Ordering::Relaxed);
            return Err(ApiscopeError::parse(format!(
                "JSON syntax error near byte {} (line {}, column {}): {}",
                offset,
                e.line(),
                e.column(),
                e
            )));
        }

        // Drain any trailing bytes so the hash covers the whole file.
        let mut rest = Vec::new();
        let _ = hashing.read_to_end(&mut rest);
        Ok(hashing.finish())
    }

    fn parse_yaml(
        &self,
        path: &Path,
        sink: &mut dyn SpecSink,
        state: &mut DocState,
        bytes_read: Arc<AtomicU64>,
    ) -> Result<String> {
        let text = std::fs::read_to_string(path).map_err(|e| ApiscopeError::Io {
            source: e,
            context: format!("Failed to read specification file {}", path.display()),
        })?;
        bytes_read.store(text.len() as u64, Ordering::Relaxed);
        let content_hash = hex::encode(Sha256::digest(text.as_bytes()));

        let root: Value = serde_yaml::from_str(&text).map_err(|e| {
            let location = e
                .location()
                .map(|l| format!("line {}, column {}", l.line(), l.column()))
                .unwrap_or_else(|| "unknown location".to_string());
            ApiscopeError::parse(format!("YAML syntax error at {}: {}", location, e))
        })?;

        let Value::Object(map) = root else {
            return Err(ApiscopeError::parse("Specification root must be a mapping"));
        };

        for (key, value) in map {
            feed_top_level(&key, value, sink, state);
        }
        Ok(content_hash)
    }
}

/// Route one decoded top-level entry into the sink. Shared between the YAML
/// path and tests; the JSON path does the same routing inside its visitor.
fn feed_top_level(key: &str, value: Value, sink: &mut dyn SpecSink, state: &mut DocState) {
    match key {
        "openapi" | "swagger" => {
            if let Some(version) = value.as_str() {
                state.version = Some(version.to_string());
                sink.envelope_version(version.to_string());
            } else {
                sink.issue(
                    Severity::Error,
                    IngestIssue::new(format!("/{key}"), "Version field must be a string"),
                );
            }
        }
        "info" => {
            state.saw_info = value.is_object();
            if state.saw_info {
                sink.info(value);
            } else {
                sink.issue(Severity::Error, IngestIssue::new("/info", "'info' must be an object"));
            }
        }
        "servers" => sink.servers(value),
        "host" | "basePath" | "schemes" => sink.swagger_host_field(key, value),
        "security" => sink.root_security(value),
        "paths" => match value {
            Value::Object(paths) => {
                state.saw_paths = true;
                for (path, item) in paths {
                    state.path_count += 1;
                    sink.path_item(path, item);
                }
            }
            _ => sink.issue(Severity::Error, IngestIssue::new("/paths", "'paths' must be an object")),
        },
        "definitions" => match value {
            Value::Object(schemas) => {
                for (name, body) in schemas {
                    state.schema_count += 1;
                    sink.named_schema(name, body);
                }
            }
            _ => sink.issue(
                Severity::Error,
                IngestIssue::new("/definitions", "'definitions' must be an object"),
            ),
        },
        "securityDefinitions" => match value {
            Value::Object(schemes) => {
                for (name, body) in schemes {
                    state.security_scheme_count += 1;
                    sink.security_scheme(name, body);
                }
            }
            _ => sink.issue(
                Severity::Error,
                IngestIssue::new("/securityDefinitions", "'securityDefinitions' must be an object"),
            ),
        },
        "components" => match value {
            Value::Object(components) => {
                for (component_key, component_value) in components {
                    feed_component(&component_key, component_value, sink, state);
                }
            }
            _ => sink.issue(
                Severity::Error,
                IngestIssue::new("/components", "'components' must be an object"),
            ),
        },
        k if k.starts_with("x-") => sink.extension(k.to_string(), value),
        // tags, externalDocs, webhooks, jsonSchemaDialect: not part of the model
        _ => {}
    }
}

fn feed_component(key: &str, value: Value, sink: &mut dyn SpecSink, state: &mut DocState) {
    match key {
        "schemas" => match value {
            Value::Object(schemas) => {
                for (name, body) in schemas {
                    state.schema_count += 1;
                    sink.named_schema(name, body);
                }
            }
            _ => sink.issue(
                Severity::Error,
                IngestIssue::new("/components/schemas", "'schemas' must be an object"),
            ),
        },
        "securitySchemes" => match value {
            Value::Object(schemes) => {
                for (name, body) in schemes {
                    state.security_scheme_count += 1;
                    sink.security_scheme(name, body);
                }
            }
            _ => sink.issue(
                Severity::Error,
                IngestIssue::new("/components/securitySchemes", "'securitySchemes' must be an object"),
            ),
        },
        _ => {}
    }
}

/// Detect the input format by extension, falling back to the first
/// non-whitespace byte.
pub fn detect_format(path: &Path) -> Result<SpecFormat> {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("json") => return Ok(SpecFormat::Json),
        Some("yaml") | Some("yml") => return Ok(SpecFormat::Yaml),
        _ => {}
    }

    let file = std::fs::File::open(path).map_err(|e| ApiscopeError::Io {
        source: e,
        context: format!("Failed to open specification file {}", path.display()),
    })?;
    let mut reader = BufReader::new(file);
    let mut buf = [0u8; 1];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Err(ApiscopeError::parse("Specification file is empty"));
        }
        if !buf[0].is_ascii_whitespace() {
            return Ok(if buf[0] == b'{' || buf[0] == b'[' {
                SpecFormat::Json
            } else {
                SpecFormat::Yaml
            });
        }
    }
}

/// Reader wrapper that counts consumed bytes and emits progress events.
struct CountingReader<R> {
    inner: R,
    count: Arc<AtomicU64>,
    interval: u64,
    next_emit: u64,
}

impl<R: Read> CountingReader<R> {
    fn new(inner: R, count: Arc<AtomicU64>, interval: u64) -> Self {
        Self { inner, count, interval, next_emit: interval }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        let total = self.count.fetch_add(n as u64, Ordering::Relaxed) + n as u64;
        if total >= self.next_emit {
            info!(bytes_read = total, "Specification parse progress");
            metrics::counter!("ingest_progress_events_total").increment(1);
            while self.next_emit <= total {
                self.next_emit += self.interval;
            }
        }
        Ok(n)
    }
}

/// Reader wrapper that hashes everything read through it.
struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> HashingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, hasher: Sha256::new() }
    }

    fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// Seed that streams the top-level document map into the sink without
/// buffering `paths` or `components.schemas` as whole values.
struct DocumentSeed<'a> {
    sink: &'a mut dyn SpecSink,
    state: &'a mut DocState,
}

impl<'de> DeserializeSeed<'de> for DocumentSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for DocumentSeed<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an OpenAPI document object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<(), A::Error> {
        while let Some(key) = access.next_key::<String>()? {
            match key.as_str() {
                "paths" => {
                    self.state.saw_paths = true;
                    let count = access.next_value_seed(NamedEntries {
                        handler: &mut |name: String, value: Value| {
                            self.sink.path_item(name, value)
                        },
                    })?;
                    self.state.path_count += count;
                }
                "definitions" => {
                    let count = access.next_value_seed(NamedEntries {
                        handler: &mut |name: String, value: Value| {
                            self.sink.named_schema(name, value)
                        },
                    })?;
                    self.state.schema_count += count;
                }
                "securityDefinitions" => {
                    let count = access.next_value_seed(NamedEntries {
                        handler: &mut |name: String, value: Value| {
                            self.sink.security_scheme(name, value)
                        },
                    })?;
                    self.state.security_scheme_count += count;
                }
                "components" => {
                    access.next_value_seed(ComponentsSeed {
                        sink: &mut *self.sink,
                        state: &mut *self.state,
                    })?;
                }
                _ => {
                    let value: Value = access.next_value()?;
                    feed_top_level(&key, value, self.sink, self.state);
                }
            }
        }
        Ok(())
    }
}

/// Seed that streams `components`, dispatching `schemas` and
/// `securitySchemes` entry by entry.
struct ComponentsSeed<'a> {
    sink: &'a mut dyn SpecSink,
    state: &'a mut DocState,
}

impl<'de> DeserializeSeed<'de> for ComponentsSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for ComponentsSeed<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an OpenAPI components object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<(), A::Error> {
        while let Some(key) = access.next_key::<String>()? {
            match key.as_str() {
                "schemas" => {
                    let count = access.next_value_seed(NamedEntries {
                        handler: &mut |name: String, value: Value| {
                            self.sink.named_schema(name, value)
                        },
                    })?;
                    self.state.schema_count += count;
                }
                "securitySchemes" => {
                    let count = access.next_value_seed(NamedEntries {
                        handler: &mut |name: String, value: Value| {
                            self.sink.security_scheme(name, value)
                        },
                    })?;
                    self.state.security_scheme_count += count;
                }
                _ => {
                    access.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(())
    }
}

/// Seed that visits a map of named entries, handing each (name, value) pair
/// to a handler as soon as it decodes. Returns the entry count.
struct NamedEntries<'a> {
    handler: &'a mut dyn FnMut(String, Value),
}

impl<'de> DeserializeSeed<'de> for NamedEntries<'_> {
    type Value = usize;

    fn deserialize<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<usize, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for NamedEntries<'_> {
    type Value = usize;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of named entries")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<usize, A::Error> {
        let mut count = 0;
        while let Some(name) = access.next_key::<String>()? {
            let value: Value = access.next_value()?;
            (self.handler)(name, value);
            count += 1;
        }
        Ok(count)
    }
}
