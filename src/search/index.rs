//! # Full-Text Search Index
//!
//! In-memory inverted index over searchable documents: per-field term
//! frequencies, per-field document lengths, and a corpus vocabulary. Scoring
//! is BM25 (k1 = 1.2, b = 0.75), deterministic under a fixed corpus. The
//! index is immutable once built; rebuilds produce a new value that the
//! owner swaps in atomically behind an `Arc`.

use crate::search::documents::{tokenize, EndpointDocument, SchemaDocument};
use crate::search::query::{closest_terms, QueryClause, QueryField, StructuredQuery};
use std::collections::{BTreeSet, HashMap};

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;
/// Score multiplier applied to fuzzy expansions of a term.
const FUZZY_FACTOR: f64 = 0.8;
/// Maximum vocabulary expansions per fuzzy term.
const FUZZY_EXPANSIONS: usize = 3;

/// Which document corpus a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTarget {
    Endpoints,
    Schemas,
}

/// One scored hit; `doc` indexes into the corresponding document vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredHit {
    pub doc: u32,
    pub score: f64,
}

#[derive(Debug, Clone)]
struct Posting {
    doc: u32,
    tf: u32,
}

/// Inverted index over one corpus of multi-field documents.
#[derive(Debug, Default)]
struct FieldIndex {
    /// (field, term) → postings ordered by doc id.
    postings: HashMap<(&'static str, String), Vec<Posting>>,
    /// (field, doc) → token count.
    field_lengths: HashMap<(&'static str, u32), u32>,
    /// field → average token count across documents that have the field.
    average_lengths: HashMap<&'static str, f64>,
    /// Lowercased raw field text per document, for phrase verification.
    field_texts: Vec<HashMap<&'static str, String>>,
    doc_count: usize,
}

impl FieldIndex {
    fn build(docs: Vec<Vec<(&'static str, String)>>) -> Self {
        let mut index = FieldIndex { doc_count: docs.len(), ..Default::default() };
        let mut totals: HashMap<&'static str, (u64, u64)> = HashMap::new();

        for (doc_id, fields) in docs.into_iter().enumerate() {
            let doc_id = doc_id as u32;
            let mut texts = HashMap::new();
            for (field, text) in fields {
                let tokens = tokenize(&text);
                let entry = totals.entry(field).or_default();
                entry.0 += tokens.len() as u64;
                entry.1 += 1;
                index.field_lengths.insert((field, doc_id), tokens.len() as u32);

                let mut frequencies: HashMap<String, u32> = HashMap::new();
                for token in tokens {
                    *frequencies.entry(token).or_default() += 1;
                }
                for (term, tf) in frequencies {
                    index
                        .postings
                        .entry((field, term))
                        .or_default()
                        .push(Posting { doc: doc_id, tf });
                }
                texts.insert(field, text.to_lowercase());
            }
            index.field_texts.push(texts);
        }

        for (field, (tokens, docs)) in totals {
            index.average_lengths.insert(field, tokens as f64 / docs.max(1) as f64);
        }
        for postings in index.postings.values_mut() {
            postings.sort_by_key(|p| p.doc);
        }
        index
    }

    /// BM25-scored matches for one exact term in one field.
    fn term_scores(&self, field: &'static str, term: &str) -> HashMap<u32, f64> {
        let Some(postings) = self.postings.get(&(field, term.to_string())) else {
            return HashMap::new();
        };

        let n = self.doc_count as f64;
        let df = postings.len() as f64;
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
        let average = self.average_lengths.get(field).copied().unwrap_or(1.0).max(1.0);

        postings
            .iter()
            .map(|posting| {
                let length =
                    self.field_lengths.get(&(field, posting.doc)).copied().unwrap_or(0) as f64;
                let tf = posting.tf as f64;
                let normalized =
                    tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * length / average));
                (posting.doc, idf * normalized)
            })
            .collect()
    }

    fn field_text(&self, doc: u32, field: &'static str) -> Option<&str> {
        self.field_texts.get(doc as usize).and_then(|m| m.get(field)).map(String::as_str)
    }
}

/// The search index: one [`FieldIndex`] per corpus plus the shared
/// vocabulary used for fuzzy matching and suggestions.
#[derive(Debug)]
pub struct SearchIndex {
    pub endpoint_docs: Vec<EndpointDocument>,
    pub schema_docs: Vec<SchemaDocument>,
    endpoint_index: FieldIndex,
    schema_index: FieldIndex,
    vocabulary: BTreeSet<String>,
}

impl SearchIndex {
    /// Build the index from searchable documents. Rebuildable offline from
    /// the store alone: the inputs come straight from stored records.
    pub fn build(endpoint_docs: Vec<EndpointDocument>, schema_docs: Vec<SchemaDocument>) -> Self {
        let endpoint_fields: Vec<Vec<(&'static str, String)>> =
            endpoint_docs.iter().map(endpoint_field_set).collect();
        let schema_fields: Vec<Vec<(&'static str, String)>> =
            schema_docs.iter().map(schema_field_set).collect();

        let endpoint_index = FieldIndex::build(endpoint_fields);
        let schema_index = FieldIndex::build(schema_fields);

        let mut vocabulary = BTreeSet::new();
        for (_, term) in endpoint_index.postings.keys() {
            vocabulary.insert(term.clone());
        }
        for (_, term) in schema_index.postings.keys() {
            vocabulary.insert(term.clone());
        }

        tracing::debug!(
            endpoints = endpoint_docs.len(),
            schemas = schema_docs.len(),
            vocabulary = vocabulary.len(),
            "Search index built"
        );

        Self { endpoint_docs, schema_docs, endpoint_index, schema_index, vocabulary }
    }

    pub fn vocabulary(&self) -> &BTreeSet<String> {
        &self.vocabulary
    }

    /// Evaluate a structured query: OR across groups (max score), implicit
    /// AND within a group (summed scores), negations subtract.
    pub fn search(&self, query: &StructuredQuery, target: SearchTarget) -> Vec<ScoredHit> {
        let mut merged: HashMap<u32, f64> = HashMap::new();

        for group in &query.groups {
            if let Some(group_scores) = self.eval_group(group, target) {
                for (doc, score) in group_scores {
                    let entry = merged.entry(doc).or_insert(f64::MIN);
                    if score > *entry {
                        *entry = score;
                    }
                }
            }
        }

        let mut hits: Vec<ScoredHit> =
            merged.into_iter().map(|(doc, score)| ScoredHit { doc, score }).collect();
        hits.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(a.doc.cmp(&b.doc))
        });
        hits
    }

    fn eval_group(
        &self,
        group: &[QueryClause],
        target: SearchTarget,
    ) -> Option<HashMap<u32, f64>> {
        let mut accumulated: Option<HashMap<u32, f64>> = None;

        for clause in group.iter().filter(|c| !c.negated) {
            let matches = self.clause_matches(clause, target);
            accumulated = Some(match accumulated {
                None => matches,
                Some(previous) => intersect_sum(previous, matches),
            });
            if accumulated.as_ref().is_some_and(HashMap::is_empty) {
                break;
            }
        }

        // A group of only negations matches nothing rather than everything.
        let mut scores = accumulated?;

        for clause in group.iter().filter(|c| c.negated) {
            let excluded = self.clause_matches(clause, target);
            scores.retain(|doc, _| !excluded.contains_key(doc));
        }

        Some(scores)
    }

    fn clause_matches(&self, clause: &QueryClause, target: SearchTarget) -> HashMap<u32, f64> {
        let index = match target {
            SearchTarget::Endpoints => &self.endpoint_index,
            SearchTarget::Schemas => &self.schema_index,
        };
        let Some(field) = resolve_field(clause.field, target) else {
            return HashMap::new();
        };

        let tokens = tokenize(&clause.value);
        if tokens.is_empty() {
            return HashMap::new();
        }

        let mut scores: Option<HashMap<u32, f64>> = None;
        for token in &tokens {
            let token_scores = if clause.fuzzy {
                self.fuzzy_term_scores(index, field, token)
            } else {
                index.term_scores(field, token)
            };
            scores = Some(match scores {
                None => token_scores,
                Some(previous) => intersect_sum(previous, token_scores),
            });
        }
        let mut scores = scores.unwrap_or_default();

        if clause.phrase {
            let needle = clause.value.to_lowercase();
            scores.retain(|doc, _| {
                index.field_text(*doc, field).is_some_and(|text| text.contains(&needle))
            });
        }

        scores
    }

    /// Exact matches plus vocabulary expansions within edit distance 2,
    /// each expansion scored at a fixed fraction of an exact match.
    fn fuzzy_term_scores(
        &self,
        index: &FieldIndex,
        field: &'static str,
        term: &str,
    ) -> HashMap<u32, f64> {
        let mut scores = index.term_scores(field, term);
        for expansion in closest_terms(term, &self.vocabulary, FUZZY_EXPANSIONS) {
            for (doc, score) in index.term_scores(field, &expansion) {
                let fuzzy_score = score * FUZZY_FACTOR;
                let entry = scores.entry(doc).or_insert(0.0);
                if fuzzy_score > *entry {
                    *entry = fuzzy_score;
                }
            }
        }
        scores
    }
}

fn intersect_sum(left: HashMap<u32, f64>, right: HashMap<u32, f64>) -> HashMap<u32, f64> {
    left.into_iter()
        .filter_map(|(doc, score)| right.get(&doc).map(|other| (doc, score + other)))
        .collect()
}

/// Default (unscoped) clauses search the weighted `searchable_text` field;
/// scoped clauses map to the corpus-specific field.
fn resolve_field(field: Option<QueryField>, target: SearchTarget) -> Option<&'static str> {
    let Some(field) = field else {
        return Some("searchable_text");
    };
    match target {
        SearchTarget::Endpoints => Some(match field {
            QueryField::Path => "endpoint_path",
            QueryField::Method => "http_method",
            QueryField::Tag => "tags",
            QueryField::Auth => "security_requirements",
            QueryField::Param => "parameter_names",
            QueryField::Response => "response_schemas",
            QueryField::Status => "status_codes",
        }),
        SearchTarget::Schemas => match field {
            QueryField::Param => Some("property_names"),
            QueryField::Response => Some("nested_schemas"),
            _ => None,
        },
    }
}

fn endpoint_field_set(doc: &EndpointDocument) -> Vec<(&'static str, String)> {
    vec![
        ("searchable_text", doc.searchable_text.clone()),
        ("endpoint_path", doc.endpoint_path.clone()),
        ("http_method", doc.http_method.clone()),
        ("operation_summary", doc.operation_summary.clone()),
        ("operation_description", doc.operation_description.clone()),
        ("operation_id", doc.operation_id.clone()),
        ("path_segments", doc.path_segments.clone()),
        ("parameter_names", doc.parameter_names.clone()),
        ("tags", doc.tags.clone()),
        ("security_requirements", doc.security_requirements.clone()),
        ("response_schemas", doc.response_schemas.clone()),
        ("status_codes", doc.status_codes.clone()),
        ("content_types", doc.content_types.clone()),
        ("resource_name", doc.resource_name.clone()),
        ("keywords", doc.keywords.join(" ")),
    ]
}

fn schema_field_set(doc: &SchemaDocument) -> Vec<(&'static str, String)> {
    vec![
        ("searchable_text", doc.searchable_text.clone()),
        ("schema_name", doc.schema_name.clone()),
        ("schema_type", doc.schema_type.clone()),
        ("description", doc.description.clone()),
        ("property_names", doc.property_names.clone()),
        ("nested_schemas", doc.nested_schemas.clone()),
        ("used_in_endpoints", doc.used_in_endpoints.clone()),
        ("validation_rules", doc.validation_rules.clone()),
        ("keywords", doc.keywords.join(" ")),
    ]
}
