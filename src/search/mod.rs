//! # Search Core
//!
//! Searchable documents, the full-text index, the query processor, and the
//! result processor, tied together by [`SearchService`]. The index is
//! rebuilt offline from the store alone and swapped in atomically behind an
//! `Arc`; readers never see a partial index.

pub mod cache;
pub mod documents;
pub mod index;
pub mod query;
pub mod results;
pub mod xref;

pub use documents::{ComplexityLevel, EndpointDocument, OperationType, SchemaDocument};
pub use index::{ScoredHit, SearchIndex, SearchTarget};
pub use query::{SearchSuggestion, StructuredQuery};
pub use results::{
    EndpointSearchResult, Pagination, ProcessedResults, ResultProcessor, SearchClusters,
    SearchFilters,
};
pub use xref::CrossReferenceMap;

use crate::config::SearchConfig;
use crate::errors::Result;
use crate::search::cache::{cache_key, ResultCache};
use crate::storage::{
    CrossReferenceRepository, DbPool, EndpointData, EndpointRepository, SchemaRepository,
    SecuritySchemeRepository,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// Everything derived from one committed document: the index, the record
/// snapshot used for enrichment, and the cross-reference map.
pub struct IndexSnapshot {
    pub document_id: Option<i64>,
    pub index: SearchIndex,
    pub endpoints: HashMap<i64, EndpointData>,
    pub xref: CrossReferenceMap,
    pub processor: ResultProcessor,
}

impl IndexSnapshot {
    /// An empty snapshot, used before the first ingest.
    pub fn empty() -> Self {
        Self {
            document_id: None,
            index: SearchIndex::build(Vec::new(), Vec::new()),
            endpoints: HashMap::new(),
            xref: CrossReferenceMap::default(),
            processor: ResultProcessor::default(),
        }
    }

    /// Rebuild the snapshot for a document from the store alone.
    #[instrument(skip(pool), name = "index_rebuild")]
    pub async fn load(pool: &DbPool, document_id: i64) -> Result<Self> {
        let endpoints = EndpointRepository::new(pool.clone()).list_all(document_id).await?;
        let schemas = SchemaRepository::new(pool.clone()).list_all(document_id).await?;
        let references =
            CrossReferenceRepository::new(pool.clone()).list_for_document(document_id).await?;
        let schemes =
            SecuritySchemeRepository::new(pool.clone()).list_all(document_id).await?;

        let xref = CrossReferenceMap::build(&references, &endpoints);

        let endpoint_docs: Vec<EndpointDocument> =
            endpoints.iter().map(documents::build_endpoint_document).collect();
        let schema_docs: Vec<SchemaDocument> =
            schemas.iter().map(|s| documents::build_schema_document(s, &xref)).collect();

        let index = SearchIndex::build(endpoint_docs, schema_docs);
        let scheme_catalog: BTreeMap<_, _> =
            schemes.into_iter().map(|s| (s.record.name.clone(), s.record)).collect();
        let endpoint_map: HashMap<i64, EndpointData> =
            endpoints.into_iter().map(|e| (e.id, e)).collect();

        info!(
            document_id,
            endpoints = endpoint_map.len(),
            vocabulary = index.vocabulary().len(),
            "Search index snapshot built"
        );

        Ok(Self {
            document_id: Some(document_id),
            index,
            endpoints: endpoint_map,
            xref,
            processor: ResultProcessor::new(scheme_catalog),
        })
    }
}

/// Query-side metadata attached to each response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub query: String,
    pub warnings: Vec<String>,
    pub took_ms: u64,
    pub cache_hit: bool,
}

/// The full response envelope for an endpoint search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<EndpointSearchResult>,
    pub pagination: Pagination,
    pub organization: SearchClusters,
    pub suggestions: Vec<SearchSuggestion>,
    pub metadata: SearchMetadata,
}

/// The search service: swap-on-rebuild index plus the result cache.
pub struct SearchService {
    snapshot: RwLock<Arc<IndexSnapshot>>,
    cache: ResultCache<SearchResponse>,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(config: SearchConfig) -> Self {
        let cache = ResultCache::new(config.cache_size, config.cache_ttl());
        Self { snapshot: RwLock::new(Arc::new(IndexSnapshot::empty())), cache, config }
    }

    /// Install a freshly built snapshot and invalidate the cache.
    pub async fn install(&self, snapshot: IndexSnapshot) {
        let mut guard = self.snapshot.write().await;
        *guard = Arc::new(snapshot);
        drop(guard);
        self.cache.clear();
    }

    /// Current snapshot; cheap clone of the `Arc`.
    pub async fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.snapshot.read().await.clone()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run the full search pipeline for the endpoint corpus.
    #[instrument(skip(self, filters), fields(query = %query_text), name = "search_endpoints")]
    pub async fn search_endpoints(
        &self,
        query_text: &str,
        filters: &Value,
        page: usize,
        per_page: usize,
    ) -> Result<SearchResponse> {
        let started = std::time::Instant::now();
        let per_page = per_page.min(self.config.max_per_page).max(1);
        let page = page.max(1);

        let (parsed_filters, mut warnings) = SearchFilters::from_value(filters);
        let key = cache_key(query_text, &parsed_filters.canonical_json(), page, per_page);

        if let Some(mut cached) = self.cache.get(&key) {
            cached.metadata.cache_hit = true;
            cached.metadata.took_ms = started.elapsed().as_millis() as u64;
            return Ok(cached);
        }
        metrics::counter!("search_queries_total").increment(1);

        let snapshot = self.snapshot().await;
        if snapshot.document_id.is_none() {
            warnings.push("No API document has been ingested yet".to_string());
        }

        let (structured, query_warnings) = query::parse_query(query_text);
        warnings.extend(query_warnings);

        let hits = snapshot.index.search(&structured, SearchTarget::Endpoints);
        let processed = snapshot.processor.process(
            &hits,
            &snapshot.index,
            &snapshot.endpoints,
            &snapshot.xref,
            &parsed_filters,
            page,
            per_page,
        );

        let suggestions = query::build_suggestions(
            query_text,
            &structured,
            processed.pagination.total,
            snapshot.index.vocabulary(),
        );
        if processed.pagination.total == 0 {
            metrics::counter!("search_zero_result_queries_total").increment(1);
        }

        let response = SearchResponse {
            results: processed.results,
            pagination: processed.pagination,
            organization: processed.organization,
            suggestions,
            metadata: SearchMetadata {
                query: query_text.to_string(),
                warnings,
                took_ms: started.elapsed().as_millis() as u64,
                cache_hit: false,
            },
        };

        self.cache.put(key, response.clone());
        Ok(response)
    }
}
