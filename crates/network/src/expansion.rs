//! Node expansion engine
//!
//! Grows the graph around one work: its cached references and the works
//! citing it, each bounded and filtered against the library. Citing works
//! are fetched at most once per work; an empty fetched set is authoritative.

use crate::graph::{GraphEdge, GraphNode, NodeKind, UNKNOWN_TITLE};
use crate::remote::RemoteWorks;
use crate::session::GraphSession;
use citeforge_common::db::models::Work;
use citeforge_common::db::CitationStore;
use citeforge_common::errors::{AppError, Result};
use citeforge_common::identifiers::normalize_work_id;
use citeforge_common::metrics;
use citeforge_common::openalex::WorkRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

/// Bounds for one expansion
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ExpandRequest {
    #[validate(length(min = 1, max = 256))]
    pub work_id: String,

    #[validate(range(max = 500))]
    pub max_refs: usize,

    #[validate(range(max = 500))]
    pub max_citing: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionStats {
    /// Cached references before filtering
    pub references_total: usize,
    /// Citing works known for this node before filtering
    pub citing_total: usize,
    /// Citing set came from cache
    pub citing_cached: bool,
    /// External works whose details were fetched in this call
    pub details_fetched: usize,
    /// External works labelled with the placeholder title
    pub details_missing: usize,
    pub remote_calls: usize,
    pub cache_failures: usize,
}

/// External neighbours of one work
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighborhood {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub stats: ExpansionStats,
}

/// Details of a single work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkDetails {
    pub id: String,
    pub title: String,
    pub authors: Option<String>,
    pub year: Option<i32>,
    pub doi: Option<String>,
    pub cited_by_count: Option<i32>,
    /// Served from the work detail cache
    pub cached: bool,
}

impl WorkDetails {
    fn from_work(work: &Work, cached: bool) -> Self {
        Self {
            id: work.id.clone(),
            title: work.title.clone().unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            authors: work.authors.clone(),
            year: work.publication_year,
            doi: work.doi.clone(),
            cited_by_count: work.cited_by_count,
            cached,
        }
    }

    fn from_record(record: &WorkRecord, cached: bool) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone().unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            authors: record.author_summary(),
            year: record.publication_year,
            doi: record.doi.clone(),
            cited_by_count: record.cited_by_count,
            cached,
        }
    }

    fn node(&self, kind: NodeKind) -> GraphNode {
        GraphNode {
            id: self.id.clone(),
            local_key: None,
            title: self.title.clone(),
            authors: self.authors.clone(),
            year: self.year,
            doi: self.doi.clone(),
            node_type: kind,
        }
    }
}

/// Record stored for an id the service did not return, so later lookups
/// are cache hits instead of repeated remote calls
fn unknown_work(id: &str) -> WorkRecord {
    WorkRecord::new(id)
}

/// A cached record with no bibliographic data at all
fn is_unknown(work: &Work) -> bool {
    work.title.is_none()
        && work.doi.is_none()
        && work.publication_year.is_none()
        && work.authors.is_none()
        && work.cited_by_count.is_none()
}

fn placeholder_node(id: &str, kind: NodeKind) -> GraphNode {
    GraphNode {
        id: id.to_string(),
        local_key: None,
        title: UNKNOWN_TITLE.to_string(),
        authors: None,
        year: None,
        doi: None,
        node_type: kind,
    }
}

/// Cache-first neighbour discovery around single works
#[derive(Clone)]
pub struct ExpansionEngine {
    store: Arc<dyn CitationStore>,
    remote: RemoteWorks,
}

impl ExpansionEngine {
    pub fn new(store: Arc<dyn CitationStore>, remote: RemoteWorks) -> Self {
        Self { store, remote }
    }

    /// Bounded external references and citers of `request.work_id`.
    ///
    /// Edges are `work -> reference` and `citer -> work`. Library works are
    /// never returned as nodes.
    #[instrument(skip_all, fields(work_id = %request.work_id, max_refs = request.max_refs, max_citing = request.max_citing))]
    pub async fn expand(&self, request: &ExpandRequest, session: &GraphSession) -> Result<Neighborhood> {
        request.validate().map_err(|e| AppError::Validation {
            message: e.to_string(),
            field: None,
        })?;
        let work_id = normalize_work_id(&request.work_id).ok_or_else(|| AppError::missing("work_id"))?;
        let mut stats = ExpansionStats::default();

        self.ensure_work(&work_id, &mut stats).await?;

        let references = self.store.referenced_works(&work_id).await?;
        stats.references_total = references.len();
        let references: Vec<String> = references
            .into_iter()
            .filter(|r| *r != work_id && !session.contains(r))
            .take(request.max_refs)
            .collect();

        let citing = self.citing_works(&work_id, request.max_citing, &mut stats).await?;
        stats.citing_total = citing.len();
        let citing: Vec<String> = citing
            .into_iter()
            .filter(|c| *c != work_id && !session.contains(c))
            .take(request.max_citing)
            .collect();

        let mut external: Vec<String> = Vec::with_capacity(references.len() + citing.len());
        let mut seen = HashSet::new();
        for id in references.iter().chain(citing.iter()) {
            if seen.insert(id.as_str()) {
                external.push(id.clone());
            }
        }

        let details = self.details(&external, &mut stats).await?;
        let nodes = external
            .iter()
            .map(|id| match details.get(id) {
                Some(detail) => detail.node(NodeKind::External),
                None => placeholder_node(id, NodeKind::External),
            })
            .collect();

        let mut edges: Vec<GraphEdge> = references.iter().map(|r| GraphEdge::cites(work_id.as_str(), r.as_str())).collect();
        edges.extend(citing.iter().map(|c| GraphEdge::cites(c.as_str(), work_id.as_str())));

        tracing::info!(
            references = references.len(),
            citing = citing.len(),
            remote_calls = stats.remote_calls,
            citing_cached = stats.citing_cached,
            "Expanded node"
        );

        Ok(Neighborhood { nodes, edges, stats })
    }

    /// Every reference of `work_id`, tagged library or external
    #[instrument(skip(self, session))]
    pub async fn references(&self, work_id: &str, session: &GraphSession) -> Result<Neighborhood> {
        let work_id = normalize_work_id(work_id).ok_or_else(|| AppError::missing("work_id"))?;
        let mut stats = ExpansionStats::default();

        self.ensure_work(&work_id, &mut stats).await?;

        let references = self.store.referenced_works(&work_id).await?;
        stats.references_total = references.len();

        let details = self.details(&references, &mut stats).await?;
        let mut nodes = Vec::with_capacity(references.len());
        let mut edges = Vec::with_capacity(references.len());

        for id in &references {
            let kind = if session.contains(id) { NodeKind::Library } else { NodeKind::External };
            nodes.push(match details.get(id) {
                Some(detail) => detail.node(kind),
                None => placeholder_node(id, kind),
            });
            edges.push(GraphEdge::cites(work_id.as_str(), id.as_str()));
        }

        Ok(Neighborhood { nodes, edges, stats })
    }

    /// Title, year and authors for one work, from cache or the service
    #[instrument(skip(self))]
    pub async fn work_details(&self, work_id: &str) -> Result<WorkDetails> {
        let work_id = normalize_work_id(work_id).ok_or_else(|| AppError::missing("work_id"))?;

        let cached = self.store.find_works(std::slice::from_ref(&work_id)).await?;
        if let Some(work) = cached.get(&work_id) {
            metrics::record_cache(true, "works");
            if is_unknown(work) {
                return Err(AppError::WorkNotFound { id: work_id });
            }
            return Ok(WorkDetails::from_work(work, true));
        }
        metrics::record_cache(false, "works");

        let found = self
            .remote
            .by_ids(std::slice::from_ref(&work_id))
            .await?
            .into_iter()
            .find(|r| r.id == work_id);

        let Some(record) = found else {
            if let Err(e) = self.store.save_work(&unknown_work(&work_id), None).await {
                tracing::error!(work_id = %work_id, error = %e, "Failed to cache unknown work");
                metrics::record_cache_write_failure("works");
            }
            return Err(AppError::WorkNotFound { id: work_id });
        };

        if let Err(e) = self.store.save_work(&record, None).await {
            tracing::error!(work_id = %record.id, error = %e, "Failed to cache work");
            metrics::record_cache_write_failure("works");
        }

        Ok(WorkDetails::from_record(&record, false))
    }

    /// Make sure the expanded work itself is cached so its references can be read.
    /// A failed fetch leaves the reference side empty for this call. Once the
    /// citing set is cached the node is warm and no fetch is attempted.
    async fn ensure_work(&self, work_id: &str, stats: &mut ExpansionStats) -> Result<()> {
        let id = [work_id.to_string()];
        if !self.store.find_works(&id).await?.is_empty() {
            return Ok(());
        }
        if self.store.citing_works(work_id).await?.is_some() {
            tracing::debug!(work_id = %work_id, "Expanded work not cached, citing set warm");
            return Ok(());
        }

        stats.remote_calls += 1;
        match self.remote.by_ids(&id).await {
            Ok(records) => match records.iter().find(|r| r.id == work_id) {
                Some(record) => self.cache_record(record, stats).await,
                None => self.cache_record(&unknown_work(work_id), stats).await,
            },
            Err(e) => {
                tracing::warn!(work_id = %work_id, error = %e, "Could not fetch expanded work");
            }
        }
        Ok(())
    }

    /// Cached citing set, or a single bounded fetch that fills the cache
    async fn citing_works(&self, work_id: &str, limit: usize, stats: &mut ExpansionStats) -> Result<Vec<String>> {
        if let Some(cached) = self.store.citing_works(work_id).await? {
            metrics::record_cache(true, "citing");
            stats.citing_cached = true;
            return Ok(cached);
        }
        metrics::record_cache(false, "citing");

        if limit == 0 {
            return Ok(Vec::new());
        }

        stats.remote_calls += 1;
        let records = match self.remote.citing(work_id, limit).await {
            Ok(records) => records,
            Err(e) => {
                // Not marked as fetched, so the next expansion retries
                tracing::warn!(work_id = %work_id, error = %e, "Citing works lookup failed");
                return Ok(Vec::new());
            }
        };

        let mut seen = HashSet::new();
        let ids: Vec<String> = records
            .iter()
            .map(|r| r.id.clone())
            .filter(|id| id != work_id && seen.insert(id.clone()))
            .collect();

        if let Err(e) = self.store.save_citing_works(work_id, &ids).await {
            tracing::error!(work_id = %work_id, error = %e, "Failed to cache citing works");
            metrics::record_cache_write_failure("citing");
            stats.cache_failures += 1;
        }

        for record in &records {
            self.cache_record(record, stats).await;
        }

        Ok(ids)
    }

    /// Details for `ids`: cache first, then id batches of at most 50.
    /// Fetched records are cached with their own references; ids a successful
    /// batch did not return are cached as unknown works.
    async fn details(&self, ids: &[String], stats: &mut ExpansionStats) -> Result<HashMap<String, WorkDetails>> {
        let cached = self.store.find_works(ids).await?;
        let mut details: HashMap<String, WorkDetails> = cached
            .values()
            .filter(|w| !is_unknown(w))
            .map(|w| (w.id.clone(), WorkDetails::from_work(w, true)))
            .collect();

        let missing: Vec<String> = ids.iter().filter(|id| !cached.contains_key(*id)).cloned().collect();
        metrics::record_cache_many(true, "works", cached.len());
        metrics::record_cache_many(false, "works", missing.len());

        for batch in missing.chunks(self.remote.batch_size()) {
            stats.remote_calls += 1;
            match self.remote.by_ids(batch).await {
                Ok(records) => {
                    for record in records {
                        self.cache_record(&record, stats).await;
                        stats.details_fetched += 1;
                        details.insert(record.id.clone(), WorkDetails::from_record(&record, false));
                    }
                    for id in batch.iter().filter(|id| !details.contains_key(*id)) {
                        self.cache_record(&unknown_work(id), stats).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(batch_size = batch.len(), error = %e, "Detail batch failed");
                }
            }
        }

        stats.details_missing = ids.iter().filter(|id| !details.contains_key(*id)).count();
        Ok(details)
    }

    async fn cache_record(&self, record: &WorkRecord, stats: &mut ExpansionStats) {
        if let Err(e) = self.store.save_work(record, None).await {
            tracing::error!(work_id = %record.id, error = %e, "Failed to cache work");
            metrics::record_cache_write_failure("works");
            stats.cache_failures += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeforge_common::db::MemoryStore;
    use citeforge_common::openalex::{Endpoint, MockBibliographicClient};
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        mock: Arc<MockBibliographicClient>,
        engine: ExpansionEngine,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mock = Arc::new(MockBibliographicClient::new());
        let remote = RemoteWorks::new(mock.clone(), Duration::from_secs(5), 50);
        let engine = ExpansionEngine::new(store.clone(), remote);
        Fixture { store, mock, engine }
    }

    fn request(work_id: &str, max_refs: usize, max_citing: usize) -> ExpandRequest {
        ExpandRequest {
            work_id: work_id.to_string(),
            max_refs,
            max_citing,
        }
    }

    #[tokio::test]
    async fn test_empty_work_id_is_rejected_before_any_access() {
        let f = fixture();
        let err = f.engine.expand(&request("  ", 20, 20), &GraphSession::default()).await.unwrap_err();
        assert!(matches!(err, AppError::MissingField { .. }));
        assert_eq!(f.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_bounds_are_rejected_before_any_access() {
        let f = fixture();
        f.mock.insert(WorkRecord::new("W1"));

        let err = f.engine.expand(&request("W1", 501, 20), &GraphSession::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = f.engine.expand(&request("W1", 20, 501), &GraphSession::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let long_id = "W".repeat(257);
        let err = f.engine.expand(&request(&long_id, 20, 20), &GraphSession::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        assert_eq!(f.mock.call_count(), 0);
        assert!(f.engine.expand(&request("W1", 500, 500), &GraphSession::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_but_fetched_citing_set_is_not_requeried() {
        let f = fixture();
        f.store.save_work(&WorkRecord::new("W1"), None).await.unwrap();
        f.store.save_citing_works("W1", &[]).await.unwrap();

        let result = f.engine.expand(&request("W1", 20, 20), &GraphSession::default()).await.unwrap();

        assert!(result.nodes.is_empty());
        assert!(result.edges.is_empty());
        assert_eq!(f.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_truncation_bound() {
        let f = fixture();
        let refs: Vec<String> = (100..140).map(|i| format!("W{}", i)).collect();
        f.store.save_work(&WorkRecord::new("W1").with_references(refs.clone()), None).await.unwrap();
        for r in &refs {
            f.mock.insert(WorkRecord::new(r.as_str()).with_title(format!("Ref {}", r)));
        }
        for i in 200..240 {
            f.mock.add_citing("W1", WorkRecord::new(format!("W{}", i)).with_title("Citer"));
        }

        let result = f.engine.expand(&request("W1", 20, 20), &GraphSession::default()).await.unwrap();

        let outgoing = result.edges.iter().filter(|e| e.source == "W1").count();
        let incoming = result.edges.iter().filter(|e| e.target == "W1").count();
        assert_eq!(outgoing, 20);
        assert_eq!(incoming, 20);
        assert_eq!(result.nodes.len(), 40);
        // first-N in cache order
        assert_eq!(result.edges[0].target, "W100");
        assert!(result.edges.iter().all(|e| e.source != e.target));
    }

    #[tokio::test]
    async fn test_library_ids_are_filtered() {
        let f = fixture();
        f.store.save_work(&WorkRecord::new("W1").with_references(["W2", "W3"]), None).await.unwrap();
        f.store.save_work(&WorkRecord::new("W3").with_title("Three"), None).await.unwrap();
        f.store.save_citing_works("W1", &["W2".to_string(), "W4".to_string()]).await.unwrap();
        f.store.save_work(&WorkRecord::new("W4").with_title("Four"), None).await.unwrap();

        let session = GraphSession::new(["W1", "W2"]);
        let result = f.engine.expand(&request("W1", 20, 20), &session).await.unwrap();

        let ids: Vec<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["W3", "W4"]);
        assert_eq!(result.edges, vec![GraphEdge::cites("W1", "W3"), GraphEdge::cites("W4", "W1")]);
        assert_eq!(f.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_first_expansion_persists_full_citing_set() {
        let f = fixture();
        f.store.save_work(&WorkRecord::new("W1"), None).await.unwrap();
        for id in ["W2", "W5", "W6"] {
            f.mock.add_citing("W1", WorkRecord::new(id).with_title(id));
        }

        let session = GraphSession::new(["W1", "W2"]);
        let result = f.engine.expand(&request("W1", 20, 1), &session).await.unwrap();

        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].id, "W5");
        // stored before filtering and truncation
        assert_eq!(
            f.store.citing_works("W1").await.unwrap(),
            Some(vec!["W2".to_string(), "W5".to_string(), "W6".to_string()])
        );
        assert_eq!(f.mock.calls_to(Endpoint::Citing), 1);
        // citers came with full records, no detail lookup needed
        assert_eq!(f.mock.calls_to(Endpoint::Ids), 0);
    }

    #[tokio::test]
    async fn test_repeated_expansion_is_monotonic_and_offline() {
        let f = fixture();
        f.mock.insert(WorkRecord::new("W1").with_title("Focal").with_references(["W10", "W11"]));
        f.mock.insert(WorkRecord::new("W10").with_title("Ten"));
        f.mock.insert(WorkRecord::new("W11").with_title("Eleven"));
        f.mock.add_citing("W1", WorkRecord::new("W20").with_title("Twenty"));

        let session = GraphSession::default();
        let first = f.engine.expand(&request("W1", 20, 20), &session).await.unwrap();
        assert!(first.stats.remote_calls > 0);

        f.mock.reset_calls();
        let second = f.engine.expand(&request("W1", 20, 20), &session).await.unwrap();

        assert_eq!(f.mock.call_count(), 0);
        assert!(second.nodes.len() >= first.nodes.len());
        assert_eq!(second.nodes, first.nodes);
        assert!(second.stats.citing_cached);
    }

    #[tokio::test]
    async fn test_warm_node_stays_offline_when_upstream_lacks_works() {
        let f = fixture();
        // focal work unknown upstream
        let first = f.engine.expand(&request("W77", 20, 20), &GraphSession::default()).await.unwrap();
        assert!(first.nodes.is_empty());
        assert_eq!(f.mock.calls_to(Endpoint::Ids), 1);
        assert_eq!(f.mock.calls_to(Endpoint::Citing), 1);

        f.mock.reset_calls();
        f.engine.expand(&request("W77", 20, 20), &GraphSession::default()).await.unwrap();
        assert_eq!(f.mock.call_count(), 0);

        // reference unknown upstream
        f.store.save_work(&WorkRecord::new("W1").with_title("One").with_references(["W404"]), None).await.unwrap();
        f.store.save_citing_works("W1", &[]).await.unwrap();

        let first = f.engine.expand(&request("W1", 20, 20), &GraphSession::default()).await.unwrap();
        assert_eq!(first.nodes[0].title, UNKNOWN_TITLE);
        assert_eq!(f.mock.calls_to(Endpoint::Ids), 1);

        f.mock.reset_calls();
        let second = f.engine.expand(&request("W1", 20, 20), &GraphSession::default()).await.unwrap();
        assert_eq!(f.mock.call_count(), 0);
        assert_eq!(second.nodes, first.nodes);
        assert_eq!(second.stats.details_missing, 1);
    }

    #[tokio::test]
    async fn test_focal_fetch_skipped_once_citing_set_is_cached() {
        let f = fixture();
        f.mock.fail_endpoint(Endpoint::Ids);
        f.mock.add_citing("W5", WorkRecord::new("W6").with_title("Six"));

        let first = f.engine.expand(&request("W5", 20, 20), &GraphSession::default()).await.unwrap();
        assert_eq!(first.nodes.len(), 1);
        assert!(f.store.citing_works("W5").await.unwrap().is_some());

        f.mock.clear_failures();
        f.mock.reset_calls();
        let second = f.engine.expand(&request("W5", 20, 20), &GraphSession::default()).await.unwrap();
        assert_eq!(f.mock.call_count(), 0);
        assert_eq!(second.nodes, first.nodes);
    }

    #[tokio::test]
    async fn test_failed_citing_fetch_is_not_marked() {
        let f = fixture();
        f.store.save_work(&WorkRecord::new("W1"), None).await.unwrap();
        f.mock.fail_endpoint(Endpoint::Citing);

        let result = f.engine.expand(&request("W1", 20, 20), &GraphSession::default()).await.unwrap();
        assert!(result.nodes.is_empty());
        assert_eq!(f.store.citing_works("W1").await.unwrap(), None);

        f.mock.clear_failures();
        f.mock.add_citing("W1", WorkRecord::new("W9").with_title("Nine"));
        let retried = f.engine.expand(&request("W1", 20, 20), &GraphSession::default()).await.unwrap();
        assert_eq!(retried.nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_citing_bound_skips_remote() {
        let f = fixture();
        f.store.save_work(&WorkRecord::new("W1"), None).await.unwrap();

        let result = f.engine.expand(&request("W1", 20, 0), &GraphSession::default()).await.unwrap();
        assert!(result.nodes.is_empty());
        assert_eq!(f.mock.calls_to(Endpoint::Citing), 0);
        assert_eq!(f.store.citing_works("W1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_details_get_placeholder() {
        let f = fixture();
        f.store.save_work(&WorkRecord::new("W1").with_references(["W404"]), None).await.unwrap();
        f.store.save_citing_works("W1", &[]).await.unwrap();

        let result = f.engine.expand(&request("W1", 20, 20), &GraphSession::default()).await.unwrap();
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].title, UNKNOWN_TITLE);
        assert_eq!(result.stats.details_missing, 1);
    }

    #[tokio::test]
    async fn test_detail_batches_are_bounded_and_cached() {
        let f = fixture();
        let refs: Vec<String> = (1000..1120).map(|i| format!("W{}", i)).collect();
        f.store.save_work(&WorkRecord::new("W1").with_references(refs.clone()), None).await.unwrap();
        f.store.save_citing_works("W1", &[]).await.unwrap();
        for r in &refs {
            f.mock.insert(WorkRecord::new(r.as_str()).with_title("t").with_references(["W1"]));
        }

        let result = f.engine.references("W1", &GraphSession::new(["W1000"])).await.unwrap();

        assert_eq!(result.nodes.len(), 120);
        assert_eq!(result.nodes[0].node_type, NodeKind::Library);
        assert_eq!(result.nodes[1].node_type, NodeKind::External);
        assert!(f.mock.calls().iter().all(|c| c.identifiers.len() <= 50));
        assert_eq!(f.mock.calls_to(Endpoint::Ids), 3);
        // fetched details were cached with their own references
        assert_eq!(f.store.referenced_works("W1050").await.unwrap(), vec!["W1"]);
    }

    #[tokio::test]
    async fn test_work_details_cache_then_remote() {
        let f = fixture();
        f.mock.insert(WorkRecord::new("W5").with_title("Five").with_authors(["A", "B", "C"]));

        let fetched = f.engine.work_details("https://openalex.org/W5").await.unwrap();
        assert!(!fetched.cached);
        assert_eq!(fetched.authors.as_deref(), Some("A, B et al."));

        let cached = f.engine.work_details("W5").await.unwrap();
        assert!(cached.cached);
        assert_eq!(cached.title, "Five");
        assert_eq!(f.mock.call_count(), 1);

        let missing = f.engine.work_details("W6").await.unwrap_err();
        assert!(matches!(missing, AppError::WorkNotFound { .. }));

        f.mock.reset_calls();
        let again = f.engine.work_details("W6").await.unwrap_err();
        assert!(matches!(again, AppError::WorkNotFound { .. }));
        assert_eq!(f.mock.call_count(), 0);
    }
}
