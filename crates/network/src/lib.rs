//! CiteForge citation network core
//!
//! - [`CacheCoordinator`] resolves library items to external works, cache first
//! - [`GraphBuilder`] assembles the library-only citation graph from the caches
//! - [`ExpansionEngine`] grows the graph around a single work
//!
//! [`CitationNetwork`] wires the three together over one store and one client.

pub mod coordinator;
pub mod expansion;
pub mod graph;
pub mod remote;
pub mod session;

pub use coordinator::{
    CacheCoordinator, ItemOutcome, PersistStatus, ResolveReport, ResolveStats, ResolveStatus,
    ResolvedWork, UnresolvedReason,
};
pub use expansion::{ExpandRequest, ExpansionEngine, ExpansionStats, Neighborhood, WorkDetails};
pub use graph::{EdgeRelation, Graph, GraphBuilder, GraphEdge, GraphNode, NodeKind, UNKNOWN_TITLE};
pub use remote::RemoteWorks;
pub use session::GraphSession;

use citeforge_common::config::AppConfig;
use citeforge_common::db::{CacheCounts, CitationStore, ResetPolicy};
use citeforge_common::errors::{AppError, Result};
use citeforge_common::library::LibraryItem;
use citeforge_common::openalex::BibliographicClient;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Runtime knobs for the network core
#[derive(Debug, Clone)]
pub struct NetworkSettings {
    pub remote_timeout: Duration,
    pub batch_size: usize,
    pub max_refs: usize,
    pub max_citing: usize,
    pub reset_policy: ResetPolicy,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(45),
            batch_size: citeforge_common::config::MAX_BATCH_SIZE,
            max_refs: 20,
            max_citing: 20,
            reset_policy: ResetPolicy::Full,
        }
    }
}

impl NetworkSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let reset_policy = config.network.reset_policy.parse::<ResetPolicy>().map_err(|e: AppError| AppError::Configuration {
            message: format!("network.reset_policy: {}", e),
        })?;

        Ok(Self {
            remote_timeout: config.remote_timeout(),
            batch_size: config.batch_size(),
            max_refs: config.network.max_refs,
            max_citing: config.network.max_citing,
            reset_policy,
        })
    }
}

/// A library graph together with how each item was resolved
#[derive(Debug, Clone, Serialize)]
pub struct LibraryGraph {
    #[serde(flatten)]
    pub graph: Graph,
    pub report: ResolveReport,
}

/// Coordinator, graph builder and expansion engine over one cache
#[derive(Clone)]
pub struct CitationNetwork {
    store: Arc<dyn CitationStore>,
    coordinator: CacheCoordinator,
    builder: GraphBuilder,
    engine: ExpansionEngine,
    settings: NetworkSettings,
}

impl CitationNetwork {
    pub fn new(store: Arc<dyn CitationStore>, client: Arc<dyn BibliographicClient>, settings: NetworkSettings) -> Self {
        let remote = RemoteWorks::new(client, settings.remote_timeout, settings.batch_size);
        Self {
            coordinator: CacheCoordinator::new(store.clone(), remote.clone()),
            builder: GraphBuilder::new(store.clone()),
            engine: ExpansionEngine::new(store.clone(), remote),
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    pub async fn resolve(&self, items: &[LibraryItem]) -> Result<ResolveReport> {
        self.coordinator.resolve(items).await
    }

    /// Resolve `items`, then build the graph over what resolved
    pub async fn library_graph(&self, items: &[LibraryItem]) -> Result<LibraryGraph> {
        let report = self.coordinator.resolve(items).await?;
        let graph = self.builder.build(&report.resolved).await?;
        Ok(LibraryGraph { graph, report })
    }

    /// Expand one node; missing bounds fall back to the configured defaults
    pub async fn expand(
        &self,
        work_id: &str,
        session: &GraphSession,
        max_refs: Option<usize>,
        max_citing: Option<usize>,
    ) -> Result<Neighborhood> {
        let request = ExpandRequest {
            work_id: work_id.to_string(),
            max_refs: max_refs.unwrap_or(self.settings.max_refs),
            max_citing: max_citing.unwrap_or(self.settings.max_citing),
        };
        self.engine.expand(&request, session).await
    }

    pub async fn references(&self, work_id: &str, session: &GraphSession) -> Result<Neighborhood> {
        self.engine.references(work_id, session).await
    }

    pub async fn work_details(&self, work_id: &str) -> Result<WorkDetails> {
        self.engine.work_details(work_id).await
    }

    /// Clear the caches; `None` uses the configured policy
    pub async fn reset(&self, policy: Option<ResetPolicy>) -> Result<CacheCounts> {
        self.coordinator.reset(policy.unwrap_or(self.settings.reset_policy)).await
    }

    pub async fn cache_counts(&self) -> Result<CacheCounts> {
        self.store.counts().await
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}
