//! Library graph assembly
//!
//! Reads only from the caches. Never calls the bibliographic service.

use crate::coordinator::ResolvedWork;
use crate::session::GraphSession;
use citeforge_common::db::CitationStore;
use citeforge_common::errors::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::instrument;

/// Placeholder for works whose details could not be obtained
pub const UNKNOWN_TITLE: &str = "Unknown Title";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Present in the local library
    Library,
    /// Discovered through expansion
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRelation {
    /// `source` cites `target`
    Cites,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_key: Option<String>,
    pub title: String,
    pub authors: Option<String>,
    pub year: Option<i32>,
    pub doi: Option<String>,
    pub node_type: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relation: EdgeRelation,
}

impl GraphEdge {
    pub fn cites(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: EdgeRelation::Cites,
        }
    }
}

/// Induced citation graph over library works
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub library_ids: Vec<String>,
}

impl Graph {
    /// Session for expanding nodes of this graph
    pub fn session(&self) -> GraphSession {
        GraphSession::new(&self.library_ids)
    }
}

/// Builds the library-only graph from cached reference edges
#[derive(Clone)]
pub struct GraphBuilder {
    store: Arc<dyn CitationStore>,
}

impl GraphBuilder {
    pub fn new(store: Arc<dyn CitationStore>) -> Self {
        Self { store }
    }

    /// One node per resolved work; an edge for every cached reference whose
    /// both endpoints are library works. Output order depends only on cache state.
    #[instrument(skip_all, fields(resolved = resolved.len()))]
    pub async fn build(&self, resolved: &BTreeMap<String, ResolvedWork>) -> Result<Graph> {
        // Several local items can resolve to one work; the smallest key wins
        let mut nodes: BTreeMap<&str, GraphNode> = BTreeMap::new();
        for work in resolved.values() {
            nodes.entry(work.work_id.as_str()).or_insert_with(|| GraphNode {
                id: work.work_id.clone(),
                local_key: Some(work.local_key.clone()),
                title: work.title.clone(),
                authors: work.authors.clone(),
                year: work.year,
                doi: work.doi.clone(),
                node_type: NodeKind::Library,
            });
        }

        let library_ids: Vec<String> = nodes.keys().map(|id| id.to_string()).collect();
        let members: BTreeSet<&str> = nodes.keys().copied().collect();
        let references = self.store.find_references(&library_ids).await?;

        let mut edges = Vec::new();
        for source in &library_ids {
            let Some(targets) = references.get(source) else {
                continue;
            };
            edges.extend(
                targets
                    .iter()
                    .filter(|target| *target != source && members.contains(target.as_str()))
                    .map(|target| GraphEdge::cites(source.clone(), target.clone())),
            );
        }

        tracing::info!(nodes = nodes.len(), edges = edges.len(), "Library graph built");

        Ok(Graph {
            nodes: nodes.into_values().collect(),
            edges,
            library_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeforge_common::db::MemoryStore;
    use citeforge_common::openalex::WorkRecord;

    fn resolved(key: &str, work_id: &str) -> (String, ResolvedWork) {
        (
            key.to_string(),
            ResolvedWork {
                local_key: key.to_string(),
                work_id: work_id.to_string(),
                doi: None,
                title: format!("Title {}", work_id),
                authors: None,
                year: Some(2020),
            },
        )
    }

    #[tokio::test]
    async fn test_only_library_edges() {
        let store = Arc::new(MemoryStore::new());
        store.save_work(&WorkRecord::new("W1").with_references(["W2", "W99"]), None).await.unwrap();
        store.save_work(&WorkRecord::new("W2").with_references(["W3"]), None).await.unwrap();
        store.save_work(&WorkRecord::new("W3"), None).await.unwrap();

        let input: BTreeMap<_, _> = [resolved("A", "W1"), resolved("B", "W2"), resolved("C", "W3")].into_iter().collect();
        let graph = GraphBuilder::new(store).build(&input).await.unwrap();

        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges, vec![GraphEdge::cites("W1", "W2"), GraphEdge::cites("W2", "W3")]);
        assert!(graph.nodes.iter().all(|n| n.node_type == NodeKind::Library));
        for edge in &graph.edges {
            assert!(graph.library_ids.contains(&edge.source));
            assert!(graph.library_ids.contains(&edge.target));
        }
    }

    #[tokio::test]
    async fn test_shared_work_becomes_one_node() {
        let store = Arc::new(MemoryStore::new());
        store.save_work(&WorkRecord::new("W1"), None).await.unwrap();

        let input: BTreeMap<_, _> = [resolved("B", "W1"), resolved("A", "W1")].into_iter().collect();
        let graph = GraphBuilder::new(store).build(&input).await.unwrap();

        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].local_key.as_deref(), Some("A"));
        assert_eq!(graph.session().len(), 1);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let store = Arc::new(MemoryStore::new());
        for (id, refs) in [("W1", vec!["W2", "W3"]), ("W2", vec!["W3", "W1"]), ("W3", vec![])] {
            store.save_work(&WorkRecord::new(id).with_references(refs), None).await.unwrap();
        }
        let input: BTreeMap<_, _> = [resolved("A", "W1"), resolved("B", "W2"), resolved("C", "W3")].into_iter().collect();

        let builder = GraphBuilder::new(store);
        let first = builder.build(&input).await.unwrap();
        let second = builder.build(&input).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.edges.len(), 4);
    }

    #[test]
    fn test_edge_serialization() {
        let json = serde_json::to_value(GraphEdge::cites("W1", "W2")).unwrap();
        assert_eq!(json["type"], "cites");
    }
}
