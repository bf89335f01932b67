//! Library resolution and graph handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::validate;
use crate::AppState;
use citeforge_common::{
    errors::Result,
    library::{LibraryItem, LibraryScope},
};
use citeforge_network::{GraphEdge, GraphNode, ItemOutcome, LibraryGraph, ResolveStats};

/// Explicit list of library items
#[derive(Debug, Deserialize)]
pub struct ItemsRequest {
    pub items: Vec<LibraryItem>,
}

impl ItemsRequest {
    fn validate(&self) -> Result<()> {
        self.items.iter().try_for_each(validate)
    }
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub items: Vec<ItemOutcome>,
    pub summary: ResolveStats,
}

#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    /// `user` or `group:<id>`
    pub scope: Option<String>,
}

#[derive(Serialize)]
pub struct GraphResponse {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub library_ids: Vec<String>,
    pub items: Vec<ItemOutcome>,
    pub summary: ResolveStats,
}

impl From<LibraryGraph> for GraphResponse {
    fn from(library: LibraryGraph) -> Self {
        Self {
            nodes: library.graph.nodes,
            edges: library.graph.edges,
            library_ids: library.graph.library_ids,
            items: library.report.items,
            summary: library.report.stats,
        }
    }
}

/// Resolve library items to external works
pub async fn resolve(
    State(state): State<AppState>,
    Json(request): Json<ItemsRequest>,
) -> Result<Json<ResolveResponse>> {
    request.validate()?;

    let report = state.network.resolve(&request.items).await?;

    tracing::info!(
        items = report.stats.items,
        fetched = report.stats.fetched,
        unresolved = report.stats.unresolved,
        "Resolve request completed"
    );

    Ok(Json(ResolveResponse {
        items: report.items,
        summary: report.stats,
    }))
}

/// Build the graph for a library scope read from the library source
pub async fn library_graph(
    State(state): State<AppState>,
    Query(query): Query<GraphQuery>,
) -> Result<Json<GraphResponse>> {
    let scope: LibraryScope = query
        .scope
        .as_deref()
        .unwrap_or(state.config.library.scope.as_str())
        .parse()?;

    let items = state.library.list_items(&scope).await?;
    tracing::info!(scope = %scope, items = items.len(), "Loaded library items");

    let library = state.network.library_graph(&items).await?;
    Ok(Json(library.into()))
}

/// Build the graph over items supplied by the caller
pub async fn graph_from_items(
    State(state): State<AppState>,
    Json(request): Json<ItemsRequest>,
) -> Result<Json<GraphResponse>> {
    request.validate()?;

    let library = state.network.library_graph(&request.items).await?;
    Ok(Json(library.into()))
}
