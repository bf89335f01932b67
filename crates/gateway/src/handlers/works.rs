//! Expansion and work detail handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use super::validate;
use crate::AppState;
use citeforge_common::errors::Result;
use citeforge_network::{GraphSession, Neighborhood, WorkDetails};

/// Expand one node of a graph the caller holds
#[derive(Debug, Deserialize, Validate)]
pub struct ExpandNodeRequest {
    #[validate(length(min = 1, max = 256))]
    pub work_id: String,

    /// Library-membership ids of the caller's graph
    #[serde(default)]
    pub library_ids: Vec<String>,

    #[validate(range(max = 500))]
    pub max_refs: Option<usize>,

    #[validate(range(max = 500))]
    pub max_citing: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ReferencesRequest {
    #[serde(default)]
    pub library_ids: Vec<String>,
}

/// Bounded external neighbours of one work
pub async fn expand(
    State(state): State<AppState>,
    Json(request): Json<ExpandNodeRequest>,
) -> Result<Json<Neighborhood>> {
    validate(&request)?;

    let session = GraphSession::new(&request.library_ids);
    let neighbours = state
        .network
        .expand(&request.work_id, &session, request.max_refs, request.max_citing)
        .await?;

    Ok(Json(neighbours))
}

/// All references of one work, tagged library or external
pub async fn references(
    State(state): State<AppState>,
    Path(work_id): Path<String>,
    Json(request): Json<ReferencesRequest>,
) -> Result<Json<Neighborhood>> {
    let session = GraphSession::new(&request.library_ids);
    let neighbours = state.network.references(&work_id, &session).await?;
    Ok(Json(neighbours))
}

/// Details of one work
pub async fn get_work(
    State(state): State<AppState>,
    Path(work_id): Path<String>,
) -> Result<Json<WorkDetails>> {
    let details = state.network.work_details(&work_id).await?;
    Ok(Json(details))
}
