//! Cache administration handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use citeforge_common::{
    db::{CacheCounts, ResetPolicy},
    errors::Result,
};

#[derive(Debug, Deserialize)]
pub struct ResetQuery {
    /// `full` or `retain_works`; defaults to the configured policy
    pub policy: Option<String>,
}

#[derive(Serialize)]
pub struct ResetResponse {
    pub status: &'static str,
    pub policy: ResetPolicy,
    pub cleared: CacheCounts,
}

/// Row counts of every cache
pub async fn stats(State(state): State<AppState>) -> Result<Json<CacheCounts>> {
    Ok(Json(state.network.cache_counts().await?))
}

/// Clear the caches
pub async fn reset(
    State(state): State<AppState>,
    Query(query): Query<ResetQuery>,
) -> Result<Json<ResetResponse>> {
    let policy = match query.policy.as_deref() {
        Some(policy) => policy.parse::<ResetPolicy>()?,
        None => state.network.settings().reset_policy,
    };

    let cleared = state.network.reset(Some(policy)).await?;

    Ok(Json(ResetResponse {
        status: "ok",
        policy,
        cleared,
    }))
}
