//! Per-request metrics

use axum::{extract::MatchedPath, extract::Request, middleware::Next, response::Response};
use citeforge_common::metrics::RequestMetrics;

/// Count and time every request by its route template
pub async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let tracker = RequestMetrics::start(request.method().as_str(), &endpoint);

    let response = next.run(request).await;
    tracker.finish(response.status().as_u16());
    response
}
