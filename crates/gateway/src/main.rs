//! CiteForge API Gateway
//!
//! HTTP entry point for the citation network core.
//! Handles:
//! - Library resolution and graph building
//! - Node expansion and work details
//! - Cache statistics and reset
//! - Rate limiting and observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{
    extract::Request,
    middleware::{from_fn, Next},
    routing::{get, post},
    Router,
};
use citeforge_common::{
    config::{AppConfig, ObservabilityConfig},
    db::create_store,
    library::{LibrarySource, ZoteroLibrary},
    metrics,
    openalex::create_client,
};
use citeforge_network::{CitationNetwork, NetworkSettings};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub network: CitationNetwork,
    pub library: Arc<dyn LibrarySource>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting CiteForge API Gateway v{}",
        citeforge_common::VERSION
    );

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    info!("Opening citation cache...");
    let store = create_store(&config.database).await?;
    let client = create_client(&config.openalex)?;
    let library: Arc<dyn LibrarySource> = Arc::new(ZoteroLibrary::new(&config.library)?);
    let network = CitationNetwork::new(store, client, NetworkSettings::from_config(&config)?);

    let state = AppState {
        config: config.clone(),
        network,
        library,
    };

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Library resolution and graph
        .route("/resolve", post(handlers::graph::resolve))
        .route("/graph", get(handlers::graph::library_graph).post(handlers::graph::graph_from_items))

        // Expansion and work details
        .route("/expand", post(handlers::works::expand))
        .route("/works/{id}", get(handlers::works::get_work))
        .route("/works/{id}/references", post(handlers::works::references))

        // Cache administration
        .route("/cache/stats", get(handlers::cache::stats))
        .route("/cache/reset", post(handlers::cache::reset))
        .route_layer(from_fn(middleware::metrics::track_requests));

    let mut app = Router::new().nest("/v1", api_routes);

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        app = app.layer(from_fn(move |request: Request, next: Next| {
            middleware::rate_limit::rate_limit_middleware(request, next, limiter.clone())
        }));
    }

    app.layer(ConcurrencyLimitLayer::new(state.config.server.max_concurrent_requests.max(1)))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::StatusCode;
    use citeforge_common::db::MemoryStore;
    use citeforge_common::library::{LibraryItem, StaticLibrary};
    use citeforge_common::openalex::{Endpoint, MockBibliographicClient, WorkRecord};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        mock: Arc<MockBibliographicClient>,
    }

    fn test_app() -> TestApp {
        let mock = Arc::new(MockBibliographicClient::new());
        mock.insert(WorkRecord::new("W1").with_doi("10.1/a").with_title("Alpha").with_references(["W2", "W3"]));
        mock.insert(WorkRecord::new("W2").with_doi("10.1/b").with_title("Beta"));
        mock.insert(WorkRecord::new("W3").with_title("Gamma").with_authors(["Ng", "Ho", "Li"]));
        mock.add_citing("W1", WorkRecord::new("W4").with_title("Delta"));

        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;

        let library = StaticLibrary::new(vec![
            LibraryItem::new("K1", "Alpha").with_doi("10.1/a"),
            LibraryItem::new("K2", "Beta").with_doi("10.1/b"),
            LibraryItem::new("K3", "No DOI"),
        ]);

        let network = CitationNetwork::new(Arc::new(MemoryStore::new()), mock.clone(), NetworkSettings::default());
        let state = AppState {
            config: Arc::new(config),
            network,
            library: Arc::new(library),
        };

        TestApp { router: create_router(state), mock }
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = tokio_test::assert_ok!(router.clone().oneshot(request).await);
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body) = call(&app.router, "GET", "/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = call(&app.router, "GET", "/v1/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    async fn test_graph_from_library() {
        let app = test_app();
        let (status, body) = call(&app.router, "GET", "/v1/graph?scope=user", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(body["edges"], json!([{ "source": "W1", "target": "W2", "type": "cites" }]));
        assert_eq!(body["summary"]["unresolved"], 1);
        assert_eq!(body["items"][2]["reason"], "no_identifier");
    }

    #[tokio::test]
    async fn test_resolve_twice_is_served_from_cache() {
        let app = test_app();
        let items = json!({ "items": [{ "key": "K1", "title": "Alpha", "doi": "10.1/a" }] });

        let (status, body) = call(&app.router, "POST", "/v1/resolve", Some(items.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["status"], "fetched");
        assert_eq!(body["items"][0]["work_id"], "W1");

        app.mock.reset_calls();
        let (_, body) = call(&app.router, "POST", "/v1/resolve", Some(items)).await;
        assert_eq!(body["items"][0]["status"], "cached");
        assert_eq!(app.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_rejects_empty_key() {
        let app = test_app();
        let (status, body) = call(&app.router, "POST", "/v1/resolve", Some(json!({ "items": [{ "key": "" }] }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_expand() {
        let app = test_app();
        call(&app.router, "GET", "/v1/graph", None).await;

        let request = json!({ "work_id": "W1", "library_ids": ["W1", "W2"] });
        let (status, body) = call(&app.router, "POST", "/v1/expand", Some(request)).await;

        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body["nodes"].as_array().unwrap().iter().map(|n| n["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["W3", "W4"]);
        assert_eq!(body["nodes"][0]["authors"], "Ng, Ho et al.");
        assert_eq!(body["nodes"][0]["node_type"], "external");
        assert_eq!(body["edges"][1], json!({ "source": "W4", "target": "W1", "type": "cites" }));
    }

    #[tokio::test]
    async fn test_expand_empty_work_id_is_rejected() {
        let app = test_app();
        let (status, _) = call(&app.router, "POST", "/v1/expand", Some(json!({ "work_id": " ", "library_ids": [] }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_work_details_and_references() {
        let app = test_app();

        let (status, body) = call(&app.router, "GET", "/v1/works/W3", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Gamma");

        let (status, _) = call(&app.router, "GET", "/v1/works/W999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&app.router, "POST", "/v1/works/W1/references", Some(json!({ "library_ids": ["W2"] }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nodes"][0]["node_type"], "library");
        assert_eq!(body["nodes"][1]["node_type"], "external");
    }

    #[tokio::test]
    async fn test_cache_reset_restarts_remote_work() {
        let app = test_app();
        call(&app.router, "GET", "/v1/graph", None).await;
        let first_run = app.mock.calls_to(Endpoint::Dois);

        let (_, stats) = call(&app.router, "GET", "/v1/cache/stats", None).await;
        assert_eq!(stats["mappings"], 2);

        let (status, body) = call(&app.router, "POST", "/v1/cache/reset", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["cleared"]["mappings"], 2);

        app.mock.reset_calls();
        call(&app.router, "GET", "/v1/graph", None).await;
        assert_eq!(app.mock.calls_to(Endpoint::Dois), first_run);
    }

    #[tokio::test]
    async fn test_cache_reset_rejects_unknown_policy() {
        let app = test_app();
        let (status, _) = call(&app.router, "POST", "/v1/cache/reset?policy=partial", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
