//! Configuration management for CiteForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest number of identifiers the bibliographic service accepts per filter
pub const MAX_BATCH_SIZE: usize = 50;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Bibliographic service (OpenAlex) configuration
    #[serde(default)]
    pub openalex: OpenAlexConfig,

    /// Local reference library configuration
    #[serde(default)]
    pub library: LibraryConfig,

    /// Coordinator and expansion configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL. `memory` selects the in-process store.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Log every SQL statement
    #[serde(default)]
    pub sqlx_logging: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAlexConfig {
    /// Client provider: openalex, mock
    #[serde(default = "default_openalex_provider")]
    pub provider: String,

    /// API base URL
    #[serde(default = "default_openalex_base_url")]
    pub base_url: String,

    /// Contact address for the polite pool
    pub mailto: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_openalex_timeout")]
    pub timeout_secs: u64,

    /// Total time budget for retrying one request
    #[serde(default = "default_max_retry_secs")]
    pub max_retry_secs: u64,

    /// Outbound requests per second
    #[serde(default = "default_openalex_rps")]
    pub requests_per_second: u32,

    /// Identifiers per batched lookup (clamped to MAX_BATCH_SIZE)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Zotero local API base URL
    #[serde(default = "default_library_base_url")]
    pub base_url: String,

    /// Default scope: `user` or `group:<id>`
    #[serde(default = "default_library_scope")]
    pub scope: String,

    /// Request timeout in seconds
    #[serde(default = "default_library_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Upper bound on any single remote call made by the coordinator or expansion engine
    #[serde(default = "default_remote_timeout")]
    pub remote_timeout_secs: u64,

    /// Default reference bound for expansion
    #[serde(default = "default_max_refs")]
    pub max_refs: usize,

    /// Default citing-work bound for expansion
    #[serde(default = "default_max_citing")]
    pub max_citing: usize,

    /// What `reset` clears: full, retain_works
    #[serde(default = "default_reset_policy")]
    pub reset_policy: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name reported in logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Inbound requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 120 }
fn default_max_concurrent() -> usize { 64 }
fn default_database_url() -> String { "sqlite://citeforge.db?mode=rwc".to_string() }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_openalex_provider() -> String { "openalex".to_string() }
fn default_openalex_base_url() -> String { "https://api.openalex.org".to_string() }
fn default_openalex_timeout() -> u64 { 30 }
fn default_max_retry_secs() -> u64 { 60 }
fn default_openalex_rps() -> u32 { 10 }
fn default_batch_size() -> usize { MAX_BATCH_SIZE }
fn default_library_base_url() -> String { "http://127.0.0.1:23119/api".to_string() }
fn default_library_scope() -> String { "user".to_string() }
fn default_library_timeout() -> u64 { 30 }
fn default_remote_timeout() -> u64 { 45 }
fn default_max_refs() -> usize { 20 }
fn default_max_citing() -> usize { 20 }
fn default_reset_policy() -> String { "full".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "citeforge".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__OPENALEX__MAILTO=me@example.org
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get the per-call remote timeout as Duration
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.network.remote_timeout_secs)
    }

    /// Batch size actually used for identifier lookups
    pub fn batch_size(&self) -> usize {
        self.openalex.batch_size.clamp(1, MAX_BATCH_SIZE)
    }

    /// Whether the in-process store was requested
    pub fn uses_memory_store(&self) -> bool {
        self.database.url.eq_ignore_ascii_case("memory")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            sqlx_logging: false,
        }
    }
}

impl Default for OpenAlexConfig {
    fn default() -> Self {
        Self {
            provider: default_openalex_provider(),
            base_url: default_openalex_base_url(),
            mailto: None,
            timeout_secs: default_openalex_timeout(),
            max_retry_secs: default_max_retry_secs(),
            requests_per_second: default_openalex_rps(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            base_url: default_library_base_url(),
            scope: default_library_scope(),
            timeout_secs: default_library_timeout(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            remote_timeout_secs: default_remote_timeout(),
            max_refs: default_max_refs(),
            max_citing: default_max_citing(),
            reset_policy: default_reset_policy(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}
