//! CiteForge Common Library
//!
//! Shared code for the CiteForge crates including:
//! - Configuration management
//! - Error types and handling
//! - Identifier normalization
//! - Citation cache persistence (SeaORM and in-memory)
//! - Bibliographic service client abstraction
//! - Local library access
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod identifiers;
pub mod library;
pub mod metrics;
pub mod openalex;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{CacheCounts, CitationStore, MemoryStore, Repository, ResetPolicy};
pub use errors::{AppError, Result};
pub use library::{LibraryItem, LibraryScope, LibrarySource};
pub use openalex::{BibliographicClient, WorkRecord};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
