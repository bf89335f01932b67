//! Database layer for CiteForge
//!
//! Provides:
//! - SeaORM entity models for the mapping, work and edge caches
//! - The [`CitationStore`] trait and its SeaORM and in-memory implementations
//! - Connection pool management and schema bootstrap

pub mod models;
mod memory;
mod repository;
mod store;

pub use memory::MemoryStore;
pub use repository::Repository;
pub use store::{CacheCounts, CitationStore, NewMapping, ResetPolicy};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use models::*;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Single connection pool for reads and writes. Reads must see writes
    /// committed earlier in the same call, so there is no replica.
    pub primary: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(config.sqlx_logging);

        let primary = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e)
            })?;

        info!("Database connection established");

        Ok(Self { primary })
    }

    /// Connection used for every query
    pub fn connection(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Create missing tables and indexes from the entity definitions
    pub async fn ensure_schema(&self) -> Result<()> {
        let backend = self.primary.get_database_backend();
        let schema = Schema::new(backend);

        // `works` before `work_references` for the foreign key
        let tables = [
            schema.create_table_from_entity(LibraryMappingEntity).if_not_exists().to_owned(),
            schema.create_table_from_entity(WorkEntity).if_not_exists().to_owned(),
            schema.create_table_from_entity(WorkReferenceEntity).if_not_exists().to_owned(),
            schema.create_table_from_entity(WorkCitationEntity).if_not_exists().to_owned(),
            schema.create_table_from_entity(CitationFetchEntity).if_not_exists().to_owned(),
        ];
        for table in &tables {
            self.primary.execute(backend.build(table)).await?;
        }

        for mut index in schema.create_index_from_entity(LibraryMappingEntity) {
            index.if_not_exists();
            self.primary.execute(backend.build(&index)).await?;
        }

        info!(tables = tables.len(), "Database schema ready");
        Ok(())
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }
}

/// Build the store selected by configuration
pub async fn create_store(config: &DatabaseConfig) -> Result<Arc<dyn CitationStore>> {
    if config.url.eq_ignore_ascii_case("memory") {
        info!("Using in-memory citation store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let pool = DbPool::new(config).await?;
    pool.ensure_schema().await?;
    Ok(Arc::new(Repository::new(pool)))
}
