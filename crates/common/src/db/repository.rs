//! Repository pattern for database operations
//!
//! SeaORM implementation of [`CitationStore`]. Every multi-row write runs
//! inside a single transaction.

use super::store::{dedup_ids, reference_list, work_model, CacheCounts, CitationStore, NewMapping, ResetPolicy};
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use crate::openalex::WorkRecord;
use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;

/// Keeps `IN (...)` lists and multi-row inserts under backend parameter limits
const CHUNK_SIZE: usize = 500;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.connection()
    }

    // ========================================================================
    // Write helpers (run on a transaction)
    // ========================================================================

    async fn upsert_work<C: ConnectionTrait>(conn: &C, record: &WorkRecord, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let work = work_model(record, now);
        let active = WorkActiveModel {
            id: Set(work.id),
            doi: Set(work.doi),
            title: Set(work.title),
            publication_year: Set(work.publication_year),
            authors: Set(work.authors),
            cited_by_count: Set(work.cited_by_count),
            fetched_at: Set(work.fetched_at),
        };

        WorkEntity::insert(active)
            .on_conflict(
                OnConflict::column(WorkColumn::Id)
                    .update_columns([
                        WorkColumn::Doi,
                        WorkColumn::Title,
                        WorkColumn::PublicationYear,
                        WorkColumn::Authors,
                        WorkColumn::CitedByCount,
                        WorkColumn::FetchedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        WorkReferenceEntity::delete_many()
            .filter(WorkReferenceColumn::WorkId.eq(record.id.as_str()))
            .exec(conn)
            .await?;

        let references = reference_list(record);
        for (chunk_index, chunk) in references.chunks(CHUNK_SIZE).enumerate() {
            let rows = chunk.iter().enumerate().map(|(i, referenced)| WorkReferenceActiveModel {
                work_id: Set(record.id.clone()),
                referenced_work_id: Set(referenced.clone()),
                position: Set((chunk_index * CHUNK_SIZE + i) as i32),
            });
            WorkReferenceEntity::insert_many(rows)
                .exec_without_returning(conn)
                .await?;
        }

        Ok(())
    }

    async fn upsert_mapping<C: ConnectionTrait>(
        conn: &C,
        record: &WorkRecord,
        mapping: &NewMapping,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let active = LibraryMappingActiveModel {
            local_key: Set(mapping.local_key.clone()),
            work_id: Set(record.id.clone()),
            doi: Set(mapping.doi.clone().or_else(|| record.doi.clone())),
            title: Set(mapping.title.clone().or_else(|| record.title.clone())),
            last_updated: Set(now),
        };

        LibraryMappingEntity::insert(active)
            .on_conflict(
                OnConflict::column(LibraryMappingColumn::LocalKey)
                    .update_columns([
                        LibraryMappingColumn::WorkId,
                        LibraryMappingColumn::Doi,
                        LibraryMappingColumn::Title,
                        LibraryMappingColumn::LastUpdated,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        Ok(())
    }

    async fn count_all<C: ConnectionTrait>(conn: &C) -> Result<CacheCounts> {
        Ok(CacheCounts {
            mappings: LibraryMappingEntity::find().count(conn).await?,
            works: WorkEntity::find().count(conn).await?,
            references: WorkReferenceEntity::find().count(conn).await?,
            citations: WorkCitationEntity::find().count(conn).await?,
            citation_fetches: CitationFetchEntity::find().count(conn).await?,
        })
    }
}

#[async_trait]
impl CitationStore for Repository {
    // ========================================================================
    // Lookups
    // ========================================================================

    async fn find_mappings(&self, local_keys: &[String]) -> Result<HashMap<String, LibraryMapping>> {
        let mut found = HashMap::with_capacity(local_keys.len());

        for chunk in local_keys.chunks(CHUNK_SIZE) {
            let rows = LibraryMappingEntity::find()
                .filter(LibraryMappingColumn::LocalKey.is_in(chunk.iter().cloned()))
                .all(self.conn())
                .await?;
            found.extend(rows.into_iter().map(|m| (m.local_key.clone(), m)));
        }

        Ok(found)
    }

    async fn find_works(&self, work_ids: &[String]) -> Result<HashMap<String, Work>> {
        let mut found = HashMap::with_capacity(work_ids.len());

        for chunk in work_ids.chunks(CHUNK_SIZE) {
            let rows = WorkEntity::find()
                .filter(WorkColumn::Id.is_in(chunk.iter().cloned()))
                .all(self.conn())
                .await?;
            found.extend(rows.into_iter().map(|w| (w.id.clone(), w)));
        }

        Ok(found)
    }

    async fn find_references(&self, work_ids: &[String]) -> Result<HashMap<String, Vec<String>>> {
        let mut found: HashMap<String, Vec<String>> = HashMap::with_capacity(work_ids.len());

        for chunk in work_ids.chunks(CHUNK_SIZE) {
            let cached = WorkEntity::find()
                .filter(WorkColumn::Id.is_in(chunk.iter().cloned()))
                .all(self.conn())
                .await?;
            for work in &cached {
                found.entry(work.id.clone()).or_default();
            }

            let edges = WorkReferenceEntity::find()
                .filter(WorkReferenceColumn::WorkId.is_in(chunk.iter().cloned()))
                .order_by_asc(WorkReferenceColumn::WorkId)
                .order_by_asc(WorkReferenceColumn::Position)
                .all(self.conn())
                .await?;
            for edge in edges {
                if let Some(list) = found.get_mut(&edge.work_id) {
                    list.push(edge.referenced_work_id);
                }
            }
        }

        Ok(found)
    }

    async fn citing_works(&self, work_id: &str) -> Result<Option<Vec<String>>> {
        let marker = CitationFetchEntity::find_by_id(work_id.to_string())
            .one(self.conn())
            .await?;
        if marker.is_none() {
            return Ok(None);
        }

        let edges = WorkCitationEntity::find()
            .filter(WorkCitationColumn::WorkId.eq(work_id))
            .order_by_asc(WorkCitationColumn::Position)
            .all(self.conn())
            .await?;

        Ok(Some(edges.into_iter().map(|e| e.citing_work_id).collect()))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    async fn save_work(&self, record: &WorkRecord, mapping: Option<&NewMapping>) -> Result<()> {
        let now = chrono::Utc::now();
        let txn = self.conn().begin().await?;

        Self::upsert_work(&txn, record, now).await?;
        if let Some(mapping) = mapping {
            Self::upsert_mapping(&txn, record, mapping, now).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn save_citing_works(&self, work_id: &str, citing: &[String]) -> Result<()> {
        let citing = dedup_ids(work_id, citing);
        let txn = self.conn().begin().await?;

        WorkCitationEntity::delete_many()
            .filter(WorkCitationColumn::WorkId.eq(work_id))
            .exec(&txn)
            .await?;

        for (chunk_index, chunk) in citing.chunks(CHUNK_SIZE).enumerate() {
            let rows = chunk.iter().enumerate().map(|(i, citer)| WorkCitationActiveModel {
                work_id: Set(work_id.to_string()),
                citing_work_id: Set(citer.clone()),
                position: Set((chunk_index * CHUNK_SIZE + i) as i32),
            });
            WorkCitationEntity::insert_many(rows)
                .exec_without_returning(&txn)
                .await?;
        }

        let marker = CitationFetchActiveModel {
            work_id: Set(work_id.to_string()),
            citing_count: Set(citing.len() as i32),
            fetched_at: Set(chrono::Utc::now()),
        };
        CitationFetchEntity::insert(marker)
            .on_conflict(
                OnConflict::column(CitationFetchColumn::WorkId)
                    .update_columns([CitationFetchColumn::CitingCount, CitationFetchColumn::FetchedAt])
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }

    async fn reset(&self, policy: ResetPolicy) -> Result<CacheCounts> {
        let txn = self.conn().begin().await?;
        let before = Self::count_all(&txn).await?;

        LibraryMappingEntity::delete_many().exec(&txn).await?;
        WorkCitationEntity::delete_many().exec(&txn).await?;
        CitationFetchEntity::delete_many().exec(&txn).await?;

        let mut cleared = CacheCounts {
            mappings: before.mappings,
            citations: before.citations,
            citation_fetches: before.citation_fetches,
            ..CacheCounts::default()
        };

        if policy == ResetPolicy::Full {
            WorkReferenceEntity::delete_many().exec(&txn).await?;
            WorkEntity::delete_many().exec(&txn).await?;
            cleared.works = before.works;
            cleared.references = before.references;
        }

        txn.commit().await?;

        tracing::info!(policy = ?policy, cleared = ?cleared, "Citation caches reset");
        Ok(cleared)
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    async fn counts(&self) -> Result<CacheCounts> {
        Self::count_all(self.conn()).await
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;

    async fn sqlite_repository() -> Repository {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..DatabaseConfig::default()
        };
        let pool = DbPool::new(&config).await.unwrap();
        pool.ensure_schema().await.unwrap();
        Repository::new(pool)
    }

    fn mapping(key: &str) -> NewMapping {
        NewMapping {
            local_key: key.to_string(),
            doi: None,
            title: None,
        }
    }

    #[tokio::test]
    async fn test_save_and_find_work() {
        let repo = sqlite_repository().await;
        let record = WorkRecord::new("W1")
            .with_title("Graph caches")
            .with_doi("10.1/a")
            .with_year(2020)
            .with_authors(["A. One", "B. Two", "C. Three"])
            .with_references(["W3", "W2", "W3"]);

        repo.save_work(&record, Some(&mapping("KEY1"))).await.unwrap();

        let works = repo.find_works(&["W1".to_string()]).await.unwrap();
        assert_eq!(works["W1"].title.as_deref(), Some("Graph caches"));
        assert_eq!(works["W1"].authors.as_deref(), Some("A. One, B. Two et al."));

        let mappings = repo.find_mappings(&["KEY1".to_string()]).await.unwrap();
        assert_eq!(mappings["KEY1"].work_id, "W1");
        assert_eq!(mappings["KEY1"].doi.as_deref(), Some("10.1/a"));

        assert_eq!(repo.referenced_works("W1").await.unwrap(), vec!["W3", "W2"]);
    }

    #[tokio::test]
    async fn test_resave_replaces_references() {
        let repo = sqlite_repository().await;
        repo.save_work(&WorkRecord::new("W1").with_references(["W2", "W3"]), None).await.unwrap();
        repo.save_work(&WorkRecord::new("W1").with_references(["W4"]), None).await.unwrap();

        assert_eq!(repo.referenced_works("W1").await.unwrap(), vec!["W4"]);
        assert_eq!(repo.counts().await.unwrap().works, 1);
    }

    #[tokio::test]
    async fn test_citing_marker() {
        let repo = sqlite_repository().await;
        assert_eq!(repo.citing_works("W1").await.unwrap(), None);

        repo.save_citing_works("W1", &[]).await.unwrap();
        assert_eq!(repo.citing_works("W1").await.unwrap(), Some(vec![]));

        repo.save_citing_works("W1", &["W8".to_string(), "W7".to_string()]).await.unwrap();
        assert_eq!(
            repo.citing_works("W1").await.unwrap(),
            Some(vec!["W8".to_string(), "W7".to_string()])
        );
    }

    #[tokio::test]
    async fn test_reset_full_and_retained() {
        let repo = sqlite_repository().await;
        repo.save_work(&WorkRecord::new("W1").with_references(["W2"]), Some(&mapping("K"))).await.unwrap();
        repo.save_citing_works("W1", &["W5".to_string()]).await.unwrap();

        let cleared = repo.reset(ResetPolicy::RetainWorks).await.unwrap();
        assert_eq!(cleared.mappings, 1);
        assert_eq!(cleared.citations, 1);
        assert_eq!(cleared.works, 0);
        assert_eq!(repo.citing_works("W1").await.unwrap(), None);
        assert_eq!(repo.referenced_works("W1").await.unwrap(), vec!["W2"]);

        let cleared = repo.reset(ResetPolicy::Full).await.unwrap();
        assert_eq!(cleared.works, 1);
        assert_eq!(cleared.references, 1);
        assert_eq!(repo.counts().await.unwrap(), CacheCounts::default());
    }
}
