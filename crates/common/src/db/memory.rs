//! In-process citation store
//!
//! All caches live behind one lock, so every write is atomic with respect
//! to every read.

use super::store::{dedup_ids, reference_list, work_model, CacheCounts, CitationStore, NewMapping, ResetPolicy};
use crate::db::models::{CitationFetch, LibraryMapping, Work};
use crate::errors::{AppError, Result};
use crate::openalex::WorkRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    mappings: HashMap<String, LibraryMapping>,
    works: HashMap<String, Work>,
    references: HashMap<String, Vec<String>>,
    citations: HashMap<String, Vec<String>>,
    fetches: HashMap<String, CitationFetch>,
}

impl MemoryState {
    fn counts(&self) -> CacheCounts {
        CacheCounts {
            mappings: self.mappings.len() as u64,
            works: self.works.len() as u64,
            references: self.references.values().map(|r| r.len() as u64).sum(),
            citations: self.citations.values().map(|c| c.len() as u64).sum(),
            citation_fetches: self.fetches.len() as u64,
        }
    }
}

/// Citation store kept in memory for the life of the process
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, leaving state untouched
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Insert a mapping with no work behind it
    pub async fn insert_mapping(&self, local_key: &str, work_id: &str) {
        let mapping = LibraryMapping {
            local_key: local_key.to_string(),
            work_id: work_id.to_string(),
            doi: None,
            title: None,
            last_updated: chrono::Utc::now(),
        };
        self.state.write().await.mappings.insert(local_key.to_string(), mapping);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::CacheError {
                message: "memory store is rejecting writes".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CitationStore for MemoryStore {
    async fn find_mappings(&self, local_keys: &[String]) -> Result<HashMap<String, LibraryMapping>> {
        let state = self.state.read().await;
        Ok(local_keys
            .iter()
            .filter_map(|k| state.mappings.get(k).map(|m| (k.clone(), m.clone())))
            .collect())
    }

    async fn find_works(&self, work_ids: &[String]) -> Result<HashMap<String, Work>> {
        let state = self.state.read().await;
        Ok(work_ids
            .iter()
            .filter_map(|id| state.works.get(id).map(|w| (id.clone(), w.clone())))
            .collect())
    }

    async fn find_references(&self, work_ids: &[String]) -> Result<HashMap<String, Vec<String>>> {
        let state = self.state.read().await;
        Ok(work_ids
            .iter()
            .filter(|id| state.works.contains_key(*id))
            .map(|id| (id.clone(), state.references.get(id).cloned().unwrap_or_default()))
            .collect())
    }

    async fn citing_works(&self, work_id: &str) -> Result<Option<Vec<String>>> {
        let state = self.state.read().await;
        if !state.fetches.contains_key(work_id) {
            return Ok(None);
        }
        Ok(Some(state.citations.get(work_id).cloned().unwrap_or_default()))
    }

    async fn save_work(&self, record: &WorkRecord, mapping: Option<&NewMapping>) -> Result<()> {
        self.check_writable()?;
        let now = chrono::Utc::now();
        let mut state = self.state.write().await;

        state.works.insert(record.id.clone(), work_model(record, now));
        state.references.insert(record.id.clone(), reference_list(record));

        if let Some(mapping) = mapping {
            state.mappings.insert(
                mapping.local_key.clone(),
                LibraryMapping {
                    local_key: mapping.local_key.clone(),
                    work_id: record.id.clone(),
                    doi: mapping.doi.clone().or_else(|| record.doi.clone()),
                    title: mapping.title.clone().or_else(|| record.title.clone()),
                    last_updated: now,
                },
            );
        }

        Ok(())
    }

    async fn save_citing_works(&self, work_id: &str, citing: &[String]) -> Result<()> {
        self.check_writable()?;
        let citing = dedup_ids(work_id, citing);
        let mut state = self.state.write().await;

        state.fetches.insert(
            work_id.to_string(),
            CitationFetch {
                work_id: work_id.to_string(),
                citing_count: citing.len() as i32,
                fetched_at: chrono::Utc::now(),
            },
        );
        state.citations.insert(work_id.to_string(), citing);

        Ok(())
    }

    async fn reset(&self, policy: ResetPolicy) -> Result<CacheCounts> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let before = state.counts();

        state.mappings.clear();
        state.citations.clear();
        state.fetches.clear();

        let mut cleared = CacheCounts {
            mappings: before.mappings,
            citations: before.citations,
            citation_fetches: before.citation_fetches,
            ..CacheCounts::default()
        };

        if policy == ResetPolicy::Full {
            state.works.clear();
            state.references.clear();
            cleared.works = before.works;
            cleared.references = before.references;
        }

        Ok(cleared)
    }

    async fn counts(&self) -> Result<CacheCounts> {
        Ok(self.state.read().await.counts())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
