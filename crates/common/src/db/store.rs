//! The cache seam used by the coordinator and expansion engine

use crate::db::models::{LibraryMapping, Work};
use crate::errors::{AppError, Result};
use crate::openalex::WorkRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// What `reset` clears
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Clear everything, work records included
    #[default]
    Full,
    /// Clear mappings and citing edges; keep work records with their reference lists
    RetainWorks,
}

impl FromStr for ResetPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "retain_works" | "retain-works" => Ok(Self::RetainWorks),
            other => Err(AppError::InvalidFormat {
                message: format!("unknown reset policy '{}'", other),
            }),
        }
    }
}

/// Row counts per cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCounts {
    pub mappings: u64,
    pub works: u64,
    pub references: u64,
    pub citations: u64,
    pub citation_fetches: u64,
}

/// Mapping to write alongside a work record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMapping {
    pub local_key: String,
    pub doi: Option<String>,
    pub title: Option<String>,
}

/// Persistent caches for mappings, work details and citation edges.
///
/// Each write method is atomic: readers never observe a mapping whose work
/// was half-written, or an edge set without its fetched marker.
#[async_trait]
pub trait CitationStore: Send + Sync {
    /// Mappings for the given local keys. Missing keys are absent from the map.
    async fn find_mappings(&self, local_keys: &[String]) -> Result<HashMap<String, LibraryMapping>>;

    /// Work records for the given ids
    async fn find_works(&self, work_ids: &[String]) -> Result<HashMap<String, Work>>;

    /// Reference lists, in stored order, for the given ids.
    /// Ids without a cached work are absent.
    async fn find_references(&self, work_ids: &[String]) -> Result<HashMap<String, Vec<String>>>;

    /// Citing works for `work_id`. `None` when never fetched.
    async fn citing_works(&self, work_id: &str) -> Result<Option<Vec<String>>>;

    /// Store a work, its reference list and optionally a mapping to it, in one transaction
    async fn save_work(&self, record: &WorkRecord, mapping: Option<&NewMapping>) -> Result<()>;

    /// Replace the citing set of `work_id` and mark it fetched, in one transaction
    async fn save_citing_works(&self, work_id: &str, citing: &[String]) -> Result<()>;

    /// Clear caches according to `policy`. Returns what was removed.
    async fn reset(&self, policy: ResetPolicy) -> Result<CacheCounts>;

    async fn counts(&self) -> Result<CacheCounts>;

    async fn ping(&self) -> Result<()>;

    /// Reference list of a single work, empty when the work is not cached
    async fn referenced_works(&self, work_id: &str) -> Result<Vec<String>> {
        let ids = [work_id.to_string()];
        Ok(self.find_references(&ids).await?.remove(work_id).unwrap_or_default())
    }
}

/// Row form of a fetched record
pub(crate) fn work_model(record: &WorkRecord, fetched_at: DateTime<Utc>) -> Work {
    Work {
        id: record.id.clone(),
        doi: record.doi.clone(),
        title: record.title.clone(),
        publication_year: record.publication_year,
        authors: record.author_summary(),
        cited_by_count: record.cited_by_count,
        fetched_at,
    }
}

/// Reference ids with duplicates and self-references removed, order kept
pub(crate) fn reference_list(record: &WorkRecord) -> Vec<String> {
    dedup_ids(&record.id, &record.referenced_works)
}

pub(crate) fn dedup_ids(own_id: &str, ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .filter(|id| id.as_str() != own_id && seen.insert(id.as_str()))
        .cloned()
        .collect()
}
