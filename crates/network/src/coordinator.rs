//! Citation cache coordinator
//!
//! Resolves library items to external works. Each item is classified by
//! cache state before any remote call:
//!
//! 1. fully cached: mapping and work record present, no remote cost
//! 2. mapping-only: mapping present, work record missing, repaired by id
//! 3. unmapped: looked up by DOI, which creates mapping and work record together
//!
//! DOI batches that fail are retried one DOI at a time. Id-keyed repair
//! batches are not; their items stay unresolved until the next run.

use crate::remote::RemoteWorks;
use citeforge_common::db::models::{LibraryMapping, Work};
use citeforge_common::db::{CacheCounts, CitationStore, NewMapping, ResetPolicy};
use citeforge_common::errors::Result;
use citeforge_common::identifiers::normalize_doi;
use citeforge_common::library::LibraryItem;
use citeforge_common::metrics;
use citeforge_common::openalex::WorkRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;

/// A library item tied to its external work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedWork {
    pub local_key: String,
    pub work_id: String,
    pub doi: Option<String>,
    pub title: String,
    pub authors: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStatus {
    /// Served from cache
    Cached,
    /// Fetched (or repaired) from the bibliographic service during this call
    Fetched,
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Item has no DOI and no mapping
    NoIdentifier,
    /// The service answered but had no matching work
    NotFound,
    /// DOI lookup failed, including the per-item retry
    FetchFailed,
    /// Id-keyed repair of a mapping-only item failed
    RepairFailed,
}

/// Whether the fetched data reached the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistStatus {
    Cached,
    CacheFailed,
}

/// Outcome for one input item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub key: String,
    pub status: ResolveStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnresolvedReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persisted: Option<PersistStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveStats {
    pub items: usize,
    pub fully_cached: usize,
    pub repaired: usize,
    pub fetched: usize,
    pub unresolved: usize,
    pub remote_calls: usize,
    pub cache_failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveReport {
    /// One entry per resolvable local key
    pub resolved: BTreeMap<String, ResolvedWork>,
    /// One entry per input item, in input order
    pub items: Vec<ItemOutcome>,
    pub stats: ResolveStats,
}

/// Per-key result before it is expanded back to input order
enum Outcome {
    Resolved {
        work: ResolvedWork,
        status: ResolveStatus,
        persisted: Option<PersistStatus>,
    },
    Unresolved(UnresolvedReason),
}

/// Title, year and DOI as known from a cached or fetched work
struct WorkFacts<'a> {
    title: Option<&'a str>,
    year: Option<i32>,
    doi: Option<&'a str>,
}

impl<'a> From<&'a Work> for WorkFacts<'a> {
    fn from(work: &'a Work) -> Self {
        Self {
            title: work.title.as_deref(),
            year: work.publication_year,
            doi: work.doi.as_deref(),
        }
    }
}

impl<'a> From<&'a WorkRecord> for WorkFacts<'a> {
    fn from(record: &'a WorkRecord) -> Self {
        Self {
            title: record.title.as_deref(),
            year: record.publication_year,
            doi: record.doi.as_deref(),
        }
    }
}

fn resolved_work(item: &LibraryItem, work_id: &str, facts: WorkFacts<'_>) -> ResolvedWork {
    ResolvedWork {
        local_key: item.key.clone(),
        work_id: work_id.to_string(),
        doi: facts
            .doi
            .map(str::to_string)
            .or_else(|| item.doi.as_deref().and_then(normalize_doi)),
        title: facts
            .title
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| item.title.clone()),
        authors: item.authors.clone(),
        year: facts.year.or(item.year),
    }
}

/// Decides, per library item, what is cached and what must be fetched
#[derive(Clone)]
pub struct CacheCoordinator {
    store: Arc<dyn CitationStore>,
    remote: RemoteWorks,
}

impl CacheCoordinator {
    pub fn new(store: Arc<dyn CitationStore>, remote: RemoteWorks) -> Self {
        Self { store, remote }
    }

    /// Resolve every item that can be resolved. Remote failures never fail
    /// the call; they show up as unresolved items. Store read failures do.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn resolve(&self, items: &[LibraryItem]) -> Result<ResolveReport> {
        let mut stats = ResolveStats {
            items: items.len(),
            ..ResolveStats::default()
        };

        // Duplicate keys share one outcome; the first occurrence is used
        let mut unique: Vec<&LibraryItem> = Vec::new();
        let mut seen = HashSet::new();
        for item in items {
            if seen.insert(item.key.as_str()) {
                unique.push(item);
            }
        }

        let keys: Vec<String> = unique.iter().map(|i| i.key.clone()).collect();
        let mappings = self.store.find_mappings(&keys).await?;

        let mapped_ids: Vec<String> = mappings
            .values()
            .map(|m| m.work_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let works = self.store.find_works(&mapped_ids).await?;

        let mut outcomes: HashMap<String, Outcome> = HashMap::with_capacity(unique.len());
        let mut repairs: Vec<(&LibraryItem, &LibraryMapping)> = Vec::new();
        let mut unmapped: Vec<(&LibraryItem, String)> = Vec::new();

        for &item in &unique {
            match mappings.get(&item.key) {
                Some(mapping) => match works.get(&mapping.work_id) {
                    Some(work) => {
                        let work = resolved_work(item, &mapping.work_id, work.into());
                        outcomes.insert(
                            item.key.clone(),
                            Outcome::Resolved { work, status: ResolveStatus::Cached, persisted: None },
                        );
                    }
                    None => repairs.push((item, mapping)),
                },
                None => match item.doi.as_deref().and_then(normalize_doi) {
                    Some(doi) => unmapped.push((item, doi)),
                    None => {
                        outcomes.insert(item.key.clone(), Outcome::Unresolved(UnresolvedReason::NoIdentifier));
                    }
                },
            }
        }

        let fully_cached = outcomes.len() - outcomes.values().filter(|o| matches!(o, Outcome::Unresolved(_))).count();
        metrics::record_cache_many(true, "mapping", mappings.len());
        metrics::record_cache_many(false, "mapping", unique.len() - mappings.len());
        metrics::record_cache_many(true, "works", fully_cached);
        metrics::record_cache_many(false, "works", repairs.len());

        tracing::info!(
            fully_cached = fully_cached,
            mapping_only = repairs.len(),
            unmapped = unmapped.len(),
            "Partitioned library items by cache state"
        );

        self.repair(&repairs, &mut outcomes, &mut stats).await;
        self.fetch_by_doi(&unmapped, &mut outcomes, &mut stats).await;

        Ok(Self::report(items, outcomes, stats))
    }

    /// Clear the caches
    #[instrument(skip(self))]
    pub async fn reset(&self, policy: ResetPolicy) -> Result<CacheCounts> {
        let cleared = self.store.reset(policy).await?;
        tracing::info!(
            mappings = cleared.mappings,
            works = cleared.works,
            references = cleared.references,
            citations = cleared.citations,
            "Cache reset"
        );
        Ok(cleared)
    }

    /// Complete mapping-only items by fetching their works by id
    async fn repair(
        &self,
        repairs: &[(&LibraryItem, &LibraryMapping)],
        outcomes: &mut HashMap<String, Outcome>,
        stats: &mut ResolveStats,
    ) {
        let mut ids: Vec<String> = Vec::new();
        for (_, mapping) in repairs {
            if !ids.contains(&mapping.work_id) {
                ids.push(mapping.work_id.clone());
            }
        }

        let mut fetched: HashMap<String, (WorkRecord, PersistStatus)> = HashMap::new();
        let mut failed: HashSet<String> = HashSet::new();

        for batch in ids.chunks(self.remote.batch_size()) {
            stats.remote_calls += 1;
            match self.remote.by_ids(batch).await {
                Ok(records) => {
                    for record in records {
                        let persisted = self.persist(&record, None, stats).await;
                        fetched.insert(record.id.clone(), (record, persisted));
                    }
                }
                Err(e) => {
                    tracing::error!(
                        batch_size = batch.len(),
                        error = %e,
                        "Repair batch failed, items left unresolved until next resolve"
                    );
                    failed.extend(batch.iter().cloned());
                }
            }
        }

        for (item, mapping) in repairs {
            let outcome = match fetched.get(&mapping.work_id) {
                Some((record, persisted)) => {
                    stats.repaired += 1;
                    Outcome::Resolved {
                        work: resolved_work(item, &record.id, record.into()),
                        status: ResolveStatus::Fetched,
                        persisted: Some(*persisted),
                    }
                }
                None if failed.contains(&mapping.work_id) => Outcome::Unresolved(UnresolvedReason::RepairFailed),
                None => {
                    tracing::warn!(work_id = %mapping.work_id, key = %item.key, "Mapped work not found upstream");
                    Outcome::Unresolved(UnresolvedReason::NotFound)
                }
            };
            outcomes.insert(item.key.clone(), outcome);
        }
    }

    /// Establish mapping and work record for unmapped items by DOI
    async fn fetch_by_doi(
        &self,
        unmapped: &[(&LibraryItem, String)],
        outcomes: &mut HashMap<String, Outcome>,
        stats: &mut ResolveStats,
    ) {
        let mut dois: Vec<String> = Vec::new();
        for (_, doi) in unmapped {
            if !dois.contains(doi) {
                dois.push(doi.clone());
            }
        }

        let mut by_doi: HashMap<String, WorkRecord> = HashMap::new();
        let mut failed: HashSet<String> = HashSet::new();

        for batch in dois.chunks(self.remote.batch_size()) {
            stats.remote_calls += 1;
            match self.remote.by_dois(batch).await {
                Ok(records) => index_by_doi(records, &mut by_doi),
                Err(e) => {
                    tracing::warn!(
                        batch_size = batch.len(),
                        error = %e,
                        "DOI batch failed, falling back to per-item lookups"
                    );
                    for doi in batch {
                        stats.remote_calls += 1;
                        match self.remote.by_dois(std::slice::from_ref(doi)).await {
                            Ok(records) => index_by_doi(records, &mut by_doi),
                            Err(e) => {
                                tracing::warn!(doi = %doi, error = %e, "DOI lookup failed");
                                failed.insert(doi.clone());
                            }
                        }
                    }
                }
            }
        }

        for (item, doi) in unmapped {
            let outcome = match by_doi.get(doi) {
                Some(record) => {
                    let mapping = NewMapping {
                        local_key: item.key.clone(),
                        doi: Some(doi.clone()),
                        title: Some(item.title.clone()),
                    };
                    let persisted = self.persist(record, Some(&mapping), stats).await;
                    stats.fetched += 1;
                    Outcome::Resolved {
                        work: resolved_work(item, &record.id, record.into()),
                        status: ResolveStatus::Fetched,
                        persisted: Some(persisted),
                    }
                }
                None if failed.contains(doi) => Outcome::Unresolved(UnresolvedReason::FetchFailed),
                None => Outcome::Unresolved(UnresolvedReason::NotFound),
            };
            outcomes.insert(item.key.clone(), outcome);
        }
    }

    async fn persist(&self, record: &WorkRecord, mapping: Option<&NewMapping>, stats: &mut ResolveStats) -> PersistStatus {
        match self.store.save_work(record, mapping).await {
            Ok(()) => PersistStatus::Cached,
            Err(e) => {
                tracing::error!(work_id = %record.id, error = %e, "Failed to cache work");
                metrics::record_cache_write_failure("works");
                stats.cache_failures += 1;
                PersistStatus::CacheFailed
            }
        }
    }

    fn report(items: &[LibraryItem], outcomes: HashMap<String, Outcome>, mut stats: ResolveStats) -> ResolveReport {
        let mut resolved = BTreeMap::new();
        let mut entries = Vec::with_capacity(items.len());

        for item in items {
            let entry = match outcomes.get(&item.key) {
                Some(Outcome::Resolved { work, status, persisted }) => {
                    resolved.insert(item.key.clone(), work.clone());
                    ItemOutcome {
                        key: item.key.clone(),
                        status: *status,
                        work_id: Some(work.work_id.clone()),
                        title: Some(work.title.clone()),
                        year: work.year,
                        reason: None,
                        persisted: *persisted,
                    }
                }
                Some(Outcome::Unresolved(reason)) => ItemOutcome {
                    key: item.key.clone(),
                    status: ResolveStatus::Unresolved,
                    work_id: None,
                    title: None,
                    year: None,
                    reason: Some(*reason),
                    persisted: None,
                },
                None => continue,
            };
            entries.push(entry);
        }

        stats.fully_cached = entries.iter().filter(|e| e.status == ResolveStatus::Cached).count();
        stats.unresolved = entries.iter().filter(|e| e.status == ResolveStatus::Unresolved).count();

        metrics::record_resolved("cached", stats.fully_cached);
        metrics::record_resolved("fetched", stats.fetched + stats.repaired);
        metrics::record_resolved("unresolved", stats.unresolved);

        tracing::info!(
            resolved = resolved.len(),
            unresolved = stats.unresolved,
            remote_calls = stats.remote_calls,
            cache_failures = stats.cache_failures,
            "Resolve finished"
        );

        ResolveReport { resolved, items: entries, stats }
    }
}

fn index_by_doi(records: Vec<WorkRecord>, by_doi: &mut HashMap<String, WorkRecord>) {
    for record in records {
        if let Some(doi) = record.doi.clone() {
            by_doi.entry(doi).or_insert(record);
        }
    }
}
