//! In-memory bibliographic service for tests and offline runs

use super::{BibliographicClient, WorkRecord, SERVICE_NAME};
use crate::errors::{AppError, Result};
use crate::identifiers::{normalize_doi, normalize_work_id};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// Remote endpoint kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Dois,
    Ids,
    Citing,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub endpoint: Endpoint,
    pub identifiers: Vec<String>,
}

#[derive(Default)]
struct MockState {
    works: HashMap<String, WorkRecord>,
    citing: HashMap<String, Vec<String>>,
    calls: Vec<RemoteCall>,
    failing_endpoints: HashSet<Endpoint>,
    failing_identifiers: HashSet<String>,
    delay: Option<Duration>,
}

/// Mock client backed by a works table.
///
/// Every call is recorded. Failures can be injected per endpoint or per
/// identifier; a batch containing a failing identifier fails as a whole.
#[derive(Default)]
pub struct MockBibliographicClient {
    state: Mutex<MockState>,
}

impl MockBibliographicClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a work to the remote table
    pub fn insert(&self, record: WorkRecord) {
        if let Some(record) = record.normalized() {
            self.lock().works.insert(record.id.clone(), record);
        }
    }

    /// Register `citer` as a work citing `work_id`
    pub fn add_citing(&self, work_id: &str, citer: WorkRecord) {
        let (Some(work_id), Some(citer)) = (normalize_work_id(work_id), citer.normalized()) else {
            return;
        };
        let mut state = self.lock();
        state.citing.entry(work_id).or_default().push(citer.id.clone());
        state.works.insert(citer.id.clone(), citer);
    }

    /// Fail every call to `endpoint`
    pub fn fail_endpoint(&self, endpoint: Endpoint) {
        self.lock().failing_endpoints.insert(endpoint);
    }

    /// Fail any call that includes `identifier`
    pub fn fail_identifier(&self, identifier: &str) {
        let key = identifier.trim().to_lowercase();
        self.lock().failing_identifiers.insert(key);
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_endpoints.clear();
        state.failing_identifiers.clear();
    }

    /// Delay every response
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    /// All calls so far
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Number of calls so far
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Number of calls to one endpoint
    pub fn calls_to(&self, endpoint: Endpoint) -> usize {
        self.lock().calls.iter().filter(|c| c.endpoint == endpoint).count()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A poisoned lock only means another test thread panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a call and decide whether it fails. Returns the configured delay.
    fn begin_call(&self, endpoint: Endpoint, identifiers: &[String]) -> Result<Option<Duration>> {
        let mut state = self.lock();
        state.calls.push(RemoteCall {
            endpoint,
            identifiers: identifiers.to_vec(),
        });

        let failing = state.failing_endpoints.contains(&endpoint)
            || identifiers
                .iter()
                .any(|id| state.failing_identifiers.contains(&id.trim().to_lowercase()));

        if failing {
            return Err(AppError::Upstream {
                service: SERVICE_NAME.to_string(),
                status: Some(503),
                message: format!("injected failure for {:?}", endpoint),
            });
        }

        Ok(state.delay)
    }

    async fn pause(delay: Option<Duration>) {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl BibliographicClient for MockBibliographicClient {
    async fn get_by_dois(&self, dois: &[String]) -> Result<Vec<WorkRecord>> {
        let delay = self.begin_call(Endpoint::Dois, dois)?;
        Self::pause(delay).await;

        let wanted: HashSet<String> = dois.iter().filter_map(|d| normalize_doi(d)).collect();
        let state = self.lock();
        Ok(state
            .works
            .values()
            .filter(|w| w.doi.as_ref().is_some_and(|d| wanted.contains(d)))
            .cloned()
            .collect())
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<WorkRecord>> {
        let delay = self.begin_call(Endpoint::Ids, ids)?;
        Self::pause(delay).await;

        let state = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| normalize_work_id(id))
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|id| state.works.get(&id).cloned())
            .collect())
    }

    async fn get_citing_works(&self, work_id: &str, limit: usize) -> Result<Vec<WorkRecord>> {
        let delay = self.begin_call(Endpoint::Citing, &[work_id.to_string()])?;
        Self::pause(delay).await;

        let Some(work_id) = normalize_work_id(work_id) else {
            return Err(AppError::missing("work_id"));
        };

        let state = self.lock();
        Ok(state
            .citing
            .get(&work_id)
            .map(|ids| {
                ids.iter()
                    .take(limit)
                    .filter_map(|id| state.works.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_by_doi_and_id() {
        let mock = MockBibliographicClient::new();
        mock.insert(WorkRecord::new("W1").with_doi("10.1/a").with_title("A"));
        mock.insert(WorkRecord::new("W2").with_doi("10.1/b").with_title("B"));

        let by_doi = mock.get_by_dois(&["https://doi.org/10.1/A".to_string()]).await.unwrap();
        assert_eq!(by_doi.len(), 1);
        assert_eq!(by_doi[0].id, "W1");

        let by_id = mock.get_by_ids(&["W2".to_string(), "W9".to_string()]).await.unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let mock = MockBibliographicClient::new();
        mock.insert(WorkRecord::new("W1").with_doi("10.1/a"));
        mock.fail_identifier("10.1/a");

        let err = mock.get_by_dois(&["10.1/a".to_string()]).await.unwrap_err();
        assert!(err.is_transient());

        mock.clear_failures();
        mock.fail_endpoint(Endpoint::Citing);
        assert!(mock.get_citing_works("W1", 5).await.is_err());
        assert_eq!(mock.calls_to(Endpoint::Citing), 1);
    }

    #[tokio::test]
    async fn test_citing_respects_limit() {
        let mock = MockBibliographicClient::new();
        for i in 0..5 {
            mock.add_citing("W1", WorkRecord::new(format!("W{}", 100 + i)));
        }
        let citing = mock.get_citing_works("W1", 3).await.unwrap();
        assert_eq!(citing.len(), 3);
    }
}
