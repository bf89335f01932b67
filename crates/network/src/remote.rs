//! Bounded access to the bibliographic service
//!
//! Wraps every remote call in a timeout. Expiry surfaces as
//! `UpstreamTimeout`, a transient failure, never as an empty result.

use citeforge_common::config::MAX_BATCH_SIZE;
use citeforge_common::errors::{AppError, Result};
use citeforge_common::openalex::{BibliographicClient, WorkRecord, SERVICE_NAME};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct RemoteWorks {
    client: Arc<dyn BibliographicClient>,
    timeout: Duration,
    batch_size: usize,
}

impl RemoteWorks {
    pub fn new(client: Arc<dyn BibliographicClient>, timeout: Duration, batch_size: usize) -> Self {
        Self {
            client,
            timeout,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    /// Identifiers per batched call, never above 50
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn by_dois(&self, dois: &[String]) -> Result<Vec<WorkRecord>> {
        debug_assert!(dois.len() <= self.batch_size);
        self.bounded(self.client.get_by_dois(dois)).await
    }

    pub async fn by_ids(&self, ids: &[String]) -> Result<Vec<WorkRecord>> {
        debug_assert!(ids.len() <= self.batch_size);
        self.bounded(self.client.get_by_ids(ids)).await
    }

    pub async fn citing(&self, work_id: &str, limit: usize) -> Result<Vec<WorkRecord>> {
        self.bounded(self.client.get_citing_works(work_id, limit)).await
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::UpstreamTimeout {
                service: SERVICE_NAME.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}
