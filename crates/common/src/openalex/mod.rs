//! Bibliographic service abstraction
//!
//! The core never talks HTTP directly. It goes through [`BibliographicClient`],
//! implemented by:
//! - [`OpenAlexClient`] for the public OpenAlex API
//! - [`MockBibliographicClient`] for tests and offline runs

mod client;
mod mock;

pub use client::OpenAlexClient;
pub use mock::{Endpoint, MockBibliographicClient, RemoteCall};

use crate::config::OpenAlexConfig;
use crate::errors::Result;
use crate::identifiers::{normalize_doi, normalize_work_id};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Service name used in errors and logs
pub const SERVICE_NAME: &str = "openalex";

/// Trait for the remote bibliographic graph service.
///
/// Implementations may return fewer records than requested and in any order.
#[async_trait]
pub trait BibliographicClient: Send + Sync {
    /// Look up works by DOI
    async fn get_by_dois(&self, dois: &[String]) -> Result<Vec<WorkRecord>>;

    /// Look up works by external work id
    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<WorkRecord>>;

    /// Works that cite `work_id`, at most `limit` of them
    async fn get_citing_works(&self, work_id: &str, limit: usize) -> Result<Vec<WorkRecord>>;
}

/// A work as returned by the bibliographic service, identifiers normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRecord {
    pub id: String,
    pub doi: Option<String>,
    pub title: Option<String>,
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub referenced_works: Vec<String>,
    pub cited_by_count: Option<i32>,
}

impl WorkRecord {
    /// Minimal record with just an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doi: None,
            title: None,
            publication_year: None,
            authors: Vec::new(),
            referenced_works: Vec::new(),
            cited_by_count: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.publication_year = Some(year);
        self
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.referenced_works = references.into_iter().map(Into::into).collect();
        self
    }

    /// Canonical form: normalized ids, deduplicated references, no self-reference.
    pub fn normalized(mut self) -> Option<Self> {
        self.id = normalize_work_id(&self.id)?;
        self.doi = self.doi.as_deref().and_then(normalize_doi);

        let mut seen = HashSet::new();
        let own_id = self.id.clone();
        self.referenced_works = self
            .referenced_works
            .iter()
            .filter_map(|r| normalize_work_id(r))
            .filter(|r| *r != own_id && seen.insert(r.clone()))
            .collect();

        Some(self)
    }

    /// "First, Second et al." from the first two author names
    pub fn author_summary(&self) -> Option<String> {
        summarize_authors(&self.authors)
    }
}

/// Join the first two names, adding "et al." when there are more.
pub fn summarize_authors<S: AsRef<str>>(names: &[S]) -> Option<String> {
    let names: Vec<&str> = names
        .iter()
        .map(|n| n.as_ref().trim())
        .filter(|n| !n.is_empty())
        .collect();

    if names.is_empty() {
        return None;
    }

    let mut summary = names.iter().take(2).copied().collect::<Vec<_>>().join(", ");
    if names.len() > 2 {
        summary.push_str(" et al.");
    }
    Some(summary)
}

/// Create a bibliographic client based on configuration
pub fn create_client(config: &OpenAlexConfig) -> Result<Arc<dyn BibliographicClient>> {
    match config.provider.as_str() {
        "openalex" => Ok(Arc::new(OpenAlexClient::new(config)?)),
        "mock" => Ok(Arc::new(MockBibliographicClient::new())),
        other => {
            tracing::warn!(provider = other, "Unknown bibliographic provider, using openalex");
            Ok(Arc::new(OpenAlexClient::new(config)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_drops_self_and_duplicate_references() {
        let record = WorkRecord::new("https://openalex.org/W1")
            .with_doi("https://doi.org/10.1/ABC")
            .with_references(["https://openalex.org/W2", "W1", "w2", "W3"])
            .normalized()
            .unwrap();

        assert_eq!(record.id, "W1");
        assert_eq!(record.doi.as_deref(), Some("10.1/abc"));
        assert_eq!(record.referenced_works, vec!["W2", "W3"]);
    }

    #[test]
    fn test_normalized_rejects_empty_id() {
        assert!(WorkRecord::new("  ").normalized().is_none());
    }

    #[test]
    fn test_author_summary() {
        let two = WorkRecord::new("W1").with_authors(["Ada Lovelace", "Alan Turing"]);
        assert_eq!(two.author_summary().as_deref(), Some("Ada Lovelace, Alan Turing"));

        let three = WorkRecord::new("W1").with_authors(["A", "B", "C"]);
        assert_eq!(three.author_summary().as_deref(), Some("A, B et al."));

        assert_eq!(WorkRecord::new("W1").author_summary(), None);
    }

    #[test]
    fn test_create_mock_client() {
        let config = OpenAlexConfig {
            provider: "mock".to_string(),
            ..OpenAlexConfig::default()
        };
        assert!(create_client(&config).is_ok());
    }
}
