//! OpenAlex HTTP client

use super::{BibliographicClient, WorkRecord, SERVICE_NAME};
use crate::config::{OpenAlexConfig, MAX_BATCH_SIZE};
use crate::errors::{AppError, Result};
use crate::identifiers::normalize_work_id;
use crate::metrics;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};

/// Fields requested from `/works`
const SELECT_FIELDS: &str =
    "id,doi,title,display_name,publication_year,authorships,referenced_works,cited_by_count";

/// OpenAlex caps `per-page` at 200
const MAX_PER_PAGE: usize = 200;

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<OpenAlexWork>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexWork {
    id: String,
    doi: Option<String>,
    title: Option<String>,
    display_name: Option<String>,
    publication_year: Option<i32>,
    #[serde(default)]
    authorships: Vec<Authorship>,
    #[serde(default)]
    referenced_works: Vec<String>,
    cited_by_count: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    display_name: Option<String>,
}

impl OpenAlexWork {
    fn into_record(self) -> Option<WorkRecord> {
        WorkRecord {
            id: self.id,
            doi: self.doi,
            title: self.title.or(self.display_name),
            publication_year: self.publication_year,
            authors: self
                .authorships
                .into_iter()
                .filter_map(|a| a.author.and_then(|a| a.display_name))
                .collect(),
            referenced_works: self.referenced_works,
            cited_by_count: self.cited_by_count,
        }
        .normalized()
    }
}

/// Client for the OpenAlex works API
pub struct OpenAlexClient {
    client: reqwest::Client,
    base_url: String,
    mailto: Option<String>,
    limiter: DefaultDirectRateLimiter,
    max_retry: Duration,
}

impl OpenAlexClient {
    /// Create a new OpenAlex client
    pub fn new(config: &OpenAlexConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("citeforge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            mailto: config.mailto.clone().filter(|m| !m.trim().is_empty()),
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            max_retry: Duration::from_secs(config.max_retry_secs),
        })
    }

    /// Query `/works` with a single filter expression
    async fn query_works(&self, filter: &str, per_page: usize, endpoint: &str) -> Result<Vec<WorkRecord>> {
        let url = format!("{}/works", self.base_url);
        let per_page = per_page.clamp(1, MAX_PER_PAGE).to_string();

        let mut query: Vec<(&str, &str)> = vec![
            ("filter", filter),
            ("per-page", per_page.as_str()),
            ("select", SELECT_FIELDS),
        ];
        if let Some(mailto) = self.mailto.as_deref() {
            query.push(("mailto", mailto));
        }

        let started = Instant::now();
        let result = self.fetch_with_retry(&url, &query).await;
        metrics::record_remote_call(endpoint, started, result.is_ok());

        let response = result?;
        Ok(response
            .results
            .into_iter()
            .filter_map(OpenAlexWork::into_record)
            .collect())
    }

    /// Issue one request, retrying transient failures with exponential backoff
    async fn fetch_with_retry(&self, url: &str, query: &[(&str, &str)]) -> Result<WorksResponse> {
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(250),
            max_elapsed_time: Some(self.max_retry),
            ..ExponentialBackoff::default()
        };

        retry(policy, || async move {
            self.limiter.until_ready().await;

            self.send(url, query).await.map_err(|e| {
                if e.is_transient() {
                    tracing::warn!(url = url, error = %e, "OpenAlex request failed, retrying");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }

    async fn send(&self, url: &str, query: &[(&str, &str)]) -> Result<WorksResponse> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            return Err(AppError::UpstreamRateLimited {
                service: SERVICE_NAME.to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                service: SERVICE_NAME.to_string(),
                status: Some(status.as_u16()),
                message: format!("API error {}: {}", status, body),
            });
        }

        response.json::<WorksResponse>().await.map_err(|e| AppError::Upstream {
            service: SERVICE_NAME.to_string(),
            status: None,
            message: format!("Failed to parse response: {}", e),
        })
    }
}

/// `|` and `,` are filter syntax and cannot appear inside a value
fn is_filter_safe(value: &str) -> bool {
    !value.is_empty() && !value.contains(['|', ','])
}

/// Values that can go into a `kind:` filter; the rest are logged and skipped
fn filter_values<'a>(kind: &str, chunk: &'a [String]) -> Vec<&'a str> {
    chunk
        .iter()
        .map(String::as_str)
        .filter(|value| {
            let safe = is_filter_safe(value);
            if !safe {
                tracing::warn!(filter = kind, value = %value, "Skipping value that cannot be expressed in an OpenAlex filter");
            }
            safe
        })
        .collect()
}

#[async_trait]
impl BibliographicClient for OpenAlexClient {
    async fn get_by_dois(&self, dois: &[String]) -> Result<Vec<WorkRecord>> {
        let mut records = Vec::with_capacity(dois.len());

        for chunk in dois.chunks(MAX_BATCH_SIZE) {
            let values = filter_values("doi", chunk);
            if values.is_empty() {
                continue;
            }
            let filter = format!("doi:{}", values.join("|"));
            records.extend(self.query_works(&filter, values.len(), "works_by_doi").await?);
        }

        Ok(records)
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<WorkRecord>> {
        let mut records = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(MAX_BATCH_SIZE) {
            let values = filter_values("openalex", chunk);
            if values.is_empty() {
                continue;
            }
            let filter = format!("openalex:{}", values.join("|"));
            records.extend(self.query_works(&filter, values.len(), "works_by_id").await?);
        }

        Ok(records)
    }

    async fn get_citing_works(&self, work_id: &str, limit: usize) -> Result<Vec<WorkRecord>> {
        let work_id = normalize_work_id(work_id).ok_or_else(|| AppError::missing("work_id"))?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let filter = format!("cites:{}", work_id);
        let mut records = self.query_works(&filter, limit, "citing_works").await?;
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_record_conversion() {
        let json = r#"{
            "results": [{
                "id": "https://openalex.org/W2741809807",
                "doi": "https://doi.org/10.7717/PEERJ.4375",
                "title": null,
                "display_name": "The state of OA",
                "publication_year": 2018,
                "authorships": [
                    {"author": {"display_name": "Heather Piwowar"}},
                    {"author": {"display_name": "Jason Priem"}},
                    {"author": null}
                ],
                "referenced_works": ["https://openalex.org/W1", "https://openalex.org/W2741809807"],
                "cited_by_count": 900
            }]
        }"#;

        let response: WorksResponse = serde_json::from_str(json).unwrap();
        let records: Vec<WorkRecord> = response.results.into_iter().filter_map(OpenAlexWork::into_record).collect();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, "W2741809807");
        assert_eq!(record.doi.as_deref(), Some("10.7717/peerj.4375"));
        assert_eq!(record.title.as_deref(), Some("The state of OA"));
        assert_eq!(record.authors, vec!["Heather Piwowar", "Jason Priem"]);
        assert_eq!(record.referenced_works, vec!["W1"]);
    }

    #[test]
    fn test_missing_arrays_default_to_empty() {
        let json = r#"{"results": [{"id": "W5"}]}"#;
        let response: WorksResponse = serde_json::from_str(json).unwrap();
        let record = response.results.into_iter().next().and_then(OpenAlexWork::into_record).unwrap();
        assert!(record.referenced_works.is_empty());
        assert!(record.authors.is_empty());
    }

    #[test]
    fn test_filter_safety() {
        assert!(is_filter_safe("10.1/abc"));
        assert!(!is_filter_safe("10.1/a|b"));
        assert!(!is_filter_safe("10.1/a,b"));
        assert!(!is_filter_safe(""));
    }

    #[test]
    fn test_unsafe_values_are_dropped_from_batch() {
        let chunk = vec![
            "10.1/keep".to_string(),
            "10.1/a|b".to_string(),
            "".to_string(),
            "10.1/a,b".to_string(),
            "10.2/also".to_string(),
        ];
        assert_eq!(filter_values("doi", &chunk), vec!["10.1/keep", "10.2/also"]);

        let unsafe_only = vec!["W1,W2".to_string()];
        assert!(filter_values("openalex", &unsafe_only).is_empty());
    }

    #[tokio::test]
    async fn test_zero_limit_makes_no_request() {
        let config = OpenAlexConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..OpenAlexConfig::default()
        };
        let client = OpenAlexClient::new(&config).unwrap();
        let records = client.get_citing_works("W1", 0).await.unwrap();
        assert!(records.is_empty());
    }
}
