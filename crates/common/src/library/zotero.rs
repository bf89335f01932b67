//! Zotero desktop local API client

use super::{LibraryItem, LibraryScope, LibrarySource};
use crate::config::LibraryConfig;
use crate::errors::{AppError, Result};
use crate::identifiers::{extract_year, normalize_doi};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Items requested per page
const PAGE_SIZE: usize = 100;

/// Item types that are not bibliographic entries
const SKIPPED_TYPES: &[&str] = &["attachment", "note", "annotation"];

#[derive(Debug, Deserialize)]
struct ZoteroItem {
    key: String,
    #[serde(default)]
    data: ZoteroData,
}

#[derive(Debug, Default, Deserialize)]
struct ZoteroData {
    #[serde(rename = "itemType", default)]
    item_type: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    creators: Vec<Creator>,
    #[serde(default)]
    date: Option<String>,
    #[serde(rename = "DOI", default)]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Creator {
    #[serde(rename = "lastName")]
    last_name: Option<String>,
    name: Option<String>,
}

/// Client for `http://127.0.0.1:23119/api`
pub struct ZoteroLibrary {
    client: reqwest::Client,
    base_url: String,
}

impl ZoteroLibrary {
    pub fn new(config: &LibraryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn items_url(&self, scope: &LibraryScope) -> String {
        match scope {
            LibraryScope::User => format!("{}/users/0/items", self.base_url),
            LibraryScope::Group(id) => format!("{}/groups/{}/items", self.base_url, id),
        }
    }

    async fn fetch_page(&self, url: &str, start: usize) -> Result<Vec<ZoteroItem>> {
        let start = start.to_string();
        let limit = PAGE_SIZE.to_string();

        let response = self
            .client
            .get(url)
            .query(&[("start", start.as_str()), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| AppError::LibraryUnavailable {
                message: format!(
                    "{} ({}). Make sure Zotero is open and its local API is enabled.",
                    e, url
                ),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LibraryUnavailable {
                message: format!("Zotero returned {}: {}", status, body),
            });
        }

        Ok(response.json().await?)
    }
}

/// Last names of the first two creators, "et al." beyond two
fn format_authors(creators: &[Creator]) -> String {
    let names: Vec<&str> = creators
        .iter()
        .take(2)
        .filter_map(|c| c.last_name.as_deref().or(c.name.as_deref()))
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect();

    if names.is_empty() {
        return "No authors".to_string();
    }

    let mut result = names.join(", ");
    if creators.len() > 2 {
        result.push_str(" et al.");
    }
    result
}

impl ZoteroItem {
    fn is_bibliographic(&self) -> bool {
        match self.data.item_type.as_deref() {
            Some(kind) => !SKIPPED_TYPES.contains(&kind),
            None => true,
        }
    }

    fn into_library_item(self) -> LibraryItem {
        let title = self
            .data
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        LibraryItem {
            key: self.key,
            title,
            authors: Some(format_authors(&self.data.creators)),
            year: self.data.date.as_deref().and_then(extract_year),
            doi: self.data.doi.as_deref().and_then(normalize_doi),
            item_type: self.data.item_type,
        }
    }
}

#[async_trait]
impl LibrarySource for ZoteroLibrary {
    async fn list_items(&self, scope: &LibraryScope) -> Result<Vec<LibraryItem>> {
        let url = self.items_url(scope);
        let mut items = Vec::new();
        let mut start = 0;

        loop {
            let page = self.fetch_page(&url, start).await?;
            let fetched = page.len();

            items.extend(
                page.into_iter()
                    .filter(ZoteroItem::is_bibliographic)
                    .map(ZoteroItem::into_library_item),
            );

            if fetched < PAGE_SIZE {
                break;
            }
            start += fetched;
        }

        tracing::info!(scope = %scope, items = items.len(), "Loaded library items");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<LibraryItem> {
        let items: Vec<ZoteroItem> = serde_json::from_str(json).unwrap();
        items
            .into_iter()
            .filter(ZoteroItem::is_bibliographic)
            .map(ZoteroItem::into_library_item)
            .collect()
    }

    #[test]
    fn test_item_conversion() {
        let items = parse(r#"[
            {"key": "AAA", "data": {
                "itemType": "journalArticle",
                "title": "Citation graphs",
                "creators": [{"lastName": "Garfield"}, {"name": "OpenAlex Team"}, {"lastName": "Priem"}],
                "date": "March 1955",
                "DOI": "https://doi.org/10.1126/SCIENCE.122.3159.108"
            }},
            {"key": "BBB", "data": {"itemType": "attachment", "title": "PDF"}},
            {"key": "CCC", "data": {"itemType": "book", "creators": []}}
        ]"#);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].authors.as_deref(), Some("Garfield, OpenAlex Team et al."));
        assert_eq!(items[0].year, Some(1955));
        assert_eq!(items[0].doi.as_deref(), Some("10.1126/science.122.3159.108"));

        assert_eq!(items[1].title, "Untitled");
        assert_eq!(items[1].authors.as_deref(), Some("No authors"));
        assert!(items[1].doi.is_none());
    }

    #[test]
    fn test_items_url() {
        let library = ZoteroLibrary::new(&LibraryConfig::default()).unwrap();
        assert_eq!(library.items_url(&LibraryScope::User), "http://127.0.0.1:23119/api/users/0/items");
        assert_eq!(
            library.items_url(&LibraryScope::Group("9".into())),
            "http://127.0.0.1:23119/api/groups/9/items"
        );
    }

    #[tokio::test]
    async fn test_unreachable_library() {
        let config = LibraryConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..LibraryConfig::default()
        };
        let library = ZoteroLibrary::new(&config).unwrap();
        let err = library.list_items(&LibraryScope::User).await.unwrap_err();
        assert!(matches!(err, AppError::LibraryUnavailable { .. }));
    }
}
