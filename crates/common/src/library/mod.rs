//! Local reference library access
//!
//! Items come from a [`LibrarySource`]:
//! - [`ZoteroLibrary`] reads the Zotero desktop local API
//! - [`StaticLibrary`] serves a fixed list

mod zotero;

pub use zotero::ZoteroLibrary;

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// One item of the local library. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct LibraryItem {
    /// Stable local key
    #[validate(length(min = 1, max = 256))]
    pub key: String,

    #[serde(default = "default_title")]
    pub title: String,

    /// Author summary ("Smith, Jones et al.")
    #[serde(default)]
    pub authors: Option<String>,

    #[serde(default)]
    pub year: Option<i32>,

    /// Normalized DOI, the item's external identifier
    #[serde(default)]
    pub doi: Option<String>,

    #[serde(default)]
    pub item_type: Option<String>,
}

fn default_title() -> String { "Untitled".to_string() }

impl LibraryItem {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            authors: None,
            year: None,
            doi: None,
            item_type: None,
        }
    }

    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_authors(mut self, authors: impl Into<String>) -> Self {
        self.authors = Some(authors.into());
        self
    }
}

/// Which part of the library to list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LibraryScope {
    /// The local user's library
    #[default]
    User,
    /// A group library
    Group(String),
}

impl FromStr for LibraryScope {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("user") {
            return Ok(Self::User);
        }
        match s.split_once(':') {
            Some((kind, id)) if kind.eq_ignore_ascii_case("group") && !id.trim().is_empty() => {
                Ok(Self::Group(id.trim().to_string()))
            }
            _ => Err(AppError::Validation {
                message: format!("unknown library scope '{}', expected 'user' or 'group:<id>'", s),
                field: Some("scope".to_string()),
            }),
        }
    }
}

impl fmt::Display for LibraryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Group(id) => write!(f, "group:{}", id),
        }
    }
}

/// Read-only listing of library items
#[async_trait]
pub trait LibrarySource: Send + Sync {
    /// Every item in `scope`, attachments and notes excluded
    async fn list_items(&self, scope: &LibraryScope) -> Result<Vec<LibraryItem>>;
}

/// Library with a fixed set of items
#[derive(Debug, Clone, Default)]
pub struct StaticLibrary {
    items: Vec<LibraryItem>,
}

impl StaticLibrary {
    pub fn new(items: Vec<LibraryItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl LibrarySource for StaticLibrary {
    async fn list_items(&self, _scope: &LibraryScope) -> Result<Vec<LibraryItem>> {
        Ok(self.items.clone())
    }
}
