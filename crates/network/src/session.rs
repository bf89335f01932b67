//! Caller-owned graph context

use citeforge_common::identifiers::normalize_work_id;
use std::collections::BTreeSet;

/// The set of library-membership work ids for one graph.
///
/// Built from a library graph (or supplied by the client) and passed to
/// every expansion so that library works are never reported as external.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSession {
    library_ids: BTreeSet<String>,
}

impl GraphSession {
    /// Session over the given ids; blank ids are ignored
    pub fn new<I, S>(library_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            library_ids: library_ids
                .into_iter()
                .filter_map(|id| normalize_work_id(id.as_ref()))
                .collect(),
        }
    }

    pub fn contains(&self, work_id: &str) -> bool {
        self.library_ids.contains(work_id)
    }

    pub fn library_ids(&self) -> &BTreeSet<String> {
        &self.library_ids
    }

    pub fn len(&self) -> usize {
        self.library_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.library_ids.is_empty()
    }
}
