//! Selected keys and directory prefixes

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::bulk::KeyEnumerator;
use crate::error::Result;

/// What the user has ticked in the listing.
///
/// An entry ending in `/` is a directory prefix, anything else is an object key.
/// Both sets are deduplicated; prefixes are expanded only when an operation
/// resolves the selection, never from a cached listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    keys: BTreeSet<String>,
    prefixes: BTreeSet<String>,
}

/// A selection expanded against the live bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSelection {
    /// Union of direct keys and every key under the selected prefixes, sorted
    /// and without duplicates. Directory markers of the selected prefixes are
    /// not included.
    pub keys: Vec<String>,
    /// Selected prefixes whose own zero-byte marker object exists.
    pub markers: Vec<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selection = Self::new();
        for item in items {
            selection.insert(item);
        }
        selection
    }

    /// Returns `false` if the entry was already selected or is empty.
    pub fn insert(&mut self, item: impl Into<String>) -> bool {
        let item = item.into();
        if item.is_empty() {
            return false;
        }
        if item.ends_with('/') {
            self.prefixes.insert(item)
        } else {
            self.keys.insert(item)
        }
    }

    pub fn remove(&mut self, item: &str) -> bool {
        self.keys.remove(item) || self.prefixes.remove(item)
    }

    /// Flip one entry; returns whether it is selected afterwards.
    pub fn toggle(&mut self, item: &str) -> bool {
        if self.remove(item) {
            false
        } else {
            self.insert(item)
        }
    }

    pub fn contains(&self, item: &str) -> bool {
        self.keys.contains(item) || self.prefixes.contains(item)
    }

    /// Select (or deselect) every entry of the current page.
    pub fn set_page<'i, I>(&mut self, items: I, selected: bool)
    where
        I: IntoIterator<Item = &'i str>,
    {
        for item in items {
            if selected {
                self.insert(item);
            } else {
                self.remove(item);
            }
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.prefixes.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len() + self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.prefixes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }

    pub fn has_prefixes(&self) -> bool {
        !self.prefixes.is_empty()
    }

    /// Moves apply to object keys only.
    pub fn can_move(&self) -> bool {
        !self.keys.is_empty() && self.prefixes.is_empty()
    }

    /// The single directly selected key, when nothing else is selected.
    pub fn single_key(&self) -> Option<&str> {
        if self.keys.len() == 1 && self.prefixes.is_empty() {
            self.keys.iter().next().map(String::as_str)
        } else {
            None
        }
    }

    /// Expand every prefix live and merge with the direct keys.
    ///
    /// A failure to enumerate any prefix fails the whole resolution.
    pub async fn resolve(&self, enumerator: &KeyEnumerator<'_>) -> Result<ResolvedSelection> {
        let mut keys = self.keys.clone();
        let mut markers = Vec::new();
        for prefix in &self.prefixes {
            let enumeration = enumerator.enumerate_under(prefix).await?;
            if enumeration.marker_present {
                markers.push(prefix.clone());
            }
            keys.extend(enumeration.keys);
        }
        Ok(ResolvedSelection {
            keys: keys.into_iter().collect(),
            markers,
        })
    }
}
