//! Prefix expansion by exhaustive pagination

use log::{debug, info};

use crate::error::{Error, Result};
use crate::storage::{ListRequest, ObjectStore};

/// Keys found under one prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enumeration {
    /// Every key under the prefix except the prefix's own directory marker.
    pub keys: Vec<String>,
    /// Whether a zero-byte object named exactly like the prefix exists.
    pub marker_present: bool,
}

/// Lists a prefix page by page until the backend stops returning a token.
///
/// Listings are flat (no delimiter), so nested directory markers such as
/// `photos/2024/` under `photos/` are ordinary keys here.
pub struct KeyEnumerator<'a> {
    store: &'a dyn ObjectStore,
    page_size: i32,
}

impl<'a> KeyEnumerator<'a> {
    pub fn new(store: &'a dyn ObjectStore, page_size: i32) -> Self {
        Self {
            store,
            page_size: page_size.clamp(1, 1000),
        }
    }

    /// Fetch the complete key set under `prefix`.
    ///
    /// Any failing page fails the whole enumeration; keys gathered from
    /// earlier pages are dropped.
    pub async fn enumerate_under(&self, prefix: &str) -> Result<Enumeration> {
        let mut enumeration = Enumeration::default();
        let mut continuation_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .store
                .list_objects(ListRequest {
                    prefix,
                    delimiter: None,
                    max_keys: self.page_size,
                    continuation_token: continuation_token.as_deref(),
                })
                .await
                .map_err(|source| Error::Enumeration {
                    prefix: prefix.to_string(),
                    source,
                })?;
            pages += 1;

            for object in page.objects {
                if !prefix.is_empty() && object.key == prefix {
                    enumeration.marker_present = true;
                } else {
                    enumeration.keys.push(object.key);
                }
            }

            debug!(
                "enumerate_page: prefix={} page={} keys_so_far={}",
                prefix,
                pages,
                enumeration.keys.len()
            );

            match page.next_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        info!(
            "enumerate_done: prefix={} keys={} pages={} marker={}",
            prefix,
            enumeration.keys.len(),
            pages,
            enumeration.marker_present
        );
        Ok(enumeration)
    }

    /// Keys under `prefix`, marker excluded.
    pub async fn keys_under(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.enumerate_under(prefix).await?.keys)
    }
}
