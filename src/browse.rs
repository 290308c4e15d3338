//! Directory-style browsing on top of key prefixes

use log::{debug, info};
use serde::Serialize;

use crate::bulk::normalize_prefix;
use crate::error::{Error, Result};
use crate::storage::{ListRequest, ObjectStore, StoredObject};

const DELIMITER: &str = "/";

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg"];

/// One page of a directory view.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Listing {
    pub prefix: String,
    pub prefixes: Vec<String>,
    /// Objects directly under the prefix, its own marker excluded.
    pub objects: Vec<StoredObject>,
    /// Token for "load more"; `None` on the last page.
    pub next_token: Option<String>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.objects.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub label: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Preview {
    Image {
        key: String,
        content_type: String,
        bytes: Vec<u8>,
    },
    Text {
        key: String,
        content_type: Option<String>,
        text: String,
        truncated: bool,
    },
}

/// Cheapest call that proves credentials, region and bucket all work.
pub async fn verify_connection(store: &dyn ObjectStore) -> Result<()> {
    store
        .list_objects(ListRequest {
            prefix: "",
            delimiter: Some(DELIMITER),
            max_keys: 1,
            continuation_token: None,
        })
        .await?;
    info!("connection_verified");
    Ok(())
}

pub async fn list_page(
    store: &dyn ObjectStore,
    prefix: &str,
    continuation_token: Option<&str>,
    page_size: i32,
) -> Result<Listing> {
    let page = store
        .list_objects(ListRequest {
            prefix,
            delimiter: Some(DELIMITER),
            max_keys: page_size.clamp(1, 1000),
            continuation_token,
        })
        .await?;

    let objects: Vec<StoredObject> = page
        .objects
        .into_iter()
        .filter(|object| object.key != prefix)
        .collect();

    debug!(
        "list_page: prefix={} prefixes={} objects={} more={}",
        prefix,
        page.prefixes.len(),
        objects.len(),
        page.next_token.is_some()
    );

    Ok(Listing {
        prefix: prefix.to_string(),
        prefixes: page.prefixes,
        objects,
        next_token: page.next_token,
    })
}

/// Every child directory of `prefix`, for the move destination picker.
pub async fn list_child_prefixes(
    store: &dyn ObjectStore,
    prefix: &str,
    page_size: i32,
) -> Result<Vec<String>> {
    let mut prefixes = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let listing = list_page(store, prefix, token.as_deref(), page_size).await?;
        prefixes.extend(listing.prefixes);
        match listing.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    Ok(prefixes)
}

/// Root first, then one crumb per path segment.
pub fn breadcrumbs(prefix: &str) -> Vec<Breadcrumb> {
    let mut crumbs = vec![Breadcrumb {
        label: DELIMITER.to_string(),
        prefix: String::new(),
    }];
    let mut acc = String::new();
    for segment in prefix.split('/').filter(|s| !s.is_empty()) {
        acc.push_str(segment);
        acc.push('/');
        crumbs.push(Breadcrumb {
            label: segment.to_string(),
            prefix: acc.clone(),
        });
    }
    crumbs
}

/// Letters, digits, `.`, `_` and `-` only.
pub fn is_valid_directory_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Create the zero-byte marker `parent + name + "/"` and return its key.
pub async fn create_directory(
    store: &dyn ObjectStore,
    parent_prefix: &str,
    name: &str,
) -> Result<String> {
    let name = name.trim();
    if !is_valid_directory_name(name) {
        return Err(Error::InvalidName(
            "Allowed: letters, numbers, dot, underscore, hyphen.".to_string(),
        ));
    }
    let key = format!("{}{}/", normalize_prefix(parent_prefix), name);
    store.put_object(&key, Vec::new(), None).await?;
    info!("directory_created: key={}", key);
    Ok(key)
}

fn extension(key: &str) -> Option<String> {
    let name = key.rsplit('/').next().unwrap_or(key);
    name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

pub fn is_image_key(key: &str) -> bool {
    extension(key).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Fetch an object for the preview pane.
///
/// Images come back whole; everything else is decoded as text and cut at
/// `max_text_bytes`.
pub async fn preview_object(
    store: &dyn ObjectStore,
    key: &str,
    max_text_bytes: usize,
) -> Result<Preview> {
    let body = store.get_object(key).await?;

    if is_image_key(key) {
        let content_type = if extension(key).as_deref() == Some("svg") {
            "image/svg+xml".to_string()
        } else {
            body.content_type
                .unwrap_or_else(|| "application/octet-stream".to_string())
        };
        return Ok(Preview::Image {
            key: key.to_string(),
            content_type,
            bytes: body.bytes,
        });
    }

    let truncated = body.bytes.len() > max_text_bytes;
    let shown = &body.bytes[..body.bytes.len().min(max_text_bytes)];
    Ok(Preview::Text {
        key: key.to_string(),
        content_type: body.content_type,
        text: String::from_utf8_lossy(shown).into_owned(),
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Call, MemoryStore, Op};

    #[tokio::test]
    async fn page_groups_children_and_hides_own_marker() {
        let store = MemoryStore::with_keys([
            "photos/",
            "photos/2024/a.jpg",
            "photos/2025/",
            "photos/cover.png",
            "readme.md",
        ]);

        let listing = list_page(&store, "photos/", None, 1000).await.unwrap();

        assert_eq!(listing.prefixes, vec!["photos/2024/", "photos/2025/"]);
        let keys: Vec<_> = listing.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["photos/cover.png"]);
        assert!(listing.next_token.is_none());
    }

    #[tokio::test]
    async fn load_more_follows_the_token() {
        let keys: Vec<String> = (0..5).map(|i| format!("f{}.txt", i)).collect();
        let store = MemoryStore::with_keys(keys);

        let first = list_page(&store, "", None, 3).await.unwrap();
        assert_eq!(first.objects.len(), 3);
        let second = list_page(&store, "", first.next_token.as_deref(), 3)
            .await
            .unwrap();
        assert_eq!(second.objects.len(), 2);
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn child_prefixes_span_pages() {
        let keys: Vec<String> = (0..4).map(|i| format!("root/d{}/x", i)).collect();
        let store = MemoryStore::with_keys(keys);
        let prefixes = list_child_prefixes(&store, "root/", 2).await.unwrap();
        assert_eq!(prefixes.len(), 4);
        assert_eq!(store.count(Op::List), 2);
    }

    #[tokio::test]
    async fn verify_connection_lists_a_single_key() {
        let store = MemoryStore::with_keys(["a"]);
        verify_connection(&store).await.unwrap();
        assert_eq!(
            store.calls(),
            vec![Call::List {
                prefix: String::new(),
                delimiter: Some("/".to_string()),
                token: None,
            }]
        );

        store.fail(Op::List, "");
        assert!(matches!(
            verify_connection(&store).await,
            Err(Error::Storage(_))
        ));
    }

    #[test]
    fn breadcrumbs_accumulate_segments() {
        let crumbs = breadcrumbs("a/b/");
        assert_eq!(crumbs.len(), 3);
        assert_eq!(crumbs[0].prefix, "");
        assert_eq!(crumbs[2].label, "b");
        assert_eq!(crumbs[2].prefix, "a/b/");
    }

    #[tokio::test]
    async fn create_directory_writes_a_marker() {
        let store = MemoryStore::new();
        let key = create_directory(&store, "docs/", "  reports-2026 ")
            .await
            .unwrap();
        assert_eq!(key, "docs/reports-2026/");
        assert_eq!(store.object(&key).unwrap().bytes.len(), 0);

        for bad in ["", "a/b", "spaces here", "ümlaut"] {
            assert!(matches!(
                create_directory(&store, "", bad).await,
                Err(Error::InvalidName(_))
            ));
        }
    }

    #[tokio::test]
    async fn preview_truncates_text_and_types_svg() {
        let store = MemoryStore::new();
        store.insert("notes.txt", b"abcdefghij".to_vec());
        store.insert_typed("logo.SVG", b"<svg/>".to_vec(), "text/plain");

        match preview_object(&store, "notes.txt", 4).await.unwrap() {
            Preview::Text {
                text, truncated, ..
            } => {
                assert_eq!(text, "abcd");
                assert!(truncated);
            }
            other => panic!("unexpected preview: {other:?}"),
        }

        match preview_object(&store, "logo.SVG", 4).await.unwrap() {
            Preview::Image {
                content_type,
                bytes,
                ..
            } => {
                assert_eq!(content_type, "image/svg+xml");
                assert_eq!(bytes, b"<svg/>");
            }
            other => panic!("unexpected preview: {other:?}"),
        }
    }
}
