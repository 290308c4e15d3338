//! One connected bucket and the engines bound to it

use log::info;
use std::sync::Arc;

use crate::browse::{self, Listing, Preview};
use crate::bulk::{ArchiveDownloadEngine, BulkDeleteEngine, BulkMoveEngine};
use crate::config::{BucketConfig, EngineConfig};
use crate::error::Result;
use crate::storage::{ObjectStore, S3Store};
use crate::upload::UploadEngine;

/// The only long-lived state: a store bound to one bucket plus the tunables.
///
/// Engines are cheap to build and hold no state between calls; every bulk
/// operation record is handed back to the caller.
#[derive(Clone)]
pub struct BucketSession {
    store: Arc<dyn ObjectStore>,
    config: EngineConfig,
}

impl BucketSession {
    /// Validate the settings, build the S3 client and prove it can list.
    pub async fn connect(bucket: &BucketConfig, config: EngineConfig) -> Result<Self> {
        let config = config.normalized();
        let store = S3Store::new(bucket, &config)?;
        let session = Self::with_store(Arc::new(store), config);
        browse::verify_connection(session.store.as_ref()).await?;
        info!(
            "session_connected: bucket={} region={}",
            bucket.bucket, bucket.region
        );
        Ok(session)
    }

    pub fn with_store(store: Arc<dyn ObjectStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config: config.normalized(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn delete_engine(&self) -> BulkDeleteEngine {
        BulkDeleteEngine::new(self.store.clone(), &self.config)
    }

    pub fn move_engine(&self) -> BulkMoveEngine {
        BulkMoveEngine::new(self.store.clone(), &self.config)
    }

    pub fn archive_engine(&self) -> ArchiveDownloadEngine {
        ArchiveDownloadEngine::new(self.store.clone(), &self.config)
    }

    pub fn upload_engine(&self) -> UploadEngine {
        UploadEngine::new(self.store.clone(), &self.config)
    }

    pub async fn list(&self, prefix: &str, continuation_token: Option<&str>) -> Result<Listing> {
        browse::list_page(
            self.store.as_ref(),
            prefix,
            continuation_token,
            self.config.list_page_size,
        )
        .await
    }

    pub async fn child_prefixes(&self, prefix: &str) -> Result<Vec<String>> {
        browse::list_child_prefixes(self.store.as_ref(), prefix, self.config.list_page_size).await
    }

    pub async fn create_directory(&self, parent_prefix: &str, name: &str) -> Result<String> {
        browse::create_directory(self.store.as_ref(), parent_prefix, name).await
    }

    pub async fn preview(&self, key: &str) -> Result<Preview> {
        browse::preview_object(self.store.as_ref(), key, self.config.preview_text_max_bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::{NoopSink, OperationStatus};
    use crate::selection::Selection;
    use crate::test_utils::MemoryStore;

    #[tokio::test]
    async fn engines_share_the_session_store() {
        let store = Arc::new(MemoryStore::with_keys(["inbox/a.txt", "inbox/b.txt"]));
        let session = BucketSession::with_store(store.clone(), EngineConfig::default());

        session.create_directory("", "archive").await.unwrap();
        let destinations = session.child_prefixes("").await.unwrap();
        assert_eq!(destinations, vec!["archive/", "inbox/"]);

        let selection = Selection::from_items(["inbox/a.txt", "inbox/b.txt"]);
        let move_engine = session.move_engine();
        let plan = move_engine.plan_selection(&selection, "archive/").unwrap();
        assert!(!move_engine.preflight(&plan).await.has_conflicts());
        let moved = move_engine.execute(plan, &NoopSink).await;
        assert_eq!(moved.status, OperationStatus::Completed);

        let listing = session.list("archive/", None).await.unwrap();
        assert_eq!(listing.objects.len(), 2);

        let deleted = session
            .delete_engine()
            .delete_prefix("archive/", &NoopSink)
            .await
            .unwrap();
        assert_eq!(deleted.items_total, 3);
        assert!(store.keys().is_empty());
    }
}
