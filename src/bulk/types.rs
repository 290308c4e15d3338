//! Bulk operation record and status definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Error code recorded for every key of a delete batch whose request failed.
pub const BATCH_ERROR_CODE: &str = "BatchError";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OperationStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "partially_failed")]
    PartiallyFailed,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "pending"),
            OperationStatus::Running => write!(f, "running"),
            OperationStatus::PartiallyFailed => write!(f, "partially_failed"),
            OperationStatus::Completed => write!(f, "completed"),
            OperationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationStatus::PartiallyFailed
                | OperationStatus::Completed
                | OperationStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Delete,
    Move,
    Archive,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Delete => write!(f, "delete"),
            OperationKind::Move => write!(f, "move"),
            OperationKind::Archive => write!(f, "archive"),
        }
    }
}

/// One key that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub key: String,
    /// Set for moves only.
    pub destination_key: Option<String>,
    pub error_code: String,
    pub error_message: String,
}

impl ItemFailure {
    pub fn new(
        key: impl Into<String>,
        error_code: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            destination_key: None,
            error_code: error_code.into(),
            error_message: error_message.into(),
        }
    }

    pub fn from_storage(key: impl Into<String>, err: &StorageError) -> Self {
        Self::new(key, err.code.clone(), err.message.clone())
    }

    pub fn with_destination(mut self, destination_key: impl Into<String>) -> Self {
        self.destination_key = Some(destination_key.into());
        self
    }
}

/// Progress-and-failure record of one bulk action, owned by the caller.
///
/// Retrying never mutates a finished record into a new run; the retry entry
/// points hand back a fresh record (archives resume theirs, see
/// `ArchiveJob::retry_failed`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOperation {
    pub kind: OperationKind,
    pub items_total: usize,
    pub items_done: usize,
    pub failures: Vec<ItemFailure>,
    pub status: OperationStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BulkOperation {
    pub fn new(kind: OperationKind, items_total: usize) -> Self {
        Self {
            kind,
            items_total,
            items_done: 0,
            failures: Vec::new(),
            status: OperationStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Keys to resubmit for a retry, in failure order.
    pub fn failed_keys(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.key.clone()).collect()
    }

    pub fn percent(&self) -> u32 {
        if self.items_total == 0 {
            return 100;
        }
        ((self.items_done as f64 / self.items_total as f64) * 100.0).floor() as u32
    }

    /// Terminal status derived from the failure list.
    pub(crate) fn settle(&mut self) {
        self.status = if self.failures.is_empty() {
            OperationStatus::Completed
        } else {
            OperationStatus::PartiallyFailed
        };
        self.finished_at = Some(Utc::now());
    }

    /// The user closed the progress view. In-flight calls are not interrupted.
    pub fn dismiss(&mut self) {
        if self.status != OperationStatus::Cancelled {
            self.status = OperationStatus::Cancelled;
            self.finished_at.get_or_insert_with(Utc::now);
        }
    }

    pub fn summary(&self) -> String {
        let verb = match self.kind {
            OperationKind::Delete => "delete",
            OperationKind::Move => "move",
            OperationKind::Archive => "download",
        };
        match self.status {
            OperationStatus::Completed => match self.kind {
                OperationKind::Delete => format!("Deleted {} item(s).", self.items_total),
                OperationKind::Move => format!("Moved {} item(s).", self.items_total),
                OperationKind::Archive => format!("Fetched {} item(s).", self.items_total),
            },
            OperationStatus::PartiallyFailed => format!(
                "{} item(s) failed to {}. Review and retry.",
                self.failures.len(),
                verb
            ),
            OperationStatus::Cancelled => {
                format!("Dismissed {} of {} item(s).", verb, self.items_total)
            }
            OperationStatus::Pending | OperationStatus::Running => format!(
                "Processed {} of {} item(s)…",
                self.items_done, self.items_total
            ),
        }
    }
}
