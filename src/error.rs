//! Error types shared by the storage layer and the bulk engines

use serde::Serialize;
use thiserror::Error;

/// Error reported by an object-storage backend call.
///
/// `code` carries the backend's own error code (`NoSuchKey`, `AccessDenied`, ...)
/// or one of the transport codes `NetworkingError`, `TimeoutError`,
/// `ResponseError`, `ConstructionFailure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{code}: {message}")]
pub struct StorageError {
    pub code: String,
    pub message: String,
    pub status: Option<u16>,
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

impl StorageError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404) || matches!(self.code.as_str(), "NotFound" | "NoSuchKey")
    }

    pub fn category(&self) -> ErrorCategory {
        match (self.status, self.code.as_str()) {
            (Some(403), "SignatureDoesNotMatch") => ErrorCategory::Authentication,
            (Some(403), "AccessDenied") => ErrorCategory::AccessDenied,
            (Some(404), "NoSuchBucket") => ErrorCategory::NoSuchBucket,
            (Some(301), _) | (_, "AuthorizationHeaderMalformed") | (_, "PermanentRedirect") => {
                ErrorCategory::RegionMismatch
            }
            (_, "NetworkingError") | (_, "TimeoutError") => ErrorCategory::Network,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Category text followed by the backend message, for banners and toasts.
    pub fn describe(&self) -> String {
        if self.message.is_empty() {
            self.category().to_string()
        } else {
            format!("{} - {}", self.category(), self.message)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Authentication,
    AccessDenied,
    NoSuchBucket,
    RegionMismatch,
    Network,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Authentication => {
                write!(f, "Authentication failed (signature mismatch).")
            }
            ErrorCategory::AccessDenied => write!(f, "Insufficient permissions (AccessDenied)."),
            ErrorCategory::NoSuchBucket => write!(f, "NoSuchBucket (bucket not found)."),
            ErrorCategory::RegionMismatch => {
                write!(f, "Region mismatch (bucket is in a different region).")
            }
            ErrorCategory::Network => write!(f, "Network interruption or timeout."),
            ErrorCategory::Unknown => write!(f, "Unknown error"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Listing under a prefix failed; the whole bulk operation is abandoned.
    #[error("failed to enumerate keys under '{prefix}': {source}")]
    Enumeration {
        prefix: String,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Archive compression failed; no partial archive is produced.
    #[error("archive finalize failed: {0}")]
    Finalize(String),

    #[error("archive still has {0} failed fetch(es); retry them before finalizing")]
    OutstandingFailures(usize),

    #[error("nothing selected")]
    EmptySelection,

    #[error("moving directory prefixes is not supported; select objects only")]
    PrefixMove,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
