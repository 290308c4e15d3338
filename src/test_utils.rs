//! In-memory `ObjectStore` used by the engine tests.
//!
//! Follows S3 semantics where the engines depend on them: deleting a missing key
//! succeeds, listings are lexicographic with offset continuation tokens, and a
//! delimiter groups keys into common prefixes.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::error::{StorageError, StorageResult};
use crate::storage::{
    BatchDeleteError, BatchDeleteOutput, ListPage, ListRequest, ObjectBody, ObjectStore,
    StoredObject, UploadedPart,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Get,
    Put,
    Copy,
    Delete,
    DeleteBatch,
    Head,
    CreateMultipart,
    UploadPart,
    CompleteMultipart,
    AbortMultipart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List {
        prefix: String,
        delimiter: Option<String>,
        token: Option<String>,
    },
    Get(String),
    Put(String),
    Copy { from: String, to: String },
    Delete(String),
    DeleteBatch(Vec<String>),
    Head(String),
    CreateMultipart(String),
    UploadPart { key: String, part_number: i32 },
    CompleteMultipart { key: String, parts: Vec<i32> },
    AbortMultipart(String),
}

struct Injected {
    error: StorageError,
    remaining: Option<usize>,
}

struct Upload {
    key: String,
    content_type: Option<String>,
    parts: BTreeMap<i32, Vec<u8>>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, ObjectBody>,
    calls: Vec<Call>,
    failures: HashMap<(Op, String), Injected>,
    batch_calls: usize,
    uploads: HashMap<String, Upload>,
    next_upload: usize,
}

enum Entry {
    Object(StoredObject),
    Prefix(String),
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    page_limit: Option<i32>,
}

pub fn denied() -> StorageError {
    StorageError::new("AccessDenied", "Access Denied").with_status(403)
}

pub fn network() -> StorageError {
    StorageError::new("NetworkingError", "connection reset by peer")
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let store = Self::new();
        for key in keys {
            let key = key.into();
            let bytes = if key.ends_with('/') {
                Vec::new()
            } else {
                format!("body of {}", key).into_bytes()
            };
            store.insert(&key, bytes);
        }
        store
    }

    /// Caps every listing page at `limit` entries regardless of `max_keys`.
    pub fn with_page_limit(mut self, limit: i32) -> Self {
        self.page_limit = Some(limit);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn insert(&self, key: &str, bytes: Vec<u8>) {
        self.lock().objects.insert(
            key.to_string(),
            ObjectBody {
                bytes,
                content_type: None,
            },
        );
    }

    pub fn insert_typed(&self, key: &str, bytes: Vec<u8>, content_type: &str) {
        self.lock().objects.insert(
            key.to_string(),
            ObjectBody {
                bytes,
                content_type: Some(content_type.to_string()),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().objects.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<ObjectBody> {
        self.lock().objects.get(key).cloned()
    }

    /// Fail every call of `op` on `key` with AccessDenied.
    pub fn fail(&self, op: Op, key: &str) {
        self.inject(op, key, denied(), None);
    }

    /// Fail the next `times` calls of `op` on `key`, then behave normally.
    pub fn fail_times(&self, op: Op, key: &str, times: usize) {
        self.inject(op, key, denied(), Some(times));
    }

    /// Injection key rules: listings use the prefix for the first page and
    /// `"{prefix}@{token}"` after that; batch deletes use `"batch:{n}"`
    /// (1-based call number); everything else uses the object key.
    pub fn inject(&self, op: Op, key: &str, error: StorageError, times: Option<usize>) {
        self.lock().failures.insert(
            (op, key.to_string()),
            Injected {
                error,
                remaining: times,
            },
        );
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls()
            .iter()
            .filter(|call| call_op(call) == op)
            .count()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::DeleteBatch(keys) => Some(keys.len()),
                _ => None,
            })
            .collect()
    }

    pub fn open_uploads(&self) -> usize {
        self.lock().uploads.len()
    }

    fn check(state: &mut State, op: Op, key: &str) -> StorageResult<()> {
        let lookup = (op, key.to_string());
        let Some(injected) = state.failures.get_mut(&lookup) else {
            return Ok(());
        };
        let error = injected.error.clone();
        match injected.remaining.as_mut() {
            None => Err(error),
            Some(0) => Ok(()),
            Some(n) => {
                *n -= 1;
                Err(error)
            }
        }
    }

    fn listing(state: &State, prefix: &str, delimiter: Option<&str>) -> Vec<Entry> {
        let mut entries = Vec::new();
        let mut seen = BTreeSet::new();
        for (key, body) in state.objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            let rest = &key[prefix.len()..];
            if let Some(delim) = delimiter.filter(|d| !d.is_empty()) {
                if let Some(pos) = rest.find(delim) {
                    let common = format!("{}{}", prefix, &rest[..pos + delim.len()]);
                    if seen.insert(common.clone()) {
                        entries.push(Entry::Prefix(common));
                    }
                    continue;
                }
            }
            entries.push(Entry::Object(StoredObject {
                key: key.clone(),
                size: body.bytes.len() as i64,
                last_modified: "2026-01-01T00:00:00Z".to_string(),
                etag: format!("\"{:08x}\"", body.bytes.len()),
            }));
        }
        entries
    }
}

fn call_op(call: &Call) -> Op {
    match call {
        Call::List { .. } => Op::List,
        Call::Get(_) => Op::Get,
        Call::Put(_) => Op::Put,
        Call::Copy { .. } => Op::Copy,
        Call::Delete(_) => Op::Delete,
        Call::DeleteBatch(_) => Op::DeleteBatch,
        Call::Head(_) => Op::Head,
        Call::CreateMultipart(_) => Op::CreateMultipart,
        Call::UploadPart { .. } => Op::UploadPart,
        Call::CompleteMultipart { .. } => Op::CompleteMultipart,
        Call::AbortMultipart(_) => Op::AbortMultipart,
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(&self, request: ListRequest<'_>) -> StorageResult<ListPage> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.calls.push(Call::List {
            prefix: request.prefix.to_string(),
            delimiter: request.delimiter.map(str::to_string),
            token: request.continuation_token.map(str::to_string),
        });
        let injection_key = match request.continuation_token {
            Some(token) => format!("{}@{}", request.prefix, token),
            None => request.prefix.to_string(),
        };
        Self::check(&mut state, Op::List, &injection_key)?;

        let entries = Self::listing(&state, request.prefix, request.delimiter);
        let offset = match request.continuation_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| StorageError::new("InvalidArgument", "bad continuation token"))?,
            None => 0,
        };
        let mut max_keys = if request.max_keys > 0 {
            request.max_keys
        } else {
            1000
        };
        if let Some(limit) = self.page_limit {
            max_keys = max_keys.min(limit);
        }
        let end = (offset + max_keys as usize).min(entries.len());

        let mut page = ListPage::default();
        for entry in entries.iter().take(end).skip(offset) {
            match entry {
                Entry::Object(object) => page.objects.push(object.clone()),
                Entry::Prefix(prefix) => page.prefixes.push(prefix.clone()),
            }
        }
        if end < entries.len() {
            page.next_token = Some(end.to_string());
        }
        Ok(page)
    }

    async fn get_object(&self, key: &str) -> StorageResult<ObjectBody> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.calls.push(Call::Get(key.to_string()));
        Self::check(&mut state, Op::Get, key)?;
        state.objects.get(key).cloned().ok_or_else(|| {
            StorageError::new("NoSuchKey", "The specified key does not exist.").with_status(404)
        })
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.calls.push(Call::Put(key.to_string()));
        Self::check(&mut state, Op::Put, key)?;
        state.objects.insert(
            key.to_string(),
            ObjectBody {
                bytes,
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(())
    }

    async fn copy_object(&self, source_key: &str, destination_key: &str) -> StorageResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.calls.push(Call::Copy {
            from: source_key.to_string(),
            to: destination_key.to_string(),
        });
        Self::check(&mut state, Op::Copy, source_key)?;
        let body = state.objects.get(source_key).cloned().ok_or_else(|| {
            StorageError::new("NoSuchKey", "The specified key does not exist.").with_status(404)
        })?;
        state.objects.insert(destination_key.to_string(), body);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.calls.push(Call::Delete(key.to_string()));
        Self::check(&mut state, Op::Delete, key)?;
        state.objects.remove(key);
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> StorageResult<BatchDeleteOutput> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.calls.push(Call::DeleteBatch(keys.to_vec()));
        state.batch_calls += 1;
        let batch_key = format!("batch:{}", state.batch_calls);
        Self::check(&mut state, Op::DeleteBatch, &batch_key)?;

        let mut output = BatchDeleteOutput::default();
        for key in keys {
            match Self::check(&mut state, Op::Delete, key) {
                Ok(()) => {
                    state.objects.remove(key);
                    output.deleted.push(key.clone());
                }
                Err(err) => output.errors.push(BatchDeleteError {
                    key: key.clone(),
                    code: err.code,
                    message: err.message,
                }),
            }
        }
        Ok(output)
    }

    async fn head_object(&self, key: &str) -> StorageResult<bool> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.calls.push(Call::Head(key.to_string()));
        Self::check(&mut state, Op::Head, key)?;
        Ok(state.objects.contains_key(key))
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: Option<&str>,
    ) -> StorageResult<String> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.calls.push(Call::CreateMultipart(key.to_string()));
        Self::check(&mut state, Op::CreateMultipart, key)?;
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.uploads.insert(
            upload_id.clone(),
            Upload {
                key: key.to_string(),
                content_type: content_type.map(str::to_string),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> StorageResult<UploadedPart> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.calls.push(Call::UploadPart {
            key: key.to_string(),
            part_number,
        });
        Self::check(&mut state, Op::UploadPart, &format!("{}#{}", key, part_number))?;
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::new("NoSuchUpload", upload_id).with_status(404))?;
        upload.parts.insert(part_number, data);
        Ok(UploadedPart {
            part_number,
            etag: format!("\"part-{}\"", part_number),
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> StorageResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.calls.push(Call::CompleteMultipart {
            key: key.to_string(),
            parts: parts.iter().map(|part| part.part_number).collect(),
        });
        Self::check(&mut state, Op::CompleteMultipart, key)?;
        let upload = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| StorageError::new("NoSuchUpload", upload_id).with_status(404))?;
        let bytes = upload.parts.into_values().flatten().collect();
        state.objects.insert(
            upload.key,
            ObjectBody {
                bytes,
                content_type: upload.content_type,
            },
        );
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.calls.push(Call::AbortMultipart(key.to_string()));
        Self::check(&mut state, Op::AbortMultipart, key)?;
        state.uploads.remove(upload_id);
        Ok(())
    }
}
