//! In-memory [`Service`] implementation for testing callers of the façade.

use crate::client::Service;
use crate::error::{S3Error, StoreError, TransferError};
use crate::transfer::{ProgressListener, ProgressTracker, TransferRequest};
use crate::types::{GetObjectOutput, PutObjectOutput};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A call made against [`InMemoryService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    /// `create_object(bucket, key, source)`.
    CreateObject {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Source file.
        source: PathBuf,
    },
    /// `download_object(bucket, key, destination)`.
    DownloadObject {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Destination file.
        destination: PathBuf,
    },
    /// `list_buckets()`.
    ListBuckets,
    /// `close()`.
    Close,
}

/// Keeps objects in a map instead of talking to a store.
///
/// Follows the same contract as the REST service: requests are validated
/// first, progress is reported per chunk with a final completion call,
/// missing objects fail with a 404 [`StoreError`] and operations after
/// `close` fail with [`S3Error::Closed`].
pub struct InMemoryService {
    buckets: Mutex<Vec<String>>,
    objects: Mutex<HashMap<(String, String), Bytes>>,
    calls: Mutex<Vec<ServiceCall>>,
    next_failure: Mutex<Option<StoreError>>,
    closed: AtomicBool,
    chunk_size: usize,
}

impl InMemoryService {
    /// Create an empty service.
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(Vec::new()),
            objects: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_failure: Mutex::new(None),
            closed: AtomicBool::new(false),
            chunk_size: 1024,
        }
    }

    /// Add a bucket.
    pub fn with_bucket(self, name: impl Into<String>) -> Self {
        self.buckets.lock().push(name.into());
        self
    }

    /// Report progress in chunks of `size` bytes.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Store an object directly.
    pub fn put_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.objects
            .lock()
            .insert((bucket.to_string(), key.to_string()), data.into());
    }

    /// Read an object directly.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Make the next transfer or listing fail with `error`.
    pub fn fail_next(&self, error: StoreError) {
        *self.next_failure.lock() = Some(error);
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: ServiceCall) {
        self.calls.lock().push(call);
    }

    fn ensure_open(&self) -> Result<(), S3Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(S3Error::Closed);
        }
        Ok(())
    }

    fn take_failure(&self) -> Result<(), S3Error> {
        match self.next_failure.lock().take() {
            Some(error) => Err(S3Error::Store(error)),
            None => Ok(()),
        }
    }

    fn ensure_bucket(&self, bucket: &str) -> Result<(), S3Error> {
        if self.buckets.lock().iter().any(|b| b == bucket) {
            return Ok(());
        }
        Err(S3Error::Store(StoreError {
            status_code: 404,
            code: Some("NoSuchBucket".to_string()),
            message: "The specified bucket does not exist".to_string(),
            request_id: None,
        }))
    }

    fn report(&self, listener: Arc<dyn ProgressListener>, total: u64) {
        let mut tracker = ProgressTracker::new(listener, total);
        let mut remaining = total;
        while remaining > 0 {
            let step = remaining.min(self.chunk_size as u64);
            tracker.advance(step);
            remaining -= step;
        }
        tracker.finish();
    }
}

impl Default for InMemoryService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Service for InMemoryService {
    async fn create_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        listener: Arc<dyn ProgressListener>,
    ) -> Result<PutObjectOutput, S3Error> {
        self.ensure_open()?;
        TransferRequest::upload(bucket, key, source).validate()?;
        self.record(ServiceCall::CreateObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: source.to_path_buf(),
        });
        self.take_failure()?;
        self.ensure_bucket(bucket)?;

        let data = tokio::fs::read(source)
            .await
            .map_err(|e| TransferError::io(source, e))?;
        let length = data.len() as u64;
        self.put_object(bucket, key, data);
        self.report(listener, length);

        Ok(PutObjectOutput {
            content_length: length,
            e_tag: None,
            request_id: None,
        })
    }

    async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        listener: Arc<dyn ProgressListener>,
    ) -> Result<GetObjectOutput, S3Error> {
        self.ensure_open()?;
        TransferRequest::download(bucket, key, destination).validate()?;
        self.record(ServiceCall::DownloadObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            destination: destination.to_path_buf(),
        });
        self.take_failure()?;
        self.ensure_bucket(bucket)?;

        let data = self.object(bucket, key).ok_or_else(|| {
            S3Error::Store(StoreError {
                status_code: 404,
                code: Some("NoSuchKey".to_string()),
                message: "The specified key does not exist.".to_string(),
                request_id: None,
            })
        })?;
        tokio::fs::write(destination, &data)
            .await
            .map_err(|e| TransferError::io(destination, e))?;
        self.report(listener, data.len() as u64);

        Ok(GetObjectOutput {
            content_length: data.len() as u64,
            ..Default::default()
        })
    }

    async fn list_buckets(&self) -> Result<Vec<String>, S3Error> {
        self.ensure_open()?;
        self.record(ServiceCall::ListBuckets);
        self.take_failure()?;
        Ok(self.buckets.lock().clone())
    }

    async fn close(&self) {
        self.record(ServiceCall::Close);
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for InMemoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryService")
            .field("buckets", &*self.buckets.lock())
            .field("objects", &self.objects.lock().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
