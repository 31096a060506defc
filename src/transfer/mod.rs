//! Transfer utilities for single-file uploads and downloads.
//!
//! This module provides the pieces the object operations are built from:
//! request validation, a chunked file stream, and progress reporting that
//! wraps any byte stream.

use crate::config::has_dot_segment;
use crate::error::{RequestError, S3Error};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};

/// Receives progress updates during a transfer.
///
/// `processed` is called zero or more times with a non-decreasing
/// `bytes_transferred`; a successful transfer ends with a call where
/// `bytes_transferred == total_bytes`. `total_bytes` is
/// [`TransferProgress::UNKNOWN_TOTAL`] when the size is not known up front.
pub trait ProgressListener: Send + Sync {
    /// Report progress.
    fn processed(&self, bytes_transferred: u64, total_bytes: u64);
}

impl<F> ProgressListener for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn processed(&self, bytes_transferred: u64, total_bytes: u64) {
        self(bytes_transferred, total_bytes)
    }
}

/// A listener that ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgressListener;

impl ProgressListener for NoopProgressListener {
    fn processed(&self, _bytes_transferred: u64, _total_bytes: u64) {}
}

/// Transfer progress information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes transferred so far.
    pub bytes_transferred: u64,
    /// Total bytes to transfer, or [`Self::UNKNOWN_TOTAL`].
    pub total_bytes: u64,
}

impl TransferProgress {
    /// Sentinel total used when the store does not report a length.
    pub const UNKNOWN_TOTAL: u64 = u64::MAX;

    /// Create a progress value.
    pub fn new(bytes_transferred: u64, total_bytes: u64) -> Self {
        Self {
            bytes_transferred,
            total_bytes,
        }
    }

    /// Returns true if the total is known.
    pub fn is_total_known(&self) -> bool {
        self.total_bytes != Self::UNKNOWN_TOTAL
    }

    /// Returns true once every byte has been transferred.
    pub fn is_complete(&self) -> bool {
        self.is_total_known() && self.bytes_transferred >= self.total_bytes
    }

    /// Progress as a percentage, or `None` when the total is unknown.
    pub fn percentage(&self) -> Option<f64> {
        if !self.is_total_known() {
            None
        } else if self.total_bytes == 0 {
            Some(100.0)
        } else {
            Some((self.bytes_transferred as f64 / self.total_bytes as f64) * 100.0)
        }
    }
}

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local file to object store.
    Upload,
    /// Object store to local file.
    Download,
}

/// A single-file transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Source file for uploads, destination file for downloads.
    pub local_path: PathBuf,
    /// Transfer direction.
    pub direction: Direction,
}

impl TransferRequest {
    /// Describe an upload of `source` to `bucket/key`.
    pub fn upload(
        bucket: impl Into<String>,
        key: impl Into<String>,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            local_path: source.into(),
            direction: Direction::Upload,
        }
    }

    /// Describe a download of `bucket/key` to `destination`.
    pub fn download(
        bucket: impl Into<String>,
        key: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            local_path: destination.into(),
            direction: Direction::Download,
        }
    }

    /// Check the request before any network call.
    ///
    /// Bucket and key must be non-empty and free of `.` and `..` path
    /// segments. An upload source must be an
    /// existing regular file; a download destination must be in an
    /// existing directory and must not itself be a directory.
    pub fn validate(&self) -> Result<(), S3Error> {
        if self.bucket.trim().is_empty() {
            return Err(RequestError::EmptyBucket.into());
        }
        if self.key.is_empty() {
            return Err(RequestError::EmptyKey.into());
        }
        for name in [&self.bucket, &self.key] {
            if has_dot_segment(name) {
                return Err(RequestError::DotSegment { name: name.clone() }.into());
            }
        }

        match self.direction {
            Direction::Upload => {
                if !self.local_path.is_file() {
                    return Err(RequestError::SourceNotFound {
                        path: self.local_path.clone(),
                    }
                    .into());
                }
            }
            Direction::Download => {
                let parent_ok = parent_dir(&self.local_path).is_dir();
                if !parent_ok || self.local_path.is_dir() {
                    return Err(RequestError::DestinationNotCreatable {
                        path: self.local_path.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// Directory a file path lives in; `.` for bare file names.
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Reports cumulative progress to a listener.
#[derive(Clone)]
pub struct ProgressTracker {
    listener: Arc<dyn ProgressListener>,
    transferred: u64,
    total: u64,
}

impl ProgressTracker {
    /// Create a tracker for a transfer of `total` bytes.
    pub fn new(listener: Arc<dyn ProgressListener>, total: u64) -> Self {
        Self {
            listener,
            transferred: 0,
            total,
        }
    }

    /// Record `bytes` more and notify the listener.
    pub fn advance(&mut self, bytes: u64) {
        self.transferred = self.transferred.saturating_add(bytes);
        self.listener.processed(self.transferred, self.total);
    }

    /// Report completion.
    ///
    /// With an unknown total the transferred count becomes the total.
    pub fn finish(&mut self) {
        if self.total == TransferProgress::UNKNOWN_TOTAL {
            self.total = self.transferred;
        }
        self.listener.processed(self.total, self.total);
    }

    /// Current progress.
    pub fn progress(&self) -> TransferProgress {
        TransferProgress::new(self.transferred, self.total)
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("transferred", &self.transferred)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

pin_project! {
    /// Stream adapter that advances a [`ProgressTracker`] for every chunk
    /// it yields.
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        tracker: ProgressTracker,
    }
}

impl<S> ProgressStream<S> {
    /// Wrap `inner`.
    pub fn new(inner: S, tracker: ProgressTracker) -> Self {
        Self { inner, tracker }
    }
}

impl<S, E> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let item = ready!(this.inner.poll_next(cx));
        if let Some(Ok(chunk)) = &item {
            this.tracker.advance(chunk.len() as u64);
        }
        Poll::Ready(item)
    }
}

/// Reads exactly `length` bytes of a file as a stream of chunks.
///
/// A file that ends early yields an `UnexpectedEof` error instead of a
/// short body.
pub struct FileStream {
    file: File,
    buf: Vec<u8>,
    remaining: u64,
    done: bool,
}

impl FileStream {
    /// Open `path` for streaming `length` bytes in chunks of `chunk_size`.
    pub async fn open(path: &Path, length: u64, chunk_size: usize) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self::new(file, length, chunk_size))
    }

    /// Stream `length` bytes from an open file.
    pub fn new(file: File, length: u64, chunk_size: usize) -> Self {
        Self {
            file,
            buf: vec![0u8; chunk_size.max(1)],
            remaining: length,
            done: length == 0,
        }
    }
}

impl Stream for FileStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        let want = this.buf.len().min(usize::try_from(this.remaining).unwrap_or(usize::MAX));
        let mut read_buf = ReadBuf::new(&mut this.buf[..want]);
        if let Err(e) = ready!(Pin::new(&mut this.file).poll_read(cx, &mut read_buf)) {
            this.done = true;
            return Poll::Ready(Some(Err(e)));
        }

        let filled = read_buf.filled();
        if filled.is_empty() {
            this.done = true;
            return Poll::Ready(Some(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file ended with {} bytes still expected", this.remaining),
            ))));
        }

        let chunk = Bytes::copy_from_slice(filled);
        this.remaining -= chunk.len() as u64;
        if this.remaining == 0 {
            this.done = true;
        }
        Poll::Ready(Some(Ok(chunk)))
    }
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("remaining", &self.remaining)
            .field("chunk_size", &self.buf.len())
            .finish_non_exhaustive()
    }
}

/// Detect content type from file extension.
pub fn detect_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "csv" => "text/csv",
        "md" => "text/markdown",
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        "tar" => "application/x-tar",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use parking_lot::Mutex;

    fn recording() -> (Arc<Mutex<Vec<(u64, u64)>>>, Arc<dyn ProgressListener>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let listener: Arc<dyn ProgressListener> =
            Arc::new(move |done: u64, total: u64| sink.lock().push((done, total)));
        (events, listener)
    }

    #[test]
    fn test_transfer_progress_percentage() {
        assert_eq!(TransferProgress::new(50, 100).percentage(), Some(50.0));
        assert_eq!(TransferProgress::new(0, 0).percentage(), Some(100.0));
        assert_eq!(
            TransferProgress::new(10, TransferProgress::UNKNOWN_TOTAL).percentage(),
            None
        );
        assert!(TransferProgress::new(100, 100).is_complete());
        assert!(!TransferProgress::new(99, 100).is_complete());
    }

    #[test]
    fn test_validate_rejects_empty_names() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");

        assert!(matches!(
            TransferRequest::download("", "key", &dest).validate(),
            Err(S3Error::Request(RequestError::EmptyBucket))
        ));
        assert!(matches!(
            TransferRequest::download("bucket", "", &dest).validate(),
            Err(S3Error::Request(RequestError::EmptyKey))
        ));
    }

    #[test]
    fn test_validate_rejects_dot_segments() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");

        for key in ["a/../b", "..", "../other/x", "./k"] {
            assert!(matches!(
                TransferRequest::download("bucket", key, &dest).validate(),
                Err(S3Error::Request(RequestError::DotSegment { .. }))
            ));
        }
        assert!(TransferRequest::download("bucket", "v1..2/.env", &dest)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_validate_upload_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.txt");

        assert!(matches!(
            TransferRequest::upload("bucket", "key", &source).validate(),
            Err(S3Error::Request(RequestError::SourceNotFound { .. }))
        ));
        assert!(matches!(
            TransferRequest::upload("bucket", "key", dir.path()).validate(),
            Err(S3Error::Request(RequestError::SourceNotFound { .. }))
        ));

        std::fs::write(&source, b"data").unwrap();
        assert!(TransferRequest::upload("bucket", "key", &source).validate().is_ok());
    }

    #[test]
    fn test_validate_download_destination() {
        let dir = tempfile::tempdir().unwrap();

        assert!(TransferRequest::download("bucket", "key", dir.path().join("new.bin"))
            .validate()
            .is_ok());
        let orphan = dir.path().join("missing/new.bin");
        assert!(matches!(
            TransferRequest::download("bucket", "key", orphan).validate(),
            Err(S3Error::Request(RequestError::DestinationNotCreatable { .. }))
        ));
        assert!(matches!(
            TransferRequest::download("bucket", "key", dir.path()).validate(),
            Err(S3Error::Request(RequestError::DestinationNotCreatable { .. }))
        ));
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("file.txt")), Path::new("."));
        assert_eq!(parent_dir(Path::new("a/b/file.txt")), Path::new("a/b"));
    }

    #[test]
    fn test_tracker_finish_with_unknown_total() {
        let (events, listener) = recording();
        let mut tracker = ProgressTracker::new(listener, TransferProgress::UNKNOWN_TOTAL);
        tracker.advance(3);
        tracker.advance(4);
        tracker.finish();

        assert_eq!(
            *events.lock(),
            vec![
                (3, TransferProgress::UNKNOWN_TOTAL),
                (7, TransferProgress::UNKNOWN_TOTAL),
                (7, 7)
            ]
        );
    }

    #[tokio::test]
    async fn test_progress_stream_reports_each_chunk() {
        let (events, listener) = recording();
        let chunks: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"defg")),
        ];
        let tracker = ProgressTracker::new(listener, 7);
        let stream = ProgressStream::new(futures::stream::iter(chunks), tracker);

        let collected: Vec<_> = stream.collect().await;
        assert_eq!(collected.len(), 2);
        assert_eq!(*events.lock(), vec![(3, 7), (7, 7)]);
    }

    #[tokio::test]
    async fn test_file_stream_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        std::fs::write(&path, &data).unwrap();

        let stream = FileStream::open(&path, data.len() as u64, 4096).await.unwrap();
        let chunks: Vec<Bytes> = stream.map(|c| c.unwrap()).collect().await;

        assert!(chunks.iter().all(|c| c.len() <= 4096));
        assert_eq!(chunks.concat(), data);
    }

    #[tokio::test]
    async fn test_file_stream_stops_at_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let stream = FileStream::open(&path, 4, 3).await.unwrap();
        let chunks: Vec<Bytes> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.concat(), b"0123");
    }

    #[tokio::test]
    async fn test_file_stream_fails_when_file_is_short() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, b"abc").unwrap();

        let mut stream = FileStream::open(&path, 10, 64).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from_static(b"abc"));
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_file_stream_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();

        let mut stream = FileStream::open(&path, 0, 64).await.unwrap();
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_detect_content_type() {
        assert_eq!(detect_content_type(Path::new("photo.JPG")), "image/jpeg");
        assert_eq!(detect_content_type(Path::new("notes.txt")), "text/plain");
        assert_eq!(detect_content_type(Path::new("archive")), "application/octet-stream");
    }
}
