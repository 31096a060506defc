//! Objects service for whole-object transfers between files and the store.

use super::send_signed;
use crate::config::Configuration;
use crate::error::{S3Error, TransferError};
use crate::signing::RequestSigner;
use crate::transfer::{
    detect_content_type, parent_dir, FileStream, ProgressListener, ProgressStream,
    ProgressTracker, TransferProgress,
};
use crate::transport::{BodyStream, ByteStream, HttpRequest, HttpTransport};
use crate::types::{GetObjectOutput, PutObjectOutput};
use futures::StreamExt;
use http::Method;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

/// Service for S3 object operations.
#[derive(Clone)]
pub struct ObjectsService {
    config: Arc<Configuration>,
    transport: Arc<dyn HttpTransport>,
    signer: Arc<dyn RequestSigner>,
}

impl ObjectsService {
    /// Create a new objects service.
    pub fn new(
        config: Arc<Configuration>,
        transport: Arc<dyn HttpTransport>,
        signer: Arc<dyn RequestSigner>,
    ) -> Self {
        Self {
            config,
            transport,
            signer,
        }
    }

    /// Upload `source` to `bucket/key`.
    ///
    /// The file is streamed in chunks with `Content-Length` set to its size.
    /// The listener advances as each chunk is handed to the connection and
    /// gets a final `(size, size)` call once the store accepted the object.
    pub async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        listener: Arc<dyn ProgressListener>,
    ) -> Result<PutObjectOutput, S3Error> {
        let url = self.config.object_url(bucket, Some(key))?;
        let length = fs::metadata(source)
            .await
            .map_err(|e| TransferError::io(source, e))?
            .len();

        let file = FileStream::open(source, length, self.config.chunk_size)
            .await
            .map_err(|e| TransferError::io(source, e))?;
        let tracker = ProgressTracker::new(listener, length);
        let mut completion = tracker.clone();
        let body: ByteStream = Box::pin(ProgressStream::new(file, tracker));

        let request = HttpRequest::new(Method::PUT, url)
            .with_header("content-length", length.to_string())
            .with_header("content-type", detect_content_type(source))
            .with_stream(body, length);

        debug!(bucket, key, length, "Uploading object");
        let response = send_signed(&self.config, &*self.transport, &*self.signer, request).await?;

        completion.finish();
        info!(bucket, key, length, "Upload complete");

        Ok(PutObjectOutput {
            content_length: length,
            e_tag: response.get_header("etag").map(String::from),
            request_id: response.request_id().map(String::from),
        })
    }

    /// Download `bucket/key` to `destination`.
    ///
    /// The body is written to a temporary `.part` file next to the
    /// destination and renamed over it once complete, so a failed download
    /// never leaves a file at `destination`. A non-2xx response creates no
    /// file at all.
    pub async fn get_to_file(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        listener: Arc<dyn ProgressListener>,
    ) -> Result<GetObjectOutput, S3Error> {
        let url = self.config.object_url(bucket, Some(key))?;
        let request = HttpRequest::new(Method::GET, url);

        debug!(bucket, key, destination = %destination.display(), "Downloading object");
        let response = send_signed(&self.config, &*self.transport, &*self.signer, request).await?;

        let total = response
            .content_length()
            .unwrap_or(TransferProgress::UNKNOWN_TOTAL);
        let mut output = GetObjectOutput {
            content_length: 0,
            e_tag: response.get_header("etag").map(String::from),
            content_type: response.get_header("content-type").map(String::from),
            request_id: response.request_id().map(String::from),
        };

        let part_path = part_path_for(destination);
        let mut tracker = ProgressTracker::new(listener, total);

        let result = save_body(response.into_body(), &part_path, destination, &mut tracker).await;

        match result {
            Ok(received) => {
                tracker.finish();
                output.content_length = received;
                info!(bucket, key, bytes = received, "Download complete");
                Ok(output)
            }
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(&part_path).await {
                    debug!(
                        path = %part_path.display(),
                        error = %remove_err,
                        "Could not remove partial download"
                    );
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for ObjectsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectsService")
            .field("endpoint", &self.config.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

/// `{dir}/{name}.{uuid}.part` for a destination `{dir}/{name}`.
fn part_path_for(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    parent_dir(destination).join(format!("{}.{}.part", name, Uuid::new_v4()))
}

/// Stream the body into `part_path`, check its length, then move it into place.
async fn save_body(
    body: BodyStream,
    part_path: &Path,
    destination: &Path,
    tracker: &mut ProgressTracker,
) -> Result<u64, S3Error> {
    let expected = tracker.progress().total_bytes;
    let received = write_body(body, part_path, tracker).await?;
    if expected != TransferProgress::UNKNOWN_TOTAL && received != expected {
        return Err(TransferError::IncompleteBody { expected, received }.into());
    }
    fs::rename(part_path, destination)
        .await
        .map_err(|e| TransferError::io(destination, e))?;
    Ok(received)
}

async fn write_body(
    mut body: BodyStream,
    path: &Path,
    tracker: &mut ProgressTracker,
) -> Result<u64, S3Error> {
    let mut file = File::create(path)
        .await
        .map_err(|e| TransferError::io(path, e))?;
    let mut received = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| TransferError::io(path, e))?;
        received += chunk.len() as u64;
        tracker.advance(chunk.len() as u64);
    }

    file.flush().await.map_err(|e| TransferError::io(path, e))?;
    file.sync_all().await.map_err(|e| TransferError::io(path, e))?;
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use crate::mocks::{MockResponse, MockSigner, MockTransport, RecordingProgressListener};
    use crate::transfer::NoopProgressListener;
    use std::collections::HashMap;

    fn config() -> Arc<Configuration> {
        Arc::new(
            Configuration::builder()
                .credentials("AKID", "SECRET")
                .endpoint("http://localhost:9000")
                .unwrap()
                .chunk_size(4)
                .build()
                .unwrap(),
        )
    }

    fn service(transport: Arc<MockTransport>) -> ObjectsService {
        ObjectsService::new(config(), transport, Arc::new(MockSigner::new()))
    }

    #[test]
    fn test_part_path_is_next_to_destination() {
        let part = part_path_for(Path::new("/tmp/out/file.bin"));
        assert_eq!(part.parent(), Some(Path::new("/tmp/out")));
        let name = part.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("file.bin."));
        assert!(name.ends_with(".part"));
        assert_ne!(part, part_path_for(Path::new("/tmp/out/file.bin")));
    }

    #[tokio::test]
    async fn test_put_file_streams_with_length() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("hello.txt");
        std::fs::write(&source, b"hello world").unwrap();

        let transport = Arc::new(MockTransport::new());
        transport.push_response(
            200,
            HashMap::from([("ETag".to_string(), "\"abc\"".to_string())]),
            "",
        );
        let listener = Arc::new(RecordingProgressListener::new());

        let output = service(transport.clone())
            .put_file("bucket", "dir/hello.txt", &source, listener.clone())
            .await
            .unwrap();

        assert_eq!(output.content_length, 11);
        assert_eq!(output.e_tag.as_deref(), Some("\"abc\""));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::PUT);
        assert_eq!(requests[0].url, "http://localhost:9000/bucket/dir/hello.txt");
        assert_eq!(requests[0].headers.get("content-length").map(String::as_str), Some("11"));
        assert_eq!(requests[0].headers.get("content-type").map(String::as_str), Some("text/plain"));
        assert_eq!(requests[0].body, b"hello world");
        assert!(requests[0].headers.contains_key("authorization"));

        let events = listener.events();
        assert_eq!(events.last(), Some(&(11, 11)));
        assert!(events.windows(2).all(|w| w[0].0 <= w[1].0));
        // chunk size 4: 4, 8, 11, then the completion call
        assert_eq!(events, vec![(4, 11), (8, 11), (11, 11), (11, 11)]);
    }

    #[tokio::test]
    async fn test_put_file_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("data.bin");
        std::fs::write(&source, b"payload").unwrap();

        let transport = Arc::new(MockTransport::new());
        transport.push_response(
            403,
            HashMap::new(),
            "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
        );
        let listener = Arc::new(RecordingProgressListener::new());

        let err = service(transport)
            .put_file("bucket", "data.bin", &source, listener.clone())
            .await
            .unwrap_err();

        match err {
            S3Error::Store(e) => {
                assert_eq!(e.status_code, 403);
                assert_eq!(e.code.as_deref(), Some("AccessDenied"));
                assert_eq!(e.message, "Access Denied");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // every chunk was handed over, but no completion call followed
        assert_eq!(listener.events(), vec![(4, 7), (7, 7)]);
    }

    #[tokio::test]
    async fn test_get_to_file_writes_destination() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.txt");

        let transport = Arc::new(MockTransport::new());
        transport.push_response(
            200,
            HashMap::from([("Content-Length".to_string(), "10".to_string())]),
            "0123456789",
        );
        let listener = Arc::new(RecordingProgressListener::new());

        let output = service(transport.clone())
            .get_to_file("bucket", "remote.txt", &destination, listener.clone())
            .await
            .unwrap();

        assert_eq!(output.content_length, 10);
        assert_eq!(std::fs::read(&destination).unwrap(), b"0123456789");
        assert_eq!(listener.events().last(), Some(&(10, 10)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[0].url, "http://localhost:9000/bucket/remote.txt");
    }

    #[tokio::test]
    async fn test_get_to_file_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.txt");
        std::fs::write(&destination, b"old contents that are longer").unwrap();

        let transport = Arc::new(MockTransport::new());
        transport.push_response(200, HashMap::new(), "new");

        service(transport)
            .get_to_file("bucket", "k", &destination, Arc::new(NoopProgressListener))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_get_to_file_error_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.txt");

        let transport = Arc::new(MockTransport::new());
        transport.push_response(
            404,
            HashMap::new(),
            "<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>",
        );

        let err = service(transport)
            .get_to_file("bucket", "missing", &destination, Arc::new(NoopProgressListener))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(404));
        assert!(!destination.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_get_to_file_short_body_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.txt");
        std::fs::write(&destination, b"previous").unwrap();

        let transport = Arc::new(MockTransport::new());
        transport.push_response(
            200,
            HashMap::from([("Content-Length".to_string(), "100".to_string())]),
            "only part of it",
        );
        let listener = Arc::new(RecordingProgressListener::new());

        let err = service(transport)
            .get_to_file("bucket", "k", &destination, listener.clone())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            S3Error::Transfer(TransferError::IncompleteBody {
                expected: 100,
                received: 15
            })
        ));
        assert_eq!(std::fs::read(&destination).unwrap(), b"previous");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert!(!listener.is_complete());
    }

    #[tokio::test]
    async fn test_get_to_file_interrupted_stream_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.txt");
        std::fs::write(&destination, b"previous").unwrap();

        let transport = Arc::new(MockTransport::new());
        transport.queue_response(
            MockResponse::ok_with_body("0123456789")
                .with_header("Content-Length", "10")
                .chunked(4)
                .interrupted_after(6),
        );
        let listener = Arc::new(RecordingProgressListener::new());

        let err = service(transport)
            .get_to_file("bucket", "k", &destination, listener.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, S3Error::Network(NetworkError::StreamInterrupted { .. })));
        assert_eq!(std::fs::read(&destination).unwrap(), b"previous");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(listener.events(), vec![(4, 10), (6, 10)]);
        assert!(!listener.is_complete());
    }

    #[tokio::test]
    async fn test_signing_failure_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.txt");
        std::fs::write(&source, b"payload").unwrap();
        let destination = dir.path().join("out.txt");

        let transport = Arc::new(MockTransport::with_default(MockResponse::ok()));
        let signer = Arc::new(MockSigner::failing());
        let service = ObjectsService::new(config(), transport.clone(), signer.clone());

        let err = service
            .put_file("bucket", "k", &source, Arc::new(NoopProgressListener))
            .await
            .unwrap_err();
        assert!(matches!(err, S3Error::Signing(_)));

        let err = service
            .get_to_file("bucket", "k", &destination, Arc::new(NoopProgressListener))
            .await
            .unwrap_err();
        assert!(matches!(err, S3Error::Signing(_)));

        assert_eq!(signer.sign_count(), 2);
        assert_eq!(transport.request_count(), 0);
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_get_to_file_unknown_length() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.txt");

        let transport = Arc::new(MockTransport::new());
        transport.push_response(200, HashMap::new(), "abcdef");
        let listener = Arc::new(RecordingProgressListener::new());

        service(transport)
            .get_to_file("bucket", "k", &destination, listener.clone())
            .await
            .unwrap();

        let events = listener.events();
        assert_eq!(events.first(), Some(&(6, TransferProgress::UNKNOWN_TOTAL)));
        assert_eq!(events.last(), Some(&(6, 6)));
    }
}
