//! Integration tests for RestService against an in-memory store.

use s3dropbox::mocks::{InMemoryTransport, RecordingProgressListener, TestFixtures};
use s3dropbox::{
    Configuration, NoopProgressListener, RequestError, RestService, S3Error, Service,
    SignatureVersion,
};
use std::path::Path;
use std::sync::Arc;

fn config(chunk_size: usize, version: SignatureVersion) -> Configuration {
    Configuration::builder()
        .credentials(TestFixtures::ACCESS_KEY, TestFixtures::SECRET_KEY)
        .endpoint("http://store.local:9000")
        .unwrap()
        .chunk_size(chunk_size)
        .signature_version(version)
        .build()
        .unwrap()
}

fn create_test_service(store: Arc<InMemoryTransport>, version: SignatureVersion) -> RestService {
    RestService::builder()
        .config(config(1000, version))
        .transport(store)
        .build()
        .unwrap()
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_round_trip_is_byte_identical() {
    for version in [SignatureVersion::V2, SignatureVersion::V4] {
        let store = Arc::new(
            InMemoryTransport::new()
                .with_bucket("photos")
                .with_chunk_size(777),
        );
        let service = create_test_service(store.clone(), version);
        let dir = tempfile::tempdir().unwrap();

        let data = TestFixtures::sample_bytes(10_000);
        let source = dir.path().join("holiday photo.jpg");
        std::fs::write(&source, &data).unwrap();

        let output = service
            .create_object(
                "photos",
                "2024/holiday photo.jpg",
                &source,
                Arc::new(NoopProgressListener),
            )
            .await
            .unwrap();
        assert_eq!(output.content_length, 10_000);
        assert_eq!(store.object("photos", "2024/holiday photo.jpg").unwrap(), data);

        let target = dir.path().join("copy.jpg");
        let output = service
            .download_object(
                "photos",
                "2024/holiday photo.jpg",
                &target,
                Arc::new(NoopProgressListener),
            )
            .await
            .unwrap();
        assert_eq!(output.content_length, 10_000);
        assert_eq!(std::fs::read(&target).unwrap(), data.as_ref());

        service.close().await;
    }
}

#[tokio::test]
async fn test_progress_is_monotonic_and_completes() {
    let store = Arc::new(InMemoryTransport::new().with_bucket("b").with_chunk_size(300));
    let service = create_test_service(store, SignatureVersion::V2);
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("data.bin");
    std::fs::write(&source, TestFixtures::sample_bytes(2500)).unwrap();

    let upload = Arc::new(RecordingProgressListener::new());
    service
        .create_object("b", "data.bin", &source, upload.clone())
        .await
        .unwrap();
    assert!(upload.is_monotonic());
    assert!(upload.is_complete());
    assert_eq!(upload.events().last(), Some(&(2500, 2500)));
    assert!(upload.events().iter().all(|&(_, total)| total == 2500));

    let download = Arc::new(RecordingProgressListener::new());
    service
        .download_object("b", "data.bin", &dir.path().join("out.bin"), download.clone())
        .await
        .unwrap();
    assert!(download.is_monotonic());
    assert!(download.is_complete());
    // 2500 bytes in 300-byte chunks plus the completion call.
    assert_eq!(download.events().len(), 10);
}

#[tokio::test]
async fn test_sequential_reuse_lists_buckets() {
    let store = Arc::new(InMemoryTransport::new().with_bucket("zeta").with_bucket("alpha"));
    let service = create_test_service(store.clone(), SignatureVersion::V4);

    assert_eq!(service.list_buckets().await.unwrap(), vec!["zeta", "alpha"]);
    assert_eq!(service.list_buckets().await.unwrap(), vec!["zeta", "alpha"]);
    assert_eq!(store.request_count(), 2);
}

#[tokio::test]
async fn test_upload_to_missing_bucket_fails_with_status() {
    let store = Arc::new(InMemoryTransport::new());
    let service = create_test_service(store.clone(), SignatureVersion::V2);
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("a.txt");
    std::fs::write(&source, b"abc").unwrap();

    let listener = Arc::new(RecordingProgressListener::new());
    let err = service
        .create_object("nope", "a.txt", &source, listener.clone())
        .await
        .unwrap_err();

    match err {
        S3Error::Store(e) => {
            assert_eq!(e.status_code, 404);
            assert_eq!(e.code.as_deref(), Some("NoSuchBucket"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(store.object("nope", "a.txt").is_none());
    // The body went out but no completion call followed.
    assert_eq!(listener.events(), vec![(3, 3)]);
}

#[tokio::test]
async fn test_failed_download_leaves_no_file() {
    let store = Arc::new(InMemoryTransport::new().with_bucket("b"));
    let service = create_test_service(store, SignatureVersion::V2);
    let dir = tempfile::tempdir().unwrap();

    let target = dir.path().join("missing.txt");

    let err = service
        .download_object("b", "missing.txt", &target, Arc::new(NoopProgressListener))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(404));
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_download_replaces_existing_file() {
    let store = Arc::new(InMemoryTransport::new().with_bucket("b"));
    store.put_object("b", "notes.txt", &b"new contents"[..]);
    let service = create_test_service(store, SignatureVersion::V2);
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("notes.txt");
    std::fs::write(&target, b"old contents that are longer").unwrap();

    service
        .download_object("b", "notes.txt", &target, Arc::new(NoopProgressListener))
        .await
        .unwrap();

    assert_eq!(std::fs::read(&target).unwrap(), b"new contents");
    assert_eq!(files_in(dir.path()), vec!["notes.txt"]);
}

#[tokio::test]
async fn test_closed_service_rejects_everything() {
    let store = Arc::new(InMemoryTransport::new().with_bucket("b"));
    let service = create_test_service(store.clone(), SignatureVersion::V2);

    service.close().await;
    service.close().await;

    assert!(service.is_closed());
    assert!(matches!(service.list_buckets().await, Err(S3Error::Closed)));
    assert_eq!(store.request_count(), 0);
}

#[tokio::test]
async fn test_dot_segment_keys_never_reach_another_object() {
    let store = Arc::new(InMemoryTransport::new().with_bucket("b").with_bucket("other"));
    store.put_object("b", "b", &b"precious"[..]);
    store.put_object("other", "x", &b"elsewhere"[..]);
    let service = create_test_service(store.clone(), SignatureVersion::V2);
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("new.txt");
    std::fs::write(&source, b"new").unwrap();

    for key in ["a/../b", ".."] {
        let err = service
            .create_object("b", key, &source, Arc::new(NoopProgressListener))
            .await
            .unwrap_err();
        assert!(matches!(err, S3Error::Request(RequestError::DotSegment { .. })));
    }
    assert_eq!(store.object("b", "b").unwrap().as_ref(), b"precious");

    let target = dir.path().join("x");
    let err = service
        .download_object("b", "../other/x", &target, Arc::new(NoopProgressListener))
        .await
        .unwrap_err();
    assert!(matches!(err, S3Error::Request(RequestError::DotSegment { .. })));
    assert!(!target.exists());
    assert_eq!(store.request_count(), 0);
}
