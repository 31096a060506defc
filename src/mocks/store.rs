//! Stateful in-memory object store behind the [`HttpTransport`] interface.

use super::transport::{collect_body, MockResponse};
use super::TestFixtures;
use crate::error::S3Error;
use crate::signing::sha256_hex;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;

#[derive(Default)]
struct StoreState {
    buckets: Vec<String>,
    objects: HashMap<(String, String), Bytes>,
    requests: usize,
}

/// An S3-like store kept in memory.
///
/// Understands path-style `GET /`, `PUT /{bucket}/{key}` and
/// `GET /{bucket}/{key}`. Requests without an `Authorization` header are
/// rejected with 403, unknown buckets with 404 `NoSuchBucket`, and a PUT
/// whose body does not match its `Content-Length` with 400.
pub struct InMemoryTransport {
    state: Mutex<StoreState>,
    chunk_size: usize,
}

impl InMemoryTransport {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            chunk_size: 1024,
        }
    }

    /// Add a bucket.
    pub fn with_bucket(self, name: impl Into<String>) -> Self {
        self.create_bucket(name);
        self
    }

    /// Serve GET bodies in chunks of `size` bytes.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Add a bucket.
    pub fn create_bucket(&self, name: impl Into<String>) {
        let name = name.into();
        let mut state = self.state.lock();
        if !state.buckets.contains(&name) {
            state.buckets.push(name);
        }
    }

    /// Store an object directly.
    pub fn put_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.state
            .lock()
            .objects
            .insert((bucket.to_string(), key.to_string()), data.into());
    }

    /// Read an object directly.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state
            .lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of requests served.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests
    }

    fn respond(
        &self,
        method: &Method,
        path: &str,
        headers: &HashMap<String, String>,
        body: Vec<u8>,
    ) -> MockResponse {
        let mut state = self.state.lock();
        state.requests += 1;

        if !headers.contains_key("authorization") {
            return MockResponse::error(
                403,
                TestFixtures::error_xml("AccessDenied", "Access Denied"),
            );
        }

        let trimmed = path.trim_start_matches('/');
        if trimmed.is_empty() {
            return match *method {
                Method::GET => {
                    let names: Vec<&str> = state.buckets.iter().map(String::as_str).collect();
                    MockResponse::ok_with_body(TestFixtures::list_buckets_xml(&names))
                }
                _ => method_not_allowed(),
            };
        }

        let (bucket, key) = match trimmed.split_once('/') {
            Some((bucket, key)) if !key.is_empty() => (decode(bucket), decode(key)),
            _ => return method_not_allowed(),
        };

        if !state.buckets.contains(&bucket) {
            return MockResponse::error(
                404,
                TestFixtures::error_xml("NoSuchBucket", "The specified bucket does not exist"),
            );
        }

        match *method {
            Method::PUT => {
                let declared = headers
                    .get("content-length")
                    .and_then(|v| v.parse::<usize>().ok());
                if declared.is_some_and(|len| len != body.len()) {
                    return MockResponse::error(
                        400,
                        TestFixtures::error_xml(
                            "IncompleteBody",
                            "You did not provide the number of bytes specified by the Content-Length HTTP header",
                        ),
                    );
                }
                let etag = format!("\"{}\"", &sha256_hex(&body)[..32]);
                state.objects.insert((bucket, key), Bytes::from(body));
                MockResponse::ok().with_header("ETag", etag)
            }
            Method::GET => match state.objects.get(&(bucket, key)) {
                Some(data) => MockResponse::ok_with_body(data.clone())
                    .with_header("Content-Length", data.len().to_string())
                    .with_header("ETag", format!("\"{}\"", &sha256_hex(data)[..32]))
                    .chunked(self.chunk_size),
                None => MockResponse::error(
                    404,
                    TestFixtures::error_xml("NoSuchKey", "The specified key does not exist."),
                ),
            },
            _ => method_not_allowed(),
        }
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

fn method_not_allowed() -> MockResponse {
    MockResponse::error(
        405,
        TestFixtures::error_xml("MethodNotAllowed", "The specified method is not allowed"),
    )
}

#[async_trait]
impl HttpTransport for InMemoryTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, S3Error> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            ..
        } = request;

        let body = collect_body(body).await.map_err(|(_, error)| error)?;
        Ok(self
            .respond(&method, url.path(), &headers, body)
            .into_http_response())
    }
}

impl std::fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryTransport")
            .field("buckets", &state.buckets)
            .field("objects", &state.objects.len())
            .finish()
    }
}
