//! Mock HTTP transport for testing.

use crate::error::{NetworkError, S3Error};
use crate::transport::{BodyStream, HttpRequest, HttpResponse, HttpTransport, RequestBody};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::Method;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Mock HTTP response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Bytes,
    /// Deliver the body in chunks of this size.
    pub chunk_size: Option<usize>,
    /// Fail the body stream after this many bytes.
    pub interrupt_after: Option<usize>,
}

impl MockResponse {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
            chunk_size: None,
            interrupt_after: None,
        }
    }

    /// Create a successful response with empty body.
    pub fn ok() -> Self {
        Self::new(200, Bytes::new())
    }

    /// Create a successful response with body.
    pub fn ok_with_body(body: impl Into<Bytes>) -> Self {
        Self::new(200, body)
    }

    /// Create an error response.
    pub fn error(status: u16, body: impl Into<Bytes>) -> Self {
        Self::new(status, body)
    }

    /// Add a header to the response.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add multiple headers to the response.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Deliver the body in chunks of `size` bytes.
    pub fn chunked(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    /// Fail the body stream once `bytes` bytes have been delivered.
    pub fn interrupted_after(mut self, bytes: usize) -> Self {
        self.interrupt_after = Some(bytes);
        self
    }

    pub(crate) fn into_http_response(self) -> HttpResponse {
        let limit = self.interrupt_after.unwrap_or(self.body.len()).min(self.body.len());
        let chunk_size = self.chunk_size.unwrap_or(limit.max(1));

        let mut items: Vec<Result<Bytes, S3Error>> = Vec::new();
        let mut offset = 0;
        while offset < limit {
            let end = (offset + chunk_size).min(limit);
            items.push(Ok(self.body.slice(offset..end)));
            offset = end;
        }
        if self.interrupt_after.is_some() {
            items.push(Err(S3Error::Network(NetworkError::StreamInterrupted {
                message: "connection reset by peer".to_string(),
            })));
        }

        let body: BodyStream = Box::pin(futures::stream::iter(items));
        HttpResponse::new(self.status, self.headers, body)
    }
}

/// A request as seen by [`MockTransport`], with its body collected.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: Method,
    /// Full URL.
    pub url: String,
    /// Headers, names lowercase.
    pub headers: HashMap<String, String>,
    /// Body bytes.
    pub body: Vec<u8>,
    /// Request deadline.
    pub timeout: Option<Duration>,
}

enum Reply {
    Response(MockResponse),
    Failure(NetworkError),
}

/// Mock HTTP transport for testing.
///
/// Replies are returned in the order they were queued. Streamed request
/// bodies are read to the end before replying, the way a server would.
pub struct MockTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<RecordedRequest>>,
    default_response: Option<MockResponse>,
}

impl MockTransport {
    /// Create a new mock transport with no responses.
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            default_response: None,
        }
    }

    /// Create a mock transport with queued responses.
    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        let transport = Self::new();
        for response in responses {
            transport.queue_response(response);
        }
        transport
    }

    /// Create a mock transport that returns `response` whenever the queue is empty.
    pub fn with_default(response: MockResponse) -> Self {
        Self {
            default_response: Some(response),
            ..Self::new()
        }
    }

    /// Queue a response to return.
    pub fn queue_response(&self, response: MockResponse) {
        self.replies.lock().push_back(Reply::Response(response));
    }

    /// Queue a response built from its parts.
    pub fn push_response(
        &self,
        status: u16,
        headers: HashMap<String, String>,
        body: impl Into<Bytes>,
    ) {
        self.queue_response(MockResponse::new(status, body).with_headers(headers));
    }

    /// Queue a transport-level failure.
    pub fn push_failure(&self, error: NetworkError) {
        self.replies.lock().push_back(Reply::Failure(error));
    }

    /// Get all recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Get the last request made.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a request body to the end.
pub(crate) async fn collect_body(body: RequestBody) -> Result<Vec<u8>, (Vec<u8>, S3Error)> {
    match body {
        RequestBody::Empty => Ok(Vec::new()),
        RequestBody::Bytes(bytes) => Ok(bytes.to_vec()),
        RequestBody::Stream { mut stream, .. } => {
            let mut collected = Vec::new();
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(chunk) => collected.extend_from_slice(&chunk),
                    Err(e) => {
                        let error = S3Error::Network(NetworkError::StreamInterrupted {
                            message: format!("request body failed: {}", e),
                        });
                        return Err((collected, error));
                    }
                }
            }
            Ok(collected)
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, S3Error> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;

        let (body, body_error) = match collect_body(body).await {
            Ok(body) => (body, None),
            Err((partial, error)) => (partial, Some(error)),
        };

        self.requests.lock().push(RecordedRequest {
            method,
            url: url.to_string(),
            headers,
            body,
            timeout,
        });

        if let Some(error) = body_error {
            return Err(error);
        }

        let reply = self.replies.lock().pop_front();
        match reply {
            Some(Reply::Response(mock)) => Ok(mock.into_http_response()),
            Some(Reply::Failure(error)) => Err(S3Error::Network(error)),
            None => match &self.default_response {
                Some(mock) => Ok(mock.clone().into_http_response()),
                None => Err(S3Error::Network(NetworkError::ConnectionFailed {
                    message: "No mock response available".to_string(),
                })),
            },
        }
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("queued_replies", &self.replies.lock().len())
            .field("recorded_requests", &self.requests.lock().len())
            .finish()
    }
}
