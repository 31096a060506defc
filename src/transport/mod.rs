//! HTTP transport layer for S3 requests.
//!
//! This module provides the HTTP transport abstraction the service sends its
//! signed requests through. Request and response bodies are streams, so an
//! object is never held in memory as a whole. Connection pooling, connect
//! timeouts and per-request deadlines are handled here.

use crate::config::Configuration;
use crate::error::{NetworkError, S3Error};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use http::Method;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Streaming request body, as handed to the connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send + Sync>>;

/// Streaming response body.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, S3Error>> + Send>>;

/// Body of an outgoing request.
pub enum RequestBody {
    /// No body.
    Empty,
    /// A body held in memory.
    Bytes(Bytes),
    /// A streamed body of a known length.
    Stream {
        /// Chunks of the body.
        stream: ByteStream,
        /// Exact number of bytes the stream yields.
        length: u64,
    },
}

impl RequestBody {
    /// Number of bytes in the body.
    pub fn content_length(&self) -> u64 {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Bytes(b) => b.len() as u64,
            RequestBody::Stream { length, .. } => *length,
        }
    }

    /// Returns true if the body is streamed.
    pub fn is_streaming(&self) -> bool {
        matches!(self, RequestBody::Stream { .. })
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            RequestBody::Stream { length, .. } => {
                f.debug_struct("Stream").field("length", length).finish_non_exhaustive()
            }
        }
    }
}

/// HTTP request to be sent.
///
/// Header names are stored lowercase.
#[derive(Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Request URL.
    pub url: Url,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: RequestBody,
    /// Deadline for the whole exchange, body included.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a new HTTP request with an empty body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HashMap::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    /// Set an in-memory body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Bytes(body.into());
        self
    }

    /// Set a streamed body of `length` bytes.
    pub fn with_stream(mut self, stream: ByteStream, length: u64) -> Self {
        self.body = RequestBody::Stream { stream, length };
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set the request deadline.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Insert or replace a header.
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Get a header value by name (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// HTTP response received.
///
/// The body is not read until [`HttpResponse::bytes`] or
/// [`HttpResponse::into_body`] is called.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, names lowercase.
    pub headers: HashMap<String, String>,
    body: BodyStream,
}

impl HttpResponse {
    /// Create a response with a streamed body.
    pub fn new(status: u16, headers: HashMap<String, String>, body: BodyStream) -> Self {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a response whose body is already in memory.
    pub fn from_bytes(
        status: u16,
        headers: HashMap<String, String>,
        body: impl Into<Bytes>,
    ) -> Self {
        let body = body.into();
        let stream: BodyStream = if body.is_empty() {
            Box::pin(futures::stream::empty())
        } else {
            Box::pin(futures::stream::once(async move { Ok(body) }))
        };
        Self::new(status, headers, stream)
    }

    /// Check if the response indicates success (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get a header value by name (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Get the AWS request ID from response headers.
    pub fn request_id(&self) -> Option<&str> {
        self.get_header("x-amz-request-id")
    }

    /// Get the content length.
    pub fn content_length(&self) -> Option<u64> {
        self.get_header("content-length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// Take the body stream.
    pub fn into_body(self) -> BodyStream {
        self.body
    }

    /// Read the whole body into memory.
    ///
    /// Only used for small documents (bucket listings and error bodies).
    pub async fn bytes(self) -> Result<Bytes, S3Error> {
        let mut body = self.body;
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// HTTP transport trait for making requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request and return the response once its headers arrive.
    ///
    /// A non-2xx status is not an error at this layer.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, S3Error>;
}

/// Default HTTP transport using reqwest.
pub struct ReqwestTransport {
    client: reqwest::Client,
    default_timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Create a new transport with default settings.
    pub fn new() -> Result<Self, S3Error> {
        Self::builder().build()
    }

    /// Create a transport builder.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::new()
    }

    /// Create a transport using the pool and timeout settings of a configuration.
    pub fn from_config(config: &Configuration) -> Result<Self, S3Error> {
        Self::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.operation_timeout)
            .pool_max_idle_per_host(config.max_idle_connections)
            .pool_idle_timeout(Some(config.idle_timeout))
            .build()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, S3Error> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;
        let timeout = timeout.or(self.default_timeout);

        debug!(method = %method, url = %url, "Sending request");

        let mut req_builder = self.client.request(method, url);

        for (name, value) in &headers {
            req_builder = req_builder.header(name.as_str(), value.as_str());
        }

        req_builder = match body {
            RequestBody::Empty => req_builder,
            RequestBody::Bytes(bytes) => req_builder.body(bytes),
            RequestBody::Stream { stream, .. } => {
                req_builder.body(reqwest::Body::wrap_stream(stream))
            }
        };

        if let Some(deadline) = timeout {
            req_builder = req_builder.timeout(deadline);
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        debug!(status, "Received response");

        let body: BodyStream = Box::pin(
            response
                .bytes_stream()
                .map(move |chunk| chunk.map_err(|e| map_reqwest_error(e, timeout))),
        );

        Ok(HttpResponse::new(status, headers, body))
    }
}

fn map_reqwest_error(e: reqwest::Error, timeout: Option<Duration>) -> S3Error {
    let error = if e.is_timeout() {
        NetworkError::Timeout {
            duration: timeout.unwrap_or_default(),
        }
    } else if e.is_connect() {
        NetworkError::ConnectionFailed {
            message: error_chain(&e),
        }
    } else if e.is_body() || e.is_decode() || e.is_request() {
        NetworkError::StreamInterrupted {
            message: error_chain(&e),
        }
    } else {
        NetworkError::ConnectionFailed {
            message: error_chain(&e),
        }
    };
    S3Error::Network(error)
}

// reqwest's Display omits the underlying cause (DNS, TLS, io), so append it.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for reqwest transport.
pub struct ReqwestTransportBuilder {
    connect_timeout: Duration,
    timeout: Option<Duration>,
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    user_agent: String,
}

impl ReqwestTransportBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: None,
            pool_max_idle_per_host: 8,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            user_agent: format!("s3dropbox/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the deadline applied to requests that carry none of their own.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum idle connections per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Set the idle connection timeout.
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the transport.
    pub fn build(self) -> Result<ReqwestTransport, S3Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(self.pool_idle_timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| {
                S3Error::Network(NetworkError::Tls {
                    message: e.to_string(),
                })
            })?;

        Ok(ReqwestTransport {
            client,
            default_timeout: self.timeout,
        })
    }
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
