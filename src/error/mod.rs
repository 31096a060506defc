//! Error types for s3dropbox.
//!
//! Errors are grouped by where they originate: the configuration, the local
//! request/filesystem side, the network, or the object store itself. The
//! core never retries; [`S3Error::is_retryable`] is only a hint for callers.

mod mapping;

pub use mapping::{store_error_from_response, S3ErrorResponse};

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the service.
#[derive(Debug, Error)]
pub enum S3Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Signing errors.
    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    /// Request validation errors, raised before any network call.
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    /// Network and transport errors.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Non-2xx response from the object store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Response parsing errors.
    #[error("Response error: {0}")]
    Response(#[from] ResponseError),

    /// Local file and streaming errors.
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// The service handle has been closed.
    #[error("Service is closed")]
    Closed,
}

impl S3Error {
    /// Returns true if repeating the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            S3Error::Network(e) => e.is_retryable(),
            S3Error::Store(e) => e.is_server_error() || e.status_code == 429,
            _ => false,
        }
    }

    /// Returns the HTTP status code reported by the store, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            S3Error::Store(e) => Some(e.status_code),
            _ => None,
        }
    }

    /// Returns true if this is the closed-service error.
    pub fn is_closed(&self) -> bool {
        matches!(self, S3Error::Closed)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Neither the file nor the environment supplied a credential.
    #[error("Missing {key}: set it in the configuration file or via {env_var}")]
    MissingCredential {
        /// Configuration key that is missing.
        key: &'static str,
        /// Environment variable that could also supply it.
        env_var: &'static str,
    },

    /// The configuration file could not be read.
    #[error("Cannot read configuration file {path:?}: {message}")]
    Unreadable {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL '{url}': {details}")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Error details.
        details: String,
    },

    /// A value could not be parsed.
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Signing errors.
#[derive(Debug, Error)]
pub enum SigningError {
    /// A header value is not valid for signing.
    #[error("Invalid header '{name}': {message}")]
    InvalidHeader {
        /// Header name.
        name: String,
        /// Error message.
        message: String,
    },

    /// The request URL cannot be signed.
    #[error("Invalid request URL '{url}'")]
    InvalidUrl {
        /// The URL.
        url: String,
    },
}

/// Request validation errors.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Bucket name is empty.
    #[error("Bucket name must not be empty")]
    EmptyBucket,

    /// Object key is empty.
    #[error("Object key must not be empty")]
    EmptyKey,

    /// Upload source does not exist or is not a file.
    #[error("Source file {path:?} does not exist or is not a regular file")]
    SourceNotFound {
        /// The source path.
        path: PathBuf,
    },

    /// Download destination cannot be created.
    #[error("Destination directory for {path:?} does not exist")]
    DestinationNotCreatable {
        /// The destination path.
        path: PathBuf,
    },

    /// Bucket or key has a `.` or `..` path segment, which URLs cannot
    /// carry literally.
    #[error("{name:?} contains a '.' or '..' path segment")]
    DotSegment {
        /// The offending bucket name or key.
        name: String,
    },

    /// The request URL could not be built.
    #[error("Invalid URL: {message}")]
    InvalidUrl {
        /// Error message.
        message: String,
    },
}

/// Network and transport-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// Connection failed (includes DNS resolution failures).
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        /// Error message.
        message: String,
    },

    /// The request did not complete within its deadline.
    #[error("Request timed out after {duration:?}")]
    Timeout {
        /// The deadline that elapsed.
        duration: Duration,
    },

    /// TLS or client setup error.
    #[error("TLS error: {message}")]
    Tls {
        /// Error message.
        message: String,
    },

    /// A body stream failed part way through.
    #[error("Stream interrupted: {message}")]
    StreamInterrupted {
        /// Error message.
        message: String,
    },
}

impl NetworkError {
    /// Returns true if the error is transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, NetworkError::Tls { .. })
    }
}

/// A non-2xx response from the object store, surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status_code}: {message}")]
pub struct StoreError {
    /// HTTP status code.
    pub status_code: u16,
    /// S3 error code from the error body (e.g. `NoSuchKey`).
    pub code: Option<String>,
    /// Store message, or the HTTP reason phrase when the body has none.
    pub message: String,
    /// Request ID from the response.
    pub request_id: Option<String>,
}

impl StoreError {
    /// True for 5xx responses.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code)
    }

    /// True for 404 responses.
    pub fn is_not_found(&self) -> bool {
        self.status_code == 404
    }

    /// True when the store rejected the credentials or signature.
    pub fn is_access_denied(&self) -> bool {
        self.status_code == 403
    }
}

/// Response parsing errors.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// XML parse error.
    #[error("XML parse error: {message}")]
    XmlParseError {
        /// Error message.
        message: String,
    },

    /// Invalid response format.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },
}

/// Local file and streaming errors.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Local file I/O failed.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The body ended before the announced length.
    #[error("Incomplete body: expected {expected} bytes, received {received} bytes")]
    IncompleteBody {
        /// Expected size.
        expected: u64,
        /// Received size.
        received: u64,
    },
}

impl TransferError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::Io {
            path: path.into(),
            source,
        }
    }
}
