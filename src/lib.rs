//! s3dropbox
//!
//! Upload or download a single file to/from an S3-compatible bucket.
//!
//! # Features
//!
//! - **Whole-object transfers**: streamed PUT and GET, never buffering the object
//! - **Signing**: AWS signature V2 (default) and V4
//! - **Progress**: per-chunk listener callbacks with a final completion call
//! - **Safe downloads**: a failed download never leaves a file at the destination
//! - **S3-Compatible**: path-style addressing against any endpoint
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use s3dropbox::{Configuration, NoopProgressListener, RestService, Service};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), s3dropbox::S3Error> {
//!     let config = Configuration::builder()
//!         .credentials("AKID", "SECRET")
//!         .endpoint("http://localhost:9000")?
//!         .build()?;
//!     let service = RestService::new(config)?;
//!
//!     let listener = Arc::new(NoopProgressListener);
//!     service
//!         .create_object("my-bucket", "hello.txt", Path::new("hello.txt"), listener)
//!         .await?;
//!     service.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod mocks;
pub mod services;
pub mod signing;
pub mod transfer;
pub mod transport;
pub mod types;
pub mod xml;

// Re-export main types at crate root
pub use client::{RestService, RestServiceBuilder, Service};
pub use config::{Configuration, ConfigurationBuilder, ConfigurationLoader, SignatureVersion};
pub use credentials::Credentials;
pub use error::{
    ConfigurationError, NetworkError, RequestError, ResponseError, S3Error, SigningError,
    StoreError, TransferError,
};
pub use signing::{RequestSigner, SignerV2, SignerV4};
pub use transfer::{NoopProgressListener, ProgressListener, TransferProgress, TransferRequest};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::{Bucket, GetObjectOutput, ListBucketsOutput, Owner, PutObjectOutput};

/// Load configuration from `path` (or the default locations) and create a
/// REST service from it.
///
/// # Example
///
/// ```rust,no_run
/// let service = s3dropbox::create_service(None)?;
/// # Ok::<(), s3dropbox::S3Error>(())
/// ```
pub fn create_service(path: Option<std::path::PathBuf>) -> Result<RestService> {
    RestService::new(ConfigurationLoader::new(path).load()?)
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, S3Error>;
