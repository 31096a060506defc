//! Configuration for the service.
//!
//! [`Configuration`] is immutable once built and is shared as
//! `Arc<Configuration>` by the signer, transport and services. It is built
//! either programmatically through [`ConfigurationBuilder`] or resolved from
//! a properties file and the environment by [`ConfigurationLoader`].

mod loader;

pub use loader::{default_config_path, parse_properties, ConfigurationLoader};

use crate::credentials::{Credentials, AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY};
use crate::error::{ConfigurationError, RequestError, S3Error};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Public S3 endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://s3.amazonaws.com";

/// Region used for signature V4 when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Size of the chunks read from disk and reported to progress listeners.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Request signing scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureVersion {
    /// HMAC-SHA1 over verb, content type, date and resource (`AWS key:sig`).
    #[default]
    V2,
    /// AWS Signature Version 4 (`AWS4-HMAC-SHA256`).
    V4,
}

impl FromStr for SignatureVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v2" | "2" => Ok(SignatureVersion::V2),
            "v4" | "4" => Ok(SignatureVersion::V4),
            other => Err(format!("unknown signature version '{}', expected v2 or v4", other)),
        }
    }
}

/// Service configuration.
#[derive(Clone)]
pub struct Configuration {
    /// Access credentials.
    pub credentials: Credentials,

    /// Endpoint of the object store. Requests are path-style:
    /// `{endpoint}/{bucket}/{key}`.
    pub endpoint: Url,

    /// Region used in the V4 credential scope.
    pub region: String,

    /// Signing scheme.
    pub signature_version: SignatureVersion,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Deadline for a whole request, body included. `None` disables it.
    ///
    /// Defaults to 30 minutes. Slow transfers of large objects need a
    /// longer deadline or none at all.
    pub operation_timeout: Option<Duration>,

    /// Maximum idle connections kept in the pool.
    pub max_idle_connections: usize,

    /// Idle connection timeout.
    pub idle_timeout: Duration,

    /// Chunk size for file reads and progress reporting.
    pub chunk_size: usize,
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("credentials", &self.credentials)
            .field("endpoint", &self.endpoint.as_str())
            .field("region", &self.region)
            .field("signature_version", &self.signature_version)
            .field("connect_timeout", &self.connect_timeout)
            .field("operation_timeout", &self.operation_timeout)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

impl Configuration {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// Build the request URL for a bucket and optional key.
    ///
    /// Each key segment is URI-encoded; `/` separators are preserved.
    /// Names with `.` or `..` segments are rejected: URL parsing resolves
    /// them (encoded or not), so the request would address another resource.
    pub fn object_url(&self, bucket: &str, key: Option<&str>) -> Result<Url, S3Error> {
        for name in std::iter::once(bucket).chain(key) {
            if has_dot_segment(name) {
                return Err(RequestError::DotSegment {
                    name: name.to_string(),
                }
                .into());
            }
        }
        let base = self.endpoint.as_str().trim_end_matches('/');
        let path = resource_path(bucket, key);
        Url::parse(&format!("{}{}", base, path)).map_err(|e| {
            S3Error::Request(RequestError::InvalidUrl {
                message: e.to_string(),
            })
        })
    }

    /// URL of the service root (`GET /` lists buckets).
    pub fn service_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url
    }
}

/// Path-style resource path for a bucket and optional key.
pub fn resource_path(bucket: &str, key: Option<&str>) -> String {
    match key {
        Some(k) => format!(
            "/{}/{}",
            crate::signing::uri_encode_path(bucket),
            crate::signing::uri_encode_path(k)
        ),
        None => format!("/{}", crate::signing::uri_encode_path(bucket)),
    }
}

/// Returns true if any `/`-separated segment of `name` is `.` or `..`.
pub fn has_dot_segment(name: &str) -> bool {
    name.split('/').any(|segment| segment == "." || segment == "..")
}

/// Builder for [`Configuration`].
#[derive(Default)]
pub struct ConfigurationBuilder {
    access_key: Option<String>,
    secret_key: Option<String>,
    endpoint: Option<Url>,
    region: Option<String>,
    signature_version: Option<SignatureVersion>,
    connect_timeout: Option<Duration>,
    operation_timeout: Option<Option<Duration>>,
    max_idle_connections: Option<usize>,
    idle_timeout: Option<Duration>,
    chunk_size: Option<usize>,
}

impl ConfigurationBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the access and secret keys.
    pub fn credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Set the access key.
    pub fn access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self
    }

    /// Set the secret key.
    pub fn secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Set a custom endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Result<Self, S3Error> {
        let url_str = endpoint.into();
        let url = Url::parse(&url_str).map_err(|e| {
            S3Error::Configuration(ConfigurationError::InvalidEndpoint {
                url: url_str.clone(),
                details: e.to_string(),
            })
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(S3Error::Configuration(ConfigurationError::InvalidEndpoint {
                url: url_str,
                details: "expected an http or https URL with a host".to_string(),
            }));
        }
        self.endpoint = Some(url);
        Ok(self)
    }

    /// Set the region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the signing scheme.
    pub fn signature_version(mut self, version: SignatureVersion) -> Self {
        self.signature_version = Some(version);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the per-request deadline; `None` disables it.
    pub fn operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Set the maximum idle connections kept in the pool.
    pub fn max_idle_connections(mut self, max: usize) -> Self {
        self.max_idle_connections = Some(max);
        self
    }

    /// Set the idle connection timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the transfer chunk size.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<Configuration, S3Error> {
        let access_key = self.access_key.filter(|k| !k.is_empty()).ok_or(
            ConfigurationError::MissingCredential {
                key: "accesskey",
                env_var: AWS_ACCESS_KEY_ID,
            },
        )?;
        let secret_key = self.secret_key.filter(|k| !k.is_empty()).ok_or(
            ConfigurationError::MissingCredential {
                key: "secretkey",
                env_var: AWS_SECRET_ACCESS_KEY,
            },
        )?;

        let chunk_size = self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(S3Error::Configuration(ConfigurationError::InvalidValue {
                key: "chunk_size".to_string(),
                message: "must be greater than zero".to_string(),
            }));
        }

        let endpoint = match self.endpoint {
            Some(url) => url,
            None => Url::parse(DEFAULT_ENDPOINT).map_err(|e| {
                S3Error::Configuration(ConfigurationError::InvalidEndpoint {
                    url: DEFAULT_ENDPOINT.to_string(),
                    details: e.to_string(),
                })
            })?,
        };

        Ok(Configuration {
            credentials: Credentials::new(access_key, secret_key),
            endpoint,
            region: self.region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
            signature_version: self.signature_version.unwrap_or_default(),
            connect_timeout: self.connect_timeout.unwrap_or(Duration::from_secs(10)),
            operation_timeout: self
                .operation_timeout
                .unwrap_or(Some(Duration::from_secs(30 * 60))),
            max_idle_connections: self.max_idle_connections.unwrap_or(8),
            idle_timeout: self.idle_timeout.unwrap_or(Duration::from_secs(90)),
            chunk_size,
        })
    }
}
