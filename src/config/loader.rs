//! Resolution of a [`Configuration`] from a properties file and the environment.

use super::{Configuration, SignatureVersion};
use crate::credentials::{AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY};
use crate::error::{ConfigurationError, S3Error};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// File name of the default configuration, looked up in the home directory.
pub const DEFAULT_CONFIG_FILE_NAME: &str = ".s3dropbox.properties";

const KEY_ACCESS: &str = "accesskey";
const KEY_SECRET: &str = "secretkey";
const KEY_ENDPOINT: &str = "endpoint";
const KEY_REGION: &str = "region";
const KEY_SIGNATURE: &str = "signature";
const KEY_CONNECT_TIMEOUT: &str = "connecttimeout";
/// Seconds allowed for a whole request, body included; `0` disables the
/// deadline. The default of 30 minutes also cuts off a slow transfer of a
/// large object, so raise it or set `0` for big files.
const KEY_TIMEOUT: &str = "timeout";

const KNOWN_KEYS: &[&str] = &[
    KEY_ACCESS,
    KEY_SECRET,
    KEY_ENDPOINT,
    KEY_REGION,
    KEY_SIGNATURE,
    KEY_CONNECT_TIMEOUT,
    KEY_TIMEOUT,
];

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Default configuration file: `~/.s3dropbox.properties`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_FILE_NAME))
}

/// Parse `key=value` (or `key: value`) lines.
///
/// Lines starting with `#` or `!` are comments. Keys are lowercased; pairs
/// with an empty value are dropped.
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let Some(split) = line.find(['=', ':']) else {
            continue;
        };
        let key = line[..split].trim().to_ascii_lowercase();
        let value = line[split + 1..].trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        properties.insert(key, value.to_string());
    }

    properties
}

/// Resolves a [`Configuration`].
///
/// Sources, in order of precedence:
/// 1. the explicit file, if given (it must be readable), otherwise the
///    default file if it exists;
/// 2. environment variables, for keys the file did not supply.
///
/// Loading fails with a [`ConfigurationError`] when no source supplies both
/// the access key and the secret key.
pub struct ConfigurationLoader {
    path: Option<PathBuf>,
    default_path: Option<PathBuf>,
    env: EnvLookup,
}

impl ConfigurationLoader {
    /// Create a loader with an optional override path.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            default_path: default_config_path(),
            env: Box::new(|name| std::env::var(name).ok()),
        }
    }

    /// Replace the default file location.
    pub fn with_default_path(mut self, default_path: Option<PathBuf>) -> Self {
        self.default_path = default_path;
        self
    }

    /// Replace the environment lookup.
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(env);
        self
    }

    /// Resolve the configuration.
    pub fn load(&self) -> Result<Configuration, S3Error> {
        let (properties, source) = self.read_properties()?;

        for key in properties.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                debug!(key = %key, "Ignoring unknown configuration key");
            }
        }

        let lookup = |key: &str, env_vars: &[&str]| -> Option<String> {
            properties.get(key).cloned().or_else(|| {
                env_vars
                    .iter()
                    .find_map(|var| (self.env)(var).filter(|v| !v.trim().is_empty()))
            })
        };

        let mut builder = Configuration::builder();

        if let Some(access_key) = lookup(KEY_ACCESS, &[AWS_ACCESS_KEY_ID]) {
            builder = builder.access_key(access_key.trim());
        }
        if let Some(secret_key) = lookup(KEY_SECRET, &[AWS_SECRET_ACCESS_KEY]) {
            builder = builder.secret_key(secret_key.trim());
        }
        if let Some(endpoint) = lookup(KEY_ENDPOINT, &["AWS_ENDPOINT_URL_S3", "AWS_ENDPOINT_URL"]) {
            builder = builder.endpoint(endpoint.trim())?;
        }
        if let Some(region) = lookup(KEY_REGION, &["AWS_REGION", "AWS_DEFAULT_REGION"]) {
            builder = builder.region(region.trim());
        }
        if let Some(version) = properties.get(KEY_SIGNATURE) {
            let version = version.parse::<SignatureVersion>().map_err(|message| {
                ConfigurationError::InvalidValue {
                    key: KEY_SIGNATURE.to_string(),
                    message,
                }
            })?;
            builder = builder.signature_version(version);
        }
        if let Some(value) = properties.get(KEY_CONNECT_TIMEOUT) {
            let secs = parse_seconds(KEY_CONNECT_TIMEOUT, value)?;
            if secs == 0 {
                return Err(ConfigurationError::InvalidValue {
                    key: KEY_CONNECT_TIMEOUT.to_string(),
                    message: "must be greater than zero".to_string(),
                }
                .into());
            }
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(value) = properties.get(KEY_TIMEOUT) {
            let secs = parse_seconds(KEY_TIMEOUT, value)?;
            let timeout = (secs > 0).then(|| Duration::from_secs(secs));
            builder = builder.operation_timeout(timeout);
        }

        let config = builder.build()?;
        debug!(
            source = %source,
            endpoint = %config.endpoint,
            signature = ?config.signature_version,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn read_properties(&self) -> Result<(HashMap<String, String>, String), S3Error> {
        if let Some(path) = &self.path {
            let content = read_file(path)?;
            return Ok((parse_properties(&content), path.display().to_string()));
        }

        match &self.default_path {
            Some(path) if path.is_file() => {
                let content = read_file(path)?;
                Ok((parse_properties(&content), path.display().to_string()))
            }
            _ => Ok((HashMap::new(), "environment".to_string())),
        }
    }
}

impl std::fmt::Debug for ConfigurationLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationLoader")
            .field("path", &self.path)
            .field("default_path", &self.default_path)
            .finish_non_exhaustive()
    }
}

fn read_file(path: &Path) -> Result<String, S3Error> {
    fs::read_to_string(path).map_err(|e| {
        S3Error::Configuration(ConfigurationError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    })
}

fn parse_seconds(key: &str, value: &str) -> Result<u64, S3Error> {
    value.trim().parse::<u64>().map_err(|e| {
        S3Error::Configuration(ConfigurationError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
    })
}
