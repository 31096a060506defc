//! Access credentials.
//!
//! Credentials are long-term access/secret key pairs read once from the
//! configuration; there is no refresh or expiry.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Environment variable holding the access key.
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";

/// Environment variable holding the secret key.
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";

/// Access key / secret key pair.
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: SecretString,
}

impl Credentials {
    /// Create new credentials.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::new(secret_access_key.into()),
        }
    }

    /// Get the access key ID.
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Get the secret access key.
    ///
    /// Note: This exposes the secret. Use carefully and avoid logging.
    pub fn secret_access_key(&self) -> &str {
        self.secret_access_key.expose_secret()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_new() {
        let creds = Credentials::new("AKID", "SECRET");
        assert_eq!(creds.access_key_id(), "AKID");
        assert_eq!(creds.secret_access_key(), "SECRET");
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let creds = Credentials::new("AKID", "SECRET");
        let debug = format!("{:?}", creds);

        assert!(debug.contains("AKID"));
        assert!(!debug.contains("SECRET"));
        assert!(debug.contains("[REDACTED]"));
    }
}
