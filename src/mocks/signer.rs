//! Mock signer for testing.

use crate::error::SigningError;
use crate::signing::RequestSigner;
use crate::transport::HttpRequest;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Authorization header value set by [`MockSigner`].
pub const MOCK_AUTHORIZATION: &str = "AWS mock:signature";

/// Recorded sign request.
#[derive(Debug, Clone)]
pub struct SignRequest {
    /// HTTP method.
    pub method: String,
    /// Request URL.
    pub url: String,
    /// Timestamp the request was signed for.
    pub timestamp: DateTime<Utc>,
    /// Whether the body is streamed.
    pub streaming: bool,
}

/// Mock signer for testing.
///
/// Sets a fixed `Authorization` header and records every call.
pub struct MockSigner {
    fail: AtomicBool,
    sign_count: AtomicUsize,
    sign_requests: Mutex<Vec<SignRequest>>,
}

impl MockSigner {
    /// Create a new mock signer.
    pub fn new() -> Self {
        Self {
            fail: AtomicBool::new(false),
            sign_count: AtomicUsize::new(0),
            sign_requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock signer that rejects every request.
    pub fn failing() -> Self {
        let signer = Self::new();
        signer.fail.store(true, Ordering::Relaxed);
        signer
    }

    /// Get the number of sign calls.
    pub fn sign_count(&self) -> usize {
        self.sign_count.load(Ordering::Relaxed)
    }

    /// Get recorded sign requests.
    pub fn sign_requests(&self) -> Vec<SignRequest> {
        self.sign_requests.lock().clone()
    }
}

impl Default for MockSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestSigner for MockSigner {
    fn sign(
        &self,
        request: &mut HttpRequest,
        timestamp: DateTime<Utc>,
    ) -> Result<(), SigningError> {
        self.sign_count.fetch_add(1, Ordering::Relaxed);
        self.sign_requests.lock().push(SignRequest {
            method: request.method.to_string(),
            url: request.url.to_string(),
            timestamp,
            streaming: request.body.is_streaming(),
        });

        if self.fail.load(Ordering::Relaxed) {
            return Err(SigningError::InvalidHeader {
                name: "authorization".to_string(),
                message: "mock signer configured to fail".to_string(),
            });
        }

        request.set_header("authorization", MOCK_AUTHORIZATION);
        Ok(())
    }
}

impl std::fmt::Debug for MockSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSigner")
            .field("sign_count", &self.sign_count())
            .finish_non_exhaustive()
    }
}
