//! Mapping from S3 error responses to [`StoreError`].

use super::StoreError;
use crate::xml;

/// Parsed S3 error response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3ErrorResponse {
    /// S3 error code (e.g., "NoSuchKey").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Affected bucket, if any.
    pub bucket: Option<String>,
    /// Affected key, if any.
    pub key: Option<String>,
    /// AWS request ID.
    pub request_id: Option<String>,
}

/// Build a [`StoreError`] from a non-2xx status and its (possibly empty) body.
///
/// The code and message come from the XML error document when it parses;
/// otherwise the HTTP reason phrase is used and the header request ID is kept.
pub fn store_error_from_response(
    status_code: u16,
    body: &[u8],
    header_request_id: Option<&str>,
) -> StoreError {
    let parsed = if body.is_empty() {
        None
    } else {
        xml::parse_error_response(&String::from_utf8_lossy(body))
            .ok()
            .filter(|r| !r.code.is_empty())
    };

    match parsed {
        Some(resp) => StoreError {
            status_code,
            message: if resp.message.is_empty() {
                resp.code.clone()
            } else {
                resp.message
            },
            code: Some(resp.code),
            request_id: resp
                .request_id
                .or_else(|| header_request_id.map(String::from)),
        },
        None => StoreError {
            status_code,
            code: None,
            message: reason_phrase(status_code),
            request_id: header_request_id.map(String::from),
        },
    }
}

fn reason_phrase(status_code: u16) -> String {
    http::StatusCode::from_u16(status_code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(String::from)
        .unwrap_or_else(|| format!("HTTP status {}", status_code))
}
