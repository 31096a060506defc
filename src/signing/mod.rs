//! Request signing.
//!
//! Two schemes are supported. Signature V2 (the default) signs the verb,
//! content headers, `Date` and resource path with HMAC-SHA1. Signature V4
//! signs a canonical request with a derived HMAC-SHA256 key scoped to a
//! date and region.
//!
//! Both signers take the timestamp as an argument so the computation is a
//! pure function of the request and can be checked against fixed vectors.

mod canonical;
mod v2;
mod v4;

pub use canonical::{uri_encode_path, uri_encode_query};
pub use v2::{sign as sign_v2, string_to_sign as string_to_sign_v2, SignerV2};
pub use v4::{sign_request as sign_request_v4, SignerV4};

use crate::config::{Configuration, SignatureVersion};
use crate::error::SigningError;
use crate::transport::HttpRequest;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// AWS Signature V4 algorithm identifier.
pub const AWS_ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Service name for S3.
pub const S3_SERVICE: &str = "s3";

/// Payload hash used for streamed bodies.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Signs outgoing requests.
///
/// Implementations add the `Authorization` header and whatever date headers
/// their scheme requires. The timestamp is supplied by the caller.
pub trait RequestSigner: Send + Sync {
    /// Sign `request` in place as of `timestamp`.
    fn sign(&self, request: &mut HttpRequest, timestamp: DateTime<Utc>) -> Result<(), SigningError>;
}

/// Create the signer selected by the configuration.
pub fn signer_for(config: &Configuration) -> Arc<dyn RequestSigner> {
    match config.signature_version {
        SignatureVersion::V2 => Arc::new(SignerV2::new(config.credentials.clone())),
        SignatureVersion::V4 => Arc::new(SignerV4::new(
            config.credentials.clone(),
            config.region.clone(),
        )),
    }
}

/// Calculate SHA-256 hash of data.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Calculate HMAC-SHA256.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Generate the signing key for AWS Signature V4.
///
/// kDate = HMAC("AWS4" + SecretKey, Date)
/// kRegion = HMAC(kDate, Region)
/// kService = HMAC(kRegion, Service)
/// kSigning = HMAC(kService, "aws4_request")
pub fn derive_signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Vec<u8> {
    let k_secret = format!("AWS4{}", secret_key);
    let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Build the credential scope string.
///
/// Format: `{date}/{region}/{service}/aws4_request`
pub fn build_credential_scope(date_stamp: &str, region: &str, service: &str) -> String {
    format!("{}/{}/{}/aws4_request", date_stamp, region, service)
}

/// Format a timestamp as `YYYYMMDD'T'HHMMSS'Z'`.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Format a date stamp as `YYYYMMDD`.
pub fn format_date_stamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%d").to_string()
}

/// Format a timestamp for the `Date` header, e.g. `Tue, 27 Mar 2007 19:36:42 +0000`.
pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.to_rfc2822()
}

/// Check if a header takes part in the V4 signature.
pub fn should_sign_header(header_name: &str) -> bool {
    let name_lower = header_name.to_lowercase();

    if name_lower == "host" || name_lower.starts_with("x-amz-") {
        return true;
    }

    matches!(
        name_lower.as_str(),
        "content-type" | "content-md5" | "content-length" | "range"
    )
}

fn host_header(request: &HttpRequest) -> Result<String, SigningError> {
    let host = request
        .url
        .host_str()
        .ok_or_else(|| SigningError::InvalidUrl {
            url: request.url.to_string(),
        })?;
    Ok(match request.url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
