//! Signature version 2.

use super::{format_http_date, RequestSigner};
use crate::credentials::Credentials;
use crate::error::SigningError;
use crate::transport::HttpRequest;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Build the V2 string to sign.
///
/// `amz_headers` are `x-amz-*` pairs; they are lowercased, sorted and
/// emitted as `name:value\n` ahead of the resource path.
pub fn string_to_sign(
    verb: &str,
    content_md5: &str,
    content_type: &str,
    date: &str,
    amz_headers: &[(String, String)],
    resource_path: &str,
) -> String {
    let mut amz: Vec<(String, String)> = amz_headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.trim().to_string()))
        .filter(|(k, _)| k.starts_with("x-amz-"))
        .collect();
    amz.sort();

    let canonical_amz: String = amz
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    format!(
        "{}\n{}\n{}\n{}\n{}{}",
        verb.to_uppercase(),
        content_md5,
        content_type,
        date,
        canonical_amz,
        resource_path
    )
}

/// Base64 HMAC-SHA1 of `string_to_sign` under `secret_key`.
pub fn signature(secret_key: &str, string_to_sign: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(secret_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(string_to_sign.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Compute the `Authorization` header value for a request without
/// `x-amz-*` headers or a Content-MD5.
pub fn sign(
    verb: &str,
    resource_path: &str,
    content_type: &str,
    timestamp: &DateTime<Utc>,
    credentials: &Credentials,
) -> String {
    let to_sign = string_to_sign(
        verb,
        "",
        content_type,
        &format_http_date(timestamp),
        &[],
        resource_path,
    );
    format!(
        "AWS {}:{}",
        credentials.access_key_id(),
        signature(credentials.secret_access_key(), &to_sign)
    )
}

/// Signature V2 signer.
///
/// Sets the `Date` header and an `Authorization: AWS {key}:{signature}`
/// header. The signed resource is the request's encoded path.
#[derive(Debug, Clone)]
pub struct SignerV2 {
    credentials: Credentials,
}

impl SignerV2 {
    /// Create a new signer.
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl RequestSigner for SignerV2 {
    fn sign(
        &self,
        request: &mut HttpRequest,
        timestamp: DateTime<Utc>,
    ) -> Result<(), SigningError> {
        let date = format_http_date(&timestamp);
        request.set_header("date", date.clone());

        let amz_headers: Vec<(String, String)> = request
            .headers
            .iter()
            .filter(|(k, _)| k.starts_with("x-amz-"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let to_sign = string_to_sign(
            request.method.as_str(),
            request.get_header("content-md5").unwrap_or(""),
            request.get_header("content-type").unwrap_or(""),
            &date,
            &amz_headers,
            request.url.path(),
        );

        let authorization = format!(
            "AWS {}:{}",
            self.credentials.access_key_id(),
            signature(self.credentials.secret_access_key(), &to_sign)
        );
        request.set_header("authorization", authorization);
        Ok(())
    }
}
