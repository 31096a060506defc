//! Canonical request building for AWS Signature V4.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::{BTreeMap, BTreeSet};

/// Characters that should NOT be percent-encoded in URI paths.
const URI_PATH_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Characters that should NOT be percent-encoded in query strings.
const QUERY_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// URI-encode an object path, keeping `/` separators.
pub fn uri_encode_path(path: &str) -> String {
    utf8_percent_encode(path, URI_PATH_SET).to_string()
}

/// URI-encode a query parameter for canonical requests.
pub fn uri_encode_query(value: &str) -> String {
    utf8_percent_encode(value, QUERY_SET).to_string()
}

/// Build the canonical URI from an already-encoded request path.
///
/// Request URLs are built with [`uri_encode_path`], so the path is used as
/// sent on the wire; encoding it again would sign a different resource.
pub fn build_canonical_uri(encoded_path: &str) -> String {
    if encoded_path.is_empty() {
        "/".to_string()
    } else if encoded_path.starts_with('/') {
        encoded_path.to_string()
    } else {
        format!("/{}", encoded_path)
    }
}

/// Build the canonical query string.
///
/// Parameters are sorted by name, then by value.
pub fn build_canonical_query_string(query_string: &str) -> String {
    let mut params: Vec<(String, String)> = query_string
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (uri_encode_query(key), uri_encode_query(value))
        })
        .collect();

    params.sort();

    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical headers string.
///
/// Headers are lowercased, trimmed, sorted by name, and joined with newlines.
/// Multiple values for the same header are comma-separated.
pub fn build_canonical_headers(headers: &[(String, String)]) -> String {
    let mut header_map: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (name, value) in headers {
        let name_lower = name.to_lowercase();
        if !super::should_sign_header(&name_lower) {
            continue;
        }

        let trimmed = value.split_whitespace().collect::<Vec<_>>().join(" ");
        header_map.entry(name_lower).or_default().push(trimmed);
    }

    header_map
        .iter()
        .map(|(name, values)| format!("{}:{}\n", name, values.join(",")))
        .collect()
}

/// Build the signed headers string.
///
/// Returns a semicolon-separated list of lowercase header names.
pub fn build_signed_headers(headers: &[(String, String)]) -> String {
    headers
        .iter()
        .map(|(name, _)| name.to_lowercase())
        .filter(|name| super::should_sign_header(name))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(";")
}

/// Build the canonical request string.
///
/// Format:
/// ```text
/// HTTPMethod\n
/// CanonicalURI\n
/// CanonicalQueryString\n
/// CanonicalHeaders\n
/// SignedHeaders\n
/// HashedPayload
/// ```
pub fn build_canonical_request(
    method: &str,
    encoded_path: &str,
    query_string: &str,
    headers: &[(String, String)],
    payload_hash: &str,
) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method.to_uppercase(),
        build_canonical_uri(encoded_path),
        build_canonical_query_string(query_string),
        build_canonical_headers(headers),
        build_signed_headers(headers),
        payload_hash
    )
}
