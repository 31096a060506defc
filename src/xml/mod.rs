//! XML parsing for S3 responses.
//!
//! Only the two documents the service reads are handled: the
//! `ListAllMyBucketsResult` returned by `GET /` and the `Error` body
//! returned with non-2xx responses.

use crate::error::{ResponseError, S3Error, S3ErrorResponse};
use crate::types::{Bucket, ListBucketsOutput, Owner};
use quick_xml::events::Event;
use quick_xml::Reader;

fn xml_error(e: impl std::fmt::Display) -> S3Error {
    S3Error::Response(ResponseError::XmlParseError {
        message: e.to_string(),
    })
}

/// Parse an S3 error response.
pub fn parse_error_response(xml: &str) -> Result<S3ErrorResponse, S3Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut response = S3ErrorResponse::default();
    let mut current_element = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                current_element = String::from_utf8_lossy(e.name().as_ref()).to_string();
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(xml_error)?.to_string();
                match current_element.as_str() {
                    "Code" => response.code = text,
                    "Message" => response.message = text,
                    "BucketName" | "Bucket" => response.bucket = Some(text),
                    "Key" => response.key = Some(text),
                    "RequestId" => response.request_id = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => current_element.clear(),
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }

    Ok(response)
}

/// Parse a ListBuckets (`ListAllMyBucketsResult`) response.
///
/// Buckets are returned in document order.
pub fn parse_list_buckets(xml: &str) -> Result<ListBucketsOutput, S3Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut output = ListBucketsOutput::default();
    let mut current_bucket: Option<Bucket> = None;
    let mut current_owner: Option<Owner> = None;
    let mut current_element = String::new();
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.as_str() {
                    "ListAllMyBucketsResult" => saw_root = true,
                    "Bucket" => current_bucket = Some(Bucket::default()),
                    "Owner" => current_owner = Some(Owner::default()),
                    _ => {}
                }
                current_element = name;
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(xml_error)?.to_string();

                if let Some(bucket) = current_bucket.as_mut() {
                    match current_element.as_str() {
                        "Name" => bucket.name = text,
                        "CreationDate" => bucket.creation_date = Some(text),
                        _ => {}
                    }
                } else if let Some(owner) = current_owner.as_mut() {
                    match current_element.as_str() {
                        "ID" => owner.id = Some(text),
                        "DisplayName" => owner.display_name = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                match e.name().as_ref() {
                    b"Bucket" => {
                        if let Some(bucket) = current_bucket.take() {
                            output.buckets.push(bucket);
                        }
                    }
                    b"Owner" => output.owner = current_owner.take(),
                    _ => {}
                }
                current_element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }

    if !saw_root {
        return Err(S3Error::Response(ResponseError::InvalidResponse {
            message: "missing ListAllMyBucketsResult element".to_string(),
        }));
    }

    Ok(output)
}
