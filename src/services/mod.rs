//! S3 service implementations.
//!
//! - Objects: whole-object upload from a file and download to a file
//! - Buckets: listing
//!
//! Both share [`send_signed`], which signs a request, applies the
//! configured deadline and turns non-2xx responses into [`StoreError`]s.
//!
//! [`StoreError`]: crate::error::StoreError

mod buckets;
mod objects;

pub use buckets::BucketsService;
pub use objects::ObjectsService;

use crate::config::Configuration;
use crate::error::{store_error_from_response, S3Error};
use crate::signing::RequestSigner;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use chrono::Utc;
use tracing::debug;

/// Sign `request`, send it, and fail on a non-2xx status.
///
/// On failure the error body is read (it is small) and mapped; the
/// successful response is returned with its body unread.
pub(crate) async fn send_signed(
    config: &Configuration,
    transport: &dyn HttpTransport,
    signer: &dyn RequestSigner,
    mut request: HttpRequest,
) -> Result<HttpResponse, S3Error> {
    if request.timeout.is_none() {
        request.timeout = config.operation_timeout;
    }
    signer.sign(&mut request, Utc::now())?;

    let method = request.method.clone();
    let path = request.url.path().to_string();
    let response = transport.send(request).await?;

    if response.is_success() {
        debug!(method = %method, path = %path, status = response.status, "Request succeeded");
        return Ok(response);
    }

    let status = response.status;
    let header_request_id = response.request_id().map(String::from);
    // A body that fails mid-read still leaves the status to report.
    let body = response.bytes().await.unwrap_or_default();
    let error = store_error_from_response(status, &body, header_request_id.as_deref());

    debug!(
        method = %method,
        path = %path,
        status,
        code = ?error.code,
        request_id = ?error.request_id,
        "Store returned an error"
    );

    Err(S3Error::Store(error))
}
