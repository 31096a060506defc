//! Buckets service for S3 bucket operations.

use super::send_signed;
use crate::config::Configuration;
use crate::error::S3Error;
use crate::signing::RequestSigner;
use crate::transport::{HttpRequest, HttpTransport};
use crate::types::ListBucketsOutput;
use crate::xml;
use http::Method;
use std::sync::Arc;
use tracing::debug;

/// Service for S3 bucket operations.
#[derive(Clone)]
pub struct BucketsService {
    config: Arc<Configuration>,
    transport: Arc<dyn HttpTransport>,
    signer: Arc<dyn RequestSigner>,
}

impl BucketsService {
    /// Create a new buckets service.
    pub fn new(
        config: Arc<Configuration>,
        transport: Arc<dyn HttpTransport>,
        signer: Arc<dyn RequestSigner>,
    ) -> Self {
        Self {
            config,
            transport,
            signer,
        }
    }

    /// List all buckets owned by the authenticated sender.
    pub async fn list(&self) -> Result<ListBucketsOutput, S3Error> {
        let request = HttpRequest::new(Method::GET, self.config.service_url());
        let response = send_signed(&self.config, &*self.transport, &*self.signer, request).await?;

        let body = response.bytes().await?;
        let output = xml::parse_list_buckets(&String::from_utf8_lossy(&body))?;

        debug!(count = output.buckets.len(), "Listed buckets");
        Ok(output)
    }
}

impl std::fmt::Debug for BucketsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketsService")
            .field("endpoint", &self.config.endpoint.as_str())
            .finish_non_exhaustive()
    }
}
