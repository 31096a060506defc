//! Service façade.
//!
//! [`Service`] is the entry point for every transfer. [`RestService`] is the
//! production implementation: it signs each request with the configured
//! scheme and sends it over a pooled [`HttpTransport`].
//!
//! A handle is either open or closed. `close` drops the transport and its
//! idle connections; every later operation fails with [`S3Error::Closed`].

use crate::config::Configuration;
use crate::error::S3Error;
use crate::services::{BucketsService, ObjectsService};
use crate::signing::{signer_for, RequestSigner};
use crate::transfer::{ProgressListener, TransferRequest};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::types::{GetObjectOutput, ListBucketsOutput, PutObjectOutput};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Whole-object transfers against an S3-compatible store.
#[async_trait]
pub trait Service: Send + Sync {
    /// Upload `source` to `bucket/key`, reporting progress to `listener`.
    async fn create_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        listener: Arc<dyn ProgressListener>,
    ) -> Result<PutObjectOutput, S3Error>;

    /// Download `bucket/key` to `destination`, reporting progress to `listener`.
    async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        listener: Arc<dyn ProgressListener>,
    ) -> Result<GetObjectOutput, S3Error>;

    /// Names of all buckets, in the order the store lists them.
    async fn list_buckets(&self) -> Result<Vec<String>, S3Error>;

    /// Release pooled connections. Idempotent.
    async fn close(&self);

    /// Returns true once `close` has been called.
    fn is_closed(&self) -> bool;
}

#[derive(Clone)]
struct Services {
    objects: ObjectsService,
    buckets: BucketsService,
}

/// REST implementation of [`Service`].
pub struct RestService {
    config: Arc<Configuration>,
    state: Mutex<Option<Services>>,
}

impl RestService {
    /// Create a service over the default reqwest transport.
    pub fn new(config: Configuration) -> Result<Self, S3Error> {
        RestServiceBuilder::new().config(config).build()
    }

    /// Create a builder.
    pub fn builder() -> RestServiceBuilder {
        RestServiceBuilder::new()
    }

    /// The configuration this service was built with.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Full bucket listing including owner and creation dates.
    pub async fn list_buckets_detailed(&self) -> Result<ListBucketsOutput, S3Error> {
        self.services()?.buckets.list().await
    }

    fn services(&self) -> Result<Services, S3Error> {
        self.state.lock().clone().ok_or(S3Error::Closed)
    }
}

#[async_trait]
impl Service for RestService {
    async fn create_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        listener: Arc<dyn ProgressListener>,
    ) -> Result<PutObjectOutput, S3Error> {
        let services = self.services()?;
        TransferRequest::upload(bucket, key, source).validate()?;
        services.objects.put_file(bucket, key, source, listener).await
    }

    async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        listener: Arc<dyn ProgressListener>,
    ) -> Result<GetObjectOutput, S3Error> {
        let services = self.services()?;
        TransferRequest::download(bucket, key, destination).validate()?;
        services
            .objects
            .get_to_file(bucket, key, destination, listener)
            .await
    }

    async fn list_buckets(&self) -> Result<Vec<String>, S3Error> {
        Ok(self.list_buckets_detailed().await?.names())
    }

    async fn close(&self) {
        if self.state.lock().take().is_some() {
            debug!("Service closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.state.lock().is_none()
    }
}

impl std::fmt::Debug for RestService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestService")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builder for [`RestService`].
#[derive(Default)]
pub struct RestServiceBuilder {
    config: Option<Configuration>,
    transport: Option<Arc<dyn HttpTransport>>,
    signer: Option<Arc<dyn RequestSigner>>,
}

impl RestServiceBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the provided configuration.
    pub fn config(mut self, config: Configuration) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a custom signer instead of the one the configuration selects.
    pub fn signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Build the service.
    ///
    /// Fails only if no configuration was given or the default transport
    /// cannot be created.
    pub fn build(self) -> Result<RestService, S3Error> {
        let config = self.config.ok_or_else(|| {
            S3Error::Configuration(crate::error::ConfigurationError::InvalidValue {
                key: "configuration".to_string(),
                message: "a configuration is required".to_string(),
            })
        })?;
        let config = Arc::new(config);

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::from_config(&config)?),
        };
        let signer = self.signer.unwrap_or_else(|| signer_for(&config));

        let services = Services {
            objects: ObjectsService::new(config.clone(), transport.clone(), signer.clone()),
            buckets: BucketsService::new(config.clone(), transport, signer),
        };

        Ok(RestService {
            config,
            state: Mutex::new(Some(services)),
        })
    }
}
