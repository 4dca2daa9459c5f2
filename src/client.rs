use std::fmt;
use std::sync::Arc;

use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};

use crate::config::ClientConfig;
use crate::error::{Result, SdkError};
use crate::proto::experiment::experiment_service_client::ExperimentServiceClient;
use crate::proto::storage::storage_service_client::StorageServiceClient;

pub const SDK_VERSION_HEADER: &str = "x-tq42-sdk-version";

pub(crate) type ExperimentRpc = ExperimentServiceClient<InterceptedService<Channel, MetadataInterceptor>>;
pub(crate) type StorageRpc = StorageServiceClient<InterceptedService<Channel, MetadataInterceptor>>;

/// Attaches the caller's credentials and the SDK version to every request.
#[derive(Clone)]
pub struct MetadataInterceptor {
    authorization: Option<MetadataValue<Ascii>>,
}

impl Interceptor for MetadataInterceptor {
    fn call(&mut self, mut request: Request<()>) -> std::result::Result<Request<()>, Status> {
        let metadata = request.metadata_mut();
        if let Some(value) = &self.authorization {
            metadata.insert("authorization", value.clone());
        }
        metadata.insert(
            SDK_VERSION_HEADER,
            MetadataValue::from_static(env!("CARGO_PKG_VERSION")),
        );
        Ok(request)
    }
}

/// Shared connection to the TQ42 platform.
///
/// Cloning is cheap: clones share the underlying channel and HTTP pool.
///
/// # Example
/// ```no_run
/// use tq42_sdk::{ClientConfig, Experiment, Tq42Client};
///
/// #[tokio::main]
/// async fn main() -> tq42_sdk::Result<()> {
///     let client = Tq42Client::connect(ClientConfig::from_env()).await?;
///     let mut experiment = Experiment::get(&client, "0c8a5f2e-experiment-id").await?;
///     experiment.update("renamed").await?;
///     println!("{experiment}");
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Tq42Client {
    experiments: ExperimentRpc,
    storage: StorageRpc,
    http: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl fmt::Debug for Tq42Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tq42Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Tq42Client {
    /// Connect eagerly; fails if the endpoint is unreachable.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let endpoint = Self::endpoint(&config)?;
        tracing::debug!(host = %config.host, "connecting to TQ42");
        let channel = endpoint.connect().await?;
        Self::from_channel(channel, config)
    }

    /// Defer connecting until the first request. Must be called inside a tokio runtime.
    pub fn connect_lazy(config: ClientConfig) -> Result<Self> {
        let channel = Self::endpoint(&config)?.connect_lazy();
        Self::from_channel(channel, config)
    }

    pub fn from_channel(channel: Channel, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let interceptor = MetadataInterceptor {
            authorization: config.authorization_header()?,
        };
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(SdkError::HttpClient)?;

        Ok(Self {
            experiments: ExperimentServiceClient::with_interceptor(
                channel.clone(),
                interceptor.clone(),
            ),
            storage: StorageServiceClient::with_interceptor(channel, interceptor),
            http,
            config: Arc::new(config),
        })
    }

    fn endpoint(config: &ClientConfig) -> Result<Endpoint> {
        config.validate()?;
        let mut endpoint = Endpoint::from_shared(config.host.clone())?
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout());
        if config.host.starts_with("https://") {
            endpoint = endpoint.tls_config(ClientTlsConfig::new().with_webpki_roots())?;
        }
        Ok(endpoint)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn experiments(&self) -> ExperimentRpc {
        self.experiments.clone()
    }

    pub(crate) fn storage(&self) -> StorageRpc {
        self.storage.clone()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }
}
