//! GIOŚ - Air-quality sensors for a Polish monitoring station
//!
//! Polls the GIOŚ public API, maps raw measurements and index levels onto
//! sensor entities, and tracks their availability.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod dashboard;
pub mod diagnostics;
pub mod entity;
pub mod error;
pub mod integration;
pub mod io;
pub mod model;
pub mod registry;
pub mod sensor;
pub mod state;

pub use config::{load_config, Config};
pub use error::{GiosError, Result};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api::{AirQualityApi, GiosClient};
use crate::integration::{setup_with_retry, RetryPolicy};
use crate::io::{HttpClient, ReqwestHttpClient};
use crate::registry::EntityRegistry;
use crate::state::StateHandle;

/// Assembles a [`GiosService`] from a configuration, with optional injected
/// collaborators
pub struct GiosBuilder {
    config: Config,
    http: Option<Arc<dyn HttpClient>>,
    api: Option<Arc<dyn AirQualityApi>>,
    registry: Option<EntityRegistry>,
    cancel: Option<CancellationToken>,
    retry: RetryPolicy,
}

impl GiosBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: None,
            api: None,
            registry: None,
            cancel: None,
            retry: RetryPolicy::default(),
        }
    }

    /// HTTP client used by the default API client
    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Replace the API client entirely
    pub fn with_api(mut self, api: Arc<dyn AirQualityApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Use this registry instead of the configured one
    pub fn with_registry(mut self, registry: EntityRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn build(self) -> Result<GiosService> {
        let config = self.config;
        config.validate()?;
        let station_id = config.station.station_id;

        let api: Arc<dyn AirQualityApi> = match self.api {
            Some(api) => api,
            None => {
                let http: Arc<dyn HttpClient> = match self.http {
                    Some(http) => http,
                    None => Arc::new(ReqwestHttpClient::with_timeout(Duration::from_secs(
                        config.api.timeout_seconds,
                    ))?),
                };
                Arc::new(GiosClient::new(station_id, &config.api.base_url, http))
            }
        };

        let registry = match self.registry {
            Some(registry) => registry,
            None => match &config.registry.path {
                Some(path) => EntityRegistry::load(path)?,
                None => EntityRegistry::in_memory(),
            },
        };

        let state = state::new_state_handle(station_id, &config.station.name);
        tracing::debug!("Built GIOŚ service for station {}", station_id);

        Ok(GiosService {
            config,
            api,
            registry,
            state,
            cancel: self.cancel.unwrap_or_default(),
            retry: self.retry,
        })
    }
}

/// A built service, ready to start
pub struct GiosService {
    config: Config,
    api: Arc<dyn AirQualityApi>,
    registry: EntityRegistry,
    state: StateHandle,
    cancel: CancellationToken,
    retry: RetryPolicy,
}

impl GiosService {
    pub fn state(&self) -> StateHandle {
        Arc::clone(&self.state)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start the dashboard, set the station up and poll until cancelled
    pub async fn start(mut self) -> Result<()> {
        if self.config.dashboard.enabled {
            let port = self.config.dashboard.port;
            let state = Arc::clone(&self.state);
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = dashboard::serve(state, port, cancel).await {
                    tracing::error!("{}. Continuing without dashboard.", e);
                }
            });
        }

        tracing::info!("GIOŚ service started");

        let setup = setup_with_retry(
            &self.config.station.name,
            Arc::clone(&self.api),
            &mut self.registry,
            Arc::clone(&self.state),
            self.retry,
            &self.cancel,
        )
        .await;

        let mut integration = match setup {
            Ok(Some(integration)) => integration,
            Ok(None) => {
                tracing::info!("GIOŚ service stopped before setup completed");
                return Ok(());
            }
            Err(e) => {
                self.cancel.cancel();
                return Err(e);
            }
        };

        let interval = Duration::from_secs(self.config.station.polling_interval_seconds);
        integration.run(interval, self.cancel.clone()).await;

        tracing::info!("GIOŚ service stopped");
        Ok(())
    }
}
