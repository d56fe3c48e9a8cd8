//! Integration lifecycle: setup, the poll loop and setup retries

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api::{find_station, AirQualityApi, Station};
use crate::coordinator::Coordinator;
use crate::registry::{EntityRegistry, PLATFORM};
use crate::sensor::SensorPlatform;
use crate::state::{current_epoch_ms, StateHandle};
use crate::GiosError;

/// Delays between setup attempts while the station is not ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

/// A set-up station: its coordinator, its entities and the state they write to
#[derive(Debug)]
pub struct Integration {
    station: Station,
    coordinator: Coordinator,
    platform: SensorPlatform,
    state: StateHandle,
}

impl Integration {
    /// Set up the station read by `api`.
    ///
    /// Fails with [`GiosError::NotReady`] when the API cannot be reached or the
    /// first refresh fails, and with [`GiosError::NoStation`] when the station
    /// does not exist.
    pub async fn setup(
        name: &str,
        api: Arc<dyn AirQualityApi>,
        registry: &mut EntityRegistry,
        state: StateHandle,
    ) -> crate::Result<Self> {
        let station_id = api.station_id();
        let station = match find_station(api.as_ref()).await {
            Ok(station) => station,
            Err(GiosError::NoStation(id)) => return Err(GiosError::NoStation(id)),
            Err(e) => {
                return Err(GiosError::NotReady(format!(
                    "Cannot look up station {}: {}",
                    station_id, e
                )))
            }
        };
        tracing::debug!("Found station {} '{}'", station.id, station.station_name);

        let mut coordinator = Coordinator::new(api);
        if !coordinator.refresh(current_epoch_ms()).await {
            return Err(GiosError::NotReady(
                coordinator
                    .status()
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "first refresh failed".to_string()),
            ));
        }
        let Some(sensors) = coordinator.sensors() else {
            return Err(GiosError::NotReady("first refresh returned no data".to_string()));
        };

        let migrated = registry.migrate_unique_ids(station_id);
        if migrated > 0 {
            tracing::info!("Migrated {} legacy unique ids", migrated);
        }
        let platform = SensorPlatform::setup(station_id, name, registry, sensors);
        registry.save().map_err(|e| {
            tracing::warn!("Could not save the entity registry: {}", e);
            GiosError::NotReady(e.to_string())
        })?;

        {
            let mut state = state.write().await;
            state.station = Some(station.clone());
            state.entities = registry
                .entries()
                .iter()
                .filter(|e| e.platform == PLATFORM)
                .cloned()
                .collect();
        }

        let integration = Self {
            station,
            coordinator,
            platform,
            state,
        };
        integration.publish(current_epoch_ms()).await;
        tracing::info!(
            "Set up GIOŚ station {} '{}' as '{}'",
            station_id,
            integration.station.station_name,
            name
        );
        Ok(integration)
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn platform(&self) -> &SensorPlatform {
        &self.platform
    }

    /// Refresh once and write every entity's state. Returns whether the fetch
    /// succeeded.
    pub async fn update(&mut self) -> bool {
        let now_ms = current_epoch_ms();
        let success = self.coordinator.refresh(now_ms).await;
        self.publish(now_ms).await;
        success
    }

    /// Poll every `interval` until `cancel` fires. A fetch in flight when
    /// cancelled is dropped without touching state.
    pub async fn run(&mut self, interval: Duration, cancel: CancellationToken) {
        tracing::debug!("Polling station {} every {:?}", self.station.id, interval);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => {
                    tracing::debug!("Polling loop for station {} cancelled", self.station.id);
                    break;
                }
            }

            let result = tokio::select! {
                result = self.coordinator.fetch() => result,
                _ = cancel.cancelled() => {
                    tracing::debug!("Fetch for station {} abandoned", self.station.id);
                    break;
                }
            };
            let now_ms = current_epoch_ms();
            self.coordinator.apply(result, now_ms);
            self.publish(now_ms).await;
        }
    }

    async fn publish(&self, now_ms: u64) {
        let changed = self
            .platform
            .write_states(&self.coordinator, &self.state, now_ms)
            .await;
        tracing::debug!("{} entity states changed", changed);

        let mut state = self.state.write().await;
        state.coordinator = self.coordinator.status().clone();
        state.payloads = self.coordinator.data().map(|d| d.payloads.clone());
    }
}

/// Run [`Integration::setup`] until it succeeds, backing off between attempts
/// that fail with [`GiosError::NotReady`]. Any other error is returned as is.
/// Returns `Ok(None)` when cancelled first.
pub async fn setup_with_retry(
    name: &str,
    api: Arc<dyn AirQualityApi>,
    registry: &mut EntityRegistry,
    state: StateHandle,
    retry: RetryPolicy,
    cancel: &CancellationToken,
) -> crate::Result<Option<Integration>> {
    let mut delay = retry.initial;
    loop {
        let attempt = tokio::select! {
            result = Integration::setup(name, Arc::clone(&api), registry, Arc::clone(&state)) => result,
            _ = cancel.cancelled() => return Ok(None),
        };

        match attempt {
            Ok(integration) => return Ok(Some(integration)),
            Err(GiosError::NotReady(reason)) => {
                tracing::warn!(
                    "Station {} not ready ({}), retrying in {:?}",
                    api.station_id(),
                    reason,
                    delay
                );
            }
            Err(e) => return Err(e),
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return Ok(None),
        }
        delay = (delay * 2).min(retry.max);
    }
}
