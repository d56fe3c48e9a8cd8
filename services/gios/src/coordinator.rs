//! Data coordinator: owns the last fetched payloads and the refresh outcome

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::api::{fetch_payloads, AirQualityApi, Payloads};
use crate::model::{GiosSensors, Pollutant};
use crate::state::CoordinatorStatus;

/// Payloads of the last successful fetch and the values mapped from them
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorData {
    pub payloads: Payloads,
    pub sensors: GiosSensors,
}

/// Fetches both payloads for one station and remembers the outcome.
///
/// A failed fetch keeps the previous data; consumers decide availability from
/// [`Coordinator::last_update_success`].
pub struct Coordinator {
    api: Arc<dyn AirQualityApi>,
    data: Option<CoordinatorData>,
    status: CoordinatorStatus,
    /// Pollutants that had a reading in any successful fetch
    known: BTreeSet<Pollutant>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("station_id", &self.api.station_id())
            .field("has_data", &self.data.is_some())
            .field("status", &self.status)
            .finish()
    }
}

impl Coordinator {
    pub fn new(api: Arc<dyn AirQualityApi>) -> Self {
        Self {
            api,
            data: None,
            status: CoordinatorStatus::default(),
            known: BTreeSet::new(),
        }
    }

    pub fn station_id(&self) -> u32 {
        self.api.station_id()
    }

    /// Fetch both payloads without touching any state
    pub async fn fetch(&self) -> crate::Result<Payloads> {
        fetch_payloads(self.api.as_ref()).await
    }

    /// Record the result of a fetch. Returns whether it succeeded.
    pub fn apply(&mut self, result: crate::Result<Payloads>, now_ms: u64) -> bool {
        match result {
            Ok(payloads) => {
                if self.status.consecutive_failures > 0 {
                    tracing::info!(
                        "Fetching GIOŚ data for station {} recovered after {} failed attempts",
                        self.station_id(),
                        self.status.consecutive_failures
                    );
                }
                let sensors = GiosSensors::from_payloads(&payloads, &self.known);
                self.known.extend(sensors.readings.keys().copied());
                tracing::debug!(
                    "Station {}: {} readings, air quality index {:?}",
                    self.station_id(),
                    sensors.readings.len(),
                    sensors.aqi
                );
                self.data = Some(CoordinatorData { payloads, sensors });
                self.status.record_success(now_ms);
                true
            }
            Err(e) => {
                if self.status.consecutive_failures == 0 {
                    tracing::warn!(
                        "Error fetching GIOŚ data for station {}: {}",
                        self.station_id(),
                        e
                    );
                } else {
                    tracing::debug!(
                        "Fetching GIOŚ data for station {} still failing: {}",
                        self.station_id(),
                        e
                    );
                }
                self.status.record_failure(e.to_string(), now_ms);
                false
            }
        }
    }

    /// Fetch and record in one step
    pub async fn refresh(&mut self, now_ms: u64) -> bool {
        let result = self.fetch().await;
        self.apply(result, now_ms)
    }

    pub fn data(&self) -> Option<&CoordinatorData> {
        self.data.as_ref()
    }

    /// Mapped values of the last successful fetch, kept across failures
    pub fn sensors(&self) -> Option<&GiosSensors> {
        self.data.as_ref().map(|d| &d.sensors)
    }

    pub fn last_update_success(&self) -> bool {
        self.status.last_update_success
    }

    pub fn status(&self) -> &CoordinatorStatus {
        &self.status
    }
}
