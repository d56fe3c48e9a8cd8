//! BDD test world for the GIOŚ service

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cucumber::World;
use tokio::sync::RwLock;

use gios::api::{AirQualityApi, AllSensors, RawIndexes, Station};
use gios::integration::Integration;
use gios::registry::EntityRegistry;
use gios::state::StateHandle;
use gios::GiosError;

pub const SENSORS: &str = include_str!("../fixtures/gios/sensors.json");
pub const INDEXES: &str = include_str!("../fixtures/gios/indexes.json");
pub const STATIONS: &str = include_str!("../fixtures/gios/stations.json");

/// Serves the fixture payloads; scenarios edit them or make requests fail
#[derive(Debug)]
pub struct FixtureApi {
    station_id: u32,
    pub sensors: RwLock<AllSensors>,
    pub indexes: RwLock<RawIndexes>,
    pub error: RwLock<Option<String>>,
    pub station_failures: AtomicUsize,
    pub station_requests: AtomicUsize,
}

impl FixtureApi {
    pub fn new(station_id: u32) -> Self {
        Self {
            station_id,
            sensors: RwLock::new(serde_json::from_str(SENSORS).unwrap()),
            indexes: RwLock::new(serde_json::from_str(INDEXES).unwrap()),
            error: RwLock::new(None),
            station_failures: AtomicUsize::new(0),
            station_requests: AtomicUsize::new(0),
        }
    }

    async fn check(&self) -> gios::Result<()> {
        match self.error.read().await.as_ref() {
            Some(message) => Err(GiosError::Api(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AirQualityApi for FixtureApi {
    fn station_id(&self) -> u32 {
        self.station_id
    }

    async fn get_stations(&self) -> gios::Result<Vec<Station>> {
        self.station_requests.fetch_add(1, Ordering::SeqCst);
        self.check().await?;
        let failing = self
            .station_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(GiosError::Http("connection refused".to_string()));
        }
        Ok(serde_json::from_str(STATIONS).unwrap())
    }

    async fn get_all_sensors(&self) -> gios::Result<AllSensors> {
        self.check().await?;
        Ok(self.sensors.read().await.clone())
    }

    async fn get_indexes(&self) -> gios::Result<RawIndexes> {
        self.check().await?;
        Ok(self.indexes.read().await.clone())
    }
}

#[derive(Debug, Default, World)]
pub struct GiosWorld {
    // Station and integration
    pub api: Option<Arc<FixtureApi>>,
    pub registry: EntityRegistry,
    pub state: Option<StateHandle>,
    pub integration: Option<Integration>,
    pub setup_error: Option<GiosError>,

    // API client
    pub http: Option<Arc<crate::steps::api_client_steps::RoutedHttpClient>>,
    pub all_sensors: Option<gios::Result<AllSensors>>,
    pub indexes: Option<gios::Result<RawIndexes>>,

    // Service lifecycle
    pub pre_cancelled: bool,
    pub service_result: Option<gios::Result<()>>,

    // Dashboard
    pub response_status: Option<u16>,
    pub response_body: Option<String>,
}
