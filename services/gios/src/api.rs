//! GIOŚ REST API client
//!
//! Fetches the station list, the raw measurements of every sensor installed at a
//! station ("all sensors") and the station's air-quality index document.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

use crate::io::HttpClient;
use crate::GiosError;

/// A monitoring station as listed by `/station/findAll`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: u32,
    pub station_name: String,
    #[serde(default)]
    pub gegr_lat: Option<String>,
    #[serde(default)]
    pub gegr_lon: Option<String>,
    #[serde(default)]
    pub city: Option<City>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A single timestamped measurement. Values that are not numbers read as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub value: Option<f64>,
}

/// One pollutant entry of the "all sensors" document, newest sample first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSensor {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub values: Vec<Sample>,
}

/// Parameter code (lowercase, e.g. `pm2.5`) to raw readings
pub type AllSensors = BTreeMap<String, RawSensor>;

/// An index level as reported by the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIndexLevel {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub index_level_name: Option<String>,
}

/// The index document of `/aqindex/getIndex/{station_id}`.
///
/// A level field that is present but not shaped like a level deserializes as
/// [`IndexField::Malformed`] so one bad field never rejects the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIndexes {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub st_calc_date: Option<String>,
    #[serde(default)]
    pub st_index_level: IndexField,
    #[serde(default)]
    pub so2_index_level: IndexField,
    #[serde(default)]
    pub no2_index_level: IndexField,
    #[serde(default)]
    pub pm10_index_level: IndexField,
    #[serde(default)]
    pub pm25_index_level: IndexField,
    #[serde(default)]
    pub o3_index_level: IndexField,
}

/// One level field of the index document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IndexField {
    #[default]
    Missing,
    Level(RawIndexLevel),
    Malformed(serde_json::Value),
}

impl<'de> Deserialize<'de> for IndexField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::Null => IndexField::Missing,
            serde_json::Value::Object(_) => match serde_json::from_value(value.clone()) {
                Ok(level) => IndexField::Level(level),
                Err(_) => IndexField::Malformed(value),
            },
            other => IndexField::Malformed(other),
        })
    }
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_f64()))
}

/// Both payloads of one successful fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payloads {
    pub sensors: AllSensors,
    pub indexes: RawIndexes,
}

/// Access to the air-quality data of one station
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait AirQualityApi: Send + Sync {
    /// The station this client reads
    fn station_id(&self) -> u32;

    /// List every monitoring station
    async fn get_stations(&self) -> crate::Result<Vec<Station>>;

    /// Raw measurements of every sensor at the station, keyed by parameter code
    async fn get_all_sensors(&self) -> crate::Result<AllSensors>;

    /// The station's air-quality index document
    async fn get_indexes(&self) -> crate::Result<RawIndexes>;
}

/// Fetch both payloads. Any failure fails the whole fetch.
pub async fn fetch_payloads(api: &dyn AirQualityApi) -> crate::Result<Payloads> {
    let sensors = api.get_all_sensors().await?;
    let indexes = api.get_indexes().await?;
    Ok(Payloads { sensors, indexes })
}

/// Look the station up in the station list
pub async fn find_station(api: &dyn AirQualityApi) -> crate::Result<Station> {
    let station_id = api.station_id();
    api.get_stations()
        .await?
        .into_iter()
        .find(|station| station.id == station_id)
        .ok_or(GiosError::NoStation(station_id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationSensor {
    id: u32,
    param: SensorParam,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SensorParam {
    param_name: String,
    param_code: String,
}

#[derive(Debug, Deserialize)]
struct SensorData {
    #[serde(default)]
    values: Vec<Sample>,
}

/// Client for the public GIOŚ REST API
pub struct GiosClient {
    station_id: u32,
    base_url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for GiosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GiosClient")
            .field("station_id", &self.station_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GiosClient {
    pub fn new(station_id: u32, base_url: &str, http: Arc<dyn HttpClient>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        tracing::debug!("Created GiosClient for station {} at {}", station_id, base_url);
        Self {
            station_id,
            base_url,
            http,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> crate::Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).await?;
        if !response.is_success() {
            return Err(GiosError::Api(format!(
                "GET {} returned status {}",
                url, response.status
            )));
        }
        serde_json::from_str(&response.body)
            .map_err(|e| GiosError::Api(format!("Invalid response from {}: {}", url, e)))
    }
}

#[async_trait]
impl AirQualityApi for GiosClient {
    fn station_id(&self) -> u32 {
        self.station_id
    }

    async fn get_stations(&self) -> crate::Result<Vec<Station>> {
        self.get_json("/station/findAll").await
    }

    async fn get_all_sensors(&self) -> crate::Result<AllSensors> {
        let installed: Vec<StationSensor> = self
            .get_json(&format!("/station/sensors/{}", self.station_id))
            .await?;
        if installed.is_empty() {
            return Err(GiosError::Api(format!(
                "Station {} reports no sensors",
                self.station_id
            )));
        }

        let mut sensors = AllSensors::new();
        for sensor in installed {
            let data: SensorData = self
                .get_json(&format!("/data/getData/{}", sensor.id))
                .await?;
            tracing::debug!(
                "Sensor {} ({}) returned {} samples",
                sensor.id,
                sensor.param.param_code,
                data.values.len()
            );
            sensors.insert(
                sensor.param.param_code.to_lowercase(),
                RawSensor {
                    id: Some(sensor.id),
                    name: Some(sensor.param.param_name),
                    values: data.values,
                },
            );
        }
        Ok(sensors)
    }

    async fn get_indexes(&self) -> crate::Result<RawIndexes> {
        self.get_json(&format!("/aqindex/getIndex/{}", self.station_id))
            .await
    }
}
