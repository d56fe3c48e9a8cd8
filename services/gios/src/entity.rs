//! Sensor entity descriptions

use std::fmt;

use serde::Serialize;

use crate::model::{GiosSensors, IndexLevel, Pollutant};

pub const ATTRIBUTION: &str = "Data provided by GIOŚ";
pub const CONCENTRATION_MICROGRAMS_PER_CUBIC_METER: &str = "µg/m³";

const AQI_KEY: &str = "aqi";
const INDEX_SUBKEY: &str = "index";

/// What a sensor entity reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Station-wide composite index
    AirQualityIndex,
    /// Raw concentration of one pollutant
    Concentration(Pollutant),
    /// Index level of one pollutant
    PollutantIndex(Pollutant),
}

impl SensorKind {
    /// Every sensor the integration can expose, in registration order
    pub fn all() -> Vec<SensorKind> {
        let mut kinds = vec![SensorKind::AirQualityIndex];
        for pollutant in Pollutant::ALL {
            kinds.push(SensorKind::Concentration(pollutant));
            if pollutant.has_index() {
                kinds.push(SensorKind::PollutantIndex(pollutant));
            }
        }
        kinds
    }

    /// `aqi`, `pm25` or `pm25-index`
    pub fn key(self) -> String {
        match self {
            SensorKind::AirQualityIndex => AQI_KEY.to_string(),
            SensorKind::Concentration(p) => p.key().to_string(),
            SensorKind::PollutantIndex(p) => format!("{}-{}", p.key(), INDEX_SUBKEY),
        }
    }

    pub fn unique_id(self, station_id: u32) -> String {
        format!("{}-{}", station_id, self.key())
    }

    pub fn name(self) -> String {
        match self {
            SensorKind::AirQualityIndex => "Air quality index".to_string(),
            SensorKind::Concentration(p) => p.name().to_string(),
            SensorKind::PollutantIndex(p) => format!("{} index", p.name()),
        }
    }

    pub fn unit(self) -> Option<&'static str> {
        match self {
            SensorKind::Concentration(_) => Some(CONCENTRATION_MICROGRAMS_PER_CUBIC_METER),
            SensorKind::AirQualityIndex | SensorKind::PollutantIndex(_) => None,
        }
    }

    pub fn device_class(self) -> Option<&'static str> {
        match self {
            SensorKind::AirQualityIndex | SensorKind::PollutantIndex(_) => Some("enum"),
            SensorKind::Concentration(p) => match p {
                Pollutant::C6h6 => None,
                Pollutant::Co => Some("carbon_monoxide"),
                Pollutant::No2 => Some("nitrogen_dioxide"),
                Pollutant::O3 => Some("ozone"),
                Pollutant::Pm10 => Some("pm10"),
                Pollutant::Pm25 => Some("pm25"),
                Pollutant::So2 => Some("sulphur_dioxide"),
            },
        }
    }

    pub fn state_class(self) -> Option<&'static str> {
        match self {
            SensorKind::Concentration(_) => Some("measurement"),
            SensorKind::AirQualityIndex | SensorKind::PollutantIndex(_) => None,
        }
    }

    pub fn options(self) -> Option<&'static [&'static str]> {
        match self {
            SensorKind::AirQualityIndex | SensorKind::PollutantIndex(_) => {
                Some(&IndexLevel::OPTIONS)
            }
            SensorKind::Concentration(_) => None,
        }
    }

    /// Whether the datum this sensor hangs off exists. Sensors whose datum is
    /// missing when the integration is set up are never registered.
    pub fn is_present(self, data: &GiosSensors) -> bool {
        match self {
            SensorKind::AirQualityIndex => data.aqi.is_some(),
            SensorKind::Concentration(p) | SensorKind::PollutantIndex(p) => {
                data.reading(p).is_some()
            }
        }
    }

    /// Current value, `None` when it cannot be determined
    pub fn value(self, data: &GiosSensors) -> Option<EntityValue> {
        match self {
            SensorKind::AirQualityIndex => data.aqi.map(EntityValue::Level),
            SensorKind::Concentration(p) => data.reading(p).map(|r| EntityValue::Number(r.value)),
            SensorKind::PollutantIndex(p) => data
                .reading(p)
                .and_then(|r| r.index)
                .map(EntityValue::Level),
        }
    }
}

/// A reported sensor value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntityValue {
    Number(f64),
    Level(IndexLevel),
}

impl fmt::Display for EntityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityValue::Number(value) => write!(f, "{}", value),
            EntityValue::Level(level) => write!(f, "{}", level),
        }
    }
}
