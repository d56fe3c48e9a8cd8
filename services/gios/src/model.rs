//! Pollutants, index levels and the mapping from raw payloads to sensor values

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::api::{AllSensors, IndexField, Payloads, RawIndexLevel, RawIndexes, Sample};

/// Number of newest samples searched for a usable value
const SAMPLES_CONSIDERED: usize = 2;

const SAMPLE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A pollutant measured by GIOŚ stations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pollutant {
    C6h6,
    Co,
    No2,
    O3,
    Pm10,
    Pm25,
    So2,
}

impl Pollutant {
    pub const ALL: [Pollutant; 7] = [
        Pollutant::C6h6,
        Pollutant::Co,
        Pollutant::No2,
        Pollutant::O3,
        Pollutant::Pm10,
        Pollutant::Pm25,
        Pollutant::So2,
    ];

    /// Alphanumeric key used in unique ids
    pub fn key(self) -> &'static str {
        match self {
            Pollutant::C6h6 => "c6h6",
            Pollutant::Co => "co",
            Pollutant::No2 => "no2",
            Pollutant::O3 => "o3",
            Pollutant::Pm10 => "pm10",
            Pollutant::Pm25 => "pm25",
            Pollutant::So2 => "so2",
        }
    }

    /// Parameter code as returned by the API, lowercased
    pub fn api_code(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm2.5",
            other => other.key(),
        }
    }

    /// Accepts the API code (`PM2.5`) as well as the key (`pm25`)
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.api_code() == code || p.key() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Pollutant::C6h6 => "Benzene",
            Pollutant::Co => "Carbon monoxide",
            Pollutant::No2 => "Nitrogen dioxide",
            Pollutant::O3 => "Ozone",
            Pollutant::Pm10 => "PM10",
            Pollutant::Pm25 => "PM2.5",
            Pollutant::So2 => "Sulphur dioxide",
        }
    }

    /// Whether GIOŚ publishes an index level for this pollutant
    pub fn has_index(self) -> bool {
        !matches!(self, Pollutant::C6h6 | Pollutant::Co)
    }

    fn index_field(self, indexes: &RawIndexes) -> Option<&IndexField> {
        match self {
            Pollutant::No2 => Some(&indexes.no2_index_level),
            Pollutant::O3 => Some(&indexes.o3_index_level),
            Pollutant::Pm10 => Some(&indexes.pm10_index_level),
            Pollutant::Pm25 => Some(&indexes.pm25_index_level),
            Pollutant::So2 => Some(&indexes.so2_index_level),
            Pollutant::C6h6 | Pollutant::Co => None,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Air-quality index level, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexLevel {
    VeryGood,
    Good,
    Moderate,
    Sufficient,
    Bad,
    VeryBad,
}

impl IndexLevel {
    pub const ALL: [IndexLevel; 6] = [
        IndexLevel::VeryGood,
        IndexLevel::Good,
        IndexLevel::Moderate,
        IndexLevel::Sufficient,
        IndexLevel::Bad,
        IndexLevel::VeryBad,
    ];

    /// Option list advertised by index entities, worst first
    pub const OPTIONS: [&'static str; 6] =
        ["very_bad", "bad", "sufficient", "moderate", "good", "very_good"];

    pub fn as_str(self) -> &'static str {
        match self {
            IndexLevel::VeryGood => "very_good",
            IndexLevel::Good => "good",
            IndexLevel::Moderate => "moderate",
            IndexLevel::Sufficient => "sufficient",
            IndexLevel::Bad => "bad",
            IndexLevel::VeryBad => "very_bad",
        }
    }

    fn api_name(self) -> &'static str {
        match self {
            IndexLevel::VeryGood => "bardzo dobry",
            IndexLevel::Good => "dobry",
            IndexLevel::Moderate => "umiarkowany",
            IndexLevel::Sufficient => "dostateczny",
            IndexLevel::Bad => "zły",
            IndexLevel::VeryBad => "bardzo zły",
        }
    }

    /// Parse a level name as published by GIOŚ (`Dobry`) or its key (`good`)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.api_name() == name || level.as_str() == name)
    }

    /// Levels are numbered 0 (very good) to 5 (very bad)
    pub fn from_id(id: i64) -> Option<Self> {
        usize::try_from(id)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// A name, when given, decides; the id is only used when the name is absent
    pub fn from_raw(raw: &RawIndexLevel) -> Option<Self> {
        match (&raw.index_level_name, raw.id) {
            (Some(name), _) => Self::from_name(name),
            (None, Some(id)) => Self::from_id(id),
            (None, None) => None,
        }
    }

    fn from_field(field: &IndexField) -> Option<Self> {
        match field {
            IndexField::Level(raw) => Self::from_raw(raw),
            IndexField::Missing | IndexField::Malformed(_) => None,
        }
    }
}

impl fmt::Display for IndexLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current reading of one pollutant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub value: f64,
    pub measured_at: Option<NaiveDateTime>,
    pub index: Option<IndexLevel>,
}

/// Sensor values derived from one fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GiosSensors {
    pub readings: BTreeMap<Pollutant, Reading>,
    pub aqi: Option<IndexLevel>,
}

impl GiosSensors {
    /// Map both payloads onto sensor values. `known` holds the pollutants that
    /// had a reading in an earlier fetch.
    pub fn from_payloads(payloads: &Payloads, known: &BTreeSet<Pollutant>) -> Self {
        Self::map_with_known(&payloads.sensors, &payloads.indexes, known)
    }

    pub fn map(sensors: &AllSensors, indexes: &RawIndexes) -> Self {
        Self::map_with_known(sensors, indexes, &BTreeSet::new())
    }

    pub fn map_with_known(
        sensors: &AllSensors,
        indexes: &RawIndexes,
        known: &BTreeSet<Pollutant>,
    ) -> Self {
        let mut contributing: BTreeSet<Pollutant> = known.clone();
        let mut readings = BTreeMap::new();

        for (code, raw) in sensors {
            let Some(pollutant) = Pollutant::from_code(code) else {
                tracing::debug!("Ignoring unsupported parameter '{}'", code);
                continue;
            };
            contributing.insert(pollutant);

            let Some((value, measured_at)) = latest_value(&raw.values) else {
                tracing::debug!("No valid value for {}", pollutant);
                continue;
            };
            let index = pollutant
                .index_field(indexes)
                .and_then(IndexLevel::from_field);
            readings.insert(
                pollutant,
                Reading {
                    value,
                    measured_at,
                    index,
                },
            );
        }

        contributing.extend(
            Pollutant::ALL
                .iter()
                .copied()
                .filter(|p| !matches!(p.index_field(indexes), None | Some(IndexField::Missing))),
        );

        let aqi = composite_index(&contributing, &readings, indexes);
        Self { readings, aqi }
    }

    pub fn reading(&self, pollutant: Pollutant) -> Option<&Reading> {
        self.readings.get(&pollutant)
    }
}

fn latest_value(values: &[Sample]) -> Option<(f64, Option<NaiveDateTime>)> {
    values.iter().take(SAMPLES_CONSIDERED).find_map(|sample| {
        let value = sample.value.filter(|v| v.is_finite())?;
        let measured_at = sample
            .date
            .as_deref()
            .and_then(|d| NaiveDateTime::parse_from_str(d, SAMPLE_DATE_FORMAT).ok());
        Some((value, measured_at))
    })
}

/// An index-bearing pollutant contributes when it is listed in the sensors
/// payload, carries a field in the index document, or had an earlier reading.
/// The composite is the designated station level, or the worst contributing
/// level when the API designates none, and only exists while every
/// contributing index is valid.
fn composite_index(
    contributing: &BTreeSet<Pollutant>,
    readings: &BTreeMap<Pollutant, Reading>,
    indexes: &RawIndexes,
) -> Option<IndexLevel> {
    let mut worst: Option<IndexLevel> = None;
    for pollutant in contributing.iter().filter(|p| p.has_index()) {
        let level = readings.get(pollutant).and_then(|r| r.index)?;
        worst = worst.max(Some(level));
    }

    match &indexes.st_index_level {
        IndexField::Missing => worst,
        field => IndexLevel::from_field(field),
    }
}
