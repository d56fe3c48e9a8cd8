//! Sensor platform: registers the station's entities and reports their states

use serde::Serialize;
use serde_json::Value;

use crate::coordinator::Coordinator;
use crate::entity::{EntityValue, SensorKind, ATTRIBUTION};
use crate::model::GiosSensors;
use crate::registry::{slugify, EntityRegistry, DOMAIN_SENSOR, PLATFORM};
use crate::state::{Attributes, StateHandle, STATE_UNAVAILABLE};

pub const MANUFACTURER: &str = "GIOŚ";

/// Description of the station as a device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifier: String,
    pub name: String,
    pub manufacturer: String,
    pub entry_type: String,
    pub configuration_url: String,
}

impl DeviceInfo {
    pub fn new(station_id: u32, name: &str) -> Self {
        Self {
            identifier: format!("{}:{}", PLATFORM, station_id),
            name: name.to_string(),
            manufacturer: MANUFACTURER.to_string(),
            entry_type: "service".to_string(),
            configuration_url: format!(
                "https://powietrze.gios.gov.pl/pjp/current/station_details/chart/{}",
                station_id
            ),
        }
    }
}

/// One registered sensor entity
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEntity {
    pub kind: SensorKind,
    pub entity_id: String,
    pub unique_id: String,
    /// Display name, `{station name} {entity name}`
    pub name: String,
}

impl SensorEntity {
    /// Unavailable after a failed fetch, or when the last data has no value
    pub fn available(&self, coordinator: &Coordinator) -> bool {
        self.value(coordinator).is_some()
    }

    pub fn value(&self, coordinator: &Coordinator) -> Option<EntityValue> {
        if !coordinator.last_update_success() {
            return None;
        }
        coordinator.sensors().and_then(|data| self.kind.value(data))
    }

    pub fn state(&self, coordinator: &Coordinator) -> String {
        self.value(coordinator)
            .map(|v| v.to_string())
            .unwrap_or_else(|| STATE_UNAVAILABLE.to_string())
    }

    pub fn attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("friendly_name".to_string(), Value::from(self.name.as_str()));
        attributes.insert("attribution".to_string(), Value::from(ATTRIBUTION));
        if let Some(unit) = self.kind.unit() {
            attributes.insert("unit_of_measurement".to_string(), Value::from(unit));
        }
        if let Some(device_class) = self.kind.device_class() {
            attributes.insert("device_class".to_string(), Value::from(device_class));
        }
        if let Some(state_class) = self.kind.state_class() {
            attributes.insert("state_class".to_string(), Value::from(state_class));
        }
        if let Some(options) = self.kind.options() {
            attributes.insert("options".to_string(), Value::from(options.to_vec()));
        }
        attributes
    }
}

/// The sensor entities of one station
#[derive(Debug, Clone, Default)]
pub struct SensorPlatform {
    entities: Vec<SensorEntity>,
}

impl SensorPlatform {
    /// Register an entity for every kind whose datum is present in `data`.
    /// Kinds without data are skipped for the lifetime of the platform.
    pub fn setup(
        station_id: u32,
        name: &str,
        registry: &mut EntityRegistry,
        data: &GiosSensors,
    ) -> Self {
        let mut entities = Vec::new();
        for kind in SensorKind::all() {
            if !kind.is_present(data) {
                tracing::debug!("No data for '{}', not adding entity", kind.key());
                continue;
            }
            let unique_id = kind.unique_id(station_id);
            let display_name = format!("{} {}", name, kind.name());
            let entry = registry.get_or_create(
                DOMAIN_SENSOR,
                PLATFORM,
                &unique_id,
                &slugify(&display_name),
                Some(&kind.name()),
            );
            if entry.disabled {
                tracing::debug!("Entity {} is disabled, not adding it", entry.entity_id);
                continue;
            }
            entities.push(SensorEntity {
                kind,
                entity_id: entry.entity_id.clone(),
                unique_id,
                name: display_name,
            });
        }
        tracing::info!("Added {} sensor entities for station {}", entities.len(), station_id);
        Self { entities }
    }

    pub fn entities(&self) -> &[SensorEntity] {
        &self.entities
    }

    pub fn entity(&self, entity_id: &str) -> Option<&SensorEntity> {
        self.entities.iter().find(|e| e.entity_id == entity_id)
    }

    /// Write every entity's state. Returns the number of states that changed.
    pub async fn write_states(
        &self,
        coordinator: &Coordinator,
        state: &StateHandle,
        now_ms: u64,
    ) -> usize {
        let mut state = state.write().await;
        let mut changed = 0;
        for entity in &self.entities {
            let value = entity.state(coordinator);
            if state.set_state(&entity.entity_id, value, entity.attributes(), now_ms) {
                tracing::debug!(
                    "{} -> {}",
                    entity.entity_id,
                    state
                        .get(&entity.entity_id)
                        .map(|s| s.state.as_str())
                        .unwrap_or_default()
                );
                changed += 1;
            }
        }
        changed
    }
}
