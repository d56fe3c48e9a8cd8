//! Diagnostics document: configuration, station, refresh status and raw payloads

use serde_json::{json, Value};

use crate::sensor::DeviceInfo;
use crate::state::SharedState;

/// Collect everything useful for debugging one station into a JSON document
pub fn build(state: &SharedState) -> Value {
    json!({
        "config": {
            "station_id": state.station_id,
            "name": state.name,
        },
        "device": DeviceInfo::new(state.station_id, &state.name),
        "station": state.station,
        "coordinator": state.coordinator,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "entities": state.entities,
        "all_sensors": state.payloads.as_ref().map(|p| &p.sensors),
        "indexes": state.payloads.as_ref().map(|p| &p.indexes),
    })
}
