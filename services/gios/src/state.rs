//! Shared state: entity states, coordinator status and the last fetched data

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::api::{Payloads, Station};
use crate::registry::RegistryEntry;

/// State reported for entities whose value cannot be determined
pub const STATE_UNAVAILABLE: &str = "unavailable";

pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Reported state of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    pub attributes: Attributes,
    pub last_changed_epoch_ms: u64,
    pub last_updated_epoch_ms: u64,
}

impl EntityState {
    pub fn is_available(&self) -> bool {
        self.state != STATE_UNAVAILABLE
    }
}

/// Outcome of the most recent refreshes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    pub last_update_success: bool,
    pub last_attempt_epoch_ms: Option<u64>,
    pub last_success_epoch_ms: Option<u64>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl CoordinatorStatus {
    pub fn record_success(&mut self, now_ms: u64) {
        self.last_update_success = true;
        self.last_attempt_epoch_ms = Some(now_ms);
        self.last_success_epoch_ms = Some(now_ms);
        self.consecutive_failures = 0;
        self.last_error = None;
    }

    pub fn record_failure(&mut self, error: String, now_ms: u64) {
        self.last_update_success = false;
        self.last_attempt_epoch_ms = Some(now_ms);
        self.consecutive_failures += 1;
        self.last_error = Some(error);
    }
}

/// Shared state accessible by the poll loop and dashboard
#[derive(Debug)]
pub struct SharedState {
    pub station_id: u32,
    pub name: String,
    pub station: Option<Station>,
    pub entities: Vec<RegistryEntry>,
    pub states: BTreeMap<String, EntityState>,
    pub coordinator: CoordinatorStatus,
    pub payloads: Option<Payloads>,
    pub started_at: Instant,
}

impl SharedState {
    pub fn new(station_id: u32, name: &str) -> Self {
        Self {
            station_id,
            name: name.to_string(),
            station: None,
            entities: Vec::new(),
            states: BTreeMap::new(),
            coordinator: CoordinatorStatus::default(),
            payloads: None,
            started_at: Instant::now(),
        }
    }

    /// Write an entity's state, returning true if the state value changed.
    /// `last_changed` only moves when the value does.
    pub fn set_state(
        &mut self,
        entity_id: &str,
        state: String,
        attributes: Attributes,
        now_ms: u64,
    ) -> bool {
        match self.states.get_mut(entity_id) {
            Some(existing) => {
                let changed = existing.state != state;
                if changed {
                    existing.last_changed_epoch_ms = now_ms;
                }
                existing.state = state;
                existing.attributes = attributes;
                existing.last_updated_epoch_ms = now_ms;
                changed
            }
            None => {
                self.states.insert(
                    entity_id.to_string(),
                    EntityState {
                        entity_id: entity_id.to_string(),
                        state,
                        attributes,
                        last_changed_epoch_ms: now_ms,
                        last_updated_epoch_ms: now_ms,
                    },
                );
                true
            }
        }
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntityState> {
        self.states.get(entity_id)
    }
}

/// Thread-safe shared state handle
pub type StateHandle = Arc<RwLock<SharedState>>;

pub fn new_state_handle(station_id: u32, name: &str) -> StateHandle {
    Arc::new(RwLock::new(SharedState::new(station_id, name)))
}

pub fn current_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
