//! Entity registry
//!
//! Keeps the mapping between stable unique ids and entity ids across restarts,
//! and rewrites unique ids that still use legacy pollutant codes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::GiosError;

/// Entity domain of every entity this service registers
pub const DOMAIN_SENSOR: &str = "sensor";
/// Platform name recorded on registry entries
pub const PLATFORM: &str = "gios";

/// A registered entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub entity_id: String,
    pub unique_id: String,
    pub platform: String,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl RegistryEntry {
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map(|(domain, _)| domain)
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    entities: Vec<RegistryEntry>,
}

/// Entity registry, optionally persisted as JSON
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entries: Vec<RegistryEntry>,
    path: Option<PathBuf>,
}

impl EntityRegistry {
    /// A registry that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the registry at `path`; a missing file yields an empty registry
    pub fn load(path: &Path) -> crate::Result<Self> {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) => {
                let file: RegistryFile = serde_json::from_str(&raw).map_err(|e| {
                    GiosError::Registry(format!("Failed to parse registry {:?}: {}", path, e))
                })?;
                file.entities
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(GiosError::Registry(format!(
                    "Failed to read registry {:?}: {}",
                    path, e
                )))
            }
        };
        tracing::debug!("Loaded {} registry entries from {:?}", entries.len(), path);
        Ok(Self {
            entries,
            path: Some(path.to_path_buf()),
        })
    }

    /// Write the registry back to its file, if it has one
    pub fn save(&self) -> crate::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                GiosError::Registry(format!("Failed to create registry dir {:?}: {}", dir, e))
            })?;
        }
        let file = RegistryFile {
            entities: self.entries.clone(),
        };
        let serialized = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, serialized)
            .map_err(|e| GiosError::Registry(format!("Failed to write registry {:?}: {}", path, e)))?;
        tracing::debug!("Saved {} registry entries to {:?}", self.entries.len(), path);
        Ok(())
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn get(&self, entity_id: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.entity_id == entity_id)
    }

    pub fn get_entity_id(&self, domain: &str, platform: &str, unique_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.domain() == domain && e.platform == platform && e.unique_id == unique_id)
            .map(|e| e.entity_id.as_str())
    }

    /// Return the entry for `unique_id`, registering it under a free entity id
    /// derived from `suggested_object_id` when it is new
    pub fn get_or_create(
        &mut self,
        domain: &str,
        platform: &str,
        unique_id: &str,
        suggested_object_id: &str,
        original_name: Option<&str>,
    ) -> &RegistryEntry {
        if let Some(pos) = self.entries.iter().position(|e| {
            e.domain() == domain && e.platform == platform && e.unique_id == unique_id
        }) {
            return &self.entries[pos];
        }

        let entity_id = self.free_entity_id(domain, suggested_object_id);
        tracing::debug!("Registering {} as {}", unique_id, entity_id);
        self.entries.push(RegistryEntry {
            entity_id,
            unique_id: unique_id.to_string(),
            platform: platform.to_string(),
            original_name: original_name.map(str::to_string),
            disabled: false,
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Give an existing entry a new unique id
    pub fn update_unique_id(&mut self, entity_id: &str, new_unique_id: &str) -> crate::Result<()> {
        let Some(pos) = self.entries.iter().position(|e| e.entity_id == entity_id) else {
            return Err(GiosError::Registry(format!("Unknown entity {}", entity_id)));
        };
        let (domain, platform) = (
            self.entries[pos].domain().to_string(),
            self.entries[pos].platform.clone(),
        );
        if let Some(other) = self.get_entity_id(&domain, &platform, new_unique_id) {
            return Err(GiosError::Registry(format!(
                "Unique id {} is already used by {}",
                new_unique_id, other
            )));
        }
        self.entries[pos].unique_id = new_unique_id.to_string();
        Ok(())
    }

    /// Rewrite legacy unique ids of this station's sensors (`123-pm2.5` becomes
    /// `123-pm25`). Returns the number of entries rewritten; running it again
    /// rewrites nothing.
    pub fn migrate_unique_ids(&mut self, station_id: u32) -> usize {
        let candidates: Vec<(String, String, String)> = self
            .entries
            .iter()
            .filter(|e| e.domain() == DOMAIN_SENSOR && e.platform == PLATFORM)
            .filter_map(|e| {
                migrated_unique_id(&e.unique_id, station_id)
                    .map(|new_id| (e.entity_id.clone(), e.unique_id.clone(), new_id))
            })
            .collect();

        let mut migrated = 0;
        for (entity_id, old_unique_id, new_unique_id) in candidates {
            match self.update_unique_id(&entity_id, &new_unique_id) {
                Ok(()) => {
                    tracing::debug!(
                        "Migrating entity {} from old unique ID '{}' to new unique ID '{}'",
                        entity_id,
                        old_unique_id,
                        new_unique_id
                    );
                    migrated += 1;
                }
                Err(e) => {
                    tracing::warn!("Cannot migrate entity {}: {}", entity_id, e);
                }
            }
        }
        migrated
    }

    fn free_entity_id(&self, domain: &str, suggested_object_id: &str) -> String {
        let taken: HashSet<&str> = self.entries.iter().map(|e| e.entity_id.as_str()).collect();
        let object_id = match slugify(suggested_object_id) {
            slug if slug.is_empty() => "unnamed".to_string(),
            slug => slug,
        };
        let base = format!("{}.{}", domain, object_id);
        if !taken.contains(base.as_str()) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", base, n);
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// The current form of a legacy unique id, `None` when it is already current
/// or belongs to another station. Pollutant codes lose every character that is
/// not alphanumeric.
pub fn migrated_unique_id(unique_id: &str, station_id: u32) -> Option<String> {
    let rest = unique_id.strip_prefix(&format!("{}-", station_id))?;
    let (code, suffix) = match rest.split_once('-') {
        Some((code, suffix)) => (code, Some(suffix)),
        None => (rest, None),
    };
    if code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let code: String = code.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if code.is_empty() {
        return None;
    }
    Some(match suffix {
        Some(suffix) => format!("{}-{}-{}", station_id, code, suffix),
        None => format!("{}-{}", station_id, code),
    })
}

/// Lowercase `text`, fold Polish letters to ASCII and collapse every run of
/// other characters into `_`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;
    for c in text.chars().flat_map(char::to_lowercase).map(fold_polish) {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }
    slug
}

fn fold_polish(c: char) -> char {
    match c {
        'ą' => 'a',
        'ć' => 'c',
        'ę' => 'e',
        'ł' => 'l',
        'ń' => 'n',
        'ó' => 'o',
        'ś' => 's',
        'ź' | 'ż' => 'z',
        other => other,
    }
}
