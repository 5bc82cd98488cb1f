use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Largest index that fits in an 8-bit indexed output pixel
pub const MAX_INDEX: u32 = u8::MAX as u32;

/// Raw per-panorama entry as it appears in the mapping JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPanoramaMapping {
    #[serde(default)]
    pub static_masks: BTreeMap<String, u32>,

    #[serde(default)]
    pub sequence_masks: BTreeMap<String, u32>,
}

/// The whole mapping file: panorama id -> mask index assignments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingFile {
    panoramas: HashMap<String, RawPanoramaMapping>,
}

impl MappingFile {
    /// Load the mapping JSON from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        Self::from_json(&content).map_err(|e| match e {
            crate::error::CompositorError::Config(ConfigError::ParseFailed { reason, .. }) => {
                ConfigError::ParseFailed { path: path.display().to_string(), reason }.into()
            }
            other => other,
        })
    }

    /// Parse mapping JSON from a string
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| {
            ConfigError::ParseFailed {
                path: "<inline>".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Resolve and validate the configuration of one panorama
    pub fn panorama(&self, id: &str) -> Result<PanoramaConfig> {
        let raw = self
            .panoramas
            .get(id)
            .ok_or_else(|| ConfigError::UnknownPanorama { id: id.to_string() })?;
        PanoramaConfig::from_raw(id, raw)
    }

    /// Ids of every panorama in the file
    pub fn panorama_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.panoramas.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// A static mask key bound to its output index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticBinding {
    /// Brightness value or filename suffix naming the asset
    pub key: String,
    pub index: u8,
}

/// A sequence number bound to its output index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceBinding {
    pub sequence: u32,
    pub index: u8,
}

/// Validated index assignments for one panorama
///
/// Indexes are unique across both mappings and lie in `1..=255`. Static
/// bindings are kept in ascending index order, which is the layering order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanoramaConfig {
    id: String,
    static_masks: Vec<StaticBinding>,
    sequence_masks: Vec<SequenceBinding>,
}

impl PanoramaConfig {
    /// Validate a raw mapping entry
    pub fn from_raw(id: &str, raw: &RawPanoramaMapping) -> Result<Self> {
        let mut owners: BTreeMap<u32, String> = BTreeMap::new();

        let mut claim = |index: u32, owner: String| -> Result<u8> {
            if index == 0 || index > MAX_INDEX {
                return Err(ConfigError::InvalidValue {
                    key: owner,
                    value: index.to_string(),
                }
                .into());
            }
            if let Some(first) = owners.get(&index) {
                return Err(ConfigError::IndexCollision {
                    index,
                    first: first.clone(),
                    second: owner,
                }
                .into());
            }
            owners.insert(index, owner);
            Ok(index as u8)
        };

        let mut sequence_masks = Vec::with_capacity(raw.sequence_masks.len());
        for (key, &index) in &raw.sequence_masks {
            let sequence: u32 = key.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "sequence_masks".to_string(),
                value: key.clone(),
            })?;
            let index = claim(index, format!("sequence_masks.{}", key))?;
            sequence_masks.push(SequenceBinding { sequence, index });
        }

        let mut static_masks = Vec::with_capacity(raw.static_masks.len());
        for (key, &index) in &raw.static_masks {
            let collides = raw.sequence_masks.contains_key(key)
                || key
                    .trim()
                    .parse::<u32>()
                    .map(|n| sequence_masks.iter().any(|s| s.sequence == n))
                    .unwrap_or(false);
            if collides {
                return Err(ConfigError::KeyCollision { key: key.clone() }.into());
            }
            let index = claim(index, format!("static_masks.{}", key))?;
            static_masks.push(StaticBinding { key: key.clone(), index });
        }

        static_masks.sort_by_key(|b| b.index);
        sequence_masks.sort_by_key(|b| b.sequence);

        debug!(
            "Panorama {}: {} static, {} sequence bindings",
            id,
            static_masks.len(),
            sequence_masks.len()
        );

        Ok(Self {
            id: id.to_string(),
            static_masks,
            sequence_masks,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Static bindings in ascending index order
    pub fn static_masks(&self) -> &[StaticBinding] {
        &self.static_masks
    }

    /// Sequence bindings in ascending sequence order
    pub fn sequence_masks(&self) -> &[SequenceBinding] {
        &self.sequence_masks
    }

    pub fn sequence_binding(&self, sequence: u32) -> Option<&SequenceBinding> {
        self.sequence_masks.iter().find(|b| b.sequence == sequence)
    }
}
