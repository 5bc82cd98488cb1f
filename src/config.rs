use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    masks::Resolution,
};

/// Main configuration for pano-masker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Filesystem locations
    pub paths: PathsConfig,

    /// State polling settings
    pub monitor: MonitorConfig,

    /// Mask geometry and loading settings
    pub masks: MaskSettings,
}

impl Settings {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let settings: Settings = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(settings)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "settings".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.monitor.validate()?;
        self.masks.validate()?;
        Ok(())
    }
}

/// Where masks, the mapping, the state file and results live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root holding one directory per panorama
    pub landscapes_dir: PathBuf,

    /// JSON file mapping panorama ids to mask indexes
    pub mapping_file: PathBuf,

    /// Externally written state file
    pub state_file: PathBuf,

    /// Output directory for composed bitmaps
    pub results_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            landscapes_dir: PathBuf::from("./landscapes"),
            mapping_file: PathBuf::from("./mask_mapping.json"),
            state_file: PathBuf::from("./tmpl.log"),
            results_dir: PathBuf::from("./results"),
        }
    }
}

impl PathsConfig {
    /// Directory holding the assets of one panorama
    pub fn panorama_dir(&self, panorama_id: &str) -> PathBuf {
        self.landscapes_dir.join(panorama_id)
    }
}

/// State polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sleep between two polls of the state file (milliseconds)
    pub poll_interval_ms: u64,

    /// Highest sequence number the state file may name
    pub max_sequence: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            max_sequence: 255,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "monitor.poll_interval_ms".to_string(),
                value: self.poll_interval_ms.to_string()
            }.into());
        }

        Ok(())
    }
}

/// Mask geometry and loading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskSettings {
    /// Target width every mask must match
    pub width: u32,

    /// Target height every mask must match
    pub height: u32,

    /// Requests past the last frame of a sequence resolve to that last frame
    pub hold_last_frame: bool,

    /// Number of threads used to decode masks at startup
    pub load_threads: usize,
}

impl Default for MaskSettings {
    fn default() -> Self {
        Self {
            width: 3840,
            height: 1280,
            hold_last_frame: true,
            load_threads: num_cpus::get(),
        }
    }
}

impl MaskSettings {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidValue {
                key: "masks.resolution".to_string(),
                value: format!("{}x{}", self.width, self.height)
            }.into());
        }

        if self.load_threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "masks.load_threads".to_string(),
                value: self.load_threads.to_string()
            }.into());
        }

        Ok(())
    }
}
