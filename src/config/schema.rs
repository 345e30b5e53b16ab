//! Configuration schema for worldsnap
//!
//! Configuration is stored at `~/.config/worldsnap/config.toml`

use crate::cache::{CacheSettings, TimeUnit};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// Backup settings
    pub backup: BackupConfig,
}

impl Config {
    /// Path of a world directory by name
    pub fn world_path(&self, world: &str) -> PathBuf {
        self.backup.world_root.join(world)
    }

    /// Cache settings for one world
    pub fn cache_settings(&self, world: &str) -> CacheSettings {
        CacheSettings::configure(
            &self.cache.temp_dir,
            self.world_path(world),
            self.cache.lifetime,
            &self.cache.time_unit,
            self.cache.history,
        )
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one cache directory per world
    pub temp_dir: PathBuf,

    /// How long a rebuilt cache stays fresh, in `time_unit`
    pub lifetime: u64,

    /// Unit for `lifetime`, nanoseconds through days
    pub time_unit: String,

    /// Archives kept per world (0 = keep everything)
    pub history: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            temp_dir: super::ConfigManager::state_dir().join("cache"),
            lifetime: 30,
            time_unit: TimeUnit::default().to_string(),
            history: 5,
        }
    }
}

/// Backup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Directory containing the worlds
    pub world_root: PathBuf,

    /// World names backed up when none are given on the command line
    pub worlds: Vec<String>,

    /// Where archives are written
    pub output_dir: PathBuf,

    /// Always rebuild the cache before archiving
    pub force: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            world_root: PathBuf::from("."),
            worlds: vec!["world".to_string()],
            output_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("worldsnap")
                .join("backups"),
            force: false,
        }
    }
}
