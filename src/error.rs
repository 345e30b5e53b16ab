//! Error types for worldsnap
//!
//! All modules use `WorldsnapResult<T>` as their return type. The cache
//! controller absorbs these at its boundary and reports plain success or
//! failure to its callers.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for worldsnap operations
pub type WorldsnapResult<T> = Result<T, WorldsnapError>;

/// All errors that can occur in worldsnap
#[derive(Error, Debug)]
pub enum WorldsnapError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown time unit: {0}")]
    UnknownTimeUnit(String),

    // World errors
    #[error("World path does not exist: {0}")]
    WorldMissing(PathBuf),

    #[error("World is not configured: {0}")]
    UnknownWorld(String),

    // Cache errors
    #[error("Cache could not be rebuilt for world {0}")]
    CacheUnavailable(String),

    #[error("Cache vanished before archiving: {0}")]
    CacheVanished(PathBuf),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid path: {path}: {reason}")]
    PathInvalid { path: PathBuf, reason: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl WorldsnapError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::WorldMissing(_) => Some("Check backup.world_root and backup.worlds in the config"),
            Self::UnknownWorld(_) => Some("Add the world to backup.worlds or drop the --world flag"),
            Self::ConfigInvalid { .. } => Some("Run: worldsnap config show"),
            Self::UnknownTimeUnit(_) => {
                Some("Use one of: nanoseconds, microseconds, milliseconds, seconds, minutes, hours, days")
            }
            _ => None,
        }
    }
}
