//! Cache directory lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a cache directory is in its lifecycle
///
/// `Rebuilding` and `Deleting` only occur while the cache lock is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// No cache directory on disk
    Absent,
    /// World is being copied into the cache
    Rebuilding,
    /// Complete cache, readable without further I/O
    Present,
    /// Expired cache is being removed
    Deleting,
}

impl CacheState {
    /// Whether readers may use the cache directory as-is
    pub fn is_readable(&self) -> bool {
        matches!(self, Self::Present)
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Rebuilding => write!(f, "rebuilding"),
            Self::Present => write!(f, "present"),
            Self::Deleting => write!(f, "deleting"),
        }
    }
}
