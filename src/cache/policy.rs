//! Cache lifetime policy and staleness
//!
//! A cache is stale when it is missing or when its directory mtime is older
//! than the configured lifetime. The mtime is stamped when a rebuild makes
//! the cache visible, so no separate timestamp is tracked.

use crate::error::WorldsnapError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use tracing::warn;

/// Unit the cache lifetime is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    #[default]
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert an amount of this unit into a duration, saturating on overflow
    pub fn duration(&self, amount: u64) -> Duration {
        match self {
            Self::Nanoseconds => Duration::from_nanos(amount),
            Self::Microseconds => Duration::from_micros(amount),
            Self::Milliseconds => Duration::from_millis(amount),
            Self::Seconds => Duration::from_secs(amount),
            Self::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            Self::Hours => Duration::from_secs(amount.saturating_mul(60 * 60)),
            Self::Days => Duration::from_secs(amount.saturating_mul(24 * 60 * 60)),
        }
    }

    /// Parse a unit name, falling back to the default with a warning
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_else(|e| {
            warn!("Failed to parse time unit, using default ({}): {}", Self::default(), e);
            Self::default()
        })
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Nanoseconds => "nanoseconds",
            Self::Microseconds => "microseconds",
            Self::Milliseconds => "milliseconds",
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = WorldsnapError;

    /// Accepts plural or singular unit names in any case (`MINUTES`, `minute`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let unit = match normalized.strip_suffix('s').unwrap_or(normalized.as_str()) {
            "nanosecond" => Self::Nanoseconds,
            "microsecond" => Self::Microseconds,
            "millisecond" => Self::Milliseconds,
            "second" => Self::Seconds,
            "minute" => Self::Minutes,
            "hour" => Self::Hours,
            "day" => Self::Days,
            _ => return Err(WorldsnapError::UnknownTimeUnit(s.to_string())),
        };
        Ok(unit)
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifetime and history policy for one cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Cache lifetime, in `time_unit`
    pub lifetime: u64,
    /// Unit of `lifetime`
    pub time_unit: TimeUnit,
    /// Number of archives to keep per world (0 = keep all)
    pub history: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            lifetime: 30,
            time_unit: TimeUnit::Minutes,
            history: 5,
        }
    }
}

impl CachePolicy {
    /// Lifetime as a duration
    pub fn lifetime(&self) -> Duration {
        self.time_unit.duration(self.lifetime)
    }

    /// Whether a cache last rebuilt at `modified` is stale at `now`
    ///
    /// A missing cache is always stale. An mtime in the future counts as
    /// age zero.
    pub fn is_stale_at(&self, modified: Option<SystemTime>, now: SystemTime) -> bool {
        match modified {
            None => true,
            Some(modified) => age_at(modified, now) > self.lifetime(),
        }
    }

    /// Whether the cache directory at `cache` is stale right now
    pub fn is_stale(&self, cache: &Path) -> bool {
        self.is_stale_at(modified(cache), SystemTime::now())
    }
}

/// Modification time of an existing directory, `None` if it is absent
pub fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path)
        .ok()
        .filter(|m| m.is_dir())
        .and_then(|m| m.modified().ok())
}

fn age_at(modified: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or(Duration::ZERO)
}
