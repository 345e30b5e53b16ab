//! Deterministic archive file names

use chrono::{DateTime, NaiveDateTime, TimeZone};
use std::fmt::Display;
use std::path::Path;

/// Extension of archives written by the filesystem transform
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Timestamp layout embedded in archive names; sorts lexically by time
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S-%3f";

/// Name prefix shared by every archive of a world
///
/// A world configured as a path (`worlds/alpha`) is grouped by its last
/// component, the same way its archives are named.
pub fn world_prefix(world: &str) -> &str {
    Path::new(world)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(world)
}

/// Build the archive file name for a world at a point in time
///
/// Produces `<world>-<YYYY-MM-DD_HH-MM-SS-mmm>.zip`.
pub fn archive_file_name<Tz>(world: &str, at: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{}-{}.{}",
        world_prefix(world),
        at.format(TIMESTAMP_FORMAT),
        ARCHIVE_EXTENSION
    )
}

/// Timestamp of an archive written for `prefix`, if `name` is one
///
/// Only `<prefix>-<timestamp>` with an optional extension qualifies, so world
/// `alpha` never claims the archives of `alpha-beta`.
pub fn archive_timestamp(name: &str, prefix: &str) -> Option<NaiveDateTime> {
    let rest = name.strip_prefix(prefix)?.strip_prefix('-')?;
    let stamp = rest.split_once('.').map_or(rest, |(stem, _)| stem);
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}
