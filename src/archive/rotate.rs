//! Bounded archive history
//!
//! Keeps the newest N archives of a world and removes the rest. Only run
//! after a successful archive write, so a failed backup never costs an old
//! one.

use super::naming::archive_timestamp;
use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// An archive file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Full path to the archive
    pub path: PathBuf,
    /// File name, used to break mtime ties
    pub name: String,
    /// Last modification time
    pub modified: SystemTime,
}

/// Whether `name` is an archive of the group identified by `prefix`
///
/// The prefix must be followed by `-` and a timestamp in the layout
/// [`archive_file_name`](super::archive_file_name) writes, so `alpha` does
/// not claim `alpha2-...`, `alpha_nether-...` or `alpha-beta-...`. Hidden
/// files (in-progress archives) never match.
pub fn matches_prefix(name: &str, prefix: &str) -> bool {
    if prefix.is_empty() || name.starts_with('.') {
        return false;
    }
    archive_timestamp(name, prefix).is_some()
}

/// List the archives of one group, newest first
///
/// Ordering is by mtime, then by file name, both descending.
pub fn list_archives(dir: &Path, prefix: &str) -> std::io::Result<Vec<ArchiveEntry>> {
    let mut archives = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !matches_prefix(&name, prefix) {
            continue;
        }

        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        archives.push(ArchiveEntry {
            path: entry.path(),
            name,
            modified: metadata.modified()?,
        });
    }

    archives.sort_by_key(|a| Reverse((a.modified, a.name.clone())));
    Ok(archives)
}

/// Delete all but the `keep` newest archives with `prefix` in `dir`
///
/// `keep == 0` disables rotation. Failures are logged and skipped. Returns
/// the number of archives removed.
pub fn delete_all_but_newest(dir: &Path, prefix: &str, keep: usize) -> usize {
    if keep == 0 {
        return 0;
    }

    let archives = match list_archives(dir, prefix) {
        Ok(archives) => archives,
        Err(e) => {
            warn!("Failed to list archives in {}: {}", dir.display(), e);
            return 0;
        }
    };

    debug!(
        "Found {} archive(s) for {}, keeping {}",
        archives.len(),
        prefix,
        keep
    );

    let mut removed = 0;
    for archive in archives.into_iter().skip(keep) {
        match fs::remove_file(&archive.path) {
            Ok(()) => {
                info!("Removed old archive {}", archive.name);
                removed += 1;
            }
            Err(e) => warn!("Failed to remove old archive {}: {}", archive.path.display(), e),
        }
    }

    removed
}
