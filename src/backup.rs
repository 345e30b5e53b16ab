//! Backup orchestration
//!
//! Backs up a set of worlds through the cache registry. Worlds run
//! concurrently; each world's own controller serializes work on its cache.
//! One world failing never stops the others.

use crate::archive::archive_file_name;
use crate::cache::CacheRegistry;
use chrono::Local;
use futures_util::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Result of backing up one world
#[derive(Debug, Clone, Serialize)]
pub struct WorldOutcome {
    pub world: String,
    /// Archive written, `None` on failure
    pub archive: Option<PathBuf>,
    pub elapsed_ms: u128,
}

impl WorldOutcome {
    pub fn succeeded(&self) -> bool {
        self.archive.is_some()
    }
}

/// Outcome of one backup run, in the order worlds were requested
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackupReport {
    pub outcomes: Vec<WorldOutcome>,
}

impl BackupReport {
    /// Whether every requested world was archived
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(WorldOutcome::succeeded)
    }

    /// Names of the worlds that failed
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.succeeded())
            .map(|o| o.world.as_str())
            .collect()
    }
}

/// Runs backups of configured worlds into an output directory
pub struct BackupRunner {
    registry: Arc<CacheRegistry>,
    output_dir: PathBuf,
}

impl BackupRunner {
    pub fn new(registry: Arc<CacheRegistry>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            output_dir: output_dir.into(),
        }
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Back up the given worlds; repeated names are backed up once
    pub async fn run(&self, worlds: &[String], force: bool) -> BackupReport {
        let mut unique: Vec<&str> = Vec::with_capacity(worlds.len());
        for world in worlds {
            if !unique.contains(&world.as_str()) {
                unique.push(world);
            }
        }

        info!("Starting backup process for {} world(s)", unique.len());
        let outcomes = join_all(unique.into_iter().map(|w| self.backup_world(w, force))).await;
        let report = BackupReport { outcomes };

        if report.all_succeeded() {
            info!("Backup process finished");
        } else {
            warn!("Backup process finished with failures: {}", report.failed().join(", "));
        }
        report
    }

    /// Back up every registered world
    pub async fn run_all(&self, force: bool) -> BackupReport {
        self.run(&self.registry.worlds(), force).await
    }

    async fn backup_world(&self, world: &str, force: bool) -> WorldOutcome {
        let archive = self.output_dir.join(archive_file_name(world, Local::now()));
        let started = Instant::now();

        let succeeded = self.registry.persist(world, &archive, force).await;
        let elapsed_ms = started.elapsed().as_millis();

        if succeeded {
            info!("Backed up {} to {} in {}ms", world, archive.display(), elapsed_ms);
        } else {
            error!("Backup of {} failed", world);
        }

        WorldOutcome {
            world: world.to_string(),
            archive: succeeded.then_some(archive),
            elapsed_ms,
        }
    }
}
