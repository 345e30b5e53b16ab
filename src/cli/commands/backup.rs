//! Backup command - archive worlds through their caches

use crate::backup::{BackupReport, BackupRunner};
use crate::cache::CacheRegistry;
use crate::cli::args::BackupArgs;
use crate::config::Config;
use crate::error::{WorldsnapError, WorldsnapResult};
use crate::io::FsTransform;
use console::style;
use std::sync::Arc;
use tracing::debug;

/// Execute the backup command
pub async fn execute(args: BackupArgs, config: &Config) -> WorldsnapResult<()> {
    let worlds = if args.worlds.is_empty() {
        config.backup.worlds.clone()
    } else {
        args.worlds
    };

    if worlds.is_empty() {
        return Err(WorldsnapError::User(
            "No worlds to back up. Set backup.worlds in the config".to_string(),
        ));
    }

    let registry = CacheRegistry::from_config(config, Arc::new(FsTransform::new()));
    if let Some(unknown) = worlds.iter().find(|w| registry.get(w).is_none()) {
        return Err(WorldsnapError::UnknownWorld(unknown.clone()));
    }

    registry.sweep_expired().await;

    let output_dir = args
        .output
        .unwrap_or_else(|| config.backup.output_dir.clone());
    let force = args.force || config.backup.force;
    debug!("Backing up {:?} to {} (force: {})", worlds, output_dir.display(), force);

    let runner = BackupRunner::new(Arc::new(registry), output_dir);
    let report = runner.run(&worlds, force).await;
    print_report(&report);

    if report.all_succeeded() {
        Ok(())
    } else {
        Err(WorldsnapError::User(format!(
            "Backup failed for: {}",
            report.failed().join(", ")
        )))
    }
}

fn print_report(report: &BackupReport) {
    for outcome in &report.outcomes {
        match &outcome.archive {
            Some(archive) => println!(
                "{} {} -> {}",
                style("✓").green(),
                outcome.world,
                archive.display()
            ),
            None => println!("{} {} failed", style("✗").red(), outcome.world),
        }
    }
}
