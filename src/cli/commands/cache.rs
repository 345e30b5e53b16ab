//! Cache command - inspect and clear world caches

use crate::cache::{CacheController, CacheRegistry, CacheState};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::{WorldsnapError, WorldsnapResult};
use crate::io::FsTransform;
use console::style;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> WorldsnapResult<()> {
    let registry = CacheRegistry::from_config(config, Arc::new(FsTransform::new()));
    registry.sweep_expired().await;

    match args.action {
        CacheAction::Status { format } => show_status(&registry, format),
        CacheAction::Clear { world, yes } => clear_caches(&registry, world, yes).await,
    }
}

fn show_status(registry: &CacheRegistry, format: OutputFormat) -> WorldsnapResult<()> {
    let controllers: Vec<Arc<CacheController>> = registry
        .worlds()
        .iter()
        .filter_map(|w| registry.get(w))
        .collect();

    if controllers.is_empty() {
        println!("No worlds configured.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_status_table(&controllers),
        OutputFormat::Json => print_status_json(&controllers)?,
        OutputFormat::Plain => print_status_plain(&controllers),
    }

    Ok(())
}

fn print_status_table(controllers: &[Arc<CacheController>]) {
    println!(
        "{:<24} {:<12} {:<12} {:<40}",
        "WORLD", "STATE", "AGE", "CACHE"
    );
    println!("{}", "-".repeat(88));

    for controller in controllers {
        let state = controller.state();
        let state_display = match state {
            CacheState::Present if controller.is_stale() => style("stale").yellow().to_string(),
            CacheState::Present => style("fresh").green().to_string(),
            other => style(other.to_string()).dim().to_string(),
        };
        let age = controller
            .age()
            .map(format_age)
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<24} {:<12} {:<12} {:<40}",
            controller.world_name(),
            state_display,
            age,
            controller.cache_dir().display()
        );
    }

    println!();
    println!("Total: {} world(s)", controllers.len());
}

fn print_status_json(controllers: &[Arc<CacheController>]) -> WorldsnapResult<()> {
    #[derive(serde::Serialize)]
    struct CacheJson {
        world: String,
        state: CacheState,
        readable: bool,
        stale: bool,
        age_secs: Option<u64>,
        cache_dir: String,
        world_path: String,
    }

    let json: Vec<CacheJson> = controllers
        .iter()
        .map(|c| CacheJson {
            world: c.world_name().to_string(),
            state: c.state(),
            readable: c.state().is_readable(),
            stale: c.is_stale(),
            age_secs: c.age().map(|a| a.as_secs()),
            cache_dir: c.cache_dir().display().to_string(),
            world_path: c.world_path().display().to_string(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn print_status_plain(controllers: &[Arc<CacheController>]) {
    for controller in controllers {
        println!("{} {}", controller.world_name(), controller.state());
    }
}

/// Human-friendly age, two most significant units
fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    let (days, hours, mins, secs) = (secs / 86_400, secs / 3600 % 24, secs / 60 % 60, secs % 60);
    match (days, hours, mins) {
        (0, 0, 0) => format!("{secs}s"),
        (0, 0, m) => format!("{m}m {secs}s"),
        (0, h, m) => format!("{h}h {m}m"),
        (d, h, _) => format!("{d}d {h}h"),
    }
}

async fn clear_caches(
    registry: &CacheRegistry,
    world: Option<String>,
    skip_confirm: bool,
) -> WorldsnapResult<()> {
    let targets: Vec<Arc<CacheController>> = match world {
        Some(name) => vec![registry
            .get(&name)
            .ok_or(WorldsnapError::UnknownWorld(name))?],
        None => registry
            .worlds()
            .iter()
            .filter_map(|w| registry.get(w))
            .collect(),
    };

    let present: Vec<&Arc<CacheController>> = targets
        .iter()
        .filter(|c| c.cache_dir().exists())
        .collect();

    if present.is_empty() {
        println!("No caches to clear.");
        return Ok(());
    }

    println!("This will remove {} cache(s):", present.len());
    for controller in &present {
        println!(
            "  {} {} ({})",
            style("•").red(),
            controller.world_name(),
            controller.cache_dir().display()
        );
    }
    println!();

    if !skip_confirm {
        print!("Are you sure? [y/N] ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let mut cleared = 0;
    for controller in present {
        controller.clear().await?;
        cleared += 1;
    }

    println!("{} cleared {} cache(s)", style("✓").green(), cleared);

    Ok(())
}
