//! Integration tests for worldsnap

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use worldsnap::config::Config;

/// A world root with one populated world, plus cache and output dirs
struct Sandbox {
    temp: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let sandbox = Self {
            temp: TempDir::new().unwrap(),
        };
        let world = sandbox.world_path("world");
        fs::create_dir_all(world.join("region")).unwrap();
        fs::write(world.join("level.dat"), b"level").unwrap();
        fs::write(world.join("region").join("r.0.0.mca"), b"chunks").unwrap();
        sandbox
    }

    fn root(&self) -> &Path {
        self.temp.path()
    }

    fn world_path(&self, name: &str) -> PathBuf {
        self.root().join("worlds").join(name)
    }

    fn cache_dir(&self, name: &str) -> PathBuf {
        self.root().join("cache").join(name)
    }

    fn output_dir(&self) -> PathBuf {
        self.root().join("backups")
    }

    fn config(&self, worlds: &[&str], history: usize) -> Config {
        let mut config = Config::default();
        config.cache.temp_dir = self.root().join("cache");
        config.cache.history = history;
        config.backup.world_root = self.root().join("worlds");
        config.backup.worlds = worlds.iter().map(|w| w.to_string()).collect();
        config.backup.output_dir = self.output_dir();
        config
    }

    fn write_config(&self, config: &Config) -> PathBuf {
        let path = self.root().join("config.toml");
        fs::write(&path, toml::to_string_pretty(config).unwrap()).unwrap();
        path
    }

    fn archives(&self) -> Vec<PathBuf> {
        let mut archives: Vec<PathBuf> = match fs::read_dir(self.output_dir()) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        };
        archives.sort();
        archives
    }
}

fn archive_entries(path: &Path) -> Vec<String> {
    let zip = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
    names.sort();
    names
}

mod cli_tests {
    use super::*;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn worldsnap(config: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("worldsnap");
        cmd.arg("--config").arg(config);
        cmd
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("worldsnap")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("consistent backups"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("worldsnap")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("worldsnap"));
    }

    #[test]
    fn config_path() {
        let sandbox = Sandbox::new();
        let path = sandbox.root().join("custom.toml");

        worldsnap(&path)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show() {
        let sandbox = Sandbox::new();
        let path = sandbox.write_config(&sandbox.config(&["world"], 5));

        worldsnap(&path)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]").and(predicate::str::contains("history = 5")));
    }

    #[test]
    fn config_init_creates_file() {
        let sandbox = Sandbox::new();
        let path = sandbox.root().join("fresh").join("config.toml");

        worldsnap(&path)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));

        assert!(path.is_file());
    }

    #[test]
    fn invalid_config_is_reported() {
        let sandbox = Sandbox::new();
        let path = sandbox.root().join("config.toml");
        fs::write(&path, "[cache]\nlifetime = \"forever\"\n").unwrap();

        worldsnap(&path)
            .args(["backup"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn backup_writes_archive() {
        let sandbox = Sandbox::new();
        let path = sandbox.write_config(&sandbox.config(&["world"], 5));

        worldsnap(&path)
            .args(["backup"])
            .assert()
            .success()
            .stdout(predicate::str::contains("world ->"));

        let archives = sandbox.archives();
        assert_eq!(archives.len(), 1);
        let name = archives[0].file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("world-") && name.ends_with(".zip"));
        assert!(archive_entries(&archives[0]).contains(&"region/r.0.0.mca".to_string()));
        assert!(sandbox.cache_dir("world").join("level.dat").is_file());
    }

    #[test]
    fn backup_missing_world_fails() {
        let sandbox = Sandbox::new();
        let path = sandbox.write_config(&sandbox.config(&["world", "gone"], 5));

        worldsnap(&path)
            .args(["backup"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Backup failed for: gone"));

        assert_eq!(sandbox.archives().len(), 1);
        assert!(!sandbox.cache_dir("gone").exists());
    }

    #[test]
    fn backup_unknown_world_flag_fails() {
        let sandbox = Sandbox::new();
        let path = sandbox.write_config(&sandbox.config(&["world"], 5));

        worldsnap(&path)
            .args(["backup", "--world", "creative"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("World is not configured: creative"));

        assert!(sandbox.archives().is_empty());
    }

    #[test]
    fn cache_status_and_clear() {
        let sandbox = Sandbox::new();
        let path = sandbox.write_config(&sandbox.config(&["world"], 5));

        worldsnap(&path).args(["backup"]).assert().success();

        worldsnap(&path)
            .args(["cache", "status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"state\": \"present\""));

        worldsnap(&path)
            .args(["cache", "clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cleared 1 cache(s)"));

        assert!(!sandbox.cache_dir("world").exists());

        worldsnap(&path)
            .args(["cache", "status", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("world absent"));
    }
}

mod sweep_tests {
    use super::*;
    use assert_cmd::cargo::cargo_bin_cmd;
    use filetime::FileTime;
    use predicates::prelude::*;
    use std::time::{Duration, SystemTime};

    fn age(path: &Path, by: Duration) {
        let when = FileTime::from_system_time(SystemTime::now() - by);
        filetime::set_file_mtime(path, when).unwrap();
    }

    #[test]
    fn cache_from_earlier_run_is_swept_once_expired() {
        let sandbox = Sandbox::new();
        let config = sandbox.write_config(&sandbox.config(&["world"], 5));

        cargo_bin_cmd!("worldsnap")
            .arg("--config")
            .arg(&config)
            .arg("backup")
            .assert()
            .success();
        assert!(sandbox.cache_dir("world").is_dir());

        age(&sandbox.cache_dir("world"), Duration::from_secs(31 * 60));

        cargo_bin_cmd!("worldsnap")
            .arg("--config")
            .arg(&config)
            .args(["cache", "status", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("world absent"));
        assert!(!sandbox.cache_dir("world").exists());
    }

    #[test]
    fn fresh_cache_survives_the_next_run() {
        let sandbox = Sandbox::new();
        let config = sandbox.write_config(&sandbox.config(&["world"], 5));

        cargo_bin_cmd!("worldsnap")
            .arg("--config")
            .arg(&config)
            .arg("backup")
            .assert()
            .success();

        age(&sandbox.cache_dir("world"), Duration::from_secs(29 * 60));
        cargo_bin_cmd!("worldsnap")
            .arg("--config")
            .arg(&config)
            .args(["cache", "status", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("world present"));
        assert!(sandbox.cache_dir("world").is_dir());
    }
}

mod backup_tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use chrono::Local;
    use worldsnap::archive::archive_file_name;
    use worldsnap::backup::BackupRunner;
    use worldsnap::cache::{CacheRegistry, CacheState};
    use worldsnap::io::FsTransform;

    fn runner(sandbox: &Sandbox, config: &Config) -> BackupRunner {
        let registry = CacheRegistry::from_config(config, Arc::new(FsTransform::new()));
        BackupRunner::new(Arc::new(registry), sandbox.output_dir())
    }

    #[tokio::test]
    async fn fresh_cache_is_reused_until_forced() {
        let sandbox = Sandbox::new();
        let config = sandbox.config(&["world"], 0);
        let runner = runner(&sandbox, &config);

        assert!(runner.run_all(false).await.all_succeeded());
        fs::write(sandbox.world_path("world").join("new.dat"), b"new").unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let reused = runner.run_all(false).await;
        let archive = reused.outcomes[0].archive.clone().unwrap();
        assert!(!archive_entries(&archive).contains(&"new.dat".to_string()));

        tokio::time::sleep(Duration::from_millis(5)).await;
        let forced = runner.run_all(true).await;
        let archive = forced.outcomes[0].archive.clone().unwrap();
        assert!(archive_entries(&archive).contains(&"new.dat".to_string()));
    }

    #[tokio::test]
    async fn history_keeps_newest_archives() {
        let sandbox = Sandbox::new();
        let config = sandbox.config(&["world"], 2);
        let runner = runner(&sandbox, &config);
        fs::create_dir_all(sandbox.output_dir()).unwrap();
        fs::write(sandbox.output_dir().join("world_nether-old.zip"), b"other world").unwrap();
        let hyphenated = sandbox
            .output_dir()
            .join(archive_file_name("world-creative", Local::now()));
        fs::write(&hyphenated, b"hyphenated world").unwrap();

        let mut written = Vec::new();
        for _ in 0..3 {
            let report = runner.run_all(false).await;
            written.push(report.outcomes[0].archive.clone().unwrap());
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert!(!written[0].exists());
        assert!(written[1].exists());
        assert!(written[2].exists());
        assert!(sandbox.output_dir().join("world_nether-old.zip").exists());
        assert!(hyphenated.exists());
    }

    #[tokio::test]
    async fn vanished_world_leaves_no_cache() {
        let sandbox = Sandbox::new();
        let config = sandbox.config(&["world"], 5);
        let runner = runner(&sandbox, &config);

        assert!(runner.run_all(false).await.all_succeeded());
        fs::remove_dir_all(sandbox.world_path("world")).unwrap();

        let report = runner.run_all(true).await;

        assert_eq!(report.failed(), vec!["world"]);
        assert!(!sandbox.cache_dir("world").exists());
        let controller = runner.registry().get("world").unwrap();
        assert_eq!(controller.state(), CacheState::Absent);
    }

    #[tokio::test]
    async fn short_lifetime_cache_expires_on_its_own() {
        let sandbox = Sandbox::new();
        let mut config = sandbox.config(&["world"], 5);
        config.cache.lifetime = 200;
        config.cache.time_unit = "milliseconds".to_string();
        let runner = runner(&sandbox, &config);

        assert!(runner.run_all(false).await.all_succeeded());
        assert!(sandbox.cache_dir("world").is_dir());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while sandbox.cache_dir("world").exists() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        assert!(!sandbox.cache_dir("world").exists());
        assert_eq!(sandbox.archives().len(), 1);
    }
}
