//! Per-world cache controller
//!
//! Owns one world's cache directory: decides when it is stale, rebuilds it,
//! archives it, rotates old archives and expires it once its lifetime ends.
//!
//! # Locking
//!
//! Two async mutexes per controller:
//!
//! - the rebuild gate serializes the staleness decision and the rebuild, so
//!   only one rebuild is in flight at a time;
//! - the cache lock serializes every structural step on disk (delete, copy,
//!   archive, rotate) between callers and the expiry task.
//!
//! The gate is always taken before the lock, never the other way around.
//! Neither is re-entrant: an operation takes the lock once and runs its
//! whole critical section under that guard.
//!
//! The staleness check itself reads the directory mtime without the cache
//! lock. An expiry that lands between the check and the archive step is
//! caught under the lock and answered with one rebuild.

use crate::cache::expiry::{ExpiryTicket, ExpiryTimer};
use crate::cache::policy::{self, CachePolicy, TimeUnit};
use crate::cache::state::CacheState;
use crate::error::{WorldsnapError, WorldsnapResult};
use crate::io::IoTransform;
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Attempts at archiving before giving up on a cache that keeps vanishing
const ARCHIVE_ATTEMPTS: usize = 2;

/// Where and how one world is cached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// World name, also the archive-history prefix
    pub world_name: String,
    /// Live world directory (read-only to us)
    pub world_path: PathBuf,
    /// Cache directory for this world
    pub cache_dir: PathBuf,
    /// Lifetime and history policy
    pub policy: CachePolicy,
}

impl CacheSettings {
    /// Settings from a typed policy
    ///
    /// The cache lives at `temp_dir/<world name>`, so several worlds can
    /// share one temp dir.
    pub fn new(temp_dir: impl AsRef<Path>, world_path: impl Into<PathBuf>, policy: CachePolicy) -> Self {
        let world_path = world_path.into();
        let world_name = world_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "world".to_string());
        let cache_dir = temp_dir.as_ref().join(&world_name);

        Self {
            world_name,
            world_path,
            cache_dir,
            policy,
        }
    }

    /// One-time setup from raw configuration values
    ///
    /// An unrecognized `time_unit` falls back to the default unit with a
    /// warning.
    pub fn configure(
        temp_dir: impl AsRef<Path>,
        world_path: impl Into<PathBuf>,
        lifetime: u64,
        time_unit: &str,
        history: usize,
    ) -> Self {
        let policy = CachePolicy {
            lifetime,
            time_unit: TimeUnit::parse_or_default(time_unit),
            history,
        };
        Self::new(temp_dir, world_path, policy)
    }
}

/// State shared with the expiry task
struct CacheShared {
    world_name: String,
    cache_dir: PathBuf,
    lock: Mutex<()>,
    io: Arc<dyn IoTransform>,
    state: std::sync::Mutex<CacheState>,
}

impl CacheShared {
    fn state(&self) -> CacheState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: CacheState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Record whatever is on disk after a structural step gave up
    fn settle(&self) {
        if self.cache_dir.exists() {
            self.mark_stale();
            self.set_state(CacheState::Present);
        } else {
            self.set_state(CacheState::Absent);
        }
    }

    /// Backdate the cache so the next access rebuilds it
    fn mark_stale(&self) {
        if let Err(e) = filetime::set_file_mtime(&self.cache_dir, FileTime::zero()) {
            warn!("Failed to mark cache {} stale: {}", self.cache_dir.display(), e);
        }
    }

    /// Delete the cache directory; the caller holds the cache lock
    async fn delete_locked(&self) -> WorldsnapResult<()> {
        if !self.cache_dir.exists() {
            self.set_state(CacheState::Absent);
            return Ok(());
        }

        self.set_state(CacheState::Deleting);
        let result = self.io.delete_directory(&self.cache_dir).await;
        self.settle();
        result
    }

    /// Expiry callback: delete the cache unless a newer arm superseded us
    async fn expire(&self, ticket: ExpiryTicket) {
        if !self.cache_dir.exists() {
            debug!("Cache for {} already gone at expiry", self.world_name);
            return;
        }

        debug!("expire() obtaining lock for {}", self.world_name);
        let _guard = self.lock.lock().await;

        if !ticket.is_current() {
            debug!(
                "Expiry {} for {} superseded, keeping cache",
                ticket.generation(),
                self.world_name
            );
            return;
        }

        info!("Cache lifetime ended for {}, deleting cache", self.world_name);
        if let Err(e) = self.delete_locked().await {
            warn!("Failed to delete expired cache for {}: {}", self.world_name, e);
        }
        debug!("expire() unlocked for {}", self.world_name);
    }
}

/// Controls the lifecycle of one world's cache directory
pub struct CacheController {
    world_path: PathBuf,
    policy: CachePolicy,
    shared: Arc<CacheShared>,
    rebuild_gate: Mutex<()>,
    expiry: ExpiryTimer,
}

impl CacheController {
    /// Create a controller; the cache state is read from disk
    pub fn new(settings: CacheSettings, io: Arc<dyn IoTransform>) -> Self {
        let initial = if settings.cache_dir.is_dir() {
            CacheState::Present
        } else {
            CacheState::Absent
        };

        Self {
            world_path: settings.world_path,
            policy: settings.policy,
            shared: Arc::new(CacheShared {
                world_name: settings.world_name,
                cache_dir: settings.cache_dir,
                lock: Mutex::new(()),
                io,
                state: std::sync::Mutex::new(initial),
            }),
            rebuild_gate: Mutex::new(()),
            expiry: ExpiryTimer::new(),
        }
    }

    /// World name, also the archive-history prefix
    pub fn world_name(&self) -> &str {
        &self.shared.world_name
    }

    /// Live world directory
    pub fn world_path(&self) -> &Path {
        &self.world_path
    }

    /// Cache directory
    pub fn cache_dir(&self) -> &Path {
        &self.shared.cache_dir
    }

    /// Lifetime and history policy
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Current lifecycle state
    ///
    /// A cache removed behind our back reads as `Absent`.
    pub fn state(&self) -> CacheState {
        match self.shared.state() {
            CacheState::Present if !self.shared.cache_dir.is_dir() => CacheState::Absent,
            state => state,
        }
    }

    /// Whether the next non-forced access would rebuild
    pub fn is_stale(&self) -> bool {
        self.policy.is_stale(&self.shared.cache_dir)
    }

    /// Time since the cache was last rebuilt, `None` if absent
    pub fn age(&self) -> Option<Duration> {
        policy::modified(&self.shared.cache_dir)
            .map(|m| SystemTime::now().duration_since(m).unwrap_or_default())
    }

    /// Whether an expiry is waiting to fire
    pub fn expiry_armed(&self) -> bool {
        self.expiry.is_armed()
    }

    /// Return a ready-to-read cache directory, rebuilding it if needed
    ///
    /// Rebuilds when `force` is set or the cache is stale. Returns `None` if
    /// the rebuild fails, in which case no cache is left on disk.
    pub async fn get_cache(&self, force: bool) -> Option<PathBuf> {
        let _gate = self.rebuild_gate.lock().await;
        let cache = &self.shared.cache_dir;

        if !force && !self.policy.is_stale(cache) {
            debug!("Cache for {} still up to date", self.world_name());
            return Some(cache.clone());
        }

        self.expiry.cancel();

        match self.rebuild().await {
            Ok(()) => {
                self.schedule_expiry();
                Some(cache.clone())
            }
            Err(e) => {
                match e {
                    WorldsnapError::WorldMissing(ref path) => {
                        warn!("World path doesn't exist: {}", path.display())
                    }
                    ref e => error!("Error rebuilding cache for {}: {}", self.world_name(), e),
                }
                warn!("Cache for {} couldn't be rebuilt", self.world_name());
                None
            }
        }
    }

    /// Archive a fresh cache into `destination` and rotate old archives
    ///
    /// Returns `false` on any failure; errors are logged, never propagated.
    pub async fn persist(&self, destination: &Path, force: bool) -> bool {
        debug!(
            "Persisting cache for {} to {}",
            self.world_name(),
            destination.display()
        );

        match self.try_persist(destination, force).await {
            Ok(()) => true,
            Err(e) => {
                error!("Error while archiving {}: {}", self.world_name(), e);
                false
            }
        }
    }

    /// Delete the cache if its lifetime has already ended
    ///
    /// Expiry timers only live as long as the process that armed them, so a
    /// cache left by an earlier run is swept here instead. Returns whether a
    /// cache was deleted.
    pub async fn expire_if_stale(&self) -> bool {
        let _gate = self.rebuild_gate.lock().await;
        let cache = &self.shared.cache_dir;
        if !cache.is_dir() || !self.policy.is_stale(cache) {
            return false;
        }

        self.expiry.cancel();

        debug!("expire_if_stale() obtaining lock for {}", self.world_name());
        let _guard = self.shared.lock.lock().await;

        info!("Cache for {} outlived its lifetime, deleting", self.world_name());
        match self.shared.delete_locked().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to delete expired cache for {}: {}", self.world_name(), e);
                false
            }
        }
    }

    /// Delete the cache now and cancel its expiry
    pub async fn clear(&self) -> WorldsnapResult<()> {
        let _gate = self.rebuild_gate.lock().await;
        self.expiry.cancel();

        debug!("clear() obtaining lock for {}", self.world_name());
        let _guard = self.shared.lock.lock().await;

        let staging = staging_path(&self.shared.cache_dir);
        if staging.exists() {
            self.shared.io.delete_directory(&staging).await?;
        }
        self.shared.delete_locked().await?;
        info!("Cleared cache for {}", self.world_name());
        Ok(())
    }

    async fn try_persist(&self, destination: &Path, force: bool) -> WorldsnapResult<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let cache = self
                .get_cache(force)
                .await
                .ok_or_else(|| WorldsnapError::CacheUnavailable(self.world_name().to_string()))?;

            match self.archive(&cache, destination).await {
                Err(WorldsnapError::CacheVanished(path)) if attempt < ARCHIVE_ATTEMPTS => {
                    warn!(
                        "Cache {} expired before it could be archived, rebuilding",
                        path.display()
                    );
                }
                result => return result,
            }
        }
    }

    /// Compress the cache and rotate history under the cache lock
    async fn archive(&self, cache: &Path, destination: &Path) -> WorldsnapResult<()> {
        debug!("persist() obtaining lock for {}", self.world_name());
        let _guard = self.shared.lock.lock().await;
        debug!("persist() got lock, starting archive");

        if !cache.is_dir() {
            return Err(WorldsnapError::CacheVanished(cache.to_path_buf()));
        }

        self.shared.io.compress_directory(cache, destination).await?;
        debug!("persist() finished archive {}", destination.display());

        if self.policy.history > 0 {
            let dir = destination
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let removed = self
                .shared
                .io
                .delete_all_but_newest(dir, self.world_name(), self.policy.history)
                .await;
            if removed > 0 {
                debug!("Rotated {} old archive(s) for {}", removed, self.world_name());
            }
        }

        Ok(())
    }

    /// Copy the world into a fresh cache; the caller holds the rebuild gate
    ///
    /// On failure neither the staging copy nor the old cache is left behind.
    async fn rebuild(&self) -> WorldsnapResult<()> {
        let staging = staging_path(&self.shared.cache_dir);

        debug!("rebuild() obtaining lock for {}", self.world_name());
        let _guard = self.shared.lock.lock().await;
        debug!("rebuild() got lock");

        if !self.world_path.is_dir() {
            self.discard(&staging).await;
            return Err(WorldsnapError::WorldMissing(self.world_path.clone()));
        }

        info!(
            "Rebuilding cache for {}. This can take several minutes, depending on the world size.",
            self.world_name()
        );
        self.shared.set_state(CacheState::Rebuilding);

        match self.populate(&staging).await {
            Ok(()) => {
                self.shared.set_state(CacheState::Present);
                debug!("rebuild() unlocked for {}", self.world_name());
                Ok(())
            }
            Err(e) => {
                self.discard(&staging).await;
                Err(e)
            }
        }
    }

    /// Build the copy beside the cache and rename it into place
    async fn populate(&self, staging: &Path) -> WorldsnapResult<()> {
        let io = &self.shared.io;
        let cache = &self.shared.cache_dir;

        if staging.exists() {
            debug!("Removing leftover staging copy {}", staging.display());
            io.delete_directory(staging).await?;
        }

        io.copy_directory(&self.world_path, staging).await?;

        if cache.exists() {
            io.delete_directory(cache).await?;
        }

        tokio::fs::rename(staging, cache).await.map_err(|e| {
            WorldsnapError::io(format!("moving cache into place at {}", cache.display()), e)
        })?;

        // The staleness clock starts when the cache becomes visible.
        filetime::set_file_mtime(cache, FileTime::now())
            .map_err(|e| WorldsnapError::io(format!("stamping {}", cache.display()), e))
    }

    /// Remove staging and cache after a failed rebuild; lock held
    async fn discard(&self, staging: &Path) {
        for path in [staging, self.shared.cache_dir.as_path()] {
            if !path.exists() {
                continue;
            }
            if let Err(e) = self.shared.io.delete_directory(path).await {
                warn!("Failed to clean up {}: {}", path.display(), e);
            }
        }
        self.shared.settle();
    }

    fn schedule_expiry(&self) {
        let shared = Arc::clone(&self.shared);
        let lifetime = self.policy.lifetime();
        self.expiry
            .arm(lifetime, move |ticket| async move { shared.expire(ticket).await });
        debug!("Cache cleaner for {} scheduled in {:?}", self.world_name(), lifetime);
    }
}

/// Hidden sibling directory a rebuild copies into
fn staging_path(cache: &Path) -> PathBuf {
    let name = cache
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cache".to_string());
    cache.with_file_name(format!(".{name}.staging"))
}
