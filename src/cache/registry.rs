//! Controllers for every configured world
//!
//! Each world gets exactly one [`CacheController`], so its lock is shared by
//! every caller backing that world up.

use crate::archive::world_prefix;
use crate::cache::controller::{CacheController, CacheSettings};
use crate::config::Config;
use crate::io::IoTransform;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// World name to cache controller
#[derive(Default)]
pub struct CacheRegistry {
    controllers: HashMap<String, Arc<CacheController>>,
}

impl CacheRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// One controller per world listed in the backup config
    pub fn from_config(config: &Config, io: Arc<dyn IoTransform>) -> Self {
        let mut registry = Self::new();
        for world in &config.backup.worlds {
            registry.register(config.cache_settings(world), Arc::clone(&io));
        }
        registry
    }

    /// Add a controller for `settings`, replacing any with the same world name
    pub fn register(&mut self, settings: CacheSettings, io: Arc<dyn IoTransform>) -> Arc<CacheController> {
        let name = settings.world_name.clone();
        debug!("Registering cache for {} at {}", name, settings.cache_dir.display());
        let controller = Arc::new(CacheController::new(settings, io));
        self.controllers.insert(name, Arc::clone(&controller));
        controller
    }

    /// Controller for a world, by name or path
    pub fn get(&self, world: &str) -> Option<Arc<CacheController>> {
        self.controllers.get(world_prefix(world)).cloned()
    }

    /// Registered world names, sorted
    pub fn worlds(&self) -> Vec<String> {
        let mut names: Vec<String> = self.controllers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Delete every cache whose lifetime ended, returning how many went
    pub async fn sweep_expired(&self) -> usize {
        let mut swept = 0;
        for world in self.worlds() {
            if let Some(controller) = self.get(&world) {
                if controller.expire_if_stale().await {
                    swept += 1;
                }
            }
        }
        if swept > 0 {
            info!("Swept {} expired cache(s)", swept);
        }
        swept
    }

    /// Archive `world` into `destination`
    ///
    /// Returns `false` for an unregistered world or any persist failure.
    pub async fn persist(&self, world: &str, destination: &Path, force: bool) -> bool {
        match self.get(world) {
            Some(controller) => controller.persist(destination, force).await,
            None => {
                warn!("No cache configured for world {}", world);
                false
            }
        }
    }
}
