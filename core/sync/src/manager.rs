//! Location manager tying discovery, registry, staging cache and engine
//! together for one configuration and one host.

use std::sync::Arc;
use tracing::{info, warn};

use jsonloc_common::Result;
use jsonloc_locations::{
    Discovery, DiscoveryHook, HostEnvironment, LocationRegistry, RegistrySnapshot, UserLocations,
};

use crate::config::ManagerConfig;
use crate::engine::SyncEngine;
use crate::staging::{RebuildReport, StagingCache};

/// Explicitly constructed owner of a registry, a staging cache and a sync
/// engine.
///
/// Hosts hold one manager per configuration and pass it to whatever handles
/// a request.
pub struct LocationManager {
    config: ManagerConfig,
    host: Arc<dyn HostEnvironment>,
    discovery: Discovery,
    registry: Arc<LocationRegistry>,
    cache: StagingCache,
    engine: SyncEngine,
}

impl LocationManager {
    /// Create a manager.
    ///
    /// No discovery happens until [`refresh`](Self::refresh) or
    /// [`begin_session`](Self::begin_session).
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: ManagerConfig, host: Arc<dyn HostEnvironment>) -> Result<Self> {
        config.validate()?;

        let mut discovery = Discovery::new(config.subdirectory_name.clone())
            .include_inactive(config.include_inactive_modules);
        if !config.user_locations.is_empty() {
            discovery = discovery.with_hook(Arc::new(UserLocations::new(
                config.user_locations.clone(),
            )));
        }

        let registry = Arc::new(LocationRegistry::new());
        let cache = StagingCache::new(
            host.scratch_base_dir().join(&config.staging_dir_name),
            config.document_extension.clone(),
        );
        let engine = SyncEngine::new(registry.clone(), config.document_extension.clone());

        Ok(Self {
            config,
            host,
            discovery,
            registry,
            cache,
            engine,
        })
    }

    /// Add a discovery hook, run after the configured user locations.
    pub fn with_hook(mut self, hook: Arc<dyn DiscoveryHook>) -> Self {
        self.discovery = self.discovery.with_hook(hook);
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Location registry.
    pub fn registry(&self) -> &Arc<LocationRegistry> {
        &self.registry
    }

    /// Staging cache.
    pub fn cache(&self) -> &StagingCache {
        &self.cache
    }

    /// Sync engine.
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Run discovery and replace the registry contents.
    ///
    /// Rebuilds the staging cache afterwards when `rebuildOnRefresh` is set.
    pub async fn refresh(&self) -> Result<Option<RebuildReport>> {
        self.discover();
        if self.config.rebuild_on_refresh {
            Ok(Some(self.rebuild().await?))
        } else {
            Ok(None)
        }
    }

    /// Rebuild the staging cache from the current registry.
    pub async fn rebuild(&self) -> Result<RebuildReport> {
        let report = self.cache.rebuild(&self.registry).await?;
        if !report.is_complete(self.config.max_copy_failure_ratio) {
            warn!(
                "Staging cache incomplete: {}/{} copies failed, {} locations skipped",
                report.failed, report.total, report.skipped_locations
            );
        }
        Ok(report)
    }

    /// Start a listing or editing session: discover and rebuild the cache.
    pub async fn begin_session(&self) -> Result<RebuildReport> {
        self.discover();
        self.rebuild().await
    }

    /// End a session: purge the staging cache.
    pub async fn end_session(&self) -> Result<()> {
        self.cache.purge().await
    }

    /// Run discovery and replace the registry contents, without touching
    /// the staging cache.
    pub fn discover(&self) -> Arc<RegistrySnapshot> {
        let locations = self.discovery.discover_host(self.host.as_ref());
        let snapshot = self.registry.replace(locations);
        info!(
            "Discovered {} locations (generation {})",
            snapshot.locations().len(),
            snapshot.generation()
        );
        snapshot
    }
}
