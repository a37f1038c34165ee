//! Location registry.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

use jsonloc_common::{Error, LocationKey, Result};

use crate::discovery::unique_key;
use crate::location::Location;

/// One complete discovery pass, as seen by readers.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    generation: u64,
    locations: Vec<Location>,
}

impl RegistrySnapshot {
    /// Generation of the pass this snapshot came from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Locations in discovery order.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// Look up a location by key.
    pub fn get(&self, key: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.key.as_str() == key)
    }
}

/// Authoritative set of locations, addressed by key.
///
/// Readers get immutable snapshots; [`replace`](Self::replace) swaps the whole
/// set at once, so a reader never observes two passes mixed together.
///
/// Within one registry a key is never rebound to a different path.
#[derive(Debug, Default)]
pub struct LocationRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
    bindings: Mutex<HashMap<LocationKey, PathBuf>>,
}

impl LocationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Locations in insertion order of the last pass.
    pub fn list(&self) -> Vec<Location> {
        self.snapshot().locations.clone()
    }

    /// Resolve a key.
    ///
    /// # Errors
    /// - `LocationNotFound` if the key is not in the current set
    pub fn get(&self, key: &str) -> Result<Location> {
        self.snapshot()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::LocationNotFound(key.to_string()))
    }

    /// Check if a key is in the current set.
    pub fn contains(&self, key: &str) -> bool {
        self.snapshot().get(key).is_some()
    }

    /// Number of locations in the current set.
    pub fn len(&self) -> usize {
        self.snapshot().locations.len()
    }

    /// Check if the current set is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshot().locations.is_empty()
    }

    /// Generation of the current set; bumped by every replace.
    pub fn generation(&self) -> u64 {
        self.snapshot().generation
    }

    /// Replace the whole set with a new discovery pass.
    ///
    /// # Postconditions
    /// - Stale keys are dropped, new ones added
    /// - An entry whose key was earlier bound to another path is renamed
    ///   with a numeric suffix
    /// - Keys are unique within the new set
    pub fn replace(&self, locations: Vec<Location>) -> Arc<RegistrySnapshot> {
        let mut bindings = self
            .bindings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut used: HashSet<LocationKey> = HashSet::new();
        let mut accepted = Vec::with_capacity(locations.len());

        for mut location in locations {
            let path = location.path.clone();
            let taken = |k: &LocationKey| {
                used.contains(k) || bindings.get(k).is_some_and(|bound| *bound != path)
            };
            let key = unique_key(&location.key, taken);
            if key != location.key {
                warn!(
                    "Location key {} already bound elsewhere, using {} for {}",
                    location.key,
                    key,
                    path.display()
                );
                location.key = key;
            }

            bindings.insert(location.key.clone(), path);
            used.insert(location.key.clone());
            accepted.push(location);
        }

        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot = Arc::new(RegistrySnapshot {
            generation: current.generation + 1,
            locations: accepted,
        });
        *current = snapshot.clone();

        info!(
            "Location registry generation {}: {} locations",
            snapshot.generation,
            snapshot.locations.len()
        );
        for location in &snapshot.locations {
            debug!("  {} [{}] {}", location.key, location.kind, location.path.display());
        }

        snapshot
    }
}
