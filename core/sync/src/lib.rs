//! jsonloc sync engine
//!
//! This module keeps documents consistent across the registered locations:
//! - Staging cache mirroring every location into one scratch directory
//! - Save / delete / trash / untrash with at-most-one-copy enforcement
//! - Per-document lifecycle tracking
//! - A manager owning one registry, cache and engine per configuration

pub mod config;
pub mod engine;
mod fsutil;
pub mod manager;
pub mod staging;
pub mod state;

// Re-export main types
pub use config::ManagerConfig;
pub use engine::SyncEngine;
pub use manager::LocationManager;
pub use staging::{RebuildReport, StagingCache};
pub use state::{DocumentRecord, DocumentSnapshot, DocumentState, DocumentTracker};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        let _config = ManagerConfig::default();
        let _tracker = DocumentTracker::new();
        let _report = RebuildReport::default();
    }
}
