//! Per-document lifecycle tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use jsonloc_common::{DocumentId, LocationKey};

/// Lifecycle state of a document as seen by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "location", rename_all = "snake_case")]
pub enum DocumentState {
    /// Never saved through the engine.
    Unassigned,
    /// Persisted in the given location.
    Assigned(LocationKey),
    /// Logically trashed; the file stays in its prior location.
    Trashed(LocationKey),
    /// File removed.
    Deleted,
}

impl DocumentState {
    /// Location currently or previously holding the document.
    pub fn location(&self) -> Option<&LocationKey> {
        match self {
            DocumentState::Assigned(key) | DocumentState::Trashed(key) => Some(key),
            DocumentState::Unassigned | DocumentState::Deleted => None,
        }
    }
}

/// Content the host hands back when restoring a document from trash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    /// Serialized document.
    pub payload: Vec<u8>,
    /// Last-modified time to stamp on the restored file.
    pub modified: DateTime<Utc>,
}

impl DocumentSnapshot {
    /// Create a snapshot.
    pub fn new(payload: impl Into<Vec<u8>>, modified: DateTime<Utc>) -> Self {
        Self {
            payload: payload.into(),
            modified,
        }
    }
}

/// Tracked state of a single document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Current state.
    pub state: DocumentState,
    /// When the state last changed.
    pub updated_at: DateTime<Utc>,
    /// Number of stray copies removed over the document's lifetime.
    pub strays_removed: usize,
}

impl DocumentRecord {
    fn new(state: DocumentState) -> Self {
        Self {
            state,
            updated_at: Utc::now(),
            strays_removed: 0,
        }
    }
}

/// In-memory record of every document the engine has touched.
#[derive(Debug, Default)]
pub struct DocumentTracker {
    records: HashMap<DocumentId, DocumentRecord>,
}

impl DocumentTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a document; `Unassigned` when never seen.
    pub fn state(&self, id: &DocumentId) -> DocumentState {
        self.records
            .get(id)
            .map(|r| r.state.clone())
            .unwrap_or(DocumentState::Unassigned)
    }

    /// Full record of a document.
    pub fn get(&self, id: &DocumentId) -> Option<&DocumentRecord> {
        self.records.get(id)
    }

    /// Record a state transition.
    pub fn transition(&mut self, id: &DocumentId, state: DocumentState) {
        match self.records.get_mut(id) {
            Some(record) => {
                record.state = state;
                record.updated_at = Utc::now();
            }
            None => {
                self.records.insert(id.clone(), DocumentRecord::new(state));
            }
        }
    }

    /// Add to the stray counter of a tracked document.
    pub fn add_strays(&mut self, id: &DocumentId, count: usize) {
        if let Some(record) = self.records.get_mut(id) {
            record.strays_removed += count;
        }
    }

    /// Documents in a given state.
    pub fn in_state(&self, state: &DocumentState) -> Vec<&DocumentId> {
        self.records
            .iter()
            .filter(|(_, r)| &r.state == state)
            .map(|(id, _)| id)
            .collect()
    }

    /// Number of tracked documents.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
