//! Static child state snapshots.
//!
//! A snapshot is a JSON object mapping child ids to either a bare state
//! literal or a `{"state": ..., "attributes": {...}}` object:
//!
//! ```text
//! {
//!     "sensor.disk": {"state": "bad", "attributes": {"status": "disk full"}},
//!     "sensor.fan": "good"
//! }
//! ```

use crate::error::{HealthMergeError, Result};
use crate::health::{RawState, StateStore};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotEntry {
    Literal(String),
    Full(RawState),
}

/// Immutable state store backed by a parsed snapshot.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    states: HashMap<String, RawState>,
}

impl SnapshotStore {
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: HashMap<String, SnapshotEntry> = serde_json::from_str(json)?;
        let states = entries
            .into_iter()
            .map(|(id, entry)| {
                let raw = match entry {
                    SnapshotEntry::Literal(state) => RawState::new(state),
                    SnapshotEntry::Full(raw) => raw,
                };
                (id, raw)
            })
            .collect();
        Ok(Self { states })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| {
            HealthMergeError::InvalidSnapshot(format!("{}: {}", path.display(), e))
        })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl StateStore for SnapshotStore {
    fn get(&self, id: &str) -> Option<RawState> {
        self.states.get(id).cloned()
    }
}
