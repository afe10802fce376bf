//! Interface pinning.
//!
//! A pin binds a process's externally visible interface to one exact release
//! of one graph model. Pins change only through explicit [`PinningStore::pin`]
//! and [`PinningStore::unpin`] calls; reconciliation never advances them.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::info;
use treeline_types::{NodeId, ProcessId, ReleaseNr};

use crate::error::{RefError, Result};

/// Binding of a process interface to a specific graph model release.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseProcessPinning {
    pub process_id: ProcessId,
    pub graph_model_id: NodeId,
    pub release_nr: ReleaseNr,
}

impl ReleaseProcessPinning {
    pub fn new(process_id: ProcessId, graph_model_id: NodeId, release_nr: ReleaseNr) -> Self {
        Self {
            process_id,
            graph_model_id,
            release_nr,
        }
    }
}

/// Storage for process pins, one per process.
pub trait PinningStore: Send + Sync {
    /// Upsert the pin for `process_id`, returning the pin it replaced.
    fn pin(
        &self,
        process_id: &ProcessId,
        graph_model_id: &NodeId,
        release_nr: ReleaseNr,
    ) -> Result<Option<ReleaseProcessPinning>>;

    fn resolve_pin(&self, process_id: &ProcessId) -> Result<Option<ReleaseProcessPinning>>;

    /// Returns `Ok(true)` if a pin was removed.
    fn unpin(&self, process_id: &ProcessId) -> Result<bool>;

    /// All pins, ordered by process id.
    fn pins(&self) -> Result<Vec<ReleaseProcessPinning>>;
}

/// In-memory [`PinningStore`]. Concurrent pins to the same process are
/// last-writer-wins.
#[derive(Debug, Default)]
pub struct InMemoryPinningStore {
    pins: RwLock<HashMap<ProcessId, ReleaseProcessPinning>>,
}

impl InMemoryPinningStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PinningStore for InMemoryPinningStore {
    fn pin(
        &self,
        process_id: &ProcessId,
        graph_model_id: &NodeId,
        release_nr: ReleaseNr,
    ) -> Result<Option<ReleaseProcessPinning>> {
        let mut pins = self
            .pins
            .write()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))?;
        let pin = ReleaseProcessPinning::new(process_id.clone(), graph_model_id.clone(), release_nr);
        info!(process = %process_id, model = %graph_model_id, release = %release_nr, "process interface pinned");
        Ok(pins.insert(process_id.clone(), pin))
    }

    fn resolve_pin(&self, process_id: &ProcessId) -> Result<Option<ReleaseProcessPinning>> {
        let pins = self
            .pins
            .read()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))?;
        Ok(pins.get(process_id).cloned())
    }

    fn unpin(&self, process_id: &ProcessId) -> Result<bool> {
        let mut pins = self
            .pins
            .write()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))?;
        let removed = pins.remove(process_id).is_some();
        if removed {
            info!(process = %process_id, "process interface unpinned");
        }
        Ok(removed)
    }

    fn pins(&self) -> Result<Vec<ReleaseProcessPinning>> {
        let pins = self
            .pins
            .read()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))?;
        let mut all: Vec<_> = pins.values().cloned().collect();
        all.sort_by(|a, b| a.process_id.cmp(&b.process_id));
        Ok(all)
    }
}
