//! In-memory reference store for testing and embedding.
//!
//! [`InMemoryReferenceStore`] keeps all tracking records in a `BTreeMap`
//! behind a `RwLock`, so listings come back ordered by referrer.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;
use treeline_types::NodeId;

use crate::error::{RefError, Result};
use crate::traits::ReferenceStore;
use crate::types::{Referrer, StoredReference, TrackingUpdate, TreeNodeReferenceTracking};

/// An in-memory implementation of [`ReferenceStore`].
#[derive(Debug, Default)]
pub struct InMemoryReferenceStore {
    records: RwLock<BTreeMap<Referrer, TreeNodeReferenceTracking>>,
}

impl InMemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from previously exported records.
    pub fn from_references(references: impl IntoIterator<Item = StoredReference>) -> Self {
        let records = references
            .into_iter()
            .map(|r| (r.referrer, r.tracking))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Every stored record, ordered by referrer.
    pub fn snapshot(&self) -> Result<Vec<StoredReference>> {
        self.collect(|_| true)
    }

    /// Export every record as a JSON array.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.snapshot()?)
            .map_err(|e| RefError::Serialization(e.to_string()))
    }

    /// Load a store from a JSON array produced by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self> {
        let references: Vec<StoredReference> =
            serde_json::from_str(json).map_err(|e| RefError::Serialization(e.to_string()))?;
        Ok(Self::from_references(references))
    }

    fn collect(&self, keep: impl Fn(&StoredReference) -> bool) -> Result<Vec<StoredReference>> {
        let records = self
            .records
            .read()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))?;
        Ok(records
            .iter()
            .map(|(referrer, tracking)| StoredReference {
                referrer: referrer.clone(),
                tracking: tracking.clone(),
            })
            .filter(|r| keep(r))
            .collect())
    }
}

impl ReferenceStore for InMemoryReferenceStore {
    fn read(&self, referrer: &Referrer) -> Result<Option<TreeNodeReferenceTracking>> {
        let records = self
            .records
            .read()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))?;
        Ok(records.get(referrer).cloned())
    }

    fn write(&self, referrer: &Referrer, tracking: &TreeNodeReferenceTracking) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))?;
        debug!(referrer = %referrer, target = %tracking.node_id, tracking = %tracking.tracking, "tracking record written");
        records.insert(referrer.clone(), tracking.clone());
        Ok(())
    }

    fn remove(&self, referrer: &Referrer) -> Result<bool> {
        let mut records = self
            .records
            .write()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))?;
        Ok(records.remove(referrer).is_some())
    }

    fn list_references_to(&self, target: &NodeId) -> Result<Vec<StoredReference>> {
        self.collect(|r| &r.tracking.node_id == target)
    }

    fn list_references_from(&self, owner: &NodeId) -> Result<Vec<StoredReference>> {
        self.collect(|r| r.referrer.owner() == owner)
    }

    fn apply_update(
        &self,
        referrer: &Referrer,
        update: TrackingUpdate,
    ) -> Result<TreeNodeReferenceTracking> {
        let mut records = self
            .records
            .write()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))?;
        let tracking = records
            .get_mut(referrer)
            .ok_or_else(|| RefError::missing_reference(referrer))?;
        if tracking.accepts(update) {
            tracking.apply(update);
            debug!(referrer = %referrer, %update, "tracking record updated");
        } else {
            debug!(referrer = %referrer, %update, tracking = %tracking.tracking, "update no longer applies");
        }
        Ok(tracking.clone())
    }
}
