//! The [`ReferenceStore`] trait defining the tracking record storage interface.
//!
//! Any backend (in-memory, document store, database) implements this trait to
//! hold the tracking records of every referrer.

use treeline_types::NodeId;

use crate::error::{RefError, Result};
use crate::types::{Referrer, StoredReference, TrackingUpdate, TreeNodeReferenceTracking};

/// Storage backend for tracking records, keyed by referrer.
///
/// Each referrer holds at most one tracking record. Implementations must be
/// thread-safe (`Send + Sync`).
pub trait ReferenceStore: Send + Sync {
    /// Read the record held by `referrer`.
    ///
    /// Returns `Ok(None)` if the referrer holds no reference.
    fn read(&self, referrer: &Referrer) -> Result<Option<TreeNodeReferenceTracking>>;

    /// Create or replace the record held by `referrer`.
    fn write(&self, referrer: &Referrer, tracking: &TreeNodeReferenceTracking) -> Result<()>;

    /// Remove the record held by `referrer`.
    ///
    /// Returns `Ok(true)` if a record existed.
    fn remove(&self, referrer: &Referrer) -> Result<bool>;

    /// All references whose target is `target`, ordered by referrer.
    fn list_references_to(&self, target: &NodeId) -> Result<Vec<StoredReference>>;

    /// All references held by `owner` or by processes inside it, ordered by
    /// referrer.
    fn list_references_from(&self, owner: &NodeId) -> Result<Vec<StoredReference>>;

    /// Apply a resolver update to the stored record and return the result.
    ///
    /// A record whose mode no longer accepts the update (e.g. it was switched
    /// to `FIXED` since the update was computed) is returned unchanged.
    ///
    /// The default reads and writes separately; stores that can be written
    /// concurrently should override it with a single locked step.
    fn apply_update(
        &self,
        referrer: &Referrer,
        update: TrackingUpdate,
    ) -> Result<TreeNodeReferenceTracking> {
        let mut tracking = self
            .read(referrer)?
            .ok_or_else(|| RefError::missing_reference(referrer))?;
        if !tracking.accepts(update) {
            return Ok(tracking);
        }
        tracking.apply(update);
        self.write(referrer, &tracking)?;
        Ok(tracking)
    }
}
