use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Hybrid Logical Clock timestamp stamped on ledger records.
///
/// Wall-clock milliseconds alone cannot order two versions saved within the
/// same millisecond, so a logical counter breaks ties and the writer's node id
/// makes the order total.
///
/// Ordering: `physical_ms` → `logical` → `node_id`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalAnchor {
    /// Wall-clock milliseconds since UNIX epoch.
    pub physical_ms: u64,
    /// Logical counter for records at the same physical time.
    pub logical: u32,
    /// Writer identifier to break ties.
    pub node_id: u16,
}

impl TemporalAnchor {
    pub fn new(physical_ms: u64, logical: u32, node_id: u16) -> Self {
        Self {
            physical_ms,
            logical,
            node_id,
        }
    }

    /// Anchor for the current wall-clock time.
    pub fn now(node_id: u16) -> Self {
        Self {
            physical_ms: wall_clock_ms(),
            logical: 0,
            node_id,
        }
    }

    pub const fn zero() -> Self {
        Self {
            physical_ms: 0,
            logical: 0,
            node_id: 0,
        }
    }

    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    /// Next anchor for a stream whose latest record carries `previous`.
    ///
    /// The result is strictly after `previous` even if the wall clock has not
    /// moved (or moved backwards).
    pub fn following(previous: Option<&Self>, node_id: u16) -> Self {
        let now = Self::now(node_id);
        match previous {
            None => now,
            Some(prev) if now.physical_ms > prev.physical_ms => now,
            Some(prev) => Self::new(prev.physical_ms, prev.logical.saturating_add(1), node_id),
        }
    }
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl PartialOrd for TemporalAnchor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TemporalAnchor {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.physical_ms
            .cmp(&other.physical_ms)
            .then(self.logical.cmp(&other.logical))
            .then(self.node_id.cmp(&other.node_id))
    }
}

impl fmt::Debug for TemporalAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TemporalAnchor({}ms.{}.n{})",
            self.physical_ms, self.logical, self.node_id
        )
    }
}

impl fmt::Display for TemporalAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.n{}", self.physical_ms, self.logical, self.node_id)
    }
}
