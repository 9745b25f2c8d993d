use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Hybrid Logical Clock timestamp stamped on every commit.
///
/// Ordering: `physical_ms` → `logical` → `node_id` (total order).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalAnchor {
    /// Wall-clock milliseconds since UNIX epoch.
    pub physical_ms: u64,
    /// Logical counter for events at the same physical time.
    pub logical: u32,
    /// Peer identifier to break ties between writers.
    pub node_id: u16,
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl TemporalAnchor {
    pub fn new(physical_ms: u64, logical: u32, node_id: u16) -> Self {
        Self {
            physical_ms,
            logical,
            node_id,
        }
    }

    pub fn now(node_id: u16) -> Self {
        Self::new(wall_clock_ms(), 0, node_id)
    }

    /// The zero anchor, earlier than every real commit.
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

    /// The next anchor at the same physical time, without reading the wall
    /// clock. Deterministic, so two peers ticking the same anchor agree.
    pub fn tick(&self, node_id: u16) -> Self {
        Self::new(self.physical_ms, self.logical + 1, node_id)
    }

    /// A fresh local anchor strictly after every anchor in `seen`.
    pub fn after_all<'a>(seen: impl IntoIterator<Item = &'a Self>, node_id: u16) -> Self {
        let now = Self::now(node_id);
        match seen.into_iter().max() {
            Some(latest) if latest.physical_ms >= now.physical_ms => latest.tick(node_id),
            _ => now,
        }
    }

    /// Physical time in nanoseconds, the unit inode timestamps use.
    pub fn as_nanos(&self) -> u64 {
        self.physical_ms.saturating_mul(1_000_000)
    }
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
