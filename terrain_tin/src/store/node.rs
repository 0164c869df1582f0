//! Per-point topology records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a point (and its node) in a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId(pub usize);

impl PointId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Packed node state bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFlags(u8);

impl NodeFlags {
    pub const NONE: NodeFlags = NodeFlags(0);
    /// The point lies strictly inside a void.
    pub const VOID: NodeFlags = NodeFlags(0x01);
    /// Marked for removal by the running clip.
    pub const PENDING_DELETE: NodeFlags = NodeFlags(0x02);
    /// Removed; dropped by the next compaction.
    pub const DELETED: NodeFlags = NodeFlags(0x04);

    pub fn contains(self, other: NodeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: NodeFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: NodeFlags) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: NodeFlags, on: bool) {
        if on {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

/// Topology of one point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Head of the anticlockwise neighbour list.
    pub adjacency: Option<usize>,
    /// Next point along the hull, when this point is on it.
    pub hull_next: Option<PointId>,
    /// Transient traversal slot; empty between public operations.
    pub scratch_a: Option<PointId>,
    /// Second transient traversal slot.
    pub scratch_b: Option<PointId>,
    /// Head of the feature membership list.
    pub features: Option<usize>,
    pub flags: NodeFlags,
}

/// One neighbour in an adjacency list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjacencyEntry {
    pub point: PointId,
    pub next: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_toggle_independently() {
        let mut f = NodeFlags::default();
        f.insert(NodeFlags::VOID);
        f.insert(NodeFlags::PENDING_DELETE);
        f.remove(NodeFlags::VOID);
        assert!(!f.contains(NodeFlags::VOID));
        assert!(f.contains(NodeFlags::PENDING_DELETE));
        f.set(NodeFlags::DELETED, true);
        assert!(f.contains(NodeFlags::DELETED));
    }
}
