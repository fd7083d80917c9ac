//! Pointer assignment constraints
//!
//! Four constraint kinds following Andersen's inclusion formulation:
//! - ADDRESS-OF: `p = &o`       → o ∈ pts(p)
//! - ELEMENT:    `p = &q[i..]`  → pts(p) ⊇ elements(pts(q), i..); the plain
//!   copy `p = q` is the degenerate index sequence `[Constant(0)]`
//! - LOAD:       `p = *q`       → ∀o ∈ pts(q): pts(p) ⊇ pts(o)
//! - STORE:      `*p = q`       → ∀o ∈ pts(p): pts(o) ⊇ pts(q)
//!
//! Constraints attach to the left-hand pointer and are stored per kind in
//! hash sets, so re-extraction collapses duplicates structurally.

use super::value_tree::NodeId;
use serde::{Deserialize, Serialize};

/// One step of an element-walk index sequence
///
/// An explicit sum instead of a sentinel index: a statically known field
/// index descends into a single child, a dynamic index fans out into all of
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerIndex {
    /// Statically known element or field index
    Constant(u64),
    /// Index unknown until runtime
    Dynamic,
}

impl PointerIndex {
    /// The constant value of this index
    ///
    /// Panics if the index is dynamic.
    #[inline]
    pub fn constant_index(&self) -> u64 {
        match self {
            PointerIndex::Constant(k) => *k,
            PointerIndex::Dynamic => panic!("constant_index() on a dynamic index"),
        }
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        matches!(self, PointerIndex::Constant(_))
    }
}

/// An element-address constraint edge: `pts(lhs) ⊇ elements(pts(base), indices)`
///
/// Equality and hashing cover the base pointer and the full index sequence,
/// which is what deduplicates re-extracted constraints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementPtrEdge {
    /// The pointer whose pointees are walked
    pub base: NodeId,
    /// Index sequence driving the walk
    pub indices: Vec<PointerIndex>,
}

impl ElementPtrEdge {
    pub fn new(base: NodeId, indices: Vec<PointerIndex>) -> Self {
        debug_assert!(!indices.is_empty(), "element edge needs at least one index");
        Self { base, indices }
    }

    /// The plain-copy edge `pts(lhs) ⊇ pts(base)`
    #[inline]
    pub fn copy(base: NodeId) -> Self {
        Self::new(base, vec![PointerIndex::Constant(0)])
    }

    /// Whether this edge is the plain-copy encoding
    #[inline]
    pub fn is_plain_copy(&self) -> bool {
        self.indices == [PointerIndex::Constant(0)]
    }
}
