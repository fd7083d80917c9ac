//! Pointer records and pointee sets
//!
//! Every value-tree node is a pointee (its identity is its [`NodeId`]);
//! pointer-typed nodes additionally carry a [`Pointer`] record: the four
//! outgoing constraint sets plus the pointee set the solver grows. The
//! record split realizes the pointee/pointer hierarchy as an optional
//! payload, so the downcast is a tag check on the node.

use super::assignment::ElementPtrEdge;
use super::value_tree::NodeId;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Set of pointee records, ordered by node id
///
/// A sorted vector keeps iteration deterministic and membership queries at
/// `O(log n)`; points-to sets are small in the common case and only ever
/// grow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointeeSet {
    elements: Vec<NodeId>,
}

impl PointeeSet {
    /// Create an empty set
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pointees in the set
    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if the set is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Membership test
    #[inline]
    pub fn contains(&self, pointee: NodeId) -> bool {
        self.elements.binary_search(&pointee).is_ok()
    }

    /// Insert a pointee; returns true if the set grew
    pub fn insert(&mut self, pointee: NodeId) -> bool {
        match self.elements.binary_search(&pointee) {
            Ok(_) => false,
            Err(pos) => {
                self.elements.insert(pos, pointee);
                true
            }
        }
    }

    /// Merge all pointees of `source` into this set; returns true if it grew
    pub fn merge_from(&mut self, source: &PointeeSet) -> bool {
        let before = self.elements.len();
        if self.elements.is_empty() {
            self.elements.extend_from_slice(&source.elements);
            return !self.elements.is_empty();
        }
        for &pointee in &source.elements {
            self.insert(pointee);
        }
        self.elements.len() > before
    }

    /// Subset test
    pub fn is_subset_of(&self, other: &PointeeSet) -> bool {
        self.elements.iter().all(|&p| other.contains(p))
    }

    /// Iterate over pointees in ascending node-id order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.elements.iter().copied()
    }
}

impl FromIterator<NodeId> for PointeeSet {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        let mut set = PointeeSet::new();
        for pointee in iter {
            set.insert(pointee);
        }
        set
    }
}

/// The pointer payload of a pointer-typed value-tree node
///
/// Holds the four outgoing constraint sets keyed by kind (address-of,
/// element/copy, load, store) and the pointee set the solver computes.
#[derive(Debug, Clone, Default)]
pub struct Pointer {
    /// ADDRESS-OF edges: pointees whose address this pointer takes
    assigned_address_of: FxHashSet<NodeId>,

    /// ELEMENT edges: `pts(self) ⊇ elements(pts(base), indices)`
    assigned_element_ptr: FxHashSet<ElementPtrEdge>,

    /// LOAD edges: `pts(self) ⊇ pts(o)` for each pointer `o ∈ pts(base)`
    assigned_pointee: FxHashSet<NodeId>,

    /// STORE edges: `pts(o) ⊇ pts(base)` for each pointer `o ∈ pts(self)`
    pointee_assigned: FxHashSet<NodeId>,

    /// The solver's output for this pointer
    pointee_set: PointeeSet,
}

impl Pointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `self = &pointee`; returns true if the edge is new
    pub fn assigned_address_of(&mut self, pointee: NodeId) -> bool {
        self.assigned_address_of.insert(pointee)
    }

    /// Record `self = &base[indices..]`; returns true if the edge is new
    pub fn assigned_element_ptr(&mut self, edge: ElementPtrEdge) -> bool {
        self.assigned_element_ptr.insert(edge)
    }

    /// Record the plain copy `self = base`; returns true if the edge is new
    pub fn assigned_pointer(&mut self, base: NodeId) -> bool {
        self.assigned_element_ptr(ElementPtrEdge::copy(base))
    }

    /// Record the load `self = *base`; returns true if the edge is new
    pub fn assigned_pointee(&mut self, base: NodeId) -> bool {
        self.assigned_pointee.insert(base)
    }

    /// Record the store `*self = base`; returns true if the edge is new
    pub fn pointee_assigned(&mut self, base: NodeId) -> bool {
        self.pointee_assigned.insert(base)
    }

    /// ADDRESS-OF edges
    #[inline]
    pub fn address_of_edges(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.assigned_address_of.iter().copied()
    }

    /// ELEMENT edges
    #[inline]
    pub fn element_ptr_edges(&self) -> impl Iterator<Item = &ElementPtrEdge> {
        self.assigned_element_ptr.iter()
    }

    /// LOAD edges
    #[inline]
    pub fn load_edges(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.assigned_pointee.iter().copied()
    }

    /// STORE edges
    #[inline]
    pub fn store_edges(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.pointee_assigned.iter().copied()
    }

    /// Total number of constraint edges on this pointer
    pub fn edge_count(&self) -> usize {
        self.assigned_address_of.len()
            + self.assigned_element_ptr.len()
            + self.assigned_pointee.len()
            + self.pointee_assigned.len()
    }

    /// The computed pointee set
    #[inline]
    pub fn pointee_set(&self) -> &PointeeSet {
        &self.pointee_set
    }

    /// Mutable access to the pointee set (solver only)
    #[inline]
    pub fn pointee_set_mut(&mut self) -> &mut PointeeSet {
        &mut self.pointee_set
    }
}
