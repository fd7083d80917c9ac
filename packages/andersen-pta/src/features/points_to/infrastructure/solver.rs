//! Points-to fixpoint solver
//!
//! Seeds the trivial address-of constraints (global storage, exported
//! pointer arguments, stack allocations), initializes every pointee set from
//! its address-of edges, then relaxes the remaining three constraint kinds in
//! full passes until no set grows. Sets are bounded by the node count and
//! only ever grow, so the fixpoint is reached in finitely many passes and is
//! independent of iteration order.

use crate::features::points_to::domain::{ElementPtrEdge, NodeId, PointeeSet, ValueTree};
use crate::shared::models::{InstructionKind, Module, ValueId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Solver configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Upper bound on relaxation passes; 0 means run to the fixpoint
    pub max_passes: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { max_passes: 0 }
    }
}

/// Counters for one solver run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SolverStats {
    /// Pointer records in the tree
    pub pointers: usize,
    /// Pointee sets seeded non-empty by address-of edges
    pub seeded: usize,
    /// Full relaxation passes, the final (unchanged) one included
    pub passes: usize,
    /// Set-growing merge or insert events
    pub propagations: usize,
}

/// Worklist-free relaxation engine over a constrained value tree
pub struct PointsToSolver<'m> {
    module: &'m Module,
    tree: ValueTree,
    config: SolverConfig,
    stats: SolverStats,
}

impl<'m> PointsToSolver<'m> {
    /// Create a solver over an already-extracted value tree
    pub fn new(module: &'m Module, tree: ValueTree) -> Self {
        Self::with_config(module, tree, SolverConfig::default())
    }

    pub fn with_config(module: &'m Module, tree: ValueTree, config: SolverConfig) -> Self {
        Self {
            module,
            tree,
            config,
            stats: SolverStats::default(),
        }
    }

    /// Run the analysis to its fixpoint
    pub fn solve(&mut self) {
        self.add_trivial_assignments();
        self.initialize_pointee_sets();

        let pointers: Vec<NodeId> = self.tree.pointer_nodes().collect();
        self.stats.pointers = pointers.len();

        loop {
            self.stats.passes += 1;
            let changed = self.relax_pass(&pointers);
            debug!(
                pass = self.stats.passes,
                changed, "points-to relaxation pass"
            );
            if !changed {
                break;
            }
            if self.config.max_passes > 0 && self.stats.passes >= self.config.max_passes {
                warn!(
                    max_passes = self.config.max_passes,
                    "points-to solver stopped before the fixpoint"
                );
                break;
            }
        }
    }

    /// The computed pointee set of a pointer-typed value
    pub fn points_to(&self, value: ValueId) -> Option<&PointeeSet> {
        let id = self.tree.get_node(value)?;
        let node = self.tree.node(id);
        if node.is_pointer() {
            Some(node.pointee_set())
        } else {
            None
        }
    }

    /// Borrow the value tree
    #[inline]
    pub fn value_tree(&self) -> &ValueTree {
        &self.tree
    }

    /// Surrender ownership of the value tree
    #[inline]
    pub fn take_value_tree(self) -> ValueTree {
        self.tree
    }

    /// Counters of the last `solve()` run
    #[inline]
    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    /// Attach the address-of edges every module has by construction:
    /// a global symbol holds the address of its storage, an exported pointer
    /// argument holds the address of an externally supplied object, and an
    /// `alloca` result holds the address of its stack slot.
    fn add_trivial_assignments(&mut self) {
        for global in self.module.globals() {
            let root = self
                .tree
                .get_node(global.id)
                .unwrap_or_else(|| panic!("global {:?} has no node", global.id));
            let memory = self.tree.get_global_memory(global.id);
            assert!(self.tree.node(root).is_pointer());
            self.tree.node_mut(root).pointer_mut().assigned_address_of(memory);
        }

        for func in self.module.functions() {
            if func.is_exported() {
                for arg in &func.args {
                    let Some(memory) = self.tree.get_argument_memory(arg.id) else {
                        continue;
                    };
                    let root = self
                        .tree
                        .get_node(arg.id)
                        .unwrap_or_else(|| panic!("argument {:?} has no node", arg.id));
                    assert!(self.tree.node(root).is_pointer());
                    self.tree.node_mut(root).pointer_mut().assigned_address_of(memory);
                }
            }

            for inst in func.instructions() {
                if !matches!(inst.kind, InstructionKind::Alloca { .. }) {
                    continue;
                }
                let root = self
                    .tree
                    .get_node(inst.id)
                    .unwrap_or_else(|| panic!("alloca {:?} has no node", inst.id));
                let memory = self.tree.get_alloca_memory(inst.id);
                assert!(self.tree.node(root).is_pointer());
                self.tree.node_mut(root).pointer_mut().assigned_address_of(memory);
            }
        }
    }

    /// Move every address-of edge into its pointee set; address-of edges play
    /// no further role afterwards.
    fn initialize_pointee_sets(&mut self) {
        let pointers: Vec<NodeId> = self.tree.pointer_nodes().collect();
        for id in pointers {
            let targets: Vec<NodeId> = self.tree.node(id).pointer().address_of_edges().collect();
            if targets.is_empty() {
                continue;
            }
            self.stats.seeded += 1;
            for target in targets {
                self.tree.insert_pointee(id, target);
            }
        }
    }

    /// One full relaxation pass; returns whether any set grew
    fn relax_pass(&mut self, pointers: &[NodeId]) -> bool {
        let mut changed = false;
        for &id in pointers {
            changed |= self.relax_load_edges(id);
            changed |= self.relax_element_edges(id);
            changed |= self.relax_store_edges(id);
        }
        changed
    }

    /// `pts(p) ⊇ pts(o)` for every pointer `o ∈ pts(q)` of every load edge
    /// `p = *q`; pointees that are not pointers are ignored.
    fn relax_load_edges(&mut self, id: NodeId) -> bool {
        let mut changed = false;
        let bases: Vec<NodeId> = self.tree.node(id).pointer().load_edges().collect();
        for base in bases {
            let pointees: Vec<NodeId> = self.tree.node(base).pointee_set().iter().collect();
            for o in pointees {
                if self.tree.node(o).is_pointer() && self.tree.merge_pointee_sets(id, o) {
                    self.stats.propagations += 1;
                    changed = true;
                }
            }
        }
        changed
    }

    /// `pts(p) ⊇ elements(pts(q), indices)` for every element edge; the
    /// walked nodes are the element addresses and enter the set themselves.
    fn relax_element_edges(&mut self, id: NodeId) -> bool {
        let mut changed = false;
        let edges: Vec<ElementPtrEdge> = self
            .tree
            .node(id)
            .pointer()
            .element_ptr_edges()
            .cloned()
            .collect();
        for edge in edges {
            let pointees: Vec<NodeId> = self.tree.node(edge.base).pointee_set().iter().collect();
            for o in pointees {
                for element in self.tree.walk_elements(o, &edge.indices) {
                    if self.tree.insert_pointee(id, element) {
                        self.stats.propagations += 1;
                        changed = true;
                    }
                }
            }
        }
        changed
    }

    /// `pts(o) ⊇ pts(q)` for every pointer `o ∈ pts(p)` of every store edge
    /// `*p = q`; pointees that are not pointers are ignored.
    fn relax_store_edges(&mut self, id: NodeId) -> bool {
        let mut changed = false;
        let sources: Vec<NodeId> = self.tree.node(id).pointer().store_edges().collect();
        for source in sources {
            let pointees: Vec<NodeId> = self.tree.node(id).pointee_set().iter().collect();
            for o in pointees {
                if self.tree.node(o).is_pointer() && self.tree.merge_pointee_sets(o, source) {
                    self.stats.propagations += 1;
                    changed = true;
                }
            }
        }
        changed
    }
}
