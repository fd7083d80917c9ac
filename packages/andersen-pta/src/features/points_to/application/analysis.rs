//! High-level analysis pass
//!
//! Ties the pipeline together: value-tree construction, constraint
//! extraction, fixpoint solving. The pass never mutates the module; `run`
//! reports `false` so pass managers can schedule it as read-only.

use crate::features::points_to::domain::{PointeeSet, ValueTree};
use crate::features::points_to::infrastructure::{
    extract, ExtractionStats, PointsToSolver, SolverConfig, SolverStats,
};
use crate::features::points_to::ports::PointsToQuery;
use crate::shared::models::{Module, ValueId};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Analysis configuration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Upper bound on solver passes; 0 means run to the fixpoint
    pub max_passes: usize,
}

/// Counters for one analysis run
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisStats {
    pub nodes: usize,
    pub extraction: ExtractionStats,
    pub solver: SolverStats,
    pub duration_ms: f64,
}

/// Andersen-style points-to analysis over one module
///
/// # Usage
/// ```
/// use andersen_pta::features::points_to::application::AndersenPointsToAnalysis;
/// use andersen_pta::features::points_to::ports::PointsToQuery;
/// use andersen_pta::shared::models::{Linkage, Module};
///
/// let mut module = Module::new("demo");
/// let int = module.types_mut().int(32);
/// let void = module.types_mut().void();
/// let x = module.add_global("X", int);
/// let f = module.build_function("f", Linkage::External, void, &[]);
/// f.finish();
///
/// let mut analysis = AndersenPointsToAnalysis::new();
/// assert!(!analysis.run(&module));
/// let storage = analysis.value_tree().get_global_memory(x);
/// assert!(analysis.points_to(x).unwrap().contains(storage));
/// ```
pub struct AndersenPointsToAnalysis {
    config: AnalysisConfig,
    tree: Option<ValueTree>,
    stats: AnalysisStats,
}

impl Default for AndersenPointsToAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

impl AndersenPointsToAnalysis {
    /// Create the pass with default configuration
    pub fn new() -> Self {
        Self::with_config(AnalysisConfig::default())
    }

    pub fn with_config(config: AnalysisConfig) -> Self {
        Self {
            config,
            tree: None,
            stats: AnalysisStats::default(),
        }
    }

    /// Analyze `module`; returns whether the module was mutated (never)
    pub fn run(&mut self, module: &Module) -> bool {
        let start = Instant::now();

        let mut tree = ValueTree::build(module);
        let extraction = extract(module, &mut tree);
        let mut solver = PointsToSolver::with_config(
            module,
            tree,
            SolverConfig {
                max_passes: self.config.max_passes,
            },
        );
        solver.solve();

        self.stats = AnalysisStats {
            nodes: solver.value_tree().node_count(),
            extraction,
            solver: *solver.stats(),
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        };
        info!(
            module = %module.name,
            nodes = self.stats.nodes,
            edges = extraction.total_edges(),
            passes = self.stats.solver.passes,
            "points-to analysis finished"
        );

        self.tree = Some(solver.take_value_tree());
        false
    }

    /// The analyzed value tree
    ///
    /// Panics if `run` has not been called.
    pub fn value_tree(&self) -> &ValueTree {
        self.tree
            .as_ref()
            .expect("value_tree() before run()")
    }

    /// Surrender ownership of the value tree to the caller
    ///
    /// Panics if `run` has not been called (or the tree was already taken).
    pub fn take_value_tree(&mut self) -> ValueTree {
        self.tree
            .take()
            .expect("take_value_tree() before run()")
    }

    /// Counters of the last `run`
    #[inline]
    pub fn stats(&self) -> &AnalysisStats {
        &self.stats
    }
}

impl PointsToQuery for AndersenPointsToAnalysis {
    fn points_to(&self, value: ValueId) -> Option<&PointeeSet> {
        let tree = self.tree.as_ref()?;
        let id = tree.get_node(value)?;
        let node = tree.node(id);
        if node.is_pointer() {
            Some(node.pointee_set())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::Linkage;

    fn simple_module() -> (Module, ValueId, ValueId) {
        let mut module = Module::new("m");
        let int = module.types_mut().int(32);
        let ptr_int = module.types_mut().pointer(int);
        let void = module.types_mut().void();
        let x = module.add_global("X", int);
        let p = module.add_global("P", ptr_int);

        let mut f = module.build_function("f", Linkage::Internal, void, &[]);
        f.store(x, p);
        f.ret(None);
        f.finish();
        (module, x, p)
    }

    #[test]
    fn test_run_is_read_only() {
        let (module, _, _) = simple_module();
        let mut analysis = AndersenPointsToAnalysis::new();
        assert!(!analysis.run(&module));
        assert!(analysis.stats().nodes > 0);
        assert!(analysis.stats().solver.passes >= 1);
    }

    #[test]
    fn test_points_to_query_surface() {
        let (module, x, p) = simple_module();
        let mut analysis = AndersenPointsToAnalysis::new();
        analysis.run(&module);

        let x_mem = analysis.value_tree().get_global_memory(x);
        let p_mem = analysis.value_tree().get_global_memory(p);
        assert!(analysis.points_to(p).unwrap().contains(p_mem));
        assert!(analysis
            .value_tree()
            .node(p_mem)
            .pointee_set()
            .contains(x_mem));
        // Non-pointer and unknown values have no set.
        assert!(analysis.points_to(ValueId(u32::MAX)).is_none());
    }

    #[test]
    fn test_take_value_tree_surrenders_ownership() {
        let (module, x, _) = simple_module();
        let mut analysis = AndersenPointsToAnalysis::new();
        analysis.run(&module);
        let tree = analysis.take_value_tree();
        assert!(tree.get_node(x).is_some());
        assert!(analysis.points_to(x).is_none());
    }

    #[test]
    #[should_panic(expected = "value_tree() before run()")]
    fn test_value_tree_before_run_panics() {
        let analysis = AndersenPointsToAnalysis::new();
        analysis.value_tree();
    }
}
