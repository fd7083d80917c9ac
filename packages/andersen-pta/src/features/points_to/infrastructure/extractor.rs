//! Constraint extraction pass
//!
//! Walks the module once and lowers every pointer-manipulating instruction
//! into inclusion constraints attached to the left-hand pointer record.
//! Re-running the pass over the same module is idempotent: constraints live
//! in hash sets keyed by their full shape.

use crate::features::points_to::domain::{ElementPtrEdge, NodeId, PointerIndex, ValueTree};
use crate::shared::models::{ElementPtrIndex, Function, InstructionKind, Module, ValueId};
use tracing::debug;

/// Counters for one extraction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub instructions: usize,
    pub element_edges: usize,
    pub copy_edges: usize,
    pub load_edges: usize,
    pub store_edges: usize,
}

impl ExtractionStats {
    pub fn total_edges(&self) -> usize {
        self.element_edges + self.copy_edges + self.load_edges + self.store_edges
    }
}

/// Extract inclusion constraints from every instruction of `module`
pub fn extract(module: &Module, tree: &mut ValueTree) -> ExtractionStats {
    let mut stats = ExtractionStats::default();
    for func in module.functions() {
        for inst in func.instructions() {
            stats.instructions += 1;
            extract_instruction(tree, func, inst.id, &inst.kind, &mut stats);
        }
    }
    debug!(
        instructions = stats.instructions,
        edges = stats.total_edges(),
        "constraint extraction finished"
    );
    stats
}

fn extract_instruction(
    tree: &mut ValueTree,
    func: &Function,
    result: ValueId,
    kind: &InstructionKind,
    stats: &mut ExtractionStats,
) {
    match kind {
        InstructionKind::ExtractValue { aggregate, indices } => {
            if !is_pointer_value(tree, result) {
                return;
            }
            // The source is the sub-node of the aggregate's SSA value at the
            // extraction path; mis-shaped paths are tolerated and dropped.
            let Some(mut src) = tree.get_node(*aggregate) else {
                return;
            };
            for &i in indices {
                let node = tree.node(src);
                match node.children().get(i as usize) {
                    Some(&child) => src = child,
                    None => return,
                }
            }
            if tree.node(src).is_pointer() {
                add_copy(tree, result, src, stats);
            }
        }

        InstructionKind::ElementPtr { base, indices } => {
            let base_node = expect_node(tree, *base);
            let indices: Vec<PointerIndex> = indices
                .iter()
                .map(|idx| match idx {
                    ElementPtrIndex::Constant(k) => PointerIndex::Constant(*k),
                    ElementPtrIndex::Value(_) => PointerIndex::Dynamic,
                })
                .collect();
            let result_node = expect_node(tree, result);
            if tree
                .node_mut(result_node)
                .pointer_mut()
                .assigned_element_ptr(ElementPtrEdge::new(base_node, indices))
            {
                stats.element_edges += 1;
            }
        }

        InstructionKind::Load { ptr } => {
            if !is_pointer_value(tree, result) {
                return;
            }
            let ptr_node = expect_node(tree, *ptr);
            let result_node = expect_node(tree, result);
            if tree.node_mut(result_node).pointer_mut().assigned_pointee(ptr_node) {
                stats.load_edges += 1;
            }
        }

        InstructionKind::Store { value, ptr } => {
            if !is_pointer_value(tree, *value) {
                return;
            }
            let value_node = expect_node(tree, *value);
            let ptr_node = expect_node(tree, *ptr);
            if tree.node_mut(ptr_node).pointer_mut().pointee_assigned(value_node) {
                stats.store_edges += 1;
            }
        }

        InstructionKind::Phi { incoming } => {
            if !is_pointer_value(tree, result) {
                return;
            }
            for &value in incoming {
                let node = expect_node(tree, value);
                add_copy(tree, result, node, stats);
            }
        }

        InstructionKind::Select {
            on_true, on_false, ..
        } => {
            if !is_pointer_value(tree, result) {
                return;
            }
            for &value in [on_true, on_false].into_iter() {
                let node = expect_node(tree, value);
                add_copy(tree, result, node, stats);
            }
        }

        InstructionKind::Ret { value: Some(value) } => {
            if !is_pointer_value(tree, *value) {
                return;
            }
            let ret_node = tree.get_return_value(func.id);
            let value_node = expect_node(tree, *value);
            if tree.node(ret_node).is_pointer()
                && tree.node_mut(ret_node).pointer_mut().assigned_pointer(value_node)
            {
                stats.copy_edges += 1;
            }
        }

        InstructionKind::Alloca { .. }
        | InstructionKind::Call { .. }
        | InstructionKind::Ret { value: None }
        | InstructionKind::Other => {}
    }
}

fn is_pointer_value(tree: &ValueTree, value: ValueId) -> bool {
    tree.get_node(value)
        .map(|id| tree.node(id).is_pointer())
        .unwrap_or(false)
}

fn expect_node(tree: &ValueTree, value: ValueId) -> NodeId {
    tree.get_node(value)
        .unwrap_or_else(|| panic!("no value tree node for {value:?}"))
}

fn add_copy(tree: &mut ValueTree, result: ValueId, source: NodeId, stats: &mut ExtractionStats) {
    let result_node = expect_node(tree, result);
    if tree.node_mut(result_node).pointer_mut().assigned_pointer(source) {
        stats.copy_edges += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::points_to::domain::ValueTree;
    use crate::shared::models::{Linkage, Module};

    fn ptr_module() -> (Module, ValueId, ValueId) {
        let mut module = Module::new("m");
        let int = module.types_mut().int(32);
        let ptr_int = module.types_mut().pointer(int);
        let void = module.types_mut().void();
        let g = module.add_global("P", ptr_int);

        let mut f = module.build_function("f", Linkage::External, void, &[ptr_int]);
        let a = f.arg(0);
        f.store(a, g);
        let loaded = f.load(g);
        f.ret(None);
        f.finish();
        (module, g, loaded)
    }

    #[test]
    fn test_load_store_edges() {
        let (module, g, loaded) = ptr_module();
        let mut tree = ValueTree::build(&module);
        let stats = extract(&module, &mut tree);

        assert_eq!(stats.load_edges, 1);
        assert_eq!(stats.store_edges, 1);

        let g_node = tree.get_node(g).unwrap();
        let loaded_node = tree.get_node(loaded).unwrap();
        let loads: Vec<_> = tree.node(loaded_node).pointer().load_edges().collect();
        assert_eq!(loads, vec![g_node]);
        let stores: Vec<_> = tree.node(g_node).pointer().store_edges().collect();
        assert_eq!(stores.len(), 1);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let (module, _, _) = ptr_module();
        let mut tree = ValueTree::build(&module);
        let first = extract(&module, &mut tree);
        assert!(first.total_edges() > 0);
        let second = extract(&module, &mut tree);
        assert_eq!(second.total_edges(), 0);
    }

    #[test]
    fn test_phi_emits_copy_per_incoming() {
        let mut module = Module::new("m");
        let int = module.types_mut().int(32);
        let ptr_int = module.types_mut().pointer(int);
        let void = module.types_mut().void();

        let mut f = module.build_function("f", Linkage::Internal, void, &[ptr_int, ptr_int]);
        let (a, b) = (f.arg(0), f.arg(1));
        let merged = f.phi(ptr_int, vec![a, b]);
        f.ret(None);
        f.finish();

        let mut tree = ValueTree::build(&module);
        let stats = extract(&module, &mut tree);
        assert_eq!(stats.copy_edges, 2);

        let merged_node = tree.get_node(merged).unwrap();
        assert_eq!(tree.node(merged_node).pointer().element_ptr_edges().count(), 2);
    }

    #[test]
    fn test_dynamic_index_maps_to_fan_out() {
        let mut module = Module::new("m");
        let int = module.types_mut().int(32);
        let ptr_int = module.types_mut().pointer(int);
        let arr = module.types_mut().array(ptr_int, 2);
        let i64t = module.types_mut().int(64);
        let void = module.types_mut().void();
        let g = module.add_global("A", arr);

        let mut f = module.build_function("f", Linkage::Internal, void, &[i64t]);
        let i = f.arg(0);
        let pd = f.element_ptr(g, vec![ElementPtrIndex::Value(i)]);
        f.ret(None);
        f.finish();

        let mut tree = ValueTree::build(&module);
        extract(&module, &mut tree);

        let pd_node = tree.get_node(pd).unwrap();
        let edges: Vec<_> = tree.node(pd_node).pointer().element_ptr_edges().collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].indices, vec![PointerIndex::Dynamic]);
    }

    #[test]
    fn test_non_pointer_instructions_ignored() {
        let mut module = Module::new("m");
        let int = module.types_mut().int(32);
        let void = module.types_mut().void();
        let g = module.add_global("X", int);

        let mut f = module.build_function("f", Linkage::Internal, void, &[]);
        let x = f.load(g);
        let y = f.other(int);
        f.store(y, g);
        let _ = x;
        f.ret(None);
        f.finish();

        let mut tree = ValueTree::build(&module);
        let stats = extract(&module, &mut tree);
        // Loaded and stored values are integers: nothing to constrain.
        assert_eq!(stats.total_edges(), 0);
    }
}
