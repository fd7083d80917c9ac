//! Field-sensitive value tree
//!
//! One node per value and per abstract memory object in the module, laid out
//! in an id-addressed arena. Aggregate-typed nodes spawn one child per
//! element or field; pointer-typed nodes spawn no children (the pointed-to
//! object is a separate memory root reached through the constraint graph)
//! and carry a [`Pointer`] record instead.
//!
//! Ownership is tree-shaped: the arena owns every node, nodes reference each
//! other (parents, children, constraint edges, pointee sets) by [`NodeId`]
//! only, so the cyclic points-to graph never cycles ownership.

use super::assignment::PointerIndex;
use super::pointer::{PointeeSet, Pointer};
use crate::shared::models::{InstructionKind, Module, TypeId, TypeTable, ValueId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Index of a node in the value-tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// What a node models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// An SSA value (global symbol, function, argument, instruction result)
    Normal,
    /// Storage created by a stack allocation
    StackMemory,
    /// Storage of a global variable
    GlobalMemory,
    /// The unknown object behind a pointer argument of an exported function
    ArgumentMemory,
    /// The value a function returns
    FunctionReturnValue,
}

/// One node of the value tree
#[derive(Debug)]
pub struct ValueTreeNode {
    id: NodeId,
    ty: TypeId,
    /// The originating IR value; present on `Normal` roots only
    value: Option<ValueId>,
    parent: Option<NodeId>,
    /// Child index within the parent
    offset: usize,
    children: Vec<NodeId>,
    kind: NodeKind,
    /// Pointer payload, present iff the node's type is a pointer type
    pointer: Option<Pointer>,
}

impl ValueTreeNode {
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    #[inline]
    pub fn value(&self) -> Option<ValueId> {
        self.value
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether this node's type is a pointer type
    #[inline]
    pub fn is_pointer(&self) -> bool {
        self.pointer.is_some()
    }

    /// The pointer record of this node
    ///
    /// Panics if the node is not pointer-typed.
    #[inline]
    pub fn pointer(&self) -> &Pointer {
        self.pointer
            .as_ref()
            .unwrap_or_else(|| panic!("pointer() on non-pointer node {:?}", self.id))
    }

    /// Mutable pointer record of this node
    ///
    /// Panics if the node is not pointer-typed.
    #[inline]
    pub fn pointer_mut(&mut self) -> &mut Pointer {
        let id = self.id;
        self.pointer
            .as_mut()
            .unwrap_or_else(|| panic!("pointer_mut() on non-pointer node {id:?}"))
    }

    /// The computed pointee set of this pointer
    ///
    /// Panics if the node is not pointer-typed.
    #[inline]
    pub fn pointee_set(&self) -> &PointeeSet {
        self.pointer().pointee_set()
    }
}

/// The value tree: arena of nodes plus lookup maps keyed by IR entity
#[derive(Debug)]
pub struct ValueTree {
    nodes: Vec<ValueTreeNode>,
    types: TypeTable,
    /// Roots in creation order, for deterministic traversal
    root_order: Vec<NodeId>,
    roots: FxHashMap<ValueId, NodeId>,
    global_memory: FxHashMap<ValueId, NodeId>,
    alloca_memory: FxHashMap<ValueId, NodeId>,
    argument_memory: FxHashMap<ValueId, NodeId>,
    return_value: FxHashMap<ValueId, NodeId>,
}

impl ValueTree {
    /// Build the tree for a whole module in a single traversal
    pub fn build(module: &Module) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            types: module.types().clone(),
            root_order: Vec::new(),
            roots: FxHashMap::default(),
            global_memory: FxHashMap::default(),
            alloca_memory: FxHashMap::default(),
            argument_memory: FxHashMap::default(),
            return_value: FxHashMap::default(),
        };

        for global in module.globals() {
            let root = tree.add_root(global.pointer_type, Some(global.id), NodeKind::Normal);
            tree.roots.insert(global.id, root);
            let memory = tree.add_root(global.value_type, None, NodeKind::GlobalMemory);
            tree.global_memory.insert(global.id, memory);
        }

        for func in module.functions() {
            let root = tree.add_root(func.pointer_type, Some(func.id), NodeKind::Normal);
            tree.roots.insert(func.id, root);
            let ret = tree.add_root(func.return_type, None, NodeKind::FunctionReturnValue);
            tree.return_value.insert(func.id, ret);

            for arg in &func.args {
                let arg_root = tree.add_root(arg.ty, Some(arg.id), NodeKind::Normal);
                tree.roots.insert(arg.id, arg_root);
                if func.is_exported() && tree.types.is_pointer(arg.ty) {
                    let pointee_ty = tree.types.pointee(arg.ty);
                    let memory = tree.add_root(pointee_ty, None, NodeKind::ArgumentMemory);
                    tree.argument_memory.insert(arg.id, memory);
                }
            }

            for inst in func.instructions() {
                let inst_root = tree.add_root(inst.ty, Some(inst.id), NodeKind::Normal);
                tree.roots.insert(inst.id, inst_root);
                if let InstructionKind::Alloca { allocated } = &inst.kind {
                    let memory = tree.add_root(*allocated, None, NodeKind::StackMemory);
                    tree.alloca_memory.insert(inst.id, memory);
                }
            }
        }

        tree
    }

    fn add_root(&mut self, ty: TypeId, value: Option<ValueId>, kind: NodeKind) -> NodeId {
        let id = self.add_node(ty, value, None, 0, kind);
        self.root_order.push(id);
        id
    }

    fn add_node(
        &mut self,
        ty: TypeId,
        value: Option<ValueId>,
        parent: Option<NodeId>,
        offset: usize,
        kind: NodeKind,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let pointer = self.types.is_pointer(ty).then(Pointer::new);
        self.nodes.push(ValueTreeNode {
            id,
            ty,
            value,
            parent,
            offset,
            children: Vec::new(),
            kind,
            pointer,
        });

        // Children follow the type shape; sub-objects keep the parent's kind.
        let child_count = self.types.child_count(ty);
        if child_count > 0 {
            let mut children = Vec::with_capacity(child_count);
            for i in 0..child_count {
                let child_ty = self.types.child_type(ty, i);
                children.push(self.add_node(child_ty, None, Some(id), i, kind));
            }
            self.nodes[id.0 as usize].children = children;
        }

        id
    }

    /// The type table the tree was built against
    #[inline]
    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Total number of nodes
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Borrow a node by id
    #[inline]
    pub fn node(&self, id: NodeId) -> &ValueTreeNode {
        &self.nodes[id.0 as usize]
    }

    /// Mutably borrow a node by id
    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut ValueTreeNode {
        &mut self.nodes[id.0 as usize]
    }

    /// The `index`-th child of `id`
    ///
    /// Panics if `index` is out of range.
    #[inline]
    pub fn child(&self, id: NodeId, index: usize) -> NodeId {
        let node = self.node(id);
        *node
            .children
            .get(index)
            .unwrap_or_else(|| panic!("child index {index} out of range on node {id:?}"))
    }

    /// Node of a top-level SSA value, if the value is known
    #[inline]
    pub fn get_node(&self, value: ValueId) -> Option<NodeId> {
        self.roots.get(&value).copied()
    }

    /// Storage node of a global variable
    ///
    /// Panics if `global` is not a global of the analyzed module.
    #[inline]
    pub fn get_global_memory(&self, global: ValueId) -> NodeId {
        *self
            .global_memory
            .get(&global)
            .unwrap_or_else(|| panic!("no global memory for {global:?}"))
    }

    /// Storage node of a stack allocation
    ///
    /// Panics if `alloca` is not an `alloca` instruction of the analyzed
    /// module.
    #[inline]
    pub fn get_alloca_memory(&self, alloca: ValueId) -> NodeId {
        *self
            .alloca_memory
            .get(&alloca)
            .unwrap_or_else(|| panic!("no alloca memory for {alloca:?}"))
    }

    /// External-input node behind a pointer argument of an exported function
    #[inline]
    pub fn get_argument_memory(&self, arg: ValueId) -> Option<NodeId> {
        self.argument_memory.get(&arg).copied()
    }

    /// Return-value node of a function
    ///
    /// Panics if `function` is not a function of the analyzed module.
    #[inline]
    pub fn get_return_value(&self, function: ValueId) -> NodeId {
        *self
            .return_value
            .get(&function)
            .unwrap_or_else(|| panic!("no return value node for {function:?}"))
    }

    /// Depth-first traversal over all roots and descendants
    ///
    /// Stops early when the predicate returns `false`; the return value tells
    /// whether the traversal ran to completion.
    pub fn visit(&self, mut predicate: impl FnMut(&ValueTreeNode) -> bool) -> bool {
        let mut stack: Vec<NodeId> = Vec::new();
        for &root in self.root_order.iter() {
            stack.push(root);
            while let Some(id) = stack.pop() {
                let node = self.node(id);
                if !predicate(node) {
                    return false;
                }
                for &child in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        true
    }

    /// Ids of all pointer-typed nodes, roots and sub-objects alike
    pub fn pointer_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.is_pointer())
            .map(|n| n.id())
    }

    /// Walk `start` through an element index sequence
    ///
    /// `Constant(k)` descends aggregates into child `k` (out-of-range drops
    /// the branch); `Constant(0)` on a non-aggregate keeps the node itself,
    /// which is what makes `[Constant(0)]` the plain-copy encoding;
    /// `Dynamic` fans out into all children of an aggregate and drops
    /// non-aggregates.
    pub fn walk_elements(&self, start: NodeId, indices: &[PointerIndex]) -> Vec<NodeId> {
        let mut current = vec![start];
        for (step, index) in indices.iter().enumerate() {
            let mut next = Vec::with_capacity(current.len());
            for id in current {
                let node = self.node(id);
                let aggregate = self.types.is_aggregate(node.ty);
                match index {
                    PointerIndex::Constant(k) => {
                        if aggregate {
                            if let Some(&child) = node.children.get(*k as usize) {
                                next.push(child);
                            }
                        } else if *k == 0 {
                            // The walk bottomed out: `&o[0]` is `o` itself,
                            // and the remaining indices cannot refine it.
                            next.push(id);
                        }
                    }
                    PointerIndex::Dynamic => {
                        if aggregate {
                            next.extend_from_slice(&node.children);
                        }
                    }
                }
            }
            current = next;
            if current.is_empty() {
                tracing::trace!(step, "element walk dropped every branch");
                break;
            }
        }
        current
    }

    /// Grow `ptr`'s pointee set with a single pointee
    ///
    /// Returns true if the set grew. Panics if `ptr` is not pointer-typed.
    pub fn insert_pointee(&mut self, ptr: NodeId, pointee: NodeId) -> bool {
        self.node_mut(ptr).pointer_mut().pointee_set_mut().insert(pointee)
    }

    /// Merge the pointee set of `from` into the pointee set of `into`
    ///
    /// Returns true if `into`'s set grew. Panics if either node is not
    /// pointer-typed.
    pub fn merge_pointee_sets(&mut self, into: NodeId, from: NodeId) -> bool {
        if into == from {
            return false;
        }
        let (a, b) = (into.0 as usize, from.0 as usize);
        let (lo, hi) = (a.min(b), a.max(b));
        let (left, right) = self.nodes.split_at_mut(hi);
        let (dst, src) = if a < b {
            (&mut left[lo], &mut right[0])
        } else {
            (&mut right[0], &mut left[lo])
        };
        dst.pointer_mut()
            .pointee_set_mut()
            .merge_from(src.pointer().pointee_set())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::Linkage;

    fn module_with_struct_global() -> Module {
        let mut module = Module::new("m");
        let int = module.types_mut().int(32);
        let ptr_int = module.types_mut().pointer(int);
        let arr = module.types_mut().array(ptr_int, 2);
        let st = module.types_mut().struct_of(vec![ptr_int, arr]);
        module.add_global("S", st);
        module
    }

    #[test]
    fn test_children_follow_type_shape() {
        let module = module_with_struct_global();
        let tree = ValueTree::build(&module);
        let g = module.globals()[0].id;

        // The symbol root is a pointer: no children, has a pointer record.
        let root = tree.node(tree.get_node(g).unwrap());
        assert!(root.is_pointer());
        assert_eq!(root.num_children(), 0);

        // The storage node is a two-field struct.
        let mem = tree.node(tree.get_global_memory(g));
        assert_eq!(mem.kind(), NodeKind::GlobalMemory);
        assert_eq!(mem.num_children(), 2);

        let field0 = tree.node(tree.child(mem.id(), 0));
        assert!(field0.is_pointer());
        assert_eq!(field0.offset(), 0);
        assert_eq!(field0.kind(), NodeKind::GlobalMemory);

        let field1 = tree.node(tree.child(mem.id(), 1));
        assert_eq!(field1.num_children(), 2);
    }

    #[test]
    fn test_parent_offset_consistency() {
        let module = module_with_struct_global();
        let tree = ValueTree::build(&module);
        let ok = tree.visit(|node| match node.parent() {
            Some(parent) => tree.child(parent, node.offset()) == node.id(),
            None => true,
        });
        assert!(ok);
    }

    #[test]
    fn test_argument_memory_only_for_exported_pointer_args() {
        let mut module = Module::new("m");
        let int = module.types_mut().int(32);
        let ptr_int = module.types_mut().pointer(int);
        let void = module.types_mut().void();

        let f = module.build_function("exported", Linkage::External, void, &[ptr_int, int]);
        let (p_arg, i_arg) = (f.arg(0), f.arg(1));
        f.finish();
        let g = module.build_function("internal", Linkage::Internal, void, &[ptr_int]);
        let internal_arg = g.arg(0);
        g.finish();

        let tree = ValueTree::build(&module);
        let mem = tree.get_argument_memory(p_arg).expect("pointer arg of exported fn");
        assert_eq!(tree.node(mem).kind(), NodeKind::ArgumentMemory);
        assert_eq!(tree.node(mem).ty(), int);
        assert!(tree.get_argument_memory(i_arg).is_none());
        assert!(tree.get_argument_memory(internal_arg).is_none());
    }

    #[test]
    fn test_alloca_and_return_value_nodes() {
        let mut module = Module::new("m");
        let int = module.types_mut().int(32);
        let ptr_int = module.types_mut().pointer(int);

        let mut f = module.build_function("f", Linkage::Internal, ptr_int, &[]);
        let slot = f.alloca(int);
        f.ret(None);
        let f_id = f.finish();

        let tree = ValueTree::build(&module);
        let mem = tree.get_alloca_memory(slot);
        assert_eq!(tree.node(mem).kind(), NodeKind::StackMemory);
        assert_eq!(tree.node(mem).ty(), int);

        let ret = tree.get_return_value(f_id);
        assert_eq!(tree.node(ret).kind(), NodeKind::FunctionReturnValue);
        assert!(tree.node(ret).is_pointer());
    }

    #[test]
    fn test_visit_stops_early() {
        let module = module_with_struct_global();
        let tree = ValueTree::build(&module);
        let mut seen = 0;
        let completed = tree.visit(|_| {
            seen += 1;
            seen < 2
        });
        assert!(!completed);
        assert_eq!(seen, 2);
    }

    #[test]
    #[should_panic(expected = "child index")]
    fn test_child_out_of_range_panics() {
        let module = module_with_struct_global();
        let tree = ValueTree::build(&module);
        let g = module.globals()[0].id;
        let root = tree.get_node(g).unwrap();
        tree.child(root, 0);
    }

    #[test]
    #[should_panic(expected = "pointer() on non-pointer node")]
    fn test_pointer_on_non_pointer_panics() {
        let module = module_with_struct_global();
        let tree = ValueTree::build(&module);
        let g = module.globals()[0].id;
        let mem = tree.get_global_memory(g);
        tree.node(mem).pointer();
    }

    #[test]
    fn test_walk_constant_and_dynamic() {
        let module = module_with_struct_global();
        let tree = ValueTree::build(&module);
        let g = module.globals()[0].id;
        let mem = tree.get_global_memory(g);

        // S.0
        let walked = tree.walk_elements(mem, &[PointerIndex::Constant(0)]);
        assert_eq!(walked, vec![tree.child(mem, 0)]);

        // S.1[*] fans out into both array elements.
        let walked = tree.walk_elements(mem, &[PointerIndex::Constant(1), PointerIndex::Dynamic]);
        let arr = tree.child(mem, 1);
        assert_eq!(walked, vec![tree.child(arr, 0), tree.child(arr, 1)]);

        // Constant(0) on a non-aggregate keeps the node (plain copy).
        let scalar = tree.child(mem, 0);
        let walked = tree.walk_elements(scalar, &[PointerIndex::Constant(0)]);
        assert_eq!(walked, vec![scalar]);

        // Constant(1) on a non-aggregate drops the branch.
        let walked = tree.walk_elements(scalar, &[PointerIndex::Constant(1)]);
        assert!(walked.is_empty());
    }

    #[test]
    fn test_merge_pointee_sets_between_nodes() {
        let module = module_with_struct_global();
        let mut tree = ValueTree::build(&module);
        let g = module.globals()[0].id;
        let root = tree.get_node(g).unwrap();
        let mem = tree.get_global_memory(g);
        let field0 = tree.child(mem, 0);

        assert!(tree.insert_pointee(root, mem));
        assert!(tree.merge_pointee_sets(field0, root));
        assert!(tree.node(field0).pointee_set().contains(mem));
        // Merging again grows nothing; self-merge is a no-op.
        assert!(!tree.merge_pointee_sets(field0, root));
        assert!(!tree.merge_pointee_sets(root, root));
    }
}
