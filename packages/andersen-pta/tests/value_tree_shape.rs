//! Structural invariants of the value tree

use andersen_pta::features::points_to::domain::{NodeKind, ValueTree};
use andersen_pta::shared::models::{Linkage, Module, TypeId, ValueId};

fn nested_module() -> Module {
    let mut module = Module::new("nested");
    let int = module.types_mut().int(32);
    let ptr_int = module.types_mut().pointer(int);
    let inner = module.types_mut().struct_of(vec![ptr_int, int]);
    let arr = module.types_mut().array(inner, 3);
    let outer = module.types_mut().struct_of(vec![arr, ptr_int]);
    let deep = module.types_mut().array(outer, 2);
    module.add_global("D", deep);

    let void = module.types_mut().void();
    let mut f = module.build_function("f", Linkage::External, void, &[ptr_int]);
    let slot = f.alloca(outer);
    let _ = slot;
    f.ret(None);
    f.finish();
    module
}

#[test]
fn children_match_type_shape_everywhere() {
    let module = nested_module();
    let tree = ValueTree::build(&module);
    let types = tree.types();

    let ok = tree.visit(|node| {
        let expected = types.child_count(node.ty());
        if node.num_children() != expected {
            return false;
        }
        for (i, &child) in node.children().iter().enumerate() {
            if tree.node(child).ty() != types.child_type(node.ty(), i) {
                return false;
            }
        }
        // Pointer-typed nodes never spawn children and always carry a record.
        if types.is_pointer(node.ty()) && (!node.is_pointer() || node.num_children() != 0) {
            return false;
        }
        true
    });
    assert!(ok, "every node's children follow its type shape");
}

#[test]
fn parent_offset_agrees_with_children() {
    let module = nested_module();
    let tree = ValueTree::build(&module);
    let ok = tree.visit(|node| match node.parent() {
        Some(parent) => tree.child(parent, node.offset()) == node.id(),
        None => node.offset() == 0,
    });
    assert!(ok);
}

#[test]
fn memory_kinds_propagate_to_subobjects() {
    let module = nested_module();
    let tree = ValueTree::build(&module);
    let g = module.globals()[0].id;
    let mem = tree.get_global_memory(g);

    let mut stack = vec![mem];
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        assert_eq!(node.kind(), NodeKind::GlobalMemory);
        stack.extend_from_slice(node.children());
    }
}

#[test]
fn rebuilding_yields_isomorphic_trees() {
    let module = nested_module();
    let a = ValueTree::build(&module);
    let b = ValueTree::build(&module);

    assert_eq!(a.node_count(), b.node_count());

    // Same DFS spine: kinds, types, offsets, arity and root values line up.
    type Shape = (NodeKind, TypeId, usize, usize, Option<ValueId>);
    let collect = |tree: &ValueTree| {
        let mut shapes: Vec<Shape> = Vec::new();
        tree.visit(|n| {
            shapes.push((n.kind(), n.ty(), n.offset(), n.num_children(), n.value()));
            true
        });
        shapes
    };
    assert_eq!(collect(&a), collect(&b));

    // Root mappings agree value-by-value.
    for global in module.globals() {
        assert_eq!(a.get_node(global.id), b.get_node(global.id));
        assert_eq!(a.get_global_memory(global.id), b.get_global_memory(global.id));
    }
    for func in module.functions() {
        assert_eq!(a.get_return_value(func.id), b.get_return_value(func.id));
        for arg in &func.args {
            assert_eq!(a.get_argument_memory(arg.id), b.get_argument_memory(arg.id));
        }
    }
}

#[test]
fn deep_nesting_materializes_every_level() {
    let module = nested_module();
    let tree = ValueTree::build(&module);
    let g = module.globals()[0].id;
    let mem = tree.get_global_memory(g);

    // D: [2 x {[3 x {ptr(i32), i32}], ptr(i32)}]
    let outer0 = tree.child(mem, 0);
    let arr = tree.child(outer0, 0);
    assert_eq!(tree.node(arr).num_children(), 3);
    let inner2 = tree.child(arr, 2);
    let leaf_ptr = tree.child(inner2, 0);
    assert!(tree.node(leaf_ptr).is_pointer());
    assert_eq!(tree.node(leaf_ptr).offset(), 0);

    let outer_ptr = tree.child(outer0, 1);
    assert!(tree.node(outer_ptr).is_pointer());
}
