//! Self-contained SSA module model
//!
//! The analysis consumes a whole module: global variables plus functions made
//! of basic blocks of instructions. Every program-level value (global,
//! function, formal argument, instruction result) carries a unique
//! [`ValueId`]; the pointer-relevant instruction shapes are modeled
//! explicitly and everything else collapses into [`InstructionKind::Other`].
//!
//! Modules are constructed through [`Module::add_global`] and
//! [`Module::build_function`]; [`Module::verify`] checks referential
//! integrity after construction.

use super::types::{TypeId, TypeKind, TypeTable};
use crate::errors::{AndersenError, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Unique identifier of a program-level value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

/// Linkage of a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Linkage {
    /// Visible outside the module; callers outside the analysis scope exist
    External,
    /// Only callable from within the module
    Internal,
}

/// A module-level global variable
///
/// The global symbol itself is a pointer to its storage, so two types are
/// tracked: the storage type and the (interned) pointer-to-storage type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub id: ValueId,
    pub name: String,
    /// Type of the storage behind the symbol
    pub value_type: TypeId,
    /// Type of the symbol itself: `ptr(value_type)`
    pub pointer_type: TypeId,
}

/// A formal argument of a function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Argument {
    pub id: ValueId,
    pub index: usize,
    pub ty: TypeId,
}

/// One index operand of an element-address computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementPtrIndex {
    /// Integer literal index
    Constant(u64),
    /// Index computed at runtime
    Value(ValueId),
}

/// Instruction payloads
///
/// Only the shapes the constraint extractor inspects are structured; any
/// other instruction is `Other` and contributes nothing beyond its result
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// Stack allocation; the result is a pointer to the allocated slot
    Alloca { allocated: TypeId },
    /// Read through a pointer
    Load { ptr: ValueId },
    /// Write through a pointer
    Store { value: ValueId, ptr: ValueId },
    /// Address of a sub-element of the pointee of `base`
    ElementPtr {
        base: ValueId,
        indices: Vec<ElementPtrIndex>,
    },
    /// Extract a sub-element out of an aggregate SSA value
    ExtractValue { aggregate: ValueId, indices: Vec<u64> },
    /// Merge of incoming values at a control-flow join
    Phi { incoming: Vec<ValueId> },
    /// Conditional value selection
    Select {
        cond: ValueId,
        on_true: ValueId,
        on_false: ValueId,
    },
    /// Function call; `callee` is the called value (a function symbol for
    /// direct calls)
    Call { callee: ValueId, args: Vec<ValueId> },
    /// Return from the enclosing function
    Ret { value: Option<ValueId> },
    /// Any instruction the analysis does not interpret
    Other,
}

/// A single instruction with its result value and type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub id: ValueId,
    pub ty: TypeId,
    pub kind: InstructionKind,
}

/// A basic block: a named straight-line run of instructions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    pub name: String,
    pub instructions: Vec<Instruction>,
}

/// A function definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub id: ValueId,
    pub name: String,
    pub linkage: Linkage,
    /// The function signature type
    pub fn_type: TypeId,
    /// Type of the function symbol itself: `ptr(fn_type)`
    pub pointer_type: TypeId,
    pub return_type: TypeId,
    pub args: Vec<Argument>,
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    /// Whether callers outside the module may invoke this function
    #[inline]
    pub fn is_exported(&self) -> bool {
        self.linkage == Linkage::External
    }

    /// Iterate over all instructions in block order
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|b| b.instructions.iter())
    }
}

/// A whole translation unit: globals plus functions, with its type table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    types: TypeTable,
    globals: Vec<GlobalVariable>,
    functions: Vec<Function>,
    #[serde(skip)]
    value_types: FxHashMap<ValueId, TypeId>,
    next_value: u32,
}

impl Module {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    #[inline]
    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    #[inline]
    pub fn globals(&self) -> &[GlobalVariable] {
        &self.globals
    }

    #[inline]
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Find a function by the `ValueId` of its symbol
    pub fn function(&self, id: ValueId) -> Option<&Function> {
        self.functions.iter().find(|f| f.id == id)
    }

    /// Type of any registered value
    ///
    /// Panics if `id` does not belong to this module.
    #[inline]
    pub fn value_type(&self, id: ValueId) -> TypeId {
        *self
            .value_types
            .get(&id)
            .unwrap_or_else(|| panic!("unknown value {id:?}"))
    }

    /// Whether `id` names a value registered in this module
    #[inline]
    pub fn contains_value(&self, id: ValueId) -> bool {
        self.value_types.contains_key(&id)
    }

    fn fresh(&mut self, ty: TypeId) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        self.value_types.insert(id, ty);
        id
    }

    /// Define a global variable with the given storage type
    ///
    /// The returned `ValueId` names the symbol, whose type is a pointer to
    /// the storage.
    pub fn add_global(&mut self, name: impl Into<String>, value_type: TypeId) -> ValueId {
        let pointer_type = self.types.pointer(value_type);
        let id = self.fresh(pointer_type);
        self.globals.push(GlobalVariable {
            id,
            name: name.into(),
            value_type,
            pointer_type,
        });
        id
    }

    /// Start defining a function; finish with [`FunctionBuilder::finish`]
    pub fn build_function(
        &mut self,
        name: impl Into<String>,
        linkage: Linkage,
        return_type: TypeId,
        params: &[TypeId],
    ) -> FunctionBuilder<'_> {
        let fn_type = self.types.function(params.to_vec(), return_type);
        let pointer_type = self.types.pointer(fn_type);
        let id = self.fresh(pointer_type);
        let args = params
            .iter()
            .enumerate()
            .map(|(index, &ty)| Argument {
                id: self.fresh(ty),
                index,
                ty,
            })
            .collect();
        let func = Function {
            id,
            name: name.into(),
            linkage,
            fn_type,
            pointer_type,
            return_type,
            args,
            blocks: vec![BasicBlock {
                name: "entry".to_string(),
                instructions: Vec::new(),
            }],
        };
        FunctionBuilder { module: self, func }
    }

    /// Check referential integrity of the module
    pub fn verify(&self) -> Result<()> {
        for func in &self.functions {
            for inst in func.instructions() {
                for operand in operand_ids(&inst.kind) {
                    if !self.contains_value(operand) {
                        return Err(AndersenError::model(format!(
                            "function `{}`: instruction {:?} references unknown value {:?}",
                            func.name, inst.id, operand
                        )));
                    }
                }
                match &inst.kind {
                    InstructionKind::Load { ptr } | InstructionKind::Store { ptr, .. } => {
                        if !self.types.is_pointer(self.value_type(*ptr)) {
                            return Err(AndersenError::model(format!(
                                "function `{}`: memory access through non-pointer {:?}",
                                func.name, ptr
                            )));
                        }
                    }
                    InstructionKind::ElementPtr { base, .. } => {
                        if !self.types.is_pointer(self.value_type(*base)) {
                            return Err(AndersenError::model(format!(
                                "function `{}`: element_ptr over non-pointer {:?}",
                                func.name, base
                            )));
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

fn operand_ids(kind: &InstructionKind) -> Vec<ValueId> {
    match kind {
        InstructionKind::Alloca { .. } | InstructionKind::Other => Vec::new(),
        InstructionKind::Load { ptr } => vec![*ptr],
        InstructionKind::Store { value, ptr } => vec![*value, *ptr],
        InstructionKind::ElementPtr { base, indices } => {
            let mut ids = vec![*base];
            for idx in indices {
                if let ElementPtrIndex::Value(v) = idx {
                    ids.push(*v);
                }
            }
            ids
        }
        InstructionKind::ExtractValue { aggregate, .. } => vec![*aggregate],
        InstructionKind::Phi { incoming } => incoming.clone(),
        InstructionKind::Select {
            cond,
            on_true,
            on_false,
        } => vec![*cond, *on_true, *on_false],
        InstructionKind::Call { callee, args } => {
            let mut ids = vec![*callee];
            ids.extend_from_slice(args);
            ids
        }
        InstructionKind::Ret { value } => value.iter().copied().collect(),
    }
}

/// Incremental builder for one function
///
/// Instruction methods append to the current block and return the result
/// `ValueId`. Result types are derived from operand types; mis-typed operands
/// panic, matching the trap semantics of the analysis proper.
pub struct FunctionBuilder<'m> {
    module: &'m mut Module,
    func: Function,
}

impl FunctionBuilder<'_> {
    /// The `ValueId` of the i-th formal argument
    #[inline]
    pub fn arg(&self, index: usize) -> ValueId {
        self.func.args[index].id
    }

    /// The `ValueId` of the function symbol being built
    #[inline]
    pub fn function_id(&self) -> ValueId {
        self.func.id
    }

    /// Start a new basic block; subsequent instructions land there
    pub fn block(&mut self, name: impl Into<String>) {
        self.func.blocks.push(BasicBlock {
            name: name.into(),
            instructions: Vec::new(),
        });
    }

    fn push(&mut self, ty: TypeId, kind: InstructionKind) -> ValueId {
        let id = self.module.fresh(ty);
        self.func
            .blocks
            .last_mut()
            .expect("function has no block")
            .instructions
            .push(Instruction { id, ty, kind });
        id
    }

    /// Stack-allocate a slot of the given type; yields a pointer to it
    pub fn alloca(&mut self, allocated: TypeId) -> ValueId {
        let ty = self.module.types.pointer(allocated);
        self.push(ty, InstructionKind::Alloca { allocated })
    }

    /// Read through `ptr`
    pub fn load(&mut self, ptr: ValueId) -> ValueId {
        let ty = self.module.types.pointee(self.module.value_type(ptr));
        self.push(ty, InstructionKind::Load { ptr })
    }

    /// Write `value` through `ptr`
    pub fn store(&mut self, value: ValueId, ptr: ValueId) {
        let void = self.module.types.void();
        self.push(void, InstructionKind::Store { value, ptr });
    }

    /// Compute the address of a sub-element of the pointee of `base`
    pub fn element_ptr(&mut self, base: ValueId, indices: Vec<ElementPtrIndex>) -> ValueId {
        let types = &mut self.module.types;
        let mut current = types.pointee(self.module.value_types[&base]);
        for idx in &indices {
            current = match types.kind(current).clone() {
                TypeKind::Array { element, .. } => element,
                TypeKind::Struct { fields } => match idx {
                    ElementPtrIndex::Constant(k) => fields[*k as usize],
                    ElementPtrIndex::Value(_) => {
                        panic!("dynamic index into struct type")
                    }
                },
                _ => {
                    assert!(
                        matches!(idx, ElementPtrIndex::Constant(0)),
                        "element_ptr walks past a non-aggregate type"
                    );
                    current
                }
            };
        }
        let ty = types.pointer(current);
        self.push(ty, InstructionKind::ElementPtr { base, indices })
    }

    /// Extract a sub-element out of an aggregate SSA value
    pub fn extract_value(&mut self, aggregate: ValueId, indices: Vec<u64>) -> ValueId {
        let types = &self.module.types;
        let mut current = self.module.value_types[&aggregate];
        for &i in &indices {
            current = types.child_type(current, i as usize);
        }
        self.push(current, InstructionKind::ExtractValue { aggregate, indices })
    }

    /// Merge incoming values at a join point
    pub fn phi(&mut self, ty: TypeId, incoming: Vec<ValueId>) -> ValueId {
        self.push(ty, InstructionKind::Phi { incoming })
    }

    /// Select between two values on a condition
    pub fn select(&mut self, cond: ValueId, on_true: ValueId, on_false: ValueId) -> ValueId {
        let ty = self.module.value_type(on_true);
        self.push(
            ty,
            InstructionKind::Select {
                cond,
                on_true,
                on_false,
            },
        )
    }

    /// Call `callee` with the given arguments
    pub fn call(&mut self, callee: ValueId, args: Vec<ValueId>) -> ValueId {
        let callee_ty = self.module.value_type(callee);
        let fn_ty = self.module.types.pointee(callee_ty);
        let ret = match self.module.types.kind(fn_ty) {
            TypeKind::Function { ret, .. } => *ret,
            other => panic!("call through non-function type {other:?}"),
        };
        self.push(ret, InstructionKind::Call { callee, args })
    }

    /// Return from the function
    pub fn ret(&mut self, value: Option<ValueId>) {
        let void = self.module.types.void();
        self.push(void, InstructionKind::Ret { value });
    }

    /// An uninterpreted instruction with the given result type
    pub fn other(&mut self, ty: TypeId) -> ValueId {
        self.push(ty, InstructionKind::Other)
    }

    /// Finish the function and return the `ValueId` of its symbol
    pub fn finish(self) -> ValueId {
        let id = self.func.id;
        self.module.functions.push(self.func);
        id
    }
}
