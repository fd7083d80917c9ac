//! Shared IR models

mod module;
mod types;

pub use module::{
    Argument, BasicBlock, ElementPtrIndex, Function, FunctionBuilder, GlobalVariable, Instruction,
    InstructionKind, Linkage, Module, ValueId,
};
pub use types::{TypeId, TypeKind, TypeTable};
