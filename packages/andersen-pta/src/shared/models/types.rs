//! Interned type arena for the module IR
//!
//! Types are structural: building the same shape twice yields the same
//! `TypeId`. All shape queries the analysis needs (pointer/array/struct
//! predicates, element and field types) are answered here.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Unique identifier of an interned type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub u32);

/// Structural kind of a type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    /// The empty type (function returns, opaque pointees)
    Void,

    /// Integer of the given bit width
    Int(u32),

    /// Function signature
    Function { params: Vec<TypeId>, ret: TypeId },

    /// Pointer to a pointee type
    Pointer(TypeId),

    /// Fixed-length array
    Array { element: TypeId, len: usize },

    /// Struct with ordered fields
    Struct { fields: Vec<TypeId> },
}

/// Interning arena for types
///
/// Owned by the [`Module`](crate::shared::models::Module); every `TypeId` in
/// the module resolves against this table.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TypeTable {
    kinds: Vec<TypeKind>,
    #[serde(skip)]
    interned: FxHashMap<TypeKind, TypeId>,
}

impl TypeTable {
    /// Create an empty type table
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.interned.get(&kind) {
            return id;
        }
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.interned.insert(kind, id);
        id
    }

    /// Intern the void type
    pub fn void(&mut self) -> TypeId {
        self.intern(TypeKind::Void)
    }

    /// Intern an integer type of the given bit width
    pub fn int(&mut self, bits: u32) -> TypeId {
        self.intern(TypeKind::Int(bits))
    }

    /// Intern a function type
    pub fn function(&mut self, params: Vec<TypeId>, ret: TypeId) -> TypeId {
        self.intern(TypeKind::Function { params, ret })
    }

    /// Intern a pointer type
    pub fn pointer(&mut self, pointee: TypeId) -> TypeId {
        self.intern(TypeKind::Pointer(pointee))
    }

    /// Intern a fixed-length array type
    pub fn array(&mut self, element: TypeId, len: usize) -> TypeId {
        self.intern(TypeKind::Array { element, len })
    }

    /// Intern a struct type with the given field types
    pub fn struct_of(&mut self, fields: Vec<TypeId>) -> TypeId {
        self.intern(TypeKind::Struct { fields })
    }

    /// Get the kind of an interned type
    ///
    /// Panics if `id` was not produced by this table.
    #[inline]
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.0 as usize]
    }

    /// Number of interned types
    #[inline]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Check if the table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    #[inline]
    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Pointer(_))
    }

    #[inline]
    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Array { .. })
    }

    #[inline]
    pub fn is_struct(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Struct { .. })
    }

    /// Check whether a type is an aggregate (array or struct)
    #[inline]
    pub fn is_aggregate(&self, id: TypeId) -> bool {
        self.is_array(id) || self.is_struct(id)
    }

    /// Pointee type of a pointer type
    ///
    /// Panics if `id` is not a pointer type.
    #[inline]
    pub fn pointee(&self, id: TypeId) -> TypeId {
        match self.kind(id) {
            TypeKind::Pointer(pointee) => *pointee,
            other => panic!("pointee() on non-pointer type {other:?}"),
        }
    }

    /// Element type of an array type
    ///
    /// Panics if `id` is not an array type.
    #[inline]
    pub fn array_element(&self, id: TypeId) -> TypeId {
        match self.kind(id) {
            TypeKind::Array { element, .. } => *element,
            other => panic!("array_element() on non-array type {other:?}"),
        }
    }

    /// Length of an array type
    ///
    /// Panics if `id` is not an array type.
    #[inline]
    pub fn array_len(&self, id: TypeId) -> usize {
        match self.kind(id) {
            TypeKind::Array { len, .. } => *len,
            other => panic!("array_len() on non-array type {other:?}"),
        }
    }

    /// Number of fields of a struct type
    ///
    /// Panics if `id` is not a struct type.
    #[inline]
    pub fn struct_field_count(&self, id: TypeId) -> usize {
        match self.kind(id) {
            TypeKind::Struct { fields } => fields.len(),
            other => panic!("struct_field_count() on non-struct type {other:?}"),
        }
    }

    /// Type of the i-th field of a struct type
    ///
    /// Panics if `id` is not a struct type or `i` is out of range.
    #[inline]
    pub fn struct_field(&self, id: TypeId, i: usize) -> TypeId {
        match self.kind(id) {
            TypeKind::Struct { fields } => fields[i],
            other => panic!("struct_field() on non-struct type {other:?}"),
        }
    }

    /// Number of value-tree children a node of this type spawns
    ///
    /// Arrays spawn one child per element, structs one per field, everything
    /// else (pointers included) none.
    pub fn child_count(&self, id: TypeId) -> usize {
        match self.kind(id) {
            TypeKind::Array { len, .. } => *len,
            TypeKind::Struct { fields } => fields.len(),
            _ => 0,
        }
    }

    /// Type of the i-th value-tree child of a node of this type
    ///
    /// Panics if the type has no i-th child.
    pub fn child_type(&self, id: TypeId, i: usize) -> TypeId {
        match self.kind(id) {
            TypeKind::Array { element, len } => {
                assert!(i < *len, "array child index {i} out of range ({len} elements)");
                *element
            }
            TypeKind::Struct { fields } => fields[i],
            other => panic!("child_type() on childless type {other:?}"),
        }
    }

    /// Render a type for diagnostics
    pub fn display(&self, id: TypeId) -> String {
        match self.kind(id) {
            TypeKind::Void => "void".to_string(),
            TypeKind::Int(bits) => format!("i{bits}"),
            TypeKind::Function { params, ret } => {
                let params: Vec<_> = params.iter().map(|p| self.display(*p)).collect();
                format!("{}({})", self.display(*ret), params.join(", "))
            }
            TypeKind::Pointer(pointee) => format!("ptr({})", self.display(*pointee)),
            TypeKind::Array { element, len } => {
                format!("[{} x {}]", len, self.display(*element))
            }
            TypeKind::Struct { fields } => {
                let fields: Vec<_> = fields.iter().map(|f| self.display(*f)).collect();
                format!("{{{}}}", fields.join(", "))
            }
        }
    }
}
