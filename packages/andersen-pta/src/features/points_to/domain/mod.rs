//! Domain model of the points-to analysis

pub mod assignment;
pub mod pointer;
pub mod value_tree;

pub use assignment::{ElementPtrEdge, PointerIndex};
pub use pointer::{PointeeSet, Pointer};
pub use value_tree::{NodeId, NodeKind, ValueTree, ValueTreeNode};
