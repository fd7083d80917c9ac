//! # Andersen-style points-to analysis
//!
//! Inclusion-based, flow-insensitive, field-sensitive pointer analysis:
//! - **Value tree**: one typed node per value and abstract memory object,
//!   with sub-nodes for every array element and struct field
//! - **Constraint extraction**: one pass lowering instructions into four
//!   inclusion constraint kinds (address-of, element/copy, load, store)
//! - **Fixpoint solver**: full-pass relaxation until no pointee set grows
//!
//! ## References
//! - Andersen, L. O. "Program Analysis and Specialization for C" (PhD 1994)
//! - Pearce et al. "Efficient Field-Sensitive Pointer Analysis" (CC 2004)

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

// Re-exports for public API
pub use application::{AnalysisConfig, AnalysisStats, AndersenPointsToAnalysis};
pub use domain::{
    ElementPtrEdge, NodeId, NodeKind, PointeeSet, Pointer, PointerIndex, ValueTree, ValueTreeNode,
};
pub use ports::PointsToQuery;
// Re-export infrastructure (internal use - prefer the application layer)
#[doc(hidden)]
pub use infrastructure::{PointsToSolver, SolverConfig, SolverStats};
