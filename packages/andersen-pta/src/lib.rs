/*
 * andersen-pta - Andersen-style points-to analysis
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : IR models (types, module, instructions)
 * - features/    : the points_to vertical slice
 *                  (domain -> infrastructure -> application -> ports)
 *
 * The analysis is strictly sequential: construction, extraction and solving
 * run one after the other on the calling thread; after `run` the value tree
 * is read-only and safe to query from multiple threads.
 */

/// Shared models and utilities
pub mod shared;

/// Feature modules
pub mod features;

/// Error types
pub mod errors;

// Re-exports for the public API
pub use errors::{AndersenError, Result};
pub use features::points_to::{
    AnalysisConfig, AnalysisStats, AndersenPointsToAnalysis, NodeId, NodeKind, PointeeSet,
    PointerIndex, PointsToQuery, ValueTree, ValueTreeNode,
};
pub use shared::models::{
    ElementPtrIndex, Linkage, Module, TypeId, TypeKind, TypeTable, ValueId,
};
