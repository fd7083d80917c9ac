//! Infrastructure: extraction and solving engines

pub mod extractor;
pub mod solver;

pub use extractor::{extract, ExtractionStats};
pub use solver::{PointsToSolver, SolverConfig, SolverStats};
