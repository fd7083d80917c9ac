//! Application layer: the pass-like analysis facade

pub mod analysis;

pub use analysis::{AnalysisConfig, AnalysisStats, AndersenPointsToAnalysis};
