//! paperwatch-ranker — Overall-score aggregation and deterministic ranking.

pub mod weights;
pub mod rank;

pub use rank::{rank, ScoredPaper};
pub use weights::DimensionWeights;
