//! Weight vector mapping sub-scores to the overall priority score.
//!
//! overall = Σ(wᵢ × sᵢ) / Σ(wᵢ)
//!
//! Weights are non-negative, so the overall score is monotonic
//! non-decreasing in every dimension, and the normalised form keeps it in
//! the same [1,10] range as the inputs.

use serde::{Deserialize, Serialize};

use paperwatch_llm::scoring::SubScores;

/// Per-dimension weights. Defaults favour relevance and penalise nothing;
/// override under `[scoring.weights]` in the config.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DimensionWeights {
    #[serde(default = "default_relevance")]
    pub relevance: f64,
    #[serde(default = "default_novelty")]
    pub novelty: f64,
    #[serde(default = "default_clarity")]
    pub clarity: f64,
    #[serde(default = "default_impact")]
    pub impact: f64,
}

fn default_relevance() -> f64 { 0.35 }
fn default_novelty()   -> f64 { 0.25 }
fn default_clarity()   -> f64 { 0.15 }
fn default_impact()    -> f64 { 0.25 }

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            relevance: default_relevance(),
            novelty:   default_novelty(),
            clarity:   default_clarity(),
            impact:    default_impact(),
        }
    }
}

impl DimensionWeights {
    pub fn as_array(&self) -> [f64; 4] {
        [self.relevance, self.novelty, self.clarity, self.impact]
    }

    /// All weights non-negative with a positive sum.
    pub fn validate(&self) -> bool {
        let arr = self.as_array();
        arr.iter().all(|w| *w >= 0.0) && arr.iter().sum::<f64>() > 0.0
    }

    /// Renormalise so the weights sum to 1.0.
    pub fn normalise(&mut self) {
        let sum: f64 = self.as_array().iter().sum();
        if sum > 0.0 {
            self.relevance /= sum;
            self.novelty   /= sum;
            self.clarity   /= sum;
            self.impact    /= sum;
        }
    }

    /// Weighted mean of the sub-scores.
    pub fn overall_score(&self, scores: &SubScores) -> f64 {
        let weights = self.as_array();
        let sum: f64 = weights.iter().sum();
        if sum <= 0.0 {
            return 0.0;
        }
        let weighted: f64 = scores
            .as_array()
            .iter()
            .zip(weights.iter())
            .map(|(s, w)| f64::from(*s) * w)
            .sum();
        weighted / sum
    }
}
