//! Deterministic ranking of scored papers.

use serde::{Deserialize, Serialize};

use paperwatch_ingestion::models::Paper;
use paperwatch_llm::scoring::ScoreResult;

/// A paper together with its LLM verdict, as persisted in a daily report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPaper {
    pub paper: Paper,
    pub score: ScoreResult,
}

/// Keep relevant papers and order them for the report.
///
/// Sort key: overall score descending, then published date descending, then
/// identity key ascending. The key chain is total, so the output is a pure
/// function of the input set — input order (and therefore scoring
/// completion order) cannot leak into the report.
pub fn rank(papers: Vec<ScoredPaper>) -> Vec<ScoredPaper> {
    let mut relevant: Vec<ScoredPaper> = papers
        .into_iter()
        .filter(|sp| sp.score.is_relevant)
        .collect();

    relevant.sort_by(|a, b| {
        b.score
            .overall_score
            .total_cmp(&a.score.overall_score)
            .then_with(|| b.paper.published_date.cmp(&a.paper.published_date))
            .then_with(|| a.paper.identity_key.cmp(&b.paper.identity_key))
    });

    relevant
}
