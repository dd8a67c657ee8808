//! Per-run accounting.
//!
//! Everything the failure policy absorbs (dead sources, dropped duplicates,
//! scoring failures) ends up here so the run can report what it did not do,
//! instead of silently shrinking the digest.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use paperwatch_llm::scoring::ScoringFailure;

#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source: String,
    pub fetched: usize,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub target_date: NaiveDate,
    pub days_back: u32,
    pub force: bool,
    /// True when an existing report short-circuited the run.
    pub skipped_existing: bool,
    pub sources: Vec<SourceOutcome>,
    pub fetched_total: usize,
    pub intra_run_duplicates: usize,
    pub cross_run_duplicates: usize,
    pub prefilter_rejected: usize,
    pub sent_to_llm: usize,
    pub scoring_failures: Vec<ScoringFailure>,
    pub judged_irrelevant: usize,
    pub reported: usize,
}

impl RunSummary {
    pub fn new(target_date: NaiveDate, days_back: u32, force: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            target_date,
            days_back,
            force,
            skipped_existing: false,
            sources: vec![],
            fetched_total: 0,
            intra_run_duplicates: 0,
            cross_run_duplicates: 0,
            prefilter_rejected: 0,
            sent_to_llm: 0,
            scoring_failures: vec![],
            judged_irrelevant: 0,
            reported: 0,
        }
    }

    pub fn record_source_ok(&mut self, source: &str, fetched: usize) {
        self.fetched_total += fetched;
        self.sources.push(SourceOutcome {
            source: source.to_string(),
            fetched,
            error: None,
        });
    }

    pub fn record_source_err(&mut self, source: &str, error: &anyhow::Error) {
        self.sources.push(SourceOutcome {
            source: source.to_string(),
            fetched: 0,
            error: Some(error.to_string()),
        });
    }

    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }

    /// Human-readable wrap-up, one log line per concern.
    pub fn log(&self) {
        if self.skipped_existing {
            info!(
                run_id = %self.run_id,
                date = %self.target_date,
                "report already exists; nothing to do (use --force to recompute)"
            );
            return;
        }

        for s in &self.sources {
            match &s.error {
                None => info!(source = %s.source, fetched = s.fetched, "source ok"),
                Some(e) => warn!(source = %s.source, error = %e, "source contributed nothing"),
            }
        }
        info!(
            fetched = self.fetched_total,
            intra_run_duplicates = self.intra_run_duplicates,
            cross_run_duplicates = self.cross_run_duplicates,
            prefilter_rejected = self.prefilter_rejected,
            sent_to_llm = self.sent_to_llm,
            "funnel before scoring"
        );
        for f in &self.scoring_failures {
            warn!(key = %f.identity_key, reason = %f.reason, "excluded from report");
        }
        info!(
            run_id = %self.run_id,
            date = %self.target_date,
            scoring_failures = self.scoring_failures.len(),
            judged_irrelevant = self.judged_irrelevant,
            reported = self.reported,
            "run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_source_tracks_totals_and_failures() {
        let mut s = RunSummary::new(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(), 1, false);
        s.record_source_ok("arxiv", 12);
        s.record_source_err("biorxiv", &anyhow::anyhow!("connect timeout"));
        s.record_source_ok("chemrxiv", 3);

        assert_eq!(s.fetched_total, 15);
        assert_eq!(s.failed_sources(), 1);
        assert_eq!(s.sources.len(), 3);
        assert_eq!(s.sources[1].error.as_deref(), Some("connect timeout"));
    }
}
