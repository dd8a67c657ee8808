//! Read-only snapshot of previously reported papers.
//!
//! Loaded once at run start and handed to the deduplicator, so cross-run
//! dedup never reaches into shared mutable state mid-run.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{debug, warn};

use paperwatch_common::Result;

use crate::report::ReportStore;

#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
    seen: HashSet<String>,
}

impl HistorySnapshot {
    /// Collect identity keys from every report in the index except
    /// `exclude_date` — the run's own target date is never counted against
    /// itself, which is what makes a `force` re-run reproduce the same
    /// membership. A report file the index names but cannot be read is
    /// skipped with a warning; dedup degrades, the run does not die.
    pub fn load(store: &ReportStore, exclude_date: NaiveDate) -> Result<Self> {
        let index = store.load_index()?;
        let mut seen = HashSet::new();

        for date in index.dates() {
            if date == exclude_date {
                continue;
            }
            match store.load_report(date) {
                Ok(Some(report)) => {
                    seen.extend(report.papers.into_iter().map(|sp| sp.paper.identity_key));
                }
                Ok(None) => warn!(%date, "index references a missing report"),
                Err(e) => warn!(%date, error = %e, "skipping unreadable report"),
            }
        }

        debug!(keys = seen.len(), "history snapshot loaded");
        Ok(Self { seen })
    }

    pub fn seen_keys(&self) -> &HashSet<String> {
        &self.seen
    }

    pub fn contains(&self, identity_key: &str) -> bool {
        self.seen.contains(identity_key)
    }
}
