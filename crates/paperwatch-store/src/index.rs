//! Cumulative report index.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Summary metadata the index keeps per report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub paper_count: usize,
    pub top_score: f64,
    /// Path of the report artifact, relative to the store root.
    pub path: String,
}

/// Map date → summary. At most one entry per date: writing an existing date
/// replaces the entry. A BTreeMap keeps the serialized form sorted, so
/// re-runs produce byte-identical files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportIndex {
    #[serde(default)]
    entries: BTreeMap<NaiveDate, ReportSummary>,
}

impl ReportIndex {
    pub fn upsert(&mut self, date: NaiveDate, summary: ReportSummary) {
        self.entries.insert(date, summary);
    }

    pub fn get(&self, date: NaiveDate) -> Option<&ReportSummary> {
        self.entries.get(&date)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.entries.keys().copied()
    }
}
