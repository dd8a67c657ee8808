//! Daily report artifact and the store that owns the output directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use paperwatch_common::{PaperwatchError, Result};
use paperwatch_ranker::ScoredPaper;

use crate::index::{ReportIndex, ReportSummary};

/// The persisted unit for one date. Papers are in ranker order; the file is
/// immutable once written except for whole-date overwrite under `force`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub papers: Vec<ScoredPaper>,
}

impl DailyReport {
    pub fn new(date: NaiveDate, papers: Vec<ScoredPaper>) -> Self {
        Self {
            date,
            generated_at: Utc::now(),
            papers,
        }
    }

    pub fn top_score(&self) -> f64 {
        self.papers
            .first()
            .map(|sp| sp.score.overall_score)
            .unwrap_or(0.0)
    }
}

/// Filesystem layout:
/// ```text
/// <root>/daily/<YYYY-MM-DD>.json
/// <root>/index.json
/// ```
#[derive(Debug, Clone)]
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn report_path(&self, date: NaiveDate) -> PathBuf {
        self.root.join("daily").join(format!("{date}.json"))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    pub fn report_exists(&self, date: NaiveDate) -> bool {
        self.report_path(date).is_file()
    }

    pub fn load_report(&self, date: NaiveDate) -> Result<Option<DailyReport>> {
        let path = self.report_path(date);
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| PaperwatchError::Persistence(format!("read {}: {e}", path.display())))?;
        let report = serde_json::from_str(&text)
            .map_err(|e| PaperwatchError::Persistence(format!("parse {}: {e}", path.display())))?;
        Ok(Some(report))
    }

    pub fn load_index(&self) -> Result<ReportIndex> {
        let path = self.index_path();
        if !path.is_file() {
            // First run: an absent index is an empty index.
            return Ok(ReportIndex::default());
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| PaperwatchError::Persistence(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| PaperwatchError::Persistence(format!("parse {}: {e}", path.display())))
    }

    /// Persist the report, then merge its summary into the index — in that
    /// order, so the index can never reference a report that was not fully
    /// written. Returns the summary that went into the index.
    #[instrument(skip_all, fields(date = %report.date, papers = report.papers.len()))]
    pub fn publish(&self, report: &DailyReport) -> Result<ReportSummary> {
        let path = self.report_path(report.date);
        let body = serde_json::to_string_pretty(report)
            .map_err(|e| PaperwatchError::Persistence(format!("serialize report: {e}")))?;
        write_atomic(&path, body.as_bytes())?;
        info!(path = %path.display(), "daily report written");

        let summary = ReportSummary {
            paper_count: report.papers.len(),
            top_score: report.top_score(),
            path: format!("daily/{}.json", report.date),
        };

        let mut index = self.load_index()?;
        index.upsert(report.date, summary.clone());
        let body = serde_json::to_string_pretty(&index)
            .map_err(|e| PaperwatchError::Persistence(format!("serialize index: {e}")))?;
        write_atomic(&self.index_path(), body.as_bytes())?;
        info!(dates = index.len(), "report index updated");

        Ok(summary)
    }
}

/// Write the whole payload to a temp file in the destination directory,
/// then rename over the target. A crash mid-write leaves the old file
/// intact, never a truncated one.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| PaperwatchError::Persistence(format!("no parent dir for {}", path.display())))?;
    fs::create_dir_all(dir)
        .map_err(|e| PaperwatchError::Persistence(format!("create {}: {e}", dir.display())))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| PaperwatchError::Persistence(format!("temp file in {}: {e}", dir.display())))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| PaperwatchError::Persistence(format!("write temp: {e}")))?;
    tmp.persist(path)
        .map_err(|e| PaperwatchError::Persistence(format!("rename into {}: {e}", path.display())))?;
    Ok(())
}
