//! paperwatch-store — Durable state of the digest.
//!
//! Exactly two persisted artifacts: a per-date report file and one
//! cumulative index. Both are replaced atomically (write-temp-then-rename),
//! and the index is only ever touched after the report write has succeeded.

pub mod report;
pub mod index;
pub mod history;

pub use history::HistorySnapshot;
pub use index::{ReportIndex, ReportSummary};
pub use report::{DailyReport, ReportStore};
