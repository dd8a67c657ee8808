//! Preprint source clients.

pub mod arxiv;
pub mod biorxiv;
pub mod chemrxiv;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

use crate::models::Paper;

/// Date window covered by one digest run: `[target - days_back, target]`.
#[derive(Debug, Clone, Copy)]
pub struct FetchWindow {
    pub target: NaiveDate,
    pub days_back: u32,
}

impl FetchWindow {
    pub fn new(target: NaiveDate, days_back: u32) -> Self {
        Self { target, days_back }
    }

    pub fn start(&self) -> NaiveDate {
        self.target - Duration::days(i64::from(self.days_back))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start() && date <= self.target
    }
}

/// Common interface for all preprint source clients.
///
/// Adapters translate their upstream's native query semantics into this
/// date-windowed contract; callers never see upstream-specific shapes.
/// An adapter error means "zero papers from this source" — the orchestrator
/// reports it and continues with the others.
#[async_trait]
pub trait PreprintSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch papers whose published date falls inside `window`.
    async fn fetch_window(&self, window: FetchWindow) -> anyhow::Result<Vec<Paper>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds_inclusive() {
        let target = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let w = FetchWindow::new(target, 2);
        assert_eq!(w.start(), NaiveDate::from_ymd_opt(2025, 6, 8).unwrap());
        assert!(w.contains(w.start()));
        assert!(w.contains(target));
        assert!(!w.contains(NaiveDate::from_ymd_opt(2025, 6, 7).unwrap()));
        assert!(!w.contains(NaiveDate::from_ymd_opt(2025, 6, 11).unwrap()));
    }
}
