//! Command-line arguments. Thin by design: everything interesting lives in
//! paperwatch.toml; the flags only pick the run's date window and force mode.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "paperwatch",
    version,
    about = "Fetch, filter, score, and persist a daily preprint digest."
)]
pub struct Args {
    /// Path to the config file (default: $PAPERWATCH_CONFIG, then ./paperwatch.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Target date, YYYY-MM-DD. Defaults to today (UTC).
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Override run.days_back from the config.
    #[arg(long)]
    pub days_back: Option<u32>,

    /// Recompute and overwrite an existing report for the target date.
    #[arg(long)]
    pub force: bool,
}
