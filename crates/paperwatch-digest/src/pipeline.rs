//! Pipeline orchestrator.
//!
//! Sequences fetch → dedup → prefilter → score → rank → persist and owns
//! the run-level failure policy: dead sources and per-paper scoring
//! failures are absorbed into the run summary; configuration errors, a run
//! with no reachable source at all, and persistence errors abort with a
//! non-zero outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures_util::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use paperwatch_common::{PaperwatchError, Result};
use paperwatch_ingestion::dedup::{dedup_cross_run, dedup_intra_run};
use paperwatch_ingestion::models::Paper;
use paperwatch_ingestion::prefilter::KeywordPrefilter;
use paperwatch_ingestion::sources::arxiv::{AdaptiveScope, ArxivClient, ArxivOptions};
use paperwatch_ingestion::sources::biorxiv::{BiorxivClient, BiorxivOptions};
use paperwatch_ingestion::sources::chemrxiv::{ChemrxivClient, ChemrxivOptions};
use paperwatch_ingestion::sources::{FetchWindow, PreprintSource};
use paperwatch_llm::backend::{LlmBackend, OpenAiCompatibleBackend};
use paperwatch_llm::cache::{CachedBackend, ResponseCache};
use paperwatch_llm::retry::RetryPolicy;
use paperwatch_llm::scoring::{ScoreEngine, ScoringOptions, SubScores};
use paperwatch_ranker::{rank, ScoredPaper};
use paperwatch_store::{DailyReport, HistorySnapshot, ReportStore};

use crate::config::Config;
use crate::summary::RunSummary;

/// Execute one digest run for `target_date`.
#[instrument(skip(config), fields(date = %target_date, days_back, force))]
pub async fn run(
    config: &Config,
    target_date: NaiveDate,
    days_back: u32,
    force: bool,
) -> Result<RunSummary> {
    config.validate().map_err(PaperwatchError::Config)?;
    let api_key = std::env::var(&config.llm.api_key_env)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            PaperwatchError::Config(format!(
                "missing API key env var: {}",
                config.llm.api_key_env
            ))
        })?;

    let mut summary = RunSummary::new(target_date, days_back, force);
    let store = ReportStore::new(&config.output.reports_dir);

    // Idempotence: without --force an existing report is left untouched and
    // the run is a no-op.
    if store.report_exists(target_date) && !force {
        summary.skipped_existing = true;
        summary.log();
        return Ok(summary);
    }

    let history = HistorySnapshot::load(&store, target_date)?;
    let prefilter = KeywordPrefilter::new(&config.filter.include, &config.filter.exclude);
    let sources = build_sources(config, &prefilter)?;
    let window = FetchWindow::new(target_date, days_back);
    let deadline = Instant::now() + Duration::from_secs(config.run.timeout_secs);

    // One task per source; results merged only after all have settled.
    let fetches = join_all(sources.iter().map(|source| async move {
        let result = match tokio::time::timeout_at(deadline, source.fetch_window(window)).await {
            Ok(r) => r,
            Err(_) => Err(anyhow::anyhow!("run timeout reached during fetch")),
        };
        (source.name(), result)
    }))
    .await;

    let mut papers: Vec<Paper> = Vec::new();
    for (name, result) in fetches {
        match result {
            Ok(batch) => {
                summary.record_source_ok(name, batch.len());
                papers.extend(batch);
            }
            Err(e) => summary.record_source_err(name, &e),
        }
    }
    if summary.failed_sources() == sources.len() {
        return Err(PaperwatchError::AllSourcesFailed);
    }

    let (papers, intra) = dedup_intra_run(papers);
    summary.intra_run_duplicates = intra;
    let (papers, cross) = dedup_cross_run(papers, history.seen_keys());
    summary.cross_run_duplicates = cross;
    info!(
        candidates = papers.len(),
        intra_run_duplicates = intra,
        cross_run_duplicates = cross,
        "deduplication done"
    );

    let mut accepted = Vec::new();
    for paper in papers {
        let verdict = prefilter.evaluate(&paper);
        if verdict.accepted {
            accepted.push(paper);
        } else {
            summary.prefilter_rejected += 1;
            debug!(key = %paper.identity_key, rule = ?verdict.rule, "prefilter rejected");
        }
    }
    summary.sent_to_llm = accepted.len();

    let engine = build_engine(config, api_key);
    let weights = config.scoring.weights;
    let aggregate = move |s: &SubScores| weights.overall_score(s);
    let outcome = engine.score_all(accepted, &aggregate, Some(deadline)).await;
    summary.scoring_failures = outcome.failures;

    let scored: Vec<ScoredPaper> = outcome
        .scored
        .into_iter()
        .map(|(paper, score)| ScoredPaper { paper, score })
        .collect();
    let scored_count = scored.len();
    let ranked = rank(scored);
    summary.judged_irrelevant = scored_count - ranked.len();
    summary.reported = ranked.len();

    // Report first, index second; a report failure leaves the index as it
    // was before the run.
    let report = DailyReport::new(target_date, ranked);
    store.publish(&report)?;

    summary.log();
    Ok(summary)
}

fn build_sources(
    config: &Config,
    prefilter: &KeywordPrefilter,
) -> Result<Vec<Box<dyn PreprintSource>>> {
    let cfg = &config.sources;
    let mut sources: Vec<Box<dyn PreprintSource>> = Vec::new();

    if cfg.arxiv.enabled {
        let mut client = ArxivClient::new(ArxivOptions {
            category_tiers: cfg.arxiv.category_tiers.clone(),
            query_terms: cfg.arxiv.query_terms.clone(),
            max_results_per_category: cfg.arxiv.max_results_per_category,
            submitted_date_offset_hours: cfg.arxiv.submitted_date_offset_hours,
        });
        if cfg.adaptive_scope.enabled {
            client = client.with_adaptive_scope(AdaptiveScope {
                prefilter: prefilter.clone(),
                min_candidates: cfg.adaptive_scope.min_candidates_after_prefilter,
                max_tiers: cfg.adaptive_scope.max_tiers,
            });
        }
        sources.push(Box::new(client));
    }

    if cfg.biorxiv.enabled {
        let client = BiorxivClient::new(BiorxivOptions {
            server: cfg.biorxiv.server.clone(),
            categories: cfg.biorxiv.categories.clone(),
        })
        .map_err(|e| PaperwatchError::Config(e.to_string()))?;
        sources.push(Box::new(client));
    }

    if cfg.chemrxiv.enabled {
        sources.push(Box::new(ChemrxivClient::new(ChemrxivOptions {
            doi_prefix: cfg.chemrxiv.doi_prefix.clone(),
            crossref_rows: cfg.chemrxiv.crossref_rows,
            crossref_base_url: cfg.chemrxiv.crossref_base_url.clone(),
            openalex_base_url: cfg.chemrxiv.openalex_base_url.clone(),
        })));
    }

    Ok(sources)
}

fn build_engine(config: &Config, api_key: String) -> ScoreEngine {
    let backend = OpenAiCompatibleBackend::new(
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        Some(api_key),
    );
    let cached: Arc<dyn LlmBackend> = Arc::new(CachedBackend::new(
        Arc::new(backend),
        ResponseCache::new(&config.llm.cache_dir),
    ));
    let retry = RetryPolicy {
        max_attempts: config.llm.max_attempts,
        base_delay: Duration::from_millis(config.llm.base_delay_ms),
        max_delay: Duration::from_millis(config.llm.max_delay_ms),
    };
    ScoreEngine::new(
        cached,
        retry,
        ScoringOptions {
            interests: config.filter.interests.clone(),
            batch_size: config.llm.batch_size,
            max_concurrent_batches: config.llm.max_concurrent_batches,
            max_abstract_chars: config.llm.max_abstract_chars,
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(reports_dir: &str, api_key_env: &str) -> Config {
        let mut cfg: Config = toml::from_str(&format!(
            r#"
[output]
reports_dir = "{reports_dir}"

[llm]
model = "test/model"
api_key_env = "{api_key_env}"

[filter]
interests = ["anything"]
"#
        ))
        .unwrap();
        cfg.run.timeout_secs = 5;
        cfg
    }

    #[test]
    fn test_build_sources_honours_enabled_flags() {
        let mut cfg = test_config("/tmp/unused", "UNUSED_KEY");
        let prefilter = KeywordPrefilter::new(&[], &[]);

        let all = build_sources(&cfg, &prefilter).unwrap();
        assert_eq!(all.len(), 3);

        cfg.sources.biorxiv.enabled = false;
        cfg.sources.chemrxiv.enabled = false;
        let only_arxiv = build_sources(&cfg, &prefilter).unwrap();
        assert_eq!(only_arxiv.len(), 1);
        assert_eq!(only_arxiv[0].name(), "arxiv");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_fatal_before_any_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path().to_str().unwrap(), "PAPERWATCH_TEST_ABSENT_KEY");
        std::env::remove_var("PAPERWATCH_TEST_ABSENT_KEY");

        let err = run(&cfg, NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(), 1, false)
            .await
            .unwrap_err();
        assert!(matches!(err, PaperwatchError::Config(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_existing_report_short_circuits_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path().to_str().unwrap(), "PAPERWATCH_TEST_KEY");
        std::env::set_var("PAPERWATCH_TEST_KEY", "sk-test");

        let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let store = ReportStore::new(dir.path());
        store.publish(&DailyReport::new(date, vec![])).unwrap();
        let index_before =
            std::fs::read_to_string(dir.path().join("index.json")).unwrap();

        // No sources are consulted: the run returns before any fetch, so a
        // test with no network succeeds.
        let summary = run(&cfg, date, 1, false).await.unwrap();
        assert!(summary.skipped_existing);
        assert_eq!(summary.sources.len(), 0);

        let index_after =
            std::fs::read_to_string(dir.path().join("index.json")).unwrap();
        assert_eq!(index_before, index_after);
    }
}
