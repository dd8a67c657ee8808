//! Relevance and scoring engine.
//!
//! Papers surviving the keyword prefilter are batched into LLM requests.
//! For each paper the model returns a relevance verdict, a short tldr, and
//! integer sub-scores on a fixed set of dimensions. The overall priority
//! score is NOT asked of the model; it is derived afterwards by the
//! aggregation function the caller supplies (see the ranker's weight
//! vector).

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use paperwatch_ingestion::models::Paper;

use crate::backend::{LlmBackend, LlmError, LlmRequest, Message};
use crate::retry::RetryPolicy;

/// The fixed scoring dimensions, each an integer in [1,10].
pub const SCORE_DIMENSIONS: [&str; 4] = ["relevance", "novelty", "clarity", "impact"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubScores {
    pub relevance: u8,
    pub novelty: u8,
    pub clarity: u8,
    pub impact: u8,
}

impl SubScores {
    pub fn as_array(&self) -> [u8; 4] {
        [self.relevance, self.novelty, self.clarity, self.impact]
    }

    pub fn in_range(&self) -> bool {
        self.as_array().iter().all(|s| (1..=10).contains(s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub is_relevant: bool,
    pub tldr: String,
    pub sub_scores: SubScores,
    /// Derived priority, monotonic non-decreasing in every sub-score.
    pub overall_score: f64,
}

/// A paper excluded from the report, with the reason on record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringFailure {
    pub identity_key: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ScoringOutcome {
    pub scored: Vec<(Paper, ScoreResult)>,
    pub failures: Vec<ScoringFailure>,
}

#[derive(Debug, Clone)]
pub struct ScoringOptions {
    /// Reader interests, verbatim in the prompt.
    pub interests: Vec<String>,
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
    pub max_abstract_chars: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            interests: vec![],
            batch_size: 15,
            max_concurrent_batches: 4,
            max_abstract_chars: 1600,
            max_tokens: 2048,
            temperature: 0.0,
        }
    }
}

pub struct ScoreEngine {
    backend: Arc<dyn LlmBackend>,
    retry: RetryPolicy,
    options: ScoringOptions,
}

impl ScoreEngine {
    pub fn new(backend: Arc<dyn LlmBackend>, retry: RetryPolicy, options: ScoringOptions) -> Self {
        Self {
            backend,
            retry,
            options,
        }
    }

    /// Score all papers. Batches run concurrently up to the configured
    /// limit; completion order is irrelevant because the ranker re-sorts.
    ///
    /// When a `deadline` is given, batches still in flight at the deadline
    /// are aborted and their papers recorded as retry-exhausted failures;
    /// batches that already completed keep their results.
    #[instrument(skip_all, fields(papers = papers.len()))]
    pub async fn score_all<F>(
        &self,
        papers: Vec<Paper>,
        aggregate: &F,
        deadline: Option<tokio::time::Instant>,
    ) -> ScoringOutcome
    where
        F: Fn(&SubScores) -> f64 + Sync,
    {
        if papers.is_empty() {
            return ScoringOutcome::default();
        }

        let batch_size = self.options.batch_size.max(1);
        let batches: Vec<Vec<Paper>> = papers
            .chunks(batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        let results: Vec<ScoringOutcome> = stream::iter(
            batches
                .into_iter()
                .map(|batch| self.score_batch_within(batch, aggregate, deadline)),
        )
        .buffer_unordered(self.options.max_concurrent_batches.max(1))
        .collect()
        .await;

        let mut outcome = ScoringOutcome::default();
        for r in results {
            outcome.scored.extend(r.scored);
            outcome.failures.extend(r.failures);
        }
        outcome
    }

    async fn score_batch_within<F>(
        &self,
        batch: Vec<Paper>,
        aggregate: &F,
        deadline: Option<tokio::time::Instant>,
    ) -> ScoringOutcome
    where
        F: Fn(&SubScores) -> f64 + Sync,
    {
        let Some(deadline) = deadline else {
            return self.score_batch(batch, aggregate).await;
        };

        let keys: Vec<String> = batch.iter().map(|p| p.identity_key.clone()).collect();
        match tokio::time::timeout_at(deadline, self.score_batch(batch, aggregate)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(papers = keys.len(), "run timeout reached before batch finished");
                ScoringOutcome {
                    scored: vec![],
                    failures: keys
                        .into_iter()
                        .map(|identity_key| ScoringFailure {
                            identity_key,
                            reason: "run timeout reached before scoring".to_string(),
                        })
                        .collect(),
                }
            }
        }
    }

    async fn score_batch<F>(&self, batch: Vec<Paper>, aggregate: &F) -> ScoringOutcome
    where
        F: Fn(&SubScores) -> f64 + Sync,
    {
        let mut outcome = ScoringOutcome::default();

        let prompt = self.batch_prompt(&batch);
        let label = format!("score-batch({})", batch.len());
        let response = match self.call_json(&label, prompt).await {
            Ok(obj) => obj,
            Err(err) => {
                // Retry budget for the whole batch is spent; record every
                // member rather than hammering a failing service per paper.
                warn!(error = %err, papers = batch.len(), "batch scoring failed");
                for paper in batch {
                    outcome.failures.push(ScoringFailure {
                        identity_key: paper.identity_key,
                        reason: format!("batch call failed: {err}"),
                    });
                }
                return outcome;
            }
        };

        let mut retry_individually = Vec::new();
        for paper in batch {
            match response
                .get(&paper.identity_key)
                .ok_or_else(|| "entry missing from batch response".to_string())
                .and_then(parse_entry)
            {
                Ok((is_relevant, tldr, sub_scores)) => {
                    let overall_score = aggregate(&sub_scores);
                    outcome.scored.push((
                        paper,
                        ScoreResult {
                            is_relevant,
                            tldr,
                            sub_scores,
                            overall_score,
                        },
                    ));
                }
                Err(reason) => {
                    debug!(key = %paper.identity_key, %reason, "batch entry invalid; retrying individually");
                    retry_individually.push(paper);
                }
            }
        }

        for paper in retry_individually {
            match self.score_single(&paper).await {
                Ok((is_relevant, tldr, sub_scores)) => {
                    let overall_score = aggregate(&sub_scores);
                    outcome.scored.push((
                        paper,
                        ScoreResult {
                            is_relevant,
                            tldr,
                            sub_scores,
                            overall_score,
                        },
                    ));
                }
                Err(reason) => {
                    warn!(key = %paper.identity_key, %reason, "scoring failed; paper excluded");
                    outcome.failures.push(ScoringFailure {
                        identity_key: paper.identity_key,
                        reason,
                    });
                }
            }
        }

        outcome
    }

    async fn score_single(&self, paper: &Paper) -> Result<(bool, String, SubScores), String> {
        let prompt = self.batch_prompt(std::slice::from_ref(paper));
        let label = format!("score-single({})", paper.identity_key);
        let response = self
            .call_json(&label, prompt)
            .await
            .map_err(|e| e.to_string())?;
        response
            .get(&paper.identity_key)
            .ok_or_else(|| "entry missing from response".to_string())
            .and_then(parse_entry)
    }

    async fn call_json(&self, label: &str, prompt: String) -> Result<serde_json::Value, LlmError> {
        let req = LlmRequest {
            messages: vec![Message::user(prompt)],
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        };
        self.retry
            .run(label, || {
                let req = req.clone();
                async move {
                    let resp = self.backend.complete(req).await?;
                    extract_json_object(&resp.content).map_err(LlmError::MalformedOutput)
                }
            })
            .await
    }

    fn batch_prompt(&self, papers: &[Paper]) -> String {
        let items: Vec<serde_json::Value> = papers
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.identity_key,
                    "title": p.title,
                    "abstract": truncate_chars(&p.abstract_text, self.options.max_abstract_chars),
                })
            })
            .collect();

        format!(
            "Interests: {interests}\n\n\
             You are triaging newly published preprints against the interests above.\n\
             Return JSON only, English only: one object mapping each item id to\n\
             {{\"relevant\": true|false, \"tldr\": \"\", \"scores\": {{\"relevance\": 0, \"novelty\": 0, \"clarity\": 0, \"impact\": 0}}}}\n\
             Constraints: \"relevant\" is true only if the paper is primarily about any \
             interest; scores are integers 1-10; the TLDR is at most 240 characters.\n\n\
             Items:\n{items}",
            interests = self.options.interests.join("; "),
            items = serde_json::Value::Array(items),
        )
    }
}

// ── Output parsing ─────────────────────────────────────────────────────────

/// Pull a JSON object out of a model reply that may be fenced or surrounded
/// by prose.
pub fn extract_json_object(text: &str) -> Result<serde_json::Value, String> {
    let s = text.trim();

    if s.contains("```") {
        for part in s.split("```") {
            let part = part.trim();
            let part = part.strip_prefix("json").map(str::trim).unwrap_or(part);
            if part.starts_with('{') && part.ends_with('}') {
                if let Ok(v) = serde_json::from_str(part) {
                    return Ok(v);
                }
            }
        }
    }

    if s.starts_with('{') && s.ends_with('}') {
        if let Ok(v) = serde_json::from_str(s) {
            return Ok(v);
        }
    }

    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if end > start => serde_json::from_str(&s[start..=end])
            .map_err(|e| format!("invalid JSON object: {e}")),
        _ => Err("no JSON object found in model output".to_string()),
    }
}

/// Validate one per-paper entry. Scores are validated strictly for relevant
/// papers; an irrelevant verdict is accepted without the full score block
/// since the ranker drops it either way.
fn parse_entry(entry: &serde_json::Value) -> Result<(bool, String, SubScores), String> {
    let is_relevant = match &entry["relevant"] {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_i64() == Some(1),
        serde_json::Value::String(s) => matches!(s.to_lowercase().as_str(), "1" | "true"),
        _ => return Err("missing or non-boolean \"relevant\" field".to_string()),
    };

    let tldr = entry["tldr"].as_str().unwrap_or("").trim().to_string();

    if !is_relevant {
        let sub_scores = read_scores(&entry["scores"]).unwrap_or(SubScores {
            relevance: 1,
            novelty: 1,
            clarity: 1,
            impact: 1,
        });
        return Ok((false, tldr, sub_scores));
    }

    if tldr.is_empty() {
        return Err("relevant entry without a tldr".to_string());
    }
    let sub_scores = read_scores(&entry["scores"])?;
    Ok((true, tldr, sub_scores))
}

fn read_scores(scores: &serde_json::Value) -> Result<SubScores, String> {
    let dim = |name: &str| -> Result<u8, String> {
        let v = scores[name]
            .as_i64()
            .ok_or_else(|| format!("missing integer score \"{name}\""))?;
        if !(1..=10).contains(&v) {
            return Err(format!("score \"{name}\" out of range: {v}"));
        }
        Ok(v as u8)
    };
    Ok(SubScores {
        relevance: dim("relevance")?,
        novelty: dim("novelty")?,
        clarity: dim("clarity")?,
        impact: dim("impact")?,
    })
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LlmResponse;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use paperwatch_ingestion::models::PaperSource;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    fn paper(key: &str) -> Paper {
        Paper {
            identity_key: key.to_string(),
            source: PaperSource::Arxiv,
            title: format!("Title for {key}"),
            abstract_text: "An abstract.".to_string(),
            authors: vec![],
            published_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            url: String::new(),
            pdf_url: None,
            categories: vec![],
            extra: serde_json::Value::Null,
        }
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn mean(s: &SubScores) -> f64 {
        s.as_array().iter().map(|&v| f64::from(v)).sum::<f64>() / 4.0
    }

    /// Backend that replays a scripted sequence of responses.
    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<String, ()>>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<&str, ()>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(
                    script
                        .into_iter()
                        .map(|r| r.map(String::from))
                        .collect(),
                ),
            })
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn complete(&self, _req: LlmRequest) -> Result<LlmResponse, LlmError> {
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted backend ran out of responses");
            match next {
                Ok(content) => Ok(LlmResponse {
                    content,
                    model: "scripted".into(),
                    prompt_tokens: 0,
                    completion_tokens: 0,
                }),
                Err(()) => Err(LlmError::Api {
                    status: 503,
                    message: "scripted outage".into(),
                }),
            }
        }
        fn model_id(&self) -> &str {
            "scripted"
        }
    }

    fn engine(backend: Arc<ScriptedBackend>) -> ScoreEngine {
        ScoreEngine::new(
            backend,
            quick_retry(),
            ScoringOptions {
                interests: vec!["protein design".into()],
                batch_size: 10,
                max_concurrent_batches: 2,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_extract_json_object_variants() {
        let bare = r#"{"a": 1}"#;
        assert_eq!(extract_json_object(bare).unwrap()["a"], 1);

        let fenced = "Here you go:\n```json\n{\"a\": 2}\n```";
        assert_eq!(extract_json_object(fenced).unwrap()["a"], 2);

        let embedded = "Sure! The answer is {\"a\": 3} as requested.";
        assert_eq!(extract_json_object(embedded).unwrap()["a"], 3);

        assert!(extract_json_object("no json here").is_err());
    }

    #[test]
    fn test_parse_entry_rejects_out_of_range() {
        let entry = serde_json::json!({
            "relevant": true,
            "tldr": "ok",
            "scores": { "relevance": 11, "novelty": 5, "clarity": 5, "impact": 5 }
        });
        assert!(parse_entry(&entry).is_err());
    }

    #[test]
    fn test_parse_entry_accepts_loose_relevant_encodings() {
        for v in [serde_json::json!(1), serde_json::json!("true")] {
            let entry = serde_json::json!({
                "relevant": v,
                "tldr": "ok",
                "scores": { "relevance": 5, "novelty": 5, "clarity": 5, "impact": 5 }
            });
            assert!(parse_entry(&entry).unwrap().0);
        }
    }

    #[test]
    fn test_truncate_chars_is_utf8_safe() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("ααααα", 3), "ααα...");
    }

    #[tokio::test]
    async fn test_batch_happy_path() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{
            "arxiv:1": {"relevant": true,  "tldr": "Uses diffusion for proteins.",
                        "scores": {"relevance": 9, "novelty": 8, "clarity": 7, "impact": 8}},
            "arxiv:2": {"relevant": false, "tldr": "",
                        "scores": {"relevance": 2, "novelty": 3, "clarity": 5, "impact": 2}}
        }"#)]);
        let outcome = engine(backend)
            .score_all(vec![paper("arxiv:1"), paper("arxiv:2")], &mean, None)
            .await;

        assert_eq!(outcome.scored.len(), 2);
        assert!(outcome.failures.is_empty());
        let (_, r1) = outcome
            .scored
            .iter()
            .find(|(p, _)| p.identity_key == "arxiv:1")
            .unwrap();
        assert!(r1.is_relevant);
        assert_eq!(r1.sub_scores.relevance, 9);
        assert!((r1.overall_score - 8.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_records_failure() {
        // Retry budget is 3; the service never recovers.
        let backend = ScriptedBackend::new(vec![Err(()), Err(()), Err(())]);
        let outcome = engine(backend).score_all(vec![paper("arxiv:1")], &mean, None).await;

        assert!(outcome.scored.is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].identity_key, "arxiv:1");
        assert!(outcome.failures[0].reason.contains("batch call failed"));
    }

    #[tokio::test]
    async fn test_invalid_entry_falls_back_to_single_call() {
        let backend = ScriptedBackend::new(vec![
            // Batch response: arxiv:1 fine, arxiv:2 missing its tldr.
            Ok(r#"{
                "arxiv:1": {"relevant": true, "tldr": "Fine.",
                            "scores": {"relevance": 6, "novelty": 6, "clarity": 6, "impact": 6}},
                "arxiv:2": {"relevant": true, "tldr": "",
                            "scores": {"relevance": 7, "novelty": 7, "clarity": 7, "impact": 7}}
            }"#),
            // Individual retry for arxiv:2 succeeds.
            Ok(r#"{
                "arxiv:2": {"relevant": true, "tldr": "Recovered.",
                            "scores": {"relevance": 7, "novelty": 7, "clarity": 7, "impact": 7}}
            }"#),
        ]);
        let outcome = engine(backend)
            .score_all(vec![paper("arxiv:1"), paper("arxiv:2")], &mean, None)
            .await;

        assert_eq!(outcome.scored.len(), 2);
        assert!(outcome.failures.is_empty());
        let (_, r2) = outcome
            .scored
            .iter()
            .find(|(p, _)| p.identity_key == "arxiv:2")
            .unwrap();
        assert_eq!(r2.tldr, "Recovered.");
    }

    #[tokio::test]
    async fn test_malformed_json_is_retried() {
        let backend = ScriptedBackend::new(vec![
            Ok("I could not produce JSON, sorry."),
            Ok(r#"{"arxiv:1": {"relevant": false, "tldr": "", "scores": {"relevance": 1, "novelty": 1, "clarity": 1, "impact": 1}}}"#),
        ]);
        let outcome = engine(backend).score_all(vec![paper("arxiv:1")], &mean, None).await;
        assert_eq!(outcome.scored.len(), 1);
        assert!(!outcome.scored[0].1.is_relevant);
    }

    /// Backend that never answers; only a deadline gets rid of it.
    struct HangingBackend;

    #[async_trait]
    impl LlmBackend for HangingBackend {
        async fn complete(&self, _req: LlmRequest) -> Result<LlmResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(LlmError::Unavailable("hung".into()))
        }
        fn model_id(&self) -> &str {
            "hanging"
        }
    }

    #[tokio::test]
    async fn test_deadline_excludes_unscored_papers() {
        let engine = ScoreEngine::new(
            Arc::new(HangingBackend),
            quick_retry(),
            ScoringOptions::default(),
        );
        let deadline = tokio::time::Instant::now() + Duration::from_millis(10);
        let outcome = engine
            .score_all(
                vec![paper("arxiv:1"), paper("arxiv:2")],
                &mean,
                Some(deadline),
            )
            .await;

        assert!(outcome.scored.is_empty());
        assert_eq!(outcome.failures.len(), 2);
        assert!(outcome.failures[0].reason.contains("timeout"));
    }
}
