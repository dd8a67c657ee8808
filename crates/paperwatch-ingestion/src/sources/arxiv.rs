//! arXiv query API client.
//!
//! Endpoint: http://export.arxiv.org/api/query (Atom feed).
//!
//! arXiv has no "published on date D" filter; queries carry a
//! `submittedDate:[start TO end]` range aligned to the announcement cycle
//! via a configurable offset. Categories are organised in tiers: with
//! adaptive scope enabled, later tiers are only queried while the keyword
//! prefilter has not yet retained enough candidates.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, TimeDelta, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, instrument, warn};

use super::{FetchWindow, PreprintSource};
use crate::models::{Paper, PaperSource};
use crate::normalise::{canonicalise, RawRecord};
use crate::prefilter::KeywordPrefilter;

const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";

#[derive(Debug, Clone)]
pub struct ArxivOptions {
    /// Category tiers, queried in order. Tier 0 is always fetched.
    pub category_tiers: Vec<Vec<String>>,
    /// Optional free-text terms OR-ed into the query.
    pub query_terms: Vec<String>,
    pub max_results_per_category: usize,
    /// Hours added to midnight UTC of the target date when closing the
    /// submittedDate range (arXiv announces ahead of the calendar day).
    pub submitted_date_offset_hours: i64,
}

impl Default for ArxivOptions {
    fn default() -> Self {
        Self {
            category_tiers: vec![vec!["cs.CV".to_string()]],
            query_terms: vec![],
            max_results_per_category: 300,
            submitted_date_offset_hours: -6,
        }
    }
}

/// Stop querying further tiers once `min_candidates` papers would survive
/// the keyword prefilter.
pub struct AdaptiveScope {
    pub prefilter: KeywordPrefilter,
    pub min_candidates: usize,
    pub max_tiers: usize,
}

pub struct ArxivClient {
    client: reqwest::Client,
    options: ArxivOptions,
    adaptive: Option<AdaptiveScope>,
}

impl ArxivClient {
    pub fn new(options: ArxivOptions) -> Self {
        Self {
            client: reqwest::Client::new(),
            options,
            adaptive: None,
        }
    }

    pub fn with_adaptive_scope(mut self, scope: AdaptiveScope) -> Self {
        self.adaptive = Some(scope);
        self
    }

    #[instrument(skip(self))]
    async fn fetch_category(
        &self,
        category: &str,
        window: FetchWindow,
    ) -> anyhow::Result<Vec<Paper>> {
        let query = build_query(
            category,
            window,
            self.options.submitted_date_offset_hours,
            &self.options.query_terms,
        );
        debug!(%query, "arXiv query");

        let xml = self
            .client
            .get(ARXIV_API_URL)
            .query(&[
                ("search_query", query.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
                ("max_results", &self.options.max_results_per_category.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_atom(&xml)
    }
}

#[async_trait]
impl PreprintSource for ArxivClient {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    async fn fetch_window(&self, window: FetchWindow) -> anyhow::Result<Vec<Paper>> {
        let mut papers: Vec<Paper> = Vec::new();
        let mut seen_keys = std::collections::HashSet::new();
        let mut attempted = 0usize;
        let mut failed = 0usize;

        'tiers: for (tier, categories) in self.options.category_tiers.iter().enumerate() {
            if let Some(scope) = &self.adaptive {
                if tier >= scope.max_tiers {
                    break;
                }
            }

            for category in categories {
                attempted += 1;
                match self.fetch_category(category, window).await {
                    Ok(batch) => {
                        // The same paper can be cross-listed in several
                        // categories within one run.
                        for p in batch {
                            if seen_keys.insert(p.identity_key.clone()) {
                                papers.push(p);
                            }
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        warn!(category = %category, error = %e, "arXiv category query failed");
                    }
                }
            }

            if let Some(scope) = &self.adaptive {
                let candidates = papers
                    .iter()
                    .filter(|p| scope.prefilter.evaluate(p).accepted)
                    .count();
                if candidates >= scope.min_candidates {
                    debug!(tier, candidates, "adaptive scope satisfied");
                    break 'tiers;
                }
            }
        }

        if attempted > 0 && failed == attempted {
            anyhow::bail!("all {attempted} arXiv category queries failed");
        }

        Ok(papers)
    }
}

// ── Query construction ─────────────────────────────────────────────────────

fn fmt_submitted(date: NaiveDate, offset_hours: i64) -> String {
    let at_midnight = date.and_time(NaiveTime::MIN).and_utc();
    let shifted = at_midnight + TimeDelta::hours(offset_hours);
    shifted.format("%Y%m%d%H%M").to_string()
}

fn quote_term(term: &str) -> String {
    let t = term.replace('"', "\\\"");
    let t = t.trim();
    if t.is_empty() {
        return String::new();
    }
    if t.chars().any(char::is_whitespace) || t.contains([':', '-', '/']) {
        format!("all:\"{t}\"")
    } else {
        format!("all:{t}")
    }
}

/// Build the arXiv search expression for one category and window.
pub fn build_query(
    category: &str,
    window: FetchWindow,
    offset_hours: i64,
    query_terms: &[String],
) -> String {
    // Close the range at target-midnight + offset; open it one day before
    // the window start so the preceding announcement cycle is covered.
    let end = fmt_submitted(window.target, offset_hours);
    let start = fmt_submitted(window.start() - TimeDelta::days(1), offset_hours);

    let submitted = format!("submittedDate:[{start} TO {end}]");
    let cat = format!("cat:{category}");

    let terms: Vec<String> = query_terms
        .iter()
        .map(|t| quote_term(t))
        .filter(|t| !t.is_empty())
        .collect();

    if terms.is_empty() {
        format!("{cat} AND {submitted}")
    } else {
        format!("{cat} AND {submitted} AND ({})", terms.join(" OR "))
    }
}

// ── Atom parsing ───────────────────────────────────────────────────────────

/// `http://arxiv.org/abs/2401.00001v2` → `2401.00001`.
/// The version suffix is stripped so revisions keep one identity key.
fn short_id(entry_id: &str) -> Option<String> {
    let id = entry_id.rsplit("/abs/").next()?.trim();
    if id.is_empty() {
        return None;
    }
    match id.rfind('v') {
        Some(pos)
            if pos + 1 < id.len() && id[pos + 1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            Some(id[..pos].to_string())
        }
        _ => Some(id.to_string()),
    }
}

/// Parse the Atom feed returned by the query API into canonical papers.
/// Malformed entries are dropped with a warning.
pub fn parse_atom(xml: &str) -> anyhow::Result<Vec<Paper>> {
    let mut papers = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current: Option<RawRecord> = None;
    let mut in_id        = false;
    let mut in_title     = false;
    let mut in_summary   = false;
    let mut in_published = false;
    let mut in_name      = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"entry" => {
                    current = Some(RawRecord {
                        extra: serde_json::json!({}),
                        ..Default::default()
                    });
                }
                b"id"        if current.is_some() => in_id = true,
                b"title"     if current.is_some() => in_title = true,
                b"summary"   if current.is_some() => in_summary = true,
                b"published" if current.is_some() => in_published = true,
                b"name"      if current.is_some() => in_name = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                let Some(ref mut raw) = current else {
                    buf.clear();
                    continue;
                };
                match e.name().as_ref() {
                    b"category" => {
                        if let Some(term) = attr_value(e, b"term") {
                            raw.categories.push(term);
                        }
                    }
                    b"arxiv:primary_category" => {
                        if let Some(term) = attr_value(e, b"term") {
                            raw.extra["primary_category"] = term.into();
                        }
                    }
                    b"link" => {
                        if attr_value(e, b"title").as_deref() == Some("pdf") {
                            raw.pdf_url = attr_value(e, b"href");
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if let Some(ref mut raw) = current {
                    if in_id {
                        raw.native_id = short_id(&text);
                        raw.url = Some(text.clone());
                    }
                    if in_title {
                        raw.title = Some(text.clone());
                    }
                    if in_summary {
                        raw.abstract_text = Some(text.clone());
                    }
                    if in_published {
                        raw.published_date = chrono::DateTime::parse_from_rfc3339(&text)
                            .ok()
                            .map(|dt| dt.with_timezone(&Utc).date_naive());
                    }
                    if in_name {
                        raw.authors.push(text);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"id"        => in_id = false,
                b"title"     => in_title = false,
                b"summary"   => in_summary = false,
                b"published" => in_published = false,
                b"name"      => in_name = false,
                b"entry" => {
                    if let Some(raw) = current.take() {
                        match canonicalise(PaperSource::Arxiv, raw) {
                            Ok(p) => papers.push(p),
                            Err(reason) => warn!(%reason, "dropping malformed arXiv entry"),
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("Atom parse error: {e}");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(papers)
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query</title>
  <entry>
    <id>http://arxiv.org/abs/2506.01234v1</id>
    <published>2025-06-02T17:59:01Z</published>
    <title>Diffusion Models for
  Protein Design</title>
    <summary>We present a diffusion
  model for protein backbone generation.</summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="q-bio.BM"/>
    <category term="q-bio.BM"/>
    <category term="cs.LG"/>
    <link title="pdf" href="http://arxiv.org/pdf/2506.01234v1" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2506.09999v3</id>
    <published>2025-06-02T08:00:00Z</published>
    <title>Another Paper</title>
    <summary>Abstract text.</summary>
    <author><name>Grace Hopper</name></author>
    <category term="cs.CV"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2506.00000v1</id>
    <published>2025-06-02T08:00:00Z</published>
    <summary>Entry without a title is dropped.</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_feed() {
        let papers = parse_atom(FEED).unwrap();
        assert_eq!(papers.len(), 2);

        let p = &papers[0];
        assert_eq!(p.identity_key, "arxiv:2506.01234");
        assert_eq!(p.title, "Diffusion Models for Protein Design");
        assert_eq!(
            p.abstract_text,
            "We present a diffusion model for protein backbone generation."
        );
        assert_eq!(p.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(p.categories, vec!["q-bio.BM", "cs.LG"]);
        assert_eq!(p.pdf_url.as_deref(), Some("http://arxiv.org/pdf/2506.01234v1"));
        assert_eq!(p.extra["primary_category"], "q-bio.BM");
        assert_eq!(
            p.published_date,
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
        );
    }

    #[test]
    fn test_short_id_strips_version() {
        assert_eq!(
            short_id("http://arxiv.org/abs/2506.09999v3").as_deref(),
            Some("2506.09999")
        );
        assert_eq!(
            short_id("http://arxiv.org/abs/math.GT/0309136v1").as_deref(),
            Some("math.GT/0309136")
        );
        assert_eq!(short_id("http://arxiv.org/abs/2506.01234").as_deref(), Some("2506.01234"));
    }

    #[test]
    fn test_build_query_with_terms() {
        let window = FetchWindow::new(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(), 0);
        let q = build_query(
            "cs.CV",
            window,
            -6,
            &["segmentation".to_string(), "point cloud".to_string()],
        );
        assert!(q.starts_with("cat:cs.CV AND submittedDate:[202506081800 TO 202506091800]"));
        assert!(q.contains("all:segmentation OR all:\"point cloud\""));
    }

    #[test]
    fn test_build_query_without_terms() {
        let window = FetchWindow::new(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(), 1);
        let q = build_query("cs.CV", window, 0, &[]);
        assert_eq!(
            q,
            "cat:cs.CV AND submittedDate:[202506080000 TO 202506100000]"
        );
    }
}
