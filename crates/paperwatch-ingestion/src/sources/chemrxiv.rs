//! ChemRxiv preprint client.
//!
//! ChemRxiv has no public listing API of its own; new preprints are found
//! through Crossref (works under the ChemRxiv DOI prefix, filtered by
//! publication date) and abstracts are backfilled from OpenAlex, which
//! stores them as an inverted index.
//!
//! Crossref etiquette: polite-pool User-Agent with a mailto.

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, instrument, warn};

use super::{FetchWindow, PreprintSource};
use crate::models::{Paper, PaperSource};
use crate::normalise::{canonicalise, RawRecord};

const USER_AGENT: &str = "paperwatch/0.1 (mailto:paperwatch@example.com)";

#[derive(Debug, Clone)]
pub struct ChemrxivOptions {
    pub doi_prefix: String,
    pub crossref_rows: usize,
    pub crossref_base_url: String,
    pub openalex_base_url: String,
}

impl Default for ChemrxivOptions {
    fn default() -> Self {
        Self {
            doi_prefix: "10.26434".to_string(),
            crossref_rows: 1000,
            crossref_base_url: "https://api.crossref.org".to_string(),
            openalex_base_url: "https://api.openalex.org".to_string(),
        }
    }
}

pub struct ChemrxivClient {
    client: reqwest::Client,
    options: ChemrxivOptions,
}

impl ChemrxivClient {
    pub fn new(options: ChemrxivOptions) -> Self {
        Self {
            client: reqwest::Client::new(),
            options,
        }
    }

    #[instrument(skip(self))]
    async fn crossref_works(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> anyhow::Result<Vec<serde_json::Value>> {
        let url = format!(
            "{}/works",
            self.options.crossref_base_url.trim_end_matches('/')
        );
        let filter = format!(
            "from-pub-date:{from},until-pub-date:{to},prefix:{}",
            self.options.doi_prefix
        );
        let resp: serde_json::Value = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(&[
                ("filter", filter.as_str()),
                ("rows", &self.options.crossref_rows.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp["message"]["items"].as_array().cloned().unwrap_or_default())
    }

    /// Look up a work on OpenAlex by DOI. Returns None on any non-success
    /// status; one missing enrichment only drops that record.
    #[instrument(skip(self))]
    async fn openalex_work(&self, doi: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let url = format!(
            "{}/works/https://doi.org/{doi}",
            self.options.openalex_base_url.trim_end_matches('/')
        );
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        Ok(Some(resp.json().await?))
    }
}

#[async_trait]
impl PreprintSource for ChemrxivClient {
    fn name(&self) -> &'static str {
        "chemrxiv"
    }

    async fn fetch_window(&self, window: FetchWindow) -> anyhow::Result<Vec<Paper>> {
        let works = self.crossref_works(window.start(), window.target).await?;
        debug!(n = works.len(), "Crossref works under ChemRxiv prefix");

        let mut papers = Vec::new();
        for work in &works {
            let doi = work["DOI"]
                .as_str()
                .map(|d| d.trim().to_lowercase())
                .unwrap_or_default();
            if doi.is_empty() {
                warn!("dropping Crossref work without DOI");
                continue;
            }

            let oa = match self.openalex_work(&doi).await {
                Ok(Some(oa)) => oa,
                Ok(None) => {
                    warn!(%doi, "OpenAlex lookup failed; skipping record");
                    continue;
                }
                Err(e) => {
                    warn!(%doi, error = %e, "OpenAlex request error; skipping record");
                    continue;
                }
            };

            match work_to_paper(&doi, work, &oa) {
                Ok(p) => papers.push(p),
                Err(reason) => warn!(%doi, %reason, "dropping malformed record"),
            }
        }

        Ok(papers)
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────

/// Rebuild an abstract from OpenAlex's inverted index (word → positions).
fn reconstruct_abstract(inverted: &serde_json::Value) -> String {
    let Some(map) = inverted.as_object() else {
        return String::new();
    };

    let mut positions: Vec<(u64, &str)> = Vec::new();
    for (word, indices) in map {
        for idx in indices.as_array().into_iter().flatten() {
            if let Some(i) = idx.as_u64() {
                positions.push((i, word.as_str()));
            }
        }
    }
    positions.sort_unstable();

    let words: Vec<&str> = positions.iter().map(|(_, w)| *w).collect();
    words.join(" ").trim().to_string()
}

fn work_to_paper(
    doi: &str,
    work: &serde_json::Value,
    oa: &serde_json::Value,
) -> Result<Paper, String> {
    let title = oa["title"]
        .as_str()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .or_else(|| {
            work["title"]
                .as_array()
                .and_then(|t| t.first())
                .and_then(|t| t.as_str())
                .map(String::from)
        });

    let authors: Vec<String> = oa["authorships"]
        .as_array()
        .unwrap_or(&vec![])
        .iter()
        .filter_map(|a| a["author"]["display_name"].as_str())
        .map(String::from)
        .collect();

    let published_date = oa["publication_date"]
        .as_str()
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok());

    canonicalise(
        PaperSource::ChemRxiv,
        RawRecord {
            native_id: Some(doi.to_string()),
            title,
            abstract_text: Some(reconstruct_abstract(&oa["abstract_inverted_index"])),
            authors,
            published_date,
            url: Some(format!("https://doi.org/{doi}")),
            pdf_url: None,
            categories: vec![],
            extra: serde_json::json!({ "doi": doi }),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstruct_abstract() {
        let inv = serde_json::json!({
            "electrocatalysis": [2],
            "We": [0],
            "study": [1],
            "here": [3]
        });
        assert_eq!(reconstruct_abstract(&inv), "We study electrocatalysis here");
        assert_eq!(reconstruct_abstract(&serde_json::Value::Null), "");
    }

    #[test]
    fn test_work_to_paper_prefers_openalex_title() {
        let work = serde_json::json!({ "title": ["Crossref Title"] });
        let oa = serde_json::json!({
            "title": "OpenAlex Title",
            "publication_date": "2025-06-03",
            "authorships": [
                { "author": { "display_name": "Marie Curie" } }
            ],
            "abstract_inverted_index": { "Short": [0], "abstract.": [1] }
        });
        let p = work_to_paper("10.26434/chemrxiv-2025-abc12", &work, &oa).unwrap();
        assert_eq!(p.identity_key, "doi:10.26434/chemrxiv-2025-abc12");
        assert_eq!(p.title, "OpenAlex Title");
        assert_eq!(p.abstract_text, "Short abstract.");
        assert_eq!(p.authors, vec!["Marie Curie"]);
        assert_eq!(p.url, "https://doi.org/10.26434/chemrxiv-2025-abc12");
    }

    #[test]
    fn test_work_to_paper_falls_back_to_crossref_title() {
        let work = serde_json::json!({ "title": ["Crossref Title"] });
        let oa = serde_json::json!({ "publication_date": "2025-06-03" });
        let p = work_to_paper("10.26434/chemrxiv-2025-xyz99", &work, &oa).unwrap();
        assert_eq!(p.title, "Crossref Title");
    }

    #[test]
    fn test_work_without_date_is_malformed() {
        let work = serde_json::json!({ "title": ["T"] });
        let oa = serde_json::json!({});
        assert!(work_to_paper("10.26434/x", &work, &oa).is_err());
    }
}
