//! bioRxiv / medRxiv preprint client.
//!
//! Uses the bioRxiv REST API:
//!   https://api.biorxiv.org/details/{server}/{from}/{to}/{cursor}
//!
//! The API pages in blocks behind a numeric cursor; the adapter walks the
//! cursor until an empty collection comes back.

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, instrument, warn};

use super::{FetchWindow, PreprintSource};
use crate::models::{Paper, PaperSource};
use crate::normalise::{canonicalise, RawRecord};

const BIORXIV_API_BASE: &str = "https://api.biorxiv.org/details";

#[derive(Debug, Clone)]
pub struct BiorxivOptions {
    /// "biorxiv" or "medrxiv".
    pub server: String,
    /// Optional subject categories; empty keeps everything.
    pub categories: Vec<String>,
}

impl Default for BiorxivOptions {
    fn default() -> Self {
        Self {
            server: "biorxiv".to_string(),
            categories: vec![],
        }
    }
}

pub struct BiorxivClient {
    client: reqwest::Client,
    options: BiorxivOptions,
}

impl BiorxivClient {
    pub fn new(options: BiorxivOptions) -> anyhow::Result<Self> {
        let server = options.server.trim().to_lowercase();
        if server != "biorxiv" && server != "medrxiv" {
            anyhow::bail!("unsupported bioRxiv server: {}", options.server);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            options: BiorxivOptions {
                server,
                categories: options.categories,
            },
        })
    }

    fn landing_url(&self, doi: &str, version: &str) -> String {
        format!("https://www.{}.org/content/{doi}v{version}", self.options.server)
    }

    fn keeps_category(&self, category: &str) -> bool {
        if self.options.categories.is_empty() {
            return true;
        }
        self.options
            .categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category))
    }

    #[instrument(skip(self))]
    async fn fetch_page(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        cursor: usize,
    ) -> anyhow::Result<Vec<serde_json::Value>> {
        let url = format!(
            "{BIORXIV_API_BASE}/{}/{from}/{to}/{cursor}",
            self.options.server
        );
        let resp: serde_json::Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp["collection"].as_array().cloned().unwrap_or_default())
    }

    fn item_to_paper(&self, item: &serde_json::Value) -> Result<Paper, String> {
        let doi = item["doi"].as_str().map(str::trim).unwrap_or_default();
        let version = item["version"]
            .as_str()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("1");

        let authors: Vec<String> = item["authors"]
            .as_str()
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from)
            .collect();

        let published_date = item["date"]
            .as_str()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        let categories = item["category"]
            .as_str()
            .map(|c| vec![c.trim().to_string()])
            .unwrap_or_default();

        canonicalise(
            PaperSource::BioRxiv,
            RawRecord {
                native_id: Some(doi.to_string()),
                title: item["title"].as_str().map(String::from),
                abstract_text: item["abstract"].as_str().map(String::from),
                authors,
                published_date,
                url: Some(self.landing_url(doi, version)),
                pdf_url: Some(format!(
                    "https://www.{}.org/content/{doi}v{version}.full.pdf",
                    self.options.server
                )),
                categories,
                extra: serde_json::json!({
                    "doi": doi,
                    "version": version,
                    "server": self.options.server,
                    "type": item["type"],
                    "license": item["license"],
                }),
            },
        )
    }
}

#[async_trait]
impl PreprintSource for BiorxivClient {
    fn name(&self) -> &'static str {
        "biorxiv"
    }

    async fn fetch_window(&self, window: FetchWindow) -> anyhow::Result<Vec<Paper>> {
        let from = window.start();
        let to = window.target;

        let mut papers = Vec::new();
        let mut cursor = 0usize;
        loop {
            let items = self.fetch_page(from, to, cursor).await?;
            if items.is_empty() {
                break;
            }
            cursor += items.len();

            for item in &items {
                let category = item["category"].as_str().unwrap_or_default();
                if !self.keeps_category(category) {
                    continue;
                }
                match self.item_to_paper(item) {
                    Ok(p) => papers.push(p),
                    Err(reason) => {
                        warn!(server = %self.options.server, %reason, "dropping malformed record")
                    }
                }
            }
        }

        debug!(server = %self.options.server, fetched = papers.len(), "bioRxiv window fetched");
        Ok(papers)
    }
}
