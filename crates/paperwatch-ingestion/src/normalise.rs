//! Normalisation of raw upstream records into canonical [`Paper`]s.
//!
//! Every adapter funnels through [`canonicalise`], which fails closed: a
//! record missing its native id, title, or published date is rejected with a
//! reason and never becomes a `Paper`.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::models::{Paper, PaperSource};

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Collapse runs of whitespace (the arXiv Atom feed wraps titles and
/// abstracts with hard newlines) and trim.
pub fn fold_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Identity key for a source-native id.
///
/// arXiv ids get an `arxiv:` prefix; everything else is addressed by DOI,
/// lowercased so the key survives upstream case drift.
pub fn identity_key(source: PaperSource, native_id: &str) -> String {
    match source {
        PaperSource::Arxiv => format!("arxiv:{}", native_id.trim()),
        PaperSource::BioRxiv | PaperSource::ChemRxiv => {
            format!("doi:{}", native_id.trim().to_lowercase())
        }
    }
}

/// An upstream record as extracted by an adapter, before validation.
#[derive(Debug, Default, Clone)]
pub struct RawRecord {
    pub native_id: Option<String>,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub authors: Vec<String>,
    pub published_date: Option<NaiveDate>,
    pub url: Option<String>,
    pub pdf_url: Option<String>,
    pub categories: Vec<String>,
    pub extra: serde_json::Value,
}

/// Validate a raw record and build the canonical paper.
///
/// Returns the rejection reason on failure so the adapter can log the drop.
pub fn canonicalise(source: PaperSource, raw: RawRecord) -> Result<Paper, String> {
    let native_id = match raw.native_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err("missing native id".to_string()),
    };

    let title = raw
        .title
        .as_deref()
        .map(fold_whitespace)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| format!("missing title for {native_id}"))?;

    let published_date = raw
        .published_date
        .ok_or_else(|| format!("missing published date for {native_id}"))?;

    let key = identity_key(source, &native_id);
    let url = raw.url.unwrap_or_else(|| default_url(source, &native_id));

    Ok(Paper {
        identity_key: key,
        source,
        title,
        abstract_text: raw
            .abstract_text
            .as_deref()
            .map(fold_whitespace)
            .unwrap_or_default(),
        authors: raw
            .authors
            .into_iter()
            .map(|a| fold_whitespace(&a))
            .filter(|a| !a.is_empty())
            .collect(),
        published_date,
        url,
        pdf_url: raw.pdf_url,
        categories: raw.categories,
        extra: raw.extra,
    })
}

fn default_url(source: PaperSource, native_id: &str) -> String {
    match source {
        PaperSource::Arxiv => format!("https://arxiv.org/abs/{native_id}"),
        PaperSource::BioRxiv | PaperSource::ChemRxiv => {
            format!("https://doi.org/{native_id}")
        }
    }
}
