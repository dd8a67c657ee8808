//! Data models for the ingestion pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A candidate preprint after normalisation.
///
/// `identity_key` is stable across runs and derived from the source plus the
/// source-native id, never from the title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub identity_key: String,
    pub source: PaperSource,
    pub title: String,
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub published_date: NaiveDate,
    pub url: String,
    pub pdf_url: Option<String>,
    pub categories: Vec<String>,
    /// Opaque pass-through metadata retained for rendering only.
    #[serde(default)]
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSource {
    Arxiv,
    BioRxiv,
    ChemRxiv,
}

impl PaperSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperSource::Arxiv    => "arxiv",
            PaperSource::BioRxiv  => "biorxiv",
            PaperSource::ChemRxiv => "chemrxiv",
        }
    }

    /// Fixed precedence used when two sources return the same identity key:
    /// arXiv wins over bioRxiv, which wins over ChemRxiv.
    pub fn precedence(&self) -> u8 {
        match self {
            PaperSource::Arxiv    => 0,
            PaperSource::BioRxiv  => 1,
            PaperSource::ChemRxiv => 2,
        }
    }
}

impl std::fmt::Display for PaperSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        assert!(PaperSource::Arxiv.precedence() < PaperSource::BioRxiv.precedence());
        assert!(PaperSource::BioRxiv.precedence() < PaperSource::ChemRxiv.precedence());
    }

    #[test]
    fn test_source_serialises_lowercase() {
        let s = serde_json::to_string(&PaperSource::ChemRxiv).unwrap();
        assert_eq!(s, "\"chemrxiv\"");
    }
}
