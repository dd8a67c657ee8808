//! Keyword prefilter — the cheap gate in front of the LLM stage.
//!
//! Purely local substring matching over title + abstract. Reject if any
//! exclude rule matches; otherwise accept when no include rules are
//! configured or at least one matches. This bounds LLM call volume and is
//! never the final relevance decision.

use serde::{Deserialize, Serialize};

use crate::models::Paper;
use crate::normalise::fold_whitespace;

/// Outcome of the prefilter for one paper, with the rule that decided it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefilterVerdict {
    pub accepted: bool,
    /// `exclude:<term>` or `include:<term>`; None when the decision fell
    /// through to a default (vacuous accept, or no include rule matched).
    pub rule: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct KeywordPrefilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl KeywordPrefilter {
    /// Terms are folded and lowercased once at construction; empty terms
    /// are discarded.
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        let fold = |terms: &[String]| -> Vec<String> {
            terms
                .iter()
                .map(|t| fold_whitespace(t).to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        };
        Self {
            include: fold(include),
            exclude: fold(exclude),
        }
    }

    /// True when no rules are configured and every paper passes.
    pub fn is_vacuous(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn evaluate(&self, paper: &Paper) -> PrefilterVerdict {
        let text = fold_whitespace(&format!("{} {}", paper.title, paper.abstract_text))
            .to_lowercase();

        if let Some(term) = self.exclude.iter().find(|t| text.contains(t.as_str())) {
            return PrefilterVerdict {
                accepted: false,
                rule: Some(format!("exclude:{term}")),
            };
        }

        if self.include.is_empty() {
            return PrefilterVerdict {
                accepted: true,
                rule: None,
            };
        }

        match self.include.iter().find(|t| text.contains(t.as_str())) {
            Some(term) => PrefilterVerdict {
                accepted: true,
                rule: Some(format!("include:{term}")),
            },
            None => PrefilterVerdict {
                accepted: false,
                rule: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperSource;
    use chrono::NaiveDate;

    fn paper(title: &str, abstract_text: &str) -> Paper {
        Paper {
            identity_key: "arxiv:2506.0001".into(),
            source: PaperSource::Arxiv,
            title: title.into(),
            abstract_text: abstract_text.into(),
            authors: vec![],
            published_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            url: String::new(),
            pdf_url: None,
            categories: vec![],
            extra: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_exclude_beats_include() {
        let f = KeywordPrefilter::new(
            &["diffusion".to_string()],
            &["survey".to_string()],
        );
        let v = f.evaluate(&paper("A Survey of Diffusion Models", "..."));
        assert!(!v.accepted);
        assert_eq!(v.rule.as_deref(), Some("exclude:survey"));
    }

    #[test]
    fn test_include_match_accepts() {
        let f = KeywordPrefilter::new(&["point cloud".to_string()], &[]);
        let v = f.evaluate(&paper("Learning on Point   Cloud data", ""));
        assert!(v.accepted);
        assert_eq!(v.rule.as_deref(), Some("include:point cloud"));
    }

    #[test]
    fn test_no_include_match_rejects() {
        let f = KeywordPrefilter::new(&["electrocatalysis".to_string()], &[]);
        let v = f.evaluate(&paper("Vision Transformers", "image classification"));
        assert!(!v.accepted);
        assert_eq!(v.rule, None);
    }

    #[test]
    fn test_vacuous_filter_accepts_by_default() {
        let f = KeywordPrefilter::new(&[], &[]);
        assert!(f.is_vacuous());
        assert!(f.evaluate(&paper("Anything", "at all")).accepted);
    }

    #[test]
    fn test_matches_in_abstract_too() {
        let f = KeywordPrefilter::new(&["zeolite".to_string()], &[]);
        assert!(f.evaluate(&paper("Catalyst design", "We study ZEOLITE frameworks")).accepted);
    }
}
