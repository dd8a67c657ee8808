//! Deduplication of fetched papers.
//!
//! Two passes, in order:
//! 1. intra-run — the same identity key returned twice within one fetch
//!    (cross-listed categories, or the same preprint on two servers);
//! 2. cross-run — keys already published in a prior daily report, supplied
//!    by the caller as a read-only history snapshot.

use std::collections::HashSet;

use crate::models::Paper;

/// Drop intra-run duplicates. When two records collide on identity key the
/// one from the higher-precedence source wins (arXiv > bioRxiv > ChemRxiv);
/// within a source, the record fetched first wins. Returns the survivors and
/// the number of dropped duplicates.
pub fn dedup_intra_run(mut papers: Vec<Paper>) -> (Vec<Paper>, usize) {
    // Stable sort: order within one source is preserved.
    papers.sort_by_key(|p| p.source.precedence());

    let before = papers.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(before);
    let mut out = Vec::with_capacity(before);
    for paper in papers {
        if seen.insert(paper.identity_key.clone()) {
            out.push(paper);
        }
    }
    let dropped = before - out.len();
    (out, dropped)
}

/// Drop papers whose identity key already appears in a previously published
/// report. The snapshot is loaded once at run start and never mutated here.
pub fn dedup_cross_run(papers: Vec<Paper>, seen_keys: &HashSet<String>) -> (Vec<Paper>, usize) {
    let before = papers.len();
    let out: Vec<Paper> = papers
        .into_iter()
        .filter(|p| !seen_keys.contains(&p.identity_key))
        .collect();
    let dropped = before - out.len();
    (out, dropped)
}
