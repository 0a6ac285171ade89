//! Deterministic ordering of matches.
//!
//! Raw matches are ranked with the tie-break keys of their level-0
//! placement so that, among equally similar placements found from different
//! coarse hits, the one with exact orientations is kept by suppression.

use crate::search::scan::TieBreak;
use crate::search::Match;
use std::cmp::Ordering;
use std::collections::HashSet;

/// A raw match with the tie-break keys of its placement.
#[derive(Clone, Debug)]
pub(crate) struct Ranked {
    pub detection: Match,
    pub tie: TieBreak,
}

/// Similarity descending, then class id, template id, row and column.
pub(crate) fn match_cmp(a: &Match, b: &Match) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.class_id.cmp(&b.class_id))
        .then_with(|| a.template_id.cmp(&b.template_id))
        .then_with(|| a.y.cmp(&b.y))
        .then_with(|| a.x.cmp(&b.x))
}

/// Similarity descending, then better tie-break keys, then [`match_cmp`].
pub(crate) fn rank_cmp(a: &Ranked, b: &Ranked) -> Ordering {
    b.detection
        .similarity
        .total_cmp(&a.detection.similarity)
        .then_with(|| b.tie.cmp_keys(&a.tie))
        .then_with(|| match_cmp(&a.detection, &b.detection))
}

/// Sorts matches into the reported order.
pub(crate) fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(match_cmp);
}

/// Ranks raw matches and drops repeated `(class, template, x, y)` entries,
/// keeping the best ranked one.
pub(crate) fn rank_matches(mut raw: Vec<Ranked>) -> Vec<Match> {
    raw.sort_by(rank_cmp);
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter(|r| {
            let m = &r.detection;
            seen.insert((m.class_id.clone(), m.template_id, m.x, m.y))
        })
        .map(|r| r.detection)
        .collect()
}
