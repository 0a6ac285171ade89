//! Template scoring over response maps.
//!
//! A placement `(x, y)` puts the template's bounding box top-left at that
//! pixel of the level; each feature reads the response map of its
//! orientation at `(x + f.x, y + f.y)`.

use crate::response::{ResponseMaps, EXACT_RESPONSE};
use crate::template::Template;
use std::cmp::Ordering;

/// Features accumulated between two bound checks.
const BOUND_CHECK_INTERVAL: usize = 8;

/// Scored placement at one pyramid level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Placement {
    pub x: usize,
    pub y: usize,
    /// Sum of spread responses.
    pub score: u32,
}

/// Similarity in percent for a response sum over `num_features` features.
#[inline]
pub(crate) fn similarity(score: u32, num_features: usize) -> f32 {
    if num_features == 0 {
        return 0.0;
    }
    100.0 * score as f32 / (EXACT_RESPONSE as usize * num_features) as f32
}

/// Largest valid placement, or `None` when the template does not fit.
pub(crate) fn placement_range(maps: &ResponseMaps, templ: &Template) -> Option<(usize, usize)> {
    let width = usize::try_from(templ.width()).ok()?;
    let height = usize::try_from(templ.height()).ok()?;
    if width == 0 || height == 0 || width > maps.width() || height > maps.height() {
        return None;
    }
    Some((maps.width() - width, maps.height() - height))
}

/// Sum of spread responses at a placement, abandoned early once the
/// threshold can no longer be reached.
pub(crate) fn score_bounded(
    maps: &ResponseMaps,
    templ: &Template,
    x: usize,
    y: usize,
    threshold: f32,
) -> Option<u32> {
    let features = templ.features();
    let n = features.len();
    let mut sum = 0u32;
    for (i, f) in features.iter().enumerate() {
        sum += maps.response(f.label, x + f.x as usize, y + f.y as usize) as u32;
        let done = i + 1;
        if done % BOUND_CHECK_INTERVAL == 0 && done < n {
            let best_case = sum + ((n - done) as u32) * EXACT_RESPONSE as u32;
            if similarity(best_case, n) < threshold {
                return None;
            }
        }
    }
    (similarity(sum, n) >= threshold).then_some(sum)
}

/// Secondary ranking of equally scored placements: the unspread response
/// sum, then the summed edge strength under the features.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct TieBreak {
    pub exact: u32,
    pub strength: f32,
}

impl TieBreak {
    /// Orders keys so that the better placement compares greater.
    pub(crate) fn cmp_keys(&self, other: &TieBreak) -> Ordering {
        self.exact
            .cmp(&other.exact)
            .then_with(|| self.strength.total_cmp(&other.strength))
    }

    fn beats(&self, other: &TieBreak) -> bool {
        self.cmp_keys(other) == Ordering::Greater
    }
}

/// Tie-break keys of a placement.
pub(crate) fn tie_break(maps: &ResponseMaps, templ: &Template, x: usize, y: usize) -> TieBreak {
    let mut exact = 0u32;
    let mut strength = 0.0f32;
    for f in templ.features() {
        let fx = x + f.x as usize;
        let fy = y + f.y as usize;
        exact += maps.exact_response(f.label, fx, fy) as u32;
        strength += maps.strength(fx, fy);
    }
    TieBreak { exact, strength }
}

/// Best placement inside an inclusive window.
///
/// Ranked by spread score, then [`TieBreak`], then the first position in
/// row-major order.
pub(crate) fn best_in_window(
    maps: &ResponseMaps,
    templ: &Template,
    (x0, y0): (usize, usize),
    (x1, y1): (usize, usize),
    threshold: f32,
) -> Option<Placement> {
    let (max_x, max_y) = placement_range(maps, templ)?;
    let x1 = x1.min(max_x);
    let y1 = y1.min(max_y);
    if x0 > x1 || y0 > y1 {
        return None;
    }

    let mut best: Option<(Placement, TieBreak)> = None;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let Some(score) = score_bounded(maps, templ, x, y, threshold) else {
                continue;
            };
            let candidate = match best {
                Some((b, _)) if score < b.score => None,
                Some((b, b_tie)) if score == b.score => {
                    let tie = tie_break(maps, templ, x, y);
                    tie.beats(&b_tie).then_some(tie)
                }
                _ => Some(tie_break(maps, templ, x, y)),
            };
            if let Some(tie) = candidate {
                best = Some((Placement { x, y, score }, tie));
            }
        }
    }
    best.map(|(placement, _)| placement)
}

/// Scans every `stride`-th placement of a level and keeps those reaching
/// `threshold`.
pub(crate) fn coarse_scan(
    maps: &ResponseMaps,
    templ: &Template,
    stride: usize,
    threshold: f32,
) -> Vec<Placement> {
    let Some((max_x, max_y)) = placement_range(maps, templ) else {
        return Vec::new();
    };
    let stride = stride.max(1);
    let mut out = Vec::new();
    for y in (0..=max_y).step_by(stride) {
        for x in (0..=max_x).step_by(stride) {
            if let Some(score) = score_bounded(maps, templ, x, y, threshold) {
                out.push(Placement { x, y, score });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{best_in_window, coarse_scan, score_bounded, similarity};
    use crate::feature::Feature;
    use crate::response::ResponseMaps;
    use crate::template::Template;

    /// A 12x12 level with a horizontal-gradient edge at column 6.
    fn maps(t: usize) -> ResponseMaps {
        let width = 12;
        let height = 12;
        let mut quantized = vec![0u8; width * height];
        for y in 0..height {
            quantized[y * width + 6] = 1;
        }
        ResponseMaps::from_quantized(&quantized, width, height, t).unwrap()
    }

    fn column_template() -> Template {
        let features = (0..4).map(|y| Feature::new(1, y, 0)).collect();
        Template::new(3, 4, 0, 0, 0, features).unwrap()
    }

    #[test]
    fn similarity_is_a_percentage() {
        assert_eq!(similarity(16, 4), 100.0);
        assert_eq!(similarity(12, 4), 75.0);
        assert_eq!(similarity(0, 0), 0.0);
    }

    #[test]
    fn unspread_tie_break_finds_exact_placement() {
        let maps = maps(4);
        let templ = column_template();
        // Spread responses plateau for x in 2..=5; only x = 5 is exact.
        let best = best_in_window(&maps, &templ, (0, 0), (9, 0), 90.0).unwrap();
        assert_eq!((best.x, best.y, best.score), (5, 0, 16));
    }

    #[test]
    fn bounded_score_rejects_below_threshold() {
        let maps = maps(1);
        let templ = column_template();
        assert_eq!(score_bounded(&maps, &templ, 5, 0, 100.0), Some(16));
        assert_eq!(score_bounded(&maps, &templ, 0, 0, 50.0), None);
    }

    #[test]
    fn coarse_scan_visits_stride_grid() {
        let maps = maps(4);
        let templ = column_template();
        let hits = coarse_scan(&maps, &templ, 4, 90.0);
        assert!(hits.iter().all(|p| p.x % 4 == 0 && p.y % 4 == 0));
        assert!(hits.iter().any(|p| p.x == 4));
    }
}
