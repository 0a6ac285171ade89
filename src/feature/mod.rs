//! Sparse feature selection from a quantized gradient map.
//!
//! Candidates are strong local maxima of the gradient magnitude inside an
//! eroded mask. They are ranked by magnitude and then picked greedily under
//! a minimum spacing constraint so the selection covers the whole outline
//! instead of clustering on the strongest edge.

use crate::gradient::{bin_of_mask, QuantizedGradients};
use crate::image::ImageView;
use crate::util::{ShapeMatchError, ShapeMatchResult};
use serde::{Deserialize, Serialize};

/// One selected sample point: position, orientation bin and precise angle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Column offset (relative to the owning template once cropped).
    pub x: i32,
    /// Row offset (relative to the owning template once cropped).
    pub y: i32,
    /// Orientation bin in `0..8`.
    pub label: u8,
    /// Gradient direction in degrees `[0, 360)`.
    pub theta: f32,
}

impl Feature {
    /// Creates a feature with a zero angle.
    pub fn new(x: i32, y: i32, label: u8) -> Self {
        Self {
            x,
            y,
            label,
            theta: 0.0,
        }
    }
}

/// Parameters for feature selection at one pyramid level.
#[derive(Clone, Copy, Debug)]
pub struct SelectionParams {
    /// Number of features to pick.
    pub num_features: usize,
    /// Minimum gradient magnitude for candidates (not squared).
    pub strong_threshold: f32,
    /// Fewer selected points than this is reported as insufficient.
    pub min_features: usize,
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    x: i32,
    y: i32,
    label: u8,
    theta: f32,
    score: f32,
}

const NMS_RADIUS: usize = 2;

/// Collects candidate points: non-zero orientation, magnitude above the
/// strong threshold, inside the eroded mask and a 5x5 magnitude maximum.
fn collect_candidates(
    grads: &QuantizedGradients,
    mask: &[bool],
    strong_threshold: f32,
) -> Vec<Candidate> {
    let width = grads.width();
    let height = grads.height();
    let magnitude = grads.magnitude();
    let angle = grads.angle();
    let quantized = grads.quantized();
    let threshold_sq = strong_threshold * strong_threshold;

    let mut candidates = Vec::new();
    if width <= 2 * NMS_RADIUS || height <= 2 * NMS_RADIUS {
        return candidates;
    }

    let mut valid = magnitude.to_vec();
    for y in NMS_RADIUS..height - NMS_RADIUS {
        for x in NMS_RADIUS..width - NMS_RADIUS {
            let idx = y * width + x;
            if !mask[idx] || valid[idx] <= 0.0 {
                continue;
            }
            let score = magnitude[idx];
            let mut is_max = true;
            'window: for ny in y - NMS_RADIUS..=y + NMS_RADIUS {
                for nx in x - NMS_RADIUS..=x + NMS_RADIUS {
                    if (nx, ny) != (x, y) && score < magnitude[ny * width + nx] {
                        is_max = false;
                        break 'window;
                    }
                }
            }
            if !is_max {
                continue;
            }
            for ny in y - NMS_RADIUS..=y + NMS_RADIUS {
                for nx in x - NMS_RADIUS..=x + NMS_RADIUS {
                    if (nx, ny) != (x, y) {
                        valid[ny * width + nx] = 0.0;
                    }
                }
            }
            if score <= threshold_sq {
                continue;
            }
            if let Some(label) = bin_of_mask(quantized[idx]) {
                candidates.push(Candidate {
                    x: x as i32,
                    y: y as i32,
                    label,
                    theta: angle[idx],
                    score,
                });
            }
        }
    }
    candidates
}

/// Erodes a binary mask with a 3x3 cross-free square, replicating borders.
pub(crate) fn erode_mask(mask: ImageView<'_, u8>) -> Vec<bool> {
    let width = mask.width();
    let height = mask.height();
    let set = |x: usize, y: usize| mask.get(x, y).copied().unwrap_or(0) != 0;
    let mut out = vec![false; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut keep = true;
            'window: for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    if !set(nx, ny) {
                        keep = false;
                        break 'window;
                    }
                }
            }
            out[y * width + x] = keep;
        }
    }
    out
}

/// Picks up to `num_features` scattered candidates.
///
/// Spacing starts at `sqrt(bbox_area / num_features)` and shrinks by one
/// pixel per pass until enough points are accepted; once it drops below one
/// every remaining candidate is admitted.
fn select_scattered(candidates: &[Candidate], num_features: usize) -> Vec<Candidate> {
    if candidates.len() <= num_features {
        return candidates.to_vec();
    }

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
    for c in candidates {
        min_x = min_x.min(c.x);
        min_y = min_y.min(c.y);
        max_x = max_x.max(c.x);
        max_y = max_y.max(c.y);
    }
    let area = ((max_x - min_x + 1) as f32) * ((max_y - min_y + 1) as f32);
    let mut spacing = (area / num_features as f32).sqrt().max(1.0).floor();

    loop {
        let spacing_sq = spacing * spacing;
        let mut selected: Vec<Candidate> = Vec::with_capacity(num_features);
        for c in candidates {
            let far_enough = selected.iter().all(|s| {
                let dx = (s.x - c.x) as f32;
                let dy = (s.y - c.y) as f32;
                dx * dx + dy * dy >= spacing_sq
            });
            if far_enough {
                selected.push(*c);
                if selected.len() == num_features {
                    return selected;
                }
            }
        }
        if spacing <= 1.0 {
            // Candidates are distinct pixels, so spacing one admits them all.
            return selected;
        }
        spacing -= 1.0;
    }
}

/// Selects scattered features from a quantized gradient map.
///
/// The returned features use absolute image coordinates of `grads`. Fewer
/// than `num_features` points is a valid outcome; fewer than
/// `min_features` (at least one) yields `InsufficientFeatures`.
pub fn select_features(
    grads: &QuantizedGradients,
    mask: ImageView<'_, u8>,
    params: SelectionParams,
    level: usize,
) -> ShapeMatchResult<Vec<Feature>> {
    if mask.width() != grads.width() || mask.height() != grads.height() {
        return Err(ShapeMatchError::ShapeMismatch {
            image_width: grads.width(),
            image_height: grads.height(),
            mask_width: mask.width(),
            mask_height: mask.height(),
        });
    }
    if params.num_features == 0 {
        return Err(ShapeMatchError::InvalidInput("num_features must be > 0"));
    }

    let eroded = erode_mask(mask);
    let mut candidates = collect_candidates(grads, &eroded, params.strong_threshold);
    // Stable: equal magnitudes keep row-major scan order.
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let selected = select_scattered(&candidates, params.num_features);
    if selected.is_empty() || selected.len() < params.min_features.max(1) {
        return Err(ShapeMatchError::InsufficientFeatures { level });
    }

    Ok(selected
        .into_iter()
        .map(|c| Feature {
            x: c.x,
            y: c.y,
            label: c.label,
            theta: c.theta,
        })
        .collect())
}
