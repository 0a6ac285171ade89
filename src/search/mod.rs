//! Matching templates against response map pyramids.
//!
//! Every template pyramid is scanned at the coarsest level on a stride grid,
//! settled inside its grid cell, and refined level by level down to full
//! resolution. Surviving placements from all templates are deduplicated,
//! suppressed per class and sorted.

pub(crate) mod refine;
pub(crate) mod scan;

use crate::candidate::nms::nms_boxes;
use crate::candidate::order::{rank_matches, sort_matches, Ranked};
use crate::response::ResponseMaps;
use crate::template::Template;
use crate::trace::{trace_event, trace_span};
use crate::util::{ShapeMatchError, ShapeMatchResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use refine::{refine_to_base, settle_coarse};
use scan::{coarse_scan, similarity, tie_break};
use serde::{Deserialize, Serialize};

/// Axis-aligned box in image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

/// One detection.
///
/// `x`/`y` is the top-left placement of the matched level-0 template, so its
/// features sit at `(x + f.x, y + f.y)` in the image. `bbox` spans the
/// template at that placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Class of the matched template.
    pub class_id: String,
    /// Template id within the class.
    pub template_id: usize,
    /// Column of the template's top-left corner.
    pub x: i32,
    /// Row of the template's top-left corner.
    pub y: i32,
    /// Similarity in percent, `[0, 100]`.
    pub similarity: f32,
    /// Level-0 template bounding box in the image.
    pub bbox: BoundingBox,
}

/// Runtime options for matching.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Coarse scan stride; defaults to the coarsest spreading factor.
    pub stride: Option<usize>,
    /// IoU above which a weaker match of the same class is suppressed.
    /// `1.0` or more disables suppression.
    pub nms_overlap: f32,
    /// Enable rayon parallelism over templates (requires the `rayon` feature).
    pub parallel: bool,
    /// Keep at most this many matches after sorting.
    pub max_matches: Option<usize>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            stride: None,
            nms_overlap: 0.5,
            parallel: false,
            max_matches: None,
        }
    }
}

impl MatchConfig {
    /// Checks option ranges.
    pub fn validate(&self) -> ShapeMatchResult<()> {
        if self.stride == Some(0) {
            return Err(ShapeMatchError::InvalidInput("stride must be > 0"));
        }
        if !self.nms_overlap.is_finite() || self.nms_overlap < 0.0 {
            return Err(ShapeMatchError::InvalidInput("nms_overlap must be >= 0"));
        }
        Ok(())
    }
}

/// One template pyramid queued for matching.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TemplateJob<'a> {
    pub class_id: &'a str,
    pub template_id: usize,
    pub templates: &'a [Template],
}

fn match_template(
    levels: &[ResponseMaps],
    job: &TemplateJob<'_>,
    threshold: f32,
    stride: Option<usize>,
) -> Vec<Ranked> {
    let depth = levels.len().min(job.templates.len());
    let Some(top) = depth.checked_sub(1) else {
        return Vec::new();
    };
    let coarse_maps = &levels[top];
    let coarse_templ = &job.templates[top];
    let stride = stride.unwrap_or_else(|| coarse_maps.spread_t());

    let base = &job.templates[0];
    let num_features = base.features().len();
    let mut out = Vec::new();
    for hit in coarse_scan(coarse_maps, coarse_templ, stride, threshold) {
        let Some(settled) = settle_coarse(coarse_maps, coarse_templ, hit, stride, threshold)
        else {
            continue;
        };
        let Some(fine) = refine_to_base(&levels[..depth], job.templates, settled, threshold)
        else {
            continue;
        };
        let bbox = BoundingBox {
            x: fine.x as i32,
            y: fine.y as i32,
            width: base.width(),
            height: base.height(),
        };
        out.push(Ranked {
            detection: Match {
                class_id: job.class_id.to_string(),
                template_id: job.template_id,
                x: bbox.x,
                y: bbox.y,
                similarity: similarity(fine.score, num_features),
                bbox,
            },
            tie: tie_break(&levels[0], base, fine.x, fine.y),
        });
    }
    out
}

/// Matches every job against prepared response maps.
pub(crate) fn match_jobs(
    levels: &[ResponseMaps],
    jobs: &[TemplateJob<'_>],
    threshold: f32,
    config: &MatchConfig,
) -> Vec<Match> {
    let _span = trace_span!(
        "match_templates",
        templates = jobs.len(),
        parallel = config.parallel
    )
    .entered();

    #[cfg(feature = "rayon")]
    let raw: Vec<Ranked> = if config.parallel {
        jobs.par_iter()
            .map(|job| match_template(levels, job, threshold, config.stride))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    } else {
        jobs.iter()
            .flat_map(|job| match_template(levels, job, threshold, config.stride))
            .collect()
    };
    #[cfg(not(feature = "rayon"))]
    let raw: Vec<Ranked> = jobs
        .iter()
        .flat_map(|job| match_template(levels, job, threshold, config.stride))
        .collect();

    trace_event!("raw_matches", count = raw.len());
    let mut matches = nms_boxes(rank_matches(raw), config.nms_overlap);
    sort_matches(&mut matches);
    if let Some(limit) = config.max_matches {
        matches.truncate(limit);
    }
    trace_event!("matches", count = matches.len());
    matches
}
