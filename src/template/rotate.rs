//! Geometric rotation of sparse templates.
//!
//! Rotated variants are derived from an existing template pyramid by moving
//! each feature about a center point and shifting its orientation bin by the
//! same angle, instead of re-extracting features from a warped image. Positive
//! angles rotate counter-clockwise as displayed (image `y` axis pointing
//! down), matching `pose::render`.

use crate::feature::Feature;
use crate::gradient::bin_of_angle;
use crate::template::{crop_templates, Template};
use crate::util::math::{sin_cos_deg, wrap_deg_360};
use serde::{Deserialize, Serialize};

/// Point in level-0 image coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    /// Column coordinate.
    pub x: f32,
    /// Row coordinate.
    pub y: f32,
}

impl Point2 {
    /// Creates a point.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Rotates a template pyramid by `delta_angle` degrees about `center`.
///
/// The center is given in level-0 coordinates and halved for every coarser
/// level. Bounding boxes are recomputed afterwards; the source is untouched.
pub fn rotate_templates(src: &[Template], delta_angle: f32, center: Point2) -> Vec<Template> {
    let (sin_a, cos_a) = sin_cos_deg(delta_angle);
    let mut rotated: Vec<Template> = src
        .iter()
        .map(|templ| {
            let scale = 1.0 / (1u32 << templ.pyramid_level) as f32;
            let cx = center.x * scale;
            let cy = center.y * scale;
            let features = templ
                .features
                .iter()
                .map(|f| {
                    let dx = (f.x + templ.tl_x) as f32 - cx;
                    let dy = (f.y + templ.tl_y) as f32 - cy;
                    let x = (cos_a * dx + sin_a * dy + cx).round() as i32;
                    let y = (-sin_a * dx + cos_a * dy + cy).round() as i32;

                    let theta = wrap_deg_360(f.theta - delta_angle);
                    let shift = bin_of_angle(theta) as i32 - bin_of_angle(f.theta) as i32;
                    let label = (f.label as i32 + shift).rem_euclid(8) as u8;
                    Feature { x, y, label, theta }
                })
                .collect();
            Template {
                width: 0,
                height: 0,
                tl_x: 0,
                tl_y: 0,
                pyramid_level: templ.pyramid_level,
                features,
            }
        })
        .collect();

    crop_templates(&mut rotated);
    rotated
}
