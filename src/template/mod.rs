//! Sparse templates: construction from pixels and shared cropping.
//!
//! A template pyramid holds one `Template` per detector pyramid level. All
//! levels share one bounding box expressed in level-0 pixels whose top-left
//! corner is aligned to `2^(levels - 1)`, so a placement found at level `l`
//! maps to exactly twice its coordinates at level `l - 1`.

use crate::feature::{select_features, Feature, SelectionParams};
use crate::gradient::quantize_gradients;
use crate::image::pyramid::{downsample_mask, downsample_u8};
use crate::image::{check_channels, check_mask, ImageView, OwnedImage};
use crate::util::{ShapeMatchError, ShapeMatchResult};
use serde::{Deserialize, Serialize};

pub mod rotate;

pub use rotate::{rotate_templates, Point2};

/// Sparse feature representation of one object pose at one pyramid level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Template {
    width: i32,
    height: i32,
    tl_x: i32,
    tl_y: i32,
    pyramid_level: usize,
    features: Vec<Feature>,
}

impl Template {
    /// Creates a template from features that are already relative to the
    /// bounding box, validating that every feature lies inside it.
    pub fn new(
        width: i32,
        height: i32,
        tl_x: i32,
        tl_y: i32,
        pyramid_level: usize,
        features: Vec<Feature>,
    ) -> ShapeMatchResult<Self> {
        let templ = Self {
            width,
            height,
            tl_x,
            tl_y,
            pyramid_level,
            features,
        };
        templ
            .check_invariants()
            .map_err(ShapeMatchError::InvalidInput)?;
        Ok(templ)
    }

    /// Bounding box width in pixels of this level.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Bounding box height in pixels of this level.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Bounding box left edge in the source image of this level.
    pub fn tl_x(&self) -> i32 {
        self.tl_x
    }

    /// Bounding box top edge in the source image of this level.
    pub fn tl_y(&self) -> i32 {
        self.tl_y
    }

    /// Pyramid level this template was extracted for.
    pub fn pyramid_level(&self) -> usize {
        self.pyramid_level
    }

    /// Features with coordinates relative to the bounding box.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub(crate) fn check_invariants(&self) -> Result<(), &'static str> {
        if self.features.is_empty() {
            return Err("template has no features");
        }
        if self.width <= 0 || self.height <= 0 {
            return Err("template bounding box is empty");
        }
        let inside = self
            .features
            .iter()
            .all(|f| f.x >= 0 && f.y >= 0 && f.x < self.width && f.y < self.height);
        if !inside {
            return Err("feature outside template bounding box");
        }
        if self.features.iter().any(|f| f.label >= 8) {
            return Err("feature orientation bin out of range");
        }
        Ok(())
    }
}

/// How a template pyramid came to exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Extracted from image pixels.
    #[default]
    Base,
    /// Obtained by rotating the features of another template of the class.
    Derived {
        /// Template id the rotation started from.
        source_id: usize,
        /// Rotation applied, in degrees.
        delta_angle: f32,
        /// Rotation center in level-0 source image coordinates.
        center: Point2,
    },
}

/// Templates for every pyramid level of one pose, plus their provenance.
#[derive(Clone, Debug, PartialEq)]
pub struct TemplatePyramid {
    templates: Vec<Template>,
    provenance: Provenance,
}

impl TemplatePyramid {
    pub(crate) fn new(templates: Vec<Template>, provenance: Provenance) -> Self {
        Self {
            templates,
            provenance,
        }
    }

    /// Templates ordered by pyramid level (level 0 first).
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Construction history of this pyramid.
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }
}

/// Parameters for building a template pyramid from pixels.
#[derive(Clone, Copy, Debug)]
pub struct BuildParams {
    /// Features selected at level 0; halved at every coarser level.
    pub num_features: usize,
    /// Number of pyramid levels.
    pub num_levels: usize,
    /// Magnitude floor for assigning an orientation.
    pub weak_threshold: f32,
    /// Magnitude floor for feature candidates.
    pub strong_threshold: f32,
    /// Minimum acceptable feature count per level.
    pub min_features: usize,
}

/// Builds one template per pyramid level from an image and its mask.
///
/// Returns `InsufficientFeatures` naming the first level without usable
/// features; no partial pyramid is produced.
pub fn build_templates(
    image: ImageView<'_, u8>,
    mask: ImageView<'_, u8>,
    params: BuildParams,
) -> ShapeMatchResult<Vec<Template>> {
    check_channels(image)?;
    check_mask(image, mask)?;
    if params.num_levels == 0 {
        return Err(ShapeMatchError::InvalidInput("at least one pyramid level"));
    }

    let mut level_image: Option<OwnedImage> = None;
    let mut level_mask: Option<OwnedImage> = None;
    let mut raw = Vec::with_capacity(params.num_levels);

    for level in 0..params.num_levels {
        let img = level_image.as_ref().map_or(image, |owned| owned.view());
        let msk = level_mask.as_ref().map_or(mask, |owned| owned.view());

        let grads = quantize_gradients(img, Some(msk), params.weak_threshold)?;
        let selection = SelectionParams {
            num_features: (params.num_features >> level).max(1),
            strong_threshold: params.strong_threshold,
            min_features: params.min_features,
        };
        let features = select_features(&grads, msk, selection, level)?;
        raw.push(Template {
            width: 0,
            height: 0,
            tl_x: 0,
            tl_y: 0,
            pyramid_level: level,
            features,
        });

        if level + 1 < params.num_levels {
            let next_image = downsample_u8(img)?;
            let next_mask = downsample_mask(msk)?;
            level_image = Some(next_image);
            level_mask = Some(next_mask);
        }
    }

    crop_templates(&mut raw);
    Ok(raw)
}

/// Recomputes the shared bounding box of a template pyramid.
///
/// Feature coordinates on input are absolute image coordinates of their
/// level; on output they are relative to the level's `tl`.
pub(crate) fn crop_templates(templates: &mut [Template]) {
    let max_level = templates.iter().map(|t| t.pyramid_level).max().unwrap_or(0);
    let align = 1i32 << max_level;

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
    for templ in templates.iter() {
        for f in &templ.features {
            let x = f.x << templ.pyramid_level;
            let y = f.y << templ.pyramid_level;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if min_x > max_x {
        return;
    }
    min_x = min_x.div_euclid(align) * align;
    min_y = min_y.div_euclid(align) * align;

    for templ in templates.iter_mut() {
        let level = templ.pyramid_level;
        templ.tl_x = min_x >> level;
        templ.tl_y = min_y >> level;
        templ.width = ((max_x - min_x) >> level) + 1;
        templ.height = ((max_y - min_y) >> level) + 1;
        for f in &mut templ.features {
            f.x -= templ.tl_x;
            f.y -= templ.tl_y;
        }
    }
}
