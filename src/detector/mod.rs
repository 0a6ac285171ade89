//! Template store and matching entry point.
//!
//! `Detector` keeps, per class id, an arena of template pyramids indexed by
//! template id. Training (`add_template`, `add_template_rotate`,
//! `read_classes`) takes `&mut self`; matching takes `&self`, so concurrent
//! matching only needs shared references and training excludes it.

mod persist;

pub use persist::ReadReport;

use crate::image::{check_channels, ImageView};
use crate::pose::PoseDocument;
use crate::response::build_response_pyramid;
use crate::search::{match_jobs, Match, MatchConfig, TemplateJob};
use crate::template::{build_templates, rotate_templates, BuildParams, Point2, Provenance};
use crate::template::{Template, TemplatePyramid};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{ShapeMatchError, ShapeMatchResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Template id within a class.
pub type TemplateId = usize;

/// Training and matching parameters shared by every class of a detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Features selected at full resolution; halved per pyramid level.
    pub num_features: usize,
    /// Spreading factor `T` of each pyramid level, finest first.
    pub pyramid: Vec<usize>,
    /// Gradient magnitude below which pixels carry no orientation.
    pub weak_threshold: f32,
    /// Gradient magnitude required for feature candidates.
    pub strong_threshold: f32,
    /// Fewer selected features than this rejects a template.
    pub min_features: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            num_features: 128,
            pyramid: vec![4, 8],
            weak_threshold: 30.0,
            strong_threshold: 60.0,
            min_features: 1,
        }
    }
}

impl DetectorConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> ShapeMatchResult<()> {
        if self.num_features == 0 {
            return Err(ShapeMatchError::InvalidInput("num_features must be > 0"));
        }
        if self.pyramid.is_empty() {
            return Err(ShapeMatchError::InvalidInput(
                "pyramid needs at least one level",
            ));
        }
        if self.pyramid.iter().any(|&t| t == 0) {
            return Err(ShapeMatchError::InvalidInput(
                "spreading factors must be > 0",
            ));
        }
        let thresholds = [self.weak_threshold, self.strong_threshold];
        if thresholds.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(ShapeMatchError::InvalidInput(
                "gradient thresholds must be finite and >= 0",
            ));
        }
        Ok(())
    }

    fn build_params(&self) -> BuildParams {
        BuildParams {
            num_features: self.num_features,
            num_levels: self.pyramid.len(),
            weak_threshold: self.weak_threshold,
            strong_threshold: self.strong_threshold,
            min_features: self.min_features,
        }
    }
}

/// Checks a pose document against a class holding `count` templates.
pub(crate) fn check_pose_records(
    poses: &PoseDocument,
    class_id: &str,
    count: usize,
) -> ShapeMatchResult<()> {
    let mismatch = |reason: String| ShapeMatchError::PersistenceMismatch {
        class_id: class_id.to_string(),
        reason,
    };
    if poses.class_id != class_id {
        return Err(mismatch(format!(
            "pose document belongs to class `{}`",
            poses.class_id
        )));
    }
    if let Some(record) = poses.records.iter().find(|r| r.template_id >= count) {
        return Err(mismatch(format!(
            "pose record references template {} but the class holds {count}",
            record.template_id
        )));
    }
    Ok(())
}

/// Shape-based template detector.
#[derive(Clone, Debug)]
pub struct Detector {
    config: DetectorConfig,
    classes: BTreeMap<String, Vec<TemplatePyramid>>,
}

impl Default for Detector {
    fn default() -> Self {
        Self {
            config: DetectorConfig::default(),
            classes: BTreeMap::new(),
        }
    }
}

impl Detector {
    /// Creates an empty detector after validating `config`.
    pub fn new(config: DetectorConfig) -> ShapeMatchResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            classes: BTreeMap::new(),
        })
    }

    /// Returns the detector configuration.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Number of pyramid levels every template pyramid carries.
    pub fn pyramid_levels(&self) -> usize {
        self.config.pyramid.len()
    }

    /// Registered class ids in ascending order.
    pub fn class_ids(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }

    /// Number of template pyramids stored for `class_id` (0 if unknown).
    pub fn num_templates(&self, class_id: &str) -> usize {
        self.classes.get(class_id).map_or(0, Vec::len)
    }

    /// Templates of one pyramid, level 0 first.
    pub fn get_templates(&self, class_id: &str, template_id: TemplateId) -> Option<&[Template]> {
        self.pyramid(class_id, template_id)
            .map(TemplatePyramid::templates)
    }

    /// How a stored pyramid was built.
    pub fn provenance(&self, class_id: &str, template_id: TemplateId) -> Option<Provenance> {
        self.pyramid(class_id, template_id)
            .map(TemplatePyramid::provenance)
    }

    fn pyramid(&self, class_id: &str, template_id: TemplateId) -> Option<&TemplatePyramid> {
        self.classes.get(class_id)?.get(template_id)
    }

    fn push_pyramid(&mut self, class_id: &str, pyramid: TemplatePyramid) -> TemplateId {
        let list = self.classes.entry(class_id.to_string()).or_default();
        list.push(pyramid);
        list.len() - 1
    }

    /// Extracts a template pyramid from `image` and appends it to `class_id`.
    ///
    /// Without a mask the whole image is used. Returns `InsufficientFeatures`
    /// (recoverable) when a pyramid level has no usable feature; the store is
    /// left unchanged in that case.
    pub fn add_template(
        &mut self,
        image: ImageView<'_, u8>,
        class_id: &str,
        mask: Option<ImageView<'_, u8>>,
    ) -> ShapeMatchResult<TemplateId> {
        let _span = trace_span!("add_template", class_id = class_id).entered();
        let full_mask;
        let mask = match mask {
            Some(mask) => mask,
            None => {
                full_mask = vec![255u8; image.width() * image.height()];
                ImageView::from_slice(&full_mask, image.width(), image.height())?
            }
        };

        let templates = match build_templates(image, mask, self.config.build_params()) {
            Ok(templates) => templates,
            Err(err) => {
                if err.is_recoverable() {
                    let reason = err.to_string();
                    trace_warn!(
                        "template_rejected",
                        class_id = class_id,
                        reason = reason.as_str()
                    );
                }
                return Err(err);
            }
        };
        let id = self.push_pyramid(class_id, TemplatePyramid::new(templates, Provenance::Base));
        trace_event!("template_added", template_id = id);
        Ok(id)
    }

    /// Appends a copy of template `source_id` rotated by `delta_angle`
    /// degrees about `center` (level-0 training image coordinates).
    pub fn add_template_rotate(
        &mut self,
        class_id: &str,
        source_id: TemplateId,
        delta_angle: f32,
        center: Point2,
    ) -> ShapeMatchResult<TemplateId> {
        if !delta_angle.is_finite() || !center.x.is_finite() || !center.y.is_finite() {
            return Err(ShapeMatchError::InvalidInput(
                "rotation angle and center must be finite",
            ));
        }
        let Some(class) = self.classes.get(class_id) else {
            trace_warn!("unknown_class", class_id = class_id);
            return Err(ShapeMatchError::UnknownClass {
                class_id: class_id.to_string(),
            });
        };
        let Some(source) = class.get(source_id) else {
            trace_warn!("unknown_template", class_id = class_id, template_id = source_id);
            return Err(ShapeMatchError::UnknownTemplate {
                class_id: class_id.to_string(),
                template_id: source_id,
            });
        };

        let rotated = rotate_templates(source.templates(), delta_angle, center);
        let provenance = Provenance::Derived {
            source_id,
            delta_angle,
            center,
        };
        Ok(self.push_pyramid(class_id, TemplatePyramid::new(rotated, provenance)))
    }

    /// Checks that every record of a pose document refers to a stored
    /// template of its class.
    pub fn check_poses(&self, poses: &PoseDocument) -> ShapeMatchResult<()> {
        let Some(class) = self.classes.get(&poses.class_id) else {
            return Err(ShapeMatchError::UnknownClass {
                class_id: poses.class_id.clone(),
            });
        };
        check_pose_records(poses, &poses.class_id, class.len())
    }

    /// Matches `image` against the requested classes with default options.
    ///
    /// An empty `class_ids` searches every class. Unknown classes contribute
    /// nothing.
    pub fn match_image<S: AsRef<str>>(
        &self,
        image: ImageView<'_, u8>,
        threshold: f32,
        class_ids: &[S],
    ) -> ShapeMatchResult<Vec<Match>> {
        self.match_image_with(image, threshold, class_ids, &MatchConfig::default())
    }

    /// Matches `image` with explicit matching options.
    pub fn match_image_with<S: AsRef<str>>(
        &self,
        image: ImageView<'_, u8>,
        threshold: f32,
        class_ids: &[S],
        config: &MatchConfig,
    ) -> ShapeMatchResult<Vec<Match>> {
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            return Err(ShapeMatchError::InvalidInput(
                "similarity threshold must be within [0, 100]",
            ));
        }
        config.validate()?;
        check_channels(image)?;
        let _span = trace_span!(
            "match",
            width = image.width(),
            height = image.height(),
            threshold = threshold
        )
        .entered();

        let jobs = self.collect_jobs(class_ids);
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        let shrink = self.pyramid_levels() - 1;
        if (image.width() >> shrink) == 0 || (image.height() >> shrink) == 0 {
            return Ok(Vec::new());
        }

        let levels =
            build_response_pyramid(image, self.config.weak_threshold, &self.config.pyramid)?;
        Ok(match_jobs(&levels, &jobs, threshold, config))
    }

    fn collect_jobs<S: AsRef<str>>(&self, class_ids: &[S]) -> Vec<TemplateJob<'_>> {
        let requested: BTreeSet<&str> = class_ids.iter().map(|id| id.as_ref()).collect();
        let mut jobs = Vec::new();
        for id in &requested {
            if !self.classes.contains_key(*id) {
                trace_warn!("unknown_class", class_id = *id);
            }
        }
        for (class_id, pyramids) in &self.classes {
            if !requested.is_empty() && !requested.contains(class_id.as_str()) {
                continue;
            }
            for (template_id, pyramid) in pyramids.iter().enumerate() {
                jobs.push(TemplateJob {
                    class_id,
                    template_id,
                    templates: pyramid.templates(),
                });
            }
        }
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::{Detector, DetectorConfig};
    use crate::image::OwnedImage;
    use crate::pose::{Pose, PoseDocument};
    use crate::template::{Point2, Provenance};
    use crate::util::ShapeMatchError;

    fn ring_image(size: usize) -> OwnedImage {
        let c = size as f32 / 2.0;
        let data = (0..size * size)
            .map(|i| {
                let dx = (i % size) as f32 - c;
                let dy = (i / size) as f32 - c;
                let r = (dx * dx + dy * dy).sqrt();
                if (12.0..22.0).contains(&r) || (dx > 4.0 && dy.abs() < 4.0 && r < 12.0) {
                    220
                } else {
                    0
                }
            })
            .collect();
        OwnedImage::new(data, size, size).unwrap()
    }

    fn detector() -> Detector {
        Detector::new(DetectorConfig {
            num_features: 48,
            ..DetectorConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn config_validation_rejects_bad_values() {
        assert!(DetectorConfig::default().validate().is_ok());
        for config in [
            DetectorConfig {
                num_features: 0,
                ..DetectorConfig::default()
            },
            DetectorConfig {
                pyramid: Vec::new(),
                ..DetectorConfig::default()
            },
            DetectorConfig {
                pyramid: vec![4, 0],
                ..DetectorConfig::default()
            },
            DetectorConfig {
                weak_threshold: f32::NAN,
                ..DetectorConfig::default()
            },
        ] {
            assert!(Detector::new(config).is_err());
        }
    }

    #[test]
    fn add_and_rotate_templates() {
        let mut det = detector();
        let img = ring_image(80);
        let id = det.add_template(img.view(), "ring", None).unwrap();
        assert_eq!(id, 0);
        let templates = det.get_templates("ring", id).unwrap();
        assert_eq!(templates.len(), 2);
        assert!(templates[0].features().len() <= 48);

        let center = Point2::new(40.0, 40.0);
        let rid = det.add_template_rotate("ring", id, 30.0, center).unwrap();
        assert_eq!(rid, 1);
        assert_eq!(det.num_templates("ring"), 2);
        assert_eq!(
            det.provenance("ring", rid),
            Some(Provenance::Derived {
                source_id: 0,
                delta_angle: 30.0,
                center,
            })
        );
        assert_eq!(det.class_ids(), vec!["ring".to_string()]);
    }

    #[test]
    fn unknown_references_are_recoverable_errors() {
        let mut det = detector();
        let err = det
            .add_template_rotate("nope", 0, 10.0, Point2::default())
            .unwrap_err();
        assert!(matches!(err, ShapeMatchError::UnknownClass { .. }));
        assert!(err.is_recoverable());

        let img = ring_image(80);
        det.add_template(img.view(), "ring", None).unwrap();
        let err = det
            .add_template_rotate("ring", 5, 10.0, Point2::default())
            .unwrap_err();
        assert_eq!(
            err,
            ShapeMatchError::UnknownTemplate {
                class_id: "ring".into(),
                template_id: 5,
            }
        );
        assert!(det.get_templates("ring", 5).is_none());
        assert!(det.get_templates("nope", 0).is_none());
    }

    #[test]
    fn blank_image_is_rejected_without_side_effects() {
        let mut det = detector();
        let blank = OwnedImage::zeros(64, 64, 1).unwrap();
        let err = det.add_template(blank.view(), "blank", None).unwrap_err();
        assert_eq!(err, ShapeMatchError::InsufficientFeatures { level: 0 });
        assert_eq!(det.num_templates("blank"), 0);
        assert!(det.class_ids().is_empty());
    }

    #[test]
    fn match_rejects_invalid_input_and_skips_unknown_classes() {
        let det = detector();
        let img = ring_image(64);
        let none: [&str; 0] = [];
        assert!(det.match_image(img.view(), 101.0, &none).is_err());
        assert!(det.match_image(img.view(), 80.0, &none).unwrap().is_empty());
        assert!(det.match_image(img.view(), 80.0, &["ghost"]).unwrap().is_empty());

        let two = OwnedImage::zeros(8, 8, 2).unwrap();
        let mut trained = detector();
        trained.add_template(img.view(), "ring", None).unwrap();
        let err = trained.match_image(two.view(), 80.0, &none).unwrap_err();
        assert_eq!(err, ShapeMatchError::UnsupportedChannels { channels: 2 });
    }

    #[test]
    fn pose_documents_are_checked_against_classes() {
        let mut det = detector();
        let img = ring_image(80);
        det.add_template(img.view(), "ring", None).unwrap();

        let mut doc = PoseDocument::new("ring", 80, 80);
        doc.push(Pose::new(0.0, 1.0), 0);
        assert!(det.check_poses(&doc).is_ok());
        doc.push(Pose::new(1.0, 1.0), 3);
        assert!(matches!(
            det.check_poses(&doc),
            Err(ShapeMatchError::PersistenceMismatch { .. })
        ));
        let other = PoseDocument::new("other", 80, 80);
        assert!(det.check_poses(&other).is_err());
    }
}
