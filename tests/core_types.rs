use shapematch::{
    Detector, DetectorConfig, ImageView, Match, MatchConfig, OwnedImage, PoseConfig, Sampling,
    ShapeMatchError,
};

#[test]
fn image_view_rejects_invalid_dimensions() {
    let data = [0u8; 4];

    let err = ImageView::from_slice(&data, 0, 1).err().unwrap();
    assert_eq!(
        err,
        ShapeMatchError::InvalidDimensions {
            width: 0,
            height: 1,
        }
    );

    let err = ImageView::from_slice(&data, 1, 0).err().unwrap();
    assert_eq!(
        err,
        ShapeMatchError::InvalidDimensions {
            width: 1,
            height: 0,
        }
    );
}

#[test]
fn image_view_rejects_invalid_stride() {
    let data = [0u8; 8];

    let err = ImageView::new(&data, 4, 1, 1, 3).err().unwrap();
    assert_eq!(
        err,
        ShapeMatchError::InvalidStride {
            row_len: 4,
            stride: 3,
        }
    );

    let err = ImageView::new(&data, 2, 2, 3, 6).err().unwrap();
    assert_eq!(err, ShapeMatchError::BufferTooSmall { needed: 12, got: 8 });
}

#[test]
fn detector_config_fills_defaults_from_json() {
    let config: DetectorConfig = serde_json::from_str(r#"{"num_features": 63}"#).unwrap();
    assert_eq!(config.num_features, 63);
    assert_eq!(config.pyramid, vec![4, 8]);
    assert_eq!(config.weak_threshold, 30.0);
    assert_eq!(config.strong_threshold, 60.0);

    let bad = DetectorConfig {
        pyramid: vec![],
        ..DetectorConfig::default()
    };
    assert!(Detector::new(bad).is_err());
}

#[test]
fn pose_config_parses_externally_tagged_sampling() {
    let json = r#"{"angles":{"range":{"min":0,"max":360,"step":1}},"scales":{"fixed":1.0}}"#;
    let config: PoseConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.angles, Sampling::range(0.0, 360.0, 1.0));
    assert_eq!(config.scales, Sampling::Fixed(1.0));
    assert_eq!(config.angles.angle_values().unwrap().len(), 360);

    let listed: PoseConfig = serde_json::from_str(r#"{"scales":{"list":[0.5,1.0]}}"#).unwrap();
    assert_eq!(listed.angles, Sampling::Fixed(0.0));
    assert_eq!(listed.scales.values().unwrap(), vec![0.5, 1.0]);

    let negative: PoseConfig = serde_json::from_str(r#"{"scales":{"fixed":-1.0}}"#).unwrap();
    assert!(matches!(
        negative.validate(),
        Err(ShapeMatchError::InvalidSampling { .. })
    ));
}

#[test]
fn match_config_and_matches_serialize() {
    let config: MatchConfig = serde_json::from_str(r#"{"max_matches": 3}"#).unwrap();
    assert_eq!(config.max_matches, Some(3));
    assert_eq!(config.nms_overlap, 0.5);
    assert!(!config.parallel);

    let json = r#"{"class_id":"gear","template_id":2,"x":-3,"y":4,"similarity":91.5,
        "bbox":{"x":5,"y":6,"width":20,"height":10}}"#;
    let m: Match = serde_json::from_str(json).unwrap();
    assert_eq!(m.class_id, "gear");
    assert_eq!((m.x, m.y), (-3, 4));
    assert_eq!(m.bbox.width, 20);
}

#[test]
fn featureless_images_are_rejected_without_side_effects() {
    let flat = OwnedImage::new(vec![90u8; 64 * 64], 64, 64).unwrap();
    let mut det = Detector::default();
    let err = det.add_template(flat.view(), "flat", None).unwrap_err();
    assert!(matches!(err, ShapeMatchError::InsufficientFeatures { level: 0 }));
    assert!(err.is_recoverable());
    assert_eq!(det.num_templates("flat"), 0);
    assert!(det.class_ids().is_empty());
}

#[test]
fn mask_must_match_image_shape() {
    let img = OwnedImage::new(vec![0u8; 32 * 32], 32, 32).unwrap();
    let mask = OwnedImage::new(vec![255u8; 16 * 16], 16, 16).unwrap();
    let mut det = Detector::default();
    let err = det
        .add_template(img.view(), "c", Some(mask.view()))
        .unwrap_err();
    assert!(matches!(err, ShapeMatchError::ShapeMismatch { .. }));
}

#[test]
fn thresholds_outside_percent_range_are_rejected() {
    let det = Detector::default();
    let data = vec![0u8; 32 * 32];
    let img = ImageView::from_slice(&data, 32, 32).unwrap();
    let none: [&str; 0] = [];
    assert!(det.match_image(img, 101.0, &none).is_err());
    assert!(det.match_image(img, -1.0, &none).is_err());
    assert!(det.match_image(img, 50.0, &none).unwrap().is_empty());
}
