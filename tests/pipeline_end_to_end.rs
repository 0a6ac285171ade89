//! End-to-end matching of synthetic scenes containing a trained shape.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shapematch::{Detector, DetectorConfig, ImageView, Match, MatchConfig, OwnedImage};

const TRAIN_SIZE: usize = 96;

/// L-shaped bracket with a disk, asymmetric under rotation and translation.
fn draw_shape() -> OwnedImage {
    let mut data = vec![0u8; TRAIN_SIZE * TRAIN_SIZE];
    for y in 0..TRAIN_SIZE {
        for x in 0..TRAIN_SIZE {
            let horizontal = (20..70).contains(&x) && (24..36).contains(&y);
            let vertical = (20..32).contains(&x) && (24..72).contains(&y);
            let dx = x as f32 - 56.0;
            let dy = y as f32 - 58.0;
            let disk = dx * dx + dy * dy <= 81.0;
            if horizontal || vertical || disk {
                data[y * TRAIN_SIZE + x] = 210;
            }
        }
    }
    OwnedImage::new(data, TRAIN_SIZE, TRAIN_SIZE).unwrap()
}

fn paste(target: &mut [u8], target_width: usize, src: &OwnedImage, x0: usize, y0: usize) {
    for y in 0..src.height() {
        let row = &src.data()[y * src.width()..(y + 1) * src.width()];
        let start = (y0 + y) * target_width + x0;
        target[start..start + src.width()].copy_from_slice(row);
    }
}

fn scene(width: usize, height: usize, x0: usize, y0: usize) -> Vec<u8> {
    let mut data = vec![0u8; width * height];
    // Unrelated clutter.
    for y in 120..170 {
        for x in 180..230 {
            data[y * width + x] = 120;
        }
    }
    paste(&mut data, width, &draw_shape(), x0, y0);
    data
}

fn trained() -> Detector {
    let mut det = Detector::new(DetectorConfig::default()).unwrap();
    let shape = draw_shape();
    let id = det.add_template(shape.view(), "bracket", None).unwrap();
    assert_eq!(id, 0);
    det
}

fn iou(a: &Match, b: &Match) -> f32 {
    let (a, b) = (a.bbox, b.bbox);
    let w = ((a.x + a.width).min(b.x + b.width) - a.x.max(b.x)).max(0);
    let h = ((a.y + a.height).min(b.y + b.height) - a.y.max(b.y)).max(0);
    let inter = (w * h) as f32;
    inter / ((a.width * a.height + b.width * b.height) as f32 - inter)
}

#[test]
fn templates_respect_feature_budget_and_bounds() {
    let det = trained();
    let templates = det.get_templates("bracket", 0).unwrap();
    assert_eq!(templates.len(), 2);
    for (level, templ) in templates.iter().enumerate() {
        assert!(templ.features().len() <= 128 >> level);
        for f in templ.features() {
            assert!(f.x >= 0 && f.x < templ.width());
            assert!(f.y >= 0 && f.y < templ.height());
            assert!(f.label < 8);
        }
    }
}

#[test]
fn exact_copy_is_found_at_its_offset() {
    let det = trained();
    let (width, height) = (256, 192);
    let data = scene(width, height, 64, 48);
    let image = ImageView::from_slice(&data, width, height).unwrap();

    let matches = det.match_image(image, 90.0, &["bracket"]).unwrap();
    let best = matches.first().expect("no match found");
    let templ = &det.get_templates("bracket", 0).unwrap()[0];
    assert_eq!((best.x, best.y), (64 + templ.tl_x(), 48 + templ.tl_y()));
    assert_eq!(best.template_id, 0);
    assert!(best.similarity >= 90.0, "similarity {}", best.similarity);
    assert_eq!((best.bbox.x, best.bbox.y), (best.x, best.y));
    assert_eq!(best.bbox.width, templ.width());

    // Features land on the pasted shape's edges.
    let on_edge = templ
        .features()
        .iter()
        .filter(|f| {
            let x = (best.x + f.x) as usize;
            let y = (best.y + f.y) as usize;
            let v = data[y * width + x];
            let neighbours = [
                data[y * width + x - 1],
                data[y * width + x + 1],
                data[(y - 1) * width + x],
                data[(y + 1) * width + x],
            ];
            neighbours.iter().any(|&n| n != v)
        })
        .count();
    assert!(on_edge * 10 >= templ.features().len() * 9, "{on_edge} on edges");
}

#[test]
fn noisy_copy_is_found_near_its_offset() {
    let det = trained();
    let (width, height) = (256, 192);
    let mut data = scene(width, height, 65, 47);
    let mut rng = StdRng::seed_from_u64(7);
    for value in data.iter_mut() {
        let noise: i16 = rng.random_range(-8..=8);
        *value = (*value as i16 + noise).clamp(0, 255) as u8;
    }
    let image = ImageView::from_slice(&data, width, height).unwrap();

    let matches = det.match_image(image, 80.0, &["bracket"]).unwrap();
    let best = matches.first().expect("no match found");
    let templ = &det.get_templates("bracket", 0).unwrap()[0];
    let (x0, y0) = (65 + templ.tl_x(), 47 + templ.tl_y());
    assert!((best.x - x0).abs() <= 1 && (best.y - y0).abs() <= 1, "{best:?}");
    assert!(best.similarity >= 80.0);
}

#[test]
fn color_scene_matches_like_gray() {
    let det = trained();
    let (width, height) = (256, 192);
    let gray = scene(width, height, 64, 48);
    let rgb: Vec<u8> = gray.iter().flat_map(|&v| [v, v / 2, 0]).collect();
    let image = ImageView::with_channels(&rgb, width, height, 3).unwrap();
    let gray_view = ImageView::from_slice(&gray, width, height).unwrap();
    let expected = det.match_image(gray_view, 90.0, &["bracket"]).unwrap();
    let matches = det.match_image(image, 90.0, &["bracket"]).unwrap();
    assert_eq!((matches[0].x, matches[0].y), (expected[0].x, expected[0].y));
}

#[test]
fn raising_threshold_never_adds_matches() {
    let det = trained();
    let (width, height) = (256, 192);
    let data = scene(width, height, 64, 48);
    let image = ImageView::from_slice(&data, width, height).unwrap();

    let mut previous = usize::MAX;
    for threshold in [30.0, 50.0, 70.0, 90.0, 100.0] {
        let count = det.match_image(image, threshold, &["bracket"]).unwrap().len();
        assert!(count <= previous, "{threshold}: {count} > {previous}");
        previous = count;
    }
}

#[test]
fn kept_matches_do_not_overlap_beyond_nms_fraction() {
    let det = trained();
    let (width, height) = (256, 192);
    let data = scene(width, height, 64, 48);
    let image = ImageView::from_slice(&data, width, height).unwrap();
    let config = MatchConfig {
        nms_overlap: 0.3,
        ..MatchConfig::default()
    };
    let matches = det
        .match_image_with(image, 40.0, &["bracket"], &config)
        .unwrap();
    for (i, a) in matches.iter().enumerate() {
        for b in matches.iter().skip(i + 1) {
            if a.class_id == b.class_id {
                assert!(iou(a, b) <= 0.3);
            }
        }
    }
}

#[test]
fn repeated_matching_is_deterministic() {
    let det = trained();
    let (width, height) = (256, 192);
    let data = scene(width, height, 64, 48);
    let image = ImageView::from_slice(&data, width, height).unwrap();
    let first = det.match_image(image, 60.0, &["bracket"]).unwrap();
    let second = det.match_image(image, 60.0, &["bracket"]).unwrap();
    assert_eq!(first, second);
    for pair in first.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[test]
fn empty_class_list_searches_everything() {
    let det = trained();
    let (width, height) = (256, 192);
    let data = scene(width, height, 64, 48);
    let image = ImageView::from_slice(&data, width, height).unwrap();
    let all: [&str; 0] = [];
    let everything = det.match_image(image, 90.0, &all).unwrap();
    let named = det.match_image(image, 90.0, &["bracket"]).unwrap();
    assert_eq!(everything, named);
    assert!(det.match_image(image, 90.0, &["other"]).unwrap().is_empty());
}
