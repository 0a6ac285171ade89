//! Non-maximum suppression of overlapping match boxes.

use crate::search::{BoundingBox, Match};

/// Intersection over union of two boxes.
pub(crate) fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = (a.x + a.width).min(b.x + b.width);
    let y1 = (a.y + a.height).min(b.y + b.height);
    let inter = ((x1 - x0).max(0) as f32) * ((y1 - y0).max(0) as f32);
    let area_a = (a.width.max(0) as f32) * (a.height.max(0) as f32);
    let area_b = (b.width.max(0) as f32) * (b.height.max(0) as f32);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Greedy per-class suppression.
///
/// `matches` must already be ranked best first. A match is dropped when its
/// IoU with an already kept match of the same class exceeds `overlap`; an
/// overlap of `1.0` or more disables suppression. Kept matches stay in input
/// order.
pub(crate) fn nms_boxes(matches: Vec<Match>, overlap: f32) -> Vec<Match> {
    if overlap >= 1.0 {
        return matches;
    }

    let mut kept: Vec<Match> = Vec::with_capacity(matches.len());
    'outer: for candidate in matches {
        for keep in kept.iter() {
            let same_class = keep.class_id == candidate.class_id;
            if same_class && iou(&keep.bbox, &candidate.bbox) > overlap {
                continue 'outer;
            }
        }
        kept.push(candidate);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::{iou, nms_boxes};
    use crate::search::{BoundingBox, Match};

    fn m(class_id: &str, x: i32, y: i32, similarity: f32) -> Match {
        Match {
            class_id: class_id.to_string(),
            template_id: 0,
            x,
            y,
            similarity,
            bbox: BoundingBox {
                x,
                y,
                width: 10,
                height: 10,
            },
        }
    }

    #[test]
    fn iou_of_shifted_boxes() {
        let b = |x| m("a", x, 0, 0.0).bbox;
        assert_eq!(iou(&b(0), &b(0)), 1.0);
        assert_eq!(iou(&b(0), &b(20)), 0.0);
        let half = iou(&b(0), &b(5));
        assert!((half - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn suppresses_within_class_only() {
        let matches = vec![
            m("a", 1, 1, 95.0),
            m("a", 0, 0, 90.0),
            m("a", 30, 30, 85.0),
            m("b", 1, 1, 80.0),
        ];
        let kept = nms_boxes(matches, 0.5);
        let summary: Vec<_> = kept
            .iter()
            .map(|k| (k.class_id.as_str(), k.bbox.x))
            .collect();
        assert_eq!(summary, vec![("a", 1), ("a", 30), ("b", 1)]);
    }

    #[test]
    fn earlier_rank_wins_among_equal_similarity() {
        let matches = vec![m("a", 2, 1, 100.0), m("a", 0, 0, 100.0)];
        let kept = nms_boxes(matches, 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!((kept[0].x, kept[0].y), (2, 1));
    }

    #[test]
    fn overlap_of_one_disables_suppression() {
        let matches = vec![m("a", 0, 0, 90.0), m("a", 0, 0, 91.0)];
        assert_eq!(nms_boxes(matches, 1.0).len(), 2);
    }
}
