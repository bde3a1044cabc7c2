//! Post-processing helpers shared by inference adapters.

use crate::shared::bounding_box::BoundingBox;

/// A candidate box with its classifier score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredBox {
    pub bounds: BoundingBox,
    pub score: f64,
}

/// Greedy NMS: sort by score descending, suppress boxes overlapping a kept one
/// by more than `iou_thresh`.
pub fn nms(mut candidates: Vec<ScoredBox>, iou_thresh: f64) -> Vec<ScoredBox> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<ScoredBox> = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(candidates[i]);
        for j in (i + 1)..candidates.len() {
            if !suppressed[j] && candidates[i].bounds.iou(&candidates[j].bounds) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}
