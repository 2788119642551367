//! Per-frame detector output consumed by the tracker.

use ndarray::Array1;

use crate::tracker::rect::Rect;

/// A single detection: bounding box, confidence, class and an optional
/// appearance embedding. Immutable once constructed; discarded after the
/// frame's `update` call.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Bounding box in TLWH form.
    pub bbox: Rect,
    /// Confidence score in [0, 1].
    pub score: f32,
    /// Detector class id.
    pub class_id: i64,
    /// Appearance embedding, if the upstream model produces one.
    pub feature: Option<Array1<f32>>,
}

impl Detection {
    /// Construct from a TLBR box (x1, y1, x2, y2) and score.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self::from_rect(Rect::from_tlbr(x1, y1, x2, y2), score)
    }

    pub fn from_rect(bbox: Rect, score: f32) -> Self {
        Self {
            bbox,
            score,
            class_id: 0,
            feature: None,
        }
    }

    pub fn with_class(mut self, class_id: i64) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn with_feature(mut self, feature: Array1<f32>) -> Self {
        self.feature = Some(feature);
        self
    }

    /// Whether the detection is usable for matching. Malformed detections
    /// (non-finite or non-positive box, score outside [0, 1]) are dropped
    /// per frame rather than aborting it.
    pub fn is_valid(&self) -> bool {
        let b = &self.bbox;
        b.x.is_finite()
            && b.y.is_finite()
            && b.width.is_finite()
            && b.height.is_finite()
            && b.width > 0.0
            && b.height > 0.0
            && self.score.is_finite()
            && (0.0..=1.0).contains(&self.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_boxes_and_scores() {
        assert!(Detection::new(0.0, 0.0, 10.0, 10.0, 0.9).is_valid());
        assert!(!Detection::new(0.0, 0.0, 10.0, 10.0, 1.5).is_valid());
        assert!(!Detection::new(0.0, 0.0, 10.0, 10.0, f32::NAN).is_valid());
        // zero-width box
        assert!(!Detection::new(10.0, 0.0, 10.0, 10.0, 0.9).is_valid());
        // inverted box (negative height)
        assert!(!Detection::new(0.0, 10.0, 10.0, 0.0, 0.9).is_valid());
        assert!(!Detection::new(f32::NAN, 0.0, 10.0, 10.0, 0.9).is_valid());
    }
}
