//! Builder for assembling `Detection`s from assorted model output layouts.

use ndarray::Array1;

use crate::tracker::{Detection, Rect};

#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    bbox: Rect,
    score: f32,
    class_id: i64,
    feature: Option<Array1<f32>>,
}

impl DetectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Box as TLBR corners (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.bbox = Rect::from_tlbr(x1, y1, x2, y2);
        self
    }

    /// Box as center plus size (cx, cy, w, h), the common detector head
    /// layout.
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.bbox = Rect::from_xywh(cx, cy, w, h);
        self
    }

    /// Box as top-left corner plus size.
    pub fn tlwh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.bbox = Rect::new(x, y, w, h);
        self
    }

    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn class_id(mut self, class_id: i64) -> Self {
        self.class_id = class_id;
        self
    }

    /// Appearance embedding from a re-identification head.
    pub fn feature(mut self, feature: Array1<f32>) -> Self {
        self.feature = Some(feature);
        self
    }

    pub fn build(self) -> Detection {
        let mut det = Detection::from_rect(self.bbox, self.score).with_class(self.class_id);
        if let Some(feature) = self.feature {
            det = det.with_feature(feature);
        }
        det
    }
}
