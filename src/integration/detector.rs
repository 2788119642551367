//! Trait for object detection inference backends.

use crate::tracker::Detection;

/// A per-frame detection producer.
///
/// Implementations own the model and its preprocessing; the tracker only
/// sees the filtered detections.
///
/// # Example
///
/// ```ignore
/// use mottrack::integration::DetectionSource;
/// use mottrack::Detection;
///
/// struct MyDetector { /* model handle */ }
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, input: &[u8], width: u32, height: u32) -> Result<Vec<Detection>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    type Error;

    /// Run inference on one frame's raw image data.
    fn detect(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, Self::Error>;
}

/// Conversion from a model-specific output batch to detections.
pub trait IntoDetections {
    fn into_detections(self) -> Vec<Detection>;
}

impl IntoDetections for Vec<Detection> {
    fn into_detections(self) -> Vec<Detection> {
        self
    }
}
