//! End-to-end pipeline: a detection source feeding one tracker instance,
//! with optional results recording.

use crate::results::ResultLog;
use crate::tracker::{MotTracker, Track, TrackerConfig};

use super::DetectionSource;

/// Couples any [`DetectionSource`] with a [`MotTracker`] and records the
/// confirmed output per frame. One pipeline per video sequence; call
/// [`TrackerPipeline::reset`] before reusing it for another.
pub struct TrackerPipeline<D: DetectionSource> {
    detector: D,
    tracker: MotTracker,
    results: ResultLog,
    frame_id: u32,
}

impl<D: DetectionSource> TrackerPipeline<D> {
    pub fn new(detector: D, config: TrackerConfig) -> Self {
        Self {
            detector,
            tracker: MotTracker::new(config),
            results: ResultLog::new(),
            frame_id: 0,
        }
    }

    pub fn with_default_config(detector: D) -> Self {
        Self::new(detector, TrackerConfig::default())
    }

    /// Run detection on one frame and feed the tracker.
    pub fn process_frame(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Track>, D::Error> {
        let detections = self.detector.detect(input, width, height)?;
        self.frame_id += 1;
        let tracks = self.tracker.update(detections);
        self.results.record(self.frame_id, &tracks);
        Ok(tracks)
    }

    /// Clear tracker state and recorded results for a new sequence.
    pub fn reset(&mut self) {
        self.tracker.re_init();
        self.results = ResultLog::new();
        self.frame_id = 0;
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn tracker(&self) -> &MotTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut MotTracker {
        &mut self.tracker
    }

    /// Accumulated results for the current sequence.
    pub fn results(&self) -> &ResultLog {
        &self.results
    }
}
