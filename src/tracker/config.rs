//! Tracker configuration, association strategies and per-sequence tuning.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Cost metric used for the first (high-confidence) matching stage. The
/// second stage always uses plain IoU distance, since low-score detections
/// carry neither trustworthy confidences nor clean embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CostMetric {
    /// IoU distance only.
    Iou,
    /// IoU similarity multiplied by detection confidence.
    IouFusedScore,
    /// Weighted sum of appearance (cosine) distance and IoU distance;
    /// `weight` is the appearance share in [0, 1]. Pairs without embeddings
    /// fall back to the IoU term.
    IouAppearance { weight: f32 },
}

/// How a `Lost` track's motion state is re-anchored when a detection
/// revives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RevivalPolicy {
    /// Kalman-update the predicted state with the reappearance; velocity
    /// accumulated before the loss carries through the correction.
    #[default]
    Blend,
    /// Zero the velocity components before the Kalman update, discarding
    /// pre-loss motion entirely.
    ResetVelocity,
    /// Re-estimate velocity from the last real observation across the
    /// occlusion gap before the Kalman update, correcting the drift a purely
    /// predicted state accumulates while unobserved.
    ObservationCentric,
}

/// Tunable parameters of the tracking engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Score split between the high- and low-confidence detection tiers.
    pub track_thresh: f32,
    /// Birth threshold for new tracks; `None` means `track_thresh + 0.1`.
    pub det_thresh: Option<f32>,
    /// Detections scoring at or below this are ignored entirely.
    pub low_score_floor: f32,
    /// Acceptance threshold for the first matching stage.
    pub match_thresh: f32,
    /// Acceptance threshold for the low-confidence second stage.
    pub second_match_thresh: f32,
    /// Acceptance threshold when matching tentative tracks.
    pub unconfirmed_match_thresh: f32,
    /// Grace window in frames (at 30 fps) before a lost track is evicted.
    pub track_buffer: u32,
    pub frame_rate: f32,
    /// Pairs at or below this IoU are ineligible regardless of other costs.
    pub iou_floor: f32,
    /// Reject pairs whose Mahalanobis innovation distance exceeds the
    /// chi-squared gate, on top of the IoU floor.
    pub mahalanobis_gate: bool,
    pub cost_metric: CostMetric,
    pub revival: RevivalPolicy,
    /// Capacity of each track's appearance-embedding history.
    pub feature_history: usize,
    /// EMA coefficient for the smoothed track embedding.
    pub feature_alpha: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.5,
            det_thresh: None,
            low_score_floor: 0.1,
            match_thresh: 0.8,
            second_match_thresh: 0.5,
            unconfirmed_match_thresh: 0.7,
            track_buffer: 30,
            frame_rate: 30.0,
            iou_floor: 0.0,
            mahalanobis_gate: false,
            cost_metric: CostMetric::IouFusedScore,
            revival: RevivalPolicy::Blend,
            feature_history: 30,
            feature_alpha: 0.9,
        }
    }
}

impl TrackerConfig {
    /// Effective birth threshold for spawning new tracks.
    pub fn birth_thresh(&self) -> f32 {
        self.det_thresh.unwrap_or(self.track_thresh + 0.1)
    }

    /// Frames a lost track survives, scaled by frame rate.
    pub fn max_time_lost(&self) -> u32 {
        (self.frame_rate / 30.0 * self.track_buffer as f32) as u32
    }
}

/// Partial override of the per-sequence tunables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerOverrides {
    pub track_thresh: Option<f32>,
    pub det_thresh: Option<f32>,
    pub match_thresh: Option<f32>,
    pub track_buffer: Option<u32>,
    pub revival: Option<RevivalPolicy>,
}

impl TrackerOverrides {
    pub fn apply(&self, base: &TrackerConfig) -> TrackerConfig {
        let mut config = base.clone();
        if let Some(v) = self.track_thresh {
            config.track_thresh = v;
        }
        if self.det_thresh.is_some() {
            config.det_thresh = self.det_thresh;
        }
        if let Some(v) = self.match_thresh {
            config.match_thresh = v;
        }
        if let Some(v) = self.track_buffer {
            config.track_buffer = v;
        }
        if let Some(v) = self.revival {
            config.revival = v;
        }
        config
    }
}

/// Per-video threshold tuning, keyed by sequence name. Deployments tune
/// `track_thresh`/`track_buffer` per named sequence; the caller looks up the
/// effective config at sequence start instead of branching inside the
/// engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SequenceTuning {
    overrides: HashMap<String, TrackerOverrides>,
}

impl SequenceTuning {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sequence: impl Into<String>, overrides: TrackerOverrides) {
        self.overrides.insert(sequence.into(), overrides);
    }

    /// Resolve the config for a named sequence; unknown names get the base.
    pub fn config_for(&self, base: &TrackerConfig, sequence: &str) -> TrackerConfig {
        match self.overrides.get(sequence) {
            Some(o) => o.apply(base),
            None => base.clone(),
        }
    }
}
