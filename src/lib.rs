//! Multi-object tracking engine.
//!
//! Associates per-frame detections into persistent track identities using a
//! constant-velocity Kalman motion model, score-tiered two-stage matching
//! and minimum-cost bipartite assignment. Detection (the upstream model) and
//! result scoring are external; this crate covers everything in between,
//! including the MOT results-file interchange format.

pub mod error;
pub mod integration;
pub mod results;
pub mod tracker;

pub use error::Error;
pub use results::{OutputFilter, ResultLog};
pub use tracker::{
    CostMetric, Detection, MotTracker, Rect, RevivalPolicy, SequenceTuning, Track, TrackState,
    TrackerConfig, TrackerOverrides,
};
