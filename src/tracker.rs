mod config;
mod detection;
mod kalman_filter;
mod matching;
mod mot_tracker;
mod rect;
mod track;
mod track_state;

pub use config::{CostMetric, RevivalPolicy, SequenceTuning, TrackerConfig, TrackerOverrides};
pub use detection::Detection;
pub use kalman_filter::KalmanFilter;
pub use matching::AssignmentResult;
pub use mot_tracker::{FrameSummary, MotTracker};
pub use rect::Rect;
pub use track::Track;
pub use track_state::TrackState;
