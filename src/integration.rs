//! Glue between detector backends and the tracking engine.
//!
//! The detector itself is an external collaborator; any inference backend
//! that can produce `Detection`s per frame plugs in through
//! [`DetectionSource`].

mod builder;
mod detector;
mod pipeline;

pub use builder::DetectionBuilder;
pub use detector::{DetectionSource, IntoDetections};
pub use pipeline::TrackerPipeline;
