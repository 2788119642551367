//! Error taxonomy for the tracking engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The Kalman innovation covariance lost positive-definiteness and the
    /// Cholesky factorization failed. The offending track is evicted by the
    /// orchestrator; the frame itself continues.
    #[error("kalman filter diverged: innovation covariance is not positive definite")]
    FilterDiverged,

    /// Writing a results file failed.
    #[error("results i/o error: {0}")]
    Io(#[from] std::io::Error),
}
