//! Constant-velocity Kalman filter over bounding-box state.
//!
//! State vector is 8-dimensional: center x, center y, aspect ratio, height
//! and their velocities. Measurements are 4-dimensional XYAH boxes. Noise
//! magnitudes scale with the object's height so that large objects tolerate
//! proportionally larger accelerations.

use ndarray::{Array1, Array2};

use crate::error::Error;

/// 0.95 quantile of the chi-squared distribution with 4 degrees of freedom,
/// the gating threshold for 4-dim measurement innovations.
pub const CHI2_GATE_4DOF: f64 = 9.4877;

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let ndim = 4;
        let mut motion_mat = Array2::eye(2 * ndim);
        for i in 0..ndim {
            motion_mat[[i, ndim + i]] = 1.0;
        }

        let mut update_mat = Array2::zeros((ndim, 2 * ndim));
        for i in 0..ndim {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Start a track from an unassociated XYAH measurement: zero velocity,
    /// wider priors on velocity than on position.
    pub fn initiate(&self, measurement: [f64; 4]) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::zeros(8);
        for i in 0..4 {
            mean[i] = measurement[i];
        }

        let h = measurement[3];
        let std = [
            2.0 * self.std_weight_position * h,
            2.0 * self.std_weight_position * h,
            1e-2,
            2.0 * self.std_weight_position * h,
            10.0 * self.std_weight_velocity * h,
            10.0 * self.std_weight_velocity * h,
            1e-5,
            10.0 * self.std_weight_velocity * h,
        ];

        let mut cov = Array2::zeros((8, 8));
        for i in 0..8 {
            cov[[i, i]] = std[i] * std[i];
        }

        (mean, cov)
    }

    /// Constant-velocity time step.
    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let h = mean[3];
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-2,
            self.std_weight_position * h,
            self.std_weight_velocity * h,
            self.std_weight_velocity * h,
            1e-5,
            self.std_weight_velocity * h,
        ];

        let mut motion_cov = Array2::zeros((8, 8));
        for i in 0..8 {
            motion_cov[[i, i]] = std[i] * std[i];
        }

        let new_mean = self.motion_mat.dot(mean);
        let new_covariance =
            self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + motion_cov;

        (new_mean, new_covariance)
    }

    /// Project state into measurement space, adding innovation noise.
    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let h = mean[3];
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-1,
            self.std_weight_position * h,
        ];

        let mut innovation_cov = Array2::zeros((4, 4));
        for i in 0..4 {
            innovation_cov[[i, i]] = std[i] * std[i];
        }

        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + innovation_cov;

        (mean_proj, covariance_proj)
    }

    /// Kalman correction step.
    ///
    /// The innovation covariance is factorized with a Cholesky decomposition
    /// instead of an explicit inverse; if the factorization fails the filter
    /// has lost positive-definiteness and `Error::FilterDiverged` is
    /// returned so the caller can evict the track. The posterior covariance
    /// is re-symmetrized to keep round-off from accumulating.
    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 4],
    ) -> Result<(Array1<f64>, Array2<f64>), Error> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let measurement_arr = Array1::from_vec(measurement.to_vec());
        let innovation = measurement_arr - projected_mean;

        // K = P H^T S^-1, with H = [I 0] so P H^T is the first 4 columns of P.
        let s_inv = cholesky_inverse_4x4(&projected_cov)?;
        let pht = covariance.dot(&self.update_mat.t()); // 8x4
        let kalman_gain = pht.dot(&s_inv); // 8x4

        let new_mean = mean + kalman_gain.dot(&innovation);
        let new_covariance = covariance - kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        Ok((new_mean, symmetrize(&new_covariance)))
    }

    /// Squared Mahalanobis distance from the projected state to each XYAH
    /// measurement. Compare against [`CHI2_GATE_4DOF`] to gate associations.
    pub fn gating_distance(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurements: &[[f64; 4]],
    ) -> Result<Array1<f64>, Error> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let chol = to_matrix4(&projected_cov)
            .cholesky()
            .ok_or(Error::FilterDiverged)?;

        let mut distances = Array1::zeros(measurements.len());
        for (k, m) in measurements.iter().enumerate() {
            let d = nalgebra::Vector4::new(
                m[0] - projected_mean[0],
                m[1] - projected_mean[1],
                m[2] - projected_mean[2],
                m[3] - projected_mean[3],
            );
            // d^T S^-1 d via one triangular solve
            distances[k] = d.dot(&chol.solve(&d));
        }
        Ok(distances)
    }
}

fn to_matrix4(m: &Array2<f64>) -> nalgebra::Matrix4<f64> {
    let mut nm = nalgebra::Matrix4::zeros();
    for i in 0..4 {
        for j in 0..4 {
            nm[(i, j)] = m[[i, j]];
        }
    }
    nm
}

fn cholesky_inverse_4x4(m: &Array2<f64>) -> Result<Array2<f64>, Error> {
    let chol = to_matrix4(m).cholesky().ok_or(Error::FilterDiverged)?;
    let inv = chol.inverse();
    let mut res = Array2::zeros((4, 4));
    for i in 0..4 {
        for j in 0..4 {
            res[[i, j]] = inv[(i, j)];
        }
    }
    Ok(res)
}

fn symmetrize(m: &Array2<f64>) -> Array2<f64> {
    (m + &m.t().to_owned()) * 0.5
}
