//! Extended Kalman filter over the 5-D planar motion state.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use tracing::warn;

use super::models::MotionModelEnum;
use super::traits::MotionModel;
use super::{HEADING, STATE_DIM};
use crate::geometry::wrap_to_pi;

/// Extended Kalman filter driven by a [`MotionModelEnum`].
#[derive(Clone, Debug)]
pub struct ExtendedKalmanFilter {
    model: MotionModelEnum,
    /// State vector `[x, y, speed, heading, yaw_rate]`
    x: DVector<f64>,
    /// State covariance
    p: DMatrix<f64>,
}

impl ExtendedKalmanFilter {
    pub fn new(model: impl Into<MotionModelEnum>) -> Self {
        Self {
            model: model.into(),
            x: DVector::zeros(STATE_DIM),
            p: DMatrix::identity(STATE_DIM, STATE_DIM),
        }
    }

    /// Overwrite state and covariance.
    pub fn initialize(&mut self, x: DVector<f64>, p: DMatrix<f64>) {
        self.x = x;
        self.p = p;
    }

    pub fn state(&self) -> &DVector<f64> {
        &self.x
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.p
    }

    pub fn model(&self) -> &MotionModelEnum {
        &self.model
    }

    /// Predicted state and covariance `dt` seconds ahead, without mutating the filter.
    pub fn compute_prediction(&self, dt: f64) -> (DVector<f64>, DMatrix<f64>) {
        let f = self.model.jacobian(&self.x, dt);
        let q = self.model.process_noise(&self.x, dt);
        let x = self.model.transition(&self.x, dt);
        let p = &f * &self.p * f.transpose() + q;
        (x, p)
    }

    /// Propagate the filter `dt` seconds.
    pub fn predict(&mut self, dt: f64) {
        let (x, p) = self.compute_prediction(dt);
        self.x = x;
        self.p = p;
    }

    /// Fuse a linear measurement `z ≈ H x` with noise `r`.
    ///
    /// Rows listed in `angle_rows` hold angles; their residuals are wrapped
    /// to (-π, π].
    ///
    /// # Returns
    /// The Gaussian likelihood of the innovation. A singular innovation
    /// covariance leaves the filter untouched and returns 0.
    pub fn update(&mut self, z: &DVector<f64>, h: &DMatrix<f64>, r: &DMatrix<f64>, angle_rows: &[usize]) -> f64 {
        // y = z - H @ x
        let mut y = z - h * &self.x;
        for &row in angle_rows {
            y[row] = wrap_to_pi(y[row]);
        }

        // S = H @ P @ H.T + R
        let s = h * &self.p * h.transpose() + r;
        let Some(s_inv) = s.clone().try_inverse() else {
            warn!("Innovation covariance is singular, skipping measurement update");
            return 0.0;
        };

        let likelihood = gaussian_density(&y, &s, &s_inv);

        // K = P @ H.T @ S^-1
        let k = &self.p * h.transpose() * &s_inv;
        self.x += &k * &y;
        self.x[HEADING] = wrap_to_pi(self.x[HEADING]);

        // Joseph form keeps P symmetric positive semi-definite.
        let i_kh = DMatrix::identity(STATE_DIM, STATE_DIM) - &k * h;
        self.p = &i_kh * &self.p * i_kh.transpose() + &k * r * k.transpose();

        likelihood
    }
}

/// Multivariate normal density of residual `y` under covariance `s`.
fn gaussian_density(y: &DVector<f64>, s: &DMatrix<f64>, s_inv: &DMatrix<f64>) -> f64 {
    let det = s.determinant();
    if !det.is_finite() || det <= 0.0 {
        return 0.0;
    }
    let mahalanobis = (y.transpose() * s_inv * y)[(0, 0)];
    let norm = ((2.0 * PI).powi(y.len() as i32) * det).sqrt();
    (-0.5 * mahalanobis).exp() / norm
}
