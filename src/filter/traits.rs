//! Motion model trait for the extended Kalman filters.

use nalgebra::{DMatrix, DVector};

/// A nonlinear process model over the state `[x, y, speed, heading, yaw_rate]`.
///
/// Implementations provide the state transition, its Jacobian and the
/// process noise, all evaluated at the current state for a time step `dt`.
pub trait MotionModel: Send + Sync {
    /// Propagate the state forward by `dt` seconds.
    fn transition(&self, x: &DVector<f64>, dt: f64) -> DVector<f64>;

    /// Jacobian of [`MotionModel::transition`] evaluated at `x`.
    fn jacobian(&self, x: &DVector<f64>, dt: f64) -> DMatrix<f64>;

    /// Process noise covariance for a step of `dt` seconds at `x`.
    fn process_noise(&self, x: &DVector<f64>, dt: f64) -> DMatrix<f64>;
}
