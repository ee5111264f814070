//! State estimation for tracked identities.
//!
//! This module provides:
//! - `MotionModel` - process model trait with CV and CTRV implementations
//! - `ExtendedKalmanFilter` - EKF over `[x, y, speed, heading, yaw_rate]`
//! - `ImmFilter` - Interacting Multiple Model blend of a CTRV and a CV EKF
//! - `Estimator` - timestamped facade used by identities

mod traits;
mod models;
mod ekf;
mod imm;
mod estimator;

pub use traits::MotionModel;
pub use models::{ConstantTurnRate, ConstantVelocity, MotionModelEnum};
pub use ekf::ExtendedKalmanFilter;
pub use imm::{ImmFilter, NUM_MODES};
pub use estimator::Estimator;

use nalgebra::{DMatrix, DVector, Vector2};

/// State dimension.
pub const STATE_DIM: usize = 5;
/// Index of the x position.
pub const X: usize = 0;
/// Index of the y position.
pub const Y: usize = 1;
/// Index of the speed along the heading.
pub const SPEED: usize = 2;
/// Index of the heading angle.
pub const HEADING: usize = 3;
/// Index of the yaw rate.
pub const YAW_RATE: usize = 4;

/// Mean and covariance of the motion state.
#[derive(Clone, Debug, PartialEq)]
pub struct StateEstimate {
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
}

impl StateEstimate {
    pub fn new(mean: DVector<f64>, covariance: DMatrix<f64>) -> Self {
        Self { mean, covariance }
    }

    pub fn state(&self) -> &DVector<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    pub fn x(&self) -> f64 {
        self.mean[X]
    }

    pub fn y(&self) -> f64 {
        self.mean[Y]
    }

    pub fn speed(&self) -> f64 {
        self.mean[SPEED]
    }

    pub fn heading(&self) -> f64 {
        self.mean[HEADING]
    }

    pub fn yaw_rate(&self) -> f64 {
        self.mean[YAW_RATE]
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x(), self.y())
    }

    /// Cartesian velocity derived from speed and heading.
    pub fn velocity(&self) -> Vector2<f64> {
        let (sin_h, cos_h) = self.heading().sin_cos();
        Vector2::new(self.speed() * cos_h, self.speed() * sin_h)
    }

    pub fn vx(&self) -> f64 {
        self.velocity().x
    }

    pub fn vy(&self) -> f64 {
        self.velocity().y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_state_estimate_velocity() {
        let est = StateEstimate::new(
            DVector::from_vec(vec![1.0, 2.0, 3.0, FRAC_PI_2, 0.0]),
            DMatrix::identity(STATE_DIM, STATE_DIM),
        );
        assert_relative_eq!(est.vx(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(est.vy(), 3.0);
        assert_relative_eq!(est.position().x, 1.0);
    }
}
