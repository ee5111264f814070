//! Measurement noise models per sensor.

use nalgebra::{Matrix2, Matrix3, Matrix4, Vector3};

use crate::config::{EngineMode, NoiseConfig};
use crate::observation::Observation;

/// Floor on the velocity magnitude in the polar Jacobian.
const MIN_SPEED: f64 = 1e-6;

/// Measurement covariances for the estimator updates.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementNoise {
    x_std: f64,
    y_std: f64,
    heading_std: f64,
    camera_scale: f64,
    default_velocity_variance: f64,
}

impl MeasurementNoise {
    pub fn new(config: &NoiseConfig, mode: EngineMode) -> Self {
        Self {
            x_std: config.x_std,
            y_std: config.y_std,
            heading_std: config.heading_std,
            camera_scale: config.camera_scale_for(mode),
            default_velocity_variance: config.default_velocity_variance,
        }
    }

    /// Covariance of `(x, y, heading)` for a position measurement.
    ///
    /// Camera detections have every standard deviation scaled by the camera factor.
    pub fn position_noise(&self, observation: &Observation) -> Matrix3<f64> {
        let scale = if observation.is_camera() { self.camera_scale } else { 1.0 };
        let std = Vector3::new(self.x_std, self.y_std, self.heading_std) * scale;
        Matrix3::from_diagonal(&std.component_mul(&std))
    }

    /// Covariance of `(speed, heading)` for a radar velocity measurement.
    ///
    /// The observation's cartesian velocity covariance is propagated through
    /// the Jacobian of the polar conversion, `J Σ Jᵀ` with
    /// `J = [[vx/m, vy/m], [-vy/m², vx/m²]]`.
    pub fn velocity_noise(&self, observation: &Observation) -> Matrix2<f64> {
        let Some(v) = observation.velocity() else {
            return Matrix2::identity() * self.default_velocity_variance;
        };
        let cartesian = observation
            .velocity_covariance()
            .copied()
            .unwrap_or_else(|| Matrix2::identity() * self.default_velocity_variance);

        let m = v.norm().max(MIN_SPEED);
        let m2 = m * m;
        let j = Matrix2::new(v.x / m, v.y / m, -v.y / m2, v.x / m2);
        j * cartesian * j.transpose()
    }

    /// Covariance of `(x, y, speed, heading)` for a combined radar update.
    pub fn position_velocity_noise(&self, observation: &Observation) -> Matrix4<f64> {
        let mut r = Matrix4::zeros();
        r[(0, 0)] = self.x_std * self.x_std;
        r[(1, 1)] = self.y_std * self.y_std;
        r.fixed_view_mut::<2, 2>(2, 2).copy_from(&self.velocity_noise(observation));
        r
    }
}
