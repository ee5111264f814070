//! Timestamped motion estimator used by identities.

use nalgebra::{DMatrix, DVector, Matrix2, Matrix3, Matrix4};

use super::imm::{ImmFilter, NUM_MODES};
use super::models::{ConstantTurnRate, ConstantVelocity};
use super::{StateEstimate, HEADING, SPEED, STATE_DIM, X, Y, YAW_RATE};
use crate::geometry::{polar_from_cartesian, wrap_to_pi};

/// Initial variance of position and speed.
const INITIAL_VARIANCE: f64 = 10.0;
/// Initial variance of heading and yaw rate.
const INITIAL_ANGULAR_VARIANCE: f64 = 1.0;

fn selection(rows: &[usize]) -> DMatrix<f64> {
    let mut h = DMatrix::zeros(rows.len(), STATE_DIM);
    for (r, &c) in rows.iter().enumerate() {
        h[(r, c)] = 1.0;
    }
    h
}

/// IMM-backed estimator that tracks the time of its last update.
#[derive(Clone, Debug)]
pub struct Estimator {
    imm: ImmFilter,
    timestamp: f64,
}

impl Estimator {
    /// Create an estimator with the standard initial covariance.
    ///
    /// # Arguments
    /// * `x`, `y` - Position
    /// * `speed` - Speed along the heading
    /// * `heading` - Heading angle (radians)
    /// * `yaw_rate` - Heading rate (radians/second)
    /// * `timestamp` - Time of the initializing observation
    pub fn new(x: f64, y: f64, speed: f64, heading: f64, yaw_rate: f64, timestamp: f64) -> Self {
        let mut p = DMatrix::identity(STATE_DIM, STATE_DIM) * INITIAL_VARIANCE;
        p[(HEADING, HEADING)] = INITIAL_ANGULAR_VARIANCE;
        p[(YAW_RATE, YAW_RATE)] = INITIAL_ANGULAR_VARIANCE;

        let mut imm = ImmFilter::new(ConstantTurnRate::default(), ConstantVelocity::default());
        imm.initialize(
            DVector::from_vec(vec![x, y, speed, wrap_to_pi(heading), yaw_rate]),
            p,
        );
        Self { imm, timestamp }
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn estimate(&self) -> &StateEstimate {
        self.imm.estimate()
    }

    pub fn x(&self) -> f64 {
        self.estimate().x()
    }

    pub fn y(&self) -> f64 {
        self.estimate().y()
    }

    pub fn speed(&self) -> f64 {
        self.estimate().speed()
    }

    pub fn heading(&self) -> f64 {
        self.estimate().heading()
    }

    pub fn yaw_rate(&self) -> f64 {
        self.estimate().yaw_rate()
    }

    pub fn vx(&self) -> f64 {
        self.estimate().vx()
    }

    pub fn vy(&self) -> f64 {
        self.estimate().vy()
    }

    pub fn mode_probabilities(&self) -> [f64; NUM_MODES] {
        self.imm.mode_probabilities()
    }

    /// Advance the estimate to `timestamp`.
    pub fn predict(&mut self, timestamp: f64) {
        self.imm.predict(timestamp - self.timestamp);
        self.timestamp = timestamp;
    }

    /// Predicted state at `timestamp` without changing the estimator.
    pub fn compute_prediction(&self, timestamp: f64) -> StateEstimate {
        self.imm.compute_prediction(timestamp - self.timestamp)
    }

    /// Fuse a position and heading measurement.
    ///
    /// `noise` is the covariance of `(x, y, heading)`.
    pub fn update_position(&mut self, x: f64, y: f64, heading: f64, noise: &Matrix3<f64>) {
        let z = DVector::from_vec(vec![x, y, wrap_to_pi(heading)]);
        let h = selection(&[X, Y, HEADING]);
        let r = DMatrix::from_column_slice(3, 3, noise.as_slice());
        self.imm.update(|f| f.update(&z, &h, &r, &[2]));
    }

    /// Fuse a cartesian velocity measurement.
    ///
    /// The velocity is converted to `(speed, heading)`; `noise` is the
    /// covariance of that polar pair.
    pub fn update_velocity(&mut self, vx: f64, vy: f64, noise: &Matrix2<f64>) {
        let (speed, heading) = polar_from_cartesian(vx, vy);
        let z = DVector::from_vec(vec![speed, heading]);
        let h = selection(&[SPEED, HEADING]);
        let r = DMatrix::from_column_slice(2, 2, noise.as_slice());
        self.imm.update(|f| f.update(&z, &h, &r, &[1]));
    }

    /// Fuse position and velocity together.
    ///
    /// `noise` is the covariance of `(x, y, speed, heading)`.
    pub fn update_position_velocity(&mut self, x: f64, y: f64, vx: f64, vy: f64, noise: &Matrix4<f64>) {
        let (speed, heading) = polar_from_cartesian(vx, vy);
        let z = DVector::from_vec(vec![x, y, speed, heading]);
        let h = selection(&[X, Y, SPEED, HEADING]);
        let r = DMatrix::from_column_slice(4, 4, noise.as_slice());
        self.imm.update(|f| f.update(&z, &h, &r, &[3]));
    }
}
