//! Constant-velocity and constant-turn-rate motion models.

use nalgebra::{DMatrix, DVector};

use super::traits::MotionModel;
use super::{HEADING, SPEED, STATE_DIM, X, Y, YAW_RATE};
use crate::geometry::wrap_to_pi;

/// Below this yaw rate the turn-rate model falls back to straight-line motion.
const MIN_TURN_RATE: f64 = 1e-4;

/// Process noise from white longitudinal and yaw accelerations.
///
/// Longitudinal acceleration enters along the current heading; yaw
/// acceleration drives heading and yaw rate.
fn acceleration_noise(x: &DVector<f64>, dt: f64, accel_var: f64, yaw_accel_var: f64) -> DMatrix<f64> {
    let (sin_h, cos_h) = x[HEADING].sin_cos();
    let half_dt2 = 0.5 * dt * dt;

    let mut g_accel = DVector::zeros(STATE_DIM);
    g_accel[X] = half_dt2 * cos_h;
    g_accel[Y] = half_dt2 * sin_h;
    g_accel[SPEED] = dt;

    let mut g_yaw = DVector::zeros(STATE_DIM);
    g_yaw[HEADING] = half_dt2;
    g_yaw[YAW_RATE] = dt;

    &g_accel * g_accel.transpose() * accel_var + &g_yaw * g_yaw.transpose() * yaw_accel_var
}

fn straight_line(x: &DVector<f64>, dt: f64) -> DVector<f64> {
    let mut next = x.clone();
    let (sin_h, cos_h) = x[HEADING].sin_cos();
    next[X] += x[SPEED] * cos_h * dt;
    next[Y] += x[SPEED] * sin_h * dt;
    next[HEADING] = wrap_to_pi(x[HEADING] + x[YAW_RATE] * dt);
    next
}

fn straight_line_jacobian(x: &DVector<f64>, dt: f64) -> DMatrix<f64> {
    let (sin_h, cos_h) = x[HEADING].sin_cos();
    let v = x[SPEED];
    let mut f = DMatrix::identity(STATE_DIM, STATE_DIM);
    f[(X, SPEED)] = dt * cos_h;
    f[(X, HEADING)] = -v * dt * sin_h;
    f[(Y, SPEED)] = dt * sin_h;
    f[(Y, HEADING)] = v * dt * cos_h;
    f[(HEADING, YAW_RATE)] = dt;
    f
}

/// Constant-velocity model: straight-line motion along the heading.
///
/// Heading changes only through yaw-rate integration and there is no yaw
/// acceleration noise.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantVelocity {
    pub accel_var: f64,
}

impl ConstantVelocity {
    pub fn new(accel_var: f64) -> Self {
        Self { accel_var }
    }
}

impl Default for ConstantVelocity {
    fn default() -> Self {
        Self::new(0.04)
    }
}

impl MotionModel for ConstantVelocity {
    fn transition(&self, x: &DVector<f64>, dt: f64) -> DVector<f64> {
        straight_line(x, dt)
    }

    fn jacobian(&self, x: &DVector<f64>, dt: f64) -> DMatrix<f64> {
        straight_line_jacobian(x, dt)
    }

    fn process_noise(&self, x: &DVector<f64>, dt: f64) -> DMatrix<f64> {
        acceleration_noise(x, dt, self.accel_var, 0.0)
    }
}

/// Constant turn rate and velocity model: motion along a circular arc.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantTurnRate {
    pub accel_var: f64,
    pub yaw_accel_var: f64,
}

impl ConstantTurnRate {
    pub fn new(accel_var: f64, yaw_accel_var: f64) -> Self {
        Self {
            accel_var,
            yaw_accel_var,
        }
    }
}

impl Default for ConstantTurnRate {
    fn default() -> Self {
        Self::new(0.04, 0.09)
    }
}

impl MotionModel for ConstantTurnRate {
    fn transition(&self, x: &DVector<f64>, dt: f64) -> DVector<f64> {
        let w = x[YAW_RATE];
        if w.abs() < MIN_TURN_RATE {
            return straight_line(x, dt);
        }
        let v = x[SPEED];
        let h0 = x[HEADING];
        let h1 = h0 + w * dt;

        let mut next = x.clone();
        next[X] += v / w * (h1.sin() - h0.sin());
        next[Y] += v / w * (h0.cos() - h1.cos());
        next[HEADING] = wrap_to_pi(h1);
        next
    }

    fn jacobian(&self, x: &DVector<f64>, dt: f64) -> DMatrix<f64> {
        let w = x[YAW_RATE];
        if w.abs() < MIN_TURN_RATE {
            return straight_line_jacobian(x, dt);
        }
        let v = x[SPEED];
        let (s0, c0) = x[HEADING].sin_cos();
        let (s1, c1) = (x[HEADING] + w * dt).sin_cos();

        let mut f = DMatrix::identity(STATE_DIM, STATE_DIM);
        f[(X, SPEED)] = (s1 - s0) / w;
        f[(X, HEADING)] = v / w * (c1 - c0);
        f[(X, YAW_RATE)] = -v / (w * w) * (s1 - s0) + v / w * c1 * dt;
        f[(Y, SPEED)] = (c0 - c1) / w;
        f[(Y, HEADING)] = v / w * (s1 - s0);
        f[(Y, YAW_RATE)] = -v / (w * w) * (c0 - c1) + v / w * s1 * dt;
        f[(HEADING, YAW_RATE)] = dt;
        f
    }

    fn process_noise(&self, x: &DVector<f64>, dt: f64) -> DMatrix<f64> {
        acceleration_noise(x, dt, self.accel_var, self.yaw_accel_var)
    }
}

/// Enum-based motion model for static dispatch inside the IMM bank.
#[derive(Clone, Debug, PartialEq)]
pub enum MotionModelEnum {
    ConstantVelocity(ConstantVelocity),
    ConstantTurnRate(ConstantTurnRate),
}

impl MotionModel for MotionModelEnum {
    #[inline(always)]
    fn transition(&self, x: &DVector<f64>, dt: f64) -> DVector<f64> {
        match self {
            MotionModelEnum::ConstantVelocity(m) => m.transition(x, dt),
            MotionModelEnum::ConstantTurnRate(m) => m.transition(x, dt),
        }
    }

    #[inline(always)]
    fn jacobian(&self, x: &DVector<f64>, dt: f64) -> DMatrix<f64> {
        match self {
            MotionModelEnum::ConstantVelocity(m) => m.jacobian(x, dt),
            MotionModelEnum::ConstantTurnRate(m) => m.jacobian(x, dt),
        }
    }

    #[inline(always)]
    fn process_noise(&self, x: &DVector<f64>, dt: f64) -> DMatrix<f64> {
        match self {
            MotionModelEnum::ConstantVelocity(m) => m.process_noise(x, dt),
            MotionModelEnum::ConstantTurnRate(m) => m.process_noise(x, dt),
        }
    }
}

impl From<ConstantVelocity> for MotionModelEnum {
    fn from(m: ConstantVelocity) -> Self {
        MotionModelEnum::ConstantVelocity(m)
    }
}

impl From<ConstantTurnRate> for MotionModelEnum {
    fn from(m: ConstantTurnRate) -> Self {
        MotionModelEnum::ConstantTurnRate(m)
    }
}
