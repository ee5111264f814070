//! Interacting Multiple Model filter over a CTRV / CV filter bank.

use nalgebra::{DMatrix, DVector};

use super::ekf::ExtendedKalmanFilter;
use super::models::{ConstantTurnRate, ConstantVelocity};
use super::{StateEstimate, HEADING, STATE_DIM};
use crate::geometry::wrap_to_pi;

/// Number of motion models in the bank.
pub const NUM_MODES: usize = 2;

/// Floor added to likelihood sums so mode probabilities stay defined.
const PROBABILITY_FLOOR: f64 = 1e-27;

/// IMM filter blending a constant-turn-rate EKF (mode 0) and a
/// constant-velocity EKF (mode 1).
#[derive(Clone, Debug)]
pub struct ImmFilter {
    filters: [ExtendedKalmanFilter; NUM_MODES],
    /// Mode transition matrix, `transition[i][j]` = P(mode j | mode i)
    transition: [[f64; NUM_MODES]; NUM_MODES],
    mode_probabilities: [f64; NUM_MODES],
    /// Mode probabilities predicted by the last mixing step
    predicted_probabilities: [f64; NUM_MODES],
    estimate: StateEstimate,
}

impl ImmFilter {
    pub fn new(ctrv: ConstantTurnRate, cv: ConstantVelocity) -> Self {
        Self {
            filters: [ExtendedKalmanFilter::new(ctrv), ExtendedKalmanFilter::new(cv)],
            transition: [[0.9, 0.1], [0.1, 0.9]],
            mode_probabilities: [0.5, 0.5],
            predicted_probabilities: [0.5, 0.5],
            estimate: StateEstimate::new(DVector::zeros(STATE_DIM), DMatrix::identity(STATE_DIM, STATE_DIM)),
        }
    }

    /// Set every sub-filter to the same state and covariance and reset the
    /// mode probabilities to uniform.
    pub fn initialize(&mut self, x: DVector<f64>, p: DMatrix<f64>) {
        for f in &mut self.filters {
            f.initialize(x.clone(), p.clone());
        }
        self.mode_probabilities = [0.5, 0.5];
        self.predicted_probabilities = [0.5, 0.5];
        self.estimate = StateEstimate::new(x, p);
    }

    pub fn estimate(&self) -> &StateEstimate {
        &self.estimate
    }

    pub fn mode_probabilities(&self) -> [f64; NUM_MODES] {
        self.mode_probabilities
    }

    pub fn filters(&self) -> &[ExtendedKalmanFilter; NUM_MODES] {
        &self.filters
    }

    /// Mix the sub-filter states, then propagate each one `dt` seconds.
    pub fn predict(&mut self, dt: f64) {
        let mu = self.mode_probabilities;

        // c_j = sum_i T(i, j) mu_i
        let mut c = [0.0; NUM_MODES];
        for j in 0..NUM_MODES {
            c[j] = (0..NUM_MODES).map(|i| self.transition[i][j] * mu[i]).sum();
        }

        let states: Vec<DVector<f64>> = self.filters.iter().map(|f| f.state().clone()).collect();
        let covariances: Vec<DMatrix<f64>> = self.filters.iter().map(|f| f.covariance().clone()).collect();

        for j in 0..NUM_MODES {
            // U(i, j) = T(i, j) mu_i / c_j
            let weights: Vec<f64> = (0..NUM_MODES)
                .map(|i| {
                    if c[j] > 0.0 {
                        self.transition[i][j] * mu[i] / c[j]
                    } else {
                        1.0 / NUM_MODES as f64
                    }
                })
                .collect();
            let (x0, p0) = combine(&states, &covariances, &weights);
            self.filters[j].initialize(x0, p0);
            self.filters[j].predict(dt);
        }

        self.predicted_probabilities = c;
        self.blend(c);
    }

    /// Apply a measurement update to every sub-filter and re-weight the modes.
    ///
    /// `update` performs the update on one sub-filter and returns its
    /// measurement likelihood.
    pub fn update(&mut self, mut update: impl FnMut(&mut ExtendedKalmanFilter) -> f64) {
        let mut likelihoods = [0.0; NUM_MODES];
        for (l, f) in likelihoods.iter_mut().zip(self.filters.iter_mut()) {
            *l = update(f);
        }

        let c = self.predicted_probabilities;
        let weighted: Vec<f64> = (0..NUM_MODES).map(|i| likelihoods[i] * c[i]).collect();
        let total: f64 = weighted.iter().sum();
        if total.is_finite() && total > 0.0 {
            for i in 0..NUM_MODES {
                self.mode_probabilities[i] = weighted[i] / (total + PROBABILITY_FLOOR);
            }
        } else {
            self.mode_probabilities = c;
        }
        self.blend(self.mode_probabilities);
    }

    /// Blended prediction `dt` seconds ahead, leaving the filter untouched.
    pub fn compute_prediction(&self, dt: f64) -> StateEstimate {
        let (states, covariances): (Vec<_>, Vec<_>) = self.filters.iter().map(|f| f.compute_prediction(dt)).unzip();
        let (x, p) = combine(&states, &covariances, &self.mode_probabilities);
        StateEstimate::new(x, p)
    }

    fn blend(&mut self, weights: [f64; NUM_MODES]) {
        let states: Vec<DVector<f64>> = self.filters.iter().map(|f| f.state().clone()).collect();
        let covariances: Vec<DMatrix<f64>> = self.filters.iter().map(|f| f.covariance().clone()).collect();
        let (x, p) = combine(&states, &covariances, &weights);
        self.estimate = StateEstimate::new(x, p);
    }
}

/// Weighted Gaussian mixture collapse with heading-aware averaging.
///
/// Returns `x = Σ w_i x_i` and `P = Σ w_i (P_i + d_i d_iᵀ)` where
/// `d_i = x_i - x` with the heading component wrapped.
fn combine(states: &[DVector<f64>], covariances: &[DMatrix<f64>], weights: &[f64]) -> (DVector<f64>, DMatrix<f64>) {
    let reference_heading = states[0][HEADING];
    let mut mean = DVector::zeros(STATE_DIM);
    let mut heading_offset = 0.0;
    for (x, &w) in states.iter().zip(weights) {
        mean += x * w;
        heading_offset += w * wrap_to_pi(x[HEADING] - reference_heading);
    }
    let weight_sum: f64 = weights.iter().sum();
    let normalized_offset = if weight_sum > 0.0 { heading_offset / weight_sum } else { 0.0 };
    mean[HEADING] = wrap_to_pi(reference_heading + normalized_offset);

    let mut cov = DMatrix::zeros(STATE_DIM, STATE_DIM);
    for ((x, p), &w) in states.iter().zip(covariances).zip(weights) {
        let mut d = x - &mean;
        d[HEADING] = wrap_to_pi(d[HEADING]);
        cov += (p + &d * d.transpose()) * w;
    }
    (mean, cov)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{SPEED, X, Y};
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn imm_at(x: f64, y: f64, v: f64, heading: f64) -> ImmFilter {
        let mut imm = ImmFilter::new(ConstantTurnRate::default(), ConstantVelocity::default());
        let mut p = DMatrix::identity(5, 5) * 10.0;
        p[(3, 3)] = 1.0;
        p[(4, 4)] = 1.0;
        imm.initialize(DVector::from_vec(vec![x, y, v, heading, 0.0]), p);
        imm
    }

    fn position_update(z: [f64; 3]) -> impl FnMut(&mut ExtendedKalmanFilter) -> f64 {
        move |f: &mut ExtendedKalmanFilter| {
            let mut h = DMatrix::zeros(3, STATE_DIM);
            h[(0, X)] = 1.0;
            h[(1, Y)] = 1.0;
            h[(2, HEADING)] = 1.0;
            f.update(&DVector::from_row_slice(&z), &h, &DMatrix::identity(3, 3), &[2])
        }
    }

    #[test]
    fn test_initial_probabilities_uniform() {
        let imm = imm_at(0.0, 0.0, 0.0, 0.0);
        assert_eq!(imm.mode_probabilities(), [0.5, 0.5]);
    }

    #[test]
    fn test_probabilities_stay_normalized() {
        let mut imm = imm_at(0.0, 0.0, 5.0, 0.0);
        for k in 1..20 {
            imm.predict(0.1);
            imm.update(position_update([0.5 * k as f64, 0.0, 0.0]));
            let sum: f64 = imm.mode_probabilities().iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
            assert!(imm.mode_probabilities().iter().all(|&m| (0.0..=1.0).contains(&m)));
        }
    }

    #[test]
    fn test_tracks_constant_velocity() {
        let mut imm = imm_at(0.0, 0.0, 0.0, 0.0);
        for k in 1..=30 {
            imm.predict(0.1);
            imm.update(position_update([k as f64 * 0.1 * 10.0, 0.0, 0.0]));
        }
        let est = imm.estimate();
        assert_relative_eq!(est.x(), 30.0, epsilon = 0.5);
        assert_relative_eq!(est.speed(), 10.0, epsilon = 1.5);
        assert!(est.state()[SPEED] > 0.0);
    }

    #[test]
    fn test_combine_wraps_heading() {
        let mut a = DVector::zeros(5);
        a[HEADING] = PI - 0.1;
        let mut b = DVector::zeros(5);
        b[HEADING] = -PI + 0.1;
        let p = DMatrix::identity(5, 5);
        let (mean, cov) = combine(&[a, b], &[p.clone(), p], &[0.5, 0.5]);
        assert_relative_eq!(mean[HEADING].abs(), PI, epsilon = 1e-9);
        assert_relative_eq!(cov[(HEADING, HEADING)], 1.0 + 0.01, epsilon = 1e-9);
    }

    #[test]
    fn test_compute_prediction_leaves_state() {
        let imm = imm_at(0.0, 0.0, 2.0, 0.0);
        let pred = imm.compute_prediction(1.0);
        assert_relative_eq!(pred.x(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(imm.estimate().x(), 0.0);
    }
}
