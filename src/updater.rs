//! Applies a matched observation to an identity.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{ConfidenceConfig, EngineMode, TrackerConfig};
use crate::geometry::Box3d;
use crate::identity::Identity;
use crate::lifecycle::LifecycleManager;
use crate::noise::MeasurementNoise;
use crate::observation::{Observation, SensorKind};
use crate::voting::{SensorVoter, TypeVoter};

/// Time-decayed existence confidence fused with an observation confidence.
///
/// The prior decays linearly with the time since the last update (never
/// below `floor`) and is then combined with `observed` by Bayes' rule.
pub fn fuse_confidence(prior: f64, dt: f64, observed: f64, config: &ConfidenceConfig) -> f64 {
    let decayed = (prior - dt.max(0.0) / config.max_lifetime).max(config.floor);
    let support = decayed * observed;
    let denominator = support + (1.0 - decayed) * (1.0 - observed);
    if denominator <= f64::EPSILON {
        return decayed.clamp(0.0, 1.0);
    }
    (support / denominator).clamp(0.0, 1.0)
}

/// Per-mode identity update.
#[derive(Clone, Debug)]
pub struct Updater {
    mode: EngineMode,
    noise: MeasurementNoise,
    type_voter: TypeVoter,
    sensor_voter: SensorVoter,
    lifecycle: LifecycleManager,
    confidence: ConfidenceConfig,
}

impl Updater {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            mode: config.mode,
            noise: MeasurementNoise::new(&config.noise, config.mode),
            type_voter: TypeVoter::new(&config.voting),
            sensor_voter: SensorVoter::new(&config.voting),
            lifecycle: LifecycleManager::new(config.lifecycle.clone()),
            confidence: config.confidence.clone(),
        }
    }

    /// Fuse `observation` into `identity`.
    ///
    /// Runs the estimator update, refreshes the box, re-votes sensor mask and
    /// class, updates motion type and confidence, then advances lifetime and
    /// timestamp and applies the confirmation rule.
    pub fn update(&self, identity: &mut Identity, observation: &Observation) {
        let timestamp = observation.timestamp();
        let primary = observation.sensor().primary();

        // Radar in fusion mode only refines velocity; it carries no class or
        // existence information of its own.
        let informative = !(primary == SensorKind::RADAR && self.mode == EngineMode::Fusion);

        self.update_estimate(identity, observation, primary);

        let sensor = self.sensor_voter.vote(identity, observation);
        let class = if informative {
            Some(self.type_voter.vote(identity, observation))
        } else {
            None
        };

        let state = identity.state_mut();
        state.sensor = sensor;
        if let Some(class) = class {
            state.class = class;
        }

        let (vx, vy) = (state.estimator.vx(), state.estimator.vy());
        state.motion.update(vx, vy);

        if informative {
            let dt = timestamp - state.timestamp;
            state.confidence = fuse_confidence(state.confidence, dt, observation.confidence(), &self.confidence);
        }

        state.latest_observation = Arc::new(observation.clone());
        state.timestamp = timestamp;
        state.lifetime = state.lifetime.saturating_add(1);

        let next = self.lifecycle.evaluate(timestamp, state);
        if next != state.life_state {
            debug!(id = state.id, from = ?state.life_state, to = ?next, "Life state changed on update");
            state.life_state = next;
        }
    }

    fn update_estimate(&self, identity: &mut Identity, observation: &Observation, primary: SensorKind) {
        let state = identity.state_mut();
        let estimator = &mut state.estimator;
        estimator.predict(observation.timestamp());

        match primary {
            SensorKind::LIDAR | SensorKind::CAMERA => {
                let noise = self.noise.position_noise(observation);
                estimator.update_position(observation.x(), observation.y(), observation.heading(), &noise);
                state.bounding_box = Box3d::new(
                    nalgebra::Point3::new(estimator.x(), estimator.y(), observation.z()),
                    estimator.heading(),
                    observation.pitch(),
                    observation.length(),
                    observation.width(),
                    observation.height(),
                );
            }
            SensorKind::RADAR => {
                let Some(v) = observation.velocity() else {
                    warn!(id = state.id, "Radar observation without velocity, skipping update");
                    return;
                };
                if self.mode == EngineMode::Radar {
                    let noise = self.noise.position_velocity_noise(observation);
                    estimator.update_position_velocity(observation.x(), observation.y(), v.x, v.y, &noise);
                    state.bounding_box = Box3d::new(
                        nalgebra::Point3::new(estimator.x(), estimator.y(), observation.z()),
                        estimator.heading(),
                        observation.pitch(),
                        observation.length(),
                        observation.width(),
                        observation.height(),
                    );
                } else {
                    let noise = self.noise.velocity_noise(observation);
                    estimator.update_velocity(v.x, v.y, &noise);
                    state.bounding_box = state.bounding_box.moved_to(estimator.x(), estimator.y(), estimator.heading());
                }
            }
            _ => warn!(id = state.id, "Observation without a sensor kind, skipping update"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionConfig;
    use crate::identity::IdentityState;
    use crate::lifecycle::LifeState;
    use crate::motion::MotionType;
    use crate::observation::ObjectClass;
    use approx::assert_relative_eq;

    fn lidar(t: f64, x: f64, class: ObjectClass, confidence: f64) -> Observation {
        Observation::lidar(t, [x, 0.0, 0.5], 0.0, [4.5, 1.8, 1.5])
            .with_class(class)
            .with_confidence(confidence)
            .build()
            .unwrap()
    }

    fn new_identity(obs: &Observation) -> Identity {
        let mut identity = Identity::new(IdentityState::from_observation(1, obs, &MotionConfig::default()));
        identity.save_checkpoint(1.0);
        identity
    }

    // ===== Confidence =====

    #[test]
    fn test_fuse_confidence() {
        let config = ConfidenceConfig::default();
        // No decay, neutral observation keeps the prior
        assert_relative_eq!(fuse_confidence(0.8, 0.0, 0.5, &config), 0.8, epsilon = 1e-12);
        // 0.1 s decay from 0.8 to 0.7, then fused with 0.9
        let expected = 0.7 * 0.9 / (0.7 * 0.9 + 0.3 * 0.1);
        assert_relative_eq!(fuse_confidence(0.8, 0.1, 0.9, &config), expected, epsilon = 1e-12);
        // Long gaps bottom out at the floor
        let floored = 0.01 * 0.5 / (0.01 * 0.5 + 0.99 * 0.5);
        assert_relative_eq!(fuse_confidence(0.8, 10.0, 0.5, &config), floored, epsilon = 1e-12);
        // Contradictory certainties do not divide by zero
        assert!(fuse_confidence(1.0, 0.0, 0.0, &config).is_finite());
    }

    // ===== Lidar update =====

    #[test]
    fn test_lidar_update_advances_state() {
        let updater = Updater::new(&TrackerConfig::new(EngineMode::Lidar));
        let first = lidar(0.0, 10.0, ObjectClass::Vehicle, 0.9);
        let mut identity = new_identity(&first);

        updater.update(&mut identity, &lidar(0.1, 10.5, ObjectClass::Vehicle, 0.9));
        assert_eq!(identity.lifetime(), 2);
        assert_relative_eq!(identity.timestamp(), 0.1);
        assert!(identity.bounding_box().center().x > 10.0);
        assert_relative_eq!(identity.bounding_box().center().z, 0.5);
        assert_eq!(identity.class(), ObjectClass::Vehicle);
        assert_eq!(identity.sensor(), SensorKind::LIDAR);
        assert!(identity.confidence() > 0.9);
        assert_eq!(identity.life_state(), LifeState::Init);
    }

    #[test]
    fn test_confirms_at_fifth_observation() {
        let updater = Updater::new(&TrackerConfig::new(EngineMode::Lidar));
        let mut identity = new_identity(&lidar(0.0, 10.0, ObjectClass::Vehicle, 0.9));
        for k in 1..=4 {
            let t = k as f64 * 0.1;
            updater.update(&mut identity, &lidar(t, 10.0, ObjectClass::Vehicle, 0.9));
            identity.save_checkpoint(1.0);
        }
        assert_eq!(identity.lifetime(), 5);
        assert_eq!(identity.life_state(), LifeState::Confirmed);
        assert_eq!(identity.motion_type(), MotionType::Stopped);
    }

    #[test]
    fn test_lost_identity_recovers_on_update() {
        let updater = Updater::new(&TrackerConfig::new(EngineMode::Lidar));
        let mut identity = new_identity(&lidar(0.0, 10.0, ObjectClass::Vehicle, 0.9));
        identity.state_mut().life_state = LifeState::Lost;
        updater.update(&mut identity, &lidar(0.5, 10.0, ObjectClass::Vehicle, 0.9));
        assert_eq!(identity.life_state(), LifeState::Confirmed);
    }

    #[test]
    fn test_confidence_stays_in_unit_range_over_many_updates() {
        let updater = Updater::new(&TrackerConfig::new(EngineMode::Lidar));
        let mut identity = new_identity(&lidar(0.0, 10.0, ObjectClass::Vehicle, 0.5));
        let confidences = [0.0, 1.0, 0.5, 1.0, 0.0, 0.99, 0.01];
        let mut t = 0.0;
        for k in 0..200 {
            // Mix short frames with gaps longer than the confidence lifetime
            t += if k % 13 == 0 { 2.5 } else { 0.1 };
            let confidence = confidences[k % confidences.len()];
            updater.update(&mut identity, &lidar(t, 10.0, ObjectClass::Vehicle, confidence));
            let c = identity.confidence();
            assert!((0.0..=1.0).contains(&c), "confidence {} out of range at update {}", c, k);
            assert!(c.is_finite());
        }
    }

    // ===== Radar update =====

    #[test]
    fn test_fusion_radar_updates_velocity_only() {
        let updater = Updater::new(&TrackerConfig::new(EngineMode::Fusion));
        let mut identity = new_identity(&lidar(0.0, 10.0, ObjectClass::Vehicle, 0.6));
        let radar = Observation::radar(0.1, [10.0, 0.0], [5.0, 0.0])
            .with_velocity_covariance([[0.01, 0.0], [0.0, 0.01]])
            .build()
            .unwrap();
        updater.update(&mut identity, &radar);

        assert!(identity.estimator().speed() > 4.0);
        assert_relative_eq!(identity.confidence(), 0.6);
        assert_eq!(identity.class(), ObjectClass::Vehicle);
        assert_eq!(identity.sensor(), SensorKind::LIDAR | SensorKind::RADAR);
        assert_relative_eq!(identity.bounding_box().length(), 4.5);
        assert_eq!(identity.motion_type(), MotionType::Driving);
    }

    #[test]
    fn test_radar_mode_updates_position_and_velocity() {
        let updater = Updater::new(&TrackerConfig::new(EngineMode::Radar));
        let first = Observation::radar(0.0, [10.0, 0.0], [0.0, 0.0]).build().unwrap();
        let mut identity = new_identity(&first);
        let second = Observation::radar(0.1, [11.0, 0.0], [5.0, 0.0]).build().unwrap();
        updater.update(&mut identity, &second);
        assert!(identity.estimator().x() > 10.0);
        assert!(identity.estimator().speed() > 1.0);
    }
}
