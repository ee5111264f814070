//! Time-decayed class and sensor voting over checkpoint history.

use tracing::warn;

use crate::config::VotingConfig;
use crate::identity::Identity;
use crate::observation::{ObjectClass, Observation, SensorKind};

/// Exponentially decayed weights over a look-back window.
#[derive(Clone, Debug, PartialEq)]
pub struct VoteWindow {
    window: f64,
    decay: f64,
}

impl VoteWindow {
    pub fn new(config: &VotingConfig) -> Self {
        Self {
            window: config.window,
            decay: config.decay,
        }
    }

    pub fn weight(&self, dt: f64) -> f64 {
        (-self.decay * dt / self.window).exp()
    }

    /// Visit the observations stored in `identity`'s checkpoints, newest
    /// first, with their decay weight relative to `now`.
    ///
    /// Checkpoints newer than `now` are logged and skipped; scanning stops
    /// at the first checkpoint older than the window.
    fn scan(&self, identity: &Identity, now: f64, mut visit: impl FnMut(&Observation, f64)) {
        for checkpoint in identity.checkpoints().iter().rev() {
            let dt = now - checkpoint.timestamp;
            if dt < 0.0 {
                warn!(
                    id = identity.id(),
                    checkpoint = checkpoint.timestamp,
                    now,
                    "Checkpoint is newer than the vote time, skipping"
                );
                continue;
            }
            if dt > self.window {
                break;
            }
            visit(&checkpoint.latest_observation, self.weight(dt));
        }
    }
}

/// Picks the class with the highest accumulated confidence.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeVoter {
    window: VoteWindow,
}

impl TypeVoter {
    pub fn new(config: &VotingConfig) -> Self {
        Self {
            window: VoteWindow::new(config),
        }
    }

    /// Vote over the current observation and the identity's recent history.
    ///
    /// Ties resolve to the lowest class index.
    pub fn vote(&self, identity: &Identity, observation: &Observation) -> ObjectClass {
        let mut weights = [0.0; ObjectClass::COUNT];
        weights[observation.class().index()] += observation.confidence();

        self.window.scan(identity, observation.timestamp(), |past, w| {
            weights[past.class().index()] += past.confidence() * w;
        });

        let mut best = 0;
        for (i, &w) in weights.iter().enumerate() {
            if w > weights[best] {
                best = i;
            }
        }
        ObjectClass::from_index(best).unwrap_or_default()
    }
}

/// Unions every sensor that contributed within the window.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorVoter {
    window: VoteWindow,
}

impl SensorVoter {
    pub fn new(config: &VotingConfig) -> Self {
        Self {
            window: VoteWindow::new(config),
        }
    }

    pub fn vote(&self, identity: &Identity, observation: &Observation) -> SensorKind {
        let mut weights = [0.0; SensorKind::SINGLES.len()];
        let mut accumulate = |sensor: SensorKind, w: f64| {
            for (slot, single) in weights.iter_mut().zip(SensorKind::SINGLES) {
                if sensor.contains(single) {
                    *slot += w;
                }
            }
        };

        accumulate(observation.sensor(), 1.0);
        self.window
            .scan(identity, observation.timestamp(), |past, w| accumulate(past.sensor(), w));

        weights
            .iter()
            .zip(SensorKind::SINGLES)
            .filter(|(w, _)| **w > 0.0)
            .fold(SensorKind::NONE, |acc, (_, s)| acc | s)
    }
}
