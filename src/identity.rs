//! Tracked identities and their checkpoint history.

use std::collections::VecDeque;
use std::sync::Arc;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::MotionConfig;
use crate::filter::Estimator;
use crate::geometry::Box3d;
use crate::lifecycle::LifeState;
use crate::motion::{MotionClassifier, MotionType};
use crate::observation::{ObjectClass, Observation, SensorKind};

/// Full mutable state of an identity.
///
/// Checkpoints are owned copies of this struct. The latest observation is
/// shared, since observations never change after construction.
#[derive(Clone, Debug)]
pub struct IdentityState {
    pub id: u32,
    /// Number of observations absorbed, including the one that created it
    pub lifetime: u32,
    /// Time of the latest absorbed observation
    pub timestamp: f64,
    pub class: ObjectClass,
    pub sensor: SensorKind,
    /// Existence confidence in [0, 1]
    pub confidence: f64,
    pub bounding_box: Box3d,
    pub life_state: LifeState,
    pub motion: MotionClassifier,
    pub estimator: Estimator,
    pub latest_observation: Arc<Observation>,
}

impl IdentityState {
    /// Fresh Init state seeded from an unmatched observation.
    pub fn from_observation(id: u32, observation: &Observation, motion: &MotionConfig) -> Self {
        let timestamp = observation.timestamp();
        Self {
            id,
            lifetime: 1,
            timestamp,
            class: observation.class(),
            sensor: observation.sensor(),
            confidence: observation.confidence(),
            bounding_box: Box3d::new(
                Point3::new(observation.x(), observation.y(), observation.z()),
                observation.heading(),
                observation.pitch(),
                observation.length(),
                observation.width(),
                observation.height(),
            ),
            life_state: LifeState::Init,
            motion: MotionClassifier::new(motion),
            estimator: Estimator::new(observation.x(), observation.y(), 0.0, observation.heading(), 0.0, timestamp),
            latest_observation: Arc::new(observation.clone()),
        }
    }

    pub fn motion_type(&self) -> MotionType {
        self.motion.motion()
    }
}

/// A persistent tracked object.
#[derive(Clone, Debug)]
pub struct Identity {
    state: IdentityState,
    checkpoints: VecDeque<IdentityState>,
}

impl Identity {
    pub fn new(state: IdentityState) -> Self {
        Self {
            state,
            checkpoints: VecDeque::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.state.id
    }

    pub fn state(&self) -> &IdentityState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut IdentityState {
        &mut self.state
    }

    pub fn life_state(&self) -> LifeState {
        self.state.life_state
    }

    pub fn timestamp(&self) -> f64 {
        self.state.timestamp
    }

    pub fn class(&self) -> ObjectClass {
        self.state.class
    }

    pub fn sensor(&self) -> SensorKind {
        self.state.sensor
    }

    pub fn confidence(&self) -> f64 {
        self.state.confidence
    }

    pub fn lifetime(&self) -> u32 {
        self.state.lifetime
    }

    pub fn motion_type(&self) -> MotionType {
        self.state.motion_type()
    }

    pub fn bounding_box(&self) -> &Box3d {
        &self.state.bounding_box
    }

    pub fn estimator(&self) -> &Estimator {
        &self.state.estimator
    }

    pub fn latest_observation(&self) -> &Observation {
        &self.state.latest_observation
    }

    /// Checkpoints from oldest to newest.
    pub fn checkpoints(&self) -> &VecDeque<IdentityState> {
        &self.checkpoints
    }

    /// Newest checkpoint strictly earlier than `timestamp`.
    pub fn latest_checkpoint_before(&self, timestamp: f64) -> Option<&IdentityState> {
        self.checkpoints.iter().rev().find(|c| c.timestamp < timestamp)
    }

    /// Record the current state if it changed since the last checkpoint,
    /// then drop checkpoints older than `window` seconds before the newest.
    ///
    /// # Returns
    /// `true` if a checkpoint was stored.
    pub fn save_checkpoint(&mut self, window: f64) -> bool {
        let changed = match self.checkpoints.back() {
            None => true,
            Some(last) if self.state.timestamp < last.timestamp => {
                warn!(
                    id = self.state.id,
                    last = last.timestamp,
                    current = self.state.timestamp,
                    "Checkpoint timestamp would decrease, skipping"
                );
                false
            }
            Some(last) => {
                last.timestamp != self.state.timestamp
                    || last.latest_observation.sensor() != self.state.latest_observation.sensor()
            }
        };
        if !changed {
            return false;
        }

        self.checkpoints.push_back(self.state.clone());
        while let (Some(front), Some(back)) = (self.checkpoints.front(), self.checkpoints.back()) {
            if back.timestamp - front.timestamp <= window {
                break;
            }
            self.checkpoints.pop_front();
        }
        true
    }

    /// Rewind to the newest checkpoint at or before `timestamp`, discarding
    /// every later checkpoint.
    ///
    /// # Returns
    /// `false` if no such checkpoint exists; the identity is then left
    /// untouched and should be discarded by the caller.
    pub fn restore_to(&mut self, timestamp: f64) -> bool {
        let keep = self.checkpoints.partition_point(|c| c.timestamp <= timestamp);
        if keep == 0 {
            return false;
        }
        self.checkpoints.truncate(keep);
        if let Some(last) = self.checkpoints.back() {
            self.state = last.clone();
        }
        true
    }

    /// Owned, serializable view of the current state.
    pub fn snapshot(&self) -> IdentitySnapshot {
        IdentitySnapshot::from(&self.state)
    }
}

/// Read-only output record of an identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub id: u32,
    pub timestamp: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub heading: f64,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub vx: f64,
    pub vy: f64,
    pub confidence: f64,
    pub class: ObjectClass,
    pub sensor: SensorKind,
    pub life_state: LifeState,
    pub motion: MotionType,
    pub lifetime: u32,
}

impl From<&IdentityState> for IdentitySnapshot {
    fn from(state: &IdentityState) -> Self {
        let b = &state.bounding_box;
        Self {
            id: state.id,
            timestamp: state.timestamp,
            x: b.center().x,
            y: b.center().y,
            z: b.center().z,
            heading: b.heading(),
            length: b.length(),
            width: b.width(),
            height: b.height(),
            vx: state.estimator.vx(),
            vy: state.estimator.vy(),
            confidence: state.confidence,
            class: state.class,
            sensor: state.sensor,
            life_state: state.life_state,
            motion: state.motion_type(),
            lifetime: state.lifetime,
        }
    }
}
