//! Identity life states and transition rules.

use serde::{Deserialize, Serialize};

use crate::config::LifecycleConfig;
use crate::identity::IdentityState;

/// Life state of an identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeState {
    /// Scheduled for removal
    Idle,
    /// Newly created, not yet trusted
    #[default]
    Init,
    /// Established track
    Confirmed,
    /// Recently unobserved; may recover
    Lost,
}

/// Pure transition rules over an identity's state and the current time.
#[derive(Clone, Debug, PartialEq)]
pub struct LifecycleManager {
    config: LifecycleConfig,
}

impl LifecycleManager {
    pub fn new(config: LifecycleConfig) -> Self {
        Self { config }
    }

    /// Init with enough updates, or Lost within the grace window.
    pub fn should_confirm(&self, timestamp: f64, state: &IdentityState) -> bool {
        match state.life_state {
            LifeState::Init => state.lifetime >= self.config.min_lifetime_to_confirm,
            LifeState::Lost => timestamp - state.timestamp < self.config.keep_confirmed_window,
            _ => false,
        }
    }

    /// Confirmed but silent for longer than the lost timeout.
    pub fn should_lose(&self, timestamp: f64, state: &IdentityState) -> bool {
        state.life_state == LifeState::Confirmed
            && timestamp - state.timestamp > self.config.confirmed_to_lost_timeout
    }

    /// Lost or Init and silent for longer than the idle timeout.
    pub fn should_idle(&self, timestamp: f64, state: &IdentityState) -> bool {
        matches!(state.life_state, LifeState::Lost | LifeState::Init)
            && timestamp - state.timestamp > self.config.idle_timeout
    }

    /// Apply at most one transition, checking confirm, lose, idle in order.
    pub fn evaluate(&self, timestamp: f64, state: &IdentityState) -> LifeState {
        if self.should_confirm(timestamp, state) {
            LifeState::Confirmed
        } else {
            self.age(timestamp, state)
        }
    }

    /// Time-based demotion only: Confirmed to Lost, or Lost/Init to Idle.
    pub fn age(&self, timestamp: f64, state: &IdentityState) -> LifeState {
        if self.should_lose(timestamp, state) {
            LifeState::Lost
        } else if self.should_idle(timestamp, state) {
            LifeState::Idle
        } else {
            state.life_state
        }
    }
}
