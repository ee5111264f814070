//! Motion state classification from estimated velocity.

use serde::{Deserialize, Serialize};

use crate::config::MotionConfig;

/// Coarse motion state of an identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionType {
    Unknown,
    /// Moving forward along the x axis
    Driving,
    /// Moving backward along the x axis
    Reverse,
    /// Moving laterally
    Crossing,
    /// Just came to rest
    #[default]
    Stopped,
    /// At rest for a long time
    Stationary,
}

/// Small state machine that turns per-update velocities into a [`MotionType`].
#[derive(Clone, Debug, PartialEq)]
pub struct MotionClassifier {
    motion: MotionType,
    stop_cycles: u32,
    speed_threshold: f64,
    max_stop_cycles: u32,
}

impl MotionClassifier {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            motion: MotionType::Stopped,
            stop_cycles: 0,
            speed_threshold: config.speed_threshold,
            max_stop_cycles: config.max_stop_cycles,
        }
    }

    pub fn motion(&self) -> MotionType {
        self.motion
    }

    pub fn stop_cycles(&self) -> u32 {
        self.stop_cycles
    }

    /// Feed one velocity sample and return the new motion type.
    pub fn update(&mut self, vx: f64, vy: f64) -> MotionType {
        let threshold = self.speed_threshold;
        let slow = vx.hypot(vy) < threshold;

        if slow {
            match self.motion {
                MotionType::Driving | MotionType::Reverse | MotionType::Crossing => {
                    self.motion = MotionType::Stopped;
                }
                MotionType::Stopped | MotionType::Stationary => {
                    self.stop_cycles = (self.stop_cycles + 1).min(self.max_stop_cycles);
                    if self.stop_cycles >= self.max_stop_cycles {
                        self.motion = MotionType::Stationary;
                    }
                }
                MotionType::Unknown => {
                    self.motion = MotionType::Stationary;
                    self.stop_cycles = 0;
                }
            }
        } else {
            self.stop_cycles = 0;
            self.motion = if vx > threshold {
                MotionType::Driving
            } else if vx < -threshold {
                MotionType::Reverse
            } else if vy.abs() > threshold {
                MotionType::Crossing
            } else {
                MotionType::Unknown
            };
        }
        self.motion
    }
}

impl Default for MotionClassifier {
    fn default() -> Self {
        Self::new(&MotionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_stopped() {
        assert_eq!(MotionClassifier::default().motion(), MotionType::Stopped);
    }

    #[test]
    fn test_moving_directions() {
        let mut m = MotionClassifier::default();
        assert_eq!(m.update(3.0, 0.0), MotionType::Driving);
        assert_eq!(m.update(-3.0, 0.0), MotionType::Reverse);
        assert_eq!(m.update(0.1, 2.0), MotionType::Crossing);
        // Fast along a diagonal, but neither component dominates
        assert_eq!(m.update(0.5, 0.5), MotionType::Unknown);
    }

    #[test]
    fn test_stop_after_motion() {
        let mut m = MotionClassifier::default();
        m.update(5.0, 0.0);
        assert_eq!(m.update(0.0, 0.0), MotionType::Stopped);
    }

    #[test]
    fn test_stationary_after_many_slow_updates() {
        let mut m = MotionClassifier::default();
        for _ in 0..99 {
            assert_eq!(m.update(0.0, 0.0), MotionType::Stopped);
        }
        assert_eq!(m.update(0.0, 0.0), MotionType::Stationary);
        assert_eq!(m.stop_cycles(), 100);
        // Stays saturated
        assert_eq!(m.update(0.1, 0.1), MotionType::Stationary);
        assert_eq!(m.stop_cycles(), 100);
    }

    #[test]
    fn test_unknown_then_slow_is_stationary() {
        let mut m = MotionClassifier::default();
        m.update(0.5, 0.5);
        assert_eq!(m.motion(), MotionType::Unknown);
        assert_eq!(m.update(0.0, 0.0), MotionType::Stationary);
        assert_eq!(m.stop_cycles(), 0);
    }

    #[test]
    fn test_fast_resets_counter() {
        let mut m = MotionClassifier::default();
        for _ in 0..10 {
            m.update(0.0, 0.0);
        }
        assert_eq!(m.stop_cycles(), 10);
        m.update(2.0, 0.0);
        assert_eq!(m.stop_cycles(), 0);
    }
}
