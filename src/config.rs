//! Tracker configuration.
//!
//! Every tunable constant lives here. Configurations deserialize from JSON
//! with `#[serde(default)]` on each section, so a file only needs the
//! values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::observation::{Observation, SensorKind};
use crate::{Error, Result};

/// Which sensors drive association and identity creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    #[default]
    Lidar,
    Camera,
    Radar,
    Fusion,
}

impl EngineMode {
    /// Whether observations from this sensor mask are processed at all.
    pub fn accepts(self, sensor: SensorKind) -> bool {
        let primary = sensor.primary();
        match self {
            EngineMode::Lidar => primary == SensorKind::LIDAR,
            EngineMode::Camera => primary == SensorKind::CAMERA,
            EngineMode::Radar => primary == SensorKind::RADAR,
            EngineMode::Fusion => !primary.is_empty(),
        }
    }

    /// Whether an unmatched observation may create a new identity.
    pub fn can_spawn(self, observation: &Observation) -> bool {
        let primary = observation.sensor().primary();
        match self {
            EngineMode::Lidar | EngineMode::Fusion => primary == SensorKind::LIDAR,
            EngineMode::Camera => primary == SensorKind::CAMERA,
            EngineMode::Radar => primary == SensorKind::RADAR,
        }
    }
}

/// Identity state machine thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Updates needed before an Init identity is confirmed
    pub min_lifetime_to_confirm: u32,
    /// Grace window (s) in which a Lost identity may return to Confirmed
    pub keep_confirmed_window: f64,
    /// Silence (s) after which a Confirmed identity becomes Lost
    pub confirmed_to_lost_timeout: f64,
    /// Silence (s) after which a Lost or Init identity becomes Idle
    pub idle_timeout: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            min_lifetime_to_confirm: 5,
            keep_confirmed_window: 0.3,
            confirmed_to_lost_timeout: 0.3,
            idle_timeout: 0.3,
        }
    }
}

/// Camera two-ellipse gate parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EllipseConfig {
    /// Major axis as a fraction of the ego distance
    pub distance_factor: f64,
    pub min_major_axis: f64,
    pub min_minor_axis: f64,
    /// Axes of the ellipse aligned with the identity heading
    pub heading_major_axis: f64,
    pub heading_minor_axis: f64,
}

impl Default for EllipseConfig {
    fn default() -> Self {
        Self {
            distance_factor: 0.15,
            min_major_axis: 8.0,
            min_minor_axis: 3.0,
            heading_major_axis: 4.5,
            heading_minor_axis: 2.5,
        }
    }
}

/// Association scoring parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Weight of the normalized distance term in lidar similarity
    pub distance_weight: f64,
    /// Weight of the IoU term in lidar similarity
    pub iou_weight: f64,
    /// Distance (m) at which the distance term reaches zero
    pub max_distance: f64,
    /// Distance in (x, y, vx, vy) space at which radar similarity reaches zero
    pub radar_max_distance: f64,
    /// Matches at or below this similarity are rejected
    pub min_similarity: f64,
    /// Maximum time gap (s) for ego pose lookups
    pub pose_tolerance: f64,
    pub ellipse: EllipseConfig,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            distance_weight: 0.6,
            iou_weight: 0.4,
            max_distance: 6.0,
            radar_max_distance: 6.0,
            min_similarity: 0.05,
            pose_tolerance: 1.0,
            ellipse: EllipseConfig::default(),
        }
    }
}

/// Class and sensor vote parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// Look-back window (s) over checkpoints
    pub window: f64,
    /// Exponential decay rate; weights are `exp(-decay * dt / window)`
    pub decay: f64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            window: 0.5,
            decay: 5.0,
        }
    }
}

/// Measurement noise standard deviations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub x_std: f64,
    pub y_std: f64,
    pub heading_std: f64,
    /// Multiplier on camera standard deviations; defaults to 3.0 in fusion
    /// mode and 1.0 otherwise
    pub camera_scale: Option<f64>,
    /// Velocity variance used when a radar observation carries no covariance
    pub default_velocity_variance: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            x_std: 2.0,
            y_std: 2.0,
            heading_std: 0.7,
            camera_scale: None,
            default_velocity_variance: 1.0,
        }
    }
}

impl NoiseConfig {
    pub fn camera_scale_for(&self, mode: EngineMode) -> f64 {
        self.camera_scale.unwrap_or(match mode {
            EngineMode::Fusion => 3.0,
            _ => 1.0,
        })
    }
}

/// Existence confidence decay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Time (s) over which confidence decays from 1 to 0 without updates
    pub max_lifetime: f64,
    pub floor: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            max_lifetime: 1.0,
            floor: 0.01,
        }
    }
}

/// Motion classification thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Speed (m/s) separating slow from moving
    pub speed_threshold: f64,
    /// Consecutive slow updates before Stopped becomes Stationary
    pub max_stop_cycles: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed_threshold: 0.5,
            max_stop_cycles: 100,
        }
    }
}

/// Top-level tracker configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub mode: EngineMode,
    /// Batches older than the newest seen by more than this (s) are dropped
    pub rollback_threshold: f64,
    /// Span (s) of observation batches kept for replay
    pub batch_history_window: f64,
    /// Span (s) of checkpoints kept per identity
    pub checkpoint_window: f64,
    /// Span (s) of ego poses kept
    pub pose_history_window: f64,
    /// First identity number issued
    pub id_range_start: u32,
    /// One past the last identity number issued
    pub id_range_end: u32,
    pub lifecycle: LifecycleConfig,
    pub association: AssociationConfig,
    pub voting: VotingConfig,
    pub noise: NoiseConfig,
    pub confidence: ConfidenceConfig,
    pub motion: MotionConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(EngineMode::default())
    }
}

impl TrackerConfig {
    /// Default configuration for an engine mode.
    pub fn new(mode: EngineMode) -> Self {
        Self {
            mode,
            rollback_threshold: 0.5,
            batch_history_window: 1.0,
            checkpoint_window: 1.0,
            pose_history_window: 10.0,
            id_range_start: 1,
            id_range_end: 20000,
            lifecycle: LifecycleConfig::default(),
            association: AssociationConfig::default(),
            voting: VotingConfig::default(),
            noise: NoiseConfig::default(),
            confidence: ConfidenceConfig::default(),
            motion: MotionConfig::default(),
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("rollback_threshold", self.rollback_threshold),
            ("batch_history_window", self.batch_history_window),
            ("checkpoint_window", self.checkpoint_window),
            ("pose_history_window", self.pose_history_window),
            ("association.max_distance", self.association.max_distance),
            ("association.radar_max_distance", self.association.radar_max_distance),
            ("association.pose_tolerance", self.association.pose_tolerance),
            ("association.ellipse.min_major_axis", self.association.ellipse.min_major_axis),
            ("association.ellipse.min_minor_axis", self.association.ellipse.min_minor_axis),
            ("association.ellipse.heading_major_axis", self.association.ellipse.heading_major_axis),
            ("association.ellipse.heading_minor_axis", self.association.ellipse.heading_minor_axis),
            ("voting.window", self.voting.window),
            ("noise.x_std", self.noise.x_std),
            ("noise.y_std", self.noise.y_std),
            ("noise.heading_std", self.noise.heading_std),
            ("noise.default_velocity_variance", self.noise.default_velocity_variance),
            ("confidence.max_lifetime", self.confidence.max_lifetime),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidConfig(format!("{} must be positive, got {}", name, value)));
            }
        }

        let non_negative = [
            ("lifecycle.keep_confirmed_window", self.lifecycle.keep_confirmed_window),
            ("lifecycle.confirmed_to_lost_timeout", self.lifecycle.confirmed_to_lost_timeout),
            ("lifecycle.idle_timeout", self.lifecycle.idle_timeout),
            ("association.distance_weight", self.association.distance_weight),
            ("association.iou_weight", self.association.iou_weight),
            ("association.ellipse.distance_factor", self.association.ellipse.distance_factor),
            ("voting.decay", self.voting.decay),
            ("motion.speed_threshold", self.motion.speed_threshold),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::InvalidConfig(format!("{} must be non-negative, got {}", name, value)));
            }
        }

        if !(0.0..1.0).contains(&self.association.min_similarity) {
            return Err(Error::InvalidConfig(format!(
                "association.min_similarity must be in [0, 1), got {}",
                self.association.min_similarity
            )));
        }
        if !(self.confidence.floor > 0.0 && self.confidence.floor < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "confidence.floor must be in (0, 1), got {}",
                self.confidence.floor
            )));
        }
        if let Some(scale) = self.noise.camera_scale {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(Error::InvalidConfig(format!("noise.camera_scale must be positive, got {}", scale)));
            }
        }
        if self.id_range_start >= self.id_range_end {
            return Err(Error::InvalidConfig(format!(
                "identity range [{}, {}) is empty",
                self.id_range_start, self.id_range_end
            )));
        }
        Ok(())
    }
}
