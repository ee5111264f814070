//! # Fusion Tracker - Multi-Object Tracking for Vehicle Perception
//!
//! Fuses time-stamped oriented-box detections from lidar, camera and radar
//! into a stable set of persistent identities with estimated pose, velocity,
//! classification and motion state.
//!
//! ## Features
//!
//! - IMM filter blending constant-velocity and constant-turn-rate EKFs
//! - Greedy association with lidar, camera (two-ellipse) and radar similarities
//! - Time-decayed class and sensor voting over a bounded checkpoint history
//! - Out-of-order batch handling through checkpoint rollback and replay
//! - Fixed identity pool with FIFO reuse
//!
//! ## Example
//!
//! ```rust,ignore
//! use fusion_tracker::{EngineMode, Observation, ObservationBatch, Tracker, TrackerConfig};
//!
//! let mut tracker = Tracker::new(TrackerConfig::new(EngineMode::Lidar)).unwrap();
//!
//! let obs = Observation::lidar(0.0, [10.0, 0.0, 0.0], 0.0, [4.5, 1.8, 1.5])
//!     .with_confidence(0.9)
//!     .build()
//!     .unwrap();
//! tracker.process_batch(ObservationBatch::new(vec![obs]));
//!
//! for identity in tracker.identities() {
//!     println!("{} {:?}", identity.id(), identity.life_state());
//! }
//! ```

// Public modules
pub mod geometry;
pub mod filter;
pub mod observation;
pub mod identity;
pub mod id_pool;
pub mod localization;
pub mod frames;
pub mod lifecycle;
pub mod motion;
pub mod voting;
pub mod noise;
pub mod matching;
pub mod association;
pub mod updater;
pub mod config;
pub mod tracker;

// Re-exports for convenience
pub use config::{EngineMode, TrackerConfig};
pub use identity::{Identity, IdentitySnapshot, IdentityState};
pub use lifecycle::LifeState;
pub use motion::MotionType;
pub use observation::{ObjectClass, Observation, ObservationBatch, SensorKind};
pub use tracker::{BatchOutcome, Tracker, TrackerStats};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the tracking engine
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Invalid observation: {0}")]
        InvalidObservation(String),

        #[error("Identity pool exhausted: all {capacity} ids are in use")]
        IdentityPoolExhausted { capacity: usize },

        #[error("Pose timestamp must increase: last {last}, got {got}")]
        NonMonotonicPose { last: f64, got: f64 },

        #[error("Configuration parse error: {0}")]
        Config(#[from] serde_json::Error),

        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
    }

    /// Result type for tracking operations
    pub type Result<T> = std::result::Result<T, Error>;
}
