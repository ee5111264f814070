//! Replay a recorded scenario through the tracker.
//!
//! Usage:
//!     cargo run --release --example replay [scenario.json]
//!
//! Scenarios use the fixture format under `testdata/fixtures`. One JSON
//! line of identity snapshots is printed per batch.
//!
//! Example:
//!     RUST_LOG=fusion_tracker=debug cargo run --example replay testdata/fixtures/fixture_fusion_radar.json

use std::env;
use std::fs;
use std::time::Instant;

use nalgebra::Vector3;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fusion_tracker::frames::EgoState;
use fusion_tracker::{ObjectClass, Observation, ObservationBatch, SensorKind, Tracker, TrackerConfig};

#[derive(Debug, Deserialize)]
struct Scenario {
    config: serde_json::Value,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct Step {
    timestamp: f64,
    #[serde(default)]
    poses: Vec<Pose>,
    observations: Vec<RecordedObservation>,
}

#[derive(Debug, Deserialize)]
struct Pose {
    timestamp: f64,
    x: f64,
    y: f64,
    yaw: f64,
}

#[derive(Debug, Deserialize)]
struct RecordedObservation {
    sensor: String,
    timestamp: f64,
    class: ObjectClass,
    confidence: f64,
    center: [f64; 3],
    heading: f64,
    extents: [f64; 3],
    velocity: Option<[f64; 2]>,
}

impl RecordedObservation {
    fn build(&self) -> fusion_tracker::Result<Observation> {
        let sensor = match self.sensor.as_str() {
            "lidar" => SensorKind::LIDAR,
            "camera" => SensorKind::CAMERA,
            "radar" => SensorKind::RADAR,
            other => {
                return Err(fusion_tracker::Error::InvalidObservation(format!("unknown sensor {:?}", other)))
            }
        };
        let mut builder = Observation::builder(self.timestamp, sensor)
            .with_class(self.class)
            .with_confidence(self.confidence)
            .with_center(self.center)
            .with_heading(self.heading)
            .with_extents(self.extents);
        if let Some(velocity) = self.velocity {
            builder = builder.with_velocity(velocity);
        }
        builder.build()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fusion_tracker=info")))
        .with_writer(std::io::stderr)
        .init();

    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "testdata/fixtures/fixture_lidar_dropout.json".to_string());
    let scenario: Scenario = serde_json::from_str(&fs::read_to_string(&path)?)?;
    let config = TrackerConfig::from_json_str(&scenario.config.to_string())?;
    info!(path = %path, mode = ?config.mode, steps = scenario.steps.len(), "Replaying scenario");

    let mut tracker = Tracker::new(config)?;
    let start = Instant::now();

    for step in &scenario.steps {
        for pose in &step.poses {
            let ego = EgoState {
                timestamp: pose.timestamp,
                position: Vector3::new(pose.x, pose.y, 0.0),
                orientation: Vector3::new(0.0, 0.0, pose.yaw),
                ..EgoState::default()
            };
            tracker.update_pose(ego.pose_matrix(), ego.timestamp);
        }

        let observations = step
            .observations
            .iter()
            .map(RecordedObservation::build)
            .collect::<fusion_tracker::Result<Vec<_>>>()?;
        let outcome = tracker.process_batch(ObservationBatch::with_min_timestamp(observations, step.timestamp));
        info!(timestamp = step.timestamp, ?outcome, identities = tracker.identities().len(), "Batch done");

        println!("{}", serde_json::to_string(&tracker.snapshots())?);
    }

    info!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1e3,
        stats = %serde_json::to_string(tracker.stats())?,
        "Replay finished"
    );
    Ok(())
}
