//! Ego-motion helpers for moving observations and identities between the
//! vehicle (local) frame and the global frame.
//!
//! The tracker itself works in whatever frame its inputs use. Callers feeding
//! local detections convert them with [`to_global`] using an [`EgoState`]
//! interpolated from an [`OdometryBuffer`], and convert results back with
//! [`to_local`].

use nalgebra::{Matrix4, Rotation2, Rotation3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::wrap_to_pi;
use crate::identity::IdentitySnapshot;
use crate::observation::Observation;

/// Default number of ego states kept by [`OdometryBuffer`].
pub const DEFAULT_ODOMETRY_CAPACITY: usize = 50;

/// Ego vehicle state in the global frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EgoState {
    pub timestamp: f64,
    pub position: Vector3<f64>,
    /// Roll, pitch, yaw.
    pub orientation: Vector3<f64>,
    pub linear_velocity: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
}

impl EgoState {
    pub fn yaw(&self) -> f64 {
        self.orientation.z
    }

    /// Homogeneous 4x4 transform from the ego frame to the global frame.
    pub fn pose_matrix(&self) -> Matrix4<f64> {
        let rotation = Rotation3::from_euler_angles(self.orientation.x, self.orientation.y, self.orientation.z);
        let mut m = rotation.to_homogeneous();
        m[(0, 3)] = self.position.x;
        m[(1, 3)] = self.position.y;
        m[(2, 3)] = self.position.z;
        m
    }

    fn lerp(&self, other: &EgoState, fraction: f64, timestamp: f64) -> EgoState {
        let mix = |a: &Vector3<f64>, b: &Vector3<f64>| a + (b - a) * fraction;
        let mut orientation = mix(&self.orientation, &other.orientation);
        // Interpolate yaw along the short arc.
        orientation.z = wrap_to_pi(self.orientation.z + wrap_to_pi(other.orientation.z - self.orientation.z) * fraction);
        EgoState {
            timestamp,
            position: mix(&self.position, &other.position),
            orientation,
            linear_velocity: mix(&self.linear_velocity, &other.linear_velocity),
            angular_velocity: mix(&self.angular_velocity, &other.angular_velocity),
        }
    }
}

/// Fixed-capacity ring buffer of ego states with time interpolation.
#[derive(Clone, Debug)]
pub struct OdometryBuffer {
    states: Vec<EgoState>,
    head: usize,
    capacity: usize,
}

impl OdometryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            states: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    /// Append a state, overwriting the oldest once full.
    pub fn push(&mut self, state: EgoState) {
        if self.states.len() < self.capacity {
            self.states.push(state);
        } else {
            self.states[self.head] = state;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// States from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &EgoState> {
        let (newer, older) = self.states.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    pub fn latest(&self) -> Option<&EgoState> {
        self.iter().last()
    }

    /// Ego state at `timestamp`, linearly interpolated between the two
    /// neighbouring entries.
    ///
    /// Outside the buffered interval the nearest end pair is used and the
    /// interpolation fraction is forced to 1. A single buffered state is
    /// returned as-is; an empty buffer yields `None`.
    pub fn interpolate(&self, timestamp: f64) -> Option<EgoState> {
        let ordered: Vec<&EgoState> = self.iter().collect();
        match ordered.len() {
            0 => return None,
            1 => return Some(ordered[0].clone()),
            _ => {}
        }

        let upper = ordered
            .iter()
            .position(|s| s.timestamp >= timestamp)
            .unwrap_or(ordered.len() - 1)
            .max(1);
        let before = ordered[upper - 1];
        let after = ordered[upper];

        let span = after.timestamp - before.timestamp;
        let mut fraction = if span.abs() > f64::EPSILON {
            (timestamp - before.timestamp) / span
        } else {
            1.0
        };
        if !(0.0..=1.0).contains(&fraction) {
            fraction = 1.0;
        }
        Some(before.lerp(after, fraction, timestamp))
    }
}

impl Default for OdometryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_ODOMETRY_CAPACITY)
    }
}

/// Express a local (ego-frame) observation in the global frame.
pub fn to_global(observation: &Observation, ego: &EgoState) -> Observation {
    let rotation = Rotation2::new(ego.yaw());
    let local = Vector2::new(observation.x(), observation.y());
    let planar = rotation * local + ego.position.xy();
    let center = Vector3::new(planar.x, planar.y, observation.z() + ego.position.z);
    let heading = wrap_to_pi(observation.heading() + ego.yaw());
    let velocity = observation
        .velocity()
        .map(|v| rotation * *v + ego.linear_velocity.xy());
    observation.with_pose(center, heading, velocity)
}

/// Express a global identity snapshot in the ego frame.
pub fn to_local(snapshot: &IdentitySnapshot, ego: &EgoState) -> IdentitySnapshot {
    let inverse = Rotation2::new(-ego.yaw());
    let position = inverse * (Vector2::new(snapshot.x, snapshot.y) - ego.position.xy());
    let velocity = inverse * (Vector2::new(snapshot.vx, snapshot.vy) - ego.linear_velocity.xy());
    IdentitySnapshot {
        x: position.x,
        y: position.y,
        z: snapshot.z - ego.position.z,
        heading: wrap_to_pi(snapshot.heading - ego.yaw()),
        vx: velocity.x,
        vy: velocity.y,
        ..snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn ego(timestamp: f64, x: f64, yaw: f64) -> EgoState {
        EgoState {
            timestamp,
            position: Vector3::new(x, 0.0, 0.0),
            orientation: Vector3::new(0.0, 0.0, yaw),
            ..Default::default()
        }
    }

    // ===== OdometryBuffer =====

    #[test]
    fn test_ring_buffer_overwrites_oldest() {
        let mut buf = OdometryBuffer::new(3);
        for i in 0..5 {
            buf.push(ego(i as f64, 0.0, 0.0));
        }
        let ts: Vec<f64> = buf.iter().map(|s| s.timestamp).collect();
        assert_eq!(ts, vec![2.0, 3.0, 4.0]);
        assert_relative_eq!(buf.latest().unwrap().timestamp, 4.0);
    }

    #[test]
    fn test_interpolation_midpoint() {
        let mut buf = OdometryBuffer::default();
        buf.push(ego(0.0, 0.0, 0.0));
        buf.push(ego(1.0, 10.0, 0.0));
        let s = buf.interpolate(0.25).unwrap();
        assert_relative_eq!(s.position.x, 2.5);
        assert_relative_eq!(s.timestamp, 0.25);
    }

    #[test]
    fn test_interpolation_outside_range_clamps() {
        let mut buf = OdometryBuffer::default();
        buf.push(ego(0.0, 0.0, 0.0));
        buf.push(ego(1.0, 10.0, 0.0));
        buf.push(ego(2.0, 20.0, 0.0));
        assert_relative_eq!(buf.interpolate(5.0).unwrap().position.x, 20.0);
        assert_relative_eq!(buf.interpolate(-1.0).unwrap().position.x, 10.0);
    }

    #[test]
    fn test_interpolation_small_buffers() {
        let mut buf = OdometryBuffer::default();
        assert!(buf.interpolate(0.0).is_none());
        buf.push(ego(3.0, 1.0, 0.0));
        assert_relative_eq!(buf.interpolate(7.0).unwrap().timestamp, 3.0);
    }

    // ===== Frame conversion =====

    #[test]
    fn test_to_global_rotates_and_translates() {
        let obs = Observation::lidar(0.0, [10.0, 0.0, 0.5], 0.0, [4.0, 2.0, 1.5]).build().unwrap();
        let g = to_global(&obs, &ego(0.0, 5.0, FRAC_PI_2));
        assert_relative_eq!(g.x(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(g.y(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(g.heading(), FRAC_PI_2, epsilon = 1e-9);
        assert_relative_eq!(g.length(), 4.0);
    }

    #[test]
    fn test_pose_matrix_translation() {
        let m = ego(0.0, 3.0, 0.0).pose_matrix();
        assert_relative_eq!(m[(0, 3)], 3.0);
        assert_relative_eq!(m[(0, 0)], 1.0);
    }
}
