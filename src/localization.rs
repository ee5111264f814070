//! Time-indexed ego pose history.

use std::collections::VecDeque;

use nalgebra::{Matrix4, Vector2};
use tracing::debug;

use crate::{Error, Result};

/// Ego pose (4x4 homogeneous transform) at a point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedPose {
    pub timestamp: f64,
    pub pose: Matrix4<f64>,
}

impl TimedPose {
    /// Planar translation of the pose.
    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.pose[(0, 3)], self.pose[(1, 3)])
    }
}

/// Bounded, strictly time-ordered pose buffer.
#[derive(Clone, Debug)]
pub struct LocalizationService {
    poses: VecDeque<TimedPose>,
    max_span: f64,
}

impl LocalizationService {
    /// # Arguments
    /// * `max_span` - Maximum time span (seconds) kept between oldest and newest pose
    pub fn new(max_span: f64) -> Self {
        Self {
            poses: VecDeque::new(),
            max_span,
        }
    }

    /// Append a pose.
    ///
    /// # Errors
    /// Returns `Error::NonMonotonicPose` if `timestamp` is not strictly after
    /// the newest stored pose; the buffer is left unchanged.
    pub fn push_pose(&mut self, pose: Matrix4<f64>, timestamp: f64) -> Result<()> {
        if let Some(last) = self.poses.back() {
            if timestamp <= last.timestamp {
                return Err(Error::NonMonotonicPose {
                    last: last.timestamp,
                    got: timestamp,
                });
            }
        }
        self.poses.push_back(TimedPose { timestamp, pose });

        while let (Some(front), Some(back)) = (self.poses.front(), self.poses.back()) {
            if back.timestamp - front.timestamp <= self.max_span {
                break;
            }
            debug!(timestamp = front.timestamp, "Dropping expired pose");
            self.poses.pop_front();
        }
        Ok(())
    }

    /// Pose closest in time to `timestamp`, if one lies within `tolerance`.
    pub fn pose_at(&self, timestamp: f64, tolerance: f64) -> Option<&TimedPose> {
        // First pose strictly after the query, then compare with its predecessor.
        let upper = self.poses.partition_point(|p| p.timestamp <= timestamp);
        let candidates = [upper.checked_sub(1), Some(upper)];

        candidates
            .iter()
            .flatten()
            .filter_map(|&i| self.poses.get(i))
            .map(|p| ((p.timestamp - timestamp).abs(), p))
            .filter(|(dt, _)| *dt <= tolerance)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, p)| p)
    }

    pub fn latest(&self) -> Option<&TimedPose> {
        self.poses.back()
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}
