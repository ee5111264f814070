//! Per-sensor similarity scores between an identity and an observation.
//!
//! All scores lie in [0, 1] except the ellipse primitives, which return -1
//! for points outside the ellipse.

use nalgebra::{Vector2, Vector4};

use crate::config::{AssociationConfig, EllipseConfig};
use crate::filter::StateEstimate;
use crate::geometry::{intersection_over_union, RotatedRect};
use crate::identity::Identity;
use crate::localization::LocalizationService;
use crate::observation::{ObjectClass, Observation};

/// Linear falloff from 1 at zero distance to 0 at `max_distance`.
pub fn distance_similarity(distance: f64, max_distance: f64) -> f64 {
    if distance > max_distance {
        0.0
    } else {
        1.0 - distance / max_distance
    }
}

/// Lidar score: weighted distance falloff plus oriented-box IoU, both
/// evaluated against the identity predicted to the observation time.
pub fn lidar_similarity(identity: &Identity, observation: &Observation, config: &AssociationConfig) -> f64 {
    let predicted = identity.estimator().compute_prediction(observation.timestamp());
    let b = identity.bounding_box();

    let identity_rect = RotatedRect::new(predicted.x(), predicted.y(), predicted.heading(), b.length(), b.width());
    let observation_rect = RotatedRect::new(
        observation.x(),
        observation.y(),
        observation.heading(),
        observation.length(),
        observation.width(),
    );
    let iou = intersection_over_union(&observation_rect, &identity_rect);

    let distance = (predicted.position() - Vector2::new(observation.x(), observation.y())).norm();
    config.distance_weight * distance_similarity(distance, config.max_distance) + config.iou_weight * iou
}

/// Radar score: distance falloff in (x, y, vx, vy) space.
pub fn radar_similarity(identity: &Identity, observation: &Observation, config: &AssociationConfig) -> f64 {
    let Some(velocity) = observation.velocity() else {
        return 0.0;
    };
    let predicted = identity.estimator().compute_prediction(observation.timestamp());
    let predicted_vec = Vector4::new(predicted.x(), predicted.y(), predicted.vx(), predicted.vy());
    let observed_vec = Vector4::new(observation.x(), observation.y(), velocity.x, velocity.y);
    distance_similarity((predicted_vec - observed_vec).norm(), config.radar_max_distance)
}

/// Score of `point` inside an ellipse centered at `center`.
///
/// Returns `1 - (dx² + dy²)` with `dx`, `dy` the offsets normalized by the
/// semi-axes, or -1 if the point lies outside.
pub fn ellipse_similarity(
    center: &Vector2<f64>,
    point: &Vector2<f64>,
    major_direction: &Vector2<f64>,
    major_axis: f64,
    minor_axis: f64,
) -> f64 {
    let offset = point - center;
    let along = offset.dot(major_direction);
    if along.abs() > major_axis {
        return -1.0;
    }
    let minor_direction = Vector2::new(-major_direction.y, major_direction.x);
    let across = offset.dot(&minor_direction);
    if across.abs() > minor_axis {
        return -1.0;
    }

    let dx = along / (major_axis + f64::EPSILON);
    let dy = across / (minor_axis + f64::EPSILON);
    let dist2 = dx * dx + dy * dy;
    if dist2 > 1.0 {
        -1.0
    } else {
        1.0 - dist2
    }
}

/// Two-ellipse camera score.
///
/// The first ellipse points from the ego vehicle to the predicted identity
/// position and grows with viewing distance; the second follows the
/// predicted heading (skipped for pedestrians). Returns -1 when the
/// observation falls outside either ellipse, 0 when no prediction source or
/// ego pose is available, and otherwise the larger of the two scores.
pub fn camera_similarity(
    identity: &Identity,
    observation: &Observation,
    localization: &LocalizationService,
    config: &AssociationConfig,
) -> f64 {
    let timestamp = observation.timestamp();
    let Some(ego) = localization.pose_at(timestamp, config.pose_tolerance) else {
        return 0.0;
    };
    let Some(checkpoint) = identity.latest_checkpoint_before(timestamp) else {
        return 0.0;
    };
    let predicted: StateEstimate = checkpoint.estimator.compute_prediction(timestamp);

    let identity_pos = predicted.position();
    let observation_pos = Vector2::new(observation.x(), observation.y());
    let ellipse: &EllipseConfig = &config.ellipse;

    let viewing = identity_pos - ego.position();
    let viewing_distance = viewing.norm();
    let viewing_direction = viewing / (viewing_distance + f64::EPSILON);

    let b = identity.bounding_box();
    let major = (viewing_distance * ellipse.distance_factor).max(ellipse.min_major_axis);
    let minor = (major * b.width() / (b.length() + f64::EPSILON)).max(ellipse.min_minor_axis);

    let viewing_score = ellipse_similarity(&identity_pos, &observation_pos, &viewing_direction, major, minor);
    if viewing_score < 0.0 {
        return -1.0;
    }

    let mut heading_score = 0.0;
    if identity.class() != ObjectClass::Pedestrian {
        let (sin_h, cos_h) = predicted.heading().sin_cos();
        heading_score = ellipse_similarity(
            &identity_pos,
            &observation_pos,
            &Vector2::new(cos_h, sin_h),
            ellipse.heading_major_axis,
            ellipse.heading_minor_axis,
        );
        if heading_score < 0.0 {
            return -1.0;
        }
    }

    viewing_score.max(heading_score)
}
