//! Planar and spatial geometry for oriented boxes.
//!
//! - `Box2d` / `Box3d` - oriented boxes with cached trig and corners
//! - `iou` - rotated-rectangle intersection-over-union
//! - `angle` - heading normalization and safe polar conversion

mod angle;
mod box2d;
mod box3d;
mod iou;

pub use angle::{polar_from_cartesian, wrap_to_pi};
pub use box2d::Box2d;
pub use box3d::Box3d;
pub use iou::{convex_polygon_area, intersection_over_union, RotatedRect};

/// Tolerance used for degenerate-geometry checks.
pub const GEOMETRY_EPSILON: f64 = 1e-10;
