//! Oriented 3-D box.

use nalgebra::{Point2, Point3, Rotation3, Vector3};

use super::Box2d;

/// An oriented 3-D box described by center, heading, pitch and extents.
#[derive(Clone, Debug, PartialEq)]
pub struct Box3d {
    center: Point3<f64>,
    heading: f64,
    pitch: f64,
    length: f64,
    width: f64,
    height: f64,
    corners: [Point3<f64>; 8],
}

impl Box3d {
    /// Create a box; corner 0..4 form the bottom face, 4..8 the top face.
    pub fn new(center: Point3<f64>, heading: f64, pitch: f64, length: f64, width: f64, height: f64) -> Self {
        let rotation = Rotation3::from_euler_angles(0.0, pitch, heading);
        let (hl, hw, hh) = (length / 2.0, width / 2.0, height / 2.0);

        let offsets = [
            Vector3::new(hl, -hw, -hh),
            Vector3::new(hl, hw, -hh),
            Vector3::new(-hl, hw, -hh),
            Vector3::new(-hl, -hw, -hh),
            Vector3::new(hl, -hw, hh),
            Vector3::new(hl, hw, hh),
            Vector3::new(-hl, hw, hh),
            Vector3::new(-hl, -hw, hh),
        ];
        let corners = offsets.map(|o| center + rotation * o);

        Self {
            center,
            heading,
            pitch,
            length,
            width,
            height,
            corners,
        }
    }

    pub fn center(&self) -> Point3<f64> {
        self.center
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn corners(&self) -> &[Point3<f64>; 8] {
        &self.corners
    }

    pub fn min_z(&self) -> f64 {
        self.corners.iter().map(|c| c.z).fold(f64::INFINITY, f64::min)
    }

    pub fn max_z(&self) -> f64 {
        self.corners.iter().map(|c| c.z).fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn volume(&self) -> f64 {
        self.length * self.width * self.height
    }

    /// Ground-plane footprint of the box.
    pub fn footprint(&self) -> Box2d {
        Box2d::new(Point2::new(self.center.x, self.center.y), self.heading, self.length, self.width)
    }

    /// Same extents and height, moved to a new planar position and heading.
    pub fn moved_to(&self, x: f64, y: f64, heading: f64) -> Self {
        Self::new(
            Point3::new(x, y, self.center.z),
            heading,
            self.pitch,
            self.length,
            self.width,
            self.height,
        )
    }
}
