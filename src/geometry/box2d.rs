//! Oriented 2-D box.

use nalgebra::{Point2, Vector2};

/// An oriented rectangle in the ground plane.
///
/// `length` runs along the heading direction and `width` across it. Corners
/// are cached at construction and ordered counter-clockwise.
#[derive(Clone, Debug, PartialEq)]
pub struct Box2d {
    center: Point2<f64>,
    heading: f64,
    length: f64,
    width: f64,
    cos_heading: f64,
    sin_heading: f64,
    corners: [Point2<f64>; 4],
    min: Point2<f64>,
    max: Point2<f64>,
}

impl Box2d {
    /// Create a box from its center, heading and extents.
    pub fn new(center: Point2<f64>, heading: f64, length: f64, width: f64) -> Self {
        let cos_heading = heading.cos();
        let sin_heading = heading.sin();
        let along = Vector2::new(cos_heading, sin_heading) * (length / 2.0);
        let across = Vector2::new(-sin_heading, cos_heading) * (width / 2.0);

        let corners = [
            center + along - across,
            center + along + across,
            center - along + across,
            center - along - across,
        ];

        let mut min = corners[0];
        let mut max = corners[0];
        for c in &corners[1..] {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }

        Self {
            center,
            heading,
            length,
            width,
            cos_heading,
            sin_heading,
            corners,
            min,
            max,
        }
    }

    /// Create a box from a reference point on the heading axis.
    ///
    /// # Arguments
    /// * `point` - Reference point on the box's longitudinal axis
    /// * `heading` - Box heading
    /// * `front` - Distance from the point to the front edge
    /// * `back` - Distance from the point to the back edge
    /// * `width` - Box width
    pub fn from_axis_point(point: Point2<f64>, heading: f64, front: f64, back: f64, width: f64) -> Self {
        let direction = Vector2::new(heading.cos(), heading.sin());
        let center = point + direction * ((front - back) / 2.0);
        Self::new(center, heading, front + back, width)
    }

    pub fn center(&self) -> Point2<f64> {
        self.center
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn cos_heading(&self) -> f64 {
        self.cos_heading
    }

    pub fn sin_heading(&self) -> f64 {
        self.sin_heading
    }

    /// Corners in counter-clockwise order, starting front-right.
    pub fn corners(&self) -> &[Point2<f64>; 4] {
        &self.corners
    }

    pub fn min_x(&self) -> f64 {
        self.min.x
    }

    pub fn max_x(&self) -> f64 {
        self.max.x
    }

    pub fn min_y(&self) -> f64 {
        self.min.y
    }

    pub fn max_y(&self) -> f64 {
        self.max.y
    }

    pub fn area(&self) -> f64 {
        self.length * self.width
    }

    pub fn diagonal(&self) -> f64 {
        self.length.hypot(self.width)
    }
}
