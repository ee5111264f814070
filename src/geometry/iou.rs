//! Rotated-rectangle IoU computation.
//!
//! Intersections are computed by clipping one convex polygon against the
//! other (Sutherland-Hodgman) and measuring the result with the shoelace
//! formula.

use std::cmp::Ordering;

use nalgebra::{Point2, Vector2};

use super::{Box2d, GEOMETRY_EPSILON};

/// Planar rotated rectangle used for overlap scoring.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotatedRect {
    pub center_x: f64,
    pub center_y: f64,
    pub heading: f64,
    pub length: f64,
    pub width: f64,
}

impl RotatedRect {
    pub fn new(center_x: f64, center_y: f64, heading: f64, length: f64, width: f64) -> Self {
        Self {
            center_x,
            center_y,
            heading,
            length,
            width,
        }
    }

    /// Counter-clockwise corner polygon.
    pub fn polygon(&self) -> Vec<Point2<f64>> {
        Box2d::new(Point2::new(self.center_x, self.center_y), self.heading, self.length, self.width)
            .corners()
            .to_vec()
    }

    pub fn area(&self) -> f64 {
        self.length * self.width
    }

    fn key(&self) -> [f64; 5] {
        [self.center_x, self.center_y, self.heading, self.length, self.width]
    }

    fn cmp_key(&self, other: &Self) -> Ordering {
        self.key()
            .iter()
            .zip(other.key().iter())
            .map(|(a, b)| a.total_cmp(b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl From<&Box2d> for RotatedRect {
    fn from(b: &Box2d) -> Self {
        Self::new(b.center().x, b.center().y, b.heading(), b.length(), b.width())
    }
}

/// Area of a simple polygon (shoelace formula, always non-negative).
pub fn convex_polygon_area(polygon: &[Point2<f64>]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        twice_area += a.x * b.y - b.x * a.y;
    }
    (twice_area / 2.0).abs()
}

fn cross(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn edge_intersection(p: &Point2<f64>, q: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> Point2<f64> {
    let pq: Vector2<f64> = q - p;
    let ab: Vector2<f64> = b - a;
    let denom = pq.x * ab.y - pq.y * ab.x;
    if denom.abs() < GEOMETRY_EPSILON {
        return *p;
    }
    let t = ((a.x - p.x) * ab.y - (a.y - p.y) * ab.x) / denom;
    p + pq * t
}

/// Clip `subject` against the convex counter-clockwise polygon `clip`.
fn clip_polygon(subject: &[Point2<f64>], clip: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut output = subject.to_vec();
    for i in 0..clip.len() {
        if output.is_empty() {
            break;
        }
        let a = clip[i];
        let b = clip[(i + 1) % clip.len()];
        let input = std::mem::take(&mut output);

        for j in 0..input.len() {
            let current = input[j];
            let previous = input[(j + input.len() - 1) % input.len()];
            let current_inside = cross(&a, &b, &current) >= 0.0;
            let previous_inside = cross(&a, &b, &previous) >= 0.0;

            if current_inside {
                if !previous_inside {
                    output.push(edge_intersection(&previous, &current, &a, &b));
                }
                output.push(current);
            } else if previous_inside {
                output.push(edge_intersection(&previous, &current, &a, &b));
            }
        }
    }
    output
}

/// Intersection-over-union of two rotated rectangles.
///
/// Returns a value in [0, 1]. Degenerate rectangles (zero area) and
/// non-finite inputs yield 0. The result does not depend on argument order.
pub fn intersection_over_union(a: &RotatedRect, b: &RotatedRect) -> f64 {
    if a.key().iter().chain(b.key().iter()).any(|v| !v.is_finite()) {
        return 0.0;
    }
    let area_a = a.area();
    let area_b = b.area();
    if area_a <= GEOMETRY_EPSILON || area_b <= GEOMETRY_EPSILON {
        return 0.0;
    }

    // Canonical order keeps IoU(a, b) bit-identical to IoU(b, a).
    let (first, second) = if a.cmp_key(b) == Ordering::Greater { (b, a) } else { (a, b) };

    let intersection = convex_polygon_area(&clip_polygon(&first.polygon(), &second.polygon()));
    let union = area_a + area_b - intersection;
    if union <= GEOMETRY_EPSILON {
        return 0.0;
    }
    (intersection / union).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_iou_identical() {
        let r = RotatedRect::new(1.0, 2.0, 0.3, 4.0, 2.0);
        assert_relative_eq!(intersection_over_union(&r, &r), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = RotatedRect::new(0.0, 0.0, 0.0, 2.0, 2.0);
        let b = RotatedRect::new(10.0, 0.0, 0.0, 2.0, 2.0);
        assert_eq!(intersection_over_union(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_half_shift() {
        // Two 2x2 squares overlapping by 1x2: IoU = 2 / 6
        let a = RotatedRect::new(0.0, 0.0, 0.0, 2.0, 2.0);
        let b = RotatedRect::new(1.0, 0.0, 0.0, 2.0, 2.0);
        assert_relative_eq!(intersection_over_union(&a, &b), 1.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_iou_rotated_square_is_invariant() {
        let a = RotatedRect::new(0.0, 0.0, 0.0, 2.0, 2.0);
        let b = RotatedRect::new(0.0, 0.0, FRAC_PI_2, 2.0, 2.0);
        assert_relative_eq!(intersection_over_union(&a, &b), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_iou_cross_shape() {
        // 4x2 and 2x4 centered: intersection 4, union 12
        let a = RotatedRect::new(0.0, 0.0, 0.0, 4.0, 2.0);
        let b = RotatedRect::new(0.0, 0.0, FRAC_PI_2, 4.0, 2.0);
        assert_relative_eq!(intersection_over_union(&a, &b), 4.0 / 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_iou_symmetric() {
        let a = RotatedRect::new(0.3, -0.2, 0.7, 4.5, 1.8);
        let b = RotatedRect::new(1.1, 0.4, -0.2, 3.9, 2.1);
        assert_eq!(intersection_over_union(&a, &b), intersection_over_union(&b, &a));
        let v = intersection_over_union(&a, &b);
        assert!(v > 0.0 && v < 1.0);
    }

    #[test]
    fn test_iou_degenerate() {
        let a = RotatedRect::new(0.0, 0.0, 0.0, 0.0, 2.0);
        let b = RotatedRect::new(0.0, 0.0, 0.0, 2.0, 2.0);
        assert_eq!(intersection_over_union(&a, &b), 0.0);
        let nan = RotatedRect::new(f64::NAN, 0.0, 0.0, 2.0, 2.0);
        assert_eq!(intersection_over_union(&nan, &b), 0.0);
    }

    #[test]
    fn test_polygon_area() {
        let square = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        assert_relative_eq!(convex_polygon_area(&square), 4.0);
        assert_eq!(convex_polygon_area(&square[..2]), 0.0);
    }
}
