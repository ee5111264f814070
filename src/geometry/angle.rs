//! Angle helpers.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Wrap an angle into the half-open interval (-π, π].
pub fn wrap_to_pi(angle: f64) -> f64 {
    let mut wrapped = angle % TAU;
    if wrapped < 0.0 {
        wrapped += TAU;
    }
    if wrapped > PI {
        wrapped -= TAU;
    }
    wrapped
}

/// Convert a cartesian vector to (magnitude, angle).
///
/// The zero vector maps to angle 0 and a vector on the y axis maps to ±π/2,
/// so the result is always finite.
pub fn polar_from_cartesian(x: f64, y: f64) -> (f64, f64) {
    let magnitude = x.hypot(y);
    let angle = if x == 0.0 {
        if y > 0.0 {
            FRAC_PI_2
        } else if y < 0.0 {
            -FRAC_PI_2
        } else {
            0.0
        }
    } else {
        y.atan2(x)
    };
    (magnitude, angle)
}
