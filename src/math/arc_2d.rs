//! 2D circular arc math for three-point arcs.
//!
//! An arc is given by its start point, any interior point and its end point.
//! Orientation convention: a positive [`orientation_det`] means the sweep
//! from the first through the second to the third point is counter-clockwise.

use std::f64::consts::{PI, TAU};

use tracing::debug;

use crate::error::{GeometryError, Result};

use super::Point2;

/// Returns the Euclidean distance between two points.
#[must_use]
pub fn distance(p1: &Point2, p2: &Point2) -> f64 {
    (p2.x - p1.x).hypot(p2.y - p1.y)
}

/// Returns the determinant of the orientation matrix of three points.
///
/// Positive for a counter-clockwise turn, negative for clockwise, zero when
/// the points are co-linear.
#[must_use]
pub fn orientation_det(p1: &Point2, p2: &Point2, p3: &Point2) -> f64 {
    (p3.x - p2.x) * (p1.y - p2.y) - (p1.x - p2.x) * (p3.y - p2.y)
}

/// Computes the center of the circle passing through three points.
///
/// Intersects the perpendicular bisectors of `p2 p1` and `p2 p3`, working
/// in coordinates relative to `p2`.
///
/// # Errors
///
/// Returns [`GeometryError::CollinearPoints`] if the points are exactly co-linear.
#[allow(clippy::float_cmp)]
pub fn arc_center(p1: &Point2, p2: &Point2, p3: &Point2) -> Result<Point2> {
    let dx1 = p1.x - p2.x;
    let dy1 = p1.y - p2.y;
    let dx3 = p3.x - p2.x;
    let dy3 = p3.y - p2.y;

    let ac = dx3 * dy1;
    let bd = dx1 * dy3;
    if ac == bd {
        return Err(GeometryError::CollinearPoints.into());
    }
    let idet = 0.5 / (ac - bd);

    let dxs = (dy3 * dy1 * (p3.y - p1.y) + (dx3 * ac - dx1 * bd)) * idet;
    let dys = (dx3 * dx1 * (p1.x - p3.x) + (dy1 * ac - dy3 * bd)) * idet;
    Ok(Point2::new(p2.x + dxs, p2.y + dys))
}

/// Approximates the arc from `p1` through `p2` to `p3` by a polyline.
///
/// No point of the true arc lies further than `precision` from the chord
/// approximating it. The result always starts with `p1` and ends with `p3`,
/// whatever the sweep direction.
///
/// # Errors
///
/// Returns an error if `precision` is not positive or the points are co-linear.
pub fn linearize_arc(precision: f64, p1: &Point2, p2: &Point2, p3: &Point2) -> Result<Vec<Point2>> {
    check_precision(precision)?;

    let center = arc_center(p1, p2, p3)?;
    let radius = distance(p2, &center);
    let ccw = orientation_det(p1, p2, p3) > 0.0;
    let a1 = (p1.y - center.y).atan2(p1.x - center.x);
    let a3 = (p3.y - center.y).atan2(p3.x - center.x);

    let mut sweep = a3 - a1;
    if !ccw {
        sweep = -sweep;
    }
    if sweep <= 0.0 {
        sweep += TAU;
    }

    let segment_count = if 2.0 * radius > precision {
        // A radius too large for the step angle to resolve means the arc is
        // flat within the precision.
        segment_count(sweep, precision, radius).unwrap_or(1.0)
    } else {
        1.0
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n = segment_count as u32;
    debug!(radius, sweep, segments = n, "linearized arc");

    // Interior points are generated counter-clockwise, starting from whichever
    // endpoint the sweep leaves from.
    let start_angle = if ccw { a1 } else { a3 };
    let mut interior: Vec<Point2> = (1..n)
        .map(|i| {
            let angle = start_angle + f64::from(i) * sweep / segment_count;
            Point2::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect();
    if !ccw {
        interior.reverse();
    }

    let mut points = Vec::with_capacity(interior.len() + 2);
    points.push(*p1);
    points.extend(interior);
    points.push(*p3);
    Ok(points)
}

/// Approximates the full circle through three points by a closed ring.
///
/// The ring starts and ends at `p1`. At least three segments are emitted.
///
/// # Errors
///
/// Returns an error if `precision` is not positive or the points are co-linear.
pub fn linearize_circle(
    precision: f64,
    p1: &Point2,
    p2: &Point2,
    p3: &Point2,
) -> Result<Vec<Point2>> {
    check_precision(precision)?;

    let center = arc_center(p1, p2, p3)?;
    let radius = distance(p1, &center);
    let a1 = (p1.y - center.y).atan2(p1.x - center.x);

    let segment_count = if 0.5 * radius > precision {
        segment_count(TAU, precision, radius).unwrap_or(3.0)
    } else {
        3.0
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n = segment_count as u32;
    debug!(radius, segments = n, "linearized circle");

    let mut points = Vec::with_capacity(n as usize + 1);
    points.push(*p1);
    points.extend((1..n).map(|i| {
        let angle = a1 + f64::from(2 * i) * PI / segment_count;
        Point2::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
    }));
    points.push(*p1);
    Ok(points)
}

/// Upper bound on the segments emitted for one arc or circle.
pub const MAX_SEGMENTS: f64 = 1_048_576.0;

/// Number of chords keeping a sweep of `sweep` radians within `precision` of
/// the arc, capped at [`MAX_SEGMENTS`].
///
/// Returns `None` when `precision / radius` is below the resolution of `f64`
/// and the step angle collapses to zero.
fn segment_count(sweep: f64, precision: f64, radius: f64) -> Option<f64> {
    let step = (1.0 - precision / radius).acos();
    if step <= 0.0 {
        return None;
    }
    let count = (0.5 * sweep / step).ceil();
    count.is_finite().then_some(count.clamp(1.0, MAX_SEGMENTS))
}

fn check_precision(precision: f64) -> Result<()> {
    if precision.is_finite() && precision > 0.0 {
        Ok(())
    } else {
        Err(GeometryError::InvalidPrecision(precision).into())
    }
}
