use crate::error::{GeometryError, Result};
use crate::math::arc_2d::linearize_arc;
use crate::math::Point2;

use super::{Line, Srid};

/// A circular string (`CIRCULARSTRING`).
///
/// Control points form overlapping triples: point `0` starts the first arc,
/// and every following pair `(2i - 1, 2i)` is the interior and end point of
/// an arc starting at the previous arc's end.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub points: Vec<Point2>,
    pub srid: Srid,
}

impl Curve {
    /// Creates an empty curve in the given reference system.
    #[must_use]
    pub fn new(srid: Srid) -> Self {
        Self {
            points: Vec::with_capacity(5),
            srid,
        }
    }

    /// Creates a curve from existing control points.
    #[must_use]
    pub fn from_points(points: Vec<Point2>, srid: Srid) -> Self {
        Self { points, srid }
    }

    /// Appends a control point.
    pub fn push(&mut self, point: Point2) {
        self.points.push(point);
    }

    /// Approximates the curve by a polyline in the same reference system.
    ///
    /// Consecutive arcs share their joining point, which appears once in
    /// the result. A trailing control point that does not complete an arc
    /// is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InsufficientControlPoints`] for fewer than three
    /// control points, or any error of [`linearize_arc`].
    pub fn linearize(&self, precision: f64) -> Result<Line> {
        if self.points.len() < 3 {
            return Err(GeometryError::InsufficientControlPoints {
                count: self.points.len(),
            }
            .into());
        }

        let mut line = Line::new(self.srid);
        line.push(self.points[0]);
        for i in (2..self.points.len()).step_by(2) {
            let arc = linearize_arc(
                precision,
                &self.points[i - 2],
                &self.points[i - 1],
                &self.points[i],
            )?;
            line.points.extend_from_slice(&arc[1..]);
        }
        Ok(line)
    }
}
