use crate::math::Point2;

use super::Srid;

/// A polyline (`LINESTRING`).
///
/// A closed ring has equal first and last points.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub points: Vec<Point2>,
    pub srid: Srid,
}

impl Line {
    /// Creates an empty line in the given reference system.
    #[must_use]
    pub fn new(srid: Srid) -> Self {
        Self {
            points: Vec::new(),
            srid,
        }
    }

    /// Creates a line from existing points.
    #[must_use]
    pub fn from_points(points: Vec<Point2>, srid: Srid) -> Self {
        Self { points, srid }
    }

    /// Appends a point.
    pub fn push(&mut self, point: Point2) {
        self.points.push(point);
    }

    /// Appends a point unless it equals the current last point.
    pub fn push_dedup(&mut self, point: Point2) {
        if self.points.last() != Some(&point) {
            self.points.push(point);
        }
    }

    /// Appends points, skipping any that repeat the running last point.
    pub fn extend_dedup<I: IntoIterator<Item = Point2>>(&mut self, points: I) {
        for point in points {
            self.push_dedup(point);
        }
    }

    /// Returns whether the line forms a closed ring.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.points.len() > 1 && self.points.first() == self.points.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
