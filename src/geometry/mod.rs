mod curve;
mod line;
mod polygon;
mod srid;

pub use curve::Curve;
pub use line::Line;
pub use polygon::Polygon;
pub use srid::{AxisOrder, Srid};

use crate::error::Result;
use crate::math::Point2;

/// A single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub coord: Point2,
    pub srid: Srid,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64, srid: Srid) -> Self {
        Self {
            coord: Point2::new(x, y),
            srid,
        }
    }
}

/// An ordered collection of points.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPoint {
    pub points: Vec<Point2>,
    pub srid: Srid,
}

/// An ordered collection of polylines.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiLine {
    pub lines: Vec<Line>,
    pub srid: Srid,
}

/// An ordered collection of circular strings.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiCurve {
    pub curves: Vec<Curve>,
    pub srid: Srid,
}

/// An ordered collection of polygons.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPolygon {
    pub polygons: Vec<Polygon>,
    pub srid: Srid,
}

/// A 2D geometry tagged with its reference system.
///
/// Built while a GML element is read, then consumed once by linearization
/// or WKT encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    Line(Line),
    Curve(Curve),
    Polygon(Polygon),
    MultiPoint(MultiPoint),
    MultiLine(MultiLine),
    MultiCurve(MultiCurve),
    MultiPolygon(MultiPolygon),
}

impl Geometry {
    /// Returns the reference system of the geometry.
    #[must_use]
    pub fn srid(&self) -> Srid {
        match self {
            Self::Point(g) => g.srid,
            Self::Line(g) => g.srid,
            Self::Curve(g) => g.srid,
            Self::Polygon(g) => g.srid,
            Self::MultiPoint(g) => g.srid,
            Self::MultiLine(g) => g.srid,
            Self::MultiCurve(g) => g.srid,
            Self::MultiPolygon(g) => g.srid,
        }
    }

    /// Returns whether the geometry contains circular arcs.
    #[must_use]
    pub fn is_curved(&self) -> bool {
        matches!(self, Self::Curve(_) | Self::MultiCurve(_))
    }

    /// Replaces circular arcs by polylines, leaving linear geometries untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if any curve cannot be linearized.
    pub fn linearize(self, precision: f64) -> Result<Self> {
        Ok(match self {
            Self::Curve(curve) => Self::Line(curve.linearize(precision)?),
            Self::MultiCurve(multi) => Self::MultiLine(MultiLine {
                lines: multi
                    .curves
                    .iter()
                    .map(|curve| curve.linearize(precision))
                    .collect::<Result<_>>()?,
                srid: multi.srid,
            }),
            linear => linear,
        })
    }
}
