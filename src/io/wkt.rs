//! WKT (Well-Known Text) encoding.
//!
//! Produces PostGIS extended WKT: `SRID=<n>;<TYPE>(<coords>)`, where the
//! prefix is left out for an unknown reference system.

use std::fmt::{self, Display, Formatter};

use crate::geometry::{AxisOrder, Geometry, Line, Polygon};
use crate::math::Point2;

/// Displays a geometry as extended WKT.
///
/// Coordinates are written east/north. For reference systems declaring
/// north/east axis order the two stored ordinates are swapped.
pub struct Wkt<'a>(pub &'a Geometry);

/// Encodes a geometry as extended WKT.
#[must_use]
pub fn to_wkt(geometry: &Geometry) -> String {
    Wkt(geometry).to_string()
}

impl Display for Wkt<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let srid = self.0.srid();
        if srid.is_known() {
            write!(f, "SRID={srid};")?;
        }
        let coords = Coords {
            f,
            swap: srid.axis_order() == AxisOrder::NorthEast,
        };
        coords.geometry(self.0)
    }
}

struct Coords<'a, 'b> {
    f: &'a mut Formatter<'b>,
    swap: bool,
}

impl Coords<'_, '_> {
    fn geometry(mut self, geometry: &Geometry) -> fmt::Result {
        match geometry {
            Geometry::Point(point) => {
                self.f.write_str("POINT(")?;
                self.point(&point.coord)?;
                self.f.write_str(")")
            }
            Geometry::Line(line) => {
                self.f.write_str("LINESTRING")?;
                self.line(line)
            }
            Geometry::Curve(curve) => {
                self.f.write_str("CIRCULARSTRING")?;
                self.points(&curve.points)
            }
            Geometry::Polygon(polygon) => {
                self.f.write_str("POLYGON")?;
                self.polygon(polygon)
            }
            Geometry::MultiPoint(multi) => {
                self.f.write_str("MULTIPOINT(")?;
                for (i, point) in multi.points.iter().enumerate() {
                    self.separator(i)?;
                    self.f.write_str("(")?;
                    self.point(point)?;
                    self.f.write_str(")")?;
                }
                self.f.write_str(")")
            }
            Geometry::MultiLine(multi) => {
                self.f.write_str("MULTILINESTRING(")?;
                for (i, line) in multi.lines.iter().enumerate() {
                    self.separator(i)?;
                    self.line(line)?;
                }
                self.f.write_str(")")
            }
            Geometry::MultiCurve(multi) => {
                self.f.write_str("MULTICURVE(")?;
                for (i, curve) in multi.curves.iter().enumerate() {
                    self.separator(i)?;
                    self.f.write_str("CIRCULARSTRING")?;
                    self.points(&curve.points)?;
                }
                self.f.write_str(")")
            }
            Geometry::MultiPolygon(multi) => {
                self.f.write_str("MULTIPOLYGON(")?;
                for (i, polygon) in multi.polygons.iter().enumerate() {
                    self.separator(i)?;
                    self.polygon(polygon)?;
                }
                self.f.write_str(")")
            }
        }
    }

    fn polygon(&mut self, polygon: &Polygon) -> fmt::Result {
        self.f.write_str("(")?;
        for (i, ring) in polygon.rings().enumerate() {
            self.separator(i)?;
            self.line(ring)?;
        }
        self.f.write_str(")")
    }

    fn line(&mut self, line: &Line) -> fmt::Result {
        self.points(&line.points)
    }

    fn points(&mut self, points: &[Point2]) -> fmt::Result {
        self.f.write_str("(")?;
        for (i, point) in points.iter().enumerate() {
            self.separator(i)?;
            self.point(point)?;
        }
        self.f.write_str(")")
    }

    // `f64` display is the shortest round-trip decimal and never uses exponents.
    fn point(&mut self, point: &Point2) -> fmt::Result {
        if self.swap {
            write!(self.f, "{} {}", point.y, point.x)
        } else {
            write!(self.f, "{} {}", point.x, point.y)
        }
    }

    fn separator(&mut self, index: usize) -> fmt::Result {
        if index > 0 {
            self.f.write_str(",")?;
        }
        Ok(())
    }
}
