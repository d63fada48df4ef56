use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::NsReader;
use tracing::debug;

use crate::config::ConvertConfig;
use crate::error::{GeometryError, GmlError, Result};
use crate::geometry::{
    Curve, Geometry, Line, MultiCurve, MultiLine, MultiPoint, MultiPolygon, Point, Polygon, Srid,
};
use crate::math::arc_2d::linearize_circle;
use crate::math::Point2;

use super::coords::{parse_dimension, parse_pos_list};
use super::is_gml;

/// Reads the GML geometry whose root start tag was just read.
///
/// The reference system comes from the root `srsName`, falling back to the
/// configured default. Returns `Ok(None)` when the element holds no
/// coordinates at all. Arcs are kept as circular strings where the model
/// allows it; mixed linear and arc segments, circles and composite rings are
/// linearized with the configured precision.
///
/// # Errors
///
/// Returns an error for malformed XML, unsupported GML elements, bad
/// coordinates or degenerate arcs. The rest of the element is still consumed,
/// so the reader can move on to the next record.
pub fn read_geometry<R: BufRead>(
    reader: &mut NsReader<R>,
    start: &BytesStart<'_>,
    config: &ConvertConfig,
) -> Result<Option<Geometry>> {
    let (ns, local) = reader.resolve_element(start.name());
    let root = Element {
        local: String::from_utf8_lossy(local.as_ref()).into_owned(),
        gml: is_gml(&ns),
        start: start.clone().into_owned(),
        empty: false,
    };

    let mut builder = GeometryReader {
        reader,
        srid: config.fallback_srid(),
        dimension: 2,
        precision: config.precision,
        depth: 1,
    };
    let result = builder.read_root(&root);
    if let Err(err) = &result {
        debug!(element = %root.local, depth = builder.depth, %err, "skipping rest of failed geometry");
        // A failure while draining leaves nothing better to report than the first error.
        let _ = builder.drain();
    }
    result
}

/// An element whose start tag has been consumed.
struct Element {
    local: String,
    gml: bool,
    start: BytesStart<'static>,
    empty: bool,
}

impl Element {
    fn is(&self, local: &str) -> bool {
        self.gml && self.local == local
    }

    fn attribute(&self, name: &[u8]) -> Result<Option<String>> {
        for attr in self.start.attributes() {
            let attr = attr?;
            if attr.key.as_ref() == name {
                return Ok(Some(attr.unescape_value()?.into_owned()));
            }
        }
        Ok(None)
    }

    fn unsupported(&self) -> GmlError {
        GmlError::UnsupportedElement(String::from_utf8_lossy(self.start.name().as_ref()).into_owned())
    }
}

enum Node {
    Child(Element),
    Text(String),
    End,
}

/// A curve member: either still circular or already linear.
enum CurveShape {
    Line(Line),
    Curve(Curve),
}

impl CurveShape {
    fn into_line(self, precision: f64) -> Result<Line> {
        match self {
            Self::Line(line) => Ok(line),
            Self::Curve(curve) => curve.linearize(precision),
        }
    }
}

enum Segment {
    Linear(Vec<Point2>),
    Arcs(Curve),
    Circle(Vec<Point2>),
}

struct GeometryReader<'r, R> {
    reader: &'r mut NsReader<R>,
    srid: Srid,
    dimension: usize,
    precision: f64,
    /// Elements opened and not yet closed, the root included.
    depth: usize,
}

impl<R: BufRead> GeometryReader<'_, R> {
    fn read_root(&mut self, root: &Element) -> Result<Option<Geometry>> {
        if let Some(name) = root.attribute(b"srsName")? {
            self.srid = Srid::from_srs_name(&name)?;
        }
        if let Some(value) = root.attribute(b"srsDimension")? {
            self.dimension = parse_dimension(&value)?;
        }
        debug!(element = %root.local, srid = %self.srid, dimension = self.dimension, "reading GML geometry");
        self.geometry(root)
    }

    fn geometry(&mut self, el: &Element) -> Result<Option<Geometry>> {
        if !el.gml {
            return Err(el.unsupported().into());
        }
        let srid = self.srid;
        let geometry = match el.local.as_str() {
            "Point" => self
                .point(el)?
                .map(|coord| Geometry::Point(Point { coord, srid })),
            "LineString" | "LinearRing" => {
                non_empty(self.positions(el)?).map(|points| Geometry::Line(Line::from_points(points, srid)))
            }
            "Curve" => self.curve(el)?.map(|shape| match shape {
                CurveShape::Line(line) => Geometry::Line(line),
                CurveShape::Curve(curve) => Geometry::Curve(curve),
            }),
            "Polygon" => self.polygon(el)?.map(Geometry::Polygon),
            "MultiPoint" => {
                non_empty(self.members(el, Self::point)?).map(|points| Geometry::MultiPoint(MultiPoint { points, srid }))
            }
            "MultiCurve" => non_empty(self.members(el, Self::curve_member)?)
                .map(|shapes| self.multi_curve(shapes))
                .transpose()?,
            "MultiSurface" => non_empty(self.members(el, Self::surface_member)?)
                .map(|polygons| Geometry::MultiPolygon(MultiPolygon { polygons, srid })),
            _ => return Err(el.unsupported().into()),
        };
        if geometry.is_none() {
            debug!(element = %el.local, "GML geometry has no coordinates");
        }
        Ok(geometry)
    }

    fn point(&mut self, el: &Element) -> Result<Option<Point2>> {
        if !el.is("Point") {
            self.skip(el)?;
            return Err(el.unsupported().into());
        }
        Ok(self.positions(el)?.first().copied())
    }

    /// Collects the points of all `pos` and `posList` children.
    fn positions(&mut self, el: &Element) -> Result<Vec<Point2>> {
        let mut points = Vec::new();
        while let Some(child) = self.next_child(el)? {
            if child.is("pos") || child.is("posList") {
                let dimension = match child.attribute(b"srsDimension")? {
                    Some(value) => parse_dimension(&value)?,
                    None => self.dimension,
                };
                let text = self.text(&child)?;
                points.extend(parse_pos_list(&text, dimension)?);
            } else {
                self.skip(&child)?;
            }
        }
        Ok(points)
    }

    fn curve(&mut self, el: &Element) -> Result<Option<CurveShape>> {
        let mut segments = Vec::new();
        while let Some(child) = self.next_child(el)? {
            if child.is("segments") {
                while let Some(segment) = self.next_child(&child)? {
                    segments.push(self.segment(&segment)?);
                }
            } else {
                self.skip(&child)?;
            }
        }
        self.join_segments(segments)
    }

    fn segment(&mut self, el: &Element) -> Result<Segment> {
        if !el.gml {
            self.skip(el)?;
            return Err(el.unsupported().into());
        }
        match el.local.as_str() {
            "LineStringSegment" => Ok(Segment::Linear(self.positions(el)?)),
            "Arc" | "ArcString" => {
                let mut curve = Curve::new(self.srid);
                for point in self.positions(el)? {
                    curve.push(point);
                }
                Ok(Segment::Arcs(curve))
            }
            "Circle" => Ok(Segment::Circle(self.positions(el)?)),
            _ => {
                self.skip(el)?;
                Err(el.unsupported().into())
            }
        }
    }

    fn join_segments(&self, mut segments: Vec<Segment>) -> Result<Option<CurveShape>> {
        if matches!(segments.as_slice(), [Segment::Arcs(_)]) {
            if let Some(Segment::Arcs(curve)) = segments.pop() {
                return match curve.points.len() {
                    0 => Ok(None),
                    count @ (1 | 2) => Err(GeometryError::InsufficientControlPoints { count }.into()),
                    _ => Ok(Some(CurveShape::Curve(curve))),
                };
            }
        }

        let mut line = Line::new(self.srid);
        for segment in segments {
            match segment {
                Segment::Linear(points) => line.extend_dedup(points),
                Segment::Arcs(curve) if curve.points.is_empty() => {}
                Segment::Arcs(curve) => line.extend_dedup(curve.linearize(self.precision)?.points),
                Segment::Circle(points) => match points.as_slice() {
                    [p1, p2, p3, ..] => line.extend_dedup(linearize_circle(self.precision, p1, p2, p3)?),
                    _ => {
                        return Err(GeometryError::InsufficientControlPoints {
                            count: points.len(),
                        }
                        .into())
                    }
                },
            }
        }
        Ok(non_empty(line.points).map(|points| CurveShape::Line(Line::from_points(points, self.srid))))
    }

    fn curve_member(&mut self, el: &Element) -> Result<Option<CurveShape>> {
        if el.is("LineString") {
            let points = self.positions(el)?;
            Ok(non_empty(points).map(|points| CurveShape::Line(Line::from_points(points, self.srid))))
        } else if el.is("Curve") {
            self.curve(el)
        } else {
            self.skip(el)?;
            Err(el.unsupported().into())
        }
    }

    fn multi_curve(&self, shapes: Vec<CurveShape>) -> Result<Geometry> {
        let srid = self.srid;
        if shapes.iter().all(|shape| matches!(shape, CurveShape::Curve(_))) {
            let curves = shapes
                .into_iter()
                .filter_map(|shape| match shape {
                    CurveShape::Curve(curve) => Some(curve),
                    CurveShape::Line(_) => None,
                })
                .collect();
            return Ok(Geometry::MultiCurve(MultiCurve { curves, srid }));
        }
        let lines = shapes
            .into_iter()
            .map(|shape| shape.into_line(self.precision))
            .collect::<Result<_>>()?;
        Ok(Geometry::MultiLine(MultiLine { lines, srid }))
    }

    fn surface_member(&mut self, el: &Element) -> Result<Option<Polygon>> {
        if el.is("Polygon") {
            self.polygon(el)
        } else {
            self.skip(el)?;
            Err(el.unsupported().into())
        }
    }

    fn polygon(&mut self, el: &Element) -> Result<Option<Polygon>> {
        let mut exterior = None;
        let mut interiors = Vec::new();
        while let Some(child) = self.next_child(el)? {
            if child.is("exterior") {
                exterior = self.ring(&child)?;
            } else if child.is("interior") {
                interiors.extend(self.ring(&child)?);
            } else {
                self.skip(&child)?;
            }
        }
        match exterior {
            Some(exterior) => Ok(Some(Polygon::new(exterior, interiors))),
            None if interiors.is_empty() => Ok(None),
            None => Err(GeometryError::EmptyGeometry("polygon has holes but no exterior ring").into()),
        }
    }

    /// Reads the ring inside an `exterior` or `interior` element.
    fn ring(&mut self, el: &Element) -> Result<Option<Line>> {
        let mut ring = None;
        while let Some(child) = self.next_child(el)? {
            if child.is("LinearRing") {
                ring = non_empty(self.positions(&child)?).map(|points| Line::from_points(points, self.srid));
            } else if child.is("Ring") {
                let mut line = Line::new(self.srid);
                for part in self.members(&child, Self::curve_member)? {
                    line.extend_dedup(part.into_line(self.precision)?.points);
                }
                ring = non_empty(line.points).map(|points| Line::from_points(points, self.srid));
            } else {
                self.skip(&child)?;
            }
        }
        Ok(ring)
    }

    /// Reads every geometry inside the `*Member` and `*Members` children of `el`.
    fn members<T>(
        &mut self,
        el: &Element,
        mut read: impl FnMut(&mut Self, &Element) -> Result<Option<T>>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(child) = self.next_child(el)? {
            if child.gml && (child.local.ends_with("Member") || child.local.ends_with("Members")) {
                while let Some(member) = self.next_child(&child)? {
                    items.extend(read(self, &member)?);
                }
            } else {
                self.skip(&child)?;
            }
        }
        Ok(items)
    }

    fn next_node(&mut self) -> Result<Node> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let (start, empty) = match self.reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    self.depth += 1;
                    (e.into_owned(), false)
                }
                Event::Empty(e) => (e.into_owned(), true),
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                    return Ok(Node::End);
                }
                Event::Text(e) => return Ok(Node::Text(e.unescape()?.into_owned())),
                Event::CData(e) => return Ok(Node::Text(String::from_utf8_lossy(&e).into_owned())),
                Event::Eof => return Err(GmlError::UnexpectedEof.into()),
                _ => continue,
            };
            let (ns, local) = self.reader.resolve_element(start.name());
            let gml = is_gml(&ns);
            let local = String::from_utf8_lossy(local.as_ref()).into_owned();
            return Ok(Node::Child(Element {
                local,
                gml,
                start,
                empty,
            }));
        }
    }

    /// Returns the next child element of `parent`, or `None` once its end tag is consumed.
    fn next_child(&mut self, parent: &Element) -> Result<Option<Element>> {
        if parent.empty {
            return Ok(None);
        }
        loop {
            match self.next_node()? {
                Node::Child(child) => return Ok(Some(child)),
                Node::Text(_) => {}
                Node::End => return Ok(None),
            }
        }
    }

    /// Returns the text content of `el`, ignoring nested elements.
    fn text(&mut self, el: &Element) -> Result<String> {
        let mut text = String::new();
        if el.empty {
            return Ok(text);
        }
        loop {
            match self.next_node()? {
                Node::Child(child) => self.skip(&child)?,
                Node::Text(chunk) => text.push_str(&chunk),
                Node::End => return Ok(text),
            }
        }
    }

    /// Consumes events up to the end tag of the root element.
    fn drain(&mut self) -> Result<()> {
        while self.depth > 0 {
            self.next_node()?;
        }
        Ok(())
    }

    fn skip(&mut self, el: &Element) -> Result<()> {
        while let Some(child) = self.next_child(el)? {
            self.skip(&child)?;
        }
        Ok(())
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}
