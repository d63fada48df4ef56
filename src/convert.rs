//! Conversion entry points used by the host's XML import loop.

use std::io::BufRead;

use quick_xml::events::BytesStart;
use quick_xml::NsReader;
use tracing::debug;

use crate::config::ConvertConfig;
use crate::error::Result;
use crate::io::gml::{read_geometry, GmlRewriter, GmlValidator, MULTIPOINT_BUG_PROBE};
use crate::io::wkt::to_wkt;

/// Converts GML geometry elements found in an XML stream.
///
/// Every method expects the reader to be positioned right after the start tag
/// of a GML geometry element and consumes the element up to its end tag.
#[derive(Debug, Clone, Copy)]
pub struct GmlConverter {
    config: ConvertConfig,
}

impl GmlConverter {
    #[must_use]
    pub fn new(config: ConvertConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Reads the geometry element and encodes it as extended WKT.
    ///
    /// Returns `Ok(None)` for a geometry without coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if the element cannot be read or its arcs cannot be
    /// linearized.
    pub fn to_wkt<R: BufRead>(
        &self,
        reader: &mut NsReader<R>,
        start: &BytesStart<'_>,
    ) -> Result<Option<String>> {
        let Some(mut geometry) = read_geometry(reader, start, &self.config)? else {
            return Ok(None);
        };
        if self.config.linearize && geometry.is_curved() {
            geometry = geometry.linearize(self.config.precision)?;
        }
        let wkt = to_wkt(&geometry);
        debug!(srid = %geometry.srid(), len = wkt.len(), "encoded WKT");
        Ok(Some(wkt))
    }

    /// Copies the geometry element into a standalone GML document.
    ///
    /// See [`GmlRewriter::rewrite`] for when the validator is consulted.
    ///
    /// # Errors
    ///
    /// Returns an error if the element cannot be copied or the validator fails.
    pub fn to_gml<R: BufRead>(
        &self,
        reader: &mut NsReader<R>,
        start: &BytesStart<'_>,
        validator: Option<&mut dyn GmlValidator>,
    ) -> Result<Option<String>> {
        GmlRewriter::new(&self.config).rewrite(reader, start, validator)
    }

    /// GML the host should parse once with its spatial engine.
    ///
    /// Pass the engine's text rendering of the result to
    /// [`has_multipoint_bug`](crate::io::gml::has_multipoint_bug) and set
    /// [`ConvertConfig::multipoint_bug_workaround`] accordingly.
    #[must_use]
    pub fn multipoint_bug_probe() -> &'static str {
        MULTIPOINT_BUG_PROBE
    }
}

impl Default for GmlConverter {
    fn default() -> Self {
        Self::new(ConvertConfig::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use quick_xml::events::Event;

    use super::*;
    use crate::error::{GeometryError, Gml2WktError};

    const DOC: &str = concat!(
        r#"<features xmlns:gml="http://www.opengis.net/gml/3.2">"#,
        r#"<parcel id="1"><geometry>"#,
        r#"<gml:Curve srsName="urn:ogc:def:crs:EPSG::5514"><gml:segments>"#,
        r#"<gml:ArcString><gml:posList>0 0 1 1 2 0</gml:posList></gml:ArcString>"#,
        r#"</gml:segments></gml:Curve>"#,
        r#"</geometry><area>12</area></parcel>"#,
        r#"<parcel id="2"><geometry>"#,
        r#"<gml:Point srsName="EPSG:4326"><gml:pos>50.08 14.42</gml:pos></gml:Point>"#,
        r#"</geometry></parcel>"#,
        r#"</features>"#,
    );

    /// Runs `convert` on every element directly below a `geometry` element.
    fn each_geometry<T>(
        xml: &str,
        mut convert: impl FnMut(&mut NsReader<&[u8]>, &BytesStart<'_>) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut reader = NsReader::from_str(xml);
        let mut buf = Vec::new();
        let mut in_geometry = false;
        let mut out = Vec::new();
        loop {
            buf.clear();
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if in_geometry => {
                    let start = e.into_owned();
                    out.push(convert(&mut reader, &start)?);
                }
                Event::Start(e) => in_geometry = e.local_name().as_ref() == b"geometry",
                Event::End(_) => in_geometry = false,
                Event::Eof => return Ok(out),
                _ => {}
            }
        }
    }

    #[test]
    fn converts_stream_to_wkt() {
        let converter = GmlConverter::new(ConvertConfig {
            precision: 0.01,
            ..ConvertConfig::default()
        });
        let wkts = each_geometry(DOC, |reader, start| converter.to_wkt(reader, start)).unwrap();
        assert_eq!(wkts.len(), 2);

        let line = wkts[0].as_deref().unwrap();
        assert!(line.starts_with("SRID=5514;LINESTRING(0 0,"));
        assert!(line.ends_with(",2 0)"));
        assert_eq!(line.matches(',').count(), 12);

        assert_eq!(wkts[1].as_deref(), Some("SRID=4326;POINT(14.42 50.08)"));
    }

    #[test]
    fn keeps_arcs_without_linearization() {
        let converter = GmlConverter::new(ConvertConfig {
            linearize: false,
            ..ConvertConfig::default()
        });
        let wkts = each_geometry(DOC, |reader, start| converter.to_wkt(reader, start)).unwrap();
        assert_eq!(
            wkts[0].as_deref(),
            Some("SRID=5514;CIRCULARSTRING(0 0,1 1,2 0)")
        );
    }

    #[test]
    fn empty_arc_string_converts_to_nothing() {
        let xml = concat!(
            r#"<f xmlns:gml="http://www.opengis.net/gml/3.2"><geometry>"#,
            r#"<gml:Curve><gml:segments><gml:ArcString><gml:posList/></gml:ArcString></gml:segments></gml:Curve>"#,
            r#"</geometry></f>"#,
        );
        for linearize in [false, true] {
            let converter = GmlConverter::new(ConvertConfig {
                linearize,
                ..ConvertConfig::default()
            });
            let wkts = each_geometry(xml, |reader, start| converter.to_wkt(reader, start)).unwrap();
            assert_eq!(wkts, vec![None]);
        }
    }

    #[test]
    fn invalid_precision_fails_conversion() {
        let converter = GmlConverter::new(ConvertConfig {
            precision: 0.0,
            ..ConvertConfig::default()
        });
        let result = each_geometry(DOC, |reader, start| converter.to_wkt(reader, start));
        assert!(matches!(
            result,
            Err(Gml2WktError::Geometry(GeometryError::InvalidPrecision(_)))
        ));
    }

    #[test]
    fn converts_stream_to_gml() {
        let converter = GmlConverter::default();
        let gmls =
            each_geometry(DOC, |reader, start| converter.to_gml(reader, start, None)).unwrap();
        assert_eq!(
            gmls[1].as_deref(),
            Some(concat!(
                r#"<gml:Point xmlns:gml="http://www.opengis.net/gml/3.2" srsName="EPSG:4326">"#,
                r#"<gml:pos>50.08 14.42</gml:pos></gml:Point>"#,
            ))
        );
    }

    #[test]
    fn tolerant_mode_skips_rejected_geometry() {
        let converter = GmlConverter::new(ConvertConfig {
            ignore_invalid_gml: true,
            ..ConvertConfig::default()
        });
        let mut reject_curves = |gml: &str| !gml.contains("Curve");
        let gmls = each_geometry(DOC, |reader, start| {
            converter.to_gml(reader, start, Some(&mut reject_curves))
        })
        .unwrap();
        assert!(gmls[0].is_none());
        assert!(gmls[1].is_some());
    }

    #[test]
    fn probe_is_parseable() {
        let mut reader = NsReader::from_str(GmlConverter::multipoint_bug_probe());
        let mut buf = Vec::new();
        let Event::Start(start) = reader.read_event_into(&mut buf).unwrap() else {
            panic!("probe must start with an element");
        };
        let start = start.into_owned();
        let wkt = GmlConverter::default().to_wkt(&mut reader, &start).unwrap();
        assert_eq!(wkt.as_deref(), Some("SRID=2065;MULTIPOINT((496547 1139895))"));
    }
}
