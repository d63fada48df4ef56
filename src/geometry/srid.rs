use std::fmt;

use crate::error::{GmlError, Result};

/// Order of the two horizontal axes as defined by a coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// Easting (or longitude) first.
    EastNorth,
    /// Northing (or latitude) first.
    NorthEast,
}

/// Spatial reference system identifier (EPSG code).
///
/// `0` stands for an unknown reference system and is never written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Srid(pub u32);

/// EPSG codes of geographic systems whose authority axis order is latitude first.
const NORTH_EAST_SRIDS: &[u32] = &[4019, 4156, 4230, 4258, 4267, 4269, 4283, 4326, 4618];

impl Srid {
    /// The unknown reference system.
    pub const UNKNOWN: Self = Self(0);

    /// Returns whether this is a real reference system.
    #[must_use]
    pub fn is_known(self) -> bool {
        self.0 != 0
    }

    /// Returns the axis order GML coordinates are given in for this system.
    #[must_use]
    pub fn axis_order(self) -> AxisOrder {
        if NORTH_EAST_SRIDS.contains(&self.0) {
            AxisOrder::NorthEast
        } else {
            AxisOrder::EastNorth
        }
    }

    /// Parses the EPSG code out of a GML `srsName` attribute.
    ///
    /// Accepted forms: `EPSG:5514`, `urn:ogc:def:crs:EPSG::5514`,
    /// `urn:ogc:def:crs:EPSG:6.3:5514`, `http://www.opengis.net/def/crs/EPSG/0/5514`
    /// and `http://www.opengis.net/gml/srs/epsg.xml#5514`.
    ///
    /// # Errors
    ///
    /// Returns [`GmlError::InvalidSrsName`] if no EPSG code can be found.
    pub fn from_srs_name(srs_name: &str) -> Result<Self> {
        let name = srs_name.trim();
        let code = if let Some(rest) = strip_prefix_ignore_case(name, "urn:ogc:def:crs:EPSG:") {
            // Optional version between the colons.
            rest.rsplit(':').next()
        } else if let Some(rest) = strip_prefix_ignore_case(name, "http://www.opengis.net/def/crs/EPSG/") {
            rest.rsplit('/').next()
        } else if let Some(rest) = strip_prefix_ignore_case(name, "http://www.opengis.net/gml/srs/epsg.xml#") {
            Some(rest)
        } else {
            strip_prefix_ignore_case(name, "EPSG:")
        };

        code.and_then(|c| c.parse::<u32>().ok())
            .map(Self)
            .ok_or_else(|| GmlError::InvalidSrsName(srs_name.to_owned()).into())
    }
}

impl fmt::Display for Srid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}
