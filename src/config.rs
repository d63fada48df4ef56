use serde::Deserialize;

use crate::geometry::Srid;

/// Parameters controlling GML conversion.
///
/// Owned by the host application and passed into every conversion call.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Maximum deviation of a linearized arc from the true arc, in map units.
    pub precision: f64,
    /// Restructure `MultiPoint` members for spatial engines that mis-parse `pointMembers`.
    pub multipoint_bug_workaround: bool,
    /// Drop geometries the spatial engine rejects instead of failing.
    pub ignore_invalid_gml: bool,
    /// Reference system used when a geometry has no `srsName`.
    pub default_srid: u32,
    /// Replace circular arcs by polylines before encoding WKT.
    pub linearize: bool,
}

impl ConvertConfig {
    /// Returns the fallback reference system.
    #[must_use]
    pub fn fallback_srid(&self) -> Srid {
        Srid(self.default_srid)
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            precision: 0.001,
            multipoint_bug_workaround: false,
            ignore_invalid_gml: false,
            default_srid: 5514,
            linearize: true,
        }
    }
}
