pub mod gml;
pub mod wkt;
