//! Conversion of streamed GML 3.2 geometry to extended WKT.
//!
//! The host application drives an XML reader over an import file and hands
//! each GML geometry element to a [`GmlConverter`], which either encodes it
//! as WKT (linearizing circular arcs on request) or copies it into a
//! standalone GML document for the spatial engine to parse.

pub mod config;
pub mod convert;
pub mod error;
pub mod geometry;
pub mod io;
pub mod math;

pub use config::ConvertConfig;
pub use convert::GmlConverter;
pub use error::{GeometryError, Gml2WktError, GmlError, Result};
pub use geometry::{Geometry, Srid};
pub use io::gml::GmlValidator;
