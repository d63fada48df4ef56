use thiserror::Error;

/// Top-level error type for GML conversion.
#[derive(Debug, Error)]
pub enum Gml2WktError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Gml(#[from] GmlError),
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("invalid circle definition: points are co-linear")]
    CollinearPoints,

    #[error("invalid curve definition: need at least 3 control points, but got {count}")]
    InsufficientControlPoints { count: usize },

    #[error("empty geometry: {0}")]
    EmptyGeometry(&'static str),

    #[error("linearization precision must be finite and positive, got {0}")]
    InvalidPrecision(f64),
}

/// Errors related to reading and rewriting GML streams.
#[derive(Debug, Error)]
pub enum GmlError {
    #[error("unsupported XML event: {0}")]
    UnsupportedXmlEvent(String),

    #[error("unexpected end of XML stream inside geometry element")]
    UnexpectedEof,

    #[error("invalid GML: {gml}")]
    InvalidGml { gml: String },

    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("unsupported GML element: {0}")]
    UnsupportedElement(String),

    #[error("invalid srsName: {0}")]
    InvalidSrsName(String),

    #[error("GML validation failed: {0}")]
    Validator(String),

    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for Gml2WktError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Gml(GmlError::Xml(err))
    }
}

impl From<quick_xml::events::attributes::AttrError> for Gml2WktError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::Gml(GmlError::Xml(err.into()))
    }
}

impl From<std::io::Error> for Gml2WktError {
    fn from(err: std::io::Error) -> Self {
        Self::Gml(GmlError::Io(err))
    }
}

/// Convenience type alias for results using [`Gml2WktError`].
pub type Result<T> = std::result::Result<T, Gml2WktError>;
