//! GML 3.2 geometry input.
//!
//! Both entry points expect an [`NsReader`](quick_xml::NsReader) positioned
//! right after the `Start` event of the geometry's root element, and leave it
//! positioned right after the matching `End` event.

mod coords;
mod reader;
mod rewrite;

pub use reader::read_geometry;
pub use rewrite::{has_multipoint_bug, GmlRewriter, MULTIPOINT_BUG_PROBE};

use quick_xml::name::{Namespace, ResolveResult};

use crate::error::{GmlError, Result};

/// The GML 3.2 namespace URI.
pub const GML_NS: &str = "http://www.opengis.net/gml/3.2";

/// Returns whether a resolved element or attribute name is in the GML namespace.
pub(crate) fn is_gml(ns: &ResolveResult<'_>) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == GML_NS.as_bytes())
}

/// Decides whether the spatial engine accepts a GML string.
///
/// Implementations probing a database must isolate a failed probe from the
/// surrounding transaction (e.g. with a savepoint) and must not share one
/// connection between concurrent probes.
pub trait GmlValidator {
    /// Returns `Ok(false)` when the engine rejects the GML.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine could not be asked at all.
    fn is_valid_gml(&mut self, gml: &str) -> Result<bool>;
}

impl<F> GmlValidator for F
where
    F: FnMut(&str) -> bool,
{
    fn is_valid_gml(&mut self, gml: &str) -> Result<bool> {
        Ok(self(gml))
    }
}

/// Checks a GML string with the validator.
///
/// # Errors
///
/// Returns [`GmlError::InvalidGml`] when the validator rejects the GML, or
/// the validator's own error.
pub fn validate_gml(validator: &mut dyn GmlValidator, gml: &str) -> Result<()> {
    if validator.is_valid_gml(gml)? {
        Ok(())
    } else {
        Err(GmlError::InvalidGml {
            gml: gml.to_owned(),
        }
        .into())
    }
}
