use super::{Line, Srid};

/// A polygon with one exterior ring and any number of holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Line,
    pub interiors: Vec<Line>,
    pub srid: Srid,
}

impl Polygon {
    #[must_use]
    pub fn new(exterior: Line, interiors: Vec<Line>) -> Self {
        let srid = exterior.srid;
        Self {
            exterior,
            interiors,
            srid,
        }
    }

    /// Iterates over the exterior ring followed by the interior rings.
    pub fn rings(&self) -> impl Iterator<Item = &Line> {
        std::iter::once(&self.exterior).chain(&self.interiors)
    }
}
