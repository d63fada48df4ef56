use crate::error::{GmlError, Result};
use crate::math::Point2;

/// Parses whitespace-separated coordinate tuples of `dimension` ordinates.
///
/// Ordinates beyond the second are dropped.
pub(super) fn parse_pos_list(text: &str, dimension: usize) -> Result<Vec<Point2>> {
    let ordinates = text
        .split_ascii_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| GmlError::InvalidCoordinates(format!("`{token}` is not a number")))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if ordinates.len() % dimension != 0 {
        return Err(GmlError::InvalidCoordinates(format!(
            "{} ordinates do not form {dimension}D tuples",
            ordinates.len()
        ))
        .into());
    }

    Ok(ordinates
        .chunks_exact(dimension)
        .map(|tuple| Point2::new(tuple[0], tuple[1]))
        .collect())
}

/// Parses an `srsDimension` attribute value.
pub(super) fn parse_dimension(value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(dimension) if dimension >= 2 => Ok(dimension),
        _ => Err(GmlError::InvalidCoordinates(format!("unsupported srsDimension `{value}`")).into()),
    }
}
