pub mod arc_2d;

/// 2D point type.
///
/// Coordinates are kept in source order: `x` is the first ordinate read from
/// GML, `y` the second. Axis order is only applied on output.
pub type Point2 = nalgebra::Point2<f64>;
