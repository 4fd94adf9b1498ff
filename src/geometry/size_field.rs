//! Local element-size fields.
//!
//! The refinement engine never computes sizes itself; it queries a
//! [`SizeField`] at arbitrary locations (new points, cavity edge midpoints).
//! Any closure `Fn(f64, f64) -> f64` is a size field.

#![forbid(unsafe_code)]

use crate::geometry::point::MeshPoint;
use crate::geometry::predicates::squared_distance;

/// Desired edge length as a function of position.
///
/// # Examples
///
/// ```rust
/// use mesh2d::geometry::size_field::{SizeField, UniformSize};
///
/// let uniform = UniformSize(0.25);
/// assert_eq!(uniform.size_at(3.0, -1.0), 0.25);
///
/// let graded = |x: f64, _y: f64| 0.25 + 0.5 * x.abs();
/// assert_eq!(graded.size_at(1.0, 0.0), 0.75);
/// ```
pub trait SizeField {
    /// Target size at `(x, y)`.
    fn size_at(&self, x: f64, y: f64) -> f64;
}

impl<F> SizeField for F
where
    F: Fn(f64, f64) -> f64,
{
    #[inline]
    fn size_at(&self, x: f64, y: f64) -> f64 {
        self(x, y)
    }
}

/// The same size everywhere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformSize(pub f64);

impl SizeField for UniformSize {
    #[inline]
    fn size_at(&self, _x: f64, _y: f64) -> f64 {
        self.0
    }
}

/// Inverse-distance interpolation of the sizes carried by a point set.
///
/// Typically built from the contour points so the interior inherits the
/// boundary discretization. A query that coincides with a sample returns that
/// sample's size.
#[derive(Clone, Debug)]
pub struct PointSizeInterpolation {
    samples: Vec<([f64; 2], f64)>,
    fallback: f64,
}

impl PointSizeInterpolation {
    /// Builds the interpolation from mesh points.
    ///
    /// `fallback` is returned when no sample is available.
    #[must_use]
    pub fn new<'a>(points: impl IntoIterator<Item = &'a MeshPoint>, fallback: f64) -> Self {
        let samples = points
            .into_iter()
            .filter(|p| p.is_finite())
            .map(|p| (p.coords(), p.size()))
            .collect();
        Self { samples, fallback }
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if no sample was retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SizeField for PointSizeInterpolation {
    fn size_at(&self, x: f64, y: f64) -> f64 {
        let mut weighted = 0.0;
        let mut total = 0.0;
        for &(coords, size) in &self.samples {
            let d2 = squared_distance(coords, [x, y]);
            if d2 == 0.0 {
                return size;
            }
            let w = d2.recip();
            weighted += w * size;
            total += w;
        }
        if total > 0.0 {
            weighted / total
        } else {
            self.fallback
        }
    }
}
