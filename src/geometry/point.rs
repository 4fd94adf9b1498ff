//! Mesh points and their provenance.
//!
//! A [`MeshPoint`] is an immutable planar position with a target element size
//! attached. Points are identified by their index in the owning
//! [`Mesh`](crate::core::mesh::Mesh); once appended, a point is never removed,
//! so a [`PointIndex`] stays valid for the whole refinement run.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Permanent identity of a point inside a mesh.
pub type PointIndex = usize;

// =============================================================================
// PROVENANCE
// =============================================================================

/// Where a point came from.
///
/// # Examples
///
/// ```rust
/// use mesh2d::geometry::point::PointOrigin;
///
/// let origin = PointOrigin::Contour { contour: 0, initial: Some(12) };
/// assert!(origin.is_boundary());
/// assert!(!PointOrigin::Interior.is_boundary());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointOrigin {
    /// The point belongs to an input contour.
    Contour {
        /// Index of the contour the point was read from.
        contour: usize,
        /// Stable identity assigned by the boundary representation, if any.
        ///
        /// Synthetic boundary points carry `None`.
        initial: Option<usize>,
    },
    /// The point was generated by refinement.
    Interior,
}

impl PointOrigin {
    /// Returns `true` for points supplied by an input contour.
    #[must_use]
    pub const fn is_boundary(&self) -> bool {
        matches!(self, Self::Contour { .. })
    }
}

// =============================================================================
// MESH POINT
// =============================================================================

/// A planar point carrying a target element size.
///
/// The size is the desired edge length around the point. It is independent
/// of any triangle quality value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshPoint {
    x: f64,
    y: f64,
    size: f64,
    origin: PointOrigin,
}

impl MeshPoint {
    /// Creates a point with an explicit origin.
    #[must_use]
    pub const fn new(x: f64, y: f64, size: f64, origin: PointOrigin) -> Self {
        Self { x, y, size, origin }
    }

    /// Creates a point generated during refinement.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mesh2d::geometry::point::{MeshPoint, PointOrigin};
    ///
    /// let p = MeshPoint::interior([0.25, 0.5], 0.1);
    /// assert_eq!(p.coords(), [0.25, 0.5]);
    /// assert_eq!(p.origin(), PointOrigin::Interior);
    /// ```
    #[must_use]
    pub const fn interior(coords: [f64; 2], size: f64) -> Self {
        Self::new(coords[0], coords[1], size, PointOrigin::Interior)
    }

    /// Horizontal coordinate.
    #[inline]
    #[must_use]
    pub const fn x(&self) -> f64 {
        self.x
    }

    /// Vertical coordinate.
    #[inline]
    #[must_use]
    pub const fn y(&self) -> f64 {
        self.y
    }

    /// Coordinates as an array.
    #[inline]
    #[must_use]
    pub const fn coords(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Target element size at this point.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> f64 {
        self.size
    }

    /// Provenance of the point.
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> PointOrigin {
        self.origin
    }

    /// Returns `true` if both coordinates and the size are finite.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.size.is_finite()
    }
}

// =============================================================================
// CONTOUR INPUT
// =============================================================================

/// One point of an input contour.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContourPoint {
    /// Coordinates in the working plane.
    pub coords: [f64; 2],
    /// Target element size at the point.
    pub size: f64,
    /// Stable identity from the boundary representation.
    pub initial: Option<usize>,
}

impl ContourPoint {
    /// Creates a contour point without an initial identity.
    #[must_use]
    pub const fn new(coords: [f64; 2], size: f64) -> Self {
        Self {
            coords,
            size,
            initial: None,
        }
    }

    /// Attaches the boundary representation identity.
    #[must_use]
    pub const fn with_initial(mut self, initial: usize) -> Self {
        self.initial = Some(initial);
        self
    }
}

/// A closed, ordered boundary polygon.
///
/// The closing edge from the last point back to the first is implicit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    /// Contour tag, copied into the origin of every point.
    pub index: usize,
    /// Ordered boundary points.
    pub points: Vec<ContourPoint>,
}

impl Contour {
    /// Creates a contour from points.
    #[must_use]
    pub const fn new(index: usize, points: Vec<ContourPoint>) -> Self {
        Self { index, points }
    }

    /// Converts the contour into mesh points, tagging the provenance.
    pub fn mesh_points(&self) -> impl Iterator<Item = MeshPoint> + '_ {
        self.points.iter().map(move |p| {
            MeshPoint::new(
                p.coords[0],
                p.coords[1],
                p.size,
                PointOrigin::Contour {
                    contour: self.index,
                    initial: p.initial,
                },
            )
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contour_points_carry_provenance() {
        let contour = Contour::new(
            3,
            vec![
                ContourPoint::new([0.0, 0.0], 1.0).with_initial(7),
                ContourPoint::new([1.0, 0.0], 0.5),
            ],
        );
        let points: Vec<_> = contour.mesh_points().collect();
        assert_eq!(points.len(), 2);
        assert_eq!(
            points[0].origin(),
            PointOrigin::Contour {
                contour: 3,
                initial: Some(7)
            }
        );
        assert_eq!(
            points[1].origin(),
            PointOrigin::Contour {
                contour: 3,
                initial: None
            }
        );
        assert!((points[1].size() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn non_finite_points_are_detected() {
        assert!(MeshPoint::interior([0.0, 1.0], 0.2).is_finite());
        assert!(!MeshPoint::interior([f64::NAN, 1.0], 0.2).is_finite());
        assert!(!MeshPoint::interior([0.0, 1.0], f64::INFINITY).is_finite());
    }
}
