//! Delaunay empty-circumcircle property validation.
//!
//! A refined mesh is Delaunay when no mesh point lies strictly inside the
//! circumcircle of any triangle. Only points referenced by at least one
//! triangle are tested; a point orphaned by a pinched cavity is not part of
//! the triangulation.

#![forbid(unsafe_code)]

use thiserror::Error;

use crate::core::collections::{FastHashSet, fast_hash_set_with_capacity};
use crate::core::mesh::{Mesh, MeshError};
use crate::core::triangle::TriangleKey;
use crate::geometry::point::PointIndex;
use crate::geometry::predicates::squared_distance;

/// Errors raised by Delaunay validation.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DelaunayValidationError {
    /// A triangle has a foreign point inside its circumcircle.
    #[error("Triangle {:?} has point {} inside its circumcircle", .0.triangle, .0.point)]
    DelaunayViolation(DelaunayViolation),
    /// The tolerance is negative or not finite.
    #[error("Invalid Delaunay tolerance {tolerance}")]
    InvalidTolerance {
        /// The rejected tolerance.
        tolerance: f64,
    },
    /// A triangle references a missing point.
    #[error("Mesh corruption during Delaunay validation: {0}")]
    Mesh(#[from] MeshError),
}

/// One triangle and one point inside its circumcircle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DelaunayViolation {
    /// The violating triangle.
    pub triangle: TriangleKey,
    /// A point strictly inside its circumcircle.
    pub point: PointIndex,
    /// Squared distance of the point from the circumcenter.
    pub distance_sq: f64,
    /// Squared circumradius.
    pub radius_sq: f64,
}

impl DelaunayViolation {
    /// How deep the point sits inside the circle, relative to the radius.
    #[must_use]
    pub fn relative_depth(&self) -> f64 {
        1.0 - self.distance_sq / self.radius_sq
    }
}

/// Finds every triangle with a referenced point strictly inside its
/// circumcircle.
///
/// A point counts as inside when its squared distance from the circumcenter
/// is below `R²·(1 − tolerance)`, so co-circular points never register. At
/// most one violation (the deepest point) is reported per triangle.
///
/// # Errors
///
/// - [`DelaunayValidationError::InvalidTolerance`] for a negative or
///   non-finite tolerance.
/// - [`DelaunayValidationError::Mesh`] if a triangle references a missing
///   point.
///
/// # Examples
///
/// ```rust
/// use mesh2d::core::mesh::{Mesh, SeedTriangle};
/// use mesh2d::core::triangle::TrianglePosition;
/// use mesh2d::core::validation::find_delaunay_violations;
/// use mesh2d::geometry::point::{Contour, ContourPoint};
///
/// let square = Contour::new(0, vec![
///     ContourPoint::new([0.0, 0.0], 1.0),
///     ContourPoint::new([1.0, 0.0], 1.0),
///     ContourPoint::new([1.0, 1.0], 1.0),
///     ContourPoint::new([0.0, 1.0], 1.0),
/// ]);
/// let mesh = Mesh::from_contours(&[square], &[
///     SeedTriangle::new([0, 1, 2], TrianglePosition::Intern),
///     SeedTriangle::new([0, 2, 3], TrianglePosition::Intern),
/// ]).unwrap();
///
/// // All four corners are co-circular
/// assert!(find_delaunay_violations(&mesh, 1e-9).unwrap().is_empty());
/// ```
pub fn find_delaunay_violations(
    mesh: &Mesh,
    tolerance: f64,
) -> Result<Vec<DelaunayViolation>, DelaunayValidationError> {
    if !(tolerance.is_finite() && tolerance >= 0.0) {
        return Err(DelaunayValidationError::InvalidTolerance { tolerance });
    }

    let mut referenced: FastHashSet<PointIndex> =
        fast_hash_set_with_capacity(mesh.num_points());
    for (_, triangle) in mesh.triangles() {
        for v in triangle.vertices() {
            mesh.coords(v)?;
            referenced.insert(v);
        }
    }
    let mut candidates: Vec<PointIndex> = referenced.into_iter().collect();
    candidates.sort_unstable();

    let mut violations = Vec::new();
    for (key, triangle) in mesh.triangles() {
        let circle = triangle.circle();
        let limit = circle.radius_sq() * (1.0 - tolerance);
        let mut deepest: Option<DelaunayViolation> = None;

        for &index in &candidates {
            if triangle.has_vertex(index) {
                continue;
            }
            let distance_sq = squared_distance(mesh.coords(index)?, circle.center());
            if distance_sq < limit && deepest.is_none_or(|d| distance_sq < d.distance_sq) {
                deepest = Some(DelaunayViolation {
                    triangle: key,
                    point: index,
                    distance_sq,
                    radius_sq: circle.radius_sq(),
                });
            }
        }
        violations.extend(deepest);
    }

    if !violations.is_empty() {
        tracing::debug!(count = violations.len(), "Found Delaunay violations");
    }
    Ok(violations)
}

/// Checks the Delaunay property, stopping at the first violation.
///
/// # Errors
///
/// Returns [`DelaunayValidationError::DelaunayViolation`] for the first
/// violating triangle, or any error of [`find_delaunay_violations`].
pub fn is_delaunay(mesh: &Mesh, tolerance: f64) -> Result<(), DelaunayValidationError> {
    match find_delaunay_violations(mesh, tolerance)?.first() {
        Some(&violation) => Err(DelaunayValidationError::DelaunayViolation(violation)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mesh::SeedTriangle;
    use crate::core::triangle::TrianglePosition;
    use crate::geometry::point::{Contour, ContourPoint, MeshPoint};

    fn quad(points: [[f64; 2]; 4], seeds: [[PointIndex; 3]; 2]) -> Mesh {
        let contour = Contour::new(
            0,
            points
                .into_iter()
                .map(|p| ContourPoint::new(p, 1.0))
                .collect(),
        );
        Mesh::from_contours(
            &[contour],
            &seeds.map(|v| SeedTriangle::new(v, TrianglePosition::Intern)),
        )
        .unwrap()
    }

    #[test]
    fn short_diagonal_is_delaunay() {
        // Rhombus wide along x: the short diagonal is 1-3
        let mesh = quad(
            [[0.0, 0.0], [2.0, -0.5], [4.0, 0.0], [2.0, 0.5]],
            [[0, 1, 3], [1, 2, 3]],
        );
        assert!(find_delaunay_violations(&mesh, 1e-9).unwrap().is_empty());
        assert!(is_delaunay(&mesh, 1e-9).is_ok());
    }

    #[test]
    fn long_diagonal_violates() {
        let mesh = quad(
            [[0.0, 0.0], [2.0, -0.5], [4.0, 0.0], [2.0, 0.5]],
            [[0, 1, 2], [0, 2, 3]],
        );
        let violations = find_delaunay_violations(&mesh, 1e-9).unwrap();
        assert_eq!(violations.len(), 2);
        for v in &violations {
            assert!(v.relative_depth() > 0.0);
            assert!(matches!(v.point, 1 | 3));
        }
        assert!(matches!(
            is_delaunay(&mesh, 1e-9),
            Err(DelaunayValidationError::DelaunayViolation(_))
        ));
    }

    #[test]
    fn unreferenced_points_are_ignored() {
        let mut mesh = quad(
            [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            [[0, 1, 2], [0, 2, 3]],
        );
        mesh.add_point(MeshPoint::interior([0.5, 0.5], 1.0));
        assert!(find_delaunay_violations(&mesh, 1e-9).unwrap().is_empty());
    }

    #[test]
    fn bad_tolerance_is_rejected() {
        let mesh = Mesh::new();
        assert_eq!(
            find_delaunay_violations(&mesh, -1.0).unwrap_err(),
            DelaunayValidationError::InvalidTolerance { tolerance: -1.0 }
        );
        assert!(find_delaunay_violations(&mesh, f64::NAN).is_err());
    }
}
