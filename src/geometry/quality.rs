//! Geometric quality measures for triangles.
//!
//! Two families live here:
//!
//! - **Size quality**: the value the refinement engine orders triangles by,
//!   `N · R / (s_a + s_b + s_c)` with `N = 3`, i.e. the circumradius relative to
//!   the mean target size of the corners. Larger is worse.
//! - **Shape quality**: radius ratio and minimum angle, used for diagnostics on
//!   finished meshes.
//!
//! # References
//!
//! - Shewchuk, J.R. "What Is a Good Linear Element? Interpolation, Conditioning,
//!   Anisotropy, and Quality Measures" (2002)
//! - Rebay, S. "Efficient Unstructured Mesh Generation by Means of Delaunay
//!   Triangulation and Bowyer-Watson Algorithm" *Journal of Computational
//!   Physics* 106.1 (1993): 125-138

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::algorithms::refine::RefinedMesh;
use crate::geometry::point::{MeshPoint, PointIndex};
use crate::geometry::predicates::{distance, triangle_signed_area};

/// Number of corners in the size-quality formula.
pub const SIZE_QUALITY_CORNERS: f64 = 3.0;

/// Errors that can occur during quality metric computation.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum QualityError {
    /// Triangle is degenerate (zero area or zero-length edge).
    #[error("Degenerate triangle with area ≈ {area:e}")]
    DegenerateTriangle {
        /// Absolute area of the triangle.
        area: f64,
    },
    /// A triangle references a point that does not exist.
    #[error("Triangle {triangle} references missing point {point}")]
    MissingPoint {
        /// Index of the triangle in the input slice.
        triangle: usize,
        /// The missing point index.
        point: PointIndex,
    },
}

// =============================================================================
// SIZE QUALITY
// =============================================================================

/// Circumradius relative to the mean corner size.
///
/// Returns `f64::INFINITY` when the sizes sum to zero or less, so such
/// triangles are always refined first.
///
/// # Examples
///
/// ```rust
/// use mesh2d::geometry::quality::size_quality;
///
/// // Right triangle of the unit square: R = √2 / 2
/// let q = size_quality(std::f64::consts::FRAC_1_SQRT_2, [1.0, 1.0, 1.0]);
/// assert!(q < 0.8);
/// ```
#[must_use]
pub fn size_quality(circumradius: f64, sizes: [f64; 3]) -> f64 {
    let total: f64 = sizes.iter().sum();
    if total > 0.0 {
        SIZE_QUALITY_CORNERS * circumradius / total
    } else {
        f64::INFINITY
    }
}

// =============================================================================
// SHAPE QUALITY
// =============================================================================

/// Circumradius divided by inradius.
///
/// An equilateral triangle has the optimal ratio 2.
///
/// # Errors
///
/// Returns [`QualityError::DegenerateTriangle`] for zero-area triangles.
///
/// # Examples
///
/// ```rust
/// use mesh2d::geometry::quality::radius_ratio;
///
/// let h = 3.0_f64.sqrt() / 2.0;
/// let ratio = radius_ratio([0.0, 0.0], [1.0, 0.0], [0.5, h]).unwrap();
/// assert!((ratio - 2.0).abs() < 1e-12);
/// ```
pub fn radius_ratio(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Result<f64, QualityError> {
    let area = triangle_signed_area(a, b, c).abs();
    let (la, lb, lc) = (distance(b, c), distance(c, a), distance(a, b));
    let perimeter = la + lb + lc;
    if area <= f64::EPSILON * perimeter * perimeter {
        return Err(QualityError::DegenerateTriangle { area });
    }
    let circumradius = la * lb * lc / (4.0 * area);
    let inradius = 2.0 * area / perimeter;
    Ok(circumradius / inradius)
}

/// Smallest interior angle, in radians.
///
/// # Errors
///
/// Returns [`QualityError::DegenerateTriangle`] if an edge has zero length.
pub fn min_angle(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Result<f64, QualityError> {
    let (la, lb, lc) = (distance(b, c), distance(c, a), distance(a, b));
    if la == 0.0 || lb == 0.0 || lc == 0.0 {
        return Err(QualityError::DegenerateTriangle {
            area: triangle_signed_area(a, b, c).abs(),
        });
    }
    // Law of cosines, clamped against rounding
    let angle = |opposite: f64, s1: f64, s2: f64| {
        let cos = (s1.mul_add(s1, s2 * s2) - opposite * opposite) / (2.0 * s1 * s2);
        cos.clamp(-1.0, 1.0).acos()
    };
    Ok(angle(la, lb, lc).min(angle(lb, lc, la)).min(angle(lc, la, lb)))
}

// =============================================================================
// MESH SUMMARY
// =============================================================================

/// Aggregate shape statistics for a finished triangle list.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    /// Number of triangles inspected.
    pub triangles: usize,
    /// Smallest angle over all triangles, in radians.
    pub min_angle: f64,
    /// Worst (largest) radius ratio.
    pub max_radius_ratio: f64,
    /// Mean radius ratio.
    pub mean_radius_ratio: f64,
}

impl QualitySummary {
    /// Summarizes a triangle list over `points`.
    ///
    /// # Errors
    ///
    /// Returns [`QualityError::MissingPoint`] for out-of-range indices and
    /// [`QualityError::DegenerateTriangle`] for zero-area triangles.
    pub fn from_triangles(
        points: &[MeshPoint],
        triangles: &[[PointIndex; 3]],
    ) -> Result<Self, QualityError> {
        let mut summary = Self {
            triangles: triangles.len(),
            min_angle: std::f64::consts::PI,
            max_radius_ratio: 0.0,
            mean_radius_ratio: 0.0,
        };
        let mut ratio_sum = 0.0;

        for (t, tri) in triangles.iter().enumerate() {
            let mut corners = [[0.0; 2]; 3];
            for (corner, &index) in corners.iter_mut().zip(tri) {
                *corner = points
                    .get(index)
                    .ok_or(QualityError::MissingPoint {
                        triangle: t,
                        point: index,
                    })?
                    .coords();
            }
            let [a, b, c] = corners;
            let ratio = radius_ratio(a, b, c)?;
            summary.min_angle = summary.min_angle.min(min_angle(a, b, c)?);
            summary.max_radius_ratio = summary.max_radius_ratio.max(ratio);
            ratio_sum += ratio;
        }

        if !triangles.is_empty() {
            #[expect(clippy::cast_precision_loss, reason = "triangle counts stay far below 2^52")]
            let count = triangles.len() as f64;
            summary.mean_radius_ratio = ratio_sum / count;
        }
        Ok(summary)
    }

    /// Summarizes a refinement result.
    ///
    /// # Errors
    ///
    /// See [`QualitySummary::from_triangles`].
    pub fn of(mesh: &RefinedMesh) -> Result<Self, QualityError> {
        Self::from_triangles(mesh.points(), mesh.triangles())
    }
}

// =============================================================================
// TESTS
// =============================================================================
