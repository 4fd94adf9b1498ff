//! Placement of the next insertion point.
//!
//! Four strategies are supported, chosen once per run:
//!
//! - [`PlacementStrategy::Circumcenter`]: the seed's circumcenter (classic
//!   Delaunay refinement).
//! - [`PlacementStrategy::Barycenter`]: the mean of the seed's corners.
//! - [`PlacementStrategy::Voronoi`]: frontal insertion on the Voronoi segment
//!   of the seed's front edge, sized so the new triangle approaches an
//!   equilateral triangle of the local target size.
//! - [`PlacementStrategy::SquareTri`]: frontal insertion at the apex of the
//!   right isosceles triangle standing on the front edge.
//!
//! A *front edge* is an edge whose neighbor is the domain boundary or an
//! accepted triangle.
//!
//! Frontal points never leave the seed's circumcircle: they stop at the
//! circumcenter when it lies farther inside than the half edge, and halfway
//! to the far side of the circle otherwise. The seed therefore always
//! belongs to the cavity of its own insertion point.
//!
//! # References
//!
//! - Rebay, S. "Efficient Unstructured Mesh Generation by Means of Delaunay
//!   Triangulation and Bowyer-Watson Algorithm" *Journal of Computational
//!   Physics* 106.1 (1993): 125-138

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::mesh::{Mesh, MeshError};
use crate::core::triangle::{Triangle, TriangleKey};
use crate::geometry::point::PointIndex;
use crate::geometry::predicates::{barycenter, distance, midpoint};
use crate::geometry::size_field::SizeField;

/// How the insertion point is derived from the seed triangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementStrategy {
    /// Circumcenter of the seed.
    #[default]
    Circumcenter,
    /// Barycenter of the seed.
    Barycenter,
    /// Point on the Voronoi segment of the front edge.
    Voronoi,
    /// Apex of the right isosceles triangle on the front edge.
    SquareTri,
}

impl PlacementStrategy {
    /// Returns `true` for the advancing-front strategies.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mesh2d::core::algorithms::localize::PlacementStrategy;
    ///
    /// assert!(PlacementStrategy::Voronoi.is_frontal());
    /// assert!(!PlacementStrategy::Barycenter.is_frontal());
    /// ```
    #[must_use]
    pub const fn is_frontal(self) -> bool {
        matches!(self, Self::Voronoi | Self::SquareTri)
    }
}

/// Errors raised while placing a point.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum LocalizeError {
    /// A frontal strategy was asked to refine a triangle with no front edge.
    #[error("Triangle {key:?} has no front edge")]
    Ambiguous {
        /// The seed triangle.
        key: TriangleKey,
    },
    /// The seed triangle does not exist.
    #[error("Triangle {key:?} not found")]
    TriangleNotFound {
        /// The stale key.
        key: TriangleKey,
    },
    /// A corner lookup failed.
    #[error("Mesh error during localization: {0}")]
    Mesh(#[from] MeshError),
}

/// Geometry of one triangle edge, seen from inside the triangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeFrame {
    /// Index of the edge (the opposite vertex).
    pub index: usize,
    /// Endpoints, counter-clockwise.
    pub endpoints: (PointIndex, PointIndex),
    /// Midpoint.
    pub midpoint: [f64; 2],
    /// Half of the edge length.
    pub half_length: f64,
    /// Unit normal pointing into the triangle.
    pub normal: [f64; 2],
}

impl EdgeFrame {
    /// Builds the frame of edge `index` of `triangle`.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidPointIndex`] if a corner is missing.
    pub fn of(mesh: &Mesh, triangle: &Triangle, index: usize) -> Result<Self, MeshError> {
        let endpoints = triangle.edge(index);
        let a = mesh.coords(endpoints.0)?;
        let b = mesh.coords(endpoints.1)?;
        let length = distance(a, b);
        let normal = if length > 0.0 {
            // Left of a → b is inside a counter-clockwise triangle
            [-(b[1] - a[1]) / length, (b[0] - a[0]) / length]
        } else {
            [0.0, 0.0]
        };
        Ok(Self {
            index,
            endpoints,
            midpoint: midpoint(a, b),
            half_length: 0.5 * length,
            normal,
        })
    }
}

/// Returns `true` if the edge opposite vertex `index` is a front edge.
#[must_use]
pub fn is_front_edge(mesh: &Mesh, triangle: &Triangle, index: usize) -> bool {
    triangle
        .neighbor(index)
        .is_none_or(|n| mesh.triangle(n).is_some_and(|t| t.position().is_accepted()))
}

/// Longest front edge of a triangle, lowest index on ties.
///
/// # Errors
///
/// Returns [`MeshError::InvalidPointIndex`] if a corner is missing.
pub fn front_edge(mesh: &Mesh, triangle: &Triangle) -> Result<Option<EdgeFrame>, MeshError> {
    longest_edge(mesh, triangle, |i| is_front_edge(mesh, triangle, i))
}

/// Longest edge satisfying `filter`, lowest index on ties.
pub(crate) fn longest_edge<F>(
    mesh: &Mesh,
    triangle: &Triangle,
    filter: F,
) -> Result<Option<EdgeFrame>, MeshError>
where
    F: Fn(usize) -> bool,
{
    let mut best: Option<EdgeFrame> = None;
    for index in (0..3).filter(|&i| filter(i)) {
        let frame = EdgeFrame::of(mesh, triangle, index)?;
        if best.is_none_or(|b| frame.half_length > b.half_length) {
            best = Some(frame);
        }
    }
    Ok(best)
}

/// Computes the insertion point for `key` under `strategy`.
///
/// # Errors
///
/// - [`LocalizeError::TriangleNotFound`] if `key` is stale.
/// - [`LocalizeError::Ambiguous`] if a frontal strategy finds no front edge.
pub fn localize<S>(
    mesh: &Mesh,
    key: TriangleKey,
    strategy: PlacementStrategy,
    size_field: &S,
) -> Result<[f64; 2], LocalizeError>
where
    S: SizeField + ?Sized,
{
    let triangle = mesh
        .triangle(key)
        .ok_or(LocalizeError::TriangleNotFound { key })?;

    match strategy {
        PlacementStrategy::Circumcenter => Ok(triangle.circle().center()),
        PlacementStrategy::Barycenter => {
            let [a, b, c] = mesh.corner_coords(triangle.vertices())?;
            Ok(barycenter(a, b, c))
        }
        PlacementStrategy::Voronoi | PlacementStrategy::SquareTri => {
            let edge = front_edge(mesh, triangle)?.ok_or(LocalizeError::Ambiguous { key })?;
            let m = edge.midpoint;
            let size = size_field.size_at(m[0], m[1]);
            let target = if strategy == PlacementStrategy::Voronoi {
                size / 3.0_f64.sqrt()
            } else {
                size / 2.0_f64.sqrt()
            };
            let offset = frontal_offset(&edge, triangle, target);
            Ok(along(m, edge.normal, offset))
        }
    }
}

/// Distance from the front edge midpoint to the insertion point.
///
/// The new triangle on the edge gets circumradius `max(target, p)`, `p` the
/// half edge, capped inside the seed's circumcircle. `target` is the
/// circumradius of the ideal triangle of the local size: `size/√3` for the
/// equilateral one, `size/√2` for the right isosceles one with legs `size`.
/// The size field gives an edge length, never a radius, so it is not used
/// as `target` directly.
fn frontal_offset(edge: &EdgeFrame, triangle: &Triangle, target: f64) -> f64 {
    let p = edge.half_length;
    let rho = target.max(p);
    let ideal = rho + rho.mul_add(rho, -(p * p)).max(0.0).sqrt();

    let circle = triangle.circle();
    let center = circle.center();
    // Signed offset of the circumcenter along the inward normal
    let s = (center[0] - edge.midpoint[0]).mul_add(
        edge.normal[0],
        (center[1] - edge.midpoint[1]) * edge.normal[1],
    );
    let cap = if s >= p {
        s
    } else {
        0.5 * (s + circle.radius())
    };
    ideal.min(cap)
}

fn along(origin: [f64; 2], direction: [f64; 2], distance: f64) -> [f64; 2] {
    [
        direction[0].mul_add(distance, origin[0]),
        direction[1].mul_add(distance, origin[1]),
    ]
}
