//! Bowyer-Watson cavity carving.
//!
//! Starting from a seed triangle, the cavity grows depth-first into every
//! neighbor whose circumcircle contains the insertion point. Containment is
//! decided with the incircle determinant rather than the stored circumcircle,
//! which is unreliable for slivers. Each triangle
//! taken is merged into a [`CavityBoundary`]; each neighbor that fails the
//! test becomes a *periphery* edge that the new triangles will be linked to.
//!
//! Carving only reads the mesh. Links are severed and triangles removed when
//! the cavity is committed by
//! [`retriangulate`](crate::core::algorithms::retriangulate::retriangulate),
//! so a failed carve leaves nothing to roll back.
//!
//! # References
//!
//! - Bowyer, A. "Computing Dirichlet tessellations" *The Computer Journal*
//!   24.2 (1981): 162-166
//! - Watson, D.F. "Computing the n-dimensional Delaunay tessellation with
//!   application to Voronoi polytopes" *The Computer Journal* 24.2 (1981): 167-172

#![forbid(unsafe_code)]

use slotmap::SparseSecondaryMap;
use thiserror::Error;

use crate::core::cavity_boundary::{BoundaryError, CavityBoundary};
use crate::core::collections::{CavityTriangleBuffer, SmallBuffer};
use crate::core::mesh::{Mesh, MeshError};
use crate::core::triangle::TriangleKey;
use crate::geometry::predicates::in_circumcircle;

/// Errors raised while carving a cavity.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CarveError {
    /// The seed triangle does not exist.
    #[error("Seed triangle {key:?} is not in the mesh")]
    InvalidSeed {
        /// The stale seed key.
        key: TriangleKey,
    },
    /// The cavity boundary could not absorb a triangle.
    #[error("Cavity boundary merge failed: {0}")]
    Boundary(#[from] BoundaryError),
    /// Mesh lookup failed while carving.
    #[error("Mesh error while carving: {0}")]
    Mesh(#[from] MeshError),
}

/// Edge of a triangle that borders the cavity from outside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeripheryEdge {
    /// The triangle outside the cavity.
    pub triangle: TriangleKey,
    /// Index of its edge facing the cavity.
    pub edge: usize,
}

/// A carved cavity, ready for the area check and retriangulation.
#[derive(Clone, Debug)]
pub struct Cavity {
    seed: TriangleKey,
    triangles: CavityTriangleBuffer,
    boundary: CavityBoundary,
    periphery: Vec<PeripheryEdge>,
    area: f64,
}

impl Cavity {
    /// The triangle carving started from.
    #[must_use]
    pub const fn seed(&self) -> TriangleKey {
        self.seed
    }

    /// Triangles to remove, in visit order.
    #[must_use]
    pub fn triangles(&self) -> &[TriangleKey] {
        &self.triangles
    }

    /// Counter-clockwise boundary of the cavity.
    #[must_use]
    pub const fn boundary(&self) -> &CavityBoundary {
        &self.boundary
    }

    /// Outside triangles bordering the cavity.
    #[must_use]
    pub fn periphery(&self) -> &[PeripheryEdge] {
        &self.periphery
    }

    /// Summed area of the cavity triangles.
    #[must_use]
    pub const fn area(&self) -> f64 {
        self.area
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Taken,
    Rejected,
}

/// Carves the cavity of `point` around `seed`.
///
/// The seed is always taken. A neighbor whose cached circumcircle contains
/// `point` (ties count as inside) is taken as well and explored in turn,
/// unless taking it would close the cavity around one of its vertices. Such a
/// triangle stays outside so that every mesh point remains referenced.
///
/// # Errors
///
/// - [`CarveError::InvalidSeed`] if `seed` is stale.
/// - [`CarveError::Boundary`] if a taken triangle cannot be merged into the
///   boundary (pinched or disconnected cavity). The driver treats this as
///   retryable.
///
/// # Examples
///
/// ```rust
/// use mesh2d::core::algorithms::carve::carve;
/// use mesh2d::core::mesh::{Mesh, SeedTriangle};
/// use mesh2d::core::triangle::TrianglePosition;
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
/// let seed = mesh.triangle_keys().next().unwrap();
/// // Both triangles share the circumcircle of the square
/// let cavity = carve(&mesh, seed, [0.5, 0.4]).unwrap();
/// assert_eq!(cavity.triangles().len(), 2);
/// assert_eq!(cavity.boundary().len(), 4);
/// assert!(cavity.periphery().is_empty());
/// ```
pub fn carve(mesh: &Mesh, seed: TriangleKey, point: [f64; 2]) -> Result<Cavity, CarveError> {
    let seed_triangle = mesh
        .triangle(seed)
        .ok_or(CarveError::InvalidSeed { key: seed })?;

    let mut visits: SparseSecondaryMap<TriangleKey, Visit> = SparseSecondaryMap::new();
    let mut triangles = CavityTriangleBuffer::new();
    let mut boundary = CavityBoundary::new();
    let mut periphery = Vec::new();

    boundary.merge_triangle(seed_triangle.vertices())?;
    visits.insert(seed, Visit::Taken);
    triangles.push(seed);
    let mut area = mesh.triangle_area(seed)?;

    // (candidate, the cavity triangle it was reached from)
    let mut stack: SmallBuffer<(TriangleKey, TriangleKey), 16> = SmallBuffer::new();
    push_neighbors(&mut stack, seed_triangle.neighbors(), seed);

    while let Some((candidate, from)) = stack.pop() {
        let triangle = mesh.try_triangle(candidate)?;
        let visit = match visits.get(candidate) {
            Some(&visit) => visit,
            None => {
                let corners = mesh.corner_coords(triangle.vertices())?;
                let mut take = in_circumcircle(corners, point);
                if take && let Some(vertex) = boundary.enclosed_by(triangle.vertices()) {
                    tracing::trace!(?candidate, vertex, "Triangle would enclose a vertex; kept outside");
                    take = false;
                }
                let visit = if take {
                    boundary.merge_triangle(triangle.vertices())?;
                    triangles.push(candidate);
                    area += mesh.triangle_area(candidate)?;
                    push_neighbors(&mut stack, triangle.neighbors(), candidate);
                    Visit::Taken
                } else {
                    Visit::Rejected
                };
                visits.insert(candidate, visit);
                visit
            }
        };

        if visit == Visit::Rejected
            && let Some(edge) = triangle.neighbor_index(from)
        {
            periphery.push(PeripheryEdge {
                triangle: candidate,
                edge,
            });
        }
    }

    tracing::trace!(
        ?seed,
        taken = triangles.len(),
        boundary = boundary.len(),
        periphery = periphery.len(),
        "Carved cavity"
    );

    Ok(Cavity {
        seed,
        triangles,
        boundary,
        periphery,
        area,
    })
}

fn push_neighbors(
    stack: &mut SmallBuffer<(TriangleKey, TriangleKey), 16>,
    neighbors: [Option<TriangleKey>; 3],
    from: TriangleKey,
) {
    // Reversed so neighbor 0 is explored first
    for neighbor in neighbors.into_iter().rev().flatten() {
        stack.push((neighbor, from));
    }
}
