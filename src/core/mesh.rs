//! Mesh store: points, triangle arena, adjacency builder and point location.
//!
//! The [`Mesh`] owns every point and triangle of a refinement run. Points are
//! append-only and addressed by [`PointIndex`]; triangles live in a
//! [`SlotMap`] arena addressed by generational [`TriangleKey`]s, so a key kept
//! across a removal can never alias a newer triangle.
//!
//! # Construction
//!
//! The store consumes the output of an external initial triangulation:
//! ordered [`Contour`]s plus [`SeedTriangle`]s indexing the concatenated
//! contour points. Seeds outside the domain are dropped and degenerate seeds
//! are skipped with a warning.
//!
//! ```rust
//! use mesh2d::core::mesh::{Mesh, SeedTriangle};
//! use mesh2d::core::triangle::TrianglePosition;
//! use mesh2d::geometry::point::{Contour, ContourPoint};
//!
//! let square = Contour::new(
//!     0,
//!     vec![
//!         ContourPoint::new([0.0, 0.0], 1.0),
//!         ContourPoint::new([1.0, 0.0], 1.0),
//!         ContourPoint::new([1.0, 1.0], 1.0),
//!         ContourPoint::new([0.0, 1.0], 1.0),
//!     ],
//! );
//! let seeds = [
//!     SeedTriangle::new([0, 1, 2], TrianglePosition::Intern),
//!     SeedTriangle::new([0, 2, 3], TrianglePosition::Intern),
//! ];
//! let mesh = Mesh::from_contours(&[square], &seeds).unwrap();
//! assert_eq!(mesh.num_points(), 4);
//! assert_eq!(mesh.num_triangles(), 2);
//! assert!(mesh.validate().is_ok());
//! ```

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use thiserror::Error;

use crate::core::collections::{
    EdgeIncidenceBuffer, FastHashMap, FastHashSet, edge_key, fast_hash_map_with_capacity,
    fast_hash_set_with_capacity,
};
use crate::core::triangle::{Triangle, TriangleKey, TrianglePosition};
use crate::geometry::point::{Contour, MeshPoint, PointIndex};
use crate::geometry::predicates::{Circumcircle, GeometryError, orient2d, triangle_signed_area};

/// Number of point slots reserved each time point storage fills up.
pub const POINT_CAPACITY_INCREMENT: usize = 1000;

// =============================================================================
// ERRORS
// =============================================================================

/// Errors raised by mesh store operations.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MeshError {
    /// A triangle references a point that does not exist.
    #[error("Point index {index} out of range (mesh has {num_points} points)")]
    InvalidPointIndex {
        /// The offending index.
        index: PointIndex,
        /// Number of points in the mesh.
        num_points: usize,
    },
    /// A triangle has no circumcircle.
    #[error("Degenerate triangle: {0}")]
    DegenerateTriangle(#[from] GeometryError),
    /// More than two triangles claim the same edge.
    #[error("Non-manifold edge {edge:?}: shared by {count} triangles")]
    NonManifoldEdge {
        /// The edge, smaller index first.
        edge: (PointIndex, PointIndex),
        /// Number of triangles sharing it.
        count: usize,
    },
    /// A triangle key no longer resolves.
    #[error("Triangle {key:?} not found in mesh")]
    TriangleNotFound {
        /// The stale key.
        key: TriangleKey,
    },
}

/// Structural defects reported by [`Mesh::validate`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MeshValidationError {
    /// A corner index is out of range.
    #[error("Triangle {triangle:?} references point {index} (mesh has {num_points} points)")]
    InvalidPointIndex {
        /// The triangle.
        triangle: TriangleKey,
        /// The offending index.
        index: PointIndex,
        /// Number of points in the mesh.
        num_points: usize,
    },
    /// A triangle uses the same point twice.
    #[error("Triangle {triangle:?} has repeated vertices {vertices:?}")]
    RepeatedVertex {
        /// The triangle.
        triangle: TriangleKey,
        /// Its corners.
        vertices: [PointIndex; 3],
    },
    /// A triangle is clockwise or flat.
    #[error("Triangle {triangle:?} is not counter-clockwise (signed area {area:e})")]
    NotCounterClockwise {
        /// The triangle.
        triangle: TriangleKey,
        /// Its signed area.
        area: f64,
    },
    /// A neighbor link points to a removed triangle.
    #[error("Triangle {triangle:?} links to missing neighbor {neighbor:?}")]
    DanglingNeighbor {
        /// The triangle.
        triangle: TriangleKey,
        /// The stale neighbor key.
        neighbor: TriangleKey,
    },
    /// The neighbor does not link back.
    #[error("Neighbor link {triangle:?} -> {neighbor:?} is not reciprocated")]
    AsymmetricNeighbor {
        /// The triangle.
        triangle: TriangleKey,
        /// The neighbor that does not link back.
        neighbor: TriangleKey,
    },
    /// Two linked triangles do not share the linking edge.
    #[error("Triangles {triangle:?} and {neighbor:?} are linked across edge {edge:?} they do not share")]
    EdgeMismatch {
        /// The triangle.
        triangle: TriangleKey,
        /// The linked neighbor.
        neighbor: TriangleKey,
        /// The edge of `triangle` that carries the link.
        edge: (PointIndex, PointIndex),
    },
}

// =============================================================================
// INPUT AND LOCATION TYPES
// =============================================================================

/// A triangle produced by the external initial triangulation.
///
/// Vertices index the concatenation of all input contours' points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedTriangle {
    /// Corner indices, any orientation.
    pub vertices: [PointIndex; 3],
    /// Inside/outside classification.
    pub position: TrianglePosition,
}

impl SeedTriangle {
    /// Creates a seed triangle.
    #[must_use]
    pub const fn new(vertices: [PointIndex; 3], position: TrianglePosition) -> Self {
        Self { vertices, position }
    }
}

/// Result of a point location query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocateResult {
    /// The point lies inside the triangle (or on one of its interior edges).
    Inside(TriangleKey),
    /// The point lies on a domain boundary edge of the triangle.
    OnDomainBoundary(TriangleKey),
    /// No triangle contains the point.
    Outside,
}

// =============================================================================
// MESH
// =============================================================================

/// Points and triangles of a planar mesh under refinement.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    points: Vec<MeshPoint>,
    triangles: SlotMap<TriangleKey, Triangle>,
}

impl Mesh {
    /// Creates an empty mesh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mesh from input contours and seed triangles.
    ///
    /// `Extern` seeds are dropped. Seeds whose corners are collinear are
    /// skipped with a `tracing::warn!`. The remaining triangles are stored
    /// counter-clockwise and linked along shared edges.
    ///
    /// # Errors
    ///
    /// - [`MeshError::InvalidPointIndex`] if a seed references a missing point.
    /// - [`MeshError::NonManifoldEdge`] if three or more seeds share an edge.
    pub fn from_contours(contours: &[Contour], seeds: &[SeedTriangle]) -> Result<Self, MeshError> {
        let mut mesh = Self::new();
        for contour in contours {
            for point in contour.mesh_points() {
                mesh.add_point(point);
            }
        }

        let mut keys = Vec::with_capacity(seeds.len());
        for seed in seeds {
            if seed.position == TrianglePosition::Extern {
                tracing::trace!(vertices = ?seed.vertices, "Dropping extern seed triangle");
                continue;
            }
            match mesh.insert_triangle(seed.vertices, seed.position) {
                Ok(key) => keys.push(key),
                Err(MeshError::DegenerateTriangle(err)) => {
                    tracing::warn!(vertices = ?seed.vertices, %err, "Skipping degenerate seed triangle");
                }
                Err(err) => return Err(err),
            }
        }

        mesh.link_neighbors(&keys)?;
        tracing::debug!(
            points = mesh.num_points(),
            triangles = mesh.num_triangles(),
            "Built mesh from contours"
        );
        Ok(mesh)
    }

    // -------------------------------------------------------------------------
    // Points
    // -------------------------------------------------------------------------

    /// Appends a point and returns its permanent index.
    ///
    /// Storage grows in blocks of [`POINT_CAPACITY_INCREMENT`] slots.
    pub fn add_point(&mut self, point: MeshPoint) -> PointIndex {
        if self.points.len() == self.points.capacity() {
            self.points.reserve_exact(POINT_CAPACITY_INCREMENT);
        }
        self.points.push(point);
        self.points.len() - 1
    }

    /// Number of points.
    #[must_use]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// All points, by index.
    #[must_use]
    pub fn points(&self) -> &[MeshPoint] {
        &self.points
    }

    /// The point at `index`.
    #[must_use]
    pub fn point(&self, index: PointIndex) -> Option<&MeshPoint> {
        self.points.get(index)
    }

    /// Coordinates of the point at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidPointIndex`] for out-of-range indices.
    pub fn coords(&self, index: PointIndex) -> Result<[f64; 2], MeshError> {
        self.points
            .get(index)
            .map(MeshPoint::coords)
            .ok_or(MeshError::InvalidPointIndex {
                index,
                num_points: self.points.len(),
            })
    }

    /// Coordinates of three corners.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidPointIndex`] for out-of-range indices.
    pub fn corner_coords(&self, vertices: [PointIndex; 3]) -> Result<[[f64; 2]; 3], MeshError> {
        Ok([
            self.coords(vertices[0])?,
            self.coords(vertices[1])?,
            self.coords(vertices[2])?,
        ])
    }

    // -------------------------------------------------------------------------
    // Triangles
    // -------------------------------------------------------------------------

    /// Number of live triangles.
    #[must_use]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// The triangle behind `key`, if it is still alive.
    #[must_use]
    pub fn triangle(&self, key: TriangleKey) -> Option<&Triangle> {
        self.triangles.get(key)
    }

    pub(crate) fn triangle_mut(&mut self, key: TriangleKey) -> Option<&mut Triangle> {
        self.triangles.get_mut(key)
    }

    /// Like [`Mesh::triangle`] but reports stale keys as an error.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::TriangleNotFound`] if the key no longer resolves.
    pub fn try_triangle(&self, key: TriangleKey) -> Result<&Triangle, MeshError> {
        self.triangles
            .get(key)
            .ok_or(MeshError::TriangleNotFound { key })
    }

    /// Returns `true` if `key` still resolves.
    #[must_use]
    pub fn contains_triangle(&self, key: TriangleKey) -> bool {
        self.triangles.contains_key(key)
    }

    /// Iterates over live triangles in arena order.
    pub fn triangles(&self) -> impl Iterator<Item = (TriangleKey, &Triangle)> {
        self.triangles.iter()
    }

    /// Keys of all live triangles in arena order.
    pub fn triangle_keys(&self) -> impl Iterator<Item = TriangleKey> + '_ {
        self.triangles.keys()
    }

    /// Inserts an unlinked triangle, reordering its corners counter-clockwise.
    ///
    /// # Errors
    ///
    /// - [`MeshError::InvalidPointIndex`] if a corner does not exist.
    /// - [`MeshError::DegenerateTriangle`] if the corners are collinear.
    pub fn insert_triangle(
        &mut self,
        vertices: [PointIndex; 3],
        position: TrianglePosition,
    ) -> Result<TriangleKey, MeshError> {
        let [a, b, c] = self.corner_coords(vertices)?;
        let orientation = orient2d(a, b, c);
        if orientation == 0.0 {
            return Err(GeometryError::DegenerateTriangle { points: [a, b, c] }.into());
        }
        let circle = Circumcircle::through(a, b, c)?;
        let vertices = if orientation < 0.0 {
            [vertices[1], vertices[0], vertices[2]]
        } else {
            vertices
        };
        Ok(self.insert_triangle_with_circle(vertices, circle, position))
    }

    /// Inserts a counter-clockwise triangle whose circumcircle is already known.
    pub(crate) fn insert_triangle_with_circle(
        &mut self,
        vertices: [PointIndex; 3],
        circle: Circumcircle,
        position: TrianglePosition,
    ) -> TriangleKey {
        self.triangles
            .insert(Triangle::new(vertices, circle, position))
    }

    /// Removes a triangle, clearing every live neighbor's link back to it.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::TriangleNotFound`] if the key is stale.
    pub fn remove_triangle(&mut self, key: TriangleKey) -> Result<Triangle, MeshError> {
        let triangle = self
            .triangles
            .remove(key)
            .ok_or(MeshError::TriangleNotFound { key })?;
        for neighbor in triangle.neighbors().into_iter().flatten() {
            if let Some(other) = self.triangles.get_mut(neighbor) {
                if let Some(i) = other.neighbor_index(key) {
                    other.set_neighbor(i, None);
                }
            }
        }
        Ok(triangle)
    }

    /// Links the given triangles along the edges they share.
    ///
    /// Each edge is keyed by its sorted endpoints. Edges seen exactly twice in
    /// the batch become mutual links. Edges seen once keep whatever link they
    /// already have, so a batch may mix new triangles with existing ones that
    /// border them. Duplicate keys in `keys` are ignored.
    ///
    /// # Errors
    ///
    /// - [`MeshError::TriangleNotFound`] for stale keys.
    /// - [`MeshError::NonManifoldEdge`] if more than two triangles of the
    ///   batch share an edge.
    pub fn link_neighbors(&mut self, keys: &[TriangleKey]) -> Result<(), MeshError> {
        let mut seen: FastHashSet<TriangleKey> = fast_hash_set_with_capacity(keys.len());
        let mut edge_map: FastHashMap<(PointIndex, PointIndex), EdgeIncidenceBuffer> =
            fast_hash_map_with_capacity(keys.len() * 3);

        for &key in keys {
            if !seen.insert(key) {
                continue;
            }
            let triangle = self.try_triangle(key)?;
            for i in 0..3 {
                let (a, b) = triangle.edge(i);
                let edge = edge_key(a, b);
                let sharing = edge_map.entry(edge).or_default();
                if sharing.len() == 2 {
                    return Err(MeshError::NonManifoldEdge { edge, count: 3 });
                }
                #[expect(clippy::cast_possible_truncation, reason = "edge index is 0..3")]
                sharing.push((key, i as u8));
            }
        }

        for sharing in edge_map.values() {
            if let [(k1, i1), (k2, i2)] = sharing.as_slice() {
                if let Some(t) = self.triangles.get_mut(*k1) {
                    t.set_neighbor(usize::from(*i1), Some(*k2));
                }
                if let Some(t) = self.triangles.get_mut(*k2) {
                    t.set_neighbor(usize::from(*i2), Some(*k1));
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Measures
    // -------------------------------------------------------------------------

    /// Signed area of a live triangle.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is stale or a corner is missing.
    pub fn triangle_area(&self, key: TriangleKey) -> Result<f64, MeshError> {
        let [a, b, c] = self.corner_coords(self.try_triangle(key)?.vertices())?;
        Ok(triangle_signed_area(a, b, c))
    }

    /// Total absolute area of all live triangles.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.triangles
            .values()
            .filter_map(|t| self.corner_coords(t.vertices()).ok())
            .map(|[a, b, c]| triangle_signed_area(a, b, c).abs())
            .sum()
    }

    // -------------------------------------------------------------------------
    // Point location
    // -------------------------------------------------------------------------

    /// Locates `point`, walking from an arbitrary triangle.
    #[must_use]
    pub fn locate(&self, point: [f64; 2]) -> LocateResult {
        match self.triangles.keys().next() {
            Some(start) => self.locate_from(point, start),
            None => LocateResult::Outside,
        }
    }

    /// Locates `point`, walking from `start`.
    ///
    /// The walk crosses any edge the point lies strictly to the right of.
    /// When it would leave through a domain boundary edge, revisit a triangle,
    /// or `start` is stale, it falls back to a linear scan, which keeps
    /// non-convex domains and domains with holes correct.
    #[must_use]
    pub fn locate_from(&self, point: [f64; 2], start: TriangleKey) -> LocateResult {
        if !self.triangles.contains_key(start) {
            return self.locate_by_scan(point);
        }

        let mut visited: FastHashSet<TriangleKey> = FastHashSet::default();
        let mut current = start;

        loop {
            if !visited.insert(current) {
                tracing::trace!(?point, "Walk revisited a triangle, scanning");
                return self.locate_by_scan(point);
            }
            let Some(triangle) = self.triangles.get(current) else {
                return self.locate_by_scan(point);
            };
            let Ok(coords) = self.corner_coords(triangle.vertices()) else {
                return self.locate_by_scan(point);
            };

            let mut on_boundary = false;
            let mut next = None;
            for i in 0..3 {
                let side = orient2d(coords[(i + 1) % 3], coords[(i + 2) % 3], point);
                if side < 0.0 {
                    next = Some(triangle.neighbor(i));
                    break;
                }
                if side == 0.0 && triangle.neighbor(i).is_none() {
                    on_boundary = true;
                }
            }

            match next {
                None if on_boundary => return LocateResult::OnDomainBoundary(current),
                None => return LocateResult::Inside(current),
                Some(Some(neighbor)) => current = neighbor,
                Some(None) => return self.locate_by_scan(point),
            }
        }
    }

    fn locate_by_scan(&self, point: [f64; 2]) -> LocateResult {
        for (key, triangle) in &self.triangles {
            let Ok(coords) = self.corner_coords(triangle.vertices()) else {
                continue;
            };
            let mut on_boundary = false;
            let mut contains = true;
            for i in 0..3 {
                let side = orient2d(coords[(i + 1) % 3], coords[(i + 2) % 3], point);
                if side < 0.0 {
                    contains = false;
                    break;
                }
                if side == 0.0 && triangle.neighbor(i).is_none() {
                    on_boundary = true;
                }
            }
            if contains {
                return if on_boundary {
                    LocateResult::OnDomainBoundary(key)
                } else {
                    LocateResult::Inside(key)
                };
            }
        }
        LocateResult::Outside
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Checks the structural invariants of the mesh.
    ///
    /// Verifies corner indices, distinct corners, strict counter-clockwise
    /// orientation, that every link resolves, that links are reciprocated, and
    /// that linked triangles share the linking edge with opposite direction.
    ///
    /// # Errors
    ///
    /// Returns the first [`MeshValidationError`] found.
    pub fn validate(&self) -> Result<(), MeshValidationError> {
        let num_points = self.points.len();
        for (key, triangle) in &self.triangles {
            let vertices = triangle.vertices();
            let mut coords = [[0.0; 2]; 3];
            for (corner, &index) in coords.iter_mut().zip(&vertices) {
                *corner = self
                    .points
                    .get(index)
                    .ok_or(MeshValidationError::InvalidPointIndex {
                        triangle: key,
                        index,
                        num_points,
                    })?
                    .coords();
            }
            if vertices[0] == vertices[1] || vertices[1] == vertices[2] || vertices[0] == vertices[2]
            {
                return Err(MeshValidationError::RepeatedVertex {
                    triangle: key,
                    vertices,
                });
            }
            let area = triangle_signed_area(coords[0], coords[1], coords[2]);
            if area <= 0.0 {
                return Err(MeshValidationError::NotCounterClockwise {
                    triangle: key,
                    area,
                });
            }

            for i in 0..3 {
                let Some(neighbor) = triangle.neighbor(i) else {
                    continue;
                };
                let other = self
                    .triangles
                    .get(neighbor)
                    .ok_or(MeshValidationError::DanglingNeighbor {
                        triangle: key,
                        neighbor,
                    })?;
                let j = other
                    .neighbor_index(key)
                    .ok_or(MeshValidationError::AsymmetricNeighbor {
                        triangle: key,
                        neighbor,
                    })?;
                let (a, b) = triangle.edge(i);
                if other.edge(j) != (b, a) {
                    return Err(MeshValidationError::EdgeMismatch {
                        triangle: key,
                        neighbor,
                        edge: (a, b),
                    });
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
