//! Cavity retriangulation and quality assignment.
//!
//! Committing an insertion is split in two phases:
//!
//! 1. [`check_area`] builds the fan `(p, b_i, b_{i+1})` over the cavity
//!    boundary without touching the mesh and verifies that it covers exactly
//!    the area that is about to be removed. A failure here is retryable.
//! 2. [`retriangulate`] computes every fan circumcircle, then commits: the
//!    point is appended, the cavity triangles are removed, the fan is
//!    inserted and linked to the periphery, and every new triangle receives
//!    a quality value and a queue entry.
//!
//! Quality assignment is shared with the driver's initial scan and penalty
//! handling through [`QualityRule`].

#![forbid(unsafe_code)]

use thiserror::Error;

use crate::core::algorithms::carve::Cavity;
use crate::core::algorithms::localize::{
    EdgeFrame, PlacementStrategy, is_front_edge, longest_edge,
};
use crate::core::collections::{NewTriangleBuffer, SmallBuffer};
use crate::core::mesh::{Mesh, MeshError};
use crate::core::priority::{PriorityQueue, QueueEntry};
use crate::core::triangle::{TriangleKey, TrianglePosition};
use crate::geometry::point::{MeshPoint, PointIndex};
use crate::geometry::predicates::{Circumcircle, GeometryError, distance, triangle_signed_area};
use crate::geometry::quality::size_quality;
use crate::geometry::size_field::SizeField;

/// Fan triangles smaller than this fraction of the cavity area are rejected.
pub const DEGENERATE_FAN_RATIO: f64 = 1e-10;

// =============================================================================
// ERRORS
// =============================================================================

/// Errors raised while committing a cavity.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RetriangulateError {
    /// The fan does not cover the cavity area.
    #[error("Area mismatch: removed {removed:e}, created {created:e} (relative {relative:e})")]
    AreaMismatch {
        /// Area of the cavity triangles.
        removed: f64,
        /// Summed absolute area of the fan.
        created: f64,
        /// `|removed - created| / (removed + created)`.
        relative: f64,
    },
    /// A fan triangle is inverted or flat.
    #[error("Fan triangle over edge {edge:?} has signed area {area:e}")]
    DegenerateFan {
        /// The boundary edge.
        edge: (PointIndex, PointIndex),
        /// Signed area of the fan triangle.
        area: f64,
    },
    /// A fan triangle has no circumcircle.
    #[error("Degenerate geometry in retriangulation: {0}")]
    DegenerateGeometry(#[source] GeometryError),
    /// The mesh store rejected an operation.
    #[error("Mesh error in retriangulation: {0}")]
    Mesh(#[from] MeshError),
}

impl RetriangulateError {
    /// Returns `true` if the driver may penalize the seed and try again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::AreaMismatch { .. } | Self::DegenerateFan { .. })
    }
}

// =============================================================================
// AREA CHECK
// =============================================================================

/// A fan that passed the area check.
#[derive(Clone, Debug, PartialEq)]
pub struct Fan {
    edges: SmallBuffer<(PointIndex, PointIndex), 16>,
    removed_area: f64,
    created_area: f64,
}

impl Fan {
    /// Boundary edges the fan triangles stand on, counter-clockwise.
    #[must_use]
    pub fn edges(&self) -> &[(PointIndex, PointIndex)] {
        &self.edges
    }

    /// Area of the cavity.
    #[must_use]
    pub const fn removed_area(&self) -> f64 {
        self.removed_area
    }

    /// Summed absolute area of the fan.
    #[must_use]
    pub const fn created_area(&self) -> f64 {
        self.created_area
    }

    /// `|removed - created| / (removed + created)`.
    #[must_use]
    pub fn relative_error(&self) -> f64 {
        relative_difference(self.removed_area, self.created_area)
    }
}

fn relative_difference(a: f64, b: f64) -> f64 {
    let total = a + b;
    if total > 0.0 {
        (a - b).abs() / total
    } else {
        0.0
    }
}

/// Verifies that the fan around `point` replaces the cavity exactly.
///
/// # Errors
///
/// - [`RetriangulateError::DegenerateFan`] if a fan triangle is inverted or
///   has an area below [`DEGENERATE_FAN_RATIO`] times the cavity area.
/// - [`RetriangulateError::AreaMismatch`] if the relative area difference
///   exceeds `tolerance`.
/// - [`RetriangulateError::Mesh`] if a boundary point is missing.
pub fn check_area(
    mesh: &Mesh,
    cavity: &Cavity,
    point: [f64; 2],
    tolerance: f64,
) -> Result<Fan, RetriangulateError> {
    let removed = cavity.area();
    let min_area = DEGENERATE_FAN_RATIO * removed;
    let mut edges = SmallBuffer::new();
    let mut created = 0.0;

    for (a, b) in cavity.boundary().edges() {
        let area = triangle_signed_area(point, mesh.coords(a)?, mesh.coords(b)?);
        if area <= min_area {
            return Err(RetriangulateError::DegenerateFan { edge: (a, b), area });
        }
        created += area.abs();
        edges.push((a, b));
    }

    let relative = relative_difference(removed, created);
    if relative.is_nan() || relative > tolerance {
        return Err(RetriangulateError::AreaMismatch {
            removed,
            created,
            relative,
        });
    }

    Ok(Fan {
        edges,
        removed_area: removed,
        created_area: created,
    })
}

// =============================================================================
// QUALITY ASSIGNMENT
// =============================================================================

/// Run-wide parameters of quality assignment.
#[derive(Clone, Copy, Debug)]
pub struct QualityRule<'a, S: ?Sized> {
    /// Placement strategy of the run.
    pub strategy: PlacementStrategy,
    /// Frontal acceptance: accepted once `local_size / quality` exceeds it.
    pub acceptance_ratio: f64,
    /// Target size field.
    pub size_field: &'a S,
}

impl<S: SizeField + ?Sized> QualityRule<'_, S> {
    /// Frontal acceptance test.
    ///
    /// The circumcenter must sit close to the reference edge
    /// (`local_size / quality` above the ratio) and the triangle must not be
    /// much larger than the equilateral triangle of edge `local_size`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mesh2d::core::algorithms::localize::PlacementStrategy;
    /// use mesh2d::core::algorithms::retriangulate::QualityRule;
    /// use mesh2d::geometry::size_field::UniformSize;
    ///
    /// let rule = QualityRule {
    ///     strategy: PlacementStrategy::Voronoi,
    ///     acceptance_ratio: 1.5,
    ///     size_field: &UniformSize(1.0),
    /// };
    /// // Equilateral triangle of unit edge
    /// let radius = 1.0 / 3.0_f64.sqrt();
    /// assert!(rule.accepts(radius / 2.0, 1.0, radius));
    /// // Right triangle standing on a long edge
    /// assert!(!rule.accepts(0.0, 1.0, 1.5));
    /// ```
    #[must_use]
    pub fn accepts(&self, quality: f64, local_size: f64, radius: f64) -> bool {
        let centered = quality == 0.0 || local_size / quality > self.acceptance_ratio;
        centered && radius < self.acceptance_ratio * local_size / 3.0_f64.sqrt()
    }

    /// Computes quality, local size and position of a triangle.
    ///
    /// Non-frontal strategies use `3·R / (s_a + s_b + s_c)` over the corner
    /// sizes and mark the triangle `Intern`. Frontal strategies measure the
    /// distance from the circumcenter to the midpoint of `reference` (or, if
    /// `None`, of the longest front edge, falling back to the longest edge),
    /// and mark the triangle `Accepted` or `NonAccepted` through
    /// [`QualityRule::accepts`].
    ///
    /// # Errors
    ///
    /// Returns [`MeshError`] if the triangle or a corner is missing.
    pub fn assign(
        &self,
        mesh: &mut Mesh,
        key: TriangleKey,
        reference: Option<usize>,
    ) -> Result<(), MeshError> {
        let triangle = mesh.try_triangle(key)?;
        let (quality, local_size, position) = if self.strategy.is_frontal() {
            let edge = match reference {
                Some(index) => Some(EdgeFrame::of(mesh, triangle, index)?),
                None => match longest_edge(mesh, triangle, |i| is_front_edge(mesh, triangle, i))? {
                    Some(edge) => Some(edge),
                    None => longest_edge(mesh, triangle, |_| true)?,
                },
            };
            let m = edge.map_or_else(|| triangle.circle().center(), |e| e.midpoint);
            let quality = distance(triangle.circle().center(), m);
            let local_size = self.size_field.size_at(m[0], m[1]);
            let position = if self.accepts(quality, local_size, triangle.circle().radius()) {
                TrianglePosition::Accepted
            } else {
                TrianglePosition::NonAccepted
            };
            (quality, local_size, position)
        } else {
            let mut sizes = [0.0; 3];
            for (size, &v) in sizes.iter_mut().zip(&triangle.vertices()) {
                *size = mesh
                    .point(v)
                    .ok_or(MeshError::InvalidPointIndex {
                        index: v,
                        num_points: mesh.num_points(),
                    })?
                    .size();
            }
            let quality = size_quality(triangle.circle().radius(), sizes);
            (quality, sizes.iter().sum::<f64>() / 3.0, TrianglePosition::Intern)
        };

        if let Some(t) = mesh.triangle_mut(key) {
            t.set_quality(quality);
            t.set_local_size(local_size);
            t.set_position(position);
        }
        Ok(())
    }
}

/// Re-derives `Active` / `Waiting` for a non-accepted frontal triangle.
///
/// Accepted and `Intern` triangles are left alone. Returns the new position.
///
/// # Errors
///
/// Returns [`MeshError::TriangleNotFound`] if the key is stale.
pub fn classify_front(mesh: &mut Mesh, key: TriangleKey) -> Result<TrianglePosition, MeshError> {
    let triangle = mesh.try_triangle(key)?;
    let position = match triangle.position() {
        TrianglePosition::NonAccepted | TrianglePosition::Active | TrianglePosition::Waiting => {
            if (0..3).any(|i| is_front_edge(mesh, triangle, i)) {
                TrianglePosition::Active
            } else {
                TrianglePosition::Waiting
            }
        }
        other => other,
    };
    if let Some(t) = mesh.triangle_mut(key) {
        t.set_position(position);
    }
    Ok(position)
}

/// (Re)inserts a live triangle into the queue under its current state.
///
/// # Errors
///
/// Returns [`MeshError::TriangleNotFound`] if the key is stale.
pub fn enqueue(mesh: &Mesh, queue: &mut PriorityQueue, key: TriangleKey) -> Result<(), MeshError> {
    let triangle = mesh.try_triangle(key)?;
    let waiting = triangle.position() == TrianglePosition::Waiting;
    queue.insert(QueueEntry::for_triangle(key, triangle, queue.threshold()), waiting);
    Ok(())
}

/// Reclassifies frontal triangles and refreshes their queue entries.
///
/// Stale keys are skipped.
///
/// # Errors
///
/// Returns [`MeshError`] only for internal inconsistencies.
pub fn refresh_front(
    mesh: &mut Mesh,
    queue: &mut PriorityQueue,
    keys: impl IntoIterator<Item = TriangleKey>,
) -> Result<(), MeshError> {
    for key in keys {
        if !mesh.contains_triangle(key) {
            continue;
        }
        classify_front(mesh, key)?;
        enqueue(mesh, queue, key)?;
    }
    Ok(())
}

// =============================================================================
// COMMIT
// =============================================================================

/// Result of a committed insertion.
#[derive(Clone, Debug, PartialEq)]
pub struct Retriangulation {
    /// Index of the inserted point.
    pub point: PointIndex,
    /// New triangles, one per boundary edge.
    pub created: NewTriangleBuffer,
    /// Number of cavity triangles removed.
    pub removed: usize,
    /// Relative area error of the commit.
    pub area_error: f64,
}

/// Replaces the cavity by the fan around `point`.
///
/// All fan circumcircles are computed before the mesh is touched, so a
/// degenerate fan triangle leaves the mesh and the queue unchanged.
///
/// # Errors
///
/// - [`RetriangulateError::DegenerateGeometry`] if a fan triangle has no
///   circumcircle (fatal for the run).
/// - [`RetriangulateError::Mesh`] if the store rejects an update.
pub fn retriangulate<S>(
    mesh: &mut Mesh,
    queue: &mut PriorityQueue,
    cavity: &Cavity,
    fan: &Fan,
    point: [f64; 2],
    rule: &QualityRule<'_, S>,
) -> Result<Retriangulation, RetriangulateError>
where
    S: SizeField + ?Sized,
{
    let mut circles: SmallBuffer<Circumcircle, 16> = SmallBuffer::with_capacity(fan.edges().len());
    for &(a, b) in fan.edges() {
        let circle = Circumcircle::through(point, mesh.coords(a)?, mesh.coords(b)?)
            .map_err(RetriangulateError::DegenerateGeometry)?;
        circles.push(circle);
    }

    let size = rule.size_field.size_at(point[0], point[1]);
    let index = mesh.add_point(MeshPoint::interior(point, size));

    for &key in cavity.triangles() {
        queue.remove_key(key);
        mesh.remove_triangle(key)?;
    }

    let initial = if rule.strategy.is_frontal() {
        TrianglePosition::NonAccepted
    } else {
        TrianglePosition::Intern
    };
    let mut created = NewTriangleBuffer::new();
    for (&(a, b), &circle) in fan.edges().iter().zip(&circles) {
        created.push(mesh.insert_triangle_with_circle([index, a, b], circle, initial));
    }

    let periphery: SmallBuffer<TriangleKey, 16> =
        cavity.periphery().iter().map(|edge| edge.triangle).collect();
    let batch: Vec<TriangleKey> = created.iter().chain(&periphery).copied().collect();
    mesh.link_neighbors(&batch)?;

    for &key in &created {
        // Edge 0 is the cavity boundary edge, opposite the new point
        rule.assign(mesh, key, Some(0))?;
    }

    if rule.strategy.is_frontal() {
        refresh_front(mesh, queue, batch)?;
    } else {
        for &key in &created {
            enqueue(mesh, queue, key)?;
        }
    }

    tracing::debug!(
        point = index,
        x = point[0],
        y = point[1],
        removed = cavity.triangles().len(),
        created = created.len(),
        "Inserted point"
    );

    Ok(Retriangulation {
        point: index,
        created,
        removed: cavity.triangles().len(),
        area_error: fan.relative_error(),
    })
}
