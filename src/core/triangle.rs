//! Triangles of the refinement mesh.
//!
//! A [`Triangle`] stores its three corners counter-clockwise, a cached
//! circumcircle, the quality value the priority structure orders it by, and
//! three neighbor links. Neighbor `i` lies across the edge opposite vertex `i`,
//! i.e. the edge `(v[i+1], v[i+2])`. A `None` link is the domain boundary.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::geometry::point::PointIndex;
use crate::geometry::predicates::Circumcircle;

new_key_type! {
    /// Key type for accessing triangles in the mesh arena.
    ///
    /// Keys carry a generation counter: once a triangle is removed, its key
    /// never resolves again, even after the slot is reused.
    pub struct TriangleKey;
}

// =============================================================================
// POSITION STATE MACHINE
// =============================================================================

/// Classification of a triangle relative to the refinement front.
///
/// | state | meaning |
/// |---|---|
/// | `Extern` | outside the domain, dropped at construction |
/// | `Intern` | eligible for refinement (circumcenter / barycenter) |
/// | `Active` | eligible front triangle (Voronoi / square-tri) |
/// | `Waiting` | not accepted and not on the front yet |
/// | `Accepted` | good enough, never selected before eligible triangles |
/// | `NonAccepted` | transient, classified into `Active` or `Waiting` |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrianglePosition {
    /// Outside the meshed domain.
    Extern,
    /// Inside the domain and eligible for refinement.
    #[default]
    Intern,
    /// Non-accepted triangle touching the front.
    Active,
    /// Non-accepted triangle away from the front.
    Waiting,
    /// Triangle meeting the acceptance criterion.
    Accepted,
    /// Freshly created, not yet classified.
    NonAccepted,
}

impl TrianglePosition {
    /// Returns `true` for triangles that bound the front from outside.
    ///
    /// An edge whose neighbor is accepted (or missing) is a front edge.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Returns `true` if the driver may select a triangle in this state.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mesh2d::core::triangle::TrianglePosition;
    ///
    /// assert!(TrianglePosition::Intern.is_eligible());
    /// assert!(TrianglePosition::Active.is_eligible());
    /// assert!(!TrianglePosition::Waiting.is_eligible());
    /// assert!(!TrianglePosition::Accepted.is_eligible());
    /// ```
    #[must_use]
    pub const fn is_eligible(self) -> bool {
        matches!(self, Self::Intern | Self::Active | Self::NonAccepted)
    }
}

// =============================================================================
// TRIANGLE
// =============================================================================

/// A mesh triangle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    vertices: [PointIndex; 3],
    circle: Circumcircle,
    quality: f64,
    priority: f64,
    retries: u32,
    local_size: f64,
    position: TrianglePosition,
    neighbors: [Option<TriangleKey>; 3],
}

impl Triangle {
    /// Creates an unlinked triangle.
    ///
    /// `vertices` must already be counter-clockwise; the mesh store takes care
    /// of that on insertion.
    #[must_use]
    pub const fn new(
        vertices: [PointIndex; 3],
        circle: Circumcircle,
        position: TrianglePosition,
    ) -> Self {
        Self {
            vertices,
            circle,
            quality: 0.0,
            priority: 0.0,
            retries: 0,
            local_size: 0.0,
            position,
            neighbors: [None; 3],
        }
    }

    /// Corner indices, counter-clockwise.
    #[inline]
    #[must_use]
    pub const fn vertices(&self) -> [PointIndex; 3] {
        self.vertices
    }

    /// Cached circumcircle.
    #[inline]
    #[must_use]
    pub const fn circle(&self) -> &Circumcircle {
        &self.circle
    }

    /// Quality value against the size target. Larger is worse.
    #[inline]
    #[must_use]
    pub const fn quality(&self) -> f64 {
        self.quality
    }

    /// Queue ordering value: the quality, lowered by every failed insertion.
    #[inline]
    #[must_use]
    pub const fn priority(&self) -> f64 {
        self.priority
    }

    /// Failed insertions since the quality was last assigned.
    #[inline]
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Size-field value the quality was computed against.
    #[inline]
    #[must_use]
    pub const fn local_size(&self) -> f64 {
        self.local_size
    }

    /// Current position state.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> TrianglePosition {
        self.position
    }

    /// Neighbor links, indexed by opposite vertex.
    #[inline]
    #[must_use]
    pub const fn neighbors(&self) -> [Option<TriangleKey>; 3] {
        self.neighbors
    }

    /// Neighbor across the edge opposite vertex `i`.
    #[inline]
    #[must_use]
    pub const fn neighbor(&self, i: usize) -> Option<TriangleKey> {
        self.neighbors[i % 3]
    }

    /// Endpoints of the edge opposite vertex `i`, in counter-clockwise order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mesh2d::core::triangle::{Triangle, TrianglePosition};
    /// use mesh2d::geometry::predicates::Circumcircle;
    ///
    /// let circle = Circumcircle::through([0.0, 0.0], [1.0, 0.0], [0.0, 1.0]).unwrap();
    /// let t = Triangle::new([4, 5, 6], circle, TrianglePosition::Intern);
    /// assert_eq!(t.edge(0), (5, 6));
    /// assert_eq!(t.edge(2), (4, 5));
    /// ```
    #[inline]
    #[must_use]
    pub const fn edge(&self, i: usize) -> (PointIndex, PointIndex) {
        (self.vertices[(i + 1) % 3], self.vertices[(i + 2) % 3])
    }

    /// Index of `point` among the corners.
    #[must_use]
    pub fn vertex_index(&self, point: PointIndex) -> Option<usize> {
        self.vertices.iter().position(|&v| v == point)
    }

    /// Returns `true` if `point` is a corner.
    #[must_use]
    pub fn has_vertex(&self, point: PointIndex) -> bool {
        self.vertices.contains(&point)
    }

    /// Index of the link that points to `key`.
    #[must_use]
    pub fn neighbor_index(&self, key: TriangleKey) -> Option<usize> {
        self.neighbors.iter().position(|&n| n == Some(key))
    }

    /// Sets the quality and clears any penalty.
    pub(crate) fn set_quality(&mut self, quality: f64) {
        self.quality = quality;
        self.priority = quality;
        self.retries = 0;
    }

    /// Divides the priority by `factor`. The quality is left alone.
    pub(crate) fn penalize(&mut self, factor: f64) {
        self.priority /= factor;
        self.retries += 1;
    }

    pub(crate) fn set_local_size(&mut self, local_size: f64) {
        self.local_size = local_size;
    }

    pub(crate) fn set_position(&mut self, position: TrianglePosition) {
        self.position = position;
    }

    pub(crate) fn set_neighbor(&mut self, i: usize, neighbor: Option<TriangleKey>) {
        self.neighbors[i % 3] = neighbor;
    }

    /// Reverses the orientation by swapping the first two corners.
    ///
    /// Links for the swapped corners are swapped along with them.
    pub(crate) fn flip(&mut self) {
        self.vertices.swap(0, 1);
        self.neighbors.swap(0, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> Triangle {
        let circle = Circumcircle::through([0.0, 0.0], [1.0, 0.0], [0.0, 1.0]).unwrap();
        Triangle::new([0, 1, 2], circle, TrianglePosition::Intern)
    }

    #[test]
    fn edges_are_opposite_their_vertex() {
        let t = unit_triangle();
        for i in 0..3 {
            let (a, b) = t.edge(i);
            assert!(!t.vertices()[i..=i].contains(&a));
            assert!(!t.vertices()[i..=i].contains(&b));
        }
        assert_eq!(t.vertex_index(2), Some(2));
        assert_eq!(t.vertex_index(9), None);
        assert!(t.has_vertex(1));
    }

    #[test]
    fn flip_keeps_links_opposite_their_vertex() {
        let mut arena = slotmap::SlotMap::<TriangleKey, ()>::with_key();
        let k = arena.insert(());
        let mut t = unit_triangle();
        t.set_neighbor(0, Some(k));
        let before = t.edge(0);
        t.flip();
        assert_eq!(t.vertices(), [1, 0, 2]);
        assert_eq!(t.neighbor(1), Some(k));
        assert_eq!(t.neighbor_index(k), Some(1));
        let (a, b) = t.edge(1);
        assert_eq!((b, a), before);
    }

    #[test]
    fn penalty_lowers_priority_only() {
        let mut t = unit_triangle();
        t.set_quality(2.0);
        t.penalize(10.0);
        t.penalize(10.0);
        assert_eq!(t.quality(), 2.0);
        assert!((t.priority() - 0.02).abs() < 1e-12);
        assert_eq!(t.retries(), 2);
        assert_eq!(t.position(), TrianglePosition::Intern);

        t.set_quality(3.0);
        assert_eq!(t.priority(), 3.0);
        assert_eq!(t.retries(), 0);
    }

    #[test]
    fn default_position_is_eligible() {
        assert_eq!(TrianglePosition::default(), TrianglePosition::Intern);
        assert!(TrianglePosition::Accepted.is_accepted());
        assert!(!TrianglePosition::Extern.is_eligible());
    }
}
