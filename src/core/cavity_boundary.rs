//! Circular boundary of a Bowyer-Watson cavity.
//!
//! The cavity boundary is an ordered, closed, counter-clockwise cycle of point
//! indices. It is grown one triangle at a time while carving: each triangle
//! taken into the cavity is merged with [`CavityBoundary::merge_triangle`],
//! which splices its free vertex in or cuts off a vertex the cavity now
//! swallows.
//!
//! Nodes live in a `Vec` arena linked by indices, and a point → node map gives
//! constant-time membership and neighbor queries. Slots freed by
//! [`CavityBoundary::remove`] are recycled by later insertions. A point appears
//! at most once; a boundary that would need to visit a point twice is pinched
//! and is rejected.

#![forbid(unsafe_code)]

use thiserror::Error;

use crate::core::collections::FastHashMap;
use crate::geometry::point::PointIndex;

/// Inconsistencies found while merging a triangle into the boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BoundaryError {
    /// The triangle shares no vertex with a non-empty boundary.
    #[error("Triangle {triangle:?} is disconnected from the cavity")]
    Disconnected {
        /// The triangle being merged.
        triangle: [PointIndex; 3],
    },
    /// The triangle touches the boundary at a single vertex.
    #[error("Triangle {triangle:?} shares only vertex {shared} with the cavity")]
    SingleSharedVertex {
        /// The triangle being merged.
        triangle: [PointIndex; 3],
        /// The shared vertex.
        shared: PointIndex,
    },
    /// Two vertices are shared but the boundary does not run along their edge.
    #[error("Edge {edge:?} of triangle {triangle:?} is not a cavity boundary edge")]
    NonAdjacentEdge {
        /// The triangle being merged.
        triangle: [PointIndex; 3],
        /// The triangle edge, in triangle order.
        edge: (PointIndex, PointIndex),
    },
    /// Merging would pinch the cavity or close it around the triangle.
    #[error("Merging triangle {triangle:?} would pinch the cavity")]
    PinchedCavity {
        /// The triangle being merged.
        triangle: [PointIndex; 3],
    },
    /// A point was inserted twice.
    #[error("Point {point} is already on the cavity boundary")]
    DuplicatePoint {
        /// The repeated point.
        point: PointIndex,
    },
    /// An anchor point is not on the boundary.
    #[error("Point {point} is not on the cavity boundary")]
    UnknownPoint {
        /// The missing point.
        point: PointIndex,
    },
}

#[derive(Clone, Copy, Debug)]
struct Node {
    point: PointIndex,
    prev: usize,
    next: usize,
}

/// Circular doubly-linked list of boundary points.
///
/// # Examples
///
/// ```rust
/// use mesh2d::core::cavity_boundary::CavityBoundary;
///
/// let mut boundary = CavityBoundary::new();
/// boundary.merge_triangle([0, 1, 2]).unwrap();
/// // Neighbor across edge 1→2 has the edge reversed
/// boundary.merge_triangle([2, 1, 3]).unwrap();
/// assert_eq!(boundary.iter().collect::<Vec<_>>(), vec![0, 1, 3, 2]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct CavityBoundary {
    nodes: Vec<Node>,
    // Unlinked slots, reused before the arena grows
    free: Vec<usize>,
    slots: FastHashMap<PointIndex, usize>,
    head: Option<usize>,
}

impl CavityBoundary {
    /// Creates an empty boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points on the boundary.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the boundary has no point.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns `true` if `point` is on the boundary.
    #[must_use]
    pub fn contains(&self, point: PointIndex) -> bool {
        self.slots.contains_key(&point)
    }

    /// Successor of `point` in counter-clockwise order.
    #[must_use]
    pub fn next(&self, point: PointIndex) -> Option<PointIndex> {
        let slot = *self.slots.get(&point)?;
        Some(self.nodes[self.nodes[slot].next].point)
    }

    /// Predecessor of `point` in counter-clockwise order.
    #[must_use]
    pub fn prev(&self, point: PointIndex) -> Option<PointIndex> {
        let slot = *self.slots.get(&point)?;
        Some(self.nodes[self.nodes[slot].prev].point)
    }

    /// Appends `point` before the head, closing the cycle behind it.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::DuplicatePoint`] if `point` is already present.
    pub fn push_back(&mut self, point: PointIndex) -> Result<(), BoundaryError> {
        match self.head {
            None => {
                self.ensure_absent(point)?;
                let slot = self.allocate(point);
                let node = &mut self.nodes[slot];
                node.prev = slot;
                node.next = slot;
                self.slots.insert(point, slot);
                self.head = Some(slot);
                Ok(())
            }
            Some(head) => {
                let tail = self.nodes[self.nodes[head].prev].point;
                self.insert_after(tail, point)
            }
        }
    }

    /// Inserts `point` right after `anchor`.
    ///
    /// # Errors
    ///
    /// - [`BoundaryError::UnknownPoint`] if `anchor` is not on the boundary.
    /// - [`BoundaryError::DuplicatePoint`] if `point` already is.
    pub fn insert_after(&mut self, anchor: PointIndex, point: PointIndex) -> Result<(), BoundaryError> {
        let prev = *self
            .slots
            .get(&anchor)
            .ok_or(BoundaryError::UnknownPoint { point: anchor })?;
        self.ensure_absent(point)?;
        let next = self.nodes[prev].next;
        let slot = self.allocate(point);
        self.nodes[slot].prev = prev;
        self.nodes[slot].next = next;
        self.nodes[prev].next = slot;
        self.nodes[next].prev = slot;
        self.slots.insert(point, slot);
        Ok(())
    }

    /// Unlinks `point` and frees its slot for reuse. Returns `false` if it was
    /// not on the boundary.
    pub fn remove(&mut self, point: PointIndex) -> bool {
        let Some(slot) = self.slots.remove(&point) else {
            return false;
        };
        let Node { prev, next, .. } = self.nodes[slot];
        if self.slots.is_empty() {
            self.head = None;
            self.nodes.clear();
            self.free.clear();
            return true;
        }
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        if self.head == Some(slot) {
            self.head = Some(next);
        }
        self.free.push(slot);
        true
    }

    /// Number of arena slots in use or waiting for reuse.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Iterates counter-clockwise from the head.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            boundary: self,
            slot: self.head,
            remaining: self.len(),
            forward: true,
        }
    }

    /// Iterates counter-clockwise starting at `point`.
    ///
    /// Yields nothing if `point` is not on the boundary.
    pub fn iter_from(&self, point: PointIndex) -> Iter<'_> {
        let slot = self.slots.get(&point).copied();
        Iter {
            boundary: self,
            slot,
            remaining: if slot.is_some() { self.len() } else { 0 },
            forward: true,
        }
    }

    /// Iterates clockwise starting at `point`.
    pub fn iter_rev_from(&self, point: PointIndex) -> Iter<'_> {
        Iter {
            forward: false,
            ..self.iter_from(point)
        }
    }

    /// Boundary edges `(b_i, b_{i+1})` in counter-clockwise order.
    pub fn edges(&self) -> impl Iterator<Item = (PointIndex, PointIndex)> + '_ {
        self.iter().map(|a| {
            let slot = self.slots[&a];
            (a, self.nodes[self.nodes[slot].next].point)
        })
    }

    /// Merges a counter-clockwise triangle adjacent to the cavity.
    ///
    /// | shared vertices | effect |
    /// |---|---|
    /// | list empty | the three vertices are inserted in order |
    /// | 0 | [`BoundaryError::Disconnected`] |
    /// | 1 | [`BoundaryError::SingleSharedVertex`] |
    /// | 2 | the free vertex is spliced into the shared edge |
    /// | 3 | the middle shared vertex is cut off |
    ///
    /// A cut vertex is no longer on the boundary, so a fan over the boundary
    /// would not reference it. Callers that must keep every vertex check
    /// [`CavityBoundary::enclosed_by`] first.
    ///
    /// # Errors
    ///
    /// Any [`BoundaryError`] listed above, plus
    /// [`BoundaryError::NonAdjacentEdge`] when two shared vertices are not
    /// consecutive and [`BoundaryError::PinchedCavity`] when no vertex can be
    /// cut off. The boundary is unchanged on error.
    pub fn merge_triangle(&mut self, triangle: [PointIndex; 3]) -> Result<(), BoundaryError> {
        if self.is_empty() {
            if triangle[0] == triangle[1] || triangle[1] == triangle[2] || triangle[0] == triangle[2] {
                return Err(BoundaryError::PinchedCavity { triangle });
            }
            for point in triangle {
                self.push_back(point)?;
            }
            return Ok(());
        }

        let shared = triangle.map(|p| self.contains(p));
        match shared.iter().filter(|&&s| s).count() {
            0 => Err(BoundaryError::Disconnected { triangle }),
            1 => {
                let shared = triangle
                    .into_iter()
                    .find(|&p| self.contains(p))
                    .unwrap_or(triangle[0]);
                Err(BoundaryError::SingleSharedVertex { triangle, shared })
            }
            2 => {
                let k = shared.iter().position(|&s| !s).unwrap_or(0);
                let free = triangle[k];
                let u = triangle[(k + 1) % 3];
                let v = triangle[(k + 2) % 3];
                if self.next(v) != Some(u) {
                    return Err(BoundaryError::NonAdjacentEdge {
                        triangle,
                        edge: (u, v),
                    });
                }
                self.insert_after(v, free)
            }
            _ => {
                if self.len() <= 3 {
                    return Err(BoundaryError::PinchedCavity { triangle });
                }
                match self.enclosed_by(triangle) {
                    Some(middle) => {
                        self.remove(middle);
                        Ok(())
                    }
                    None => Err(BoundaryError::PinchedCavity { triangle }),
                }
            }
        }
    }

    /// The vertex that merging `triangle` would cut off the boundary.
    ///
    /// That is the vertex whose predecessor and successor are the triangle's
    /// other two vertices. Once cut, every triangle around it belongs to the
    /// cavity and the vertex ends up strictly inside.
    #[must_use]
    pub fn enclosed_by(&self, triangle: [PointIndex; 3]) -> Option<PointIndex> {
        (0..3).find_map(|i| {
            let middle = triangle[i];
            (self.prev(middle) == Some(triangle[(i + 1) % 3])
                && self.next(middle) == Some(triangle[(i + 2) % 3]))
            .then_some(middle)
        })
    }

    fn allocate(&mut self, point: PointIndex) -> usize {
        let node = Node {
            point,
            prev: 0,
            next: 0,
        };
        if let Some(slot) = self.free.pop() {
            self.nodes[slot] = node;
            slot
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn ensure_absent(&self, point: PointIndex) -> Result<(), BoundaryError> {
        if self.contains(point) {
            Err(BoundaryError::DuplicatePoint { point })
        } else {
            Ok(())
        }
    }
}

/// Iterator over boundary points in either direction.
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    boundary: &'a CavityBoundary,
    slot: Option<usize>,
    remaining: usize,
    forward: bool,
}

impl Iterator for Iter<'_> {
    type Item = PointIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.boundary.nodes[self.slot?];
        self.remaining -= 1;
        self.slot = Some(if self.forward { node.next } else { node.prev });
        Some(node.point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}
