use super::{FastBuildHasher, FastHashMap, FastHashSet};
use crate::geometry::point::PointIndex;

// =============================================================================
// UTILITY FUNCTIONS
// =============================================================================

/// Creates a `FastHashMap` with pre-allocated capacity using the optimal hasher.
///
/// # Examples
///
/// ```rust
/// use mesh2d::core::collections::fast_hash_map_with_capacity;
///
/// let map = fast_hash_map_with_capacity::<u64, usize>(1000);
/// assert!(map.capacity() >= 1000);
/// ```
#[inline]
#[must_use]
pub fn fast_hash_map_with_capacity<K, V>(capacity: usize) -> FastHashMap<K, V> {
    FastHashMap::with_capacity_and_hasher(capacity, FastBuildHasher::default())
}

/// Creates a `FastHashSet` with pre-allocated capacity using the optimal hasher.
#[inline]
#[must_use]
pub fn fast_hash_set_with_capacity<T>(capacity: usize) -> FastHashSet<T> {
    FastHashSet::with_capacity_and_hasher(capacity, FastBuildHasher::default())
}

/// Order-independent key of an undirected edge.
///
/// # Examples
///
/// ```rust
/// use mesh2d::core::collections::edge_key;
///
/// assert_eq!(edge_key(4, 2), edge_key(2, 4));
/// assert_eq!(edge_key(4, 2), (2, 4));
/// ```
#[inline]
#[must_use]
pub const fn edge_key(a: PointIndex, b: PointIndex) -> (PointIndex, PointIndex) {
    if a < b { (a, b) } else { (b, a) }
}
