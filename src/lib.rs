//! # mesh2d
//!
//! Incremental Delaunay refinement of planar domains.
//!
//! Given a coarse initial triangulation of a domain bounded by one or more
//! contours, each contour point carrying a target element size, the crate
//! repeatedly picks the worst triangle, places a new point, carves the
//! Bowyer-Watson cavity around it and retriangulates, until every triangle
//! meets its size target.
//!
//! # Features
//!
//! - Four placement strategies: circumcenter, barycenter, and the
//!   advancing-front Voronoi and square-triangle placements
//! - Generational triangle handles ([`slotmap`]) so stale references are
//!   detected rather than silently aliased
//! - Area-conserving commits: an insertion that would not exactly replace its
//!   cavity is retried instead of corrupting the mesh
//! - Cooperative budgets on iterations, inserted points and wall-clock time
//! - Serialization of configuration and results with [serde](https://serde.rs)
//!
//! # Basic Usage
//!
//! ```rust
//! use mesh2d::prelude::*;
//!
//! // Disk bounded by 32 points, each asking for elements of size 0.2
//! let n = 32;
//! let boundary: Vec<[f64; 2]> = (0..n)
//!     .map(|k| {
//!         let angle = std::f64::consts::TAU * k as f64 / n as f64;
//!         [angle.cos(), angle.sin()]
//!     })
//!     .collect();
//! let disk = Contour::new(0, boundary.iter().map(|&p| ContourPoint::new(p, 0.2)).collect());
//! let seeds: Vec<_> = (1..n - 1)
//!     .map(|k| SeedTriangle::new([0, k, k + 1], TrianglePosition::Intern))
//!     .collect();
//! let mesh = Mesh::from_contours(&[disk], &seeds).unwrap();
//!
//! let config = RefinementConfigBuilder::default()
//!     .max_iterations(10_000)
//!     .build()
//!     .unwrap();
//! let mut refiner = Refiner::new(mesh, UniformSize(0.2), config).unwrap();
//! let refined = refiner.run().unwrap();
//!
//! assert!(refined.num_triangles() > n);
//! assert!(refined.is_counter_clockwise());
//! assert!((refined.area() - signed_area(&boundary)).abs() < 1e-9);
//! assert!(find_delaunay_violations(refiner.mesh(), 1e-9).unwrap().is_empty());
//! ```
//!
//! Boundary edges are never split, so the contours must already be
//! discretized at the target size. A run whose boundary is too coarse ends
//! with [`RefinementError::Stalled`].
//!
//! # Quality values
//!
//! Larger is worse. For circumcenter and barycenter placement the quality of
//! a triangle is `3·R / (s_a + s_b + s_c)`, its circumradius over the mean
//! target size of its corners, and refinement stops once the worst value
//! drops below [`RefinementConfig::convergence_threshold`]. The frontal
//! strategies measure the distance from the circumcenter to the front edge
//! and stop once every triangle is accepted.
//!
//! # Logging
//!
//! The crate emits [`tracing`] events: `warn` for skipped input, `info` when a
//! run ends, `debug` per insertion or penalty, `trace` for driver state
//! changes. Install any subscriber to see them.
//!
//! [`RefinementConfig::convergence_threshold`]: core::algorithms::refine::RefinementConfig::convergence_threshold
//! [`RefinementError::Stalled`]: core::algorithms::refine::RefinementError::Stalled

#![forbid(unsafe_code)]

#[macro_use]
extern crate derive_builder;

/// Mesh store, priority structure and the refinement algorithms.
pub mod core {
    /// Refinement stages and the driver that sequences them
    pub mod algorithms {
        /// Bowyer-Watson cavity carving
        pub mod carve;
        /// Insertion point placement
        pub mod localize;
        /// Refinement driver, configuration and output
        pub mod refine;
        /// Area check, cavity commit and quality assignment
        pub mod retriangulate;
    }
    pub mod cavity_boundary;
    /// High-performance collection types
    pub mod collections;
    pub mod mesh;
    pub mod priority;
    pub mod triangle;
    pub mod validation;

    // Note: collections is not re-exported here to avoid namespace pollution
    pub use cavity_boundary::{BoundaryError, CavityBoundary};
    pub use mesh::*;
    pub use priority::*;
    pub use triangle::*;
    pub use validation::*;
}

/// Points, planar predicates, size fields and quality measures.
pub mod geometry {
    pub mod point;
    pub mod predicates;
    /// Triangle shape and size quality measures
    pub mod quality;
    pub mod size_field;

    pub use point::*;
    pub use predicates::*;
    pub use quality::*;
    pub use size_field::*;
}

/// A prelude module that re-exports commonly used types.
pub mod prelude {
    pub use crate::core::algorithms::{
        carve::{Cavity, CarveError, PeripheryEdge, carve},
        localize::{LocalizeError, PlacementStrategy, localize},
        refine::{
            Budget, DriverState, RefinedMesh, RefinementConfig, RefinementConfigBuilder,
            RefinementError, RefinementFailure, RefinementStatistics, Refiner, StepOutcome,
        },
        retriangulate::{Fan, QualityRule, RetriangulateError, check_area, retriangulate},
    };
    pub use crate::core::{
        cavity_boundary::{BoundaryError, CavityBoundary},
        mesh::{LocateResult, Mesh, MeshError, MeshValidationError, SeedTriangle},
        priority::{PriorityQueue, QueueEntry, QueueTier},
        triangle::{Triangle, TriangleKey, TrianglePosition},
        validation::{
            DelaunayValidationError, DelaunayViolation, find_delaunay_violations, is_delaunay,
        },
    };

    pub use crate::core::collections::{
        FastHashMap, FastHashSet, SmallBuffer, fast_hash_map_with_capacity,
        fast_hash_set_with_capacity,
    };

    pub use crate::geometry::{
        point::{Contour, ContourPoint, MeshPoint, PointIndex, PointOrigin},
        predicates::{
            Circumcircle, GeometryError, circumcenter, in_circumcircle, incircle, orient2d,
            signed_area, triangle_signed_area,
        },
        quality::{QualityError, QualitySummary, min_angle, radius_ratio, size_quality},
        size_field::{PointSizeInterpolation, SizeField, UniformSize},
    };
}

/// The function `is_normal` checks that structs implement `auto` traits.
/// Traits are checked at compile time, so this function is only used for
/// testing.
#[must_use]
pub const fn is_normal<T: Sized + Send + Sync + Unpin>() -> bool {
    true
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{
        core::{
            algorithms::refine::{RefinedMesh, RefinementConfig},
            mesh::Mesh,
            priority::PriorityQueue,
            triangle::Triangle,
        },
        geometry::point::MeshPoint,
        is_normal,
    };

    // =============================================================================
    // TYPE SAFETY TESTS
    // =============================================================================

    #[test]
    fn normal_types() {
        assert!(is_normal::<MeshPoint>());
        assert!(is_normal::<Triangle>());
        assert!(is_normal::<Mesh>());
        assert!(is_normal::<PriorityQueue>());
        assert!(is_normal::<RefinementConfig>());
        assert!(is_normal::<RefinedMesh>());
    }

    #[test]
    fn test_prelude_collections_exports() {
        use crate::prelude::*;

        let mut map: FastHashMap<u64, usize> = FastHashMap::default();
        map.insert(123, 456);
        assert_eq!(map.get(&123), Some(&456));

        let mut set: FastHashSet<u64> = FastHashSet::default();
        set.insert(789);
        assert!(set.contains(&789));

        let mut buffer: SmallBuffer<i32, 8> = SmallBuffer::new();
        buffer.push(42);
        assert_eq!(buffer.len(), 1);

        let map_with_cap = fast_hash_map_with_capacity::<u64, usize>(100);
        assert!(map_with_cap.capacity() >= 100);

        let set_with_cap = fast_hash_set_with_capacity::<u64>(50);
        assert!(set_with_cap.capacity() >= 50);
    }

    #[test]
    fn test_prelude_quality_exports() {
        use crate::prelude::*;

        let ratio = radius_ratio([0.0, 0.0], [1.0, 0.0], [0.5, 3.0_f64.sqrt() / 2.0]).unwrap();
        assert!((ratio - 2.0).abs() < 1e-12);
        assert!((size_quality(1.0, [1.0, 1.0, 1.0]) - 1.0).abs() < 1e-12);
    }
}
