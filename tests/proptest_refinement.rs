//! Property-based tests for whole refinement runs.
//!
//! - Every run converges, stalls on its coarse boundary, or exhausts a budget
//! - Output is valid, counter-clockwise, area-conserving and references
//!   every point
//! - Circumcenter runs on convex domains stay Delaunay
//! - A converged run meets the size target everywhere
//! - Selecting the worst triangle does not change the queue

use mesh2d::prelude::*;
use proptest::prelude::*;

// =============================================================================
// TEST CONFIGURATION
// =============================================================================

fn strategy() -> impl Strategy<Value = PlacementStrategy> {
    prop_oneof![
        Just(PlacementStrategy::Circumcenter),
        Just(PlacementStrategy::Barycenter),
        Just(PlacementStrategy::Voronoi),
        Just(PlacementStrategy::SquareTri),
    ]
}

fn interned(seeds: impl IntoIterator<Item = [PointIndex; 3]>) -> Vec<SeedTriangle> {
    seeds
        .into_iter()
        .map(|v| SeedTriangle::new(v, TrianglePosition::Intern))
        .collect()
}

fn rectangle(width: f64, height: f64, size: f64) -> Mesh {
    let contour = Contour::new(
        0,
        [[0.0, 0.0], [width, 0.0], [width, height], [0.0, height]]
            .into_iter()
            .map(|p| ContourPoint::new(p, size))
            .collect(),
    );
    Mesh::from_contours(&[contour], &interned([[0, 1, 2], [0, 2, 3]])).unwrap()
}

/// Regular polygon fanned from its first vertex, with its area.
fn polygon(sides: u32, radius: f64, rotation: f64, size: f64) -> (Mesh, f64) {
    let step = std::f64::consts::TAU / f64::from(sides);
    let points: Vec<[f64; 2]> = (0..sides)
        .map(|k| {
            let angle = rotation + step * f64::from(k);
            [radius * angle.cos(), radius * angle.sin()]
        })
        .collect();
    let area = signed_area(&points);
    let contour = Contour::new(
        0,
        points.iter().map(|&p| ContourPoint::new(p, size)).collect(),
    );
    let seeds = interned((1..points.len() - 1).map(|k| [0, k, k + 1]));
    (Mesh::from_contours(&[contour], &seeds).unwrap(), area)
}

fn run_bounded(
    mesh: Mesh,
    size: f64,
    strategy: PlacementStrategy,
) -> Result<(Refiner<UniformSize>, RefinedMesh), TestCaseError> {
    let config = RefinementConfigBuilder::default()
        .strategy(strategy)
        .max_iterations(400)
        .build()
        .unwrap();
    let mut refiner = Refiner::new(mesh, UniformSize(size), config).unwrap();
    let refined = match refiner.run() {
        Ok(refined) => refined,
        Err(failure) => {
            prop_assert!(
                matches!(
                    failure.error,
                    RefinementError::BudgetExhausted { .. } | RefinementError::Stalled { .. }
                ),
                "unexpected error: {}",
                failure.error
            );
            *failure.partial
        }
    };
    Ok((refiner, refined))
}

fn every_point_is_referenced(refined: &RefinedMesh) -> bool {
    let mut used = vec![false; refined.num_points()];
    for triangle in refined.triangles() {
        for &v in triangle {
            used[v] = true;
        }
    }
    used.into_iter().all(|u| u)
}

fn meets_the_target<S: SizeField>(refiner: &Refiner<S>) -> bool {
    let threshold = refiner.config().convergence_threshold;
    refiner.mesh().triangles().all(|(_, t)| {
        if refiner.config().strategy.is_frontal() {
            t.position() == TrianglePosition::Accepted
        } else {
            t.quality() < threshold
        }
    })
}

// =============================================================================
// REFINEMENT PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: Refining a rectangle keeps it valid, oriented and area-preserving.
    #[test]
    fn prop_rectangle_refinement_invariants(
        width in 0.5f64..3.0,
        height in 0.5f64..3.0,
        size in 0.2f64..1.0,
        strategy in strategy(),
    ) {
        let (refiner, refined) = run_bounded(rectangle(width, height, size), size, strategy)?;

        prop_assert!(refiner.mesh().validate().is_ok());
        prop_assert!(refined.is_counter_clockwise());
        prop_assert!((refined.area() - width * height).abs() <= 1e-9 * width * height);
        prop_assert!(refined.statistics().max_area_error < 1e-6);
        prop_assert!(refined.statistics().iterations <= 400);
        prop_assert_eq!(refiner.queue().len(), refiner.mesh().num_triangles());
        prop_assert!(every_point_is_referenced(&refined));
        prop_assert_eq!(refiner.is_converged(), meets_the_target(&refiner));
        if strategy == PlacementStrategy::Circumcenter {
            prop_assert!(find_delaunay_violations(refiner.mesh(), 1e-9).unwrap().is_empty());
        }
    }

    /// Property: Refining a regular polygon keeps every point inside it.
    #[test]
    fn prop_polygon_points_stay_inside(
        sides in 5u32..12,
        radius in 0.5f64..2.0,
        rotation in 0.0f64..std::f64::consts::TAU,
        size in 0.3f64..1.0,
        strategy in prop_oneof![
            Just(PlacementStrategy::Circumcenter),
            Just(PlacementStrategy::Barycenter),
        ],
    ) {
        let (mesh, area) = polygon(sides, radius, rotation, size);
        let (refiner, refined) = run_bounded(mesh, size, strategy)?;

        prop_assert!(refiner.mesh().validate().is_ok());
        prop_assert!((refined.area() - area).abs() <= 1e-9 * area);
        prop_assert!(every_point_is_referenced(&refined));
        if strategy == PlacementStrategy::Circumcenter {
            prop_assert!(find_delaunay_violations(refiner.mesh(), 1e-9).unwrap().is_empty());
        }
        for point in refined.points().iter().filter(|p| p.origin() == PointOrigin::Interior) {
            prop_assert!(point.x().hypot(point.y()) < radius);
        }
    }

    /// Property: Asking for the worst triangle twice gives the same answer.
    #[test]
    fn prop_worst_is_idempotent(
        width in 0.5f64..3.0,
        height in 0.5f64..3.0,
        size in 0.1f64..0.5,
        strategy in strategy(),
        steps in 0usize..20,
    ) {
        let config = RefinementConfig { strategy, ..RefinementConfig::default() };
        let mut refiner = Refiner::new(rectangle(width, height, size), UniformSize(size), config).unwrap();
        for _ in 0..steps {
            match refiner.step() {
                Ok(StepOutcome::Inserted(_) | StepOutcome::Retried(_)) => {}
                Ok(StepOutcome::Converged) | Err(RefinementError::Stalled { .. }) => break,
                Err(err) => return Err(TestCaseError::fail(err.to_string())),
            }
        }
        let queued = refiner.queue().len();
        let first = refiner.worst();
        prop_assert_eq!(first, refiner.worst());
        prop_assert_eq!(queued, refiner.queue().len());
        prop_assert_eq!(refiner.is_converged(), refiner.is_converged());
    }
}
