//! Serialization of configurations and refinement results.

use std::time::Duration;

use approx::assert_relative_eq;
use mesh2d::prelude::*;

/// Unit square with its edge midpoints, refined at size 0.5.
fn refined_square() -> RefinedMesh {
    let contour = Contour::new(
        3,
        [
            [0.0, 0.0],
            [0.5, 0.0],
            [1.0, 0.0],
            [1.0, 0.5],
            [1.0, 1.0],
            [0.5, 1.0],
            [0.0, 1.0],
            [0.0, 0.5],
        ]
        .into_iter()
        .enumerate()
        .map(|(i, p)| ContourPoint::new(p, 0.5).with_initial(100 + i))
        .collect(),
    );
    let seeds: Vec<SeedTriangle> = [[7, 0, 1], [1, 2, 3], [3, 4, 5], [5, 6, 7], [1, 3, 5], [1, 5, 7]]
        .into_iter()
        .map(|v| SeedTriangle::new(v, TrianglePosition::Intern))
        .collect();
    let mesh = Mesh::from_contours(&[contour], &seeds).unwrap();
    Refiner::new(mesh, UniformSize(0.5), RefinementConfig::default())
        .unwrap()
        .run()
        .unwrap()
}

#[test]
fn config_round_trips_through_json() {
    let config = RefinementConfigBuilder::default()
        .strategy(PlacementStrategy::SquareTri)
        .acceptance_ratio(2.0)
        .max_retries(3)
        .max_points(500)
        .time_budget(Duration::from_millis(1500))
        .build()
        .unwrap();

    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"SquareTri\""));
    let restored: RefinementConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, config);
}

#[test]
fn missing_config_fields_take_defaults() {
    let config: RefinementConfig =
        serde_json::from_str(r#"{ "strategy": "Voronoi", "max_iterations": 42 }"#).unwrap();
    assert_eq!(config.strategy, PlacementStrategy::Voronoi);
    assert_eq!(config.max_iterations, Some(42));
    assert_relative_eq!(config.penalty_factor, 10.0);
    assert_relative_eq!(config.convergence_threshold, 0.8);
    assert_eq!(config.max_retries, 8);
    assert!(config.time_budget.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn unknown_strategy_is_rejected() {
    let result: Result<RefinementConfig, _> =
        serde_json::from_str(r#"{ "strategy": "Spiral" }"#);
    assert!(result.is_err());
}

#[test]
fn refined_mesh_round_trips_through_json() {
    let refined = refined_square();
    let json = serde_json::to_string_pretty(&refined).unwrap();
    let restored: RefinedMesh = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, refined);
    assert_eq!(restored.num_points(), refined.num_points());
    assert_eq!(restored.statistics(), refined.statistics());
    assert!(restored.is_counter_clockwise());
}

#[test]
fn point_origins_survive_serialization() {
    let refined = refined_square();
    let restored: RefinedMesh =
        serde_json::from_value(serde_json::to_value(&refined).unwrap()).unwrap();

    assert_eq!(
        restored.points()[2].origin(),
        PointOrigin::Contour {
            contour: 3,
            initial: Some(102),
        }
    );
    assert_eq!(restored.num_points(), 9);
    assert_eq!(restored.points()[8].origin(), PointOrigin::Interior);
}

#[test]
fn statistics_serialize_as_plain_counters() {
    let refined = refined_square();
    let value = serde_json::to_value(refined.statistics()).unwrap();
    assert_eq!(
        value["points_inserted"].as_u64(),
        u64::try_from(refined.statistics().points_inserted).ok()
    );
    assert!(value["max_area_error"].is_number());
    assert!(value.get("carve_failures").is_some());
}
