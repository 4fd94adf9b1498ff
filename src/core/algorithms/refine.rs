//! Refinement driver.
//!
//! [`Refiner`] owns a [`Mesh`], its [`PriorityQueue`], the size field and the
//! run configuration, and repeatedly inserts a point into the worst triangle
//! until the mesh converges or a budget runs out.
//!
//! # Iteration
//!
//! ```text
//! Seeking → Localizing → Carving → VolumeChecking → Retriangulating → Seeking
//!    │                      │            │
//!    └→ Converged           └────────────┴→ penalize seed, Seeking
//! ```
//!
//! An iteration either commits an insertion or changes nothing except the
//! priority of its seed triangle. Carving and area-check failures are never
//! fatal: the seed's priority is divided by
//! [`RefinementConfig::penalty_factor`] and it goes back into the queue, still
//! counted as unrefined. A seed that failed [`RefinementConfig::max_retries`]
//! times is left alone until a neighbor's insertion replaces it.
//!
//! The run converges once every triangle meets the target. When triangles
//! still miss it but none of them can take a point, the run stops with
//! [`RefinementError::Stalled`]. That happens when boundary edges are longer
//! than the target size, since refinement never splits the boundary.
//!
//! # Example
//!
//! ```rust
//! use mesh2d::prelude::*;
//!
//! // Unit square with its edge midpoints, at target size 0.5
//! let points = [
//!     [0.0, 0.0], [0.5, 0.0], [1.0, 0.0], [1.0, 0.5],
//!     [1.0, 1.0], [0.5, 1.0], [0.0, 1.0], [0.0, 0.5],
//! ];
//! let square = Contour::new(0, points.iter().map(|&p| ContourPoint::new(p, 0.5)).collect());
//! let seeds: Vec<_> = [[7, 0, 1], [1, 2, 3], [3, 4, 5], [5, 6, 7], [1, 3, 5], [1, 5, 7]]
//!     .into_iter()
//!     .map(|v| SeedTriangle::new(v, TrianglePosition::Intern))
//!     .collect();
//! let mesh = Mesh::from_contours(&[square], &seeds).unwrap();
//!
//! let mut refiner = Refiner::new(mesh, UniformSize(0.5), RefinementConfig::default()).unwrap();
//! let refined = refiner.run().unwrap();
//! assert_eq!(refined.num_points(), 9);
//! assert!(refined.is_counter_clockwise());
//! ```

#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::algorithms::carve::{CarveError, carve};
use crate::core::algorithms::localize::{LocalizeError, PlacementStrategy, localize};
use crate::core::algorithms::retriangulate::{
    QualityRule, RetriangulateError, check_area, classify_front, enqueue, retriangulate,
};
use crate::core::mesh::{LocateResult, Mesh, MeshError};
use crate::core::priority::{PriorityQueue, QueueEntry};
use crate::core::triangle::TriangleKey;
use crate::geometry::point::{MeshPoint, PointIndex};
use crate::geometry::predicates::{GeometryError, triangle_signed_area};
use crate::geometry::size_field::SizeField;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Parameters of a refinement run.
///
/// # Examples
///
/// ```rust
/// use mesh2d::core::algorithms::refine::{RefinementConfig, RefinementConfigBuilder};
/// use mesh2d::core::algorithms::localize::PlacementStrategy;
///
/// let config = RefinementConfigBuilder::default()
///     .strategy(PlacementStrategy::Voronoi)
///     .max_iterations(10_000)
///     .build()
///     .unwrap();
/// assert_eq!(config.penalty_factor, 10.0);
/// assert_eq!(config.max_iterations, Some(10_000));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct RefinementConfig {
    /// Insertion point placement.
    pub strategy: PlacementStrategy,
    /// Non-frontal runs stop once the worst quality drops below this value.
    pub convergence_threshold: f64,
    /// Frontal runs accept a triangle once `local_size / quality` exceeds this.
    pub acceptance_ratio: f64,
    /// Largest relative area difference a committed cavity may have.
    pub area_tolerance: f64,
    /// Divisor applied to a seed's priority after a failed iteration.
    pub penalty_factor: f64,
    /// Failed iterations after which a seed is no longer selected.
    pub max_retries: u32,
    /// Iteration budget.
    #[builder(setter(strip_option))]
    pub max_iterations: Option<usize>,
    /// Budget on inserted points.
    #[builder(setter(strip_option))]
    pub max_points: Option<usize>,
    /// Wall-clock budget.
    #[builder(setter(strip_option))]
    pub time_budget: Option<Duration>,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            strategy: PlacementStrategy::Circumcenter,
            convergence_threshold: 0.8,
            acceptance_ratio: 1.5,
            area_tolerance: 1e-6,
            penalty_factor: 10.0,
            max_retries: 8,
            max_iterations: None,
            max_points: None,
            time_budget: None,
        }
    }
}

impl RefinementConfig {
    /// Checks that every numeric parameter is finite and positive, and that
    /// the penalty actually lowers a quality.
    ///
    /// # Errors
    ///
    /// Returns [`RefinementError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), RefinementError> {
        let positive = [
            ("convergence_threshold", self.convergence_threshold),
            ("acceptance_ratio", self.acceptance_ratio),
            ("area_tolerance", self.area_tolerance),
            ("penalty_factor", self.penalty_factor),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(RefinementError::InvalidConfig {
                    reason: format!("{field} must be finite and positive, got {value}"),
                });
            }
        }
        if self.penalty_factor <= 1.0 {
            return Err(RefinementError::InvalidConfig {
                reason: format!(
                    "penalty_factor must exceed 1 to lower a quality, got {}",
                    self.penalty_factor
                ),
            });
        }
        Ok(())
    }

    /// Convergence threshold as applied to the strategy.
    ///
    /// Frontal strategies converge on acceptance alone.
    #[must_use]
    pub fn effective_threshold(&self) -> Option<f64> {
        (!self.strategy.is_frontal()).then_some(self.convergence_threshold)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Which budget ran out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Budget {
    /// `max_iterations`.
    Iterations,
    /// `max_points`.
    Points,
    /// `time_budget`.
    Time,
}

/// Errors that end a refinement run.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RefinementError {
    /// A new triangle had no circumcircle.
    #[error("Degenerate geometry during retriangulation: {0}")]
    DegenerateGeometry(#[source] GeometryError),
    /// A frontal strategy selected a triangle without a front edge.
    #[error("No front edge to place a point on in triangle {key:?}")]
    LocalizationAmbiguity {
        /// The selected triangle.
        key: TriangleKey,
    },
    /// Triangles still miss the target but none of them can be refined.
    #[error(
        "Refinement stalled: {unsettled} triangles miss the target and none can take a point"
    )]
    Stalled {
        /// Triangles above the target, waiting ones included.
        unsettled: usize,
    },
    /// A budget ran out before convergence.
    #[error(
        "{budget:?} budget exhausted after {iterations} iterations ({points_inserted} points inserted, {cavity_failures} cavity failures)"
    )]
    BudgetExhausted {
        /// The budget that ran out.
        budget: Budget,
        /// Iterations performed.
        iterations: usize,
        /// Points inserted.
        points_inserted: usize,
        /// Retryable carve and area failures so far.
        cavity_failures: usize,
    },
    /// Internal mesh inconsistency.
    #[error("Mesh error during refinement: {0}")]
    Mesh(#[from] MeshError),
    /// The configuration is unusable.
    #[error("Invalid refinement configuration: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },
}

impl From<LocalizeError> for RefinementError {
    fn from(err: LocalizeError) -> Self {
        match err {
            LocalizeError::Ambiguous { key } => Self::LocalizationAmbiguity { key },
            LocalizeError::TriangleNotFound { key } => MeshError::TriangleNotFound { key }.into(),
            LocalizeError::Mesh(err) => err.into(),
        }
    }
}

/// A failed run, with the mesh as far as it got.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RefinementFailure {
    /// Why the run stopped.
    #[source]
    pub error: RefinementError,
    /// The partial mesh, consistently oriented.
    pub partial: Box<RefinedMesh>,
}

// =============================================================================
// OUTPUT
// =============================================================================

/// Counters collected over a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RefinementStatistics {
    /// Iterations performed, retries included.
    pub iterations: usize,
    /// Points inserted.
    pub points_inserted: usize,
    /// Triangles created by retriangulation.
    pub triangles_created: usize,
    /// Triangles removed with their cavity.
    pub triangles_removed: usize,
    /// Iterations whose carving failed.
    pub carve_failures: usize,
    /// Iterations whose area check failed.
    pub area_failures: usize,
    /// Largest relative area error of a committed cavity.
    pub max_area_error: f64,
}

impl RefinementStatistics {
    /// Carve and area failures together.
    #[must_use]
    pub const fn cavity_failures(&self) -> usize {
        self.carve_failures + self.area_failures
    }
}

/// The result of a refinement run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefinedMesh {
    points: Vec<MeshPoint>,
    triangles: Vec<[PointIndex; 3]>,
    statistics: RefinementStatistics,
}

impl RefinedMesh {
    /// Snapshots a mesh, turning every triangle counter-clockwise.
    #[must_use]
    pub fn from_mesh(mesh: &Mesh, statistics: RefinementStatistics) -> Self {
        let points = mesh.points().to_vec();
        let triangles = mesh
            .triangles()
            .map(|(_, t)| {
                let [a, b, c] = t.vertices();
                match mesh.corner_coords([a, b, c]) {
                    Ok([pa, pb, pc]) if triangle_signed_area(pa, pb, pc) < 0.0 => [b, a, c],
                    _ => [a, b, c],
                }
            })
            .collect();
        Self {
            points,
            triangles,
            statistics,
        }
    }

    /// Number of points.
    #[must_use]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of triangles.
    #[must_use]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// All points, including the input contour points.
    #[must_use]
    pub fn points(&self) -> &[MeshPoint] {
        &self.points
    }

    /// Triangles as point index triples.
    #[must_use]
    pub fn triangles(&self) -> &[[PointIndex; 3]] {
        &self.triangles
    }

    /// Run counters.
    #[must_use]
    pub const fn statistics(&self) -> &RefinementStatistics {
        &self.statistics
    }

    /// Total triangle area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.triangles
            .iter()
            .filter_map(|t| self.corners(*t))
            .map(|[a, b, c]| triangle_signed_area(a, b, c).abs())
            .sum()
    }

    /// Returns `true` if no triangle has negative signed area.
    #[must_use]
    pub fn is_counter_clockwise(&self) -> bool {
        self.triangles.iter().all(|t| {
            self.corners(*t)
                .is_some_and(|[a, b, c]| triangle_signed_area(a, b, c) >= 0.0)
        })
    }

    fn corners(&self, t: [PointIndex; 3]) -> Option<[[f64; 2]; 3]> {
        Some([
            self.points.get(t[0])?.coords(),
            self.points.get(t[1])?.coords(),
            self.points.get(t[2])?.coords(),
        ])
    }
}

// =============================================================================
// DRIVER
// =============================================================================

/// Driver state, advanced once per stage of an iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverState {
    /// Selecting the worst triangle.
    Seeking,
    /// Computing the insertion point.
    Localizing,
    /// Growing the cavity.
    Carving,
    /// Checking area conservation.
    VolumeChecking,
    /// Committing the new triangles.
    Retriangulating,
    /// Nothing left to refine.
    Converged,
}

/// What one call to [`Refiner::step`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// A point was inserted.
    Inserted(PointIndex),
    /// The seed was penalized and requeued.
    Retried(TriangleKey),
    /// The mesh has converged.
    Converged,
}

/// Incremental Delaunay refinement of a mesh.
#[derive(Debug)]
pub struct Refiner<S: SizeField> {
    mesh: Mesh,
    queue: PriorityQueue,
    size_field: S,
    config: RefinementConfig,
    statistics: RefinementStatistics,
    state: DriverState,
    started: Instant,
}

fn rule_for<'a, S: SizeField>(config: &RefinementConfig, size_field: &'a S) -> QualityRule<'a, S> {
    QualityRule {
        strategy: config.strategy,
        acceptance_ratio: config.acceptance_ratio,
        size_field,
    }
}

impl<S: SizeField> Refiner<S> {
    /// Prepares a run: validates the configuration, computes quality and
    /// position of every triangle, and fills the queue.
    ///
    /// # Errors
    ///
    /// - [`RefinementError::InvalidConfig`] for a bad configuration.
    /// - [`RefinementError::Mesh`] if the mesh references missing points.
    pub fn new(mut mesh: Mesh, size_field: S, config: RefinementConfig) -> Result<Self, RefinementError> {
        config.validate()?;
        let mut queue = PriorityQueue::with_threshold(config.effective_threshold());
        let keys: Vec<TriangleKey> = mesh.triangle_keys().collect();

        let rule = rule_for(&config, &size_field);
        for &key in &keys {
            rule.assign(&mut mesh, key, None)?;
        }
        if config.strategy.is_frontal() {
            for &key in &keys {
                classify_front(&mut mesh, key)?;
            }
        }
        for &key in &keys {
            enqueue(&mesh, &mut queue, key)?;
        }

        tracing::debug!(
            triangles = keys.len(),
            waiting = queue.waiting_len(),
            strategy = ?config.strategy,
            "Initial scan complete"
        );

        Ok(Self {
            mesh,
            queue,
            size_field,
            config,
            statistics: RefinementStatistics::default(),
            state: DriverState::Seeking,
            started: Instant::now(),
        })
    }

    /// The mesh under refinement.
    #[must_use]
    pub const fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// The priority structure.
    #[must_use]
    pub const fn queue(&self) -> &PriorityQueue {
        &self.queue
    }

    /// The run configuration.
    #[must_use]
    pub const fn config(&self) -> &RefinementConfig {
        &self.config
    }

    /// Counters so far.
    #[must_use]
    pub const fn statistics(&self) -> &RefinementStatistics {
        &self.statistics
    }

    /// Current driver state.
    #[must_use]
    pub const fn state(&self) -> DriverState {
        self.state
    }

    /// Releases the mesh.
    #[must_use]
    pub fn into_mesh(self) -> Mesh {
        self.mesh
    }

    /// Snapshot of the current mesh, every triangle counter-clockwise.
    #[must_use]
    pub fn finish(&self) -> RefinedMesh {
        RefinedMesh::from_mesh(&self.mesh, self.statistics)
    }

    /// The triangle the next iteration would refine, if any.
    ///
    /// Only triangles that still miss the target are considered. Among them,
    /// those whose insertion point would not lie strictly inside the mesh are
    /// skipped, as are seeds that already failed
    /// [`RefinementConfig::max_retries`] times.
    #[must_use]
    pub fn worst(&self) -> Option<QueueEntry> {
        self.queue.worst(|entry| {
            self.mesh
                .triangle(entry.key)
                .is_some_and(|t| t.retries() < self.config.max_retries)
                && self.places_inside(entry.key)
        })
    }

    fn places_inside(&self, key: TriangleKey) -> bool {
        match localize(&self.mesh, key, self.config.strategy, &self.size_field) {
            Ok(point) => matches!(self.mesh.locate_from(point, key), LocateResult::Inside(_)),
            // Selected anyway so that the step reports the error
            Err(_) => true,
        }
    }

    /// Returns `true` once every triangle meets the target.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.queue.is_converged()
    }

    fn transition(&mut self, next: DriverState) {
        if self.state != next {
            tracing::trace!(from = ?self.state, to = ?next, "Driver state");
            self.state = next;
        }
    }

    /// Runs one iteration.
    ///
    /// # Errors
    ///
    /// - [`RefinementError::LocalizationAmbiguity`] if a frontal strategy
    ///   selects a triangle with no front edge.
    /// - [`RefinementError::DegenerateGeometry`] if retriangulation meets a
    ///   triangle with no circumcircle.
    /// - [`RefinementError::Stalled`] if triangles miss the target but none
    ///   can be refined.
    /// - [`RefinementError::Mesh`] on internal inconsistency.
    pub fn step(&mut self) -> Result<StepOutcome, RefinementError> {
        if self.state == DriverState::Converged {
            return Ok(StepOutcome::Converged);
        }
        self.transition(DriverState::Seeking);

        let Some(entry) = self.worst() else {
            let unsettled = self.queue.unsettled_len();
            if unsettled > 0 {
                return Err(RefinementError::Stalled { unsettled });
            }
            self.transition(DriverState::Converged);
            tracing::info!(
                iterations = self.statistics.iterations,
                points_inserted = self.statistics.points_inserted,
                triangles = self.mesh.num_triangles(),
                cavity_failures = self.statistics.cavity_failures(),
                max_area_error = self.statistics.max_area_error,
                "Refinement converged"
            );
            return Ok(StepOutcome::Converged);
        };
        self.statistics.iterations += 1;
        let seed = entry.key;

        self.transition(DriverState::Localizing);
        let point = localize(&self.mesh, seed, self.config.strategy, &self.size_field)?;

        self.transition(DriverState::Carving);
        let cavity = match carve(&self.mesh, seed, point) {
            Ok(cavity) => cavity,
            Err(CarveError::Boundary(err)) => {
                tracing::debug!(?seed, %err, "Carving failed, penalizing seed");
                self.statistics.carve_failures += 1;
                self.penalize(seed)?;
                self.transition(DriverState::Seeking);
                return Ok(StepOutcome::Retried(seed));
            }
            Err(CarveError::InvalidSeed { key }) => {
                return Err(MeshError::TriangleNotFound { key }.into());
            }
            Err(CarveError::Mesh(err)) => return Err(err.into()),
        };

        self.transition(DriverState::VolumeChecking);
        let fan = match check_area(&self.mesh, &cavity, point, self.config.area_tolerance) {
            Ok(fan) => fan,
            Err(err) => return self.recover(seed, err),
        };

        self.transition(DriverState::Retriangulating);
        let rule = rule_for(&self.config, &self.size_field);
        let result =
            match retriangulate(&mut self.mesh, &mut self.queue, &cavity, &fan, point, &rule) {
                Ok(result) => result,
                Err(err) => return self.recover(seed, err),
            };

        self.statistics.points_inserted += 1;
        self.statistics.triangles_created += result.created.len();
        self.statistics.triangles_removed += result.removed;
        self.statistics.max_area_error = self.statistics.max_area_error.max(result.area_error);
        self.transition(DriverState::Seeking);
        Ok(StepOutcome::Inserted(result.point))
    }

    /// Retries area failures; everything else ends the run.
    fn recover(
        &mut self,
        seed: TriangleKey,
        err: RetriangulateError,
    ) -> Result<StepOutcome, RefinementError> {
        match err {
            RetriangulateError::DegenerateGeometry(err) => {
                Err(RefinementError::DegenerateGeometry(err))
            }
            RetriangulateError::Mesh(err) => Err(err.into()),
            RetriangulateError::AreaMismatch { .. } | RetriangulateError::DegenerateFan { .. } => {
                tracing::debug!(?seed, %err, "Area check failed, penalizing seed");
                self.statistics.area_failures += 1;
                self.penalize(seed)?;
                self.transition(DriverState::Seeking);
                Ok(StepOutcome::Retried(seed))
            }
        }
    }

    /// Divides the seed's priority by the penalty factor and requeues it.
    ///
    /// Quality and position are left alone, so the seed still counts as
    /// unrefined.
    fn penalize(&mut self, seed: TriangleKey) -> Result<(), RefinementError> {
        let triangle = self
            .mesh
            .triangle_mut(seed)
            .ok_or(MeshError::TriangleNotFound { key: seed })?;
        triangle.penalize(self.config.penalty_factor);
        tracing::debug!(
            ?seed,
            priority = triangle.priority(),
            retries = triangle.retries(),
            "Penalized seed"
        );
        enqueue(&self.mesh, &mut self.queue, seed)?;
        Ok(())
    }

    fn budget_exhausted(&self) -> Option<Budget> {
        if self
            .config
            .max_iterations
            .is_some_and(|max| self.statistics.iterations >= max)
        {
            return Some(Budget::Iterations);
        }
        if self
            .config
            .max_points
            .is_some_and(|max| self.statistics.points_inserted >= max)
        {
            return Some(Budget::Points);
        }
        if self
            .config
            .time_budget
            .is_some_and(|budget| self.started.elapsed() >= budget)
        {
            return Some(Budget::Time);
        }
        None
    }

    /// Iterates until convergence, a budget runs out, or a hard error.
    ///
    /// Budgets are checked between iterations. The wall-clock budget counts
    /// from [`Refiner::new`].
    ///
    /// # Errors
    ///
    /// Returns a [`RefinementFailure`] carrying the error and the partial,
    /// counter-clockwise mesh.
    pub fn run(&mut self) -> Result<RefinedMesh, RefinementFailure> {
        loop {
            if let Some(budget) = self.budget_exhausted() {
                if self.is_converged() {
                    self.transition(DriverState::Converged);
                    return Ok(self.finish());
                }
                tracing::info!(
                    ?budget,
                    iterations = self.statistics.iterations,
                    points_inserted = self.statistics.points_inserted,
                    "Refinement budget exhausted"
                );
                let error = RefinementError::BudgetExhausted {
                    budget,
                    iterations: self.statistics.iterations,
                    points_inserted: self.statistics.points_inserted,
                    cavity_failures: self.statistics.cavity_failures(),
                };
                return Err(self.fail(error));
            }

            match self.step() {
                Ok(StepOutcome::Converged) => return Ok(self.finish()),
                Ok(StepOutcome::Inserted(_) | StepOutcome::Retried(_)) => {}
                Err(error) => {
                    tracing::warn!(%error, "Refinement stopped");
                    return Err(self.fail(error));
                }
            }
        }
    }

    fn fail(&self, error: RefinementError) -> RefinementFailure {
        RefinementFailure {
            error,
            partial: Box::new(self.finish()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mesh::SeedTriangle;
    use crate::core::triangle::TrianglePosition;
    use crate::geometry::point::{Contour, ContourPoint};
    use crate::geometry::size_field::UniformSize;
    use approx::assert_relative_eq;

    fn square(size: f64) -> Mesh {
        let contour = Contour::new(
            0,
            [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
                .into_iter()
                .map(|p| ContourPoint::new(p, size))
                .collect(),
        );
        Mesh::from_contours(
            &[contour],
            &[
                SeedTriangle::new([0, 1, 2], TrianglePosition::Intern),
                SeedTriangle::new([0, 2, 3], TrianglePosition::Intern),
            ],
        )
        .unwrap()
    }

    #[test]
    fn default_config_values() {
        let config = RefinementConfig::default();
        assert_eq!(config.strategy, PlacementStrategy::Circumcenter);
        assert_relative_eq!(config.convergence_threshold, 0.8);
        assert_relative_eq!(config.acceptance_ratio, 1.5);
        assert_relative_eq!(config.area_tolerance, 1e-6);
        assert_relative_eq!(config.penalty_factor, 10.0);
        assert_eq!(config.max_retries, 8);
        assert!(config.max_iterations.is_none());
        assert_eq!(config.effective_threshold(), Some(0.8));
        assert_eq!(
            RefinementConfigBuilder::default().build().unwrap(),
            RefinementConfig::default()
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = RefinementConfig {
            penalty_factor: 1.0,
            ..RefinementConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RefinementError::InvalidConfig { .. })
        ));
        let config = RefinementConfig {
            area_tolerance: f64::NAN,
            ..RefinementConfig::default()
        };
        assert!(Refiner::new(square(1.0), UniformSize(1.0), config).is_err());
    }

    #[test]
    fn coarse_square_converges_without_insertion() {
        let mut refiner =
            Refiner::new(square(1.0), UniformSize(1.0), RefinementConfig::default()).unwrap();
        assert!(refiner.is_converged());
        assert_eq!(refiner.step().unwrap(), StepOutcome::Converged);
        assert_eq!(refiner.state(), DriverState::Converged);
        let refined = refiner.run().unwrap();
        assert_eq!(refined.num_points(), 4);
        assert_eq!(refined.num_triangles(), 2);
        assert_eq!(refined.statistics().points_inserted, 0);
    }

    #[test]
    fn fine_square_inserts_the_centre_first() {
        let mut refiner =
            Refiner::new(square(0.1), UniformSize(0.1), RefinementConfig::default()).unwrap();
        let outcome = refiner.step().unwrap();
        assert_eq!(outcome, StepOutcome::Inserted(4));
        let centre = refiner.mesh().point(4).unwrap();
        assert_relative_eq!(centre.x(), 0.5);
        assert_relative_eq!(centre.y(), 0.5);
        assert_eq!(refiner.mesh().num_triangles(), 4);
        refiner.mesh().validate().unwrap();
        assert_eq!(refiner.queue().len(), 4);
    }

    #[test]
    fn worst_is_stable_without_mutation() {
        let refiner =
            Refiner::new(square(0.1), UniformSize(0.1), RefinementConfig::default()).unwrap();
        let first = refiner.worst();
        assert!(first.is_some());
        assert_eq!(first, refiner.worst());
    }

    #[test]
    fn penalty_divides_priority_only() {
        let mut refiner =
            Refiner::new(square(0.1), UniformSize(0.1), RefinementConfig::default()).unwrap();
        let entry = refiner.worst().unwrap();
        refiner.penalize(entry.key).unwrap();
        let after = *refiner.queue().entry(entry.key).unwrap();
        assert_relative_eq!(after.priority, entry.priority / 10.0, epsilon = 1e-12);
        assert_relative_eq!(after.quality, entry.quality);
        assert_eq!(after.tier, entry.tier);
        assert!(after.is_eligible());
        assert_eq!(refiner.queue().len(), 2);
        assert!(!refiner.is_converged());
    }

    #[test]
    fn exhausted_retries_stall_the_run() {
        let mut refiner =
            Refiner::new(square(0.1), UniformSize(0.1), RefinementConfig::default()).unwrap();
        let first = refiner.worst().unwrap().key;
        for _ in 0..8 {
            refiner.penalize(first).unwrap();
        }
        let second = refiner.worst().unwrap().key;
        assert_ne!(first, second);
        for _ in 0..8 {
            refiner.penalize(second).unwrap();
        }
        assert!(refiner.worst().is_none());
        assert_eq!(
            refiner.step(),
            Err(RefinementError::Stalled { unsettled: 2 })
        );
        assert_ne!(refiner.state(), DriverState::Converged);
    }

    #[test]
    fn coarse_boundary_stalls_instead_of_converging() {
        let mut refiner =
            Refiner::new(square(0.1), UniformSize(0.1), RefinementConfig::default()).unwrap();
        let failure = refiner.run().unwrap_err();
        assert_eq!(failure.error, RefinementError::Stalled { unsettled: 4 });
        assert_eq!(failure.partial.num_points(), 5);
        assert_eq!(failure.partial.num_triangles(), 4);
        assert!(!refiner.is_converged());
        assert!(
            refiner
                .mesh()
                .triangles()
                .all(|(_, t)| t.quality() >= 0.8)
        );
    }

    #[test]
    fn frontal_penalty_keeps_the_position() {
        let config = RefinementConfig {
            strategy: PlacementStrategy::Voronoi,
            ..RefinementConfig::default()
        };
        let mut refiner = Refiner::new(square(0.2), UniformSize(0.2), config).unwrap();
        let keys: Vec<TriangleKey> = refiner.mesh().triangle_keys().collect();
        for key in keys {
            let before = refiner.mesh().triangle(key).unwrap().position();
            for _ in 0..3 {
                refiner.penalize(key).unwrap();
            }
            let triangle = refiner.mesh().triangle(key).unwrap();
            assert_eq!(triangle.position(), before);
            assert_eq!(triangle.retries(), 3);
            assert!(refiner.queue().entry(key).unwrap().is_eligible());
        }
        assert!(!refiner.is_converged());
    }

    #[test]
    fn iteration_budget_reports_partial_mesh() {
        let config = RefinementConfigBuilder::default()
            .strategy(PlacementStrategy::Barycenter)
            .max_iterations(5)
            .build()
            .unwrap();
        let mut refiner = Refiner::new(square(0.1), UniformSize(0.1), config).unwrap();
        let failure = refiner.run().unwrap_err();
        assert!(matches!(
            failure.error,
            RefinementError::BudgetExhausted {
                budget: Budget::Iterations,
                iterations: 5,
                ..
            }
        ));
        assert!(failure.partial.is_counter_clockwise());
        assert_relative_eq!(failure.partial.area(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn frontal_scan_marks_boundary_triangles_active() {
        let config = RefinementConfig {
            strategy: PlacementStrategy::Voronoi,
            ..RefinementConfig::default()
        };
        let refiner = Refiner::new(square(0.2), UniformSize(0.2), config).unwrap();
        assert_eq!(refiner.config().effective_threshold(), None);
        for (_, triangle) in refiner.mesh().triangles() {
            assert_eq!(triangle.position(), TrianglePosition::Active);
        }
        assert_eq!(refiner.queue().waiting_len(), 0);
    }

    #[test]
    fn error_conversions_keep_the_cause() {
        let mut arena = slotmap::SlotMap::<TriangleKey, ()>::with_key();
        let key = arena.insert(());
        assert_eq!(
            RefinementError::from(LocalizeError::Ambiguous { key }),
            RefinementError::LocalizationAmbiguity { key }
        );
        assert_eq!(
            RefinementError::from(LocalizeError::TriangleNotFound { key }),
            RefinementError::Mesh(MeshError::TriangleNotFound { key })
        );
        let err = RefinementError::DegenerateGeometry(GeometryError::DegenerateTriangle {
            points: [[0.0, 0.0]; 3],
        });
        assert!(std::error::Error::source(&err).is_some());
    }
}
