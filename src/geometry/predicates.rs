//! Planar geometric predicates.
//!
//! This module contains the small set of predicates the refinement engine
//! relies on: circumcircle construction, the point-in-circumcircle tests,
//! orientation, and shoelace areas.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by geometric constructions.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GeometryError {
    /// The three points are collinear (or coincident) so no circumcircle exists.
    #[error("Degenerate triangle {points:?}: circumcenter denominator is zero")]
    DegenerateTriangle {
        /// The offending triangle corners.
        points: [[f64; 2]; 3],
    },
}

// =============================================================================
// CIRCUMCIRCLE
// =============================================================================

/// Computes the circumcenter of the triangle `(p1, p2, p3)`.
///
/// Solves the perpendicular-bisector system directly. The denominator is
/// `d = 2·(y1(x2−x3) + y2(x3−x1) + y3(x1−x2))`.
///
/// # Errors
///
/// Returns [`GeometryError::DegenerateTriangle`] when `d` is exactly zero or
/// the solution is not finite. NaN coordinates are never returned.
///
/// # Examples
///
/// ```rust
/// use mesh2d::geometry::predicates::circumcenter;
///
/// let c = circumcenter([0.0, 0.0], [1.0, 0.0], [0.0, 1.0]).unwrap();
/// assert_eq!(c, [0.5, 0.5]);
///
/// assert!(circumcenter([0.0, 0.0], [1.0, 1.0], [2.0, 2.0]).is_err());
/// ```
pub fn circumcenter(p1: [f64; 2], p2: [f64; 2], p3: [f64; 2]) -> Result<[f64; 2], GeometryError> {
    let [x1, y1] = p1;
    let [x2, y2] = p2;
    let [x3, y3] = p3;

    let d = 2.0 * (y1 * (x2 - x3) + y2 * (x3 - x1) + y3 * (x1 - x2));
    if d == 0.0 {
        return Err(GeometryError::DegenerateTriangle {
            points: [p1, p2, p3],
        });
    }

    let n1 = x1.mul_add(x1, y1 * y1);
    let n2 = x2.mul_add(x2, y2 * y2);
    let n3 = x3.mul_add(x3, y3 * y3);

    let xc = (n1 * (y3 - y2) + n2 * (y1 - y3) + n3 * (y2 - y1)) / d;
    let yc = (n1 * (x2 - x3) + n2 * (x3 - x1) + n3 * (x1 - x2)) / d;

    if !(xc.is_finite() && yc.is_finite()) {
        return Err(GeometryError::DegenerateTriangle {
            points: [p1, p2, p3],
        });
    }
    Ok([xc, yc])
}

/// Cached circumcircle of a triangle.
///
/// The radius is stored squared (`rc`) so containment tests never take a
/// square root.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Circumcircle {
    center: [f64; 2],
    radius_sq: f64,
}

impl Circumcircle {
    /// Builds the circumcircle through three points.
    ///
    /// # Errors
    ///
    /// Propagates [`GeometryError::DegenerateTriangle`] from [`circumcenter`].
    pub fn through(p1: [f64; 2], p2: [f64; 2], p3: [f64; 2]) -> Result<Self, GeometryError> {
        let center = circumcenter(p1, p2, p3)?;
        Ok(Self {
            center,
            radius_sq: squared_distance(center, p1),
        })
    }

    /// Circumcenter `(xc, yc)`.
    #[inline]
    #[must_use]
    pub const fn center(&self) -> [f64; 2] {
        self.center
    }

    /// Squared circumradius.
    #[inline]
    #[must_use]
    pub const fn radius_sq(&self) -> f64 {
        self.radius_sq
    }

    /// Circumradius.
    #[inline]
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius_sq.sqrt()
    }

    /// Point-in-circumcircle test.
    ///
    /// Points on the circle count as inside (`rc >= dc`), which guarantees the
    /// cavity always grows past cocircular configurations.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mesh2d::geometry::predicates::Circumcircle;
    ///
    /// let circle = Circumcircle::through([0.0, 0.0], [1.0, 0.0], [0.0, 1.0]).unwrap();
    /// assert!(circle.contains([0.5, 0.5]));
    /// assert!(circle.contains([1.0, 1.0])); // cocircular
    /// assert!(!circle.contains([2.0, 2.0]));
    /// ```
    #[inline]
    #[must_use]
    pub fn contains(&self, point: [f64; 2]) -> bool {
        self.radius_sq >= squared_distance(self.center, point)
    }
}

// =============================================================================
// ORIENTATION AND AREA
// =============================================================================

/// Twice the signed area of `(a, b, c)`.
///
/// Positive for counter-clockwise, negative for clockwise, zero for collinear.
#[inline]
#[must_use]
pub fn orient2d(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]).mul_add(c[1] - a[1], -((b[1] - a[1]) * (c[0] - a[0])))
}

/// Incircle determinant of `d` against the triangle `(a, b, c)`.
///
/// Positive when `d` lies inside the circle through a counter-clockwise
/// `(a, b, c)`, negative outside, zero on it. The sign flips for clockwise
/// input. Coordinates are taken relative to `d`, which keeps the result
/// accurate for flat triangles whose circumcenter is far away.
#[must_use]
pub fn incircle(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> f64 {
    let (adx, ady) = (a[0] - d[0], a[1] - d[1]);
    let (bdx, bdy) = (b[0] - d[0], b[1] - d[1]);
    let (cdx, cdy) = (c[0] - d[0], c[1] - d[1]);

    let alift = adx * adx + ady * ady;
    let blift = bdx * bdx + bdy * bdy;
    let clift = cdx * cdx + cdy * cdy;

    alift * (bdx * cdy - cdx * bdy)
        + blift * (cdx * ady - adx * cdy)
        + clift * (adx * bdy - bdx * ady)
}

/// Returns `true` if `point` lies inside or on the circumcircle of
/// `corners`, in either orientation.
///
/// Unlike [`Circumcircle::contains`], this never goes through the
/// circumcenter, so it stays reliable for slivers.
///
/// # Examples
///
/// ```rust
/// use mesh2d::geometry::predicates::in_circumcircle;
///
/// let sliver = [[0.0, 0.0], [1.0, 0.0], [0.5, 1e-12]];
/// assert!(in_circumcircle(sliver, [0.5, -1e-9]));
/// assert!(!in_circumcircle(sliver, [0.5, 2e-12]));
/// ```
#[must_use]
pub fn in_circumcircle(corners: [[f64; 2]; 3], point: [f64; 2]) -> bool {
    let [a, b, c] = corners;
    let det = incircle(a, b, c, point);
    if orient2d(a, b, c) < 0.0 {
        det <= 0.0
    } else {
        det >= 0.0
    }
}

/// Signed area of the triangle `(a, b, c)`.
#[inline]
#[must_use]
pub fn triangle_signed_area(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    0.5 * orient2d(a, b, c)
}

/// Signed area of an ordered polygon (shoelace formula).
///
/// Counter-clockwise polygons have positive area. Fewer than three points
/// yield zero.
///
/// # Examples
///
/// ```rust
/// use mesh2d::geometry::predicates::signed_area;
///
/// let square = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
/// assert_eq!(signed_area(&square), 1.0);
///
/// let reversed: Vec<_> = square.iter().rev().copied().collect();
/// assert_eq!(signed_area(&reversed), -1.0);
/// ```
#[must_use]
pub fn signed_area(polygon: &[[f64; 2]]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let twice: f64 = polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .map(|(p, q)| p[0].mul_add(q[1], -(q[0] * p[1])))
        .sum();
    0.5 * twice
}

// =============================================================================
// SMALL VECTOR HELPERS
// =============================================================================

/// Squared Euclidean distance.
#[inline]
#[must_use]
pub fn squared_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx.mul_add(dx, dy * dy)
}

/// Euclidean distance.
#[inline]
#[must_use]
pub fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

/// Midpoint of a segment.
#[inline]
#[must_use]
pub fn midpoint(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    [0.5 * (a[0] + b[0]), 0.5 * (a[1] + b[1])]
}

/// Arithmetic mean of three points.
#[inline]
#[must_use]
pub fn barycenter(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> [f64; 2] {
    [(a[0] + b[0] + c[0]) / 3.0, (a[1] + b[1] + c[1]) / 3.0]
}

// =============================================================================
// TESTS
// =============================================================================
