use crate::core::triangle::TriangleKey;

use super::SmallBuffer;

// =============================================================================
// ALGORITHM-SPECIFIC BUFFER TYPES
// =============================================================================

/// Inline capacity for per-iteration cavity bookkeeping.
///
/// A Bowyer-Watson cavity in a graded planar mesh rarely holds more than a
/// dozen triangles.
pub const CAVITY_BUFFER_SIZE: usize = 16;

/// Triangles removed by one cavity.
pub type CavityTriangleBuffer = SmallBuffer<TriangleKey, CAVITY_BUFFER_SIZE>;

/// Triangles created by one retriangulation.
pub type NewTriangleBuffer = SmallBuffer<TriangleKey, CAVITY_BUFFER_SIZE>;

/// Triangles that share an edge: at most two in a manifold mesh.
pub type EdgeIncidenceBuffer = SmallBuffer<(TriangleKey, u8), 2>;
