//! High-performance collection types for the mesh data structures.
//!
//! Hash maps use `rustc_hash`'s Fx hasher (keys are internal triangle keys and
//! point indices, never user-controlled), and short per-iteration lists use
//! `SmallVec` to stay on the stack.

mod aliases;
mod buffers;
mod helpers;

pub use aliases::*;
pub use buffers::*;
pub use helpers::*;
