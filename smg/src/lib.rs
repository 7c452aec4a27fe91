//! Symbolic memory graphs: a heap abstraction for shape analysis of C-like programs.
//!
//! A [`SmgState`] holds a [`SymbolicMemoryGraph`] of objects, symbolic values and the
//! edges between them. Chains of similar heap objects are folded into list segments
//! by the [`abstraction`] module; [`join`] compares and merges states; [`cpa`] ties
//! it all together for a reachability analysis driven by an external front end.

pub mod abstraction;
pub mod cpa;
mod error;
pub mod heap;
pub mod join;
pub mod options;
pub mod precision;
pub mod state;

pub use abstraction::AbstractionManager;
pub use error::SmgError;
pub use heap::{ObjectId, SymbolicMemoryGraph, ValueId};
pub use options::SmgOptions;
pub use precision::{PrecisionAdjustment, SmgPrecision};
pub use state::SmgState;
