use crate::abstraction::ShapeDifference;
use crate::state::builtins::AllocationFunctions;
use serde::{Deserialize, Serialize};

/// Configuration of the memory graph engine.
///
/// All fields have defaults, so a partially written configuration file still loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmgOptions {
    /// Minimum number of concrete elements before identical list nodes are folded.
    pub equality_threshold: usize,
    /// Minimum number of concrete elements before nodes that differ in unknown
    /// (symbolic) field values are folded, forgetting those fields.
    pub entailment_threshold: usize,
    /// Minimum number of concrete elements before nodes with contradicting
    /// explicit field values are folded.
    pub incomparable_threshold: usize,
    /// Forget untracked local variables during precision adjustment.
    pub stack_abstraction: bool,
    /// Forget untracked scalar fields during precision adjustment.
    pub field_abstraction: bool,
    /// Run list abstraction at abstraction points.
    pub heap_abstraction: bool,
    /// Model a failing allocation (returning null) as an additional successor.
    pub malloc_can_fail: bool,
    /// Report unsupported constructs as errors instead of yielding unknown values.
    pub strict_unknowns: bool,
    /// Width in bytes of a pointer-sized field.
    pub pointer_size: u64,
    pub allocation: AllocationFunctions,
}

impl Default for SmgOptions {
    fn default() -> Self {
        Self {
            equality_threshold: 2,
            entailment_threshold: 2,
            incomparable_threshold: 3,
            stack_abstraction: true,
            field_abstraction: true,
            heap_abstraction: true,
            malloc_can_fail: false,
            strict_unknowns: false,
            pointer_size: 8,
            allocation: AllocationFunctions::default(),
        }
    }
}

impl SmgOptions {
    /// The minimum folded length a chain with the given worst-case difference must reach.
    pub fn threshold_for(&self, difference: ShapeDifference) -> usize {
        match difference {
            ShapeDifference::Equal => self.equality_threshold,
            ShapeDifference::Entailed => self.entailment_threshold.max(self.equality_threshold),
            ShapeDifference::Incomparable => self
                .incomparable_threshold
                .max(self.entailment_threshold)
                .max(self.equality_threshold),
        }
    }
}
