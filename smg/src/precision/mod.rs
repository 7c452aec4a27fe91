//! Per-location precision: which parts of a state are worth keeping, and where list
//! abstraction may run.

mod adjustment;
#[cfg(test)]
mod tests;

use crate::abstraction::AbstractionBlock;
use crate::heap::{MemoryPath, VarName};
use internment::Intern;
use std::collections::BTreeSet;

pub use adjustment::{AdjustmentResult, PrecisionAdjustment};

/// A set of tracked items, or everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Tracked<T: Ord> {
    #[default]
    All,
    Only(BTreeSet<T>),
}

impl<T: Ord> Tracked<T> {
    pub fn none() -> Self {
        Tracked::Only(BTreeSet::new())
    }

    pub fn contains(&self, item: &T) -> bool {
        match self {
            Tracked::All => true,
            Tracked::Only(items) => items.contains(item),
        }
    }
}

impl<T: Ord> FromIterator<T> for Tracked<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Tracked::Only(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SmgPrecision {
    pub tracked_variables: Tracked<VarName>,
    pub tracked_memory_paths: Tracked<MemoryPath>,
    pub abstraction_blocks: Vec<AbstractionBlock>,
    pub is_abstraction_point: bool,
}

impl SmgPrecision {
    /// Track everything and never abstract.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abstraction_point() -> Self {
        Self {
            is_abstraction_point: true,
            ..Self::default()
        }
    }

    pub fn with_tracked_variables<I: IntoIterator<Item = S>, S: AsRef<str>>(mut self, names: I) -> Self {
        self.tracked_variables = names
            .into_iter()
            .map(|n| Intern::new(n.as_ref().to_string()))
            .collect();
        self
    }

    pub fn with_tracked_memory_paths<I: IntoIterator<Item = MemoryPath>>(mut self, paths: I) -> Self {
        self.tracked_memory_paths = paths.into_iter().collect();
        self
    }

    pub fn with_block(mut self, block: AbstractionBlock) -> Self {
        self.abstraction_blocks.push(block);
        self
    }
}
