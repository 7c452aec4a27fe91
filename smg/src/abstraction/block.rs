use crate::abstraction::candidate::{AbstractionCandidate, ListShape};
use crate::heap::{MemoryPath, ObjectId};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Keeps the list abstraction from folding chains matching a pattern.
///
/// Unset length or start match any chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AbstractionBlock {
    pub shape: ListShape,
    pub object_size: u64,
    pub length: Option<usize>,
    pub start: Option<MemoryPath>,
}

impl AbstractionBlock {
    pub fn new(shape: ListShape, object_size: u64) -> Self {
        Self {
            shape,
            object_size,
            length: None,
            start: None,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_start(mut self, start: MemoryPath) -> Self {
        self.start = Some(start);
        self
    }

    pub fn blocks(
        &self,
        candidate: &AbstractionCandidate,
        object_size: u64,
        paths: &BTreeMap<ObjectId, MemoryPath>,
    ) -> bool {
        self.shape == candidate.shape()
            && self.object_size == object_size
            && self.length.is_none_or(|l| l == candidate.length())
            && self
                .start
                .as_ref()
                .is_none_or(|s| paths.get(&candidate.first()) == Some(s))
    }
}

impl Display for AbstractionBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "block {} size {}", self.shape, self.object_size)?;
        if let Some(length) = self.length {
            write!(f, " length {}", length)?;
        }
        if let Some(start) = &self.start {
            write!(f, " at {}", start)?;
        }
        Ok(())
    }
}
