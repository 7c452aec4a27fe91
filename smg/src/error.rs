use crate::heap::{ObjectId, ValueId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmgError {
    #[error("Has-value edge at offset {offset} with width {width} exceeds {object} of size {size}")]
    OffsetOutOfBounds {
        object: ObjectId,
        offset: u64,
        width: u64,
        size: u64,
    },
    #[error("Has-value edge at offset {offset} of {object} has width 0")]
    EmptyField { object: ObjectId, offset: u64 },
    #[error("Has-value edges of {object} overlap at offset {offset}")]
    OverlappingEdges { object: ObjectId, offset: u64 },
    #[error("Value {0} already has a points-to edge to a different target")]
    DuplicatePointsTo(ValueId),
    #[error("Reference to object {0}, which is not part of the graph")]
    DanglingObject(ObjectId),
    #[error("Reference to value {0}, which is not part of the graph")]
    DanglingValue(ValueId),
    #[error("Tried to declare a local variable without an active stack frame")]
    MissingStackFrame,
    #[error("Construct cannot be modeled precisely: {0}")]
    Unsupported(String),
}

impl SmgError {
    /// Inconsistencies abort the current path; no sound successor can be computed.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SmgError::Unsupported(_))
    }
}
