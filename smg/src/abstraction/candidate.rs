use crate::abstraction::ShapeDifference;
use crate::abstraction::block::AbstractionBlock;
use crate::error::SmgError;
use crate::heap::{DllShape, ObjectId, ObjectKind, SllShape};
use crate::state::SmgState;
use std::fmt::{Display, Formatter};

/// Link layout of a list found in the graph.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListShape {
    Singly {
        head_offset: u64,
        next_offset: u64,
    },
    Doubly {
        head_offset: u64,
        next_offset: u64,
        prev_offset: u64,
    },
}

impl ListShape {
    pub fn head_offset(&self) -> u64 {
        match self {
            ListShape::Singly { head_offset, .. } | ListShape::Doubly { head_offset, .. } => {
                *head_offset
            }
        }
    }

    pub fn next_offset(&self) -> u64 {
        match self {
            ListShape::Singly { next_offset, .. } | ListShape::Doubly { next_offset, .. } => {
                *next_offset
            }
        }
    }

    pub fn prev_offset(&self) -> Option<u64> {
        match self {
            ListShape::Singly { .. } => None,
            ListShape::Doubly { prev_offset, .. } => Some(*prev_offset),
        }
    }

    pub fn is_doubly_linked(&self) -> bool {
        matches!(self, ListShape::Doubly { .. })
    }

    pub fn link_offsets(&self) -> Vec<u64> {
        let mut links = vec![self.next_offset()];
        links.extend(self.prev_offset());
        links
    }

    /// The segment kind summarizing `min_length` elements of this shape.
    pub fn segment_kind(&self, min_length: usize) -> ObjectKind {
        match *self {
            ListShape::Singly {
                head_offset,
                next_offset,
            } => ObjectKind::SinglyLinked(SllShape {
                head_offset,
                next_offset,
                min_length,
            }),
            ListShape::Doubly {
                head_offset,
                next_offset,
                prev_offset,
            } => ObjectKind::DoublyLinked(DllShape {
                head_offset,
                next_offset,
                prev_offset,
                min_length,
            }),
        }
    }

    /// Whether an object of `kind` may be an element of a list of this shape.
    pub fn admits(&self, kind: &ObjectKind) -> bool {
        match kind {
            ObjectKind::Region => true,
            ObjectKind::SinglyLinked(_) | ObjectKind::DoublyLinked(_) => {
                kind.same_shape(&self.segment_kind(0))
            }
            ObjectKind::Optional | ObjectKind::Generic => false,
        }
    }
}

impl Display for ListShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ListShape::Singly {
                head_offset,
                next_offset,
            } => write!(f, "sll(head={}, next={})", head_offset, next_offset),
            ListShape::Doubly {
                head_offset,
                next_offset,
                prev_offset,
            } => write!(
                f,
                "dll(head={}, next={}, prev={})",
                head_offset, next_offset, prev_offset
            ),
        }
    }
}

/// A chain of list elements that may be folded into one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractionCandidate {
    shape: ListShape,
    objects: Vec<ObjectId>,
    length: usize,
    difference: ShapeDifference,
}

impl AbstractionCandidate {
    pub(crate) fn new(
        shape: ListShape,
        objects: Vec<ObjectId>,
        length: usize,
        difference: ShapeDifference,
    ) -> Self {
        Self {
            shape,
            objects,
            length,
            difference,
        }
    }

    pub fn shape(&self) -> ListShape {
        self.shape
    }

    /// Chain elements from first to last.
    pub fn objects(&self) -> &[ObjectId] {
        &self.objects
    }

    pub fn first(&self) -> ObjectId {
        self.objects[0]
    }

    pub fn last(&self) -> ObjectId {
        self.objects[self.objects.len() - 1]
    }

    /// Number of concrete elements the chain stands for.
    pub fn length(&self) -> usize {
        self.length
    }

    /// The largest difference between the first element and any other one.
    pub fn difference(&self) -> ShapeDifference {
        self.difference
    }

    pub fn score(&self) -> usize {
        self.length
    }

    /// The block a refinement registers to keep this chain concrete.
    pub fn to_block(&self, state: &SmgState) -> Result<AbstractionBlock, SmgError> {
        let first = state.graph().get_object(self.first())?;
        let block = AbstractionBlock::new(self.shape, first.size()).with_length(self.length);
        Ok(match state.graph().object_paths().remove(&self.first()) {
            Some(path) => block.with_start(path),
            None => block,
        })
    }
}

impl Display for AbstractionCandidate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of length {} [", self.shape, self.length)?;
        for (i, object) in self.objects.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", object)?;
        }
        write!(f, "] ({:?})", self.difference)
    }
}
