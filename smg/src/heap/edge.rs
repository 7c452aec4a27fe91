use crate::heap::{ObjectId, ValueId};
use std::fmt::{Display, Formatter};

/// Which concrete element of a (possibly abstract) target a pointer denotes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetSpecifier {
    /// The target is not abstracted.
    Region,
    /// The first element of a list segment.
    First,
    /// The last element of a list segment.
    Last,
    /// Every element of a list segment.
    All,
}

impl Display for TargetSpecifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetSpecifier::Region => write!(f, "reg"),
            TargetSpecifier::First => write!(f, "fst"),
            TargetSpecifier::Last => write!(f, "lst"),
            TargetSpecifier::All => write!(f, "all"),
        }
    }
}

/// `object[offset .. offset + width] = value`
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HasValueEdge {
    pub object: ObjectId,
    pub offset: u64,
    pub width: u64,
    pub value: ValueId,
}

impl HasValueEdge {
    pub fn end(&self) -> u64 {
        self.offset + self.width
    }

    pub fn overlaps(&self, offset: u64, width: u64) -> bool {
        self.offset < offset + width && offset < self.end()
    }
}

impl Display for HasValueEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}[{}..{}] = {}",
            self.object,
            self.offset,
            self.end(),
            self.value
        )
    }
}

/// `value = &target + offset`, qualified by a [`TargetSpecifier`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PointsToEdge {
    pub value: ValueId,
    pub target: ObjectId,
    pub offset: i64,
    pub specifier: TargetSpecifier,
}

impl Display for PointsToEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {}+{} ({})",
            self.value, self.target, self.offset, self.specifier
        )
    }
}
