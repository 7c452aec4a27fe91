use std::fmt::{Display, Formatter};

/// Opaque symbolic value stored in memory.
///
/// Two equal identifiers always denote the same (unknown) number; explicit
/// numbers are kept separately by [`SmgState`](crate::state::SmgState).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(pub(crate) u64);

impl ValueId {
    /// The numeric zero, which doubles as the null pointer.
    pub const ZERO: ValueId = ValueId(0);

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl Display for ValueId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_zero() {
            write!(f, "0")
        } else {
            write!(f, "v{}", self.0)
        }
    }
}
