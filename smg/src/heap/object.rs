use internment::Intern;
use std::fmt::{Display, Formatter};

/// Identifier of an object in a [`SymbolicMemoryGraph`](super::SymbolicMemoryGraph).
///
/// Identifiers are never reused within a graph, so a removed object can not be
/// confused with one created later.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub(crate) u64);

impl ObjectId {
    /// The object every null pointer points to.
    pub const NULL: ObjectId = ObjectId(0);

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "o{}", self.0)
    }
}

/// Link layout of a singly-linked list segment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SllShape {
    /// Offset inside a node that incoming pointers point to.
    pub head_offset: u64,
    pub next_offset: u64,
    pub min_length: usize,
}

/// Link layout of a doubly-linked list segment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DllShape {
    pub head_offset: u64,
    pub next_offset: u64,
    pub prev_offset: u64,
    pub min_length: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A single concrete memory region.
    Region,
    SinglyLinked(SllShape),
    DoublyLinked(DllShape),
    /// A region that may or may not exist.
    Optional,
    /// An abstracted object that is not a list segment.
    Generic,
}

impl ObjectKind {
    pub fn is_abstract(&self) -> bool {
        !matches!(self, ObjectKind::Region)
    }

    pub fn is_list_segment(&self) -> bool {
        matches!(
            self,
            ObjectKind::SinglyLinked(_) | ObjectKind::DoublyLinked(_)
        )
    }

    pub fn min_length(&self) -> Option<usize> {
        match self {
            ObjectKind::SinglyLinked(s) => Some(s.min_length),
            ObjectKind::DoublyLinked(d) => Some(d.min_length),
            ObjectKind::Region | ObjectKind::Optional | ObjectKind::Generic => None,
        }
    }

    /// Number of concrete list elements this object stands for at least.
    pub fn concrete_length(&self) -> usize {
        self.min_length().unwrap_or(1)
    }

    pub fn with_min_length(self, min_length: usize) -> Self {
        match self {
            ObjectKind::SinglyLinked(s) => ObjectKind::SinglyLinked(SllShape { min_length, ..s }),
            ObjectKind::DoublyLinked(d) => ObjectKind::DoublyLinked(DllShape { min_length, ..d }),
            other => other,
        }
    }

    /// Equal kinds with equal link offsets; minimum lengths may differ.
    pub fn same_shape(&self, other: &ObjectKind) -> bool {
        match (self, other) {
            (ObjectKind::SinglyLinked(a), ObjectKind::SinglyLinked(b)) => {
                a.head_offset == b.head_offset && a.next_offset == b.next_offset
            }
            (ObjectKind::DoublyLinked(a), ObjectKind::DoublyLinked(b)) => {
                a.head_offset == b.head_offset
                    && a.next_offset == b.next_offset
                    && a.prev_offset == b.prev_offset
            }
            (a, b) => a == b,
        }
    }

    /// Offsets of the fields that link list elements together.
    pub fn link_offsets(&self) -> Vec<u64> {
        match self {
            ObjectKind::SinglyLinked(s) => vec![s.next_offset],
            ObjectKind::DoublyLinked(d) => vec![d.next_offset, d.prev_offset],
            ObjectKind::Region | ObjectKind::Optional | ObjectKind::Generic => vec![],
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Region => write!(f, "region"),
            ObjectKind::SinglyLinked(s) => write!(
                f,
                "sll(head={}, next={}, {}+)",
                s.head_offset, s.next_offset, s.min_length
            ),
            ObjectKind::DoublyLinked(d) => write!(
                f,
                "dll(head={}, next={}, prev={}, {}+)",
                d.head_offset, d.next_offset, d.prev_offset, d.min_length
            ),
            ObjectKind::Optional => write!(f, "optional"),
            ObjectKind::Generic => write!(f, "generic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmgObject {
    size: u64,
    label: Intern<String>,
    kind: ObjectKind,
    level: u32,
    valid: bool,
}

impl SmgObject {
    pub fn region<S: Into<String>>(size: u64, label: S) -> Self {
        Self {
            size,
            label: Intern::new(label.into()),
            kind: ObjectKind::Region,
            level: 0,
            valid: true,
        }
    }

    pub(crate) fn null() -> Self {
        Self {
            size: 0,
            label: Intern::new("null".to_string()),
            kind: ObjectKind::Region,
            level: 0,
            valid: false,
        }
    }

    pub fn with_kind(mut self, kind: ObjectKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn label(&self) -> &str {
        self.label.as_str()
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_abstract(&self) -> bool {
        self.kind.is_abstract()
    }

    pub fn min_length(&self) -> Option<usize> {
        self.kind.min_length()
    }

    pub(crate) fn set_kind(&mut self, kind: ObjectKind) {
        self.kind = kind;
    }

    pub(crate) fn set_level(&mut self, level: u32) {
        self.level = level;
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }
}
