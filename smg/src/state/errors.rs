use crate::heap::ObjectId;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// Memory-safety violations recorded in a state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemoryErrorKind {
    InvalidRead,
    InvalidWrite,
    InvalidFree,
    MemoryLeak,
}

impl Display for MemoryErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryErrorKind::InvalidRead => write!(f, "invalid read"),
            MemoryErrorKind::InvalidWrite => write!(f, "invalid write"),
            MemoryErrorKind::InvalidFree => write!(f, "invalid free"),
            MemoryErrorKind::MemoryLeak => write!(f, "memory leak"),
        }
    }
}

/// Safety flags of a state together with the objects implicated in them.
///
/// Flags only ever get set. The current chain collects objects involved in the
/// step being executed; [`ErrorInfo::next_step`] moves it into the invalid chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    invalid_read: bool,
    invalid_write: bool,
    invalid_free: bool,
    memory_leak: bool,
    description: Option<String>,
    current_chain: Vec<ObjectId>,
    invalid_chain: Vec<ObjectId>,
}

impl ErrorInfo {
    pub fn record<I: IntoIterator<Item = ObjectId>>(
        &mut self,
        kind: MemoryErrorKind,
        description: impl Into<String>,
        objects: I,
    ) {
        match kind {
            MemoryErrorKind::InvalidRead => self.invalid_read = true,
            MemoryErrorKind::InvalidWrite => self.invalid_write = true,
            MemoryErrorKind::InvalidFree => self.invalid_free = true,
            MemoryErrorKind::MemoryLeak => self.memory_leak = true,
        }
        self.description = Some(description.into());
        for object in objects {
            if !self.current_chain.contains(&object) {
                self.current_chain.push(object);
            }
        }
    }

    pub fn is_set(&self, kind: MemoryErrorKind) -> bool {
        match kind {
            MemoryErrorKind::InvalidRead => self.invalid_read,
            MemoryErrorKind::InvalidWrite => self.invalid_write,
            MemoryErrorKind::InvalidFree => self.invalid_free,
            MemoryErrorKind::MemoryLeak => self.memory_leak,
        }
    }

    pub fn kinds(&self) -> Vec<MemoryErrorKind> {
        [
            MemoryErrorKind::InvalidRead,
            MemoryErrorKind::InvalidWrite,
            MemoryErrorKind::InvalidFree,
            MemoryErrorKind::MemoryLeak,
        ]
        .into_iter()
        .filter(|k| self.is_set(*k))
        .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.invalid_read || self.invalid_write || self.invalid_free || self.memory_leak
    }

    /// Whether both infos carry the same set of flags.
    pub fn same_flags(&self, other: &ErrorInfo) -> bool {
        self.kinds() == other.kinds()
    }

    /// Set every flag that is set in `other`.
    pub fn absorb_flags(&mut self, other: &ErrorInfo) {
        self.invalid_read |= other.invalid_read;
        self.invalid_write |= other.invalid_write;
        self.invalid_free |= other.invalid_free;
        self.memory_leak |= other.memory_leak;
        if self.description.is_none() {
            self.description.clone_from(&other.description);
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn current_chain(&self) -> &[ObjectId] {
        &self.current_chain
    }

    pub fn invalid_chain(&self) -> &[ObjectId] {
        &self.invalid_chain
    }

    pub fn next_step(&mut self) {
        let current = std::mem::take(&mut self.current_chain);
        for object in current {
            if !self.invalid_chain.contains(&object) {
                self.invalid_chain.push(object);
            }
        }
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let kinds = self.kinds();
        if kinds.is_empty() {
            return write!(f, "no memory errors");
        }
        write!(f, "{}", kinds.iter().join(", "))?;
        if let Some(description) = &self.description {
            write!(f, ": {}", description)?;
        }
        Ok(())
    }
}
