//! Allocation and deallocation functions.

use crate::error::SmgError;
use crate::heap::{ObjectKind, SmgObject, ValueId};
use crate::state::SmgState;
use crate::state::errors::MemoryErrorKind;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BuiltinKind {
    Malloc,
    Calloc,
    Free,
}

/// Names of the functions the engine models as heap allocation and release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationFunctions {
    pub malloc: Vec<String>,
    pub calloc: Vec<String>,
    pub free: Vec<String>,
    /// Index of the size argument of malloc-like functions.
    pub size_parameter: usize,
}

impl Default for AllocationFunctions {
    fn default() -> Self {
        Self {
            malloc: vec!["malloc".into(), "__kmalloc".into(), "kmalloc".into()],
            calloc: vec!["calloc".into(), "kzalloc".into()],
            free: vec!["free".into(), "kfree".into()],
            size_parameter: 0,
        }
    }
}

impl AllocationFunctions {
    pub fn classify(&self, function: &str) -> Option<BuiltinKind> {
        let matches = |names: &[String]| names.iter().any(|n| n == function);
        if matches(&self.malloc) {
            Some(BuiltinKind::Malloc)
        } else if matches(&self.calloc) {
            Some(BuiltinKind::Calloc)
        } else if matches(&self.free) {
            Some(BuiltinKind::Free)
        } else {
            None
        }
    }
}

/// Successors of a builtin call: each state with the call's return value.
pub type CallSuccessors = Vec<(SmgState, ValueId)>;

impl SmgState {
    /// Execute `function(args)` if it is a configured allocation function.
    ///
    /// Returns `None` for functions that are not builtins.
    pub fn call_builtin(
        &self,
        function: &str,
        args: &[ValueId],
    ) -> Result<Option<CallSuccessors>, SmgError> {
        let Some(kind) = self.options().allocation.classify(function) else {
            return Ok(None);
        };
        let successors = match kind {
            BuiltinKind::Malloc => {
                let index = self.options().allocation.size_parameter;
                match self.explicit_argument(args, index) {
                    Some(size) => self.malloc(size)?,
                    None => self.unknown_call(function)?,
                }
            }
            BuiltinKind::Calloc => {
                match (
                    self.explicit_argument(args, 0),
                    self.explicit_argument(args, 1),
                ) {
                    (Some(count), Some(size)) => self.calloc(count, size)?,
                    _ => self.unknown_call(function)?,
                }
            }
            BuiltinKind::Free => {
                let pointer = args.first().copied().ok_or_else(|| {
                    SmgError::Unsupported(format!("{} called without arguments", function))
                })?;
                self.free(pointer)?
                    .into_iter()
                    .map(|s| (s, ValueId::ZERO))
                    .collect()
            }
        };
        Ok(Some(successors))
    }

    fn explicit_argument(&self, args: &[ValueId], index: usize) -> Option<u64> {
        args.get(index)
            .and_then(|v| self.explicit_value(*v))
            .and_then(|n| u64::try_from(n).ok())
    }

    fn unknown_call(&self, function: &str) -> Result<CallSuccessors, SmgError> {
        let mut state = self.clone();
        let value = state.unknown_value(&format!("{} with symbolic size", function))?;
        Ok(vec![(state, value)])
    }

    /// Allocate an uninitialized heap region of `size` bytes.
    pub fn malloc(&self, size: u64) -> Result<CallSuccessors, SmgError> {
        self.allocate(size, false)
    }

    /// Allocate a zero-initialized heap region of `count * size` bytes.
    pub fn calloc(&self, count: u64, size: u64) -> Result<CallSuccessors, SmgError> {
        match count.checked_mul(size) {
            Some(total) => self.allocate(total, true),
            None => {
                warn!("calloc({}, {}) overflows", count, size);
                Ok(vec![(self.clone(), ValueId::ZERO)])
            }
        }
    }

    fn allocate(&self, size: u64, zeroed: bool) -> Result<CallSuccessors, SmgError> {
        let mut state = self.clone();
        let label = if zeroed { "calloc" } else { "malloc" };
        let object = state
            .graph_mut()
            .add_heap_object(SmgObject::region(size, label));
        if zeroed && size > 0 {
            state
                .graph_mut()
                .write_field(object, 0, size, ValueId::ZERO)?;
        }
        let pointer = state.address_of(object, 0)?;
        debug!("Allocated {} of size {}", object, size);
        let mut successors = vec![(state, pointer)];
        if self.options().malloc_can_fail {
            successors.push((self.clone(), ValueId::ZERO));
        }
        Ok(successors)
    }

    /// Release the heap object `pointer` points to.
    ///
    /// Misuse is recorded as [`MemoryErrorKind::InvalidFree`] in the successor.
    pub fn free(&self, pointer: ValueId) -> Result<Vec<SmgState>, SmgError> {
        if pointer.is_zero() {
            return Ok(vec![self.clone()]);
        }
        let mut successors = vec![];
        for (mut state, pointer) in self.materialize(pointer)? {
            // The list was empty, so this is free(NULL).
            if !pointer.is_zero() {
                state.free_materialized(pointer)?;
            }
            successors.push(state);
        }
        Ok(successors)
    }

    fn free_materialized(&mut self, pointer: ValueId) -> Result<(), SmgError> {
        let Some(edge) = self.graph().points_to(pointer).copied() else {
            self.record_error(
                MemoryErrorKind::InvalidFree,
                format!("free of non-pointer value {}", pointer),
                [],
            );
            return Ok(());
        };
        if edge.target.is_null() {
            self.record_error(
                MemoryErrorKind::InvalidFree,
                format!("free of null plus offset {}", edge.offset),
                [],
            );
            return Ok(());
        }
        let object = self.graph().get_object(edge.target)?.clone();
        if !self.graph().is_heap_object(edge.target) {
            self.record_error(
                MemoryErrorKind::InvalidFree,
                format!("free of non-heap object {}", edge.target),
                [edge.target],
            );
            return Ok(());
        }
        if edge.offset != 0 {
            self.record_error(
                MemoryErrorKind::InvalidFree,
                format!("free of {} at non-zero offset {}", edge.target, edge.offset),
                [edge.target],
            );
            return Ok(());
        }
        if !object.is_valid() {
            self.record_error(
                MemoryErrorKind::InvalidFree,
                format!("double free of {}", edge.target),
                [edge.target],
            );
            return Ok(());
        }
        if matches!(
            object.kind(),
            ObjectKind::SinglyLinked(_) | ObjectKind::DoublyLinked(_)
        ) {
            // Only pointers that address every element remain abstract here.
            warn!("Ignoring free of summarized list elements in {}", edge.target);
            return Ok(());
        }
        self.graph_mut().clear_fields(edge.target);
        self.graph_mut().object_mut(edge.target)?.invalidate();
        debug!("Freed {}", edge.target);
        Ok(())
    }
}
