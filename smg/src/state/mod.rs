//! Analysis states: a memory graph plus explicit values and safety flags.

pub mod access;
pub mod builtins;
pub mod errors;
pub mod materialize;
#[cfg(test)]
mod tests;

use crate::error::SmgError;
use crate::heap::{
    ObjectId, PointsToEdge, SmgObject, SymbolicMemoryGraph, TargetSpecifier, ValueId, VarName,
};
use crate::options::SmgOptions;
use errors::{ErrorInfo, MemoryErrorKind};
use internment::Intern;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SmgState {
    graph: SymbolicMemoryGraph,
    /// Known numbers of symbolic values. Zero is implicit.
    explicit: Arc<BTreeMap<ValueId, i64>>,
    /// Objects whose content is controlled by the environment.
    external: Arc<BTreeSet<ObjectId>>,
    errors: ErrorInfo,
    options: Arc<SmgOptions>,
}

impl Default for SmgState {
    fn default() -> Self {
        Self::new(SmgOptions::default())
    }
}

impl SmgState {
    pub fn new(options: SmgOptions) -> Self {
        Self::with_options(Arc::new(options))
    }

    pub fn with_options(options: Arc<SmgOptions>) -> Self {
        Self {
            graph: SymbolicMemoryGraph::new(),
            explicit: Default::default(),
            external: Default::default(),
            errors: ErrorInfo::default(),
            options,
        }
    }

    pub fn graph(&self) -> &SymbolicMemoryGraph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut SymbolicMemoryGraph {
        &mut self.graph
    }

    pub fn options(&self) -> &SmgOptions {
        &self.options
    }

    pub(crate) fn shared_options(&self) -> Arc<SmgOptions> {
        self.options.clone()
    }

    pub fn errors(&self) -> &ErrorInfo {
        &self.errors
    }

    pub(crate) fn errors_mut(&mut self) -> &mut ErrorInfo {
        &mut self.errors
    }

    pub fn has_memory_errors(&self) -> bool {
        self.errors.has_errors()
    }

    pub(crate) fn record_error<I: IntoIterator<Item = ObjectId>>(
        &mut self,
        kind: MemoryErrorKind,
        description: impl Into<String>,
        objects: I,
    ) {
        let description = description.into();
        debug!("{}: {}", kind, description);
        self.errors.record(kind, description, objects);
    }

    /// Finish the current transfer step.
    pub fn next_step(&mut self) {
        self.errors.next_step();
    }

    // --- Scopes --------------------------------------------------------------------

    pub fn declare_global(&mut self, name: &str, size: u64) -> ObjectId {
        let name = Intern::new(name.to_string());
        self.graph.add_global(name, SmgObject::region(size, name.as_str()))
    }

    /// Declare a global whose content is zero-initialized.
    pub fn declare_zeroed_global(&mut self, name: &str, size: u64) -> Result<ObjectId, SmgError> {
        let id = self.declare_global(name, size);
        if size > 0 {
            self.graph.write_field(id, 0, size, ValueId::ZERO)?;
        }
        Ok(id)
    }

    pub fn enter_function(&mut self, function: &str) {
        self.graph.push_frame(Intern::new(function.to_string()));
    }

    pub fn declare_local(&mut self, name: &str, size: u64) -> Result<ObjectId, SmgError> {
        let name: VarName = Intern::new(name.to_string());
        self.graph
            .add_local(name, SmgObject::region(size, name.as_str()))
    }

    pub fn declare_return(&mut self, size: u64) -> Result<ObjectId, SmgError> {
        self.graph
            .set_return_object(SmgObject::region(size, "<return>"))
    }

    /// Drop the innermost frame and collect everything that became unreachable.
    ///
    /// Pointers into the dropped frame stay in the graph but target invalid objects.
    pub fn leave_function(&mut self) -> Result<(), SmgError> {
        let frame = self.graph.pop_frame().ok_or(SmgError::MissingStackFrame)?;
        for object in frame.objects() {
            self.graph.clear_fields(object);
            self.graph.object_mut(object)?.invalidate();
        }
        self.prune_unreachable();
        Ok(())
    }

    pub fn lookup_variable(&self, name: &str) -> Option<ObjectId> {
        self.graph.lookup_variable(&Intern::new(name.to_string()))
    }

    // --- Values --------------------------------------------------------------------

    /// A pointer value to `object + offset`, reusing an existing one if possible.
    pub fn address_of(&mut self, object: ObjectId, offset: i64) -> Result<ValueId, SmgError> {
        if object.is_null() && offset == 0 {
            return Ok(ValueId::ZERO);
        }
        if let Some(value) = self
            .graph
            .find_pointer(object, offset, TargetSpecifier::Region)
        {
            return Ok(value);
        }
        self.graph.get_object(object)?;
        let value = self.graph.new_value();
        self.graph.add_points_to(PointsToEdge {
            value,
            target: object,
            offset,
            specifier: TargetSpecifier::Region,
        })?;
        Ok(value)
    }

    pub fn explicit_value(&self, value: ValueId) -> Option<i64> {
        if value.is_zero() {
            Some(0)
        } else {
            self.explicit.get(&value).copied()
        }
    }

    pub fn explicit_values(&self) -> &BTreeMap<ValueId, i64> {
        &self.explicit
    }

    /// The value denoting the number `n`.
    pub fn value_for(&mut self, n: i64) -> ValueId {
        if n == 0 {
            return ValueId::ZERO;
        }
        if let Some((value, _)) = self
            .explicit
            .iter()
            .find(|(v, e)| **e == n && !self.graph.is_pointer(**v))
        {
            return *value;
        }
        let value = self.graph.new_value();
        Arc::make_mut(&mut self.explicit).insert(value, n);
        value
    }

    /// Record that `value` is known to be `n`.
    ///
    /// Pointers may carry a numeric address too. Zero can only be bound to 0.
    pub fn bind_explicit(&mut self, value: ValueId, n: i64) -> Result<(), SmgError> {
        if !self.graph.contains_value(value) {
            return Err(SmgError::DanglingValue(value));
        }
        if value.is_zero() {
            return match n {
                0 => Ok(()),
                _ => Err(SmgError::Unsupported(format!("binding {} to {}", value, n))),
            };
        }
        Arc::make_mut(&mut self.explicit).insert(value, n);
        Ok(())
    }

    pub fn new_value(&mut self) -> ValueId {
        self.graph.new_value()
    }

    /// A fresh value standing for the result of a construct the engine cannot model.
    pub fn unknown_value(&mut self, reason: &str) -> Result<ValueId, SmgError> {
        if self.options.strict_unknowns {
            return Err(SmgError::Unsupported(reason.to_string()));
        }
        warn!("Using unknown value: {}", reason);
        Ok(self.graph.new_value())
    }

    // --- External objects ----------------------------------------------------------

    pub fn mark_external(&mut self, object: ObjectId) {
        Arc::make_mut(&mut self.external).insert(object);
    }

    pub fn is_external(&self, object: ObjectId) -> bool {
        self.external.contains(&object)
    }

    // --- Cleanup -------------------------------------------------------------------

    /// Remove every object not reachable from a variable.
    ///
    /// Reports a memory leak if a valid heap object was among them. Returns whether
    /// anything was removed.
    pub fn prune_unreachable(&mut self) -> bool {
        let reachable = self.graph.reachable_objects();
        let unreachable: Vec<ObjectId> = self
            .graph
            .objects()
            .map(|(id, _)| id)
            .filter(|id| !reachable.contains(id))
            .collect();
        if unreachable.is_empty() {
            return false;
        }
        let leaked: Vec<ObjectId> = unreachable
            .iter()
            .copied()
            .filter(|o| {
                self.graph.is_heap_object(*o)
                    && self.graph.object(*o).is_some_and(|obj| obj.is_valid())
                    && !self.is_external(*o)
            })
            .collect();
        self.remove_objects(&unreachable);
        if !leaked.is_empty() {
            self.record_error(
                MemoryErrorKind::MemoryLeak,
                format!("{} unreachable heap object(s)", leaked.len()),
                leaked,
            );
        }
        true
    }

    /// Remove objects along with the values pointing into them.
    ///
    /// Callers guarantee that no remaining has-value edge stores such a value.
    pub(crate) fn remove_objects(&mut self, objects: &[ObjectId]) {
        let removed: BTreeSet<ObjectId> = objects.iter().copied().collect();
        let dangling: Vec<ValueId> = self
            .graph
            .points_to_edges()
            .filter(|e| removed.contains(&e.target))
            .map(|e| e.value)
            .collect();
        for object in objects {
            self.graph.remove_object(*object);
            if self.external.contains(object) {
                Arc::make_mut(&mut self.external).remove(object);
            }
        }
        for value in dangling {
            self.remove_value(value);
        }
    }

    pub(crate) fn remove_value(&mut self, value: ValueId) {
        self.graph.remove_value(value);
        if self.explicit.contains_key(&value) {
            Arc::make_mut(&mut self.explicit).remove(&value);
        }
    }

    /// Verify graph invariants and that every explicit binding names a live value.
    pub fn check_consistency(&self) -> Result<(), SmgError> {
        self.graph.check_consistency()?;
        for value in self.explicit.keys() {
            if !self.graph.contains_value(*value) {
                return Err(SmgError::DanglingValue(*value));
            }
        }
        Ok(())
    }
}

impl Display for SmgState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.graph)?;
        if !self.explicit.is_empty() {
            writeln!(f, "explicit:")?;
            for (value, n) in self.explicit.iter() {
                writeln!(f, "  {} = {}", value, n)?;
            }
        }
        if self.errors.has_errors() {
            writeln!(f, "errors: {}", self.errors)?;
        }
        Ok(())
    }
}
