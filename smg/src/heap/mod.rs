//! The symbolic memory graph.
//!
//! A [`SymbolicMemoryGraph`] consists of objects (memory regions and abstract list
//! segments), symbolic values, has-value edges (`object[offset..offset+width] = value`)
//! and points-to edges (`value = &object + offset`). Variables in the global scope
//! and in the frames of the call stack name the objects backing them.
//!
//! Every collection inside the graph is shared behind an [`Arc`] and only copied when
//! it is first mutated, so cloning a graph is cheap and a clone never observes
//! mutations made to another clone.

mod display;
pub mod dot;
mod edge;
mod object;
pub mod path;
mod scope;
#[cfg(test)]
mod tests;
mod value;

use crate::error::SmgError;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

pub use edge::{HasValueEdge, PointsToEdge, TargetSpecifier};
pub use object::{DllShape, ObjectId, ObjectKind, SllShape, SmgObject};
pub use path::{MemoryPath, PathRoot};
pub use scope::{StackFrame, VarName};
pub use value::ValueId;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Field {
    width: u64,
    value: ValueId,
}

#[derive(Debug, Clone)]
pub struct SymbolicMemoryGraph {
    objects: Arc<BTreeMap<ObjectId, SmgObject>>,
    values: Arc<BTreeSet<ValueId>>,
    /// Has-value edges per object, keyed by offset. Edges of one object never overlap.
    fields: Arc<BTreeMap<ObjectId, BTreeMap<u64, Field>>>,
    points_to: Arc<BTreeMap<ValueId, PointsToEdge>>,
    heap: Arc<BTreeSet<ObjectId>>,
    globals: Arc<BTreeMap<VarName, ObjectId>>,
    stack: Arc<Vec<StackFrame>>,
    next_object: u64,
    next_value: u64,
}

impl Default for SymbolicMemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolicMemoryGraph {
    /// Create a graph containing only the null object and the zero value pointing to it.
    pub fn new() -> Self {
        let mut objects = BTreeMap::new();
        objects.insert(ObjectId::NULL, SmgObject::null());
        let mut points_to = BTreeMap::new();
        points_to.insert(
            ValueId::ZERO,
            PointsToEdge {
                value: ValueId::ZERO,
                target: ObjectId::NULL,
                offset: 0,
                specifier: TargetSpecifier::Region,
            },
        );
        Self {
            objects: Arc::new(objects),
            values: Arc::new(BTreeSet::from([ValueId::ZERO])),
            fields: Default::default(),
            points_to: Arc::new(points_to),
            heap: Default::default(),
            globals: Default::default(),
            stack: Default::default(),
            next_object: 1,
            next_value: 1,
        }
    }

    // --- Objects -------------------------------------------------------------------

    pub fn object(&self, id: ObjectId) -> Option<&SmgObject> {
        self.objects.get(&id)
    }

    pub fn get_object(&self, id: ObjectId) -> Result<&SmgObject, SmgError> {
        self.objects.get(&id).ok_or(SmgError::DanglingObject(id))
    }

    pub(crate) fn object_mut(&mut self, id: ObjectId) -> Result<&mut SmgObject, SmgError> {
        Arc::make_mut(&mut self.objects)
            .get_mut(&id)
            .ok_or(SmgError::DanglingObject(id))
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// All objects except the null object.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &SmgObject)> + '_ {
        self.objects
            .iter()
            .filter(|(id, _)| !id.is_null())
            .map(|(id, o)| (*id, o))
    }

    pub fn object_count(&self) -> usize {
        self.objects.len() - 1
    }

    pub fn add_object(&mut self, object: SmgObject) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        Arc::make_mut(&mut self.objects).insert(id, object);
        id
    }

    pub fn add_heap_object(&mut self, object: SmgObject) -> ObjectId {
        let id = self.add_object(object);
        Arc::make_mut(&mut self.heap).insert(id);
        id
    }

    pub fn is_heap_object(&self, id: ObjectId) -> bool {
        self.heap.contains(&id)
    }

    pub fn heap_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.heap.iter().copied()
    }

    /// Remove an object together with its has-value edges.
    ///
    /// Points-to edges targeting the object are left in place; callers redirect or
    /// remove them.
    pub(crate) fn remove_object(&mut self, id: ObjectId) {
        if id.is_null() {
            return;
        }
        Arc::make_mut(&mut self.objects).remove(&id);
        if self.fields.contains_key(&id) {
            Arc::make_mut(&mut self.fields).remove(&id);
        }
        if self.heap.contains(&id) {
            Arc::make_mut(&mut self.heap).remove(&id);
        }
    }

    // --- Scopes --------------------------------------------------------------------

    pub fn add_global(&mut self, name: VarName, object: SmgObject) -> ObjectId {
        let id = self.add_object(object);
        self.bind_global(name, id);
        id
    }

    pub(crate) fn bind_global(&mut self, name: VarName, id: ObjectId) {
        Arc::make_mut(&mut self.globals).insert(name, id);
    }

    pub fn global(&self, name: &VarName) -> Option<ObjectId> {
        self.globals.get(name).copied()
    }

    pub fn globals(&self) -> &BTreeMap<VarName, ObjectId> {
        &self.globals
    }

    pub fn push_frame(&mut self, function: VarName) {
        Arc::make_mut(&mut self.stack).push(StackFrame::new(function));
    }

    /// Remove the innermost frame. The frame's objects stay in the graph.
    pub(crate) fn pop_frame(&mut self) -> Option<StackFrame> {
        if self.stack.is_empty() {
            return None;
        }
        Arc::make_mut(&mut self.stack).pop()
    }

    pub fn add_local(&mut self, name: VarName, object: SmgObject) -> Result<ObjectId, SmgError> {
        if self.stack.is_empty() {
            return Err(SmgError::MissingStackFrame);
        }
        let id = self.add_object(object);
        self.bind_local(name, id)?;
        Ok(id)
    }

    pub(crate) fn bind_local(&mut self, name: VarName, id: ObjectId) -> Result<(), SmgError> {
        let frame = Arc::make_mut(&mut self.stack)
            .last_mut()
            .ok_or(SmgError::MissingStackFrame)?;
        frame.insert(name, id);
        Ok(())
    }

    pub fn set_return_object(&mut self, object: SmgObject) -> Result<ObjectId, SmgError> {
        if self.stack.is_empty() {
            return Err(SmgError::MissingStackFrame);
        }
        let id = self.add_object(object);
        self.bind_return(id)?;
        Ok(id)
    }

    pub(crate) fn bind_return(&mut self, id: ObjectId) -> Result<(), SmgError> {
        let frame = Arc::make_mut(&mut self.stack)
            .last_mut()
            .ok_or(SmgError::MissingStackFrame)?;
        frame.set_return_object(id);
        Ok(())
    }

    pub(crate) fn remove_local(&mut self, frame: usize, name: &VarName) -> Option<ObjectId> {
        Arc::make_mut(&mut self.stack)
            .get_mut(frame)
            .and_then(|f| f.remove(name))
    }

    /// Frames of the call stack, outermost first.
    pub fn stack(&self) -> &[StackFrame] {
        &self.stack
    }

    /// Resolve a variable name in the innermost frame, falling back to the globals.
    pub fn lookup_variable(&self, name: &VarName) -> Option<ObjectId> {
        self.stack
            .last()
            .and_then(|f| f.variable(name))
            .or_else(|| self.global(name))
    }

    /// Objects directly named by a global, local or return slot.
    pub fn scope_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.globals
            .values()
            .copied()
            .chain(self.stack.iter().flat_map(|f| f.objects()))
    }

    // --- Values --------------------------------------------------------------------

    pub fn new_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        Arc::make_mut(&mut self.values).insert(id);
        id
    }

    pub fn contains_value(&self, value: ValueId) -> bool {
        self.values.contains(&value)
    }

    pub fn values(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.values.iter().copied()
    }

    /// Remove a value and its points-to edge. Has-value edges storing it must be gone already.
    pub(crate) fn remove_value(&mut self, value: ValueId) {
        if value.is_zero() {
            return;
        }
        Arc::make_mut(&mut self.values).remove(&value);
        if self.points_to.contains_key(&value) {
            Arc::make_mut(&mut self.points_to).remove(&value);
        }
    }

    // --- Points-to edges -----------------------------------------------------------

    pub fn points_to(&self, value: ValueId) -> Option<&PointsToEdge> {
        self.points_to.get(&value)
    }

    pub fn is_pointer(&self, value: ValueId) -> bool {
        self.points_to.contains_key(&value)
    }

    pub fn points_to_edges(&self) -> impl Iterator<Item = &PointsToEdge> + '_ {
        self.points_to.values()
    }

    pub fn add_points_to(&mut self, edge: PointsToEdge) -> Result<(), SmgError> {
        if !self.contains_value(edge.value) {
            return Err(SmgError::DanglingValue(edge.value));
        }
        if !self.contains_object(edge.target) {
            return Err(SmgError::DanglingObject(edge.target));
        }
        match self.points_to.get(&edge.value) {
            Some(existing) if *existing == edge => Ok(()),
            Some(_) => Err(SmgError::DuplicatePointsTo(edge.value)),
            None => {
                Arc::make_mut(&mut self.points_to).insert(edge.value, edge);
                Ok(())
            }
        }
    }

    /// Replace the points-to edge of `value`, which must already be a pointer.
    pub(crate) fn retarget(
        &mut self,
        value: ValueId,
        target: ObjectId,
        offset: i64,
        specifier: TargetSpecifier,
    ) -> Result<(), SmgError> {
        if !self.contains_object(target) {
            return Err(SmgError::DanglingObject(target));
        }
        let edge = Arc::make_mut(&mut self.points_to)
            .get_mut(&value)
            .ok_or(SmgError::DanglingValue(value))?;
        edge.target = target;
        edge.offset = offset;
        edge.specifier = specifier;
        Ok(())
    }

    /// Points-to edges whose target is `target`.
    pub fn pointers_to(&self, target: ObjectId) -> Vec<PointsToEdge> {
        self.points_to
            .values()
            .filter(|e| e.target == target)
            .copied()
            .collect()
    }

    pub fn find_pointer(
        &self,
        target: ObjectId,
        offset: i64,
        specifier: TargetSpecifier,
    ) -> Option<ValueId> {
        self.points_to
            .values()
            .find(|e| e.target == target && e.offset == offset && e.specifier == specifier)
            .map(|e| e.value)
    }

    // --- Has-value edges -----------------------------------------------------------

    /// Store `value` in `object[offset..offset + width]`.
    ///
    /// Every older edge overlapping the written range is removed and returned.
    pub fn write_field(
        &mut self,
        object: ObjectId,
        offset: u64,
        width: u64,
        value: ValueId,
    ) -> Result<Vec<HasValueEdge>, SmgError> {
        let size = self.get_object(object)?.size();
        if width == 0 {
            return Err(SmgError::EmptyField { object, offset });
        }
        match offset.checked_add(width) {
            Some(end) if end <= size => {}
            _ => {
                return Err(SmgError::OffsetOutOfBounds {
                    object,
                    offset,
                    width,
                    size,
                });
            }
        }
        if !self.contains_value(value) {
            return Err(SmgError::DanglingValue(value));
        }
        let removed = self.overlapping_fields(object, offset, width);
        let fields = Arc::make_mut(&mut self.fields).entry(object).or_default();
        for edge in &removed {
            fields.remove(&edge.offset);
        }
        fields.insert(offset, Field { width, value });
        Ok(removed)
    }

    /// The value stored at exactly `object[offset..offset + width]`.
    pub fn field(&self, object: ObjectId, offset: u64, width: u64) -> Option<ValueId> {
        self.fields
            .get(&object)
            .and_then(|f| f.get(&offset))
            .filter(|f| f.width == width)
            .map(|f| f.value)
    }

    /// The edge starting at `offset`, whatever its width.
    pub fn field_at(&self, object: ObjectId, offset: u64) -> Option<HasValueEdge> {
        self.fields
            .get(&object)
            .and_then(|f| f.get(&offset))
            .map(|f| HasValueEdge {
                object,
                offset,
                width: f.width,
                value: f.value,
            })
    }

    /// Has-value edges of `object`, ordered by offset.
    pub fn fields_of(&self, object: ObjectId) -> impl Iterator<Item = HasValueEdge> + '_ {
        self.fields
            .get(&object)
            .into_iter()
            .flat_map(move |f| {
                f.iter().map(move |(offset, field)| HasValueEdge {
                    object,
                    offset: *offset,
                    width: field.width,
                    value: field.value,
                })
            })
    }

    pub fn has_value_edges(&self) -> impl Iterator<Item = HasValueEdge> + '_ {
        self.fields.iter().flat_map(|(object, f)| {
            f.iter().map(move |(offset, field)| HasValueEdge {
                object: *object,
                offset: *offset,
                width: field.width,
                value: field.value,
            })
        })
    }

    pub fn overlapping_fields(&self, object: ObjectId, offset: u64, width: u64) -> Vec<HasValueEdge> {
        self.fields_of(object)
            .filter(|e| e.overlaps(offset, width))
            .collect()
    }

    pub(crate) fn remove_field(&mut self, object: ObjectId, offset: u64) -> Option<HasValueEdge> {
        let edge = self.field_at(object, offset)?;
        if let Some(f) = Arc::make_mut(&mut self.fields).get_mut(&object) {
            f.remove(&offset);
        }
        Some(edge)
    }

    pub(crate) fn clear_fields(&mut self, object: ObjectId) {
        if self.fields.contains_key(&object) {
            Arc::make_mut(&mut self.fields).remove(&object);
        }
    }

    /// Whether `object[offset..offset + width]` is entirely covered by edges storing zero.
    pub fn is_zero_covered(&self, object: ObjectId, offset: u64, width: u64) -> bool {
        let end = offset + width;
        let mut covered = offset;
        for edge in self.fields_of(object) {
            if covered >= end {
                break;
            }
            if edge.value.is_zero() && edge.offset <= covered && edge.end() > covered {
                covered = edge.end();
            }
        }
        covered >= end
    }

    /// Has-value edges that store `value`.
    pub fn value_uses(&self, value: ValueId) -> Vec<HasValueEdge> {
        self.has_value_edges().filter(|e| e.value == value).collect()
    }

    /// Has-value edges storing a pointer into `target`.
    pub fn incoming_fields(&self, target: ObjectId) -> Vec<HasValueEdge> {
        self.has_value_edges()
            .filter(|e| {
                self.points_to(e.value)
                    .is_some_and(|pt| pt.target == target)
            })
            .collect()
    }

    /// Substitute `new` for `old` in every has-value edge.
    pub(crate) fn replace_value(&mut self, old: ValueId, new: ValueId) {
        let uses = self.value_uses(old);
        if uses.is_empty() {
            return;
        }
        let fields = Arc::make_mut(&mut self.fields);
        for edge in uses {
            if let Some(field) = fields.get_mut(&edge.object).and_then(|f| f.get_mut(&edge.offset)) {
                field.value = new;
            }
        }
    }

    // --- Reachability --------------------------------------------------------------

    /// Objects directly pointed to by fields of `object`, without the null object.
    pub fn successors(&self, object: ObjectId) -> impl Iterator<Item = ObjectId> + '_ {
        self.fields_of(object)
            .filter_map(|e| self.points_to(e.value))
            .map(|pt| pt.target)
            .filter(|t| !t.is_null())
    }

    /// Every object reachable from `roots` (roots included) by following pointer fields.
    pub fn reachable_from<I: IntoIterator<Item = ObjectId>>(&self, roots: I) -> BTreeSet<ObjectId> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<ObjectId> = roots.into_iter().filter(|o| !o.is_null()).collect();
        while let Some(object) = queue.pop_front() {
            if seen.insert(object) {
                queue.extend(self.successors(object).filter(|s| !seen.contains(s)));
            }
        }
        seen
    }

    /// Objects reachable from any variable in scope.
    pub fn reachable_objects(&self) -> BTreeSet<ObjectId> {
        self.reachable_from(self.scope_objects().collect::<Vec<_>>())
    }

    // --- Invariants ----------------------------------------------------------------

    /// Verify the structural invariants of the graph.
    pub fn check_consistency(&self) -> Result<(), SmgError> {
        for edge in self.has_value_edges() {
            let object = self.get_object(edge.object)?;
            if edge.end() > object.size() {
                return Err(SmgError::OffsetOutOfBounds {
                    object: edge.object,
                    offset: edge.offset,
                    width: edge.width,
                    size: object.size(),
                });
            }
            if !self.contains_value(edge.value) {
                return Err(SmgError::DanglingValue(edge.value));
            }
        }
        for (object, fields) in self.fields.iter() {
            let mut end = 0;
            for (offset, field) in fields {
                if *offset < end {
                    return Err(SmgError::OverlappingEdges {
                        object: *object,
                        offset: *offset,
                    });
                }
                end = offset + field.width;
            }
        }
        for (value, edge) in self.points_to.iter() {
            if *value != edge.value {
                return Err(SmgError::DuplicatePointsTo(*value));
            }
            if !self.contains_value(*value) {
                return Err(SmgError::DanglingValue(*value));
            }
            self.get_object(edge.target)?;
        }
        let named: Vec<ObjectId> = self.scope_objects().collect();
        for object in self.heap.iter().chain(named.iter()) {
            self.get_object(*object)?;
        }
        Ok(())
    }
}
