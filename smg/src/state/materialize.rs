//! Splitting concrete elements off list segments.

use crate::error::SmgError;
use crate::heap::{ObjectId, ObjectKind, PointsToEdge, SymbolicMemoryGraph, TargetSpecifier, ValueId};
use crate::state::SmgState;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, warn};

/// Objects reachable from `root` through objects nested deeper than `level`.
pub(crate) fn nested_closure(
    graph: &SymbolicMemoryGraph,
    root: ObjectId,
    level: u32,
) -> BTreeSet<ObjectId> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([root]);
    while let Some(object) = queue.pop_front() {
        let deeper = graph.object(object).is_some_and(|o| o.level() > level);
        if !deeper || !seen.insert(object) {
            continue;
        }
        queue.extend(graph.successors(object));
    }
    seen
}

impl SmgState {
    /// Make the element `pointer` addresses concrete.
    ///
    /// Returns one successor per possible shape together with the value that now
    /// stands for `pointer`. Pointers to anything but the first or last element of a
    /// list segment come back unchanged.
    pub fn materialize(&self, pointer: ValueId) -> Result<Vec<(SmgState, ValueId)>, SmgError> {
        let Some(edge) = self.graph().points_to(pointer).copied() else {
            return Ok(vec![(self.clone(), pointer)]);
        };
        let kind = *self.graph().get_object(edge.target)?.kind();
        let splittable = matches!(
            (kind, edge.specifier),
            (ObjectKind::SinglyLinked(_), TargetSpecifier::First)
                | (
                    ObjectKind::DoublyLinked(_),
                    TargetSpecifier::First | TargetSpecifier::Last
                )
        );
        if !splittable {
            if kind.is_list_segment() {
                warn!(
                    "Cannot materialize {} through a pointer with specifier {}",
                    edge.target, edge.specifier
                );
            }
            return Ok(vec![(self.clone(), pointer)]);
        }

        let mut successors = Vec::with_capacity(2);
        let mut split = self.clone();
        split.split_segment(edge)?;
        successors.push((split, pointer));
        if kind.min_length() == Some(0) {
            successors.push(self.remove_empty_segment(edge.target, pointer)?);
        }
        debug!(
            "Materialized {} into {} successor(s)",
            edge.target,
            successors.len()
        );
        Ok(successors)
    }

    /// Turn the element `edge` addresses into a region in front of (or behind) the segment.
    fn split_segment(&mut self, edge: PointsToEdge) -> Result<ObjectId, SmgError> {
        let segment_id = edge.target;
        let segment = self.graph().get_object(segment_id)?.clone();
        let level = segment.level();
        let width = self.options().pointer_size;
        let region = self
            .graph_mut()
            .add_heap_object(segment.clone().with_kind(ObjectKind::Region));

        let links = segment.kind().link_offsets();
        let fields: Vec<_> = self
            .graph()
            .fields_of(segment_id)
            .filter(|e| !links.contains(&e.offset))
            .collect();
        let mut copies = BTreeMap::new();
        for field in fields {
            let value = self.copy_nested_value(field.value, segment_id, region, level, &mut copies)?;
            self.graph_mut()
                .write_field(region, field.offset, field.width, value)?;
        }

        let (head, toward, away) = match (*segment.kind(), edge.specifier) {
            (ObjectKind::SinglyLinked(s), _) => (s.head_offset, s.next_offset, None),
            (ObjectKind::DoublyLinked(d), TargetSpecifier::Last) => {
                (d.head_offset, d.prev_offset, Some(d.next_offset))
            }
            (ObjectKind::DoublyLinked(d), _) => {
                (d.head_offset, d.next_offset, Some(d.prev_offset))
            }
            _ => return Err(SmgError::DanglingObject(segment_id)),
        };

        // The region takes over the segment's outer link on its side.
        if let Some(away) = away {
            if let Some(outer) = self.graph().field_at(segment_id, away) {
                self.graph_mut()
                    .write_field(region, away, outer.width, outer.value)?;
            }
        }
        for pointer in self.graph().pointers_to(segment_id) {
            if pointer.specifier == edge.specifier {
                self.graph_mut()
                    .retarget(pointer.value, region, pointer.offset, TargetSpecifier::Region)?;
            }
        }
        let rest = self.graph_mut().new_value();
        self.graph_mut().add_points_to(PointsToEdge {
            value: rest,
            target: segment_id,
            offset: head as i64,
            specifier: edge.specifier,
        })?;
        self.graph_mut().write_field(region, toward, width, rest)?;
        if let Some(away) = away {
            let back = self.address_of(region, head as i64)?;
            self.graph_mut().write_field(segment_id, away, width, back)?;
        }

        let object = self.graph_mut().object_mut(segment_id)?;
        let min = object.kind().concrete_length().saturating_sub(1);
        let kind = object.kind().with_min_length(min);
        object.set_kind(kind);
        Ok(region)
    }

    /// Value to store in the split-off region for a field of the segment.
    ///
    /// Nested sub-graphs are copied one level up; pointers back to every element of
    /// the segment now address the region.
    fn copy_nested_value(
        &mut self,
        value: ValueId,
        segment: ObjectId,
        region: ObjectId,
        level: u32,
        copies: &mut BTreeMap<ObjectId, ObjectId>,
    ) -> Result<ValueId, SmgError> {
        let Some(edge) = self.graph().points_to(value).copied() else {
            return Ok(value);
        };
        if edge.target == segment {
            if edge.specifier == TargetSpecifier::All {
                return self.address_of(region, edge.offset);
            }
            return Ok(value);
        }
        let nested = self
            .graph()
            .object(edge.target)
            .is_some_and(|o| o.level() > level);
        if edge.target.is_null() || !nested {
            return Ok(value);
        }
        if !copies.contains_key(&edge.target) {
            self.copy_subgraph(edge.target, segment, region, level, copies)?;
        }
        let target = copies
            .get(&edge.target)
            .copied()
            .ok_or(SmgError::DanglingObject(edge.target))?;
        self.pointer_with(target, edge.offset, edge.specifier)
    }

    fn copy_subgraph(
        &mut self,
        root: ObjectId,
        segment: ObjectId,
        region: ObjectId,
        level: u32,
        copies: &mut BTreeMap<ObjectId, ObjectId>,
    ) -> Result<(), SmgError> {
        let closure = nested_closure(self.graph(), root, level);
        for object in &closure {
            let mut copy = self.graph().get_object(*object)?.clone();
            copy.set_level(copy.level().saturating_sub(1));
            let id = if self.graph().is_heap_object(*object) {
                self.graph_mut().add_heap_object(copy)
            } else {
                self.graph_mut().add_object(copy)
            };
            copies.insert(*object, id);
        }
        for object in &closure {
            let fields: Vec<_> = self.graph().fields_of(*object).collect();
            for field in fields {
                let value =
                    self.copy_nested_value(field.value, segment, region, level, copies)?;
                let copy = copies
                    .get(object)
                    .copied()
                    .ok_or(SmgError::DanglingObject(*object))?;
                self.graph_mut()
                    .write_field(copy, field.offset, field.width, value)?;
            }
        }
        Ok(())
    }

    /// A pointer value with the given target, reusing an existing one.
    pub(crate) fn pointer_with(
        &mut self,
        target: ObjectId,
        offset: i64,
        specifier: TargetSpecifier,
    ) -> Result<ValueId, SmgError> {
        if let Some(value) = self.graph().find_pointer(target, offset, specifier) {
            return Ok(value);
        }
        let value = self.graph_mut().new_value();
        self.graph_mut().add_points_to(PointsToEdge {
            value,
            target,
            offset,
            specifier,
        })?;
        Ok(value)
    }

    /// The successor in which a segment of minimum length zero is empty.
    fn remove_empty_segment(
        &self,
        segment_id: ObjectId,
        pointer: ValueId,
    ) -> Result<(SmgState, ValueId), SmgError> {
        let mut state = self.clone();
        let segment = state.graph().get_object(segment_id)?.clone();
        let (next, prev) = match *segment.kind() {
            ObjectKind::SinglyLinked(s) => (s.next_offset, None),
            ObjectKind::DoublyLinked(d) => (d.next_offset, Some(d.prev_offset)),
            _ => return Ok((state, pointer)),
        };
        let outer_next = match state.graph().field_at(segment_id, next) {
            Some(edge) => edge.value,
            None => state.graph_mut().new_value(),
        };
        let outer_prev = prev
            .and_then(|p| state.graph().field_at(segment_id, p))
            .map(|e| e.value);

        let mut replacement = pointer;
        for edge in state.graph().pointers_to(segment_id) {
            let substitute = match edge.specifier {
                TargetSpecifier::Last => match outer_prev {
                    Some(v) => v,
                    None => state.graph_mut().new_value(),
                },
                _ => outer_next,
            };
            state.graph_mut().replace_value(edge.value, substitute);
            if edge.value == pointer {
                replacement = substitute;
            }
        }

        let mut removed: Vec<ObjectId> = vec![segment_id];
        let fields: Vec<_> = state.graph().fields_of(segment_id).collect();
        for field in fields {
            if let Some(pt) = state.graph().points_to(field.value) {
                if pt.target != segment_id && !pt.target.is_null() {
                    removed.extend(nested_closure(state.graph(), pt.target, segment.level()));
                }
            }
        }
        state.remove_objects(&removed);
        Ok((state, replacement))
    }
}
