//! Reading and writing memory through objects and pointers.

use crate::error::SmgError;
use crate::heap::{ObjectId, TargetSpecifier, ValueId};
use crate::state::SmgState;
use crate::state::errors::MemoryErrorKind;

impl SmgState {
    /// Whether `object[offset..offset + width]` may be accessed.
    fn accessible(&self, object: ObjectId, offset: i64, width: u64) -> Result<(), String> {
        let Some(obj) = self.graph().object(object) else {
            return Err(format!("access to unknown object {}", object));
        };
        if object.is_null() {
            return Err("null pointer dereference".to_string());
        }
        if !obj.is_valid() {
            return Err(format!("access to invalid object {}", object));
        }
        let in_bounds = u64::try_from(offset)
            .ok()
            .and_then(|o| o.checked_add(width))
            .is_some_and(|end| end <= obj.size());
        if !in_bounds {
            return Err(format!(
                "access to {}[{}..{}] outside of size {}",
                object,
                offset,
                offset.saturating_add(width as i64),
                obj.size()
            ));
        }
        Ok(())
    }

    /// Read `width` bytes at `offset` of `object`.
    ///
    /// Zero-initialized ranges read as zero. Reading a range without an edge yields a
    /// fresh value that is stored if no other edge overlaps the range.
    pub fn read_value(&mut self, object: ObjectId, offset: i64, width: u64) -> Result<ValueId, SmgError> {
        if let Err(description) = self.accessible(object, offset, width) {
            self.record_error(MemoryErrorKind::InvalidRead, description, [object]);
            return Ok(self.new_value());
        }
        let offset = offset as u64;
        if let Some(value) = self.graph().field(object, offset, width) {
            return Ok(value);
        }
        if self.graph().is_zero_covered(object, offset, width) {
            return Ok(ValueId::ZERO);
        }
        let value = self.new_value();
        if self.graph().overlapping_fields(object, offset, width).is_empty() {
            self.graph_mut().write_field(object, offset, width, value)?;
        }
        Ok(value)
    }

    /// Store `value` in `width` bytes at `offset` of `object`.
    pub fn write_value(
        &mut self,
        object: ObjectId,
        offset: i64,
        width: u64,
        value: ValueId,
    ) -> Result<(), SmgError> {
        if let Err(description) = self.accessible(object, offset, width) {
            self.record_error(MemoryErrorKind::InvalidWrite, description, [object]);
            return Ok(());
        }
        self.graph_mut()
            .write_field(object, offset as u64, width, value)?;
        Ok(())
    }

    /// Read `*(pointer + offset)`, materializing abstract targets first.
    pub fn dereference(
        &self,
        pointer: ValueId,
        offset: i64,
        width: u64,
    ) -> Result<Vec<(SmgState, ValueId)>, SmgError> {
        let mut successors = vec![];
        for (mut state, pointer) in self.materialize(pointer)? {
            let value = match state.resolve(pointer, offset)? {
                Target::Object(object, offset) => state.read_value(object, offset, width)?,
                Target::Overflow(object) => {
                    state.record_error(
                        MemoryErrorKind::InvalidRead,
                        format!("offset {} overflows a pointer into {}", offset, object),
                        [object],
                    );
                    state.new_value()
                }
                Target::Summary => state.unknown_value("read through a summarized pointer")?,
                Target::Unknown => state.unknown_value("read through an unknown pointer")?,
            };
            successors.push((state, value));
        }
        Ok(successors)
    }

    /// Write `*(pointer + offset) = value`, materializing abstract targets first.
    pub fn write_through(
        &self,
        pointer: ValueId,
        offset: i64,
        width: u64,
        value: ValueId,
    ) -> Result<Vec<SmgState>, SmgError> {
        let mut successors = vec![];
        for (mut state, pointer) in self.materialize(pointer)? {
            match state.resolve(pointer, offset)? {
                Target::Object(object, offset) => state.write_value(object, offset, width, value)?,
                Target::Overflow(object) => state.record_error(
                    MemoryErrorKind::InvalidWrite,
                    format!("offset {} overflows a pointer into {}", offset, object),
                    [object],
                ),
                Target::Summary => {
                    // Every element may be the one written; the field is no longer known.
                    if let Some(edge) = state.graph().points_to(pointer).copied() {
                        if let Some(start) = edge
                            .offset
                            .checked_add(offset)
                            .and_then(|o| u64::try_from(o).ok())
                        {
                            for field in state.graph().overlapping_fields(edge.target, start, width) {
                                state.graph_mut().remove_field(field.object, field.offset);
                            }
                        }
                    }
                }
                Target::Unknown => {
                    state.unknown_value("write through an unknown pointer")?;
                }
            }
            successors.push(state);
        }
        Ok(successors)
    }

    fn resolve(&self, pointer: ValueId, offset: i64) -> Result<Target, SmgError> {
        let Some(edge) = self.graph().points_to(pointer).copied() else {
            return Ok(Target::Unknown);
        };
        let object = self.graph().get_object(edge.target)?;
        if object.kind().is_list_segment() && edge.specifier != TargetSpecifier::Region {
            return Ok(Target::Summary);
        }
        Ok(match edge.offset.checked_add(offset) {
            Some(offset) => Target::Object(edge.target, offset),
            None => Target::Overflow(edge.target),
        })
    }
}

enum Target {
    Object(ObjectId, i64),
    /// The target offset does not fit into an `i64`.
    Overflow(ObjectId),
    /// A list segment addressed as a whole.
    Summary,
    Unknown,
}
