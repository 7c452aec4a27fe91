//! Joining two states into one describing their common structure.
//!
//! The join walks both graphs in lock-step, starting at the variables, and maps
//! objects and values of either input to objects and values of the result. Any
//! structural mismatch makes the join undefined; this is an ordinary outcome and
//! not an error.

mod status;
#[cfg(test)]
mod tests;

use crate::error::SmgError;
use crate::heap::{HasValueEdge, ObjectId, ObjectKind, PointsToEdge, SmgObject, TargetSpecifier, ValueId};
use crate::state::SmgState;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

pub use status::JoinStatus;

#[derive(Debug, Clone)]
pub enum JoinResult {
    Defined { state: SmgState, status: JoinStatus },
    NotDefined,
}

impl JoinResult {
    pub fn is_defined(&self) -> bool {
        matches!(self, JoinResult::Defined { .. })
    }

    pub fn status(&self) -> Option<JoinStatus> {
        match self {
            JoinResult::Defined { status, .. } => Some(*status),
            JoinResult::NotDefined => None,
        }
    }

    pub fn into_state(self) -> Option<SmgState> {
        match self {
            JoinResult::Defined { state, .. } => Some(state),
            JoinResult::NotDefined => None,
        }
    }
}

pub fn join(left: &SmgState, right: &SmgState) -> JoinResult {
    match Joiner::new(left, right).run() {
        Ok((state, status)) => JoinResult::Defined { state, status },
        Err(Mismatch(reason)) => {
            debug!("Join not defined: {}", reason);
            JoinResult::NotDefined
        }
    }
}

/// Whether every memory `a` describes is also described by `b`.
pub fn is_less_or_equal(a: &SmgState, b: &SmgState) -> bool {
    matches!(
        join(a, b).status(),
        Some(JoinStatus::Equal | JoinStatus::LeftEntailed)
    )
}

/// States are equal if they describe the same memories, regardless of identifiers.
impl PartialEq for SmgState {
    fn eq(&self, other: &Self) -> bool {
        join(self, other).status() == Some(JoinStatus::Equal)
    }
}

impl Eq for SmgState {}

impl PartialOrd for SmgState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match join(self, other).status()? {
            JoinStatus::Equal => Some(Ordering::Equal),
            JoinStatus::LeftEntailed => Some(Ordering::Less),
            JoinStatus::RightEntailed => Some(Ordering::Greater),
            JoinStatus::Incomparable => None,
        }
    }
}

struct Mismatch(String);

impl From<SmgError> for Mismatch {
    fn from(value: SmgError) -> Self {
        Mismatch(value.to_string())
    }
}

type JoinStep<T> = Result<T, Mismatch>;

fn mismatch<T>(reason: impl Into<String>) -> JoinStep<T> {
    Err(Mismatch(reason.into()))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    /// The status recording that this side knows more.
    fn entailed(self) -> JoinStatus {
        match self {
            Side::Left => JoinStatus::LeftEntailed,
            Side::Right => JoinStatus::RightEntailed,
        }
    }

    fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

enum Task {
    Pair {
        left: ObjectId,
        right: ObjectId,
        dest: ObjectId,
    },
    Copy {
        side: Side,
        source: ObjectId,
        dest: ObjectId,
    },
}

struct Joiner<'a> {
    inputs: [&'a SmgState; 2],
    dest: SmgState,
    objects: [BTreeMap<ObjectId, ObjectId>; 2],
    values: [BTreeMap<ValueId, ValueId>; 2],
    status: JoinStatus,
    worklist: VecDeque<Task>,
    /// Fields only one side has, copied once every pair is joined.
    one_sided: Vec<(Side, HasValueEdge, ObjectId)>,
}

impl<'a> Joiner<'a> {
    fn new(left: &'a SmgState, right: &'a SmgState) -> Self {
        Self {
            inputs: [left, right],
            dest: SmgState::with_options(left.shared_options()),
            objects: Default::default(),
            values: Default::default(),
            status: JoinStatus::Equal,
            worklist: VecDeque::new(),
            one_sided: vec![],
        }
    }

    fn input(&self, side: Side) -> &'a SmgState {
        self.inputs[side.index()]
    }

    fn run(mut self) -> JoinStep<(SmgState, JoinStatus)> {
        let [left, right] = self.inputs;
        self.join_globals()?;
        self.join_stack()?;
        self.drain()?;
        for (side, edge, dest) in std::mem::take(&mut self.one_sided) {
            let value = self.copy_value(side, edge.value)?;
            self.dest
                .graph_mut()
                .write_field(dest, edge.offset, edge.width, value)?;
        }
        self.drain()?;
        if !left.errors().same_flags(right.errors()) {
            self.status += JoinStatus::Incomparable;
        }
        self.dest.errors_mut().absorb_flags(left.errors());
        self.dest.errors_mut().absorb_flags(right.errors());
        Ok((self.dest, self.status))
    }

    fn drain(&mut self) -> JoinStep<()> {
        while let Some(task) = self.worklist.pop_front() {
            match task {
                Task::Pair { left, right, dest } => self.join_fields(left, right, dest)?,
                Task::Copy { side, source, dest } => self.copy_fields(side, source, dest)?,
            }
        }
        Ok(())
    }

    fn join_globals(&mut self) -> JoinStep<()> {
        let [left, right] = self.inputs;
        let (lg, rg) = (left.graph().globals(), right.graph().globals());
        if !lg.keys().eq(rg.keys()) {
            return mismatch("global variables differ");
        }
        for ((name, l), r) in lg.iter().zip(rg.values()) {
            let dest = self.join_objects(*l, *r)?;
            self.dest.graph_mut().bind_global(*name, dest);
        }
        Ok(())
    }

    /// Frames are matched innermost first and rebuilt outermost first.
    fn join_stack(&mut self) -> JoinStep<()> {
        let [left, right] = self.inputs;
        let (ls, rs) = (left.graph().stack(), right.graph().stack());
        if ls.len() != rs.len() {
            return mismatch("stack depths differ");
        }
        let mut frames = vec![];
        for (lf, rf) in ls.iter().zip(rs).rev() {
            if lf.function() != rf.function() || !lf.variables().keys().eq(rf.variables().keys()) {
                return mismatch(format!("frames of {} and {} differ", lf.function(), rf.function()));
            }
            let mut variables = vec![];
            for ((name, l), r) in lf.variables().iter().zip(rf.variables().values()) {
                variables.push((*name, self.join_objects(*l, *r)?));
            }
            let ret = match (lf.return_object(), rf.return_object()) {
                (Some(l), Some(r)) => Some(self.join_objects(l, r)?),
                (None, None) => None,
                _ => return mismatch("return objects differ"),
            };
            frames.push((lf.function(), variables, ret));
        }
        for (function, variables, ret) in frames.into_iter().rev() {
            let graph = self.dest.graph_mut();
            graph.push_frame(function);
            for (name, object) in variables {
                graph.bind_local(name, object)?;
            }
            if let Some(ret) = ret {
                graph.bind_return(ret)?;
            }
        }
        Ok(())
    }

    fn join_objects(&mut self, left: ObjectId, right: ObjectId) -> JoinStep<ObjectId> {
        if left.is_null() || right.is_null() {
            return if left == right {
                Ok(ObjectId::NULL)
            } else {
                mismatch("null against object")
            };
        }
        match (self.objects[0].get(&left), self.objects[1].get(&right)) {
            (Some(a), Some(b)) if a == b => return Ok(*a),
            (None, None) => {}
            _ => return mismatch(format!("{} and {} are mapped inconsistently", left, right)),
        }
        let [ls, rs] = self.inputs;
        let lo = ls.graph().get_object(left)?;
        let ro = rs.graph().get_object(right)?;
        let heap = ls.graph().is_heap_object(left);
        let external = ls.is_external(left);
        if lo.size() != ro.size()
            || lo.level() != ro.level()
            || lo.is_valid() != ro.is_valid()
            || heap != rs.graph().is_heap_object(right)
            || external != rs.is_external(right)
        {
            return mismatch(format!("{} and {} are incompatible", left, right));
        }
        let kind = self.join_kinds(lo.kind(), ro.kind())?;
        let mut object = SmgObject::region(lo.size(), lo.label())
            .with_kind(kind)
            .with_level(lo.level());
        if !lo.is_valid() {
            object.invalidate();
        }
        let dest = self.add_object(object, heap, external);
        self.objects[0].insert(left, dest);
        self.objects[1].insert(right, dest);
        self.worklist.push_back(Task::Pair { left, right, dest });
        Ok(dest)
    }

    fn add_object(&mut self, object: SmgObject, heap: bool, external: bool) -> ObjectId {
        let id = if heap {
            self.dest.graph_mut().add_heap_object(object)
        } else {
            self.dest.graph_mut().add_object(object)
        };
        if external {
            self.dest.mark_external(id);
        }
        id
    }

    fn join_kinds(&mut self, left: &ObjectKind, right: &ObjectKind) -> JoinStep<ObjectKind> {
        match (left, right) {
            (a, b) if a == b => Ok(*a),
            (ObjectKind::Optional, _) => {
                self.status += JoinStatus::RightEntailed;
                Ok(ObjectKind::Optional)
            }
            (_, ObjectKind::Optional) => {
                self.status += JoinStatus::LeftEntailed;
                Ok(ObjectKind::Optional)
            }
            (a, b) if a.is_list_segment() && a.same_shape(b) => {
                let (lmin, rmin) = (a.concrete_length(), b.concrete_length());
                self.status += match lmin.cmp(&rmin) {
                    Ordering::Greater => JoinStatus::LeftEntailed,
                    Ordering::Less => JoinStatus::RightEntailed,
                    Ordering::Equal => JoinStatus::Equal,
                };
                Ok(a.with_min_length(lmin.max(rmin)))
            }
            (a, b) => mismatch(format!("kinds {} and {} differ", a, b)),
        }
    }

    fn join_fields(&mut self, left: ObjectId, right: ObjectId, dest: ObjectId) -> JoinStep<()> {
        let lf: BTreeMap<u64, HasValueEdge> = self.fields(Side::Left, left);
        let rf: BTreeMap<u64, HasValueEdge> = self.fields(Side::Right, right);
        let offsets: BTreeSet<u64> = lf.keys().chain(rf.keys()).copied().collect();
        for offset in offsets {
            match (lf.get(&offset), rf.get(&offset)) {
                (Some(a), Some(b)) if a.width == b.width => {
                    let value = self.join_values(a.value, b.value)?;
                    self.dest
                        .graph_mut()
                        .write_field(dest, a.offset, a.width, value)?;
                }
                (Some(_), Some(_)) => return mismatch(format!("fields at {} of {} overlap", offset, dest)),
                (Some(a), None) => self.one_sided_field(Side::Left, *a, &rf, dest)?,
                (None, Some(b)) => self.one_sided_field(Side::Right, *b, &lf, dest)?,
                (None, None) => {}
            }
        }
        Ok(())
    }

    /// A field only `side` has is copied as is; the other side knows nothing about it.
    ///
    /// The copy waits until all pairs are joined, so an object reached through it
    /// on one side is still free to be paired with its counterpart.
    fn one_sided_field(
        &mut self,
        side: Side,
        edge: HasValueEdge,
        others: &BTreeMap<u64, HasValueEdge>,
        dest: ObjectId,
    ) -> JoinStep<()> {
        if others.values().any(|o| o.overlaps(edge.offset, edge.width)) {
            return mismatch(format!("field at {} overlaps differently", edge.offset));
        }
        self.status += side.entailed();
        self.one_sided.push((side, edge, dest));
        Ok(())
    }

    fn fields(&self, side: Side, object: ObjectId) -> BTreeMap<u64, HasValueEdge> {
        self.input(side)
            .graph()
            .fields_of(object)
            .map(|e| (e.offset, e))
            .collect()
    }

    fn join_values(&mut self, left: ValueId, right: ValueId) -> JoinStep<ValueId> {
        match (left.is_zero(), right.is_zero()) {
            (true, true) => return Ok(ValueId::ZERO),
            (true, false) => return self.join_with_zero(Side::Left, right),
            (false, true) => return self.join_with_zero(Side::Right, left),
            (false, false) => {}
        }
        match (self.values[0].get(&left), self.values[1].get(&right)) {
            (Some(a), Some(b)) if a == b => return Ok(*a),
            (None, None) => {}
            _ => return mismatch(format!("{} and {} are mapped inconsistently", left, right)),
        }
        let [ls, rs] = self.inputs;
        let dest = match (
            ls.graph().points_to(left).copied(),
            rs.graph().points_to(right).copied(),
        ) {
            (Some(a), Some(b)) => {
                if a.offset != b.offset || a.specifier != b.specifier {
                    return mismatch(format!("pointers {} and {} differ", a, b));
                }
                let target = self.join_objects(a.target, b.target)?;
                let dest = self.new_pointer(target, a.offset, a.specifier)?;
                self.join_bindings(left, right, dest)?;
                dest
            }
            (None, None) => {
                let dest = self.dest.new_value();
                self.join_bindings(left, right, dest)?;
                dest
            }
            _ => return mismatch(format!("pointer {} against scalar {}", left, right)),
        };
        self.values[0].insert(left, dest);
        self.values[1].insert(right, dest);
        Ok(dest)
    }

    /// Keep a numeric binding both sides agree on.
    fn join_bindings(&mut self, left: ValueId, right: ValueId, dest: ValueId) -> JoinStep<()> {
        if dest.is_zero() {
            return Ok(());
        }
        let [ls, rs] = self.inputs;
        match (ls.explicit_value(left), rs.explicit_value(right)) {
            (Some(a), Some(b)) if a == b => self.dest.bind_explicit(dest, a)?,
            (Some(_), Some(_)) => self.status += JoinStatus::Incomparable,
            (Some(_), None) => self.status += JoinStatus::LeftEntailed,
            (None, Some(_)) => self.status += JoinStatus::RightEntailed,
            (None, None) => {}
        }
        Ok(())
    }

    /// Zero on `zero_side` against `value` of the other side.
    fn join_with_zero(&mut self, zero_side: Side, value: ValueId) -> JoinStep<ValueId> {
        let other = self.input(zero_side.other());
        if other.graph().is_pointer(value) {
            return mismatch(format!("null against pointer {}", value));
        }
        match other.explicit_value(value) {
            Some(0) => Ok(ValueId::ZERO),
            Some(_) => {
                self.status += JoinStatus::Incomparable;
                Ok(self.dest.new_value())
            }
            None => {
                self.status += zero_side.entailed();
                Ok(self.dest.new_value())
            }
        }
    }

    fn new_pointer(&mut self, target: ObjectId, offset: i64, specifier: TargetSpecifier) -> JoinStep<ValueId> {
        if target.is_null() && offset == 0 {
            return Ok(ValueId::ZERO);
        }
        let value = self.dest.new_value();
        self.dest.graph_mut().add_points_to(PointsToEdge {
            value,
            target,
            offset,
            specifier,
        })?;
        Ok(value)
    }

    fn copy_fields(&mut self, side: Side, source: ObjectId, dest: ObjectId) -> JoinStep<()> {
        for edge in self.fields(side, source).into_values() {
            let value = self.copy_value(side, edge.value)?;
            self.dest
                .graph_mut()
                .write_field(dest, edge.offset, edge.width, value)?;
        }
        Ok(())
    }

    /// Copy a value of one input, along with everything it points to.
    fn copy_value(&mut self, side: Side, value: ValueId) -> JoinStep<ValueId> {
        if value.is_zero() {
            return Ok(ValueId::ZERO);
        }
        if let Some(dest) = self.values[side.index()].get(&value) {
            return Ok(*dest);
        }
        let input = self.input(side);
        let dest = match input.graph().points_to(value).copied() {
            Some(edge) => {
                let target = self.copy_object(side, edge.target)?;
                self.new_pointer(target, edge.offset, edge.specifier)?
            }
            None => self.dest.new_value(),
        };
        if let Some(n) = input.explicit_value(value).filter(|_| !dest.is_zero()) {
            self.dest.bind_explicit(dest, n)?;
        }
        self.values[side.index()].insert(value, dest);
        Ok(dest)
    }

    fn copy_object(&mut self, side: Side, source: ObjectId) -> JoinStep<ObjectId> {
        if source.is_null() {
            return Ok(ObjectId::NULL);
        }
        if let Some(dest) = self.objects[side.index()].get(&source) {
            return Ok(*dest);
        }
        let input = self.input(side);
        let object = input.graph().get_object(source)?.clone();
        let heap = input.graph().is_heap_object(source);
        let dest = self.add_object(object, heap, input.is_external(source));
        self.objects[side.index()].insert(source, dest);
        self.worklist.push_back(Task::Copy { side, source, dest });
        Ok(dest)
    }
}
