use super::*;
use crate::heap::{DllShape, ObjectKind, SllShape};

fn allocate(state: &SmgState, size: u64) -> (SmgState, ValueId) {
    let mut successors = state.malloc(size).unwrap();
    assert_eq!(successors.len(), 1);
    successors.remove(0)
}

fn segment(state: &mut SmgState, kind: ObjectKind, size: u64) -> ObjectId {
    state
        .graph_mut()
        .add_heap_object(SmgObject::region(size, "node").with_kind(kind))
}

#[test]
fn double_free_is_reported_without_leak() {
    let state = SmgState::default();
    let (mut state, p) = allocate(&state, 16);
    let x = state.declare_global("x", 8);
    state.write_value(x, 0, 8, p).unwrap();

    let freed = state.free(p).unwrap();
    assert_eq!(freed.len(), 1);
    assert!(!freed[0].has_memory_errors());

    let twice = freed[0].free(p).unwrap();
    assert_eq!(twice.len(), 1);
    let errors = twice[0].errors();
    assert!(errors.is_set(MemoryErrorKind::InvalidFree));
    assert!(!errors.is_set(MemoryErrorKind::MemoryLeak));
}

#[test]
fn free_of_null_is_a_no_op() {
    let state = SmgState::default();
    let successors = state.free(ValueId::ZERO).unwrap();
    assert_eq!(successors.len(), 1);
    assert!(!successors[0].has_memory_errors());
}

#[test]
fn free_of_stack_object_is_invalid() {
    let mut state = SmgState::default();
    state.enter_function("main");
    let local = state.declare_local("buf", 16).unwrap();
    let p = state.address_of(local, 0).unwrap();
    let successors = state.free(p).unwrap();
    assert!(successors[0].errors().is_set(MemoryErrorKind::InvalidFree));
    assert_eq!(successors[0].errors().current_chain(), &[local]);
}

#[test]
fn free_with_offset_is_invalid() {
    let state = SmgState::default();
    let (mut state, p) = allocate(&state, 16);
    let object = state.graph().points_to(p).unwrap().target;
    let inner = state.address_of(object, 8).unwrap();
    let successors = state.free(inner).unwrap();
    assert!(successors[0].errors().is_set(MemoryErrorKind::InvalidFree));
}

#[test]
fn read_after_free_is_invalid() {
    let state = SmgState::default();
    let (state, p) = allocate(&state, 16);
    let freed = state.free(p).unwrap().remove(0);
    let reads = freed.dereference(p, 0, 8).unwrap();
    assert_eq!(reads.len(), 1);
    assert!(reads[0].0.errors().is_set(MemoryErrorKind::InvalidRead));
}

#[test]
fn calloc_reads_zero_and_malloc_reads_fresh() {
    let state = SmgState::default();
    let (zeroed, p) = state.calloc(2, 8).unwrap().remove(0);
    let (zeroed, v) = zeroed.dereference(p, 8, 4).unwrap().remove(0);
    assert_eq!(v, ValueId::ZERO);
    assert!(!zeroed.has_memory_errors());

    let (uninit, q) = state.malloc(16).unwrap().remove(0);
    let (uninit, v) = uninit.dereference(q, 0, 8).unwrap().remove(0);
    assert!(!v.is_zero());
    let object = uninit.graph().points_to(q).unwrap().target;
    // the fresh value is stored in the object
    assert_eq!(uninit.graph().field(object, 0, 8), Some(v));
}

#[test]
fn out_of_bounds_write_is_recorded() {
    let mut state = SmgState::default();
    let g = state.declare_global("g", 8);
    let v = state.new_value();
    state.write_value(g, 4, 8, v).unwrap();
    assert!(state.errors().is_set(MemoryErrorKind::InvalidWrite));
    assert_eq!(state.graph().fields_of(g).count(), 0);
    state.write_value(g, -1, 1, v).unwrap();
    assert_eq!(state.errors().current_chain(), &[g]);
}

#[test]
fn null_dereference_is_invalid_read() {
    let state = SmgState::default();
    let (state, _) = state.dereference(ValueId::ZERO, 0, 8).unwrap().remove(0);
    assert!(state.errors().is_set(MemoryErrorKind::InvalidRead));
}

#[test]
fn overflowing_offset_is_invalid_access() {
    let state = SmgState::default();
    let (mut state, p) = allocate(&state, 16);
    let region = state.graph().points_to(p).unwrap().target;
    let q = state.address_of(region, 8).unwrap();

    let (read, _) = state.dereference(q, i64::MAX, 8).unwrap().remove(0);
    assert!(read.errors().is_set(MemoryErrorKind::InvalidRead));
    assert_eq!(read.errors().current_chain(), &[region]);

    let v = state.new_value();
    let written = state.write_through(q, i64::MAX, 8, v).unwrap().remove(0);
    assert!(written.errors().is_set(MemoryErrorKind::InvalidWrite));
    assert_eq!(written.graph().fields_of(region).count(), 0);
}

#[test]
fn leaving_function_detects_leak() {
    let mut state = SmgState::default();
    state.enter_function("f");
    let local = state.declare_local("p", 8).unwrap();
    let (mut state, p) = allocate(&state, 32);
    state.write_value(local, 0, 8, p).unwrap();
    assert!(!state.prune_unreachable());

    state.leave_function().unwrap();
    assert!(state.errors().is_set(MemoryErrorKind::MemoryLeak));
    assert_eq!(state.graph().object_count(), 0);
    state.check_consistency().unwrap();
    assert_eq!(state.leave_function(), Err(SmgError::MissingStackFrame));
}

#[test]
fn freed_unreachable_object_is_not_a_leak() {
    let state = SmgState::default();
    let (state, p) = allocate(&state, 8);
    let mut freed = state.free(p).unwrap().remove(0);
    assert!(freed.prune_unreachable());
    assert!(!freed.has_memory_errors());
}

#[test]
fn malloc_can_fail() {
    let state = SmgState::new(SmgOptions {
        malloc_can_fail: true,
        ..Default::default()
    });
    let successors = state.malloc(8).unwrap();
    assert_eq!(successors.len(), 2);
    assert_eq!(successors[1].1, ValueId::ZERO);
}

#[test]
fn builtins_are_classified_by_name() {
    let mut state = SmgState::default();
    let size = state.value_for(24);
    let successors = state.call_builtin("malloc", &[size]).unwrap().unwrap();
    let (state, p) = &successors[0];
    let object = state.graph().points_to(*p).unwrap().target;
    assert_eq!(state.graph().object(object).unwrap().size(), 24);
    assert!(state.call_builtin("printf", &[]).unwrap().is_none());
    let freed = state.call_builtin("free", &[*p]).unwrap().unwrap();
    assert!(!freed[0].0.graph().object(object).unwrap().is_valid());
}

#[test]
fn unknown_values_respect_strictness() {
    let mut lenient = SmgState::default();
    assert!(lenient.unknown_value("cast").is_ok());
    let mut strict = SmgState::new(SmgOptions {
        strict_unknowns: true,
        ..Default::default()
    });
    assert_eq!(
        strict.unknown_value("cast"),
        Err(SmgError::Unsupported("cast".to_string()))
    );
    assert!(!SmgError::Unsupported("cast".to_string()).is_fatal());
}

#[test]
fn explicit_values_are_shared() {
    let mut state = SmgState::default();
    let a = state.value_for(7);
    let b = state.value_for(7);
    assert_eq!(a, b);
    assert_eq!(state.explicit_value(a), Some(7));
    assert_eq!(state.value_for(0), ValueId::ZERO);
    let p = {
        let g = state.declare_global("g", 8);
        state.address_of(g, 0).unwrap()
    };
    state.bind_explicit(p, 1).unwrap();
    assert_eq!(state.explicit_value(p), Some(1));
    assert_ne!(state.value_for(1), p);
    assert!(state.bind_explicit(ValueId::ZERO, 1).is_err());
    state.bind_explicit(ValueId::ZERO, 0).unwrap();
    state.check_consistency().unwrap();
}

fn sll_state(min_length: usize) -> (SmgState, ObjectId, ObjectId, ValueId) {
    let mut state = SmgState::default();
    let head = state.declare_global("head", 8);
    let seg = segment(
        &mut state,
        ObjectKind::SinglyLinked(SllShape {
            head_offset: 0,
            next_offset: 0,
            min_length,
        }),
        16,
    );
    state.graph_mut().write_field(seg, 0, 8, ValueId::ZERO).unwrap();
    let data = state.value_for(5);
    state.graph_mut().write_field(seg, 8, 8, data).unwrap();
    let p = state.pointer_with(seg, 0, TargetSpecifier::First).unwrap();
    state.write_value(head, 0, 8, p).unwrap();
    (state, head, seg, p)
}

#[test]
fn materialize_first_element_of_sll() {
    let (state, _, seg, p) = sll_state(2);
    let successors = state.materialize(p).unwrap();
    assert_eq!(successors.len(), 1);
    let (split, pointer) = &successors[0];
    assert_eq!(*pointer, p);
    let edge = split.graph().points_to(p).unwrap();
    assert_eq!(edge.specifier, TargetSpecifier::Region);
    let region = edge.target;
    assert_ne!(region, seg);
    assert_eq!(split.graph().object(seg).unwrap().min_length(), Some(1));

    let next = split.graph().field(region, 0, 8).unwrap();
    let link = split.graph().points_to(next).unwrap();
    assert_eq!(link.target, seg);
    assert_eq!(link.specifier, TargetSpecifier::First);
    let data = split.graph().field(region, 8, 8).unwrap();
    assert_eq!(split.explicit_value(data), Some(5));
    split.check_consistency().unwrap();

    // reading through the pointer sees the concrete element
    let (_, value) = state.dereference(p, 8, 8).unwrap().remove(0);
    assert_eq!(state.explicit_value(value), Some(5));
}

#[test]
fn materialize_possibly_empty_sll() {
    let (state, head, seg, p) = sll_state(0);
    let successors = state.materialize(p).unwrap();
    assert_eq!(successors.len(), 2);
    let (empty, replacement) = &successors[1];
    assert_eq!(*replacement, ValueId::ZERO);
    assert!(!empty.graph().contains_object(seg));
    assert_eq!(empty.graph().field(head, 0, 8), Some(ValueId::ZERO));
    empty.check_consistency().unwrap();
    assert_eq!(successors[0].0.graph().object(seg).unwrap().min_length(), Some(0));
}

#[test]
fn free_of_possibly_empty_sll() {
    let (state, head, seg, p) = sll_state(0);
    let successors = state.free(p).unwrap();
    assert_eq!(successors.len(), 2);
    assert!(successors.iter().all(|s| !s.has_memory_errors()));

    let freed = &successors[0];
    let region = freed.graph().points_to(p).unwrap().target;
    assert!(!freed.graph().object(region).unwrap().is_valid());
    assert!(freed.graph().object(seg).unwrap().is_valid());

    let empty = &successors[1];
    assert!(!empty.graph().contains_object(seg));
    assert_eq!(empty.graph().field(head, 0, 8), Some(ValueId::ZERO));
}

#[test]
fn materialize_last_element_of_dll() {
    let mut state = SmgState::default();
    let tail = state.declare_global("tail", 8);
    let seg = segment(
        &mut state,
        ObjectKind::DoublyLinked(DllShape {
            head_offset: 0,
            next_offset: 0,
            prev_offset: 8,
            min_length: 1,
        }),
        24,
    );
    state.graph_mut().write_field(seg, 0, 8, ValueId::ZERO).unwrap();
    state.graph_mut().write_field(seg, 8, 8, ValueId::ZERO).unwrap();
    let p = state.pointer_with(seg, 0, TargetSpecifier::Last).unwrap();
    state.write_value(tail, 0, 8, p).unwrap();

    let (split, _) = state.materialize(p).unwrap().remove(0);
    let region = split.graph().points_to(p).unwrap().target;
    assert_eq!(split.graph().field(region, 0, 8), Some(ValueId::ZERO));
    let prev = split.graph().field(region, 8, 8).unwrap();
    let back = split.graph().points_to(prev).unwrap();
    assert_eq!((back.target, back.specifier), (seg, TargetSpecifier::Last));
    let seg_next = split.graph().field(seg, 0, 8).unwrap();
    assert_eq!(split.graph().points_to(seg_next).unwrap().target, region);
    assert_eq!(split.graph().object(seg).unwrap().min_length(), Some(0));
    split.check_consistency().unwrap();
}

#[test]
fn all_pointer_reads_unknown() {
    let (mut state, _, seg, _) = sll_state(3);
    let all = state.pointer_with(seg, 0, TargetSpecifier::All).unwrap();
    let successors = state.dereference(all, 8, 8).unwrap();
    assert_eq!(successors.len(), 1);
    let (after, value) = &successors[0];
    assert_eq!(after.explicit_value(*value), None);
    assert!(!after.has_memory_errors());
    let written = state.write_through(all, 8, 8, ValueId::ZERO).unwrap();
    assert_eq!(written[0].graph().field(seg, 8, 8), None);
}
