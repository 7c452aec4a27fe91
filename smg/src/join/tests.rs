use super::*;
use crate::abstraction::AbstractionManager;
use crate::state::errors::MemoryErrorKind;

fn list_state(len: usize) -> SmgState {
    let mut state = SmgState::default();
    let mut next = ValueId::ZERO;
    for _ in 0..len {
        let node = state
            .graph_mut()
            .add_heap_object(SmgObject::region(16, "node"));
        state.write_value(node, 0, 8, next).unwrap();
        state.write_value(node, 8, 8, ValueId::ZERO).unwrap();
        next = state.address_of(node, 0).unwrap();
    }
    let head = state.declare_global("head", 8);
    state.write_value(head, 0, 8, next).unwrap();
    state
}

fn abstracted(len: usize) -> SmgState {
    let mut state = list_state(len);
    AbstractionManager::default().execute(&mut state).unwrap();
    state
}

fn global_with(value: impl FnOnce(&mut SmgState) -> ValueId) -> SmgState {
    let mut state = SmgState::default();
    let g = state.declare_global("g", 8);
    let v = value(&mut state);
    state.write_value(g, 0, 8, v).unwrap();
    state
}

#[test]
fn join_with_itself_is_equal() {
    for state in [list_state(3), abstracted(4)] {
        let result = join(&state, &state);
        assert_eq!(result.status(), Some(JoinStatus::Equal));
        let joined = result.into_state().unwrap();
        assert_eq!(joined.graph().object_count(), state.graph().object_count());
        joined.check_consistency().unwrap();
        assert!(is_less_or_equal(&state, &state));
        assert_eq!(state, state.clone());
    }
}

#[test]
fn differing_explicit_values_are_dropped() {
    let left = global_with(|s| s.value_for(1));
    let right = global_with(|s| s.value_for(2));
    let JoinResult::Defined { state, status } = join(&left, &right) else {
        panic!("join of differing scalars must be defined");
    };
    assert_eq!(status, JoinStatus::Incomparable);
    let g = state.lookup_variable("g").unwrap();
    let value = state.graph().field(g, 0, 8).unwrap();
    assert_eq!(state.explicit_value(value), None);
    assert!(!is_less_or_equal(&left, &right));
    assert!(left.partial_cmp(&right).is_none());
}

#[test]
fn equal_explicit_values_are_kept() {
    let left = global_with(|s| s.value_for(7));
    let right = global_with(|s| s.value_for(7));
    let JoinResult::Defined { state, status } = join(&left, &right) else {
        panic!("join must be defined");
    };
    assert_eq!(status, JoinStatus::Equal);
    let g = state.lookup_variable("g").unwrap();
    let value = state.graph().field(g, 0, 8).unwrap();
    assert_eq!(state.explicit_value(value), Some(7));
}

#[test]
fn known_value_entails_unknown() {
    let left = global_with(|s| s.value_for(7));
    let right = global_with(|s| s.new_value());
    assert_eq!(join(&left, &right).status(), Some(JoinStatus::LeftEntailed));
    assert!(is_less_or_equal(&left, &right));
    assert!(!is_less_or_equal(&right, &left));
    assert!(left < right);

    let zero = global_with(|_| ValueId::ZERO);
    assert_eq!(join(&zero, &right).status(), Some(JoinStatus::LeftEntailed));
    assert_eq!(join(&zero, &left).status(), Some(JoinStatus::Incomparable));
}

#[test]
fn null_against_pointer_is_not_defined() {
    let null = global_with(|_| ValueId::ZERO);
    let pointer = global_with(|s| {
        let (mut state, p) = s.malloc(8).unwrap().remove(0);
        std::mem::swap(s, &mut state);
        p
    });
    assert!(!join(&null, &pointer).is_defined());
    assert!(!join(&pointer, &null).is_defined());
    assert!(null.partial_cmp(&pointer).is_none());
}

#[test]
fn different_scopes_are_not_defined() {
    let mut left = SmgState::default();
    left.declare_global("a", 8);
    let mut right = SmgState::default();
    right.declare_global("b", 8);
    assert!(!join(&left, &right).is_defined());

    let mut deeper = left.clone();
    deeper.enter_function("main");
    assert!(!join(&left, &deeper).is_defined());

    let mut other = left.clone();
    other.enter_function("other");
    assert!(!join(&deeper, &other).is_defined());
}

#[test]
fn object_sizes_must_match() {
    let small = global_with(|s| {
        let (mut state, p) = s.malloc(8).unwrap().remove(0);
        std::mem::swap(s, &mut state);
        p
    });
    let large = global_with(|s| {
        let (mut state, p) = s.malloc(16).unwrap().remove(0);
        std::mem::swap(s, &mut state);
        p
    });
    assert!(!join(&small, &large).is_defined());
}

#[test]
fn longer_minimum_length_is_more_specific() {
    let two = abstracted(2);
    let three = abstracted(3);
    let JoinResult::Defined { state, status } = join(&three, &two) else {
        panic!("segments of equal shape must join");
    };
    assert_eq!(status, JoinStatus::LeftEntailed);
    let head = state.lookup_variable("head").unwrap();
    let value = state.graph().field(head, 0, 8).unwrap();
    let segment = state.graph().points_to(value).unwrap().target;
    assert_eq!(state.graph().object(segment).unwrap().min_length(), Some(3));

    assert!(is_less_or_equal(&three, &two));
    assert!(!is_less_or_equal(&two, &three));
    assert_eq!(join(&two, &three).status(), Some(JoinStatus::RightEntailed));
}

#[test]
fn concrete_list_does_not_join_segment() {
    assert!(!join(&list_state(3), &abstracted(3)).is_defined());
}

#[test]
fn one_sided_fields_are_copied() {
    let mut left = SmgState::default();
    let g = left.declare_global("g", 16);
    let (mut left, p) = left.malloc(8).unwrap().remove(0);
    left.write_value(g, 8, 8, p).unwrap();
    let mut right = SmgState::default();
    right.declare_global("g", 16);

    let JoinResult::Defined { state, status } = join(&left, &right) else {
        panic!("one-sided fields must join");
    };
    assert_eq!(status, JoinStatus::LeftEntailed);
    let g = state.lookup_variable("g").unwrap();
    let copied = state.graph().field(g, 8, 8).unwrap();
    let target = state.graph().points_to(copied).unwrap().target;
    assert!(state.graph().is_heap_object(target));
    state.check_consistency().unwrap();
}

fn shared_target(one_sided: &str, with_field: bool) -> SmgState {
    let mut state = SmgState::default();
    let extra = state.declare_global(one_sided, 16);
    let shared = state.declare_global("b", 8);
    let (mut state, p) = state.malloc(8).unwrap().remove(0);
    state.write_value(shared, 0, 8, p).unwrap();
    if with_field {
        state.write_value(extra, 8, 8, p).unwrap();
    }
    state
}

#[test]
fn one_sided_fields_do_not_depend_on_variable_names() {
    for name in ["a", "z"] {
        let left = shared_target(name, true);
        let right = shared_target(name, false);
        let JoinResult::Defined { state, status } = join(&left, &right) else {
            panic!("join with one-sided field in {} must be defined", name);
        };
        assert_eq!(status, JoinStatus::LeftEntailed);
        let extra = state.lookup_variable(name).unwrap();
        let shared = state.lookup_variable("b").unwrap();
        assert_eq!(
            state.graph().field(extra, 8, 8),
            state.graph().field(shared, 0, 8)
        );
        state.check_consistency().unwrap();
        assert!(is_less_or_equal(&left, &right));
    }
}

fn bound_pointer(n: i64) -> SmgState {
    global_with(|s| {
        let (mut state, p) = s.malloc(8).unwrap().remove(0);
        std::mem::swap(s, &mut state);
        s.bind_explicit(p, n).unwrap();
        p
    })
}

#[test]
fn pointer_bindings_are_intersected() {
    let JoinResult::Defined { state, status } = join(&bound_pointer(1), &bound_pointer(2)) else {
        panic!("pointers with differing addresses must join");
    };
    assert_eq!(status, JoinStatus::Incomparable);
    let g = state.lookup_variable("g").unwrap();
    let value = state.graph().field(g, 0, 8).unwrap();
    assert!(state.graph().is_pointer(value));
    assert_eq!(state.explicit_value(value), None);
    state.check_consistency().unwrap();

    let JoinResult::Defined { state, status } = join(&bound_pointer(1), &bound_pointer(1)) else {
        panic!("pointers with equal addresses must join");
    };
    assert_eq!(status, JoinStatus::Equal);
    let g = state.lookup_variable("g").unwrap();
    let value = state.graph().field(g, 0, 8).unwrap();
    assert_eq!(state.explicit_value(value), Some(1));
}

#[test]
fn optional_object_covers_region() {
    let region = global_with(|s| {
        let (mut state, p) = s.malloc(8).unwrap().remove(0);
        std::mem::swap(s, &mut state);
        p
    });
    let optional = global_with(|s| {
        let object = s
            .graph_mut()
            .add_heap_object(SmgObject::region(8, "node").with_kind(ObjectKind::Optional));
        s.address_of(object, 0).unwrap()
    });
    let JoinResult::Defined { state, status } = join(&region, &optional) else {
        panic!("optional object must join a region");
    };
    assert_eq!(status, JoinStatus::LeftEntailed);
    let g = state.lookup_variable("g").unwrap();
    let value = state.graph().field(g, 0, 8).unwrap();
    let target = state.graph().points_to(value).unwrap().target;
    assert_eq!(state.graph().object(target).unwrap().kind(), &ObjectKind::Optional);
    assert!(is_less_or_equal(&region, &optional));
    assert_eq!(join(&optional, &region).status(), Some(JoinStatus::RightEntailed));
}

#[test]
fn differing_error_flags_are_incomparable() {
    let clean = SmgState::default();
    let mut broken = SmgState::default();
    broken.record_error(MemoryErrorKind::InvalidRead, "test", Vec::<ObjectId>::new());
    let JoinResult::Defined { state, status } = join(&clean, &broken) else {
        panic!("join must be defined");
    };
    assert_eq!(status, JoinStatus::Incomparable);
    assert!(state.errors().is_set(MemoryErrorKind::InvalidRead));
}
