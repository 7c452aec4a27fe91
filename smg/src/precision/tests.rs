use super::*;
use crate::abstraction::ListShape;
use crate::heap::{SmgObject, ValueId};
use crate::options::SmgOptions;
use crate::state::SmgState;

fn push_node(state: &mut SmgState, next: ValueId) -> ValueId {
    let node = state
        .graph_mut()
        .add_heap_object(SmgObject::region(16, "node"));
    state.write_value(node, 0, 8, next).unwrap();
    let data = state.value_for(5);
    state.write_value(node, 8, 8, data).unwrap();
    state.address_of(node, 0).unwrap()
}

fn list_state(options: SmgOptions, len: usize) -> SmgState {
    let mut state = SmgState::new(options);
    let mut next = ValueId::ZERO;
    for _ in 0..len {
        next = push_node(&mut state, next);
    }
    let head = state.declare_global("head", 8);
    state.write_value(head, 0, 8, next).unwrap();
    state
}

#[test]
fn full_precision_keeps_state() {
    let state = list_state(SmgOptions::default(), 3);
    let result = PrecisionAdjustment.adjust(&state, &SmgPrecision::new()).unwrap();
    assert!(!result.changed);
    assert_eq!(result.state.graph().object_count(), state.graph().object_count());
}

#[test]
fn untracked_scalar_locals_are_forgotten() {
    let mut state = SmgState::default();
    state.enter_function("main");
    let i = state.declare_local("i", 4).unwrap();
    let seven = state.value_for(7);
    state.write_value(i, 0, 4, seven).unwrap();
    let p = state.declare_local("p", 8).unwrap();
    let (mut state, heap) = state.malloc(8).unwrap().remove(0);
    state.write_value(p, 0, 8, heap).unwrap();
    state.declare_local("kept", 4).unwrap();

    let precision = SmgPrecision::new().with_tracked_variables(["kept"]);
    let result = PrecisionAdjustment.adjust(&state, &precision).unwrap();
    assert!(result.changed);
    let adjusted = result.state;
    assert_eq!(adjusted.lookup_variable("i"), None);
    assert!(adjusted.lookup_variable("p").is_some());
    assert!(adjusted.lookup_variable("kept").is_some());
    assert!(!adjusted.has_memory_errors());
    adjusted.check_consistency().unwrap();
}

#[test]
fn locals_with_address_taken_are_kept() {
    let mut state = SmgState::default();
    state.enter_function("main");
    let x = state.declare_local("x", 4).unwrap();
    let q = state.declare_local("q", 8).unwrap();
    let address = state.address_of(x, 0).unwrap();
    state.write_value(q, 0, 8, address).unwrap();

    let precision = SmgPrecision::new().with_tracked_variables(["q"]);
    let result = PrecisionAdjustment.adjust(&state, &precision).unwrap();
    assert!(!result.changed);
    assert!(result.state.lookup_variable("x").is_some());
}

#[test]
fn untracked_scalar_fields_are_forgotten() {
    let state = list_state(SmgOptions::default(), 1);
    let tracked = MemoryPath::global("head");
    let precision = SmgPrecision::new().with_tracked_memory_paths([tracked.field(0)]);
    let result = PrecisionAdjustment.adjust(&state, &precision).unwrap();
    assert!(result.changed);
    let adjusted = result.state;
    let head = adjusted.lookup_variable("head").unwrap();
    let pointer = adjusted.graph().field(head, 0, 8).unwrap();
    let node = adjusted.graph().points_to(pointer).unwrap().target;
    assert_eq!(adjusted.graph().field(node, 8, 8), None);
    assert_eq!(adjusted.graph().field(node, 0, 8), Some(ValueId::ZERO));
}

#[test]
fn heap_abstraction_runs_at_abstraction_points() {
    let state = list_state(SmgOptions::default(), 3);
    let result = PrecisionAdjustment.adjust(&state, &SmgPrecision::new()).unwrap();
    assert!(!result.changed);

    let result = PrecisionAdjustment
        .adjust(&state, &SmgPrecision::abstraction_point())
        .unwrap();
    assert!(result.changed);
    let segments: Vec<_> = result
        .state
        .graph()
        .objects()
        .filter(|(_, o)| o.is_abstract())
        .collect();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].1.min_length(), Some(3));
}

#[test]
fn heap_abstraction_respects_blocks_and_options() {
    let state = list_state(SmgOptions::default(), 3);
    let shape = ListShape::Singly {
        head_offset: 0,
        next_offset: 0,
    };
    let blocked = SmgPrecision::abstraction_point().with_block(AbstractionBlock::new(shape, 16));
    assert!(!PrecisionAdjustment.adjust(&state, &blocked).unwrap().changed);

    let disabled = list_state(
        SmgOptions {
            heap_abstraction: false,
            ..Default::default()
        },
        3,
    );
    let result = PrecisionAdjustment
        .adjust(&disabled, &SmgPrecision::abstraction_point())
        .unwrap();
    assert!(!result.changed);
}

#[test]
fn tracked_sets() {
    let all: Tracked<u32> = Tracked::All;
    assert!(all.contains(&3));
    assert!(!Tracked::<u32>::none().contains(&3));
    let some: Tracked<u32> = [1, 2].into_iter().collect();
    assert!(some.contains(&2));
    assert!(!some.contains(&3));
}
