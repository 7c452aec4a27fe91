use super::*;
use internment::Intern;

fn name(s: &str) -> VarName {
    Intern::new(s.to_string())
}

fn pointer_to(graph: &mut SymbolicMemoryGraph, target: ObjectId) -> ValueId {
    let value = graph.new_value();
    graph
        .add_points_to(PointsToEdge {
            value,
            target,
            offset: 0,
            specifier: TargetSpecifier::Region,
        })
        .unwrap();
    value
}

#[test]
fn new_graph_has_null_and_zero() {
    let graph = SymbolicMemoryGraph::new();
    assert_eq!(graph.object_count(), 0);
    let zero = graph.points_to(ValueId::ZERO).unwrap();
    assert_eq!(zero.target, ObjectId::NULL);
    assert!(!graph.object(ObjectId::NULL).unwrap().is_valid());
    graph.check_consistency().unwrap();
}

#[test]
fn write_rejects_out_of_bounds() {
    let mut graph = SymbolicMemoryGraph::new();
    let o = graph.add_heap_object(SmgObject::region(16, "node"));
    let v = graph.new_value();
    assert!(graph.write_field(o, 8, 8, v).is_ok());
    assert_eq!(
        graph.write_field(o, 12, 8, v),
        Err(SmgError::OffsetOutOfBounds {
            object: o,
            offset: 12,
            width: 8,
            size: 16
        })
    );
    assert!(graph.write_field(o, u64::MAX, 2, v).is_err());
}

#[test]
fn write_rejects_zero_width() {
    let mut graph = SymbolicMemoryGraph::new();
    let o = graph.add_heap_object(SmgObject::region(16, "node"));
    let v = graph.new_value();
    let w = graph.new_value();
    graph.write_field(o, 8, 8, v).unwrap();
    assert_eq!(
        graph.write_field(o, 8, 0, w),
        Err(SmgError::EmptyField { object: o, offset: 8 })
    );
    assert_eq!(graph.field(o, 8, 8), Some(v));
    assert_eq!(graph.fields_of(o).count(), 1);
}

#[test]
fn overlapping_write_removes_older_edge() {
    let mut graph = SymbolicMemoryGraph::new();
    let o = graph.add_heap_object(SmgObject::region(16, "node"));
    let v = graph.new_value();
    let w = graph.new_value();
    graph.write_field(o, 0, 8, v).unwrap();
    let removed = graph.write_field(o, 4, 4, w).unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].value, v);
    assert_eq!(graph.field(o, 0, 8), None);
    assert_eq!(graph.field(o, 4, 4), Some(w));
    assert_eq!(graph.fields_of(o).count(), 1);
    graph.check_consistency().unwrap();
}

#[test]
fn adjacent_writes_keep_both_edges() {
    let mut graph = SymbolicMemoryGraph::new();
    let o = graph.add_heap_object(SmgObject::region(16, "node"));
    let v = graph.new_value();
    let w = graph.new_value();
    graph.write_field(o, 0, 8, v).unwrap();
    assert!(graph.write_field(o, 8, 8, w).unwrap().is_empty());
    assert_eq!(graph.fields_of(o).count(), 2);
}

#[test]
fn single_points_to_per_value() {
    let mut graph = SymbolicMemoryGraph::new();
    let a = graph.add_heap_object(SmgObject::region(8, "a"));
    let b = graph.add_heap_object(SmgObject::region(8, "b"));
    let p = pointer_to(&mut graph, a);
    let same = PointsToEdge {
        value: p,
        target: a,
        offset: 0,
        specifier: TargetSpecifier::Region,
    };
    assert!(graph.add_points_to(same).is_ok());
    assert_eq!(
        graph.add_points_to(PointsToEdge { target: b, ..same }),
        Err(SmgError::DuplicatePointsTo(p))
    );
}

#[test]
fn clones_are_isolated() {
    let mut graph = SymbolicMemoryGraph::new();
    let o = graph.add_heap_object(SmgObject::region(8, "a"));
    let copy = graph.clone();
    let v = graph.new_value();
    graph.write_field(o, 0, 8, v).unwrap();
    assert_eq!(copy.fields_of(o).count(), 0);
    assert!(!copy.contains_value(v));
    assert_eq!(graph.field(o, 0, 8), Some(v));
}

#[test]
fn removed_ids_are_not_reused() {
    let mut graph = SymbolicMemoryGraph::new();
    let a = graph.add_heap_object(SmgObject::region(8, "a"));
    graph.remove_object(a);
    let b = graph.add_heap_object(SmgObject::region(8, "b"));
    assert_ne!(a, b);
    assert_eq!(graph.get_object(a), Err(SmgError::DanglingObject(a)));
}

#[test]
fn zero_coverage_spans_multiple_edges() {
    let mut graph = SymbolicMemoryGraph::new();
    let o = graph.add_heap_object(SmgObject::region(16, "buf"));
    graph.write_field(o, 0, 4, ValueId::ZERO).unwrap();
    graph.write_field(o, 4, 12, ValueId::ZERO).unwrap();
    assert!(graph.is_zero_covered(o, 0, 16));
    assert!(graph.is_zero_covered(o, 2, 8));
    let v = graph.new_value();
    graph.write_field(o, 8, 4, v).unwrap();
    assert!(!graph.is_zero_covered(o, 0, 16));
    assert!(graph.is_zero_covered(o, 0, 4));
}

#[test]
fn locals_need_a_frame() {
    let mut graph = SymbolicMemoryGraph::new();
    assert_eq!(
        graph.add_local(name("x"), SmgObject::region(4, "x")),
        Err(SmgError::MissingStackFrame)
    );
    graph.push_frame(name("main"));
    let x = graph.add_local(name("x"), SmgObject::region(4, "x")).unwrap();
    assert_eq!(graph.lookup_variable(&name("x")), Some(x));
}

#[test]
fn reachability_follows_pointer_fields() {
    let mut graph = SymbolicMemoryGraph::new();
    let g = graph.add_global(name("list"), SmgObject::region(8, "list"));
    let a = graph.add_heap_object(SmgObject::region(16, "a"));
    let b = graph.add_heap_object(SmgObject::region(16, "b"));
    let orphan = graph.add_heap_object(SmgObject::region(16, "orphan"));
    let pa = pointer_to(&mut graph, a);
    let pb = pointer_to(&mut graph, b);
    graph.write_field(g, 0, 8, pa).unwrap();
    graph.write_field(a, 8, 8, pb).unwrap();
    graph.write_field(b, 8, 8, ValueId::ZERO).unwrap();
    let reachable = graph.reachable_objects();
    assert!(reachable.contains(&a));
    assert!(reachable.contains(&b));
    assert!(!reachable.contains(&orphan));
    assert!(!reachable.contains(&ObjectId::NULL));
}

#[test]
fn shortest_paths_from_globals() {
    let mut graph = SymbolicMemoryGraph::new();
    let g = graph.add_global(name("list"), SmgObject::region(8, "list"));
    let a = graph.add_heap_object(SmgObject::region(16, "a"));
    let b = graph.add_heap_object(SmgObject::region(16, "b"));
    let pa = pointer_to(&mut graph, a);
    let pb = pointer_to(&mut graph, b);
    graph.write_field(g, 0, 8, pa).unwrap();
    graph.write_field(a, 8, 8, pb).unwrap();
    let v = graph.new_value();
    graph.write_field(b, 0, 4, v).unwrap();

    let paths = graph.field_paths();
    assert_eq!(paths[&(b, 0)].to_string(), "list+0->+8->+0");
    assert_eq!(
        paths[&(b, 0)],
        MemoryPath::global("list").field(0).field(8).field(0)
    );
    assert_eq!(graph.object_paths()[&a], MemoryPath::global("list").field(0));
}

#[test]
fn consistency_detects_dangling_target() {
    let mut graph = SymbolicMemoryGraph::new();
    let a = graph.add_heap_object(SmgObject::region(8, "a"));
    pointer_to(&mut graph, a);
    graph.remove_object(a);
    assert_eq!(graph.check_consistency(), Err(SmgError::DanglingObject(a)));
}

#[test]
fn dot_export_contains_objects() {
    let mut graph = SymbolicMemoryGraph::new();
    let g = graph.add_global(name("head"), SmgObject::region(8, "head"));
    let a = graph.add_heap_object(SmgObject::region(16, "node"));
    let pa = pointer_to(&mut graph, a);
    graph.write_field(g, 0, 8, pa).unwrap();
    let petgraph = graph.to_petgraph(&Default::default());
    // two objects, one pointer value, one variable
    assert_eq!(petgraph.node_count(), 4);
    assert_eq!(petgraph.edge_count(), 3);
    let dot = graph.to_dot(&Default::default());
    assert!(dot.contains("digraph"));
    assert!(dot.contains("node"));
}
