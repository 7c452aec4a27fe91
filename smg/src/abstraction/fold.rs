//! Replacing a chain of list elements by one segment.

use crate::abstraction::candidate::AbstractionCandidate;
use crate::abstraction::finder::FinderContext;
use crate::error::SmgError;
use crate::heap::{HasValueEdge, ObjectId, SmgObject, TargetSpecifier, ValueId};
use crate::state::SmgState;
use std::collections::BTreeSet;
use tracing::debug;

/// What happens to a non-link field of the first element.
enum FieldPlan {
    /// Every element holds the same value.
    Shared(HasValueEdge),
    /// Every element owns an isomorphic private sub-graph; the first one's is kept.
    Nested {
        edge: HasValueEdge,
        closure: BTreeSet<ObjectId>,
        /// Fields inside the kept sub-graph that differ between the elements.
        differing: Vec<(ObjectId, u64)>,
    },
}

/// Fold the chain of `candidate` into a single list segment.
///
/// The input state is left untouched.
pub fn fold(state: &SmgState, candidate: &AbstractionCandidate) -> Result<SmgState, SmgError> {
    let context = FinderContext::new(state);
    let graph = state.graph();
    let shape = candidate.shape();
    let links = shape.link_offsets();
    let objects = candidate.objects();
    let chain: BTreeSet<ObjectId> = objects.iter().copied().collect();
    let (first, last) = (candidate.first(), candidate.last());
    let template = graph.get_object(first)?.clone();

    // Decide the summary's fields before touching anything.
    let mut plans = vec![];
    let mut removed: BTreeSet<ObjectId> = BTreeSet::new();
    for edge in graph.fields_of(first).filter(|e| !links.contains(&e.offset)) {
        let others: Vec<Option<HasValueEdge>> = objects[1..]
            .iter()
            .map(|o| graph.field_at(*o, edge.offset).filter(|e| e.width == edge.width))
            .collect();
        if others
            .iter()
            .all(|o| o.is_some_and(|e| same_value(state, e.value, edge.value)))
        {
            plans.push(FieldPlan::Shared(edge));
            continue;
        }
        match nested_plan(&context, &edge, &others, objects) {
            Some(plan) => plans.push(plan),
            None => {
                if let Some(closure) = context.private_closure(&edge, objects) {
                    removed.extend(closure);
                }
            }
        }
    }
    // Sub-graphs of the other elements are represented by the first one's.
    for object in &objects[1..] {
        for edge in graph.fields_of(*object).filter(|e| !links.contains(&e.offset)) {
            if context.is_real_pointer(edge.value) {
                if let Some(closure) = context.private_closure(&edge, objects) {
                    removed.extend(closure);
                }
            }
        }
    }

    let mut result = state.clone();
    let summary_object = SmgObject::region(template.size(), template.label())
        .with_kind(shape.segment_kind(candidate.length()))
        .with_level(template.level());
    let summary = result.graph_mut().add_heap_object(summary_object);
    let shift = u32::from(!template.kind().is_list_segment());
    for plan in plans {
        match plan {
            FieldPlan::Shared(edge) => {
                result
                    .graph_mut()
                    .write_field(summary, edge.offset, edge.width, edge.value)?;
            }
            FieldPlan::Nested {
                edge,
                closure,
                differing,
            } => {
                for (object, offset) in differing {
                    result.graph_mut().remove_field(object, offset);
                }
                for object in closure {
                    let nested = result.graph_mut().object_mut(object)?;
                    let level = nested.level() + shift;
                    nested.set_level(level);
                }
                result
                    .graph_mut()
                    .write_field(summary, edge.offset, edge.width, edge.value)?;
            }
        }
    }

    // Outer links.
    if let Some(next) = graph.field_at(last, shape.next_offset()) {
        result
            .graph_mut()
            .write_field(summary, next.offset, next.width, next.value)?;
    }
    if let Some(prev) = shape.prev_offset().and_then(|p| graph.field_at(first, p)) {
        result
            .graph_mut()
            .write_field(summary, prev.offset, prev.width, prev.value)?;
    }

    // Redirect pointers into the chain that are still stored outside of it.
    let mut dead: Vec<ValueId> = vec![];
    for object in objects {
        for pointer in graph.pointers_to(*object) {
            let used_outside = result
                .graph()
                .value_uses(pointer.value)
                .iter()
                .any(|e| !chain.contains(&e.object) && !removed.contains(&e.object));
            if !used_outside {
                dead.push(pointer.value);
                continue;
            }
            let specifier = match (pointer.specifier, *object) {
                (TargetSpecifier::Region | TargetSpecifier::First, o) if o == first => {
                    TargetSpecifier::First
                }
                (TargetSpecifier::Region | TargetSpecifier::Last, o)
                    if o == last && shape.is_doubly_linked() =>
                {
                    TargetSpecifier::Last
                }
                _ => TargetSpecifier::All,
            };
            match result.graph().find_pointer(summary, pointer.offset, specifier) {
                Some(existing) => {
                    result.graph_mut().replace_value(pointer.value, existing);
                    dead.push(pointer.value);
                }
                None => {
                    result
                        .graph_mut()
                        .retarget(pointer.value, summary, pointer.offset, specifier)?;
                }
            }
        }
    }

    for object in objects {
        result.graph_mut().remove_object(*object);
    }
    let removed: Vec<ObjectId> = removed.into_iter().collect();
    result.remove_objects(&removed);
    for value in dead {
        result.remove_value(value);
    }
    debug!("Folded {} into {}", candidate, summary);
    Ok(result)
}

/// Keep the first element's sub-graph behind `edge` if every other element owns an
/// isomorphic private one at the same field.
fn nested_plan(
    context: &FinderContext<'_>,
    edge: &HasValueEdge,
    others: &[Option<HasValueEdge>],
    chain: &[ObjectId],
) -> Option<FieldPlan> {
    let graph = context.graph();
    let root = graph.points_to(edge.value)?;
    if !context.is_real_pointer(edge.value) {
        return None;
    }
    let closure = context.private_closure(edge, chain)?;
    let base = context.nesting_base(edge.object);
    let mut differing = BTreeSet::new();
    for other in others {
        let other = (*other)?;
        let target = graph.points_to(other.value)?;
        if target.offset != root.offset || target.specifier != root.specifier {
            return None;
        }
        context.private_closure(&other, chain)?;
        let (mapping, _) = context.isomorphism(
            root.target,
            base,
            target.target,
            context.nesting_base(other.object),
        )?;
        for (x, y) in &mapping {
            for field in graph.fields_of(*x) {
                if context.is_real_pointer(field.value) {
                    continue;
                }
                let same = graph
                    .field(*y, field.offset, field.width)
                    .is_some_and(|v| same_value(context.state(), v, field.value));
                if !same {
                    differing.insert((*x, field.offset));
                }
            }
        }
    }
    Some(FieldPlan::Nested {
        edge: *edge,
        closure,
        differing: differing.into_iter().collect(),
    })
}

fn same_value(state: &SmgState, a: ValueId, b: ValueId) -> bool {
    a == b
        || state
            .explicit_value(a)
            .is_some_and(|n| state.explicit_value(b) == Some(n))
}
