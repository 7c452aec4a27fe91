//! Search for list-shaped chains of heap objects.

mod dll;
mod shape;
mod sll;

use crate::abstraction::block::AbstractionBlock;
use crate::abstraction::candidate::{AbstractionCandidate, ListShape};
use crate::heap::{HasValueEdge, ObjectId, SymbolicMemoryGraph, TargetSpecifier};
use crate::state::SmgState;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

pub use dll::DllFinder;
pub use shape::ShapeDifference;
pub use sll::SllFinder;

/// A strategy for discovering one kind of list in a state.
pub trait ShapeFinder {
    fn find(&self, context: &FinderContext<'_>) -> Vec<AbstractionCandidate>;
}

/// A state together with the indices finders share.
pub struct FinderContext<'a> {
    state: &'a SmgState,
    incoming: BTreeMap<ObjectId, Vec<HasValueEdge>>,
    scope: BTreeSet<ObjectId>,
}

impl<'a> FinderContext<'a> {
    pub fn new(state: &'a SmgState) -> Self {
        let graph = state.graph();
        let mut incoming: BTreeMap<ObjectId, Vec<HasValueEdge>> = BTreeMap::new();
        for edge in graph.has_value_edges() {
            if let Some(pt) = graph.points_to(edge.value) {
                if !pt.target.is_null() {
                    incoming.entry(pt.target).or_default().push(edge);
                }
            }
        }
        Self {
            state,
            incoming,
            scope: graph.scope_objects().collect(),
        }
    }

    pub fn state(&self) -> &'a SmgState {
        self.state
    }

    pub fn graph(&self) -> &'a SymbolicMemoryGraph {
        self.state.graph()
    }

    /// Has-value edges storing a pointer into `object`.
    pub fn incoming(&self, object: ObjectId) -> &[HasValueEdge] {
        self.incoming.get(&object).map_or(&[], |v| v.as_slice())
    }

    pub fn is_scope(&self, object: ObjectId) -> bool {
        self.scope.contains(&object)
    }

    /// Whether `object` may take part in a list at all.
    pub fn may_be_element(&self, object: ObjectId) -> bool {
        !object.is_null()
            && self.graph().is_heap_object(object)
            && !self.state.is_external(object)
            && self.graph().object(object).is_some_and(|o| o.is_valid())
    }

    /// The list element the pointer in `object[offset]` addresses.
    ///
    /// With `head` set, the pointer must point at that offset of its target.
    pub fn follow(&self, object: ObjectId, offset: u64, head: Option<u64>) -> Option<(ObjectId, u64)> {
        let edge = self.graph().field_at(object, offset)?;
        let pt = self.graph().points_to(edge.value)?;
        if pt.target.is_null() || pt.offset < 0 {
            return None;
        }
        let target_offset = pt.offset as u64;
        if head.is_some_and(|h| h != target_offset) {
            return None;
        }
        let segment = self
            .graph()
            .object(pt.target)
            .is_some_and(|o| o.kind().is_list_segment());
        let admissible = match pt.specifier {
            TargetSpecifier::Region => !segment,
            TargetSpecifier::First | TargetSpecifier::Last => segment,
            TargetSpecifier::All => false,
        };
        admissible.then_some((pt.target, target_offset))
    }

    /// Whether `object` may join a chain started at `first`.
    pub(crate) fn compatible_element(&self, first: ObjectId, object: ObjectId, shape: &ListShape) -> bool {
        let (Some(a), Some(b)) = (self.graph().object(first), self.graph().object(object)) else {
            return false;
        };
        self.may_be_element(object)
            && a.size() == b.size()
            && a.level() == b.level()
            && shape.admits(b.kind())
    }
}

/// Every candidate the default finders discover, minus the blocked ones.
pub fn find_candidates(state: &SmgState, blocks: &[AbstractionBlock]) -> Vec<AbstractionCandidate> {
    let context = FinderContext::new(state);
    let finders: [&dyn ShapeFinder; 2] = [&SllFinder, &DllFinder];
    let mut candidates: Vec<AbstractionCandidate> =
        finders.iter().flat_map(|f| f.find(&context)).collect();
    if !blocks.is_empty() {
        let paths = state.graph().object_paths();
        candidates.retain(|c| {
            let size = state.graph().object(c.first()).map_or(0, |o| o.size());
            let blocked = blocks.iter().any(|b| b.blocks(c, size, &paths));
            if blocked {
                trace!("Candidate {} is blocked", c);
            }
            !blocked
        });
    }
    candidates
}
