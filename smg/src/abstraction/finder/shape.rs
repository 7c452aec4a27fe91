//! Field-wise comparison of list elements.

use crate::abstraction::finder::FinderContext;
use crate::heap::{HasValueEdge, ObjectId, ValueId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// How much information folding two elements loses, ordered from none to most.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShapeDifference {
    /// Every field holds the same value or an isomorphic private sub-graph.
    Equal,
    /// Some unknown values differ.
    Entailed,
    /// Some known values contradict each other or the fields disagree in layout.
    Incomparable,
}

impl<'a> FinderContext<'a> {
    /// Whether `value` points to an object other than null.
    pub(crate) fn is_real_pointer(&self, value: ValueId) -> bool {
        self.graph()
            .points_to(value)
            .is_some_and(|pt| !pt.target.is_null())
    }

    fn scalar_difference(&self, a: ValueId, b: ValueId) -> ShapeDifference {
        if a == b {
            return ShapeDifference::Equal;
        }
        match (self.state().explicit_value(a), self.state().explicit_value(b)) {
            (Some(x), Some(y)) if x == y => ShapeDifference::Equal,
            (Some(_), Some(_)) => ShapeDifference::Incomparable,
            _ => ShapeDifference::Entailed,
        }
    }

    /// Compare the non-link fields of `first` and `other`.
    ///
    /// Returns `None` if folding them would merge objects that are not separate.
    pub(crate) fn compare_elements(
        &self,
        first: ObjectId,
        other: ObjectId,
        links: &[u64],
        chain: &[ObjectId],
    ) -> Option<ShapeDifference> {
        let left = self.non_link_fields(first, links);
        let right = self.non_link_fields(other, links);
        let offsets: BTreeSet<u64> = left.keys().chain(right.keys()).copied().collect();
        let mut worst = ShapeDifference::Equal;
        for offset in offsets {
            let difference = match (left.get(&offset), right.get(&offset)) {
                (Some(a), Some(b)) if a.width == b.width => self.compare_fields(a, b, chain)?,
                (Some(a), Some(b)) => {
                    self.require_private(a, chain)?;
                    self.require_private(b, chain)?;
                    ShapeDifference::Incomparable
                }
                (Some(e), None) | (None, Some(e)) => {
                    self.require_private(e, chain)?;
                    ShapeDifference::Incomparable
                }
                (None, None) => ShapeDifference::Equal,
            };
            worst = worst.max(difference);
        }
        Some(worst)
    }

    fn non_link_fields(&self, object: ObjectId, links: &[u64]) -> BTreeMap<u64, HasValueEdge> {
        self.graph()
            .fields_of(object)
            .filter(|e| !links.contains(&e.offset))
            .map(|e| (e.offset, e))
            .collect()
    }

    fn compare_fields(
        &self,
        a: &HasValueEdge,
        b: &HasValueEdge,
        chain: &[ObjectId],
    ) -> Option<ShapeDifference> {
        let pa = self.is_real_pointer(a.value);
        let pb = self.is_real_pointer(b.value);
        match (pa, pb) {
            (false, false) => Some(self.scalar_difference(a.value, b.value)),
            (true, true) => {
                let ta = self.graph().points_to(a.value)?;
                let tb = self.graph().points_to(b.value)?;
                if ta.target == tb.target {
                    // shared target
                    return None;
                }
                self.private_closure(a, chain)?;
                self.private_closure(b, chain)?;
                if ta.offset != tb.offset || ta.specifier != tb.specifier {
                    return Some(ShapeDifference::Incomparable);
                }
                let (base_a, base_b) = (self.nesting_base(a.object), self.nesting_base(b.object));
                match self.isomorphism(ta.target, base_a, tb.target, base_b) {
                    Some((_, difference)) => Some(difference),
                    None => Some(ShapeDifference::Incomparable),
                }
            }
            _ => {
                self.require_private(a, chain)?;
                self.require_private(b, chain)?;
                Some(ShapeDifference::Incomparable)
            }
        }
    }

    fn require_private(&self, field: &HasValueEdge, chain: &[ObjectId]) -> Option<()> {
        if self.is_real_pointer(field.value) {
            self.private_closure(field, chain)?;
        }
        Some(())
    }

    /// The level nested objects of `owner` have relative to it.
    pub(crate) fn nesting_base(&self, owner: ObjectId) -> i64 {
        self.graph().object(owner).map_or(0, |o| {
            i64::from(o.level()) + i64::from(o.kind().is_list_segment())
        })
    }

    /// Objects reachable through `field`, provided nothing outside of them except
    /// `field` itself points into them.
    pub(crate) fn private_closure(
        &self,
        field: &HasValueEdge,
        chain: &[ObjectId],
    ) -> Option<BTreeSet<ObjectId>> {
        let root = self.graph().points_to(field.value)?.target;
        let closure = self.graph().reachable_from([root]);
        for object in &closure {
            if chain.contains(object)
                || *object == field.object
                || self.is_scope(*object)
                || !self.graph().is_heap_object(*object)
                || self.state().is_external(*object)
            {
                return None;
            }
            let foreign = self.incoming(*object).iter().any(|e| {
                !closure.contains(&e.object) && !(e.object == field.object && e.offset == field.offset)
            });
            if foreign {
                return None;
            }
        }
        Some(closure)
    }

    /// A bijection between the sub-graphs at `a` and `b`, with the largest scalar
    /// difference between corresponding fields.
    ///
    /// Levels are compared relative to `base_a` and `base_b`.
    pub(crate) fn isomorphism(
        &self,
        a: ObjectId,
        base_a: i64,
        b: ObjectId,
        base_b: i64,
    ) -> Option<(BTreeMap<ObjectId, ObjectId>, ShapeDifference)> {
        let graph = self.graph();
        let mut mapping = BTreeMap::from([(a, b)]);
        let mut image = BTreeSet::from([b]);
        let mut queue = VecDeque::from([(a, b)]);
        let mut worst = ShapeDifference::Equal;
        while let Some((x, y)) = queue.pop_front() {
            let ox = graph.object(x)?;
            let oy = graph.object(y)?;
            if ox.size() != oy.size()
                || ox.kind() != oy.kind()
                || ox.is_valid() != oy.is_valid()
                || i64::from(ox.level()) - base_a != i64::from(oy.level()) - base_b
            {
                return None;
            }
            let fx = self.non_link_fields(x, &[]);
            let fy = self.non_link_fields(y, &[]);
            let offsets: BTreeSet<u64> = fx.keys().chain(fy.keys()).copied().collect();
            for offset in offsets {
                match (fx.get(&offset), fy.get(&offset)) {
                    (Some(ex), Some(ey)) if ex.width == ey.width => {
                        match (self.is_real_pointer(ex.value), self.is_real_pointer(ey.value)) {
                            (false, false) => {
                                worst = worst.max(self.scalar_difference(ex.value, ey.value))
                            }
                            (true, true) => {
                                let px = graph.points_to(ex.value)?;
                                let py = graph.points_to(ey.value)?;
                                if px.offset != py.offset || px.specifier != py.specifier {
                                    return None;
                                }
                                match mapping.get(&px.target) {
                                    Some(t) if *t == py.target => {}
                                    Some(_) => return None,
                                    None => {
                                        if !image.insert(py.target) {
                                            return None;
                                        }
                                        mapping.insert(px.target, py.target);
                                        queue.push_back((px.target, py.target));
                                    }
                                }
                            }
                            _ => return None,
                        }
                    }
                    (Some(ex), Some(ey)) => {
                        if self.is_real_pointer(ex.value) || self.is_real_pointer(ey.value) {
                            return None;
                        }
                        worst = ShapeDifference::Incomparable;
                    }
                    (Some(e), None) | (None, Some(e)) => {
                        if self.is_real_pointer(e.value) {
                            return None;
                        }
                        worst = ShapeDifference::Incomparable;
                    }
                    (None, None) => {}
                }
            }
        }
        Some((mapping, worst))
    }
}
