use crate::abstraction::ShapeDifference;
use crate::abstraction::candidate::{AbstractionCandidate, ListShape};
use crate::abstraction::finder::{FinderContext, ShapeFinder};
use crate::heap::{ObjectId, ObjectKind};
use tracing::trace;

/// Finds chains whose elements point to their successor and back to their predecessor.
pub struct DllFinder;

impl ShapeFinder for DllFinder {
    fn find(&self, context: &FinderContext<'_>) -> Vec<AbstractionCandidate> {
        let mut found = vec![];
        for (start, object) in context.graph().objects() {
            if !context.may_be_element(start) {
                continue;
            }
            let shapes: Vec<ListShape> = match object.kind() {
                ObjectKind::Region => context
                    .graph()
                    .fields_of(start)
                    .flat_map(|e| self.shapes_through(context, start, e.offset))
                    .collect(),
                ObjectKind::DoublyLinked(d) => vec![ListShape::Doubly {
                    head_offset: d.head_offset,
                    next_offset: d.next_offset,
                    prev_offset: d.prev_offset,
                }],
                _ => continue,
            };
            for shape in shapes {
                if let Some(candidate) = self.chain_from(context, start, shape) {
                    trace!("Found candidate {}", candidate);
                    found.push(candidate);
                }
            }
        }
        found
    }
}

impl DllFinder {
    /// Shapes with next field `next_offset` whose successor points back to `start`.
    fn shapes_through(
        &self,
        context: &FinderContext<'_>,
        start: ObjectId,
        next_offset: u64,
    ) -> Vec<ListShape> {
        let Some((next, head_offset)) = context.follow(start, next_offset, None) else {
            return vec![];
        };
        if next == start {
            return vec![];
        }
        context
            .graph()
            .fields_of(next)
            .filter(|e| e.offset != next_offset)
            .filter(|e| context.follow(next, e.offset, Some(head_offset)).map(|t| t.0) == Some(start))
            .map(|e| ListShape::Doubly {
                head_offset,
                next_offset,
                prev_offset: e.offset,
            })
            .collect()
    }

    fn chain_from(
        &self,
        context: &FinderContext<'_>,
        start: ObjectId,
        shape: ListShape,
    ) -> Option<AbstractionCandidate> {
        let (head_offset, next_offset) = (shape.head_offset(), shape.next_offset());
        let prev_offset = shape.prev_offset()?;
        let options = context.state().options();
        let links = shape.link_offsets();
        let mut chain = vec![start];
        let mut length = context.graph().object(start)?.kind().concrete_length();
        let mut worst = ShapeDifference::Equal;
        let mut best = None;
        let mut previous: Option<ObjectId> = None;
        let mut current = start;
        while let Some((next, _)) = context.follow(current, next_offset, Some(head_offset)) {
            if chain.contains(&next) || !context.compatible_element(start, next, &shape) {
                break;
            }
            let back = context.follow(next, prev_offset, Some(head_offset));
            if back.map(|t| t.0) != Some(current) {
                break;
            }
            // Only the first and the last element may be referenced from outside.
            if let Some(previous) = previous {
                let only_links = context.incoming(current).iter().all(|e| {
                    (e.object == previous && e.offset == next_offset)
                        || (e.object == next && e.offset == prev_offset)
                });
                if !only_links {
                    break;
                }
            }
            chain.push(next);
            let Some(difference) = context.compare_elements(start, next, &links, &chain) else {
                break;
            };
            worst = worst.max(difference);
            length += context.graph().object(next)?.kind().concrete_length();
            if length >= options.threshold_for(worst) {
                best = Some(AbstractionCandidate::new(shape, chain.clone(), length, worst));
            }
            previous = Some(current);
            current = next;
        }
        best
    }
}
