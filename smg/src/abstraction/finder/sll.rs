use crate::abstraction::ShapeDifference;
use crate::abstraction::candidate::{AbstractionCandidate, ListShape};
use crate::abstraction::finder::{FinderContext, ShapeFinder};
use crate::heap::{ObjectId, ObjectKind};
use tracing::trace;

/// Finds chains linked through a single next field.
pub struct SllFinder;

impl ShapeFinder for SllFinder {
    fn find(&self, context: &FinderContext<'_>) -> Vec<AbstractionCandidate> {
        let mut found = vec![];
        for (start, object) in context.graph().objects() {
            if !context.may_be_element(start) {
                continue;
            }
            let next_offsets: Vec<u64> = match object.kind() {
                ObjectKind::Region => context
                    .graph()
                    .fields_of(start)
                    .filter(|e| context.is_real_pointer(e.value))
                    .map(|e| e.offset)
                    .collect(),
                ObjectKind::SinglyLinked(s) => vec![s.next_offset],
                _ => continue,
            };
            for next_offset in next_offsets {
                if let Some(candidate) = self.chain_from(context, start, next_offset) {
                    trace!("Found candidate {}", candidate);
                    found.push(candidate);
                }
            }
        }
        found
    }
}

impl SllFinder {
    fn chain_from(
        &self,
        context: &FinderContext<'_>,
        start: ObjectId,
        next_offset: u64,
    ) -> Option<AbstractionCandidate> {
        let (_, head_offset) = context.follow(start, next_offset, None)?;
        let shape = ListShape::Singly {
            head_offset,
            next_offset,
        };
        let first = context.graph().object(start)?;
        if !shape.admits(first.kind()) {
            return None;
        }
        let options = context.state().options();
        let links = shape.link_offsets();
        let mut chain = vec![start];
        let mut length = first.kind().concrete_length();
        let mut worst = ShapeDifference::Equal;
        let mut best = None;
        let mut current = start;
        while let Some((next, _)) = context.follow(current, next_offset, Some(head_offset)) {
            if chain.contains(&next) || !context.compatible_element(start, next, &shape) {
                break;
            }
            let only_link = matches!(
                context.incoming(next),
                [edge] if edge.object == current && edge.offset == next_offset
            );
            if !only_link {
                break;
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
            current = next;
        }
        best
    }
}
