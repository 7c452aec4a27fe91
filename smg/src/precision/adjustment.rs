use crate::abstraction::AbstractionManager;
use crate::error::SmgError;
use crate::heap::{ObjectId, VarName};
use crate::precision::SmgPrecision;
use crate::state::SmgState;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct AdjustmentResult {
    pub state: SmgState,
    pub changed: bool,
}

/// Forgets what a location's precision does not track and folds lists at
/// abstraction points.
///
/// The three phases run in order: stack, fields, heap. Each one can be switched off
/// in the state's options.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecisionAdjustment;

impl PrecisionAdjustment {
    pub fn adjust(&self, state: &SmgState, precision: &SmgPrecision) -> Result<AdjustmentResult, SmgError> {
        let mut adjusted = state.clone();
        let mut changed = false;
        if state.options().stack_abstraction {
            changed |= self.abstract_stack(&mut adjusted, precision);
        }
        if state.options().field_abstraction {
            changed |= self.abstract_fields(&mut adjusted, precision);
        }
        if state.options().heap_abstraction && precision.is_abstraction_point {
            let manager = AbstractionManager::new(precision.abstraction_blocks.clone());
            changed |= manager.execute(&mut adjusted)?;
        }
        if !changed {
            return Ok(AdjustmentResult {
                state: state.clone(),
                changed,
            });
        }
        Ok(AdjustmentResult {
            state: adjusted,
            changed,
        })
    }

    /// Drop untracked locals that neither hold nor are the target of a pointer.
    fn abstract_stack(&self, state: &mut SmgState, precision: &SmgPrecision) -> bool {
        let removable: Vec<(usize, VarName, ObjectId)> = state
            .graph()
            .stack()
            .iter()
            .enumerate()
            .flat_map(|(i, frame)| {
                frame
                    .variables()
                    .iter()
                    .map(move |(name, object)| (i, *name, *object))
            })
            .filter(|(_, name, _)| !precision.tracked_variables.contains(name))
            .filter(|(_, _, object)| {
                let graph = state.graph();
                graph.pointers_to(*object).is_empty()
                    && graph
                        .fields_of(*object)
                        .all(|e| e.value.is_zero() || !graph.is_pointer(e.value))
            })
            .collect();
        for (frame, name, object) in &removable {
            debug!("Forgetting untracked local {}", name);
            state.graph_mut().remove_local(*frame, name);
            state.remove_objects(&[*object]);
        }
        !removable.is_empty()
    }

    /// Drop scalar fields reachable only through untracked memory paths.
    ///
    /// Pointer fields, null included, describe shape and stay.
    fn abstract_fields(&self, state: &mut SmgState, precision: &SmgPrecision) -> bool {
        let removable: Vec<(ObjectId, u64)> = state
            .graph()
            .field_paths()
            .into_iter()
            .filter(|(_, path)| !precision.tracked_memory_paths.contains(path))
            .filter_map(|((object, offset), path)| {
                let edge = state.graph().field_at(object, offset)?;
                let scalar = !edge.value.is_zero() && !state.graph().is_pointer(edge.value);
                scalar.then(|| {
                    debug!("Forgetting untracked field {}", path);
                    (object, offset)
                })
            })
            .collect();
        for (object, offset) in &removable {
            state.graph_mut().remove_field(*object, *offset);
        }
        !removable.is_empty()
    }
}
