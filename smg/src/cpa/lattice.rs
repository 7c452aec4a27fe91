use crate::join::{JoinResult, join};
use crate::state::SmgState;

/// Types that are "lattice-y" but whose join may be undefined.
///
/// Two memory graphs with different shapes have no join that keeps their structure;
/// callers keep such states apart instead.
pub trait PartialJoinSemiLattice: Eq + PartialOrd + Sized {
    fn partial_join(&self, other: &Self) -> Option<Self>;
}

impl PartialJoinSemiLattice for SmgState {
    fn partial_join(&self, other: &Self) -> Option<Self> {
        match join(self, other) {
            JoinResult::Defined { state, .. } => Some(state),
            JoinResult::NotDefined => None,
        }
    }
}
