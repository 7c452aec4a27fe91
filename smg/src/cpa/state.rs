use crate::cpa::lattice::PartialJoinSemiLattice;
use crate::state::SmgState;
use std::cmp::Ordering;
use std::fmt::Debug;
use std::ops::{Add, AddAssign};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MergeOutcome {
    NoOp,
    Merged,
}

impl MergeOutcome {
    pub fn merged(&self) -> bool {
        matches!(self, MergeOutcome::Merged)
    }
}

impl Add for MergeOutcome {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::NoOp, Self::NoOp) => Self::NoOp,
            _ => Self::Merged,
        }
    }
}

impl AddAssign for MergeOutcome {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs
    }
}

/// Core trait for abstract states used by [`SmgAnalysis`](crate::cpa::SmgAnalysis).
pub trait AbstractState: PartialJoinSemiLattice + Clone + Debug {
    /// Merge `other` into `self`. Mutate `self` and return whether merging occurred.
    /// The mutated `self` MUST be >= than it was before.
    fn merge(&mut self, other: &Self) -> MergeOutcome;

    /// Merge by joining, when the join is defined.
    fn merge_join(&mut self, new_state: &Self) -> MergeOutcome {
        if self == new_state {
            return MergeOutcome::NoOp;
        }
        match self.partial_join(new_state) {
            Some(joined) if joined != *self => {
                *self = joined;
                MergeOutcome::Merged
            }
            _ => MergeOutcome::NoOp,
        }
    }

    /// Default separate merge (no-op).
    fn merge_sep(&mut self, _: &Self) -> MergeOutcome {
        MergeOutcome::NoOp
    }

    /// Stop predicate: is `self` covered by any of `states`?
    fn stop<'a, T: Iterator<Item = &'a Self>>(&'a self, states: T) -> bool;

    /// Default stop predicate using piecewise ordering.
    fn stop_sep<'a, T: Iterator<Item = &'a Self>>(&'a self, mut states: T) -> bool {
        states.any(|s| {
            matches!(
                PartialOrd::partial_cmp(self, s),
                Some(Ordering::Less) | Some(Ordering::Equal)
            )
        })
    }
}

impl AbstractState for SmgState {
    fn merge(&mut self, other: &Self) -> MergeOutcome {
        self.merge_sep(other)
    }

    fn stop<'a, T: Iterator<Item = &'a Self>>(&'a self, states: T) -> bool {
        self.stop_sep(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_outcomes_accumulate() {
        let mut outcome = MergeOutcome::NoOp;
        outcome += MergeOutcome::NoOp;
        assert!(!outcome.merged());
        outcome += MergeOutcome::Merged;
        assert!(outcome.merged());
        assert_eq!(MergeOutcome::Merged + MergeOutcome::NoOp, MergeOutcome::Merged);
    }

    fn global_holding(n: Option<i64>) -> SmgState {
        let mut state = SmgState::default();
        let g = state.declare_global("g", 8);
        let value = match n {
            Some(n) => state.value_for(n),
            None => state.new_value(),
        };
        state.write_value(g, 0, 8, value).unwrap();
        state
    }

    #[test]
    fn less_specific_state_covers() {
        let precise = global_holding(Some(7));
        let vague = global_holding(None);
        assert!(precise.stop([&vague].into_iter()));
        assert!(!vague.stop([&precise].into_iter()));
        assert!(vague.stop([&vague.clone()].into_iter()));
    }

    #[test]
    fn merging_forgets_disagreement() {
        let seven = global_holding(Some(7));
        let eight = global_holding(Some(8));
        let mut merged = seven.clone();
        assert_eq!(merged.merge(&eight), MergeOutcome::NoOp);
        assert_eq!(merged.merge_join(&eight), MergeOutcome::Merged);
        assert!(seven.stop([&merged].into_iter()));
        assert!(eight.stop([&merged].into_iter()));
        assert_eq!(merged.merge_join(&seven), MergeOutcome::NoOp);
    }
}
