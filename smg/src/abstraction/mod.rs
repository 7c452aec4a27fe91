//! List abstraction: finding chains of similar heap objects and folding them into
//! list segments.
//!
//! The search ([`finder`]) is separate from the rewrite ([`fold`]); the
//! [`AbstractionManager`] repeatedly folds the best candidate until none is left.
//! Every fold replaces at least two objects by one, so the loop terminates.

pub mod block;
pub mod candidate;
pub mod finder;
pub mod fold;

use crate::error::SmgError;
use crate::state::SmgState;
use tracing::debug;

pub use block::AbstractionBlock;
pub use candidate::{AbstractionCandidate, ListShape};
pub use finder::ShapeDifference;

#[derive(Debug, Clone, Default)]
pub struct AbstractionManager {
    blocks: Vec<AbstractionBlock>,
}

impl AbstractionManager {
    pub fn new(blocks: Vec<AbstractionBlock>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[AbstractionBlock] {
        &self.blocks
    }

    pub fn find_candidates(&self, state: &SmgState) -> Vec<AbstractionCandidate> {
        finder::find_candidates(state, &self.blocks)
    }

    /// The candidate with the highest score; the earliest one wins ties.
    pub fn best_candidate(&self, state: &SmgState) -> Option<AbstractionCandidate> {
        let mut best: Option<AbstractionCandidate> = None;
        for candidate in self.find_candidates(state) {
            if best.as_ref().is_none_or(|b| candidate.score() > b.score()) {
                best = Some(candidate);
            }
        }
        best
    }

    /// Fold the best candidate, if any, and return it.
    pub fn execute_one_step(
        &self,
        state: &mut SmgState,
    ) -> Result<Option<AbstractionCandidate>, SmgError> {
        let Some(candidate) = self.best_candidate(state) else {
            return Ok(None);
        };
        *state = fold::fold(state, &candidate)?;
        Ok(Some(candidate))
    }

    /// Fold until no candidate is left. Returns whether anything was folded.
    pub fn execute(&self, state: &mut SmgState) -> Result<bool, SmgError> {
        let mut folded = 0;
        while self.execute_one_step(state)?.is_some() {
            folded += 1;
        }
        if folded > 0 {
            debug!("List abstraction performed {} fold(s)", folded);
        }
        Ok(folded > 0)
    }
}
