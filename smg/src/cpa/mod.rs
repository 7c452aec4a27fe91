pub mod lattice;
pub mod state;

use crate::error::SmgError;
use crate::precision::{PrecisionAdjustment, SmgPrecision};
use crate::state::SmgState;
use state::AbstractState;
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Debug;
use tracing::{debug, trace, warn};

/// The program semantics an analysis explores: a control-flow graph whose edges
/// rewrite memory graphs.
///
/// Locations and edges are owned by the front end; this crate only sees them through
/// this trait.
pub trait TransferRelation {
    type Location: Clone + Ord + Debug;
    type Edge: Debug;

    /// Outgoing edges of a location, each with its destination.
    fn edges(&self, location: &Self::Location) -> Vec<(Self::Edge, Self::Location)>;

    /// Successor states of `state` along `edge`.
    ///
    /// An empty result means the edge is infeasible. A fatal [`SmgError`] aborts the
    /// path; [`SmgError::Unsupported`] aborts the analysis.
    fn apply(&self, state: &SmgState, edge: &Self::Edge) -> Result<Vec<SmgState>, SmgError>;
}

/**
A waitlist-driven reachability analysis over memory graphs, following the
Configurable Program Analysis scheme of Chapter 16 of
[The Handbook of Model Checking](https://link.springer.com/book/10.1007/978-3-319-10575-8).

Every successor is first adjusted with the precision of its location, which is where
list abstraction happens. It is then merged into the reached states of the same
location and dropped if one of them already covers it. Memory graphs keep their
states separate and rely on coverage alone, so the analysis terminates as long as
abstraction points cut every loop.
*/
pub struct SmgAnalysis<T: TransferRelation> {
    transfer: T,
    precisions: BTreeMap<T::Location, SmgPrecision>,
    default_precision: SmgPrecision,
    adjustment: PrecisionAdjustment,
}

impl<T: TransferRelation> SmgAnalysis<T> {
    pub fn new(transfer: T) -> Self {
        Self {
            transfer,
            precisions: BTreeMap::new(),
            default_precision: SmgPrecision::default(),
            adjustment: PrecisionAdjustment,
        }
    }

    pub fn with_precision(mut self, location: T::Location, precision: SmgPrecision) -> Self {
        self.precisions.insert(location, precision);
        self
    }

    pub fn with_default_precision(mut self, precision: SmgPrecision) -> Self {
        self.default_precision = precision;
        self
    }

    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    pub fn precision(&self, location: &T::Location) -> &SmgPrecision {
        self.precisions
            .get(location)
            .unwrap_or(&self.default_precision)
    }

    /// Explore everything reachable from `initial` at `location`.
    ///
    /// Returns the reached states in discovery order.
    pub fn run(
        &self,
        location: T::Location,
        initial: SmgState,
    ) -> Result<Vec<(T::Location, SmgState)>, SmgError> {
        let mut waitlist: VecDeque<(T::Location, SmgState)> = VecDeque::new();
        let mut reached: Vec<(T::Location, SmgState)> = Vec::new();
        waitlist.push_back((location.clone(), initial.clone()));
        reached.push((location, initial));
        while let Some((location, state)) = waitlist.pop_front() {
            for (edge, dest) in self.transfer.edges(&location) {
                let mut current = state.clone();
                current.next_step();
                let successors = match self.transfer.apply(&current, &edge) {
                    Ok(successors) => successors,
                    Err(e) if e.is_fatal() => {
                        warn!("Dropping path at {:?} along {:?}: {}", location, edge, e);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                trace!("{:?} -> {:?}: {} successor(s)", location, dest, successors.len());
                for successor in successors {
                    let successor = match self.adjustment.adjust(&successor, self.precision(&dest)) {
                        Ok(adjusted) => adjusted.state,
                        Err(e) if e.is_fatal() => {
                            warn!("Dropping path at {:?}: {}", dest, e);
                            continue;
                        }
                        Err(e) => return Err(e),
                    };
                    for (reached_location, reached_state) in reached.iter_mut() {
                        if *reached_location == dest && reached_state.merge(&successor).merged() {
                            waitlist.push_back((dest.clone(), reached_state.clone()));
                        }
                    }
                    let covered = successor.stop(
                        reached
                            .iter()
                            .filter(|(l, _)| *l == dest)
                            .map(|(_, s)| s),
                    );
                    if !covered {
                        waitlist.push_back((dest.clone(), successor.clone()));
                        reached.push((dest.clone(), successor));
                    }
                }
            }
        }
        debug!("Reached {} state(s)", reached.len());
        Ok(reached)
    }
}
