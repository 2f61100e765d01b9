//! The analyzer seam.
//!
//! Analyzers are independent. Each one reads the entity set and the current
//! snapshot and returns proposals; it never writes to entities itself. The
//! episode applies the returned batches one at a time, so writes to any
//! entity are serialized even when analyzers run in parallel.

use concord_grid::GridPos;

use crate::entity::{EntityStore, Proposal};
use crate::snapshot::GlobalStateSnapshot;

/// A pluggable source of proposals.
pub trait Analyzer: Send + Sync {
    /// Unique name; it keys the analyzer's slot on every entity.
    fn name(&self) -> &str;

    /// Proposals for this cycle.
    fn propose(
        &self,
        entities: &EntityStore,
        snapshot: &GlobalStateSnapshot,
    ) -> Vec<(GridPos, Proposal)>;

    /// Self-consistency of this analyzer in [0, 1], if it tracks one.
    ///
    /// Feeds the bounded reliability factor at maturation.
    fn coherence(&self) -> Option<f64> {
        None
    }
}

/// One analyzer's output for a cycle.
#[derive(Debug, Clone)]
pub struct ProposalBatch {
    pub analyzer: String,
    pub proposals: Vec<(GridPos, Proposal)>,
}

/// Run every analyzer against the same read-only view.
pub(crate) fn collect_batches(
    analyzers: &[Box<dyn Analyzer>],
    entities: &EntityStore,
    snapshot: &GlobalStateSnapshot,
) -> Vec<ProposalBatch> {
    let run = |a: &dyn Analyzer| ProposalBatch {
        analyzer: a.name().to_string(),
        proposals: a.propose(entities, snapshot),
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        analyzers.par_iter().map(|a| run(a.as_ref())).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        analyzers.iter().map(|a| run(a.as_ref())).collect()
    }
}
