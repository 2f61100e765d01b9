//! Deferred-Maturation Consensus
//!
//! Independent analyzers propose values for the same grid entities. Nobody
//! trusts a proposal when it is made. Proposals **accumulate evidence**
//! while the process runs and are scored only after it converges.
//!
//! # Pipeline
//!
//! 1. Analyzers write proposals onto entities (one slot per analyzer)
//! 2. Every cycle, salience integrates weak global signals into each proposal
//! 3. On convergence, maturation turns proposals into calibrated propositions
//! 4. Aggregation resolves each entity by best score or by consensus
//!
//! Confidence is not what an analyzer says about itself. It is an estimate
//! of affinity to the ground state, gated by the phase the process converged
//! in and scaled by how much evidence the proposal gathered.
//!
//! # Degradation
//!
//! A bad analyzer cannot abort an episode. Out-of-range scores are clamped,
//! missing readings become neutral, and repeated convergence signals are
//! ignored. Only lifecycle misuse and invalid configuration return errors.

mod aggregator;
mod analyzer;
mod config;
mod entity;
mod episode;
mod error;
mod maturation;
mod salience;
mod snapshot;
mod threshold;
mod value;

pub use aggregator::{AggregatorStats, PropositionAggregator, Resolution};
pub use analyzer::{Analyzer, ProposalBatch};
pub use config::{
    AggregatorConfig, ConsensusConfig, MaturationConfig, Normalization, SalienceConfig,
    SalienceWeights,
};
pub use entity::{Entity, EntityStore, Proposal, ProposalState};
pub use episode::{CycleReport, Episode, EpisodeState};
pub use error::{Error, Result};
pub use maturation::{
    AnalyzerCoherence, Calibration, MaturationEngine, Proposition, PropositionMetadata,
};
pub use salience::{window_band_score, SalienceAccumulator, SalienceSignals};
pub use snapshot::{
    CoherenceField, CollectiveAim, GlobalStateSnapshot, Phase, TimingGates, NEUTRAL,
};
pub use threshold::majority_threshold;
pub use value::{MetaValue, Metadata, Value};

pub use concord_grid::{Grid, GridPos};
