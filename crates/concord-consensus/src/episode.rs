//! Episode driver: the surface external collaborators talk to.
//!
//! # Lifecycle
//!
//! ```text
//! start_episode ──► Accumulating ──signal_converged──► Converged
//!                        │
//!                        └──────────abort────────────► Aborted
//! ```
//!
//! Every cycle is a barrier: all analyzer writes for the cycle land before
//! salience is integrated, and integration finishes before the next cycle's
//! writes begin. Maturation happens once. An aborted episode discards its
//! proposals and never produces propositions.

use std::collections::BTreeMap;

use concord_grid::GridPos;
use tracing::{debug, info, warn};

use crate::aggregator::{AggregatorStats, PropositionAggregator, Resolution};
use crate::analyzer::{collect_batches, Analyzer};
use crate::config::ConsensusConfig;
use crate::entity::{EntityStore, Proposal, ProposalState};
use crate::error::{Error, Result};
use crate::maturation::{AnalyzerCoherence, MaturationEngine, Proposition};
use crate::salience::SalienceAccumulator;
use crate::snapshot::GlobalStateSnapshot;
use crate::value::Value;

/// Where an episode is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeState {
    /// Taking proposals and integrating salience
    Accumulating,
    /// Matured; propositions are available
    Converged,
    /// Abandoned before convergence
    Aborted,
}

impl EpisodeState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EpisodeState::Accumulating => "accumulating",
            EpisodeState::Converged => "converged",
            EpisodeState::Aborted => "aborted",
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// Cycle number the report covers
    pub cycle: u64,
    /// Proposals written by analyzers this cycle
    pub registered: usize,
    /// Immature proposals that received salience
    pub updated: usize,
    /// Salience added to each of them
    pub increment: f64,
}

/// One task's worth of proposals, evidence and resolution.
#[derive(Debug)]
pub struct Episode {
    config: ConsensusConfig,
    accumulator: SalienceAccumulator,
    engine: MaturationEngine,
    store: EntityStore,
    coherence: AnalyzerCoherence,
    cycle: u64,
    state: EpisodeState,
    aggregator: Option<PropositionAggregator>,
}

impl Episode {
    /// Create an episode with a validated configuration.
    pub fn new(config: ConsensusConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            accumulator: SalienceAccumulator::new(
                config.salience.clone(),
                config.normalization.clone(),
            )?,
            engine: MaturationEngine::new(
                config.maturation.clone(),
                config.normalization.clone(),
            )?,
            config,
            store: EntityStore::new(),
            coherence: AnalyzerCoherence::new(),
            cycle: 0,
            state: EpisodeState::Accumulating,
            aggregator: None,
        })
    }

    /// Reset everything and seed the episode's entities.
    pub fn start_episode(&mut self, entities: impl IntoIterator<Item = (GridPos, Value)>) {
        self.store.clear();
        self.coherence.clear();
        self.aggregator = None;
        self.cycle = 0;
        self.state = EpisodeState::Accumulating;

        for (pos, value) in entities {
            self.store.seed(pos, value);
        }
        info!(entities = self.store.len(), "Episode started");
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn state(&self) -> EpisodeState {
        self.state
    }

    /// Current cycle number.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    fn ensure_accumulating(&self) -> Result<()> {
        match self.state {
            EpisodeState::Accumulating => Ok(()),
            EpisodeState::Aborted => Err(Error::Aborted),
            EpisodeState::Converged => Err(Error::InvalidState {
                expected: EpisodeState::Accumulating.as_str(),
                actual: self.state.as_str().to_string(),
            }),
        }
    }

    /// Register a proposal in the current cycle.
    pub fn register_proposal(
        &mut self,
        position: GridPos,
        analyzer: &str,
        proposal: Proposal,
    ) -> Result<&ProposalState> {
        self.ensure_accumulating()?;
        Ok(self
            .store
            .register_proposal(position, analyzer, proposal, self.cycle))
    }

    /// Record an analyzer's coherence for the reliability term.
    pub fn set_analyzer_coherence(&mut self, analyzer: impl Into<String>, coherence: f64) {
        self.coherence.insert(analyzer.into(), coherence);
    }

    /// Run analyzers, apply their proposals, then integrate salience.
    pub fn run_cycle(
        &mut self,
        analyzers: &[Box<dyn Analyzer>],
        snapshot: &GlobalStateSnapshot,
    ) -> Result<CycleReport> {
        self.ensure_accumulating()?;

        let batches = collect_batches(analyzers, &self.store, snapshot);
        let mut registered = 0;
        for batch in batches {
            for (pos, proposal) in batch.proposals {
                self.store
                    .register_proposal(pos, &batch.analyzer, proposal, self.cycle);
                registered += 1;
            }
        }
        for analyzer in analyzers {
            if let Some(c) = analyzer.coherence() {
                self.coherence.insert(analyzer.name().to_string(), c);
            }
        }

        let cycle = self.cycle;
        let increment = self.accumulator.increment(snapshot);
        let updated = self.accumulate(snapshot)?;
        Ok(CycleReport {
            cycle,
            registered,
            updated,
            increment,
        })
    }

    /// Integrate one cycle of salience and advance the cycle counter.
    ///
    /// For drivers that register proposals directly. Call once per cycle.
    pub fn accumulate(&mut self, snapshot: &GlobalStateSnapshot) -> Result<usize> {
        self.ensure_accumulating()?;
        let updated = self.accumulator.accumulate(&mut self.store, snapshot);
        debug!(cycle = self.cycle, updated, "Cycle complete");
        self.cycle += 1;
        Ok(updated)
    }

    /// Mature all proposals against the final snapshot.
    ///
    /// Repeated calls are a no-op returning the existing result.
    pub fn signal_converged(
        &mut self,
        final_snapshot: &GlobalStateSnapshot,
    ) -> Result<&PropositionAggregator> {
        match self.state {
            EpisodeState::Aborted => return Err(Error::Aborted),
            EpisodeState::Converged => {
                debug!("Convergence already signalled, ignoring");
            }
            EpisodeState::Accumulating => {
                if !final_snapshot.is_completion() {
                    warn!(
                        phase = final_snapshot.phase.map(|p| p.as_str()).unwrap_or("unknown"),
                        "Converging on a snapshot outside the completion phase"
                    );
                }
                let propositions =
                    self.engine
                        .mature(&mut self.store, final_snapshot, &self.coherence);
                self.aggregator = Some(PropositionAggregator::new(
                    self.config.aggregator.clone(),
                    propositions,
                ));
                self.state = EpisodeState::Converged;
            }
        }

        self.aggregator.as_ref().ok_or_else(|| Error::InvalidState {
            expected: EpisodeState::Converged.as_str(),
            actual: self.state.as_str().to_string(),
        })
    }

    /// Abandon the episode; every proposal is discarded.
    pub fn abort(&mut self) {
        let discarded = self.store.immature_count();
        self.store.clear();
        self.aggregator = None;
        self.state = EpisodeState::Aborted;
        info!(discarded, cycle = self.cycle, "Episode aborted");
    }

    /// The aggregator, once converged.
    pub fn aggregator(&self) -> Option<&PropositionAggregator> {
        self.aggregator.as_ref()
    }

    /// Propositions at a position; empty before convergence.
    pub fn get_propositions_for(&self, position: GridPos) -> &[Proposition] {
        self.aggregator
            .as_ref()
            .map(|a| a.get_propositions_for(position))
            .unwrap_or(&[])
    }

    pub fn best_for(&self, position: GridPos) -> Option<&Proposition> {
        self.aggregator.as_ref()?.best_for(position)
    }

    pub fn consensus_for(&self, position: GridPos, min_agreement: usize) -> Option<&Proposition> {
        self.aggregator.as_ref()?.consensus_for(position, min_agreement)
    }

    /// Resolved value per position; empty before convergence.
    pub fn resolve(&self, strategy: Resolution) -> BTreeMap<GridPos, Value> {
        self.aggregator
            .as_ref()
            .map(|a| {
                a.resolve(strategy)
                    .into_iter()
                    .map(|(pos, p)| (pos, p.proposed_value().clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Aggregation statistics; all zero before convergence.
    pub fn statistics(&self) -> AggregatorStats {
        self.aggregator
            .as_ref()
            .map(PropositionAggregator::statistics)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Phase;

    fn episode() -> Episode {
        Episode::new(ConsensusConfig::default()).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = ConsensusConfig::default();
        config.normalization.energy_scale = -1.0;
        assert!(matches!(Episode::new(config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn register_uses_current_cycle() {
        let mut ep = episode();
        ep.start_episode([(GridPos::ORIGIN, Value::Int(0))]);
        ep.accumulate(&GlobalStateSnapshot::default()).unwrap();
        ep.accumulate(&GlobalStateSnapshot::default()).unwrap();

        let state = ep
            .register_proposal(GridPos::ORIGIN, "a", Proposal::new(1))
            .unwrap();
        assert_eq!(state.cycle_generated, 2);
    }

    #[test]
    fn nothing_visible_before_convergence() {
        let mut ep = episode();
        ep.start_episode([]);
        ep.register_proposal(GridPos::ORIGIN, "a", Proposal::new(1)).unwrap();
        assert!(ep.best_for(GridPos::ORIGIN).is_none());
        assert!(ep.get_propositions_for(GridPos::ORIGIN).is_empty());
        assert_eq!(ep.statistics().total, 0);
        assert!(ep.resolve(Resolution::Best).is_empty());
    }

    #[test]
    fn double_convergence_is_noop() {
        let mut ep = episode();
        ep.start_episode([]);
        ep.register_proposal(GridPos::ORIGIN, "a", Proposal::new(1)).unwrap();
        ep.accumulate(&GlobalStateSnapshot::default()).unwrap();

        let final_snap = GlobalStateSnapshot::converged(0.0);
        let first = ep.signal_converged(&final_snap).unwrap().len();
        let first_conf = ep.best_for(GridPos::ORIGIN).unwrap().confidence();

        let second = ep
            .signal_converged(&GlobalStateSnapshot::new(9.0, Phase::Exploration))
            .unwrap()
            .len();
        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(ep.best_for(GridPos::ORIGIN).unwrap().confidence(), first_conf);
    }

    #[test]
    fn register_after_convergence_fails() {
        let mut ep = episode();
        ep.start_episode([]);
        ep.signal_converged(&GlobalStateSnapshot::converged(0.0)).unwrap();
        let err = ep
            .register_proposal(GridPos::ORIGIN, "a", Proposal::new(1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        assert!(ep.accumulate(&GlobalStateSnapshot::default()).is_err());
    }

    #[test]
    fn abort_discards_everything() {
        let mut ep = episode();
        ep.start_episode([(GridPos::ORIGIN, Value::Int(0))]);
        ep.register_proposal(GridPos::ORIGIN, "a", Proposal::new(1)).unwrap();
        ep.abort();

        assert_eq!(ep.state(), EpisodeState::Aborted);
        assert!(ep.store().is_empty());
        assert!(matches!(
            ep.signal_converged(&GlobalStateSnapshot::converged(0.0)),
            Err(Error::Aborted)
        ));
        assert!(matches!(
            ep.register_proposal(GridPos::ORIGIN, "a", Proposal::new(1)),
            Err(Error::Aborted)
        ));
    }

    #[test]
    fn start_episode_resets() {
        let mut ep = episode();
        ep.start_episode([]);
        ep.register_proposal(GridPos::ORIGIN, "a", Proposal::new(1)).unwrap();
        ep.signal_converged(&GlobalStateSnapshot::converged(0.0)).unwrap();

        ep.start_episode([(GridPos::new(1, 1), Value::Int(2))]);
        assert_eq!(ep.state(), EpisodeState::Accumulating);
        assert_eq!(ep.cycle(), 0);
        assert_eq!(ep.store().len(), 1);
        assert!(ep.aggregator().is_none());
    }

    #[test]
    fn empty_episode_converges_to_nothing() {
        let mut ep = episode();
        ep.start_episode([]);
        let agg = ep.signal_converged(&GlobalStateSnapshot::converged(0.0)).unwrap();
        assert!(agg.is_empty());
        assert_eq!(ep.statistics(), AggregatorStats::default());
    }

    #[test]
    fn coherence_feeds_reliability() {
        let mut ep = episode();
        ep.start_episode([]);
        ep.register_proposal(GridPos::ORIGIN, "steady", Proposal::new(1)).unwrap();
        ep.register_proposal(GridPos::ORIGIN, "erratic", Proposal::new(2)).unwrap();
        ep.set_analyzer_coherence("steady", 1.0);
        ep.set_analyzer_coherence("erratic", 0.0);
        ep.signal_converged(&GlobalStateSnapshot::converged(0.0)).unwrap();

        let props = ep.get_propositions_for(GridPos::ORIGIN);
        let erratic = &props[0];
        let steady = &props[1];
        assert_eq!(steady.analyzer(), "steady");
        assert!((steady.metadata().calibration.reliability - 1.0).abs() < 1e-12);
        assert!((erratic.metadata().calibration.reliability - 0.7).abs() < 1e-12);
        assert!(steady.confidence() > erratic.confidence());
    }
}
