//! Shared fixtures for episode tests.

#![allow(dead_code)]

use concord_consensus::{
    Analyzer, ConsensusConfig, EntityStore, GlobalStateSnapshot, GridPos, Proposal,
    SalienceWeights, Value,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a test subscriber once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "concord_consensus=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Proposes the same value once on every entity in the store, then lets
/// the proposal accumulate evidence.
pub struct FixedAnalyzer {
    pub name: String,
    pub value: Value,
    pub lure: f64,
    pub score: f64,
    pub coherence: Option<f64>,
}

impl FixedAnalyzer {
    pub fn new(name: &str, value: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            lure: 1.0,
            score: 0.5,
            coherence: None,
        }
    }

    pub fn with_coherence(mut self, coherence: f64) -> Self {
        self.coherence = Some(coherence);
        self
    }

    pub fn lure(mut self, lure: f64) -> Self {
        self.lure = lure;
        self
    }

    pub fn score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn boxed(self) -> Box<dyn Analyzer> {
        Box::new(self)
    }
}

impl Analyzer for FixedAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn propose(
        &self,
        entities: &EntityStore,
        _snapshot: &GlobalStateSnapshot,
    ) -> Vec<(GridPos, Proposal)> {
        entities
            .entities()
            .filter(|e| e.proposal(&self.name).is_none())
            .map(|e| {
                (
                    e.position,
                    Proposal::new(self.value.clone())
                        .lure(self.lure)
                        .score(self.score),
                )
            })
            .collect()
    }

    fn coherence(&self) -> Option<f64> {
        self.coherence
    }
}

/// Proposes each entity's initial value, only on the first cycle it sees it.
pub struct IdentityAnalyzer;

impl Analyzer for IdentityAnalyzer {
    fn name(&self) -> &str {
        "identity"
    }

    fn propose(
        &self,
        entities: &EntityStore,
        _snapshot: &GlobalStateSnapshot,
    ) -> Vec<(GridPos, Proposal)> {
        entities
            .entities()
            .filter(|e| e.proposal("identity").is_none())
            .filter_map(|e| {
                e.initial_value
                    .clone()
                    .map(|v| (e.position, Proposal::new(v).with_meta("source", "initial")))
            })
            .collect()
    }
}

/// Salience weights with only energy proximity active, so the per-cycle
/// increment is exactly `1 - energy / energy_scale`.
pub fn energy_only_config() -> ConsensusConfig {
    let mut config = ConsensusConfig::default();
    config.salience.weights = SalienceWeights {
        energy_proximity: 1.0,
        gradient_strength: 0.0,
        resonance_peak: 0.0,
        resonance_coherence: 0.0,
        field_resonance: 0.0,
        aim_alignment: 0.0,
        aim_congruence: 0.0,
        aim_phase_fit: 0.0,
        satisfaction: 0.0,
        phase_progress: 0.0,
        window_proximity: 0.0,
        variance_adequacy: 0.0,
        gate_readiness: 0.0,
    };
    config
}
