//! Deferred maturation: proposals become scored propositions once, after
//! the process converges.
//!
//! # Calibration
//!
//! ```text
//! felt        = 0.4·(1 - norm(E)) + 0.4·(1 - norm(field[pos]) | 0.5) + 0.2·clamp(|∇E|)
//! phase       = exploration: 0.8 + 0.4·(1 - satisfaction)
//!               navigation:  0.9 + 0.2·satisfaction
//!               completion:  1.0 + 0.3·(1 - norm(E))
//! reliability = 0.7 + 0.3·norm(analyzer coherence)
//! boost       = 0.2·clamp(specific score)
//! base        = clamp(felt · phase · reliability + boost)
//! confidence  = clamp(base · clamp(salience / max(1, prehensions), 0.5, 1.5))
//! ```
//!
//! Confidence is not the analyzer's self-assessment. It estimates affinity to
//! the ground state, gated by the phase the process converged in. Analyzer
//! coherence enters only through the bounded reliability factor, so a loud
//! analyzer cannot dominate.
//!
//! An unknown phase is treated as exploration.

use std::collections::BTreeMap;

use concord_grid::GridPos;
use tracing::{debug, info};

use crate::config::{MaturationConfig, Normalization};
use crate::entity::{Entity, EntityStore, ProposalState};
use crate::error::Result;
use crate::snapshot::{unit, GlobalStateSnapshot, Phase, NEUTRAL};
use crate::value::{Metadata, Value};

/// Per-analyzer coherence readings feeding the reliability term.
pub type AnalyzerCoherence = BTreeMap<String, f64>;

/// The intermediate terms of one confidence computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub felt_affinity: f64,
    pub phase_modulator: f64,
    pub reliability: f64,
    pub specific_boost: f64,
    pub salience_modulation: f64,
    pub confidence: f64,
}

/// Audit trail attached to every proposition.
#[derive(Debug, Clone, PartialEq)]
pub struct PropositionMetadata {
    pub entity: GridPos,
    pub analyzer_specific_score: f64,
    pub salience_score: f64,
    pub prehension_count: u32,
    pub avg_salience: f64,
    pub cycle_generated: u64,
    /// Entity satisfaction at maturation time
    pub entity_satisfaction: f64,
    pub calibration: Calibration,
    /// Snapshot the proposition matured under
    pub snapshot: GlobalStateSnapshot,
    /// Analyzer metadata carried over from the proposal
    pub extra: Metadata,
}

/// The mature, confidence-scored output of one proposal.
///
/// Only the maturation engine constructs propositions, so nothing immature
/// can reach aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposition {
    position: GridPos,
    analyzer: String,
    proposed_value: Value,
    lure_intensity: f64,
    confidence: f64,
    metadata: PropositionMetadata,
}

impl Proposition {
    pub fn position(&self) -> GridPos {
        self.position
    }

    pub fn analyzer(&self) -> &str {
        &self.analyzer
    }

    pub fn proposed_value(&self) -> &Value {
        &self.proposed_value
    }

    pub fn lure_intensity(&self) -> f64 {
        self.lure_intensity
    }

    /// Calibrated confidence in [0, 1].
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn analyzer_specific_score(&self) -> f64 {
        self.metadata.analyzer_specific_score
    }

    pub fn metadata(&self) -> &PropositionMetadata {
        &self.metadata
    }
}

#[cfg(test)]
impl Proposition {
    /// Hand-built proposition for aggregation tests.
    pub(crate) fn for_test(
        position: GridPos,
        analyzer: &str,
        value: impl Into<Value>,
        confidence: f64,
        lure_intensity: f64,
    ) -> Self {
        let calibration = Calibration {
            felt_affinity: 0.0,
            phase_modulator: 1.0,
            reliability: 1.0,
            specific_boost: 0.0,
            salience_modulation: 1.0,
            confidence,
        };
        Self {
            position,
            analyzer: analyzer.to_string(),
            proposed_value: value.into(),
            lure_intensity,
            confidence,
            metadata: PropositionMetadata {
                entity: position,
                analyzer_specific_score: 0.0,
                salience_score: 0.0,
                prehension_count: 0,
                avg_salience: 0.0,
                cycle_generated: 0,
                entity_satisfaction: 0.0,
                calibration,
                snapshot: GlobalStateSnapshot::default(),
                extra: Metadata::new(),
            },
        }
    }

    pub(crate) fn with_specific_score(mut self, score: f64) -> Self {
        self.metadata.analyzer_specific_score = score;
        self
    }
}

/// Converts immature proposals into propositions.
#[derive(Debug, Clone, Default)]
pub struct MaturationEngine {
    config: MaturationConfig,
    norm: Normalization,
}

impl MaturationEngine {
    /// Create an engine, rejecting bounds or weights that cannot calibrate.
    pub fn new(config: MaturationConfig, norm: Normalization) -> Result<Self> {
        config.validate()?;
        norm.validate()?;
        Ok(Self { config, norm })
    }

    pub fn config(&self) -> &MaturationConfig {
        &self.config
    }

    /// Weighted blend of inverse energy, inverse local field and gradient.
    pub fn felt_affinity(&self, snapshot: &GlobalStateSnapshot, position: GridPos) -> f64 {
        let energy_term = 1.0 - self.norm.energy(snapshot.energy);
        let field_term = snapshot
            .field_at(position)
            .map(|v| 1.0 - self.norm.field(v))
            .unwrap_or(NEUTRAL);
        let gradient_term = unit(snapshot.energy_gradient.abs());

        self.config.energy_weight * energy_term
            + self.config.field_weight * field_term
            + self.config.gradient_weight * gradient_term
    }

    /// Multiplicative factor chosen by the phase of the final snapshot.
    pub fn phase_modulator(&self, snapshot: &GlobalStateSnapshot) -> f64 {
        let satisfaction = unit(snapshot.satisfaction);
        match snapshot.phase {
            Some(Phase::Navigation) => 0.9 + 0.2 * satisfaction,
            Some(Phase::Completion) => 1.0 + 0.3 * (1.0 - self.norm.energy(snapshot.energy)),
            // High satisfaction while still exploring reads as overconfidence.
            Some(Phase::Exploration) | None => 0.8 + 0.4 * (1.0 - satisfaction),
        }
    }

    /// `floor + (1 - floor)·coherence`, in [floor, 1].
    pub fn reliability(&self, coherence: Option<f64>) -> f64 {
        let floor = self.config.reliability_floor;
        floor + (1.0 - floor) * unit(coherence.unwrap_or(NEUTRAL))
    }

    /// Average salience clamped to the configured bounds.
    pub fn salience_modulation(&self, proposal: &ProposalState) -> f64 {
        let (low, high) = self.config.salience_bounds;
        let avg = proposal.avg_salience();
        if avg.is_nan() {
            return low;
        }
        avg.clamp(low, high)
    }

    /// Compute the full calibration for one proposal.
    pub fn calibrate(
        &self,
        proposal: &ProposalState,
        position: GridPos,
        coherence: Option<f64>,
        snapshot: &GlobalStateSnapshot,
    ) -> Calibration {
        let felt_affinity = self.felt_affinity(snapshot, position);
        let phase_modulator = self.phase_modulator(snapshot);
        let reliability = self.reliability(coherence);
        let specific_boost = self.config.specific_boost * unit(proposal.analyzer_specific_score);

        let base = unit(felt_affinity * phase_modulator * reliability + specific_boost);
        let salience_modulation = self.salience_modulation(proposal);
        let confidence = unit(base * salience_modulation);

        Calibration {
            felt_affinity,
            phase_modulator,
            reliability,
            specific_boost,
            salience_modulation,
            confidence,
        }
    }

    /// Mature every immature proposal in the store.
    ///
    /// Already-mature proposals are skipped, so calling this again yields
    /// no new propositions. Output is ordered by position, then analyzer.
    pub fn mature(
        &self,
        store: &mut EntityStore,
        final_snapshot: &GlobalStateSnapshot,
        coherence: &AnalyzerCoherence,
    ) -> Vec<Proposition> {
        #[cfg(feature = "parallel")]
        let propositions: Vec<Proposition> = {
            use rayon::prelude::*;
            store
                .map_mut()
                .par_iter_mut()
                .flat_map_iter(|(_, entity)| self.mature_entity(entity, final_snapshot, coherence))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let propositions: Vec<Proposition> = store
            .entities_mut()
            .flat_map(|entity| self.mature_entity(entity, final_snapshot, coherence))
            .collect();

        info!(
            matured = propositions.len(),
            phase = final_snapshot.phase.map(|p| p.as_str()).unwrap_or("unknown"),
            energy = final_snapshot.energy,
            "Matured proposals"
        );
        propositions
    }

    fn mature_entity(
        &self,
        entity: &mut Entity,
        snapshot: &GlobalStateSnapshot,
        coherence: &AnalyzerCoherence,
    ) -> Vec<Proposition> {
        let position = entity.position;
        let entity_satisfaction = entity.satisfaction();
        let mut out = Vec::new();

        for (analyzer, proposal) in entity.proposals_mut() {
            if !proposal.is_immature() {
                continue;
            }

            let calibration = self.calibrate(
                proposal,
                position,
                coherence.get(analyzer).copied(),
                snapshot,
            );
            proposal.immature = false;

            debug!(
                %position,
                analyzer,
                value = %proposal.proposed_value,
                confidence = calibration.confidence,
                "Proposal matured"
            );

            out.push(Proposition {
                position,
                analyzer: analyzer.to_string(),
                proposed_value: proposal.proposed_value.clone(),
                lure_intensity: proposal.lure_intensity,
                confidence: calibration.confidence,
                metadata: PropositionMetadata {
                    entity: position,
                    analyzer_specific_score: proposal.analyzer_specific_score,
                    salience_score: proposal.salience_score,
                    prehension_count: proposal.prehension_count,
                    avg_salience: proposal.avg_salience(),
                    cycle_generated: proposal.cycle_generated,
                    entity_satisfaction,
                    calibration,
                    snapshot: snapshot.clone(),
                    extra: proposal.metadata.clone(),
                },
            });
        }
        out
    }
}
