//! Salience accumulation: many weak global signals integrated over cycles.
//!
//! # Signals
//!
//! Each cycle the snapshot is reduced to thirteen scalars in [0, 1]:
//!
//! ```text
//! energy_proximity     1 - norm(energy)
//! gradient_strength    clamp(|gradient|, 0, 1)
//! resonance_peak       max(resonance)
//! resonance_coherence  1 - clamp(4 · var(resonance), 0, 1)
//! field_resonance      cross · safe
//! aim_*                alignment, lure congruence, phase fit
//! satisfaction         snapshot satisfaction
//! phase_progress       exploration 0, navigation 0.5, completion 1
//! window_proximity     band(satisfaction) peaking inside [0.45, 0.70]
//! variance_adequacy    timing gate reading
//! gate_readiness       fraction of passing gates
//! ```
//!
//! Missing readings take the neutral value 0.5. The weighted average of the
//! signals is added to every immature proposal, so salience never decreases.

use tracing::debug;

use crate::config::{Normalization, SalienceConfig, SalienceWeights};
use crate::entity::{Entity, EntityStore};
use crate::error::Result;
use crate::snapshot::{unit, GlobalStateSnapshot, Phase, NEUTRAL};

/// The normalized per-cycle signals derived from one snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalienceSignals {
    pub energy_proximity: f64,
    pub gradient_strength: f64,
    pub resonance_peak: f64,
    pub resonance_coherence: f64,
    pub field_resonance: f64,
    pub aim_alignment: f64,
    pub aim_congruence: f64,
    pub aim_phase_fit: f64,
    pub satisfaction: f64,
    pub phase_progress: f64,
    pub window_proximity: f64,
    pub variance_adequacy: f64,
    pub gate_readiness: f64,
}

impl SalienceSignals {
    /// Derive signals from a snapshot.
    pub fn from_snapshot(
        snapshot: &GlobalStateSnapshot,
        norm: &Normalization,
        window_band: (f64, f64),
    ) -> Self {
        let (resonance_peak, resonance_coherence) = resonance_terms(&snapshot.resonance);
        let satisfaction = unit(snapshot.satisfaction);

        let field_resonance = snapshot
            .coherence_field
            .map(|f| unit(f.cross) * unit(f.safe))
            .unwrap_or(NEUTRAL);

        let (aim_alignment, aim_congruence, aim_phase_fit) = snapshot
            .collective_aim
            .map(|a| (unit(a.alignment), unit(a.lure_congruence), unit(a.phase_fit)))
            .unwrap_or((NEUTRAL, NEUTRAL, NEUTRAL));

        let gates = snapshot.timing_gates;
        let window_proximity = gates
            .and_then(|g| g.window_proximity)
            .map(unit)
            .unwrap_or_else(|| window_band_score(satisfaction, window_band));
        let variance_adequacy = gates.map(|g| unit(g.variance_adequacy)).unwrap_or(NEUTRAL);
        let gate_readiness = gates.map(|g| unit(g.readiness)).unwrap_or(NEUTRAL);

        Self {
            energy_proximity: 1.0 - norm.energy(snapshot.energy),
            gradient_strength: unit(snapshot.energy_gradient.abs()),
            resonance_peak,
            resonance_coherence,
            field_resonance,
            aim_alignment,
            aim_congruence,
            aim_phase_fit,
            satisfaction,
            phase_progress: phase_progress(snapshot.phase),
            window_proximity,
            variance_adequacy,
            gate_readiness,
        }
    }

    /// Signals in the same order as [`SalienceWeights::as_array`].
    pub fn as_array(&self) -> [f64; 13] {
        [
            self.energy_proximity,
            self.gradient_strength,
            self.resonance_peak,
            self.resonance_coherence,
            self.field_resonance,
            self.aim_alignment,
            self.aim_congruence,
            self.aim_phase_fit,
            self.satisfaction,
            self.phase_progress,
            self.window_proximity,
            self.variance_adequacy,
            self.gate_readiness,
        ]
    }

    /// `Σ wᵢ·sᵢ / Σ wᵢ`, in [0, 1]. Zero when every weight is zero.
    pub fn weighted_average(&self, weights: &SalienceWeights) -> f64 {
        let weights = weights.as_array();
        let (sum, total) = self
            .as_array()
            .iter()
            .zip(weights.iter())
            .map(|(s, w)| (*s, w.max(0.0)))
            .fold((0.0, 0.0), |(sum, total), (s, w)| (sum + s * w, total + w));

        if total > 0.0 {
            unit(sum / total)
        } else {
            0.0
        }
    }
}

/// Peak and variance-derived coherence of the resonance family.
fn resonance_terms(values: &[f64]) -> (f64, f64) {
    let values: Vec<f64> = values.iter().filter(|v| !v.is_nan()).map(|v| unit(*v)).collect();
    if values.is_empty() {
        return (NEUTRAL, NEUTRAL);
    }

    let n = values.len() as f64;
    let peak = values.iter().copied().fold(0.0, f64::max);
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    // Values in [0, 1] have variance at most 0.25.
    (peak, 1.0 - unit(4.0 * variance))
}

fn phase_progress(phase: Option<Phase>) -> f64 {
    match phase {
        Some(Phase::Exploration) => 0.0,
        Some(Phase::Navigation) => 0.5,
        Some(Phase::Completion) => 1.0,
        None => NEUTRAL,
    }
}

/// Piecewise window score: 1 inside `[low, high]`, ramping linearly to 0 at
/// satisfaction 0 and 1.
pub fn window_band_score(satisfaction: f64, (low, high): (f64, f64)) -> f64 {
    let s = unit(satisfaction);
    if s < low {
        s / low
    } else if s > high {
        (1.0 - s) / (1.0 - high)
    } else {
        1.0
    }
}

/// Integrates snapshots into proposal salience, one call per cycle.
#[derive(Debug, Clone, Default)]
pub struct SalienceAccumulator {
    config: SalienceConfig,
    norm: Normalization,
}

impl SalienceAccumulator {
    /// Create an accumulator, rejecting weights or bands it cannot apply.
    pub fn new(config: SalienceConfig, norm: Normalization) -> Result<Self> {
        config.validate()?;
        norm.validate()?;
        Ok(Self { config, norm })
    }

    pub fn config(&self) -> &SalienceConfig {
        &self.config
    }

    /// The salience increment a snapshot contributes this cycle.
    pub fn increment(&self, snapshot: &GlobalStateSnapshot) -> f64 {
        SalienceSignals::from_snapshot(snapshot, &self.norm, self.config.window_band)
            .weighted_average(&self.config.weights)
    }

    /// Integrate one cycle into every immature proposal of every entity.
    ///
    /// Precondition: one call per cycle, after all analyzer writes for the
    /// cycle. The accumulator does not detect repeated calls; a second call
    /// in the same cycle double-counts.
    ///
    /// Returns the number of proposals updated.
    pub fn accumulate(&self, store: &mut EntityStore, snapshot: &GlobalStateSnapshot) -> usize {
        let increment = self.increment(snapshot);
        let retention = self.config.vitality_decay;

        #[cfg(feature = "parallel")]
        let updated: usize = {
            use rayon::prelude::*;
            store
                .map_mut()
                .par_iter_mut()
                .map(|(_, entity)| integrate_entity(entity, increment, retention))
                .sum()
        };

        #[cfg(not(feature = "parallel"))]
        let updated: usize = store
            .entities_mut()
            .map(|entity| integrate_entity(entity, increment, retention))
            .sum();

        debug!(increment, updated, "Accumulated salience");
        updated
    }
}

fn integrate_entity(entity: &mut Entity, increment: f64, retention: f64) -> usize {
    entity.decay(retention);
    let mut updated = 0;
    for (_, proposal) in entity.proposals_mut() {
        if proposal.is_immature() {
            proposal.integrate(increment);
            updated += 1;
        }
    }
    updated
}
