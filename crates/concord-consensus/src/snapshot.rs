//! Global-state snapshots supplied by the external driver.
//!
//! A snapshot is an immutable reading of the whole process at one cycle. It
//! is passed explicitly to the accumulator and the maturation engine; there
//! is no shared mutable process state.
//!
//! Every optional reading has a neutral fallback of [`NEUTRAL`]. A driver
//! that cannot supply a field leaves it out rather than guessing.

use std::collections::BTreeMap;

use concord_grid::GridPos;

/// Fallback for any missing or unusable reading.
pub const NEUTRAL: f64 = 0.5;

/// Phase of the overall search process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Phase {
    /// Open-ended search, far from any ground state
    Exploration,
    /// Moving toward a ground state
    Navigation,
    /// Converged (or claiming to be)
    Completion,
}

impl Phase {
    /// Parse a phase label, case-insensitively.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "exploration" => Some(Phase::Exploration),
            "navigation" => Some(Phase::Navigation),
            "completion" => Some(Phase::Completion),
            _ => None,
        }
    }

    /// Label used in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Phase::Exploration => "exploration",
            Phase::Navigation => "navigation",
            Phase::Completion => "completion",
        }
    }
}

/// Coherence-field readings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoherenceField {
    /// Cross-pattern coherence
    pub cross: f64,
    /// Safe-region coherence
    pub safe: f64,
}

/// Collective-aim readings. Absent when no aim is active.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollectiveAim {
    pub alignment: f64,
    pub lure_congruence: f64,
    pub phase_fit: f64,
}

/// Timing-gate readings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimingGates {
    /// Direct window reading; when absent it is derived from satisfaction
    pub window_proximity: Option<f64>,
    /// Whether variance is high enough to act on
    pub variance_adequacy: f64,
    /// Fraction of gates currently passing
    pub readiness: f64,
}

/// One reading of the global process state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GlobalStateSnapshot {
    /// Convergence energy (lower is closer to a ground state)
    pub energy: f64,
    /// Change in energy since the previous cycle
    pub energy_gradient: f64,
    /// Current phase, if the driver reports one
    pub phase: Option<Phase>,
    /// Process satisfaction in [0, 1]
    pub satisfaction: f64,
    /// Pattern-family resonance values
    pub resonance: Vec<f64>,
    pub coherence_field: Option<CoherenceField>,
    pub collective_aim: Option<CollectiveAim>,
    pub timing_gates: Option<TimingGates>,
    /// Position-specific field values (energy-like, lower is better)
    pub local_field: BTreeMap<GridPos, f64>,
}

impl Default for GlobalStateSnapshot {
    fn default() -> Self {
        Self {
            energy: 0.0,
            energy_gradient: 0.0,
            phase: None,
            satisfaction: NEUTRAL,
            resonance: Vec::new(),
            coherence_field: None,
            collective_aim: None,
            timing_gates: None,
            local_field: BTreeMap::new(),
        }
    }
}

impl GlobalStateSnapshot {
    /// Snapshot with the given energy and phase, everything else neutral.
    pub fn new(energy: f64, phase: Phase) -> Self {
        Self {
            energy,
            phase: Some(phase),
            ..Self::default()
        }
    }

    /// A converged snapshot: completion phase at the given energy.
    pub fn converged(energy: f64) -> Self {
        Self::new(energy, Phase::Completion)
    }

    pub fn with_gradient(mut self, gradient: f64) -> Self {
        self.energy_gradient = gradient;
        self
    }

    pub fn with_satisfaction(mut self, satisfaction: f64) -> Self {
        self.satisfaction = satisfaction;
        self
    }

    pub fn with_resonance(mut self, resonance: Vec<f64>) -> Self {
        self.resonance = resonance;
        self
    }

    pub fn with_coherence_field(mut self, cross: f64, safe: f64) -> Self {
        self.coherence_field = Some(CoherenceField { cross, safe });
        self
    }

    pub fn with_aim(mut self, alignment: f64, lure_congruence: f64, phase_fit: f64) -> Self {
        self.collective_aim = Some(CollectiveAim {
            alignment,
            lure_congruence,
            phase_fit,
        });
        self
    }

    pub fn with_timing_gates(mut self, gates: TimingGates) -> Self {
        self.timing_gates = Some(gates);
        self
    }

    /// Set the field value at one position.
    pub fn with_local_field(mut self, pos: GridPos, value: f64) -> Self {
        self.local_field.insert(pos, value);
        self
    }

    /// Field value at `pos`, if the driver supplied one.
    pub fn field_at(&self, pos: GridPos) -> Option<f64> {
        self.local_field.get(&pos).copied().filter(|v| v.is_finite())
    }

    /// Whether this snapshot reports a completed process.
    pub fn is_completion(&self) -> bool {
        self.phase == Some(Phase::Completion)
    }
}

/// Clamp to [0, 1], substituting `fallback` for NaN.
pub(crate) fn unit_or(x: f64, fallback: f64) -> f64 {
    if x.is_nan() {
        fallback
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Clamp to [0, 1], substituting [`NEUTRAL`] for NaN.
pub(crate) fn unit(x: f64) -> f64 {
    unit_or(x, NEUTRAL)
}
