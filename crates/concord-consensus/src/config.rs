//! Configuration for accumulation, maturation and aggregation.
//!
//! Every constant of the calibration lives here with its default. Callers
//! override fields directly or deserialize a config (feature `serde`).

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::snapshot::unit;

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConsensusConfig {
    pub normalization: Normalization,
    pub salience: SalienceConfig,
    pub maturation: MaturationConfig,
    pub aggregator: AggregatorConfig,
}

impl ConsensusConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.normalization.validate()?;
        self.salience.validate()?;
        self.maturation.validate()?;
        self.aggregator.validate()
    }
}

/// Scales used to map raw readings into [0, 1].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Normalization {
    /// Energy at or above this maps to 1.0
    pub energy_scale: f64,
    /// Local field value at or above this maps to 1.0
    pub field_scale: f64,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            energy_scale: 10.0,
            field_scale: 1.0,
        }
    }
}

impl Normalization {
    /// `clamp(energy / energy_scale, 0, 1)`.
    pub fn energy(&self, energy: f64) -> f64 {
        unit(energy / self.energy_scale)
    }

    /// `clamp(value / field_scale, 0, 1)`.
    pub fn field(&self, value: f64) -> f64 {
        unit(value / self.field_scale)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.energy_scale.is_finite() && self.energy_scale > 0.0) {
            return Err(Error::InvalidConfig("energy_scale must be > 0".into()));
        }
        if !(self.field_scale.is_finite() && self.field_scale > 0.0) {
            return Err(Error::InvalidConfig("field_scale must be > 0".into()));
        }
        Ok(())
    }
}

/// Weight of each salience signal in the per-cycle weighted average.
///
/// Navigation and resonance terms weigh most, coherence and aim terms sit in
/// the middle, timing terms weigh least.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SalienceWeights {
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

impl Default for SalienceWeights {
    fn default() -> Self {
        Self {
            energy_proximity: 1.5,
            gradient_strength: 1.0,
            resonance_peak: 1.2,
            resonance_coherence: 1.0,
            field_resonance: 0.9,
            aim_alignment: 0.8,
            aim_congruence: 0.8,
            aim_phase_fit: 0.7,
            satisfaction: 0.7,
            phase_progress: 1.0,
            window_proximity: 0.6,
            variance_adequacy: 0.5,
            gate_readiness: 0.4,
        }
    }
}

impl SalienceWeights {
    /// Weights in signal order.
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

    pub fn validate(&self) -> Result<()> {
        if self.as_array().iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(Error::InvalidConfig(
                "salience weights must be finite and >= 0".into(),
            ));
        }
        Ok(())
    }
}

/// Salience accumulation settings.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SalienceConfig {
    pub weights: SalienceWeights,
    /// Satisfaction band in which the timing window peaks
    pub window_band: (f64, f64),
    /// Entity vitality retention per cycle (1.0 = no decay)
    pub vitality_decay: f64,
}

impl Default for SalienceConfig {
    fn default() -> Self {
        Self {
            weights: SalienceWeights::default(),
            window_band: (0.45, 0.70),
            vitality_decay: 0.95,
        }
    }
}

impl SalienceConfig {
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        let (low, high) = self.window_band;
        if !(0.0 < low && low <= high && high < 1.0) {
            return Err(Error::InvalidConfig(
                "window_band must satisfy 0 < low <= high < 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.vitality_decay) {
            return Err(Error::InvalidConfig("vitality_decay must be in [0, 1]".into()));
        }
        Ok(())
    }
}

/// Confidence calibration settings.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MaturationConfig {
    /// Felt-affinity weight of inverse-normalized energy
    pub energy_weight: f64,
    /// Felt-affinity weight of inverse-normalized local field
    pub field_weight: f64,
    /// Felt-affinity weight of gradient magnitude
    pub gradient_weight: f64,
    /// Floor of the reliability term; the ceiling is always 1.0
    pub reliability_floor: f64,
    /// Scale of the additive analyzer-specific boost
    pub specific_boost: f64,
    /// Bounds applied to average salience before it scales confidence
    pub salience_bounds: (f64, f64),
}

impl Default for MaturationConfig {
    fn default() -> Self {
        Self {
            energy_weight: 0.4,
            field_weight: 0.4,
            gradient_weight: 0.2,
            reliability_floor: 0.7,
            specific_boost: 0.2,
            salience_bounds: (0.5, 1.5),
        }
    }
}

impl MaturationConfig {
    pub fn validate(&self) -> Result<()> {
        let weights = [self.energy_weight, self.field_weight, self.gradient_weight];
        if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(Error::InvalidConfig(
                "felt-affinity weights must be finite and >= 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.reliability_floor) {
            return Err(Error::InvalidConfig("reliability_floor must be in [0, 1]".into()));
        }
        if !(self.specific_boost.is_finite() && self.specific_boost >= 0.0) {
            return Err(Error::InvalidConfig("specific_boost must be >= 0".into()));
        }
        let (low, high) = self.salience_bounds;
        if !(low.is_finite() && high.is_finite() && 0.0 <= low && low <= high) {
            return Err(Error::InvalidConfig(
                "salience_bounds must satisfy 0 <= low <= high".into(),
            ));
        }
        Ok(())
    }
}

/// Aggregation settings.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AggregatorConfig {
    /// Per-analyzer weight of the analyzer-specific score in the combined
    /// score. Analyzers not listed get no boost.
    pub aux_weights: BTreeMap<String, f64>,
}

impl AggregatorConfig {
    /// Weight for `analyzer`, 0.0 if unlisted.
    pub fn aux_weight(&self, analyzer: &str) -> f64 {
        self.aux_weights.get(analyzer).copied().unwrap_or(0.0)
    }

    pub fn with_aux_weight(mut self, analyzer: impl Into<String>, weight: f64) -> Self {
        self.aux_weights.insert(analyzer.into(), weight);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((name, _)) = self
            .aux_weights
            .iter()
            .find(|(_, w)| !(w.is_finite() && **w >= 0.0))
        {
            return Err(Error::InvalidConfig(format!(
                "aux weight for {} must be finite and >= 0",
                name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ConsensusConfig::default().validate().is_ok());
    }

    #[test]
    fn weight_tiers() {
        let w = SalienceWeights::default();
        // navigation/resonance >= coherence/aim >= timing
        for nav in [w.energy_proximity, w.resonance_peak, w.gradient_strength] {
            for aim in [w.field_resonance, w.aim_alignment, w.aim_phase_fit] {
                assert!(nav >= aim);
            }
        }
        for aim in [w.field_resonance, w.aim_alignment, w.aim_phase_fit] {
            for timing in [w.window_proximity, w.variance_adequacy, w.gate_readiness] {
                assert!(aim >= timing);
            }
        }
    }

    #[test]
    fn rejects_negative_weight() {
        let mut config = ConsensusConfig::default();
        config.salience.weights.gradient_strength = -1.0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let mut config = ConsensusConfig::default();
        config.maturation.salience_bounds = (1.5, 0.5);
        assert!(config.validate().is_err());

        let mut config = ConsensusConfig::default();
        config.salience.window_band = (0.8, 0.2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_energy_scale() {
        let mut config = ConsensusConfig::default();
        config.normalization.energy_scale = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn energy_normalization() {
        let norm = Normalization::default();
        assert_eq!(norm.energy(0.0), 0.0);
        assert_eq!(norm.energy(5.0), 0.5);
        assert_eq!(norm.energy(50.0), 1.0);
        assert_eq!(norm.energy(-2.0), 0.0);
    }

    #[test]
    fn aux_weight_lookup() {
        let config = AggregatorConfig::default().with_aux_weight("symmetry", 0.3);
        assert_eq!(config.aux_weight("symmetry"), 0.3);
        assert_eq!(config.aux_weight("unknown"), 0.0);
        assert!(config.validate().is_ok());
        assert!(AggregatorConfig::default()
            .with_aux_weight("bad", f64::NAN)
            .validate()
            .is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_overrides_defaults() {
        let json = r#"{ "salience": { "weights": { "gate_readiness": 0.0 } } }"#;
        let config: ConsensusConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.salience.weights.gate_readiness, 0.0);
        assert_eq!(config.salience.weights.energy_proximity, 1.5);
        assert_eq!(config.maturation, MaturationConfig::default());
    }
}
