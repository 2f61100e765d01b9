//! Entities and the per-analyzer proposal slots they own.
//!
//! # Slots
//!
//! Each entity holds at most one [`ProposalState`] per analyzer. Registering
//! again from the same analyzer replaces the slot (last write wins) and
//! restarts its evidence. An analyzer that wants several hypotheses must
//! model them as separate entities or inside its value.
//!
//! # Lifecycle
//!
//! Entities are created lazily on first proposal, or seeded by the driver at
//! episode start. They are never removed mid-episode.

use std::collections::BTreeMap;

use concord_grid::GridPos;
use tracing::warn;

use crate::snapshot::unit_or;
use crate::value::{Metadata, MetaValue, Value};

/// What an analyzer submits for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub value: Value,
    /// Attraction to this proposal, independent of correctness
    pub lure_intensity: f64,
    /// Analyzer-defined auxiliary confidence
    pub analyzer_specific_score: f64,
    pub metadata: Metadata,
}

impl Proposal {
    /// A proposal with full lure and a neutral specific score.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            lure_intensity: 1.0,
            analyzer_specific_score: 0.5,
            metadata: Metadata::new(),
        }
    }

    pub fn lure(mut self, lure_intensity: f64) -> Self {
        self.lure_intensity = lure_intensity;
        self
    }

    pub fn score(mut self, analyzer_specific_score: f64) -> Self {
        self.analyzer_specific_score = analyzer_specific_score;
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One analyzer's accumulating proposal on one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalState {
    pub proposed_value: Value,
    pub lure_intensity: f64,
    pub analyzer_specific_score: f64,
    /// Accumulated evidence; non-decreasing while immature
    pub salience_score: f64,
    /// Cycles of evidence integrated so far
    pub prehension_count: u32,
    pub cycle_generated: u64,
    pub metadata: Metadata,
    pub(crate) immature: bool,
}

impl ProposalState {
    /// Whether maturation has not yet processed this proposal.
    pub fn is_immature(&self) -> bool {
        self.immature
    }

    /// Mean salience per integrated cycle.
    pub fn avg_salience(&self) -> f64 {
        self.salience_score / f64::from(self.prehension_count.max(1))
    }

    /// Integrate one cycle of evidence. No-op once mature.
    ///
    /// Precondition: called at most once per cycle. Calling twice for the
    /// same cycle double-counts.
    pub(crate) fn integrate(&mut self, increment: f64) {
        if !self.immature {
            return;
        }
        self.salience_score += increment.max(0.0);
        self.prehension_count += 1;
    }
}

/// A grid cell with the proposals analyzers attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub position: GridPos,
    /// Value supplied by the driver at episode start, if any
    pub initial_value: Option<Value>,
    proposals: BTreeMap<String, ProposalState>,
    agreement_score: f64,
    vitality: f64,
}

impl Entity {
    /// Create an empty entity.
    pub fn new(position: GridPos) -> Self {
        Self {
            position,
            initial_value: None,
            proposals: BTreeMap::new(),
            agreement_score: 0.0,
            vitality: 1.0,
        }
    }

    /// Create an entity carrying its initial symbolic value.
    pub fn seeded(position: GridPos, initial_value: Value) -> Self {
        Self {
            initial_value: Some(initial_value),
            ..Self::new(position)
        }
    }

    /// Create or overwrite `analyzer`'s slot.
    ///
    /// Out-of-range scores are clamped to [0, 1] (NaN becomes 0) and logged;
    /// a misbehaving analyzer never aborts the episode.
    pub fn register_proposal(
        &mut self,
        analyzer: &str,
        proposed_value: Value,
        lure_intensity: f64,
        analyzer_specific_score: f64,
        cycle: u64,
    ) -> &ProposalState {
        self.register(
            analyzer,
            Proposal {
                value: proposed_value,
                lure_intensity,
                analyzer_specific_score,
                metadata: Metadata::new(),
            },
            cycle,
        )
    }

    /// Like [`register_proposal`](Self::register_proposal), carrying metadata.
    pub fn register(&mut self, analyzer: &str, proposal: Proposal, cycle: u64) -> &ProposalState {
        let lure_intensity = self.sanitize(analyzer, "lure_intensity", proposal.lure_intensity);
        let analyzer_specific_score = self.sanitize(
            analyzer,
            "analyzer_specific_score",
            proposal.analyzer_specific_score,
        );

        let state = ProposalState {
            proposed_value: proposal.value,
            lure_intensity,
            analyzer_specific_score,
            salience_score: 0.0,
            prehension_count: 0,
            cycle_generated: cycle,
            metadata: proposal.metadata,
            immature: true,
        };

        self.proposals.insert(analyzer.to_string(), state);
        self.agreement_score = Self::mean_pairwise_agreement(&self.proposals);
        self.vitality = 1.0;

        &self.proposals[analyzer]
    }

    fn sanitize(&self, analyzer: &str, field: &'static str, raw: f64) -> f64 {
        let clamped = unit_or(raw, 0.0);
        if clamped != raw {
            warn!(
                analyzer,
                field,
                raw,
                clamped,
                position = %self.position,
                "Clamped malformed proposal score"
            );
        }
        clamped
    }

    /// Mean agreement over all analyzer pairs: 1 for equal values, 0 otherwise.
    /// Zero with fewer than two proposals.
    fn mean_pairwise_agreement(proposals: &BTreeMap<String, ProposalState>) -> f64 {
        let values: Vec<&Value> = proposals.values().map(|p| &p.proposed_value).collect();
        if values.len() < 2 {
            return 0.0;
        }

        let mut pairs = 0usize;
        let mut agreeing = 0usize;
        for (i, a) in values.iter().enumerate() {
            for b in &values[i + 1..] {
                pairs += 1;
                if a == b {
                    agreeing += 1;
                }
            }
        }
        agreeing as f64 / pairs as f64
    }

    /// Apply one cycle of vitality decay.
    pub(crate) fn decay(&mut self, retention: f64) {
        self.vitality *= retention;
    }

    /// Get an analyzer's slot.
    pub fn proposal(&self, analyzer: &str) -> Option<&ProposalState> {
        self.proposals.get(analyzer)
    }

    /// All slots in analyzer-name order.
    pub fn proposals(&self) -> impl Iterator<Item = (&str, &ProposalState)> {
        self.proposals.iter().map(|(name, p)| (name.as_str(), p))
    }

    pub(crate) fn proposals_mut(&mut self) -> impl Iterator<Item = (&str, &mut ProposalState)> {
        self.proposals.iter_mut().map(|(name, p)| (name.as_str(), p))
    }

    /// Number of analyzers with a slot here.
    pub fn proposal_count(&self) -> usize {
        self.proposals.len()
    }

    /// Number of slots still awaiting maturation.
    pub fn immature_count(&self) -> usize {
        self.proposals.values().filter(|p| p.immature).count()
    }

    pub fn agreement_score(&self) -> f64 {
        self.agreement_score
    }

    pub fn vitality(&self) -> f64 {
        self.vitality
    }

    /// Agreement scaled by vitality.
    pub fn satisfaction(&self) -> f64 {
        self.agreement_score * self.vitality
    }
}

/// All entities of one episode, keyed by position.
#[derive(Debug, Default, Clone)]
pub struct EntityStore {
    entities: BTreeMap<GridPos, Entity>,
}

impl EntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
        }
    }

    /// Insert an entity with its initial value, replacing any existing one.
    pub fn seed(&mut self, position: GridPos, initial_value: Value) {
        self.entities
            .insert(position, Entity::seeded(position, initial_value));
    }

    /// Get an entity.
    pub fn get(&self, position: &GridPos) -> Option<&Entity> {
        self.entities.get(position)
    }

    /// Get or lazily create an entity.
    pub fn entry(&mut self, position: GridPos) -> &mut Entity {
        self.entities
            .entry(position)
            .or_insert_with(|| Entity::new(position))
    }

    /// Register a proposal, creating the entity if needed.
    pub fn register_proposal(
        &mut self,
        position: GridPos,
        analyzer: &str,
        proposal: Proposal,
        cycle: u64,
    ) -> &ProposalState {
        self.entry(position).register(analyzer, proposal, cycle)
    }

    /// All entities in position order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub(crate) fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    #[cfg(feature = "parallel")]
    pub(crate) fn map_mut(&mut self) -> &mut BTreeMap<GridPos, Entity> {
        &mut self.entities
    }

    /// All positions in order.
    pub fn positions(&self) -> impl Iterator<Item = &GridPos> {
        self.entities.keys()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Total proposals across all entities.
    pub fn proposal_count(&self) -> usize {
        self.entities.values().map(Entity::proposal_count).sum()
    }

    /// Total proposals still awaiting maturation.
    pub fn immature_count(&self) -> usize {
        self.entities.values().map(Entity::immature_count).sum()
    }

    /// Drop every entity.
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> GridPos {
        GridPos::new(0, 0)
    }

    #[test]
    fn register_starts_immature_and_empty() {
        let mut entity = Entity::new(pos());
        let state = entity.register_proposal("mirror", Value::Int(4), 0.8, 0.6, 3);
        assert!(state.is_immature());
        assert_eq!(state.salience_score, 0.0);
        assert_eq!(state.prehension_count, 0);
        assert_eq!(state.cycle_generated, 3);
    }

    #[test]
    fn same_analyzer_overwrites_slot() {
        let mut entity = Entity::new(pos());
        entity.register_proposal("mirror", Value::Int(4), 0.8, 0.6, 1);
        entity
            .proposals
            .get_mut("mirror")
            .unwrap()
            .integrate(0.7);

        let state = entity.register_proposal("mirror", Value::Int(9), 0.3, 0.2, 1);
        assert_eq!(state.proposed_value, Value::Int(9));
        assert_eq!(state.salience_score, 0.0);
        assert_eq!(entity.proposal_count(), 1);
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let mut entity = Entity::new(pos());
        let state = entity.register_proposal("noisy", Value::Int(1), 3.5, -0.4, 0);
        assert_eq!(state.lure_intensity, 1.0);
        assert_eq!(state.analyzer_specific_score, 0.0);

        let state = entity.register_proposal("noisy", Value::Int(1), f64::NAN, 0.5, 0);
        assert_eq!(state.lure_intensity, 0.0);
    }

    #[test]
    fn agreement_needs_two_sources() {
        let mut entity = Entity::new(pos());
        assert_eq!(entity.agreement_score(), 0.0);

        entity.register_proposal("a", Value::Int(5), 1.0, 0.5, 0);
        assert_eq!(entity.agreement_score(), 0.0);

        entity.register_proposal("b", Value::Int(5), 1.0, 0.5, 0);
        assert_eq!(entity.agreement_score(), 1.0);

        // pairs: a-b agree, a-c and b-c disagree
        entity.register_proposal("c", Value::Int(3), 1.0, 0.5, 0);
        assert!((entity.agreement_score() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn satisfaction_decays_until_next_registration() {
        let mut entity = Entity::new(pos());
        entity.register_proposal("a", Value::Int(5), 1.0, 0.5, 0);
        entity.register_proposal("b", Value::Int(5), 1.0, 0.5, 0);
        assert_eq!(entity.satisfaction(), 1.0);

        entity.decay(0.5);
        entity.decay(0.5);
        assert_eq!(entity.satisfaction(), 0.25);

        entity.register_proposal("c", Value::Int(5), 1.0, 0.5, 1);
        assert_eq!(entity.vitality(), 1.0);
        assert_eq!(entity.satisfaction(), 1.0);
    }

    #[test]
    fn integrate_skips_mature_proposals() {
        let mut entity = Entity::new(pos());
        entity.register_proposal("a", Value::Int(5), 1.0, 0.5, 0);
        let slot = entity.proposals.get_mut("a").unwrap();
        slot.integrate(0.4);
        slot.immature = false;
        slot.integrate(0.4);
        assert_eq!(slot.salience_score, 0.4);
        assert_eq!(slot.prehension_count, 1);
    }

    #[test]
    fn avg_salience_guards_zero_prehension() {
        let mut entity = Entity::new(pos());
        let state = entity.register_proposal("a", Value::Int(5), 1.0, 0.5, 0);
        assert_eq!(state.avg_salience(), 0.0);
    }

    #[test]
    fn store_creates_entities_lazily() {
        let mut store = EntityStore::new();
        assert!(store.is_empty());

        store.register_proposal(GridPos::new(2, 2), "a", Proposal::new(1), 0);
        store.register_proposal(GridPos::new(2, 2), "b", Proposal::new(1), 0);
        store.register_proposal(GridPos::new(0, 1), "a", Proposal::new(7), 0);

        assert_eq!(store.len(), 2);
        assert_eq!(store.proposal_count(), 3);
        assert_eq!(store.immature_count(), 3);
        let positions: Vec<_> = store.positions().copied().collect();
        assert_eq!(positions, vec![GridPos::new(0, 1), GridPos::new(2, 2)]);
    }

    #[test]
    fn seeded_entity_keeps_initial_value() {
        let mut store = EntityStore::new();
        store.seed(GridPos::ORIGIN, Value::Int(0));
        store.register_proposal(GridPos::ORIGIN, "a", Proposal::new(3), 0);

        let entity = store.get(&GridPos::ORIGIN).unwrap();
        assert_eq!(entity.initial_value, Some(Value::Int(0)));
        assert_eq!(entity.proposal_count(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn proposal_builder_carries_metadata() {
        let mut store = EntityStore::new();
        let proposal = Proposal::new("red")
            .lure(0.4)
            .score(0.9)
            .with_meta("rule", "recolor");
        let state = store.register_proposal(GridPos::ORIGIN, "color", proposal, 2);
        assert_eq!(state.lure_intensity, 0.4);
        assert_eq!(state.analyzer_specific_score, 0.9);
        assert_eq!(
            state.metadata.get("rule"),
            Some(&MetaValue::Text("recolor".into()))
        );
    }
}
