//! Cross-analyzer aggregation and conflict resolution.
//!
//! Propositions are indexed by position. A position with two or more
//! propositions carrying different values is a conflict. The aggregator
//! never merges conflicting values; the caller picks a resolution:
//!
//! - **Best**: highest combined score wins.
//! - **Consensus**: at least `k` analyzers must propose the same value.
//! - **Majority**: a strict majority of the analyzers that spoke at the
//!   position must propose the same value.
//!
//! # Combined Score
//!
//! ```text
//! score = confidence · lure_intensity + aux_weight(analyzer) · specific_score
//! ```
//!
//! Equal scores resolve to the lexically smallest analyzer name. No arrival
//! order, no randomness.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use concord_grid::GridPos;

use crate::config::AggregatorConfig;
use crate::maturation::Proposition;
use crate::threshold::majority_threshold;
use crate::value::Value;

/// How to resolve each position to a final value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Take the best-scoring proposition.
    Best,
    /// Require `min_agreement` analyzers on the same value.
    Consensus { min_agreement: usize },
    /// Require a strict majority of the propositions at the position.
    Majority,
}

/// Aggregation summary for monitoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatorStats {
    /// Total propositions
    pub total: usize,
    /// Positions holding propositions with differing values
    pub positions_with_conflicts: usize,
    /// Propositions per analyzer
    pub per_analyzer_counts: BTreeMap<String, usize>,
    /// Mean propositions per position (0 when empty)
    pub avg_per_position: f64,
}

/// Read-only index of mature propositions by position.
#[derive(Debug, Clone, Default)]
pub struct PropositionAggregator {
    config: AggregatorConfig,
    by_position: BTreeMap<GridPos, Vec<Proposition>>,
}

impl PropositionAggregator {
    /// Index the given propositions.
    pub fn new(
        config: AggregatorConfig,
        propositions: impl IntoIterator<Item = Proposition>,
    ) -> Self {
        let mut by_position: BTreeMap<GridPos, Vec<Proposition>> = BTreeMap::new();
        for p in propositions {
            by_position.entry(p.position()).or_default().push(p);
        }
        for props in by_position.values_mut() {
            props.sort_by(|a, b| a.analyzer().cmp(b.analyzer()));
        }
        Self {
            config,
            by_position,
        }
    }

    /// Combined ranking score of a proposition.
    pub fn combined_score(&self, p: &Proposition) -> f64 {
        p.confidence() * p.lure_intensity()
            + self.config.aux_weight(p.analyzer()) * p.analyzer_specific_score()
    }

    /// Ordering where `Greater` means `a` outranks `b`.
    fn rank(&self, a: &Proposition, b: &Proposition) -> Ordering {
        self.combined_score(a)
            .total_cmp(&self.combined_score(b))
            .then_with(|| b.analyzer().cmp(a.analyzer()))
    }

    fn best_of<'a>(&self, props: impl Iterator<Item = &'a Proposition>) -> Option<&'a Proposition> {
        props.max_by(|a, b| self.rank(a, b))
    }

    /// Propositions at a position, in analyzer-name order.
    pub fn get_propositions_for(&self, position: GridPos) -> &[Proposition] {
        self.by_position
            .get(&position)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The highest-scoring proposition at a position.
    pub fn best_for(&self, position: GridPos) -> Option<&Proposition> {
        self.best_of(self.get_propositions_for(position).iter())
    }

    /// The best proposition of the largest value group with at least
    /// `min_agreement` members.
    ///
    /// Equal-size groups resolve to the one whose first member comes first
    /// in analyzer-name order. `min_agreement` of 0 behaves as 1.
    pub fn consensus_for(&self, position: GridPos, min_agreement: usize) -> Option<&Proposition> {
        let needed = min_agreement.max(1);
        let props = self.get_propositions_for(position);

        // Groups in order of first appearance.
        let mut groups: Vec<(&Value, Vec<&Proposition>)> = Vec::new();
        for p in props {
            match groups.iter_mut().find(|(v, _)| *v == p.proposed_value()) {
                Some((_, members)) => members.push(p),
                None => groups.push((p.proposed_value(), vec![p])),
            }
        }

        let mut winner: Option<&Vec<&Proposition>> = None;
        for (_, members) in &groups {
            if members.len() < needed {
                continue;
            }
            if winner.map_or(true, |w| members.len() > w.len()) {
                winner = Some(members);
            }
        }

        winner.and_then(|members| self.best_of(members.iter().copied()))
    }

    /// Consensus with `k` set to a strict majority of the propositions here.
    pub fn majority_for(&self, position: GridPos) -> Option<&Proposition> {
        let participants = self.get_propositions_for(position).len();
        self.consensus_for(position, majority_threshold(participants))
    }

    /// Resolve with the given strategy.
    pub fn resolve_for(&self, position: GridPos, strategy: Resolution) -> Option<&Proposition> {
        match strategy {
            Resolution::Best => self.best_for(position),
            Resolution::Consensus { min_agreement } => self.consensus_for(position, min_agreement),
            Resolution::Majority => self.majority_for(position),
        }
    }

    /// Resolve every position; unresolved positions are omitted.
    pub fn resolve(&self, strategy: Resolution) -> BTreeMap<GridPos, &Proposition> {
        self.by_position
            .keys()
            .filter_map(|pos| self.resolve_for(*pos, strategy).map(|p| (*pos, p)))
            .collect()
    }

    /// Whether propositions at a position disagree on the value.
    pub fn has_conflict(&self, position: GridPos) -> bool {
        let props = self.get_propositions_for(position);
        props
            .first()
            .map_or(false, |first| {
                props.iter().any(|p| p.proposed_value() != first.proposed_value())
            })
    }

    /// All propositions in position order.
    pub fn propositions(&self) -> impl Iterator<Item = &Proposition> {
        self.by_position.values().flatten()
    }

    /// Positions holding at least one proposition.
    pub fn positions(&self) -> impl Iterator<Item = &GridPos> {
        self.by_position.keys()
    }

    /// Total propositions.
    pub fn len(&self) -> usize {
        self.by_position.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_position.is_empty()
    }

    /// Summary counts.
    pub fn statistics(&self) -> AggregatorStats {
        let total = self.len();
        let positions = self.by_position.len();

        let mut per_analyzer_counts = BTreeMap::new();
        for p in self.propositions() {
            *per_analyzer_counts.entry(p.analyzer().to_string()).or_insert(0) += 1;
        }

        AggregatorStats {
            total,
            positions_with_conflicts: self
                .by_position
                .keys()
                .filter(|pos| self.has_conflict(**pos))
                .count(),
            per_analyzer_counts,
            avg_per_position: if positions == 0 {
                0.0
            } else {
                total as f64 / positions as f64
            },
        }
    }
}
