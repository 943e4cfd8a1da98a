//! Resolution strategies: selection and execution.
//!
//! `StrategyPicker` chooses exactly one strategy per request using a fixed
//! precedence; `execute` runs the handler for that variant. Each handler
//! returns an ordering that is a permutation of its candidates.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::StrategyThresholds;
use crate::conflict::{involved_roles, Conflict, ConflictKind};
use crate::consensus::aggregate;
use crate::negotiation::{NegotiationEngine, Stances};
use crate::role::RoleId;
use crate::weigher::Weights;

/// How a resolution was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// A role vetoed the command.
    VetoOverride,
    /// The leading role outranks the others by `gap` base-priority points.
    PriorityBased {
        /// Base-priority lead of the top conflicting role.
        gap: u8,
    },
    /// Conflicting roles negotiated toward a compromise.
    Negotiation {
        /// Configured round cap.
        rounds: u32,
    },
    /// Roles contending for a resource take turns in this order.
    SequentialAccess {
        /// Access order, highest weight first.
        order: Vec<RoleId>,
    },
    /// Cumulative-weight majority.
    WeightedConsensus {
        /// Share the majority bloc must reach.
        threshold: f64,
    },
}

impl ResolutionStrategy {
    /// Returns a short stable identifier used on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::VetoOverride => "veto_override",
            Self::PriorityBased { .. } => "priority_based",
            Self::Negotiation { .. } => "negotiation",
            Self::SequentialAccess { .. } => "sequential_access",
            Self::WeightedConsensus { .. } => "weighted_consensus",
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VetoOverride => write!(f, "veto_override"),
            Self::PriorityBased { gap } => write!(f, "priority_based(gap={gap})"),
            Self::Negotiation { rounds } => write!(f, "negotiation(rounds={rounds})"),
            Self::SequentialAccess { order } => {
                let order: Vec<&str> = order.iter().map(RoleId::as_str).collect();
                write!(f, "sequential_access({})", order.join(" > "))
            }
            Self::WeightedConsensus { threshold } => {
                write!(f, "weighted_consensus(threshold={threshold:.2})")
            }
        }
    }
}

/// A requested role with its priority and situational weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Role id.
    pub id: RoleId,
    /// Base priority (0 for unknown roles).
    pub base_priority: u8,
    /// Weighted priority.
    pub weight: f64,
}

impl Candidate {
    /// Creates a candidate.
    #[must_use]
    pub fn new(id: impl Into<RoleId>, base_priority: u8, weight: f64) -> Self {
        Self {
            id: id.into(),
            base_priority,
            weight,
        }
    }
}

// Higher score first, then higher base priority, then role id.
fn by_score(a: (&RoleId, u8, f64), b: (&RoleId, u8, f64)) -> Ordering {
    b.2.total_cmp(&a.2)
        .then_with(|| b.1.cmp(&a.1))
        .then_with(|| a.0.cmp(b.0))
}

/// Orders candidates by descending weight.
#[must_use]
pub fn rank_by_weight(candidates: &[Candidate]) -> Vec<RoleId> {
    let mut sorted: Vec<&Candidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| {
        by_score(
            (&a.id, a.base_priority, a.weight),
            (&b.id, b.base_priority, b.weight),
        )
    });
    sorted.into_iter().map(|c| c.id.clone()).collect()
}

/// Base-priority lead of the top conflicting role over the runner-up.
#[must_use]
pub fn lead_gap(candidates: &[Candidate], conflicts: &[Conflict]) -> u8 {
    let mut priorities: Vec<u8> = involved_roles(conflicts)
        .iter()
        .filter_map(|id| candidates.iter().find(|c| c.id == *id))
        .map(|c| c.base_priority)
        .collect();
    priorities.sort_unstable_by(|a, b| b.cmp(a));
    match priorities.as_slice() {
        [top, second, ..] => top.saturating_sub(*second),
        _ => 0,
    }
}

fn weight_spread(candidates: &[Candidate], conflicts: &[Conflict]) -> f64 {
    let weights: Vec<f64> = involved_roles(conflicts)
        .iter()
        .filter_map(|id| candidates.iter().find(|c| c.id == *id))
        .map(|c| c.weight)
        .collect();
    let max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = weights.iter().copied().fold(f64::INFINITY, f64::min);
    if weights.is_empty() {
        0.0
    } else {
        max - min
    }
}

/// Chooses one strategy per request.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyPicker {
    priority_gap: u8,
    negotiation_rounds: u32,
    consensus_threshold: f64,
}

impl StrategyPicker {
    /// Builds a picker from validated thresholds.
    #[must_use]
    pub fn from_thresholds(thresholds: &StrategyThresholds) -> Self {
        Self {
            priority_gap: thresholds.priority_gap,
            negotiation_rounds: thresholds.negotiation_rounds,
            consensus_threshold: thresholds.consensus_threshold,
        }
    }

    /// Picks a strategy. Never returns `VetoOverride`; vetoes are decided
    /// before strategy selection.
    ///
    /// Precedence, first match wins:
    /// 1. any resource conflict: `SequentialAccess`
    /// 2. the top conflicting role leads by at least the gap: `PriorityBased`.
    ///    The lead is the top role's base priority minus the runner-up's among
    ///    all roles in conflict, not the widest gap of any single conflicting
    ///    pair: the leader must outrank every other conflicting role by the
    ///    gap (see [`lead_gap`]).
    /// 3. conflicting weights lie within a band narrower than the gap: `Negotiation`
    /// 4. otherwise: `WeightedConsensus`
    ///
    /// Without conflicts the result is `PriorityBased { gap: 0 }`.
    #[must_use]
    pub fn pick(&self, candidates: &[Candidate], conflicts: &[Conflict]) -> ResolutionStrategy {
        if conflicts.is_empty() {
            return ResolutionStrategy::PriorityBased { gap: 0 };
        }

        if conflicts.iter().any(|c| c.kind == ConflictKind::Resource) {
            return ResolutionStrategy::SequentialAccess {
                order: rank_by_weight(candidates),
            };
        }

        let gap = lead_gap(candidates, conflicts);
        if gap >= self.priority_gap {
            return ResolutionStrategy::PriorityBased { gap };
        }

        if weight_spread(candidates, conflicts) < f64::from(self.priority_gap) {
            return ResolutionStrategy::Negotiation {
                rounds: self.negotiation_rounds,
            };
        }

        ResolutionStrategy::WeightedConsensus {
            threshold: self.consensus_threshold,
        }
    }
}

/// Ordering produced by a strategy handler.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    /// The strategy that produced the ordering. Differs from the picked one
    /// only when negotiation escalates to `PriorityBased`.
    pub strategy: ResolutionStrategy,
    /// Ordered role ids.
    pub ordered: Vec<RoleId>,
    /// Final score per role.
    pub scores: Weights,
    /// Trail entries describing what the handler did.
    pub notes: Vec<String>,
}

fn weights_of(candidates: &[Candidate]) -> Weights {
    candidates.iter().map(|c| (c.id.clone(), c.weight)).collect()
}

/// Runs the handler for `strategy`.
#[must_use]
pub fn execute(
    strategy: ResolutionStrategy,
    candidates: &[Candidate],
    conflicts: &[Conflict],
    negotiation: &NegotiationEngine,
) -> StrategyOutcome {
    match strategy {
        ResolutionStrategy::VetoOverride => StrategyOutcome {
            strategy,
            ordered: Vec::new(),
            scores: Weights::new(),
            notes: vec!["command blocked; no guidance is ordered".to_string()],
        },
        ResolutionStrategy::PriorityBased { gap } => StrategyOutcome {
            notes: vec![format!("priority ordering with lead gap {gap}")],
            strategy,
            ordered: rank_by_weight(candidates),
            scores: weights_of(candidates),
        },
        ResolutionStrategy::SequentialAccess { order } => StrategyOutcome {
            notes: vec![format!("sequential access: {}", join(&order))],
            ordered: order.clone(),
            scores: weights_of(candidates),
            strategy: ResolutionStrategy::SequentialAccess { order },
        },
        ResolutionStrategy::Negotiation { .. } => negotiate(strategy, candidates, conflicts, negotiation),
        ResolutionStrategy::WeightedConsensus { threshold } => {
            let ids: Vec<RoleId> = candidates.iter().map(|c| c.id.clone()).collect();
            let scores = weights_of(candidates);
            let tally = aggregate(&ids, &scores, threshold);
            let note = if tally.reached {
                format!(
                    "consensus bloc [{}] holds {:.2} of total weight",
                    join(tally.bloc()),
                    tally.bloc_share
                )
            } else {
                format!("no bloc reached {threshold:.2}; ordering by weight")
            };
            StrategyOutcome {
                strategy,
                ordered: tally.ordered,
                scores,
                notes: vec![note],
            }
        }
    }
}

fn negotiate(
    strategy: ResolutionStrategy,
    candidates: &[Candidate],
    conflicts: &[Conflict],
    engine: &NegotiationEngine,
) -> StrategyOutcome {
    let max_weight = candidates
        .iter()
        .map(|c| c.weight)
        .fold(0.0, f64::max);
    let scale = if max_weight > 0.0 { max_weight } else { 1.0 };

    let involved: BTreeSet<RoleId> = involved_roles(conflicts).into_iter().collect();
    let initial: Stances = candidates
        .iter()
        .filter(|c| involved.contains(&c.id))
        .map(|c| (c.id.clone(), c.weight / scale))
        .collect();

    let mut pairs: Vec<(RoleId, RoleId)> = Vec::new();
    for c in conflicts {
        let pair = (c.role_a.clone(), c.role_b.clone());
        if !pairs.contains(&pair) {
            pairs.push(pair);
        }
    }

    let outcome = engine.negotiate(&initial, &pairs);

    if !outcome.converged() {
        let gap = lead_gap(candidates, conflicts);
        info!(rounds = outcome.rounds, "negotiation escalated to priority ordering");
        return StrategyOutcome {
            strategy: ResolutionStrategy::PriorityBased { gap },
            ordered: rank_by_weight(candidates),
            scores: weights_of(candidates),
            notes: vec![format!(
                "negotiation did not converge within {} round(s); escalated to priority ordering",
                outcome.rounds
            )],
        };
    }

    let scores: Weights = candidates
        .iter()
        .map(|c| {
            let score = outcome.stances.get(&c.id).map_or(c.weight, |s| s * scale);
            (c.id.clone(), score)
        })
        .collect();

    let mut ranked: Vec<&Candidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| {
        by_score(
            (&a.id, a.base_priority, scores[&a.id]),
            (&b.id, b.base_priority, scores[&b.id]),
        )
    });

    debug!(rounds = outcome.rounds, "negotiation converged");
    StrategyOutcome {
        strategy,
        ordered: ranked.into_iter().map(|c| c.id.clone()).collect(),
        scores,
        notes: vec![format!(
            "negotiation converged after {} round(s)",
            outcome.rounds
        )],
    }
}

fn join(ids: &[RoleId]) -> String {
    ids.iter().map(RoleId::as_str).collect::<Vec<_>>().join(", ")
}
