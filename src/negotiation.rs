//! Bounded negotiation between conflicting roles.
//!
//! Every conflicting role holds a stance in [0, 1]. Each round a stance moves
//! a damped step toward the mean midpoint of its conflicting pairs. The
//! engine stops when the largest stance change drops below epsilon
//! (`Converged`) or when the round cap is hit (`Escalated`), so it always
//! terminates within `max_rounds` rounds.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::StrategyThresholds;
use crate::role::RoleId;

/// Stance per role.
pub type Stances = BTreeMap<RoleId, f64>;

/// Negotiation state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    /// Computing the next round of compromise stances.
    Proposing,
    /// Comparing proposed stances with the previous round.
    Evaluating,
    /// Not yet converged; another round is allowed.
    NextRound,
    /// Stances settled within epsilon.
    Converged,
    /// Round cap reached without convergence.
    Escalated,
}

impl NegotiationState {
    /// Returns true for `Converged` and `Escalated`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Converged | Self::Escalated)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Proposing => "proposing",
            Self::Evaluating => "evaluating",
            Self::NextRound => "next_round",
            Self::Converged => "converged",
            Self::Escalated => "escalated",
        };
        f.write_str(s)
    }
}

/// Result of a negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiationOutcome {
    /// Terminal state.
    pub state: NegotiationState,
    /// Rounds executed, never above the cap.
    pub rounds: u32,
    /// Final stances.
    pub stances: Stances,
    /// Largest stance change of each round.
    pub deltas: Vec<f64>,
}

impl NegotiationOutcome {
    /// Returns true if the negotiation converged.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.state == NegotiationState::Converged
    }
}

/// Negotiation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NegotiationEngine {
    max_rounds: u32,
    epsilon: f64,
    damping: f64,
}

impl NegotiationEngine {
    /// Creates an engine. `max_rounds` is raised to at least one round and
    /// `damping` clamped into (0, 1].
    #[must_use]
    pub fn new(max_rounds: u32, epsilon: f64, damping: f64) -> Self {
        Self {
            max_rounds: max_rounds.max(1),
            epsilon,
            damping: damping.clamp(f64::MIN_POSITIVE, 1.0),
        }
    }

    /// Builds an engine from validated thresholds.
    #[must_use]
    pub fn from_thresholds(thresholds: &StrategyThresholds) -> Self {
        Self::new(
            thresholds.negotiation_rounds,
            thresholds.negotiation_epsilon,
            thresholds.negotiation_damping,
        )
    }

    /// The round cap.
    #[must_use]
    pub const fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Runs the negotiation.
    ///
    /// `pairs` lists conflicting role pairs; roles in `initial` that appear in
    /// no pair keep their stance.
    #[must_use]
    pub fn negotiate(&self, initial: &Stances, pairs: &[(RoleId, RoleId)]) -> NegotiationOutcome {
        let mut state = NegotiationState::Proposing;
        let mut stances = initial.clone();
        let mut proposed = Stances::new();
        let mut deltas = Vec::new();
        let mut rounds = 0;

        while !state.is_terminal() {
            state = match state {
                NegotiationState::Proposing => {
                    rounds += 1;
                    proposed = self.propose(&stances, pairs);
                    NegotiationState::Evaluating
                }
                NegotiationState::Evaluating => {
                    let delta = max_delta(&stances, &proposed);
                    deltas.push(delta);
                    stances = std::mem::take(&mut proposed);
                    if delta < self.epsilon {
                        NegotiationState::Converged
                    } else if rounds >= self.max_rounds {
                        NegotiationState::Escalated
                    } else {
                        NegotiationState::NextRound
                    }
                }
                NegotiationState::NextRound => NegotiationState::Proposing,
                NegotiationState::Converged | NegotiationState::Escalated => state,
            };
        }

        debug!(%state, rounds, "negotiation finished");
        NegotiationOutcome {
            state,
            rounds,
            stances,
            deltas,
        }
    }

    // One Jacobi step: every update reads the previous round's stances.
    fn propose(&self, stances: &Stances, pairs: &[(RoleId, RoleId)]) -> Stances {
        let mut targets: BTreeMap<&RoleId, (f64, u32)> = BTreeMap::new();
        for (a, b) in pairs {
            let (Some(sa), Some(sb)) = (stances.get(a), stances.get(b)) else {
                continue;
            };
            let mid = (sa + sb) / 2.0;
            for id in [a, b] {
                let entry = targets.entry(id).or_insert((0.0, 0));
                entry.0 += mid;
                entry.1 += 1;
            }
        }

        stances
            .iter()
            .map(|(id, &s)| {
                let next = match targets.get(id) {
                    Some(&(sum, n)) => {
                        let target = sum / f64::from(n);
                        s + self.damping * (target - s)
                    }
                    None => s,
                };
                (id.clone(), next)
            })
            .collect()
    }
}

fn max_delta(before: &Stances, after: &Stances) -> f64 {
    after
        .iter()
        .map(|(id, s)| before.get(id).map_or(0.0, |b| (s - b).abs()))
        .fold(0.0, f64::max)
}
