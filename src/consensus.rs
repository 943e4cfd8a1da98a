//! Weighted consensus aggregation.
//!
//! Roles are ranked by normalized weight and accumulated until the
//! cumulative share reaches the threshold. That prefix is the majority bloc
//! and leads the ordering; everyone else follows in weight order.

use std::collections::BTreeMap;

use crate::role::RoleId;

// Absorbs float error when the shares sum exactly to the threshold.
const SHARE_TOLERANCE: f64 = 1e-9;

/// Result of a consensus tally.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusOutcome {
    /// Bloc first, remaining roles after it, both in descending weight.
    pub ordered: Vec<RoleId>,
    /// Number of leading roles in `ordered` that form the majority bloc.
    pub bloc_size: usize,
    /// Cumulative share of the bloc.
    pub bloc_share: f64,
    /// Whether any prefix reached the threshold.
    pub reached: bool,
}

impl ConsensusOutcome {
    /// The majority bloc.
    #[must_use]
    pub fn bloc(&self) -> &[RoleId] {
        &self.ordered[..self.bloc_size]
    }
}

/// Tallies `roles` by cumulative weight share.
///
/// Roles missing from `weights` count as zero. When every weight is zero the
/// roles share equally. Ties rank by role id, so the same inputs always
/// produce the same ordering. Duplicate ids are counted once.
#[must_use]
pub fn aggregate(roles: &[RoleId], weights: &BTreeMap<RoleId, f64>, threshold: f64) -> ConsensusOutcome {
    let mut ranked: Vec<(RoleId, f64)> = Vec::with_capacity(roles.len());
    for id in roles {
        if ranked.iter().any(|(seen, _)| seen == id) {
            continue;
        }
        let w = weights.get(id).copied().filter(|w| w.is_finite() && *w > 0.0).unwrap_or(0.0);
        ranked.push((id.clone(), w));
    }
    ranked.sort_by(|(ia, wa), (ib, wb)| wb.total_cmp(wa).then_with(|| ia.cmp(ib)));

    let total: f64 = ranked.iter().map(|(_, w)| w).sum();
    #[allow(clippy::cast_precision_loss)]
    let equal_share = if ranked.is_empty() { 0.0 } else { 1.0 / ranked.len() as f64 };

    let mut cumulative = 0.0;
    let mut bloc_size = ranked.len();
    let mut reached = false;
    for (i, (_, w)) in ranked.iter().enumerate() {
        cumulative += if total > 0.0 { w / total } else { equal_share };
        if cumulative + SHARE_TOLERANCE >= threshold {
            bloc_size = i + 1;
            reached = true;
            break;
        }
    }
    if !reached {
        cumulative = cumulative.min(1.0);
    }

    ConsensusOutcome {
        ordered: ranked.into_iter().map(|(id, _)| id).collect(),
        bloc_size,
        bloc_share: cumulative,
        reached,
    }
}
