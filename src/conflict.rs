//! Conflict detection between advisor roles.
//!
//! Conflicts are derived data: they are recomputed for every request and
//! carried in the resolution so the downstream audit trail can see why a
//! strategy was chosen.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::GoalAxis;
use crate::context::ExecutionContext;
use crate::error::ConfigError;
use crate::priority::PriorityTable;
use crate::role::{Role, RoleId};
use crate::text::{mentions, mentions_any, tokenize};
use crate::weigher::defined_role;

/// Why two roles disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The pair is known to be antagonistic.
    Direct,
    /// Both roles need the same target resource.
    Resource,
    /// The command pulls the roles toward mutually exclusive outcomes.
    Goal,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Resource => write!(f, "resource"),
            Self::Goal => write!(f, "goal"),
        }
    }
}

/// A detected incompatibility between two roles.
///
/// `role_a` is the role that appears first in the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// First role of the pair.
    pub role_a: RoleId,
    /// Second role of the pair.
    pub role_b: RoleId,
    /// Kind of disagreement.
    pub kind: ConflictKind,
}

impl Conflict {
    /// Creates a conflict.
    #[must_use]
    pub fn new(role_a: RoleId, role_b: RoleId, kind: ConflictKind) -> Self {
        Self { role_a, role_b, kind }
    }

    /// Returns true if `id` is one side of this conflict.
    #[must_use]
    pub fn involves(&self, id: &RoleId) -> bool {
        self.role_a == *id || self.role_b == *id
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} <> {})", self.kind, self.role_a, self.role_b)
    }
}

/// Distinct roles that appear in any conflict, in first-seen order.
#[must_use]
pub fn involved_roles(conflicts: &[Conflict]) -> Vec<RoleId> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for c in conflicts {
        for id in [&c.role_a, &c.role_b] {
            if seen.insert(id.clone()) {
                out.push(id.clone());
            }
        }
    }
    out
}

#[derive(Debug, Clone)]
struct CompiledAxis {
    name: String,
    pole_a: Vec<String>,
    pole_b: Vec<String>,
}

impl CompiledAxis {
    fn leaning(&self, role: &Role) -> (bool, bool) {
        let a = role.activation_keywords.iter().any(|k| self.pole_a.contains(k));
        let b = role.activation_keywords.iter().any(|k| self.pole_b.contains(k));
        (a, b)
    }
}

/// Finds role pairs that disagree about a command.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    oppositions: HashSet<(RoleId, RoleId)>,
    goal_axes: Vec<CompiledAxis>,
}

impl ConflictDetector {
    /// Validates oppositions and goal axes against a table.
    pub fn compile(
        oppositions: &[[String; 2]],
        goal_axes: &[GoalAxis],
        table: &PriorityTable,
    ) -> Result<Self, ConfigError> {
        let mut pairs = HashSet::with_capacity(oppositions.len() * 2);
        for [a, b] in oppositions {
            let a = defined_role(table, a, "oppositions")?;
            let b = defined_role(table, b, "oppositions")?;
            if a == b {
                return Err(ConfigError::Parse {
                    message: format!("role '{a}' cannot oppose itself"),
                });
            }
            pairs.insert((a.clone(), b.clone()));
            pairs.insert((b, a));
        }

        let goal_axes = goal_axes
            .iter()
            .map(|axis| CompiledAxis {
                name: axis.name.clone(),
                pole_a: normalize(&axis.pole_a),
                pole_b: normalize(&axis.pole_b),
            })
            .collect();

        Ok(Self {
            oppositions: pairs,
            goal_axes,
        })
    }

    /// Detects conflicts among `roles` for the given command and context.
    ///
    /// At most one conflict is reported per pair and kind. Pairs are visited
    /// in request order, kinds in `Direct`, `Resource`, `Goal` order.
    #[must_use]
    pub fn detect(&self, roles: &[Role], context: &ExecutionContext) -> Vec<Conflict> {
        if roles.len() < 2 {
            return Vec::new();
        }

        let command_tokens = context.command_tokens();
        let resource_tokens: Vec<Vec<String>> =
            context.target_resources.iter().map(|r| tokenize(r)).collect();
        let live_axes: Vec<&CompiledAxis> = self
            .goal_axes
            .iter()
            .filter(|axis| {
                mentions_any(&command_tokens, &axis.pole_a) && mentions_any(&command_tokens, &axis.pole_b)
            })
            .collect();

        let mut conflicts = Vec::new();
        for (i, a) in roles.iter().enumerate() {
            for b in &roles[i + 1..] {
                let mut kinds = BTreeSet::new();
                if self.oppositions.contains(&(a.id.clone(), b.id.clone())) {
                    kinds.insert(ConflictKind::Direct);
                }
                if resource_tokens
                    .iter()
                    .any(|tokens| needs_resource(a, tokens) && needs_resource(b, tokens))
                {
                    kinds.insert(ConflictKind::Resource);
                }
                if live_axes.iter().any(|axis| diverge(axis, a, b)) {
                    kinds.insert(ConflictKind::Goal);
                }
                conflicts.extend(
                    kinds
                        .into_iter()
                        .map(|kind| Conflict::new(a.id.clone(), b.id.clone(), kind)),
                );
            }
        }
        conflicts
    }

    /// Names of goal axes whose both poles the command mentions.
    #[must_use]
    pub fn live_goal_axes(&self, context: &ExecutionContext) -> Vec<&str> {
        let tokens = context.command_tokens();
        self.goal_axes
            .iter()
            .filter(|axis| mentions_any(&tokens, &axis.pole_a) && mentions_any(&tokens, &axis.pole_b))
            .map(|axis| axis.name.as_str())
            .collect()
    }
}

fn normalize(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

fn needs_resource(role: &Role, resource_tokens: &[String]) -> bool {
    role.activation_keywords.iter().any(|k| mentions(resource_tokens, k))
}

// A role leaning to both poles is ambivalent and never diverges on that axis.
fn diverge(axis: &CompiledAxis, a: &Role, b: &Role) -> bool {
    match (axis.leaning(a), axis.leaning(b)) {
        ((true, false), (false, true)) | ((false, true), (true, false)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_roles, ArbiterConfig};

    fn setup() -> (PriorityTable, ConflictDetector) {
        let config = ArbiterConfig::default();
        let table = PriorityTable::from_entries(&default_roles()).unwrap();
        let detector = ConflictDetector::compile(&config.oppositions, &config.goal_axes, &table).unwrap();
        (table, detector)
    }

    fn roles(table: &PriorityTable, ids: &[&str]) -> Vec<Role> {
        ids.iter()
            .map(|id| table.role(&RoleId::new(id)).unwrap().clone())
            .collect()
    }

    #[test]
    fn fewer_than_two_roles_never_conflict() {
        let (table, detector) = setup();
        let ctx = ExecutionContext::new("optimize and harden everything");
        assert!(detector.detect(&[], &ctx).is_empty());
        assert!(detector.detect(&roles(&table, &["security"]), &ctx).is_empty());
    }

    #[test]
    fn opposition_table_yields_direct_conflict() {
        let (table, detector) = setup();
        let ctx = ExecutionContext::new("deploy to production");
        let conflicts = detector.detect(&roles(&table, &["performance", "security"]), &ctx);
        assert_eq!(
            conflicts,
            vec![Conflict::new(
                RoleId::new("performance"),
                RoleId::new("security"),
                ConflictKind::Direct
            )]
        );
    }

    #[test]
    fn shared_resource_yields_resource_conflict() {
        let (table, detector) = setup();
        let ctx = ExecutionContext::new("update login flow").with_resource("src/api/auth.rs");
        let conflicts = detector.detect(&roles(&table, &["security", "backend"]), &ctx);
        assert_eq!(
            conflicts,
            vec![Conflict::new(
                RoleId::new("security"),
                RoleId::new("backend"),
                ConflictKind::Resource
            )]
        );
    }

    #[test]
    fn unrelated_resource_is_not_contended() {
        let (table, detector) = setup();
        let ctx = ExecutionContext::new("update").with_resource("README.md");
        assert!(detector.detect(&roles(&table, &["security", "backend"]), &ctx).is_empty());
    }

    #[test]
    fn opposing_goal_poles_yield_goal_conflict() {
        let (table, detector) = setup();
        let ctx = ExecutionContext::new("optimize the cache but verify every edge case");
        assert_eq!(detector.live_goal_axes(&ctx), vec!["speed_vs_safety"]);

        let conflicts = detector.detect(&roles(&table, &["qa", "performance"]), &ctx);
        assert_eq!(
            conflicts,
            vec![Conflict::new(RoleId::new("qa"), RoleId::new("performance"), ConflictKind::Goal)]
        );
    }

    #[test]
    fn one_pole_mentioned_is_not_a_goal_conflict() {
        let (table, detector) = setup();
        let ctx = ExecutionContext::new("optimize the cache");
        assert!(detector.live_goal_axes(&ctx).is_empty());
        assert!(detector.detect(&roles(&table, &["qa", "performance"]), &ctx).is_empty());
    }

    #[test]
    fn several_kinds_for_one_pair() {
        let (table, detector) = setup();
        let ctx = ExecutionContext::new("make auth fast and audit it").with_resource("src/auth/cache.rs");
        let conflicts = detector.detect(&roles(&table, &["security", "performance"]), &ctx);
        let kinds: Vec<ConflictKind> = conflicts.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ConflictKind::Direct, ConflictKind::Resource, ConflictKind::Goal]
        );
    }

    #[test]
    fn involved_roles_are_distinct_in_first_seen_order() {
        let conflicts = vec![
            Conflict::new("security".into(), "performance".into(), ConflictKind::Direct),
            Conflict::new("architect".into(), "performance".into(), ConflictKind::Direct),
        ];
        assert_eq!(
            involved_roles(&conflicts),
            vec![
                RoleId::new("security"),
                RoleId::new("performance"),
                RoleId::new("architect")
            ]
        );
    }

    #[test]
    fn rejects_undefined_or_self_opposition() {
        let table = PriorityTable::from_entries(&default_roles()).unwrap();
        let bad = vec![["security".to_string(), "ghost".to_string()]];
        assert!(matches!(
            ConflictDetector::compile(&bad, &[], &table),
            Err(ConfigError::UndefinedRole { .. })
        ));

        let selfish = vec![["qa".to_string(), "qa".to_string()]];
        assert!(ConflictDetector::compile(&selfish, &[], &table).is_err());
    }

    #[test]
    fn conflict_wire_shape() {
        let c = Conflict::new("frontend".into(), "backend".into(), ConflictKind::Direct);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#"{"roleA":"frontend","roleB":"backend","kind":"direct"}"#);
    }
}
