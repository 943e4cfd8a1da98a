//! Property checks over reproducible pseudo-random inputs.
//!
//! Inputs are drawn from BLAKE3 hashes of a fixed seed, so every run sees the
//! same cases and a failure names the case index that broke.

use std::collections::BTreeMap;

use persona_arbiter::{
    aggregate, Arbiter, ConditionTag, ExecutionContext, NegotiationEngine, NegotiationState,
    ResolutionRequest, ResolutionResponse, RoleId, Stances,
};

struct Draws {
    seed: &'static str,
    counter: u64,
}

impl Draws {
    fn new(seed: &'static str) -> Self {
        Self { seed, counter: 0 }
    }

    fn next_u64(&mut self) -> u64 {
        self.counter += 1;
        let hash = blake3::hash(format!("{}:{}", self.seed, self.counter).as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.below(items.len())]
    }
}

const ROLES: &[&str] = &[
    "security", "architect", "qa", "performance", "devops", "backend", "frontend", "analyzer",
    "refactorer", "mentor", "scribe", "ghost",
];

const WORDS: &[&str] = &[
    "deploy", "optimize", "cache", "test", "verify", "design", "api", "ui", "refactor", "docs",
    "production", "auth", "release", "audit", "fast", "ship", "redesign", "schema", "the", "and",
];

const ENVIRONMENTS: &[&str] = &["dev", "staging", "production", "unknown"];

const RESOURCES: &[&str] = &["src/api/auth.rs", "README.md", "ui/cache.ts", "config/prod.yaml"];

fn random_request(draws: &mut Draws) -> ResolutionRequest {
    let command: Vec<&str> = (0..1 + draws.below(6)).map(|_| draws.pick(WORDS)).collect();
    let roles: Vec<&str> = (0..draws.below(6)).map(|_| draws.pick(ROLES)).collect();
    let mut request = ResolutionRequest::new(command.join(" "), roles).with_environment(draws.pick(ENVIRONMENTS));
    if draws.below(3) == 0 {
        request = request.with_resource(draws.pick(RESOURCES));
    }
    request
}

#[test]
fn ordering_is_a_permutation_of_the_request() {
    let arbiter = Arbiter::with_defaults().unwrap();
    let mut draws = Draws::new("permutation");

    for case in 0..500 {
        let request = random_request(&mut draws);
        let res = arbiter.resolve(&request);
        if res.vetoed {
            assert!(res.ordered_roles.is_empty(), "case {case}");
            continue;
        }

        let mut expected = request.role_ids();
        expected.sort();
        let mut actual = res.ordered_roles.clone();
        actual.sort();
        assert_eq!(actual, expected, "case {case}: {request:?}");
    }
}

#[test]
fn resolution_is_deterministic() {
    let arbiter = Arbiter::with_defaults().unwrap();
    let mut draws = Draws::new("determinism");

    for case in 0..200 {
        let request = random_request(&mut draws);
        let a = arbiter.resolve(&request);
        let b = arbiter.resolve(&request);
        assert_eq!(a.ordered_roles, b.ordered_roles, "case {case}");
        assert_eq!(a.strategy_used, b.strategy_used, "case {case}");
        assert_eq!(a.conflicts, b.conflicts, "case {case}");
    }
}

#[test]
fn every_matching_trigger_vetoes() {
    let arbiter = Arbiter::with_defaults().unwrap();
    let snapshot = arbiter.snapshot();

    let cases: &[(ConditionTag, ExecutionContext)] = &[
        (ConditionTag::UnsafeOperation, ExecutionContext::new("sudo mkfs.ext4 /dev/sdb1")),
        (
            ConditionTag::SkipValidation,
            ExecutionContext::new("git commit --no-verify -m hotfix"),
        ),
        (ConditionTag::CredentialExposure, ExecutionContext::new("cat ~/.ssh/id_rsa")),
        (
            ConditionTag::UnreviewedProductionChange,
            ExecutionContext::new("apply migration")
                .with_environment(persona_arbiter::Environment::Production)
                .with_flag("reviewed", false),
        ),
    ];

    for role in snapshot.table().check_order() {
        for (tag, context) in cases {
            if !role.vetoes_on(*tag) {
                continue;
            }
            let res = arbiter.resolve_context(&[role.id.clone()], context);
            assert!(res.vetoed, "{} should veto on {tag}", role.id);
            let reason = res.veto_reason.unwrap();
            assert!(reason.contains(role.id.as_str()), "{reason}");
            assert!(reason.contains(tag.name()), "{reason}");
        }
    }
}

#[test]
fn roles_without_triggers_never_veto() {
    let arbiter = Arbiter::with_defaults().unwrap();
    let context = ExecutionContext::new("rm -rf / && cat .env --no-verify").with_flag("skipValidation", true);
    let roles: Vec<RoleId> = ["performance", "frontend", "backend", "scribe", "ghost"]
        .iter()
        .map(|n| RoleId::new(n))
        .collect();
    let res = arbiter.resolve_context(&roles, &context);
    assert!(!res.vetoed);
    assert_eq!(res.ordered_roles.len(), roles.len());
}

#[test]
fn negotiation_always_terminates_within_the_cap() {
    let mut draws = Draws::new("negotiation");

    for case in 0..300 {
        let max_rounds = 1 + draws.below(6) as u32;
        let epsilon = 0.001 + draws.unit() * 0.1;
        let damping = 0.05 + draws.unit() * 0.95;
        let engine = NegotiationEngine::new(max_rounds, epsilon, damping);

        let n = 2 + draws.below(4);
        let ids: Vec<RoleId> = (0..n).map(|i| RoleId::new(format!("r{i}"))).collect();
        let stances: Stances = ids.iter().map(|id| (id.clone(), draws.unit())).collect();
        let pairs: Vec<(RoleId, RoleId)> = (1..n).map(|i| (ids[draws.below(i)].clone(), ids[i].clone())).collect();

        let out = engine.negotiate(&stances, &pairs);
        assert!(out.rounds >= 1 && out.rounds <= max_rounds, "case {case}");
        assert!(out.state.is_terminal(), "case {case}");
        assert_eq!(out.deltas.len(), out.rounds as usize, "case {case}");
        if out.state == NegotiationState::Escalated {
            assert_eq!(out.rounds, max_rounds, "case {case}");
        }
        for s in out.stances.values() {
            assert!((0.0..=1.0).contains(s), "case {case}: stance {s}");
        }
    }
}

#[test]
fn consensus_is_deterministic_and_order_independent() {
    let mut draws = Draws::new("consensus");

    for case in 0..300 {
        let n = 1 + draws.below(8);
        let ids: Vec<RoleId> = (0..n).map(|i| RoleId::new(format!("role{i}"))).collect();
        let weights: BTreeMap<RoleId, f64> = ids
            .iter()
            .map(|id| (id.clone(), (draws.below(5) as f64) * 2.5))
            .collect();
        let threshold = 0.1 + draws.unit() * 0.9;

        let first = aggregate(&ids, &weights, threshold);
        let again = aggregate(&ids, &weights, threshold);
        let mut reversed = ids.clone();
        reversed.reverse();
        let flipped = aggregate(&reversed, &weights, threshold);

        assert_eq!(first, again, "case {case}");
        assert_eq!(first, flipped, "case {case}");
        assert_eq!(first.ordered.len(), n, "case {case}");
        assert!(first.bloc_size <= n, "case {case}");
    }
}

#[test]
fn response_survives_json_round_trip() {
    let arbiter = Arbiter::with_defaults().unwrap();
    let mut draws = Draws::new("round-trip");

    for case in 0..100 {
        let res = arbiter.resolve(&random_request(&mut draws));
        let response = res.to_response();
        let parsed = ResolutionResponse::from_json(&response.to_json().unwrap()).unwrap();
        assert_eq!(parsed, response, "case {case}");
    }
}
