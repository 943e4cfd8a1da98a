//! The arbiter: compiled configuration snapshots and the resolution pipeline.
//!
//! A request runs veto → weighting → conflict detection → strategy on one
//! immutable `Snapshot`. Reloading swaps the snapshot whole, so requests in
//! flight keep the snapshot they started with.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::config::ArbiterConfig;
use crate::conflict::ConflictDetector;
use crate::context::ExecutionContext;
use crate::error::ConfigError;
use crate::negotiation::NegotiationEngine;
use crate::priority::PriorityTable;
use crate::resolution::{Resolution, ResolutionAssembler, ResolutionRequest};
use crate::role::{Role, RoleId};
use crate::strategy::{execute, Candidate, ResolutionStrategy, StrategyPicker};
use crate::veto::VetoEvaluator;
use crate::weigher::ContextWeigher;

/// Validated, compiled configuration.
#[derive(Debug)]
pub struct Snapshot {
    config: ArbiterConfig,
    table: PriorityTable,
    weigher: ContextWeigher,
    detector: ConflictDetector,
    veto: VetoEvaluator,
    picker: StrategyPicker,
    negotiation: NegotiationEngine,
    fingerprint: String,
}

impl Snapshot {
    /// Validates `config` and compiles it.
    ///
    /// # Errors
    /// Any `ConfigError`: bad roles, undefined role references, invalid
    /// thresholds or regexes.
    pub fn compile(config: ArbiterConfig) -> Result<Self, ConfigError> {
        config.thresholds.validate()?;
        let table = PriorityTable::from_entries(&config.roles)?;
        let weigher = ContextWeigher::compile(&config.weighting, &table)?;
        let detector = ConflictDetector::compile(&config.oppositions, &config.goal_axes, &table)?;
        let veto = VetoEvaluator::compile(&config.veto)?;
        let picker = StrategyPicker::from_thresholds(&config.thresholds);
        let negotiation = NegotiationEngine::from_thresholds(&config.thresholds);
        let fingerprint = config.fingerprint()?;

        Ok(Self {
            config,
            table,
            weigher,
            detector,
            veto,
            picker,
            negotiation,
            fingerprint,
        })
    }

    /// The configuration this snapshot was compiled from.
    #[must_use]
    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    /// The priority table.
    #[must_use]
    pub fn table(&self) -> &PriorityTable {
        &self.table
    }

    /// BLAKE3 fingerprint of the configuration.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Runs the full pipeline.
    #[must_use]
    pub fn resolve(&self, role_ids: &[RoleId], context: &ExecutionContext) -> Resolution {
        let mut asm = ResolutionAssembler::start();

        let roles: Vec<Role> = role_ids
            .iter()
            .map(|id| {
                self.table.role(id).cloned().unwrap_or_else(|| {
                    warn!(role = %id, "unknown role, treating as priority 0 without veto");
                    asm.note(format!("unknown role `{id}` treated as priority 0"));
                    Role::unknown(id.clone())
                })
            })
            .collect();

        if let Some(decision) = self.veto.evaluate(&self.table, &roles, context) {
            let reason = decision.reason();
            info!(role = %decision.role, trigger = %decision.trigger, "command vetoed");
            let outcome = execute(ResolutionStrategy::VetoOverride, &[], &[], &self.negotiation);
            outcome.notes.into_iter().for_each(|n| asm.note(n));
            return self.within_budget(asm.vetoed(reason));
        }

        let weights = self.weigher.weights_for(context, &roles);
        let conflicts = self.detector.detect(&roles, context);
        for axis in self.detector.live_goal_axes(context) {
            asm.note(format!("goal axis `{axis}` is in play"));
        }
        asm.conflicts(conflicts.clone());

        let candidates: Vec<Candidate> = roles
            .iter()
            .map(|r| {
                let weight = weights.get(&r.id).copied().unwrap_or_default();
                Candidate::new(r.id.clone(), r.base_priority, weight)
            })
            .collect();

        let strategy = self.picker.pick(&candidates, &conflicts);
        debug!(%strategy, conflicts = conflicts.len(), "strategy selected");
        asm.note(format!("strategy {strategy}"));

        let outcome = execute(strategy, &candidates, &conflicts, &self.negotiation);
        outcome.notes.into_iter().for_each(|n| asm.note(n));

        self.within_budget(asm.finish(outcome.strategy, outcome.ordered, outcome.scores))
    }

    fn within_budget(&self, resolution: Resolution) -> Resolution {
        if resolution.elapsed_micros > self.config.latency_budget_micros {
            warn!(
                elapsed_micros = resolution.elapsed_micros,
                budget_micros = self.config.latency_budget_micros,
                "resolution exceeded latency budget"
            );
        }
        resolution
    }
}

/// Arbitrates between advisor roles.
///
/// Cheap to share across threads; readers clone the current snapshot `Arc`
/// and never block each other.
#[derive(Debug)]
pub struct Arbiter {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl Arbiter {
    /// Creates an arbiter from configuration.
    pub fn new(config: ArbiterConfig) -> Result<Self, ConfigError> {
        let snapshot = Snapshot::compile(config)?;
        info!(
            fingerprint = snapshot.fingerprint(),
            roles = snapshot.table().len(),
            "arbiter configuration loaded"
        );
        Ok(Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Creates an arbiter with the built-in personas.
    pub fn with_defaults() -> Result<Self, ConfigError> {
        Self::new(ArbiterConfig::default())
    }

    /// Loads configuration from a YAML or JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::new(ArbiterConfig::from_path(path)?)
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Fingerprint of the current configuration.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        self.snapshot().fingerprint().to_string()
    }

    /// Atomically replaces the configuration, returning the new fingerprint.
    ///
    /// On error the previous snapshot stays active.
    pub fn reload(&self, config: ArbiterConfig) -> Result<String, ConfigError> {
        let next = match Snapshot::compile(config) {
            Ok(snapshot) => Arc::new(snapshot),
            Err(err) => {
                warn!(error = %err, "configuration reload rejected, keeping previous snapshot");
                return Err(err);
            }
        };
        let fingerprint = next.fingerprint().to_string();

        let previous = {
            let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, next)
        };
        info!(
            previous = previous.fingerprint(),
            current = %fingerprint,
            "arbiter configuration reloaded"
        );
        Ok(fingerprint)
    }

    /// Reloads configuration from a file.
    pub fn reload_from_path(&self, path: impl AsRef<Path>) -> Result<String, ConfigError> {
        let config = ArbiterConfig::from_path(path).map_err(|err| {
            warn!(error = %err, "configuration reload rejected, keeping previous snapshot");
            err
        })?;
        self.reload(config)
    }

    /// Resolves a wire request.
    #[must_use]
    pub fn resolve(&self, request: &ResolutionRequest) -> Resolution {
        self.resolve_context(&request.role_ids(), &request.execution_context())
    }

    /// Resolves roles against an already-built context.
    ///
    /// Role ids are de-duplicated, keeping the first occurrence.
    #[must_use]
    pub fn resolve_context(&self, roles: &[RoleId], context: &ExecutionContext) -> Resolution {
        let mut unique: Vec<RoleId> = Vec::with_capacity(roles.len());
        for id in roles {
            if !unique.contains(id) {
                unique.push(id.clone());
            }
        }
        self.snapshot().resolve(&unique, context)
    }

    /// Roles whose activation keywords appear in `command`, highest priority
    /// first.
    #[must_use]
    pub fn suggest_roles(&self, command: &str) -> Vec<RoleId> {
        self.snapshot().table().suggest_roles(command)
    }
}
