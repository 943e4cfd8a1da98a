//! Resolution records and their JSON wire forms.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conflict::Conflict;
use crate::context::{Environment, ExecutionContext, FlagValue};
use crate::error::{ArbiterError, ArbiterResult};
use crate::role::RoleId;
use crate::strategy::ResolutionStrategy;
use crate::weigher::Weights;

/// The outcome of arbitrating one command.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Roles in the order their guidance should apply. Empty when vetoed.
    pub ordered_roles: Vec<RoleId>,
    /// The strategy that produced the ordering.
    pub strategy_used: ResolutionStrategy,
    /// Whether a role blocked the command.
    pub vetoed: bool,
    /// Which role and trigger blocked the command.
    pub veto_reason: Option<String>,
    /// Conflicts detected among the requested roles.
    pub conflicts: Vec<Conflict>,
    /// Final score per role.
    pub scores: Weights,
    /// Wall-clock time spent resolving.
    pub elapsed_micros: u64,
    /// Human-readable account of the decision.
    pub trail: Vec<String>,
}

impl Resolution {
    /// Converts to the wire response.
    #[must_use]
    pub fn to_response(&self) -> ResolutionResponse {
        ResolutionResponse {
            ordered_roles: self.ordered_roles.clone(),
            strategy_used: self.strategy_used.name().to_string(),
            vetoed: self.vetoed,
            veto_reason: self.veto_reason.clone(),
            conflicts: self.conflicts.clone(),
            elapsed_micros: self.elapsed_micros,
        }
    }

    /// Serializes the wire response as JSON.
    pub fn to_json(&self) -> ArbiterResult<String> {
        self.to_response().to_json()
    }
}

/// JSON response shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResponse {
    /// Ordered role ids.
    pub ordered_roles: Vec<RoleId>,
    /// Strategy identifier, e.g. `priority_based`.
    pub strategy_used: String,
    /// Whether the command was blocked.
    pub vetoed: bool,
    /// Veto reason, `null` when not vetoed.
    pub veto_reason: Option<String>,
    /// Detected conflicts.
    pub conflicts: Vec<Conflict>,
    /// Elapsed time in microseconds.
    pub elapsed_micros: u64,
}

impl ResolutionResponse {
    /// Serializes to JSON.
    pub fn to_json(&self) -> ArbiterResult<String> {
        serde_json::to_string(self).map_err(|e| ArbiterError::invalid_request(e.to_string()))
    }

    /// Parses a response.
    pub fn from_json(json: &str) -> ArbiterResult<Self> {
        serde_json::from_str(json).map_err(|e| ArbiterError::invalid_request(e.to_string()))
    }
}

/// JSON request shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionRequest {
    /// The pending command.
    pub command: String,
    /// Requested role ids, in request order.
    pub roles: Vec<String>,
    /// Request context.
    #[serde(default)]
    pub context: RequestContext,
}

/// Context part of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Resources the command touches.
    #[serde(default)]
    pub target_resources: Vec<String>,
    /// Environment name; unrecognized names are treated as production.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Request flags.
    #[serde(default)]
    pub flags: BTreeMap<String, FlagValue>,
    /// Request time; defaults to the time of parsing.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn default_environment() -> String {
    Environment::Dev.name().to_string()
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            target_resources: Vec::new(),
            environment: default_environment(),
            flags: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }
}

impl ResolutionRequest {
    /// Creates a request with a default dev context.
    #[must_use]
    pub fn new<I, S>(command: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            context: RequestContext::default(),
        }
    }

    /// Sets the environment name.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.context.environment = environment.into();
        self
    }

    /// Adds a target resource.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.context.target_resources.push(resource.into());
        self
    }

    /// Sets a flag.
    #[must_use]
    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.context.flags.insert(name.into(), value.into());
        self
    }

    /// Parses a request.
    ///
    /// # Errors
    /// `InvalidRequest` for malformed JSON or a blank command.
    pub fn from_json(json: &str) -> ArbiterResult<Self> {
        let request: Self =
            serde_json::from_str(json).map_err(|e| ArbiterError::invalid_request(e.to_string()))?;
        if request.command.trim().is_empty() {
            return Err(ArbiterError::invalid_request("command cannot be empty"));
        }
        Ok(request)
    }

    /// Requested role ids, normalized and de-duplicated in request order.
    #[must_use]
    pub fn role_ids(&self) -> Vec<RoleId> {
        let mut ids: Vec<RoleId> = Vec::with_capacity(self.roles.len());
        for raw in &self.roles {
            let id = RoleId::new(raw);
            if !id.as_str().is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Builds the execution context.
    #[must_use]
    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext {
            command_text: self.command.clone(),
            target_resources: self.context.target_resources.clone(),
            environment: Environment::parse_or_production(&self.context.environment),
            timestamp: self.context.timestamp,
            flags: self.context.flags.clone(),
        }
    }
}

/// Collects the parts of a resolution as the pipeline runs.
#[derive(Debug)]
pub struct ResolutionAssembler {
    started: Instant,
    trail: Vec<String>,
    conflicts: Vec<Conflict>,
}

impl ResolutionAssembler {
    /// Starts the clock.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            trail: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Appends a trail entry.
    pub fn note(&mut self, entry: impl Into<String>) {
        self.trail.push(entry.into());
    }

    /// Records detected conflicts.
    pub fn conflicts(&mut self, conflicts: Vec<Conflict>) {
        for c in &conflicts {
            self.trail.push(format!("conflict {c}"));
        }
        self.conflicts = conflicts;
    }

    /// Microseconds since `start`.
    #[must_use]
    pub fn elapsed_micros(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    /// Builds a blocked resolution.
    #[must_use]
    pub fn vetoed(mut self, reason: String) -> Resolution {
        self.trail.push(format!("vetoed: {reason}"));
        Resolution {
            ordered_roles: Vec::new(),
            strategy_used: ResolutionStrategy::VetoOverride,
            vetoed: true,
            veto_reason: Some(reason),
            conflicts: Vec::new(),
            scores: Weights::new(),
            elapsed_micros: self.elapsed_micros(),
            trail: self.trail,
        }
    }

    /// Builds a resolution from a strategy's ordering.
    #[must_use]
    pub fn finish(self, strategy: ResolutionStrategy, ordered_roles: Vec<RoleId>, scores: Weights) -> Resolution {
        Resolution {
            ordered_roles,
            strategy_used: strategy,
            vetoed: false,
            veto_reason: None,
            scores,
            elapsed_micros: self.elapsed_micros(),
            conflicts: self.conflicts,
            trail: self.trail,
        }
    }
}
