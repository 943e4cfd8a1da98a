//! # Persona Arbiter - deterministic arbitration between advisor roles
//!
//! When several advisor roles (security, performance, frontend, ...) are
//! invoked for one developer command, the arbiter decides whether any of
//! them blocks the command outright and, if not, in which order their
//! guidance applies.
//!
//! ## Core Concepts
//!
//! - **Priority Table**: validated role metadata, loaded once from configuration
//! - **Veto**: a role may block a command on a closed set of conditions
//! - **Conflict**: a direct, resource or goal disagreement between two roles
//! - **Strategy**: exactly one of priority, negotiation, sequential access or
//!   weighted consensus orders the roles
//! - **Resolution**: the ordered roles plus the record of how they were ordered
//!
//! ## Usage
//!
//! ```rust,ignore
//! use persona_arbiter::{Arbiter, ResolutionRequest};
//!
//! let arbiter = Arbiter::with_defaults()?;
//! let request = ResolutionRequest::new("deploy to production", ["security", "performance"])
//!     .with_environment("production");
//! let resolution = arbiter.resolve(&request);
//! assert_eq!(resolution.ordered_roles[0].as_str(), "security");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Configuration and role metadata
pub mod config;
pub mod context;
pub mod error;
pub mod priority;
pub mod role;
pub mod text;

// Pipeline stages
pub mod conflict;
pub mod consensus;
pub mod negotiation;
pub mod strategy;
pub mod veto;
pub mod weigher;

// Assembly and execution
pub mod arbiter;
pub mod resolution;
pub mod runtime;

pub use arbiter::{Arbiter, Snapshot};
pub use config::{ArbiterConfig, GoalAxis, RoleEntry, StrategyThresholds, VetoConfig, WeightingConfig};
pub use conflict::{Conflict, ConflictDetector, ConflictKind};
pub use consensus::{aggregate, ConsensusOutcome};
pub use context::{Environment, ExecutionContext, FlagValue};
pub use error::{ArbiterError, ArbiterResult, ConfigError, RuntimeError};
pub use negotiation::{NegotiationEngine, NegotiationOutcome, NegotiationState, Stances};
pub use priority::PriorityTable;
pub use resolution::{RequestContext, Resolution, ResolutionAssembler, ResolutionRequest, ResolutionResponse};
pub use role::{ConditionTag, Role, RoleId, MAX_PRIORITY};
pub use runtime::{ArbiterRuntime, ResolutionHandle, RuntimeConfig};
pub use strategy::{Candidate, ResolutionStrategy, StrategyOutcome, StrategyPicker};
pub use veto::{VetoDecision, VetoEvaluator};
pub use weigher::{ContextWeigher, Weights};
