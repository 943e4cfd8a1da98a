//! Execution context a resolution is made against.
//!
//! A context is created fresh for each request and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::text::tokenize;

/// Deployment environment of the pending command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Local development.
    Dev,
    /// Pre-production.
    Staging,
    /// Production.
    Production,
}

impl Environment {
    /// Parses an environment name, accepting common aliases.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "dev" | "development" | "local" => Some(Self::Dev),
            "staging" | "stage" | "preprod" => Some(Self::Staging),
            "production" | "prod" | "live" => Some(Self::Production),
            _ => None,
        }
    }

    /// Parses an environment name; unrecognized names are treated as
    /// production so the most cautious weighting applies.
    #[must_use]
    pub fn parse_or_production(value: &str) -> Self {
        Self::parse(value).unwrap_or_else(|| {
            warn!(environment = value, "unrecognized environment, assuming production");
            Self::Production
        })
    }

    /// Returns a short stable identifier.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::Dev
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a request flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    /// Boolean flag.
    Bool(bool),
    /// Free-form flag.
    Text(String),
}

impl FlagValue {
    /// Interprets the flag as a boolean switch.
    ///
    /// Text values `true`, `yes`, `on` and `1` count as set.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "on" | "1"),
        }
    }

    /// Returns true if the flag is explicitly switched off.
    #[must_use]
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Bool(b) => !*b,
            Self::Text(s) => matches!(s.trim().to_lowercase().as_str(), "false" | "no" | "off" | "0"),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Situational metadata a decision is made against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// The pending command text.
    pub command_text: String,

    /// Resources the command touches, in request order.
    pub target_resources: Vec<String>,

    /// Deployment environment.
    pub environment: Environment,

    /// When the request was made.
    pub timestamp: DateTime<Utc>,

    /// Request flags keyed by name.
    pub flags: BTreeMap<String, FlagValue>,
}

impl ExecutionContext {
    /// Creates a dev-environment context for the given command.
    #[must_use]
    pub fn new(command_text: impl Into<String>) -> Self {
        Self {
            command_text: command_text.into(),
            target_resources: Vec::new(),
            environment: Environment::Dev,
            timestamp: Utc::now(),
            flags: BTreeMap::new(),
        }
    }

    /// Sets the environment.
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Appends a target resource.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.target_resources.push(resource.into());
        self
    }

    /// Sets a flag.
    #[must_use]
    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Looks up a flag by name.
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }

    /// Lowercase tokens of the command text.
    #[must_use]
    pub fn command_tokens(&self) -> Vec<String> {
        tokenize(&self.command_text)
    }
}
