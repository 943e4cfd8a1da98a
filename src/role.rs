//! Advisor roles and their veto conditions.
//!
//! A role is a named advisory viewpoint (security, performance, ...) with a
//! base priority on a 0..=10 scale, a set of activation keywords and the
//! closed set of conditions under which it may block an action outright.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest base priority a role may carry.
pub const MAX_PRIORITY: u8 = 10;

/// Identifier of an advisor role.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(String);

impl RoleId {
    /// Creates a role id. Ids are compared case-insensitively, so they are
    /// stored trimmed and lowercased.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_lowercase())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RoleId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Condition under which a role vetoes the pending command.
///
/// Tags are checked in declaration order, which is also their `Ord` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionTag {
    /// The command matches the unsafe-operation denylist.
    UnsafeOperation,

    /// Validation was explicitly disabled through a flag or a command switch.
    SkipValidation,

    /// The command would print or embed credentials.
    CredentialExposure,

    /// A production change explicitly marked as not reviewed.
    UnreviewedProductionChange,
}

impl ConditionTag {
    /// Returns a short stable identifier suitable for logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UnsafeOperation => "unsafe_operation",
            Self::SkipValidation => "skip_validation",
            Self::CredentialExposure => "credential_exposure",
            Self::UnreviewedProductionChange => "unreviewed_production_change",
        }
    }
}

impl fmt::Display for ConditionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An advisor role as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique id.
    pub id: RoleId,

    /// Static priority in [0, 10].
    pub base_priority: u8,

    /// Lowercased keywords that signal this role's concern.
    pub activation_keywords: BTreeSet<String>,

    /// Conditions under which this role blocks the command.
    pub veto_triggers: BTreeSet<ConditionTag>,
}

impl Role {
    /// Creates a role with no keywords and no veto triggers.
    ///
    /// The priority is clamped to [`MAX_PRIORITY`].
    #[must_use]
    pub fn new(id: impl Into<RoleId>, base_priority: u8) -> Self {
        Self {
            id: id.into(),
            base_priority: base_priority.min(MAX_PRIORITY),
            activation_keywords: BTreeSet::new(),
            veto_triggers: BTreeSet::new(),
        }
    }

    /// Placeholder for a role id the priority table does not know.
    ///
    /// It ranks lowest and can never veto.
    #[must_use]
    pub fn unknown(id: RoleId) -> Self {
        Self::new(id, 0)
    }

    /// Adds activation keywords.
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.activation_keywords.extend(
            keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty()),
        );
        self
    }

    /// Adds veto triggers.
    #[must_use]
    pub fn with_veto_triggers(mut self, triggers: impl IntoIterator<Item = ConditionTag>) -> Self {
        self.veto_triggers.extend(triggers);
        self
    }

    /// Returns true if the role can veto under the given condition.
    #[must_use]
    pub fn vetoes_on(&self, tag: ConditionTag) -> bool {
        self.veto_triggers.contains(&tag)
    }
}
