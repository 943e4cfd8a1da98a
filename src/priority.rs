//! The priority table: validated, read-only role metadata.

use std::collections::{BTreeSet, HashMap};

use crate::config::RoleEntry;
use crate::error::ConfigError;
use crate::role::{ConditionTag, Role, RoleId, MAX_PRIORITY};
use crate::text::{mentions, tokenize};

/// Validated role metadata in configured order.
///
/// The configured order is the veto check order and never changes for the
/// lifetime of a table.
#[derive(Debug, Clone)]
pub struct PriorityTable {
    roles: Vec<Role>,
    index: HashMap<RoleId, usize>,
}

impl PriorityTable {
    /// Builds a table from configuration entries.
    ///
    /// # Errors
    /// - `NoRoles` when `entries` is empty
    /// - `EmptyRoleId` / `DuplicateRole` for bad ids
    /// - `PriorityOutOfRange` when a priority is outside [0, 10]
    pub fn from_entries(entries: &[RoleEntry]) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::NoRoles);
        }

        let mut roles = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());

        for entry in entries {
            let id = RoleId::new(&entry.id);
            if id.as_str().is_empty() {
                return Err(ConfigError::EmptyRoleId);
            }
            let priority = u8::try_from(entry.base_priority)
                .ok()
                .filter(|p| *p <= MAX_PRIORITY)
                .ok_or_else(|| ConfigError::PriorityOutOfRange {
                    id: entry.id.clone(),
                    value: entry.base_priority,
                })?;

            if index.insert(id.clone(), roles.len()).is_some() {
                return Err(ConfigError::DuplicateRole {
                    id: id.to_string(),
                });
            }

            roles.push(
                Role::new(id, priority)
                    .with_keywords(&entry.activation_keywords)
                    .with_veto_triggers(entry.veto_triggers.iter().copied()),
            );
        }

        Ok(Self { roles, index })
    }

    /// Returns the role with the given id.
    #[must_use]
    pub fn role(&self, id: &RoleId) -> Option<&Role> {
        self.index.get(id).map(|&i| &self.roles[i])
    }

    /// Returns true if the role is defined.
    #[must_use]
    pub fn contains(&self, id: &RoleId) -> bool {
        self.index.contains_key(id)
    }

    /// Base priority of a role, if defined.
    #[must_use]
    pub fn priority_of(&self, id: &RoleId) -> Option<u8> {
        self.role(id).map(|r| r.base_priority)
    }

    /// Veto triggers of a role. Undefined roles have none.
    #[must_use]
    pub fn veto_triggers_of(&self, id: &RoleId) -> BTreeSet<ConditionTag> {
        self.role(id)
            .map(|r| r.veto_triggers.clone())
            .unwrap_or_default()
    }

    /// Position of a role in the configured check order.
    #[must_use]
    pub fn check_position(&self, id: &RoleId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Roles in configured order.
    #[must_use]
    pub fn check_order(&self) -> &[Role] {
        &self.roles
    }

    /// Number of defined roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Returns true if no roles are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Roles whose activation keywords appear in `command`, highest priority
    /// first (configured order breaks ties).
    #[must_use]
    pub fn suggest_roles(&self, command: &str) -> Vec<RoleId> {
        let tokens = tokenize(command);
        let mut hits: Vec<(usize, &Role)> = self
            .roles
            .iter()
            .enumerate()
            .filter(|(_, role)| role.activation_keywords.iter().any(|k| mentions(&tokens, k)))
            .collect();

        hits.sort_by(|(ia, a), (ib, b)| b.base_priority.cmp(&a.base_priority).then(ia.cmp(ib)));
        hits.into_iter().map(|(_, role)| role.id.clone()).collect()
    }
}
