//! Context weighting.
//!
//! A role's weight is its base priority scaled by situational multipliers:
//! the environment table, sensitive target resources and the density of
//! caution keywords in the command. Weighting is pure: the same context and
//! roles always yield the same weights.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use regex::Regex;

use crate::config::WeightingConfig;
use crate::context::{Environment, ExecutionContext};
use crate::error::ConfigError;
use crate::priority::PriorityTable;
use crate::role::{Role, RoleId};

/// Per-role weights for one request.
pub type Weights = BTreeMap<RoleId, f64>;

/// Compiled weighting rules.
#[derive(Debug, Clone)]
pub struct ContextWeigher {
    environment: HashMap<Environment, HashMap<RoleId, f64>>,
    sensitive_patterns: Vec<Regex>,
    sensitive_roles: BTreeSet<RoleId>,
    sensitive_multiplier: f64,
    caution_keywords: Vec<String>,
    caution_density: f64,
    caution_roles: BTreeSet<RoleId>,
    caution_multiplier: f64,
}

impl ContextWeigher {
    /// Validates and compiles weighting configuration against a table.
    pub fn compile(config: &WeightingConfig, table: &PriorityTable) -> Result<Self, ConfigError> {
        let mut environment = HashMap::new();
        for (name, multipliers) in &config.environment_multipliers {
            let env = Environment::parse(name).ok_or_else(|| ConfigError::Parse {
                message: format!("unknown environment '{name}' in weighting.environmentMultipliers"),
            })?;
            let mut per_role = HashMap::new();
            for (role, factor) in multipliers {
                let id = defined_role(table, role, "weighting.environmentMultipliers")?;
                per_role.insert(id, positive("environmentMultiplier", *factor)?);
            }
            environment.insert(env, per_role);
        }

        let sensitive_patterns = config
            .sensitive_patterns
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<Result<Vec<_>, _>>()?;

        let caution_density = config.caution_density;
        if !(caution_density > 0.0 && caution_density <= 1.0) {
            return Err(ConfigError::InvalidThreshold {
                name: "cautionDensity".to_string(),
                value: caution_density,
                reason: "must be in (0, 1]".to_string(),
            });
        }

        Ok(Self {
            environment,
            sensitive_patterns,
            sensitive_roles: defined_roles(table, &config.sensitive_roles, "weighting.sensitiveRoles")?,
            sensitive_multiplier: positive("sensitiveMultiplier", config.sensitive_multiplier)?,
            caution_keywords: config
                .caution_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            caution_density,
            caution_roles: defined_roles(table, &config.caution_roles, "weighting.cautionRoles")?,
            caution_multiplier: positive("cautionMultiplier", config.caution_multiplier)?,
        })
    }

    /// Computes the weight of every role for this context.
    #[must_use]
    pub fn weights_for(&self, context: &ExecutionContext, roles: &[Role]) -> Weights {
        let sensitive = self.touches_sensitive_resource(context);
        let cautious = self.caution_density_of(context) >= self.caution_density;
        let env_table = self.environment.get(&context.environment);

        roles
            .iter()
            .map(|role| {
                let mut weight = f64::from(role.base_priority);
                if let Some(factor) = env_table.and_then(|t| t.get(&role.id)) {
                    weight *= factor;
                }
                if sensitive && self.sensitive_roles.contains(&role.id) {
                    weight *= self.sensitive_multiplier;
                }
                if cautious && self.caution_roles.contains(&role.id) {
                    weight *= self.caution_multiplier;
                }
                (role.id.clone(), weight)
            })
            .collect()
    }

    /// Returns true if any target resource matches a sensitive pattern.
    #[must_use]
    pub fn touches_sensitive_resource(&self, context: &ExecutionContext) -> bool {
        context
            .target_resources
            .iter()
            .any(|r| self.sensitive_patterns.iter().any(|p| p.is_match(r)))
    }

    /// Fraction of command tokens that are caution keywords.
    #[must_use]
    pub fn caution_density_of(&self, context: &ExecutionContext) -> f64 {
        let tokens = context.command_tokens();
        if tokens.is_empty() {
            return 0.0;
        }
        let hits = tokens
            .iter()
            .filter(|t| self.caution_keywords.iter().any(|k| k == *t))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let density = hits as f64 / tokens.len() as f64;
        density
    }
}

pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn defined_role(table: &PriorityTable, id: &str, context: &str) -> Result<RoleId, ConfigError> {
    let role = RoleId::new(id);
    if table.contains(&role) {
        Ok(role)
    } else {
        Err(ConfigError::UndefinedRole {
            id: id.to_string(),
            context: context.to_string(),
        })
    }
}

fn defined_roles(table: &PriorityTable, ids: &[String], context: &str) -> Result<BTreeSet<RoleId>, ConfigError> {
    ids.iter().map(|id| defined_role(table, id, context)).collect()
}

fn positive(name: &str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidThreshold {
            name: name.to_string(),
            value,
            reason: "must be a positive finite number".to_string(),
        })
    }
}
