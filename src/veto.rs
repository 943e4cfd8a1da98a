//! Veto evaluation.
//!
//! The veto check runs before anything else. Roles are visited in the
//! priority table's configured order and each role's triggers in
//! `ConditionTag` order; the first matching trigger blocks the command.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::VetoConfig;
use crate::context::{Environment, ExecutionContext};
use crate::error::ConfigError;
use crate::priority::PriorityTable;
use crate::role::{ConditionTag, Role, RoleId};
use crate::weigher::compile_pattern;

/// A fired veto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VetoDecision {
    /// The role that blocked the command.
    pub role: RoleId,
    /// The condition that matched.
    pub trigger: ConditionTag,
    /// What matched: the offending command fragment or flag name.
    pub evidence: String,
}

impl VetoDecision {
    /// Human-readable reason, e.g.
    /// ``role `security` vetoed on unsafe_operation: matched `rm -rf /` ``.
    #[must_use]
    pub fn reason(&self) -> String {
        format!(
            "role `{}` vetoed on {}: {}",
            self.role, self.trigger, self.evidence
        )
    }
}

/// Compiled veto denylists.
#[derive(Debug, Clone)]
pub struct VetoEvaluator {
    unsafe_operation: Vec<Regex>,
    credential_exposure: Vec<Regex>,
    skip_validation: Vec<Regex>,
    skip_validation_flags: Vec<String>,
    review_flag: String,
}

impl VetoEvaluator {
    /// Compiles the denylists, rejecting invalid regexes.
    pub fn compile(config: &VetoConfig) -> Result<Self, ConfigError> {
        let compile_all = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| compile_pattern(p))
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(Self {
            unsafe_operation: compile_all(&config.unsafe_operation_patterns)?,
            credential_exposure: compile_all(&config.credential_exposure_patterns)?,
            skip_validation: compile_all(&config.skip_validation_patterns)?,
            skip_validation_flags: config.skip_validation_flags.clone(),
            review_flag: config.review_flag.clone(),
        })
    }

    /// Runs the veto check for the requested roles.
    ///
    /// Requested roles are visited in table order; roles the table does not
    /// know carry no triggers and are skipped.
    #[must_use]
    pub fn evaluate(
        &self,
        table: &PriorityTable,
        requested: &[Role],
        context: &ExecutionContext,
    ) -> Option<VetoDecision> {
        let mut ordered: Vec<(usize, &Role)> = requested
            .iter()
            .filter_map(|role| table.check_position(&role.id).map(|pos| (pos, role)))
            .collect();
        ordered.sort_by_key(|(pos, _)| *pos);

        ordered.into_iter().find_map(|(_, role)| {
            role.veto_triggers.iter().find_map(|&tag| {
                self.check(tag, context).map(|evidence| VetoDecision {
                    role: role.id.clone(),
                    trigger: tag,
                    evidence,
                })
            })
        })
    }

    /// Tests one condition, returning the evidence if it matches.
    #[must_use]
    pub fn check(&self, tag: ConditionTag, context: &ExecutionContext) -> Option<String> {
        let command = context.command_text.as_str();
        match tag {
            ConditionTag::UnsafeOperation => first_match(&self.unsafe_operation, command)
                .map(|m| format!("unsafe operation `{m}`")),
            ConditionTag::CredentialExposure => first_match(&self.credential_exposure, command)
                .map(|_| "command exposes credentials".to_string()),
            ConditionTag::SkipValidation => self
                .skip_validation_flags
                .iter()
                .find(|name| context.flag(name).is_some_and(|v| v.is_truthy()))
                .map(|name| format!("flag `{name}` skips validation"))
                .or_else(|| {
                    first_match(&self.skip_validation, command)
                        .map(|m| format!("switch `{m}` skips validation"))
                }),
            ConditionTag::UnreviewedProductionChange => {
                let unreviewed = context
                    .flag(&self.review_flag)
                    .is_some_and(|v| v.is_falsy());
                (context.environment == Environment::Production && unreviewed).then(|| {
                    format!("production change with `{}` = false", self.review_flag)
                })
            }
        }
    }
}

fn first_match<'t>(patterns: &[Regex], text: &'t str) -> Option<&'t str> {
    patterns
        .iter()
        .find_map(|p| p.find(text))
        .map(|m| m.as_str().trim())
}
