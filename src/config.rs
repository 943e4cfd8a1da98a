//! Arbiter configuration.
//!
//! Configuration is plain serde data loaded once at startup from YAML or JSON.
//! It is only *parsed* here; `Snapshot::compile` validates it and turns it
//! into the immutable structures the resolution path reads.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::role::{ConditionTag, RoleId, MAX_PRIORITY};

/// Top-level configuration.
///
/// Sections a file leaves out take the built-in defaults. Default entries that
/// name roles the file does not define are dropped; role references the file
/// spells out are kept and checked when the snapshot compiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ConfigFile")]
pub struct ArbiterConfig {
    /// Role entries. Their order is the veto check order.
    pub roles: Vec<RoleEntry>,
    /// Strategy selection thresholds.
    pub thresholds: StrategyThresholds,
    /// Situational weighting.
    pub weighting: WeightingConfig,
    /// Veto denylists.
    pub veto: VetoConfig,
    /// Known antagonistic role pairs.
    pub oppositions: Vec<[String; 2]>,
    /// Keyword axes whose poles pull toward mutually exclusive outcomes.
    pub goal_axes: Vec<GoalAxis>,
    /// Resolutions slower than this are logged as budget overruns.
    pub latency_budget_micros: u64,
}

/// `ArbiterConfig` as written on disk, with role-bearing sections optional.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    roles: Vec<RoleEntry>,
    #[serde(default)]
    thresholds: StrategyThresholds,
    #[serde(default)]
    weighting: WeightingFile,
    #[serde(default)]
    veto: VetoConfig,
    oppositions: Option<Vec<[String; 2]>>,
    #[serde(default = "default_goal_axes")]
    goal_axes: Vec<GoalAxis>,
    #[serde(default = "default_latency_budget_micros")]
    latency_budget_micros: u64,
}

impl From<ConfigFile> for ArbiterConfig {
    fn from(file: ConfigFile) -> Self {
        let defined: HashSet<RoleId> = file.roles.iter().map(|r| RoleId::new(&r.id)).collect();
        let known = |id: &str| defined.contains(&RoleId::new(id));

        let weighting = file.weighting.resolve(&known);
        let oppositions = file.oppositions.unwrap_or_else(|| {
            default_oppositions()
                .into_iter()
                .filter(|[a, b]| known(a.as_str()) && known(b.as_str()))
                .collect()
        });

        Self {
            roles: file.roles,
            thresholds: file.thresholds,
            weighting,
            veto: file.veto,
            oppositions,
            goal_axes: file.goal_axes,
            latency_budget_micros: file.latency_budget_micros,
        }
    }
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            roles: default_roles(),
            thresholds: StrategyThresholds::default(),
            weighting: WeightingConfig::default(),
            veto: VetoConfig::default(),
            oppositions: default_oppositions(),
            goal_axes: default_goal_axes(),
            latency_budget_micros: default_latency_budget_micros(),
        }
    }
}

impl ArbiterConfig {
    /// Parses configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Parses configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Reads configuration from a file. `.json` files are parsed as JSON,
    /// everything else as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&raw)
        } else {
            Self::from_yaml(&raw)
        }
    }

    /// Serializes to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Stable BLAKE3 fingerprint of the configuration content.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let mut hasher = blake3::Hasher::new();
        serde_json::to_writer(&mut hasher, self).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        Ok(hasher.finalize().to_hex().to_string())
    }
}

/// A role as written in configuration.
///
/// `base_priority` is read as a wide integer so out-of-range values surface
/// as `ConfigError::PriorityOutOfRange` rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleEntry {
    /// Role id.
    pub id: String,
    /// Priority in [0, 10].
    pub base_priority: i64,
    /// Activation keywords.
    #[serde(default)]
    pub activation_keywords: Vec<String>,
    /// Veto conditions.
    #[serde(default)]
    pub veto_triggers: Vec<ConditionTag>,
}

impl RoleEntry {
    fn persona(
        id: &str,
        base_priority: i64,
        keywords: &[&str],
        veto_triggers: &[ConditionTag],
    ) -> Self {
        Self {
            id: id.to_string(),
            base_priority,
            activation_keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            veto_triggers: veto_triggers.to_vec(),
        }
    }
}

/// Strategy selection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrategyThresholds {
    /// Base-priority lead that makes one conflicting role dominant.
    pub priority_gap: u8,
    /// Negotiation round cap.
    pub negotiation_rounds: u32,
    /// Negotiation convergence epsilon on stance deltas.
    pub negotiation_epsilon: f64,
    /// Fraction of each round's gap a stance closes toward its compromise.
    pub negotiation_damping: f64,
    /// Cumulative weight the consensus bloc must reach.
    pub consensus_threshold: f64,
}

impl Default for StrategyThresholds {
    fn default() -> Self {
        Self {
            priority_gap: 3,
            negotiation_rounds: 3,
            negotiation_epsilon: 0.05,
            negotiation_damping: 0.5,
            consensus_threshold: 0.75,
        }
    }
}

impl StrategyThresholds {
    /// Rejects thresholds the strategies cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |name: &str, value: f64, reason: &str| ConfigError::InvalidThreshold {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };

        if self.priority_gap == 0 || self.priority_gap > MAX_PRIORITY {
            return Err(invalid("priorityGap", f64::from(self.priority_gap), "must be in [1, 10]"));
        }
        if self.negotiation_rounds == 0 {
            return Err(invalid("negotiationRounds", 0.0, "must be at least 1"));
        }
        if !(self.negotiation_epsilon.is_finite() && self.negotiation_epsilon > 0.0) {
            return Err(invalid("negotiationEpsilon", self.negotiation_epsilon, "must be positive"));
        }
        if !(self.negotiation_damping > 0.0 && self.negotiation_damping <= 1.0) {
            return Err(invalid("negotiationDamping", self.negotiation_damping, "must be in (0, 1]"));
        }
        if !(self.consensus_threshold > 0.0 && self.consensus_threshold <= 1.0) {
            return Err(invalid("consensusThreshold", self.consensus_threshold, "must be in (0, 1]"));
        }
        Ok(())
    }
}

/// Situational weighting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeightingConfig {
    /// Per-environment, per-role multipliers. Keys are environment names.
    pub environment_multipliers: BTreeMap<String, BTreeMap<String, f64>>,
    /// Regexes identifying sensitive target resources.
    pub sensitive_patterns: Vec<String>,
    /// Roles boosted when a sensitive resource is targeted.
    pub sensitive_roles: Vec<String>,
    /// Multiplier for sensitive resources.
    pub sensitive_multiplier: f64,
    /// Keywords that signal a risky command.
    pub caution_keywords: Vec<String>,
    /// Minimum caution tokens / all tokens ratio that triggers the boost.
    pub caution_density: f64,
    /// Roles boosted by caution density.
    pub caution_roles: Vec<String>,
    /// Multiplier for caution density.
    pub caution_multiplier: f64,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        let mut environment_multipliers = BTreeMap::new();
        environment_multipliers.insert(
            "production".to_string(),
            BTreeMap::from([("security".to_string(), 1.5)]),
        );
        environment_multipliers.insert(
            "staging".to_string(),
            BTreeMap::from([("security".to_string(), 1.2)]),
        );

        Self {
            environment_multipliers,
            sensitive_patterns: strings(&[
                r"(?i)(?:^|/)\.env(?:\.|$)",
                r"(?i)credential",
                r"(?i)secret",
                r"(?i)id_rsa",
                r"(?i)\.(?:pem|key|p12|pfx)$",
                r"(?i)(?:^|[/_.-])prod(?:uction)?(?:[/_.-][^/]*)?\.(?:ya?ml|json|toml|ini|conf|env)$",
            ]),
            sensitive_roles: strings(&["security"]),
            sensitive_multiplier: 2.0,
            caution_keywords: strings(&[
                "delete", "drop", "remove", "rm", "force", "production", "prod", "deploy",
                "migrate", "credential", "secret", "password", "truncate", "overwrite", "reset",
            ]),
            caution_density: 0.2,
            caution_roles: strings(&["security", "qa"]),
            caution_multiplier: 1.25,
        }
    }
}

/// `WeightingConfig` as written on disk.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeightingFile {
    environment_multipliers: Option<BTreeMap<String, BTreeMap<String, f64>>>,
    sensitive_patterns: Option<Vec<String>>,
    sensitive_roles: Option<Vec<String>>,
    sensitive_multiplier: Option<f64>,
    caution_keywords: Option<Vec<String>>,
    caution_density: Option<f64>,
    caution_roles: Option<Vec<String>>,
    caution_multiplier: Option<f64>,
}

impl WeightingFile {
    fn resolve(self, known: &dyn Fn(&str) -> bool) -> WeightingConfig {
        let defaults = WeightingConfig::default();
        let keep = |ids: Vec<String>| -> Vec<String> { ids.into_iter().filter(|id| known(id.as_str())).collect() };

        let environment_multipliers = match self.environment_multipliers {
            Some(written) => written,
            None => defaults
                .environment_multipliers
                .into_iter()
                .map(|(env, per_role)| {
                    let per_role = per_role.into_iter().filter(|(id, _)| known(id.as_str())).collect();
                    (env, per_role)
                })
                .collect(),
        };

        WeightingConfig {
            environment_multipliers,
            sensitive_patterns: self.sensitive_patterns.unwrap_or(defaults.sensitive_patterns),
            sensitive_roles: self.sensitive_roles.unwrap_or_else(|| keep(defaults.sensitive_roles)),
            sensitive_multiplier: self.sensitive_multiplier.unwrap_or(defaults.sensitive_multiplier),
            caution_keywords: self.caution_keywords.unwrap_or(defaults.caution_keywords),
            caution_density: self.caution_density.unwrap_or(defaults.caution_density),
            caution_roles: self.caution_roles.unwrap_or_else(|| keep(defaults.caution_roles)),
            caution_multiplier: self.caution_multiplier.unwrap_or(defaults.caution_multiplier),
        }
    }
}

/// Veto denylists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VetoConfig {
    /// Regexes for destructive commands.
    pub unsafe_operation_patterns: Vec<String>,
    /// Regexes for commands that expose credentials.
    pub credential_exposure_patterns: Vec<String>,
    /// Regexes for command switches that disable validation.
    pub skip_validation_patterns: Vec<String>,
    /// Flag names that disable validation when truthy.
    pub skip_validation_flags: Vec<String>,
    /// Flag that, when explicitly false in production, marks the change unreviewed.
    pub review_flag: String,
}

impl Default for VetoConfig {
    fn default() -> Self {
        Self {
            unsafe_operation_patterns: strings(&[
                r"(?i)\brm\s+(?:--?[a-z-]+\s+)*(?:-[a-z]*r[a-z]*|--recursive)\s+(?:--?[a-z-]+\s+)*(?:(?:/|~)\S*|\*)",
                r"(?i)\bmkfs(?:\.[a-z0-9]+)?\b",
                r"(?i)\bdd\s+.*\bof=/dev/",
                r":\(\)\s*\{\s*:\|:&\s*\};\s*:",
                r"(?i)\bdrop\s+(?:database|schema)\b",
                r"(?i)\bchmod\s+-R\s+777\s+/(?:\s|$)",
                r"(?i)\bgit\s+push\s+.*(?:--force|-f)\b.*\b(?:main|master)\b",
                r">\s*/dev/sd[a-z]",
            ]),
            credential_exposure_patterns: strings(&[
                r"(?i)\b(?:echo|print|printf)\s+.*\$\{?[a-z_]*(?:secret|token|password|api_key|private_key)[a-z_]*\}?",
                r"(?i)\bcat\s+\S*(?:\.env|id_rsa|\.pem|credentials)\b",
                r#"(?i)\b(?:password|passwd|api[_-]?key|secret|token)(?:\s*=\s*\S+|:\S+|\s*:\s*(?:"[^"]+"|'[^']+'|[a-z0-9_+/-]{16,}))"#,
                r"-----BEGIN (?:RSA |EC |OPENSSH )?PRIVATE KEY-----",
            ]),
            skip_validation_patterns: strings(&[
                r"(?i)--skip-validation\b",
                r"(?i)--no-verify\b",
                r"(?i)--skip-checks\b",
            ]),
            skip_validation_flags: strings(&[
                "skipValidation",
                "skip_validation",
                "skip-validation",
                "noVerify",
                "no_verify",
                "skipChecks",
            ]),
            review_flag: "reviewed".to_string(),
        }
    }
}

/// Two keyword poles pulling toward mutually exclusive outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalAxis {
    /// Axis name used in the resolution trail.
    pub name: String,
    /// Keywords of the first pole.
    pub pole_a: Vec<String>,
    /// Keywords of the second pole.
    pub pole_b: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn default_latency_budget_micros() -> u64 {
    100_000
}

fn default_oppositions() -> Vec<[String; 2]> {
    [
        ["security", "performance"],
        ["frontend", "backend"],
        ["architect", "performance"],
        ["qa", "devops"],
    ]
    .iter()
    .map(|[a, b]| [(*a).to_string(), (*b).to_string()])
    .collect()
}

fn default_goal_axes() -> Vec<GoalAxis> {
    vec![
        GoalAxis {
            name: "speed_vs_safety".to_string(),
            pole_a: strings(&["fast", "quick", "optimize", "speed", "cache", "shortcut", "latency"]),
            pole_b: strings(&["secure", "validate", "verify", "audit", "harden", "test", "encrypt"]),
        },
        GoalAxis {
            name: "ship_vs_restructure".to_string(),
            pole_a: strings(&["ship", "hotfix", "release", "deploy", "patch"]),
            pole_b: strings(&["refactor", "redesign", "restructure", "cleanup", "modular"]),
        },
    ]
}

/// The default advisor personas.
#[must_use]
pub fn default_roles() -> Vec<RoleEntry> {
    use ConditionTag::{CredentialExposure, SkipValidation, UnreviewedProductionChange, UnsafeOperation};

    vec![
        RoleEntry::persona(
            "security",
            10,
            &[
                "security", "auth", "authentication", "vulnerability", "secret", "credential",
                "token", "encrypt", "audit", "harden", "permission", "password", "injection", "xss",
            ],
            &[UnsafeOperation, SkipValidation, CredentialExposure, UnreviewedProductionChange],
        ),
        RoleEntry::persona(
            "architect",
            8,
            &[
                "architecture", "design", "structure", "scalability", "system", "modular",
                "dependency", "boundary", "maintainability", "redesign", "restructure",
            ],
            &[],
        ),
        RoleEntry::persona(
            "qa",
            7,
            &[
                "test", "quality", "coverage", "verify", "validate", "edge case", "regression",
                "e2e",
            ],
            &[SkipValidation],
        ),
        RoleEntry::persona(
            "performance",
            7,
            &[
                "performance", "optimize", "speed", "latency", "cache", "fast", "bottleneck",
                "throughput", "memory", "profiling",
            ],
            &[],
        ),
        RoleEntry::persona(
            "devops",
            7,
            &[
                "deploy", "deployment", "ci", "pipeline", "infrastructure", "docker",
                "kubernetes", "monitoring", "release", "ship",
            ],
            &[UnsafeOperation, UnreviewedProductionChange],
        ),
        RoleEntry::persona(
            "backend",
            6,
            &[
                "backend", "api", "server", "database", "endpoint", "service", "rest", "query",
                "schema",
            ],
            &[],
        ),
        RoleEntry::persona(
            "frontend",
            6,
            &[
                "frontend", "ui", "ux", "component", "css", "react", "page", "layout",
                "accessibility", "responsive", "client",
            ],
            &[],
        ),
        RoleEntry::persona(
            "analyzer",
            6,
            &["analyze", "investigate", "debug", "root cause", "trace", "diagnose"],
            &[],
        ),
        RoleEntry::persona(
            "refactorer",
            5,
            &["refactor", "cleanup", "simplify", "technical debt", "duplicate", "readability"],
            &[],
        ),
        RoleEntry::persona(
            "mentor",
            4,
            &["explain", "teach", "learn", "guide", "walkthrough"],
            &[],
        ),
        RoleEntry::persona(
            "scribe",
            3,
            &["docs", "documentation", "readme", "changelog", "comment"],
            &[],
        ),
    ]
}
