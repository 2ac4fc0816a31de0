/// Rule configuration — the declarative data model the engine evaluates.
///
/// A `WardenConfig` is a master switch plus an ordered list of rules. Each
/// rule names the event that makes it eligible, the conditions to check,
/// and the actions to run when they hold. The engine never mutates a rule;
/// the only mutable state is the per-(rule, player) gate store.
///
/// Validation happens when a configuration is accepted (TOML load, JSON
/// intake, save), never per event: a batch with a duplicate rule id, an
/// empty condition/action list, or an action missing a required parameter
/// is rejected whole.
use crate::actions::ActionType;
use crate::conditions::{ComparisonOperator, LogicalOperator};
use crate::fields::ConditionField;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Value — condition targets, resolved fields, and action parameters
// ---------------------------------------------------------------------------

/// A scalar config value. Untagged, so TOML/JSON literals map directly:
/// `true` → Bool, `42` → Int, `1.5` → Float, `"MP40"` → Str.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Numeric view used by the ordering operators. Strings parse, bools
    /// count as 0/1 (matching their numeric meaning in stat fields).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b)  => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i)   => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s)   => s.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(i) if *i >= 0 => Some(*i as u64),
            Value::Float(f) if *f >= 0.0 => Some(*f as u64),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b)  => write!(f, "{}", b),
            Value::Int(i)   => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s)   => write!(f, "{}", s),
        }
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// The server event that makes a rule eligible to run.
///
/// `Periodic` is part of the wire format for forward compatibility, but the
/// hook layer never dispatches it — rules using it never fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    PlayerConnected,
    PlayerDisconnected,
    PlayerKill,
    PlayerDeath,
    PlayerTeamKill,
    MatchStart,
    MatchEnd,
    Periodic,
}

// ---------------------------------------------------------------------------
// Conditions, actions, rules
// ---------------------------------------------------------------------------

/// A single field/operator/value comparison. Whether the comparison makes
/// sense for the resolved field is decided at evaluation time — a numeric
/// operator against a map name just evaluates false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field:    ConditionField,
    pub operator: ComparisonOperator,
    pub value:    Value,
}

/// One side-effecting operation, with its parameter bag. Required keys per
/// action type are enforced by `WardenConfig::validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub action_type: ActionType,
    #[serde(default)]
    pub parameters:  HashMap<String, Value>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id:   String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub trigger_event: TriggerEvent,
    #[serde(default)]
    pub logical_operator: LogicalOperator,
    /// Minimum seconds between executions for the same player (0 = none).
    #[serde(default)]
    pub cooldown_seconds: u64,
    /// Max executions per player within the counter window (0 = unlimited).
    #[serde(default)]
    pub max_executions_per_player: u32,
    pub conditions: Vec<Condition>,
    pub actions:    Vec<Action>,
}

// ---------------------------------------------------------------------------
// WardenConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Master switch. Off by default — a fresh install must not moderate.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate rule id '{0}'")]
    DuplicateRuleId(String),
    #[error("rule '{rule}' has no conditions")]
    NoConditions { rule: String },
    #[error("rule '{rule}' has no actions")]
    NoActions { rule: String },
    #[error("rule '{rule}': action '{action}' missing required parameters {missing:?}")]
    MissingParameters {
        rule:    String,
        action:  String,
        missing: Vec<&'static str>,
    },
    #[error("configuration parse error: {0}")]
    Parse(String),
}

impl WardenConfig {
    /// Batch validation — rejects the whole configuration on the first
    /// problem so a bad save can never leave a half-valid rule set behind.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(ConfigError::DuplicateRuleId(rule.id.clone()));
            }
            if rule.conditions.is_empty() {
                return Err(ConfigError::NoConditions { rule: rule.id.clone() });
            }
            if rule.actions.is_empty() {
                return Err(ConfigError::NoActions { rule: rule.id.clone() });
            }
            for action in &rule.actions {
                let missing: Vec<&'static str> = action
                    .action_type
                    .required_params()
                    .iter()
                    .copied()
                    .filter(|key| !action.parameters.contains_key(*key))
                    .collect();
                if !missing.is_empty() {
                    return Err(ConfigError::MissingParameters {
                        rule:   rule.id.clone(),
                        action: action.action_type.as_str().to_owned(),
                        missing,
                    });
                }
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON document — the shape the settings API
    /// submits. Unknown enum strings fail here, before any event sees them.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: WardenConfig =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: WardenConfig =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

pub fn load_or_default(path: &Path) -> Result<WardenConfig> {
    if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let cfg = WardenConfig::from_toml(&raw)
            .map_err(|e| anyhow::anyhow!("Config load error: {}", e))?;
        Ok(cfg)
    } else {
        Ok(WardenConfig::default())
    }
}

pub fn save(config: &WardenConfig, path: &Path) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Config rejected: {}", e))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("Config serialize error: {}", e))?;
    std::fs::write(path, raw)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// ConfigSource — how the processor reads the current configuration
// ---------------------------------------------------------------------------

/// The processor loads the configuration once per event through this seam,
/// so edits take effect on the next event without a restart.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<WardenConfig>;
}

pub struct TomlConfigSource {
    path: PathBuf,
}

impl TomlConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for TomlConfigSource {
    fn load(&self) -> Result<WardenConfig> {
        load_or_default(&self.path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{action, rule_with, simple_condition};
    use tempfile::tempdir;

    fn valid_rule(id: &str) -> Rule {
        rule_with(
            id,
            TriggerEvent::PlayerKill,
            vec![simple_condition(
                ConditionField::Kills,
                ComparisonOperator::GreaterThan,
                Value::Int(10),
            )],
            vec![action(
                ActionType::MessagePlayer,
                &[("message", Value::Str("nice streak".into()))],
            )],
        )
    }

    #[test]
    fn round_trips_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("warden.toml");

        let cfg = WardenConfig {
            enabled: true,
            rules:   vec![valid_rule("r1"), valid_rule("r2")],
        };
        save(&cfg, &path).unwrap();

        let loaded = load_or_default(&path).unwrap();
        assert!(loaded.enabled);
        assert_eq!(loaded.rules.len(), 2);
        assert_eq!(loaded.rules[0].id, "r1");
        assert_eq!(loaded.rules[0].trigger_event, TriggerEvent::PlayerKill);
    }

    #[test]
    fn returns_default_when_missing() {
        let dir = tempdir().unwrap();
        let cfg = load_or_default(&dir.path().join("nope.toml")).unwrap();
        assert!(!cfg.enabled, "master switch must default off");
        assert!(cfg.rules.is_empty());
    }

    #[test]
    fn rejects_duplicate_rule_ids() {
        let cfg = WardenConfig {
            enabled: true,
            rules:   vec![valid_rule("same"), valid_rule("same")],
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DuplicateRuleId(id)) if id == "same"
        ));
    }

    #[test]
    fn rejects_empty_conditions_and_actions() {
        let mut cfg = WardenConfig { enabled: true, rules: vec![valid_rule("r")] };
        cfg.rules[0].conditions.clear();
        assert!(matches!(cfg.validate(), Err(ConfigError::NoConditions { .. })));

        let mut cfg = WardenConfig { enabled: true, rules: vec![valid_rule("r")] };
        cfg.rules[0].actions.clear();
        assert!(matches!(cfg.validate(), Err(ConfigError::NoActions { .. })));
    }

    #[test]
    fn rejects_missing_required_parameters() {
        let mut cfg = WardenConfig { enabled: true, rules: vec![valid_rule("r")] };
        cfg.rules[0].actions = vec![action(ActionType::TempBanPlayer, &[])];

        match cfg.validate() {
            Err(ConfigError::MissingParameters { missing, .. }) => {
                assert!(missing.contains(&"reason"));
                assert!(missing.contains(&"duration_hours"));
            }
            other => panic!("expected MissingParameters, got {:?}", other),
        }
    }

    #[test]
    fn save_refuses_invalid_batch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        let cfg = WardenConfig {
            enabled: true,
            rules:   vec![valid_rule("dup"), valid_rule("dup")],
        };
        assert!(save(&cfg, &path).is_err());
        assert!(!path.exists(), "rejected config must not be written");
    }

    #[test]
    fn json_intake_parses_and_validates() {
        let raw = r#"{
            "enabled": true,
            "rules": [{
                "id": "tk-warn",
                "name": "Teamkill warning",
                "trigger_event": "player_team_kill",
                "conditions": [
                    { "field": "teamkills", "operator": "greater_than_or_equal", "value": 2 }
                ],
                "actions": [
                    { "action_type": "message_player", "parameters": { "message": "Watch your fire" } }
                ]
            }]
        }"#;

        let cfg = WardenConfig::from_json(raw).unwrap();
        assert_eq!(cfg.rules.len(), 1);
        assert_eq!(cfg.rules[0].trigger_event, TriggerEvent::PlayerTeamKill);
        assert!(cfg.rules[0].enabled, "enabled defaults true per rule");
        assert_eq!(cfg.rules[0].cooldown_seconds, 0);
    }

    #[test]
    fn json_intake_rejects_unknown_enum_strings() {
        let raw = r#"{
            "enabled": true,
            "rules": [{
                "id": "r", "name": "r",
                "trigger_event": "player_levitates",
                "conditions": [{ "field": "kills", "operator": "equal", "value": 1 }],
                "actions": [{ "action_type": "message_player", "parameters": { "message": "x" } }]
            }]
        }"#;
        assert!(matches!(WardenConfig::from_json(raw), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn value_coercions() {
        assert_eq!(Value::Int(7).as_f64(), Some(7.0));
        assert_eq!(Value::Str(" 2.5 ".into()).as_f64(), Some(2.5));
        assert_eq!(Value::Bool(true).as_f64(), Some(1.0));
        assert_eq!(Value::Str("MP40".into()).as_f64(), None);
        assert_eq!(Value::Int(-1).as_u64(), None);
        assert_eq!(Value::Float(3.9).as_u64(), Some(3));
    }
}
