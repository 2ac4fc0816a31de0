/// Shared test doubles: a recording game client, canned profile stores, a
/// static config source, and small fixture builders. Test-only module.
use crate::actions::ActionType;
use crate::client::{GameClient, MatchState, PlayerSnapshot};
use crate::conditions::{ComparisonOperator, LogicalOperator};
use crate::config::{Action, Condition, ConfigSource, Rule, TriggerEvent, Value, WardenConfig};
use crate::fields::ConditionField;
use crate::profile::{PlayerProfile, ProfileStore};
use anyhow::{bail, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Opt-in log output for a test run: `RUST_LOG=server_warden=debug cargo test`.
/// Safe to call from several tests; only the first init wins.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Fixture builders
// ---------------------------------------------------------------------------

pub fn player(name: &str, player_id: &str) -> PlayerSnapshot {
    PlayerSnapshot {
        name:      name.to_owned(),
        player_id: player_id.to_owned(),
        ..PlayerSnapshot::default()
    }
}

pub fn simple_condition(field: ConditionField, operator: ComparisonOperator, value: Value) -> Condition {
    Condition { field, operator, value }
}

pub fn action(action_type: ActionType, params: &[(&str, Value)]) -> Action {
    Action {
        action_type,
        parameters: params
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect(),
    }
}

pub fn rule_with(
    id: &str,
    trigger_event: TriggerEvent,
    conditions: Vec<Condition>,
    actions: Vec<Action>,
) -> Rule {
    Rule {
        id:   id.to_owned(),
        name: id.to_owned(),
        description: String::new(),
        enabled: true,
        trigger_event,
        logical_operator: LogicalOperator::And,
        conditions,
        actions,
        cooldown_seconds: 0,
        max_executions_per_player: 0,
    }
}

/// Always-firing rule that messages the triggering player.
pub fn message_rule(id: &str, trigger_event: TriggerEvent, text: &str) -> Rule {
    rule_with(
        id,
        trigger_event,
        vec![simple_condition(
            ConditionField::AlwaysTrue,
            ComparisonOperator::Equal,
            Value::Bool(true),
        )],
        vec![action(
            ActionType::MessagePlayer,
            &[("message", Value::Str(text.to_owned()))],
        )],
    )
}

/// Minimal valid rule for gate tests (trigger/conditions are irrelevant).
pub fn bare_rule(id: &str) -> Rule {
    message_rule(id, TriggerEvent::PlayerKill, "x")
}

// ---------------------------------------------------------------------------
// Profile stores
// ---------------------------------------------------------------------------

/// No player has any history.
pub struct NoProfiles;

impl ProfileStore for NoProfiles {
    fn profile(&self, _player_id: &str) -> Result<Option<PlayerProfile>> {
        Ok(None)
    }
}

/// The store itself is down.
pub struct FailingProfiles;

impl ProfileStore for FailingProfiles {
    fn profile(&self, _player_id: &str) -> Result<Option<PlayerProfile>> {
        bail!("profile store unavailable")
    }
}

pub struct StaticProfiles {
    profiles: HashMap<String, PlayerProfile>,
}

impl StaticProfiles {
    pub fn with(player_id: &str, profile: PlayerProfile) -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(player_id.to_owned(), profile);
        Self { profiles }
    }
}

impl ProfileStore for StaticProfiles {
    fn profile(&self, player_id: &str) -> Result<Option<PlayerProfile>> {
        Ok(self.profiles.get(player_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Config source
// ---------------------------------------------------------------------------

pub struct StaticConfig {
    config: WardenConfig,
}

impl StaticConfig {
    pub fn enabled(rules: Vec<Rule>) -> Self {
        Self { config: WardenConfig { enabled: true, rules } }
    }

    pub fn disabled(rules: Vec<Rule>) -> Self {
        Self { config: WardenConfig { enabled: false, rules } }
    }
}

impl ConfigSource for StaticConfig {
    fn load(&self) -> Result<WardenConfig> {
        Ok(self.config.clone())
    }
}

// ---------------------------------------------------------------------------
// Recording game client
// ---------------------------------------------------------------------------

/// Every command the mock saw, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum Issued {
    MessagePlayer { player_id: String, message: String },
    MessageAll { message: String },
    Kick { player_id: String, reason: String, by: String },
    Punish { player_id: String, reason: String },
    TempBan { player_id: String, duration_hours: u64, reason: String, by: String },
    PermaBan { player_id: String, reason: String, by: String },
    Flag { player_id: String, flag: String, comment: String },
    Unflag { player_id: String, flag: String },
    Watch { player_id: String, reason: String, by: String },
    SetBroadcast { message: String },
    TempBroadcast { message: String, duration_seconds: u64 },
    Switch { player_id: String },
}

#[derive(Default)]
pub struct MockClient {
    issued:           Mutex<Vec<Issued>>,
    players:          Mutex<HashMap<String, PlayerSnapshot>>,
    state:            Mutex<MatchState>,
    fail_snapshots:   AtomicBool,
    fail_commands:    Mutex<HashSet<String>>,
    snapshot_fetches: AtomicUsize,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_player(&self, player_id: &str, snapshot: PlayerSnapshot) {
        self.players.lock().unwrap().insert(player_id.to_owned(), snapshot);
    }

    pub fn set_state(&self, state: MatchState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn fail_snapshots(&self) {
        self.fail_snapshots.store(true, Ordering::SeqCst);
    }

    /// Make one named command fail (by `Issued` shape: "kick", "punish", …).
    pub fn fail_on(&self, command: &str) {
        self.fail_commands.lock().unwrap().insert(command.to_owned());
    }

    pub fn issued(&self) -> Vec<Issued> {
        self.issued.lock().unwrap().clone()
    }

    pub fn snapshot_fetches(&self) -> usize {
        self.snapshot_fetches.load(Ordering::SeqCst)
    }

    fn command(&self, name: &str, call: Issued) -> Result<()> {
        if self.fail_commands.lock().unwrap().contains(name) {
            bail!("{} rejected by server", name);
        }
        self.issued.lock().unwrap().push(call);
        Ok(())
    }
}

impl GameClient for MockClient {
    fn detailed_players(&self) -> Result<HashMap<String, PlayerSnapshot>> {
        self.snapshot_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_snapshots.load(Ordering::SeqCst) {
            bail!("server connection lost");
        }
        Ok(self.players.lock().unwrap().clone())
    }

    fn match_state(&self) -> Result<MatchState> {
        self.snapshot_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_snapshots.load(Ordering::SeqCst) {
            bail!("server connection lost");
        }
        Ok(self.state.lock().unwrap().clone())
    }

    fn message_player(&self, player_id: &str, message: &str) -> Result<()> {
        self.command(
            "message_player",
            Issued::MessagePlayer { player_id: player_id.to_owned(), message: message.to_owned() },
        )
    }

    fn message_all(&self, message: &str) -> Result<()> {
        self.command("message_all", Issued::MessageAll { message: message.to_owned() })
    }

    fn kick(&self, player_id: &str, _player_name: &str, reason: &str, by: &str) -> Result<()> {
        self.command(
            "kick",
            Issued::Kick {
                player_id: player_id.to_owned(),
                reason:    reason.to_owned(),
                by:        by.to_owned(),
            },
        )
    }

    fn punish(&self, player_id: &str, reason: &str) -> Result<()> {
        self.command(
            "punish",
            Issued::Punish { player_id: player_id.to_owned(), reason: reason.to_owned() },
        )
    }

    fn temp_ban(
        &self,
        player_id: &str,
        _player_name: &str,
        duration_hours: u64,
        reason: &str,
        by: &str,
    ) -> Result<()> {
        self.command(
            "temp_ban",
            Issued::TempBan {
                player_id: player_id.to_owned(),
                duration_hours,
                reason: reason.to_owned(),
                by:     by.to_owned(),
            },
        )
    }

    fn perma_ban(&self, player_id: &str, _player_name: &str, reason: &str, by: &str) -> Result<()> {
        self.command(
            "perma_ban",
            Issued::PermaBan {
                player_id: player_id.to_owned(),
                reason:    reason.to_owned(),
                by:        by.to_owned(),
            },
        )
    }

    fn flag_player(&self, player_id: &str, _player_name: &str, flag: &str, comment: &str) -> Result<()> {
        self.command(
            "flag_player",
            Issued::Flag {
                player_id: player_id.to_owned(),
                flag:      flag.to_owned(),
                comment:   comment.to_owned(),
            },
        )
    }

    fn unflag_player(&self, player_id: &str, flag: &str) -> Result<()> {
        self.command(
            "unflag_player",
            Issued::Unflag { player_id: player_id.to_owned(), flag: flag.to_owned() },
        )
    }

    fn watch_player(&self, player_id: &str, _player_name: &str, reason: &str, by: &str) -> Result<()> {
        self.command(
            "watch_player",
            Issued::Watch {
                player_id: player_id.to_owned(),
                reason:    reason.to_owned(),
                by:        by.to_owned(),
            },
        )
    }

    fn set_broadcast(&self, message: &str) -> Result<()> {
        self.command("set_broadcast", Issued::SetBroadcast { message: message.to_owned() })
    }

    fn temporary_broadcast(&self, message: &str, duration_seconds: u64) -> Result<()> {
        self.command(
            "temporary_broadcast",
            Issued::TempBroadcast { message: message.to_owned(), duration_seconds },
        )
    }

    fn switch_player(&self, player_id: &str) -> Result<()> {
        self.command("switch_player", Issued::Switch { player_id: player_id.to_owned() })
    }
}
