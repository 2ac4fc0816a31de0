/// Rule and event orchestration — ties the gate, the evaluator, and the
/// action executor together.
///
/// One `process_event` call = one config load + one roster snapshot + one
/// match-state snapshot, then every subscribed rule in configuration order.
/// Rules are independent: a gate denial, a false condition, or a failing
/// action in one rule never affects the next. The only hard stop is a
/// failed snapshot fetch, which abandons the whole event (fail-closed).
use crate::actions;
use crate::client::{GameClient, MatchState, PlayerSnapshot};
use crate::conditions;
use crate::config::{ConfigSource, Rule, TriggerEvent};
use crate::gate::ExecutionGate;
use crate::profile::ProfileStore;
use crate::store::{self, KvStore};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

pub struct EventProcessor {
    client:   Arc<dyn GameClient>,
    profiles: Arc<dyn ProfileStore>,
    store:    Arc<dyn KvStore>,
    config:   Arc<dyn ConfigSource>,
}

impl EventProcessor {
    pub fn new(
        client: Arc<dyn GameClient>,
        profiles: Arc<dyn ProfileStore>,
        store: Arc<dyn KvStore>,
        config: Arc<dyn ConfigSource>,
    ) -> Self {
        Self { client, profiles, store, config }
    }

    /// Entry point, one call per observed server event. For match-start and
    /// match-end the roster fans out: every connected player is evaluated
    /// against every subscribed rule, from the one snapshot taken here.
    pub fn process_event(&self, trigger: TriggerEvent, player_id: &str) {
        let config = match self.config.load() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Configuration load failed: {}", e);
                return;
            }
        };
        if !config.enabled {
            tracing::debug!("Moderation rules disabled — ignoring {:?}", trigger);
            return;
        }

        tracing::debug!("Processing {:?} for player {}", trigger, player_id);

        let (players, state) = match self.snapshots() {
            Ok(snapshots) => snapshots,
            Err(e) => {
                tracing::error!("Failed to fetch server snapshots — event abandoned: {}", e);
                return;
            }
        };

        let matching: Vec<&Rule> = config
            .rules
            .iter()
            .filter(|r| r.trigger_event == trigger)
            .collect();
        tracing::debug!("{} rules subscribed to {:?}", matching.len(), trigger);

        match trigger {
            TriggerEvent::MatchStart | TriggerEvent::MatchEnd => {
                for (pid, snapshot) in &players {
                    for rule in &matching {
                        self.process_rule(rule, pid, Some(snapshot), Some(&state));
                    }
                }
            }
            _ => {
                // The player may already be gone from the roster (e.g. a
                // disconnect event) — rules still run, fields fail closed.
                let player = players.get(player_id);
                for rule in &matching {
                    self.process_rule(rule, player_id, player, Some(&state));
                }
            }
        }
    }

    /// Per-rule state machine: disabled → stop; gated → stop; conditions
    /// false → stop; else run every action in order, then record.
    pub fn process_rule(
        &self,
        rule: &Rule,
        player_id: &str,
        player: Option<&PlayerSnapshot>,
        state: Option<&MatchState>,
    ) {
        if !rule.enabled {
            return;
        }

        let now = store::now_secs();
        let gate = ExecutionGate::new(self.store.as_ref());
        if !gate.allowed(rule, player_id, now) {
            tracing::debug!("Rule '{}' gated for player {}", rule.name, player_id);
            return;
        }

        let results: Vec<bool> = rule
            .conditions
            .iter()
            .map(|c| conditions::evaluate(c, player_id, player, state, self.profiles.as_ref()))
            .collect();
        tracing::debug!(
            "[{}] condition results {:?}, combinator {:?}",
            rule.name,
            results,
            rule.logical_operator
        );
        if !conditions::combine(rule.logical_operator, &results) {
            tracing::debug!("Rule '{}' conditions not met for player {}", rule.name, player_id);
            return;
        }

        let player_name = player.map(|p| p.name.as_str()).unwrap_or("Unknown");
        tracing::info!("Rule '{}' triggered for {} ({})", rule.name, player_name, player_id);

        for action in &rule.actions {
            actions::execute(self.client.as_ref(), action, player_id, player_name, &rule.name);
        }

        gate.record(rule, player_id, now);
    }

    fn snapshots(&self) -> Result<(HashMap<String, PlayerSnapshot>, MatchState)> {
        Ok((self.client.detailed_players()?, self.client.match_state()?))
    }
}
