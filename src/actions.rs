/// Action execution — the side-effecting half of a rule.
///
/// One exhaustive match arm per action type; each arm reads its parameters
/// (required keys were enforced at config-save time, optional ones default
/// here), issues exactly one client call, and logs a confirmation. A
/// failing client call is logged with the rule name and action type and
/// never stops the remaining actions of the same rule.
use crate::client::GameClient;
use crate::config::{Action, Value};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// ActionType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    MessagePlayer,
    MessageAllPlayers,
    KickPlayer,
    PunishPlayer,
    TempBanPlayer,
    PermaBanPlayer,
    AddPlayerFlag,
    RemovePlayerFlag,
    AddToWatchlist,
    BroadcastMessage,
    TemporaryBroadcast,
    SendWebhook,
    SwitchPlayerTeam,
}

impl ActionType {
    /// Parameter keys that must be present for the action to be saved.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            ActionType::MessagePlayer      => &["message"],
            ActionType::MessageAllPlayers  => &["message"],
            ActionType::KickPlayer         => &["reason"],
            ActionType::PunishPlayer       => &["reason"],
            ActionType::TempBanPlayer      => &["reason", "duration_hours"],
            ActionType::PermaBanPlayer     => &["reason"],
            ActionType::AddPlayerFlag      => &["flag"],
            ActionType::RemovePlayerFlag   => &["flag"],
            ActionType::AddToWatchlist     => &["reason"],
            ActionType::BroadcastMessage   => &["message"],
            ActionType::TemporaryBroadcast => &["message", "duration_seconds"],
            ActionType::SendWebhook        => &["webhook_url", "message"],
            ActionType::SwitchPlayerTeam   => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::MessagePlayer      => "message_player",
            ActionType::MessageAllPlayers  => "message_all_players",
            ActionType::KickPlayer         => "kick_player",
            ActionType::PunishPlayer       => "punish_player",
            ActionType::TempBanPlayer      => "temp_ban_player",
            ActionType::PermaBanPlayer     => "perma_ban_player",
            ActionType::AddPlayerFlag      => "add_player_flag",
            ActionType::RemovePlayerFlag   => "remove_player_flag",
            ActionType::AddToWatchlist     => "add_to_watchlist",
            ActionType::BroadcastMessage   => "broadcast_message",
            ActionType::TemporaryBroadcast => "temporary_broadcast",
            ActionType::SendWebhook        => "send_webhook",
            ActionType::SwitchPlayerTeam   => "switch_player_team",
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter helpers
// ---------------------------------------------------------------------------

fn str_param(params: &HashMap<String, Value>, key: &str, default: &str) -> String {
    params
        .get(key)
        .map(|v| v.to_string())
        .unwrap_or_else(|| default.to_owned())
}

fn u64_param(params: &HashMap<String, Value>, key: &str, default: u64) -> u64 {
    params.get(key).and_then(Value::as_u64).unwrap_or(default)
}

/// Attribution string the server records for moderation commands.
fn issued_by(rule_name: &str) -> String {
    format!("Warden[{}]", rule_name)
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run one action for one player. Never returns an error — failures are
/// logged so the caller can keep dispatching the rest of the rule.
pub fn execute(
    client: &dyn GameClient,
    action: &Action,
    player_id: &str,
    player_name: &str,
    rule_name: &str,
) {
    if let Err(e) = dispatch(client, action, player_id, player_name, rule_name) {
        tracing::error!(
            "[{}] Failed to execute action {}: {}",
            rule_name,
            action.action_type.as_str(),
            e
        );
    }
}

fn dispatch(
    client: &dyn GameClient,
    action: &Action,
    player_id: &str,
    player_name: &str,
    rule_name: &str,
) -> Result<()> {
    let params = &action.parameters;

    match action.action_type {
        ActionType::MessagePlayer => {
            let message = str_param(params, "message", "");
            client.message_player(player_id, &message)?;
            tracing::info!("[{}] Messaged {}: {}", rule_name, player_name, message);
        }

        ActionType::MessageAllPlayers => {
            let message = str_param(params, "message", "");
            client.message_all(&message)?;
            tracing::info!("[{}] Messaged all players: {}", rule_name, message);
        }

        ActionType::KickPlayer => {
            let reason = str_param(params, "reason", "Kicked by server rule");
            client.kick(player_id, player_name, &reason, &issued_by(rule_name))?;
            tracing::info!("[{}] Kicked {}: {}", rule_name, player_name, reason);
        }

        ActionType::PunishPlayer => {
            let reason = str_param(params, "reason", "Punished by server rule");
            client.punish(player_id, &reason)?;
            tracing::info!("[{}] Punished {}: {}", rule_name, player_name, reason);
        }

        ActionType::TempBanPlayer => {
            let reason = str_param(params, "reason", "Banned by server rule");
            let duration_hours = u64_param(params, "duration_hours", 2);
            client.temp_ban(
                player_id,
                player_name,
                duration_hours,
                &reason,
                &issued_by(rule_name),
            )?;
            tracing::info!(
                "[{}] Temp banned {} for {}h: {}",
                rule_name,
                player_name,
                duration_hours,
                reason
            );
        }

        ActionType::PermaBanPlayer => {
            let reason = str_param(params, "reason", "Banned by server rule");
            client.perma_ban(player_id, player_name, &reason, &issued_by(rule_name))?;
            tracing::info!("[{}] Perma banned {}: {}", rule_name, player_name, reason);
        }

        ActionType::AddPlayerFlag => {
            let flag = str_param(params, "flag", "");
            let comment = str_param(params, "comment", &format!("Added by rule: {}", rule_name));
            client.flag_player(player_id, player_name, &flag, &comment)?;
            tracing::info!("[{}] Added flag '{}' to {}", rule_name, flag, player_name);
        }

        ActionType::RemovePlayerFlag => {
            let flag = str_param(params, "flag", "");
            client.unflag_player(player_id, &flag)?;
            tracing::info!("[{}] Removed flag '{}' from {}", rule_name, flag, player_name);
        }

        ActionType::AddToWatchlist => {
            let reason = str_param(params, "reason", &format!("Added by rule: {}", rule_name));
            client.watch_player(player_id, player_name, &reason, &issued_by(rule_name))?;
            tracing::info!("[{}] Added {} to watchlist", rule_name, player_name);
        }

        ActionType::BroadcastMessage => {
            let message = str_param(params, "message", "");
            client.set_broadcast(&message)?;
            tracing::info!("[{}] Set broadcast: {}", rule_name, message);
        }

        ActionType::TemporaryBroadcast => {
            let message = str_param(params, "message", "");
            let duration = u64_param(params, "duration_seconds", 60);
            client.temporary_broadcast(&message, duration)?;
            tracing::info!("[{}] Temporary broadcast for {}s: {}", rule_name, duration, message);
        }

        ActionType::SendWebhook => {
            // Declared but not wired: read the parameters so a bad config
            // still surfaces in logs, make no network call.
            // TODO: deliver to webhook_url once the notifier gets an HTTP client.
            let _webhook_url = str_param(params, "webhook_url", "");
            let message = str_param(params, "message", "");
            tracing::info!("[{}] Webhook notification (stub): {}", rule_name, message);
        }

        ActionType::SwitchPlayerTeam => {
            client.switch_player(player_id)?;
            tracing::info!("[{}] Switched {} to the opposite team", rule_name, player_name);
        }
    }

    Ok(())
}
