/// Game-server command client boundary.
///
/// The engine never talks to the server socket itself — it consumes this
/// trait. One method per moderation command, plus the two snapshot fetches
/// the event processor takes once per event. Implementations own their own
/// latency, retry, and serialization behavior.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Allies,
    Axis,
}

/// One player's entry in the roster snapshot. Wire-shaped: every stat
/// defaults so a partial payload still deserializes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub team: Option<Team>,
    #[serde(default)]
    pub is_vip: bool,
    #[serde(default)]
    pub kills: u32,
    #[serde(default)]
    pub deaths: u32,
    #[serde(default)]
    pub teamkills: u32,
    #[serde(default)]
    pub combat: u32,
    #[serde(default)]
    pub offense: u32,
    #[serde(default)]
    pub defense: u32,
    #[serde(default)]
    pub support: u32,
    #[serde(default)]
    pub kills_per_minute: f64,
    #[serde(default)]
    pub deaths_per_minute: f64,
    #[serde(default)]
    pub kills_streak: u32,
    /// Seconds on the server this session (resets on map change).
    #[serde(default)]
    pub playtime_seconds: u64,
}

/// Point-in-time match state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchState {
    #[serde(default)]
    pub current_map: String,
    #[serde(default)]
    pub allied_players: u32,
    #[serde(default)]
    pub axis_players: u32,
    /// Raw remaining-time string as reported by the server, `H:MM:SS`.
    #[serde(default)]
    pub time_remaining: String,
}

// ---------------------------------------------------------------------------
// GameClient
// ---------------------------------------------------------------------------

/// Commands the action executor can issue, and the snapshot reads the event
/// processor takes. The implementation is expected to serialize or safely
/// interleave its own calls; the engine adds no locking of its own.
pub trait GameClient: Send + Sync {
    /// Roster snapshot keyed by player id.
    fn detailed_players(&self) -> Result<HashMap<String, PlayerSnapshot>>;
    fn match_state(&self) -> Result<MatchState>;

    fn message_player(&self, player_id: &str, message: &str) -> Result<()>;
    fn message_all(&self, message: &str) -> Result<()>;
    fn kick(&self, player_id: &str, player_name: &str, reason: &str, by: &str) -> Result<()>;
    fn punish(&self, player_id: &str, reason: &str) -> Result<()>;
    fn temp_ban(
        &self,
        player_id: &str,
        player_name: &str,
        duration_hours: u64,
        reason: &str,
        by: &str,
    ) -> Result<()>;
    fn perma_ban(&self, player_id: &str, player_name: &str, reason: &str, by: &str) -> Result<()>;
    fn flag_player(&self, player_id: &str, player_name: &str, flag: &str, comment: &str)
        -> Result<()>;
    fn unflag_player(&self, player_id: &str, flag: &str) -> Result<()>;
    fn watch_player(&self, player_id: &str, player_name: &str, reason: &str, by: &str)
        -> Result<()>;
    fn set_broadcast(&self, message: &str) -> Result<()>;
    fn temporary_broadcast(&self, message: &str, duration_seconds: u64) -> Result<()>;
    /// Move the player to the opposite team immediately.
    fn switch_player(&self, player_id: &str) -> Result<()>;
}
