/// Player-profile history boundary.
///
/// Lifetime stats live outside the engine (the history database). The field
/// resolver looks a profile up synchronously when a rule references one of
/// the persisted fields; a failed lookup degrades to "field absent".
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerProfile {
    #[serde(default)]
    pub total_playtime_seconds: u64,
    #[serde(default)]
    pub sessions_count: u32,
    #[serde(default)]
    pub penalty_count: u32,
}

pub trait ProfileStore: Send + Sync {
    /// `Ok(None)` — no history for this player. `Err` — the store itself
    /// failed; callers treat both as an absent field.
    fn profile(&self, player_id: &str) -> Result<Option<PlayerProfile>>;
}
