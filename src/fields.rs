/// Field resolution — maps a condition's field to a concrete value.
///
/// Three live sources: the per-event roster snapshot, the per-event match
/// state, and the profile store (the only one consulted lazily, because a
/// lookup costs a query). Resolution never fails loudly: anything missing
/// or broken resolves to `None`, and a `None` field makes the owning
/// condition false (fail-closed).
use crate::client::{MatchState, PlayerSnapshot, Team};
use crate::config::Value;
use crate::profile::ProfileStore;
use serde::{Deserialize, Serialize};

/// Readable attributes a condition can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    /// Constant-true sentinel, for rules that should fire on every event.
    AlwaysTrue,

    // Identity
    PlayerName,
    PlayerId,
    PlayerLevel,
    IsVip,

    // Live match stats
    Kills,
    Deaths,
    KillDeathRatio,
    Teamkills,
    Combat,
    Offense,
    Defense,
    Support,
    KillsPerMinute,
    DeathsPerMinute,
    KillsStreak,
    PlaytimeSeconds,

    // Persisted profile stats
    TotalPlaytimeSeconds,
    SessionsCount,
    PenaltyCount,

    // Match / server state
    ServerPlayerCount,
    TeamPlayerCount,
    MapName,
    MatchTimeRemaining,
}

/// Parse the server's `H:MM:SS` remaining-time string into total seconds.
/// Anything malformed counts as 0 — a bad clock must not raise.
fn clock_to_seconds(raw: &str) -> u64 {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 3 {
        return 0;
    }
    let (Ok(h), Ok(m), Ok(s)) = (
        parts[0].trim().parse::<u64>(),
        parts[1].parse::<u64>(),
        parts[2].parse::<u64>(),
    ) else {
        return 0;
    };
    h * 3_600 + m * 60 + s
}

/// Resolve `field` for `player_id`. `None` means "absent" — snapshot
/// missing, sub-value missing, or profile lookup failed.
pub fn resolve(
    field: ConditionField,
    player_id: &str,
    player: Option<&PlayerSnapshot>,
    state: Option<&MatchState>,
    profiles: &dyn ProfileStore,
) -> Option<Value> {
    use ConditionField::*;

    match field {
        AlwaysTrue => Some(Value::Bool(true)),

        PlayerName => player.map(|p| Value::Str(p.name.clone())),
        PlayerId   => Some(Value::Str(player_id.to_owned())),
        PlayerLevel => player.and_then(|p| p.level).map(|l| Value::Int(l as i64)),
        // A player we cannot see is not a VIP.
        IsVip => Some(Value::Bool(player.map(|p| p.is_vip).unwrap_or(false))),

        Kills     => player.map(|p| Value::Int(p.kills as i64)),
        Deaths    => player.map(|p| Value::Int(p.deaths as i64)),
        Teamkills => player.map(|p| Value::Int(p.teamkills as i64)),
        Combat    => player.map(|p| Value::Int(p.combat as i64)),
        Offense   => player.map(|p| Value::Int(p.offense as i64)),
        Defense   => player.map(|p| Value::Int(p.defense as i64)),
        Support   => player.map(|p| Value::Int(p.support as i64)),
        KillsPerMinute  => player.map(|p| Value::Float(p.kills_per_minute)),
        DeathsPerMinute => player.map(|p| Value::Float(p.deaths_per_minute)),
        KillsStreak     => player.map(|p| Value::Int(p.kills_streak as i64)),
        PlaytimeSeconds => player.map(|p| Value::Int(p.playtime_seconds as i64)),

        // kills/deaths, except a zero-death player reports plain kills —
        // never a division by zero, never infinity.
        KillDeathRatio => player.map(|p| {
            if p.deaths > 0 {
                Value::Float(p.kills as f64 / p.deaths as f64)
            } else {
                Value::Int(p.kills as i64)
            }
        }),

        TotalPlaytimeSeconds | SessionsCount | PenaltyCount => {
            match profiles.profile(player_id) {
                Ok(Some(profile)) => Some(match field {
                    TotalPlaytimeSeconds => Value::Int(profile.total_playtime_seconds as i64),
                    SessionsCount        => Value::Int(profile.sessions_count as i64),
                    _                    => Value::Int(profile.penalty_count as i64),
                }),
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!("Profile lookup failed for {}: {}", player_id, e);
                    None
                }
            }
        }

        ServerPlayerCount => {
            state.map(|s| Value::Int((s.allied_players + s.axis_players) as i64))
        }
        MapName => state.map(|s| Value::Str(s.current_map.clone())),
        MatchTimeRemaining => {
            state.map(|s| Value::Int(clock_to_seconds(&s.time_remaining) as i64))
        }

        // Needs both snapshots and a team assignment; counts that team only.
        TeamPlayerCount => match (player.and_then(|p| p.team), state) {
            (Some(Team::Allies), Some(s)) => Some(Value::Int(s.allied_players as i64)),
            (Some(Team::Axis), Some(s))   => Some(Value::Int(s.axis_players as i64)),
            _ => None,
        },
    }
}
