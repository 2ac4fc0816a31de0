/// Parses raw server log lines into typed `LogLine` structs.
///
/// Lines arrive with a relative-time prefix carrying the epoch timestamp:
///
///   [29:42 min (1606340690)] KILL: [CPC] xALF(Allies/76561198...) -> Karad(Axis/76561198...) with MK2_GRENADE
///   [1.9 sec (1606340677)] CONNECTED [CPC] xALF (76561198449588171)
///   [30 sec (1606340678)] DISCONNECTED Dieter Müller (76561199155763211)
///   [123 ms (1606340800)] TEAM KILL: A(Allies/7656...) -> B(Allies/7656...) with M1 GARAND
///   [5 sec (1606341000)] MATCH START SAINTE-MÈRE-ÉGLISE Warfare
///   [8 sec (1606344600)] MATCH ENDED `SAINTE-MÈRE-ÉGLISE Warfare` ALLIED (2 - 3) AXIS
///
/// Player names may contain spaces, clan tags, and parentheses, so actor
/// fields are split from the *last* '(' of the segment. Unrecognised lines
/// are skipped silently — the server logs far more kinds than we react to.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{Receiver, Sender};

/// Typed server events the moderation engine cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LogLine {
    Connected {
        timestamp:   u64,
        player_name: String,
        player_id:   String,
    },
    Disconnected {
        timestamp:   u64,
        player_name: String,
        player_id:   String,
    },
    Kill {
        timestamp:   u64,
        killer_name: String,
        killer_id:   String,
        victim_name: String,
        victim_id:   String,
        weapon:      String,
    },
    TeamKill {
        timestamp:   u64,
        killer_name: String,
        killer_id:   String,
        victim_name: String,
        victim_id:   String,
        weapon:      String,
    },
    MatchStart {
        timestamp: u64,
        map_name:  String,
    },
    MatchEnd {
        timestamp:    u64,
        map_name:     String,
        allied_score: u32,
        axis_score:   u32,
    },
}

impl LogLine {
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::Connected { timestamp, .. }    => *timestamp,
            Self::Disconnected { timestamp, .. } => *timestamp,
            Self::Kill { timestamp, .. }         => *timestamp,
            Self::TeamKill { timestamp, .. }     => *timestamp,
            Self::MatchStart { timestamp, .. }   => *timestamp,
            Self::MatchEnd { timestamp, .. }     => *timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Split the `[relative (epoch)] ` prefix, returning (epoch, payload).
fn split_prefix(raw: &str) -> Option<(u64, &str)> {
    let rest = raw.strip_prefix('[')?;
    let close = rest.find(")] ")?;
    let head = &rest[..close];
    let payload = &rest[close + 3..];

    let open = head.rfind('(')?;
    let timestamp: u64 = head[open + 1..].trim().parse().ok()?;
    Some((timestamp, payload))
}

/// Split `Name(Team/id)` or `Name (id)` into (name, id). The team tag, when
/// present, is dropped — the roster snapshot is the authority on teams.
fn parse_actor(raw: &str) -> Option<(String, String)> {
    let open = raw.rfind('(')?;
    let name = raw[..open].trim();
    let inner = raw[open + 1..].trim_end().strip_suffix(')')?;
    let id = inner.rsplit('/').next()?.trim();
    if name.is_empty() || id.is_empty() {
        return None;
    }
    Some((name.to_owned(), id.to_owned()))
}

/// Parse `A(.../id) -> B(.../id) with WEAPON` into both actors + weapon.
fn parse_kill_payload(raw: &str) -> Option<(String, String, String, String, String)> {
    let (killer_raw, rest) = raw.split_once(" -> ")?;
    let (victim_raw, weapon) = rest.rsplit_once(" with ")?;
    let (killer_name, killer_id) = parse_actor(killer_raw)?;
    let (victim_name, victim_id) = parse_actor(victim_raw)?;
    Some((killer_name, killer_id, victim_name, victim_id, weapon.trim().to_owned()))
}

/// Parse `` `MAP` ALLIED (a - x) AXIS `` into (map, allied, axis).
fn parse_match_end_payload(raw: &str) -> Option<(String, u32, u32)> {
    let rest = raw.trim_start().strip_prefix('`')?;
    let (map_name, scores) = rest.split_once('`')?;
    let open = scores.find('(')?;
    let close = scores.find(')')?;
    let (allied, axis) = scores.get(open + 1..close)?.split_once('-')?;
    Some((
        map_name.trim().to_owned(),
        allied.trim().parse().ok()?,
        axis.trim().parse().ok()?,
    ))
}

pub fn parse_line(raw: &str) -> Option<LogLine> {
    let (timestamp, payload) = split_prefix(raw.trim())?;

    if let Some(rest) = payload.strip_prefix("KILL: ") {
        let (killer_name, killer_id, victim_name, victim_id, weapon) = parse_kill_payload(rest)?;
        return Some(LogLine::Kill { timestamp, killer_name, killer_id, victim_name, victim_id, weapon });
    }
    if let Some(rest) = payload.strip_prefix("TEAM KILL: ") {
        let (killer_name, killer_id, victim_name, victim_id, weapon) = parse_kill_payload(rest)?;
        return Some(LogLine::TeamKill { timestamp, killer_name, killer_id, victim_name, victim_id, weapon });
    }
    if let Some(rest) = payload.strip_prefix("CONNECTED ") {
        let (player_name, player_id) = parse_actor(rest)?;
        return Some(LogLine::Connected { timestamp, player_name, player_id });
    }
    if let Some(rest) = payload.strip_prefix("DISCONNECTED ") {
        let (player_name, player_id) = parse_actor(rest)?;
        return Some(LogLine::Disconnected { timestamp, player_name, player_id });
    }
    if let Some(rest) = payload.strip_prefix("MATCH ENDED ") {
        let (map_name, allied_score, axis_score) = parse_match_end_payload(rest)?;
        return Some(LogLine::MatchEnd { timestamp, map_name, allied_score, axis_score });
    }
    if let Some(rest) = payload.strip_prefix("MATCH START ") {
        let map_name = rest.trim();
        if map_name.is_empty() {
            return None;
        }
        return Some(LogLine::MatchStart { timestamp, map_name: map_name.to_owned() });
    }

    None // Unrecognised line kind — silently skip
}

/// Async pipeline task: receive raw lines, parse, forward typed events.
pub async fn run(mut rx: Receiver<String>, tx: Sender<LogLine>) -> Result<()> {
    while let Some(line) = rx.recv().await {
        if let Some(event) = parse_line(&line) {
            if tx.send(event).await.is_err() {
                break;
            }
        }
    }
    Ok(())
}
