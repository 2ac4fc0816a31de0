/// Event-hook surface — the seam between the log stream and the engine.
///
/// One dispatch per observed log line. A kill line is two independent
/// triggers from the same event: `player_kill` for the killer, then
/// `player_death` for the victim. A team kill triggers for the killer
/// only. Match start/end carry no player; the processor fans out over the
/// roster itself.
use crate::config::TriggerEvent;
use crate::parser::LogLine;
use crate::processor::EventProcessor;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;

pub fn dispatch(processor: &EventProcessor, line: &LogLine) {
    match line {
        LogLine::Connected { player_id, player_name, .. } => {
            tracing::debug!("{} connected", player_name);
            processor.process_event(TriggerEvent::PlayerConnected, player_id);
        }

        LogLine::Disconnected { player_id, player_name, .. } => {
            tracing::debug!("{} disconnected", player_name);
            processor.process_event(TriggerEvent::PlayerDisconnected, player_id);
        }

        LogLine::Kill { killer_id, victim_id, .. } => {
            processor.process_event(TriggerEvent::PlayerKill, killer_id);
            processor.process_event(TriggerEvent::PlayerDeath, victim_id);
        }

        LogLine::TeamKill { killer_id, .. } => {
            processor.process_event(TriggerEvent::PlayerTeamKill, killer_id);
        }

        LogLine::MatchStart { map_name, .. } => {
            tracing::info!("Match started on {}", map_name);
            processor.process_event(TriggerEvent::MatchStart, "");
        }

        LogLine::MatchEnd { map_name, allied_score, axis_score, .. } => {
            tracing::info!(
                "Match ended on {} — ALLIED {} : {} AXIS",
                map_name,
                allied_score,
                axis_score
            );
            processor.process_event(TriggerEvent::MatchEnd, "");
        }
    }
}

/// Async dispatch task: receives typed log lines and drives the processor.
/// Runs until the sender side of the pipeline closes.
pub async fn run(mut rx: Receiver<LogLine>, processor: Arc<EventProcessor>) -> Result<()> {
    while let Some(line) = rx.recv().await {
        dispatch(&processor, &line);
    }
    tracing::info!("Log stream closed — hook dispatch exiting");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileStore;
    use crate::store::MemoryStore;
    use crate::testutil::{message_rule, player, Issued, MockClient, NoProfiles, StaticConfig};

    fn kill_line() -> LogLine {
        LogLine::Kill {
            timestamp:   1_606_340_690,
            killer_name: "A".to_owned(),
            killer_id:   "pA".to_owned(),
            victim_name: "B".to_owned(),
            victim_id:   "pB".to_owned(),
            weapon:      "MP40".to_owned(),
        }
    }

    fn processor_with(client: Arc<MockClient>, rules: Vec<crate::config::Rule>) -> EventProcessor {
        EventProcessor::new(
            client,
            Arc::new(NoProfiles) as Arc<dyn ProfileStore>,
            Arc::new(MemoryStore::new()),
            Arc::new(StaticConfig::enabled(rules)),
        )
    }

    #[test]
    fn kill_triggers_killer_and_victim_rules() {
        let client = Arc::new(MockClient::new());
        client.add_player("pA", player("A", "pA"));
        client.add_player("pB", player("B", "pB"));

        let proc = processor_with(
            client.clone(),
            vec![
                message_rule("on-kill", TriggerEvent::PlayerKill, "nice shot"),
                message_rule("on-death", TriggerEvent::PlayerDeath, "unlucky"),
            ],
        );

        dispatch(&proc, &kill_line());

        let issued = client.issued();
        assert_eq!(issued.len(), 2, "one per trigger, from the same event");
        match (&issued[0], &issued[1]) {
            (
                Issued::MessagePlayer { player_id: first, message: m1 },
                Issued::MessagePlayer { player_id: second, message: m2 },
            ) => {
                assert_eq!((first.as_str(), m1.as_str()), ("pA", "nice shot"));
                assert_eq!((second.as_str(), m2.as_str()), ("pB", "unlucky"));
            }
            other => panic!("unexpected calls: {:?}", other),
        }
    }

    #[test]
    fn team_kill_triggers_killer_only() {
        let client = Arc::new(MockClient::new());
        client.add_player("pA", player("A", "pA"));
        client.add_player("pB", player("B", "pB"));

        let proc = processor_with(
            client.clone(),
            vec![
                message_rule("on-tk", TriggerEvent::PlayerTeamKill, "do not teamkill"),
                message_rule("on-death", TriggerEvent::PlayerDeath, "unlucky"),
            ],
        );

        dispatch(
            &proc,
            &LogLine::TeamKill {
                timestamp:   1,
                killer_name: "A".to_owned(),
                killer_id:   "pA".to_owned(),
                victim_name: "B".to_owned(),
                victim_id:   "pB".to_owned(),
                weapon:      "M1 GARAND".to_owned(),
            },
        );

        match &client.issued()[..] {
            [Issued::MessagePlayer { player_id, message }] => {
                assert_eq!(player_id, "pA");
                assert_eq!(message, "do not teamkill");
            }
            other => panic!("unexpected calls: {:?}", other),
        }
    }

    #[test]
    fn connect_routes_to_connected_rules() {
        let client = Arc::new(MockClient::new());
        client.add_player("p1", player("Newcomer", "p1"));

        let proc = processor_with(
            client.clone(),
            vec![message_rule("welcome", TriggerEvent::PlayerConnected, "welcome!")],
        );

        dispatch(
            &proc,
            &LogLine::Connected {
                timestamp:   1,
                player_name: "Newcomer".to_owned(),
                player_id:   "p1".to_owned(),
            },
        );

        assert_eq!(client.issued().len(), 1);
    }

    #[tokio::test]
    async fn run_drains_the_channel() {
        let client = Arc::new(MockClient::new());
        client.add_player("pA", player("A", "pA"));
        client.add_player("pB", player("B", "pB"));

        let proc = Arc::new(processor_with(
            client.clone(),
            vec![message_rule("on-kill", TriggerEvent::PlayerKill, "gg")],
        ));

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tx.send(kill_line()).await.unwrap();
        tx.send(kill_line()).await.unwrap();
        drop(tx);

        run(rx, proc).await.unwrap();
        assert_eq!(client.issued().len(), 2);
    }
}
