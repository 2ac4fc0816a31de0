/// Per-(rule, player) rate limiting: a cooldown window and an execution
/// counter, both held in the shared key-value store.
///
/// Check and record are two separate store operations. Two events for the
/// same (rule, player) landing in that window can both pass before either
/// records — the limiter is a throttle, not a ledger. Kept that way on
/// purpose; see DESIGN.md.
use crate::config::Rule;
use crate::store::KvStore;

/// Window the last-execution timestamp lives for when the rule has no
/// cooldown of its own.
const DEFAULT_COOLDOWN_WINDOW_SECS: u64 = 3_600;
/// Execution counters always expire after 24h, independent of cooldown.
const EXECUTION_COUNTER_TTL_SECS: u64 = 86_400;

fn last_exec_key(rule_id: &str, player_id: &str) -> String {
    format!("warden:last_exec:{}:{}", rule_id, player_id)
}

fn exec_count_key(rule_id: &str, player_id: &str) -> String {
    format!("warden:executions:{}:{}", rule_id, player_id)
}

pub struct ExecutionGate<'a> {
    store: &'a dyn KvStore,
}

impl<'a> ExecutionGate<'a> {
    pub fn new(store: &'a dyn KvStore) -> Self {
        Self { store }
    }

    /// Both the cooldown and the execution-count check must pass.
    /// `now` is wall-clock seconds, injected by the caller.
    pub fn allowed(&self, rule: &Rule, player_id: &str, now: u64) -> bool {
        self.cooldown_clear(rule, player_id, now) && self.under_limit(rule, player_id)
    }

    fn cooldown_clear(&self, rule: &Rule, player_id: &str, now: u64) -> bool {
        if rule.cooldown_seconds == 0 {
            return true;
        }
        let Some(raw) = self.store.get(&last_exec_key(&rule.id, player_id)) else {
            return true;
        };
        let Ok(last_exec) = raw.parse::<u64>() else {
            tracing::warn!("Unreadable last-execution timestamp '{}' for rule {}", raw, rule.id);
            return true;
        };
        now > last_exec + rule.cooldown_seconds
    }

    fn under_limit(&self, rule: &Rule, player_id: &str) -> bool {
        if rule.max_executions_per_player == 0 {
            return true;
        }
        let Some(raw) = self.store.get(&exec_count_key(&rule.id, player_id)) else {
            return true;
        };
        match raw.parse::<u64>() {
            Ok(count) => count < rule.max_executions_per_player as u64,
            Err(_) => {
                tracing::warn!("Unreadable execution count '{}' for rule {}", raw, rule.id);
                true
            }
        }
    }

    /// Called once, after the rule's actions have been dispatched.
    pub fn record(&self, rule: &Rule, player_id: &str, now: u64) {
        let ttl = if rule.cooldown_seconds > 0 {
            rule.cooldown_seconds
        } else {
            DEFAULT_COOLDOWN_WINDOW_SECS
        };
        self.store
            .set(&last_exec_key(&rule.id, player_id), &now.to_string(), ttl);

        let count_key = exec_count_key(&rule.id, player_id);
        self.store.incr(&count_key);
        self.store.expire(&count_key, EXECUTION_COUNTER_TTL_SECS);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::bare_rule;
    use crate::store::MemoryStore;

    const T: u64 = 1_700_000_000;

    #[test]
    fn zero_cooldown_always_clear() {
        let store = MemoryStore::new();
        let gate = ExecutionGate::new(&store);
        let rule = bare_rule("r");

        gate.record(&rule, "p1", T);
        assert!(gate.allowed(&rule, "p1", T));
        assert!(gate.allowed(&rule, "p1", T + 1));
    }

    #[test]
    fn cooldown_denies_then_allows() {
        let store = MemoryStore::new();
        let gate = ExecutionGate::new(&store);
        let mut rule = bare_rule("r");
        rule.cooldown_seconds = 60;

        assert!(gate.allowed(&rule, "p1", T), "never executed — allowed");
        gate.record(&rule, "p1", T);

        assert!(!gate.allowed(&rule, "p1", T + 30));
        assert!(!gate.allowed(&rule, "p1", T + 60), "boundary is strict");
        assert!(gate.allowed(&rule, "p1", T + 61));
    }

    #[test]
    fn cooldown_is_per_player() {
        let store = MemoryStore::new();
        let gate = ExecutionGate::new(&store);
        let mut rule = bare_rule("r");
        rule.cooldown_seconds = 60;

        gate.record(&rule, "p1", T);
        assert!(!gate.allowed(&rule, "p1", T + 10));
        assert!(gate.allowed(&rule, "p2", T + 10));
    }

    #[test]
    fn execution_limit_counts_per_player() {
        let store = MemoryStore::new();
        let gate = ExecutionGate::new(&store);
        let mut rule = bare_rule("r");
        rule.max_executions_per_player = 1;

        assert!(gate.allowed(&rule, "p1", T));
        gate.record(&rule, "p1", T);

        assert!(!gate.allowed(&rule, "p1", T + 999), "limit reached for p1");
        assert!(gate.allowed(&rule, "p2", T + 999), "p2 unaffected");
    }

    #[test]
    fn both_checks_must_pass() {
        let store = MemoryStore::new();
        let gate = ExecutionGate::new(&store);
        let mut rule = bare_rule("r");
        rule.cooldown_seconds = 60;
        rule.max_executions_per_player = 1;

        gate.record(&rule, "p1", T);
        // Cooldown elapsed, but the counter still blocks.
        assert!(!gate.allowed(&rule, "p1", T + 120));
    }

    #[test]
    fn distinct_rules_do_not_share_state() {
        let store = MemoryStore::new();
        let gate = ExecutionGate::new(&store);
        let mut a = bare_rule("a");
        a.max_executions_per_player = 1;
        let mut b = bare_rule("b");
        b.max_executions_per_player = 1;

        gate.record(&a, "p1", T);
        assert!(!gate.allowed(&a, "p1", T + 1));
        assert!(gate.allowed(&b, "p1", T + 1));
    }
}
