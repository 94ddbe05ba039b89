//! Bounded per-session message logs.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use helpdesk_core::types::{ChatMessage, Role};

/// Default number of messages kept per session.
pub const DEFAULT_MAX_LENGTH: usize = 10;

/// Ordered, capped message log for every session.
///
/// Logs are created lazily on first append. Once a log grows past
/// `max_length` the oldest messages are evicted.
#[derive(Debug)]
pub struct SessionHistory {
    logs: Mutex<HashMap<String, VecDeque<ChatMessage>>>,
    max_length: usize,
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH)
    }
}

impl SessionHistory {
    pub fn new(max_length: usize) -> Self {
        Self {
            logs: Mutex::new(HashMap::new()),
            max_length,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn logs(&self) -> MutexGuard<'_, HashMap<String, VecDeque<ChatMessage>>> {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a timestamped message, evicting from the front if needed.
    pub fn append(&self, session_id: &str, role: Role, content: &str) {
        let mut logs = self.logs();
        let log = logs.entry(session_id.to_string()).or_default();
        log.push_back(ChatMessage::now(role, content));
        while log.len() > self.max_length {
            log.pop_front();
        }
    }

    /// Snapshot of a session's messages, oldest first. Empty if unknown.
    pub fn get(&self, session_id: &str) -> Vec<ChatMessage> {
        self.logs()
            .get(session_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Render the log as `"User: ..."` / `"Assistant: ..."` lines.
    pub fn format_for_prompt(&self, session_id: &str) -> String {
        let logs = self.logs();
        let Some(log) = logs.get(session_id) else {
            return String::new();
        };
        log.iter()
            .map(|m| format!("{}{}", m.role.prompt_prefix(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&self, session_id: &str) {
        self.logs().remove(session_id);
    }

    pub fn len(&self, session_id: &str) -> usize {
        self.logs().get(session_id).map_or(0, VecDeque::len)
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.logs().keys().cloned().collect()
    }

    /// Timestamp of the newest message in a session.
    pub fn last_activity(&self, session_id: &str) -> Option<DateTime<Utc>> {
        self.logs()
            .get(session_id)
            .and_then(|log| log.back())
            .map(|m| m.timestamp)
    }

    /// Drop every log whose newest message is older than `cutoff` and return
    /// the removed session ids. Sessions for which `in_use` returns true are
    /// kept regardless of age.
    pub fn remove_idle<F>(&self, cutoff: DateTime<Utc>, in_use: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let mut logs = self.logs();
        let idle: Vec<String> = logs
            .iter()
            .filter(|(_, log)| log.back().map_or(true, |m| m.timestamp < cutoff))
            .filter(|(id, _)| !in_use(id))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &idle {
            logs.remove(id);
        }
        idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_get_unknown_session_is_empty() {
        let history = SessionHistory::default();
        assert!(history.get("nobody").is_empty());
        assert_eq!(history.format_for_prompt("nobody"), "");
        assert_eq!(history.len("nobody"), 0);
    }

    #[test]
    fn test_append_preserves_order() {
        let history = SessionHistory::default();
        history.append("s1", Role::User, "hi");
        history.append("s1", Role::Assistant, "hello");
        let messages = history.get("s1");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let history = SessionHistory::new(10);
        for i in 0..15 {
            history.append("s1", Role::User, &format!("m{}", i));
        }
        let contents: Vec<String> = history.get("s1").into_iter().map(|m| m.content).collect();
        let expected: Vec<String> = (5..15).map(|i| format!("m{}", i)).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn test_format_for_prompt() {
        let history = SessionHistory::default();
        history.append("s1", Role::User, "What is SuperAGI?");
        history.append("s1", Role::Assistant, "An AI platform.");
        assert_eq!(
            history.format_for_prompt("s1"),
            "User: What is SuperAGI?\nAssistant: An AI platform."
        );
    }

    #[test]
    fn test_sessions_are_isolated() {
        let history = SessionHistory::default();
        history.append("a", Role::User, "from a");
        history.append("b", Role::User, "from b");
        assert_eq!(history.get("a")[0].content, "from a");
        assert_eq!(history.get("b")[0].content, "from b");
        let mut ids = history.session_ids();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_clear() {
        let history = SessionHistory::default();
        history.append("s1", Role::User, "hi");
        history.clear("s1");
        assert!(history.get("s1").is_empty());
        assert!(history.last_activity("s1").is_none());
    }

    #[test]
    fn test_last_activity_tracks_newest_message() {
        let history = SessionHistory::default();
        history.append("s1", Role::User, "first");
        let first = history.last_activity("s1").unwrap();
        history.append("s1", Role::Assistant, "second");
        let second = history.last_activity("s1").unwrap();
        assert!(second >= first);
    }

    #[test]
    fn test_remove_idle() {
        let history = SessionHistory::default();
        history.append("old", Role::User, "hi");
        let cutoff = Utc::now() + Duration::seconds(1);
        let removed = history.remove_idle(cutoff, |_| false);
        assert_eq!(removed, vec!["old".to_string()]);
        assert!(history.get("old").is_empty());

        history.append("fresh", Role::User, "hi");
        let removed = history.remove_idle(Utc::now() - Duration::minutes(5), |_| false);
        assert!(removed.is_empty());
        assert_eq!(history.len("fresh"), 1);
    }

    #[test]
    fn test_remove_idle_skips_sessions_in_use() {
        let history = SessionHistory::default();
        history.append("busy", Role::User, "hi");
        history.append("quiet", Role::User, "hi");
        let cutoff = Utc::now() + Duration::seconds(1);
        let removed = history.remove_idle(cutoff, |id| id == "busy");
        assert_eq!(removed, vec!["quiet".to_string()]);
        assert_eq!(history.len("busy"), 1);
    }
}
