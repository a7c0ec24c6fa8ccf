//! Bounded, session-keyed conversation history

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::{Mutex, RwLock};

/// Turns kept per session before the oldest is evicted
pub const HISTORY_CAP: usize = 50;

/// Prior turns forwarded with each completion request
pub const PROMPT_TURNS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Append-only turn log with FIFO eviction past `cap`
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    cap: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::with_cap(HISTORY_CAP)
    }
}

impl ConversationHistory {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(cap.min(HISTORY_CAP) + 1),
            cap: cap.max(1),
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.cap {
            self.turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Up to `n` most recent turns, skipping the newest `skip_latest`, oldest first
    pub fn recent(&self, n: usize, skip_latest: usize) -> Vec<ConversationTurn> {
        let end = self.turns.len().saturating_sub(skip_latest);
        let start = end.saturating_sub(n);
        self.turns.range(start..end).cloned().collect()
    }

    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }
}

/// Owns every session's history. Callers decide when sessions start and end.
#[derive(Debug, Default, Clone)]
pub struct HistoryStore {
    sessions: Arc<RwLock<HashMap<String, Arc<Mutex<ConversationHistory>>>>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to a session's history, created empty on first use.
    ///
    /// Holding the lock serializes interactions within the session.
    pub async fn session(&self, session_id: &str) -> Arc<Mutex<ConversationHistory>> {
        if let Some(history) = self.sessions.read().await.get(session_id) {
            return Arc::clone(history);
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(session_id.to_string()).or_default())
    }

    /// Copy of a session's turns, empty for unknown sessions
    pub async fn snapshot(&self, session_id: &str) -> Vec<ConversationTurn> {
        let history = self.sessions.read().await.get(session_id).cloned();
        match history {
            Some(history) => history.lock().await.turns(),
            None => Vec::new(),
        }
    }

    /// Drop all turns but keep the session
    pub async fn clear(&self, session_id: &str) {
        let history = self.sessions.read().await.get(session_id).cloned();
        if let Some(history) = history {
            history.lock().await.clear();
        }
    }

    /// Forget the session; returns whether it existed
    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_keeps_order_and_cap() {
        let mut history = ConversationHistory::default();
        for i in 0..=HISTORY_CAP {
            history.push(ConversationTurn::user(format!("turn {}", i)));
        }

        let turns = history.turns();
        assert_eq!(turns.len(), HISTORY_CAP);
        assert_eq!(turns[0].text, "turn 1");
        assert_eq!(turns[HISTORY_CAP - 1].text, format!("turn {}", HISTORY_CAP));
    }

    #[test]
    fn test_recent_skips_latest() {
        let mut history = ConversationHistory::with_cap(20);
        for i in 0..15 {
            history.push(ConversationTurn::user(i.to_string()));
        }

        let recent = history.recent(PROMPT_TURNS, 1);
        assert_eq!(recent.len(), PROMPT_TURNS);
        assert_eq!(recent.first().unwrap().text, "4");
        assert_eq!(recent.last().unwrap().text, "13");
    }

    #[test]
    fn test_recent_on_short_history() {
        let mut history = ConversationHistory::default();
        history.push(ConversationTurn::user("only"));
        assert!(history.recent(PROMPT_TURNS, 1).is_empty());
        assert_eq!(history.recent(PROMPT_TURNS, 0).len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let store = HistoryStore::new();
        store
            .session("a")
            .await
            .lock()
            .await
            .push(ConversationTurn::user("hello"));

        assert_eq!(store.snapshot("a").await.len(), 1);
        assert!(store.snapshot("b").await.is_empty());
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_clear_and_remove() {
        let store = HistoryStore::new();
        store
            .session("a")
            .await
            .lock()
            .await
            .push(ConversationTurn::assistant("hi"));

        store.clear("a").await;
        assert!(store.snapshot("a").await.is_empty());
        assert_eq!(store.session_count().await, 1);

        assert!(store.remove("a").await);
        assert!(!store.remove("a").await);
        assert_eq!(store.session_count().await, 0);
    }

    #[test]
    fn test_role_names() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
