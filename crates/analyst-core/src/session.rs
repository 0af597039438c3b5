//! Session Management
//!
//! A session carries the bounded turn history and the turn counter that
//! decides first-turn semantics. Sessions live in a [`SessionStore`] created
//! once at startup and handed to the orchestrator.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::{Expiry, ShardedStore, Sweep, TtlCache};
use crate::config::SessionConfig;
use crate::message::{History, Message};

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A conversation session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: SessionId,

    /// Owning user; `None` is anonymous
    pub user_id: Option<String>,

    /// Persona selected for this session
    pub persona_id: Option<String>,

    /// Last N user/assistant entries
    pub history: History,

    /// Advances by 2 per exchange; 0 only before the first turn completes
    pub turn_count: u32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Create a new session
    pub fn new(id: SessionId, history_limit: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: None,
            persona_id: None,
            history: History::new(history_limit),
            turn_count: 0,
            created_at: now,
            last_activity: now,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Whether the next turn gets full-prompt and bootstrap semantics
    pub const fn is_first_turn(&self) -> bool {
        self.turn_count == 0
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    /// Record one exchange: both entries, activity time, turn counter
    pub fn record_exchange(&mut self, user: Message, assistant: Message) {
        self.history.push(user);
        self.history.push(assistant);
        self.touch();
        self.turn_count += 2;
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// Session store with an inactivity TTL
pub struct SessionStore {
    sessions: ShardedStore<SessionId, Session>,
    history_limit: usize,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: ShardedStore::new(
                config.capacity,
                Duration::from_secs(config.idle_ttl_secs),
                Expiry::SinceAccess,
            ),
            history_limit: config.history_limit,
        }
    }

    /// Existing session, or a fresh one (`turn_count == 0`) under the
    /// requested id, or a generated id when none was given.
    pub fn resolve(&self, id: Option<&SessionId>, user_id: Option<&str>) -> Session {
        if let Some(session) = id.and_then(|id| self.sessions.get(id)) {
            return session;
        }

        let id = id.cloned().unwrap_or_default();
        tracing::info!(session = %id, "Creating session");
        Session::new(id, self.history_limit).with_user(user_id.map(str::to_string))
    }

    /// Live sessions, optionally filtered by owner, most recent first
    pub fn list(&self, user_id: Option<&str>, limit: usize) -> Vec<Session> {
        let mut result: Vec<Session> = self
            .sessions
            .values()
            .into_iter()
            .filter(|s| user_id.is_none_or(|uid| s.user_id.as_deref() == Some(uid)))
            .collect();

        result.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        result.truncate(limit);
        result
    }
}

impl TtlCache<SessionId, Session> for SessionStore {
    fn get(&self, key: &SessionId) -> Option<Session> {
        self.sessions.get(key)
    }

    fn put(&self, key: SessionId, value: Session) {
        self.sessions.put(key, value);
    }

    fn remove(&self, key: &SessionId) -> Option<Session> {
        self.sessions.remove(key)
    }

    fn evict_expired(&self) -> usize {
        self.sessions.evict_expired()
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}

impl Sweep for SessionStore {
    fn name(&self) -> &'static str {
        "sessions"
    }

    fn sweep(&self) -> usize {
        self.evict_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(&SessionConfig::default())
    }

    #[test]
    fn test_session_creation() {
        let session = Session::new(SessionId::new(), 10);
        assert!(session.is_first_turn());
        assert!(session.is_anonymous());
        assert!(session.history.is_empty());
    }

    #[test]
    fn test_exchange_advances_by_two() {
        let mut session = Session::new(SessionId::new(), 10);
        session.record_exchange(Message::user("q"), Message::assistant("a"));
        assert_eq!(session.turn_count, 2);
        assert!(!session.is_first_turn());
        assert_eq!(session.history.len(), 2);
    }

    #[test]
    fn test_history_keeps_last_ten() {
        let mut session = Session::new(SessionId::new(), 10);
        for i in 0..7 {
            session.record_exchange(
                Message::user(format!("q{i}")),
                Message::assistant(format!("a{i}")),
            );
        }
        assert_eq!(session.history.len(), 10);
        assert_eq!(session.turn_count, 14);
        assert_eq!(session.history.iter().next().unwrap().content, "q2");
    }

    #[test]
    fn test_resolve_unknown_id_is_new() {
        let store = store();
        let id = SessionId::from_string("client-chosen");
        let session = store.resolve(Some(&id), Some("alice"));
        assert_eq!(session.id, id);
        assert!(session.is_first_turn());
        assert_eq!(session.user_id.as_deref(), Some("alice"));

        let generated = store.resolve(None, None);
        assert_ne!(generated.id, id);
    }

    #[test]
    fn test_resolve_existing() {
        let store = store();
        let mut session = store.resolve(None, None);
        session.record_exchange(Message::user("q"), Message::assistant("a"));
        store.put(session.id.clone(), session.clone());

        let loaded = store.resolve(Some(&session.id), None);
        assert_eq!(loaded.turn_count, 2);
    }

    #[test]
    fn test_list_filters_by_user() {
        let store = store();
        let mine = Session::new(SessionId::from_string("a"), 10).with_user(Some("u1".into()));
        let theirs = Session::new(SessionId::from_string("b"), 10).with_user(Some("u2".into()));
        store.put(mine.id.clone(), mine.clone());
        store.put(theirs.id.clone(), theirs);

        let listed = store.list(Some("u1"), 10);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);
        assert_eq!(store.list(None, 10).len(), 2);
        assert_eq!(store.list(None, 1).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_are_swept() {
        let store = store();
        let session = store.resolve(None, None);
        store.put(session.id.clone(), session.clone());

        tokio::time::advance(Duration::from_secs(31 * 60)).await;
        assert_eq!(store.sweep(), 1);
        assert!(store.get(&session.id).is_none());
    }
}
