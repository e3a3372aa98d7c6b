//! In-process store.
//!
//! Used when no backend is configured and by tests. Nothing survives the
//! process.

use super::{ChatStore, MessageId, NewSession, Role, SessionId, SessionRecord, StoredMessage};
use crate::environment::Environment;
use crate::error::StoreError;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Tables {
    sessions: HashMap<SessionId, SessionRecord>,
    messages: HashMap<SessionId, Vec<StoredMessage>>,
}

/// A [`ChatStore`] backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    environment: Environment,
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store tagging rows as [`Environment::Local`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store tagging rows with `environment`.
    pub fn with_environment(environment: Environment) -> Self {
        Self {
            environment,
            tables: Mutex::default(),
        }
    }

    /// Number of sessions currently held.
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChatStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn create_session(&self, new: &NewSession) -> Result<SessionId, StoreError> {
        let id = SessionId::new();
        let now = Utc::now();
        let record = SessionRecord {
            session_id: id,
            user_id: new.user_id.clone(),
            session_name: new.resolved_name(self.environment),
            metadata: Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
            environment: self.environment,
        };
        self.lock().sessions.insert(id, record);
        Ok(id)
    }

    fn session(&self, session: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.lock().sessions.get(session).cloned())
    }

    fn save_message(&self, session: &SessionId, role: Role, content: &str) -> Result<MessageId, StoreError> {
        let mut tables = self.lock();
        let now = Utc::now();
        let record = tables
            .sessions
            .get_mut(session)
            .ok_or_else(|| StoreError::SessionNotFound(session.to_string()))?;
        record.updated_at = now;

        let id = MessageId::new();
        tables.messages.entry(*session).or_default().push(StoredMessage {
            message_id: id,
            session_id: *session,
            role,
            content: content.to_string(),
            metadata: Value::Object(serde_json::Map::new()),
            timestamp: now,
            environment: self.environment,
        });
        Ok(id)
    }

    fn history(&self, session: &SessionId, limit: usize) -> Result<Vec<StoredMessage>, StoreError> {
        let tables = self.lock();
        // Rows are appended in save order; timestamps may not be monotonic.
        let rows = tables
            .messages
            .get(session)
            .map(|rows| rows.iter().take(limit).cloned().collect())
            .unwrap_or_default();
        Ok(rows)
    }

    fn user_sessions(&self, user_id: &str, limit: usize) -> Result<Vec<SessionRecord>, StoreError> {
        let tables = self.lock();
        let mut rows: Vec<SessionRecord> = tables
            .sessions
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rows.truncate(limit);
        Ok(rows)
    }

    fn delete_session(&self, session: &SessionId) -> Result<(), StoreError> {
        let mut tables = self.lock();
        tables.messages.remove(session);
        tables.sessions.remove(session);
        Ok(())
    }

    fn update_session_metadata(&self, session: &SessionId, metadata: &Value) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let record = tables
            .sessions
            .get_mut(session)
            .ok_or_else(|| StoreError::SessionNotFound(session.to_string()))?;
        record.metadata = metadata.clone();
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_in_save_order() {
        let store = MemoryStore::new();
        let session = store.create_session(&NewSession::anonymous()).unwrap();
        for i in 0..5 {
            store.save_message(&session, Role::User, &format!("q{i}")).unwrap();
            store.save_message(&session, Role::Assistant, &format!("a{i}")).unwrap();
        }

        let rows = store.history(&session, 50).unwrap();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].content, "q0");
        assert_eq!(rows[9].content, "a4");

        let limited = store.history(&session, 3).unwrap();
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[2].content, "q1");
    }

    #[test]
    fn test_history_ignores_clock_steps() {
        let store = MemoryStore::new();
        let session = store.create_session(&NewSession::anonymous()).unwrap();
        store.save_message(&session, Role::User, "first").unwrap();
        store.save_message(&session, Role::Assistant, "second").unwrap();

        // A wall clock stepping backwards between the two saves.
        {
            let mut tables = store.lock();
            let rows = tables.messages.get_mut(&session).unwrap();
            rows[1].timestamp = rows[0].timestamp - chrono::Duration::seconds(30);
        }

        let contents: Vec<String> = store
            .history(&session, 10)
            .unwrap()
            .into_iter()
            .map(|row| row.content)
            .collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[test]
    fn test_save_to_unknown_session_fails() {
        let store = MemoryStore::new();
        let result = store.save_message(&SessionId::new(), Role::User, "hi");
        assert!(matches!(result, Err(StoreError::SessionNotFound(_))));
    }

    #[test]
    fn test_save_bumps_updated_at() {
        let store = MemoryStore::new();
        let session = store.create_session(&NewSession::anonymous()).unwrap();
        let before = store.session(&session).unwrap().unwrap().updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.save_message(&session, Role::User, "hi").unwrap();
        let after = store.session(&session).unwrap().unwrap().updated_at;
        assert!(after > before);
    }

    #[test]
    fn test_user_sessions_most_recent_first() {
        let store = MemoryStore::new();
        let first = store.create_session(&NewSession::for_user("dana")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = store.create_session(&NewSession::for_user("dana")).unwrap();
        store.create_session(&NewSession::for_user("noa")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.save_message(&first, Role::User, "bump").unwrap();

        let sessions = store.user_sessions("dana", 10).unwrap();
        let ids: Vec<SessionId> = sessions.iter().map(|s| s.session_id).collect();
        assert_eq!(ids, vec![first, second]);
        assert_eq!(store.user_sessions("dana", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_session_removes_messages() {
        let store = MemoryStore::new();
        let session = store.create_session(&NewSession::anonymous()).unwrap();
        store.save_message(&session, Role::User, "hi").unwrap();

        store.delete_session(&session).unwrap();
        assert!(store.session(&session).unwrap().is_none());
        assert!(store.history(&session, 10).unwrap().is_empty());
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_update_metadata() {
        let store = MemoryStore::with_environment(Environment::Cloud);
        let session = store.create_session(&NewSession::anonymous()).unwrap();
        store
            .update_session_metadata(&session, &json!({"topic": "greetings"}))
            .unwrap();

        let record = store.session(&session).unwrap().unwrap();
        assert_eq!(record.metadata["topic"], "greetings");
        assert_eq!(record.environment, Environment::Cloud);
        assert!(record.session_name.starts_with("[CLOUD]"));
    }
}
