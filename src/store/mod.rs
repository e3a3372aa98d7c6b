//! Persistence: sessions and their messages.
//!
//! The chat never depends on a backend being present. Everything that
//! talks to storage goes through [`ChatStore`], and every caller treats a
//! [`StoreError`] as something to log and move past.
//!
//! # Data model
//!
//! ```text
//! chat_sessions                     chat_messages
//! ┌──────────────────────┐          ┌──────────────────────┐
//! │ session_id (uuid) PK │◄─────────│ session_id           │
//! │ user_id              │          │ message_id (uuid) PK │
//! │ session_name         │          │ role  user|assistant │
//! │ metadata (json)      │          │ content              │
//! │ created_at           │          │ metadata (json)      │
//! │ updated_at           │          │ timestamp            │
//! │ environment          │          │ environment          │
//! └──────────────────────┘          └──────────────────────┘
//! ```

mod memory;
pub mod schema;
mod supabase;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

use crate::environment::Environment;
use crate::error::StoreError;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// User id recorded when nobody logged in.
pub const DEFAULT_USER_ID: &str = "anonymous";

/// Default number of sessions returned by [`ChatStore::user_sessions`].
pub const DEFAULT_SESSION_LIMIT: usize = 10;

/// Identifier of a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The first eight hex digits, for logs and the status line.
    pub fn short(&self) -> String {
        let mut text = self.0.simple().to_string();
        text.truncate(8);
        text
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Identifier of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person typing.
    User,
    /// The generated reply.
    Assistant,
}

impl Role {
    /// Lowercase name, as stored in the `role` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of `chat_messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Row id.
    pub message_id: MessageId,
    /// Owning session.
    pub session_id: SessionId,
    /// Author.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Value,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Environment the row was written from.
    #[serde(default)]
    pub environment: Environment,
}

/// A row of `chat_sessions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Row id.
    pub session_id: SessionId,
    /// Owner.
    pub user_id: String,
    /// Human-readable name.
    pub session_name: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last time a message or metadata was written.
    pub updated_at: DateTime<Utc>,
    /// Environment the session was created from.
    #[serde(default)]
    pub environment: Environment,
}

/// Parameters for a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    /// Owner of the session.
    pub user_id: String,
    /// Explicit name; a timestamped default is used when `None`.
    pub name: Option<String>,
}

impl NewSession {
    /// A session owned by `user_id` with the default name.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: None,
        }
    }

    /// A session owned by [`DEFAULT_USER_ID`].
    pub fn anonymous() -> Self {
        Self::for_user(DEFAULT_USER_ID)
    }

    /// Set an explicit name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The name to store: the explicit one, or the default for `environment`.
    pub fn resolved_name(&self, environment: Environment) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| default_session_name(environment, Local::now()))
    }
}

/// Default session name, e.g. `[LOCAL] Chat Session 2026-10-17 09:30`.
pub fn default_session_name(environment: Environment, at: DateTime<Local>) -> String {
    format!(
        "{} Chat Session {}",
        environment.prefix(),
        at.format("%Y-%m-%d %H:%M")
    )
}

/// A persistence backend for chat sessions.
///
/// Implementations are shared between the interactive thread and producer
/// workers, so they must be `Send + Sync` and do their own locking.
pub trait ChatStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Create a session and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejected the insert.
    fn create_session(&self, new: &NewSession) -> Result<SessionId, StoreError>;

    /// Look up one session.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be queried.
    fn session(&self, session: &SessionId) -> Result<Option<SessionRecord>, StoreError>;

    /// Append a message to a session and bump its `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejected the insert.
    fn save_message(&self, session: &SessionId, role: Role, content: &str) -> Result<MessageId, StoreError>;

    /// Up to `limit` messages of a session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be queried.
    fn history(&self, session: &SessionId, limit: usize) -> Result<Vec<StoredMessage>, StoreError>;

    /// Up to `limit` sessions of a user, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be queried.
    fn user_sessions(&self, user_id: &str, limit: usize) -> Result<Vec<SessionRecord>, StoreError>;

    /// Delete a session's messages, then the session itself.
    ///
    /// # Errors
    ///
    /// Returns an error if either delete failed.
    fn delete_session(&self, session: &SessionId) -> Result<(), StoreError>;

    /// Replace a session's metadata and bump its `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejected the update.
    fn update_session_metadata(&self, session: &SessionId, metadata: &Value) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_id_roundtrip_and_short() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(id.short().len(), 8);
        assert!(id.to_string().starts_with(&id.short()));
    }

    #[test]
    fn test_session_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_default_session_name() {
        let at = Local.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap();
        assert_eq!(
            default_session_name(Environment::Local, at),
            "[LOCAL] Chat Session 2026-10-17 09:30"
        );
        assert_eq!(
            default_session_name(Environment::Cloud, at),
            "[CLOUD] Chat Session 2026-10-17 09:30"
        );
    }

    #[test]
    fn test_new_session_name() {
        let named = NewSession::for_user("dana").named("Planning");
        assert_eq!(named.resolved_name(Environment::Local), "Planning");
        assert!(NewSession::anonymous()
            .resolved_name(Environment::Cloud)
            .starts_with("[CLOUD] Chat Session "));
    }

    #[test]
    fn test_message_row_decodes_without_optional_columns() {
        let json = r#"{
            "message_id": "6f1c2a44-7d0e-4a4c-9d59-2b1f4a9a2f10",
            "session_id": "0b5e1c1e-33a4-4d55-8f5c-1d2b7e0f3c21",
            "role": "assistant",
            "content": "שלום",
            "timestamp": "2026-10-17T09:30:00.123456+00:00"
        }"#;
        let row: StoredMessage = serde_json::from_str(json).unwrap();
        assert_eq!(row.role, Role::Assistant);
        assert_eq!(row.environment, Environment::Local);
        assert!(row.metadata.is_null());
    }
}
