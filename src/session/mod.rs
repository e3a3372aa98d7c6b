//! Session context: the state of one conversation.
//!
//! A [`SessionContext`] is created at session start, passed to every
//! operation, and reset explicitly by the "new conversation" action. It is
//! never shared between conversations.
//!
//! # Lifecycle
//!
//! ```text
//! start ──▶ resume or create session ──▶ hydrate history ──▶ exchange*
//!   │              │ failure                 │ failure           │
//!   │              ▼                         ▼                   ▼
//!   │        in-memory mode            empty history      append user +
//!   │                                                     assistant entries
//!   └──────────────────────── reset ◀────────────────────────────┘
//! ```
//!
//! Every persistence failure along the way becomes a [`Notice`]; none of
//! them stops the conversation.

mod handler;
mod history;

pub use handler::ChatHandler;
pub use history::{Entry, History};

use crate::config::DEFAULT_HISTORY_LIMIT;
use crate::error::StoreError;
use crate::render::RenderSink;
use crate::store::{
    schema, ChatStore, NewSession, SessionId, SessionRecord, DEFAULT_SESSION_LIMIT, DEFAULT_USER_ID,
};
use crate::stream::{Generator, Persistence, StreamSettings};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Something did not work; the session carries on.
    Warning,
}

/// A user-visible message about the session itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text to show.
    pub text: String,
    /// Longer setup instructions, e.g. the SQL for a missing table.
    pub hint: Option<String>,
}

impl Notice {
    /// An informational notice.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
            hint: None,
        }
    }

    /// A warning notice.
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
            hint: None,
        }
    }

    /// A warning about a store failure, with the schema attached when the
    /// backend is missing a table.
    pub fn store_failure(text: impl fmt::Display, err: &StoreError) -> Self {
        let hint = matches!(err, StoreError::MissingTable { .. }).then(schema::bootstrap_sql);
        Self {
            level: NoticeLevel::Warning,
            text: format!("{text}: {err}"),
            hint,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Everything a session needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Owner of new sessions.
    pub user_id: String,
    /// Session to resume instead of creating one.
    pub resume: Option<SessionId>,
    /// Messages loaded when resuming.
    pub history_limit: usize,
    /// Render loop settings.
    pub stream: StreamSettings,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID.to_string(),
            resume: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            stream: StreamSettings::default(),
        }
    }
}

/// State of one conversation.
pub struct SessionContext {
    store: Option<Arc<dyn ChatStore>>,
    generator: Arc<dyn Generator>,
    options: SessionOptions,
    session: Option<SessionId>,
    history: History,
    handler: ChatHandler,
}

impl SessionContext {
    /// Start a session.
    ///
    /// With a store: resume `options.resume` or create a new session, then
    /// load its history. Without a store, or if the session cannot be set
    /// up, the conversation runs in memory. Returns the notices to show.
    pub fn start(
        store: Option<Arc<dyn ChatStore>>,
        generator: Arc<dyn Generator>,
        options: SessionOptions,
    ) -> (Self, Vec<Notice>) {
        let handler = ChatHandler::new(Arc::clone(&generator), &options.stream);
        let mut context = Self {
            store,
            generator,
            options,
            session: None,
            history: History::new(),
            handler,
        };
        let resume = context.options.resume;
        let notices = context.open(resume);
        (context, notices)
    }

    /// Start a fresh conversation against the same store.
    ///
    /// Clears the history and creates a new session; the previous session
    /// is left as it is in the store.
    pub fn reset(&mut self) -> Vec<Notice> {
        info!(previous = ?self.session.map(|s| s.short()), "resetting session");
        self.session = None;
        self.history.clear();
        self.handler = ChatHandler::new(Arc::clone(&self.generator), &self.options.stream);
        self.open(None)
    }

    /// Run one exchange and append it to the history.
    ///
    /// The reply is rendered into `sink` while it streams. Both entries are
    /// appended once the stream is drained, whether or not persisting them
    /// succeeded.
    pub fn exchange(&mut self, input: &str, sink: &mut dyn RenderSink) -> String {
        let response = self.handler.respond(input, sink);
        self.history.push_exchange(input, response.clone());
        response
    }

    /// The conversation so far.
    pub const fn history(&self) -> &History {
        &self.history
    }

    /// The backing session, if persistence is active.
    pub const fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// Check whether exchanges are being persisted.
    pub const fn is_persistent(&self) -> bool {
        self.handler.persistence().is_some()
    }

    /// Name of the store backend, if any.
    pub fn backend(&self) -> Option<&'static str> {
        self.store.as_ref().map(|store| store.backend())
    }

    /// The most recently updated sessions of this context's user.
    ///
    /// Empty without a store.
    ///
    /// # Errors
    ///
    /// Returns the store failure, if any.
    pub fn recent_sessions(&self) -> Result<Vec<SessionRecord>, StoreError> {
        match &self.store {
            Some(store) => store.user_sessions(&self.options.user_id, DEFAULT_SESSION_LIMIT),
            None => Ok(Vec::new()),
        }
    }

    /// Attach a session (resumed or new) and load its history.
    fn open(&mut self, resume: Option<SessionId>) -> Vec<Notice> {
        let mut notices = Vec::new();
        let Some(store) = self.store.clone() else {
            return notices;
        };

        let session = match resume {
            Some(id) => match Self::resume(store.as_ref(), id) {
                Ok(()) => id,
                Err(err) => {
                    warn!(session = %id.short(), error = %err, "cannot resume session");
                    notices.push(Notice::store_failure(
                        format_args!("Could not resume session {}", id.short()),
                        &err,
                    ));
                    match self.create(store.as_ref(), &mut notices) {
                        Some(id) => id,
                        None => return notices,
                    }
                }
            },
            None => match self.create(store.as_ref(), &mut notices) {
                Some(id) => id,
                None => return notices,
            },
        };

        self.session = Some(session);
        self.handler = self
            .handler
            .clone()
            .with_persistence(Persistence::new(Arc::clone(&store), session));

        if resume == Some(session) {
            self.hydrate(store.as_ref(), &session, &mut notices);
        }
        notices
    }

    fn resume(store: &dyn ChatStore, id: SessionId) -> Result<(), StoreError> {
        match store.session(&id)? {
            Some(_) => Ok(()),
            None => Err(StoreError::SessionNotFound(id.to_string())),
        }
    }

    fn create(&self, store: &dyn ChatStore, notices: &mut Vec<Notice>) -> Option<SessionId> {
        match store.create_session(&NewSession::for_user(self.options.user_id.as_str())) {
            Ok(id) => {
                info!(session = %id.short(), backend = store.backend(), "new chat session started");
                notices.push(Notice::info(format!("New chat session started ({})", id.short())));
                Some(id)
            }
            Err(err) => {
                warn!(error = %err, backend = store.backend(), "failed to create session");
                notices.push(Notice::store_failure(
                    "Could not create a session, messages will not be saved",
                    &err,
                ));
                None
            }
        }
    }

    fn hydrate(&mut self, store: &dyn ChatStore, session: &SessionId, notices: &mut Vec<Notice>) {
        match store.history(session, self.options.history_limit) {
            Ok(rows) => {
                self.history = History::from_rows(rows);
                info!(session = %session.short(), messages = self.history.len(), "history loaded");
                notices.push(Notice::info(format!(
                    "Loaded {} previous messages",
                    self.history.len()
                )));
            }
            Err(err) => {
                warn!(session = %session.short(), error = %err, "failed to load history");
                notices.push(Notice::store_failure("Could not load history", &err));
            }
        }
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("backend", &self.backend())
            .field("session", &self.session)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingSink;
    use crate::store::{MemoryStore, MessageId, Role, SessionRecord, StoredMessage};
    use crate::stream::{SimulatedGenerator, SimulationSettings};
    use serde_json::Value;
    use std::time::Duration;

    fn generator() -> Arc<dyn Generator> {
        Arc::new(SimulatedGenerator::new(SimulationSettings::INSTANT))
    }

    fn options() -> SessionOptions {
        SessionOptions {
            stream: StreamSettings {
                poll_timeout: Duration::from_millis(5),
                ..StreamSettings::default()
            },
            ..SessionOptions::default()
        }
    }

    /// A store where every call fails, or only the selected ones.
    #[derive(Default)]
    struct FailingStore {
        inner: MemoryStore,
        fail_create: bool,
        fail_save: bool,
        fail_history: bool,
    }

    fn down() -> StoreError {
        StoreError::Unavailable("backend down".into())
    }

    impl ChatStore for FailingStore {
        fn backend(&self) -> &'static str {
            "failing"
        }
        fn create_session(&self, new: &NewSession) -> Result<SessionId, StoreError> {
            if self.fail_create {
                return Err(down());
            }
            self.inner.create_session(new)
        }
        fn session(&self, session: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
            self.inner.session(session)
        }
        fn save_message(&self, session: &SessionId, role: Role, content: &str) -> Result<MessageId, StoreError> {
            if self.fail_save {
                return Err(down());
            }
            self.inner.save_message(session, role, content)
        }
        fn history(&self, session: &SessionId, limit: usize) -> Result<Vec<StoredMessage>, StoreError> {
            if self.fail_history {
                return Err(down());
            }
            self.inner.history(session, limit)
        }
        fn user_sessions(&self, user_id: &str, limit: usize) -> Result<Vec<SessionRecord>, StoreError> {
            self.inner.user_sessions(user_id, limit)
        }
        fn delete_session(&self, session: &SessionId) -> Result<(), StoreError> {
            self.inner.delete_session(session)
        }
        fn update_session_metadata(&self, session: &SessionId, metadata: &Value) -> Result<(), StoreError> {
            self.inner.update_session_metadata(session, metadata)
        }
    }

    /// Wait for the detached producer to finish writing.
    fn wait_for_rows(store: &dyn ChatStore, session: &SessionId, rows: usize) {
        for _ in 0..2000 {
            if store.history(session, 100).map(|r| r.len()).unwrap_or(0) >= rows {
                return;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("store never reached {rows} rows");
    }

    #[test]
    fn test_without_store_runs_in_memory() {
        let (mut context, notices) = SessionContext::start(None, generator(), options());
        assert!(notices.is_empty());
        assert!(!context.is_persistent());
        assert_eq!(context.session_id(), None);

        let mut sink = RecordingSink::new();
        let reply = context.exchange("hi", &mut sink);
        assert_eq!(reply, "שלום **לך**, מה שלומך?");
        assert_eq!(context.history().len(), 2);
    }

    #[test]
    fn test_new_session_persists_exchanges() {
        let store = Arc::new(MemoryStore::new());
        let (mut context, notices) =
            SessionContext::start(Some(store.clone() as Arc<dyn ChatStore>), generator(), options());

        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Info);
        assert!(notices[0].text.starts_with("New chat session started"));
        assert!(context.is_persistent());

        let session = *context.session_id().unwrap();
        context.exchange("hi", &mut RecordingSink::new());
        wait_for_rows(store.as_ref(), &session, 2);

        let rows = store.history(&session, 10).unwrap();
        assert_eq!(rows[0].role, Role::User);
        assert_eq!(rows[0].content, "hi");
        assert_eq!(rows[1].content, "שלום **לך**, מה שלומך?");
    }

    #[test]
    fn test_create_failure_falls_back_to_memory() {
        let store = Arc::new(FailingStore {
            fail_create: true,
            ..FailingStore::default()
        });
        let (mut context, notices) = SessionContext::start(Some(store), generator(), options());

        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert!(!context.is_persistent());
        assert_eq!(context.exchange("hi", &mut RecordingSink::new()), "שלום **לך**, מה שלומך?");
    }

    #[test]
    fn test_save_failure_keeps_reply_and_history() {
        let store = Arc::new(FailingStore {
            fail_save: true,
            ..FailingStore::default()
        });
        let (mut context, _) = SessionContext::start(Some(store), generator(), options());
        assert!(context.is_persistent());

        let mut sink = RecordingSink::new();
        let reply = context.exchange("hi", &mut sink);

        assert_eq!(reply, "שלום **לך**, מה שלומך?");
        assert_eq!(sink.last().as_deref(), Some(reply.as_str()));
        assert_eq!(
            context.history().entries(),
            &[Entry::user("hi"), Entry::assistant(reply.clone())]
        );
    }

    #[test]
    fn test_resume_hydrates_history_in_order() {
        let store = Arc::new(MemoryStore::new());
        let session = store.create_session(&NewSession::anonymous()).unwrap();
        for i in 0..3 {
            store.save_message(&session, Role::User, &format!("q{i}")).unwrap();
            store.save_message(&session, Role::Assistant, &format!("a{i}")).unwrap();
        }

        let options = SessionOptions {
            resume: Some(session),
            ..options()
        };
        let (mut context, notices) =
            SessionContext::start(Some(store.clone() as Arc<dyn ChatStore>), generator(), options);

        assert_eq!(context.session_id(), Some(&session));
        assert_eq!(notices, vec![Notice::info("Loaded 6 previous messages")]);
        let contents: Vec<&str> = context.history().iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["q0", "a0", "q1", "a1", "q2", "a2"]);

        context.exchange("next", &mut RecordingSink::new());
        assert_eq!(context.history().len(), 8);
        assert_eq!(context.history().entries()[6], Entry::user("next"));
    }

    #[test]
    fn test_history_limit_applies_on_resume() {
        let store = Arc::new(MemoryStore::new());
        let session = store.create_session(&NewSession::anonymous()).unwrap();
        for i in 0..10 {
            store.save_message(&session, Role::User, &format!("m{i}")).unwrap();
        }

        let options = SessionOptions {
            resume: Some(session),
            history_limit: 4,
            ..options()
        };
        let (context, _) = SessionContext::start(Some(store), generator(), options);
        assert_eq!(context.history().len(), 4);
        assert_eq!(context.history().entries()[0].content, "m0");
    }

    #[test]
    fn test_history_failure_keeps_persistence() {
        let store = Arc::new(FailingStore {
            fail_history: true,
            ..FailingStore::default()
        });
        let session = store.create_session(&NewSession::anonymous()).unwrap();
        let options = SessionOptions {
            resume: Some(session),
            ..options()
        };
        let (context, notices) = SessionContext::start(Some(store), generator(), options);

        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert!(context.history().is_empty());
        assert!(context.is_persistent());
        assert_eq!(context.session_id(), Some(&session));
    }

    #[test]
    fn test_unknown_resume_id_creates_new_session() {
        let store = Arc::new(MemoryStore::new());
        let missing = SessionId::new();
        let options = SessionOptions {
            resume: Some(missing),
            ..options()
        };
        let (context, notices) =
            SessionContext::start(Some(store.clone() as Arc<dyn ChatStore>), generator(), options);

        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert_ne!(context.session_id(), Some(&missing));
        assert!(context.is_persistent());
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn test_missing_table_notice_carries_schema() {
        let notice = Notice::store_failure(
            "Could not create a session",
            &StoreError::MissingTable {
                table: "chat_sessions".into(),
            },
        );
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.text.contains("chat_sessions"));
        assert!(notice.hint.unwrap().contains("CREATE TABLE IF NOT EXISTS chat_sessions"));

        let plain = Notice::store_failure("Could not load history", &StoreError::Unavailable("down".into()));
        assert!(plain.hint.is_none());
    }

    #[test]
    fn test_recent_sessions_for_user() {
        let store = Arc::new(MemoryStore::new());
        store.create_session(&NewSession::for_user("someone-else")).unwrap();
        let options = SessionOptions {
            user_id: "dana".into(),
            ..options()
        };
        let (mut context, _) =
            SessionContext::start(Some(store.clone() as Arc<dyn ChatStore>), generator(), options);
        context.reset();

        let sessions = context.recent_sessions().unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|record| record.user_id == "dana"));
        let current = *context.session_id().unwrap();
        assert!(sessions.iter().any(|record| record.session_id == current));

        let (memory_only, _) = SessionContext::start(None, generator(), self::options());
        assert!(memory_only.recent_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_reset_starts_new_session() {
        let store = Arc::new(MemoryStore::new());
        let (mut context, _) =
            SessionContext::start(Some(store.clone() as Arc<dyn ChatStore>), generator(), options());
        let first = *context.session_id().unwrap();
        context.exchange("hi", &mut RecordingSink::new());

        let notices = context.reset();
        assert_eq!(notices.len(), 1);
        assert!(context.history().is_empty());
        assert_ne!(context.session_id(), Some(&first));
        assert_eq!(store.session_count(), 2);
    }
}
