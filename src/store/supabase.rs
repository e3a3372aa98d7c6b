//! PostgREST backend (Supabase).
//!
//! Talks to the REST endpoint of a Supabase project with the blocking
//! `reqwest` client. Producer workers call it from their own thread, so
//! no async runtime is involved.

use super::schema::{MESSAGES_TABLE, SESSIONS_TABLE};
use super::{ChatStore, MessageId, NewSession, Role, SessionId, SessionRecord, StoredMessage};
use crate::environment::Environment;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// PostgREST error codes for an unknown relation.
const MISSING_TABLE_CODES: [&str; 2] = ["42P01", "PGRST205"];

#[derive(Serialize)]
struct SessionRow<'a> {
    session_id: SessionId,
    user_id: &'a str,
    session_name: String,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    environment: Environment,
}

#[derive(Serialize)]
struct MessageRow<'a> {
    message_id: MessageId,
    session_id: SessionId,
    role: Role,
    content: &'a str,
    metadata: Value,
    timestamp: DateTime<Utc>,
    environment: Environment,
}

#[derive(Serialize)]
struct SessionPatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Value>,
    updated_at: DateTime<Utc>,
}

/// A [`ChatStore`] backed by a Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: Client,
    rest_url: String,
    key: String,
    environment: Environment,
}

impl SupabaseStore {
    /// Connect to the project at `url` with API key `key`.
    ///
    /// No request is made here; a wrong URL or key surfaces on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if either credential is blank,
    /// or an HTTP error if the client could not be built.
    pub fn new(url: &str, key: &str, environment: Environment) -> Result<Self, StoreError> {
        let url = url.trim().trim_end_matches('/');
        let key = key.trim();
        if url.is_empty() {
            return Err(StoreError::Unavailable("SUPABASE_URL is empty".into()));
        }
        if key.is_empty() {
            return Err(StoreError::Unavailable("SUPABASE_KEY is empty".into()));
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            rest_url: format!("{url}/rest/v1"),
            key: key.to_string(),
            environment,
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{table}", self.rest_url))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    fn insert<T: Serialize>(&self, table: &str, row: &T) -> Result<(), StoreError> {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()?;
        check(table, response).map(drop)
    }

    fn patch_session(&self, session: &SessionId, patch: &SessionPatch<'_>) -> Result<(), StoreError> {
        let response = self
            .request(Method::PATCH, SESSIONS_TABLE)
            .query(&[("session_id", eq(session))])
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()?;
        check(SESSIONS_TABLE, response).map(drop)
    }

    fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>, StoreError> {
        let response = self
            .request(Method::GET, table)
            .query(&[("select", "*")])
            .query(query)
            .send()?;
        let body = check(table, response)?.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    fn delete(&self, table: &str, session: &SessionId) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, table)
            .query(&[("session_id", eq(session))])
            .send()?;
        check(table, response).map(drop)
    }
}

impl ChatStore for SupabaseStore {
    fn backend(&self) -> &'static str {
        "supabase"
    }

    fn create_session(&self, new: &NewSession) -> Result<SessionId, StoreError> {
        let id = SessionId::new();
        let now = Utc::now();
        self.insert(
            SESSIONS_TABLE,
            &SessionRow {
                session_id: id,
                user_id: &new.user_id,
                session_name: new.resolved_name(self.environment),
                metadata: Value::Object(serde_json::Map::new()),
                created_at: now,
                updated_at: now,
                environment: self.environment,
            },
        )?;
        debug!(session = %id.short(), user = %new.user_id, "created session");
        Ok(id)
    }

    fn session(&self, session: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        let mut rows: Vec<SessionRecord> = self.select(
            SESSIONS_TABLE,
            &[("session_id", eq(session)), ("limit", "1".to_string())],
        )?;
        Ok(rows.pop())
    }

    fn save_message(&self, session: &SessionId, role: Role, content: &str) -> Result<MessageId, StoreError> {
        let id = MessageId::new();
        let now = Utc::now();
        self.insert(
            MESSAGES_TABLE,
            &MessageRow {
                message_id: id,
                session_id: *session,
                role,
                content,
                metadata: Value::Object(serde_json::Map::new()),
                timestamp: now,
                environment: self.environment,
            },
        )?;
        self.patch_session(
            session,
            &SessionPatch {
                metadata: None,
                updated_at: now,
            },
        )?;
        Ok(id)
    }

    fn history(&self, session: &SessionId, limit: usize) -> Result<Vec<StoredMessage>, StoreError> {
        self.select(
            MESSAGES_TABLE,
            &[
                ("session_id", eq(session)),
                ("order", "timestamp.asc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
    }

    fn user_sessions(&self, user_id: &str, limit: usize) -> Result<Vec<SessionRecord>, StoreError> {
        self.select(
            SESSIONS_TABLE,
            &[
                ("user_id", format!("eq.{user_id}")),
                ("order", "updated_at.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
    }

    fn delete_session(&self, session: &SessionId) -> Result<(), StoreError> {
        self.delete(MESSAGES_TABLE, session)?;
        self.delete(SESSIONS_TABLE, session)?;
        debug!(session = %session.short(), "deleted session");
        Ok(())
    }

    fn update_session_metadata(&self, session: &SessionId, metadata: &Value) -> Result<(), StoreError> {
        self.patch_session(
            session,
            &SessionPatch {
                metadata: Some(metadata),
                updated_at: Utc::now(),
            },
        )
    }
}

/// PostgREST equality filter.
fn eq(session: &SessionId) -> String {
    format!("eq.{session}")
}

/// Turn a non-success response into the matching error.
fn check(table: &str, response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    if is_missing_table(status, &body) {
        return Err(StoreError::MissingTable {
            table: table.to_string(),
        });
    }
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

fn is_missing_table(status: StatusCode, body: &str) -> bool {
    if !matches!(status, StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST) {
        return false;
    }
    let code = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("code").and_then(Value::as_str).map(str::to_string));
    code.is_some_and(|code| MISSING_TABLE_CODES.contains(&code.as_str()))
}
