//! Table definitions for the PostgREST backend.
//!
//! The REST API cannot create tables, so these statements are printed as a
//! setup hint whenever the backend reports a missing relation.

/// Sessions table.
pub const SESSIONS_TABLE: &str = "chat_sessions";

/// Messages table.
pub const MESSAGES_TABLE: &str = "chat_messages";

/// DDL for [`SESSIONS_TABLE`].
pub const CREATE_SESSIONS: &str = "\
CREATE TABLE IF NOT EXISTS chat_sessions (
    id SERIAL PRIMARY KEY,
    session_id UUID UNIQUE NOT NULL,
    user_id TEXT NOT NULL DEFAULT 'anonymous',
    session_name TEXT NOT NULL,
    metadata JSONB DEFAULT '{}',
    created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
    updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
    environment TEXT NOT NULL DEFAULT 'local'
);";

/// DDL for [`MESSAGES_TABLE`].
pub const CREATE_MESSAGES: &str = "\
CREATE TABLE IF NOT EXISTS chat_messages (
    id SERIAL PRIMARY KEY,
    message_id UUID UNIQUE NOT NULL,
    session_id UUID NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
    content TEXT NOT NULL,
    metadata JSONB DEFAULT '{}',
    timestamp TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
    environment TEXT NOT NULL DEFAULT 'local',
    FOREIGN KEY (session_id) REFERENCES chat_sessions(session_id) ON DELETE CASCADE
);";

/// Lookup indexes.
pub const CREATE_INDEXES: [&str; 6] = [
    "CREATE INDEX IF NOT EXISTS idx_chat_sessions_user_id ON chat_sessions(user_id);",
    "CREATE INDEX IF NOT EXISTS idx_chat_sessions_updated_at ON chat_sessions(updated_at);",
    "CREATE INDEX IF NOT EXISTS idx_chat_sessions_environment ON chat_sessions(environment);",
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_session_id ON chat_messages(session_id);",
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_timestamp ON chat_messages(timestamp);",
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_environment ON chat_messages(environment);",
];

/// Migration for tables created before rows carried an environment.
pub const ADD_ENVIRONMENT_COLUMNS: [&str; 2] = [
    "ALTER TABLE chat_sessions ADD COLUMN IF NOT EXISTS environment TEXT NOT NULL DEFAULT 'local';",
    "ALTER TABLE chat_messages ADD COLUMN IF NOT EXISTS environment TEXT NOT NULL DEFAULT 'local';",
];

/// The full script needed to prepare an empty database.
pub fn bootstrap_sql() -> String {
    let mut sql = String::new();
    sql.push_str(CREATE_SESSIONS);
    sql.push_str("\n\n");
    sql.push_str(CREATE_MESSAGES);
    sql.push_str("\n\n");
    for statement in CREATE_INDEXES {
        sql.push_str(statement);
        sql.push('\n');
    }
    sql
}
