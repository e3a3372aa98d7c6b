//! Error types shared across the crate.
//!
//! Every failure at the persistence boundary is represented here so that
//! callers can downgrade it to a notice instead of aborting the session.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a persistence backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },

    /// The backend does not know the table that was addressed.
    #[error("table `{table}` does not exist in the backend")]
    MissingTable {
        /// Name of the missing table.
        table: String,
    },

    /// A row could not be (de)serialized.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The addressed session does not exist.
    #[error("session {0} not found")]
    SessionNotFound(String),

    /// The backend cannot be used (e.g. credentials are missing).
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while resolving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The secrets file is not valid TOML.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// The dotenv file has a malformed line.
    #[error("failed to parse {path}: {message}")]
    Dotenv {
        /// File that failed.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A key resolved to a value of the wrong shape.
    #[error("invalid value for {key} (from {source_name}): {value:?}")]
    InvalidValue {
        /// Configuration key.
        key: &'static str,
        /// Provider that supplied the value.
        source_name: &'static str,
        /// The offending value.
        value: String,
    },
}

/// Errors raised while loading credentials.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The credentials file could not be read.
    #[error("failed to read credentials {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The credentials file is not valid.
    #[error("malformed credentials {path}: {message}")]
    Malformed {
        /// File that failed.
        path: PathBuf,
        /// What was wrong.
        message: String,
    },
}

/// Errors raised by a generation source.
#[derive(Error, Debug)]
pub enum GenerateError {
    /// The consumer dropped its end of the channel.
    #[error("fragment channel disconnected")]
    Disconnected,

    /// The source itself failed.
    #[error("generation failed: {0}")]
    Source(String),
}
