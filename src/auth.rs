//! Login against a local credentials file.
//!
//! The file is TOML, one table per user:
//!
//! ```toml
//! [users.dana]
//! name = "Dana Levi"
//! password = "sha256:5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
//! ```
//!
//! Hashes are produced by [`hash_password`]. The username of a successful
//! login becomes the user id of the session.

use crate::error::AuthError;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Attempts allowed before the login gives up.
pub const MAX_ATTEMPTS: usize = 3;

const HASH_PREFIX: &str = "sha256:";

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    users: BTreeMap<String, UserEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct UserEntry {
    name: String,
    password: String,
}

/// A logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Login name; used as the session's user id.
    pub username: String,
    /// Display name.
    pub name: String,
}

/// Result of a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Username and password matched.
    Authenticated(Identity),
    /// Wrong credentials, too many attempts, or the user gave up.
    Rejected,
}

/// The users allowed to log in.
#[derive(Debug, Clone)]
pub struct Credentials {
    path: PathBuf,
    users: BTreeMap<String, UserEntry>,
}

impl Credentials {
    /// Load the credentials file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// holds a password that is not a `sha256:` hash.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|source| AuthError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Parse credentials from `text`; `path` is only used in errors.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Malformed`] on invalid content.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self, AuthError> {
        let path = path.into();
        let file: CredentialsFile = toml::from_str(text).map_err(|err| AuthError::Malformed {
            path: path.clone(),
            message: err.to_string(),
        })?;

        if let Some((user, _)) = file
            .users
            .iter()
            .find(|(_, entry)| !is_hash(&entry.password))
        {
            return Err(AuthError::Malformed {
                path,
                message: format!("password of `{user}` is not a {HASH_PREFIX}<hex> hash"),
            });
        }

        info!(path = %path.display(), users = file.users.len(), "loaded credentials");
        Ok(Self {
            path,
            users: file.users,
        })
    }

    /// File the credentials came from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of known users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Check whether no user can log in.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Check one username/password pair.
    pub fn verify(&self, username: &str, password: &str) -> AuthOutcome {
        let username = username.trim();
        match self.users.get(username) {
            Some(entry) if entry.password.eq_ignore_ascii_case(&hash_password(password)) => {
                AuthOutcome::Authenticated(Identity {
                    username: username.to_string(),
                    name: entry.name.clone(),
                })
            }
            _ => AuthOutcome::Rejected,
        }
    }

    /// Run the login flow.
    ///
    /// `prompt` is called with the 1-based attempt number and returns the
    /// entered username and password, or `None` when the user gives up.
    /// At most [`MAX_ATTEMPTS`] attempts are made.
    pub fn login<F>(&self, mut prompt: F) -> AuthOutcome
    where
        F: FnMut(usize) -> Option<(String, String)>,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let Some((username, password)) = prompt(attempt) else {
                info!("login abandoned");
                return AuthOutcome::Rejected;
            };
            match self.verify(&username, &password) {
                AuthOutcome::Authenticated(identity) => {
                    info!(user = %identity.username, attempt, "login succeeded");
                    return AuthOutcome::Authenticated(identity);
                }
                AuthOutcome::Rejected => warn!(user = %username.trim(), attempt, "login rejected"),
            }
        }
        AuthOutcome::Rejected
    }
}

/// Hash a password into the stored `sha256:<hex>` form.
pub fn hash_password(password: &str) -> String {
    format!("{HASH_PREFIX}{:x}", Sha256::digest(password.as_bytes()))
}

fn is_hash(value: &str) -> bool {
    value
        .strip_prefix(HASH_PREFIX)
        .is_some_and(|hex| hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
