//! Runtime environment label.
//!
//! Every stored row is tagged with the environment it was written from so
//! that local experiments and hosted deployments can share one backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Variables whose presence marks a hosted deployment.
pub const CLOUD_MARKERS: [&str; 7] = [
    "STREAMLIT_SHARING_MODE",
    "STREAMLIT_CLOUD",
    "STREAMLIT_SERVER_PORT",
    "STREAMLIT_RUNTIME_MAX_CACHED_MESSAGE_AGE",
    "DYNO",
    "RAILWAY_ENVIRONMENT",
    "VERCEL",
];

/// Directory hosted app checkouts are mounted under.
const CLOUD_MOUNT: &str = "/mount/src/";

/// Where the process is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// A developer machine.
    #[default]
    Local,
    /// A hosted deployment.
    Cloud,
}

impl Environment {
    /// Detect the environment of the current process.
    pub fn detect() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::detect_from(|key| std::env::var(key).ok(), &cwd)
    }

    /// Detect the environment from an explicit variable lookup and working
    /// directory.
    ///
    /// A marker variable counts only when it is set to a non-empty value.
    pub fn detect_from<F>(lookup: F, cwd: &Path) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let marked = CLOUD_MARKERS
            .iter()
            .any(|key| lookup(key).is_some_and(|value| !value.is_empty()));

        if marked || cwd.to_string_lossy().contains(CLOUD_MOUNT) {
            Self::Cloud
        } else {
            Self::Local
        }
    }

    /// Lowercase name, as stored in the `environment` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        }
    }

    /// Session name prefix, e.g. `[LOCAL]`.
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Local => "[LOCAL]",
            Self::Cloud => "[CLOUD]",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
