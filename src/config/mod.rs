//! Configuration.
//!
//! Every setting is resolved through an explicit [`ProviderChain`] instead
//! of ad-hoc environment lookups, and the provider that supplied each value
//! is kept so the status line and logs can say where it came from.

mod provider;

pub use provider::{
    ConfigProvider, DotenvProvider, EnvProvider, ProviderChain, SecretsFileProvider, StaticProvider,
    DOTENV_FILE, SECRETS_FILE,
};

use crate::error::ConfigError;
use crate::store::{SessionId, DEFAULT_USER_ID};
use crate::stream::{SimulationSettings, StreamSettings};
use std::fmt;
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Supabase project URL.
pub const SUPABASE_URL: &str = "SUPABASE_URL";
/// Supabase API key.
pub const SUPABASE_KEY: &str = "SUPABASE_KEY";
/// Persistence mode (`auto`, `on`, `off`).
pub const JACO_PERSISTENCE: &str = "JACO_PERSISTENCE";
/// Session to resume.
pub const JACO_SESSION_ID: &str = "JACO_SESSION_ID";
/// User id for new sessions when nobody logged in.
pub const JACO_USER_ID: &str = "JACO_USER_ID";
/// Number of messages loaded when a session is resumed.
pub const JACO_HISTORY_LIMIT: &str = "JACO_HISTORY_LIMIT";
/// Consumer poll timeout, milliseconds; must be positive.
pub const JACO_POLL_TIMEOUT_MS: &str = "JACO_POLL_TIMEOUT_MS";
/// Simulated thinking time, milliseconds.
pub const JACO_INITIAL_DELAY_MS: &str = "JACO_INITIAL_DELAY_MS";
/// Simulated per-fragment delay, milliseconds.
pub const JACO_TOKEN_DELAY_MS: &str = "JACO_TOKEN_DELAY_MS";
/// Credentials file enabling the login step.
pub const JACO_AUTH_FILE: &str = "JACO_AUTH_FILE";

/// Default for [`JACO_HISTORY_LIMIT`].
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Whether messages are written to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistenceMode {
    /// On when backend credentials resolve, off otherwise.
    #[default]
    Auto,
    /// Required; missing credentials are reported.
    On,
    /// Never persist.
    Off,
}

impl FromStr for PersistenceMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "on" | "true" | "1" | "yes" => Ok(Self::On),
            "off" | "false" | "0" | "no" => Ok(Self::Off),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::On => "on",
            Self::Off => "off",
        })
    }
}

/// Backend credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct SupabaseCredentials {
    /// Project URL.
    pub url: String,
    /// API key.
    pub key: String,
}

impl fmt::Debug for SupabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseCredentials")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// What the session should do about persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistencePlan {
    /// Run in memory.
    Disabled,
    /// Write through to Supabase.
    Supabase(SupabaseCredentials),
    /// Persistence was required but cannot be set up.
    Misconfigured(String),
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend credentials, when both URL and key resolved.
    pub supabase: Option<SupabaseCredentials>,
    /// Persistence mode.
    pub persistence: PersistenceMode,
    /// Session to resume.
    pub session_id: Option<SessionId>,
    /// User id for new sessions.
    pub user_id: String,
    /// Messages loaded on resume.
    pub history_limit: usize,
    /// Consumer poll timeout.
    pub poll_timeout: Duration,
    /// Simulated generator pacing.
    pub simulation: SimulationSettings,
    /// Credentials file for the login step.
    pub auth_file: Option<PathBuf>,
    /// Which provider supplied each key that resolved, in resolution order.
    pub sources: Vec<(&'static str, &'static str)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase: None,
            persistence: PersistenceMode::Auto,
            session_id: None,
            user_id: DEFAULT_USER_ID.to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            poll_timeout: StreamSettings::default().poll_timeout,
            simulation: SimulationSettings::default(),
            auth_file: None,
            sources: Vec::new(),
        }
    }
}

impl Config {
    /// Resolve every key through `chain`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a key resolves to a value
    /// that cannot be parsed.
    pub fn resolve(chain: &ProviderChain) -> Result<Self, ConfigError> {
        let mut resolver = Resolver {
            chain,
            sources: Vec::new(),
        };
        let defaults = Self::default();

        let url = resolver.string(SUPABASE_URL);
        let key = resolver.string(SUPABASE_KEY);
        let supabase = match (url, key) {
            (Some(url), Some(key)) => Some(SupabaseCredentials { url, key }),
            _ => None,
        };

        let config = Self {
            supabase,
            persistence: resolver.parse(JACO_PERSISTENCE)?.unwrap_or(defaults.persistence),
            session_id: resolver.parse(JACO_SESSION_ID)?,
            user_id: resolver.string(JACO_USER_ID).unwrap_or(defaults.user_id),
            history_limit: resolver
                .parse(JACO_HISTORY_LIMIT)?
                .unwrap_or(defaults.history_limit),
            poll_timeout: resolver
                .millis_nonzero(JACO_POLL_TIMEOUT_MS)?
                .unwrap_or(defaults.poll_timeout),
            simulation: SimulationSettings {
                initial_delay: resolver
                    .millis(JACO_INITIAL_DELAY_MS)?
                    .unwrap_or(defaults.simulation.initial_delay),
                fragment_delay: resolver
                    .millis(JACO_TOKEN_DELAY_MS)?
                    .unwrap_or(defaults.simulation.fragment_delay),
            },
            auth_file: resolver.string(JACO_AUTH_FILE).map(PathBuf::from),
            sources: resolver.sources,
        };

        for (key, source) in &config.sources {
            info!(key, source, "configuration resolved");
        }
        Ok(config)
    }

    /// Decide what to do about persistence.
    pub fn persistence_plan(&self) -> PersistencePlan {
        match (self.persistence, &self.supabase) {
            (PersistenceMode::Off, _) | (PersistenceMode::Auto, None) => PersistencePlan::Disabled,
            (_, Some(credentials)) => PersistencePlan::Supabase(credentials.clone()),
            (PersistenceMode::On, None) => PersistencePlan::Misconfigured(format!(
                "{JACO_PERSISTENCE}=on but {SUPABASE_URL} and {SUPABASE_KEY} are not both set"
            )),
        }
    }

    /// Render loop settings.
    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            poll_timeout: self.poll_timeout,
            ..StreamSettings::default()
        }
    }

    /// The provider that supplied `key`, if it resolved.
    pub fn source_of(&self, key: &str) -> Option<&'static str> {
        self.sources
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, source)| *source)
    }

    /// Distinct providers that supplied anything, e.g. `secrets+env`.
    pub fn source_summary(&self) -> String {
        let mut names: Vec<&str> = Vec::new();
        for &(_, source) in &self.sources {
            if !names.contains(&source) {
                names.push(source);
            }
        }
        if names.is_empty() {
            "defaults".to_string()
        } else {
            names.join("+")
        }
    }
}

struct Resolver<'a> {
    chain: &'a ProviderChain,
    sources: Vec<(&'static str, &'static str)>,
}

impl Resolver<'_> {
    fn raw(&mut self, key: &'static str) -> Option<(String, &'static str)> {
        let found = self.chain.lookup(key);
        if let Some((_, source)) = &found {
            self.sources.push((key, source));
        }
        found
    }

    fn string(&mut self, key: &'static str) -> Option<String> {
        self.raw(key).map(|(value, _)| value)
    }

    fn parse<T: FromStr>(&mut self, key: &'static str) -> Result<Option<T>, ConfigError> {
        self.raw(key)
            .map(|(value, source_name)| {
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    key,
                    source_name,
                    value,
                })
            })
            .transpose()
    }

    fn millis(&mut self, key: &'static str) -> Result<Option<Duration>, ConfigError> {
        Ok(self.parse::<u64>(key)?.map(Duration::from_millis))
    }

    /// Like [`Self::millis`], but `0` is an invalid value.
    fn millis_nonzero(&mut self, key: &'static str) -> Result<Option<Duration>, ConfigError> {
        Ok(self
            .parse::<NonZeroU64>(key)?
            .map(|ms| Duration::from_millis(ms.get())))
    }
}
