//! Configuration providers.
//!
//! A provider answers "what is the value of this key?" from one place. The
//! [`ProviderChain`] asks each provider in order and stops at the first
//! answer, remembering which provider gave it.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Secrets file location, relative to the working directory.
pub const SECRETS_FILE: &str = ".jaco/secrets.toml";

/// Dotenv file location, relative to the working directory.
pub const DOTENV_FILE: &str = ".env";

/// A single source of configuration values.
pub trait ConfigProvider: Send + Sync {
    /// Short name shown in logs and the status line.
    fn name(&self) -> &'static str;

    /// The raw value of `key`, if this provider has one.
    fn get(&self, key: &str) -> Option<String>;
}

/// Values from a TOML secrets file.
///
/// Only top-level scalars are read; nested tables are ignored.
#[derive(Debug, Clone, Default)]
pub struct SecretsFileProvider {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl SecretsFileProvider {
    /// Load `path`. A missing file yields an empty provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no secrets file");
                return Ok(Self {
                    path,
                    values: HashMap::new(),
                });
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let table = contents
            .parse::<toml::Table>()
            .map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;

        let values = table
            .into_iter()
            .filter_map(|(key, value)| scalar(value).map(|value| (key, value)))
            .collect::<HashMap<_, _>>();
        debug!(path = %path.display(), keys = values.len(), "loaded secrets file");
        Ok(Self { path, values })
    }

    /// File this provider was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn scalar(value: toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

impl ConfigProvider for SecretsFileProvider {
    fn name(&self) -> &'static str {
        "secrets"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Values from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvProvider;

impl ConfigProvider for EnvProvider {
    fn name(&self) -> &'static str {
        "env"
    }

    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Values from a dotenv file, read without touching the process
/// environment.
#[derive(Debug, Clone, Default)]
pub struct DotenvProvider {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl DotenvProvider {
    /// Load `path`. A missing file yields an empty provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but has a malformed line.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if !path.exists() {
            debug!(path = %path.display(), "no dotenv file");
            return Ok(Self {
                path,
                values: HashMap::new(),
            });
        }

        let iter = dotenv::from_path_iter(&path).map_err(|err| dotenv_error(&path, &err))?;
        let mut values = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|err| dotenv_error(&path, &err))?;
            values.insert(key, value);
        }
        debug!(path = %path.display(), keys = values.len(), "loaded dotenv file");
        Ok(Self { path, values })
    }

    /// File this provider was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn dotenv_error(path: &Path, err: &dotenv::Error) -> ConfigError {
    ConfigError::Dotenv {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

impl ConfigProvider for DotenvProvider {
    fn name(&self) -> &'static str {
        "dotenv"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Fixed in-memory values, for overrides and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    name: &'static str,
    values: HashMap<String, String>,
}

impl StaticProvider {
    /// Create a provider called `name` holding `values`.
    pub fn new<I, K, V>(name: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name,
            values: values.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl ConfigProvider for StaticProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// An ordered list of providers; the first to answer wins.
#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl ProviderChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard chain rooted at `dir`: secrets file, then process
    /// environment, then dotenv file.
    ///
    /// # Errors
    ///
    /// Returns an error if either file exists but is malformed.
    pub fn standard(dir: &Path) -> Result<Self, ConfigError> {
        Ok(Self::new()
            .with(SecretsFileProvider::load(dir.join(SECRETS_FILE))?)
            .with(EnvProvider)
            .with(DotenvProvider::load(dir.join(DOTENV_FILE))?))
    }

    /// Append a provider at the lowest priority.
    #[must_use]
    pub fn with(mut self, provider: impl ConfigProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Provider names, highest priority first.
    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// The first non-blank value for `key` and the provider it came from.
    pub fn lookup(&self, key: &str) -> Option<(String, &'static str)> {
        self.providers.iter().find_map(|provider| {
            provider
                .get(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(|value| (value, provider.name()))
        })
    }
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_secrets_file_scalars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(
            &path,
            "SUPABASE_URL = \"https://example.supabase.co\"\nJACO_HISTORY_LIMIT = 20\n\n[nested]\nignored = true\n",
        )
        .unwrap();

        let provider = SecretsFileProvider::load(&path).unwrap();
        assert_eq!(provider.get("SUPABASE_URL").as_deref(), Some("https://example.supabase.co"));
        assert_eq!(provider.get("JACO_HISTORY_LIMIT").as_deref(), Some("20"));
        assert_eq!(provider.get("nested"), None);
    }

    #[test]
    fn test_missing_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = SecretsFileProvider::load(dir.path().join("nope.toml")).unwrap();
        let dotenv = DotenvProvider::load(dir.path().join(".env")).unwrap();
        assert_eq!(secrets.get("SUPABASE_URL"), None);
        assert_eq!(dotenv.get("SUPABASE_URL"), None);
    }

    #[test]
    fn test_malformed_secrets_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(&path, "SUPABASE_URL = ").unwrap();
        assert!(matches!(
            SecretsFileProvider::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_dotenv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "# comment\nSUPABASE_KEY=abc123\nJACO_USER_ID=\"dana\"\n").unwrap();

        let provider = DotenvProvider::load(&path).unwrap();
        assert_eq!(provider.get("SUPABASE_KEY").as_deref(), Some("abc123"));
        assert_eq!(provider.get("JACO_USER_ID").as_deref(), Some("dana"));
        // The process environment is left alone.
        assert!(std::env::var("JACO_USER_ID").map_or(true, |v| v != "dana"));
    }

    #[test]
    fn test_chain_first_answer_wins() {
        let chain = ProviderChain::new()
            .with(StaticProvider::new("first", [("A", "1")]))
            .with(StaticProvider::new("second", [("A", "2"), ("B", "3")]));

        assert_eq!(chain.lookup("A"), Some(("1".to_string(), "first")));
        assert_eq!(chain.lookup("B"), Some(("3".to_string(), "second")));
        assert_eq!(chain.lookup("C"), None);
        assert_eq!(chain.names(), vec!["first", "second"]);
    }

    #[test]
    fn test_chain_skips_blank_values() {
        let chain = ProviderChain::new()
            .with(StaticProvider::new("first", [("A", "  ")]))
            .with(StaticProvider::new("second", [("A", "value")]));
        assert_eq!(chain.lookup("A"), Some(("value".to_string(), "second")));
    }

    #[test]
    fn test_standard_chain_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".jaco")).unwrap();
        fs::write(dir.path().join(SECRETS_FILE), "JACO_TEST_STANDARD_KEY = \"secret\"\n").unwrap();
        fs::write(dir.path().join(DOTENV_FILE), "JACO_TEST_STANDARD_KEY=dotenv\nJACO_TEST_DOTENV_ONLY=yes\n")
            .unwrap();

        let chain = ProviderChain::standard(dir.path()).unwrap();
        assert_eq!(chain.names(), vec!["secrets", "env", "dotenv"]);
        assert_eq!(
            chain.lookup("JACO_TEST_STANDARD_KEY"),
            Some(("secret".to_string(), "secrets"))
        );
        assert_eq!(
            chain.lookup("JACO_TEST_DOTENV_ONLY"),
            Some(("yes".to_string(), "dotenv"))
        );
    }
}
