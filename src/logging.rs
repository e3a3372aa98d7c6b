//! Tracing subscriber setup.
//!
//! Stdout carries the live chat region, so log lines go to a file in the
//! user cache directory. When that file cannot be opened they go to stderr.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "warn,jaco=info";

/// Default log file: `<cache dir>/jaco-chat/jaco.log`.
pub fn log_file_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("jaco-chat")
        .join("jaco.log")
}

fn filter() -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(DEFAULT_FILTER)
    }
}

/// Install the global subscriber.
///
/// Returns the log file in use, or `None` when logging fell back to stderr.
/// Calling this twice leaves the first subscriber in place.
pub fn init() -> Option<PathBuf> {
    let path = log_file_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(false)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            let _ = subscriber.with_ansi(false).with_writer(Mutex::new(file)).try_init();
            Some(path)
        }
        Err(err) => {
            eprintln!(
                "Warning: could not open log file {}: {err}; logging to stderr",
                path.display()
            );
            let _ = subscriber.with_writer(std::io::stderr).try_init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_location() {
        let path = log_file_path();
        assert!(path.ends_with("jaco-chat/jaco.log"));
    }
}
