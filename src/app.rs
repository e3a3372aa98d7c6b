//! Interactive terminal chat.
//!
//! Wires configuration, login, persistence and the session context
//! together, then runs a prompt loop. Replies stream into a
//! [`TerminalRegion`] below the prompt.

use crate::auth::{AuthOutcome, Credentials, Identity, MAX_ATTEMPTS};
use crate::config::{Config, PersistencePlan};
use crate::environment::Environment;
use crate::render::{StatusLine, TerminalRegion};
use crate::session::{Notice, NoticeLevel, SessionContext, SessionOptions};
use crate::store::{schema, ChatStore, Role, SupabaseStore};
use crate::stream::{Generator, SimulatedGenerator};
use anyhow::{bail, Context as _, Result};
use crossterm::style::Stylize;
use crossterm::terminal;
use dialoguer::Password;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{info, warn};

/// Application title.
pub const TITLE: &str = "ג'אקו צ'אט";

/// Signature shown under the title.
pub const SIGNATURE: &str = "הסוכן החכם של ג'אקו";

/// Prompt shown before user input.
const PROMPT: &str = "You: ";

/// In-session commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start a new conversation.
    New,
    /// Print the conversation so far.
    History,
    /// List the user's recent sessions.
    Sessions,
    /// Leave.
    Quit,
}

impl Command {
    /// Every command, as typed.
    pub const ALL: [(&'static str, Self); 4] = [
        ("/new", Self::New),
        ("/history", Self::History),
        ("/sessions", Self::Sessions),
        ("/quit", Self::Quit),
    ];

    /// Parse a command line; `None` if `line` is not a known command.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        Self::ALL
            .iter()
            .find(|(name, _)| *name == line)
            .map(|(_, command)| *command)
    }
}

/// What the prompt loop should do with one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Blank line; prompt again.
    Empty,
    /// An in-session command.
    Command(Command),
    /// Something starting with `/` that is not a command.
    Unknown(String),
    /// A message for the assistant.
    Message(String),
}

impl Input {
    /// Classify one line.
    pub fn classify(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            Self::Empty
        } else if let Some(command) = Command::parse(trimmed) {
            Self::Command(command)
        } else if trimmed.starts_with('/') && !trimmed.contains(char::is_whitespace) {
            Self::Unknown(trimmed.to_string())
        } else {
            Self::Message(trimmed.to_string())
        }
    }
}

/// Prompt helper: completes and hints the in-session commands.
#[derive(Debug, Clone, Default)]
struct CommandHelper;

impl Helper for CommandHelper {}

impl Completer for CommandHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') {
            return Ok((0, Vec::new()));
        }
        let candidates = Command::ALL
            .iter()
            .filter(|(name, _)| name.starts_with(line))
            .map(|(name, _)| Pair {
                display: (*name).to_string(),
                replacement: (*name).to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Hinter for CommandHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if !line.starts_with('/') {
            return None;
        }
        Command::ALL
            .iter()
            .find(|(name, _)| name.starts_with(line) && name.len() > line.len())
            .map(|(name, _)| name[line.len()..].to_string())
    }
}

impl Highlighter for CommandHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(hint.dark_grey().to_string())
    }
}

impl Validator for CommandHelper {}

/// Run the interactive chat until the user quits.
///
/// # Errors
///
/// Returns an error if the credentials file is unusable, the login is
/// rejected, or the terminal cannot be driven.
pub fn run(config: &Config) -> Result<()> {
    let environment = Environment::detect();
    info!(%environment, sources = %config.source_summary(), "starting");

    let identity = login(config)?;
    let user_id = identity
        .as_ref()
        .map_or_else(|| config.user_id.clone(), |id| id.username.clone());

    let mut notices = Vec::new();
    let store = open_store(config, environment, &mut notices);
    let generator: Arc<dyn Generator> = Arc::new(SimulatedGenerator::new(config.simulation));
    let options = SessionOptions {
        user_id,
        resume: config.session_id,
        history_limit: config.history_limit,
        stream: config.stream_settings(),
    };

    let (mut context, started) = SessionContext::start(store, generator, options);
    notices.extend(started);

    let mut out = io::stdout();
    print_header(&mut out, &context, environment, config, identity.as_ref())?;
    print_notices(&mut out, &notices)?;
    print_history(&mut out, &context)?;

    let mut editor: Editor<CommandHelper, DefaultHistory> = Editor::new()?;
    editor.set_helper(Some(CommandHelper));

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };

        match Input::classify(&line) {
            Input::Empty => {}
            Input::Command(Command::Quit) => break,
            Input::Command(Command::New) => {
                let notices = context.reset();
                print_notices(&mut out, &notices)?;
                print_header(&mut out, &context, environment, config, identity.as_ref())?;
            }
            Input::Command(Command::History) => print_history(&mut out, &context)?,
            Input::Command(Command::Sessions) => print_sessions(&mut out, &context)?,
            Input::Unknown(command) => {
                let known: Vec<&str> = Command::ALL.iter().map(|(name, _)| *name).collect();
                writeln!(out, "Unknown command {command}. Try {}.", known.join(", "))?;
            }
            Input::Message(message) => {
                let _ = editor.add_history_entry(message.as_str());
                writeln!(out, "{}", "Assistant:".bold())?;
                let mut region = TerminalRegion::stdout();
                context.exchange(&message, &mut region);
                region.finish()?;
            }
        }
    }

    info!(messages = context.history().len(), "session closed");
    Ok(())
}

/// Build the store the plan asks for, downgrading failures to notices.
fn open_store(config: &Config, environment: Environment, notices: &mut Vec<Notice>) -> Option<Arc<dyn ChatStore>> {
    match config.persistence_plan() {
        PersistencePlan::Disabled => {
            info!(mode = %config.persistence, "persistence disabled");
            None
        }
        PersistencePlan::Misconfigured(reason) => {
            warn!(%reason, "persistence unavailable");
            notices.push(Notice::warning(format!("Persistence unavailable: {reason}")));
            None
        }
        PersistencePlan::Supabase(credentials) => {
            match SupabaseStore::new(&credentials.url, &credentials.key, environment) {
                Ok(store) => Some(Arc::new(store)),
                Err(err) => {
                    warn!(error = %err, "cannot set up backend");
                    notices.push(Notice::store_failure("Persistence unavailable", &err));
                    None
                }
            }
        }
    }
}

/// Ask for credentials when a credentials file is configured.
fn login(config: &Config) -> Result<Option<Identity>> {
    let Some(path) = &config.auth_file else {
        return Ok(None);
    };
    let credentials = Credentials::load(path).context("cannot load credentials")?;

    let mut editor = rustyline::DefaultEditor::new()?;
    let outcome = credentials.login(|attempt| {
        if attempt > 1 {
            println!("{}", "Wrong username or password.".red());
        }
        let username = editor
            .readline(&format!("Username ({attempt}/{MAX_ATTEMPTS}): "))
            .ok()?;
        let password = match Password::new().with_prompt("Password").interact() {
            Ok(password) => password,
            Err(err) => {
                warn!(error = %err, "cannot read password");
                return None;
            }
        };
        Some((username, password))
    });

    match outcome {
        AuthOutcome::Authenticated(identity) => Ok(Some(identity)),
        AuthOutcome::Rejected => bail!("login rejected"),
    }
}

/// Status line contents: environment, session, persistence and sources.
pub fn status_line(
    context: &SessionContext,
    environment: Environment,
    config: &Config,
    identity: Option<&Identity>,
) -> StatusLine {
    let mut line = StatusLine::new();
    line.set_left(match identity {
        Some(identity) => format!("{} {}", environment.prefix(), identity.name),
        None => environment.prefix().to_string(),
    });
    line.set_center(match context.session_id() {
        Some(id) => format!("session {}", id.short()),
        None => "in-memory session".to_string(),
    });
    let persistence = match (context.is_persistent(), context.backend()) {
        (true, Some(backend)) => format!("saving to {backend}"),
        _ => "not saved".to_string(),
    };
    line.set_right(format!("{persistence} · config: {}", config.source_summary()));
    line
}

fn print_header(
    out: &mut impl Write,
    context: &SessionContext,
    environment: Environment,
    config: &Config,
    identity: Option<&Identity>,
) -> io::Result<()> {
    let width = terminal::size().map_or(80, |(w, _)| w);
    writeln!(out, "{}  {}", TITLE.bold(), SIGNATURE.italic())?;
    writeln!(out, "{}", status_line(context, environment, config, identity).render(width))?;
    writeln!(out)
}

fn print_notices(out: &mut impl Write, notices: &[Notice]) -> io::Result<()> {
    for notice in notices {
        match notice.level {
            NoticeLevel::Info => writeln!(out, "{}", notice.text.as_str().green())?,
            NoticeLevel::Warning => writeln!(out, "{}", notice.text.as_str().yellow())?,
        }
        if let Some(hint) = &notice.hint {
            writeln!(out, "Run this SQL in the Supabase SQL editor to create the tables:\n")?;
            writeln!(out, "{hint}")?;
            writeln!(out, "Tables created before rows carried an environment need:\n")?;
            for statement in schema::ADD_ENVIRONMENT_COLUMNS {
                writeln!(out, "{statement}")?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

fn print_sessions(out: &mut impl Write, context: &SessionContext) -> io::Result<()> {
    let sessions = match context.recent_sessions() {
        Ok(sessions) => sessions,
        Err(err) => {
            warn!(error = %err, "failed to list sessions");
            return print_notices(out, &[Notice::store_failure("Could not list sessions", &err)]);
        }
    };
    if sessions.is_empty() {
        return writeln!(out, "No saved sessions.");
    }
    let current = context.session_id();
    for record in &sessions {
        let marker = if Some(&record.session_id) == current { '*' } else { ' ' };
        writeln!(
            out,
            "{marker} {}  {}  {}",
            record.session_id,
            record.updated_at.format("%Y-%m-%d %H:%M"),
            record.session_name
        )?;
    }
    writeln!(out, "Set {} to resume one.", crate::config::JACO_SESSION_ID)
}

fn print_history(out: &mut impl Write, context: &SessionContext) -> io::Result<()> {
    for entry in context.history() {
        let label = match entry.role {
            Role::User => "You:".bold().cyan(),
            Role::Assistant => "Assistant:".bold(),
        };
        writeln!(out, "{label} {}", entry.content)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::stream::SimulationSettings;

    #[test]
    fn test_classify_input() {
        assert_eq!(Input::classify("   "), Input::Empty);
        assert_eq!(Input::classify("/new"), Input::Command(Command::New));
        assert_eq!(Input::classify(" /quit "), Input::Command(Command::Quit));
        assert_eq!(Input::classify("/history"), Input::Command(Command::History));
        assert_eq!(Input::classify("/sessions"), Input::Command(Command::Sessions));
        assert_eq!(Input::classify("/nope"), Input::Unknown("/nope".into()));
        assert_eq!(
            Input::classify("/ what is this"),
            Input::Message("/ what is this".into())
        );
        assert_eq!(Input::classify(" שלום "), Input::Message("שלום".into()));
    }

    #[test]
    fn test_open_store_plans() {
        let mut notices = Vec::new();
        let config = Config::default();
        assert!(open_store(&config, Environment::Local, &mut notices).is_none());
        assert!(notices.is_empty());

        let config = Config {
            persistence: crate::config::PersistenceMode::On,
            ..Config::default()
        };
        assert!(open_store(&config, Environment::Local, &mut notices).is_none());
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn test_status_line_reflects_session() {
        let generator: Arc<dyn Generator> = Arc::new(SimulatedGenerator::new(SimulationSettings::INSTANT));
        let store: Arc<dyn ChatStore> = Arc::new(MemoryStore::new());
        let (context, _) = SessionContext::start(Some(store), generator, SessionOptions::default());

        let line = status_line(&context, Environment::Local, &Config::default(), None);
        assert_eq!(line.left(), "[LOCAL]");
        assert!(line.center().starts_with("session "));
        assert_eq!(line.right(), "saving to memory · config: defaults");
        assert!(line.render(80).contains("saving to memory · config: defaults"));
    }

    #[test]
    fn test_status_line_shows_sources_at_80_columns() {
        let generator: Arc<dyn Generator> = Arc::new(SimulatedGenerator::new(SimulationSettings::INSTANT));
        let (context, _) = SessionContext::start(None, generator, SessionOptions::default());
        let config = Config {
            sources: vec![(crate::config::SUPABASE_URL, "secrets"), (crate::config::JACO_USER_ID, "env")],
            ..Config::default()
        };

        let rendered = status_line(&context, Environment::Cloud, &config, None).render(80);
        assert!(rendered.contains("[CLOUD]"));
        assert!(rendered.contains("in-memory session"));
        assert!(rendered.contains("not saved · config: secrets+env"));
    }

    #[test]
    fn test_sessions_listed_with_current_marked() {
        let generator: Arc<dyn Generator> = Arc::new(SimulatedGenerator::new(SimulationSettings::INSTANT));
        let store: Arc<dyn ChatStore> = Arc::new(MemoryStore::new());
        let (context, _) = SessionContext::start(Some(store), generator, SessionOptions::default());
        let current = *context.session_id().unwrap();

        let mut out = Vec::new();
        print_sessions(&mut out, &context).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(&format!("* {current}")));
        assert!(text.contains("Chat Session"));
        assert!(text.contains("JACO_SESSION_ID"));
    }

    #[test]
    fn test_history_printed_with_labels() {
        let generator: Arc<dyn Generator> = Arc::new(SimulatedGenerator::new(SimulationSettings::INSTANT));
        let (mut context, _) = SessionContext::start(
            None,
            generator,
            SessionOptions {
                stream: crate::stream::StreamSettings {
                    poll_timeout: std::time::Duration::from_millis(5),
                    ..Default::default()
                },
                ..SessionOptions::default()
            },
        );
        context.exchange("hi", &mut crate::render::RecordingSink::new());

        let mut out = Vec::new();
        print_history(&mut out, &context).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("hi"));
        assert!(text.contains("שלום **לך**, מה שלומך?"));
    }
}
