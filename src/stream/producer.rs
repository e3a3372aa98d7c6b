//! Producer: the detached worker that generates one response.
//!
//! The worker runs a [`Generator`] against a fresh [`Emitter`], optionally
//! records the finished exchange, and sets the completion latch on every
//! exit path. The caller never joins it; the channel and the latch are the
//! only synchronisation.

use super::channel::{Fragment, FragmentSender};
use super::latch::{CompletionGuard, CompletionLatch};
use crate::error::{GenerateError, StoreError};
use crate::store::{ChatStore, MessageId, Role, SessionId};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A source of response fragments.
///
/// This is the seam between the streaming protocol and whatever produces
/// text: the canned [`SimulatedGenerator`](super::SimulatedGenerator), or a
/// real model stream. Implementations push fragments in order through the
/// emitter and return; signalling completion is handled by the
/// [`Producer`] around them.
pub trait Generator: Send + Sync {
    /// Generate a reply to `input`, emitting fragments as they become ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails or the consumer hung up. Any
    /// fragments emitted before the error have already been delivered.
    fn generate(&self, input: &str, emitter: &mut Emitter<'_>) -> Result<(), GenerateError>;
}

/// Write end handed to a [`Generator`].
///
/// Forwards fragments to the channel and keeps a transcript of everything
/// delivered so the producer can persist the full response.
#[derive(Debug)]
pub struct Emitter<'a> {
    sender: &'a FragmentSender,
    transcript: String,
    count: usize,
}

impl<'a> Emitter<'a> {
    /// Wrap a fragment sender.
    pub const fn new(sender: &'a FragmentSender) -> Self {
        Self {
            sender,
            transcript: String::new(),
            count: 0,
        }
    }

    /// Enqueue the next fragment.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Disconnected`] if the consumer is gone.
    pub fn emit(&mut self, fragment: impl Into<Fragment>) -> Result<(), GenerateError> {
        let fragment = fragment.into();
        let mark = self.transcript.len();
        self.transcript.push_str(&fragment);

        if self.sender.send(fragment).is_err() {
            self.transcript.truncate(mark);
            return Err(GenerateError::Disconnected);
        }

        self.count += 1;
        Ok(())
    }

    /// Concatenation of every fragment delivered so far.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Number of fragments delivered so far.
    pub const fn count(&self) -> usize {
        self.count
    }
}

/// Where a producer records finished exchanges.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn ChatStore>,
    session: SessionId,
}

impl Persistence {
    /// Record exchanges of `session` into `store`.
    pub fn new(store: Arc<dyn ChatStore>, session: SessionId) -> Self {
        Self { store, session }
    }

    /// The session exchanges are recorded under.
    pub const fn session(&self) -> &SessionId {
        &self.session
    }

    /// Save the user message, then the assistant response.
    ///
    /// # Errors
    ///
    /// Returns the first store failure; the assistant row is not attempted
    /// if the user row failed.
    pub fn record(&self, input: &str, response: &str) -> Result<(MessageId, MessageId), StoreError> {
        let user = self.store.save_message(&self.session, Role::User, input)?;
        let assistant = self.store.save_message(&self.session, Role::Assistant, response)?;
        Ok((user, assistant))
    }
}

impl fmt::Debug for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persistence")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Spawns one detached worker per exchange.
#[derive(Clone)]
pub struct Producer {
    generator: Arc<dyn Generator>,
    persistence: Option<Persistence>,
}

impl Producer {
    /// Create a producer over the given generation source, without persistence.
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            persistence: None,
        }
    }

    /// Record every successful exchange through `persistence`.
    #[must_use]
    pub fn with_persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// The persistence target, if any.
    pub const fn persistence(&self) -> Option<&Persistence> {
        self.persistence.as_ref()
    }

    /// Start generating a reply to `input` on a new thread.
    ///
    /// The latch is guaranteed to be set eventually: the guard is created
    /// here and moved into the worker, so even a failed spawn sets it.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the worker thread. The
    /// latch is already set when this happens.
    pub fn start(
        &self,
        input: &str,
        sender: FragmentSender,
        latch: &CompletionLatch,
    ) -> io::Result<()> {
        let guard = latch.guard();
        let generator = Arc::clone(&self.generator);
        let persistence = self.persistence.clone();
        let input = input.to_owned();

        thread::Builder::new()
            .name("jaco-producer".to_string())
            .spawn(move || {
                let worker = Worker { guard, sender };
                Self::run(generator.as_ref(), persistence.as_ref(), &input, &worker.sender);
            })
            .map(|_| ())
    }

    /// Worker body. Returning (or unwinding) drops the [`Worker`], which
    /// sets the latch.
    fn run(
        generator: &dyn Generator,
        persistence: Option<&Persistence>,
        input: &str,
        sender: &FragmentSender,
    ) {
        let started = Instant::now();
        let mut emitter = Emitter::new(sender);

        match generator.generate(input, &mut emitter) {
            Ok(()) => {
                debug!(
                    fragments = emitter.count(),
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "generation finished"
                );
                if let Some(persistence) = persistence {
                    match persistence.record(input, emitter.transcript()) {
                        Ok(_) => info!(session = %persistence.session().short(), "saved exchange"),
                        Err(err) => warn!(
                            session = %persistence.session().short(),
                            error = %err,
                            "failed to save exchange"
                        ),
                    }
                }
            }
            Err(err) => {
                error!(error = %err, fragments = emitter.count(), "generation failed");
            }
        }
    }
}

/// State owned by a running worker.
///
/// Fields drop in declaration order: the latch is set before the channel
/// disconnects, so a consumer that sees the channel closed also sees the
/// latch set.
struct Worker {
    #[allow(dead_code)]
    guard: CompletionGuard,
    sender: FragmentSender,
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("persistence", &self.persistence)
            .finish_non_exhaustive()
    }
}
