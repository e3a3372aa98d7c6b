//! # Jaco Chat
//!
//! A terminal chat with a streaming assistant.
//!
//! Each reply is produced on a worker thread and streamed over a channel to
//! the caller's thread, which redraws it in place as fragments arrive.
//! Conversations can be written through to a hosted Postgres (Supabase)
//! and resumed later; when the backend is missing or failing the chat
//! keeps going in memory.
//!
//! ## Core Concepts
//!
//! - **Producer / consumer**: a [`Producer`] emits fragments and sets a
//!   [`CompletionLatch`] when done; a [`StreamRenderer`] polls with a timeout
//!   and renders into a [`RenderSink`]
//! - **Placeholder frames**: shown until the first fragment arrives
//! - **Session context**: a [`SessionContext`] holds the history and the
//!   optional backing session, passed explicitly to every operation
//! - **Best-effort persistence**: store failures become log lines and
//!   notices, never errors for the user
//!
//! ## Example
//!
//! ```rust
//! use jaco::render::RecordingSink;
//! use jaco::session::{SessionContext, SessionOptions};
//! use jaco::stream::{SimulatedGenerator, SimulationSettings};
//! use std::sync::Arc;
//!
//! let generator = Arc::new(SimulatedGenerator::new(SimulationSettings::INSTANT));
//! let (mut context, _notices) = SessionContext::start(None, generator, SessionOptions::default());
//!
//! let mut sink = RecordingSink::new();
//! let reply = context.exchange("hello", &mut sink);
//! assert_eq!(sink.last(), Some(reply));
//! assert_eq!(context.history().len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod app;
pub mod auth;
pub mod config;
pub mod environment;
pub mod error;
pub mod logging;
pub mod render;
pub mod session;
pub mod store;
pub mod stream;

// Re-exports for convenience
pub use config::{Config, PersistenceMode, PersistencePlan, ProviderChain};
pub use environment::Environment;
pub use error::{AuthError, ConfigError, GenerateError, StoreError};
pub use render::{RenderSink, StatusLine, TerminalRegion};
pub use session::{ChatHandler, History, Notice, SessionContext, SessionOptions};
pub use store::{ChatStore, MemoryStore, Role, SessionId, SupabaseStore};
pub use stream::{CompletionLatch, Generator, Producer, SimulatedGenerator, StreamRenderer, StreamSettings};
