//! Streaming hand-off between a response producer and a renderer.
//!
//! One exchange uses exactly two threads of execution that share nothing
//! but a fragment channel and a completion latch:
//! - **Producer**: a detached worker thread that runs a [`Generator`] and
//!   pushes fragments onto the channel, then sets the latch.
//! - **Consumer**: the caller's thread, which drains the channel through a
//!   [`StreamRenderer`] and redraws a single output region.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   Fragment (FIFO)   ┌────────────────┐
//! │ Producer thread│ ──────────────────▶ │                │
//! │  (Generator)   │                     │ StreamRenderer │ ──▶ RenderSink
//! │                │ ── latch.set() ──▶  │  (caller)      │
//! └────────────────┘                     └────────────────┘
//! ```
//!
//! The consumer stops only once the latch is set *and* the channel is
//! empty. The latch is written with release ordering after the last send,
//! so observing it implies every fragment is already queued.

mod channel;
mod consumer;
mod indicator;
mod latch;
mod producer;
mod simulated;

pub use channel::{fragment_channel, Fragment, FragmentReceiver, FragmentSender, Poll};
pub use consumer::{StreamRenderer, StreamSettings};
pub use indicator::{IdleIndicator, DEFAULT_FRAMES};
pub use latch::{CompletionGuard, CompletionLatch};
pub use producer::{Emitter, Generator, Persistence, Producer};
pub use simulated::{SimulatedGenerator, SimulationSettings, SIMULATED_FRAGMENTS};
