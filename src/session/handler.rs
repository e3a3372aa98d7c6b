//! Chat handler: runs one exchange from input to final text.
//!
//! Each call allocates a fresh channel and latch, starts the producer and
//! drives the renderer on the caller's thread. Persistence is a capability
//! of the producer, injected or not; there is a single handler type.

use crate::render::RenderSink;
use crate::stream::{
    fragment_channel, CompletionLatch, Generator, Persistence, Producer, StreamRenderer, StreamSettings,
};
use std::sync::Arc;
use tracing::{debug, error};

/// Runs exchanges against one generation source.
#[derive(Debug, Clone)]
pub struct ChatHandler {
    producer: Producer,
    renderer: StreamRenderer,
}

impl ChatHandler {
    /// Create a handler without persistence.
    pub fn new(generator: Arc<dyn Generator>, settings: &StreamSettings) -> Self {
        Self {
            producer: Producer::new(generator),
            renderer: StreamRenderer::new(settings),
        }
    }

    /// Record successful exchanges through `persistence`.
    #[must_use]
    pub fn with_persistence(mut self, persistence: Persistence) -> Self {
        self.producer = self.producer.with_persistence(persistence);
        self
    }

    /// The persistence target, if any.
    pub const fn persistence(&self) -> Option<&Persistence> {
        self.producer.persistence()
    }

    /// Generate a reply to `input`, rendering it into `sink` as it streams.
    ///
    /// Returns the full reply. If the worker thread cannot be started the
    /// reply is empty.
    pub fn respond(&mut self, input: &str, sink: &mut dyn RenderSink) -> String {
        let (sender, receiver) = fragment_channel();
        let latch = CompletionLatch::new();

        if let Err(err) = self.producer.start(input, sender, &latch) {
            error!(error = %err, "failed to start producer");
        }

        let text = self.renderer.drain(&receiver, &latch, sink);
        debug!(chars = text.chars().count(), "exchange finished");
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingSink;
    use crate::stream::{SimulatedGenerator, SimulationSettings, DEFAULT_FRAMES};
    use std::time::Duration;

    fn settings() -> StreamSettings {
        StreamSettings {
            poll_timeout: Duration::from_millis(5),
            ..StreamSettings::default()
        }
    }

    #[test]
    fn test_respond_returns_full_reply() {
        let generator = SimulatedGenerator::new(SimulationSettings::INSTANT);
        let expected = generator.reply();
        let mut handler = ChatHandler::new(Arc::new(generator), &settings());

        let mut sink = RecordingSink::new();
        let text = handler.respond("hello", &mut sink);

        assert_eq!(text, expected);
        assert_eq!(sink.last(), Some(expected));
    }

    #[test]
    fn test_thinking_time_shows_placeholder() {
        let generator = SimulatedGenerator::with_fragments(
            ["a", "b"],
            SimulationSettings {
                initial_delay: Duration::from_millis(60),
                fragment_delay: Duration::ZERO,
            },
        );
        let mut handler = ChatHandler::new(Arc::new(generator), &settings());

        let mut sink = RecordingSink::new();
        let text = handler.respond("hello", &mut sink);

        assert_eq!(text, "ab");
        assert_eq!(sink.frames()[0], DEFAULT_FRAMES[0]);
    }

    #[test]
    fn test_handler_reusable_across_exchanges() {
        let generator = SimulatedGenerator::with_fragments(["x"], SimulationSettings::INSTANT);
        let mut handler = ChatHandler::new(Arc::new(generator), &settings());
        let mut sink = RecordingSink::new();

        assert_eq!(handler.respond("one", &mut sink), "x");
        assert_eq!(handler.respond("two", &mut sink), "x");
    }
}
