//! Consumer: drains the fragment channel into a single output region.
//!
//! The renderer polls with a bounded wait so it can animate an idle
//! indicator while nothing has arrived. Once the first fragment shows up
//! the indicator is switched off for the rest of the exchange; later idle
//! polls simply redraw the accumulated text.

use super::channel::{FragmentReceiver, Poll};
use super::indicator::{IdleIndicator, DEFAULT_FRAMES};
use super::latch::CompletionLatch;
use crate::render::RenderSink;
use std::time::Duration;
use tracing::{debug, warn};

/// Tunables for the render loop.
///
/// None of these affect correctness, only how the wait looks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    /// How long a single poll waits before reporting idle.
    pub poll_timeout: Duration,
    /// Placeholder frames shown before the first fragment.
    pub frames: Vec<String>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(300),
            frames: DEFAULT_FRAMES.iter().map(|f| (*f).to_string()).collect(),
        }
    }
}

/// Render loop for one exchange at a time.
#[derive(Debug, Clone)]
pub struct StreamRenderer {
    poll_timeout: Duration,
    indicator: IdleIndicator,
}

impl StreamRenderer {
    /// Create a renderer with the given settings.
    pub fn new(settings: &StreamSettings) -> Self {
        Self {
            poll_timeout: settings.poll_timeout,
            indicator: IdleIndicator::new(settings.frames.iter().cloned()),
        }
    }

    /// Drain `receiver` until `latch` is set and nothing is queued.
    ///
    /// Every state change is drawn to `sink`, and the loop always ends with
    /// one final draw of the accumulated text so that what is on screen is
    /// exactly what is returned.
    ///
    /// Returns the concatenation of all fragments in arrival order.
    pub fn drain(
        &mut self,
        receiver: &FragmentReceiver,
        latch: &CompletionLatch,
        sink: &mut dyn RenderSink,
    ) -> String {
        let mut text = String::new();
        let mut started = false;
        let mut failures = 0usize;
        let mut fragments = 0usize;
        self.indicator.reset();

        // Check the latch first: it is only set after the last send, so once
        // it reads true an empty channel really is the end of the stream.
        while !latch.is_set() || !receiver.is_empty() {
            match receiver.poll(self.poll_timeout) {
                Poll::Fragment(fragment) => {
                    text.push_str(&fragment);
                    fragments += 1;
                    started = true;
                    draw(sink, &text, &mut failures);
                }
                Poll::Idle if started => draw(sink, &text, &mut failures),
                Poll::Idle => draw(sink, self.indicator.advance(), &mut failures),
                Poll::Closed => {
                    if !latch.is_set() {
                        warn!("producer disconnected without signalling completion");
                    }
                    break;
                }
            }
        }

        draw(sink, &text, &mut failures);
        debug!(
            fragments,
            placeholders = self.indicator.shown(),
            render_failures = failures,
            "stream drained"
        );
        text
    }
}

impl Default for StreamRenderer {
    fn default() -> Self {
        Self::new(&StreamSettings::default())
    }
}

/// Draw one frame, logging only the first failure of an exchange.
fn draw(sink: &mut dyn RenderSink, text: &str, failures: &mut usize) {
    if let Err(err) = sink.render(text) {
        if *failures == 0 {
            warn!(error = %err, "failed to render frame");
        }
        *failures += 1;
    }
}
