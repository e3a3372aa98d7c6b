//! Rendering: where streamed text ends up.
//!
//! The streaming core only knows about [`RenderSink`], a display region
//! that is replaced wholesale on every call. This module provides the
//! terminal implementation plus a recording sink used by tests and
//! diagnostics.

mod output;
mod region;
mod status;
mod style;

pub use output::OutputBuffer;
pub use region::{rows_for, TerminalRegion};
pub use status::{StatusLine, StatusLineConfig};
pub use style::{parse_inline, plain_text, Modifiers, Span};

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

/// A single output region that displays the latest full text.
///
/// Each call replaces whatever the previous call displayed
/// (last write wins), so rendering the same text twice is a no-op for
/// the viewer.
pub trait RenderSink {
    /// Display `text`, replacing the region's previous contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying device could not be written.
    fn render(&mut self, text: &str) -> io::Result<()>;
}

impl<S: RenderSink + ?Sized> RenderSink for &mut S {
    fn render(&mut self, text: &str) -> io::Result<()> {
        (**self).render(text)
    }
}

/// Records every frame instead of displaying it.
///
/// Clones share the same frame log, so another thread can watch progress
/// while the render loop owns the sink.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All frames rendered so far, oldest first.
    pub fn frames(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of frames rendered so far.
    pub fn len(&self) -> usize {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check whether nothing has been rendered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recent frame.
    pub fn last(&self) -> Option<String> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl RenderSink for RecordingSink {
    fn render(&mut self, text: &str) -> io::Result<()> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_shares_frames() {
        let mut sink = RecordingSink::new();
        let watcher = sink.clone();
        assert!(watcher.is_empty());

        sink.render(" •").unwrap();
        sink.render("hello").unwrap();

        assert_eq!(watcher.len(), 2);
        assert_eq!(watcher.frames(), vec![" •", "hello"]);
        assert_eq!(watcher.last().as_deref(), Some("hello"));
    }
}
