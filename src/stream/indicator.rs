//! Idle indicator: the placeholder frames shown before any content arrives.

/// Placeholder frames, cycled one step per idle poll.
pub const DEFAULT_FRAMES: [&str; 4] = [" •", " ••", " •••", " ••••"];

/// Cycles through a fixed set of placeholder frames.
#[derive(Debug, Clone)]
pub struct IdleIndicator {
    frames: Vec<String>,
    next: usize,
}

impl IdleIndicator {
    /// Create an indicator over the given frames.
    ///
    /// An empty frame list falls back to [`DEFAULT_FRAMES`].
    pub fn new<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let frames: Vec<String> = frames.into_iter().map(Into::into).collect();
        if frames.is_empty() {
            return Self::default();
        }
        Self { frames, next: 0 }
    }

    /// Return the next frame and advance the cycle.
    pub fn advance(&mut self) -> &str {
        let index = self.next % self.frames.len();
        self.next = self.next.wrapping_add(1);
        &self.frames[index]
    }

    /// Number of frames shown so far.
    pub const fn shown(&self) -> usize {
        self.next
    }

    /// The full frame set.
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// Restart the cycle from the first frame.
    pub fn reset(&mut self) {
        self.next = 0;
    }
}

impl Default for IdleIndicator {
    fn default() -> Self {
        Self::new(DEFAULT_FRAMES)
    }
}
