//! Simulated generator: a canned, paced reply.
//!
//! Stands in for a real model stream. The user input is accepted and
//! ignored; the reply is always the same fragment sequence.

use super::producer::{Emitter, Generator};
use crate::error::GenerateError;
use std::thread;
use std::time::Duration;

/// The canned reply, one fragment per entry.
pub const SIMULATED_FRAGMENTS: [&str; 9] = [
    "שלום", " ", "**לך**", ",", " ", "מה", " ", "שלומך", "?",
];

/// Pacing of the simulated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationSettings {
    /// Delay before the first fragment ("thinking" time).
    pub initial_delay: Duration,
    /// Delay after each fragment.
    pub fragment_delay: Duration,
}

impl SimulationSettings {
    /// No pacing at all.
    pub const INSTANT: Self = Self {
        initial_delay: Duration::ZERO,
        fragment_delay: Duration::ZERO,
    };
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1600),
            fragment_delay: Duration::from_millis(100),
        }
    }
}

/// Emits a fixed fragment sequence with configurable pacing.
#[derive(Debug, Clone)]
pub struct SimulatedGenerator {
    fragments: Vec<String>,
    settings: SimulationSettings,
}

impl SimulatedGenerator {
    /// Create a generator for the canned reply.
    pub fn new(settings: SimulationSettings) -> Self {
        Self::with_fragments(SIMULATED_FRAGMENTS, settings)
    }

    /// Create a generator for an arbitrary fragment sequence.
    pub fn with_fragments<I, S>(fragments: I, settings: SimulationSettings) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            settings,
        }
    }

    /// The full reply this generator produces.
    pub fn reply(&self) -> String {
        self.fragments.concat()
    }
}

impl Default for SimulatedGenerator {
    fn default() -> Self {
        Self::new(SimulationSettings::default())
    }
}

impl Generator for SimulatedGenerator {
    fn generate(&self, _input: &str, emitter: &mut Emitter<'_>) -> Result<(), GenerateError> {
        pause(self.settings.initial_delay);
        for fragment in &self.fragments {
            emitter.emit(fragment.as_str())?;
            pause(self.settings.fragment_delay);
        }
        Ok(())
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}
