//! Inline styling for rendered replies.
//!
//! Replies are markdown-flavoured. Only the inline markers that matter in
//! a chat line are interpreted: `**bold**`, `*italic*` and `` `code` ``.
//! Everything else passes through untouched.

use bitflags::bitflags;
use std::ops::Range;

bitflags! {
    /// Text style modifiers.
    ///
    /// These can be combined using bitwise OR.
    ///
    /// # Example
    /// ```
    /// use jaco::render::Modifiers;
    /// let style = Modifiers::BOLD | Modifiers::ITALIC;
    /// assert!(style.contains(Modifiers::BOLD));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        /// Bold text
        const BOLD = 0b0000_0001;
        /// Dim/faint text
        const DIM = 0b0000_0010;
        /// Italic text
        const ITALIC = 0b0000_0100;
        /// Inline code
        const CODE = 0b0000_1000;
    }
}

/// A run of text sharing one set of modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<'a> {
    /// The visible text, markers removed.
    pub text: &'a str,
    /// Style applied to the run.
    pub modifiers: Modifiers,
}

/// Split `text` into styled spans, stripping the inline markers.
///
/// An opening marker without a closing one styles the rest of the text,
/// which is what a half-streamed reply looks like.
pub fn parse_inline(text: &str) -> Vec<Span<'_>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut modifiers = Modifiers::empty();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let in_code = modifiers.contains(Modifiers::CODE);
        let marker = match bytes[i] {
            b'`' => Some((Modifiers::CODE, 1)),
            b'*' if in_code => None,
            b'*' if bytes.get(i + 1) == Some(&b'*') => Some((Modifiers::BOLD, 2)),
            b'*' if italic_toggles(text, i, modifiers) => Some((Modifiers::ITALIC, 1)),
            _ => None,
        };

        match marker {
            Some((flag, len)) => {
                push_span(&mut spans, text, start..i, modifiers);
                modifiers.toggle(flag);
                i += len;
                start = i;
            }
            None => {
                i += text[i..].chars().next().map_or(1, char::len_utf8);
            }
        }
    }

    push_span(&mut spans, text, start..bytes.len(), modifiers);
    spans
}

fn push_span<'a>(spans: &mut Vec<Span<'a>>, text: &'a str, range: Range<usize>, modifiers: Modifiers) {
    if !range.is_empty() {
        spans.push(Span {
            text: &text[range],
            modifiers,
        });
    }
}

/// A lone `*` opens italics before a non-space and closes after one.
fn italic_toggles(text: &str, at: usize, modifiers: Modifiers) -> bool {
    if modifiers.contains(Modifiers::ITALIC) {
        text[..at].chars().next_back().is_some_and(|c| !c.is_whitespace())
    } else {
        text[at + 1..].chars().next().is_some_and(|c| !c.is_whitespace())
    }
}

/// The text of `spans` with markers removed.
pub fn plain_text(spans: &[Span<'_>]) -> String {
    spans.iter().map(|span| span.text).collect()
}
