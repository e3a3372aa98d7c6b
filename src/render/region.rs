//! Terminal Region: an in-place redrawn block of terminal rows.
//!
//! The region starts at the cursor's line. Every render moves back to the
//! first row it occupied, clears to the end of the screen and writes the
//! new frame, all in one write. Row accounting uses grapheme widths so
//! wrapped and wide text is erased completely on the next frame.
//!
//! Rows that have scrolled off the top of the screen cannot be reached
//! with cursor movement. Once a frame is as tall as the terminal, frames
//! that extend the previous one only write the appended text; a frame
//! that rewrites earlier text is redrawn from the top row still visible.

use super::output::OutputBuffer;
use super::style::{parse_inline, plain_text, Modifiers};
use super::RenderSink;
use crossterm::{
    cursor::MoveUp,
    queue,
    style::{Attribute, SetAttribute},
    terminal::{self, Clear, ClearType},
};
use std::io::{self, Stdout, Write};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Fallback size when the terminal size cannot be queried.
const DEFAULT_SIZE: (u16, u16) = (80, 24);

/// A render sink that redraws a block of rows in place.
#[derive(Debug)]
pub struct TerminalRegion<W: Write> {
    /// Destination device.
    out: W,
    /// Terminal width in columns.
    width: u16,
    /// Terminal height in rows.
    height: u16,
    /// Rows occupied by the last frame (0 = nothing drawn yet).
    rows: u16,
    /// Text of the last frame.
    shown: String,
    /// Pre-allocated frame buffer.
    buffer: OutputBuffer,
}

impl TerminalRegion<Stdout> {
    /// Create a region on stdout, sized to the current terminal.
    pub fn stdout() -> Self {
        let (width, height) = terminal::size().unwrap_or(DEFAULT_SIZE);
        Self::new(io::stdout(), width).with_height(height)
    }
}

impl<W: Write> TerminalRegion<W> {
    /// Create a region writing to `out`, assuming `width` columns.
    pub fn new(out: W, width: u16) -> Self {
        Self {
            out,
            width: width.max(1),
            height: u16::MAX,
            rows: 0,
            shown: String::new(),
            buffer: OutputBuffer::new(),
        }
    }

    /// Assume a terminal `height` rows tall (unbounded by default).
    #[must_use]
    pub fn with_height(mut self, height: u16) -> Self {
        self.height = height.max(1);
        self
    }

    /// Check whether the last frame no longer fits on screen.
    pub const fn overflowed(&self) -> bool {
        self.rows >= self.height
    }

    /// Terminal width in columns.
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Rows occupied by the last frame.
    pub const fn rows(&self) -> u16 {
        self.rows
    }

    /// Borrow the destination device.
    pub const fn get_ref(&self) -> &W {
        &self.out
    }

    /// Close the region: move below the last frame so further output does
    /// not overwrite it.
    ///
    /// # Errors
    ///
    /// Returns an error if the device could not be written.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.rows > 0 {
            self.out.write_all(b"\r\n")?;
            self.out.flush()?;
            self.rows = 0;
        }
        self.shown.clear();
        Ok(())
    }

    /// Unwrap the destination device.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Queue the commands that erase the previous frame.
    fn queue_erase(&mut self) -> io::Result<()> {
        if self.rows == 0 {
            return Ok(());
        }
        self.buffer.write_raw(b"\r");
        let reachable = self.rows.min(self.height);
        if reachable > 1 {
            queue!(self.buffer, MoveUp(reachable - 1))?;
        }
        queue!(self.buffer, Clear(ClearType::FromCursorDown))
    }
}

impl<W: Write> RenderSink for TerminalRegion<W> {
    fn render(&mut self, text: &str) -> io::Result<()> {
        self.buffer.clear();

        let delta = match text.strip_prefix(self.shown.as_str()) {
            Some(delta) if self.overflowed() => delta,
            _ => {
                self.queue_erase()?;
                text
            }
        };
        queue_spans(&mut self.buffer, delta)?;

        self.buffer.flush_to(&mut self.out)?;
        self.rows = rows_for(&plain_text(&parse_inline(text)), self.width);
        self.shown.clear();
        self.shown.push_str(text);
        Ok(())
    }
}

fn queue_spans(buffer: &mut OutputBuffer, text: &str) -> io::Result<()> {
    for span in parse_inline(text) {
        let styled = !span.modifiers.is_empty();
        if styled {
            queue_modifiers(buffer, span.modifiers)?;
        }
        buffer.write_text(span.text);
        if styled {
            queue!(buffer, SetAttribute(Attribute::Reset))?;
        }
    }
    Ok(())
}

fn queue_modifiers(buffer: &mut OutputBuffer, modifiers: Modifiers) -> io::Result<()> {
    if modifiers.contains(Modifiers::BOLD) {
        queue!(buffer, SetAttribute(Attribute::Bold))?;
    }
    if modifiers.contains(Modifiers::ITALIC) {
        queue!(buffer, SetAttribute(Attribute::Italic))?;
    }
    if modifiers.intersects(Modifiers::DIM | Modifiers::CODE) {
        queue!(buffer, SetAttribute(Attribute::Dim))?;
    }
    Ok(())
}

/// Number of terminal rows `text` occupies at `width` columns.
///
/// Empty text still occupies the row the cursor sits on. A line that
/// exactly fills the width does not spill onto the next row.
pub fn rows_for(text: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let mut rows = 0usize;

    for line in text.split('\n') {
        rows += 1;
        let mut col = 0usize;
        for grapheme in line.graphemes(true) {
            let w = UnicodeWidthStr::width(grapheme);
            if col + w > width {
                rows += 1;
                col = 0;
            }
            col += w;
        }
    }

    u16::try_from(rows).unwrap_or(u16::MAX)
}
