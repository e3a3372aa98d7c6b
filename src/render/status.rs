//! Status Line: three-section header line.
//!
//! A single line with left, center, and right sections, printed once
//! above the conversation. Left shows the environment, center the session,
//! right the persistence state.

use crossterm::style::{style, Color, Stylize};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Configuration for the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLineConfig {
    /// Left section text color.
    pub left_fg: Color,
    /// Center section text color.
    pub center_fg: Color,
    /// Right section text color.
    pub right_fg: Color,
    /// Whether to emit color escape sequences at all.
    pub colored: bool,
}

impl Default for StatusLineConfig {
    fn default() -> Self {
        Self {
            left_fg: Color::White,
            center_fg: Color::DarkGrey,
            right_fg: Color::Green,
            colored: true,
        }
    }
}

impl StatusLineConfig {
    /// Plain output, no escape sequences.
    pub const PLAIN: Self = Self {
        left_fg: Color::Reset,
        center_fg: Color::Reset,
        right_fg: Color::Reset,
        colored: false,
    };
}

/// A three-section status line (left, center, right).
#[derive(Debug, Clone, Default)]
pub struct StatusLine {
    left: String,
    center: String,
    right: String,
    config: StatusLineConfig,
}

impl StatusLine {
    /// Create an empty status line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty status line with custom configuration.
    pub fn with_config(config: StatusLineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Set the left section content.
    pub fn set_left(&mut self, text: impl Into<String>) {
        self.left = text.into();
    }

    /// Set the center section content.
    pub fn set_center(&mut self, text: impl Into<String>) {
        self.center = text.into();
    }

    /// Set the right section content.
    pub fn set_right(&mut self, text: impl Into<String>) {
        self.right = text.into();
    }

    /// Get the left section content.
    pub fn left(&self) -> &str {
        &self.left
    }

    /// Get the center section content.
    pub fn center(&self) -> &str {
        &self.center
    }

    /// Get the right section content.
    pub fn right(&self) -> &str {
        &self.right
    }

    /// Lay the sections out across `width` columns.
    ///
    /// Left and center get at most a third of the line each; the right
    /// section gets whatever they leave unused. Content that does not fit
    /// is cut at a grapheme boundary. The result never exceeds `width`
    /// visible columns.
    pub fn render(&self, width: u16) -> String {
        let width = usize::from(width);
        let third = width / 3;

        let left = truncate(&self.left, third);
        let center = truncate(&self.center, third);
        let (lw, cw) = (left.width(), center.width());

        // One column of separation on each side of the center section.
        let right = truncate(&self.right, width.saturating_sub(lw + cw + 2));
        let rw = right.width();

        let right_start = width - rw;
        let center_start = ((width - cw) / 2)
            .min(right_start.saturating_sub(cw + 1))
            .max(lw);

        let mut line = String::with_capacity(width + 32);
        line.push_str(&self.paint(left, self.config.left_fg));
        line.push_str(&" ".repeat(center_start - lw));
        line.push_str(&self.paint(center, self.config.center_fg));
        line.push_str(&" ".repeat(right_start.saturating_sub(center_start + cw)));
        line.push_str(&self.paint(right, self.config.right_fg));
        line
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.config.colored && !text.is_empty() {
            style(text).with(color).to_string()
        } else {
            text.to_string()
        }
    }
}

/// The longest prefix of `text` that fits in `max` columns.
fn truncate(text: &str, max: usize) -> &str {
    let mut used = 0;
    for (idx, grapheme) in text.grapheme_indices(true) {
        let w = grapheme.width();
        if used + w > max {
            return &text[..idx];
        }
        used += w;
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> StatusLine {
        StatusLine::with_config(StatusLineConfig::PLAIN)
    }

    #[test]
    fn test_status_line_basic() {
        let mut line = plain();
        line.set_left("Left");
        line.set_center("Center");
        line.set_right("Right");

        assert_eq!(line.left(), "Left");
        assert_eq!(line.center(), "Center");
        assert_eq!(line.right(), "Right");
    }

    #[test]
    fn test_render_layout() {
        let mut line = plain();
        line.set_left("L");
        line.set_center("C");
        line.set_right("R");

        let out = line.render(11);
        assert_eq!(out, "L    C    R");
        assert_eq!(out.width(), 11);
    }

    #[test]
    fn test_render_truncates_sections() {
        let mut line = plain();
        line.set_left("[LOCAL] environment");
        line.set_right("persistence on");

        let out = line.render(30);
        assert_eq!(out.width(), 30);
        assert!(out.starts_with("[LOCAL] en"));
        assert!(out.ends_with("persistence on"));

        line.set_right("persistence on, config from secrets+env");
        let out = line.render(30);
        assert_eq!(out.width(), 30);
        assert!(out.ends_with("persistence on, co"));
    }

    #[test]
    fn test_right_section_uses_unclaimed_width() {
        let mut line = plain();
        line.set_left("[LOCAL]");
        line.set_center("session 1a2b3c4d");
        line.set_right("saving to supabase · config: secrets+env");

        let out = line.render(80);
        assert_eq!(out.width(), 80);
        assert!(out.starts_with("[LOCAL]"));
        assert!(out.contains("session 1a2b3c4d"));
        assert!(out.ends_with("saving to supabase · config: secrets+env"));
    }

    #[test]
    fn test_render_narrow_widths() {
        let mut line = plain();
        line.set_left("left");
        line.set_center("center");
        line.set_right("right");
        for width in 0..12 {
            assert!(line.render(width).width() <= usize::from(width));
        }
    }

    #[test]
    fn test_truncate_wide_graphemes() {
        assert_eq!(truncate("日本語", 5), "日本");
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("abc", 0), "");
    }

    #[test]
    fn test_colored_output_contains_text() {
        let mut line = StatusLine::new();
        line.set_left("A");
        let out = line.render(9);
        assert!(out.contains('A'));
        assert!(out.ends_with(' '));
    }
}
