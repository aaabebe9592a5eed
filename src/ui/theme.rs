//! Theme configuration for the dashboard panels.
//!
//! Supports light and dark themes with automatic terminal detection.

use anyhow::{Context, Result};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

/// Color and style theme for the panels.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Color of widget values before any threshold applies.
    pub value: Color,
    /// Color for panel borders.
    pub border: Color,
    /// Style of the panel titles.
    pub title: Style,
    /// Color of the graph axes.
    pub axis: Color,
    /// Color of the graph axis labels.
    pub axis_labels: Color,
    /// Style of informational messages (loading, terminal too small).
    pub notice: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            value: Color::White,
            border: Color::Gray,
            title: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            axis: Color::DarkGray,
            axis_labels: Color::Gray,
            notice: Style::default().fg(Color::Yellow),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            value: Color::Black,
            border: Color::DarkGray,
            title: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            axis: Color::Gray,
            axis_labels: Color::DarkGray,
            notice: Style::default().fg(Color::Blue),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }
}

/// Parse a `#rrggbb` color.
pub fn hex_color(hex: &str) -> Result<Color> {
    let digits = hex
        .strip_prefix('#')
        .filter(|d| d.len() == 6 && d.is_ascii())
        .with_context(|| format!("{hex:?} is not a #rrggbb color"))?;
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .with_context(|| format!("{hex:?} is not a #rrggbb color"))
    };
    Ok(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}
