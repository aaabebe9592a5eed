use anyhow::Result;
use parking_lot::Mutex;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Paragraph, Wrap},
    Frame,
};

use gridwatch_types::Widget;

use super::panel_block;
use super::theme::{hex_color, Theme};
use crate::render::SinglestatView;

#[derive(Debug, Default)]
struct SinglestatState {
    text: String,
    color: Option<Color>,
}

/// A single line of text centered in its panel.
#[derive(Debug)]
pub struct SinglestatPanel {
    cfg: Widget,
    state: Mutex<SinglestatState>,
}

impl SinglestatPanel {
    pub fn new(cfg: Widget) -> Self {
        Self {
            cfg,
            state: Mutex::default(),
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let state = self.state.lock();
        let block = panel_block(&self.cfg.title, theme);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let style = Style::default()
            .fg(state.color.unwrap_or(theme.value))
            .add_modifier(Modifier::BOLD);
        let text = if state.text.is_empty() { "-" } else { &state.text };

        // Vertically centered.
        let top = inner.height.saturating_sub(1) / 2;
        let centered = Rect {
            y: inner.y + top,
            height: inner.height - top,
            ..inner
        };
        let paragraph = Paragraph::new(Line::styled(text.to_string(), style))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, centered);
    }
}

impl SinglestatView for SinglestatPanel {
    fn widget_cfg(&self) -> &Widget {
        &self.cfg
    }

    fn sync(&self, text: &str) -> Result<()> {
        self.state.lock().text = text.to_string();
        Ok(())
    }

    fn set_color(&self, hex: &str) -> Result<()> {
        let color = hex_color(hex)?;
        self.state.lock().color = Some(color);
        Ok(())
    }
}
