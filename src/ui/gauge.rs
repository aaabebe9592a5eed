use anyhow::Result;
use parking_lot::Mutex;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    widgets::Gauge,
    Frame,
};

use gridwatch_types::{Widget, WidgetKind};

use super::panel_block;
use super::theme::{hex_color, Theme};
use crate::render::GaugeView;

#[derive(Debug, Default)]
struct GaugeState {
    value: Option<f64>,
    is_percent: bool,
    color: Option<ratatui::style::Color>,
}

/// A gauge bar.
#[derive(Debug)]
pub struct GaugePanel {
    cfg: Widget,
    state: Mutex<GaugeState>,
}

impl GaugePanel {
    pub fn new(cfg: Widget) -> Self {
        Self {
            cfg,
            state: Mutex::default(),
        }
    }

    fn max(&self) -> f64 {
        match &self.cfg.kind {
            WidgetKind::Gauge(g) => g.max,
            _ => 0.0,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let state = self.state.lock();
        let color = state.color.unwrap_or(theme.value);

        let (ratio, label) = match state.value {
            None => (0.0, "-".to_string()),
            Some(v) if state.is_percent => (v / 100.0, format!("{v:.0}%")),
            Some(v) => {
                // Absolute values grow the scale past the configured max.
                let max = self.max().max(v);
                let ratio = if max > 0.0 { v / max } else { 0.0 };
                (ratio, format!("{v:.2} / {max:.2}"))
            }
        };
        let ratio = if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let gauge = Gauge::default()
            .block(panel_block(&self.cfg.title, theme))
            .gauge_style(Style::default().fg(color))
            .label(ratatui::text::Span::styled(
                label,
                Style::default().add_modifier(Modifier::BOLD),
            ))
            .ratio(ratio);
        frame.render_widget(gauge, area);
    }
}

impl GaugeView for GaugePanel {
    fn widget_cfg(&self) -> &Widget {
        &self.cfg
    }

    fn sync(&self, is_percent: bool, value: f64) -> Result<()> {
        let mut state = self.state.lock();
        state.value = Some(value);
        state.is_percent = is_percent;
        Ok(())
    }

    fn set_color(&self, hex: &str) -> Result<()> {
        let color = hex_color(hex)?;
        self.state.lock().color = Some(color);
        Ok(())
    }
}
