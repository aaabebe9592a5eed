//! Terminal rendering of the dashboard using ratatui.
//!
//! [`TuiRenderer`] implements [`Renderer`]: loading a dashboard builds one
//! panel per widget and remembers the grid layout. The draw loop calls
//! [`TuiRenderer::draw`] on every frame, while the widget syncers update the
//! panels from the sync tasks.

pub mod gauge;
pub mod graph;
pub mod singlestat;
pub mod theme;

use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::Line,
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use gridwatch_types::WidgetKind;

use crate::grid::Grid;
use crate::render::{RenderWidget, Renderer};

pub use gauge::GaugePanel;
pub use graph::GraphPanel;
pub use singlestat::SinglestatPanel;
pub use theme::Theme;

/// Minimum terminal dimensions
const MIN_WIDTH: u16 = 40;
const MIN_HEIGHT: u16 = 10;

#[derive(Debug, Clone)]
enum Panel {
    Gauge(Arc<GaugePanel>),
    Singlestat(Arc<SinglestatPanel>),
    Graph(Arc<GraphPanel>),
}

impl Panel {
    fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        match self {
            Panel::Gauge(p) => p.render(frame, area, theme),
            Panel::Singlestat(p) => p.render(frame, area, theme),
            Panel::Graph(p) => p.render(frame, area, theme),
        }
    }
}

#[derive(Debug, Clone)]
struct PanelRow {
    percent_size: u32,
    /// Width in percent and the panel, `None` for fillers.
    cells: Vec<(u32, Option<Panel>)>,
}

/// Renders a dashboard into the terminal.
#[derive(Debug)]
pub struct TuiRenderer {
    theme: Theme,
    layout: RwLock<Option<Vec<PanelRow>>>,
}

impl TuiRenderer {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            layout: RwLock::new(None),
        }
    }

    /// Draw the loaded dashboard over the whole frame.
    pub fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
            self.notice(
                frame,
                area,
                &format!(
                    "Terminal too small ({}x{}). Need {}x{}",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                ),
            );
            return;
        }

        let layout = self.layout.read();
        let Some(rows) = layout.as_ref() else {
            self.notice(frame, area, "Loading dashboard...");
            return;
        };

        let row_areas = Layout::default()
            .direction(Direction::Vertical)
            .constraints(rows.iter().map(|r| Constraint::Percentage(r.percent_size as u16)))
            .split(area);
        for (row, row_area) in rows.iter().zip(row_areas.iter()) {
            let cell_areas = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(row.cells.iter().map(|(w, _)| Constraint::Percentage(*w as u16)))
                .split(*row_area);
            for ((_, panel), cell_area) in row.cells.iter().zip(cell_areas.iter()) {
                if let Some(panel) = panel {
                    panel.render(frame, *cell_area, &self.theme);
                }
            }
        }
    }

    fn notice(&self, frame: &mut Frame, area: Rect, msg: &str) {
        let paragraph = Paragraph::new(Line::styled(msg.to_string(), self.theme.notice))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        let [_, lower] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(40), Constraint::Min(1)])
            .areas(area);
        frame.render_widget(paragraph, lower);
    }
}

impl Renderer for TuiRenderer {
    fn load_dashboard(&self, grid: &Grid) -> Result<Vec<RenderWidget>> {
        let mut handles = Vec::new();
        let mut rows = Vec::with_capacity(grid.rows.len());

        for row in &grid.rows {
            let mut cells = Vec::with_capacity(row.elements.len());
            for element in &row.elements {
                let Some(widget) = &element.widget else {
                    cells.push((element.percent_size, None));
                    continue;
                };
                let (panel, handle) = match &widget.kind {
                    WidgetKind::Gauge(_) => {
                        let p = Arc::new(GaugePanel::new(widget.clone()));
                        (Panel::Gauge(p.clone()), RenderWidget::Gauge(p))
                    }
                    WidgetKind::Singlestat(_) => {
                        let p = Arc::new(SinglestatPanel::new(widget.clone()));
                        (Panel::Singlestat(p.clone()), RenderWidget::Singlestat(p))
                    }
                    WidgetKind::Graph(_) => {
                        let p = Arc::new(GraphPanel::new(widget.clone()));
                        (Panel::Graph(p.clone()), RenderWidget::Graph(p))
                    }
                };
                cells.push((element.percent_size, Some(panel)));
                handles.push(handle);
            }
            rows.push(PanelRow {
                percent_size: row.percent_size,
                cells,
            });
        }

        *self.layout.write() = Some(rows);
        Ok(handles)
    }
}

/// Bordered block with the panel title.
pub(crate) fn panel_block<'a>(title: &'a str, theme: &Theme) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(theme.border_type)
        .border_style(ratatui::style::Style::default().fg(theme.border))
        .title(ratatui::text::Span::styled(title, theme.title))
}
