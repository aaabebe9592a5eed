use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use parking_lot::Mutex;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Wrap},
    Frame,
};

use gridwatch_types::{Widget, WidgetKind};

use super::panel_block;
use super::theme::{hex_color, Theme};
use crate::data::unit::{self, Formatter};
use crate::render::{GraphView, RenderSeries};

const LEGEND_SYMBOL: &str = "⠤⠤";
const Y_LABEL_COUNT: usize = 3;

/// A line graph with an optional legend.
#[derive(Debug)]
pub struct GraphPanel {
    cfg: Widget,
    series: Mutex<Vec<RenderSeries>>,
    /// Plot width of the last draw.
    capacity: AtomicUsize,
}

impl GraphPanel {
    pub fn new(cfg: Widget) -> Self {
        Self {
            cfg,
            series: Mutex::default(),
            capacity: AtomicUsize::new(0),
        }
    }

    fn y_formatter(&self) -> (Formatter, i32) {
        match &self.cfg.kind {
            WidgetKind::Graph(g) => (
                unit::formatter(&g.visualization.y_axis.unit).unwrap_or(Formatter::Short),
                g.visualization.y_axis.decimals,
            ),
            _ => (Formatter::Short, 0),
        }
    }

    /// Legend placement: `None` when disabled, `Some(true)` on the right.
    fn legend(&self) -> Option<bool> {
        match &self.cfg.kind {
            WidgetKind::Graph(g) if !g.visualization.legend.disable => {
                Some(g.visualization.legend.right_side)
            }
            _ => None,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let block = panel_block(&self.cfg.title, theme);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let series = self.series.lock();
        let (chart_area, legend_area) = match self.legend() {
            None => (inner, None),
            Some(true) => {
                let [chart, legend] = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(80), Constraint::Percentage(20)])
                    .areas(inner);
                (chart, Some((legend, true)))
            }
            Some(false) => {
                let [chart, legend] = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(1), Constraint::Length(1)])
                    .areas(inner);
                (chart, Some((legend, false)))
            }
        };

        let (formatter, decimals) = self.y_formatter();
        let (y_min, y_max) = y_bounds(&series);
        let y_labels: Vec<String> = (0..Y_LABEL_COUNT)
            .map(|i| {
                let v = y_min + (y_max - y_min) * i as f64 / (Y_LABEL_COUNT - 1) as f64;
                formatter.format(v, decimals)
            })
            .collect();

        // The y labels eat into the plot width, plus one column for the axis.
        let label_width = y_labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let capacity = (chart_area.width as usize).saturating_sub(label_width + 1);
        self.capacity.store(capacity, Ordering::Relaxed);

        let runs: Vec<(Color, Vec<(f64, f64)>)> = series
            .iter()
            .flat_map(|s| {
                let color = hex_color(&s.color).unwrap_or(theme.value);
                segments(&s.values).into_iter().map(move |seg| (color, seg))
            })
            .collect();
        let datasets: Vec<Dataset> = runs
            .iter()
            .map(|(color, points)| {
                let graph_type = if points.len() == 1 {
                    GraphType::Scatter
                } else {
                    GraphType::Line
                };
                Dataset::default()
                    .marker(Marker::Braille)
                    .graph_type(graph_type)
                    .style(Style::default().fg(*color))
                    .data(points)
            })
            .collect();

        let points = series.iter().map(|s| s.values.len()).max().unwrap_or(0);
        let x_labels = series.first().map(|s| spread_labels(&s.x_labels)).unwrap_or_default();
        let label_style = Style::default().fg(theme.axis_labels);

        let chart = Chart::new(datasets)
            .legend_position(None)
            .x_axis(
                Axis::default()
                    .style(Style::default().fg(theme.axis))
                    .bounds([0.0, points.saturating_sub(1).max(1) as f64])
                    .labels(x_labels.into_iter().map(|l| Span::styled(l, label_style))),
            )
            .y_axis(
                Axis::default()
                    .style(Style::default().fg(theme.axis))
                    .bounds([y_min, y_max])
                    .labels(y_labels.into_iter().map(|l| Span::styled(l, label_style))),
            );
        frame.render_widget(chart, chart_area);

        if let Some((area, right_side)) = legend_area {
            render_legend(frame, area, right_side, &series, theme);
        }
    }
}

impl GraphView for GraphPanel {
    fn widget_cfg(&self) -> &Widget {
        &self.cfg
    }

    fn graph_point_quantity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    fn sync(&self, series: Vec<RenderSeries>) -> Result<()> {
        *self.series.lock() = series;
        Ok(())
    }
}

fn render_legend(
    frame: &mut Frame,
    area: Rect,
    right_side: bool,
    series: &[RenderSeries],
    theme: &Theme,
) {
    let entry = |s: &RenderSeries| {
        let color = hex_color(&s.color).unwrap_or(theme.value);
        [
            Span::styled(LEGEND_SYMBOL, Style::default().fg(color)),
            Span::raw(format!(" {}", s.label)),
        ]
    };

    let lines: Vec<Line> = if right_side {
        series.iter().map(|s| Line::from(entry(s).to_vec())).collect()
    } else {
        let mut spans = Vec::new();
        for (i, s) in series.iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw("  "));
            }
            spans.extend(entry(s));
        }
        vec![Line::from(spans)]
    };
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), area);
}

/// Split values into contiguous runs of points, broken at gaps.
fn segments(values: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for (i, v) in values.iter().enumerate() {
        match v {
            Some(v) if v.is_finite() => current.push((i as f64, *v)),
            _ if !current.is_empty() => out.push(std::mem::take(&mut current)),
            _ => {}
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn y_bounds(series: &[RenderSeries]) -> (f64, f64) {
    let mut values = series
        .iter()
        .flat_map(|s| s.values.iter().flatten().copied())
        .filter(|v| v.is_finite())
        .peekable();
    if values.peek().is_none() {
        return (0.0, 1.0);
    }
    let (min, max) = values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min == max {
        return (min - 1.0, max + 1.0);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

/// First, middle and last label.
fn spread_labels(labels: &[String]) -> Vec<String> {
    match labels.len() {
        0 => Vec::new(),
        1 | 2 => labels.to_vec(),
        n => vec![
            labels[0].clone(),
            labels[n / 2].clone(),
            labels[n - 1].clone(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_break_at_gaps() {
        let values = [Some(1.0), Some(2.0), None, None, Some(3.0), None, Some(4.0), Some(5.0)];
        assert_eq!(
            segments(&values),
            vec![
                vec![(0.0, 1.0), (1.0, 2.0)],
                vec![(4.0, 3.0)],
                vec![(6.0, 4.0), (7.0, 5.0)],
            ]
        );
        assert!(segments(&[None, None]).is_empty());
    }

    #[test]
    fn test_y_bounds() {
        let series = |values: Vec<Option<f64>>| RenderSeries {
            label: "s".into(),
            color: "#ffffff".into(),
            x_labels: Vec::new(),
            values,
        };
        assert_eq!(y_bounds(&[]), (0.0, 1.0));
        assert_eq!(y_bounds(&[series(vec![None])]), (0.0, 1.0));
        assert_eq!(y_bounds(&[series(vec![Some(5.0)])]), (4.0, 6.0));
        assert_eq!(
            y_bounds(&[series(vec![Some(0.0)]), series(vec![None, Some(100.0)])]),
            (-5.0, 105.0)
        );
    }

    #[test]
    fn test_spread_labels() {
        let labels: Vec<String> = (0..5).map(|i| format!("{i}")).collect();
        assert_eq!(spread_labels(&labels), vec!["0", "2", "4"]);
        assert_eq!(spread_labels(&labels[..2]), vec!["0", "1"]);
        assert!(spread_labels(&[]).is_empty());
    }
}
