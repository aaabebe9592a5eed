//! Percentage-based widget layout.
//!
//! Widgets declare a width in dashboard units (`max_width` units span a
//! full row). The grid turns them into rows of percentage-sized elements,
//! padding every row with empty elements so its elements sum to 100:
//!
//! ```text
//! adaptive, max_width = 100, widths [40, 40, 30, 100]
//!
//!   row 0 (33%)  [ w0 40 ][ w1 40 ][ empty 20 ]
//!   row 1 (33%)  [ w2 30 ][      empty 70     ]
//!   row 2 (33%)  [           w3 100           ]
//! ```
//!
//! - **Adaptive**: widgets flow in declared order and wrap when the next one
//!   does not fit in the current row.
//! - **Fixed**: widgets sit at their declared `x`/`y`; `y` is the row index
//!   and gaps before, between and after widgets become empty elements.
//!
//! Row heights are `round(100 / rows)`; the remainder is not redistributed.

use gridwatch_types::{GridConfig, Widget};
use thiserror::Error;

/// Errors building a grid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("grid max width must be greater than 0")]
    ZeroMaxWidth,
    #[error("widget {0:?} has no width")]
    ZeroWidth(String),
    #[error("widget {0:?} needs x and y positions on a fixed grid")]
    MissingPosition(String),
}

/// A cell of a row. Empty cells are fillers.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub percent_size: u32,
    pub widget: Option<Widget>,
}

impl Element {
    fn filler(percent_size: u32) -> Self {
        Self {
            percent_size,
            widget: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.widget.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Height of the row in percent of the dashboard.
    pub percent_size: u32,
    pub elements: Vec<Element>,
}

impl Row {
    /// Push `widget` after `filled` percent, padding up to `start`.
    /// Returns the new filled percent.
    fn place(&mut self, filled: u32, start: u32, size: u32, widget: Widget) -> u32 {
        if start > filled {
            self.elements.push(Element::filler(start - filled));
        }
        self.elements.push(Element {
            percent_size: size,
            widget: Some(widget),
        });
        start + size
    }

    fn close(&mut self, filled: u32) {
        if filled < 100 {
            self.elements.push(Element::filler(100 - filled));
        }
    }
}

/// The layout of a dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub max_width: u32,
    pub rows: Vec<Row>,
}

impl Grid {
    /// Build the grid in the mode selected by `cfg`.
    pub fn new(cfg: &GridConfig, widgets: &[Widget]) -> Result<Self, LayoutError> {
        if cfg.fixed_widgets {
            Self::fixed(cfg.max_width, widgets)
        } else {
            Self::adaptive(cfg.max_width, widgets)
        }
    }

    /// Flow widgets in declared order, wrapping to a new row when the next
    /// widget does not fit.
    pub fn adaptive(max_width: u32, widgets: &[Widget]) -> Result<Self, LayoutError> {
        validate(max_width, widgets)?;

        let mut rows: Vec<Row> = Vec::new();
        let mut current = Row::default();
        let mut filled = 0;
        for widget in widgets {
            let size = percent(widget.grid_pos.w, max_width).min(100);
            if filled + size > 100 && !current.elements.is_empty() {
                current.close(filled);
                rows.push(std::mem::take(&mut current));
                filled = 0;
            }
            filled = current.place(filled, filled, size, widget.clone());
        }
        if !current.elements.is_empty() {
            current.close(filled);
            rows.push(current);
        }

        Ok(Self::with_heights(max_width, rows))
    }

    /// Place widgets at their declared coordinates.
    pub fn fixed(max_width: u32, widgets: &[Widget]) -> Result<Self, LayoutError> {
        validate(max_width, widgets)?;

        let mut positioned = Vec::with_capacity(widgets.len());
        for widget in widgets {
            match (widget.grid_pos.x, widget.grid_pos.y) {
                (Some(x), Some(y)) => positioned.push((y, x, widget)),
                _ => return Err(LayoutError::MissingPosition(widget.title.clone())),
            }
        }
        // Stable: widgets at the same position keep their declared order.
        positioned.sort_by_key(|(y, x, _)| (*y, *x));

        let row_count = positioned.iter().map(|(y, _, _)| y + 1).max().unwrap_or(0);
        let mut rows = vec![Row::default(); row_count as usize];
        let mut filled = vec![0u32; row_count as usize];

        for (y, x, widget) in positioned {
            let row = y as usize;
            let start = percent(x, max_width).max(filled[row]);
            let size = percent(widget.grid_pos.w, max_width).min(100u32.saturating_sub(start));
            if size == 0 {
                tracing::warn!(title = %widget.title, "widget does not fit in its row, skipping");
                continue;
            }
            filled[row] = rows[row].place(filled[row], start, size, widget.clone());
        }
        for (row, filled) in rows.iter_mut().zip(filled) {
            row.close(filled);
        }

        Ok(Self::with_heights(max_width, rows))
    }

    fn with_heights(max_width: u32, mut rows: Vec<Row>) -> Self {
        let height = percent(1, rows.len() as u32);
        for row in rows.iter_mut() {
            row.percent_size = height;
        }
        Self { max_width, rows }
    }

    /// Widgets in row order.
    pub fn widgets(&self) -> impl Iterator<Item = &Widget> {
        self.rows
            .iter()
            .flat_map(|r| r.elements.iter())
            .filter_map(|e| e.widget.as_ref())
    }
}

fn validate(max_width: u32, widgets: &[Widget]) -> Result<(), LayoutError> {
    if max_width == 0 {
        return Err(LayoutError::ZeroMaxWidth);
    }
    if let Some(w) = widgets.iter().find(|w| w.grid_pos.w == 0) {
        return Err(LayoutError::ZeroWidth(w.title.clone()));
    }
    Ok(())
}

/// `round(value * 100 / total)`; 0 when `total` is 0.
fn percent(value: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (value as f64 * 100.0 / total as f64).round() as u32
}
