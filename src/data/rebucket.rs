//! Projection of irregular series onto an evenly spaced time index.
//!
//! A graph has room for `capacity` points. The sync window is split into
//! `capacity` slots starting at `start`, and every series is walked once
//! against the slot timestamps:
//!
//! ```text
//!  index   t0        t1        t2        t3
//!          │─────────│─────────│─────────│──────▶
//!  metrics   m0          m1                 m2
//!  slots   [m0]      [m1]      [gap]     [m2]
//! ```
//!
//! A metric older than the current slot is stale and skipped. A metric
//! after the next slot leaves the current slot empty, filled according to
//! the series' [`NullPointMode`]. Otherwise the metric fills the slot.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use regex::Regex;

use gridwatch_types::{Metric, NullPointMode, SeriesOverride};

use crate::data::duration::time_label_format;

/// Time bounds and resolution of a graph sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: Duration,
    pub capacity: usize,
}

impl SyncWindow {
    /// Split `[start, end)` in `capacity` slots. Returns `None` when there is
    /// no capacity or the window is empty.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        let span = (end - start).to_std().ok()?;
        let step = span / u32::try_from(capacity).ok()?;
        if step.is_zero() {
            return None;
        }
        Some(Self {
            start,
            end,
            step,
            capacity,
        })
    }

    /// Slot timestamps `start + i * step`.
    pub fn index(&self) -> Vec<DateTime<Utc>> {
        let step = chrono::Duration::from_std(self.step).unwrap_or_default();
        (0..self.capacity)
            .map(|i| self.start + step * i as i32)
            .collect()
    }

    /// Local-time labels of the slots.
    pub fn x_labels(&self, index: &[DateTime<Utc>]) -> Vec<String> {
        let span = (self.end - self.start).to_std().unwrap_or_default();
        let format = time_label_format(span, self.capacity);
        index
            .iter()
            .map(|t| t.with_timezone(&Local).format(format).to_string())
            .collect()
    }
}

/// Place `metrics` (ordered by timestamp) into the slots of `index`.
pub fn rebucket(
    metrics: &[Metric],
    index: &[DateTime<Utc>],
    mode: NullPointMode,
) -> Vec<Option<f64>> {
    let mut values = vec![None; index.len()];
    let mut metric_idx = 0;
    let mut time_idx = 0;
    let mut value_idx = 0;

    while metric_idx < metrics.len() && time_idx < index.len() && value_idx < values.len() {
        let metric = &metrics[metric_idx];
        let ts = index[time_idx];

        if metric.ts < ts {
            metric_idx += 1;
            continue;
        }

        if let Some(&next_ts) = index.get(time_idx + 1) {
            if metric.ts > next_ts {
                values[value_idx] = match mode {
                    NullPointMode::AsNull => None,
                    NullPointMode::AsZero => Some(0.0),
                    NullPointMode::Connected => Some(metric.value),
                };
                time_idx += 1;
                value_idx += 1;
                continue;
            }
        }

        values[value_idx] = Some(metric.value);
        metric_idx += 1;
        time_idx += 1;
        value_idx += 1;
    }

    values
}

/// Series overrides with their regexes compiled.
#[derive(Debug, Clone, Default)]
pub struct SeriesOverrides(Vec<(Regex, SeriesOverride)>);

impl SeriesOverrides {
    pub fn compile(overrides: &[SeriesOverride]) -> Result<Self> {
        let compiled = overrides
            .iter()
            .map(|o| {
                let re = Regex::new(&o.regex)
                    .with_context(|| format!("invalid series override regex {:?}", o.regex))?;
                Ok((re, o.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(compiled))
    }

    /// First override whose regex matches `legend`.
    pub fn find(&self, legend: &str) -> Option<&SeriesOverride> {
        self.0
            .iter()
            .find(|(re, _)| re.is_match(legend))
            .map(|(_, o)| o)
    }
}
