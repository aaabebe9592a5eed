use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Suffix to nanoseconds multiplier (order matters: longer suffixes first)
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("µs", 1_000.0),
    ("us", 1_000.0),
    ("ms", 1_000_000.0),
    ("s", 1_000_000_000.0),
    ("m", 60.0 * 1_000_000_000.0),
    ("h", 3_600.0 * 1_000_000_000.0),
    ("d", 86_400.0 * 1_000_000_000.0),
];

/// Auto-interval ladder used by interval variables.
pub const INTERVALS: [Duration; 13] = [
    Duration::from_secs(30),
    Duration::from_secs(60),
    Duration::from_secs(2 * 60),
    Duration::from_secs(10 * 60),
    Duration::from_secs(30 * 60),
    Duration::from_secs(3_600),
    Duration::from_secs(3 * 3_600),
    Duration::from_secs(6 * 3_600),
    Duration::from_secs(12 * 3_600),
    Duration::from_secs(24 * 3_600),
    Duration::from_secs(7 * 24 * 3_600),
    Duration::from_secs(14 * 24 * 3_600),
    Duration::from_secs(30 * 24 * 3_600),
];

/// Parse duration strings like "10s", "1h30m", "500ms", "7d"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        bail!("Empty duration");
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = s;
    let mut nanos = 0.0;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .with_context(|| format!("Missing unit in duration: {s}"))?;
        if num_len == 0 {
            bail!("Unknown duration format: {s}");
        }
        let (num, tail) = rest.split_at(num_len);
        let val: f64 = num
            .parse()
            .with_context(|| format!("Unknown duration format: {s}"))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let Some((_, multiplier)) = UNITS.iter().find(|(suffix, _)| *suffix == unit) else {
            bail!("Unknown duration unit {unit:?} in {s}");
        };

        nanos += val * multiplier;
        rest = tail;
    }

    Ok(Duration::from_nanos(nanos as u64))
}

/// Format a duration using a single unit: seconds, minutes or hours
/// ("30s", "2m", "168h"). Durations that are not whole minutes are printed
/// in seconds, and durations that are not whole hours in minutes.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 || secs % 60 != 0 || d.subsec_nanos() != 0 {
        return format!("{:.0}s", d.as_secs_f64());
    }
    let mins = secs / 60;
    if mins < 60 || mins % 60 != 0 {
        return format!("{mins}m");
    }
    format!("{}h", mins / 60)
}

/// Pick the ladder interval nearest to `range / steps`, clamped to the
/// ladder ends. On a tie the larger interval wins.
pub fn nearest_interval(range: Duration, steps: u32) -> Duration {
    let raw = range / steps.max(1);
    let first = INTERVALS[0];
    let last = INTERVALS[INTERVALS.len() - 1];
    if raw <= first {
        return first;
    }
    if raw >= last {
        return last;
    }

    let mut bottom = first;
    let mut top = last;
    for &limit in &INTERVALS[1..] {
        if limit > raw {
            top = limit;
            break;
        }
        bottom = limit;
    }

    if raw - bottom < top - raw {
        bottom
    } else {
        top
    }
}

/// `strftime` format of the x-axis labels of a window split in `steps`
/// points. Seconds show when points are less than 5s apart.
pub fn time_label_format(window: Duration, steps: usize) -> &'static str {
    const DAY: Duration = Duration::from_secs(24 * 3_600);

    let steps = u32::try_from(steps.max(1)).unwrap_or(u32::MAX);
    if window > DAY * 15 {
        "%m/%d"
    } else if window > DAY {
        "%m/%d %H:%M"
    } else if window < Duration::from_secs(60) || window / steps < Duration::from_secs(5) {
        "%H:%M:%S"
    } else {
        "%H:%M"
    }
}
