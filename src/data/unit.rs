//! Unit formatting of single values.
//!
//! | unit                                  | example            |
//! |---------------------------------------|--------------------|
//! | `""`, `short`                         | `1.23 K`, `2 Mil`  |
//! | `none`                                | `1234.1`           |
//! | `percent`                             | `12.35%`           |
//! | `ratio` (value × 100)                 | `12.35%`           |
//! | `s`, `second(s)`                      | `123 ms`, `-25 m`  |
//! | `ms`, `millisecond(s)`                | `2.5008 m`         |
//! | `reqps`                               | `0.12 reqps`       |
//! | `byte(s)`                             | `2.03 KiB`         |

use thiserror::Error;

/// Unknown unit name.
#[derive(Debug, Error)]
#[error("{0} is not a valid unit")]
pub struct UnitError(pub String);

const KIBIBYTE: f64 = 1024.0;

const BYTE_STEPS: &[(f64, &str)] = &[
    (1.0, " B"),
    (KIBIBYTE, " KiB"),
    (KIBIBYTE * KIBIBYTE, " MiB"),
    (KIBIBYTE * KIBIBYTE * KIBIBYTE, " GiB"),
    (KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE, " TiB"),
    (KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE, " PiB"),
    (KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE, " EiB"),
    (KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE, " ZiB"),
    (KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE * KIBIBYTE, " YiB"),
];

const SHORT_STEPS: &[(f64, &str)] = &[
    (1.0, ""),
    (1e3, " K"),
    (1e6, " Mil"),
    (1e9, " Bil"),
    (1e12, " Tri"),
    (1e15, " Quadr"),
    (1e18, " Quint"),
    (1e21, " Sext"),
    (1e24, " Sept"),
];

/// A value formatter for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    Short,
    None,
    Percent,
    Ratio,
    Seconds,
    Milliseconds,
    Reqps,
    Bytes,
}

/// Get the formatter of `unit` (case insensitive).
pub fn formatter(unit: &str) -> Result<Formatter, UnitError> {
    let f = match unit.to_lowercase().as_str() {
        "" | "short" => Formatter::Short,
        "none" => Formatter::None,
        "percent" => Formatter::Percent,
        "ratio" => Formatter::Ratio,
        "s" | "second" | "seconds" => Formatter::Seconds,
        "ms" | "millisecond" | "milliseconds" => Formatter::Milliseconds,
        "reqps" => Formatter::Reqps,
        "byte" | "bytes" => Formatter::Bytes,
        _ => return Err(UnitError(unit.to_string())),
    };
    Ok(f)
}

impl Formatter {
    /// Format `value` with `decimals` digits. Negative decimals count as 0
    /// and NaN renders as an empty string.
    pub fn format(&self, value: f64, decimals: i32) -> String {
        if value.is_nan() {
            return String::new();
        }
        let decimals = decimals.max(0) as usize;

        match self {
            Formatter::Short => ranged(value, decimals, SHORT_STEPS),
            Formatter::None => format!("{value:.decimals$}"),
            Formatter::Percent => format!("{value:.decimals$}%"),
            Formatter::Ratio => format!("{:.decimals$}%", value * 100.0),
            Formatter::Seconds => duration(value * 1e9, decimals),
            Formatter::Milliseconds => duration(value * 1e6, decimals),
            Formatter::Reqps => format!("{value:.decimals$} reqps"),
            Formatter::Bytes => ranged(value, decimals, BYTE_STEPS),
        }
    }
}

fn ranged(value: f64, decimals: usize, steps: &[(f64, &str)]) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let value = value.abs();

    // Largest step whose base fits the value; the first step otherwise.
    let (base, suffix) = steps
        .iter()
        .rev()
        .find(|(base, _)| value >= *base)
        .copied()
        .unwrap_or(steps[0]);

    format!("{sign}{:.decimals$}{suffix}", value / base)
}

fn duration(nanos: f64, decimals: usize) -> String {
    let sign = if nanos < 0.0 { "-" } else { "" };
    // Sub-nanosecond precision is dropped.
    let nanos = nanos.abs().trunc();
    let secs = nanos / 1e9;

    if nanos < 1_000.0 {
        format!("{sign}{nanos:.0} ns")
    } else if secs * 1e6 < 1_000.0 {
        format!("{sign}{:.decimals$} µs", secs * 1e6)
    } else if secs * 1e3 < 1_000.0 {
        format!("{sign}{:.decimals$} ms", secs * 1e3)
    } else if secs < 60.0 {
        format!("{sign}{secs:.decimals$} s")
    } else if secs < 3_600.0 {
        format!("{sign}{:.decimals$} m", secs / 60.0)
    } else if secs < 86_400.0 {
        format!("{sign}{:.decimals$} h", secs / 3_600.0)
    } else {
        format!("{sign}{:.decimals$} d", secs / 86_400.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(unit: &str, value: f64, decimals: i32) -> String {
        formatter(unit).unwrap().format(value, decimals)
    }

    #[test]
    fn test_invalid_unit() {
        let err = formatter("furlongs").unwrap_err();
        assert_eq!(err.to_string(), "furlongs is not a valid unit");
    }

    #[test]
    fn test_safe_formatting() {
        assert_eq!(fmt("none", 1234.12345, -10), "1234");
        assert_eq!(fmt("", f64::NAN, 2), "");
    }

    #[test]
    fn test_short() {
        let cases = [
            (0.0, 0, "0"),
            (-107.0, 0, "-107"),
            (234.12345, 4, "234.1234"),
            (1234.12345, 0, "1 K"),
            (2050.0, 2, "2.05 K"),
            (1.56e6, 3, "1.560 Mil"),
            (5.783e9, 0, "6 Bil"),
            (82.321e12, 1, "82.3 Tri"),
            (9.6132e15, 4, "9.6132 Quadr"),
            (31.99e18, 2, "31.99 Quint"),
            (17.581e21, 0, "18 Sext"),
            (2.812e25, 0, "28 Sept"),
        ];
        for (value, decimals, expected) in cases {
            assert_eq!(fmt("short", value, decimals), expected, "value {value}");
        }
    }

    #[test]
    fn test_plain_suffixes() {
        assert_eq!(fmt("none", 1234.12345, 1), "1234.1");
        assert_eq!(fmt("percent", 1234.12345, 2), "1234.12%");
        assert_eq!(fmt("ratio", 1.12345, 0), "112%");
        assert_eq!(fmt("reqps", 0.12345, 2), "0.12 reqps");
        assert_eq!(fmt("REQPS", 1.12345, 0), "1 reqps");
    }

    #[test]
    fn test_seconds() {
        let cases = [
            (0.0, 0, "0 ns"),
            (-1500.0, 0, "-25 m"),
            (0.123, 0, "123 ms"),
            (35.1234, 2, "35.12 s"),
            (60.1, 0, "1 m"),
            (64.0, 1, "1.1 m"),
            (2.0 * 3_600.0, 0, "2 h"),
            (2.0 * 3_600.0 + 47.0, 4, "2.0131 h"),
            (5.0 * 86_400.0, 0, "5 d"),
        ];
        for (value, decimals, expected) in cases {
            assert_eq!(fmt("seconds", value, decimals), expected, "value {value}");
        }
        assert_eq!(fmt("s", 1.5e-7, 3), "150 ns");
    }

    #[test]
    fn test_milliseconds() {
        assert_eq!(fmt("ms", 0.0, 0), "0 ns");
        assert_eq!(fmt("milliseconds", -1500.0, 0), "-2 s");
        assert_eq!(fmt("ms", 150.0 * 1000.0 + 47.0, 4), "2.5008 m");
    }

    #[test]
    fn test_bytes() {
        let cases = [
            (0.0, 0, "0 B"),
            (-107.0, 0, "-107 B"),
            (2050.0, 0, "2 KiB"),
            (2081.0, 2, "2.03 KiB"),
            (1.405e8, 3, "133.991 MiB"),
            (6.034e11, 0, "562 GiB"),
            (4.508e13, 0, "41 TiB"),
            (1.914e16, 0, "17 PiB"),
            (4.812e19, 2, "41.74 EiB"),
            (15.72e21, 1, "13.3 ZiB"),
        ];
        for (value, decimals, expected) in cases {
            assert_eq!(fmt("bytes", value, decimals), expected, "value {value}");
        }
    }
}
