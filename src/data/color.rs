//! Color selection for widgets: threshold colors and the default series
//! palette.

use std::sync::Arc;

use gridwatch_types::Threshold;

/// Default series colors, in assignment order.
pub const DEFAULT_PALETTE: [&str; 56] = [
    "#7EB26D", "#EAB839", "#6ED0E0", "#EF843C", "#E24D42", "#1F78C1", "#BA43A9", "#705DA0",
    "#508642", "#CCA300", "#447EBC", "#C15C17", "#890F02", "#0A437C", "#6D1F62", "#584477",
    "#B7DBAB", "#F4D598", "#70DBED", "#F9BA8F", "#F29191", "#82B5D8", "#E5A8E2", "#AEA2E0",
    "#629E51", "#E5AC0E", "#64B0C8", "#E0752D", "#BF1B00", "#0A50A1", "#962D82", "#614D93",
    "#9AC48A", "#F2C96D", "#65C5DB", "#F9934E", "#EA6460", "#5195CE", "#D683CE", "#806EB7",
    "#3F6833", "#967302", "#2F575E", "#99440A", "#58140C", "#052B51", "#511749", "#3F2B5B",
    "#E0F9D7", "#FCEACA", "#CFFAFF", "#F9E2D2", "#FCE2DE", "#BADFF4", "#F9D9F9", "#DEDAF7",
];

/// An ordered, shareable list of colors.
#[derive(Debug, Clone)]
pub struct Palette(Arc<[String]>);

impl Palette {
    pub fn new<I, S>(colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Palette(colors.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::new(DEFAULT_PALETTE)
    }
}

/// Hands out palette colors in order, wrapping around at the end.
///
/// A manager is created for every graph sync so the same series get the
/// same colors on each refresh.
#[derive(Debug)]
pub struct ColorManager {
    palette: Palette,
    next: usize,
}

impl ColorManager {
    pub fn new(palette: Palette) -> Self {
        Self { palette, next: 0 }
    }

    /// Next default color. An empty palette yields an empty color.
    pub fn next_color(&mut self) -> String {
        if self.palette.is_empty() {
            return String::new();
        }
        let color = self.palette.0[self.next].clone();
        self.next = (self.next + 1) % self.palette.len();
        color
    }

    /// The override color if one is set, the next default color otherwise.
    pub fn color_for(&mut self, override_color: Option<&str>) -> String {
        match override_color {
            Some(color) if !color.is_empty() => color.to_string(),
            _ => self.next_color(),
        }
    }
}

/// Sort thresholds ascending by start value.
pub fn sort_thresholds(thresholds: &mut [Threshold]) {
    thresholds.sort_by(|a, b| a.start_value.total_cmp(&b.start_value));
}

/// Color of the highest threshold whose start value is `<= value`; values
/// below every threshold take the lowest one. `thresholds` must be sorted.
pub fn threshold_color(thresholds: &[Threshold], value: f64) -> Option<&str> {
    let (first, rest) = thresholds.split_first()?;
    let selected = rest
        .iter()
        .filter(|t| value >= t.start_value)
        .last()
        .unwrap_or(first);
    Some(selected.color.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Vec<Threshold> {
        let mut t = vec![
            Threshold::new(80.0, "red"),
            Threshold::new(0.0, "green"),
            Threshold::new(50.0, "orange"),
        ];
        sort_thresholds(&mut t);
        t
    }

    #[test]
    fn test_threshold_color() {
        let t = thresholds();
        assert_eq!(threshold_color(&t, 10.0), Some("green"));
        assert_eq!(threshold_color(&t, 50.0), Some("orange"));
        assert_eq!(threshold_color(&t, 79.9), Some("orange"));
        assert_eq!(threshold_color(&t, 80.0), Some("red"));
        assert_eq!(threshold_color(&t, 1e9), Some("red"));
    }

    #[test]
    fn test_threshold_below_lowest() {
        let t = vec![Threshold::new(10.0, "blue"), Threshold::new(20.0, "red")];
        assert_eq!(threshold_color(&t, -5.0), Some("blue"));
        assert_eq!(threshold_color(&[], 1.0), None);
    }

    #[test]
    fn test_color_manager_cycles() {
        let mut cm = ColorManager::new(Palette::new(["a", "b"]));
        assert_eq!(cm.next_color(), "a");
        assert_eq!(cm.color_for(Some("#fff")), "#fff");
        assert_eq!(cm.color_for(None), "b");
        assert_eq!(cm.color_for(Some("")), "a");

        let mut empty = ColorManager::new(Palette::new(Vec::<String>::new()));
        assert_eq!(empty.next_color(), "");
    }

    #[test]
    fn test_default_palette() {
        let mut cm = ColorManager::new(Palette::default());
        assert_eq!(cm.next_color(), "#7EB26D");
        assert_eq!(cm.next_color(), "#EAB839");
        assert_eq!(Palette::default().len(), 56);
    }
}
