//! Dashboard variables resolved to template values.
//!
//! Constant and interval variables are both resolved once, when the
//! dashboard is loaded, and belong to the dashboard scope. The sync scope
//! exists for variables whose value changes every tick.

use std::time::Duration;

use gridwatch_types::{Dashboard, Variable, VariableKind};

use crate::data::duration::{format_duration, nearest_interval};
use crate::data::TemplateData;

/// Default number of steps of an interval variable.
pub const DEFAULT_INTERVAL_STEPS: u32 = 50;

/// When the value of a variable is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Once, when the dashboard is loaded.
    Dashboard,
    /// On every sync.
    Sync,
}

/// A resolved dashboard variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variabler {
    Constant { name: String, value: String },
    Interval { name: String, value: String },
}

impl Variabler {
    /// Resolve `variable` for a dashboard spanning `time_range`.
    pub fn new(variable: &Variable, time_range: Duration) -> Self {
        let name = variable.name.clone();
        match &variable.kind {
            VariableKind::Constant(c) => Variabler::Constant {
                name,
                value: c.value.clone(),
            },
            VariableKind::Interval(i) => {
                let steps = if i.steps == 0 {
                    DEFAULT_INTERVAL_STEPS
                } else {
                    i.steps
                };
                let value = format_duration(nearest_interval(time_range, steps));
                Variabler::Interval { name, value }
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Variabler::Constant { name, .. } | Variabler::Interval { name, .. } => name,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Variabler::Constant { .. } | Variabler::Interval { .. } => Scope::Dashboard,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Variabler::Constant { value, .. } | Variabler::Interval { value, .. } => value,
        }
    }
}

/// Resolve every variable of `dashboard`.
pub fn variablers(dashboard: &Dashboard, time_range: Duration) -> Vec<Variabler> {
    dashboard
        .variable_list()
        .iter()
        .map(|v| Variabler::new(v, time_range))
        .collect()
}

/// Template data of the variables in `scope`.
pub fn scope_data(variablers: &[Variabler], scope: Scope) -> TemplateData {
    variablers
        .iter()
        .filter(|v| v.scope() == scope)
        .map(|v| (v.name(), v.value()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwatch_types::{ConstantVariable, IntervalVariable};

    fn dashboard() -> Dashboard {
        let mut d = Dashboard::default();
        d.variables.insert(
            "env".into(),
            VariableKind::Constant(ConstantVariable {
                value: "prod".into(),
            }),
        );
        d.variables.insert(
            "interval".into(),
            VariableKind::Interval(IntervalVariable { steps: 0 }),
        );
        d.variables.insert(
            "coarse".into(),
            VariableKind::Interval(IntervalVariable { steps: 2 }),
        );
        d
    }

    #[test]
    fn test_variablers() {
        let vs = variablers(&dashboard(), Duration::from_secs(3_600));
        let data = scope_data(&vs, Scope::Dashboard);

        assert_eq!(data.get("env"), Some("prod"));
        // 1h / 50 = 72s, nearest rung is 1m.
        assert_eq!(data.get("interval"), Some("1m"));
        // 1h / 2 = 30m.
        assert_eq!(data.get("coarse"), Some("30m"));
        assert!(scope_data(&vs, Scope::Sync).is_empty());
    }

    #[test]
    fn test_interval_ladder_ends() {
        let var = Variable {
            name: "i".into(),
            kind: VariableKind::Interval(IntervalVariable { steps: 1 }),
        };
        let long = Variabler::new(&var, Duration::from_secs(365 * 24 * 3_600));
        assert_eq!(long.value(), "720h");

        let short = Variabler::new(&var, Duration::from_secs(1));
        assert_eq!(short.value(), "30s");
        assert_eq!(short.name(), "i");
    }
}
