use super::OptimizeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A solver-specific tuning value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SolverOption {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SolverOption {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SolverOption::Int(v) => Some(*v as f64),
            SolverOption::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for SolverOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverOption::Bool(v) => write!(f, "{v}"),
            SolverOption::Int(v) => write!(f, "{v}"),
            SolverOption::Float(v) => write!(f, "{v}"),
            SolverOption::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for SolverOption {
    fn from(value: bool) -> Self {
        SolverOption::Bool(value)
    }
}

impl From<i64> for SolverOption {
    fn from(value: i64) -> Self {
        SolverOption::Int(value)
    }
}

impl From<f64> for SolverOption {
    fn from(value: f64) -> Self {
        SolverOption::Float(value)
    }
}

impl From<&str> for SolverOption {
    fn from(value: &str) -> Self {
        SolverOption::Text(value.to_string())
    }
}

/// Solver identity plus opaque tuning options.
///
/// Options a backend does not recognize are carried along untouched so the
/// same settings can be handed to any backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub solver: String,
    pub options: BTreeMap<String, SolverOption>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self::new("clarabel")
    }
}

impl SolverSettings {
    pub fn new(solver: impl Into<String>) -> Self {
        Self {
            solver: solver.into(),
            options: BTreeMap::new(),
        }
    }

    /// Named option block for `solver`.
    ///
    /// `default` is known for every solver; for Gurobi it carries the barrier
    /// tuning used on large PyPSA-Eur networks, for other solvers it is empty.
    pub fn preset(solver: &str, name: &str) -> Result<Self, OptimizeError> {
        let mut settings = Self::new(solver);
        match (solver.to_ascii_lowercase().as_str(), name) {
            ("gurobi", "default") => {
                settings.options = BTreeMap::from([
                    ("Crossover".to_string(), SolverOption::Int(0)),
                    ("Threads".to_string(), SolverOption::Int(4)),
                    ("Method".to_string(), SolverOption::Int(2)),
                    ("BarConvTol".to_string(), SolverOption::Float(1e-6)),
                    ("Seed".to_string(), SolverOption::Int(123)),
                    ("AggFill".to_string(), SolverOption::Int(0)),
                    ("PreDual".to_string(), SolverOption::Int(0)),
                    ("GURO_PAR_BARDENSETHRESH".to_string(), SolverOption::Int(200)),
                ]);
            }
            (_, "default") => {}
            (_, other) => {
                return Err(OptimizeError::Solver(format!(
                    "unknown settings preset '{other}' for solver '{solver}'"
                )))
            }
        }
        Ok(settings)
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<SolverOption>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn option(&self, key: &str) -> Option<&SolverOption> {
        self.options.get(key)
    }
}
