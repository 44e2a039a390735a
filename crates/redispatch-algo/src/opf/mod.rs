//! Optimal power flow backends
//!
//! The pipeline talks to solvers through the [`Optimizer`] trait only:
//! given a network and [`SolverSettings`] it returns a [`SolvedNetwork`] or
//! an [`OptimizeError`]. [`LinearOpf`] is the built-in multi-period linear
//! (DC) OPF solved with Clarabel through `good_lp`.

mod settings;

#[cfg(feature = "solver-clarabel")]
mod linear;

pub use settings::{SolverOption, SolverSettings};

#[cfg(feature = "solver-clarabel")]
pub use linear::LinearOpf;

use redispatch_core::{Network, SolvedNetwork};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failures of a single optimization run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizeError {
    /// No dispatch satisfies the constraints
    #[error("infeasible: {0}")]
    Infeasible(String),

    /// The solver crashed, was misconfigured or gave up
    #[error("solver error: {0}")]
    Solver(String),
}

/// Solves a network for optimal dispatch.
///
/// Implementations take the network by value and return it inside the
/// [`SolvedNetwork`], so the pre-solve and post-solve values never alias.
pub trait Optimizer: Send + Sync {
    /// Unique identifier (e.g., "clarabel")
    fn id(&self) -> &str;

    fn optimize(
        &self,
        network: Network,
        settings: &SolverSettings,
    ) -> Result<SolvedNetwork, OptimizeError>;
}

/// LP solvers compiled into this build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LpSolverKind {
    #[default]
    Clarabel,
}

const AVAILABLE_LP_SOLVERS: &[&str] = &[
    #[cfg(feature = "solver-clarabel")]
    "clarabel",
];

impl LpSolverKind {
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_LP_SOLVERS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LpSolverKind::Clarabel => "clarabel",
        }
    }
}

impl fmt::Display for LpSolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unknown_solver_error(label: &str) -> OptimizeError {
    OptimizeError::Solver(format!(
        "unknown lp solver '{}'; supported values: {}",
        label,
        LpSolverKind::available().join(", ")
    ))
}

impl FromStr for LpSolverKind {
    type Err = OptimizeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.to_ascii_lowercase();
        match normalized.as_str() {
            "clarabel" | "default" if !AVAILABLE_LP_SOLVERS.is_empty() => Ok(LpSolverKind::Clarabel),
            other => Err(unknown_solver_error(other)),
        }
    }
}

/// Optimizer named by `settings.solver`.
pub fn optimizer_for(settings: &SolverSettings) -> Result<Box<dyn Optimizer>, OptimizeError> {
    match settings.solver.parse::<LpSolverKind>()? {
        #[cfg(feature = "solver-clarabel")]
        LpSolverKind::Clarabel => Ok(Box::new(LinearOpf::new())),
        #[cfg(not(feature = "solver-clarabel"))]
        kind => Err(unknown_solver_error(kind.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimizer_is_object_safe() {
        fn _accepts(_o: &dyn Optimizer) {}
        fn _assert_send_sync<T: Send + Sync>() {}
        _assert_send_sync::<Box<dyn Optimizer>>();
    }

    #[test]
    fn test_solver_kind_parsing() {
        assert_eq!("Clarabel".parse::<LpSolverKind>().unwrap(), LpSolverKind::Clarabel);
        let err = "gurobi".parse::<LpSolverKind>().unwrap_err();
        assert!(err.to_string().contains("unknown lp solver 'gurobi'"));
        assert!(err.to_string().contains("clarabel"));
    }

    #[test]
    fn test_optimizer_for_settings() {
        let optimizer = optimizer_for(&SolverSettings::default()).unwrap();
        assert_eq!(optimizer.id(), "clarabel");
        let settings = SolverSettings::new("highs");
        assert!(matches!(
            optimizer_for(&settings),
            Err(OptimizeError::Solver(_))
        ));
    }
}
