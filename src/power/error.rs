use thiserror::Error;

use super::types::{Phase, PowerKind};

/// Errors caused by malformed input from a controller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Unknown variable: ess [{ess_id}] phase [{phase}] kind [{kind}]")]
    UnknownVariable {
        ess_id: String,
        phase: Phase,
        kind: PowerKind,
    },
    #[error("Invalid constraint [{description}]: {reason}")]
    InvalidConstraint { description: String, reason: String },
}

impl DomainError {
    pub(crate) fn unknown(ess_id: &str, phase: Phase, kind: PowerKind) -> Self {
        DomainError::UnknownVariable {
            ess_id: ess_id.to_string(),
            phase,
            kind,
        }
    }
}

/// Errors reported by the simplex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SolveError {
    #[error("No feasible solution: constraints contradict each other")]
    NoFeasibleSolution,
    #[error("Unbounded solution")]
    Unbounded,
    #[error("Iteration limit of {0} exceeded")]
    IterationLimitExceeded(usize),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PowerError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Solve(#[from] SolveError),
}

impl PowerError {
    pub fn is_infeasible(&self) -> bool {
        matches!(self, PowerError::Solve(SolveError::NoFeasibleSolution))
    }
}
