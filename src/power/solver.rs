use tracing::error;

use super::coefficients::Coefficients;
use super::constraint::{describe, Constraint, LinearConstraint};
use super::error::{DomainError, PowerError, SolveError};
use super::simplex::{LinearConstraintsSolver, SolverSettings};
use super::types::{GoalType, Phase, PowerKind};

/// Links domain [`Constraint`]s against a [`Coefficients`] instance and hands
/// the resulting rows to the simplex.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSolver {
    linear: LinearConstraintsSolver,
}

impl ConstraintSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self {
            linear: LinearConstraintsSolver::new(settings),
        }
    }

    pub fn linear(&self) -> &LinearConstraintsSolver {
        &self.linear
    }

    /// Feasible point for all constraints.
    ///
    /// An unbounded feasibility solve means the constraint set is malformed;
    /// it is reported and returned as `NoFeasibleSolution`.
    pub fn solve(&self, coefficients: &Coefficients, constraints: &[Constraint]) -> Result<Vec<f64>, PowerError> {
        let rows = linearize_all(coefficients, constraints)?;
        match self.linear.solve(coefficients.count(), &rows) {
            Ok(point) => Ok(point),
            Err(SolveError::Unbounded) => {
                error!(
                    constraints = %describe(constraints),
                    "feasibility solve reported an unbounded solution"
                );
                Err(SolveError::NoFeasibleSolution.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Optimize `objective · x`; solver errors are returned untouched
    pub fn optimize(
        &self,
        coefficients: &Coefficients,
        constraints: &[Constraint],
        objective: &[f64],
        goal: GoalType,
    ) -> Result<Vec<f64>, PowerError> {
        let rows = linearize_all(coefficients, constraints)?;
        Ok(self.linear.optimize(coefficients.count(), objective, goal, &rows)?)
    }
}

/// Rows for one constraint.
///
/// Each term's factor lands at its variable's index; terms on the same index
/// add up. A `Phase::All` term whose device has no `All` variable registered
/// expands the constraint into one row per concrete phase, with that term
/// taking the row's phase.
pub fn linearize(coefficients: &Coefficients, constraint: &Constraint) -> Result<Vec<LinearConstraint>, DomainError> {
    let expands = |ess_id: &str, phase: Phase, kind: PowerKind| {
        phase.is_all() && !coefficients.contains(ess_id, Phase::All, kind)
    };
    let row_phases: Vec<Option<Phase>> = if constraint
        .terms()
        .iter()
        .any(|t| expands(t.ess_id.as_str(), t.phase, t.kind))
    {
        Phase::CONCRETE.iter().copied().map(Some).collect()
    } else {
        vec![None]
    };

    row_phases
        .into_iter()
        .map(|row_phase| -> Result<LinearConstraint, DomainError> {
            let mut row = vec![0.0; coefficients.count()];
            for term in constraint.terms() {
                let phase = match row_phase {
                    Some(p) if expands(term.ess_id.as_str(), term.phase, term.kind) => p,
                    _ => term.phase,
                };
                row[coefficients.of(&term.ess_id, phase, term.kind)?] += term.factor;
            }
            Ok(LinearConstraint::new(row, constraint.relationship(), constraint.value()))
        })
        .collect()
}

pub fn linearize_all(coefficients: &Coefficients, constraints: &[Constraint]) -> Result<Vec<LinearConstraint>, DomainError> {
    let mut rows = Vec::with_capacity(constraints.len());
    for constraint in constraints {
        rows.extend(linearize(coefficients, constraint)?);
    }
    Ok(rows)
}
