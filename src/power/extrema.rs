use tracing::{error, warn};

use super::coefficients::Coefficients;
use super::constraint::{describe, Constraint};
use super::error::{DomainError, PowerError, SolveError};
use super::solver::ConstraintSolver;
use super::types::{GoalType, Phase, PowerKind};

/// Returned by a Maximize search that no constraint limits
pub const UNBOUNDED_MAX: f64 = f64::MAX;
/// Returned by a Minimize search that no constraint limits
pub const UNBOUNDED_MIN: f64 = f64::MIN;

impl ConstraintSolver {
    /// Largest or smallest value the `(ess_id, phase, kind)` variable can take
    /// under `constraints`.
    ///
    /// A reference that stands for several variables (`Phase::All` on an
    /// asymmetric device) is optimized as the sum of its phases.
    ///
    /// Advisory: an unlimited direction yields [`UNBOUNDED_MAX`] or
    /// [`UNBOUNDED_MIN`], an unsatisfiable set yields `0.0`. Only unknown
    /// variables are returned as errors.
    pub fn calculate_power_extrema(
        &self,
        coefficients: &Coefficients,
        constraints: &[Constraint],
        ess_id: &str,
        phase: Phase,
        kind: PowerKind,
        goal: GoalType,
    ) -> Result<f64, DomainError> {
        let indices = coefficients.resolve(ess_id, phase, kind)?;
        self.extremum_over(coefficients, constraints, &indices, goal)
    }

    /// Extremum of the sum of the variables at `indices`
    pub fn extremum_over(
        &self,
        coefficients: &Coefficients,
        constraints: &[Constraint],
        indices: &[usize],
        goal: GoalType,
    ) -> Result<f64, DomainError> {
        let mut objective = vec![0.0; coefficients.count()];
        for &index in indices {
            objective[index] = 1.0;
        }

        match self.optimize(coefficients, constraints, &objective, goal) {
            Ok(point) => Ok(indices.iter().map(|&i| point[i]).sum()),
            Err(PowerError::Domain(e)) => Err(e),
            Err(PowerError::Solve(SolveError::Unbounded)) => Ok(match goal {
                GoalType::Maximize => UNBOUNDED_MAX,
                GoalType::Minimize => UNBOUNDED_MIN,
            }),
            Err(PowerError::Solve(SolveError::NoFeasibleSolution)) => {
                warn!(
                    %goal,
                    constraints = %describe(constraints),
                    "unable to find power extremum, constraints are not satisfiable; using zero"
                );
                Ok(0.0)
            }
            Err(PowerError::Solve(e @ SolveError::IterationLimitExceeded(_))) => {
                error!(%goal, error = %e, "power extremum search did not converge; using zero");
                Ok(0.0)
            }
        }
    }
}
