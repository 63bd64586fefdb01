//! Dense two-phase tableau simplex with Bland's pivot rule.
//!
//! Problems here are tiny (tens of variables, dozens of rows) and solved
//! every cycle with structurally similar input. Bland's rule picks the lowest
//! eligible column to enter and breaks ratio ties by the lowest basic column,
//! so it never cycles and identical input always yields the identical point.
//!
//! Variables are unrestricted in sign. Each `x_j` is written as `x'_j - m`
//! with `x'_j >= 0` and one shared `m >= 0`.
//!
//! Tableau layout:
//!
//! ```text
//! row 0      phase-one cost (sum of artificials)
//! row 1      objective
//! row 2..    constraints
//! columns    x'_0 .. x'_{n-1} | m | slacks | artificials | rhs
//! ```
//!
//! Cost rows hold reduced costs and `-z` in the rhs column.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::constraint::LinearConstraint;
use super::error::SolveError;
use super::types::{GoalType, Relationship};

const ARTIFICIAL_COST_ROW: usize = 0;
const OBJECTIVE_ROW: usize = 1;
const FIRST_CONSTRAINT_ROW: usize = 2;

/// Numeric settings of the simplex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Hard cap on pivots per solve
    pub max_iterations: usize,
    /// Tolerance for reduced costs, ratio ties and the phase-one optimum
    pub epsilon: f64,
    /// Magnitudes below this are treated as exactly zero
    pub cutoff: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            epsilon: 1e-6,
            cutoff: 1e-10,
        }
    }
}

/// Finds a feasible (or optimal) point for a set of linearized constraints
#[derive(Debug, Clone, Default)]
pub struct LinearConstraintsSolver {
    settings: SolverSettings,
}

impl LinearConstraintsSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Any point satisfying all rows; the objective is the zero vector.
    pub fn solve(&self, n: usize, constraints: &[LinearConstraint]) -> Result<Vec<f64>, SolveError> {
        self.optimize(n, &vec![0.0; n], GoalType::Minimize, constraints)
    }

    /// Point that maximizes or minimizes `objective · x` subject to all rows
    pub fn optimize(
        &self,
        n: usize,
        objective: &[f64],
        goal: GoalType,
        constraints: &[LinearConstraint],
    ) -> Result<Vec<f64>, SolveError> {
        let mut tableau = Tableau::new(n, objective, goal, constraints, &self.settings);
        let mut iterations = 0;

        if tableau.has_artificials() {
            tableau.run(Stage::Feasibility, &mut iterations, self.settings.max_iterations)?;
            if tableau.infeasibility() > self.settings.epsilon {
                trace!(iterations, infeasibility = tableau.infeasibility(), "phase one ended infeasible");
                return Err(SolveError::NoFeasibleSolution);
            }
            tableau.drive_out_artificials();
        }
        tableau.run(Stage::Optimality, &mut iterations, self.settings.max_iterations)?;

        trace!(iterations, rows = constraints.len(), n, "simplex converged");
        Ok(tableau.solution())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Feasibility,
    Optimality,
}

struct Tableau {
    matrix: Array2<f64>,
    /// Basic column of every constraint row
    basis: Vec<usize>,
    n: usize,
    artificial_start: usize,
    rhs: usize,
    epsilon: f64,
    cutoff: f64,
}

/// A constraint row with `rhs >= 0`, scaled so its largest factor is 1
struct NormalizedRow {
    factors: Vec<f64>,
    relationship: Relationship,
    rhs: f64,
}

impl NormalizedRow {
    fn new(n: usize, constraint: &LinearConstraint, cutoff: f64) -> Self {
        let mut factors: Vec<f64> = (0..n)
            .map(|j| constraint.coefficients.get(j).copied().unwrap_or(0.0))
            .collect();
        let mut rhs = constraint.value;
        let mut relationship = constraint.relationship;

        if rhs < 0.0 {
            factors.iter_mut().for_each(|f| *f = -*f);
            rhs = -rhs;
            relationship = relationship.flipped();
        }

        let scale = factors.iter().fold(0.0_f64, |acc, f| acc.max(f.abs()));
        if scale > cutoff {
            factors.iter_mut().for_each(|f| *f /= scale);
            rhs /= scale;
        }

        Self {
            factors,
            relationship,
            rhs,
        }
    }

    fn needs_slack(&self) -> bool {
        !matches!(self.relationship, Relationship::Equals)
    }

    fn needs_artificial(&self) -> bool {
        !matches!(self.relationship, Relationship::LessOrEquals)
    }
}

impl Tableau {
    fn new(
        n: usize,
        objective: &[f64],
        goal: GoalType,
        constraints: &[LinearConstraint],
        settings: &SolverSettings,
    ) -> Self {
        let rows: Vec<NormalizedRow> = constraints
            .iter()
            .map(|c| NormalizedRow::new(n, c, settings.cutoff))
            .collect();

        let negative_part = n;
        let slack_start = n + 1;
        let artificial_start = slack_start + rows.iter().filter(|r| r.needs_slack()).count();
        let rhs = artificial_start + rows.iter().filter(|r| r.needs_artificial()).count();

        let mut matrix = Array2::<f64>::zeros((FIRST_CONSTRAINT_ROW + rows.len(), rhs + 1));
        let mut basis = Vec::with_capacity(rows.len());

        // minimize sign * objective
        let sign = match goal {
            GoalType::Minimize => 1.0,
            GoalType::Maximize => -1.0,
        };
        let mut objective_sum = 0.0;
        for j in 0..n {
            let cost = sign * objective.get(j).copied().unwrap_or(0.0);
            matrix[[OBJECTIVE_ROW, j]] = cost;
            objective_sum += cost;
        }
        matrix[[OBJECTIVE_ROW, negative_part]] = -objective_sum;

        let mut next_slack = slack_start;
        let mut next_artificial = artificial_start;
        for (i, row) in rows.iter().enumerate() {
            let r = FIRST_CONSTRAINT_ROW + i;
            for (j, factor) in row.factors.iter().enumerate() {
                matrix[[r, j]] = *factor;
            }
            matrix[[r, negative_part]] = -row.factors.iter().sum::<f64>();
            matrix[[r, rhs]] = row.rhs;

            match row.relationship {
                Relationship::LessOrEquals => {
                    matrix[[r, next_slack]] = 1.0;
                    basis.push(next_slack);
                    next_slack += 1;
                }
                Relationship::GreaterOrEquals => {
                    matrix[[r, next_slack]] = -1.0;
                    next_slack += 1;
                    matrix[[r, next_artificial]] = 1.0;
                    basis.push(next_artificial);
                    next_artificial += 1;
                }
                Relationship::Equals => {
                    matrix[[r, next_artificial]] = 1.0;
                    basis.push(next_artificial);
                    next_artificial += 1;
                }
            }
        }

        // Price out the basic artificials so the phase-one row holds reduced costs.
        for (i, &column) in basis.iter().enumerate() {
            if column >= artificial_start {
                let r = FIRST_CONSTRAINT_ROW + i;
                for j in 0..=rhs {
                    if j < artificial_start || j == rhs {
                        matrix[[ARTIFICIAL_COST_ROW, j]] -= matrix[[r, j]];
                    }
                }
            }
        }

        Self {
            matrix,
            basis,
            n,
            artificial_start,
            rhs,
            epsilon: settings.epsilon,
            cutoff: settings.cutoff,
        }
    }

    fn has_artificials(&self) -> bool {
        self.rhs > self.artificial_start
    }

    /// Sum of artificials at the current vertex
    fn infeasibility(&self) -> f64 {
        -self.matrix[[ARTIFICIAL_COST_ROW, self.rhs]]
    }

    fn run(&mut self, stage: Stage, iterations: &mut usize, max_iterations: usize) -> Result<(), SolveError> {
        let (cost_row, column_limit) = match stage {
            Stage::Feasibility => (ARTIFICIAL_COST_ROW, self.rhs),
            // artificials never re-enter once phase one is done
            Stage::Optimality => (OBJECTIVE_ROW, self.artificial_start),
        };

        while let Some(column) = self.entering_column(cost_row, column_limit) {
            let row = self.leaving_row(column).ok_or(SolveError::Unbounded)?;
            if *iterations >= max_iterations {
                return Err(SolveError::IterationLimitExceeded(max_iterations));
            }
            *iterations += 1;
            self.pivot(row, column);
        }
        Ok(())
    }

    /// Bland: the lowest column with a negative reduced cost
    fn entering_column(&self, cost_row: usize, column_limit: usize) -> Option<usize> {
        (0..column_limit).find(|&j| self.matrix[[cost_row, j]] < -self.epsilon)
    }

    /// Minimum ratio row; ties go to the lowest basic column
    fn leaving_row(&self, column: usize) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for r in FIRST_CONSTRAINT_ROW..self.matrix.nrows() {
            let entry = self.matrix[[r, column]];
            if entry <= self.cutoff {
                continue;
            }
            let ratio = self.matrix[[r, self.rhs]].max(0.0) / entry;
            best = match best {
                None => Some((r, ratio)),
                Some((best_row, best_ratio)) => {
                    let tolerance = self.epsilon * best_ratio.abs().max(1.0);
                    let tie = (ratio - best_ratio).abs() <= tolerance;
                    let basic = |row: usize| self.basis[row - FIRST_CONSTRAINT_ROW];
                    if (tie && basic(r) < basic(best_row)) || (!tie && ratio < best_ratio) {
                        Some((r, ratio))
                    } else {
                        Some((best_row, best_ratio))
                    }
                }
            };
        }
        best.map(|(row, _)| row)
    }

    fn pivot(&mut self, row: usize, column: usize) {
        let pivot_value = self.matrix[[row, column]];
        self.matrix.row_mut(row).mapv_inplace(|v| v / pivot_value);
        let pivot_row = self.matrix.row(row).to_owned();

        for r in 0..self.matrix.nrows() {
            if r == row {
                continue;
            }
            let factor = self.matrix[[r, column]];
            if factor == 0.0 {
                continue;
            }
            let cutoff = self.cutoff;
            let mut target = self.matrix.row_mut(r);
            target.scaled_add(-factor, &pivot_row);
            target.mapv_inplace(|v| if v.abs() < cutoff { 0.0 } else { v });
        }

        self.basis[row - FIRST_CONSTRAINT_ROW] = column;
    }

    /// After a feasible phase one, artificials may remain basic at zero level.
    /// Swap each for any non-artificial column of its row; rows without one are
    /// redundant and stay untouched because no later pivot column has an entry
    /// there.
    fn drive_out_artificials(&mut self) {
        for i in 0..self.basis.len() {
            if self.basis[i] < self.artificial_start {
                continue;
            }
            let r = FIRST_CONSTRAINT_ROW + i;
            if let Some(column) =
                (0..self.artificial_start).find(|&j| self.matrix[[r, j]].abs() > self.epsilon)
            {
                self.pivot(r, column);
            }
        }
    }

    fn solution(&self) -> Vec<f64> {
        let mut values = vec![0.0; self.n + 1];
        for (i, &column) in self.basis.iter().enumerate() {
            if column <= self.n {
                values[column] = self.matrix[[FIRST_CONSTRAINT_ROW + i, self.rhs]];
            }
        }
        let negative_part = values[self.n];
        values.truncate(self.n);
        values.iter().map(|v| v - negative_part).collect()
    }
}
