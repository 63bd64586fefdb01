use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use super::coefficients::Coefficients;
use super::constraint::LinearConstraint;
use super::error::SolveError;
use super::simplex::LinearConstraintsSolver;
use super::types::{GoalType, Phase, PowerKind, Relationship};

/// Sign quadrant of the (active, reactive) plane all variables are kept in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Quadrant {
    /// Discharging, capacitive: every variable `>= 0`
    I,
    /// Charging, inductive: every variable `<= 0`
    III,
}

impl Quadrant {
    /// Search direction that moves towards zero inside the quadrant
    pub fn goal(self) -> GoalType {
        match self {
            Quadrant::I => GoalType::Minimize,
            Quadrant::III => GoalType::Maximize,
        }
    }

    fn rows(self, n: usize) -> impl Iterator<Item = LinearConstraint> {
        let relationship = match self {
            Quadrant::I => Relationship::GreaterOrEquals,
            Quadrant::III => Relationship::LessOrEquals,
        };
        (0..n).map(move |i| LinearConstraint::new(unit(n, i), relationship, 0.0))
    }
}

/// Final-solve attempts of `EssPower::apply_power`, in the order they are tried.
///
/// Every attempt runs on top of the book's constraints and its accepted null
/// constraints; the first one that succeeds provides the set-points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum SolveStrategy {
    /// Devices share power equally, all variables `>= 0`, smallest total
    EqualDistributionQuadrantI,
    /// Devices share power equally, all variables `<= 0`, smallest magnitude
    EqualDistributionQuadrantIII,
    /// Smallest active power total with all variables `>= 0`, then the
    /// smallest reactive total with active power fixed
    ActiveFirstQuadrantI,
    /// Same as [`SolveStrategy::ActiveFirstQuadrantI`] with all variables `<= 0`
    ActiveFirstQuadrantIII,
    /// Minimize the sum of all variables without sign restriction
    Minimize,
    /// Maximize the sum of all variables without sign restriction
    Maximize,
    /// Any feasible point
    Feasible,
}

impl SolveStrategy {
    pub fn quadrant(self) -> Option<Quadrant> {
        match self {
            SolveStrategy::EqualDistributionQuadrantI | SolveStrategy::ActiveFirstQuadrantI => Some(Quadrant::I),
            SolveStrategy::EqualDistributionQuadrantIII | SolveStrategy::ActiveFirstQuadrantIII => {
                Some(Quadrant::III)
            }
            SolveStrategy::Minimize | SolveStrategy::Maximize | SolveStrategy::Feasible => None,
        }
    }

    /// Run this attempt against `base`, the linearized book
    pub fn attempt(
        self,
        solver: &LinearConstraintsSolver,
        coefficients: &Coefficients,
        base: &[LinearConstraint],
    ) -> Result<Vec<f64>, SolveError> {
        let n = coefficients.count();
        let total = vec![1.0; n];
        match (self, self.quadrant()) {
            (SolveStrategy::EqualDistributionQuadrantI | SolveStrategy::EqualDistributionQuadrantIII, Some(quadrant)) => {
                let mut rows = base.to_vec();
                rows.extend(quadrant.rows(n));
                rows.extend(equal_distribution_rows(coefficients));
                solver.optimize(n, &total, quadrant.goal(), &rows)
            }
            (SolveStrategy::ActiveFirstQuadrantI | SolveStrategy::ActiveFirstQuadrantIII, Some(quadrant)) => {
                let mut rows = base.to_vec();
                rows.extend(quadrant.rows(n));

                let active = coefficients.indices_of_kind(PowerKind::Active);
                let mut objective = vec![0.0; n];
                for &i in &active {
                    objective[i] = 1.0;
                }
                let point = solver.optimize(n, &objective, quadrant.goal(), &rows)?;
                rows.extend(
                    active
                        .iter()
                        .map(|&i| LinearConstraint::new(unit(n, i), Relationship::Equals, point[i])),
                );
                solver.optimize(n, &total, quadrant.goal(), &rows)
            }
            (SolveStrategy::Minimize, _) => solver.optimize(n, &total, GoalType::Minimize, base),
            (SolveStrategy::Maximize, _) => solver.optimize(n, &total, GoalType::Maximize, base),
            _ => solver.solve(n, base),
        }
    }
}

fn unit(n: usize, index: usize) -> Vec<f64> {
    let mut row = vec![0.0; n];
    row[index] = 1.0;
    row
}

/// Per kind: every device carries the same total as the first device, and the
/// phases of an asymmetric device carry the same value.
fn equal_distribution_rows(coefficients: &Coefficients) -> Vec<LinearConstraint> {
    let n = coefficients.count();
    let ess_ids = coefficients.ess_ids();
    let mut rows = Vec::new();

    for kind in [PowerKind::Active, PowerKind::Reactive] {
        let Some((first, others)) = ess_ids.split_first() else {
            continue;
        };
        let reference = coefficients.indices_of_ess(first, kind);
        for ess_id in others {
            let mut row = vec![0.0; n];
            for &i in &reference {
                row[i] += 1.0;
            }
            for i in coefficients.indices_of_ess(ess_id, kind) {
                row[i] -= 1.0;
            }
            rows.push(LinearConstraint::new(row, Relationship::Equals, 0.0));
        }

        for ess_id in &ess_ids {
            let phases: Vec<usize> = Phase::CONCRETE
                .iter()
                .filter_map(|&p| coefficients.of(ess_id, p, kind).ok())
                .collect();
            for pair in phases.windows(2) {
                let mut row = vec![0.0; n];
                row[pair[0]] = 1.0;
                row[pair[1]] = -1.0;
                rows.push(LinearConstraint::new(row, Relationship::Equals, 0.0));
            }
        }
    }
    rows
}
