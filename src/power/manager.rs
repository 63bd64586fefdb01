use std::collections::BTreeMap;
use std::fmt;
use strum::IntoEnumIterator;
use tracing::{debug, error, warn};

use super::coefficients::Coefficients;
use super::constraint::{describe, Constraint, LinearConstraint};
use super::error::{DomainError, PowerError, SolveError};
use super::simplex::SolverSettings;
use super::solver::{linearize, linearize_all, ConstraintSolver};
use super::strategy::SolveStrategy;
use super::tuple::PowerTuple;
use super::types::{ConstraintType, GoalType, Phase, PowerKind, Relationship};

/// Handle returned when a constraint is added to an [`EssPower`] book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(u64);

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    id: ConstraintId,
    constraint_type: ConstraintType,
    constraint: Constraint,
}

/// Constraint book for a set of managed energy storage systems.
///
/// Static constraints live until removed; cycle constraints are dropped by
/// [`EssPower::clear_cycle_constraints`] at the start of every cycle.
#[derive(Debug, Clone, Default)]
pub struct EssPower {
    coefficients: Coefficients,
    entries: Vec<Entry>,
    next_id: u64,
    solver: ConstraintSolver,
}

impl EssPower {
    pub fn new(settings: SolverSettings) -> Self {
        Self {
            solver: ConstraintSolver::new(settings),
            ..Self::default()
        }
    }

    /// Register a device; symmetric devices get one `All` variable per kind,
    /// asymmetric ones one variable per phase and kind.
    pub fn add_ess(&mut self, ess_id: &str, symmetric: bool) {
        if symmetric {
            self.coefficients.add_symmetric(ess_id);
        } else {
            self.coefficients.add_asymmetric(ess_id);
        }
    }

    /// Unregister a device together with every constraint that mentions it
    pub fn remove_ess(&mut self, ess_id: &str) -> bool {
        self.entries.retain(|e| !e.constraint.involves(ess_id));
        self.coefficients.remove_ess(ess_id)
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    pub fn ess_ids(&self) -> Vec<&str> {
        self.coefficients.ess_ids()
    }

    /// Static constraints in insertion order, followed by cycle constraints
    pub fn constraints(&self) -> Vec<Constraint> {
        let of_type = |t: ConstraintType| {
            self.entries
                .iter()
                .filter(move |e| e.constraint_type == t)
                .map(|e| e.constraint.clone())
        };
        of_type(ConstraintType::Static)
            .chain(of_type(ConstraintType::Cycle))
            .collect()
    }

    pub fn add_constraint(&mut self, constraint_type: ConstraintType, constraint: Constraint) -> ConstraintId {
        let id = ConstraintId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            constraint_type,
            constraint,
        });
        id
    }

    /// Add a constraint only if the book stays satisfiable with it.
    pub fn add_constraint_and_validate(
        &mut self,
        constraint_type: ConstraintType,
        constraint: Constraint,
    ) -> Result<ConstraintId, PowerError> {
        let mut candidate = self.constraints();
        candidate.push(constraint.clone());
        let rows = linearize_all(&self.coefficients, &candidate)?;

        match self.solver.linear().solve(self.coefficients.count(), &rows) {
            Ok(_) | Err(SolveError::Unbounded) => Ok(self.add_constraint(constraint_type, constraint)),
            Err(SolveError::NoFeasibleSolution) => {
                warn!(
                    constraint = %constraint,
                    "rejecting constraint, it makes the constraint set infeasible"
                );
                Err(SolveError::NoFeasibleSolution.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the removed constraint, if the id was still present
    pub fn remove_constraint(&mut self, id: ConstraintId) -> Option<Constraint> {
        let position = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(position).constraint)
    }

    pub fn clear_cycle_constraints(&mut self) {
        self.entries.retain(|e| e.constraint_type == ConstraintType::Static);
    }

    /// Whether at least one point satisfies every constraint in the book
    pub fn is_solvable(&self) -> bool {
        let rows = match linearize_all(&self.coefficients, &self.constraints()) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "constraint book references unknown variables");
                return false;
            }
        };
        matches!(
            self.solver.linear().solve(self.coefficients.count(), &rows),
            Ok(_) | Err(SolveError::Unbounded)
        )
    }

    pub fn extremum(&self, ess_id: &str, phase: Phase, kind: PowerKind, goal: GoalType) -> Result<f64, DomainError> {
        self.solver
            .calculate_power_extrema(&self.coefficients, &self.constraints(), ess_id, phase, kind, goal)
    }

    /// Highest total active power over all managed devices
    pub fn max_active_power(&self) -> Result<f64, DomainError> {
        self.total_active_power(GoalType::Maximize)
    }

    /// Lowest total active power over all managed devices
    pub fn min_active_power(&self) -> Result<f64, DomainError> {
        self.total_active_power(GoalType::Minimize)
    }

    fn total_active_power(&self, goal: GoalType) -> Result<f64, DomainError> {
        let indices = self.coefficients.indices_of_kind(PowerKind::Active);
        self.solver
            .extremum_over(&self.coefficients, &self.constraints(), &indices, goal)
    }

    /// `variable = 0` for every variable no controller has asked for.
    ///
    /// A variable counts as asked for when it appears in any cycle constraint
    /// or in a static equality with a non-zero value.
    pub fn null_constraints(&self) -> Vec<Constraint> {
        let mut covered = vec![false; self.coefficients.count()];
        let requests = self
            .entries
            .iter()
            .filter(|e| {
                e.constraint_type == ConstraintType::Cycle
                    || (e.constraint.relationship() == Relationship::Equals && e.constraint.value() != 0.0)
            })
            .map(|e| &e.constraint);
        for term in requests.flat_map(Constraint::terms) {
            for index in self
                .coefficients
                .resolve(&term.ess_id, term.phase, term.kind)
                .unwrap_or_default()
            {
                covered[index] = true;
            }
        }

        self.coefficients
            .iter()
            .filter(|(index, _)| !covered[*index])
            .filter_map(|(_, c)| {
                Constraint::simple(
                    format!("{} null", c),
                    &c.ess_id,
                    c.phase,
                    c.kind,
                    Relationship::Equals,
                    0.0,
                )
                .ok()
            })
            .collect()
    }

    /// Resolve the book into one set-point per managed device.
    ///
    /// Never fails: a set that cannot be solved yields zero for every device.
    pub fn apply_power(&self) -> BTreeMap<String, PowerTuple> {
        let point = self.solve_optimally().map(|(_, point)| point);
        self.tuples_from(point.as_deref())
    }

    /// Solution point used by [`EssPower::apply_power`] and the strategy that
    /// produced it; `None` if the book cannot be solved.
    ///
    /// Null constraints that contradict the book are dropped one by one, the
    /// rest stay. The [`SolveStrategy`] attempts then run in order on top.
    pub fn solve_optimally(&self) -> Option<(SolveStrategy, Vec<f64>)> {
        let constraints = self.constraints();
        if !self.is_solvable() {
            warn!(constraints = %describe(&constraints), "constraints are not solvable; applying zero power");
            return None;
        }
        let mut base = match linearize_all(&self.coefficients, &constraints) {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "unable to linearize constraints");
                return None;
            }
        };
        self.keep_feasible_nulls(&mut base);

        let linear = self.solver.linear();
        for strategy in SolveStrategy::iter() {
            match strategy.attempt(linear, &self.coefficients, &base) {
                Ok(point) => {
                    debug!(%strategy, "solved");
                    return Some((strategy, point));
                }
                Err(e) => debug!(%strategy, error = %e, "solve strategy failed"),
            }
        }
        error!(constraints = %describe(&constraints), "unable to apply power");
        None
    }

    fn keep_feasible_nulls(&self, rows: &mut Vec<LinearConstraint>) {
        let n = self.coefficients.count();
        for null in self.null_constraints() {
            let Ok(null_rows) = linearize(&self.coefficients, &null) else {
                continue;
            };
            let mut candidate = rows.clone();
            candidate.extend(null_rows);
            if self.solver.linear().solve(n, &candidate).is_ok() {
                *rows = candidate;
            } else {
                debug!(constraint = %null, "null constraint contradicts the book; dropped");
            }
        }
    }

    fn tuples_from(&self, point: Option<&[f64]>) -> BTreeMap<String, PowerTuple> {
        self.ess_ids()
            .into_iter()
            .map(|ess_id| {
                let tuple = point
                    .map(|p| PowerTuple::from_solution(&self.coefficients, p, ess_id))
                    .unwrap_or_default();
                (ess_id.to_string(), tuple)
            })
            .collect()
    }
}
