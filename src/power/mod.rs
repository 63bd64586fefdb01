//! Linear constraint solving for the active and reactive power of a cluster of
//! energy storage systems.

pub mod coefficients;
pub mod constraint;
pub mod error;
pub mod extrema;
pub mod manager;
pub mod simplex;
pub mod solver;
pub mod strategy;
pub mod tuple;
pub mod types;

pub use coefficients::{Coefficient, Coefficients};
pub use constraint::{Constraint, LinearConstraint, Term};
pub use error::{DomainError, PowerError, SolveError};
pub use extrema::{UNBOUNDED_MAX, UNBOUNDED_MIN};
pub use manager::{ConstraintId, EssPower};
pub use simplex::{LinearConstraintsSolver, SolverSettings};
pub use solver::{linearize, linearize_all, ConstraintSolver};
pub use strategy::{Quadrant, SolveStrategy};
pub use tuple::PowerTuple;
pub use types::{ConstraintType, GoalType, Phase, PowerKind, Relationship};
