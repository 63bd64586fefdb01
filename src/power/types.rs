use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// AC phase a power variable refers to.
///
/// `All` denotes a symmetric reference. It is expanded into the three concrete
/// phases at solve time unless a [`Coefficients`](super::Coefficients)
/// instance registers an `All` variable for the device itself (symmetric ESS).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Phase {
    L1,
    L2,
    L3,
    All,
}

impl Phase {
    /// The phases `All` expands into, in column order.
    pub const CONCRETE: [Phase; 3] = [Phase::L1, Phase::L2, Phase::L3];

    pub fn is_all(self) -> bool {
        matches!(self, Phase::All)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
pub enum PowerKind {
    Active,
    Reactive,
}

/// Relation between the left-hand side of a constraint and its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum Relationship {
    #[strum(serialize = "=")]
    Equals,
    #[strum(serialize = "<=")]
    LessOrEquals,
    #[strum(serialize = ">=")]
    GreaterOrEquals,
}

impl Relationship {
    /// Relationship after multiplying both sides by -1
    pub fn flipped(self) -> Self {
        match self {
            Relationship::Equals => Relationship::Equals,
            Relationship::LessOrEquals => Relationship::GreaterOrEquals,
            Relationship::GreaterOrEquals => Relationship::LessOrEquals,
        }
    }

    /// Whether `lhs <rel> rhs` holds within `tolerance`
    pub fn is_satisfied(self, lhs: f64, rhs: f64, tolerance: f64) -> bool {
        match self {
            Relationship::Equals => (lhs - rhs).abs() <= tolerance,
            Relationship::LessOrEquals => lhs <= rhs + tolerance,
            Relationship::GreaterOrEquals => lhs >= rhs - tolerance,
        }
    }
}

/// Direction of an extremum search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum GoalType {
    Maximize,
    Minimize,
}

/// Lifetime of a constraint inside an [`EssPower`](super::EssPower) book.
///
/// Static constraints stay until removed; cycle constraints are dropped by
/// `clear_cycle_constraints` at the start of every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum ConstraintType {
    Static,
    Cycle,
}
