use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::DomainError;
use super::types::{Phase, PowerKind, Relationship};

/// One `factor * variable` summand of a constraint.
///
/// The variable is named by its `(ess_id, phase, kind)` triple; it is resolved
/// to a column index only when the constraint is linearized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub ess_id: String,
    pub phase: Phase,
    pub kind: PowerKind,
    pub factor: f64,
}

impl Term {
    pub fn new(ess_id: impl Into<String>, phase: Phase, kind: PowerKind, factor: f64) -> Self {
        Self {
            ess_id: ess_id.into(),
            phase,
            kind,
            factor,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}*{}/{}/{}", self.factor, self.ess_id, self.phase, self.kind)
    }
}

/// Immutable linear (in)equality: `Σ(factor·variable) <relationship> value`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    description: String,
    terms: Vec<Term>,
    relationship: Relationship,
    value: f64,
}

impl Constraint {
    /// Create a constraint.
    ///
    /// Fails if `terms` is empty or if any factor or the value is not finite.
    pub fn new(
        description: impl Into<String>,
        terms: Vec<Term>,
        relationship: Relationship,
        value: f64,
    ) -> Result<Self, DomainError> {
        let description = description.into();
        if terms.is_empty() {
            return Err(DomainError::InvalidConstraint {
                description,
                reason: "constraint has no terms".to_string(),
            });
        }
        if let Some(term) = terms.iter().find(|t| !t.factor.is_finite()) {
            let reason = format!("factor for {}/{}/{} is not finite", term.ess_id, term.phase, term.kind);
            return Err(DomainError::InvalidConstraint { description, reason });
        }
        if !value.is_finite() {
            return Err(DomainError::InvalidConstraint {
                description,
                reason: format!("value is not finite: {}", value),
            });
        }
        Ok(Self {
            description,
            terms,
            relationship,
            value,
        })
    }

    /// Single-variable constraint with factor 1, e.g. `ess0/All/Active <= 5000`
    pub fn simple(
        description: impl Into<String>,
        ess_id: impl Into<String>,
        phase: Phase,
        kind: PowerKind,
        relationship: Relationship,
        value: f64,
    ) -> Result<Self, DomainError> {
        Self::new(
            description,
            vec![Term::new(ess_id, phase, kind, 1.0)],
            relationship,
            value,
        )
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn relationship(&self) -> Relationship {
        self.relationship
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Whether any term refers to the given device
    pub fn involves(&self, ess_id: &str) -> bool {
        self.terms.iter().any(|t| t.ess_id == ess_id)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.description)?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", term)?;
        }
        write!(f, " {} {}", self.relationship, self.value)
    }
}

/// A constraint after linking against a `Coefficients` instance: one dense row
/// of `n` factors.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub coefficients: Vec<f64>,
    pub relationship: Relationship,
    pub value: f64,
}

impl LinearConstraint {
    pub fn new(coefficients: Vec<f64>, relationship: Relationship, value: f64) -> Self {
        Self {
            coefficients,
            relationship,
            value,
        }
    }

    /// Left-hand side evaluated at `point`
    pub fn evaluate(&self, point: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(point)
            .map(|(factor, x)| factor * x)
            .sum()
    }

    pub fn is_satisfied_by(&self, point: &[f64], tolerance: f64) -> bool {
        self.relationship
            .is_satisfied(self.evaluate(point), self.value, tolerance)
    }
}

/// Comma separated descriptions, used when logging a rejected constraint set
pub fn describe(constraints: &[Constraint]) -> String {
    use itertools::Itertools;
    constraints.iter().map(Constraint::description).join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_terms_rejected() {
        let result = Constraint::new("empty", vec![], Relationship::Equals, 0.0);
        assert!(matches!(result, Err(DomainError::InvalidConstraint { .. })));
    }

    #[test]
    fn test_non_finite_value_rejected() {
        let result = Constraint::simple(
            "nan",
            "ess0",
            Phase::All,
            PowerKind::Active,
            Relationship::LessOrEquals,
            f64::NAN,
        );
        assert!(result.is_err());

        let result = Constraint::new(
            "inf factor",
            vec![Term::new("ess0", Phase::L1, PowerKind::Active, f64::INFINITY)],
            Relationship::LessOrEquals,
            0.0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_display_lists_terms() {
        let constraint = Constraint::new(
            "grid balance",
            vec![
                Term::new("ess0", Phase::All, PowerKind::Active, 1.0),
                Term::new("ess1", Phase::All, PowerKind::Active, 1.0),
            ],
            Relationship::Equals,
            3000.0,
        )
        .unwrap();
        assert_eq!(
            constraint.to_string(),
            "[grid balance] +1*ess0/All/Active +1*ess1/All/Active = 3000"
        );
        assert!(constraint.involves("ess1"));
        assert!(!constraint.involves("ess2"));
    }

    #[test]
    fn test_linear_constraint_evaluation() {
        let row = LinearConstraint::new(vec![1.0, -2.0, 0.0], Relationship::LessOrEquals, 10.0);
        assert_eq!(row.evaluate(&[4.0, 1.0, 99.0]), 2.0);
        assert!(row.is_satisfied_by(&[4.0, 1.0, 99.0], 1e-6));
        assert!(!row.is_satisfied_by(&[20.0, 1.0, 0.0], 1e-6));
    }

    #[test]
    fn test_describe_joins_descriptions() {
        let a = Constraint::simple("max discharge", "ess0", Phase::All, PowerKind::Active, Relationship::LessOrEquals, 5000.0).unwrap();
        let b = Constraint::simple("min discharge", "ess0", Phase::All, PowerKind::Active, Relationship::GreaterOrEquals, 1000.0).unwrap();
        assert_eq!(describe(&[a, b]), "max discharge, min discharge");
    }
}
