use itertools::iproduct;
use std::fmt;

use super::constraint::Constraint;
use super::error::DomainError;
use super::types::{Phase, PowerKind};

/// One solvable variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coefficient {
    pub ess_id: String,
    pub phase: Phase,
    pub kind: PowerKind,
}

impl Coefficient {
    fn matches(&self, ess_id: &str, phase: Phase, kind: PowerKind) -> bool {
        self.ess_id == ess_id && self.phase == phase && self.kind == kind
    }
}

impl fmt::Display for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.ess_id, self.phase, self.kind)
    }
}

/// Registry of the variables of one solve.
///
/// Maps `(ess_id, phase, kind)` to a column index. Indices are contiguous from
/// `0` in registration order and never change for the lifetime of the
/// instance, which makes simplex tie-breaking reproducible between cycles.
/// Built fresh every cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coefficients {
    entries: Vec<Coefficient>,
}

impl Coefficients {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `All` variable per device and power kind
    pub fn symmetric<I, S>(ess_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut coefficients = Self::new();
        for ess_id in ess_ids {
            coefficients.add_symmetric(ess_id.as_ref());
        }
        coefficients
    }

    /// Per device: P L1, Q L1, P L2, Q L2, P L3, Q L3
    pub fn asymmetric<I, S>(ess_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut coefficients = Self::new();
        for ess_id in ess_ids {
            coefficients.add_asymmetric(ess_id.as_ref());
        }
        coefficients
    }

    /// Every triple that appears in at least one term, in order of appearance
    pub fn from_constraints(constraints: &[Constraint]) -> Self {
        let mut coefficients = Self::new();
        for term in constraints.iter().flat_map(Constraint::terms) {
            coefficients.add(&term.ess_id, term.phase, term.kind);
        }
        coefficients
    }

    pub fn add_symmetric(&mut self, ess_id: &str) {
        self.add(ess_id, Phase::All, PowerKind::Active);
        self.add(ess_id, Phase::All, PowerKind::Reactive);
    }

    pub fn add_asymmetric(&mut self, ess_id: &str) {
        for (phase, kind) in iproduct!(Phase::CONCRETE, [PowerKind::Active, PowerKind::Reactive]) {
            self.add(ess_id, phase, kind);
        }
    }

    /// Register a variable; returns the existing index if already present
    pub fn add(&mut self, ess_id: &str, phase: Phase, kind: PowerKind) -> usize {
        if let Some(index) = self.position(ess_id, phase, kind) {
            return index;
        }
        self.entries.push(Coefficient {
            ess_id: ess_id.to_string(),
            phase,
            kind,
        });
        self.entries.len() - 1
    }

    /// Drop every variable of a device. Indices of the remaining variables are
    /// compacted, keeping their relative order.
    pub fn remove_ess(&mut self, ess_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|c| c.ess_id != ess_id);
        self.entries.len() != before
    }

    /// Index of a registered variable
    pub fn of(&self, ess_id: &str, phase: Phase, kind: PowerKind) -> Result<usize, DomainError> {
        self.position(ess_id, phase, kind)
            .ok_or_else(|| DomainError::unknown(ess_id, phase, kind))
    }

    pub fn contains(&self, ess_id: &str, phase: Phase, kind: PowerKind) -> bool {
        self.position(ess_id, phase, kind).is_some()
    }

    /// Indices a `(device, phase, kind)` reference stands for.
    ///
    /// A registered triple resolves to itself. An unregistered `All` resolves
    /// to the three concrete phases, all of which must be registered.
    pub fn resolve(&self, ess_id: &str, phase: Phase, kind: PowerKind) -> Result<Vec<usize>, DomainError> {
        if let Some(index) = self.position(ess_id, phase, kind) {
            return Ok(vec![index]);
        }
        if !phase.is_all() {
            return Err(DomainError::unknown(ess_id, phase, kind));
        }
        Phase::CONCRETE
            .iter()
            .map(|&p| self.position(ess_id, p, kind))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| DomainError::unknown(ess_id, phase, kind))
    }

    /// Total number of variables `n`
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Coefficient> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Coefficient)> {
        self.entries.iter().enumerate()
    }

    /// Indices of all variables of one power kind
    pub fn indices_of_kind(&self, kind: PowerKind) -> Vec<usize> {
        self.iter()
            .filter(|(_, c)| c.kind == kind)
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of all variables of one device and power kind
    pub fn indices_of_ess(&self, ess_id: &str, kind: PowerKind) -> Vec<usize> {
        self.iter()
            .filter(|(_, c)| c.ess_id == ess_id && c.kind == kind)
            .map(|(i, _)| i)
            .collect()
    }

    /// Registered devices in order of first registration
    pub fn ess_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !ids.contains(&entry.ess_id.as_str()) {
                ids.push(&entry.ess_id);
            }
        }
        ids
    }

    fn position(&self, ess_id: &str, phase: Phase, kind: PowerKind) -> Option<usize> {
        self.entries.iter().position(|c| c.matches(ess_id, phase, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::types::Relationship;

    #[test]
    fn test_indices_are_stable_and_contiguous() {
        let coefficients = Coefficients::asymmetric(["ess0", "ess1"]);
        assert_eq!(coefficients.count(), 12);

        let mut seen: Vec<usize> = coefficients
            .iter()
            .map(|(_, c)| coefficients.of(&c.ess_id, c.phase, c.kind).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..12).collect::<Vec<_>>());

        let first = coefficients.of("ess1", Phase::L2, PowerKind::Reactive).unwrap();
        let second = coefficients.of("ess1", Phase::L2, PowerKind::Reactive).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, 9);
    }

    #[test]
    fn test_add_deduplicates() {
        let mut coefficients = Coefficients::new();
        let a = coefficients.add("ess0", Phase::All, PowerKind::Active);
        let b = coefficients.add("ess0", Phase::All, PowerKind::Active);
        assert_eq!(a, b);
        assert_eq!(coefficients.count(), 1);
    }

    #[test]
    fn test_unknown_variable() {
        let coefficients = Coefficients::symmetric(["ess0"]);
        let error = coefficients.of("ess9", Phase::All, PowerKind::Active).unwrap_err();
        assert!(matches!(error, DomainError::UnknownVariable { ref ess_id, .. } if ess_id == "ess9"));
    }

    #[test]
    fn test_resolve_all_on_asymmetric_device() {
        let coefficients = Coefficients::asymmetric(["ess0"]);
        let indices = coefficients.resolve("ess0", Phase::All, PowerKind::Active).unwrap();
        assert_eq!(indices, vec![0, 2, 4]);

        let symmetric = Coefficients::symmetric(["ess0"]);
        assert_eq!(symmetric.resolve("ess0", Phase::All, PowerKind::Reactive).unwrap(), vec![1]);
        assert!(symmetric.resolve("ess0", Phase::L1, PowerKind::Active).is_err());
    }

    #[test]
    fn test_from_constraints_keeps_order_of_appearance() {
        let constraints = vec![
            Constraint::simple("a", "ess1", Phase::All, PowerKind::Active, Relationship::LessOrEquals, 1.0).unwrap(),
            Constraint::simple("b", "ess0", Phase::All, PowerKind::Active, Relationship::LessOrEquals, 1.0).unwrap(),
            Constraint::simple("c", "ess1", Phase::All, PowerKind::Active, Relationship::GreaterOrEquals, 0.0).unwrap(),
        ];
        let coefficients = Coefficients::from_constraints(&constraints);
        assert_eq!(coefficients.count(), 2);
        assert_eq!(coefficients.ess_ids(), vec!["ess1", "ess0"]);
    }

    #[test]
    fn test_remove_ess_compacts_indices() {
        let mut coefficients = Coefficients::symmetric(["ess0", "ess1", "ess2"]);
        assert!(coefficients.remove_ess("ess1"));
        assert!(!coefficients.remove_ess("ess1"));
        assert_eq!(coefficients.count(), 4);
        assert_eq!(coefficients.of("ess2", Phase::All, PowerKind::Active).unwrap(), 2);
        assert_eq!(coefficients.ess_ids(), vec!["ess0", "ess2"]);
    }

    #[test]
    fn test_indices_by_kind() {
        let coefficients = Coefficients::symmetric(["ess0", "ess1"]);
        assert_eq!(coefficients.indices_of_kind(PowerKind::Active), vec![0, 2]);
        assert_eq!(coefficients.indices_of_ess("ess1", PowerKind::Reactive), vec![3]);
    }
}
