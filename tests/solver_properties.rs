//! Property tests for the constraint solver.

use ess_power_solver::power::{
    linearize_all, Constraint, ConstraintSolver, Coefficients, GoalType, LinearConstraint,
    LinearConstraintsSolver, Phase, PowerKind, Relationship,
};
use proptest::prelude::*;

const TOLERANCE: f64 = 1e-6;

fn relationship() -> impl Strategy<Value = Relationship> {
    prop_oneof![
        Just(Relationship::Equals),
        Just(Relationship::LessOrEquals),
        Just(Relationship::GreaterOrEquals),
    ]
}

/// Rows built around a known point so the system is always satisfiable
fn feasible_system(n: usize) -> impl Strategy<Value = Vec<LinearConstraint>> {
    let point = prop::collection::vec(-1000i32..=1000, n);
    let rows = prop::collection::vec(
        (prop::collection::vec(-5i32..=5, n), relationship(), 0i32..=500),
        1..8,
    );
    (point, rows).prop_map(|(point, rows)| {
        rows.into_iter()
            .map(|(factors, relationship, slack)| {
                let coefficients: Vec<f64> = factors.into_iter().map(f64::from).collect();
                let lhs: f64 = coefficients.iter().zip(&point).map(|(a, &x)| a * f64::from(x)).sum();
                let value = match relationship {
                    Relationship::Equals => lhs,
                    Relationship::LessOrEquals => lhs + f64::from(slack),
                    Relationship::GreaterOrEquals => lhs - f64::from(slack),
                };
                LinearConstraint::new(coefficients, relationship, value)
            })
            .collect()
    })
}

fn bound(ess_id: &str, phase: Phase, relationship: Relationship, value: f64) -> Constraint {
    Constraint::simple("bound", ess_id, phase, PowerKind::Active, relationship, value).unwrap()
}

proptest! {
    #[test]
    fn solution_satisfies_every_row(rows in feasible_system(4)) {
        let point = LinearConstraintsSolver::default().solve(4, &rows).unwrap();
        prop_assert_eq!(point.len(), 4);
        for row in &rows {
            prop_assert!(
                row.is_satisfied_by(&point, TOLERANCE),
                "row {:?} violated at {:?}",
                row,
                point
            );
        }
    }

    #[test]
    fn repeated_solves_are_identical(rows in feasible_system(3)) {
        let solver = LinearConstraintsSolver::default();
        let first = solver.solve(3, &rows).unwrap();
        let second = solver.solve(3, &rows).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn loosening_upper_bound_never_lowers_maximum(
        lower in -5000i32..=0,
        tight in 0i32..=5000,
        extra in 0i32..=5000,
    ) {
        let coefficients = Coefficients::symmetric(["ess0"]);
        let solver = ConstraintSolver::default();
        let maximum = |upper: f64| {
            let constraints = [
                bound("ess0", Phase::All, Relationship::GreaterOrEquals, f64::from(lower)),
                bound("ess0", Phase::All, Relationship::LessOrEquals, upper),
            ];
            solver
                .calculate_power_extrema(&coefficients, &constraints, "ess0", Phase::All, PowerKind::Active, GoalType::Maximize)
                .unwrap()
        };
        let tight_max = maximum(f64::from(tight));
        let loose_max = maximum(f64::from(tight + extra));
        prop_assert!(tight_max <= loose_max + TOLERANCE);
        prop_assert!((tight_max - f64::from(tight)).abs() < TOLERANCE);
    }

    #[test]
    fn all_phase_constraint_equals_three_phase_constraints(
        upper in 0i32..=5000,
        lower in -5000i32..=0,
    ) {
        let coefficients = Coefficients::asymmetric(["ess0"]);
        let expanded = [
            bound("ess0", Phase::All, Relationship::LessOrEquals, f64::from(upper)),
            bound("ess0", Phase::All, Relationship::GreaterOrEquals, f64::from(lower)),
        ];
        // same row order as the expansion: every upper bound, then every lower bound
        let explicit: Vec<Constraint> = [
            (Relationship::LessOrEquals, f64::from(upper)),
            (Relationship::GreaterOrEquals, f64::from(lower)),
        ]
        .into_iter()
        .flat_map(|(relationship, value)| {
            Phase::CONCRETE
                .iter()
                .map(move |&phase| bound("ess0", phase, relationship, value))
        })
        .collect();

        let expanded_rows = linearize_all(&coefficients, &expanded).unwrap();
        let explicit_rows = linearize_all(&coefficients, &explicit).unwrap();
        prop_assert_eq!(expanded_rows, explicit_rows);

        let solver = ConstraintSolver::default();
        let a = solver.solve(&coefficients, &expanded).unwrap();
        let b = solver.solve(&coefficients, &explicit).unwrap();
        prop_assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            prop_assert!((x - y).abs() < TOLERANCE);
        }

        for goal in [GoalType::Maximize, GoalType::Minimize] {
            let a = solver
                .calculate_power_extrema(&coefficients, &expanded, "ess0", Phase::All, PowerKind::Active, goal)
                .unwrap();
            let b = solver
                .calculate_power_extrema(&coefficients, &explicit, "ess0", Phase::All, PowerKind::Active, goal)
                .unwrap();
            prop_assert!((a - b).abs() < TOLERANCE);
        }
    }
}
