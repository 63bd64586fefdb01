use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::power::{Constraint, ConstraintType, EssPower, PowerKind, PowerTuple, Relationship, Term};

/// Outcome of one control cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub min_active_power_w: f64,
    pub max_active_power_w: f64,
    /// Cluster set-point after clamping, if one was configured and accepted
    pub target_active_power_w: Option<f64>,
    pub tuples: BTreeMap<String, PowerTuple>,
}

/// Drives one [`EssPower`] book through periodic cycles.
///
/// Hardware limits from the configuration are static constraints; the
/// cluster set-point is re-added as a cycle constraint every cycle.
pub struct CycleController {
    cfg: Config,
    power: EssPower,
}

impl CycleController {
    pub fn new(cfg: Config) -> Result<Self> {
        let mut power = EssPower::new(cfg.solver);
        for ess in &cfg.ess {
            power.add_ess(&ess.id, ess.symmetric);
        }
        for ess in &cfg.ess {
            for constraint in ess.limit_constraints()? {
                power
                    .add_constraint_and_validate(ConstraintType::Static, constraint)
                    .with_context(|| format!("hardware limits of ess [{}] are inconsistent", ess.id))?;
            }
        }
        Ok(Self { cfg, power })
    }

    pub fn power(&self) -> &EssPower {
        &self.power
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut interval = tokio::time::interval(self.cfg.cycle.cycle_time());
        loop {
            interval.tick().await;
            if let Err(e) = self.run_cycle() {
                warn!(error = %e, "cycle failed");
            }
        }
    }

    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        self.power.clear_cycle_constraints();

        let min = self.power.min_active_power()?;
        let max = self.power.max_active_power()?;
        debug!(min_active_power_w = min, max_active_power_w = max, "cluster active power range");

        let target = match self.cfg.cycle.target_active_power_w {
            Some(requested) => self.add_cluster_target(requested.max(min).min(max))?,
            None => None,
        };

        let tuples = self.power.apply_power();
        for (ess_id, tuple) in &tuples {
            info!(
                ess_id = %ess_id,
                active_power_w = tuple.active_power(),
                reactive_power_var = tuple.reactive_power(),
                "apply power"
            );
        }

        Ok(CycleReport {
            min_active_power_w: min,
            max_active_power_w: max,
            target_active_power_w: target,
            tuples,
        })
    }

    /// Sum of the active power of every managed device equals `target`
    fn add_cluster_target(&mut self, target: f64) -> Result<Option<f64>> {
        let terms: Vec<Term> = self
            .power
            .coefficients()
            .iter()
            .filter(|(_, c)| c.kind == PowerKind::Active)
            .map(|(_, c)| Term::new(c.ess_id.clone(), c.phase, c.kind, 1.0))
            .collect();
        if terms.is_empty() {
            return Ok(None);
        }

        let constraint = Constraint::new("cluster active power target", terms, Relationship::Equals, target)?;
        match self.power.add_constraint_and_validate(ConstraintType::Cycle, constraint) {
            Ok(_) => Ok(Some(target)),
            Err(e) if e.is_infeasible() => {
                warn!(target_active_power_w = target, "cluster target rejected");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::{providers::{Format, Toml}, Figment};

    fn controller(target: Option<f64>) -> CycleController {
        let target = target
            .map(|t| format!("target_active_power_w = {:?}", t))
            .unwrap_or_default();
        let toml = format!(
            r#"
            [cycle]
            cycle_time_ms = 100
            {target}

            [[ess]]
            id = "ess0"
            allowed_charge_power_w = 3000
            allowed_discharge_power_w = 4000
            max_apparent_power_va = 5000

            [[ess]]
            id = "ess1"
            symmetric = false
            allowed_charge_power_w = 6000
            allowed_discharge_power_w = 6000
            max_apparent_power_va = 6000
            "#
        );
        let cfg = Config::from_figment(Figment::from(Toml::string(&toml))).unwrap();
        CycleController::new(cfg).unwrap()
    }

    #[test]
    fn test_cycle_without_target_rests_at_zero() {
        let report = controller(None).run_cycle().unwrap();
        assert!((report.max_active_power_w - 10_000.0).abs() < 1e-6);
        assert!((report.min_active_power_w + 9_000.0).abs() < 1e-6);
        assert_eq!(report.target_active_power_w, None);
        assert!(report.tuples.values().all(|t| *t == PowerTuple::default()));
    }

    #[test]
    fn test_target_is_distributed() {
        let report = controller(Some(7000.0)).run_cycle().unwrap();
        assert_eq!(report.target_active_power_w, Some(7000.0));
        let total: i32 = report.tuples.values().map(PowerTuple::active_power).sum();
        assert_eq!(total, 7000);
        assert!(report.tuples["ess0"].active_power() <= 4000);
        assert!(report.tuples["ess1"].active_power() <= 6000);
    }

    #[test]
    fn test_target_is_clamped_to_range() {
        let report = controller(Some(-50_000.0)).run_cycle().unwrap();
        assert_eq!(report.target_active_power_w, Some(-9000.0));
        assert_eq!(report.tuples["ess0"].active_power(), -3000);
        assert_eq!(report.tuples["ess1"].active_power(), -6000);
    }

    #[test]
    fn test_cycle_constraints_do_not_accumulate() {
        let mut controller = controller(Some(1000.0));
        controller.run_cycle().unwrap();
        controller.run_cycle().unwrap();
        assert_eq!(controller.power().constraints().len(), 9);
    }
}
