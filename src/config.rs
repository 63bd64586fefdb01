use anyhow::{ensure, Context, Result};
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::power::{Constraint, DomainError, Phase, PowerKind, Relationship, SolverSettings};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub cycle: CycleConfig,
    #[serde(default)]
    pub solver: SolverSettings,
    #[serde(default)]
    pub ess: Vec<EssConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CycleConfig {
    pub cycle_time_ms: u64,
    /// Cluster active power set-point, positive for discharge
    #[serde(default)]
    pub target_active_power_w: Option<f64>,
}

impl CycleConfig {
    pub fn cycle_time(&self) -> Duration {
        Duration::from_millis(self.cycle_time_ms.max(1))
    }
}

/// Hardware limits of one storage system
#[derive(Debug, Clone, Deserialize)]
pub struct EssConfig {
    pub id: String,
    #[serde(default = "default_symmetric")]
    pub symmetric: bool,
    pub allowed_charge_power_w: f64,
    pub allowed_discharge_power_w: f64,
    pub max_apparent_power_va: f64,
}

fn default_symmetric() -> bool {
    true
}

impl EssConfig {
    /// Box constraints derived from the configured limits.
    ///
    /// Active power ranges from `-allowed_charge_power_w` to
    /// `allowed_discharge_power_w`, both further capped by the apparent power.
    /// Reactive power is capped by the apparent power alone. Asymmetric
    /// devices carry a third of every limit on each phase.
    pub fn limit_constraints(&self) -> Result<Vec<Constraint>, DomainError> {
        let phases = if self.symmetric { 1.0 } else { 3.0 };
        let apparent = self.max_apparent_power_va / phases;
        let discharge = self.allowed_discharge_power_w.min(self.max_apparent_power_va) / phases;
        let charge = self.allowed_charge_power_w.min(self.max_apparent_power_va) / phases;
        let bounds = [
            ("max discharge", PowerKind::Active, Relationship::LessOrEquals, discharge),
            ("max charge", PowerKind::Active, Relationship::GreaterOrEquals, -charge),
            ("max reactive", PowerKind::Reactive, Relationship::LessOrEquals, apparent),
            ("min reactive", PowerKind::Reactive, Relationship::GreaterOrEquals, -apparent),
        ];
        bounds
            .into_iter()
            .map(|(label, kind, relationship, value)| {
                let description = format!("{}: {}", self.id, label);
                Constraint::simple(description, &self.id, Phase::All, kind, relationship, value)
            })
            .collect()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("EDGE__").split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Self = figment.extract().context("failed to read configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.cycle.cycle_time_ms > 0, "cycle.cycle_time_ms must be positive");
        ensure!(
            self.solver.epsilon > 0.0 && self.solver.cutoff >= 0.0,
            "solver.epsilon must be positive and solver.cutoff non-negative"
        );
        if let Some(target) = self.cycle.target_active_power_w {
            ensure!(target.is_finite(), "cycle.target_active_power_w must be finite");
        }

        let mut seen = HashSet::new();
        for ess in &self.ess {
            ensure!(!ess.id.is_empty(), "ess id must not be empty");
            ensure!(seen.insert(ess.id.as_str()), "duplicate ess id [{}]", ess.id);
            for (name, value) in [
                ("allowed_charge_power_w", ess.allowed_charge_power_w),
                ("allowed_discharge_power_w", ess.allowed_discharge_power_w),
                ("max_apparent_power_va", ess.max_apparent_power_va),
            ] {
                ensure!(
                    value.is_finite() && value >= 0.0,
                    "ess [{}]: {} must be a non-negative number, got {}",
                    ess.id,
                    name,
                    value
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [cycle]
        cycle_time_ms = 1000

        [[ess]]
        id = "ess0"
        allowed_charge_power_w = 4000
        allowed_discharge_power_w = 5000
        max_apparent_power_va = 4500

        [[ess]]
        id = "ess1"
        symmetric = false
        allowed_charge_power_w = 3000
        allowed_discharge_power_w = 3000
        max_apparent_power_va = 6000
    "#;

    fn parse(toml: &str) -> Result<Config> {
        Config::from_figment(Figment::from(Toml::string(toml)))
    }

    #[test]
    fn test_load_sample() {
        let cfg = parse(SAMPLE).unwrap();
        assert_eq!(cfg.cycle.cycle_time(), Duration::from_secs(1));
        assert_eq!(cfg.cycle.target_active_power_w, None);
        assert_eq!(cfg.solver, SolverSettings::default());
        assert_eq!(cfg.ess.len(), 2);
        assert!(cfg.ess[0].symmetric);
        assert!(!cfg.ess[1].symmetric);
    }

    #[test]
    fn test_solver_section_overrides_defaults() {
        let toml = format!("[solver]\nmax_iterations = 50\n{}", SAMPLE);
        let cfg = parse(&toml).unwrap();
        assert_eq!(cfg.solver.max_iterations, 50);
        assert_eq!(cfg.solver.epsilon, SolverSettings::default().epsilon);
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file("config/default.toml", SAMPLE)?;
            jail.set_env("EDGE__CYCLE__CYCLE_TIME_MS", "250");
            jail.set_env("EDGE__SOLVER__MAX_ITERATIONS", "500");
            let cfg = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(cfg.cycle.cycle_time_ms, 250);
            assert_eq!(cfg.solver.max_iterations, 500);
            assert_eq!(cfg.ess.len(), 2);
            Ok(())
        });
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let toml = SAMPLE.replace("\"ess1\"", "\"ess0\"");
        let error = parse(&toml).unwrap_err();
        assert!(error.to_string().contains("duplicate"));
    }

    #[test]
    fn test_rejects_negative_limits() {
        let toml = SAMPLE.replace("allowed_charge_power_w = 4000", "allowed_charge_power_w = -1");
        assert!(parse(&toml).is_err());
    }

    #[test]
    fn test_limit_constraints_capped_by_apparent_power() {
        let cfg = parse(SAMPLE).unwrap();
        let values: Vec<f64> = cfg.ess[0]
            .limit_constraints()
            .unwrap()
            .iter()
            .map(Constraint::value)
            .collect();
        assert_eq!(values, vec![4500.0, -4000.0, 4500.0, -4500.0]);
    }

    #[test]
    fn test_asymmetric_limits_are_per_phase() {
        let cfg = parse(SAMPLE).unwrap();
        let constraints = cfg.ess[1].limit_constraints().unwrap();
        assert_eq!(constraints[0].value(), 1000.0);
        assert_eq!(constraints[3].value(), -2000.0);
        assert!(constraints.iter().all(|c| c.terms()[0].phase == Phase::All));
    }
}
