use anyhow::Result;
use ess_power_solver::{config, controller, telemetry};
use config::Config;
use controller::CycleController;
use telemetry::{init_tracing, shutdown_signal};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::load()?;

    if cfg.ess.is_empty() {
        warn!("no ess configured; every cycle will be empty");
    }
    info!(
        ess_count = cfg.ess.len(),
        cycle_time_ms = cfg.cycle.cycle_time_ms,
        "starting ESS power cycle"
    );

    let mut controller = CycleController::new(cfg)?;

    tokio::select! {
        result = controller.run() => result?,
        _ = shutdown_signal() => {},
    }

    warn!("shutdown complete");
    Ok(())
}
