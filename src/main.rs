use std::error::Error;

use handoff_list::scenario::{self, ScenarioConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ScenarioConfig::from_env()?;
    info!(?config, "configuration loaded");
    let report = scenario::run(&config);
    info!(
        passes = report.passes,
        removed = report.removed.len(),
        "scenario finished"
    );
    Ok(())
}
