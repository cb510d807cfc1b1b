use anyhow::Context;
use std::path::PathBuf;
use tether_demo::config::{DemoConfig, load_config};
use tether_demo::run_scenario;
use tether_dispatch::Dispatcher;
use tether_logger::Logger;
use tracing::info;

const DEFAULT_CONFIG: &str = "demo.toml";

fn main() -> anyhow::Result<()> {
    let path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from);

    let cfg: DemoConfig =
        load_config(Some(&path)).context("Critical: Configuration is malformed")?;

    let _log = Logger::init(&cfg.logger)?;
    info!(path = %path.display(), "Configuration loaded");

    let dispatcher =
        Dispatcher::with_config(cfg.dispatcher).context("Invalid dispatcher settings")?;
    let received = run_scenario(&dispatcher)?;

    info!(?received, "Scenario finished");
    Ok(())
}
