use clap::Parser;
use heatpump_bridge::config::{self, Config};
use heatpump_bridge::coordinator::{Coordinator, UpdateLoop};
use heatpump_bridge::entity::setup_entities;
use heatpump_bridge::source::SimulatedHeatPump;
use heatpump_bridge::source::simulation::run_drift_simulation;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[derive(Parser)]
#[command(name = "heatpump-bridge")]
#[command(about = "Expose heat pump coils as home automation entities")]
struct Cli {
    /// JSON config file (defaults to the user config directory if present)
    #[arg(long, env = "NIBE_CONFIG")]
    config: Option<PathBuf>,

    /// Create entities for every coil, not only the ones enabled by default
    #[arg(long)]
    all_entities: bool,

    /// Seconds between entity state reports
    #[arg(long, default_value_t = 30)]
    report_every: u64,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn load_config(cli: &Cli) -> heatpump_bridge::error::Result<Config> {
    let path = cli
        .config
        .clone()
        .or_else(|| config::default_config_path().filter(|p| p.exists()));

    let config = match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Config::from_file(&path)?.with_env_overrides()
        }
        None => Config::from_env(),
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    config::load_dotenv();
    init_logger();
    let cli = Cli::parse();
    info!("Starting heat pump bridge");

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration loaded:");
    info!("  Model: {}", config.gateway.model);
    info!(
        "  Gateway: {} (read {}, write {}, listen {})",
        config.gateway.ip_address,
        config.gateway.remote_read_port,
        config.gateway.remote_write_port,
        config.gateway.listening_port
    );
    info!(
        "  Update interval: {}s",
        config.coordinator.update_interval_secs
    );

    // No wire transport ships with the bridge; drive a simulated pump instead
    let pump = Arc::new(SimulatedHeatPump::new(config.gateway.model));
    let coordinator = Arc::new(Coordinator::new(
        &config.coordinator,
        config.gateway.model,
        pump.clone(),
    ));

    if let Err(e) = coordinator.start().await {
        error!("Failed to start coordinator: {}", e);
        std::process::exit(1);
    }

    let entities = setup_entities(&coordinator, pump.coils(), cli.all_entities);
    let drift_task = run_drift_simulation(pump.clone(), Duration::from_secs(20));
    let update_task =
        UpdateLoop::new(coordinator.clone(), config.coordinator.update_interval()).start();

    info!("Heat pump bridge is running");
    info!("  - {} entities registered", entities.len());
    info!("  - Press Ctrl+C to exit");

    let mut report = tokio::time::interval(Duration::from_secs(cli.report_every.max(1)));
    loop {
        tokio::select! {
            _ = report.tick() => {
                for entity in &entities {
                    match (entity.available(), entity.value()) {
                        (true, Some(value)) => info!(
                            "  {} = {}{}",
                            entity.entity_id(),
                            value,
                            entity.coil().unit.as_deref().unwrap_or("")
                        ),
                        _ => info!("  {} unavailable", entity.entity_id()),
                    }
                }
            }
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received shutdown signal"),
                    Err(e) => error!("Failed to listen for shutdown signal: {}", e),
                }
                break;
            }
        }
    }

    drift_task.abort();
    coordinator.shutdown().await;
    if let Err(e) = update_task.await {
        error!("Update loop ended abnormally: {}", e);
    }
    drop(entities);

    info!("Heat pump bridge stopped");
}
