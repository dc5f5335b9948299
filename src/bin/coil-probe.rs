//! Development tool for poking at coils through the coordinator.
//!
//! Usage:
//!   cargo run --bin coil-probe -- list
//!   cargo run --bin coil-probe -- read 40004 43416
//!   cargo run --bin coil-probe -- write 47011 -2
//!
//! Runs against the simulated heat pump for the configured model and prints
//! results as JSON.

use clap::{Parser, Subcommand};
use heatpump_bridge::config::{self, Config, CoordinatorConfig};
use heatpump_bridge::coordinator::{Coordinator, ListenerHandle};
use heatpump_bridge::device::HeatPumpModel;
use heatpump_bridge::source::coils::{coil_database, find_coil};
use heatpump_bridge::source::{CoilValue, SimulatedHeatPump};
use log::{error, info};
use serde::Serialize;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "coil-probe")]
#[command(about = "Read and write heat pump coils")]
struct Cli {
    /// Heat pump model
    #[arg(long, env = "NIBE_MODEL")]
    model: Option<HeatPumpModel>,

    /// Read attempts per coil
    #[arg(long, env = "NIBE_READ_RETRIES")]
    retries: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the coils known for the model
    List,
    /// Read coils by address or name in one refresh cycle
    Read {
        #[arg(required = true)]
        coils: Vec<String>,
    },
    /// Write a value to a coil and print the acknowledged value
    Write { coil: String, value: String },
}

#[derive(Serialize)]
struct ReadOutput {
    address: u16,
    name: String,
    value: Option<CoilValue>,
    unit: Option<String>,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to encode output: {}", e),
    }
}

#[tokio::main]
async fn main() {
    config::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let base = Config::from_env();
    let model = cli.model.unwrap_or(base.gateway.model);
    let coordinator_config = CoordinatorConfig {
        read_retries: cli.retries.unwrap_or(base.coordinator.read_retries),
        ..base.coordinator
    };

    let pump = Arc::new(SimulatedHeatPump::new(model));
    let coordinator = Coordinator::new(&coordinator_config, model, pump);
    if let Err(e) = coordinator.start().await {
        error!("{}", e);
        std::process::exit(1);
    }

    let code = match cli.command {
        Commands::List => {
            print_json(&coil_database(model));
            0
        }
        Commands::Read { coils } => read(&coordinator, model, &coils).await,
        Commands::Write { coil, value } => write(&coordinator, model, &coil, &value).await,
    };

    coordinator.shutdown().await;
    std::process::exit(code);
}

async fn read(coordinator: &Coordinator, model: HeatPumpModel, keys: &[String]) -> i32 {
    let mut coils = Vec::new();
    for key in keys {
        match find_coil(model, key) {
            Some(coil) => coils.push(coil),
            None => {
                error!("Unknown coil for {}: {}", model, key);
                return 2;
            }
        }
    }

    let handle = ListenerHandle::new();
    coordinator.register(handle, coils.iter().map(|c| c.address), Arc::new(|| {}));

    if let Err(e) = coordinator.refresh().await {
        error!("{}", e);
        return 1;
    }
    coordinator.deregister(handle);

    let output: Vec<ReadOutput> = coils
        .into_iter()
        .map(|coil| ReadOutput {
            address: coil.address,
            value: coordinator.value(coil.address),
            name: coil.name,
            unit: coil.unit,
        })
        .collect();
    print_json(&output);
    0
}

async fn write(coordinator: &Coordinator, model: HeatPumpModel, key: &str, raw: &str) -> i32 {
    let Some(coil) = find_coil(model, key) else {
        error!("Unknown coil for {}: {}", model, key);
        return 2;
    };

    match coordinator.write(coil.address, CoilValue::parse(raw)).await {
        Ok(acknowledged) => {
            info!("Coil {} acknowledged {}", coil.address, acknowledged);
            print_json(&ReadOutput {
                address: coil.address,
                name: coil.name,
                value: Some(acknowledged),
                unit: coil.unit,
            });
            0
        }
        Err(e) => {
            error!("{}", e);
            1
        }
    }
}
