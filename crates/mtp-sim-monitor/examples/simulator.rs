//! Runs the simulator with the web monitor.
//!
//! The tick loop runs on its own OS thread inside the simulator; the web server
//! runs on the tokio runtime and receives values through the broadcast sink.
//!
//! Usage: `cargo run -p mtp-sim-monitor --example simulator -- [descriptor.aml|.mtp]`
//! The monitor port can be set with `MTP_MONITOR_PORT` (default 5288).

use log::{error, info};
use mtp_sim::sim::config::DEFAULT_CONFIG_FILE;
use mtp_sim::store::DEFAULT_DB_FILE;
use mtp_sim::{SimulationConfig, Simulator, SqliteStore};
use mtp_sim_monitor::{DEFAULT_PORT, start_monitor};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::{env, process};

#[tokio::main]
async fn main() {
    env_logger::try_init().ok();

    // 1. Configuration and durable overrides.
    let config = SimulationConfig::load_or_default(DEFAULT_CONFIG_FILE);
    let store = match SqliteStore::open(DEFAULT_DB_FILE) {
        Ok(store) => store,
        Err(e) => {
            error!("Could not open value store {}: {}", DEFAULT_DB_FILE, e);
            process::exit(1);
        }
    };
    let simulator = Arc::new(Simulator::new(config, Arc::new(store)));

    // 2. Optional descriptor from the command line. More can be uploaded later.
    if let Some(path) = env::args().nth(1) {
        match mtp_sim_aml::parse_file(&path).map(|root| simulator.load_nodes(root)) {
            Ok(Ok(root)) => info!("Loaded {} variable(s) from {}", root.variable_count(), path),
            Ok(Err(e)) => error!("Descriptor {} rejected: {}", path, e),
            Err(e) => error!("Could not parse {}: {}", path, e),
        }
    }
    simulator.start();

    // 3. Serve until Ctrl-C.
    let port = env::var("MTP_MONITOR_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));

    tokio::select! {
        result = start_monitor(addr, Arc::clone(&simulator)) => {
            if let Err(e) = result {
                error!("Web monitor failed on {}: {}", addr, e);
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    simulator.stop();
}
