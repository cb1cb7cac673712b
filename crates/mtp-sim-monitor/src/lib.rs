// crates/mtp-sim-monitor/src/lib.rs

//! Browser front-end for a running [`Simulator`].
//!
//! Every resolved value is forwarded to connected WebSocket clients through a
//! [`BroadcastSink`] subscribed to the simulator's fan-out. The REST side reads
//! the variable snapshot, accepts writes and loads uploaded descriptors.

use mtp_sim::Simulator;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub mod model;
mod server;
mod sink;

pub use sink::BroadcastSink;

/// Port the monitor listens on when none is configured.
pub const DEFAULT_PORT: u16 = 5288;

/// Capacity of the event channel feeding WebSocket clients. Slow clients skip
/// the oldest events rather than holding back the tick loop.
pub const EVENT_CAPACITY: usize = 1024;

/// Binds `addr` and serves the monitor until the server fails.
///
/// A bind failure is returned to the caller.
pub async fn start_monitor(addr: SocketAddr, simulator: Arc<Simulator>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, simulator).await
}

/// Serves the monitor on an already bound listener.
pub async fn serve(listener: TcpListener, simulator: Arc<Simulator>) -> std::io::Result<()> {
    server::run(listener, simulator).await
}
