// crates/mtp-sim-monitor/src/sink.rs

use crate::model::MonitorMessage;
use mtp_sim::{SinkError, ValueChange, ValueSink};
use tokio::sync::broadcast;

/// Forwards every value change to the WebSocket broadcast channel.
///
/// `send` never blocks, so the sink is safe to call from the tick thread.
/// Having no connected client is not an error.
pub struct BroadcastSink {
    tx: broadcast::Sender<MonitorMessage>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<MonitorMessage>) -> Self {
        Self { tx }
    }
}

impl ValueSink for BroadcastSink {
    fn name(&self) -> &str {
        "web-monitor"
    }

    fn on_value_changed(&self, change: &ValueChange) -> Result<(), SinkError> {
        // Err only means nobody is listening right now.
        let _ = self.tx.send(MonitorMessage::from(change));
        Ok(())
    }
}
