// crates/mtp-sim/tests/harness/mod.rs

//! Shared helpers for the pipeline tests.

use mtp_sim::{
    ChangeOrigin, Node, OverrideStore, SimulationConfig, Simulator, SinkError, TagValue,
    ValueChange, ValueSink,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Records every change it is notified of.
#[derive(Default)]
pub struct RecordingSink {
    changes: Mutex<Vec<(Instant, ValueChange)>>,
}

impl RecordingSink {
    pub fn changes(&self) -> Vec<ValueChange> {
        self.changes
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Simulation-origin values published for `key`, oldest first.
    pub fn ticks_for(&self, key: &str) -> Vec<TagValue> {
        self.changes()
            .into_iter()
            .filter(|c| c.key.as_str() == key && c.origin == ChangeOrigin::Simulation)
            .map(|c| c.value)
            .collect()
    }

    /// Like [`Self::ticks_for`], with the instant each value was received.
    pub fn timed_ticks_for(&self, key: &str) -> Vec<(Instant, TagValue)> {
        self.changes
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| c.key.as_str() == key && c.origin == ChangeOrigin::Simulation)
            .map(|(at, c)| (*at, c.value.clone()))
            .collect()
    }

    /// Polls until `pred` holds or `timeout` elapses.
    pub fn wait_until(&self, timeout: Duration, pred: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if pred(self) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        pred(self)
    }

    pub fn clear(&self) {
        self.changes.lock().unwrap().clear();
    }
}

impl ValueSink for RecordingSink {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_value_changed(&self, change: &ValueChange) -> Result<(), SinkError> {
        self.changes
            .lock()
            .unwrap()
            .push((Instant::now(), change.clone()));
        Ok(())
    }
}

pub fn config(interval_ms: f64, noise: f64) -> SimulationConfig {
    SimulationConfig {
        update_interval_ms: interval_ms,
        noise_amplitude: noise,
        ..Default::default()
    }
}

/// One numeric tag `R0001` and one text tag `Mode`.
pub fn single_tag_tree() -> Node {
    Node::folder("MTP")
        .with_child(Node::variable("R0001", "xs:double").with_identifier("NS2|Double|R0001"))
        .with_child(Node::variable("Mode", "xs:string").with_identifier("Mode"))
}

pub fn simulator_with_recorder(
    config: SimulationConfig,
    store: Arc<dyn OverrideStore>,
) -> (Simulator, Arc<RecordingSink>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let sim = Simulator::new(config, store);
    let recorder = Arc::new(RecordingSink::default());
    sim.subscribe(recorder.clone());
    (sim, recorder)
}
