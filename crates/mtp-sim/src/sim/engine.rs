// crates/mtp-sim/src/sim/engine.rs

//! The background tick loop.
//!
//! `initialize` registers every numeric variable of a tree; `start` spawns a
//! dedicated thread that, once per interval, generates a value for each
//! registered key and hands it to a [`TickHandler`]. The wait between ticks is a
//! `recv_timeout` on the stop channel, so a stop request is seen mid-wait.

use super::config::SimulationConfig;
use super::generator::{add_noise, next_sine};
use super::{SINE_AMPLITUDE, SINE_PERIOD_SECONDS};
use crate::error::SimError;
use crate::fanout::panic_message;
use crate::identity::CanonicalKey;
use crate::log::{TagContext, sim_debug, sim_error, sim_info, sim_warn};
use crate::node::Node;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lower bound for how long `stop` waits for the loop to exit.
const MIN_STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Receives every generated value.
pub trait TickHandler: Send + Sync {
    fn on_generated(&self, key: &CanonicalKey, generated: f64) -> Result<(), SimError>;
}

type ValueTable = Arc<Mutex<BTreeMap<CanonicalKey, f64>>>;

fn lock(values: &ValueTable) -> MutexGuard<'_, BTreeMap<CanonicalKey, f64>> {
    values.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Channels and thread of one running loop.
struct RunHandle {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    thread: JoinHandle<()>,
}

/// Generates synthetic values for all numeric tags of the loaded tree.
///
/// States: idle and running. `start` while running restarts the loop;
/// `stop` while idle does nothing.
pub struct SimulationEngine {
    config: SimulationConfig,
    handler: Arc<dyn TickHandler>,
    values: ValueTable,
    run: Mutex<Option<RunHandle>>,
}

impl SimulationEngine {
    pub fn with_handler(config: SimulationConfig, handler: Arc<dyn TickHandler>) -> Self {
        Self {
            config,
            handler,
            values: Arc::new(Mutex::new(BTreeMap::new())),
            run: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Registers every numeric variable of `root` with an initial value of 0.0,
    /// replacing the previous registration set. Returns the number of keys.
    ///
    /// Safe to call while running; the next tick uses the new set.
    pub fn initialize(&self, root: &Node) -> usize {
        let mut fresh = BTreeMap::new();
        for node in root.variables() {
            if !node.resolved_data_type().is_numeric() {
                continue;
            }
            match node.canonical_key() {
                Some(key) => {
                    fresh.insert(key, 0.0);
                }
                None => sim_debug!(
                    "[Engine] Skipping variable without identity (browse name '{}')",
                    node.browse_name
                ),
            }
        }
        let count = fresh.len();
        *lock(&self.values) = fresh;
        sim_info!("[Engine] Registered {} numeric tag(s)", count);
        count
    }

    pub fn registered_keys(&self) -> Vec<CanonicalKey> {
        lock(&self.values).keys().cloned().collect()
    }

    /// The last generated value of `key`.
    pub fn value(&self, key: &CanonicalKey) -> Option<f64> {
        lock(&self.values).get(key).copied()
    }

    pub fn is_running(&self) -> bool {
        self.run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.thread.is_finished())
    }

    /// Starts the tick loop. A loop that is already running is stopped first.
    pub fn start(&self) {
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = run.take() {
            sim_info!("[Engine] Restarting tick loop");
            self.shutdown(handle);
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let values = Arc::clone(&self.values);
        let handler = Arc::clone(&self.handler);
        let interval = self.config.update_interval();
        let noise = self.config.noise();

        let thread = thread::spawn(move || {
            run_loop(&values, handler.as_ref(), interval, noise, &stop_rx);
            let _ = done_tx.send(());
        });

        sim_info!("[Engine] Tick loop started ({:?} interval)", interval);
        *run = Some(RunHandle {
            stop_tx,
            done_rx,
            thread,
        });
    }

    /// Stops the tick loop, waiting a bounded time for it to exit.
    ///
    /// If the loop does not exit in time it is detached and the engine is
    /// considered stopped anyway.
    pub fn stop(&self) {
        let handle = self
            .run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            self.shutdown(handle);
        }
    }

    fn shutdown(&self, handle: RunHandle) {
        let _ = handle.stop_tx.try_send(());
        let timeout = self.config.update_interval().max(MIN_STOP_TIMEOUT);
        match handle.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.thread.join().is_err() {
                    sim_warn!("[Engine] Tick thread terminated by a panic");
                }
                sim_info!("[Engine] Tick loop stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                sim_warn!(
                    "[Engine] Tick loop did not stop within {:?}; detaching it",
                    timeout
                );
            }
        }
    }
}

impl Drop for SimulationEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    values: &ValueTable,
    handler: &dyn TickHandler,
    interval: Duration,
    noise: f64,
    stop_rx: &Receiver<()>,
) {
    let started = Instant::now();
    let mut rng = StdRng::from_entropy();
    loop {
        let t = started.elapsed().as_secs_f64();
        tick(values, handler, t, noise, &mut rng, stop_rx);

        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// One pass over all registered keys. Returns the number of values emitted.
fn tick(
    values: &ValueTable,
    handler: &dyn TickHandler,
    t: f64,
    noise: f64,
    rng: &mut StdRng,
    stop_rx: &Receiver<()>,
) -> usize {
    let keys: Vec<CanonicalKey> = lock(values).keys().cloned().collect();
    let mut emitted = 0;

    for key in keys {
        // Leave the rest of the pass to the next start if a stop is pending.
        if !stop_rx.is_empty() {
            break;
        }
        let ctx = TagContext {
            component: "Engine",
            key: key.as_str(),
        };

        let generated = add_noise(next_sine(t, SINE_AMPLITUDE, SINE_PERIOD_SECONDS), noise, rng);
        if !generated.is_finite() {
            sim_error!(ctx, "Generated a non-finite value, skipping this tick");
            continue;
        }

        match lock(values).get_mut(&key) {
            Some(slot) => *slot = generated,
            // Unregistered by a reload during this pass.
            None => continue,
        }

        match panic::catch_unwind(AssertUnwindSafe(|| handler.on_generated(&key, generated))) {
            Ok(Ok(())) => emitted += 1,
            Ok(Err(e)) => sim_error!(ctx, "Failed to emit generated value: {}", e),
            Err(payload) => sim_error!(
                ctx,
                "Handler panicked: {}",
                panic_message(payload.as_ref())
            ),
        }
    }
    emitted
}
