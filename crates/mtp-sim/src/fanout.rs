// crates/mtp-sim/src/fanout.rs

//! Distribution of resolved value changes to any number of sinks.
//!
//! Delivery is best-effort and at-most-once per sink. A sink that fails or panics
//! is logged and skipped; the remaining sinks and the emitting tick or write are
//! unaffected.

use crate::error::SinkError;
use crate::log::{TagContext, sim_debug, sim_trace, sim_warn};
use log::Level;
use crate::value::ValueChange;
use crossbeam_channel::{Sender, TrySendError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// A consumer of resolved value changes.
pub trait ValueSink: Send + Sync {
    /// A short name used in log lines.
    fn name(&self) -> &str {
        "sink"
    }

    /// Handles one change. Errors are logged by the fan-out and never propagated.
    fn on_value_changed(&self, change: &ValueChange) -> Result<(), SinkError>;
}

/// Closures can be subscribed directly.
impl<F> ValueSink for F
where
    F: Fn(&ValueChange) -> Result<(), SinkError> + Send + Sync,
{
    fn on_value_changed(&self, change: &ValueChange) -> Result<(), SinkError> {
        self(change)
    }
}

/// Forwards changes into a crossbeam channel without ever blocking the emitter.
///
/// With a bounded channel, changes are dropped (and reported as [`SinkError::Full`])
/// while the consumer is behind.
pub struct ChannelSink {
    name: String,
    tx: Sender<ValueChange>,
}

impl ChannelSink {
    pub fn new(name: impl Into<String>, tx: Sender<ValueChange>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }
}

impl ValueSink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_value_changed(&self, change: &ValueChange) -> Result<(), SinkError> {
        self.tx.try_send(change.clone()).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Disconnected(_) => SinkError::Disconnected,
        })
    }
}

/// Handle returned by [`ChangeFanOut::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    sink: Arc<dyn ValueSink>,
}

/// The subscriber list and notification entry point.
#[derive(Default)]
pub struct ChangeFanOut {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl ChangeFanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, sink: Arc<dyn ValueSink>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        log::debug!("[FanOut] Subscribed sink '{}' as {:?}", sink.name(), id);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { id, sink });
        id
    }

    /// Removes a subscription. Returns false if it was not (or no longer) registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Delivers `change` to every subscribed sink and returns how many accepted it.
    ///
    /// The subscriber list is snapshotted first, so sinks may subscribe or
    /// unsubscribe (even from inside a callback) while a pass is in flight.
    pub fn notify(&self, change: &ValueChange) -> usize {
        let sinks: Vec<Arc<dyn ValueSink>> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| Arc::clone(&s.sink))
            .collect();

        let ctx = TagContext {
            component: "FanOut",
            key: change.key.as_str(),
        };
        let mut delivered = 0;
        for sink in sinks {
            match deliver(sink.as_ref(), change) {
                Ok(()) => delivered += 1,
                Err(e) if failure_level(&e) == Level::Debug => {
                    sim_debug!(ctx, "Sink '{}' skipped: {}", sink.name(), e)
                }
                Err(e) => sim_warn!(ctx, "Sink '{}' failed: {}", sink.name(), e),
            }
        }
        sim_trace!(ctx, "Delivered {} = {} to {} sink(s)", change.key, change.value, delivered);
        delivered
    }
}

/// Level at which a delivery failure is logged. A sink that simply has no
/// variable for the key is routine; everything else is a warning.
fn failure_level(error: &SinkError) -> Level {
    match error {
        SinkError::UnknownKey(_) => Level::Debug,
        _ => Level::Warn,
    }
}

fn deliver(sink: &dyn ValueSink, change: &ValueChange) -> Result<(), SinkError> {
    panic::catch_unwind(AssertUnwindSafe(|| sink.on_value_changed(change)))
        .unwrap_or_else(|payload| Err(SinkError::Panicked(panic_message(payload.as_ref()))))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
