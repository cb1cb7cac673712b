// crates/mtp-sim/src/resolver.rs

//! Merge policy between generated values and stored overrides.
//!
//! - A generated value for key K is replaced by K's stored override when that
//!   override parses as a finite number.
//! - An external write always upserts the store (numeric or not) and is emitted as-is.
//!
//! Either way the resolved value is handed to the fan-out.

use crate::error::SimError;
use crate::fanout::ChangeFanOut;
use crate::identity::{CanonicalKey, normalize};
use crate::log::{TagContext, sim_debug, sim_warn};
use crate::sim::engine::TickHandler;
use crate::store::OverrideStore;
use crate::value::{ChangeOrigin, TagValue, ValueChange};
use std::sync::Arc;

pub struct Resolver {
    store: Arc<dyn OverrideStore>,
    fanout: Arc<ChangeFanOut>,
}

impl Resolver {
    pub fn new(store: Arc<dyn OverrideStore>, fanout: Arc<ChangeFanOut>) -> Self {
        Self { store, fanout }
    }

    pub fn store(&self) -> &Arc<dyn OverrideStore> {
        &self.store
    }

    /// The value to publish for a freshly generated `generated` on `key`.
    ///
    /// Store read failures are logged and the generated value wins.
    pub fn resolve_generated(&self, key: &CanonicalKey, generated: f64) -> TagValue {
        match self.store.try_get(key) {
            Ok(Some(text)) => match TagValue::parse_number(&text) {
                Some(stored) => TagValue::Number(stored),
                None => TagValue::Number(generated),
            },
            Ok(None) => TagValue::Number(generated),
            Err(e) => {
                let ctx = TagContext {
                    component: "Resolver",
                    key: key.as_str(),
                };
                sim_warn!(ctx, "Override lookup failed, using generated value: {}", e);
                TagValue::Number(generated)
            }
        }
    }

    /// Resolves and publishes one generated value.
    pub fn publish_generated(&self, key: &CanonicalKey, generated: f64) -> ValueChange {
        let value = self.resolve_generated(key, generated);
        let change = ValueChange::new(key.clone(), value, ChangeOrigin::Simulation);
        self.fanout.notify(&change);
        change
    }

    /// Write-request entry point: normalizes `raw_identifier`, persists the value
    /// and publishes it.
    ///
    /// A store failure is returned to the caller and nothing is published.
    pub fn write(&self, raw_identifier: &str, value: TagValue) -> Result<ValueChange, SimError> {
        self.apply_write(normalize(raw_identifier), value, ChangeOrigin::Write)
    }

    /// Same as [`Resolver::write`], for writes a remote actor made through the
    /// address-space sink.
    pub fn external_write(
        &self,
        raw_identifier: &str,
        value: TagValue,
    ) -> Result<ValueChange, SimError> {
        self.apply_write(normalize(raw_identifier), value, ChangeOrigin::ExternalWrite)
    }

    fn apply_write(
        &self,
        key: CanonicalKey,
        value: TagValue,
        origin: ChangeOrigin,
    ) -> Result<ValueChange, SimError> {
        self.store.upsert(&key, &value.to_string())?;
        let ctx = TagContext {
            component: "Resolver",
            key: key.as_str(),
        };
        sim_debug!(ctx, "Stored override {} ({:?})", value, origin);

        let change = ValueChange::new(key, value, origin);
        self.fanout.notify(&change);
        Ok(change)
    }
}

impl TickHandler for Resolver {
    fn on_generated(&self, key: &CanonicalKey, generated: f64) -> Result<(), SimError> {
        self.publish_generated(key, generated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SinkError, StoreError};
    use crate::store::{MemoryStore, OverrideEntry};
    use crossbeam_channel::Receiver;

    fn setup() -> (Resolver, Arc<MemoryStore>, Receiver<ValueChange>) {
        let store = Arc::new(MemoryStore::new());
        let fanout = Arc::new(ChangeFanOut::new());
        let (tx, rx) = crossbeam_channel::unbounded();
        fanout.subscribe(Arc::new(crate::fanout::ChannelSink::new("test", tx)));
        (Resolver::new(store.clone(), fanout), store, rx)
    }

    #[test]
    fn test_generated_value_without_override() {
        let (resolver, _, rx) = setup();
        let key = CanonicalKey::from_raw("Temp");

        resolver.publish_generated(&key, 12.5);
        let change = rx.try_recv().unwrap();
        assert_eq!(change.value, TagValue::Number(12.5));
        assert_eq!(change.origin, ChangeOrigin::Simulation);
    }

    #[test]
    fn test_numeric_override_wins_over_generated() {
        let (resolver, _, rx) = setup();
        let key = CanonicalKey::from_raw("R0001");

        resolver.write("NS2|String|R0001", TagValue::from("42")).unwrap();
        let written = rx.try_recv().unwrap();
        assert_eq!(written.key, key);
        assert_eq!(written.value, TagValue::Text("42".into()));

        resolver.publish_generated(&key, 3.0);
        assert_eq!(rx.try_recv().unwrap().value, TagValue::Number(42.0));
    }

    #[test]
    fn test_non_numeric_override_is_stored_but_does_not_win() {
        let (resolver, store, rx) = setup();
        let key = CanonicalKey::from_raw("R0002");

        let change = resolver.external_write("R0002", TagValue::from("open")).unwrap();
        assert_eq!(change.origin, ChangeOrigin::ExternalWrite);
        assert_eq!(store.try_get(&key).unwrap().as_deref(), Some("open"));
        let _ = rx.try_recv();

        assert_eq!(resolver.resolve_generated(&key, 7.0), TagValue::Number(7.0));
    }

    #[test]
    fn test_store_failure_is_reported_to_writer_only() {
        struct BrokenStore;
        impl OverrideStore for BrokenStore {
            fn upsert(&self, _: &CanonicalKey, _: &str) -> Result<(), StoreError> {
                Err(StoreError::Poisoned)
            }
            fn entry(&self, _: &CanonicalKey) -> Result<Option<OverrideEntry>, StoreError> {
                Err(StoreError::Poisoned)
            }
        }

        let fanout = Arc::new(ChangeFanOut::new());
        let (tx, rx) = crossbeam_channel::unbounded();
        fanout.subscribe(Arc::new(crate::fanout::ChannelSink::new("test", tx)));
        let resolver = Resolver::new(Arc::new(BrokenStore), fanout);

        let result = resolver.write("R0001", TagValue::Number(1.0));
        assert!(matches!(result, Err(SimError::Store(StoreError::Poisoned))));
        assert!(rx.try_recv().is_err(), "failed writes must not be published");

        // The tick path falls back to the generated value.
        let key = CanonicalKey::from_raw("R0001");
        assert!(resolver.on_generated(&key, 5.0).is_ok());
        assert_eq!(rx.try_recv().unwrap().value, TagValue::Number(5.0));
    }

    #[test]
    fn test_sink_failure_does_not_fail_write() {
        let store = Arc::new(MemoryStore::new());
        let fanout = Arc::new(ChangeFanOut::new());
        fanout.subscribe(Arc::new(|_: &ValueChange| -> Result<(), SinkError> {
            Err(SinkError::Disconnected)
        }));
        let resolver = Resolver::new(store, fanout);
        assert!(resolver.write("R0001", TagValue::Boolean(true)).is_ok());
    }
}
