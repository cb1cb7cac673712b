// crates/mtp-sim/src/simulator.rs

//! Top-level wiring of the simulator core.
//!
//! The engine ticks into the [`Resolver`], the resolver publishes through the
//! [`ChangeFanOut`], and the fan-out always carries the [`AddressSpace`] as its
//! first subscriber. External surfaces (the web monitor, a protocol stack) write
//! through [`Simulator::write_value`] or [`Simulator::external_write`] and listen
//! with [`Simulator::subscribe`].

use crate::address_space::{AddressSpace, VariableInfo};
use crate::error::SimError;
use crate::fanout::{ChangeFanOut, SubscriptionId, ValueSink};
use crate::log::{sim_info, sim_warn};
use crate::node::{Node, SharedTree};
use crate::resolver::Resolver;
use crate::sim::config::SimulationConfig;
use crate::sim::engine::SimulationEngine;
use crate::store::OverrideStore;
use crate::value::{TagValue, ValueChange};
use std::sync::Arc;

pub struct Simulator {
    tree: SharedTree,
    fanout: Arc<ChangeFanOut>,
    resolver: Arc<Resolver>,
    engine: SimulationEngine,
    address_space: Arc<AddressSpace>,
}

impl Simulator {
    pub fn new(config: SimulationConfig, store: Arc<dyn OverrideStore>) -> Self {
        let fanout = Arc::new(ChangeFanOut::new());
        let address_space = Arc::new(AddressSpace::new());
        fanout.subscribe(address_space.clone());

        let resolver = Arc::new(Resolver::new(store, Arc::clone(&fanout)));
        let engine = SimulationEngine::with_handler(config, resolver.clone());

        Self {
            tree: SharedTree::new(),
            fanout,
            resolver,
            engine,
            address_space,
        }
    }

    /// Installs a freshly parsed tree.
    ///
    /// Variables without any identity get a generated identifier first. An invalid
    /// tree is rejected and the tree already in effect keeps running.
    pub fn load_nodes(&self, mut root: Node) -> Result<Arc<Node>, SimError> {
        root.assign_fallback_identifiers();
        if let Err(reason) = root.validate() {
            sim_warn!("[Simulator] Rejected node tree: {}", reason);
            return Err(SimError::InvalidTree(reason));
        }

        let root = Arc::new(root);
        let loaded = self.address_space.load(&root);
        let numeric = self.engine.initialize(&root);
        self.tree.replace(Arc::clone(&root));

        sim_info!(
            "[Simulator] Loaded '{}': {} variable(s), {} simulated",
            root.display_name,
            loaded,
            numeric
        );
        Ok(root)
    }

    /// The tree currently in effect.
    pub fn tree(&self) -> Option<Arc<Node>> {
        self.tree.current()
    }

    pub fn start(&self) {
        self.engine.start();
    }

    pub fn stop(&self) {
        self.engine.stop();
    }

    pub fn restart(&self) {
        self.engine.stop();
        self.engine.start();
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Write request from a local consumer (UI, HTTP).
    pub fn write_value(
        &self,
        raw_identifier: &str,
        value: impl Into<TagValue>,
    ) -> Result<ValueChange, SimError> {
        self.resolver.write(raw_identifier, value.into())
    }

    /// Write made by a remote actor through the address space.
    pub fn external_write(
        &self,
        raw_identifier: &str,
        value: impl Into<TagValue>,
    ) -> Result<ValueChange, SimError> {
        self.resolver.external_write(raw_identifier, value.into())
    }

    /// Current value as seen by the address space.
    pub fn read_value(&self, raw_identifier: &str) -> Option<TagValue> {
        self.address_space.try_get_value(raw_identifier)
    }

    pub fn subscribe(&self, sink: Arc<dyn ValueSink>) -> SubscriptionId {
        self.fanout.subscribe(sink)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.fanout.unsubscribe(id)
    }

    pub fn variables(&self) -> Vec<VariableInfo> {
        self.address_space.snapshot()
    }

    pub fn config(&self) -> &SimulationConfig {
        self.engine.config()
    }

    pub fn address_space(&self) -> &Arc<AddressSpace> {
        &self.address_space
    }

    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::ChannelSink;
    use crate::store::MemoryStore;
    use crate::types::NodeClass;
    use crate::value::ChangeOrigin;

    fn simulator() -> Simulator {
        let config = SimulationConfig {
            update_interval_ms: 20.0,
            noise_amplitude: 0.0,
            ..Default::default()
        };
        Simulator::new(config, Arc::new(MemoryStore::new()))
    }

    fn tree() -> Node {
        Node::folder("MTP")
            .with_child(Node::variable("Temp", "Double").with_identifier("Temp"))
            .with_child(Node::variable("Mode", "xs:string").with_identifier("NS2|String|Mode"))
    }

    #[test]
    fn test_load_seeds_address_space() {
        let sim = simulator();
        let root = sim.load_nodes(tree()).unwrap();
        assert_eq!(root.variable_count(), 2);
        assert_eq!(sim.variables().len(), 2);
        assert_eq!(sim.engine().registered_keys().len(), 1);
        assert!(sim.tree().is_some());
    }

    #[test]
    fn test_invalid_tree_keeps_previous() {
        let sim = simulator();
        sim.load_nodes(tree()).unwrap();

        let bad = Node {
            node_class: NodeClass::Object,
            ..Node::folder("Not a folder")
        };
        assert!(matches!(sim.load_nodes(bad), Err(SimError::InvalidTree(_))));
        assert_eq!(sim.tree().unwrap().display_name, "MTP");
        assert_eq!(sim.variables().len(), 2);
    }

    #[test]
    fn test_fallback_identity_is_stable() {
        let sim = simulator();
        let root = sim
            .load_nodes(Node::folder("MTP").with_child(Node::variable("", "Double")))
            .unwrap();
        let leaf = root.variables().next().unwrap();
        let key = leaf.canonical_key().unwrap();
        assert_eq!(leaf.canonical_key().unwrap(), key);
        assert_eq!(sim.engine().registered_keys(), [key]);
    }

    #[test]
    fn test_writes_reach_address_space_and_subscribers() {
        let sim = simulator();
        sim.load_nodes(tree()).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let id = sim.subscribe(Arc::new(ChannelSink::new("test", tx)));

        sim.write_value("ns=2;s=Mode", "auto").unwrap();
        assert_eq!(sim.read_value("Mode"), Some(TagValue::Text("auto".into())));
        assert_eq!(rx.try_recv().unwrap().origin, ChangeOrigin::Write);

        sim.external_write("Temp", 42.0).unwrap();
        let change = rx.try_recv().unwrap();
        assert_eq!(change.origin, ChangeOrigin::ExternalWrite);
        assert_eq!(change.value, TagValue::Number(42.0));

        assert!(sim.unsubscribe(id));
        sim.write_value("Temp", 1.0).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_start_stop_restart() {
        let sim = simulator();
        sim.load_nodes(tree()).unwrap();
        assert!(!sim.is_running());
        sim.start();
        assert!(sim.is_running());
        sim.restart();
        assert!(sim.is_running());
        sim.stop();
        assert!(!sim.is_running());
    }
}
