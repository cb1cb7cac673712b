// crates/mtp-sim/src/lib.rs

#![doc = "Core logic for the MTP simulator."]
#![doc = ""]
#![doc = "A module descriptor is parsed (see the `mtp-sim-aml` crate) into a [`Node`] tree."]
#![doc = "The [`SimulationEngine`] generates a value for every numeric tag on a fixed cadence,"]
#![doc = "the [`Resolver`] merges those values with durable overrides from an [`OverrideStore`],"]
#![doc = "and the [`ChangeFanOut`] delivers every resolved value to the registered sinks."]

// --- Foundation Modules ---
mod log;
pub mod error;
pub mod identity;
pub mod types;
pub mod value;

// --- Node Model ---
pub mod node;

// --- Value Layer ---
pub mod fanout;
pub mod resolver;
pub mod store;

// --- Simulation ---
pub mod sim;

// --- Consumers ---
pub mod address_space;
pub mod simulator;

// --- Top-level Exports ---
pub use address_space::{AddressSpace, VariableInfo, VariableState};
pub use error::{ConfigError, SimError, SinkError, StoreError};
pub use fanout::{ChangeFanOut, ChannelSink, SubscriptionId, ValueSink};
pub use identity::{CanonicalKey, DEFAULT_NAMESPACE, normalize};
pub use node::{Node, SharedTree};
pub use resolver::Resolver;
pub use sim::config::SimulationConfig;
pub use sim::engine::{SimulationEngine, TickHandler};
pub use simulator::Simulator;
pub use store::{MemoryStore, OverrideEntry, OverrideStore, SqliteStore};
pub use types::{AccessLevel, DataType, NodeClass};
pub use value::{ChangeOrigin, TagValue, ValueChange};
