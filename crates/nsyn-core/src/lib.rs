//! Connection representation, establishment and event delivery for
//! spiking-network simulation
//!
//! Edges are stored per thread in connectors keyed by source unit and synapse
//! type. Each edge packs its synapse type, delay and flags into one `u32` and
//! points at its target either directly (thread-local slot) or through a
//! stable node id. Before an edge exists, establishment checks that the source
//! can emit an event the synapse model carries, that the target accepts it on
//! the requested receptor, and that the signal kinds of both ends intersect.
//!
//! ```
//! use nsyn_core::{KernelConfig, Network, StaticSynapse};
//!
//! # fn main() -> nsyn_core::Result<()> {
//! let config = KernelConfig {
//!     num_threads: 2,
//!     ..Default::default()
//! };
//! let mut net = Network::new(&config)?;
//! let syn = net.register_synapse::<StaticSynapse>("static_synapse")?;
//! assert_eq!(net.registry().id_of("static_synapse"), Some(syn));
//! assert_eq!(net.num_threads(), 2);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod calibrate;
pub mod checkpoint;
pub mod connection;
pub mod connector;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod establish;
pub mod event;
pub mod ids;
pub mod network;
pub mod node;
pub mod probe;
pub mod registry;
pub mod synapse;
pub mod table;
pub mod target;
pub mod time;
pub mod weight_recording;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use checkpoint::DumpSummary;
pub use connection::{CommonSynapseProperties, Connection, EdgeCore, EdgeStatus, EdgeUpdate};
pub use connector::{Connector, ConnectorBase, DeliveryReport};
pub use context::{DelayChecker, KernelConfig, SimulationContext};
pub use descriptor::{PackedEdgeDescriptor, MAX_DELAY_STEPS};
pub use error::{ConnectionError, DeliveryError, Result};
pub use establish::{establish, ConnectRequest};
pub use event::{Event, EventKind};
pub use ids::{LocalSlot, NodeAddress, NodeId, Port, SynapseTypeId, ThreadId};
pub use network::{Network, ThreadPartition};
pub use node::{Node, NodeTable, SignalType, ThreadNodes};
pub use probe::ConnectionTestProbe;
pub use registry::SynapseRegistry;
pub use synapse::StaticSynapse;
pub use table::{ConnectionId, ConnectionTable};
pub use target::{TargetIdentifier, TargetMode};
pub use time::{Resolution, StepConverter, TimeConverter};
pub use weight_recording::{WeightRecord, WeightRecorder};

pub use nsyn_storage::{CheckpointRecord, StorageError};
