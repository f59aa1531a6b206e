//! Node capability interface and per-thread unit storage
//!
//! Units themselves (neurons, devices) live outside this crate. The framework
//! only needs the narrow capability defined by [`Node`]: answer test events
//! during establishment, declare signal kinds, and handle delivered events.

use crate::{
    error::{ConnectionError, Result},
    event::Event,
    ids::{LocalSlot, NodeAddress, NodeId, Port, SynapseTypeId, ThreadId},
};
use core::{fmt, ops};
use std::collections::HashMap;

/// Bitmask of signal kinds a unit emits or accepts
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalType(u8);

impl SignalType {
    /// No signal
    pub const NONE: Self = Self(0);
    /// Spiking units
    pub const SPIKE: Self = Self(0b01);
    /// Rate-based units
    pub const RATE: Self = Self(0b10);
    /// Binary units
    pub const BINARY: Self = Self(0b100);
    /// Any signal kind
    pub const ALL: Self = Self(u8::MAX);

    /// Build from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Whether the two masks share at least one kind
    pub const fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl ops::BitAnd for SignalType {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl ops::BitOr for SignalType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignalType({:#010b})", self.0)
    }
}

/// Capability every simulated unit provides to the connection framework
pub trait Node: Send + Sync {
    /// Globally stable id
    fn node_id(&self) -> NodeId;

    /// Model name used in diagnostics
    fn model_name(&self) -> &str;

    /// Signal kinds this unit emits
    fn sends_signal(&self) -> SignalType;

    /// Signal kinds this unit accepts
    fn receives_signal(&self) -> SignalType;

    /// Build the event type this unit emits and offer it to `target`.
    ///
    /// Returns the receptor port `target` assigns. `dummy_target` is true
    /// when `target` is a connection test probe.
    fn send_test_event(
        &self,
        target: &dyn Node,
        receptor_type: Port,
        synapse_type: SynapseTypeId,
        dummy_target: bool,
    ) -> Result<Port>;

    /// Decide whether an event of this shape can arrive on `receptor_type`.
    ///
    /// Units that receive nothing keep the default, which refuses everything.
    fn handles_test_event(&self, event: &Event, receptor_type: Port) -> Result<Port> {
        let _ = receptor_type;
        Err(ConnectionError::illegal_connection(format!(
            "{} does not handle {}",
            self.model_name(),
            event.kind()
        )))
    }

    /// Act on a delivered event
    fn handle(&mut self, event: &Event);
}

/// Map from stable node ids to thread-local addresses.
///
/// Filled during network construction and only read while events are
/// delivered.
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    entries: HashMap<NodeId, NodeAddress>,
}

impl NodeTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node; ids must be unique
    pub fn insert(&mut self, id: NodeId, address: NodeAddress) -> Result<()> {
        if !id.is_valid() {
            return Err(ConnectionError::configuration("cannot register the invalid node id"));
        }
        if self.entries.contains_key(&id) {
            return Err(ConnectionError::configuration(format!(
                "node {} is already registered",
                id
            )));
        }
        self.entries.insert(id, address);
        Ok(())
    }

    /// Drop a node's entry
    pub fn remove(&mut self, id: NodeId) -> Option<NodeAddress> {
        self.entries.remove(&id)
    }

    /// Look up a node
    pub fn get(&self, id: NodeId) -> Option<NodeAddress> {
        self.entries.get(&id).copied()
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Units owned by one worker thread.
///
/// Devices such as recorders are replicated: every thread holds its own
/// instance under the same node id, found through [`ThreadNodes::replica_slot`]
/// rather than the global [`NodeTable`].
pub struct ThreadNodes {
    thread: ThreadId,
    slots: Vec<Option<Box<dyn Node>>>,
    replicas: HashMap<NodeId, LocalSlot>,
}

impl ThreadNodes {
    /// Create empty storage for `thread`
    pub fn new(thread: ThreadId) -> Self {
        Self {
            thread,
            slots: Vec::new(),
            replicas: HashMap::new(),
        }
    }

    /// Owning thread
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Store a unit and return its slot
    pub fn push(&mut self, node: Box<dyn Node>) -> LocalSlot {
        let slot = LocalSlot::new(self.slots.len() as u32);
        self.slots.push(Some(node));
        slot
    }

    /// Store this thread's instance of a replicated unit
    pub fn push_replica(&mut self, node: Box<dyn Node>) -> Result<LocalSlot> {
        let id = node.node_id();
        if self.replicas.contains_key(&id) {
            return Err(ConnectionError::configuration(format!(
                "node {} already has a replica on thread {}",
                id, self.thread
            )));
        }
        let slot = self.push(node);
        self.replicas.insert(id, slot);
        Ok(slot)
    }

    /// Slot of this thread's replica of `id`
    pub fn replica_slot(&self, id: NodeId) -> Option<LocalSlot> {
        self.replicas.get(&id).copied()
    }

    /// Take a unit out; edges pointing at the slot become stale
    pub fn remove(&mut self, slot: LocalSlot) -> Option<Box<dyn Node>> {
        let node = self.slots.get_mut(slot.raw() as usize)?.take()?;
        self.replicas.retain(|_, s| *s != slot);
        Some(node)
    }

    /// Whether `slot` holds a unit
    pub fn contains(&self, slot: LocalSlot) -> bool {
        self.get(slot).is_some()
    }

    /// Shared access to a unit
    pub fn get(&self, slot: LocalSlot) -> Option<&(dyn Node + 'static)> {
        self.slots.get(slot.raw() as usize)?.as_deref()
    }

    /// Exclusive access to a unit
    pub fn get_mut(&mut self, slot: LocalSlot) -> Option<&mut (dyn Node + 'static)> {
        self.slots.get_mut(slot.raw() as usize)?.as_deref_mut()
    }

    /// Number of slots, populated or not
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot was ever allocated
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for ThreadNodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadNodes")
            .field("thread", &self.thread)
            .field("slots", &self.slots.len())
            .field("replicas", &self.replicas.len())
            .finish()
    }
}
