//! Events routed along edges
//!
//! One `Event` value is reused for every edge of a connector: the connector
//! rewrites the per-edge fields (receiver, port, rport, weight, delay) before
//! each delivery.

use crate::ids::{NodeAddress, NodeId, Port};
use core::fmt;

/// Category of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Spike with a multiplicity
    Spike,
    /// Input current
    Current,
    /// Firing-rate value
    Rate,
    /// Weight observation derived from a delivered event
    WeightRecord,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Spike => "SpikeEvent",
            Self::Current => "CurrentEvent",
            Self::Rate => "RateEvent",
            Self::WeightRecord => "WeightRecorderEvent",
        };
        f.write_str(name)
    }
}

/// An event in flight
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventKind,
    payload: f64,
    sender: Option<NodeAddress>,
    sender_node_id: NodeId,
    receiver: Option<NodeAddress>,
    receiver_node_id: NodeId,
    port: u64,
    rport: Port,
    weight: f64,
    delay_steps: i64,
    stamp: i64,
}

impl Event {
    /// Create an event of `kind` sent by `sender_node_id` at step `stamp`
    pub fn new(kind: EventKind, sender_node_id: NodeId, stamp: i64) -> Self {
        Self {
            kind,
            payload: 1.0,
            sender: None,
            sender_node_id,
            receiver: None,
            receiver_node_id: NodeId::INVALID,
            port: 0,
            rport: 0,
            weight: 1.0,
            delay_steps: 1,
            stamp,
        }
    }

    /// Spike event with multiplicity one
    pub fn spike(sender_node_id: NodeId, stamp: i64) -> Self {
        Self::new(EventKind::Spike, sender_node_id, stamp)
    }

    /// Current event carrying `amplitude`
    pub fn current(sender_node_id: NodeId, stamp: i64, amplitude: f64) -> Self {
        Self::new(EventKind::Current, sender_node_id, stamp).with_payload(amplitude)
    }

    /// Rate event carrying `rate`
    pub fn rate(sender_node_id: NodeId, stamp: i64, rate: f64) -> Self {
        Self::new(EventKind::Rate, sender_node_id, stamp).with_payload(rate)
    }

    /// Set the payload (multiplicity, amplitude or rate)
    pub fn with_payload(mut self, payload: f64) -> Self {
        self.payload = payload;
        self
    }

    /// Set the sender reference
    pub fn with_sender(mut self, sender: NodeAddress) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Event category
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Multiplicity, amplitude or rate
    pub fn payload(&self) -> f64 {
        self.payload
    }

    /// Sender reference, if the sender is local
    pub fn sender(&self) -> Option<NodeAddress> {
        self.sender
    }

    /// Set the sender reference
    pub fn set_sender(&mut self, sender: Option<NodeAddress>) {
        self.sender = sender;
    }

    /// Stable id of the sender
    pub fn sender_node_id(&self) -> NodeId {
        self.sender_node_id
    }

    /// Set the stable id of the sender
    pub fn set_sender_node_id(&mut self, id: NodeId) {
        self.sender_node_id = id;
    }

    /// Receiver reference; `None` if the event was not delivered
    pub fn receiver(&self) -> Option<NodeAddress> {
        self.receiver
    }

    /// Whether the receiver reference is valid
    pub fn receiver_is_valid(&self) -> bool {
        self.receiver.is_some()
    }

    /// Set the receiver reference
    pub fn set_receiver(&mut self, receiver: Option<NodeAddress>) {
        self.receiver = receiver;
    }

    /// Stable id of the receiver
    pub fn receiver_node_id(&self) -> NodeId {
        self.receiver_node_id
    }

    /// Set the stable id of the receiver
    pub fn set_receiver_node_id(&mut self, id: NodeId) {
        self.receiver_node_id = id;
    }

    /// Local connection id the event travelled through
    pub fn port(&self) -> u64 {
        self.port
    }

    /// Set the local connection id
    pub fn set_port(&mut self, port: u64) {
        self.port = port;
    }

    /// Receptor port on the receiver
    pub fn rport(&self) -> Port {
        self.rport
    }

    /// Set the receptor port
    pub fn set_rport(&mut self, rport: Port) {
        self.rport = rport;
    }

    /// Synaptic weight
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Set the synaptic weight
    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    /// Transmission delay in steps
    pub fn delay_steps(&self) -> i64 {
        self.delay_steps
    }

    /// Set the transmission delay in steps
    pub fn set_delay_steps(&mut self, steps: i64) {
        self.delay_steps = steps;
    }

    /// Time stamp in steps
    pub fn stamp(&self) -> i64 {
        self.stamp
    }

    /// Set the time stamp in steps
    pub fn set_stamp(&mut self, stamp: i64) {
        self.stamp = stamp;
    }

    /// Step at which the receiver should act on the event
    pub fn delivery_step(&self) -> i64 {
        self.stamp + self.delay_steps
    }
}
