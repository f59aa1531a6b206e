//! Error types for connection establishment, property updates and delivery

use crate::ids::{NodeId, SynapseTypeId, ThreadId};
use thiserror::Error;

/// Result type for connection operations
pub type Result<T> = std::result::Result<T, ConnectionError>;

/// Errors raised synchronously while building or modifying connections
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Storage layer error
    #[error("Storage error: {source}")]
    Storage {
        #[from]
        /// Source storage error
        source: nsyn_storage::StorageError,
    },

    /// Requested receptor is outside the range a unit accepts
    #[error("Receptor type {receptor} is not accepted by {model} for {event} events")]
    IncompatibleReceptorType {
        /// Requested receptor type
        receptor: u32,
        /// Model name of the rejecting unit
        model: String,
        /// Event kind that was tested
        event: String,
    },

    /// Source and target (or synapse model) cannot be connected
    #[error("Illegal connection: {reason}")]
    IllegalConnection {
        /// Reason the connection was refused
        reason: String,
    },

    /// Invalid property value (delay range, synapse id range, resolution)
    #[error("Configuration error: {reason}")]
    Configuration {
        /// Reason the value was rejected
        reason: String,
    },

    /// Weight access on a synapse model that carries no weight
    #[error("Synapse model {model} has no weight")]
    Unweighted {
        /// Synapse model name
        model: String,
    },

    /// An edge was appended to a connector of another synapse type
    #[error("Edge of synapse type {edge} cannot join connector of type {connector}")]
    SynapseTypeMismatch {
        /// Synapse type of the connector
        connector: SynapseTypeId,
        /// Synapse type of the edge
        edge: SynapseTypeId,
    },

    /// Node is not registered
    #[error("Node {node} not found")]
    UnknownNode {
        /// Node id that was not found
        node: NodeId,
    },

    /// Synapse model is not registered or has a different Rust type
    #[error("Synapse model {synapse_type} not registered for {model}")]
    UnknownSynapseModel {
        /// Requested synapse type id
        synapse_type: SynapseTypeId,
        /// Expected model name
        model: String,
    },

    /// Connection index outside a connector
    #[error("Connection {lcid} out of range (connector holds {len})")]
    ConnectionNotFound {
        /// Local connection id
        lcid: usize,
        /// Connector length
        len: usize,
    },
}

impl ConnectionError {
    /// Create an incompatible receptor error
    pub fn incompatible_receptor(
        receptor: u32,
        model: impl Into<String>,
        event: impl Into<String>,
    ) -> Self {
        Self::IncompatibleReceptorType {
            receptor,
            model: model.into(),
            event: event.into(),
        }
    }

    /// Create an illegal connection error
    pub fn illegal_connection(reason: impl Into<String>) -> Self {
        Self::IllegalConnection {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an unweighted-model error
    pub fn unweighted(model: impl Into<String>) -> Self {
        Self::Unweighted {
            model: model.into(),
        }
    }
}

/// Per-edge delivery failure.
///
/// These never abort a delivery pass; they are collected in a
/// [`DeliveryReport`](crate::connector::DeliveryReport) and the affected edge
/// is skipped for the current event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Direct target slot is empty or out of range
    #[error("Target slot {slot} on thread {thread} is not populated")]
    StaleTarget {
        /// Thread that was searched
        thread: ThreadId,
        /// Slot that was referenced
        slot: u32,
    },

    /// Indexed target id has no table entry
    #[error("Node {node} has no entry in the node table")]
    UnknownNode {
        /// Unresolvable node id
        node: NodeId,
    },

    /// Target resolved to a unit owned by another thread
    #[error("Node {node} lives on thread {owner}, not on thread {thread}")]
    ForeignThread {
        /// Node id
        node: NodeId,
        /// Owning thread
        owner: ThreadId,
        /// Delivering thread
        thread: ThreadId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ConnectionError::illegal_connection("spiking vs rate");
        assert!(matches!(err, ConnectionError::IllegalConnection { .. }));

        let err = ConnectionError::incompatible_receptor(7, "iaf_multi", "SpikeEvent");
        assert!(matches!(
            err,
            ConnectionError::IncompatibleReceptorType { receptor: 7, .. }
        ));
    }

    #[test]
    fn test_error_display() {
        let err = ConnectionError::configuration("delay exceeds 2097151 steps");
        let msg = format!("{}", err);
        assert!(msg.contains("Configuration error"));

        let err = DeliveryError::UnknownNode { node: NodeId::new(42) };
        assert!(format!("{}", err).contains("Node 42"));
    }
}
