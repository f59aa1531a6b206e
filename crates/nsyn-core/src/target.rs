//! Handles to the receiving unit of an edge

use crate::{
    error::DeliveryError,
    ids::{LocalSlot, NodeAddress, NodeId, Port, ThreadId},
    node::{NodeTable, ThreadNodes},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which target representation new edges of a synapse model use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TargetMode {
    /// Thread-local slot, resolved without lookup
    #[default]
    Direct,
    /// Stable node id, resolved through the node table
    Indexed,
}

/// Receiving unit of an edge plus its receptor port.
///
/// Both are fixed when the edge is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TargetIdentifier {
    /// Slot in the delivering thread's unit storage
    Direct {
        /// Target slot
        slot: LocalSlot,
        /// Receptor port
        rport: Port,
    },
    /// Stable id, valid across threads and processes
    Indexed {
        /// Target node id
        node: NodeId,
        /// Receptor port
        rport: Port,
    },
}

impl TargetIdentifier {
    /// Build the identifier for `mode`
    pub fn for_mode(mode: TargetMode, node: NodeId, address: NodeAddress, rport: Port) -> Self {
        match mode {
            TargetMode::Direct => Self::Direct {
                slot: address.slot,
                rport,
            },
            TargetMode::Indexed => Self::Indexed { node, rport },
        }
    }

    /// Receptor port on the target
    pub fn rport(&self) -> Port {
        match *self {
            Self::Direct { rport, .. } | Self::Indexed { rport, .. } => rport,
        }
    }

    /// Representation in use
    pub fn mode(&self) -> TargetMode {
        match self {
            Self::Direct { .. } => TargetMode::Direct,
            Self::Indexed { .. } => TargetMode::Indexed,
        }
    }

    /// Resolve to a populated address on thread `tid`
    pub fn resolve(
        &self,
        tid: ThreadId,
        nodes: &ThreadNodes,
        table: &NodeTable,
    ) -> Result<NodeAddress, DeliveryError> {
        let address = match *self {
            Self::Direct { slot, .. } => NodeAddress::new(tid, slot),
            Self::Indexed { node, .. } => {
                let address = table.get(node).ok_or(DeliveryError::UnknownNode { node })?;
                if address.thread != tid {
                    return Err(DeliveryError::ForeignThread {
                        node,
                        owner: address.thread,
                        thread: tid,
                    });
                }
                address
            }
        };

        if !nodes.contains(address.slot) {
            return Err(DeliveryError::StaleTarget {
                thread: tid,
                slot: address.slot.raw(),
            });
        }
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StubUnit;

    fn setup() -> (ThreadNodes, NodeTable, NodeAddress) {
        let tid = ThreadId::new(0);
        let mut nodes = ThreadNodes::new(tid);
        let slot = nodes.push(Box::new(StubUnit::spiking(NodeId::new(10))));
        let address = NodeAddress::new(tid, slot);
        let mut table = NodeTable::new();
        table.insert(NodeId::new(10), address).unwrap();
        (nodes, table, address)
    }

    #[test]
    fn test_both_variants_resolve_alike() {
        let (nodes, table, address) = setup();
        let direct = TargetIdentifier::for_mode(TargetMode::Direct, NodeId::new(10), address, 2);
        let indexed = TargetIdentifier::for_mode(TargetMode::Indexed, NodeId::new(10), address, 2);

        assert_eq!(direct.rport(), 2);
        assert_eq!(indexed.rport(), 2);
        assert_eq!(direct.resolve(ThreadId::new(0), &nodes, &table), Ok(address));
        assert_eq!(indexed.resolve(ThreadId::new(0), &nodes, &table), Ok(address));
    }

    #[test]
    fn test_resolution_failures() {
        let (mut nodes, table, address) = setup();

        let unknown = TargetIdentifier::Indexed { node: NodeId::new(99), rport: 0 };
        assert!(matches!(
            unknown.resolve(ThreadId::new(0), &nodes, &table),
            Err(DeliveryError::UnknownNode { .. })
        ));

        let indexed = TargetIdentifier::Indexed { node: NodeId::new(10), rport: 0 };
        assert!(matches!(
            indexed.resolve(ThreadId::new(1), &nodes, &table),
            Err(DeliveryError::ForeignThread { .. })
        ));

        nodes.remove(address.slot);
        let direct = TargetIdentifier::Direct { slot: address.slot, rport: 0 };
        assert!(matches!(
            direct.resolve(ThreadId::new(0), &nodes, &table),
            Err(DeliveryError::StaleTarget { .. })
        ));
    }
}
