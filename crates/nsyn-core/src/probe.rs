//! Stand-in receiver for the first establishment check

use crate::{
    error::{ConnectionError, Result},
    event::{Event, EventKind},
    ids::{NodeId, Port, SynapseTypeId},
    node::{Node, SignalType},
};

/// Receiver used only to absorb the source's dry-run test event.
///
/// It accepts exactly the event kinds the synapse model can carry. It never
/// joins the network, so the regular node operations are unreachable.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionTestProbe {
    supported: &'static [EventKind],
    synapse_type: SynapseTypeId,
    receptor_type: Port,
}

impl ConnectionTestProbe {
    /// Probe for a synapse model carrying `supported` event kinds
    pub fn new(
        supported: &'static [EventKind],
        synapse_type: SynapseTypeId,
        receptor_type: Port,
    ) -> Self {
        Self {
            supported,
            synapse_type,
            receptor_type,
        }
    }

    /// Synapse type being tested
    pub fn synapse_type(&self) -> SynapseTypeId {
        self.synapse_type
    }

    /// Receptor type being tested
    pub fn receptor_type(&self) -> Port {
        self.receptor_type
    }
}

impl Node for ConnectionTestProbe {
    fn node_id(&self) -> NodeId {
        NodeId::INVALID
    }

    fn model_name(&self) -> &str {
        "connection_test_probe"
    }

    fn sends_signal(&self) -> SignalType {
        SignalType::ALL
    }

    fn receives_signal(&self) -> SignalType {
        SignalType::ALL
    }

    fn send_test_event(
        &self,
        _target: &dyn Node,
        _receptor_type: Port,
        _synapse_type: SynapseTypeId,
        _dummy_target: bool,
    ) -> Result<Port> {
        unreachable!("connection test probe never acts as a source")
    }

    fn handles_test_event(&self, event: &Event, receptor_type: Port) -> Result<Port> {
        if self.supported.contains(&event.kind()) {
            Ok(receptor_type)
        } else {
            Err(ConnectionError::illegal_connection(format!(
                "synapse type {} does not support {}",
                self.synapse_type,
                event.kind()
            )))
        }
    }

    fn handle(&mut self, _event: &Event) {
        unreachable!("connection test probe never receives real events")
    }
}
