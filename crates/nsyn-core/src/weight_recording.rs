//! Weight-record side channel and the recorder unit that consumes it

use crate::{
    connection::CommonSynapseProperties,
    error::{ConnectionError, DeliveryError, Result},
    event::{Event, EventKind},
    ids::{NodeAddress, NodeId, Port, SynapseTypeId, ThreadId},
    node::{Node, NodeTable, SignalType, ThreadNodes},
    target::TargetIdentifier,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Forward a weight-record event derived from a completed delivery.
///
/// Returns `Ok(false)` when the synapse type names no recorder or when the
/// primary event never reached a receiver.
pub fn send_weight_event(
    primary: &Event,
    tid: ThreadId,
    nodes: &mut ThreadNodes,
    table: &NodeTable,
    common: &CommonSynapseProperties,
) -> std::result::Result<bool, DeliveryError> {
    let Some(recorder) = common.weight_recorder else {
        return Ok(false);
    };
    if !primary.receiver_is_valid() {
        return Ok(false);
    }

    let address = match nodes.replica_slot(recorder) {
        Some(slot) => NodeAddress::new(tid, slot),
        None => TargetIdentifier::Indexed {
            node: recorder,
            rport: 0,
        }
        .resolve(tid, nodes, table)?,
    };

    let mut wr = Event::new(EventKind::WeightRecord, primary.sender_node_id(), primary.stamp());
    wr.set_port(primary.port());
    wr.set_rport(primary.rport());
    wr.set_sender(primary.sender());
    wr.set_weight(primary.weight());
    wr.set_delay_steps(primary.delay_steps());
    wr.set_receiver_node_id(primary.receiver_node_id());
    wr.set_receiver(Some(address));

    let node = nodes.get_mut(address.slot).ok_or(DeliveryError::StaleTarget {
        thread: tid,
        slot: address.slot.raw(),
    })?;
    node.handle(&wr);
    Ok(true)
}

/// One observed delivery
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightRecord {
    /// Sending unit
    pub sender: NodeId,
    /// Receiving unit
    pub target: NodeId,
    /// Local connection id
    pub port: u64,
    /// Receptor port
    pub rport: Port,
    /// Time stamp in steps
    pub stamp: i64,
    /// Weight the event carried; `NaN` for unweighted synapse models
    pub weight: f64,
    /// Delay in steps
    pub delay_steps: i64,
}

/// Records shared by all replicas of one recorder
pub type WeightRecords = Arc<Mutex<Vec<WeightRecord>>>;

/// Recorder unit for weight-record events
#[derive(Debug, Clone)]
pub struct WeightRecorder {
    id: NodeId,
    records: WeightRecords,
}

impl WeightRecorder {
    /// Recorder with a fresh record store
    pub fn new(id: NodeId) -> Self {
        Self::with_records(id, WeightRecords::default())
    }

    /// Recorder appending to `records`; replicas share one store
    pub fn with_records(id: NodeId, records: WeightRecords) -> Self {
        Self { id, records }
    }

    /// Handle to the record store
    pub fn records(&self) -> WeightRecords {
        Arc::clone(&self.records)
    }
}

impl Node for WeightRecorder {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn model_name(&self) -> &str {
        "weight_recorder"
    }

    fn sends_signal(&self) -> SignalType {
        SignalType::NONE
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
        Err(ConnectionError::illegal_connection(
            "weight_recorder cannot act as a source",
        ))
    }

    fn handles_test_event(&self, event: &Event, receptor_type: Port) -> Result<Port> {
        if event.kind() != EventKind::WeightRecord {
            return Err(ConnectionError::illegal_connection(format!(
                "weight_recorder does not handle {}",
                event.kind()
            )));
        }
        if receptor_type != 0 {
            return Err(ConnectionError::incompatible_receptor(
                receptor_type,
                self.model_name(),
                event.kind().to_string(),
            ));
        }
        Ok(0)
    }

    fn handle(&mut self, event: &Event) {
        if event.kind() != EventKind::WeightRecord {
            return;
        }
        self.records.lock().push(WeightRecord {
            sender: event.sender_node_id(),
            target: event.receiver_node_id(),
            port: event.port(),
            rport: event.rport(),
            stamp: event.stamp(),
            weight: event.weight(),
            delay_steps: event.delay_steps(),
        });
    }
}
