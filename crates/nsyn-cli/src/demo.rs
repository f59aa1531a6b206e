//! Spiking unit used by `nsyn build`
//!
//! Accepts spikes on receptors `0..=max_receptor` and adds every delivered
//! weight into a tally shared by all units of the network.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use nsyn_core::{
    ConnectionError, Event, EventKind, Node, NodeId, Port, SignalType, SynapseTypeId,
};

/// Counters shared by all demo units
#[derive(Debug, Default)]
pub struct InputTally {
    events: AtomicU64,
    weight_micros: AtomicU64,
}

impl InputTally {
    /// Number of events handled
    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    /// Sum of delivered weights, to micro-unit precision
    pub fn total_weight(&self) -> f64 {
        self.weight_micros.load(Ordering::Relaxed) as f64 / 1e6
    }
}

/// Minimal spiking unit
#[derive(Debug)]
pub struct DemoUnit {
    id: NodeId,
    max_receptor: Port,
    tally: Arc<InputTally>,
}

impl DemoUnit {
    /// Model name reported in diagnostics
    pub const MODEL_NAME: &'static str = "demo_unit";

    /// New unit reporting into `tally`
    pub fn new(id: NodeId, max_receptor: Port, tally: Arc<InputTally>) -> Self {
        Self {
            id,
            max_receptor,
            tally,
        }
    }
}

impl Node for DemoUnit {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn model_name(&self) -> &str {
        Self::MODEL_NAME
    }

    fn sends_signal(&self) -> SignalType {
        SignalType::SPIKE
    }

    fn receives_signal(&self) -> SignalType {
        SignalType::SPIKE
    }

    fn send_test_event(
        &self,
        target: &dyn Node,
        receptor_type: Port,
        _synapse_type: SynapseTypeId,
        _dummy_target: bool,
    ) -> nsyn_core::Result<Port> {
        let event = Event::spike(self.id, 0);
        target.handles_test_event(&event, receptor_type)
    }

    fn handles_test_event(&self, event: &Event, receptor_type: Port) -> nsyn_core::Result<Port> {
        if event.kind() != EventKind::Spike {
            return Err(ConnectionError::illegal_connection(format!(
                "{} only handles spikes",
                Self::MODEL_NAME
            )));
        }
        if receptor_type > self.max_receptor {
            return Err(ConnectionError::incompatible_receptor(
                receptor_type,
                Self::MODEL_NAME,
                event.kind().to_string(),
            ));
        }
        Ok(receptor_type)
    }

    fn handle(&mut self, event: &Event) {
        self.tally.events.fetch_add(1, Ordering::Relaxed);
        let micros = (event.weight() * event.payload() * 1e6).round();
        if micros.is_finite() && micros > 0.0 {
            self.tally.weight_micros.fetch_add(micros as u64, Ordering::Relaxed);
        }
    }
}
