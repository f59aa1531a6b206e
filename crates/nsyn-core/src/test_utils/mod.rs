//! Configurable stand-in units and synapse models for tests and benches

use crate::{
    connection::{Connection, EdgeCore},
    error::{ConnectionError, Result},
    event::{Event, EventKind},
    ids::{NodeId, Port, SynapseTypeId},
    node::{Node, SignalType},
};
use parking_lot::Mutex;
use std::{ops::RangeInclusive, sync::Arc};

/// Shared log of events a [`StubUnit`] handled
pub type EventLog = Arc<Mutex<Vec<Event>>>;

/// Unit with configurable signal masks, receptor range and emitted event kind
#[derive(Debug, Clone)]
pub struct StubUnit {
    id: NodeId,
    emits: EventKind,
    sends: SignalType,
    receives: SignalType,
    receptors: RangeInclusive<Port>,
    log: EventLog,
}

impl StubUnit {
    /// Spiking unit accepting receptor 0
    pub fn spiking(id: NodeId) -> Self {
        Self {
            id,
            emits: EventKind::Spike,
            sends: SignalType::SPIKE,
            receives: SignalType::SPIKE,
            receptors: 0..=0,
            log: EventLog::default(),
        }
    }

    /// Rate-based unit accepting receptor 0
    pub fn rate(id: NodeId) -> Self {
        Self {
            emits: EventKind::Rate,
            sends: SignalType::RATE,
            receives: SignalType::RATE,
            ..Self::spiking(id)
        }
    }

    /// Accept receptors in `range`
    pub fn with_receptors(mut self, range: RangeInclusive<Port>) -> Self {
        self.receptors = range;
        self
    }

    /// Override the signal masks
    pub fn with_signals(mut self, sends: SignalType, receives: SignalType) -> Self {
        self.sends = sends;
        self.receives = receives;
        self
    }

    /// Emit test events of `kind`
    pub fn emitting(mut self, kind: EventKind) -> Self {
        self.emits = kind;
        self
    }

    /// Handle to the events this unit handled
    pub fn log(&self) -> EventLog {
        Arc::clone(&self.log)
    }
}

impl Node for StubUnit {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn model_name(&self) -> &str {
        "stub_unit"
    }

    fn sends_signal(&self) -> SignalType {
        self.sends
    }

    fn receives_signal(&self) -> SignalType {
        self.receives
    }

    fn send_test_event(
        &self,
        target: &dyn Node,
        receptor_type: Port,
        _synapse_type: SynapseTypeId,
        _dummy_target: bool,
    ) -> Result<Port> {
        let event = Event::new(self.emits, self.id, 0);
        target.handles_test_event(&event, receptor_type)
    }

    fn handles_test_event(&self, event: &Event, receptor_type: Port) -> Result<Port> {
        if !self.receptors.contains(&receptor_type) {
            return Err(ConnectionError::incompatible_receptor(
                receptor_type,
                self.model_name(),
                event.kind().to_string(),
            ));
        }
        Ok(receptor_type)
    }

    fn handle(&mut self, event: &Event) {
        self.log.lock().push(event.clone());
    }
}

/// Synapse model with no payload; weight access is refused
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BareEdge {
    core: EdgeCore,
}

impl Connection for BareEdge {
    const MODEL_NAME: &'static str = "bare_edge";
    const SUPPORTED_EVENTS: &'static [EventKind] = &[EventKind::Spike];

    fn from_core(core: EdgeCore) -> Self {
        Self { core }
    }

    fn core(&self) -> &EdgeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EdgeCore {
        &mut self.core
    }
}
