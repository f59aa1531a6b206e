//! Edge core and the contract synapse models build on
//!
//! A synapse model is a plain struct that embeds an [`EdgeCore`] and adds its
//! own payload (weight, traces). [`Connection`] gives the connector uniform
//! access to both parts without per-edge dynamic dispatch.

use crate::{
    context::SimulationContext,
    descriptor::PackedEdgeDescriptor,
    error::{ConnectionError, Result},
    event::{Event, EventKind},
    ids::{NodeId, Port, SynapseTypeId, ThreadId},
    target::TargetIdentifier,
    time::Resolution,
};
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Target and packed descriptor shared by every synapse model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeCore {
    target: TargetIdentifier,
    descriptor: PackedEdgeDescriptor,
}

impl EdgeCore {
    /// Core for an edge to `target` with a one-step delay
    pub fn new(target: TargetIdentifier, synapse_type: SynapseTypeId) -> Self {
        Self {
            target,
            descriptor: PackedEdgeDescriptor::new(synapse_type),
        }
    }

    /// Receiving unit
    pub fn target(&self) -> &TargetIdentifier {
        &self.target
    }

    /// Receptor port on the target
    pub fn rport(&self) -> Port {
        self.target.rport()
    }

    /// Packed descriptor
    pub fn descriptor(&self) -> &PackedEdgeDescriptor {
        &self.descriptor
    }

    /// Synapse type id
    pub fn synapse_type_id(&self) -> SynapseTypeId {
        self.descriptor.synapse_type_id()
    }

    /// Delay in steps
    pub fn delay_steps(&self) -> i64 {
        self.descriptor.delay_steps()
    }

    /// Set the delay in steps
    pub fn set_delay_steps(&mut self, steps: i64) -> Result<()> {
        self.descriptor.set_delay_steps(steps)
    }

    /// Delay in ms
    pub fn delay_ms(&self, resolution: &Resolution) -> f64 {
        self.descriptor.delay_ms(resolution)
    }

    /// Set the delay in ms
    pub fn set_delay_ms(&mut self, ms: f64, resolution: &Resolution) -> Result<()> {
        self.descriptor.set_delay_ms(ms, resolution)
    }

    /// Whether further edges of the same source follow
    pub fn has_more_targets(&self) -> bool {
        self.descriptor.has_more_targets()
    }

    pub(crate) fn set_has_more_targets(&mut self, more: bool) {
        self.descriptor.set_has_more_targets(more);
    }

    /// Whether the edge is disabled
    pub fn is_disabled(&self) -> bool {
        self.descriptor.is_disabled()
    }

    /// Disable the edge
    pub fn disable(&mut self) {
        self.descriptor.disable();
    }

    pub(crate) fn write_delay(&mut self, steps: u32) {
        self.descriptor.write_delay(steps);
    }
}

/// Per synapse type properties shared by all its edges
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CommonSynapseProperties {
    /// Unit receiving weight-record events, if any
    pub weight_recorder: Option<NodeId>,
}

/// Spike count delivered by a volume transmitter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeCounter {
    /// Spike time in ms
    pub spike_time: f64,
    /// Number of spikes at that time
    pub multiplicity: f64,
}

/// Staged changes to one edge
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeUpdate {
    /// New delay in ms
    pub delay_ms: Option<f64>,
    /// New weight
    pub weight: Option<f64>,
}

impl EdgeUpdate {
    /// Update only the delay
    pub fn delay_ms(ms: f64) -> Self {
        Self {
            delay_ms: Some(ms),
            ..Default::default()
        }
    }

    /// Update only the weight
    pub fn weight(weight: f64) -> Self {
        Self {
            weight: Some(weight),
            ..Default::default()
        }
    }
}

/// Snapshot of an edge's observable state
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeStatus {
    /// Synapse model name
    pub synapse_model: String,
    /// Synapse type id
    pub synapse_type: SynapseTypeId,
    /// Receiving unit
    pub target: TargetIdentifier,
    /// Receptor port
    pub rport: Port,
    /// Delay in steps
    pub delay_steps: i64,
    /// Delay in ms
    pub delay_ms: f64,
    /// Weight, `None` for unweighted models
    pub weight: Option<f64>,
    /// Disabled flag
    pub disabled: bool,
}

/// Contract between the connector and a synapse model
pub trait Connection: Clone + Send + Sync + fmt::Debug + 'static {
    /// Model name used in diagnostics and status
    const MODEL_NAME: &'static str;

    /// Event kinds this model can carry
    const SUPPORTED_EVENTS: &'static [EventKind];

    /// Build an edge around `core` with default payload
    fn from_core(core: EdgeCore) -> Self;

    /// Shared edge part
    fn core(&self) -> &EdgeCore;

    /// Shared edge part, mutable
    fn core_mut(&mut self) -> &mut EdgeCore;

    /// Synaptic weight; models without one refuse
    fn weight(&self) -> Result<f64> {
        Err(ConnectionError::unweighted(Self::MODEL_NAME))
    }

    /// Set the synaptic weight; models without one refuse
    fn set_weight(&mut self, weight: f64) -> Result<()> {
        let _ = weight;
        Err(ConnectionError::unweighted(Self::MODEL_NAME))
    }

    /// Stamp the edge's rport, delay and weight onto `event` before it is
    /// handed to the target.
    ///
    /// Unweighted models stamp `NaN`, so nothing downstream sees the weight
    /// of a previous edge.
    fn send(&mut self, event: &mut Event, tid: ThreadId, common: &CommonSynapseProperties) {
        let _ = (tid, common);
        event.set_rport(self.core().rport());
        event.set_delay_steps(self.core().delay_steps());
        event.set_weight(self.weight().unwrap_or(f64::NAN));
    }

    /// Weight update driven by a volume transmitter
    fn trigger_update_weight(
        &mut self,
        tid: ThreadId,
        spikes: &[SpikeCounter],
        t_trig: f64,
        common: &CommonSynapseProperties,
    ) -> Result<()> {
        let _ = (tid, spikes, t_trig, common);
        Err(ConnectionError::illegal_connection(format!(
            "{} does not support updates triggered by a volume transmitter",
            Self::MODEL_NAME
        )))
    }

    /// Check model invariants on a staged edge
    fn validate(&self, ctx: &SimulationContext) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Apply `update` with copy-validate-commit; on error `self` is unchanged
    fn apply_update(&mut self, update: &EdgeUpdate, ctx: &SimulationContext) -> Result<()> {
        let mut staged = self.clone();

        if let Some(ms) = update.delay_ms {
            let steps = ctx.delay_checker().assert_valid_delay_ms(ms)?;
            staged.core_mut().set_delay_steps(steps)?;
        }
        if let Some(weight) = update.weight {
            staged.set_weight(weight)?;
        }
        staged.validate(ctx)?;

        if update.delay_ms.is_some() {
            ctx.delay_checker().record(staged.core().delay_steps());
        }
        *self = staged;
        Ok(())
    }

    /// Observable state
    fn status(&self, resolution: &Resolution) -> EdgeStatus {
        let core = self.core();
        EdgeStatus {
            synapse_model: Self::MODEL_NAME.to_string(),
            synapse_type: core.synapse_type_id(),
            target: *core.target(),
            rport: core.rport(),
            delay_steps: core.delay_steps(),
            delay_ms: core.delay_ms(resolution),
            weight: self.weight().ok(),
            disabled: core.is_disabled(),
        }
    }
}
