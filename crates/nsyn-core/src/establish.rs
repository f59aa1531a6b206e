//! Edge establishment
//!
//! Three checks run before an edge exists: a dry-run test event to a
//! [`ConnectionTestProbe`], the same test event to the real target (which
//! assigns the receptor port), and the signal-kind mask intersection. Only
//! then is the edge built and its delay and weight staged. The edge is handed
//! back by value; attaching it to a connector is the caller's step, so a
//! failed attempt leaves nothing behind.

use crate::{
    connection::{Connection, EdgeCore},
    context::SimulationContext,
    error::{ConnectionError, Result},
    ids::{NodeAddress, Port, SynapseTypeId},
    node::Node,
    probe::ConnectionTestProbe,
    target::{TargetIdentifier, TargetMode},
};

/// Parameters of one connection attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectRequest {
    /// Requested receptor type on the target
    pub receptor_type: Port,
    /// Synapse model to use
    pub synapse_type: SynapseTypeId,
    /// Target representation
    pub target_mode: TargetMode,
    /// Delay in ms; one step when absent
    pub delay_ms: Option<f64>,
    /// Weight; model default when absent
    pub weight: Option<f64>,
}

impl ConnectRequest {
    /// Request with receptor 0 and model defaults
    pub fn new(synapse_type: SynapseTypeId) -> Self {
        Self {
            receptor_type: 0,
            synapse_type,
            target_mode: TargetMode::default(),
            delay_ms: None,
            weight: None,
        }
    }

    /// Set the receptor type
    pub fn receptor(mut self, receptor_type: Port) -> Self {
        self.receptor_type = receptor_type;
        self
    }

    /// Set the delay in ms
    pub fn delay_ms(mut self, delay_ms: f64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    /// Set the weight
    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Set the target representation
    pub fn target_mode(mut self, mode: TargetMode) -> Self {
        self.target_mode = mode;
        self
    }
}

/// Check `source` against `target` and build the edge.
///
/// `target_address` is where `target` lives; it backs the direct
/// representation.
pub fn establish<C: Connection>(
    ctx: &SimulationContext,
    source: &dyn Node,
    target: &dyn Node,
    target_address: NodeAddress,
    request: &ConnectRequest,
) -> Result<C> {
    let probe = ConnectionTestProbe::new(
        C::SUPPORTED_EVENTS,
        request.synapse_type,
        request.receptor_type,
    );
    source.send_test_event(&probe, request.receptor_type, request.synapse_type, true)?;

    let rport = source.send_test_event(target, request.receptor_type, request.synapse_type, false)?;

    if !source.sends_signal().intersects(target.receives_signal()) {
        return Err(ConnectionError::illegal_connection(format!(
            "source and target are not compatible: {} (sends {:?}) cannot connect to {} (receives {:?})",
            source.model_name(),
            source.sends_signal(),
            target.model_name(),
            target.receives_signal()
        )));
    }

    let target_id =
        TargetIdentifier::for_mode(request.target_mode, target.node_id(), target_address, rport);
    let mut edge = C::from_core(EdgeCore::new(target_id, request.synapse_type));

    match request.delay_ms {
        Some(ms) => {
            let steps = ctx.delay_checker().assert_valid_delay_ms(ms)?;
            edge.core_mut().set_delay_steps(steps)?;
        }
        None => ctx
            .delay_checker()
            .assert_valid_delay_steps(edge.core().delay_steps())?,
    }
    if let Some(weight) = request.weight {
        edge.set_weight(weight)?;
    }
    edge.validate(ctx)?;

    ctx.delay_checker().record(edge.core().delay_steps());
    log::debug!(
        "established {} edge {} -> {} (rport {}, delay {} steps)",
        C::MODEL_NAME,
        source.node_id(),
        target.node_id(),
        rport,
        edge.core().delay_steps()
    );
    Ok(edge)
}
