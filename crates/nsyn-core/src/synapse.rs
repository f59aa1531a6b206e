//! Built-in synapse models

use crate::{
    connection::{Connection, EdgeCore},
    context::SimulationContext,
    error::{ConnectionError, Result},
    event::EventKind,
};

/// Default weight of a new static synapse
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Synapse with a fixed weight and no plasticity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticSynapse {
    core: EdgeCore,
    weight: f64,
}

impl StaticSynapse {
    /// Edge around `core` carrying `weight`
    pub fn with_weight(core: EdgeCore, weight: f64) -> Self {
        Self { core, weight }
    }
}

impl Connection for StaticSynapse {
    const MODEL_NAME: &'static str = "static_synapse";
    const SUPPORTED_EVENTS: &'static [EventKind] =
        &[EventKind::Spike, EventKind::Current, EventKind::Rate];

    fn from_core(core: EdgeCore) -> Self {
        Self::with_weight(core, DEFAULT_WEIGHT)
    }

    fn core(&self) -> &EdgeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EdgeCore {
        &mut self.core
    }

    fn weight(&self) -> Result<f64> {
        Ok(self.weight)
    }

    fn set_weight(&mut self, weight: f64) -> Result<()> {
        self.weight = weight;
        Ok(())
    }

    fn validate(&self, _ctx: &SimulationContext) -> Result<()> {
        if !self.weight.is_finite() {
            return Err(ConnectionError::configuration(format!(
                "weight must be finite, got {}",
                self.weight
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        connection::{CommonSynapseProperties, EdgeUpdate},
        event::Event,
        ids::{LocalSlot, NodeId, SynapseTypeId, ThreadId},
        target::TargetIdentifier,
    };

    fn edge() -> StaticSynapse {
        let target = TargetIdentifier::Direct {
            slot: LocalSlot::new(0),
            rport: 1,
        };
        StaticSynapse::from_core(EdgeCore::new(target, SynapseTypeId::new(0).unwrap()))
    }

    #[test]
    fn test_default_weight() {
        assert_eq!(edge().weight().unwrap(), DEFAULT_WEIGHT);
    }

    #[test]
    fn test_send_carries_weight() {
        let mut e = edge();
        e.set_weight(-0.3).unwrap();
        let mut event = Event::spike(NodeId::new(1), 0);
        e.send(&mut event, ThreadId::new(0), &CommonSynapseProperties::default());
        assert_eq!(event.weight(), -0.3);
        assert_eq!(event.rport(), 1);
    }

    #[test]
    fn test_non_finite_weight_rejected_on_update() {
        let ctx = SimulationContext::default();
        let mut e = edge();
        assert!(e.apply_update(&EdgeUpdate::weight(f64::INFINITY), &ctx).is_err());
        assert_eq!(e.weight().unwrap(), DEFAULT_WEIGHT);

        e.apply_update(&EdgeUpdate::weight(2.5), &ctx).unwrap();
        assert_eq!(e.weight().unwrap(), 2.5);
    }
}
