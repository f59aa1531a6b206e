//! Per-source, per-synapse-type edge containers
//!
//! A [`Connector`] is generic over its synapse model, so the delivery loop is
//! monomorphized. Connection tables hold connectors behind the object-safe
//! [`ConnectorBase`] trait: dispatch happens once per connector, never per
//! edge.

use crate::{
    calibrate::recalibrate_delay,
    checkpoint::{dump_edges, DumpSummary},
    connection::{CommonSynapseProperties, Connection, EdgeStatus, EdgeUpdate, SpikeCounter},
    context::SimulationContext,
    error::{ConnectionError, DeliveryError, Result},
    event::Event,
    ids::{NodeId, SynapseTypeId, ThreadId},
    node::{NodeTable, ThreadNodes},
    time::{Resolution, StepConverter},
    weight_recording::send_weight_event,
};
use nsyn_storage::CheckpointSink;
use smallvec::SmallVec;
use std::{any::Any, fmt};

/// Outcome of delivering one event through one or more connectors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReport {
    /// Edges whose target handled the event
    pub delivered: usize,
    /// Disabled edges passed over
    pub skipped_disabled: usize,
    /// Weight-record events forwarded
    pub recorded: usize,
    /// Per-edge failures; the affected edges were skipped
    pub errors: SmallVec<[DeliveryError; 2]>,
}

impl DeliveryReport {
    /// Add the counts and errors of `other`
    pub fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.skipped_disabled += other.skipped_disabled;
        self.recorded += other.recorded;
        self.errors.extend(other.errors);
    }

    /// Whether every enabled edge was delivered
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Ordered edges of one synapse type sharing a source on one thread
#[derive(Debug, Clone)]
pub struct Connector<C> {
    synapse_type: SynapseTypeId,
    source: NodeId,
    thread: ThreadId,
    edges: Vec<C>,
}

impl<C: Connection> Connector<C> {
    /// Empty connector
    pub fn new(source: NodeId, thread: ThreadId, synapse_type: SynapseTypeId) -> Self {
        Self {
            synapse_type,
            source,
            thread,
            edges: Vec::new(),
        }
    }

    /// Synapse type of every edge
    pub fn synapse_type(&self) -> SynapseTypeId {
        self.synapse_type
    }

    /// Source unit
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// Owning thread
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Number of edges
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether there are no edges
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Append an edge and return its local connection id
    pub fn append(&mut self, mut edge: C) -> Result<usize> {
        let edge_type = edge.core().synapse_type_id();
        if edge_type != self.synapse_type {
            return Err(ConnectionError::SynapseTypeMismatch {
                connector: self.synapse_type,
                edge: edge_type,
            });
        }

        edge.core_mut().set_has_more_targets(false);
        if let Some(last) = self.edges.last_mut() {
            last.core_mut().set_has_more_targets(true);
        }
        self.edges.push(edge);
        Ok(self.edges.len() - 1)
    }

    /// Edge at `lcid`
    pub fn get(&self, lcid: usize) -> Result<&C> {
        let len = self.edges.len();
        self.edges
            .get(lcid)
            .ok_or(ConnectionError::ConnectionNotFound { lcid, len })
    }

    fn get_mut(&mut self, lcid: usize) -> Result<&mut C> {
        let len = self.edges.len();
        self.edges
            .get_mut(lcid)
            .ok_or(ConnectionError::ConnectionNotFound { lcid, len })
    }

    /// Edges in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, C> {
        self.edges.iter()
    }

    /// Edges in insertion order, mutable payload
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, C> {
        self.edges.iter_mut()
    }

    /// Visit every edge with its local connection id
    pub fn for_each<F>(&mut self, mut visit: F)
    where
        F: FnMut(usize, &mut C),
    {
        for (lcid, edge) in self.edges.iter_mut().enumerate() {
            visit(lcid, edge);
        }
    }

    /// Deliver `event` along every enabled edge.
    ///
    /// Unresolvable targets are logged, counted and skipped.
    pub fn deliver(
        &mut self,
        event: &mut Event,
        nodes: &mut ThreadNodes,
        table: &NodeTable,
        common: &CommonSynapseProperties,
    ) -> DeliveryReport {
        let tid = nodes.thread();
        let mut report = DeliveryReport::default();

        for (lcid, edge) in self.edges.iter_mut().enumerate() {
            let more = edge.core().has_more_targets();

            if edge.core().is_disabled() {
                report.skipped_disabled += 1;
            } else {
                event.set_port(lcid as u64);
                let delivered = match edge.core().target().resolve(tid, nodes, table) {
                    Ok(address) => match nodes.get_mut(address.slot) {
                        Some(node) => {
                            event.set_receiver(Some(address));
                            event.set_receiver_node_id(node.node_id());
                            edge.send(event, tid, common);
                            node.handle(event);
                            Ok(())
                        }
                        None => Err(DeliveryError::StaleTarget {
                            thread: tid,
                            slot: address.slot.raw(),
                        }),
                    },
                    Err(err) => Err(err),
                };

                match delivered {
                    Ok(()) => report.delivered += 1,
                    Err(err) => {
                        log::warn!(
                            "{} edge {} from {} skipped: {}",
                            C::MODEL_NAME,
                            lcid,
                            self.source,
                            err
                        );
                        event.set_receiver(None);
                        report.errors.push(err);
                    }
                }

                match send_weight_event(event, tid, nodes, table, common) {
                    Ok(true) => report.recorded += 1,
                    Ok(false) => {}
                    Err(err) => {
                        log::warn!("weight record for edge {} dropped: {}", lcid, err);
                        report.errors.push(err);
                    }
                }
            }

            if !more {
                break;
            }
        }

        report
    }

    /// Compute recalibrated delays without touching any edge
    pub fn plan_calibration(&self, converter: &dyn StepConverter) -> Result<Vec<u32>> {
        self.edges
            .iter()
            .map(|edge| recalibrate_delay(edge.core().delay_steps(), converter))
            .collect()
    }

    /// Write delays produced by [`Connector::plan_calibration`]
    pub fn commit_calibration(&mut self, plan: &[u32]) -> Result<()> {
        if plan.len() != self.edges.len() {
            return Err(ConnectionError::configuration(format!(
                "calibration plan covers {} edges, connector holds {}",
                plan.len(),
                self.edges.len()
            )));
        }
        for (edge, &steps) in self.edges.iter_mut().zip(plan) {
            edge.core_mut().write_delay(steps);
        }
        Ok(())
    }

    /// Recalibrate all delays; on error no edge changes
    pub fn calibrate(&mut self, converter: &dyn StepConverter) -> Result<()> {
        let plan = self.plan_calibration(converter)?;
        self.commit_calibration(&plan)
    }

    /// Serialize the edges as checkpoint records
    pub fn dump(
        &self,
        sink: &mut dyn CheckpointSink,
        nodes: &ThreadNodes,
        table: &NodeTable,
        resolution: &Resolution,
    ) -> Result<DumpSummary> {
        dump_edges(&self.edges, sink, nodes, table, resolution)
    }

    /// Disable the edge at `lcid`
    pub fn disable(&mut self, lcid: usize) -> Result<()> {
        self.get_mut(lcid)?.core_mut().disable();
        Ok(())
    }

    /// Status of the edge at `lcid`
    pub fn edge_status(&self, lcid: usize, resolution: &Resolution) -> Result<EdgeStatus> {
        Ok(self.get(lcid)?.status(resolution))
    }

    /// Update the edge at `lcid`; on error it keeps its prior state
    pub fn set_status(
        &mut self,
        lcid: usize,
        update: &EdgeUpdate,
        ctx: &SimulationContext,
    ) -> Result<()> {
        self.get_mut(lcid)?.apply_update(update, ctx)
    }

    /// Volume-transmitter weight update of the edge at `lcid`
    pub fn trigger_update_weight(
        &mut self,
        lcid: usize,
        spikes: &[SpikeCounter],
        t_trig: f64,
        common: &CommonSynapseProperties,
    ) -> Result<()> {
        let tid = self.thread;
        self.get_mut(lcid)?
            .trigger_update_weight(tid, spikes, t_trig, common)
    }
}

/// Type-erased connector as stored in a connection table
pub trait ConnectorBase: Send + Sync + fmt::Debug {
    /// Synapse type
    fn synapse_type(&self) -> SynapseTypeId;

    /// Source unit
    fn source(&self) -> NodeId;

    /// Synapse model name
    fn model_name(&self) -> &'static str;

    /// Number of edges
    fn len(&self) -> usize;

    /// Whether there are no edges
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// See [`Connector::deliver`]
    fn deliver(
        &mut self,
        event: &mut Event,
        nodes: &mut ThreadNodes,
        table: &NodeTable,
        common: &CommonSynapseProperties,
    ) -> DeliveryReport;

    /// See [`Connector::plan_calibration`]
    fn plan_calibration(&self, converter: &dyn StepConverter) -> Result<Vec<u32>>;

    /// See [`Connector::commit_calibration`]
    fn commit_calibration(&mut self, plan: &[u32]) -> Result<()>;

    /// See [`Connector::dump`]
    fn dump(
        &self,
        sink: &mut dyn CheckpointSink,
        nodes: &ThreadNodes,
        table: &NodeTable,
        resolution: &Resolution,
    ) -> Result<DumpSummary>;

    /// See [`Connector::disable`]
    fn disable(&mut self, lcid: usize) -> Result<()>;

    /// See [`Connector::edge_status`]
    fn edge_status(&self, lcid: usize, resolution: &Resolution) -> Result<EdgeStatus>;

    /// See [`Connector::set_status`]
    fn set_status(&mut self, lcid: usize, update: &EdgeUpdate, ctx: &SimulationContext)
        -> Result<()>;

    /// See [`Connector::trigger_update_weight`]
    fn trigger_update_weight(
        &mut self,
        lcid: usize,
        spikes: &[SpikeCounter],
        t_trig: f64,
        common: &CommonSynapseProperties,
    ) -> Result<()>;

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Connection> ConnectorBase for Connector<C> {
    fn synapse_type(&self) -> SynapseTypeId {
        self.synapse_type
    }

    fn source(&self) -> NodeId {
        self.source
    }

    fn model_name(&self) -> &'static str {
        C::MODEL_NAME
    }

    fn len(&self) -> usize {
        self.edges.len()
    }

    fn deliver(
        &mut self,
        event: &mut Event,
        nodes: &mut ThreadNodes,
        table: &NodeTable,
        common: &CommonSynapseProperties,
    ) -> DeliveryReport {
        Connector::deliver(self, event, nodes, table, common)
    }

    fn plan_calibration(&self, converter: &dyn StepConverter) -> Result<Vec<u32>> {
        Connector::plan_calibration(self, converter)
    }

    fn commit_calibration(&mut self, plan: &[u32]) -> Result<()> {
        Connector::commit_calibration(self, plan)
    }

    fn dump(
        &self,
        sink: &mut dyn CheckpointSink,
        nodes: &ThreadNodes,
        table: &NodeTable,
        resolution: &Resolution,
    ) -> Result<DumpSummary> {
        Connector::dump(self, sink, nodes, table, resolution)
    }

    fn disable(&mut self, lcid: usize) -> Result<()> {
        Connector::disable(self, lcid)
    }

    fn edge_status(&self, lcid: usize, resolution: &Resolution) -> Result<EdgeStatus> {
        Connector::edge_status(self, lcid, resolution)
    }

    fn set_status(
        &mut self,
        lcid: usize,
        update: &EdgeUpdate,
        ctx: &SimulationContext,
    ) -> Result<()> {
        Connector::set_status(self, lcid, update, ctx)
    }

    fn trigger_update_weight(
        &mut self,
        lcid: usize,
        spikes: &[SpikeCounter],
        t_trig: f64,
        common: &CommonSynapseProperties,
    ) -> Result<()> {
        Connector::trigger_update_weight(self, lcid, spikes, t_trig, common)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        connection::EdgeCore,
        ids::{LocalSlot, NodeAddress},
        synapse::StaticSynapse,
        target::TargetIdentifier,
        test_utils::{BareEdge, EventLog, StubUnit},
        weight_recording::WeightRecorder,
    };

    const SYN: SynapseTypeId = SynapseTypeId::from_bits(3);

    struct Fixture {
        nodes: ThreadNodes,
        table: NodeTable,
        logs: Vec<EventLog>,
    }

    fn fixture(targets: u64) -> Fixture {
        let tid = ThreadId::new(0);
        let mut nodes = ThreadNodes::new(tid);
        let mut table = NodeTable::new();
        let mut logs = Vec::new();
        for id in 0..targets {
            let unit = StubUnit::spiking(NodeId::new(id)).with_receptors(0..=4);
            logs.push(unit.log());
            let slot = nodes.push(Box::new(unit));
            table.insert(NodeId::new(id), NodeAddress::new(tid, slot)).unwrap();
        }
        Fixture { nodes, table, logs }
    }

    fn edge_to<C: Connection>(slot: u32) -> C {
        let target = TargetIdentifier::Direct {
            slot: LocalSlot::new(slot),
            rport: 1,
        };
        C::from_core(EdgeCore::new(target, SYN))
    }

    fn connector(n: u32) -> Connector<StaticSynapse> {
        let mut c = Connector::new(NodeId::new(50), ThreadId::new(0), SYN);
        for slot in 0..n {
            c.append(edge_to(slot)).unwrap();
        }
        c
    }

    #[test]
    fn test_append_maintains_run_flags() {
        let c = connector(3);
        let flags: Vec<bool> = c.iter().map(|e| e.core().has_more_targets()).collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn test_append_rejects_other_synapse_type() {
        let mut c = connector(1);
        let target = TargetIdentifier::Direct {
            slot: LocalSlot::new(0),
            rport: 0,
        };
        let other = StaticSynapse::from_core(EdgeCore::new(target, SynapseTypeId::new(4).unwrap()));
        assert!(matches!(
            c.append(other),
            Err(ConnectionError::SynapseTypeMismatch { .. })
        ));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_deliver_reaches_every_enabled_target() {
        let mut f = fixture(3);
        let mut c = connector(3);
        c.disable(1).unwrap();

        let mut event = Event::spike(NodeId::new(50), 7);
        let report = c.deliver(&mut event, &mut f.nodes, &f.table, &CommonSynapseProperties::default());

        assert_eq!(report.delivered, 2);
        assert_eq!(report.skipped_disabled, 1);
        assert!(report.is_clean());

        let first = f.logs[0].lock();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].port(), 0);
        assert_eq!(first[0].rport(), 1);
        assert_eq!(first[0].receiver_node_id(), NodeId::new(0));
        assert!(f.logs[1].lock().is_empty());
        assert_eq!(f.logs[2].lock()[0].port(), 2);
    }

    #[test]
    fn test_stale_target_is_skipped_not_fatal() {
        let mut f = fixture(3);
        let mut c = connector(3);
        f.nodes.remove(LocalSlot::new(1));

        let mut event = Event::spike(NodeId::new(50), 0);
        let report = c.deliver(&mut event, &mut f.nodes, &f.table, &CommonSynapseProperties::default());
        assert_eq!(report.delivered, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], DeliveryError::StaleTarget { slot: 1, .. }));
    }

    #[test]
    fn test_weight_recording_follows_deliveries() {
        let mut f = fixture(2);
        let recorder = WeightRecorder::new(NodeId::new(99));
        let records = recorder.records();
        f.nodes.push_replica(Box::new(recorder)).unwrap();

        let mut c = connector(2);
        c.iter_mut().for_each(|e| e.set_weight(0.25).unwrap());
        let common = CommonSynapseProperties {
            weight_recorder: Some(NodeId::new(99)),
        };

        let mut event = Event::spike(NodeId::new(50), 3);
        let report = c.deliver(&mut event, &mut f.nodes, &f.table, &common);
        assert_eq!(report.recorded, 2);

        let records = records.lock();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].target, NodeId::new(1));
        assert_eq!(records[1].weight, 0.25);
        assert_eq!(records[1].sender, NodeId::new(50));
    }

    #[test]
    fn test_unweighted_edges_record_nan_weight() {
        let mut f = fixture(1);
        let recorder = WeightRecorder::new(NodeId::new(99));
        let records = recorder.records();
        f.nodes.push_replica(Box::new(recorder)).unwrap();

        let mut c: Connector<BareEdge> = Connector::new(NodeId::new(50), ThreadId::new(0), SYN);
        c.append(edge_to(0)).unwrap();
        let common = CommonSynapseProperties {
            weight_recorder: Some(NodeId::new(99)),
        };

        let mut event = Event::spike(NodeId::new(50), 3);
        event.set_weight(7.5);
        let report = c.deliver(&mut event, &mut f.nodes, &f.table, &common);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.recorded, 1);
        assert!(records.lock()[0].weight.is_nan());
        assert!(f.logs[0].lock()[0].weight().is_nan());
    }

    #[test]
    fn test_calibration_is_all_or_nothing() {
        let mut c = connector(2);
        c.set_status(0, &EdgeUpdate::delay_ms(0.5), &SimulationContext::default())
            .unwrap();
        c.set_status(1, &EdgeUpdate::delay_ms(200_000.0), &SimulationContext::default())
            .unwrap();

        // doubling overflows the second edge, so neither changes
        let double = |s: i64| s * 2;
        assert!(c.calibrate(&double).is_err());
        assert_eq!(c.get(0).unwrap().core().delay_steps(), 5);

        let halve = |s: i64| s / 2;
        c.calibrate(&halve).unwrap();
        assert_eq!(c.get(0).unwrap().core().delay_steps(), 2);
        assert_eq!(c.get(1).unwrap().core().delay_steps(), 1_000_000);
    }

    #[test]
    fn test_status_and_errors_by_lcid() {
        let mut c = connector(1);
        let status = c.edge_status(0, &Resolution::default()).unwrap();
        assert_eq!(status.weight, Some(1.0));
        assert_eq!(status.rport, 1);
        assert!(matches!(
            c.edge_status(5, &Resolution::default()),
            Err(ConnectionError::ConnectionNotFound { lcid: 5, len: 1 })
        ));
        assert!(matches!(
            c.trigger_update_weight(0, &[], 0.0, &CommonSynapseProperties::default()),
            Err(ConnectionError::IllegalConnection { .. })
        ));
    }

    #[test]
    fn test_type_erased_access() {
        let mut boxed: Box<dyn ConnectorBase> = Box::new(Connector::<BareEdge>::new(
            NodeId::new(1),
            ThreadId::new(0),
            SYN,
        ));
        assert!(boxed.is_empty());
        assert_eq!(boxed.model_name(), "bare_edge");
        let typed = boxed
            .as_any_mut()
            .downcast_mut::<Connector<BareEdge>>()
            .unwrap();
        typed.append(edge_to(0)).unwrap();
        assert_eq!(boxed.len(), 1);
        assert!(boxed.as_any().downcast_ref::<Connector<StaticSynapse>>().is_none());
    }
}
