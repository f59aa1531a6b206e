//! Per-thread connection table

use crate::{
    checkpoint::DumpSummary,
    connection::{CommonSynapseProperties, Connection},
    connector::{Connector, ConnectorBase, DeliveryReport},
    error::{ConnectionError, Result},
    event::Event,
    ids::{NodeId, SynapseTypeId, ThreadId},
    node::{NodeTable, ThreadNodes},
    registry::SynapseRegistry,
    time::{Resolution, StepConverter},
};
use nsyn_storage::CheckpointSink;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Address of one edge in the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectionId {
    /// Thread holding the connector
    pub thread: ThreadId,
    /// Source unit
    pub source: NodeId,
    /// Synapse type
    pub synapse_type: SynapseTypeId,
    /// Index within the connector
    pub lcid: usize,
}

/// Key of a connector within a table
pub type ConnectorKey = (NodeId, SynapseTypeId);

/// Calibration plan for every connector of a table, keyed like the table
pub type CalibrationPlan = Vec<(ConnectorKey, Vec<u32>)>;

/// Connectors owned by one thread, keyed by source and synapse type
#[derive(Debug)]
pub struct ConnectionTable {
    thread: ThreadId,
    connectors: BTreeMap<ConnectorKey, Box<dyn ConnectorBase>>,
}

impl ConnectionTable {
    /// Empty table for `thread`
    pub fn new(thread: ThreadId) -> Self {
        Self {
            thread,
            connectors: BTreeMap::new(),
        }
    }

    /// Owning thread
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Typed connector for `(source, synapse_type)`, created on first use
    pub fn connector_mut<C: Connection>(
        &mut self,
        source: NodeId,
        synapse_type: SynapseTypeId,
    ) -> Result<&mut Connector<C>> {
        let thread = self.thread;
        let entry = self
            .connectors
            .entry((source, synapse_type))
            .or_insert_with(|| Box::new(Connector::<C>::new(source, thread, synapse_type)));

        entry
            .as_any_mut()
            .downcast_mut::<Connector<C>>()
            .ok_or_else(|| ConnectionError::UnknownSynapseModel {
                synapse_type,
                model: C::MODEL_NAME.to_string(),
            })
    }

    /// Connector for `(source, synapse_type)`
    pub fn get(
        &self,
        source: NodeId,
        synapse_type: SynapseTypeId,
    ) -> Option<&(dyn ConnectorBase + 'static)> {
        self.connectors.get(&(source, synapse_type)).map(|c| c.as_ref())
    }

    /// Connector for `(source, synapse_type)`, mutable
    pub fn get_mut(
        &mut self,
        source: NodeId,
        synapse_type: SynapseTypeId,
    ) -> Option<&mut (dyn ConnectorBase + 'static)> {
        self.connectors
            .get_mut(&(source, synapse_type))
            .map(|c| c.as_mut())
    }

    /// Connector holding `id`
    pub fn connector_for(&mut self, id: &ConnectionId) -> Result<&mut (dyn ConnectorBase + 'static)> {
        self.get_mut(id.source, id.synapse_type)
            .ok_or(ConnectionError::ConnectionNotFound { lcid: id.lcid, len: 0 })
    }

    /// Connectors of `source`, in synapse type order
    pub fn connectors_of(
        &mut self,
        source: NodeId,
    ) -> impl Iterator<Item = &mut Box<dyn ConnectorBase>> {
        let lo = (source, SynapseTypeId::from_bits(0));
        let hi = (source, SynapseTypeId::from_bits(SynapseTypeId::MAX));
        self.connectors.range_mut(lo..=hi).map(|(_, c)| c)
    }

    /// All connectors in key order
    pub fn iter(&self) -> impl Iterator<Item = &(dyn ConnectorBase + 'static)> {
        self.connectors.values().map(|c| c.as_ref())
    }

    /// Number of connectors
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    /// Whether the table holds no connector
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Total number of edges
    pub fn num_connections(&self) -> usize {
        self.connectors.values().map(|c| c.len()).sum()
    }

    /// Deliver `event` through every connector of its sender
    pub fn deliver(
        &mut self,
        event: &mut Event,
        nodes: &mut ThreadNodes,
        table: &NodeTable,
        registry: &SynapseRegistry,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let default_common = CommonSynapseProperties::default();

        for connector in self.connectors_of(event.sender_node_id()) {
            let common = registry
                .common(connector.synapse_type())
                .unwrap_or(&default_common);
            report.merge(connector.deliver(event, nodes, table, common));
        }
        report
    }

    /// Validate new delays for every connector without changing any
    pub fn plan_calibration(&self, converter: &dyn StepConverter) -> Result<CalibrationPlan> {
        self.connectors
            .iter()
            .map(|(key, c)| c.plan_calibration(converter).map(|delays| (*key, delays)))
            .collect()
    }

    /// Apply a plan made by [`ConnectionTable::plan_calibration`]
    pub fn commit_calibration(&mut self, plan: &CalibrationPlan) -> Result<()> {
        for (key, delays) in plan {
            let connector = self.connectors.get_mut(key).ok_or_else(|| {
                ConnectionError::configuration(format!(
                    "calibration plan names missing connector {} / {}",
                    key.0, key.1
                ))
            })?;
            connector.commit_calibration(delays)?;
        }
        Ok(())
    }

    /// Serialize every connector in key order
    pub fn dump(
        &self,
        sink: &mut dyn CheckpointSink,
        nodes: &ThreadNodes,
        table: &NodeTable,
        resolution: &Resolution,
    ) -> Result<DumpSummary> {
        let mut summary = DumpSummary::default();
        for connector in self.connectors.values() {
            summary.merge(connector.dump(sink, nodes, table, resolution)?);
        }
        Ok(summary)
    }
}
