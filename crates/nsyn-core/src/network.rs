//! Thread-partitioned network of units and connections

use crate::{
    checkpoint::DumpSummary,
    connection::{Connection, EdgeStatus, EdgeUpdate},
    connector::DeliveryReport,
    context::{KernelConfig, SimulationContext},
    error::{ConnectionError, Result},
    establish::{establish, ConnectRequest},
    event::Event,
    ids::{LocalSlot, NodeAddress, NodeId, SynapseTypeId, ThreadId},
    node::{Node, NodeTable, ThreadNodes},
    registry::SynapseRegistry,
    table::{CalibrationPlan, ConnectionId, ConnectionTable},
    target::TargetMode,
    time::{Resolution, TimeConverter},
};
use nsyn_storage::{CheckpointSink, ChunkedSink, ReservedFile, StreamSink};
use rayon::prelude::*;
use std::{io, path::Path};

/// Units and connectors owned by one worker thread
#[derive(Debug)]
pub struct ThreadPartition {
    nodes: ThreadNodes,
    connections: ConnectionTable,
}

impl ThreadPartition {
    fn new(thread: ThreadId) -> Self {
        Self {
            nodes: ThreadNodes::new(thread),
            connections: ConnectionTable::new(thread),
        }
    }

    /// Owning thread
    pub fn thread(&self) -> ThreadId {
        self.nodes.thread()
    }

    /// Units of this thread
    pub fn nodes(&self) -> &ThreadNodes {
        &self.nodes
    }

    /// Units of this thread, mutable
    pub fn nodes_mut(&mut self) -> &mut ThreadNodes {
        &mut self.nodes
    }

    /// Connectors of this thread
    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }
}

/// Network facade: establishment, delivery, recalibration and checkpoints
#[derive(Debug)]
pub struct Network {
    ctx: SimulationContext,
    registry: SynapseRegistry,
    table: NodeTable,
    partitions: Vec<ThreadPartition>,
}

impl Network {
    /// Empty network with one partition per configured thread
    pub fn new(config: &KernelConfig) -> Result<Self> {
        let ctx = SimulationContext::new(config)?;
        let partitions = (0..config.num_threads)
            .map(|t| ThreadPartition::new(ThreadId::new(t as u8)))
            .collect();

        log::info!(
            "network with {} threads at {} ms resolution",
            config.num_threads,
            ctx.resolution().step_ms()
        );
        Ok(Self {
            ctx,
            registry: SynapseRegistry::new(),
            table: NodeTable::new(),
            partitions,
        })
    }

    /// Simulation context
    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    /// Synapse models
    pub fn registry(&self) -> &SynapseRegistry {
        &self.registry
    }

    /// Global node table
    pub fn node_table(&self) -> &NodeTable {
        &self.table
    }

    /// Number of thread partitions
    pub fn num_threads(&self) -> usize {
        self.partitions.len()
    }

    /// Partition of `thread`
    pub fn partition(&self, thread: ThreadId) -> Option<&ThreadPartition> {
        self.partitions.get(thread.index())
    }

    /// Partition of `thread`, mutable
    pub fn partition_mut(&mut self, thread: ThreadId) -> Option<&mut ThreadPartition> {
        self.partitions.get_mut(thread.index())
    }

    /// Thread that owns a new node with id `id` under round-robin placement
    pub fn thread_for(&self, id: NodeId) -> ThreadId {
        ThreadId::new((id.raw() % self.partitions.len() as u64) as u8)
    }

    /// Add a unit to `thread`
    pub fn add_node(&mut self, thread: ThreadId, node: Box<dyn Node>) -> Result<NodeAddress> {
        let id = node.node_id();
        if partition_has_replica(&self.partitions, id) {
            return Err(ConnectionError::configuration(format!(
                "node {} is already registered as a replicated device",
                id
            )));
        }

        let partition = self
            .partitions
            .get_mut(thread.index())
            .ok_or_else(|| ConnectionError::configuration(format!("no thread {}", thread)))?;
        let address = NodeAddress::new(thread, LocalSlot::new(partition.nodes.len() as u32));
        self.table.insert(id, address)?;
        partition.nodes.push(node);
        Ok(address)
    }

    /// Add a device with one instance per thread, all sharing one node id
    pub fn add_replicated<F>(&mut self, make: F) -> Result<NodeId>
    where
        F: Fn(ThreadId) -> Box<dyn Node>,
    {
        let mut id = None;
        for partition in &mut self.partitions {
            let replica = make(partition.thread());
            let replica_id = replica.node_id();
            if *id.get_or_insert(replica_id) != replica_id {
                return Err(ConnectionError::configuration(
                    "replicas of one device must share a node id",
                ));
            }
            if self.table.get(replica_id).is_some() {
                return Err(ConnectionError::configuration(format!(
                    "node {} is already registered",
                    replica_id
                )));
            }
            partition.nodes.push_replica(replica)?;
        }
        id.ok_or_else(|| ConnectionError::configuration("network has no threads"))
    }

    /// Register edge type `C` as synapse model `name`
    pub fn register_synapse<C: Connection>(&mut self, name: &str) -> Result<SynapseTypeId> {
        self.registry.register::<C>(name)
    }

    /// Route weight-record events of `synapse_type` to `recorder`
    pub fn set_weight_recorder(
        &mut self,
        synapse_type: SynapseTypeId,
        recorder: Option<NodeId>,
    ) -> Result<()> {
        self.registry.set_weight_recorder(synapse_type, recorder)
    }

    /// Target representation for new edges of `synapse_type`
    pub fn set_target_mode(&mut self, synapse_type: SynapseTypeId, mode: TargetMode) -> Result<()> {
        self.registry.set_target_mode(synapse_type, mode)
    }

    /// Establish an edge from `source` to `target`.
    ///
    /// The edge is stored on the target's thread. On error nothing changes.
    pub fn connect<C: Connection>(
        &mut self,
        source: NodeId,
        target: NodeId,
        request: ConnectRequest,
    ) -> Result<ConnectionId> {
        let model = self.registry.expect::<C>(request.synapse_type)?;
        let request = ConnectRequest {
            target_mode: model.target_mode(),
            ..request
        };

        let target_address = self
            .table
            .get(target)
            .ok_or(ConnectionError::UnknownNode { node: target })?;
        let thread = target_address.thread;

        let edge: C = {
            let source_node = self
                .find_node(source, thread)
                .ok_or(ConnectionError::UnknownNode { node: source })?;
            let target_node = self
                .find_node(target, thread)
                .ok_or(ConnectionError::UnknownNode { node: target })?;
            establish(&self.ctx, source_node, target_node, target_address, &request)?
        };

        let connector = self.partitions[thread.index()]
            .connections
            .connector_mut::<C>(source, request.synapse_type)?;
        let lcid = connector.append(edge)?;

        Ok(ConnectionId {
            thread,
            source,
            synapse_type: request.synapse_type,
            lcid,
        })
    }

    /// Unit `id` as seen from `thread`: a replica there, or the registered unit
    pub fn find_node(&self, id: NodeId, thread: ThreadId) -> Option<&(dyn Node + 'static)> {
        let local = self.partitions.get(thread.index())?;
        if let Some(slot) = local.nodes.replica_slot(id) {
            return local.nodes.get(slot);
        }
        let address = self.table.get(id)?;
        self.partitions.get(address.thread.index())?.nodes.get(address.slot)
    }

    /// Deliver `event` on every thread in parallel
    pub fn deliver(&mut self, event: &Event) -> DeliveryReport {
        let table = &self.table;
        let registry = &self.registry;

        self.partitions
            .par_iter_mut()
            .map(|partition| {
                let mut event = event.clone();
                partition
                    .connections
                    .deliver(&mut event, &mut partition.nodes, table, registry)
            })
            .reduce(DeliveryReport::default, |mut acc, report| {
                acc.merge(report);
                acc
            })
    }

    /// Switch to `resolution` and recalibrate every edge delay.
    ///
    /// All connectors are validated before any is changed.
    pub fn change_resolution(&mut self, resolution: Resolution) -> Result<()> {
        let conv = TimeConverter::new(*self.ctx.resolution(), resolution);

        let plans: Vec<CalibrationPlan> = self
            .partitions
            .par_iter()
            .map(|p| p.connections.plan_calibration(&conv))
            .collect::<Result<_>>()?;

        self.partitions
            .par_iter_mut()
            .zip(plans.par_iter())
            .try_for_each(|(p, plan)| p.connections.commit_calibration(plan))?;

        self.ctx.set_resolution(resolution);
        log::info!(
            "recalibrated {} connections to {} ms resolution",
            self.num_connections(),
            resolution.step_ms()
        );
        Ok(())
    }

    /// Status of edge `id`
    pub fn edge_status(&self, id: &ConnectionId) -> Result<EdgeStatus> {
        let connector = self
            .partition(id.thread)
            .and_then(|p| p.connections.get(id.source, id.synapse_type))
            .ok_or(ConnectionError::ConnectionNotFound { lcid: id.lcid, len: 0 })?;
        connector.edge_status(id.lcid, self.ctx.resolution())
    }

    /// Update edge `id`; on error it keeps its prior state
    pub fn set_status(&mut self, id: &ConnectionId, update: &EdgeUpdate) -> Result<()> {
        let partition = self
            .partitions
            .get_mut(id.thread.index())
            .ok_or_else(|| ConnectionError::configuration(format!("no thread {}", id.thread)))?;
        partition
            .connections
            .connector_for(id)?
            .set_status(id.lcid, update, &self.ctx)
    }

    /// Disable edge `id`
    pub fn disable(&mut self, id: &ConnectionId) -> Result<()> {
        self.table_mut(id.thread)?.connector_for(id)?.disable(id.lcid)
    }

    /// Total number of edges
    pub fn num_connections(&self) -> usize {
        self.partitions
            .iter()
            .map(|p| p.connections.num_connections())
            .sum()
    }

    /// Write all partitions, in thread order, to one sink
    pub fn dump(&self, sink: &mut dyn CheckpointSink) -> Result<DumpSummary> {
        let resolution = *self.ctx.resolution();
        let mut summary = DumpSummary::default();
        for p in &self.partitions {
            summary.merge(p.connections.dump(sink, &p.nodes, &self.table, &resolution)?);
        }
        sink.finish()?;
        log::info!("checkpoint of {} records written", summary.written);
        Ok(summary)
    }

    /// Write all partitions concurrently into one file at `path`.
    ///
    /// Each thread gets a pre-sized region and its own chunked sink. The file
    /// is byte-identical to [`Network::dump`] into a plain sink.
    pub fn dump_chunked<P: AsRef<Path>>(&self, path: P, chunk_size: usize) -> Result<DumpSummary> {
        let resolution = *self.ctx.resolution();
        let table = &self.table;

        let sizes: Vec<usize> = self
            .partitions
            .par_iter()
            .map(|p| -> Result<usize> {
                let mut counter = StreamSink::new(io::sink());
                p.connections.dump(&mut counter, &p.nodes, table, &resolution)?;
                Ok(counter.bytes_written() as usize)
            })
            .collect::<Result<_>>()?;

        let mut file = ReservedFile::create(path.as_ref(), sizes.iter().sum())?;
        let regions = file.regions(&sizes)?;

        let summaries: Vec<DumpSummary> = self
            .partitions
            .par_iter()
            .zip(regions)
            .map(|(p, region)| -> Result<DumpSummary> {
                let mut sink = ChunkedSink::new(region, chunk_size, chunk_size)?;
                let summary = p.connections.dump(&mut sink, &p.nodes, table, &resolution)?;
                sink.finish()?;
                log::debug!(
                    "thread {} wrote {} records in {} chunks",
                    p.thread(),
                    summary.written,
                    sink.flush_count()
                );
                Ok(summary)
            })
            .collect::<Result<_>>()?;
        file.flush()?;

        let mut summary = DumpSummary::default();
        for s in summaries {
            summary.merge(s);
        }
        log::info!(
            "checkpoint of {} records written to {}",
            summary.written,
            path.as_ref().display()
        );
        Ok(summary)
    }

    fn table_mut(&mut self, thread: ThreadId) -> Result<&mut ConnectionTable> {
        self.partitions
            .get_mut(thread.index())
            .map(|p| &mut p.connections)
            .ok_or_else(|| ConnectionError::configuration(format!("no thread {}", thread)))
    }
}

fn partition_has_replica(partitions: &[ThreadPartition], id: NodeId) -> bool {
    partitions.iter().any(|p| p.nodes.replica_slot(id).is_some())
}
