//! Checkpoint serialization of a connector's edges

use crate::{
    connection::Connection,
    error::Result,
    ids::ThreadId,
    node::{NodeTable, ThreadNodes},
    time::Resolution,
};
use nsyn_storage::{CheckpointRecord, CheckpointSink};

/// Counts from one or more dumps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpSummary {
    /// Records written
    pub written: usize,
    /// Disabled edges left out
    pub skipped_disabled: usize,
    /// Edges whose target could not be resolved
    pub skipped_unresolved: usize,
}

impl DumpSummary {
    /// Add the counts of `other`
    pub fn merge(&mut self, other: DumpSummary) {
        self.written += other.written;
        self.skipped_disabled += other.skipped_disabled;
        self.skipped_unresolved += other.skipped_unresolved;
    }
}

/// Write one record per non-disabled edge, in insertion order.
///
/// Unweighted edges record a NaN weight.
pub fn dump_edges<'a, C, I>(
    edges: I,
    sink: &mut dyn CheckpointSink,
    nodes: &ThreadNodes,
    table: &NodeTable,
    resolution: &Resolution,
) -> Result<DumpSummary>
where
    C: Connection,
    I: IntoIterator<Item = &'a C>,
{
    let tid: ThreadId = nodes.thread();
    let mut summary = DumpSummary::default();

    for edge in edges {
        let core = edge.core();
        if core.is_disabled() {
            summary.skipped_disabled += 1;
            continue;
        }
        let address = match core.target().resolve(tid, nodes, table) {
            Ok(address) => address,
            Err(err) => {
                log::warn!("skipping {} edge in checkpoint: {}", C::MODEL_NAME, err);
                summary.skipped_unresolved += 1;
                continue;
            }
        };

        let record = CheckpointRecord::new(
            tid.raw(),
            address.slot.raw(),
            edge.weight().unwrap_or(f64::NAN),
            core.delay_ms(resolution),
        );
        record.write_to(sink)?;
        summary.written += 1;
    }

    Ok(summary)
}
