//! `nsyn inspect`: summarize a checkpoint file

use clap::Args;
use serde::Serialize;
use std::{collections::BTreeMap, fs::File, io::BufReader, path::PathBuf};
use tracing::info;

use nsyn_storage::{CheckpointRecord, RecordReader};

use crate::error::{CliError, CliResult};

/// Inspect a connection checkpoint
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Checkpoint file
    pub path: PathBuf,

    /// Print the first N records
    #[arg(long, default_value = "0")]
    pub head: usize,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Statistics over one checkpoint
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct CheckpointStats {
    /// Number of records
    pub records: u64,
    /// Records per target thread
    pub per_thread: BTreeMap<u8, u64>,
    /// Records without a weight
    pub unweighted: u64,
    /// Smallest weight
    pub weight_min: Option<f64>,
    /// Largest weight
    pub weight_max: Option<f64>,
    /// Mean weight over weighted records
    pub weight_mean: Option<f64>,
    /// Smallest delay in ms
    pub delay_min_ms: Option<f64>,
    /// Largest delay in ms
    pub delay_max_ms: Option<f64>,
}

impl CheckpointStats {
    /// Fold one record into the statistics
    pub fn add(&mut self, record: &CheckpointRecord) {
        self.records += 1;
        *self.per_thread.entry(record.thread_id).or_insert(0) += 1;

        if record.weight.is_nan() {
            self.unweighted += 1;
        } else {
            let weighted = (self.records - self.unweighted) as f64;
            let mean = self.weight_mean.unwrap_or(0.0);
            self.weight_mean = Some(mean + (record.weight - mean) / weighted);
            self.weight_min = Some(self.weight_min.map_or(record.weight, |w| w.min(record.weight)));
            self.weight_max = Some(self.weight_max.map_or(record.weight, |w| w.max(record.weight)));
        }

        self.delay_min_ms = Some(self.delay_min_ms.map_or(record.delay_ms, |d| d.min(record.delay_ms)));
        self.delay_max_ms = Some(self.delay_max_ms.map_or(record.delay_ms, |d| d.max(record.delay_ms)));
    }
}

#[derive(Serialize)]
struct InspectReport<'a> {
    path: &'a PathBuf,
    stats: &'a CheckpointStats,
    head: Vec<RecordView>,
}

#[derive(Serialize)]
struct RecordView {
    thread: u8,
    slot: u32,
    weight: Option<f64>,
    delay_ms: f64,
}

impl From<&CheckpointRecord> for RecordView {
    fn from(r: &CheckpointRecord) -> Self {
        Self {
            thread: r.thread_id,
            slot: r.thread_local_slot,
            weight: (!r.weight.is_nan()).then_some(r.weight),
            delay_ms: r.delay_ms,
        }
    }
}

impl InspectCommand {
    /// Run the command
    pub fn execute(self) -> CliResult<()> {
        if !self.path.exists() {
            return Err(CliError::missing_resource(format!(
                "checkpoint {} does not exist",
                self.path.display()
            )));
        }
        info!("Inspecting {}", self.path.display());

        let reader = RecordReader::new(BufReader::new(File::open(&self.path)?));
        let mut stats = CheckpointStats::default();
        let mut head = Vec::with_capacity(self.head);
        for record in reader {
            let record = record?;
            if head.len() < self.head {
                head.push(RecordView::from(&record));
            }
            stats.add(&record);
        }

        if self.json {
            let report = InspectReport {
                path: &self.path,
                stats: &stats,
                head,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!("records:   {}", stats.records);
        for (thread, count) in &stats.per_thread {
            println!("  thread {:>3}: {}", thread, count);
        }
        if stats.unweighted > 0 {
            println!("unweighted: {}", stats.unweighted);
        }
        if let (Some(min), Some(max), Some(mean)) = (stats.weight_min, stats.weight_max, stats.weight_mean) {
            println!("weight:    {:.6}..={:.6} (mean {:.6})", min, max, mean);
        }
        if let (Some(min), Some(max)) = (stats.delay_min_ms, stats.delay_max_ms) {
            println!("delay ms:  {}..={}", min, max);
        }
        for view in &head {
            match view.weight {
                Some(w) => println!("{:>3} {:>8} {:>12.6} {:>8}", view.thread, view.slot, w, view.delay_ms),
                None => println!("{:>3} {:>8} {:>12} {:>8}", view.thread, view.slot, "-", view.delay_ms),
            }
        }
        Ok(())
    }
}
