//! `nsyn build`: wire a random network and push one round of spikes through it
//!
//! Example:
//!   nsyn build --threads 4 --units 1000 --fanout 100 --rescale-ms 0.05 --out net.ckpt
//!
//! Every unit sends one spike at step 0. With `--record-weights` a weight
//! recorder is replicated on each thread and receives one record per
//! delivered edge.

use anyhow::Context;
use clap::Args;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, warn};

use nsyn_core::{
    weight_recording::WeightRecords, ConnectRequest, Event, Network, Node, NodeAddress,
    NodeId, Resolution, StaticSynapse, WeightRecorder,
};
use nsyn_storage::{CheckpointSink, StreamSink};

use crate::{
    config::CliConfig,
    demo::{DemoUnit, InputTally},
    error::{CliError, CliResult},
};

/// Build a network and run one delivery round
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Number of worker threads (overrides the config file)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Number of spiking units
    #[arg(short, long, default_value = "100")]
    pub units: u64,

    /// Outgoing edges per unit
    #[arg(short, long, default_value = "10")]
    pub fanout: usize,

    /// Seed for the random wiring
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Simulation resolution in ms (overrides the config file)
    #[arg(long)]
    pub resolution_ms: Option<f64>,

    /// Smallest edge delay in ms
    #[arg(long, default_value = "1.0")]
    pub min_delay_ms: f64,

    /// Largest edge delay in ms
    #[arg(long, default_value = "2.0")]
    pub max_delay_ms: f64,

    /// Largest edge weight
    #[arg(long, default_value = "1.0")]
    pub max_weight: f64,

    /// Receptor ports per unit
    #[arg(long, default_value = "1")]
    pub receptors: u32,

    /// Switch to this resolution after delivery and recalibrate all delays
    #[arg(long)]
    pub rescale_ms: Option<f64>,

    /// Route weight records of every delivered edge to a replicated recorder
    #[arg(long)]
    pub record_weights: bool,

    /// Checkpoint output file
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Chunk size for the parallel checkpoint writer (overrides the config file)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Outcome of a build run
#[derive(Debug, Serialize)]
pub struct BuildSummary {
    /// Worker threads
    pub threads: usize,
    /// Spiking units
    pub units: u64,
    /// Edges created
    pub connections: usize,
    /// Final resolution in ms
    pub resolution_ms: f64,
    /// Smallest delay ever recorded, in steps at the final resolution
    pub min_delay_steps: Option<i64>,
    /// Largest delay ever recorded, in steps at the final resolution
    pub max_delay_steps: Option<i64>,
    /// Edges that delivered a spike
    pub delivered: usize,
    /// Edges skipped because they are disabled
    pub skipped_disabled: usize,
    /// Weight records routed to the recorder
    pub recorded: usize,
    /// Delivery failures
    pub delivery_errors: usize,
    /// Events handled by the units
    pub received_events: u64,
    /// Sum of weights handled by the units
    pub received_weight: f64,
    /// Weight records held by the recorder replicas
    pub weight_records: usize,
    /// Checkpoint written, if any
    pub checkpoint: Option<CheckpointSummary>,
}

/// Checkpoint outcome
#[derive(Debug, Serialize)]
pub struct CheckpointSummary {
    /// Output file
    pub path: PathBuf,
    /// Records written
    pub written: usize,
    /// Disabled edges left out
    pub skipped_disabled: usize,
    /// Edges whose target could not be resolved
    pub skipped_unresolved: usize,
    /// Chunk size used, if the parallel writer ran
    pub chunk_size: Option<usize>,
}

impl BuildCommand {
    /// Run the command
    pub fn execute(self, config_path: Option<&Path>) -> CliResult<()> {
        let mut config = CliConfig::resolve(config_path)?;
        if let Some(threads) = self.threads {
            config.kernel.num_threads = threads;
        }
        if let Some(resolution_ms) = self.resolution_ms {
            config.kernel.resolution_ms = resolution_ms;
        }
        let chunk_size = self.chunk_size.or(config.checkpoint.chunk_size);

        self.check_args()?;

        let mut net = Network::new(&config.kernel)?;
        let syn = net.register_synapse::<StaticSynapse>("static_synapse")?;

        let tally = Arc::new(InputTally::default());
        let mut addresses: Vec<NodeAddress> = Vec::with_capacity(self.units as usize);
        for raw in 0..self.units {
            let id = NodeId::new(raw);
            let thread = net.thread_for(id);
            let unit = DemoUnit::new(id, self.receptors - 1, tally.clone());
            addresses.push(net.add_node(thread, Box::new(unit))?);
        }

        let records = WeightRecords::default();
        if self.record_weights {
            let recorder_id = NodeId::new(self.units);
            let shared = records.clone();
            net.add_replicated(move |_| -> Box<dyn Node> {
                Box::new(WeightRecorder::with_records(recorder_id, shared.clone()))
            })?;
            net.set_weight_recorder(syn, Some(recorder_id))?;
        }

        self.wire(&mut net, syn)?;
        info!(
            "{} units on {} threads with {} connections",
            self.units,
            net.num_threads(),
            net.num_connections()
        );

        let mut delivered = 0;
        let mut skipped_disabled = 0;
        let mut recorded = 0;
        let mut delivery_errors = 0;
        for (raw, address) in addresses.iter().enumerate() {
            let event = Event::spike(NodeId::new(raw as u64), 0).with_sender(*address);
            let report = net.deliver(&event);
            for error in &report.errors {
                warn!("delivery from unit {} failed: {}", raw, error);
            }
            delivered += report.delivered;
            skipped_disabled += report.skipped_disabled;
            recorded += report.recorded;
            delivery_errors += report.errors.len();
        }

        if let Some(step_ms) = self.rescale_ms {
            let resolution = Resolution::from_ms(step_ms, config.kernel.tics_per_ms)?;
            net.change_resolution(resolution)?;
        }

        let checkpoint = match &self.out {
            Some(path) => Some(write_checkpoint(&net, path, chunk_size)?),
            None => None,
        };

        let checker = net.context().delay_checker();
        let summary = BuildSummary {
            threads: net.num_threads(),
            units: self.units,
            connections: net.num_connections(),
            resolution_ms: net.context().resolution().step_ms(),
            min_delay_steps: checker.min_delay(),
            max_delay_steps: checker.max_delay(),
            delivered,
            skipped_disabled,
            recorded,
            delivery_errors,
            received_events: tally.events(),
            received_weight: tally.total_weight(),
            weight_records: records.lock().len(),
            checkpoint,
        };
        print_summary(&summary, self.json)
    }

    fn check_args(&self) -> CliResult<()> {
        if self.receptors == 0 {
            return Err(CliError::invalid_args("units need at least one receptor"));
        }
        if self.fanout > 0 && self.units < 2 {
            return Err(CliError::invalid_args("wiring needs at least two units"));
        }
        if !(self.min_delay_ms > 0.0 && self.min_delay_ms <= self.max_delay_ms) {
            return Err(CliError::invalid_args(format!(
                "delay range [{}, {}] ms is empty or not positive",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        if !(self.max_weight.is_finite() && self.max_weight >= 0.0) {
            return Err(CliError::invalid_args(format!(
                "max weight must be finite and non-negative, got {}",
                self.max_weight
            )));
        }
        Ok(())
    }

    /// Connect every unit to `fanout` random other units
    fn wire(&self, net: &mut Network, syn: nsyn_core::SynapseTypeId) -> CliResult<()> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        for source in 0..self.units {
            for _ in 0..self.fanout {
                let mut target = rng.gen_range(0..self.units - 1);
                if target >= source {
                    target += 1;
                }
                let request = ConnectRequest::new(syn)
                    .receptor(rng.gen_range(0..self.receptors))
                    .delay_ms(rng.gen_range(self.min_delay_ms..=self.max_delay_ms))
                    .weight(rng.gen_range(0.0..=self.max_weight));
                net.connect::<StaticSynapse>(NodeId::new(source), NodeId::new(target), request)?;
            }
        }
        Ok(())
    }
}

fn write_checkpoint(
    net: &Network,
    path: &Path,
    chunk_size: Option<usize>,
) -> CliResult<CheckpointSummary> {
    let dump = match chunk_size {
        Some(chunk) => net.dump_chunked(path, chunk)?,
        None => {
            let file = File::create(path)
                .with_context(|| format!("cannot create checkpoint {}", path.display()))?;
            let mut sink = StreamSink::new(BufWriter::new(file));
            let dump = net.dump(&mut sink)?;
            info!("{} bytes written", sink.bytes_written());
            sink.into_inner().flush()?;
            dump
        }
    };
    info!("checkpoint written to {}", path.display());

    Ok(CheckpointSummary {
        path: path.to_path_buf(),
        written: dump.written,
        skipped_disabled: dump.skipped_disabled,
        skipped_unresolved: dump.skipped_unresolved,
        chunk_size,
    })
}

fn print_summary(summary: &BuildSummary, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("threads:          {}", summary.threads);
    println!("units:            {}", summary.units);
    println!("connections:      {}", summary.connections);
    println!("resolution (ms):  {}", summary.resolution_ms);
    if let (Some(min), Some(max)) = (summary.min_delay_steps, summary.max_delay_steps) {
        println!("delay (steps):    {}..={}", min, max);
    }
    println!("delivered:        {}", summary.delivered);
    println!("received events:  {}", summary.received_events);
    println!("received weight:  {:.6}", summary.received_weight);
    if summary.recorded > 0 {
        println!("weight records:   {}", summary.weight_records);
    }
    if summary.delivery_errors > 0 {
        println!("delivery errors:  {}", summary.delivery_errors);
    }
    if let Some(ckpt) = &summary.checkpoint {
        println!("checkpoint:       {} ({} records)", ckpt.path.display(), ckpt.written);
    }
    Ok(())
}
