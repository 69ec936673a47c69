// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Command-line driver for sampled-LSH mining and mhlink clustering.
//!
//! - `slsh mine`: mine co-occurring rows from a text store
//! - `slsh cluster`: cluster mined topics

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::*;
use serde::de::DeserializeOwned;
use serde_json::json;

use slsh::persistence::{load_json, load_lists, load_vectors, save, save_json};
use slsh::postprocess::cutoff;
use slsh::random::DEFAULT_SEED;
use slsh::{
    mhlink, mine_l1, mine_lp, parallel, ClusterParams, ListStore, LpParams, LshContext,
    MergePolicy, MiningParams, Overlap, Parallelism, StableDistribution, TopicMode,
};

#[derive(Parser)]
#[command(name = "slsh", version)]
#[command(about = "Mine co-occurring items with sampled locality-sensitive hashing")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mine co-occurring rows of a sparse store
    Mine(MineArgs),
    /// Cluster mined topics by bucket-driven single linkage
    Cluster(ClusterArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum Scheme {
    /// Weighted sampling of integer frequencies
    L1,
    /// Stable random projections of real values
    Lp,
}

#[derive(Clone, Copy, ValueEnum)]
enum Norm {
    L1,
    L2,
}

#[derive(Clone, Copy, ValueEnum)]
enum Topics {
    Neighbourhood,
    Buckets,
}

#[derive(Clone, Copy, ValueEnum)]
enum OverlapArg {
    MinSize,
    Jaccard,
}

#[derive(Clone, Copy, ValueEnum)]
enum MergeArg {
    Sum,
    Max,
}

#[derive(Args)]
struct MineArgs {
    /// Input store in the text list format
    input: PathBuf,

    /// Output path for the mined topics
    #[arg(short, long)]
    output: PathBuf,

    #[arg(long, value_enum, default_value = "l1")]
    scheme: Scheme,

    /// JSON file with mining parameters; flags override its values
    #[arg(long)]
    params: Option<PathBuf>,

    #[arg(short = 'r', long)]
    tuple_size: Option<usize>,

    #[arg(short = 'l', long)]
    num_tuples: Option<usize>,

    #[arg(long)]
    table_size: Option<usize>,

    /// Cap on collision counts and sampled weights
    #[arg(long)]
    max_value: Option<u32>,

    #[arg(long, value_enum)]
    topics: Option<Topics>,

    /// Norm approximated by the projections (lp scheme)
    #[arg(long, value_enum, default_value = "l1")]
    norm: Norm,

    /// Quantization width of the projections (lp scheme)
    #[arg(short, long)]
    width: Option<f64>,

    /// Read real-valued input and scale it to integer frequencies (l1 scheme)
    #[arg(long)]
    scale: Option<f64>,

    /// Mine the transpose of the input (items instead of rows)
    #[arg(long)]
    transpose: bool,

    /// Drop mined topics with fewer entries
    #[arg(long, default_value_t = 0)]
    min_size: usize,

    /// Drop mined topics with more entries
    #[arg(long)]
    max_size: Option<usize>,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Compute signatures on a single thread
    #[arg(long)]
    sequential: bool,

    /// Write JSON instead of the text format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ClusterArgs {
    /// Mined topics in the text list format
    input: PathBuf,

    /// Output path for the cluster rows
    #[arg(short, long)]
    output: PathBuf,

    /// JSON file with clustering parameters; flags override its values
    #[arg(long)]
    params: Option<PathBuf>,

    #[arg(short = 'r', long)]
    tuple_size: Option<usize>,

    #[arg(short = 'l', long)]
    num_tuples: Option<usize>,

    #[arg(long)]
    table_size: Option<usize>,

    /// Minimum overlap for two topics to link
    #[arg(short, long)]
    threshold: Option<f64>,

    #[arg(long)]
    min_cluster_size: Option<usize>,

    #[arg(long, value_enum)]
    overlap: Option<OverlapArg>,

    #[arg(long, value_enum)]
    merge: Option<MergeArg>,

    /// Also write the member topics of each cluster as JSON
    #[arg(long)]
    members: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    #[arg(long)]
    sequential: bool,

    /// Write JSON instead of the text format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(n) = cli.threads {
        parallel::init_thread_pool(n)?;
    }
    debug!("using {} threads", parallel::thread_count());

    match cli.command {
        Command::Mine(args) => run_mine(args),
        Command::Cluster(args) => run_cluster(args),
    }
}

fn init_logging(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => (),
        1 => {
            builder.filter_level(LevelFilter::Info);
        }
        2 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    builder.init();
}

fn read_params<T: DeserializeOwned + Default>(path: &Option<PathBuf>) -> Result<T> {
    match path {
        Some(p) => load_json(p).with_context(|| format!("reading parameters from {}", p.display())),
        None => Ok(T::default()),
    }
}

fn write_store(path: &Path, store: &ListStore, json: bool) -> Result<()> {
    let res = if json {
        save_json(path, store)
    } else {
        save(path, store)
    };
    res.with_context(|| format!("writing {}", path.display()))
}

fn run_mine(args: MineArgs) -> Result<()> {
    let start = Instant::now();
    let mut params: MiningParams = read_params(&args.params)?;
    if let Some(v) = args.tuple_size {
        params.tuple_size = v;
    }
    if let Some(v) = args.num_tuples {
        params.num_tuples = v;
    }
    if let Some(v) = args.table_size {
        params.table_size = v;
    }
    if let Some(v) = args.max_value {
        params.max_value = v;
    }
    match args.topics {
        Some(Topics::Neighbourhood) => params.topics = TopicMode::Neighbourhood,
        Some(Topics::Buckets) => params.topics = TopicMode::Buckets,
        None => (),
    }
    if args.sequential {
        params.parallelism = Parallelism::Sequential;
    }

    let mut ctx = LshContext::seeded(args.seed);
    let (n_input, mut topics) = match args.scheme {
        Scheme::L1 => {
            let mut store = match args.scale {
                Some(f) => load_vectors(&args.input)?.scale_to_lists(f)?,
                None => load_lists(&args.input)?,
            };
            if args.transpose {
                store = store.transpose();
            }
            (store.size(), mine_l1(&store, &params, &mut ctx)?)
        }
        Scheme::Lp => {
            let mut store = load_vectors(&args.input)?;
            if args.transpose {
                store = store.transpose();
            }
            let lp = LpParams {
                width: args.width.unwrap_or(LpParams::default().width),
                distribution: match args.norm {
                    Norm::L1 => StableDistribution::Cauchy,
                    Norm::L2 => StableDistribution::Gaussian,
                },
            };
            (store.size(), mine_lp(&store, &params, &lp, &mut ctx)?)
        }
    };
    cutoff(
        &mut topics,
        args.min_size,
        args.max_size.unwrap_or(usize::MAX),
    );
    write_store(&args.output, &topics, args.json)?;

    let summary = json!({
        "command": "mine",
        "input_rows": n_input,
        "topics": topics.size(),
        "entries": topics.nnz(),
        "params": params,
        "seed": args.seed,
        "output": args.output,
        "seconds": start.elapsed().as_secs_f64(),
    });
    println!("{}", summary);
    Ok(())
}

fn run_cluster(args: ClusterArgs) -> Result<()> {
    let start = Instant::now();
    let mut params: ClusterParams = read_params(&args.params)?;
    if let Some(v) = args.tuple_size {
        params.tuple_size = v;
    }
    if let Some(v) = args.num_tuples {
        params.num_tuples = v;
    }
    if let Some(v) = args.table_size {
        params.table_size = v;
    }
    if let Some(v) = args.threshold {
        params.threshold = v;
    }
    if let Some(v) = args.min_cluster_size {
        params.min_cluster_size = v;
    }
    match args.overlap {
        Some(OverlapArg::MinSize) => params.overlap = Overlap::MinSize,
        Some(OverlapArg::Jaccard) => params.overlap = Overlap::Jaccard,
        None => (),
    }
    match args.merge {
        Some(MergeArg::Sum) => params.merge = MergePolicy::Sum,
        Some(MergeArg::Max) => params.merge = MergePolicy::Max,
        None => (),
    }
    if args.sequential {
        params.parallelism = Parallelism::Sequential;
    }

    let topics = load_lists(&args.input)?;
    let mut ctx = LshContext::seeded(args.seed);
    let result = mhlink(&topics, &params, &mut ctx)?;
    write_store(&args.output, &result.clusters, args.json)?;
    if let Some(path) = &args.members {
        save_json(path, &result.members)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    let summary = json!({
        "command": "cluster",
        "topics": topics.size(),
        "clusters": result.clusters.size(),
        "params": params,
        "seed": args.seed,
        "output": args.output,
        "seconds": start.elapsed().as_secs_f64(),
    });
    println!("{}", summary);
    Ok(())
}
