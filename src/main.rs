//! kmeans-par command line
//!
//! Runs a fixed-iteration k-means over an integer dataset file with one of the execution
//! strategies and prints exactly two lines to stdout: the elapsed seconds of the iteration
//! loop and the checksum of the final centroids. Diagnostics and logs go to stderr.
//!
//! # Commands
//!
//! - `threads`: explicit worker threads
//! - `parallel-for`: rayon parallel loop
//! - `distributed`: one process per rank, connected over TCP

use clap::{Args, Parser, Subcommand};
use kmeans_par::{KMeans, KMeansConfig, KMeansError, KMeansState, Result, RunContext, TcpRoot, DEFAULT_SEED};
use std::{
    net::SocketAddr,
    path::PathBuf,
    process::{Child, Command, Stdio},
    time::Duration,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const ACCEPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed-iteration integer k-means with interchangeable execution strategies
#[derive(Parser)]
#[command(name = "kmeans-par", version)]
#[command(about = "Fixed-iteration integer k-means over threads, a parallel loop or message passing")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv), logs are written to stderr
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Seed of the initial centroid selection
    #[arg(long, global = true, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Additionally print the final centroids after the two result lines
    #[arg(long, global = true)]
    centroids: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Debug)]
struct RunArgs {
    /// Dataset file: whitespace separated integers, one point after the other
    data: PathBuf,
    /// Amount of points (N)
    points: usize,
    /// Dimensions per point (D)
    dims: usize,
    /// Amount of clusters (K)
    clusters: usize,
    /// Amount of iterations (I)
    iterations: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Explicit worker threads, one per static partition
    Threads {
        #[command(flatten)]
        run: RunArgs,
        /// Amount of worker threads
        threads: usize,
    },
    /// Assignment phase as rayon parallel loop
    ParallelFor {
        #[command(flatten)]
        run: RunArgs,
        /// Amount of threads of the rayon pool
        threads: usize,
    },
    /// One process per rank, exchanging data through collectives only
    Distributed {
        #[command(flatten)]
        run: RunArgs,
        /// Amount of ranks (processes)
        #[arg(long)]
        processes: usize,
        /// Address of rank 0. Rank 0 binds it, all other ranks connect to it
        #[arg(long, default_value = "127.0.0.1:0")]
        root: String,
        /// Rank of this process. Omitted on rank 0, which starts all other ranks itself
        #[arg(long)]
        rank: Option<usize>,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        error!(error = %e, "k-means failed");
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Threads { run, threads } => {
            let kmean = load(run)?;
            let config = KMeansConfig::build().seed(cli.seed).workers(*threads).build();
            let result = kmean.kmeans_threads(run.clusters, run.iterations, KMeans::init_shuffled_sample, &config)?;
            report(cli, &result);
        }
        Commands::ParallelFor { run, threads } => {
            let kmean = load(run)?;
            let config = KMeansConfig::build().seed(cli.seed).workers(*threads).build();
            let result = kmean.kmeans_parallel_for(run.clusters, run.iterations, KMeans::init_shuffled_sample, &config)?;
            report(cli, &result);
        }
        Commands::Distributed { run, processes, root, rank: Some(rank) } => {
            let root: SocketAddr = root.parse()
                .map_err(|e| KMeansError::InvalidArgument(format!("invalid root address '{}': {}", root, e)))?;
            let mut comm = kmeans_par::connect(root, *rank, *processes)?;
            let config = KMeansConfig::build().seed(cli.seed).build();
            KMeans::<i32>::join_distributed(&mut comm, run.points, run.dims, run.clusters, run.iterations, &config)?;
            debug!(rank, "rank finished");
        }
        Commands::Distributed { run, processes, root, rank: None } => {
            RunContext::new(run.points, run.dims, run.clusters, run.iterations, *processes, 0)?;
            let kmean = load(run)?;
            let group = TcpRoot::bind(root.as_str(), *processes)?;
            let addr = group.local_addr()?;
            info!(%addr, ranks = processes, "root listening");

            let ranks = RankProcesses::spawn(cli, run, *processes, addr)?;
            let mut comm = group.accept_group(ACCEPT_TIMEOUT)?;
            let config = KMeansConfig::build().seed(cli.seed).build();
            let result = kmean.kmeans_distributed(&mut comm, run.clusters, run.iterations, KMeans::init_shuffled_sample, &config)?;
            drop(comm);
            ranks.wait_all()?;
            report(cli, &result);
        }
    }
    Ok(())
}

fn load(run: &RunArgs) -> Result<KMeans<i32>> {
    let samples = kmeans_par::read_dataset(&run.data, run.points, run.dims)?;
    Ok(KMeans::from_matrix(samples))
}

fn report(cli: &Cli, result: &KMeansState<i32>) {
    println!("{:.6}", result.elapsed.as_secs_f64());
    println!("{}", result.checksum());
    if cli.centroids {
        println!();
        print!("{}", result.describe_centroids());
    }
}

/// The processes of ranks 1..P, started by rank 0. Processes that were not waited for
/// are killed on drop, so a failing root leaves no ranks behind.
struct RankProcesses {
    children: Vec<(usize, Child)>,
}
impl RankProcesses {
    fn spawn(cli: &Cli, run: &RunArgs, processes: usize, root: SocketAddr) -> Result<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| KMeansError::Resource(format!("failed to locate own executable: {}", e)))?;
        let mut ranks = Self { children: Vec::with_capacity(processes.saturating_sub(1)) };
        for rank in 1..processes {
            let mut cmd = Command::new(&exe);
            if cli.verbose > 0 {
                cmd.arg(format!("-{}", "v".repeat(cli.verbose as usize)));
            }
            cmd.arg("--seed").arg(cli.seed.to_string())
                .arg("distributed")
                .arg(&run.data)
                .args([run.points, run.dims, run.clusters, run.iterations].map(|v| v.to_string()))
                .arg("--processes").arg(processes.to_string())
                .arg("--root").arg(root.to_string())
                .arg("--rank").arg(rank.to_string())
                .stdin(Stdio::null())
                .stdout(Stdio::null());
            let child = cmd.spawn()
                .map_err(|e| KMeansError::Resource(format!("failed to start rank {}: {}", rank, e)))?;
            debug!(rank, pid = child.id(), "rank started");
            ranks.children.push((rank, child));
        }
        Ok(ranks)
    }

    /// Wait for every rank, a rank exiting unsuccessfully is an error.
    fn wait_all(mut self) -> Result<()> {
        let mut failed = Vec::new();
        for (rank, mut child) in std::mem::take(&mut self.children) {
            match child.wait() {
                Ok(status) if status.success() => debug!(rank, "rank exited"),
                Ok(status) => failed.push(format!("rank {} ({})", rank, status)),
                Err(e) => failed.push(format!("rank {} (wait failed: {})", rank, e)),
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(KMeansError::Resource(format!("{} exited unsuccessfully", failed.join(", "))))
        }
    }
}
impl Drop for RankProcesses {
    fn drop(&mut self) {
        for (rank, child) in self.children.iter_mut() {
            warn!(rank, "terminating rank");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
