//! Command-line surface: `depeg-sim run` / `depeg-sim monte-carlo`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Discrete-event market simulator for a depeg-insurance protocol.
#[derive(Parser)]
#[command(name = "depeg-sim", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a single simulation and print/emit its stats.
    Run(RunArgs),

    /// Fan `--simulations` independent runs out over a rayon pool and print
    /// a results table.
    MonteCarlo(MonteCarloArgs),
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Full multi-token scenario, as an `EngineConfig` JSON document. When
    /// absent, a single-LST scenario is built from the flags below.
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// Symbol to register for the single-LST convenience mode (ignored when
    /// `--scenario` is given).
    #[arg(long, default_value = "X")]
    pub symbol: String,

    /// Total blocks to simulate.
    #[arg(long, default_value_t = 100)]
    pub num_blocks: u64,

    /// Block at which the PSM's phase flips from pre- to post-expiry.
    /// Defaults to `num_blocks` (expiry never reached mid-run).
    #[arg(long)]
    pub psm_expiry_after_block: Option<u64>,

    /// RNG seed for agent shuffling (and, for `monte-carlo`, the base seed
    /// each run's seed is derived from).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Default ETH yield applied to every wallet each block.
    #[arg(long, default_value_t = 0.0)]
    pub eth_yield_per_block: f64,

    /// Path to a JSON event file.
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Print the per-block action log as the run progresses.
    #[arg(long)]
    pub print_stats: bool,

    /// Skip wiring the reference agent catalogue; useful for isolating
    /// pure event-driven price behavior.
    #[arg(long)]
    pub no_agents: bool,

    /// ETH seeded into each reference agent's wallet at genesis.
    #[arg(long, default_value_t = 1_000.0)]
    pub initial_agent_balance: f64,

    /// Write the stats series + trade log as JSON to this path.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Clone)]
pub struct MonteCarloArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Number of independent simulations to run.
    #[arg(long, default_value_t = 10)]
    pub simulations: usize,
}
