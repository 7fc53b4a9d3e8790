//! The CLI surface of spec.md §6 ("minimal, stable shape"): `submit`,
//! `status`, `plan`, and the three named daemons. `run-queue` is an
//! additive fourth daemon — the Queue Manager's own dispatch loop needs a
//! home, and spec.md names only the Scheduler/Worker/Poller processes.

use clap::{Parser, Subcommand};
use vpcp_types::QualityTier;

#[derive(Parser, Debug)]
#[command(name = "vpcp", about = "Video Production Control Plane", version)]
pub struct Cli {
    /// Path to the TOML configuration file (spec.md §6 "Configuration").
    #[arg(short, long, default_value = "vpcp.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Enqueues one `GenerationRequest` and prints its `request_id`.
    Submit {
        #[arg(long, value_enum)]
        tier: TierArg,
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value_t = 5)]
        duration_seconds: u32,
        #[arg(long, default_value = "16:9")]
        aspect_ratio: String,
        #[arg(long)]
        platform: Option<String>,
        /// RFC3339 deadline after which the request is no longer useful.
        #[arg(long)]
        deadline: Option<String>,
    },
    /// Prints queue depth, worker stats, and router health.
    Status {
        /// When set, also queries a running Worker's `/health`, `/stats`
        /// and `/failures` over HTTP.
        #[arg(long)]
        worker_url: Option<String>,
        #[arg(long, default_value_t = 10)]
        failures_limit: usize,
    },
    /// Prints the day's plan without enqueueing it (dry-run).
    Plan {
        /// `YYYY-MM-DD`, UTC.
        #[arg(long)]
        date: String,
    },
    /// Runs the Daily Scheduler daemon (C6).
    RunScheduler,
    /// Runs the Queue Manager's dispatch daemon (C2).
    RunQueue,
    /// Runs the Worker's HTTP surface (C3).
    RunWorker,
    /// Runs the Async Poller daemon (C5).
    RunPoller,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum TierArg {
    Premium,
    Standard,
    Volume,
}

impl From<TierArg> for QualityTier {
    fn from(value: TierArg) -> Self {
        match value {
            TierArg::Premium => QualityTier::Premium,
            TierArg::Standard => QualityTier::Standard,
            TierArg::Volume => QualityTier::Volume,
        }
    }
}
