//! The CLI and process entry points for the video production control
//! plane (spec.md §6): `submit`/`status`/`plan` plus the Scheduler, Queue,
//! Worker and Poller daemons, and the `AppConfig` that wires them all from
//! one TOML file.

mod cli;
mod commands;
mod config;
mod error;
mod wiring;

pub use cli::{Cli, Command, TierArg};
pub use commands::run;
pub use config::{AppConfig, ConfigError, ProviderConfig};
pub use error::CliError;
pub use wiring::Stack;
