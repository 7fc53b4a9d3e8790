//! `CliError`: maps a subcommand failure onto the exit codes spec.md §6
//! names (`0` success, `2` misconfiguration, `3` transient runtime failure,
//! `4` permanent runtime failure).

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Transient(_) => 3,
            CliError::Permanent(_) => 4,
        }
    }
}

impl From<vpcp_queue::QueueError> for CliError {
    fn from(err: vpcp_queue::QueueError) -> Self {
        CliError::Transient(err.to_string())
    }
}

impl From<vpcp_scheduler::SchedulerError> for CliError {
    fn from(err: vpcp_scheduler::SchedulerError) -> Self {
        CliError::Transient(err.to_string())
    }
}

impl From<reqwest::Error> for CliError {
    fn from(err: reqwest::Error) -> Self {
        CliError::Transient(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Transient(err.to_string())
    }
}
