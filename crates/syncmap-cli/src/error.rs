use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] syncmap_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid field '{0}', expected NAME=VALUE")]
    InvalidField(String),
    #[error("No input provided")]
    EmptyInput,
    #[error("{failed} of {total} reconciliation event(s) failed")]
    ReconcileFailed { failed: usize, total: usize },
}
