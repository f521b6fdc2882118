// src/error.rs

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The solver stopped without a usable optimum. `last_iterate` is the
    /// point it stopped at and must not be treated as optimal.
    #[error("Optimization did not converge (status: {status})")]
    DidNotConverge { last_iterate: Vec<f64>, status: String },
}

pub type AllocationResult<T> = Result<T, AllocationError>;
