//! Error types for the simulation harness.

use thiserror::Error;
use tracegrid_core::TraceError;

/// Errors that can occur while driving a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// The engine rejected an operation
    #[error("Engine error: {0}")]
    Engine(#[from] TraceError),

    /// Feed could not be constructed
    #[error("Feed error: {0}")]
    Feed(String),

    /// Scripted feed ran out of frames
    #[error("Feed exhausted after {0} frames")]
    FeedExhausted(usize),

    /// Export could not be written
    #[error("Export error: {0}")]
    Io(#[from] std::io::Error),

    /// Export could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for the harness.
pub type SimResult<T> = Result<T, SimError>;
