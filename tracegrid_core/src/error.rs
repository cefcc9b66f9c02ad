//! Error types for the TraceGrid engines.

use crate::types::{TimeStep, UserId};
use thiserror::Error;

/// Errors surfaced by grid, agent and coordinator operations.
///
/// Every variant is an input or programming error; none of them is retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TraceError {
    /// Position feed does not carry exactly one row per known user
    #[error("Input shape error: expected {expected} position rows, got {got}")]
    InputShape { expected: usize, got: usize },

    /// Coordinate outside the unit square (or NaN)
    #[error("Coordinate out of range: ({x}, {y}) is outside [0,1]x[0,1]")]
    CoordinateOutOfRange { x: f64, y: f64 },

    /// Operation referenced a user the coordinator does not know
    #[error("Unknown user: {0}")]
    UnknownUser(UserId),

    /// Grid resolution must be at least one tile per axis
    #[error("Invalid grid resolution: {0}")]
    InvalidResolution(usize),

    /// Contacts must be recorded in non-decreasing step order
    #[error("Time regression: last processed {last}, got {got}")]
    TimeRegression { last: TimeStep, got: TimeStep },
}

impl TraceError {
    /// Creates an out-of-range error for the given point.
    pub fn out_of_range(x: f64, y: f64) -> Self {
        Self::CoordinateOutOfRange { x, y }
    }

    /// Creates an input shape error.
    pub fn shape(expected: usize, got: usize) -> Self {
        Self::InputShape { expected, got }
    }
}

/// Result alias used throughout the core crate.
pub type TraceResult<T> = Result<T, TraceError>;
