//! TraceGrid Core - proximity contact tracing on a discretized grid
//!
//! This library splits contact tracing into three engines:
//! 1. **Space**: `GridPartition` maps coordinates in the unit square to tiles
//! 2. **Agent**: `LocalAgent` keeps a private contact ledger per user and
//!    infers its own infection from a coordinator-supplied snapshot
//! 3. **Coordinator**: detects co-location, drives the agents and keeps the
//!    global "earliest known infection time" map

pub mod agent;
pub mod coordinator;
pub mod error;
pub mod grid;
pub mod types;

// Re-export key types for convenience
pub use agent::LocalAgent;
pub use coordinator::{Coordinator, CoordinatorConfig, InfectionRegistry, PropagationMode, StepView};
pub use error::{TraceError, TraceResult};
pub use grid::GridPartition;
pub use types::{
    CollisionGroup, InfectionEvent, InfectionSnapshot, PositionRow, PositionUpdate, TileId,
    TimeStep, UserId,
};
