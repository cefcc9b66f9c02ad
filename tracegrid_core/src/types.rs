//! Common identifier and record types shared by the TraceGrid engines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable identifier of a simulated user (one per device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl UserId {
    /// Returns the raw numeric id.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for UserId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user {}", self.0)
    }
}

/// Discrete simulation time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeStep(pub u64);

impl TimeStep {
    /// Returns the raw step number.
    pub fn get(&self) -> u64 {
        self.0
    }

    /// Returns the following step.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u64> for TimeStep {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for TimeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t={}", self.0)
    }
}

/// Identifier of one grid cell, in `[0, N²)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileId(pub usize);

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tile {}", self.0)
    }
}

/// Mapping user → earliest known infection time.
///
/// Ordered by user id so every scan over it is deterministic.
pub type InfectionSnapshot = BTreeMap<UserId, TimeStep>;

/// One row of the position feed for a single step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub user: UserId,
    pub x: f64,
    pub y: f64,
}

impl PositionUpdate {
    pub fn new(user: impl Into<UserId>, x: f64, y: f64) -> Self {
        Self {
            user: user.into(),
            x,
            y,
        }
    }
}

/// A tiled row of the coordinator's position table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRow {
    pub user: UserId,
    pub x: f64,
    pub y: f64,
    pub tile: TileId,
}

/// Users sharing one tile during the current step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionGroup {
    /// The contended tile
    pub tile: TileId,

    /// Occupants, in position-table order
    pub members: Vec<UserId>,
}

/// Notification emitted whenever the global infection map gains a new or
/// earlier entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfectionEvent {
    pub user: UserId,
    pub infected_at: TimeStep,

    /// Earlier record that this event replaced, if any
    pub previous: Option<TimeStep>,
}
