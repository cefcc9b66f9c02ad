//! Coordinator - the server side of contact tracing.
//!
//! The coordinator only ever holds the *current* step's positions. Movement
//! history lives exclusively in each `LocalAgent`'s ledger.
//!
//! # Step protocol
//!
//! ```text
//! feed ──► update_positions ──► find_collisions ──► check_infection_groups
//!                                                        │
//!                              LocalAgent::record_contacts (per member)
//!                                                        │
//!                                         reconcile_infection (earliest wins)
//! ```
//!
//! `declare_infection` is the out-of-band path: a user self-reports, and the
//! coordinator re-asks every agent against the updated infection map.

use crate::agent::LocalAgent;
use crate::error::{TraceError, TraceResult};
use crate::grid::GridPartition;
use crate::types::{
    CollisionGroup, InfectionEvent, InfectionSnapshot, PositionRow, PositionUpdate, TileId,
    TimeStep, UserId,
};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How far a declared infection is propagated before `declare_infection`
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PropagationMode {
    /// One pass over all users. Transitive chains need a later trigger.
    SingleSweep,

    /// Repeat passes until nothing changes.
    #[default]
    FixedPoint,
}

/// Configuration for a coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Propagation semantics for declared infections
    pub propagation: PropagationMode,

    /// Upper bound on sweeps in fixed-point mode
    pub max_sweeps: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            propagation: PropagationMode::FixedPoint,
            max_sweeps: 1024,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_propagation(mut self, mode: PropagationMode) -> Self {
        self.propagation = mode;
        self
    }

    pub fn with_max_sweeps(mut self, sweeps: usize) -> Self {
        self.max_sweeps = sweeps.max(1);
        self
    }
}

/// Authoritative user → earliest infection time map.
///
/// Entries are never removed and only ever move earlier.
#[derive(Debug, Clone, Default)]
pub struct InfectionRegistry {
    infected: InfectionSnapshot,
    events: Vec<InfectionEvent>,
}

impl InfectionRegistry {
    /// Merges a candidate report. Returns the event if it was new or earlier.
    pub fn reconcile(&mut self, user: UserId, t: TimeStep) -> Option<InfectionEvent> {
        let previous = self.infected.get(&user).copied();
        if matches!(previous, Some(recorded) if recorded <= t) {
            return None;
        }

        self.infected.insert(user, t);
        let event = InfectionEvent {
            user,
            infected_at: t,
            previous,
        };
        self.events.push(event);
        info!("{} has been infected at {}", user, t);
        Some(event)
    }

    pub fn snapshot(&self) -> &InfectionSnapshot {
        &self.infected
    }

    pub fn get(&self, user: UserId) -> Option<TimeStep> {
        self.infected.get(&user).copied()
    }

    pub fn len(&self) -> usize {
        self.infected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infected.is_empty()
    }

    /// Every accepted report, in the order it was accepted.
    pub fn events(&self) -> &[InfectionEvent] {
        &self.events
    }
}

/// Read-only view of one step, for renderers and exporters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepView {
    pub step: Option<TimeStep>,
    pub positions: Vec<PositionRow>,
    pub infected: BTreeMap<UserId, TimeStep>,
}

/// The central coordinator.
pub struct Coordinator {
    /// Configuration
    config: CoordinatorConfig,

    /// Shared grid
    grid: Arc<GridPartition>,

    /// One agent per user, created up front
    agents: BTreeMap<UserId, LocalAgent>,

    /// Latest position snapshot, sorted by user id
    positions: Vec<PositionRow>,

    /// Global infection map
    registry: InfectionRegistry,

    /// Latest step handed to `check_infection_groups`
    last_step: Option<TimeStep>,
}

impl Coordinator {
    /// Creates a coordinator for users `0..user_count`.
    pub fn new(grid: Arc<GridPartition>, user_count: usize, config: CoordinatorConfig) -> Self {
        let agents = (0..user_count as u64)
            .map(|i| (UserId(i), LocalAgent::new(UserId(i))))
            .collect();

        Self {
            config,
            grid,
            agents,
            positions: Vec::new(),
            registry: InfectionRegistry::default(),
            last_step: None,
        }
    }

    /// Creates a coordinator sized by `initial` and places its users.
    pub fn with_positions(
        grid: Arc<GridPartition>,
        config: CoordinatorConfig,
        initial: &[PositionUpdate],
    ) -> TraceResult<Self> {
        let mut coordinator = Self::new(grid, initial.len(), config);
        coordinator.update_positions(initial)?;
        Ok(coordinator)
    }

    /// Replaces the position table with `feed` and re-tiles every row.
    ///
    /// The whole feed is validated before anything is replaced.
    pub fn update_positions(&mut self, feed: &[PositionUpdate]) -> TraceResult<()> {
        let expected = self.agents.len();
        let mut seen = BTreeSet::new();
        let mut rows = Vec::with_capacity(feed.len());

        for update in feed {
            self.ensure_known(update.user)?;
            seen.insert(update.user);
            let tile = self.grid.tile_id(update.x, update.y)?;
            rows.push(PositionRow {
                user: update.user,
                x: update.x,
                y: update.y,
                tile,
            });
        }

        if feed.len() != expected {
            return Err(TraceError::shape(expected, feed.len()));
        }
        if seen.len() != expected {
            // Duplicate rows leave some user without a position
            return Err(TraceError::shape(expected, seen.len()));
        }

        rows.sort_by_key(|row| row.user);
        self.positions = rows;
        Ok(())
    }

    /// Groups the current rows by tile and keeps tiles with 2+ occupants.
    ///
    /// Groups come back ordered by tile id; members keep position-table
    /// order.
    pub fn find_collisions(&self) -> Vec<CollisionGroup> {
        let mut by_tile: BTreeMap<TileId, Vec<UserId>> = BTreeMap::new();
        for row in &self.positions {
            by_tile.entry(row.tile).or_default().push(row.user);
        }

        by_tile
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(tile, members)| CollisionGroup { tile, members })
            .collect()
    }

    /// Delivers each collision group to its members and reconciles whatever
    /// they report.
    ///
    /// Returns true if any report was a new or earlier infection.
    pub fn check_infection_groups(
        &mut self,
        groups: &[CollisionGroup],
        t: TimeStep,
    ) -> TraceResult<bool> {
        if let Some(last) = self.last_step {
            if t < last {
                return Err(TraceError::TimeRegression { last, got: t });
            }
        }
        for member in groups.iter().flat_map(|g| g.members.iter()) {
            self.ensure_known(*member)?;
        }
        self.last_step = Some(t);

        let mut new_infections = false;
        for group in groups {
            debug!("{} at {}: {} users in contact", group.tile, t, group.members.len());

            for user in &group.members {
                let Some(agent) = self.agents.get_mut(user) else {
                    continue;
                };
                let verdict = agent.record_contacts(t, &group.members, self.registry.snapshot());

                if let Some(infected_at) = verdict {
                    if self.registry.reconcile(*user, infected_at).is_some() {
                        new_infections = true;
                    }
                }
            }
        }

        Ok(new_infections)
    }

    /// Merges a candidate infection report into the global map.
    ///
    /// Returns true only if the user was unknown to the map or the report
    /// is strictly earlier than the recorded time.
    pub fn reconcile_infection(&mut self, user: UserId, t: TimeStep) -> TraceResult<bool> {
        self.ensure_known(user)?;
        Ok(self.registry.reconcile(user, t).is_some())
    }

    /// Records an externally reported infection and propagates it.
    ///
    /// Returns true if propagation changed any other record.
    pub fn declare_infection(&mut self, user: UserId, t: TimeStep) -> TraceResult<bool> {
        let agent = self
            .agents
            .get_mut(&user)
            .ok_or(TraceError::UnknownUser(user))?;
        let declared = agent.declare(t);

        if self.registry.reconcile(user, declared).is_none() {
            return Ok(false);
        }

        Ok(self.propagate() > 0)
    }

    /// Re-evaluates every agent against the global map, per the configured
    /// mode. Returns the number of new or earlier records.
    pub fn propagate(&mut self) -> usize {
        match self.config.propagation {
            PropagationMode::SingleSweep => self.sweep(),
            PropagationMode::FixedPoint => {
                // At least one sweep, even if the config was built by hand
                let limit = self.config.max_sweeps.max(1);
                let mut total = 0;
                for round in 1..=limit {
                    let changed = self.sweep();
                    total += changed;
                    if changed == 0 {
                        debug!("propagation settled after {} sweeps", round);
                        return total;
                    }
                }
                warn!(
                    "propagation stopped at max_sweeps={} before settling",
                    limit
                );
                total
            }
        }
    }

    /// One pass over all users against a single snapshot of the map.
    fn sweep(&mut self) -> usize {
        let snapshot = self.registry.snapshot().clone();
        let mut changed = 0;

        for (user, agent) in self.agents.iter_mut() {
            if let Some(infected_at) = agent.infer_infection(&snapshot) {
                if self.registry.reconcile(*user, infected_at).is_some() {
                    changed += 1;
                }
            }
        }

        changed
    }

    fn ensure_known(&self, user: UserId) -> TraceResult<()> {
        if self.agents.contains_key(&user) {
            Ok(())
        } else {
            Err(TraceError::UnknownUser(user))
        }
    }

    // ═══════════════════════════════════════════════════
    // Read-only views
    // ═══════════════════════════════════════════════════

    pub fn grid(&self) -> &Arc<GridPartition> {
        &self.grid
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn positions(&self) -> &[PositionRow] {
        &self.positions
    }

    pub fn infected(&self) -> &InfectionSnapshot {
        self.registry.snapshot()
    }

    pub fn infection_time(&self, user: UserId) -> Option<TimeStep> {
        self.registry.get(user)
    }

    pub fn is_infected(&self, user: UserId) -> bool {
        self.registry.get(user).is_some()
    }

    pub fn infected_count(&self) -> usize {
        self.registry.len()
    }

    pub fn events(&self) -> &[InfectionEvent] {
        self.registry.events()
    }

    pub fn agent(&self, user: UserId) -> Option<&LocalAgent> {
        self.agents.get(&user)
    }

    pub fn user_count(&self) -> usize {
        self.agents.len()
    }

    pub fn last_step(&self) -> Option<TimeStep> {
        self.last_step
    }

    /// Snapshot of positions and infection state for rendering.
    pub fn frame(&self) -> StepView {
        StepView {
            step: self.last_step,
            positions: self.positions.clone(),
            infected: self.registry.snapshot().clone(),
        }
    }
}
