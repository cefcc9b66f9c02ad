//! SimWorld - the step-driven driver loop around a `Coordinator`.

use crate::error::SimResult;
use crate::feed::{MobilityFeed, PositionFeed};

use std::collections::BTreeMap;
use std::sync::Arc;
use tracegrid_core::{
    CollisionGroup, Coordinator, CoordinatorConfig, GridPartition, PropagationMode, StepView,
    TimeStep, UserId,
};
use tracing::debug;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of users to simulate
    pub num_users: usize,

    /// Grid tiles per axis
    pub resolution: usize,

    /// Per-axis standard deviation of one random-walk move
    pub step_std: f64,

    /// Propagation semantics for declared infections
    pub propagation: PropagationMode,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_users: 50,
            resolution: 10,
            step_std: 0.05,
            propagation: PropagationMode::FixedPoint,
        }
    }
}

/// An externally reported infection, applied once a given step has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration {
    pub user: UserId,
    pub infected_at: TimeStep,
}

/// Summary of one executed step.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: TimeStep,

    /// Contended tiles and their occupants
    pub collisions: Vec<CollisionGroup>,

    /// Whether contact checks produced a new or earlier infection
    pub contact_infections: bool,

    /// Whether a declaration this step spread to other users
    pub declared_spread: bool,

    /// Size of the global infection map after the step
    pub infected_count: usize,
}

impl StepReport {
    /// Number of users that shared a tile with someone this step.
    pub fn users_in_contact(&self) -> usize {
        self.collisions.iter().map(|g| g.members.len()).sum()
    }
}

/// Container for a single simulation run.
pub struct SimWorld {
    /// Engine under test
    coordinator: Coordinator,

    /// Position source
    feed: Box<dyn PositionFeed>,

    /// Declarations keyed by the step after which they apply
    declarations: BTreeMap<TimeStep, Vec<Declaration>>,

    /// Step the next `tick` will execute
    next_step: TimeStep,
}

impl SimWorld {
    /// Creates a world over an arbitrary feed.
    pub fn new(
        feed: Box<dyn PositionFeed>,
        resolution: usize,
        propagation: PropagationMode,
    ) -> SimResult<Self> {
        let grid = Arc::new(GridPartition::new(resolution)?);
        let config = CoordinatorConfig::default().with_propagation(propagation);
        let coordinator = Coordinator::new(grid, feed.user_count(), config);

        Ok(Self {
            coordinator,
            feed,
            declarations: BTreeMap::new(),
            next_step: TimeStep(0),
        })
    }

    /// Creates a random-walk world from a `SimConfig`.
    pub fn from_config(config: &SimConfig) -> SimResult<Self> {
        // Derive a separate seed so feed trajectories don't track the run seed
        let feed_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);
        let feed = MobilityFeed::new(feed_seed, config.num_users, config.step_std)?;
        Self::new(Box::new(feed), config.resolution, config.propagation)
    }

    /// Schedules `user` to self-report an infection at `infected_at`, applied
    /// right after step `after_step` has been processed.
    pub fn schedule_declaration(&mut self, after_step: TimeStep, user: UserId, infected_at: TimeStep) {
        self.declarations
            .entry(after_step)
            .or_default()
            .push(Declaration { user, infected_at });
    }

    /// Runs one step: feed → positions → collisions → contact checks →
    /// scheduled declarations.
    pub fn tick(&mut self) -> SimResult<StepReport> {
        let step = self.next_step;

        let positions = self.feed.next_positions()?;
        self.coordinator.update_positions(&positions)?;

        let collisions = self.coordinator.find_collisions();
        let contact_infections = self.coordinator.check_infection_groups(&collisions, step)?;

        let mut declared_spread = false;
        if let Some(declarations) = self.declarations.remove(&step) {
            for d in declarations {
                declared_spread |= self.coordinator.declare_infection(d.user, d.infected_at)?;
            }
        }

        debug!(
            "{}: {} contended tiles, {} infected",
            step,
            collisions.len(),
            self.coordinator.infected_count()
        );

        self.next_step = step.next();
        Ok(StepReport {
            step,
            collisions,
            contact_infections,
            declared_spread,
            infected_count: self.coordinator.infected_count(),
        })
    }

    /// Runs `steps` ticks and returns their reports.
    pub fn run(&mut self, steps: u64) -> SimResult<Vec<StepReport>> {
        (0..steps).map(|_| self.tick()).collect()
    }

    /// Declarations not applied yet.
    pub fn pending_declarations(&self) -> usize {
        self.declarations.values().map(Vec::len).sum()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn next_step(&self) -> TimeStep {
        self.next_step
    }

    pub fn user_count(&self) -> usize {
        self.coordinator.user_count()
    }

    /// Read-only view for exporters.
    pub fn frame(&self) -> StepView {
        self.coordinator.frame()
    }
}
