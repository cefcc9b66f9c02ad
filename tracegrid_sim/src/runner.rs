//! Scenario runner - executes simulation scenarios and checks outcomes.

use crate::error::SimResult;
use crate::exporter::SimExport;
use crate::feed::ScriptedFeed;
use crate::oracle::Oracle;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld, StepReport};

use std::collections::BTreeMap;
use tracegrid_core::{InfectionSnapshot, PropagationMode, TimeStep, UserId};
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Size of the infection map at the end
    pub final_infected: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Contended tiles summed over all steps
    pub collision_groups: u64,

    /// Users in a contended tile, summed over all steps
    pub contact_users: u64,

    /// Largest single-tile occupancy seen
    pub peak_occupancy: usize,

    /// Accepted infection notifications
    pub infection_events: u64,

    /// Steps in which contact checks found a new infection
    pub infectious_steps: u64,
}

impl ScenarioMetrics {
    fn record(&mut self, report: &StepReport) {
        self.collision_groups += report.collisions.len() as u64;
        self.contact_users += report.users_in_contact() as u64;
        self.peak_occupancy = report
            .collisions
            .iter()
            .map(|g| g.members.len())
            .fold(self.peak_occupancy, usize::max);
        if report.contact_infections {
            self.infectious_steps += 1;
        }
    }
}

/// Runs scenarios.
pub struct ScenarioRunner {
    /// Configuration for randomized scenarios
    config: SimConfig,

    /// Steps for randomized scenarios
    steps: u64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_users: usize) -> Self {
        Self {
            config: SimConfig {
                seed,
                num_users,
                ..Default::default()
            },
            steps: 50,
        }
    }

    /// Sets the grid resolution.
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.config.resolution = resolution;
        self
    }

    /// Sets the number of steps.
    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    /// Sets the random-walk step size.
    pub fn with_step_std(mut self, step_std: f64) -> Self {
        self.config.step_std = step_std;
        self
    }

    /// Sets the propagation mode.
    pub fn with_propagation(mut self, mode: PropagationMode) -> Self {
        self.config.propagation = mode;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_with_export(scenario).0
    }

    /// Runs a scenario, also recording every frame for export.
    pub fn run_with_export(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.config.seed);
        debug!("{}", scenario.description());

        let outcome = match scenario {
            ScenarioId::DirectContact => self.run_direct_contact(),
            ScenarioId::NoContact => self.run_no_contact(),
            ScenarioId::Chain => self.run_chain(),
            ScenarioId::RandomWalk => self.run_random_walk(),
        };

        match outcome {
            Ok(run) => {
                let passed = run.failure.is_none();
                let mut export = run.export;
                export.finalize(passed, run.final_infected);
                let result = ScenarioResult {
                    scenario,
                    seed: self.config.seed,
                    passed,
                    total_ticks: run.ticks,
                    final_infected: run.final_infected,
                    failure_reason: run.failure,
                    metrics: run.metrics,
                };
                (result, export)
            }
            Err(e) => {
                warn!("{} aborted: {}", scenario.name(), e);
                let export = SimExport {
                    scenario: scenario.name().to_string(),
                    seed: self.config.seed,
                    resolution: self.config.resolution,
                    boundaries: Vec::new(),
                    tiles: Vec::new(),
                    frames: Vec::new(),
                    passed: false,
                    final_infected: 0,
                };
                let result = ScenarioResult {
                    scenario,
                    seed: self.config.seed,
                    passed: false,
                    total_ticks: 0,
                    final_infected: 0,
                    failure_reason: Some(e.to_string()),
                    metrics: ScenarioMetrics::default(),
                };
                (result, export)
            }
        }
    }

    /// Two users in the same tile at t=0; user 0 reports t=0.
    ///
    /// **Assertion**: both users infected at t=0.
    fn run_direct_contact(&self) -> SimResult<Run> {
        let feed = ScriptedFeed::new(vec![vec![(0.2, 0.2), (0.3, 0.4)]]);
        let mut world = SimWorld::new(Box::new(feed), 2, self.config.propagation)?;
        world.schedule_declaration(TimeStep(0), UserId(0), TimeStep(0));

        let mut run = Run::start(ScenarioId::DirectContact, self.config.seed, &world);
        run.drive(&mut world, 1, None)?;
        run.expect(&world, &snapshot(&[(0, 0), (1, 0)]));
        Ok(run)
    }

    /// Two users in different tiles; user 0 reports t=0.
    ///
    /// **Assertion**: only user 0 infected.
    fn run_no_contact(&self) -> SimResult<Run> {
        // At resolution 2 the far tile only holds the corner (1, 1)
        let feed = ScriptedFeed::new(vec![vec![(0.2, 0.2), (1.0, 1.0)]]);
        let mut world = SimWorld::new(Box::new(feed), 2, self.config.propagation)?;
        world.schedule_declaration(TimeStep(0), UserId(0), TimeStep(0));

        let mut run = Run::start(ScenarioId::NoContact, self.config.seed, &world);
        run.drive(&mut world, 1, None)?;
        run.expect(&world, &snapshot(&[(0, 0)]));
        Ok(run)
    }

    /// A meets B at t=0, B moves over to C at t=1, then A reports t=0.
    ///
    /// **Assertion**: B infected at t=0; C infected at t=1 only under
    /// fixed-point propagation.
    fn run_chain(&self) -> SimResult<Run> {
        let feed = ScriptedFeed::new(vec![
            vec![(0.1, 0.1), (0.1, 0.2), (0.9, 0.9)],
            vec![(0.1, 0.1), (0.9, 0.8), (0.9, 0.9)],
        ]);
        let mut world = SimWorld::new(Box::new(feed), 4, self.config.propagation)?;
        world.schedule_declaration(TimeStep(1), UserId(0), TimeStep(0));

        let mut run = Run::start(ScenarioId::Chain, self.config.seed, &world);
        run.drive(&mut world, 2, None)?;

        let expected = match self.config.propagation {
            PropagationMode::FixedPoint => snapshot(&[(0, 0), (1, 0), (2, 1)]),
            PropagationMode::SingleSweep => snapshot(&[(0, 0), (1, 0)]),
        };
        run.expect(&world, &expected);
        Ok(run)
    }

    /// Random walkers with user 0 as patient zero at t=0.
    ///
    /// **Assertion**: final infection map equals the oracle's ground truth,
    /// and no recorded infection ever moved later or disappeared.
    fn run_random_walk(&self) -> SimResult<Run> {
        let mut world = SimWorld::from_config(&self.config)?;
        let patient_zero = UserId(0);
        world.schedule_declaration(TimeStep(0), patient_zero, TimeStep(0));

        let mut oracle = Oracle::new();
        oracle.seed(patient_zero, TimeStep(0));

        let mut run = Run::start(ScenarioId::RandomWalk, self.config.seed, &world);
        run.drive(&mut world, self.steps, Some(&mut oracle))?;

        if run.failure.is_none() {
            run.expect(&world, &oracle.ground_truth());
        }

        info!(
            "random_walk: {} of {} users infected over {} steps ({} contended tiles)",
            run.final_infected,
            world.user_count(),
            run.ticks,
            oracle.total_groups()
        );
        Ok(run)
    }
}

/// In-progress scenario state.
struct Run {
    export: SimExport,
    metrics: ScenarioMetrics,
    ticks: u64,
    final_infected: usize,
    failure: Option<String>,
}

impl Run {
    fn start(scenario: ScenarioId, seed: u64, world: &SimWorld) -> Self {
        Self {
            export: SimExport::new(scenario.name(), seed, world.coordinator().grid()),
            metrics: ScenarioMetrics::default(),
            ticks: 0,
            final_infected: 0,
            failure: None,
        }
    }

    /// Ticks `world`, recording frames, metrics and the monotonicity check.
    fn drive(
        &mut self,
        world: &mut SimWorld,
        steps: u64,
        mut oracle: Option<&mut Oracle>,
    ) -> SimResult<()> {
        let mut previous: InfectionSnapshot = world.coordinator().infected().clone();

        for _ in 0..steps {
            let events_before = world.coordinator().events().len();
            let report = world.tick()?;
            self.ticks += 1;
            self.metrics.record(&report);

            if let Some(oracle) = oracle.as_deref_mut() {
                oracle.observe(report.step, &report.collisions);
            }

            let coordinator = world.coordinator();
            let new_events = &coordinator.events()[events_before..];
            self.metrics.infection_events += new_events.len() as u64;

            let contended: Vec<usize> = report.collisions.iter().map(|g| g.tile.0).collect();
            self.export.add_view(&coordinator.frame(), &contended, new_events);

            let current = coordinator.infected();
            if self.failure.is_none() {
                if let Some(reason) = regression(&previous, current) {
                    self.failure = Some(format!("{} at {}", reason, report.step));
                }
            }
            previous = current.clone();
        }

        self.final_infected = world.coordinator().infected_count();
        Ok(())
    }

    /// Records a failure unless the final map equals `expected`.
    fn expect(&mut self, world: &SimWorld, expected: &InfectionSnapshot) {
        let actual = world.coordinator().infected();
        if actual != expected {
            self.failure = Some(format!(
                "infection map mismatch: expected {}, got {}",
                describe(expected),
                describe(actual)
            ));
        }
    }
}

/// Reports the first entry that vanished or moved later between snapshots.
fn regression(before: &InfectionSnapshot, after: &InfectionSnapshot) -> Option<String> {
    before.iter().find_map(|(user, &t)| match after.get(user) {
        None => Some(format!("{} dropped from infection map", user)),
        Some(&later) if later > t => Some(format!("{} moved from {} to {}", user, t, later)),
        Some(_) => None,
    })
}

fn describe(map: &InfectionSnapshot) -> String {
    let entries: Vec<String> = map
        .iter()
        .map(|(user, t)| format!("{}: {}", user.get(), t.get()))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

fn snapshot(entries: &[(u64, u64)]) -> InfectionSnapshot {
    entries
        .iter()
        .map(|&(u, t)| (UserId(u), TimeStep(t)))
        .collect::<BTreeMap<_, _>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_contact_scenario() {
        let runner = ScenarioRunner::new(42, 2);
        let result = runner.run(ScenarioId::DirectContact);

        assert!(result.passed, "Failed: {:?}", result.failure_reason);
        assert_eq!(result.final_infected, 2);
        assert_eq!(result.metrics.collision_groups, 1);
    }

    #[test]
    fn test_no_contact_scenario() {
        let runner = ScenarioRunner::new(42, 2);
        let result = runner.run(ScenarioId::NoContact);

        assert!(result.passed, "Failed: {:?}", result.failure_reason);
        assert_eq!(result.final_infected, 1);
        assert_eq!(result.metrics.collision_groups, 0);
    }

    #[test]
    fn test_chain_scenario_fixed_point() {
        let runner = ScenarioRunner::new(42, 3);
        let result = runner.run(ScenarioId::Chain);

        assert!(result.passed, "Failed: {:?}", result.failure_reason);
        assert_eq!(result.final_infected, 3);
        assert_eq!(result.total_ticks, 2);
    }

    #[test]
    fn test_chain_scenario_single_sweep() {
        let runner = ScenarioRunner::new(42, 3).with_propagation(PropagationMode::SingleSweep);
        let result = runner.run(ScenarioId::Chain);

        assert!(result.passed, "Failed: {:?}", result.failure_reason);
        assert_eq!(result.final_infected, 2);
    }

    #[test]
    fn test_random_walk_matches_oracle() {
        for seed in [1, 42, 1234] {
            let runner = ScenarioRunner::new(seed, 40)
                .with_resolution(8)
                .with_steps(60);
            let result = runner.run(ScenarioId::RandomWalk);

            assert!(result.passed, "seed {} failed: {:?}", seed, result.failure_reason);
            assert!(result.final_infected >= 1);
            assert_eq!(result.total_ticks, 60);
        }
    }

    #[test]
    fn test_random_walk_single_sweep_matches_oracle() {
        let runner = ScenarioRunner::new(7, 30)
            .with_resolution(6)
            .with_steps(40)
            .with_propagation(PropagationMode::SingleSweep);
        let result = runner.run(ScenarioId::RandomWalk);

        assert!(result.passed, "Failed: {:?}", result.failure_reason);
    }

    #[test]
    fn test_random_walk_deterministic() {
        let runner = ScenarioRunner::new(99, 30).with_steps(30);

        let a = runner.run(ScenarioId::RandomWalk);
        let b = runner.run(ScenarioId::RandomWalk);

        assert_eq!(a.final_infected, b.final_infected);
        assert_eq!(a.metrics.collision_groups, b.metrics.collision_groups);
        assert_eq!(a.metrics.infection_events, b.metrics.infection_events);
    }

    #[test]
    fn test_export_has_one_frame_per_tick() {
        let runner = ScenarioRunner::new(5, 10).with_steps(12);
        let (result, export) = runner.run_with_export(ScenarioId::RandomWalk);

        assert_eq!(export.frames.len(), 12);
        assert_eq!(export.passed, result.passed);
        assert_eq!(export.boundaries.len(), 10);
        assert_eq!(export.frames[0].users.len(), 10);
    }

    #[test]
    fn test_invalid_config_reports_failure() {
        let runner = ScenarioRunner::new(5, 10).with_step_std(f64::NAN);
        let result = runner.run(ScenarioId::RandomWalk);

        assert!(!result.passed);
        assert!(result.failure_reason.is_some());
    }

    #[test]
    fn test_regression_detection() {
        let before = snapshot(&[(0, 0), (1, 2)]);

        assert_eq!(regression(&before, &snapshot(&[(0, 0), (1, 1), (2, 5)])), None);
        assert!(regression(&before, &snapshot(&[(0, 0)])).is_some());
        assert!(regression(&before, &snapshot(&[(0, 0), (1, 3)])).is_some());
    }
}
