//! Ground truth for infection spread.
//!
//! The Oracle sees every collision group of every step, which no single
//! party in the protocol does. It computes the earliest time each user could
//! have been reached from the seeded infections along time-respecting
//! contacts, so runs can be checked against it.

use std::collections::BTreeMap;
use tracegrid_core::{CollisionGroup, InfectionSnapshot, TimeStep, UserId};

/// Central record of all co-location, used only for verification.
#[derive(Debug, Clone, Default)]
pub struct Oracle {
    /// Step → contended groups at that step
    history: BTreeMap<TimeStep, Vec<CollisionGroup>>,

    /// Seeded infections (patient zero and other self-reports)
    seeds: InfectionSnapshot,
}

impl Oracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the collision groups observed at `step`.
    pub fn observe(&mut self, step: TimeStep, groups: &[CollisionGroup]) {
        self.history
            .entry(step)
            .or_default()
            .extend(groups.iter().cloned());
    }

    /// Registers an externally declared infection.
    pub fn seed(&mut self, user: UserId, infected_at: TimeStep) {
        let entry = self.seeds.entry(user).or_insert(infected_at);
        *entry = (*entry).min(infected_at);
    }

    /// Earliest reachable infection time per user.
    ///
    /// Steps are replayed in order; a group whose members include someone
    /// infected at or before that step infects every other member at that
    /// step.
    pub fn ground_truth(&self) -> InfectionSnapshot {
        let mut infected = self.seeds.clone();

        for (&step, groups) in &self.history {
            for group in groups {
                let exposed = group
                    .members
                    .iter()
                    .any(|m| infected.get(m).is_some_and(|&t| t <= step));
                if !exposed {
                    continue;
                }

                for member in &group.members {
                    let entry = infected.entry(*member).or_insert(step);
                    *entry = (*entry).min(step);
                }
            }
        }

        infected
    }

    /// Number of recorded steps.
    pub fn steps(&self) -> usize {
        self.history.len()
    }

    /// Total contended groups across all steps.
    pub fn total_groups(&self) -> usize {
        self.history.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracegrid_core::TileId;

    fn group(members: &[u64]) -> CollisionGroup {
        CollisionGroup {
            tile: TileId(0),
            members: members.iter().map(|&m| UserId(m)).collect(),
        }
    }

    #[test]
    fn test_oracle_chain() {
        let mut oracle = Oracle::new();
        oracle.observe(TimeStep(0), &[group(&[0, 1])]);
        oracle.observe(TimeStep(1), &[group(&[1, 2])]);
        oracle.seed(UserId(0), TimeStep(0));

        let truth = oracle.ground_truth();

        assert_eq!(truth.get(&UserId(1)), Some(&TimeStep(0)));
        assert_eq!(truth.get(&UserId(2)), Some(&TimeStep(1)));
    }

    #[test]
    fn test_oracle_respects_time_order() {
        let mut oracle = Oracle::new();
        // 1 meets 2 before 1 is reached
        oracle.observe(TimeStep(0), &[group(&[1, 2])]);
        oracle.observe(TimeStep(1), &[group(&[0, 1])]);
        oracle.seed(UserId(0), TimeStep(0));

        let truth = oracle.ground_truth();

        assert_eq!(truth.get(&UserId(1)), Some(&TimeStep(1)));
        assert_eq!(truth.get(&UserId(2)), None);
        assert_eq!(oracle.steps(), 2);
        assert_eq!(oracle.total_groups(), 2);
    }

    #[test]
    fn test_oracle_seed_after_contact_is_ignored() {
        let mut oracle = Oracle::new();
        oracle.observe(TimeStep(0), &[group(&[0, 1])]);
        oracle.seed(UserId(0), TimeStep(3));
        oracle.seed(UserId(0), TimeStep(5));

        let truth = oracle.ground_truth();

        assert_eq!(truth.len(), 1);
        assert_eq!(truth.get(&UserId(0)), Some(&TimeStep(3)));
    }
}
