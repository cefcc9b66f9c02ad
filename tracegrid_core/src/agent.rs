//! LocalAgent - the per-device side of contact tracing.
//!
//! Each agent keeps its own contact ledger. The coordinator never sees it;
//! it only hands the agent an infection snapshot and asks for a verdict.

use crate::types::{InfectionSnapshot, TimeStep, UserId};
use std::collections::BTreeMap;

/// A single user's local state.
#[derive(Debug, Clone)]
pub struct LocalAgent {
    /// Stable identifier
    id: UserId,

    /// Peer → steps at which the peer shared our tile, in chronological order
    ledger: BTreeMap<UserId, Vec<TimeStep>>,

    /// Earliest step at which this user is known to be infected
    self_infection: Option<TimeStep>,
}

impl LocalAgent {
    /// Creates a new agent with an empty ledger.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            ledger: BTreeMap::new(),
            self_infection: None,
        }
    }

    /// Records that this agent shared a tile with `peers` at step `t`.
    ///
    /// `peers` may include the agent itself; that entry is skipped. Returns
    /// the result of `infer_infection` against `known`.
    pub fn record_contacts(
        &mut self,
        t: TimeStep,
        peers: &[UserId],
        known: &InfectionSnapshot,
    ) -> Option<TimeStep> {
        let me = self.id;
        for &peer in peers.iter().filter(|&&p| p != me) {
            self.ledger.entry(peer).or_default().push(t);
        }

        self.infer_infection(known)
    }

    /// Decides whether this agent is infected given the coordinator's view.
    ///
    /// A contact with peer `p` at step `c` counts when `c` is at or after the
    /// infection time recorded for `p`. The agent adopts the earliest such
    /// contact across all peers. Once set, the verdict never changes here.
    pub fn infer_infection(&mut self, known: &InfectionSnapshot) -> Option<TimeStep> {
        if self.self_infection.is_some() {
            return self.self_infection;
        }

        let earliest = known
            .iter()
            .filter_map(|(peer, &infected_at)| self.first_contact_since(*peer, infected_at))
            .min();

        if earliest.is_some() {
            self.self_infection = earliest;
        }
        earliest
    }

    /// Asserts an infection time directly, bypassing inference.
    ///
    /// The earlier of the current and the asserted time is kept.
    pub fn declare(&mut self, t: TimeStep) -> TimeStep {
        let time = match self.self_infection {
            Some(current) => current.min(t),
            None => t,
        };
        self.self_infection = Some(time);
        time
    }

    /// Earliest recorded contact with `peer` at or after `since`.
    fn first_contact_since(&self, peer: UserId, since: TimeStep) -> Option<TimeStep> {
        let contacts = self.ledger.get(&peer)?;
        // Ledger entries are chronological
        let idx = contacts.partition_point(|&c| c < since);
        contacts.get(idx).copied()
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn self_infection(&self) -> Option<TimeStep> {
        self.self_infection
    }

    pub fn is_infected(&self) -> bool {
        self.self_infection.is_some()
    }

    /// Recorded contact steps with `peer` (empty if never met).
    pub fn contacts_with(&self, peer: UserId) -> &[TimeStep] {
        self.ledger.get(&peer).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn ledger(&self) -> &BTreeMap<UserId, Vec<TimeStep>> {
        &self.ledger
    }

    /// Total number of recorded (peer, step) pairs.
    pub fn contact_count(&self) -> usize {
        self.ledger.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(u64, u64)]) -> InfectionSnapshot {
        entries
            .iter()
            .map(|&(u, t)| (UserId(u), TimeStep(t)))
            .collect()
    }

    #[test]
    fn test_record_skips_self() {
        let mut agent = LocalAgent::new(UserId(1));
        let peers = [UserId(0), UserId(1), UserId(2)];

        agent.record_contacts(TimeStep(3), &peers, &InfectionSnapshot::new());

        assert_eq!(agent.contacts_with(UserId(0)), &[TimeStep(3)]);
        assert_eq!(agent.contacts_with(UserId(2)), &[TimeStep(3)]);
        assert!(agent.contacts_with(UserId(1)).is_empty());
        assert_eq!(agent.contact_count(), 2);
    }

    #[test]
    fn test_ledger_is_append_only() {
        let mut agent = LocalAgent::new(UserId(0));
        let peers = [UserId(0), UserId(5)];
        let known = InfectionSnapshot::new();

        for t in [1, 1, 4, 9] {
            let before = agent.contacts_with(UserId(5)).to_vec();
            agent.record_contacts(TimeStep(t), &peers, &known);
            let after = agent.contacts_with(UserId(5));

            assert_eq!(after.len(), before.len() + 1);
            assert_eq!(&after[..before.len()], before.as_slice());
        }

        let steps = agent.contacts_with(UserId(5));
        assert!(steps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_no_infection_without_known_peers() {
        let mut agent = LocalAgent::new(UserId(0));
        let result = agent.record_contacts(TimeStep(0), &[UserId(1)], &InfectionSnapshot::new());

        assert_eq!(result, None);
        assert!(!agent.is_infected());
    }

    #[test]
    fn test_contact_before_infection_does_not_count() {
        let mut agent = LocalAgent::new(UserId(0));
        agent.record_contacts(TimeStep(2), &[UserId(1)], &InfectionSnapshot::new());

        let result = agent.infer_infection(&snapshot(&[(1, 3)]));

        assert_eq!(result, None);
        assert_eq!(agent.self_infection(), None);
    }

    #[test]
    fn test_contact_at_infection_time_counts() {
        let mut agent = LocalAgent::new(UserId(0));
        agent.record_contacts(TimeStep(3), &[UserId(1)], &InfectionSnapshot::new());

        assert_eq!(agent.infer_infection(&snapshot(&[(1, 3)])), Some(TimeStep(3)));
    }

    #[test]
    fn test_earliest_qualifying_contact_for_peer() {
        let mut agent = LocalAgent::new(UserId(0));
        let empty = InfectionSnapshot::new();
        for t in [1, 4, 6, 8] {
            agent.record_contacts(TimeStep(t), &[UserId(1)], &empty);
        }

        assert_eq!(agent.infer_infection(&snapshot(&[(1, 5)])), Some(TimeStep(6)));
    }

    #[test]
    fn test_global_minimum_across_peers() {
        // Peer 1 comes first in key order but peer 2 gives the earlier contact
        let mut agent = LocalAgent::new(UserId(0));
        let empty = InfectionSnapshot::new();
        agent.record_contacts(TimeStep(2), &[UserId(2)], &empty);
        agent.record_contacts(TimeStep(7), &[UserId(1)], &empty);

        let result = agent.infer_infection(&snapshot(&[(1, 0), (2, 0)]));

        assert_eq!(result, Some(TimeStep(2)));
    }

    #[test]
    fn test_inference_is_sticky() {
        let mut agent = LocalAgent::new(UserId(0));
        agent.record_contacts(TimeStep(4), &[UserId(1)], &InfectionSnapshot::new());
        assert_eq!(agent.infer_infection(&snapshot(&[(1, 4)])), Some(TimeStep(4)));

        // A later, emptier snapshot does not clear the verdict
        assert_eq!(agent.infer_infection(&InfectionSnapshot::new()), Some(TimeStep(4)));
        // Nor does a snapshot that would suggest an earlier time
        agent.record_contacts(TimeStep(5), &[UserId(2)], &InfectionSnapshot::new());
        assert_eq!(agent.infer_infection(&snapshot(&[(1, 0), (2, 0)])), Some(TimeStep(4)));
    }

    #[test]
    fn test_declare_keeps_earliest() {
        let mut agent = LocalAgent::new(UserId(0));

        assert_eq!(agent.declare(TimeStep(5)), TimeStep(5));
        assert_eq!(agent.declare(TimeStep(2)), TimeStep(2));
        assert_eq!(agent.declare(TimeStep(9)), TimeStep(2));
        assert_eq!(agent.self_infection(), Some(TimeStep(2)));
    }
}
