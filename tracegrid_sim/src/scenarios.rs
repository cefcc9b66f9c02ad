//! Canned simulation scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Two users share a tile, one self-reports
    DirectContact,

    /// Two users in different tiles, one self-reports
    NoContact,

    /// A meets B, then B meets C; A self-reports afterwards
    Chain,

    /// Seeded random walk checked against the ground-truth oracle
    RandomWalk,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::DirectContact,
            ScenarioId::NoContact,
            ScenarioId::Chain,
            ScenarioId::RandomWalk,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::DirectContact => "direct_contact",
            ScenarioId::NoContact => "no_contact",
            ScenarioId::Chain => "chain",
            ScenarioId::RandomWalk => "random_walk",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::DirectContact => "2 users in one tile at t=0, user 0 reports t=0: both infected",
            ScenarioId::NoContact => "2 users in different tiles, user 0 reports t=0: only user 0 infected",
            ScenarioId::Chain => "A-B at t=0, B-C at t=1, A reports t=0: C depends on propagation mode",
            ScenarioId::RandomWalk => "random walkers, patient zero at t=0, compare with oracle",
        }
    }

    /// True if the scenario uses the seeded random-walk feed.
    pub fn is_randomized(&self) -> bool {
        matches!(self, ScenarioId::RandomWalk)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct_contact" | "directcontact" | "direct" => Ok(ScenarioId::DirectContact),
            "no_contact" | "nocontact" => Ok(ScenarioId::NoContact),
            "chain" => Ok(ScenarioId::Chain),
            "random_walk" | "randomwalk" | "walk" => Ok(ScenarioId::RandomWalk),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>().unwrap(), scenario);
        }
    }

    #[test]
    fn test_aliases_and_unknown() {
        assert_eq!("WALK".parse::<ScenarioId>().unwrap(), ScenarioId::RandomWalk);
        assert!("byzantine".parse::<ScenarioId>().is_err());
        assert!(ScenarioId::RandomWalk.is_randomized());
        assert!(!ScenarioId::Chain.is_randomized());
    }
}
