use std::collections::BTreeMap;

use crate::scenario::{CandidateId, Scenario, VoterId};

/// The ballots actually cast in an election: the sincere rankings of a
/// scenario, except for the voters whose ballot has been replaced.
///
/// Replacing a ballot never touches the scenario, so a search can try many
/// ballots for one voter without copying the other voters.
#[derive(Debug, Clone)]
pub struct Profile<'a> {
    scenario: &'a Scenario,
    overrides: BTreeMap<VoterId, Vec<CandidateId>>,
}

impl<'a> Profile<'a> {
    /// The sincere profile.
    pub fn new(scenario: &'a Scenario) -> Profile<'a> {
        Profile {
            scenario,
            overrides: BTreeMap::new(),
        }
    }

    pub fn scenario(&self) -> &'a Scenario {
        self.scenario
    }

    /// Replaces the ballot of one voter. The ballot may be truncated.
    pub fn set_ballot(&mut self, voter: VoterId, ballot: Vec<CandidateId>) {
        self.overrides.insert(voter, ballot);
    }

    pub fn with_ballot(mut self, voter: VoterId, ballot: Vec<CandidateId>) -> Profile<'a> {
        self.set_ballot(voter, ballot);
        self
    }

    /// Restores the sincere ballot of one voter.
    pub fn reset(&mut self, voter: VoterId) {
        self.overrides.remove(&voter);
    }

    pub fn num_overrides(&self) -> usize {
        self.overrides.len()
    }

    pub(crate) fn ballot(&self, voter: VoterId) -> &[CandidateId] {
        match self.overrides.get(&voter) {
            Some(b) => b.as_slice(),
            None => self.scenario.sincere(voter),
        }
    }

    /// All the ballots, in voter order.
    pub fn ballots(&self) -> impl Iterator<Item = &[CandidateId]> + '_ {
        self.scenario.voter_ids().map(move |v| self.ballot(v))
    }
}
