use snafu::ensure;

use crate::config::*;
use crate::scenario::Scenario;

/// A builder for scenarios written by hand.
///
/// ```
/// use tactical_voting::builder::ScenarioBuilder;
/// # use tactical_voting::TacticalError;
///
/// let mut builder = ScenarioBuilder::new()
///     .candidates(&["Anna".to_string(), "Bob".to_string()])?;
///
/// builder.add_voter(&["Bob".to_string(), "Anna".to_string()])?;
/// builder.add_voters(&["Anna".to_string(), "Bob".to_string()], 2)?;
///
/// let scenario = builder.build()?;
/// assert_eq!(scenario.num_voters(), 3);
/// # Ok::<(), TacticalError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScenarioBuilder {
    _candidates: Vec<String>,
    _preferences: Vec<Vec<String>>,
}

impl ScenarioBuilder {
    pub fn new() -> ScenarioBuilder {
        ScenarioBuilder::default()
    }

    /// Declares the candidates. Resets the voters added so far.
    pub fn candidates(self, cands: &[String]) -> TacticalResult<ScenarioBuilder> {
        ensure!(
            !cands.is_empty() && cands.len() <= MAX_CANDIDATES,
            InvalidCandidateCountSnafu {
                count: cands.len(),
                max: MAX_CANDIDATES
            }
        );
        let mut sorted: Vec<&String> = cands.iter().collect();
        sorted.sort();
        for pair in sorted.windows(2) {
            ensure!(
                pair[0] != pair[1],
                DuplicateCandidateSnafu {
                    name: pair[0].clone()
                }
            );
        }
        Ok(ScenarioBuilder {
            _candidates: cands.to_vec(),
            _preferences: Vec::new(),
        })
    }

    /// Adds a voter with a complete ranking of the candidates, most preferred first.
    pub fn add_voter(&mut self, preferences: &[String]) -> TacticalResult<()> {
        self.add_voters(preferences, 1)
    }

    /// Adds `count` voters sharing the same ranking.
    pub fn add_voters(&mut self, preferences: &[String], count: usize) -> TacticalResult<()> {
        let voter = self._preferences.len();
        for name in preferences.iter() {
            ensure!(
                self._candidates.contains(name),
                UnknownCandidateSnafu { name: name.clone() }
            );
        }
        let mut distinct: Vec<&String> = preferences.iter().collect();
        distinct.sort();
        distinct.dedup();
        ensure!(
            preferences.len() == self._candidates.len() && distinct.len() == preferences.len(),
            InvalidBallotSnafu { voter }
        );
        for _ in 0..count {
            self._preferences.push(preferences.to_vec());
        }
        Ok(())
    }

    pub fn build(&self) -> TacticalResult<Scenario> {
        Scenario::from_preferences(&self._candidates, &self._preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builds_a_scenario() {
        let mut builder = ScenarioBuilder::new()
            .candidates(&names(&["C", "A", "B"]))
            .unwrap();
        builder.add_voters(&names(&["A", "B", "C"]), 2).unwrap();
        builder.add_voter(&names(&["C", "B", "A"])).unwrap();
        let s = builder.build().unwrap();
        assert_eq!(s.num_voters(), 3);
        assert_eq!(s.candidates(), &names(&["A", "B", "C"]));
    }

    #[test]
    fn rejects_invalid_input() {
        assert_eq!(
            ScenarioBuilder::new().candidates(&[]).err(),
            Some(TacticalError::InvalidCandidateCount { count: 0, max: 20 })
        );
        assert_eq!(
            ScenarioBuilder::new()
                .candidates(&names(&["A", "B", "A"]))
                .err(),
            Some(TacticalError::DuplicateCandidate {
                name: "A".to_string()
            })
        );
        let mut builder = ScenarioBuilder::new()
            .candidates(&names(&["A", "B"]))
            .unwrap();
        assert_eq!(
            builder.add_voter(&names(&["A", "Z"])),
            Err(TacticalError::UnknownCandidate {
                name: "Z".to_string()
            })
        );
        assert_eq!(
            builder.add_voter(&names(&["A", "A"])),
            Err(TacticalError::InvalidBallot { voter: 0 })
        );
        assert_eq!(builder.build(), Err(TacticalError::EmptyElection));
    }
}
