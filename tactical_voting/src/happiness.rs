use snafu::ensure;

use crate::config::*;
use crate::scenario::{CandidateId, Scenario};
use crate::schemes::{ElectionRanking, Outcome};

/// Decay constant of the exponential happiness function.
pub const EXP_DECAY_ALPHA: f64 = 0.5;

/// The happiness of one voter with an outcome, in [0, 1].
///
/// Winner-based functions need an [`Outcome::Winner`], ranking-based
/// functions need an [`Outcome::Ranking`]. Any other pairing is rejected
/// instead of being silently converted.
pub fn happiness(
    preferences: &[CandidateId],
    outcome: &Outcome,
    metric: HappinessFunc,
) -> TacticalResult<f64> {
    match outcome {
        Outcome::Winner(winner) => {
            ensure!(
                !metric.requires_ranking(),
                MetricOutcomeMismatchSnafu { metric }
            );
            Ok(winner_happiness(preferences, *winner, metric))
        }
        Outcome::Ranking(ranking) => {
            ensure!(
                metric.requires_ranking(),
                MetricOutcomeMismatchSnafu { metric }
            );
            Ok(ranking_happiness(preferences, ranking, metric))
        }
    }
}

fn winner_happiness(preferences: &[CandidateId], winner: CandidateId, metric: HappinessFunc) -> f64 {
    let rank = match preferences.iter().position(|c| *c == winner) {
        Some(pos) => (pos + 1) as f64,
        None => return 0.0,
    };
    let m = preferences.len() as f64;
    match metric {
        HappinessFunc::Logarithmic => 1.0 / (rank + 1.0).log2(),
        HappinessFunc::Exponential => (-EXP_DECAY_ALPHA * (rank - 1.0)).exp(),
        HappinessFunc::Linear => {
            if preferences.len() == 1 {
                1.0
            } else {
                (m - rank) / (m - 1.0)
            }
        }
        // Excluded by the caller.
        HappinessFunc::KendallTau | HappinessFunc::WeightedPositional => 0.0,
    }
}

fn ranking_happiness(
    preferences: &[CandidateId],
    ranking: &ElectionRanking,
    metric: HappinessFunc,
) -> f64 {
    match metric {
        HappinessFunc::KendallTau => kendall_tau(preferences, ranking),
        HappinessFunc::WeightedPositional => weighted_positional(preferences, ranking),
        _ => 0.0,
    }
}

/// Fraction of the candidate pairs ordered the same way by the voter and the outcome.
///
/// Only the pairs where both candidates appear in both rankings are compared.
fn kendall_tau(preferences: &[CandidateId], ranking: &ElectionRanking) -> f64 {
    let outcome_pos: Vec<Option<usize>> =
        preferences.iter().map(|c| ranking.position(*c)).collect();
    let mut concordant: u64 = 0;
    let mut comparable: u64 = 0;
    for i in 0..preferences.len() {
        for j in (i + 1)..preferences.len() {
            if let (Some(pi), Some(pj)) = (outcome_pos[i], outcome_pos[j]) {
                comparable += 1;
                // The voter prefers i over j.
                if pi < pj {
                    concordant += 1;
                }
            }
        }
    }
    if comparable == 0 {
        1.0
    } else {
        concordant as f64 / comparable as f64
    }
}

/// One minus the weighted displacement of the voter's candidates in the outcome.
///
/// The candidate at position `i` weighs `m - i`. Candidates missing from the
/// outcome count with their largest possible displacement.
fn weighted_positional(preferences: &[CandidateId], ranking: &ElectionRanking) -> f64 {
    let m = preferences.len();
    let mut weighted: f64 = 0.0;
    let mut worst: f64 = 0.0;
    for (i, cid) in preferences.iter().enumerate() {
        let w = (m - i) as f64;
        let max_d = i.max(m - 1 - i) as f64;
        let d = match ranking.position(*cid) {
            Some(pos) => (pos as f64 - i as f64).abs(),
            None => max_d,
        };
        weighted += w * d;
        worst += w * max_d;
    }
    if worst == 0.0 {
        1.0
    } else {
        (1.0 - weighted / worst).max(0.0)
    }
}

/// The happiness of every voter of a scenario, and their sum.
#[derive(PartialEq, Debug, Clone)]
pub struct PopulationHappiness {
    /// Indexed by voter id.
    pub individual: Vec<f64>,
    pub total: f64,
}

impl PopulationHappiness {
    pub fn of(&self, voter: crate::scenario::VoterId) -> f64 {
        self.individual.get(voter.0).copied().unwrap_or(0.0)
    }

    pub fn average(&self) -> f64 {
        if self.individual.is_empty() {
            0.0
        } else {
            self.total / self.individual.len() as f64
        }
    }
}

/// Happiness of all the voters, always measured against their sincere preferences.
pub fn population_happiness(
    scenario: &Scenario,
    outcome: &Outcome,
    metric: HappinessFunc,
) -> TacticalResult<PopulationHappiness> {
    let individual = scenario
        .voters()
        .map(|v| happiness(v.preferences, outcome, metric))
        .collect::<TacticalResult<Vec<f64>>>()?;
    let total = individual.iter().sum();
    Ok(PopulationHappiness { individual, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemes::evaluate;

    fn ids(raw: &[u32]) -> Vec<CandidateId> {
        raw.iter().map(|idx| CandidateId(*idx)).collect()
    }

    fn ranking_of(raw: &[u32]) -> Outcome {
        // A single full ballot under Borda reproduces itself as the ranking.
        let ballot = ids(raw);
        evaluate(VotingScheme::Borda, raw.len(), &[ballot.as_slice()], true).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn top_choice_is_maximal() {
        let prefs = ids(&[2, 0, 1, 3]);
        for metric in [
            HappinessFunc::Logarithmic,
            HappinessFunc::Exponential,
            HappinessFunc::Linear,
        ] {
            let h = happiness(&prefs, &Outcome::Winner(CandidateId(2)), metric).unwrap();
            assert!(close(h, 1.0), "{}", metric);
        }
    }

    #[test]
    fn winner_based_values() {
        let prefs = ids(&[0, 1, 2, 3]);
        let third = Outcome::Winner(CandidateId(2));
        assert!(close(
            happiness(&prefs, &third, HappinessFunc::Logarithmic).unwrap(),
            0.5
        ));
        assert!(close(
            happiness(&prefs, &third, HappinessFunc::Exponential).unwrap(),
            (-1.0f64).exp()
        ));
        assert!(close(
            happiness(&prefs, &third, HappinessFunc::Linear).unwrap(),
            1.0 / 3.0
        ));
        let last = Outcome::Winner(CandidateId(3));
        assert!(close(
            happiness(&prefs, &last, HappinessFunc::Linear).unwrap(),
            0.0
        ));
        // Single candidate
        assert!(close(
            happiness(&ids(&[0]), &Outcome::Winner(CandidateId(0)), HappinessFunc::Linear)
                .unwrap(),
            1.0
        ));
        // Unlisted winner
        assert!(close(
            happiness(&ids(&[0, 1]), &Outcome::Winner(CandidateId(5)), HappinessFunc::Logarithmic)
                .unwrap(),
            0.0
        ));
    }

    #[test]
    fn kendall_tau_values() {
        let prefs = ids(&[0, 1, 2, 3]);
        assert!(close(
            happiness(&prefs, &ranking_of(&[0, 1, 2, 3]), HappinessFunc::KendallTau).unwrap(),
            1.0
        ));
        assert!(close(
            happiness(&prefs, &ranking_of(&[3, 2, 1, 0]), HappinessFunc::KendallTau).unwrap(),
            0.0
        ));
        // One discordant pair out of six.
        assert!(close(
            happiness(&prefs, &ranking_of(&[1, 0, 2, 3]), HappinessFunc::KendallTau).unwrap(),
            5.0 / 6.0
        ));
    }

    #[test]
    fn weighted_positional_values() {
        let prefs = ids(&[0, 1, 2]);
        assert!(close(
            happiness(&prefs, &ranking_of(&[0, 1, 2]), HappinessFunc::WeightedPositional).unwrap(),
            1.0
        ));
        // Weights 3, 2, 1; worst displacements 2, 1, 2; denominator 10.
        // Reversed: displacements 2, 0, 2 -> 8.
        assert!(close(
            happiness(&prefs, &ranking_of(&[2, 1, 0]), HappinessFunc::WeightedPositional).unwrap(),
            0.2
        ));
        assert!(close(
            happiness(&ids(&[0]), &ranking_of(&[0]), HappinessFunc::WeightedPositional).unwrap(),
            1.0
        ));
    }

    #[test]
    fn mismatched_metric_and_outcome() {
        let prefs = ids(&[0, 1]);
        assert_eq!(
            happiness(&prefs, &Outcome::Winner(CandidateId(0)), HappinessFunc::KendallTau),
            Err(TacticalError::MetricOutcomeMismatch {
                metric: HappinessFunc::KendallTau
            })
        );
        assert_eq!(
            happiness(&prefs, &ranking_of(&[0, 1]), HappinessFunc::Linear),
            Err(TacticalError::MetricOutcomeMismatch {
                metric: HappinessFunc::Linear
            })
        );
    }

    #[test]
    fn population_total_is_a_sum() {
        let s = Scenario::from_preferences(
            &["A".to_string(), "B".to_string()],
            &[
                vec!["A".to_string(), "B".to_string()],
                vec!["B".to_string(), "A".to_string()],
                vec!["A".to_string(), "B".to_string()],
            ],
        )
        .unwrap();
        let ph = population_happiness(&s, &Outcome::Winner(CandidateId(0)), HappinessFunc::Linear)
            .unwrap();
        assert_eq!(ph.individual, vec![1.0, 0.0, 1.0]);
        assert!(close(ph.total, 2.0));
        assert!(close(ph.average(), 2.0 / 3.0));
    }
}
