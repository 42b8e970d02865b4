use log::debug;
use snafu::ensure;

use std::ops::AddAssign;

use crate::config::*;
use crate::profile::Profile;
use crate::scenario::CandidateId;

/// The points collected by one candidate.
#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
pub struct Score(pub u64);

impl Score {
    const EMPTY: Score = Score(0);
}

impl std::iter::Sum for Score {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Score(iter.map(|s| s.0).sum())
    }
}

impl AddAssign for Score {
    fn add_assign(&mut self, rhs: Score) {
        self.0 += rhs.0;
    }
}

// Invariant: `rest` and `winner` together hold every candidate exactly once.
/// The full order of the candidates after an election, best first.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct ElectionRanking {
    winner: CandidateId,
    rest: Vec<CandidateId>,
}

impl ElectionRanking {
    pub fn winner(&self) -> CandidateId {
        self.winner
    }

    pub fn iter(&self) -> impl Iterator<Item = CandidateId> + '_ {
        std::iter::once(self.winner).chain(self.rest.iter().copied())
    }

    pub fn to_vec(&self) -> Vec<CandidateId> {
        self.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rest.len() + 1
    }

    /// Never empty, provided for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The 0-indexed position of a candidate in the ranking.
    pub fn position(&self, cid: CandidateId) -> Option<usize> {
        self.iter().position(|c| c == cid)
    }
}

/// The result of an election.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum Outcome {
    Winner(CandidateId),
    Ranking(ElectionRanking),
}

impl Outcome {
    pub fn winner(&self) -> CandidateId {
        match self {
            Outcome::Winner(cid) => *cid,
            Outcome::Ranking(r) => r.winner(),
        }
    }

    pub fn ranking(&self) -> Option<&ElectionRanking> {
        match self {
            Outcome::Winner(_) => None,
            Outcome::Ranking(r) => Some(r),
        }
    }
}

/// The score of every candidate under the given scheme, indexed by candidate id.
///
/// Ballots may be truncated: plurality and vote-for-two only look at the head
/// of the ballot, anti-plurality treats the missing candidates as the
/// implicit bottom, and Borda awards `m_max - 1 - r` points to position `r`
/// where `m_max` is the length of the longest ballot.
/// Entries outside of the candidate range are ignored.
pub fn tally(scheme: VotingScheme, num_candidates: usize, ballots: &[&[CandidateId]]) -> Vec<Score> {
    let mut scores: Vec<Score> = vec![Score::EMPTY; num_candidates];
    let mut add = |cid: CandidateId, points: u64| {
        if let Some(s) = scores.get_mut(cid.index()) {
            *s += Score(points);
        }
    };
    match scheme {
        VotingScheme::Plurality => {
            for b in ballots.iter() {
                if let Some(cid) = b.first() {
                    add(*cid, 1);
                }
            }
        }
        VotingScheme::VoteForTwo => {
            for b in ballots.iter() {
                for cid in b.iter().take(2) {
                    add(*cid, 1);
                }
            }
        }
        VotingScheme::AntiPlurality => {
            for b in ballots.iter() {
                let counted = if !b.is_empty() && b.len() == num_candidates {
                    &b[..b.len() - 1]
                } else {
                    b
                };
                for cid in counted.iter() {
                    add(*cid, 1);
                }
            }
        }
        VotingScheme::Borda => {
            let m_max = ballots.iter().map(|b| b.len()).max().unwrap_or(0);
            for b in ballots.iter() {
                for (r, cid) in b.iter().enumerate() {
                    add(*cid, (m_max - 1 - r) as u64);
                }
            }
        }
    }
    scores
}

/// Sorts candidates by descending score, then ascending id.
pub fn standings(scores: &[Score]) -> Vec<(CandidateId, Score)> {
    let mut res: Vec<(CandidateId, Score)> = scores
        .iter()
        .enumerate()
        .map(|(idx, s)| (CandidateId(idx as u32), *s))
        .collect();
    res.sort_by(|(c1, s1), (c2, s2)| s2.cmp(s1).then(c1.cmp(c2)));
    res
}

/// Runs an election.
///
/// Ties are broken in favour of the smallest candidate id, so evaluating the
/// same ballots always gives the same outcome. When `want_ranking` is set,
/// the outcome lists every candidate, including the ones that got no points.
pub fn evaluate(
    scheme: VotingScheme,
    num_candidates: usize,
    ballots: &[&[CandidateId]],
    want_ranking: bool,
) -> TacticalResult<Outcome> {
    ensure!(num_candidates > 0, EmptyElectionSnafu);
    let scores = tally(scheme, num_candidates, ballots);
    let mut order = standings(&scores).into_iter().map(|(cid, _)| cid);
    // Not empty: num_candidates > 0
    let winner = order.next().unwrap_or(CandidateId(0));
    if want_ranking {
        Ok(Outcome::Ranking(ElectionRanking {
            winner,
            rest: order.collect(),
        }))
    } else {
        Ok(Outcome::Winner(winner))
    }
}

/// Runs an election on the ballots currently cast in a profile.
pub fn evaluate_profile(
    profile: &Profile,
    scheme: VotingScheme,
    want_ranking: bool,
) -> TacticalResult<Outcome> {
    let ballots: Vec<&[CandidateId]> = profile.ballots().collect();
    let outcome = evaluate(
        scheme,
        profile.scenario().num_candidates(),
        &ballots,
        want_ranking,
    )?;
    debug!(
        "evaluate_profile: scheme: {} overrides: {} winner: {:?}",
        scheme,
        profile.num_overrides(),
        outcome.winner()
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(idx: u32) -> CandidateId {
        CandidateId(idx)
    }

    fn ballots(raw: &[&[u32]]) -> Vec<Vec<CandidateId>> {
        raw.iter()
            .map(|b| b.iter().map(|idx| c(*idx)).collect())
            .collect()
    }

    fn scores(scheme: VotingScheme, m: usize, raw: &[&[u32]]) -> Vec<u64> {
        let owned = ballots(raw);
        let refs: Vec<&[CandidateId]> = owned.iter().map(|b| b.as_slice()).collect();
        tally(scheme, m, &refs).iter().map(|s| s.0).collect()
    }

    fn winner(scheme: VotingScheme, m: usize, raw: &[&[u32]]) -> CandidateId {
        let owned = ballots(raw);
        let refs: Vec<&[CandidateId]> = owned.iter().map(|b| b.as_slice()).collect();
        evaluate(scheme, m, &refs, false).unwrap().winner()
    }

    const FIVE: &[&[u32]] = &[
        &[0, 1, 2, 3],
        &[1, 2, 0, 3],
        &[1, 3, 0, 2],
        &[2, 0, 1, 3],
        &[3, 2, 1, 0],
    ];

    #[test]
    fn plurality() {
        assert_eq!(scores(VotingScheme::Plurality, 4, FIVE), vec![1, 2, 1, 1]);
        assert_eq!(winner(VotingScheme::Plurality, 4, FIVE), c(1));
    }

    #[test]
    fn vote_for_two() {
        assert_eq!(scores(VotingScheme::VoteForTwo, 4, FIVE), vec![2, 3, 3, 2]);
        assert_eq!(winner(VotingScheme::VoteForTwo, 4, FIVE), c(1));
    }

    #[test]
    fn anti_plurality() {
        assert_eq!(scores(VotingScheme::AntiPlurality, 4, FIVE), vec![4, 5, 4, 2]);
        assert_eq!(winner(VotingScheme::AntiPlurality, 4, FIVE), c(1));
    }

    #[test]
    fn borda() {
        // 0: 3+1+1+2+0, 1: 2+3+3+1+1, 2: 1+2+0+3+2, 3: 0+0+2+0+3
        assert_eq!(scores(VotingScheme::Borda, 4, FIVE), vec![7, 10, 8, 5]);
        assert_eq!(winner(VotingScheme::Borda, 4, FIVE), c(1));
    }

    #[test]
    fn ties_go_to_the_smallest_id() {
        let symmetric: &[&[u32]] = &[&[0, 1, 2, 3], &[1, 2, 3, 0], &[2, 3, 0, 1], &[3, 0, 1, 2]];
        for scheme in VotingScheme::ALL {
            assert_eq!(winner(scheme, 4, symmetric), c(0), "{}", scheme);
        }
        let owned = ballots(&[&[2, 1, 0], &[1, 2, 0]]);
        let refs: Vec<&[CandidateId]> = owned.iter().map(|b| b.as_slice()).collect();
        let outcome = evaluate(VotingScheme::Borda, 3, &refs, true).unwrap();
        assert_eq!(outcome.ranking().unwrap().to_vec(), vec![c(1), c(2), c(0)]);
    }

    #[test]
    fn ranking_lists_every_candidate() {
        let owned = ballots(&[&[2], &[2, 0]]);
        let refs: Vec<&[CandidateId]> = owned.iter().map(|b| b.as_slice()).collect();
        let outcome = evaluate(VotingScheme::Plurality, 4, &refs, true).unwrap();
        let ranking = outcome.ranking().unwrap();
        assert_eq!(ranking.len(), 4);
        assert_eq!(ranking.to_vec(), vec![c(2), c(0), c(1), c(3)]);
        assert_eq!(ranking.position(c(1)), Some(2));
    }

    #[test]
    fn truncated_ballots() {
        // The single entry of a bullet ballot gets m_max - 1 points.
        assert_eq!(
            scores(VotingScheme::Borda, 3, &[&[0, 1, 2], &[2]]),
            vec![2, 1, 2]
        );
        // Omitted candidates are the implicit bottom.
        assert_eq!(
            scores(VotingScheme::AntiPlurality, 3, &[&[0, 1, 2], &[2]]),
            vec![1, 1, 1]
        );
        assert_eq!(scores(VotingScheme::Plurality, 3, &[&[], &[1]]), vec![0, 1, 0]);
    }

    #[test]
    fn no_candidates() {
        assert_eq!(
            evaluate(VotingScheme::Borda, 0, &[], false),
            Err(TacticalError::EmptyElection)
        );
    }
}
