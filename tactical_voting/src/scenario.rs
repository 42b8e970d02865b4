use log::debug;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use snafu::{ensure, OptionExt};

use std::collections::{BTreeSet, HashMap};

use crate::config::*;

/// A candidate of one scenario.
///
/// Identifiers are assigned in the lexicographic order of the candidate names,
/// so comparing two ids is the same as comparing the names.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct CandidateId(pub u32);

impl CandidateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A voter of one scenario, numbered from 0.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct VoterId(pub usize);

/// A voter together with its sincere ranking, most preferred first.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Voter<'a> {
    pub id: VoterId,
    pub preferences: &'a [CandidateId],
}

/// One election instance: the candidates and the sincere ranking of every voter.
///
/// All the rankings live in a single buffer. A scenario is never modified
/// once built: the strategy searches override single ballots through a
/// [`crate::profile::Profile`] instead.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Scenario {
    // Sorted, indexed by CandidateId.
    candidates: Vec<String>,
    // Invariant: num_voters * candidates.len() entries, every chunk is a permutation.
    ballots: Vec<CandidateId>,
    num_voters: usize,
    seed: Option<u64>,
}

fn check_dimensions(num_voters: usize, num_candidates: usize) -> TacticalResult<()> {
    ensure!(
        (1..=MAX_CANDIDATES).contains(&num_candidates),
        InvalidCandidateCountSnafu {
            count: num_candidates,
            max: MAX_CANDIDATES
        }
    );
    ensure!(num_voters > 0, EmptyElectionSnafu);
    Ok(())
}

/// The names given to generated candidates: "A", "B", ...
pub fn default_candidate_names(num_candidates: usize) -> Vec<String> {
    (0..num_candidates)
        .map(|idx| ((b'A' + idx as u8) as char).to_string())
        .collect()
}

fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| rand::thread_rng().gen())
}

impl Scenario {
    /// Draws a random scenario in which every ranking is uniformly shuffled.
    ///
    /// The same seed always produces the same rankings: a master generator
    /// draws one seed per voter, and each voter shuffles with its own generator.
    pub fn generate(config: &GenerationConfig) -> TacticalResult<Scenario> {
        check_dimensions(config.num_voters, config.num_candidates)?;
        let seed = resolve_seed(config.seed);
        let mut master = ChaCha20Rng::seed_from_u64(seed);
        let ids: Vec<CandidateId> = (0..config.num_candidates)
            .map(|idx| CandidateId(idx as u32))
            .collect();

        let mut ballots: Vec<CandidateId> =
            Vec::with_capacity(config.num_voters * config.num_candidates);
        for _ in 0..config.num_voters {
            let voter_seed: u64 = master.gen();
            let mut voter_rng = ChaCha20Rng::seed_from_u64(voter_seed);
            let mut prefs = ids.clone();
            prefs.shuffle(&mut voter_rng);
            ballots.extend(prefs);
        }
        debug!(
            "generate: {} voters, {} candidates, seed {}",
            config.num_voters, config.num_candidates, seed
        );
        Ok(Scenario {
            candidates: default_candidate_names(config.num_candidates),
            ballots,
            num_voters: config.num_voters,
            seed: Some(seed),
        })
    }

    /// Builds a scenario from literal preference lists.
    ///
    /// Every list must name each candidate exactly once.
    pub fn from_preferences(
        candidates: &[String],
        preferences: &[Vec<String>],
    ) -> TacticalResult<Scenario> {
        check_dimensions(preferences.len(), candidates.len())?;
        let mut sorted: Vec<String> = candidates.to_vec();
        sorted.sort();
        for pair in sorted.windows(2) {
            ensure!(
                pair[0] != pair[1],
                DuplicateCandidateSnafu {
                    name: pair[0].clone()
                }
            );
        }
        let by_name: HashMap<&str, CandidateId> = sorted
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.as_str(), CandidateId(idx as u32)))
            .collect();

        let mut rankings: Vec<Vec<CandidateId>> = Vec::with_capacity(preferences.len());
        for prefs in preferences.iter() {
            let mut ranking: Vec<CandidateId> = Vec::with_capacity(prefs.len());
            for name in prefs.iter() {
                let cid = by_name
                    .get(name.as_str())
                    .copied()
                    .context(UnknownCandidateSnafu { name: name.clone() })?;
                ranking.push(cid);
            }
            rankings.push(ranking);
        }
        Scenario::from_rankings(sorted, rankings, None)
    }

    /// Builds a scenario from rankings already expressed with ids.
    /// `candidates` must be sorted.
    pub(crate) fn from_rankings(
        candidates: Vec<String>,
        rankings: Vec<Vec<CandidateId>>,
        seed: Option<u64>,
    ) -> TacticalResult<Scenario> {
        check_dimensions(rankings.len(), candidates.len())?;
        let m = candidates.len();
        let mut ballots: Vec<CandidateId> = Vec::with_capacity(rankings.len() * m);
        for (voter, ranking) in rankings.iter().enumerate() {
            ensure!(is_permutation(ranking, m), InvalidBallotSnafu { voter });
            ballots.extend(ranking.iter().copied());
        }
        Ok(Scenario {
            candidates,
            ballots,
            num_voters: rankings.len(),
            seed,
        })
    }

    pub fn num_candidates(&self) -> usize {
        self.candidates.len()
    }

    pub fn num_voters(&self) -> usize {
        self.num_voters
    }

    /// The seed this scenario was generated from, if any.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// The candidate names, in id order.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn candidate_ids(&self) -> impl Iterator<Item = CandidateId> {
        (0..self.candidates.len()).map(|idx| CandidateId(idx as u32))
    }

    pub fn candidate_name(&self, cid: CandidateId) -> Option<&str> {
        self.candidates.get(cid.index()).map(|s| s.as_str())
    }

    pub fn candidate_id(&self, name: &str) -> Option<CandidateId> {
        self.candidates
            .binary_search_by(|c| c.as_str().cmp(name))
            .ok()
            .map(|idx| CandidateId(idx as u32))
    }

    /// Translates a ballot back to candidate names.
    pub fn names(&self, ballot: &[CandidateId]) -> Vec<String> {
        ballot
            .iter()
            .filter_map(|cid| self.candidate_name(*cid).map(|s| s.to_string()))
            .collect()
    }

    pub fn voter(&self, id: VoterId) -> TacticalResult<Voter<'_>> {
        ensure!(id.0 < self.num_voters, UnknownVoterSnafu { voter: id.0 });
        Ok(Voter {
            id,
            preferences: self.sincere(id),
        })
    }

    pub fn voters(&self) -> impl Iterator<Item = Voter<'_>> {
        self.ballots
            .chunks(self.candidates.len())
            .enumerate()
            .map(|(idx, preferences)| Voter {
                id: VoterId(idx),
                preferences,
            })
    }

    pub fn voter_ids(&self) -> impl Iterator<Item = VoterId> {
        (0..self.num_voters).map(VoterId)
    }

    // Callers are responsible for checking the range of the voter.
    pub(crate) fn sincere(&self, id: VoterId) -> &[CandidateId] {
        let m = self.candidates.len();
        &self.ballots[id.0 * m..(id.0 + 1) * m]
    }

    /// Hides a fraction of every ranking from the analyst.
    ///
    /// For each voter, `round(info_noise * m)` positions are chosen at random and masked.
    pub fn mask<R: Rng + ?Sized>(
        &self,
        info_noise: f64,
        rng: &mut R,
    ) -> TacticalResult<PartialScenario> {
        ensure!(
            (0.0..=1.0).contains(&info_noise),
            InvalidNoiseSnafu { noise: info_noise }
        );
        let m = self.num_candidates();
        let num_masked = ((info_noise * m as f64).round() as usize).min(m);
        let rankings: Vec<PartialRanking> = self
            .voters()
            .map(|v| {
                let masked: BTreeSet<usize> = index::sample(rng, m, num_masked).into_iter().collect();
                PartialRanking::from_ranking(v.preferences, &masked)
            })
            .collect();
        Ok(PartialScenario {
            candidates: self.candidates.clone(),
            rankings,
        })
    }
}

fn is_permutation(ranking: &[CandidateId], m: usize) -> bool {
    if ranking.len() != m {
        return false;
    }
    let mut seen = vec![false; m];
    for cid in ranking.iter() {
        match seen.get_mut(cid.index()) {
            Some(s) if !*s => *s = true,
            _ => return false,
        }
    }
    true
}

/// A ranking in which some positions are unknown.
///
/// The known entries keep their positions. The candidates of the unknown
/// positions are kept as an unordered set until the ranking is completed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PartialRanking {
    slots: Vec<Option<CandidateId>>,
    missing: BTreeSet<CandidateId>,
}

impl PartialRanking {
    pub fn from_ranking(ranking: &[CandidateId], masked: &BTreeSet<usize>) -> PartialRanking {
        let mut slots: Vec<Option<CandidateId>> = Vec::with_capacity(ranking.len());
        let mut missing: BTreeSet<CandidateId> = BTreeSet::new();
        for (pos, cid) in ranking.iter().enumerate() {
            if masked.contains(&pos) {
                slots.push(None);
                missing.insert(*cid);
            } else {
                slots.push(Some(*cid));
            }
        }
        PartialRanking { slots, missing }
    }

    /// The known entries with their positions.
    pub fn known(&self) -> impl Iterator<Item = (usize, CandidateId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(pos, slot)| slot.map(|cid| (pos, cid)))
    }

    pub fn missing(&self) -> &BTreeSet<CandidateId> {
        &self.missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Fills the unknown positions with a random permutation of the missing candidates.
    pub fn complete<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<CandidateId> {
        let mut fill: Vec<CandidateId> = self.missing.iter().copied().collect();
        fill.shuffle(rng);
        let mut fill_iter = fill.into_iter();
        let mut res: Vec<CandidateId> = Vec::with_capacity(self.slots.len());
        for slot in self.slots.iter() {
            match slot {
                Some(cid) => res.push(*cid),
                None => {
                    if let Some(cid) = fill_iter.next() {
                        res.push(cid);
                    }
                }
            }
        }
        res.extend(fill_iter);
        res
    }
}

/// A scenario as seen by an analyst with partial information.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PartialScenario {
    candidates: Vec<String>,
    rankings: Vec<PartialRanking>,
}

impl PartialScenario {
    /// Generates a scenario and masks it according to `config.info_noise`.
    ///
    /// The underlying rankings are the ones [`Scenario::generate`] returns for
    /// the same seed.
    pub fn generate(config: &GenerationConfig) -> TacticalResult<PartialScenario> {
        let seed = resolve_seed(config.seed);
        let scenario = Scenario::generate(&GenerationConfig {
            seed: Some(seed),
            ..*config
        })?;
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        // A separate stream, so the masks do not replay the voter seeds.
        rng.set_stream(1);
        scenario.mask(config.info_noise.unwrap_or(0.0), &mut rng)
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn rankings(&self) -> &[PartialRanking] {
        &self.rankings
    }

    pub fn num_voters(&self) -> usize {
        self.rankings.len()
    }

    /// Draws one complete scenario compatible with the known entries.
    pub fn complete<R: Rng + ?Sized>(&self, rng: &mut R) -> TacticalResult<Scenario> {
        let rankings: Vec<Vec<CandidateId>> =
            self.rankings.iter().map(|pr| pr.complete(rng)).collect();
        Scenario::from_rankings(self.candidates.clone(), rankings, None)
    }
}
