use log::{debug, info};

use std::collections::{BTreeMap, HashSet};

use crate::config::*;
use crate::happiness::{happiness, population_happiness, PopulationHappiness};
use crate::profile::Profile;
use crate::scenario::{CandidateId, Scenario, Voter, VoterId};
use crate::schemes::{evaluate_profile, tally, Outcome, Score};

/// The outcome of an election in which one voter replaced its ballot.
#[derive(Debug, Clone)]
struct Trial {
    outcome: Outcome,
    // Measured against the sincere preferences of the deviating voter.
    voter_happiness: f64,
}

/// Everything a search needs to know about the honest election.
///
/// Computed once per scenario and shared by the searches of all the voters.
/// The baseline is usually the sincere profile, but a context can also be
/// built on a profile where some voters already deviate: the searches then
/// look for the best reply to those ballots.
#[derive(Debug, Clone)]
pub struct StrategicContext<'a> {
    scenario: &'a Scenario,
    base: Profile<'a>,
    scheme: VotingScheme,
    metric: HappinessFunc,
    honest: Outcome,
    honest_scores: Vec<Score>,
    honest_happiness: PopulationHappiness,
}

impl<'a> StrategicContext<'a> {
    pub fn new(
        scenario: &'a Scenario,
        scheme: VotingScheme,
        metric: HappinessFunc,
    ) -> TacticalResult<StrategicContext<'a>> {
        StrategicContext::from_profile(Profile::new(scenario), scheme, metric)
    }

    /// A context whose baseline is the given profile instead of the sincere one.
    ///
    /// Happiness is still measured against the sincere preferences.
    pub fn from_profile(
        base: Profile<'a>,
        scheme: VotingScheme,
        metric: HappinessFunc,
    ) -> TacticalResult<StrategicContext<'a>> {
        let scenario = base.scenario();
        let honest = evaluate_profile(&base, scheme, metric.requires_ranking())?;
        let ballots: Vec<&[CandidateId]> = base.ballots().collect();
        let honest_scores = tally(scheme, scenario.num_candidates(), &ballots);
        let honest_happiness = population_happiness(scenario, &honest, metric)?;
        Ok(StrategicContext {
            scenario,
            base,
            scheme,
            metric,
            honest,
            honest_scores,
            honest_happiness,
        })
    }

    pub fn scenario(&self) -> &'a Scenario {
        self.scenario
    }

    /// The ballots of the baseline election.
    pub fn base(&self) -> &Profile<'a> {
        &self.base
    }

    pub fn scheme(&self) -> VotingScheme {
        self.scheme
    }

    pub fn metric(&self) -> HappinessFunc {
        self.metric
    }

    pub fn honest_outcome(&self) -> &Outcome {
        &self.honest
    }

    pub fn honest_winner(&self) -> CandidateId {
        self.honest.winner()
    }

    pub fn honest_happiness(&self) -> &PopulationHappiness {
        &self.honest_happiness
    }

    /// Runs the election on a profile, with the kind of outcome the metric needs.
    pub fn outcome(&self, profile: &Profile) -> TacticalResult<Outcome> {
        evaluate_profile(profile, self.scheme, self.metric.requires_ranking())
    }

    fn try_ballot(&self, voter: Voter, ballot: &[CandidateId]) -> TacticalResult<Trial> {
        let profile = self.base.clone().with_ballot(voter.id, ballot.to_vec());
        let outcome = self.outcome(&profile)?;
        let voter_happiness = happiness(voter.preferences, &outcome, self.metric)?;
        Ok(Trial {
            outcome,
            voter_happiness,
        })
    }

    fn record(
        &self,
        voter: Voter,
        kind: StrategyType,
        ballot: &[CandidateId],
        trial: Trial,
    ) -> TacticalResult<StrategicOption> {
        let strategic = population_happiness(self.scenario, &trial.outcome, self.metric)?;
        debug!(
            "record: voter: {:?} kind: {} ballot: {:?} winner: {:?}",
            voter.id,
            kind,
            ballot,
            trial.outcome.winner()
        );
        Ok(StrategicOption {
            voter: voter.id,
            kind,
            ballot: ballot.to_vec(),
            outcome: trial.outcome,
            strategic_individual_happiness: trial.voter_happiness,
            original_individual_happiness: self.honest_happiness.of(voter.id),
            strategic_total_happiness: strategic.total,
            original_total_happiness: self.honest_happiness.total,
        })
    }

    /// Searches the improving ballots of one voter within one strategy family.
    ///
    /// Returns `None` when the voter's top choice already wins or when no
    /// ballot of the family improves its happiness.
    pub fn find_strategy(
        &self,
        voter: VoterId,
        kind: StrategyType,
        mode: SearchMode,
    ) -> TacticalResult<Option<Vec<StrategicOption>>> {
        let voter = self.scenario.voter(voter)?;
        if voter.preferences.first() == Some(&self.honest_winner()) {
            return Ok(None);
        }
        let options = match kind {
            StrategyType::Bullet => self.bullet(voter, mode)?,
            StrategyType::Burying => self.burying(voter, mode)?,
            StrategyType::Compromising => self.compromising(voter, mode)?,
        };
        if options.is_empty() {
            Ok(None)
        } else {
            Ok(Some(options))
        }
    }

    /// Repeatedly drops the current winner from the submitted ballot.
    fn bullet(&self, voter: Voter, mode: SearchMode) -> TacticalResult<Vec<StrategicOption>> {
        let original = self.honest_happiness.of(voter.id);
        let mut res: Vec<StrategicOption> = Vec::new();
        let mut ballot: Vec<CandidateId> = voter.preferences.to_vec();
        let mut winner = self.honest_winner();
        while let Some(pos) = ballot.iter().position(|c| *c == winner) {
            ballot.remove(pos);
            // An empty ballot is an abstention, not a strategy.
            if ballot.is_empty() {
                break;
            }
            let trial = self.try_ballot(voter, &ballot)?;
            winner = trial.outcome.winner();
            if trial.voter_happiness > original {
                res.push(self.record(voter, StrategyType::Bullet, &ballot, trial)?);
                if mode == SearchMode::FirstFound {
                    break;
                }
            }
        }
        Ok(res)
    }

    /// Depth-first exploration of the ballots reachable by pushing the current
    /// winner down one position at a time.
    ///
    /// A ballot is tried at most once over the whole search, which bounds the
    /// exploration by the number of permutations of the ballot.
    fn burying(&self, voter: Voter, mode: SearchMode) -> TacticalResult<Vec<StrategicOption>> {
        let original = self.honest_happiness.of(voter.id);
        let honest_winner = self.honest_winner();
        let mut res: Vec<StrategicOption> = Vec::new();
        let mut visited: HashSet<Vec<CandidateId>> = HashSet::new();
        visited.insert(voter.preferences.to_vec());
        // Each entry: a ballot to sweep, and the winner it produces.
        let mut stack: Vec<(Vec<CandidateId>, CandidateId)> =
            vec![(voter.preferences.to_vec(), honest_winner)];

        while let Some((mut ballot, buried)) = stack.pop() {
            let mut idx = match ballot.iter().position(|c| *c == buried) {
                Some(idx) => idx,
                None => continue,
            };
            while idx + 1 < ballot.len() {
                ballot.swap(idx, idx + 1);
                idx += 1;
                if !visited.insert(ballot.clone()) {
                    continue;
                }
                let trial = self.try_ballot(voter, &ballot)?;
                let new_winner = trial.outcome.winner();
                if new_winner == buried {
                    continue;
                }
                if new_winner != honest_winner && trial.voter_happiness > original {
                    res.push(self.record(voter, StrategyType::Burying, &ballot, trial)?);
                    if mode == SearchMode::FirstFound {
                        return Ok(res);
                    }
                } else {
                    stack.push((ballot.clone(), new_winner));
                }
            }
        }
        debug!(
            "burying: voter: {:?} visited {} ballots, found {}",
            voter.id,
            visited.len(),
            res.len()
        );
        Ok(res)
    }

    /// Moves a candidate the voter prefers over the winner to the front,
    /// trying the strongest contenders first.
    fn compromising(
        &self,
        voter: Voter,
        mode: SearchMode,
    ) -> TacticalResult<Vec<StrategicOption>> {
        let original = self.honest_happiness.of(voter.id);
        let honest_winner = self.honest_winner();
        let mut res: Vec<StrategicOption> = Vec::new();
        let winner_pos = match voter.preferences.iter().position(|c| *c == honest_winner) {
            Some(pos) => pos,
            None => return Ok(res),
        };
        let mut contenders: Vec<CandidateId> = voter.preferences[1..winner_pos].to_vec();
        let score_of = |cid: &CandidateId| {
            self.honest_scores
                .get(cid.index())
                .copied()
                .unwrap_or(Score(0))
        };
        contenders.sort_by(|c1, c2| score_of(c2).cmp(&score_of(c1)).then(c1.cmp(c2)));

        for cid in contenders {
            let mut ballot: Vec<CandidateId> = voter.preferences.to_vec();
            ballot.retain(|c| *c != cid);
            ballot.insert(0, cid);
            let trial = self.try_ballot(voter, &ballot)?;
            if trial.outcome.winner() != honest_winner && trial.voter_happiness > original {
                res.push(self.record(voter, StrategyType::Compromising, &ballot, trial)?);
                if mode == SearchMode::FirstFound {
                    break;
                }
            }
        }
        Ok(res)
    }

    /// The options of every voter for one strategy family. Voters without options are absent.
    pub fn options_by_voter(
        &self,
        kind: StrategyType,
        mode: SearchMode,
    ) -> TacticalResult<OptionsByVoter> {
        let mut res: OptionsByVoter = BTreeMap::new();
        for vid in self.scenario.voter_ids() {
            if let Some(options) = self.find_strategy(vid, kind, mode)? {
                res.insert(vid, options);
            }
        }
        Ok(res)
    }
}

/// Searches the improving ballots of one voter within one strategy family.
///
/// Nothing to gain is not an error: the result is `None` when the sincere top
/// choice of the voter already wins, or when the search finds nothing.
pub fn find_strategy(
    scenario: &Scenario,
    voter: VoterId,
    scheme: VotingScheme,
    metric: HappinessFunc,
    kind: StrategyType,
    mode: SearchMode,
) -> TacticalResult<Option<Vec<StrategicOption>>> {
    let ctx = StrategicContext::new(scenario, scheme, metric)?;
    ctx.find_strategy(voter, kind, mode)
}

/// Runs the three strategy families for one voter. Families that found nothing are absent.
pub fn apply_all_strategies(
    scenario: &Scenario,
    voter: VoterId,
    scheme: VotingScheme,
    metric: HappinessFunc,
    mode: SearchMode,
) -> TacticalResult<BTreeMap<StrategyType, Vec<StrategicOption>>> {
    let ctx = StrategicContext::new(scenario, scheme, metric)?;
    let mut res: BTreeMap<StrategyType, Vec<StrategicOption>> = BTreeMap::new();
    for kind in StrategyType::ALL {
        if let Some(options) = ctx.find_strategy(voter, kind, mode)? {
            res.insert(kind, options);
        }
    }
    Ok(res)
}

/// The honest election of a scenario and the options of all its voters.
#[derive(PartialEq, Debug, Clone)]
pub struct ScenarioAnalysis {
    pub honest_outcome: Outcome,
    pub honest_happiness: PopulationHappiness,
    pub options: OptionsByVoter,
}

impl ScenarioAnalysis {
    pub fn num_strategic_voters(&self) -> usize {
        self.options.len()
    }
}

pub fn analyse_scenario(
    scenario: &Scenario,
    rules: &AnalysisRules,
) -> TacticalResult<ScenarioAnalysis> {
    let ctx = StrategicContext::new(scenario, rules.voting_scheme, rules.happiness_func)?;
    let options = ctx.options_by_voter(rules.strategy_type, rules.search_mode)?;
    info!(
        "analyse_scenario: {} voters, winner {:?}, {} voters with a {} strategy",
        scenario.num_voters(),
        ctx.honest_winner(),
        options.len(),
        rules.strategy_type
    );
    Ok(ScenarioAnalysis {
        honest_outcome: ctx.honest.clone(),
        honest_happiness: ctx.honest_happiness.clone(),
        options,
    })
}
