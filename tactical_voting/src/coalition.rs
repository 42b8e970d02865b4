use itertools::Itertools;
use log::{debug, info};
use snafu::ensure;

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};

use crate::config::*;
use crate::happiness::{population_happiness, PopulationHappiness};
use crate::scenario::{CandidateId, Scenario, VoterId};
use crate::schemes::Outcome;
use crate::strategies::StrategicContext;

/// Voters sharing a strategic target.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoterGroup {
    pub target: CandidateId,
    pub members: Vec<VoterId>,
}

/// A subset of a group that will be tried as a coalition.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CoalitionCandidate {
    pub target: CandidateId,
    pub members: Vec<VoterId>,
}

/// Merges the options found by several strategy families.
///
/// Options are kept in the order of the families, and an option whose ballot
/// was already seen for the same voter is dropped.
pub fn merge_strategies(per_family: Vec<OptionsByVoter>) -> OptionsByVoter {
    let mut merged: OptionsByVoter = BTreeMap::new();
    for family in per_family.into_iter() {
        for (vid, options) in family.into_iter() {
            let entry = merged.entry(vid).or_insert_with(Vec::new);
            for opt in options.into_iter() {
                if !entry.iter().any(|o| o.ballot == opt.ballot) {
                    entry.push(opt);
                }
            }
        }
    }
    merged.retain(|_, options| !options.is_empty());
    merged
}

/// Groups the dissatisfied strategic voters by the candidate they could rally behind.
///
/// A voter joins the first group whose target is among its two favourite
/// candidates, and otherwise starts a group for its favourite candidate.
/// Voters left alone are then added to every larger group whose target they
/// prefer to the honest winner, and the groups of one voter are dropped.
pub fn group_voters(
    scenario: &Scenario,
    honest_winner: CandidateId,
    strategic: &[VoterId],
) -> Vec<VoterGroup> {
    let mut groups: Vec<VoterGroup> = Vec::new();
    for vid in strategic.iter() {
        let prefs = match scenario.voter(*vid) {
            Ok(v) => v.preferences,
            Err(_) => continue,
        };
        let top = match prefs.first() {
            Some(c) if *c != honest_winner => *c,
            _ => continue,
        };
        let top_two = &prefs[..prefs.len().min(2)];
        match groups.iter_mut().find(|g| top_two.contains(&g.target)) {
            Some(g) => g.members.push(*vid),
            None => groups.push(VoterGroup {
                target: top,
                members: vec![*vid],
            }),
        }
    }

    let aims: Vec<(usize, CandidateId)> = groups
        .iter()
        .enumerate()
        .filter(|(_, g)| g.members.len() > 1)
        .map(|(idx, g)| (idx, g.target))
        .collect();
    let singletons: Vec<VoterId> = groups
        .iter()
        .filter(|g| g.members.len() == 1)
        .map(|g| g.members[0])
        .collect();
    for vid in singletons {
        let prefs = scenario.sincere(vid);
        let pos = |c: CandidateId| prefs.iter().position(|x| *x == c);
        for (idx, aim) in aims.iter() {
            if let (Some(pa), Some(pw)) = (pos(*aim), pos(honest_winner)) {
                if pa < pw {
                    groups[*idx].members.push(vid);
                }
            }
        }
    }
    groups.retain(|g| g.members.len() > 1);
    debug!("group_voters: {:?}", groups);
    groups
}

/// All the subsets of 2 to `max_size` members of every group, largest first.
///
/// The sort is stable: within one size, the groups keep their order and the
/// subsets their lexicographic order.
pub fn form_coalitions(groups: &[VoterGroup], max_size: usize) -> Vec<CoalitionCandidate> {
    let mut res: Vec<CoalitionCandidate> = Vec::new();
    for g in groups.iter() {
        let upper = max_size.min(g.members.len());
        for size in 2..=upper {
            for members in g.members.iter().copied().combinations(size) {
                res.push(CoalitionCandidate {
                    target: g.target,
                    members,
                });
            }
        }
    }
    res.sort_by_key(|c| Reverse(c.members.len()));
    res
}

/// For each member, the first option that puts the target first and the
/// honest winner in the bottom half of the ballot.
///
/// Members without such an option are absent.
pub fn select_ballots(
    candidate: &CoalitionCandidate,
    strategic: &OptionsByVoter,
    honest_winner: CandidateId,
) -> BTreeMap<VoterId, Vec<CandidateId>> {
    let mut res: BTreeMap<VoterId, Vec<CandidateId>> = BTreeMap::new();
    for vid in candidate.members.iter() {
        let options = match strategic.get(vid) {
            Some(options) => options,
            None => continue,
        };
        let chosen = options.iter().find(|o| {
            o.ballot.first() == Some(&candidate.target)
                && o.ballot[o.ballot.len() / 2..].contains(&honest_winner)
        });
        if let Some(opt) = chosen {
            res.insert(*vid, opt.ballot.clone());
        }
    }
    res
}

/// Casts several replaced ballots at once.
pub fn replay_ballots(
    ctx: &StrategicContext,
    ballots: &BTreeMap<VoterId, Vec<CandidateId>>,
) -> TacticalResult<(Outcome, PopulationHappiness)> {
    let mut profile = ctx.base().clone();
    for (vid, ballot) in ballots.iter() {
        profile.set_ballot(*vid, ballot.clone());
    }
    let outcome = ctx.outcome(&profile)?;
    let happiness = population_happiness(ctx.scenario(), &outcome, ctx.metric())?;
    Ok((outcome, happiness))
}

/// Tries the coalitions in order and returns the first one that leaves every
/// member at least as happy and one member strictly happier.
pub fn collude(
    ctx: &StrategicContext,
    candidates: &[CoalitionCandidate],
    strategic: &OptionsByVoter,
) -> TacticalResult<Option<CoalitionFinding>> {
    let honest_winner = ctx.honest_winner();
    let honest = ctx.honest_happiness();
    let mut processed: HashSet<Vec<VoterId>> = HashSet::new();

    for candidate in candidates.iter() {
        let ballots = select_ballots(candidate, strategic, honest_winner);
        let members: Vec<VoterId> = candidate
            .members
            .iter()
            .copied()
            .filter(|v| ballots.contains_key(v))
            .collect();
        if members.len() < 2 || !processed.insert(members.clone()) {
            continue;
        }
        let (outcome, after) = replay_ballots(ctx, &ballots)?;
        let all_weakly = members.iter().all(|v| after.of(*v) >= honest.of(*v));
        let one_strictly = members.iter().any(|v| after.of(*v) > honest.of(*v));
        debug!(
            "collude: target: {:?} members: {:?} winner: {:?} valid: {}",
            candidate.target,
            members,
            outcome.winner(),
            all_weakly && one_strictly
        );
        if all_weakly && one_strictly {
            let original_happiness: BTreeMap<VoterId, f64> =
                members.iter().map(|v| (*v, honest.of(*v))).collect();
            let strategic_happiness: BTreeMap<VoterId, f64> =
                members.iter().map(|v| (*v, after.of(*v))).collect();
            return Ok(Some(CoalitionFinding {
                target: candidate.target,
                members,
                ballots,
                honest_winner,
                outcome,
                original_happiness,
                strategic_happiness,
                original_total_happiness: honest.total,
                strategic_total_happiness: after.total,
            }));
        }
    }
    Ok(None)
}

/// Runs the whole coalition search on an existing context.
pub fn find_coalition_with(
    ctx: &StrategicContext,
    max_coalition_size: usize,
) -> TacticalResult<Option<CoalitionFinding>> {
    ensure!(
        max_coalition_size >= 2,
        InvalidCoalitionSizeSnafu {
            size: max_coalition_size
        }
    );
    let mut per_family: Vec<OptionsByVoter> = Vec::new();
    for kind in [
        StrategyType::Burying,
        StrategyType::Bullet,
        StrategyType::Compromising,
    ] {
        per_family.push(ctx.options_by_voter(kind, SearchMode::Exhaustive)?);
    }
    let strategic = merge_strategies(per_family);
    if strategic.len() < 2 {
        return Ok(None);
    }
    let voters: Vec<VoterId> = strategic.keys().copied().collect();
    let groups = group_voters(ctx.scenario(), ctx.honest_winner(), &voters);
    let candidates = form_coalitions(&groups, max_coalition_size);
    let finding = collude(ctx, &candidates, &strategic)?;
    info!(
        "find_coalition: {} strategic voters, {} groups, {} coalitions, found: {}",
        strategic.len(),
        groups.len(),
        candidates.len(),
        finding.is_some()
    );
    Ok(finding)
}

/// Searches a coalition of 2 to `max_coalition_size` voters that can jointly
/// change the outcome to the benefit of all of its members.
///
/// The first valid coalition is returned, trying larger coalitions first.
pub fn find_coalition(
    scenario: &Scenario,
    scheme: VotingScheme,
    metric: HappinessFunc,
    max_coalition_size: usize,
) -> TacticalResult<Option<CoalitionFinding>> {
    let ctx = StrategicContext::new(scenario, scheme, metric)?;
    find_coalition_with(&ctx, max_coalition_size)
}
