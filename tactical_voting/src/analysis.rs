use itertools::Itertools;
use log::{debug, info, warn};
use rand::Rng;
use snafu::ensure;

use std::collections::BTreeMap;

use crate::coalition::{find_coalition_with, replay_ballots};
use crate::config::*;
use crate::happiness::population_happiness;
use crate::profile::Profile;
use crate::scenario::{CandidateId, PartialScenario, Scenario, VoterId};
use crate::schemes::evaluate_profile;
use crate::strategies::StrategicContext;

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * count as f64 / total as f64
    }
}

/// Draws `repetitions` independent scenarios.
///
/// With a seed, scenario `i` uses `seed + i`, so a population can be
/// regenerated exactly.
pub fn generate_population(
    config: &GenerationConfig,
    repetitions: usize,
) -> TacticalResult<Vec<Scenario>> {
    (0..repetitions)
        .map(|idx| {
            let seed = config.seed.map(|s| s.wrapping_add(idx as u64));
            Scenario::generate(&GenerationConfig { seed, ..*config })
        })
        .collect()
}

/// How exposed a population of scenarios is to one strategy family.
#[derive(PartialEq, Debug, Clone)]
pub struct RiskReport {
    /// Percentage of the scenarios where at least one voter can improve its
    /// happiness on its own.
    pub risk_percent: f64,
    pub avg_happiness_honest: f64,
    /// Average total happiness when the first strategic voter found deviates.
    pub avg_happiness_strategic: f64,
    pub scenarios: usize,
    pub vulnerable: usize,
    /// Scenarios that could not be analysed.
    pub skipped: usize,
}

// The total happiness after the first deviation found, voters in id order.
fn first_deviation(ctx: &StrategicContext, kind: StrategyType) -> TacticalResult<Option<f64>> {
    for vid in ctx.scenario().voter_ids() {
        if let Some(options) = ctx.find_strategy(vid, kind, SearchMode::FirstFound)? {
            if let Some(opt) = options.first() {
                return Ok(Some(opt.strategic_total_happiness));
            }
        }
    }
    Ok(None)
}

/// Estimates the risk of strategic voting over a population of scenarios.
///
/// A scenario that cannot be analysed is logged and skipped, it does not
/// abort the batch.
pub fn risk_over_population(
    scenarios: &[Scenario],
    scheme: VotingScheme,
    metric: HappinessFunc,
    kind: StrategyType,
) -> RiskReport {
    let mut analysed: usize = 0;
    let mut vulnerable: usize = 0;
    let mut skipped: usize = 0;
    let mut honest_sum: f64 = 0.0;
    let mut strategic_sum: f64 = 0.0;
    for (idx, scenario) in scenarios.iter().enumerate() {
        let res = StrategicContext::new(scenario, scheme, metric).and_then(|ctx| {
            let deviation = first_deviation(&ctx, kind)?;
            Ok((ctx.honest_happiness().total, deviation))
        });
        match res {
            Ok((honest, deviation)) => {
                analysed += 1;
                honest_sum += honest;
                match deviation {
                    Some(total) => {
                        vulnerable += 1;
                        strategic_sum += total;
                    }
                    None => strategic_sum += honest,
                }
            }
            Err(e) => {
                warn!("risk_over_population: skipping scenario {}: {}", idx, e);
                skipped += 1;
            }
        }
    }
    let avg = |sum: f64| if analysed == 0 { 0.0 } else { sum / analysed as f64 };
    let report = RiskReport {
        risk_percent: percent(vulnerable, analysed),
        avg_happiness_honest: avg(honest_sum),
        avg_happiness_strategic: avg(strategic_sum),
        scenarios: analysed,
        vulnerable,
        skipped,
    };
    info!(
        "risk_over_population: scheme: {} happiness: {} strategy: {} risk: {:.2}%",
        scheme, metric, kind, report.risk_percent
    );
    report
}

/// The risk of each strategy family over the same scenarios.
pub fn risk_by_strategy(
    scenarios: &[Scenario],
    scheme: VotingScheme,
    metric: HappinessFunc,
) -> BTreeMap<StrategyType, RiskReport> {
    StrategyType::ALL
        .iter()
        .map(|kind| (*kind, risk_over_population(scenarios, scheme, metric, *kind)))
        .collect()
}

/// How exposed a population of scenarios is to collusion.
#[derive(PartialEq, Debug, Clone)]
pub struct CoalitionRisk {
    /// Percentage of the scenarios with a valid coalition.
    pub risk_percent: f64,
    /// Percentage of the scenarios where the coalition also raises the total happiness.
    pub happiness_improvement_percent: f64,
    pub scenarios: usize,
    pub skipped: usize,
}

pub fn coalition_risk_over_population(
    scenarios: &[Scenario],
    scheme: VotingScheme,
    metric: HappinessFunc,
    max_coalition_size: usize,
) -> TacticalResult<CoalitionRisk> {
    ensure!(
        max_coalition_size >= 2,
        InvalidCoalitionSizeSnafu {
            size: max_coalition_size
        }
    );
    let mut analysed: usize = 0;
    let mut colluding: usize = 0;
    let mut improving: usize = 0;
    let mut skipped: usize = 0;
    for (idx, scenario) in scenarios.iter().enumerate() {
        let res = StrategicContext::new(scenario, scheme, metric)
            .and_then(|ctx| find_coalition_with(&ctx, max_coalition_size));
        match res {
            Ok(finding) => {
                analysed += 1;
                if let Some(f) = finding {
                    colluding += 1;
                    if f.total_gain() > 0.0 {
                        improving += 1;
                    }
                }
            }
            Err(e) => {
                warn!("coalition_risk_over_population: skipping scenario {}: {}", idx, e);
                skipped += 1;
            }
        }
    }
    Ok(CoalitionRisk {
        risk_percent: percent(colluding, analysed),
        happiness_improvement_percent: percent(improving, analysed),
        scenarios: analysed,
        skipped,
    })
}

/// A combination of ballots cast at the same time by several voters, from
/// which at least one of them gains.
#[derive(PartialEq, Debug, Clone)]
pub struct SimultaneousOpportunity {
    pub members: Vec<VoterId>,
    /// The ballot of every member. Members without a strategy vote sincerely.
    pub ballots: BTreeMap<VoterId, Vec<CandidateId>>,
    pub winner: CandidateId,
    pub individual_gains: BTreeMap<VoterId, f64>,
    pub total_happiness: f64,
    pub total_happiness_change: f64,
    /// None of the members that gain would gain by casting its ballot alone.
    pub collective_action_required: bool,
}

#[derive(PartialEq, Debug, Clone)]
pub struct SimultaneousAnalysis {
    pub honest_winner: CandidateId,
    pub honest_total_happiness: f64,
    /// The voters with an option of their own.
    pub individual: Vec<VoterId>,
    pub opportunities: Vec<SimultaneousOpportunity>,
}

impl SimultaneousAnalysis {
    /// The size of the largest group of simultaneous strategic voters:
    /// 1 when only individual options exist, 0 when there is nothing to gain.
    pub fn max_strategic_voters(&self) -> usize {
        match self.opportunities.iter().map(|o| o.members.len()).max() {
            Some(n) => n,
            None if !self.individual.is_empty() => 1,
            None => 0,
        }
    }

    /// The best total happiness reached by an opportunity, or the honest one.
    pub fn best_total_happiness(&self) -> f64 {
        self.opportunities
            .iter()
            .map(|o| o.total_happiness)
            .fold(self.honest_total_happiness, f64::max)
    }
}

fn gains_alone(
    ctx: &StrategicContext,
    voter: VoterId,
    ballot: &[CandidateId],
) -> TacticalResult<bool> {
    let mut alone: BTreeMap<VoterId, Vec<CandidateId>> = BTreeMap::new();
    alone.insert(voter, ballot.to_vec());
    let (_, after) = replay_ballots(ctx, &alone)?;
    Ok(after.of(voter) > ctx.honest_happiness().of(voter))
}

/// Tries every group of 2 to `max_voters` voters containing at least one
/// strategic voter, with every combination of their options.
pub fn analyse_simultaneous(
    scenario: &Scenario,
    scheme: VotingScheme,
    metric: HappinessFunc,
    kind: StrategyType,
    max_voters: usize,
) -> TacticalResult<SimultaneousAnalysis> {
    ensure!(max_voters >= 2, InvalidCoalitionSizeSnafu { size: max_voters });
    let ctx = StrategicContext::new(scenario, scheme, metric)?;
    let strategic = ctx.options_by_voter(kind, SearchMode::Exhaustive)?;
    let honest = ctx.honest_happiness();

    let mut opportunities: Vec<SimultaneousOpportunity> = Vec::new();
    let upper = max_voters.min(scenario.num_voters());
    for size in 2..=upper {
        for members in scenario.voter_ids().combinations(size) {
            if !members.iter().any(|v| strategic.contains_key(v)) {
                continue;
            }
            let choices: Vec<Vec<Vec<CandidateId>>> = members
                .iter()
                .map(|v| match strategic.get(v) {
                    Some(options) => options.iter().map(|o| o.ballot.clone()).collect(),
                    None => vec![scenario.sincere(*v).to_vec()],
                })
                .collect();
            for combination in choices.into_iter().multi_cartesian_product() {
                let ballots: BTreeMap<VoterId, Vec<CandidateId>> =
                    members.iter().copied().zip(combination.into_iter()).collect();
                let (outcome, after) = replay_ballots(&ctx, &ballots)?;
                let individual_gains: BTreeMap<VoterId, f64> = members
                    .iter()
                    .map(|v| (*v, after.of(*v) - honest.of(*v)))
                    .collect();
                if !individual_gains.values().any(|g| *g > 0.0) {
                    continue;
                }
                let mut collective_action_required = true;
                for (vid, gain) in individual_gains.iter() {
                    if *gain > 0.0 && gains_alone(&ctx, *vid, &ballots[vid])? {
                        collective_action_required = false;
                    }
                }
                opportunities.push(SimultaneousOpportunity {
                    members: members.clone(),
                    ballots,
                    winner: outcome.winner(),
                    individual_gains,
                    total_happiness: after.total,
                    total_happiness_change: after.total - honest.total,
                    collective_action_required,
                });
            }
        }
    }
    debug!(
        "analyse_simultaneous: {} strategic voters, {} opportunities",
        strategic.len(),
        opportunities.len()
    );
    Ok(SimultaneousAnalysis {
        honest_winner: ctx.honest_winner(),
        honest_total_happiness: honest.total,
        individual: strategic.keys().copied().collect(),
        opportunities,
    })
}

#[derive(PartialEq, Debug, Clone)]
pub struct SimultaneousRisk {
    /// Sum of the largest group of strategic voters of every scenario, as a
    /// percentage of all the voters.
    pub risk_percent: f64,
    /// Percentage of the scenarios where the best opportunity raises the total happiness.
    pub happiness_improvement_percent: f64,
    pub scenarios: usize,
    pub skipped: usize,
}

pub fn simultaneous_risk_over_population(
    scenarios: &[Scenario],
    scheme: VotingScheme,
    metric: HappinessFunc,
    kind: StrategyType,
    max_voters: usize,
) -> TacticalResult<SimultaneousRisk> {
    ensure!(max_voters >= 2, InvalidCoalitionSizeSnafu { size: max_voters });
    let mut analysed: usize = 0;
    let mut skipped: usize = 0;
    let mut strategic_voters: usize = 0;
    let mut all_voters: usize = 0;
    let mut improving: usize = 0;
    for (idx, scenario) in scenarios.iter().enumerate() {
        match analyse_simultaneous(scenario, scheme, metric, kind, max_voters) {
            Ok(analysis) => {
                analysed += 1;
                all_voters += scenario.num_voters();
                strategic_voters += analysis.max_strategic_voters();
                if analysis.best_total_happiness() > analysis.honest_total_happiness {
                    improving += 1;
                }
            }
            Err(e) => {
                warn!(
                    "simultaneous_risk_over_population: skipping scenario {}: {}",
                    idx, e
                );
                skipped += 1;
            }
        }
    }
    Ok(SimultaneousRisk {
        risk_percent: percent(strategic_voters, all_voters),
        happiness_improvement_percent: percent(improving, analysed),
        scenarios: analysed,
        skipped,
    })
}

/// Completes a masked scenario `num_simulations` times and keeps the
/// completion with the highest total happiness.
pub fn monte_carlo_best_completion<R: Rng + ?Sized>(
    partial: &PartialScenario,
    scheme: VotingScheme,
    metric: HappinessFunc,
    num_simulations: usize,
    rng: &mut R,
) -> TacticalResult<(Scenario, f64)> {
    ensure!(num_simulations > 0, InvalidSimulationCountSnafu);
    let mut best: Option<(Scenario, f64)> = None;
    for _ in 0..num_simulations {
        let candidate = partial.complete(rng)?;
        let outcome = evaluate_profile(&Profile::new(&candidate), scheme, metric.requires_ranking())?;
        let total = population_happiness(&candidate, &outcome, metric)?.total;
        let better = match &best {
            Some((_, best_total)) => total > *best_total,
            None => true,
        };
        if better {
            best = Some((candidate, total));
        }
    }
    // Not empty: num_simulations > 0
    best.ok_or(TacticalError::InvalidSimulationCount)
}

/// The reply of one opponent to a strategic ballot.
#[derive(PartialEq, Debug, Clone)]
pub struct OpponentResponse {
    pub opponent: VoterId,
    /// The best improving ballot of the opponent, or `None` if it keeps its sincere ballot.
    pub ballot: Option<Vec<CandidateId>>,
    pub winner: CandidateId,
    /// The happiness of the strategic voter once the opponent replied.
    pub voter_happiness: f64,
    pub total_happiness: f64,
}

/// A strategic option of one voter, evaluated against the replies of the other voters.
#[derive(PartialEq, Debug, Clone)]
pub struct CounterStrategyOutcome {
    /// The option as found when nobody else deviates.
    pub option: StrategicOption,
    /// One entry per other voter, replying alone.
    pub responses: Vec<OpponentResponse>,
    pub avg_individual_happiness: f64,
    pub avg_total_happiness: f64,
}

// The improving ballot with the highest happiness for the opponent, all families together.
fn best_response(
    ctx: &StrategicContext,
    opponent: VoterId,
) -> TacticalResult<Option<StrategicOption>> {
    let mut best: Option<StrategicOption> = None;
    for kind in StrategyType::ALL {
        for opt in ctx
            .find_strategy(opponent, kind, SearchMode::Exhaustive)?
            .unwrap_or_default()
        {
            let better = match &best {
                Some(b) => opt.strategic_individual_happiness > b.strategic_individual_happiness,
                None => true,
            };
            if better {
                best = Some(opt);
            }
        }
    }
    Ok(best)
}

/// Checks whether the options of a voter survive the reaction of the others.
///
/// For every option of the voter (all strategy families), each other voter in
/// turn gets to reply with its own best improving ballot on the modified
/// election. The happiness of the voter and of the population are averaged
/// over those replies. An option is returned even when the replies wipe out
/// its gain.
pub fn analyse_counter_strategies(
    scenario: &Scenario,
    voter: VoterId,
    scheme: VotingScheme,
    metric: HappinessFunc,
) -> TacticalResult<Vec<CounterStrategyOutcome>> {
    let ctx = StrategicContext::new(scenario, scheme, metric)?;
    let mut res: Vec<CounterStrategyOutcome> = Vec::new();
    for kind in StrategyType::ALL {
        let options = ctx
            .find_strategy(voter, kind, SearchMode::Exhaustive)?
            .unwrap_or_default();
        for option in options.into_iter() {
            let deviated = Profile::new(scenario).with_ballot(voter, option.ballot.clone());
            let after = StrategicContext::from_profile(deviated, scheme, metric)?;
            let mut responses: Vec<OpponentResponse> = Vec::new();
            for opponent in scenario.voter_ids().filter(|v| *v != voter) {
                let reply = best_response(&after, opponent)?;
                let response = match reply {
                    Some(r) => {
                        let replied = population_happiness(scenario, &r.outcome, metric)?;
                        OpponentResponse {
                            opponent,
                            winner: r.outcome.winner(),
                            voter_happiness: replied.of(voter),
                            total_happiness: replied.total,
                            ballot: Some(r.ballot),
                        }
                    }
                    None => OpponentResponse {
                        opponent,
                        ballot: None,
                        winner: after.honest_winner(),
                        voter_happiness: after.honest_happiness().of(voter),
                        total_happiness: after.honest_happiness().total,
                    },
                };
                responses.push(response);
            }
            let (avg_individual_happiness, avg_total_happiness) = if responses.is_empty() {
                (
                    option.strategic_individual_happiness,
                    option.strategic_total_happiness,
                )
            } else {
                let n = responses.len() as f64;
                (
                    responses.iter().map(|r| r.voter_happiness).sum::<f64>() / n,
                    responses.iter().map(|r| r.total_happiness).sum::<f64>() / n,
                )
            };
            debug!(
                "analyse_counter_strategies: voter: {:?} ballot: {:?} alone: {} after replies: {}",
                voter, option.ballot, option.strategic_individual_happiness, avg_individual_happiness
            );
            res.push(CounterStrategyOutcome {
                option,
                responses,
                avg_individual_happiness,
                avg_total_happiness,
            });
        }
    }
    Ok(res)
}
