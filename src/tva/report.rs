// The JSON summaries written by tva.

use crate::tva::*;

use serde_json::json;
use serde_json::Map as JSMap;
use std::collections::BTreeMap;

fn name_js(scenario: &Scenario, cid: CandidateId) -> JSValue {
    json!(scenario.candidate_name(cid))
}

fn outcome_to_json(scenario: &Scenario, outcome: &Outcome) -> JSValue {
    match outcome.ranking() {
        Some(ranking) => json!({
            "winner": name_js(scenario, ranking.winner()),
            "ranking": scenario.names(&ranking.to_vec()),
        }),
        None => json!({ "winner": name_js(scenario, outcome.winner()) }),
    }
}

fn option_to_json(scenario: &Scenario, opt: &StrategicOption) -> JSValue {
    json!({
        "strategy": opt.kind.to_string(),
        "ballot": scenario.names(&opt.ballot),
        "outcome": outcome_to_json(scenario, &opt.outcome),
        "individualHappiness": opt.strategic_individual_happiness,
        "originalIndividualHappiness": opt.original_individual_happiness,
        "totalHappiness": opt.strategic_total_happiness,
        "originalTotalHappiness": opt.original_total_happiness,
    })
}

fn ballots_to_json(
    scenario: &Scenario,
    ballots: &BTreeMap<VoterId, Vec<CandidateId>>,
) -> JSMap<String, JSValue> {
    let mut res: JSMap<String, JSValue> = JSMap::new();
    for (vid, ballot) in ballots.iter() {
        res.insert(vid.0.to_string(), json!(scenario.names(ballot)));
    }
    res
}

fn coalition_to_json(scenario: &Scenario, finding: &Option<CoalitionFinding>) -> JSValue {
    let f = match finding {
        Some(f) => f,
        None => return JSValue::Null,
    };
    let members: Vec<usize> = f.members.iter().map(|v| v.0).collect();
    json!({
        "target": name_js(scenario, f.target),
        "members": members,
        "ballots": ballots_to_json(scenario, &f.ballots),
        "outcome": outcome_to_json(scenario, &f.outcome),
        "membersGain": f.members_gain(),
        "totalHappiness": f.strategic_total_happiness,
        "originalTotalHappiness": f.original_total_happiness,
    })
}

fn simultaneous_to_json(scenario: &Scenario, analysis: &SimultaneousAnalysis) -> JSValue {
    let individual: Vec<usize> = analysis.individual.iter().map(|v| v.0).collect();
    // Only the opportunity with the best total happiness is detailed.
    let best = analysis
        .opportunities
        .iter()
        .fold(None, |acc: Option<&SimultaneousOpportunity>, o| match acc {
            Some(b) if b.total_happiness >= o.total_happiness => Some(b),
            _ => Some(o),
        })
        .map(|o| {
            let members: Vec<usize> = o.members.iter().map(|v| v.0).collect();
            json!({
                "members": members,
                "ballots": ballots_to_json(scenario, &o.ballots),
                "winner": name_js(scenario, o.winner),
                "totalHappinessChange": o.total_happiness_change,
                "collectiveActionRequired": o.collective_action_required,
            })
        });
    json!({
        "individualStrategicVoters": individual,
        "opportunities": analysis.opportunities.len(),
        "maxStrategicVoters": analysis.max_strategic_voters(),
        "bestTotalHappiness": analysis.best_total_happiness(),
        "bestOpportunity": best,
    })
}

fn counter_to_json(
    scenario: &Scenario,
    counter: &BTreeMap<VoterId, Vec<CounterStrategyOutcome>>,
) -> Vec<JSValue> {
    let mut res: Vec<JSValue> = Vec::new();
    for (vid, outcomes) in counter.iter() {
        let options: Vec<JSValue> = outcomes
            .iter()
            .map(|c| {
                let replies: Vec<JSValue> = c
                    .responses
                    .iter()
                    .map(|r| {
                        json!({
                            "opponent": r.opponent.0,
                            "ballot": r.ballot.as_ref().map(|b| scenario.names(b)),
                            "winner": name_js(scenario, r.winner),
                        })
                    })
                    .collect();
                json!({
                    "strategy": c.option.kind.to_string(),
                    "ballot": scenario.names(&c.option.ballot),
                    "individualHappinessAlone": c.option.strategic_individual_happiness,
                    "originalIndividualHappiness": c.option.original_individual_happiness,
                    "avgIndividualHappiness": c.avg_individual_happiness,
                    "avgTotalHappiness": c.avg_total_happiness,
                    "replies": replies,
                })
            })
            .collect();
        res.push(json!({ "voter": vid.0, "options": options }));
    }
    res
}

fn rules_to_json(name: &Option<String>, run: &RunSettings) -> JSValue {
    json!({
        "analysisName": name,
        "votingScheme": run.rules.voting_scheme.to_string(),
        "happinessFunc": run.rules.happiness_func.to_string(),
        "strategyType": run.rules.strategy_type.to_string(),
        "exhaustiveSearch": run.rules.search_mode == SearchMode::Exhaustive,
        "maxCoalitionSize": run.rules.max_coalition_size,
    })
}

/// What the Monte-Carlo completion of a masked scenario kept.
#[derive(PartialEq, Debug, Clone)]
pub struct CompletionStats {
    pub info_noise: f64,
    pub simulations: usize,
    pub total_happiness: f64,
}

pub struct ScenarioReport<'a> {
    pub scenario: &'a Scenario,
    pub analysis: &'a ScenarioAnalysis,
    pub counter: &'a BTreeMap<VoterId, Vec<CounterStrategyOutcome>>,
    pub coalition: &'a Option<CoalitionFinding>,
    pub simultaneous: &'a SimultaneousAnalysis,
    pub completion: Option<CompletionStats>,
}

pub fn scenario_summary_js(name: &Option<String>, run: &RunSettings, rep: &ScenarioReport) -> JSValue {
    let scenario = rep.scenario;
    let mut strategic: Vec<JSValue> = Vec::new();
    for (vid, options) in rep.analysis.options.iter() {
        let opts: Vec<JSValue> = options
            .iter()
            .map(|opt| option_to_json(scenario, opt))
            .collect();
        strategic.push(json!({ "voter": vid.0, "options": opts }));
    }
    let preferences: Vec<Vec<String>> = scenario
        .voters()
        .map(|v| scenario.names(v.preferences))
        .collect();
    let completion = rep.completion.as_ref().map(|c| {
        json!({
            "infoNoise": c.info_noise,
            "simulations": c.simulations,
            "totalHappiness": c.total_happiness,
        })
    });
    json!({
        "config": rules_to_json(name, run),
        "candidates": scenario.candidates(),
        "preferences": preferences,
        "seed": scenario.seed(),
        "completion": completion,
        "honestOutcome": outcome_to_json(scenario, &rep.analysis.honest_outcome),
        "happiness": {
            "individual": rep.analysis.honest_happiness.individual,
            "total": rep.analysis.honest_happiness.total,
        },
        "strategicVoters": strategic,
        "counterStrategies": counter_to_json(scenario, rep.counter),
        "coalition": coalition_to_json(scenario, rep.coalition),
        "simultaneous": simultaneous_to_json(scenario, rep.simultaneous),
    })
}

fn risk_to_json(r: &RiskReport) -> JSValue {
    json!({
        "riskPercent": r.risk_percent,
        "avgHappinessHonest": r.avg_happiness_honest,
        "avgHappinessStrategic": r.avg_happiness_strategic,
        "vulnerable": r.vulnerable,
        "scenarios": r.scenarios,
        "skipped": r.skipped,
    })
}

pub struct PopulationReport<'a> {
    pub generation: &'a GenerationConfig,
    pub repetitions: usize,
    pub by_strategy: &'a BTreeMap<StrategyType, RiskReport>,
    pub coalition: &'a CoalitionRisk,
    pub simultaneous: &'a SimultaneousRisk,
}

pub fn population_summary_js(
    name: &Option<String>,
    run: &RunSettings,
    rep: &PopulationReport,
) -> JSValue {
    let mut by_strategy: JSMap<String, JSValue> = JSMap::new();
    for (kind, r) in rep.by_strategy.iter() {
        by_strategy.insert(kind.to_string(), risk_to_json(r));
    }
    json!({
        "config": rules_to_json(name, run),
        "population": {
            "numVoters": rep.generation.num_voters,
            "numCandidates": rep.generation.num_candidates,
            "seed": rep.generation.seed,
            "repetitions": rep.repetitions,
        },
        "risk": rep.by_strategy.get(&run.rules.strategy_type).map(risk_to_json),
        "riskByStrategy": by_strategy,
        "coalitionRisk": {
            "riskPercent": rep.coalition.risk_percent,
            "happinessImprovementPercent": rep.coalition.happiness_improvement_percent,
            "scenarios": rep.coalition.scenarios,
            "skipped": rep.coalition.skipped,
        },
        "simultaneousRisk": {
            "riskPercent": rep.simultaneous.risk_percent,
            "happinessImprovementPercent": rep.simultaneous.happiness_improvement_percent,
            "scenarios": rep.simultaneous.scenarios,
            "skipped": rep.simultaneous.skipped,
        },
    })
}
