use log::{debug, info, warn};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use snafu::{prelude::*, Snafu};

use std::collections::BTreeMap;
use std::fs;

use serde_json::Value as JSValue;
use tactical_voting::builder::ScenarioBuilder;
use tactical_voting::*;
use text_diff::print_diff;

use crate::args::Args;
use crate::tva::config_reader::*;
use crate::tva::report::*;

pub mod config_reader;
pub mod report;

/// Completions drawn for a masked scenario when the configuration does not say.
const DEFAULT_SIMULATIONS: usize = 100;

#[derive(Debug, Snafu)]
pub enum TvaError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Analysis failed: {source}"))]
    Analysis { source: TacticalError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type TvaResult<T> = Result<T, TvaError>;

/// The validated rules of one run.
#[derive(PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub rules: AnalysisRules,
    pub repetitions: Option<usize>,
    pub monte_carlo_simulations: usize,
}

fn validate_rules(tva_rules: &TvaRules) -> TvaResult<RunSettings> {
    let defaults = AnalysisRules::DEFAULT_RULES;
    let rules = AnalysisRules {
        voting_scheme: match tva_rules.voting_scheme.as_deref() {
            None => defaults.voting_scheme,
            Some("plurality") => VotingScheme::Plurality,
            Some("voteForTwo") => VotingScheme::VoteForTwo,
            Some("antiPlurality") => VotingScheme::AntiPlurality,
            Some("borda") => VotingScheme::Borda,
            Some(x) => {
                whatever!(
                    "Cannot use voting scheme {:?}: expected plurality, voteForTwo, antiPlurality or borda",
                    x
                )
            }
        },
        happiness_func: match tva_rules.happiness_func.as_deref() {
            None => defaults.happiness_func,
            Some("logarithmic") => HappinessFunc::Logarithmic,
            Some("exponential") => HappinessFunc::Exponential,
            Some("linear") => HappinessFunc::Linear,
            Some("kendallTau") => HappinessFunc::KendallTau,
            Some("weightedPositional") => HappinessFunc::WeightedPositional,
            Some(x) => {
                whatever!(
                    "Cannot use happiness function {:?}: expected logarithmic, exponential, linear, kendallTau or weightedPositional",
                    x
                )
            }
        },
        strategy_type: match tva_rules.strategy_type.as_deref() {
            None => defaults.strategy_type,
            Some("bullet") => StrategyType::Bullet,
            Some("burying") => StrategyType::Burying,
            Some("compromising") => StrategyType::Compromising,
            Some(x) => {
                whatever!(
                    "Cannot use strategy {:?}: expected bullet, burying or compromising",
                    x
                )
            }
        },
        search_mode: match tva_rules.exhaustive_search {
            Some(false) => SearchMode::FirstFound,
            _ => defaults.search_mode,
        },
        max_coalition_size: match tva_rules.max_coalition_size {
            None => defaults.max_coalition_size,
            Some(x) if x >= 2 => x,
            Some(x) => {
                whatever!("maxCoalitionSize must be at least 2, got {}", x)
            }
        },
    };
    let repetitions = match tva_rules.repetitions {
        Some(0) => whatever!("repetitions must be at least 1"),
        x => x,
    };
    let monte_carlo_simulations = match tva_rules.monte_carlo_simulations {
        None => DEFAULT_SIMULATIONS,
        Some(0) => whatever!("monteCarloSimulations must be at least 1"),
        Some(x) => x,
    };
    Ok(RunSettings {
        rules,
        repetitions,
        monte_carlo_simulations,
    })
}

/// Command-line values take precedence over the configuration file.
fn apply_overrides(mut config: TvaConfig, args: &Args) -> TvaResult<TvaConfig> {
    let rules = &mut config.rules;
    if args.scheme.is_some() {
        rules.voting_scheme = args.scheme.clone();
    }
    if args.happiness.is_some() {
        rules.happiness_func = args.happiness.clone();
    }
    if args.strategy.is_some() {
        rules.strategy_type = args.strategy.clone();
    }
    if args.coalition_size.is_some() {
        rules.max_coalition_size = args.coalition_size;
    }
    if args.repetitions.is_some() {
        rules.repetitions = args.repetitions;
    }
    if args.first_found {
        rules.exhaustive_search = Some(false);
    }
    if args.out.is_some() {
        config.output_settings.output_path = args.out.clone();
    }

    if args.voters.is_some() || args.candidates.is_some() || args.seed.is_some() {
        let previous = config.scenario.generate.take();
        let num_voters = args
            .voters
            .or_else(|| previous.as_ref().map(|g| g.num_voters));
        let num_candidates = args
            .candidates
            .or_else(|| previous.as_ref().map(|g| g.num_candidates));
        let (num_voters, num_candidates) = match (num_voters, num_candidates) {
            (Some(v), Some(c)) => (v, c),
            _ => whatever!("Generating a scenario requires both --voters and --candidates"),
        };
        config.scenario = ScenarioSettings {
            candidates: None,
            voters: None,
            generate: Some(GenerateSettings {
                num_voters,
                num_candidates,
                seed: args.seed.or_else(|| previous.as_ref().and_then(|g| g.seed)),
                info_noise: previous.and_then(|g| g.info_noise),
            }),
        };
    }
    Ok(config)
}

fn explicit_scenario(candidates: &[String], voters: &[Vec<String>]) -> TvaResult<Scenario> {
    let mut builder = ScenarioBuilder::new()
        .candidates(candidates)
        .context(AnalysisSnafu)?;
    for prefs in voters.iter() {
        builder.add_voter(prefs).context(AnalysisSnafu)?;
    }
    builder.build().context(AnalysisSnafu)
}

// Stream 0 drew the voter seeds and stream 1 the masks.
fn completion_rng(seed: Option<u64>) -> ChaCha20Rng {
    let mut rng = match seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_entropy(),
    };
    rng.set_stream(2);
    rng
}

// A masked scenario is replaced by its best completion.
fn single_scenario(
    settings: &ScenarioSettings,
    run: &RunSettings,
) -> TvaResult<(Scenario, Option<CompletionStats>)> {
    match (&settings.candidates, &settings.voters, &settings.generate) {
        (Some(cands), Some(voters), None) => Ok((explicit_scenario(cands, voters)?, None)),
        (None, None, Some(g)) => match g.info_noise {
            Some(noise) if noise > 0.0 => {
                let partial =
                    generate_partial_scenario(&g.generation_config()).context(AnalysisSnafu)?;
                let mut rng = completion_rng(g.seed);
                let (scenario, total) = monte_carlo_best_completion(
                    &partial,
                    run.rules.voting_scheme,
                    run.rules.happiness_func,
                    run.monte_carlo_simulations,
                    &mut rng,
                )
                .context(AnalysisSnafu)?;
                info!(
                    "single_scenario: kept the best of {} completions, total happiness {}",
                    run.monte_carlo_simulations, total
                );
                let stats = CompletionStats {
                    info_noise: noise,
                    simulations: run.monte_carlo_simulations,
                    total_happiness: total,
                };
                Ok((scenario, Some(stats)))
            }
            _ => Ok((
                generate_scenario(&g.generation_config()).context(AnalysisSnafu)?,
                None,
            )),
        },
        (_, _, Some(_)) => {
            whatever!("The scenario cannot both list the voters and be generated")
        }
        _ => whatever!(
            "No scenario found: provide candidates and voters, generation parameters, or --voters and --candidates"
        ),
    }
}

fn analyse_single(name: &Option<String>, config: &TvaConfig, run: &RunSettings) -> TvaResult<JSValue> {
    let (scenario, completion) = single_scenario(&config.scenario, run)?;
    let rules = &run.rules;
    let analysis = analyse_scenario(&scenario, rules).context(AnalysisSnafu)?;
    let coalition = find_coalition(
        &scenario,
        rules.voting_scheme,
        rules.happiness_func,
        rules.max_coalition_size,
    )
    .context(AnalysisSnafu)?;
    let simultaneous = analyse_simultaneous(
        &scenario,
        rules.voting_scheme,
        rules.happiness_func,
        rules.strategy_type,
        rules.max_coalition_size,
    )
    .context(AnalysisSnafu)?;
    let mut counter: BTreeMap<VoterId, Vec<CounterStrategyOutcome>> = BTreeMap::new();
    for vid in analysis.options.keys() {
        let outcomes = analyse_counter_strategies(
            &scenario,
            *vid,
            rules.voting_scheme,
            rules.happiness_func,
        )
        .context(AnalysisSnafu)?;
        counter.insert(*vid, outcomes);
    }
    let report = ScenarioReport {
        scenario: &scenario,
        analysis: &analysis,
        counter: &counter,
        coalition: &coalition,
        simultaneous: &simultaneous,
        completion,
    };
    Ok(scenario_summary_js(name, run, &report))
}

fn analyse_population(
    name: &Option<String>,
    config: &TvaConfig,
    run: &RunSettings,
    repetitions: usize,
) -> TvaResult<JSValue> {
    let generation = match &config.scenario.generate {
        Some(g) if config.scenario.voters.is_none() => g.generation_config(),
        _ => whatever!("repetitions can only be used with generated scenarios"),
    };
    if generation.info_noise.is_some() {
        warn!("analyse_population: infoNoise is ignored when analysing a population");
    }
    let population = generate_population(&generation, repetitions).context(AnalysisSnafu)?;
    let rules = &run.rules;
    let by_strategy = risk_by_strategy(&population, rules.voting_scheme, rules.happiness_func);
    let coalition = coalition_risk_over_population(
        &population,
        rules.voting_scheme,
        rules.happiness_func,
        rules.max_coalition_size,
    )
    .context(AnalysisSnafu)?;
    let simultaneous = simultaneous_risk_over_population(
        &population,
        rules.voting_scheme,
        rules.happiness_func,
        rules.strategy_type,
        rules.max_coalition_size,
    )
    .context(AnalysisSnafu)?;
    let report = PopulationReport {
        generation: &generation,
        repetitions,
        by_strategy: &by_strategy,
        coalition: &coalition,
        simultaneous: &simultaneous,
    };
    Ok(population_summary_js(name, run, &report))
}

/// Builds the JSON summary of an analysis.
pub fn build_summary_js(config: &TvaConfig) -> TvaResult<JSValue> {
    let run = validate_rules(&config.rules)?;
    info!("build_summary_js: rules {:?}", run);
    let name = &config.output_settings.analysis_name;
    match run.repetitions {
        Some(reps) => analyse_population(name, config, &run, reps),
        None => analyse_single(name, config, &run),
    }
}

pub fn run_analysis(args: &Args) -> TvaResult<()> {
    let config = match &args.config {
        Some(path) => read_config(path)?,
        None => TvaConfig::default(),
    };
    let config = apply_overrides(config, args)?;
    info!("config: {:?}", config);

    let result_js = build_summary_js(&config)?;
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    match config.output_settings.output_path.as_deref() {
        None | Some("stdout") | Some("") => {
            println!("{}", pretty_js_stats);
        }
        Some(path) => {
            fs::write(path, &pretty_js_stats).context(WritingOutputSnafu { path })?;
            info!("Summary written to {}", path);
        }
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let summary_ref = read_summary(summary_p)?;
        debug!("summary: {:?}", summary_ref);
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn close_race_config() -> TvaConfig {
        let js = r#"{
            "outputSettings": { "analysisName": "close race" },
            "scenario": {
                "candidates": ["A", "B", "C"],
                "voters": [["A", "B", "C"], ["B", "A", "C"], ["C", "B", "A"]]
            },
            "rules": {
                "votingScheme": "borda",
                "happinessFunc": "linear",
                "strategyType": "burying"
            }
        }"#;
        serde_json::from_str(js).unwrap()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tva_{}_{}", std::process::id(), name))
    }

    #[test]
    fn validate_rules_defaults() {
        let run = validate_rules(&TvaRules::default()).unwrap();
        assert_eq!(run.rules, AnalysisRules::DEFAULT_RULES);
        assert_eq!(run.repetitions, None);
        assert_eq!(run.monte_carlo_simulations, DEFAULT_SIMULATIONS);
    }

    #[test]
    fn validate_rules_parses_and_rejects() {
        let rules = TvaRules {
            voting_scheme: Some("antiPlurality".to_string()),
            happiness_func: Some("weightedPositional".to_string()),
            strategy_type: Some("compromising".to_string()),
            exhaustive_search: Some(false),
            max_coalition_size: Some(4),
            ..TvaRules::default()
        };
        let run = validate_rules(&rules).unwrap();
        assert_eq!(run.rules.voting_scheme, VotingScheme::AntiPlurality);
        assert_eq!(run.rules.happiness_func, HappinessFunc::WeightedPositional);
        assert_eq!(run.rules.strategy_type, StrategyType::Compromising);
        assert_eq!(run.rules.search_mode, SearchMode::FirstFound);
        assert_eq!(run.rules.max_coalition_size, 4);

        let bad_scheme = TvaRules {
            voting_scheme: Some("instantRunoff".to_string()),
            ..TvaRules::default()
        };
        assert!(validate_rules(&bad_scheme).is_err());
        let bad_size = TvaRules {
            max_coalition_size: Some(1),
            ..TvaRules::default()
        };
        assert!(validate_rules(&bad_size).is_err());
        let bad_reps = TvaRules {
            repetitions: Some(0),
            ..TvaRules::default()
        };
        assert!(validate_rules(&bad_reps).is_err());
    }

    #[test]
    fn command_line_overrides() {
        let args = Args {
            voters: Some(12),
            candidates: Some(4),
            seed: Some(9),
            scheme: Some("plurality".to_string()),
            first_found: true,
            ..Args::default()
        };
        let config = apply_overrides(close_race_config(), &args).unwrap();
        assert_eq!(config.scenario.voters, None);
        let generate = config.scenario.generate.unwrap();
        assert_eq!(
            generate.generation_config(),
            GenerationConfig::new(12, 4).with_seed(9)
        );
        assert_eq!(config.rules.voting_scheme, Some("plurality".to_string()));
        assert_eq!(config.rules.happiness_func, Some("linear".to_string()));
        assert_eq!(config.rules.exhaustive_search, Some(false));

        let partial = Args {
            voters: Some(12),
            ..Args::default()
        };
        assert!(apply_overrides(TvaConfig::default(), &partial).is_err());
    }

    #[test]
    fn single_scenario_summary() {
        let js = build_summary_js(&close_race_config()).unwrap();
        assert_eq!(js["config"]["analysisName"], "close race");
        assert_eq!(js["honestOutcome"]["winner"], "B");
        assert_eq!(js["strategicVoters"][0]["voter"], 0);
        assert_eq!(
            js["strategicVoters"][0]["options"][0]["ballot"],
            serde_json::json!(["A", "C", "B"])
        );
        assert_eq!(
            js["strategicVoters"][0]["options"][0]["outcome"]["winner"],
            "A"
        );
        assert!(js["simultaneous"]["maxStrategicVoters"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn population_summary_is_reproducible() {
        let js = r#"{
            "scenario": { "generate": { "numVoters": 5, "numCandidates": 3, "seed": 11 } },
            "rules": { "votingScheme": "plurality", "happinessFunc": "exponential", "repetitions": 4 }
        }"#;
        let config: TvaConfig = serde_json::from_str(js).unwrap();
        let s1 = build_summary_js(&config).unwrap();
        let s2 = build_summary_js(&config).unwrap();
        assert_eq!(s1, s2);
        assert_eq!(s1["population"]["repetitions"], 4);
        assert_eq!(s1["risk"]["scenarios"], 4);
        assert_eq!(
            s1["riskByStrategy"].as_object().map(|m| m.len()),
            Some(3)
        );
    }

    #[test]
    fn population_needs_generation() {
        let mut config = close_race_config();
        config.rules.repetitions = Some(3);
        assert!(build_summary_js(&config).is_err());
    }

    #[test]
    fn masked_scenario_is_completed() {
        let js = r#"{
            "scenario": { "generate": { "numVoters": 6, "numCandidates": 4, "seed": 3, "infoNoise": 0.5 } },
            "rules": { "happinessFunc": "linear", "monteCarloSimulations": 10 }
        }"#;
        let config: TvaConfig = serde_json::from_str(js).unwrap();
        let summary = build_summary_js(&config).unwrap();
        assert_eq!(summary["completion"]["simulations"], 10);
        assert_eq!(summary["preferences"].as_array().map(|v| v.len()), Some(6));
    }

    #[test]
    fn completion_rng_uses_its_own_stream() {
        use rand::Rng;
        let mut completion = completion_rng(Some(7));
        assert_eq!(completion.get_stream(), 2);
        let mut master = ChaCha20Rng::seed_from_u64(7);
        let mut masks = ChaCha20Rng::seed_from_u64(7);
        masks.set_stream(1);
        let drawn: u64 = completion.gen();
        assert_ne!(drawn, master.gen::<u64>());
        assert_ne!(drawn, masks.gen::<u64>());
        // Still reproducible for a given seed.
        assert_eq!(completion_rng(Some(7)).gen::<u64>(), drawn);
    }

    #[test]
    fn single_scenario_reports_counter_strategies() {
        let js = build_summary_js(&close_race_config()).unwrap();
        let counter = &js["counterStrategies"][0];
        assert_eq!(counter["voter"], 0);
        // Both opponents can bring B back after voter 0 buries it.
        let burying = counter["options"]
            .as_array()
            .unwrap()
            .iter()
            .find(|o| o["strategy"] == "burying")
            .unwrap();
        assert_eq!(burying["ballot"], serde_json::json!(["A", "C", "B"]));
        assert_eq!(burying["avgIndividualHappiness"], 0.5);
    }

    #[test]
    fn reference_check() {
        let config_p = temp_path("config.json");
        let out_p = temp_path("out.json");
        let config_js = serde_json::to_string(&close_race_config()).unwrap();
        fs::write(&config_p, config_js).unwrap();

        let mut args = Args {
            config: Some(config_p.display().to_string()),
            out: Some(out_p.display().to_string()),
            ..Args::default()
        };
        run_analysis(&args).unwrap();

        // The summary matches itself.
        args.reference = args.out.clone();
        assert!(run_analysis(&args).is_ok());

        // A different rule no longer matches.
        let reference_p = temp_path("reference.json");
        fs::copy(&out_p, &reference_p).unwrap();
        args.reference = Some(reference_p.display().to_string());
        args.scheme = Some("plurality".to_string());
        assert!(run_analysis(&args).is_err());

        for p in [config_p, out_p, reference_p] {
            let _ = fs::remove_file(p);
        }
    }
}
