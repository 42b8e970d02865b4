/*!
Analysis of tactical voting in ranked elections.

Given a population of voters with sincere rankings of the candidates, this
crate finds the insincere ballots that make a voter (or a group of voters)
happier under a given election rule, and estimates how often this happens
over randomly generated elections.

See the [manual] for an overview and a walkthrough.
*/
mod config;

pub mod analysis;
pub mod builder;
pub mod coalition;
pub mod happiness;
pub mod manual;
pub mod profile;
pub mod scenario;
pub mod schemes;
pub mod strategies;

pub use crate::config::*;

pub use crate::analysis::{
    analyse_counter_strategies, analyse_simultaneous, coalition_risk_over_population,
    generate_population, monte_carlo_best_completion, risk_by_strategy, risk_over_population,
    simultaneous_risk_over_population, CoalitionRisk, CounterStrategyOutcome, OpponentResponse,
    RiskReport, SimultaneousAnalysis, SimultaneousOpportunity, SimultaneousRisk,
};
pub use crate::coalition::find_coalition;
pub use crate::happiness::{happiness, population_happiness, PopulationHappiness};
pub use crate::profile::Profile;
pub use crate::scenario::{
    CandidateId, PartialRanking, PartialScenario, Scenario, Voter, VoterId,
};
pub use crate::schemes::{evaluate, ElectionRanking, Outcome};
pub use crate::strategies::{
    analyse_scenario, apply_all_strategies, find_strategy, ScenarioAnalysis, StrategicContext,
};

/// Generates a random scenario.
///
/// The same seed always gives the same rankings. A fresh seed is drawn when
/// `config.seed` is absent, and can be read back with [`Scenario::seed`].
///
/// `config.info_noise` is not used here: the analyst sees the full rankings.
/// Use [`generate_partial_scenario`] to hide part of them.
///
/// ```
/// use tactical_voting::*;
///
/// let config = GenerationConfig::new(10, 5).with_seed(42);
/// let s1 = generate_scenario(&config)?;
/// let s2 = generate_scenario(&config)?;
/// assert_eq!(s1, s2);
/// # Ok::<(), TacticalError>(())
/// ```
pub fn generate_scenario(config: &GenerationConfig) -> TacticalResult<Scenario> {
    Scenario::generate(config)
}

/// Generates a random scenario and hides `config.info_noise` of every ranking.
pub fn generate_partial_scenario(config: &GenerationConfig) -> TacticalResult<PartialScenario> {
    PartialScenario::generate(config)
}
