// ********* Input data structures ***********

use snafu::Snafu;
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::scenario::{CandidateId, VoterId};
use crate::schemes::Outcome;

/// The largest number of candidates a scenario may hold.
///
/// The strategy searches are permutation based, so their cost grows
/// factorially with the ballot length.
pub const MAX_CANDIDATES: usize = 20;

/// The voting rules understood by the evaluator.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum VotingScheme {
    /// One point for the first choice of every ballot.
    Plurality,
    /// One point for each of the first two choices of every ballot.
    VoteForTwo,
    /// One point for every choice except the last one.
    AntiPlurality,
    /// `m - 1 - r` points for the candidate at position `r`.
    Borda,
}

impl VotingScheme {
    pub const ALL: [VotingScheme; 4] = [
        VotingScheme::Plurality,
        VotingScheme::VoteForTwo,
        VotingScheme::AntiPlurality,
        VotingScheme::Borda,
    ];
}

impl Display for VotingScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VotingScheme::Plurality => "plurality",
            VotingScheme::VoteForTwo => "vote for two",
            VotingScheme::AntiPlurality => "anti plurality",
            VotingScheme::Borda => "borda",
        };
        write!(f, "{}", s)
    }
}

/// How satisfied a voter is with an election outcome.
///
/// The first three functions only look at the winner. The last two compare the
/// full ranking produced by the election with the ranking of the voter, and
/// they need an [`Outcome::Ranking`].
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum HappinessFunc {
    Logarithmic,
    Exponential,
    Linear,
    KendallTau,
    WeightedPositional,
}

impl HappinessFunc {
    pub const ALL: [HappinessFunc; 5] = [
        HappinessFunc::Logarithmic,
        HappinessFunc::Exponential,
        HappinessFunc::Linear,
        HappinessFunc::KendallTau,
        HappinessFunc::WeightedPositional,
    ];

    /// True if this function needs the full election ranking and not just the winner.
    pub fn requires_ranking(self) -> bool {
        matches!(
            self,
            HappinessFunc::KendallTau | HappinessFunc::WeightedPositional
        )
    }
}

impl Display for HappinessFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HappinessFunc::Logarithmic => "logarithmic",
            HappinessFunc::Exponential => "exponential",
            HappinessFunc::Linear => "linear",
            HappinessFunc::KendallTau => "kendall tau",
            HappinessFunc::WeightedPositional => "weighted positional",
        };
        write!(f, "{}", s)
    }
}

/// The families of insincere ballots explored by the search.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum StrategyType {
    /// Withdraw support from the winner by dropping it from the ballot.
    Bullet,
    /// Push the winner further down the ballot.
    Burying,
    /// Move a more viable, still preferred candidate to the front.
    Compromising,
}

impl StrategyType {
    pub const ALL: [StrategyType; 3] = [
        StrategyType::Bullet,
        StrategyType::Burying,
        StrategyType::Compromising,
    ];
}

impl Display for StrategyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StrategyType::Bullet => "bullet",
            StrategyType::Burying => "burying",
            StrategyType::Compromising => "compromising",
        };
        write!(f, "{}", s)
    }
}

/// Stop at the first improving ballot, or collect all of them.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum SearchMode {
    FirstFound,
    Exhaustive,
}

// ******** Output data structures *********

/// An insincere ballot that strictly improves the happiness of its voter.
///
/// Happiness values are always measured against the sincere preferences.
#[derive(PartialEq, Debug, Clone)]
pub struct StrategicOption {
    pub voter: VoterId,
    pub kind: StrategyType,
    /// The ballot submitted instead of the sincere one.
    pub ballot: Vec<CandidateId>,
    pub outcome: Outcome,
    pub strategic_individual_happiness: f64,
    pub original_individual_happiness: f64,
    pub strategic_total_happiness: f64,
    pub original_total_happiness: f64,
}

impl StrategicOption {
    pub fn individual_gain(&self) -> f64 {
        self.strategic_individual_happiness - self.original_individual_happiness
    }

    pub fn total_gain(&self) -> f64 {
        self.strategic_total_happiness - self.original_total_happiness
    }
}

/// The improving options found for each voter. Voters without any option are absent.
pub type OptionsByVoter = BTreeMap<VoterId, Vec<StrategicOption>>;

/// A coalition that was replayed and shown to be Pareto-improving for its members.
#[derive(PartialEq, Debug, Clone)]
pub struct CoalitionFinding {
    /// The candidate the coalition works for.
    pub target: CandidateId,
    pub members: Vec<VoterId>,
    /// The ballot submitted by each member.
    pub ballots: BTreeMap<VoterId, Vec<CandidateId>>,
    pub honest_winner: CandidateId,
    pub outcome: Outcome,
    pub original_happiness: BTreeMap<VoterId, f64>,
    pub strategic_happiness: BTreeMap<VoterId, f64>,
    pub original_total_happiness: f64,
    pub strategic_total_happiness: f64,
}

impl CoalitionFinding {
    /// Sum of the happiness gains of the members.
    pub fn members_gain(&self) -> f64 {
        self.members
            .iter()
            .map(|v| {
                self.strategic_happiness.get(v).copied().unwrap_or(0.0)
                    - self.original_happiness.get(v).copied().unwrap_or(0.0)
            })
            .sum()
    }

    pub fn total_gain(&self) -> f64 {
        self.strategic_total_happiness - self.original_total_happiness
    }
}

/// Errors that prevent an analysis from running.
///
/// Finding no strategy is not an error: the searches return empty results instead.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum TacticalError {
    #[snafu(display("Invalid number of candidates {count}: expected between 1 and {max}"))]
    InvalidCandidateCount { count: usize, max: usize },
    #[snafu(display("A scenario needs at least one voter"))]
    EmptyElection,
    #[snafu(display("The preferences of voter {voter} are not a permutation of the candidates"))]
    InvalidBallot { voter: usize },
    #[snafu(display("Unknown candidate {name:?}"))]
    UnknownCandidate { name: String },
    #[snafu(display("Candidate {name:?} is declared more than once"))]
    DuplicateCandidate { name: String },
    #[snafu(display("Unknown voter {voter}"))]
    UnknownVoter { voter: usize },
    #[snafu(display("Happiness function {metric} cannot be computed from this kind of outcome"))]
    MetricOutcomeMismatch { metric: HappinessFunc },
    #[snafu(display("Information noise must be within [0, 1], got {noise}"))]
    InvalidNoise { noise: f64 },
    #[snafu(display("A coalition has at least 2 members, got a maximum size of {size}"))]
    InvalidCoalitionSize { size: usize },
    #[snafu(display("At least one simulation is required"))]
    InvalidSimulationCount,
}

pub type TacticalResult<T> = Result<T, TacticalError>;

// ********* Configuration **********

/// The rules of one analysis run.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AnalysisRules {
    pub voting_scheme: VotingScheme,
    pub happiness_func: HappinessFunc,
    pub strategy_type: StrategyType,
    pub search_mode: SearchMode,
    /// Upper bound on the size of the coalitions that are tried.
    pub max_coalition_size: usize,
}

impl AnalysisRules {
    pub const DEFAULT_RULES: AnalysisRules = AnalysisRules {
        voting_scheme: VotingScheme::Borda,
        happiness_func: HappinessFunc::KendallTau,
        strategy_type: StrategyType::Burying,
        search_mode: SearchMode::Exhaustive,
        max_coalition_size: 3,
    };
}

/// Parameters for the random generation of a scenario.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct GenerationConfig {
    pub num_voters: usize,
    pub num_candidates: usize,
    /// Seed of the generator. A fresh seed is drawn when absent.
    pub seed: Option<u64>,
    /// Fraction of the ranking positions hidden from the analyst, see
    /// [`crate::scenario::PartialScenario`].
    pub info_noise: Option<f64>,
}

impl GenerationConfig {
    pub fn new(num_voters: usize, num_candidates: usize) -> GenerationConfig {
        GenerationConfig {
            num_voters,
            num_candidates,
            seed: None,
            info_noise: None,
        }
    }

    pub fn with_seed(self, seed: u64) -> GenerationConfig {
        GenerationConfig {
            seed: Some(seed),
            ..self
        }
    }

    pub fn with_info_noise(self, noise: f64) -> GenerationConfig {
        GenerationConfig {
            info_noise: Some(noise),
            ..self
        }
    }
}
