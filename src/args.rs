use clap::Parser;

/// This program looks for tactical votes in ranked elections.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the scenario and the rules of the analysis.
    /// See the manual of the tactical_voting crate for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference summary in JSON format. If provided, tva will check that the
    /// computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary will be written in JSON format to the given
    /// location. Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// Number of voters of a generated scenario.
    #[clap(long, value_parser)]
    pub voters: Option<usize>,

    /// Number of candidates of a generated scenario (at most 20).
    #[clap(long, value_parser)]
    pub candidates: Option<usize>,

    /// Seed of a generated scenario. The same seed always gives the same preferences.
    #[clap(long, value_parser)]
    pub seed: Option<u64>,

    /// (plurality, voteForTwo, antiPlurality, borda) The election rule.
    #[clap(long, value_parser)]
    pub scheme: Option<String>,

    /// (logarithmic, exponential, linear, kendallTau, weightedPositional) The happiness function.
    #[clap(long, value_parser)]
    pub happiness: Option<String>,

    /// (bullet, burying, compromising) The strategy family to search.
    #[clap(long, value_parser)]
    pub strategy: Option<String>,

    /// Largest coalition to try.
    #[clap(long, value_parser)]
    pub coalition_size: Option<usize>,

    /// If specified, analyses that many generated scenarios and reports the risks of the population.
    #[clap(long, value_parser)]
    pub repetitions: Option<usize>,

    /// Stops the search of every voter at the first improving ballot.
    #[clap(long, takes_value = false)]
    pub first_found: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
