/*!

This is the long-form manual for `tactical_voting` and `tva`.

## Election rules

Every ballot ranks the candidates, most preferred first. The following rules are supported
(with their name in the configuration):
* `plurality` one point for the first choice
* `voteForTwo` one point for each of the first two choices
* `antiPlurality` one point for every choice except the last one
* `borda` `m - 1 - r` points for the choice at position `r`

Ties are always broken in favour of the candidate whose name comes first
alphabetically. Evaluating the same ballots twice always gives the same outcome.

Ballots may be truncated by bullet voting. The missing candidates get no point
from such a ballot, and under Borda the points of every ballot are computed from
the length of the longest ballot.

## Happiness

| function              | needs                  | value                                  |
|-----------------------|------------------------|----------------------------------------|
| `logarithmic`         | winner                 | `1 / log2(rank + 1)`                   |
| `exponential`         | winner                 | `exp(-0.5 * (rank - 1))`               |
| `linear`              | winner                 | `(m - rank) / (m - 1)`                 |
| `kendallTau`          | full election ranking  | fraction of the pairs ordered the same way |
| `weightedPositional`  | full election ranking  | one minus the weighted displacement    |

`rank` is the 1-indexed position of the winner in the ranking of the voter. The
total happiness of a population is the sum of the happiness of its voters.

## Strategies

* `bullet` the voter drops the winner from its ballot, again and again.
* `burying` the voter pushes the winner down its ballot, one position at a time,
  and keeps exploring from every ballot that changed the winner.
* `compromising` the voter moves to the front a candidate it prefers over the
  winner, trying the strongest candidates first.

A voter whose first choice already wins never has a strategy. A strategy is only
reported when it makes the voter strictly happier, as measured with its sincere
ranking.

```
use tactical_voting::*;
use tactical_voting::builder::ScenarioBuilder;

let names = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<String>>();
let mut builder = ScenarioBuilder::new().candidates(&names(&["A", "B", "C"]))?;
builder.add_voter(&names(&["A", "B", "C"]))?;
builder.add_voter(&names(&["B", "A", "C"]))?;
builder.add_voter(&names(&["C", "B", "A"]))?;
let scenario = builder.build()?;

// B wins the honest Borda election, voter 0 can make A win by burying B.
let options = find_strategy(
    &scenario,
    VoterId(0),
    VotingScheme::Borda,
    HappinessFunc::Linear,
    StrategyType::Burying,
    SearchMode::Exhaustive,
)?
.unwrap_or_default();
assert_eq!(scenario.names(&options[0].ballot), names(&["A", "C", "B"]));
# Ok::<(), TacticalError>(())
```

## Coalitions

The coalition search merges the options of all the strategy families, groups
the unhappy voters by a shared target candidate and tries subsets of each group,
largest first. A coalition is reported when, with all of its members voting
for the target, every member is at least as happy as before and one member is
strictly happier. Only the first such coalition is returned.

## Counter strategies

`analyse_counter_strategies` checks whether a strategic ballot survives the other
voters' reactions. For each option of the voter, every other voter in turn replies
with its own best strategic ballot against the modified election. The option's
happiness values are then averaged over those replies.

## Populations

`risk_over_population` reports the percentage of the scenarios where at least one
voter has a strategy. `coalition_risk_over_population` and
`simultaneous_risk_over_population` do the same for groups of voters.

Preferences can also be partially hidden (`infoNoise`). The analyst then draws
random completions of the hidden positions with `monte_carlo_best_completion`.

## Configuration

`tva` accepts a configuration file in JSON:

```json
{
  "outputSettings": {
    "analysisName": "close race",
    "outputPath": "out.json"
  },
  "scenario": {
    "candidates": ["A", "B", "C"],
    "voters": [["A", "B", "C"], ["B", "A", "C"], ["C", "B", "A"]]
  },
  "rules": {
    "votingScheme": "borda",
    "happinessFunc": "linear",
    "strategyType": "burying",
    "exhaustiveSearch": true,
    "maxCoalitionSize": 3
  }
}
```

Instead of `candidates` and `voters`, the scenario can be generated:

```json
{
  "scenario": {
    "generate": { "numVoters": 10, "numCandidates": 5, "seed": 42, "infoNoise": 0.2 }
  },
  "rules": { "votingScheme": "plurality", "repetitions": 100, "monteCarloSimulations": 50 }
}
```

With `repetitions`, `tva` analyses that many generated scenarios and reports the
risks of the population instead of the details of one scenario.
All the values of the `rules` section are optional and can be overridden on the
command line. Use `tva --help` for the list of the options.

 */
