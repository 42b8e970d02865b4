//! Property-based tests for the election rules, the happiness functions and the searches.

use proptest::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tactical_voting::*;

fn scheme_strategy() -> impl Strategy<Value = VotingScheme> {
    prop::sample::select(VotingScheme::ALL.to_vec())
}

fn winner_metric_strategy() -> impl Strategy<Value = HappinessFunc> {
    prop::sample::select(vec![
        HappinessFunc::Logarithmic,
        HappinessFunc::Exponential,
        HappinessFunc::Linear,
    ])
}

fn generated(num_voters: usize, num_candidates: usize, seed: u64) -> Scenario {
    generate_scenario(&GenerationConfig::new(num_voters, num_candidates).with_seed(seed)).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: permuting the voters does not change the outcome.
    #[test]
    fn prop_evaluate_ignores_voter_order(
        num_voters in 1_usize..12,
        num_candidates in 1_usize..7,
        seed in any::<u64>(),
        shuffle_seed in any::<u64>(),
        scheme in scheme_strategy()
    ) {
        let s = generated(num_voters, num_candidates, seed);
        let ballots: Vec<&[CandidateId]> = s.voters().map(|v| v.preferences).collect();
        let mut permuted = ballots.clone();
        permuted.shuffle(&mut ChaCha20Rng::seed_from_u64(shuffle_seed));
        let o1 = evaluate(scheme, num_candidates, &ballots, true).unwrap();
        let o2 = evaluate(scheme, num_candidates, &permuted, true).unwrap();
        prop_assert_eq!(o1, o2);
    }

    /// Property: a voter whose first choice wins is perfectly happy.
    #[test]
    fn prop_top_choice_is_maximal(
        num_candidates in 1_usize..10,
        seed in any::<u64>(),
        metric in winner_metric_strategy()
    ) {
        let s = generated(1, num_candidates, seed);
        let v = s.voter(VoterId(0)).unwrap();
        let h = happiness(v.preferences, &Outcome::Winner(v.preferences[0]), metric).unwrap();
        prop_assert!((h - 1.0).abs() < 1e-12);
    }

    /// Property: a ranking fully agrees with itself.
    #[test]
    fn prop_kendall_tau_self_agreement(
        num_candidates in 1_usize..10,
        seed in any::<u64>()
    ) {
        let s = generated(1, num_candidates, seed);
        let v = s.voter(VoterId(0)).unwrap();
        // A single voter under Borda produces its own ranking.
        let outcome = evaluate(VotingScheme::Borda, num_candidates, &[v.preferences], true).unwrap();
        for metric in [HappinessFunc::KendallTau, HappinessFunc::WeightedPositional] {
            let h = happiness(v.preferences, &outcome, metric).unwrap();
            prop_assert!((h - 1.0).abs() < 1e-12);
        }
    }

    /// Property: all happiness values are within [0, 1].
    #[test]
    fn prop_happiness_is_bounded(
        num_voters in 1_usize..8,
        num_candidates in 1_usize..7,
        seed in any::<u64>(),
        scheme in scheme_strategy()
    ) {
        let s = generated(num_voters, num_candidates, seed);
        let ballots: Vec<&[CandidateId]> = s.voters().map(|v| v.preferences).collect();
        for metric in HappinessFunc::ALL {
            let outcome = evaluate(scheme, num_candidates, &ballots, metric.requires_ranking()).unwrap();
            let ph = population_happiness(&s, &outcome, metric).unwrap();
            for h in ph.individual.iter() {
                prop_assert!((0.0..=1.0 + 1e-12).contains(h), "{} {}", metric, h);
            }
        }
    }

    /// Property: bullet ballots only drop candidates, they never reorder them.
    #[test]
    fn prop_bullet_ballots_are_subsequences(
        num_voters in 2_usize..8,
        num_candidates in 2_usize..6,
        seed in any::<u64>(),
        scheme in scheme_strategy()
    ) {
        let s = generated(num_voters, num_candidates, seed);
        let ctx = StrategicContext::new(&s, scheme, HappinessFunc::Linear).unwrap();
        let options = ctx.options_by_voter(StrategyType::Bullet, SearchMode::Exhaustive).unwrap();
        for (vid, opts) in options.iter() {
            let sincere = s.voter(*vid).unwrap().preferences;
            for opt in opts.iter() {
                prop_assert!(!opt.ballot.contains(&ctx.honest_winner()));
                let mut it = sincere.iter();
                prop_assert!(opt.ballot.iter().all(|c| it.any(|x| x == c)));
            }
        }
    }

    /// Property: a burying ballot changes the winner and makes its voter happier.
    #[test]
    fn prop_burying_changes_the_winner(
        num_voters in 2_usize..8,
        num_candidates in 2_usize..6,
        seed in any::<u64>(),
        scheme in scheme_strategy()
    ) {
        let s = generated(num_voters, num_candidates, seed);
        let ctx = StrategicContext::new(&s, scheme, HappinessFunc::KendallTau).unwrap();
        let options = ctx.options_by_voter(StrategyType::Burying, SearchMode::Exhaustive).unwrap();
        for (vid, opts) in options.iter() {
            for opt in opts.iter() {
                let profile = Profile::new(&s).with_ballot(*vid, opt.ballot.clone());
                let replay = ctx.outcome(&profile).unwrap();
                prop_assert_ne!(replay.winner(), ctx.honest_winner());
                let h = happiness(s.voter(*vid).unwrap().preferences, &replay, HappinessFunc::KendallTau).unwrap();
                prop_assert!(h > ctx.honest_happiness().of(*vid));
            }
        }
    }

    /// Property: a coalition makes every member at least as happy, and one of them happier.
    #[test]
    fn prop_coalitions_are_pareto_improving(
        num_voters in 3_usize..8,
        num_candidates in 3_usize..5,
        seed in any::<u64>(),
        scheme in scheme_strategy()
    ) {
        let s = generated(num_voters, num_candidates, seed);
        if let Some(f) = find_coalition(&s, scheme, HappinessFunc::Exponential, 3).unwrap() {
            prop_assert!(f.members.len() >= 2);
            let mut profile = Profile::new(&s);
            for (vid, ballot) in f.ballots.iter() {
                profile.set_ballot(*vid, ballot.clone());
            }
            let ctx = StrategicContext::new(&s, scheme, HappinessFunc::Exponential).unwrap();
            let replay = ctx.outcome(&profile).unwrap();
            let after = population_happiness(&s, &replay, HappinessFunc::Exponential).unwrap();
            let before = ctx.honest_happiness();
            prop_assert!(f.members.iter().all(|v| after.of(*v) >= before.of(*v)));
            prop_assert!(f.members.iter().any(|v| after.of(*v) > before.of(*v)));
        }
    }
}
