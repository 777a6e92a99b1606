mod common;

use common::{random_log, random_log_with_regressions, Rng};
use warpflow::analysis::{
    aggregate, decompose, direct_post_totals, flatten, pair_breakdowns, segment, AnalysisSession,
    Diagnostic, DiagnosticKind, EntityKind, EntityRegistry, Round, EPSILON,
};
use warpflow::config::EngineConfig;

const SEEDS: [u64; 6] = [1, 7, 42, 1_000, 65_537, 0xdead_beef];

#[test]
fn post_mitigation_is_conserved_per_pair() {
    for seed in SEEDS {
        let mut rng = Rng::new(seed);
        let records = if seed % 2 == 0 {
            random_log(&mut rng, 200)
        } else {
            random_log_with_regressions(&mut rng, 200)
        };
        let analysis = AnalysisSession::new(EngineConfig::default())
            .analyze(&records)
            .expect("analysis");

        let direct = direct_post_totals(&analysis.rounds());
        let decompositions = decompose(&analysis.flows, &mut Vec::<Diagnostic>::new());
        let pairs = pair_breakdowns(&decompositions);
        assert_eq!(pairs.len(), direct.len(), "seed {seed}");

        for pair in &pairs {
            let expected = direct[&(pair.round_index, pair.source, pair.target)];
            let tolerance = EPSILON * expected.abs().max(1.0) * 1e3;
            assert!(
                (pair.total_post - expected).abs() <= tolerance,
                "seed {seed}: pair {:?} post {} != direct {expected}",
                (pair.round_index, pair.source, pair.target),
                pair.total_post
            );
            let by_category: f64 = pair.categories.values().sum();
            assert!((by_category - pair.total_post).abs() <= tolerance);
        }
    }
}

#[test]
fn regressed_logs_are_exercised() {
    let mut rng = Rng::new(7);
    let records = random_log_with_regressions(&mut rng, 200);
    let analysis = AnalysisSession::new(EngineConfig::default())
        .analyze(&records)
        .expect("analysis");
    assert!(analysis.diagnostics.count_of(DiagnosticKind::RoundRegression) > 0);
}

#[test]
fn aggregation_ignores_event_order_within_a_round() {
    for seed in SEEDS {
        let mut rng = Rng::new(seed);
        let records = random_log(&mut rng, 120);
        let analysis = AnalysisSession::new(EngineConfig::default())
            .analyze(&records)
            .expect("analysis");

        for round in analysis.rounds() {
            let expected = aggregate(&round);
            let mut shuffled = round.events.clone();
            rng.shuffle(&mut shuffled);
            let permuted = Round {
                index: round.index,
                events: shuffled,
            };
            let actual = aggregate(&permuted);
            assert_eq!(expected.len(), actual.len());
            for (a, b) in expected.iter().zip(&actual) {
                assert_eq!(a.total_raw.to_bits(), b.total_raw.to_bits(), "seed {seed}");
                assert_eq!(a.total_mitigated.to_bits(), b.total_mitigated.to_bits());
                assert_eq!(a.total_post.to_bits(), b.total_post.to_bits());
                assert_eq!(a.event_count, b.event_count);
            }
        }
    }
}

#[test]
fn segmentation_is_idempotent() {
    for seed in SEEDS {
        let mut rng = Rng::new(seed);
        let records = random_log(&mut rng, 150);
        let analysis = AnalysisSession::new(EngineConfig::default())
            .analyze(&records)
            .expect("analysis");

        let first = segment(&analysis.events, &mut Vec::<Diagnostic>::new());
        let second = segment(flatten(&first), &mut Vec::<Diagnostic>::new());
        assert_eq!(first, second, "seed {seed}");
    }
}

#[test]
fn resolution_is_idempotent_and_aliases_are_stable() {
    let names = ["Kirk", "kirk", "KIRK ", "James_Kirk", "james kirk", "Spock"];
    let mut rng = Rng::new(99);

    for _ in 0..20 {
        let mut order = names.to_vec();
        rng.shuffle(&mut order);

        let mut registry = EntityRegistry::with_aliases([("James Kirk", "Kirk")]);
        let ids: Vec<_> = order
            .iter()
            .map(|name| registry.resolve(name, EntityKind::Player))
            .collect();
        let again: Vec<_> = order
            .iter()
            .map(|name| registry.resolve(name, EntityKind::Player))
            .collect();
        assert_eq!(ids, again);

        let kirk = registry.find("Kirk").expect("kirk");
        assert_eq!(registry.find("james_kirk"), Some(kirk));
        assert_ne!(registry.find("Spock"), Some(kirk));
        assert_eq!(registry.canonical_entities().count(), 2);

        // Whichever spelling came first keeps the id.
        let first_kirk = order
            .iter()
            .position(|name| !name.eq_ignore_ascii_case("spock"))
            .expect("a kirk spelling");
        assert_eq!(ids[first_kirk], kirk);
    }
}
