//! Hybrid orchestrator fusion invariants.

use gnosis_core::{HybridOptions, SymbolicFilters};
use gnosis_e2e_tests::harness::db_manager::TestDatabaseManager;
use gnosis_e2e_tests::mocks::fixtures::TestDataFactory;

/// Scenario 2: a query matching both lexically and symbolically produces
/// a combined score that is the normalized weighted sum of its layer
/// scores, bounded by 1.0, with Alice's matched layers a superset of
/// {lexical, symbolic}.
#[tokio::test]
async fn lexical_and_symbolic_match_fuses_into_a_bounded_combined_score() {
    let db = TestDatabaseManager::new_temp();
    TestDataFactory::create_entity_full(
        &db.gnosis,
        "Alice",
        "person",
        vec!["software engineer who loves rust programming"],
        vec!["tech"],
        8.0,
    );
    TestDataFactory::create_entity_full(&db.gnosis, "Bob", "person", vec!["sales manager"], vec![], 5.0);

    let options = HybridOptions {
        symbolic_filters: SymbolicFilters {
            tags: Some(vec!["tech".to_string()]),
            ..Default::default()
        },
        ..Default::default()
    };
    let response = db.gnosis.search("rust engineer", &options).await;

    let alice = response
        .results
        .iter()
        .find(|r| r.entity.name == "Alice")
        .expect("alice should be returned");
    assert!(alice.matched_layers.contains(&gnosis_core::Layer::Lexical));
    assert!(alice.matched_layers.contains(&gnosis_core::Layer::Symbolic));

    for result in &response.results {
        assert!(result.combined <= 1.0 + 1e-9);
        assert!(result.combined >= 0.0);
    }

    for window in response.results.windows(2) {
        assert!(window[0].combined >= window[1].combined);
    }
}

/// Weights are normalized internally regardless of what the caller
/// passes in, so doubling every weight produces the same ranking and
/// the same combined scores.
#[tokio::test]
async fn doubling_every_weight_does_not_change_the_combined_score() {
    let db = TestDatabaseManager::new_temp();
    TestDataFactory::create_entity_full(
        &db.gnosis,
        "Alice",
        "person",
        vec!["loves rust programming"],
        vec![],
        5.0,
    );

    let base = HybridOptions::default();
    let doubled = HybridOptions {
        semantic_weight: base.semantic_weight * 2.0,
        lexical_weight: base.lexical_weight * 2.0,
        symbolic_weight: base.symbolic_weight * 2.0,
        ..base.clone()
    };

    let a = db.gnosis.search("rust", &base).await;
    let b = db.gnosis.search("rust", &doubled).await;

    assert_eq!(a.results.len(), b.results.len());
    for (ra, rb) in a.results.iter().zip(b.results.iter()) {
        assert_eq!(ra.entity.name, rb.entity.name);
        assert!((ra.combined - rb.combined).abs() < 1e-9);
    }
}

/// Scenario 6: a low `min_result_count` combined with a permissive
/// adequacy threshold terminates the search early once the first pass
/// already looks adequate.
#[tokio::test]
async fn generous_adequacy_threshold_terminates_search_early() {
    let db = TestDatabaseManager::new_temp();
    TestDataFactory::create_search_scenario(&db.gnosis);

    let options = HybridOptions {
        min_result_count: 1,
        ..Default::default()
    };
    let response = db.gnosis.search("rust programming", &options).await;
    assert!(response.early_terminated);
    assert!(!response.results.is_empty());
    assert!(response.executed_layers.len() < 3);
}

/// Results are capped at `options.limit` and ordering is deterministic:
/// re-running the identical query produces byte-identical result order.
#[tokio::test]
async fn search_is_deterministic_across_repeated_calls() {
    let db = TestDatabaseManager::new_temp();
    TestDataFactory::create_search_scenario(&db.gnosis);

    let options = HybridOptions {
        limit: 3,
        ..Default::default()
    };
    let first = db.gnosis.search("programming", &options).await;
    let second = db.gnosis.search("programming", &options).await;

    assert!(first.results.len() <= 3);
    let first_names: Vec<_> = first.results.iter().map(|r| r.entity.name.clone()).collect();
    let second_names: Vec<_> = second.results.iter().map(|r| r.entity.name.clone()).collect();
    assert_eq!(first_names, second_names);
}
