//! Context Window Manager invariants.

use gnosis_core::SalienceContext;
use gnosis_e2e_tests::harness::db_manager::TestDatabaseManager;
use gnosis_e2e_tests::mocks::fixtures::TestDataFactory;

/// Scenario 5: a must-include entity with low salience is packed
/// regardless; an optional entity that doesn't fit the remaining budget
/// is reported as budget-exceeded, not silently dropped.
#[tokio::test]
async fn must_include_survives_while_optional_overflow_is_reported() {
    let db = TestDatabaseManager::new_temp();

    let mut critical = gnosis_core::Entity::new("Critical", "note");
    critical.importance = 0.0;
    critical.observations = vec!["short".to_string()];
    db.gnosis.create_entity(critical).unwrap();

    let mut filler = gnosis_core::Entity::new("Filler", "note");
    filler.importance = 9.0;
    filler.observations = vec![vec!["padding"; 2000].join(" ")];
    db.gnosis.create_entity(filler).unwrap();

    let context = SalienceContext::default();
    let result = db.gnosis.pack_context(&context, &["Critical".to_string()], 50, 0.9);

    assert!(result.included.iter().any(|m| m.name == "Critical" && m.must_include));
    assert!(result.must_include_count() >= 1);

    let filler_excluded = result.excluded.iter().any(|(name, _)| name == "Filler");
    let filler_spilled = result
        .spillover
        .as_ref()
        .map(|s| s.entries.iter().any(|n| n == "Filler") || s.total_remaining > 0)
        .unwrap_or(false);
    assert!(filler_excluded || filler_spilled);
}

/// Packed memories never exceed the requested token budget (minus the
/// configured reserve buffer), regardless of how many candidates are
/// offered.
#[tokio::test]
async fn total_packed_tokens_never_exceed_the_budget() {
    let mut db = TestDatabaseManager::new_temp();
    db.seed_entities(30);

    let context = SalienceContext::default();
    let result = db.gnosis.pack_context(&context, &[], 500, 0.0);
    assert!(result.total_tokens <= result.budget_tokens);
}

/// Raising `min_salience` only ever shrinks (or leaves unchanged) the
/// set of optional memories admitted, relative to a looser threshold.
#[tokio::test]
async fn raising_min_salience_does_not_admit_more_entities() {
    let mut db = TestDatabaseManager::new_temp();
    db.seed_with_importance_spread();

    let context = SalienceContext::default();
    let loose = db.gnosis.pack_context(&context, &[], 4000, 0.0);
    let strict = db.gnosis.pack_context(&context, &[], 4000, 0.9);
    assert!(strict.included.len() <= loose.included.len());
}

/// An empty candidate set packs to nothing and never errors.
#[tokio::test]
async fn empty_graph_packs_to_an_empty_result() {
    let db = TestDatabaseManager::new_temp();
    let context = SalienceContext::default();
    let result = db.gnosis.pack_context(&context, &[], 4000, 0.0);
    assert!(result.included.is_empty());
    assert!(result.spillover.is_none());
}

/// `must_include` entries named in the call are always present in
/// `must_include_count`, using the shared search-scenario fixture.
#[tokio::test]
async fn must_include_names_are_all_counted() {
    let db = TestDatabaseManager::new_temp();
    let scenario = TestDataFactory::create_search_scenario(&db.gnosis);
    let must = vec![scenario.entity_names[0].clone(), scenario.entity_names[1].clone()];

    let context = SalienceContext::default();
    let result = db.gnosis.pack_context(&context, &must, 4000, 0.0);
    assert_eq!(result.must_include_count(), must.len());
}
