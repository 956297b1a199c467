//! End-to-end hybrid search workflow across a multi-topic graph.

use gnosis_core::{HybridOptions, ReflectionOptions, SymbolicFilters};
use gnosis_e2e_tests::harness::db_manager::TestDatabaseManager;
use gnosis_e2e_tests::mocks::fixtures::TestDataFactory;

#[tokio::test]
async fn search_surfaces_the_right_topical_cluster() {
    let db = TestDatabaseManager::new_temp();
    TestDataFactory::create_search_scenario(&db.gnosis);

    let options = HybridOptions::default();
    let response = db.gnosis.search("rust programming language", &options).await;

    assert!(!response.results.is_empty());
    let top = &response.results[0];
    assert!(top.entity.tags.contains("programming"));
}

#[tokio::test]
async fn tag_filtered_search_excludes_entities_outside_the_filter() {
    let db = TestDatabaseManager::new_temp();
    TestDataFactory::create_search_scenario(&db.gnosis);

    let options = HybridOptions {
        symbolic_filters: SymbolicFilters {
            tags: Some(vec!["science".to_string()]),
            ..Default::default()
        },
        limit: 10,
        ..Default::default()
    };
    let response = db.gnosis.search("cell biology", &options).await;
    for result in &response.results {
        assert!(
            result.entity.tags.contains("science") || result.matched_layers.len() > 1,
            "unexpected non-science result: {}",
            result.entity.name
        );
    }
}

#[tokio::test]
async fn reflective_search_runs_at_least_one_iteration_and_reports_history() {
    let db = TestDatabaseManager::new_temp();
    TestDataFactory::create_social_graph(&db.gnosis);

    let options = HybridOptions::default();
    let reflection = ReflectionOptions {
        max_iterations: 3,
        adequacy_threshold: 0.99,
        limit_increase_factor: 1.5,
    };
    let report = db
        .gnosis
        .reflective_search("engineering", &options, &reflection)
        .await;

    assert!(!report.history.is_empty());
    assert!(report.history.len() <= reflection.max_iterations);
    for window in report.history.windows(2) {
        assert!(window[1].limit >= window[0].limit);
    }
}

#[tokio::test]
async fn search_on_an_empty_graph_returns_no_results_without_panicking() {
    let db = TestDatabaseManager::new_temp();
    let options = HybridOptions::default();
    let response = db.gnosis.search("anything at all", &options).await;
    assert!(response.results.is_empty());
}
