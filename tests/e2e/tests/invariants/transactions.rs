//! Transaction Manager invariants.

use gnosis_core::{Entity, Error, Operation, TxnState};
use gnosis_e2e_tests::harness::db_manager::TestDatabaseManager;

/// Scenario 1: begin; stage create(Alice); stage create(Alice) again
/// (duplicate); commit. Expect `success=false`, rollback succeeded, and
/// the graph has zero entities.
#[tokio::test]
async fn duplicate_create_rolls_back_the_whole_transaction() {
    let db = TestDatabaseManager::new_temp();
    let txn = db.gnosis.transactions();

    txn.begin().await.unwrap();
    txn.stage(Operation::CreateEntity(Entity::new("Alice", "person")))
        .await
        .unwrap();
    txn.stage(Operation::CreateEntity(Entity::new("Alice", "person")))
        .await
        .unwrap();

    let err = txn.commit().await.unwrap_err();
    assert!(matches!(err, Error::DuplicateEntity(_)));
    assert_eq!(txn.state().await, TxnState::Idle);
    assert_eq!(db.gnosis.store().entity_count(), 0);
}

/// No two transactions may be Active at once.
#[tokio::test]
async fn second_begin_while_active_fails_with_transaction_active() {
    let db = TestDatabaseManager::new_temp();
    let txn = db.gnosis.transactions();

    txn.begin().await.unwrap();
    let err = txn.begin().await.unwrap_err();
    assert!(matches!(err, Error::TransactionActive));

    // clean up so the store isn't left mid-transaction for other assertions
    txn.rollback().await.unwrap();
    assert_eq!(txn.state().await, TxnState::Idle);
}

/// Staging after leaving Active (e.g. before `begin`) is rejected.
#[tokio::test]
async fn stage_without_an_active_transaction_is_rejected() {
    let db = TestDatabaseManager::new_temp();
    let txn = db.gnosis.transactions();
    let err = txn
        .stage(Operation::CreateEntity(Entity::new("Alice", "person")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoTransaction));
}

/// Testable property: for every graph state, after `delete_entity(n)`, no
/// relation references `n` as `from` or `to`.
#[tokio::test]
async fn committed_delete_cascades_relations_atomically() {
    let db = TestDatabaseManager::new_temp();
    db.gnosis.create_entity(Entity::new("Alice", "person")).unwrap();
    db.gnosis.create_entity(Entity::new("Bob", "person")).unwrap();
    db.gnosis
        .create_relation(gnosis_core::Relation::new("Alice", "Bob", "knows"))
        .unwrap();

    let txn = db.gnosis.transactions();
    txn.begin().await.unwrap();
    txn.stage(Operation::DeleteEntity("Alice".to_string())).await.unwrap();
    txn.commit().await.unwrap();

    assert!(db.gnosis.get_entity("Alice").is_none());
    assert!(db.gnosis.store().relations_from("Alice").is_empty());
    assert!(db.gnosis.store().relations_to("Bob").is_empty());
}

/// Batch variant with `validate_before_execute`: reports the first
/// violation's index without mutating the graph.
#[tokio::test]
async fn batch_validate_before_execute_reports_first_violation_and_does_not_mutate() {
    let db = TestDatabaseManager::new_temp();
    let txn = db.gnosis.transactions();

    let ops = vec![
        Operation::CreateEntity(Entity::new("Alice", "person")),
        Operation::CreateEntity(Entity::new("Alice", "person")),
        Operation::CreateEntity(Entity::new("Carol", "person")),
    ];
    let report = txn
        .commit_batch(
            ops,
            gnosis_core::BatchOptions {
                stop_on_error: false,
                validate_before_execute: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.outcomes[0].index, 1);
    assert_eq!(db.gnosis.store().entity_count(), 0);
}

/// Without `stop_on_error`, every operation is attempted and per-operation
/// results are collected alongside aggregate counts.
#[tokio::test]
async fn batch_without_stop_on_error_collects_every_outcome() {
    let db = TestDatabaseManager::new_temp();
    let txn = db.gnosis.transactions();

    let ops = vec![
        Operation::CreateEntity(Entity::new("Alice", "person")),
        Operation::DeleteEntity("NoSuchEntity".to_string()),
        Operation::CreateEntity(Entity::new("Carol", "person")),
    ];
    let report = txn
        .commit_batch(
            ops,
            gnosis_core::BatchOptions {
                stop_on_error: false,
                validate_before_execute: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
}

/// Round-trip property: begin -> stage -> rollback leaves the graph
/// byte-identical to before begin.
#[tokio::test]
async fn begin_stage_rollback_leaves_graph_unchanged() {
    let db = TestDatabaseManager::new_temp();
    db.gnosis.create_entity(Entity::new("Alice", "person")).unwrap();
    let before = std::fs::read(db.path()).unwrap();

    let txn = db.gnosis.transactions();
    txn.begin().await.unwrap();
    txn.stage(Operation::CreateEntity(Entity::new("Bob", "person")))
        .await
        .unwrap();
    txn.rollback().await.unwrap();

    let after = std::fs::read(db.path()).unwrap();
    assert_eq!(before, after);
    assert_eq!(db.gnosis.store().entity_count(), 1);
}

/// Setting `parent_id` to an entity's own descendant is rejected as a cycle,
/// and the failed operation rolls back the whole transaction.
#[tokio::test]
async fn cycle_through_parent_chain_rolls_back_the_batch() {
    let db = TestDatabaseManager::new_temp();
    db.gnosis.create_entity(Entity::new("A", "t")).unwrap();
    db.gnosis.create_entity(Entity::new("B", "t")).unwrap();
    db.gnosis
        .update_entity(
            "B",
            gnosis_core::EntityPatch {
                parent_id: Some(Some("A".to_string())),
                ..Default::default()
            },
        )
        .unwrap();

    let txn = db.gnosis.transactions();
    txn.begin().await.unwrap();
    txn.stage(Operation::UpdateEntity {
        name: "A".to_string(),
        patch: gnosis_core::EntityPatch {
            parent_id: Some(Some("B".to_string())),
            ..Default::default()
        },
    })
    .await
    .unwrap();

    let err = txn.commit().await.unwrap_err();
    assert!(matches!(err, Error::CycleDetected { .. }));
    assert_eq!(db.gnosis.get_entity("A").unwrap().parent_id, None);
}
