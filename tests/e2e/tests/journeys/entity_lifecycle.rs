//! End-to-end entity lifecycle: create, observe, relate, patch, delete.

use gnosis_core::{Entity, EntityPatch, Relation};
use gnosis_e2e_tests::harness::db_manager::TestDatabaseManager;

#[tokio::test]
async fn full_lifecycle_from_creation_to_cascading_delete() {
    let db = TestDatabaseManager::new_temp();

    let mut alice = Entity::new("Alice", "person");
    alice.add_observations(["joined as a backend engineer".to_string()]);
    alice.tags.insert("tech".to_string());
    let alice = db.gnosis.create_entity(alice).unwrap();
    assert_eq!(alice.observations.len(), 1);

    let bob = db.gnosis.create_entity(Entity::new("Bob", "person")).unwrap();
    db.gnosis
        .create_relation(Relation::new(&alice.name, &bob.name, "mentors"))
        .unwrap();
    assert_eq!(db.gnosis.store().relations_from("Alice").len(), 1);

    // Add an observation and bump importance via patch.
    let updated = db
        .gnosis
        .update_entity(
            "Alice",
            EntityPatch {
                add_observations: vec!["promoted to team lead".to_string()],
                importance: Some(8.0),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.observations.len(), 2);
    assert_eq!(updated.importance, 8.0);

    // Re-parent Bob under Alice.
    db.gnosis
        .update_entity(
            "Bob",
            EntityPatch {
                parent_id: Some(Some("Alice".to_string())),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(db.gnosis.get_entity("Bob").unwrap().parent_id, Some("Alice".to_string()));

    // Deleting Alice must cascade the relation and clear Bob's parent link
    // is out of scope here (parent_id is not a relation); the cascading
    // invariant under test is specifically over `relations`.
    db.gnosis.delete_entity("Alice").unwrap();
    assert!(db.gnosis.get_entity("Alice").is_none());
    assert!(db.gnosis.store().relations_from("Alice").is_empty());
    assert!(db.gnosis.store().relations_to("Bob").is_empty());
}

#[tokio::test]
async fn duplicate_creation_is_rejected_and_original_is_untouched() {
    let db = TestDatabaseManager::new_temp();
    let mut first = Entity::new("Alice", "person");
    first.add_observations(["original".to_string()]);
    db.gnosis.create_entity(first).unwrap();

    let err = db
        .gnosis
        .create_entity(Entity::new("Alice", "person"))
        .unwrap_err();
    assert!(matches!(err, gnosis_core::Error::DuplicateEntity(_)));

    let still_there = db.gnosis.get_entity("Alice").unwrap();
    assert_eq!(still_there.observations, vec!["original".to_string()]);
}

#[tokio::test]
async fn removing_observations_leaves_the_rest_intact() {
    let db = TestDatabaseManager::new_temp();
    let mut alice = Entity::new("Alice", "person");
    alice.add_observations(["likes coffee".to_string(), "likes tea".to_string()]);
    db.gnosis.create_entity(alice).unwrap();

    let updated = db
        .gnosis
        .update_entity(
            "Alice",
            EntityPatch {
                remove_observations: vec!["likes coffee".to_string()],
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.observations, vec!["likes tea".to_string()]);
}
