//! TF/IDF index invariants.

use gnosis_core::{Entity, GraphStore, GraphStoreConfig, TfIdfIndex};
use tempfile::tempdir;

fn fresh_index() -> (TfIdfIndex, GraphStore, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let store = GraphStore::open(GraphStoreConfig {
        path: dir.path().join("graph.jsonl"),
    })
    .unwrap();
    let index = TfIdfIndex::open(dir.path().join("index.json"), &store).unwrap();
    (index, store, dir)
}

/// `I.documents.keys == G.entities.names` after every mutation.
#[tokio::test]
async fn document_count_tracks_entity_count_through_add_update_remove() {
    let (index, _store, _dir) = fresh_index();

    index.add_document("Alice", "alice loves rust programming");
    index.add_document("Bob", "bob enjoys hiking");
    assert_eq!(index.document_count(), 2);

    index.update_document("Alice", "alice now loves golang instead");
    assert_eq!(index.document_count(), 2);

    index.remove_document("Bob");
    assert_eq!(index.document_count(), 1);
    assert!(index.document_text("Bob").is_none());
}

/// `I.idf(t) == ln(N / df(t))` for every indexed term, recomputed as
/// documents are added (N changes).
#[tokio::test]
async fn idf_matches_ln_of_n_over_document_frequency() {
    let (index, _store, _dir) = fresh_index();

    index.add_document("Alice", "rust rust programming");
    index.add_document("Bob", "rust sailing");
    index.add_document("Carol", "painting and sculpture");

    // "rust" appears in 2 of 3 documents: idf = ln(3/2).
    let scores = index.score_all("rust");
    let alice_score = scores.iter().find(|(n, _)| n == "Alice").unwrap().1;
    let expected_idf = (3.0_f64 / 2.0).ln();
    // Alice's document has term frequency 2 for "rust".
    let expected = 2.0 * expected_idf;
    assert!(
        (alice_score - expected).abs() < 1e-9,
        "expected {expected}, got {alice_score}"
    );

    let bob_score = scores.iter().find(|(n, _)| n == "Bob").unwrap().1;
    let expected_bob = 1.0 * expected_idf;
    assert!((bob_score - expected_bob).abs() < 1e-9);

    let carol_score = scores.iter().find(|(n, _)| n == "Carol").unwrap().1;
    assert_eq!(carol_score, 0.0);
}

/// Incremental update only touches IDF for tokens that actually changed
/// between the old and new document text, leaving unrelated terms'
/// IDF values stable.
#[tokio::test]
async fn updating_a_document_leaves_unrelated_term_idf_unchanged() {
    let (index, _store, _dir) = fresh_index();

    index.add_document("Alice", "rust programming language");
    index.add_document("Bob", "rust sailing adventures");
    index.add_document("Carol", "painting and sculpture");

    let before = index.score_all("painting");
    let carol_before = before.iter().find(|(n, _)| n == "Carol").unwrap().1;

    // Rewrite Alice's document entirely; "painting"'s document frequency
    // (only Carol) is untouched, so its IDF and Carol's score must not move.
    index.update_document("Alice", "rust refactored completely with golang");

    let after = index.score_all("painting");
    let carol_after = after.iter().find(|(n, _)| n == "Carol").unwrap().1;
    assert_eq!(carol_before, carol_after);
}

/// A freshly rebuilt index from the graph produces the same document set
/// as one built incrementally via `add_document`.
#[tokio::test]
async fn rebuild_from_graph_matches_incrementally_built_index() {
    let dir = tempdir().unwrap();
    let store = GraphStore::open(GraphStoreConfig {
        path: dir.path().join("graph.jsonl"),
    })
    .unwrap();
    store.append_entity(Entity::new("Alice", "person")).unwrap();
    store.append_entity(Entity::new("Bob", "person")).unwrap();

    let index = TfIdfIndex::open(dir.path().join("index.json"), &store).unwrap();
    assert_eq!(index.document_count(), 2);

    index.rebuild(&store);
    assert_eq!(index.document_count(), 2);
}
