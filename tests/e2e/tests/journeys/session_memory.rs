//! End-to-end agent-memory journey: working memory creation, access
//! tracking, session chaining, and decay-driven forgetting.

use gnosis_core::{AgentFields, Entity, MemoryType, SessionFields, SessionStatus};
use gnosis_e2e_tests::harness::db_manager::TestDatabaseManager;

#[tokio::test]
async fn working_memory_is_accessed_and_reinforced_over_a_session() {
    let db = TestDatabaseManager::new_temp();

    let mut observation = Entity::new("UserPrefersDarkMode", "observation");
    observation.agent = Some(AgentFields {
        memory_type: MemoryType::Working,
        session_id: Some("session-1".to_string()),
        ..Default::default()
    });
    db.gnosis.create_entity(observation).unwrap();

    let accessed = db
        .gnosis
        .record_access("UserPrefersDarkMode", Some("session-1"))
        .unwrap();
    assert_eq!(accessed.agent.as_ref().unwrap().access_count, 1);

    db.gnosis
        .record_access("UserPrefersDarkMode", Some("session-1"))
        .unwrap();
    assert_eq!(
        db.gnosis.access_tracker().session_count("UserPrefersDarkMode", "session-1"),
        2
    );
    assert_eq!(
        db.gnosis.access_pattern("UserPrefersDarkMode"),
        gnosis_core::AccessPattern::Rare
    );

    let reinforced = db
        .gnosis
        .reinforce("UserPrefersDarkMode", gnosis_core::ReinforceOptions::default())
        .unwrap();
    assert_eq!(reinforced.agent.unwrap().confirmation_count, 1);
}

#[tokio::test]
async fn session_chain_follows_the_backward_link_and_verified_related_links() {
    let db = TestDatabaseManager::new_temp();

    let mut s1 = Entity::new("Session1", "session");
    s1.session = Some(SessionFields {
        status: SessionStatus::Completed,
        ..Default::default()
    });
    db.gnosis.create_entity(s1).unwrap();

    let mut s2 = Entity::new("Session2", "session");
    s2.session = Some(SessionFields {
        status: SessionStatus::Completed,
        previous_session_id: Some("Session1".to_string()),
        ..Default::default()
    });
    db.gnosis.create_entity(s2).unwrap();

    // Session3 claims Session2 as related, but Session2 does not point
    // back at Session3 — the asymmetric traversal must not follow it.
    let mut s3 = Entity::new("Session3", "session");
    s3.session = Some(SessionFields {
        status: SessionStatus::Active,
        related_session_ids: vec!["Session2".to_string()],
        ..Default::default()
    });
    db.gnosis.create_entity(s3).unwrap();

    let chain = db.gnosis.store().session_chain("Session2");
    let names: Vec<&str> = chain.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"Session1"));
    assert!(!names.contains(&"Session3"));
}

#[tokio::test]
async fn stale_working_memory_is_selected_for_forgetting_but_a_dry_run_preserves_it() {
    let db = TestDatabaseManager::new_temp();

    let mut stale = Entity::new("ForgottenFact", "observation");
    stale.importance = 2.0;
    stale.agent = Some(AgentFields {
        memory_type: MemoryType::Working,
        last_accessed_at: Some(chrono::Utc::now() - chrono::Duration::hours(24 * 60)),
        ..Default::default()
    });
    db.gnosis.create_entity(stale).unwrap();

    let report = db
        .gnosis
        .select_for_forgetting(0.5, None, &[], true)
        .unwrap();
    assert!(report.candidates.iter().any(|c| c.name == "ForgottenFact"));
    assert!(db.gnosis.get_entity("ForgottenFact").is_some());
}
