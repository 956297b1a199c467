//! Decay and salience invariants.

use chrono::{Duration, Utc};
use gnosis_core::{DecayConfig, Entity, GnosisConfig, ReinforceOptions, SalienceContext};
use gnosis_e2e_tests::harness::db_manager::TestDatabaseManager;

/// Scenario 4: with a one-week half-life and no reinforcement, an entity
/// last accessed exactly one half-life ago decays to roughly half its
/// base importance.
#[tokio::test]
async fn one_half_life_without_access_halves_importance() {
    let config = GnosisConfig {
        decay: DecayConfig {
            half_life_hours: 168.0,
            importance_modulation: false,
            access_modulation: false,
            min_importance: 0.0,
            recent_access_window: 100,
        },
        ..GnosisConfig::default()
    };
    let db = TestDatabaseManager::new_temp_with_config(config);

    let mut entity = Entity::new("OldMemory", "observation");
    entity.importance = 6.0;
    entity.agent = Some(gnosis_core::AgentFields {
        last_accessed_at: Some(Utc::now() - Duration::hours(168)),
        ..Default::default()
    });
    let created = db.gnosis.create_entity(entity).unwrap();

    let eff = db.gnosis.effective_importance(&created, Utc::now());
    assert!((eff - 3.0).abs() < 0.1, "expected ~half of 6.0, got {eff}");
}

/// Reinforcing an entity refreshes `last_accessed_at` and raises
/// `confirmation_count`/`confidence`, which raises its effective
/// importance relative to an identical un-reinforced entity.
#[tokio::test]
async fn reinforcing_an_entity_raises_its_effective_importance() {
    let db = TestDatabaseManager::new_temp();

    let mut stale = Entity::new("Stale", "observation");
    stale.importance = 5.0;
    stale.agent = Some(gnosis_core::AgentFields {
        last_accessed_at: Some(Utc::now() - Duration::hours(200)),
        ..Default::default()
    });
    db.gnosis.create_entity(stale).unwrap();

    let mut reinforced = Entity::new("Reinforced", "observation");
    reinforced.importance = 5.0;
    reinforced.agent = Some(gnosis_core::AgentFields {
        last_accessed_at: Some(Utc::now() - Duration::hours(200)),
        ..Default::default()
    });
    db.gnosis.create_entity(reinforced).unwrap();

    db.gnosis
        .reinforce("Reinforced", ReinforceOptions::default())
        .unwrap();

    let stale_entity = db.gnosis.get_entity("Stale").unwrap();
    let reinforced_entity = db.gnosis.get_entity("Reinforced").unwrap();
    let now = Utc::now();
    assert!(
        db.gnosis.effective_importance(&reinforced_entity, now)
            > db.gnosis.effective_importance(&stale_entity, now)
    );
}

/// `select_for_forgetting` only selects entities at or below the
/// threshold, and a `dry_run` pass leaves the graph untouched.
#[tokio::test]
async fn select_for_forgetting_respects_threshold_and_dry_run() {
    let config = GnosisConfig {
        decay: DecayConfig {
            half_life_hours: 1.0,
            importance_modulation: false,
            access_modulation: false,
            min_importance: 0.0,
            recent_access_window: 100,
        },
        ..GnosisConfig::default()
    };
    let db = TestDatabaseManager::new_temp_with_config(config);

    let mut decayed = Entity::new("Decayed", "observation");
    decayed.importance = 5.0;
    decayed.agent = Some(gnosis_core::AgentFields {
        last_accessed_at: Some(Utc::now() - Duration::hours(1000)),
        ..Default::default()
    });
    db.gnosis.create_entity(decayed).unwrap();

    let mut fresh = Entity::new("Fresh", "observation");
    fresh.importance = 9.0;
    fresh.agent = Some(gnosis_core::AgentFields {
        last_accessed_at: Some(Utc::now()),
        ..Default::default()
    });
    db.gnosis.create_entity(fresh).unwrap();

    let dry_report = db
        .gnosis
        .select_for_forgetting(1.0, None, &[], true)
        .unwrap();
    assert_eq!(dry_report.candidates.len(), 1);
    assert_eq!(dry_report.candidates[0].name, "Decayed");
    assert_eq!(dry_report.archived, 0);
    assert_eq!(db.gnosis.store().entity_count(), 2);

    let live_report = db
        .gnosis
        .select_for_forgetting(1.0, None, &[], false)
        .unwrap();
    assert_eq!(live_report.archived, 1);
    assert!(db.gnosis.get_entity("Decayed").is_none());
    assert!(db.gnosis.get_entity("Fresh").is_some());
}

/// Salience total is always within [0, 1], and an entity matching the
/// current session scores strictly higher than one that does not,
/// holding everything else equal.
#[tokio::test]
async fn salience_is_bounded_and_rewards_session_context_match() {
    let db = TestDatabaseManager::new_temp();

    let mut matching = Entity::new("InSession", "observation");
    matching.agent = Some(gnosis_core::AgentFields {
        session_id: Some("session-1".to_string()),
        ..Default::default()
    });
    let matching = db.gnosis.create_entity(matching).unwrap();

    let mut other = Entity::new("OtherSession", "observation");
    other.agent = Some(gnosis_core::AgentFields {
        session_id: Some("session-2".to_string()),
        ..Default::default()
    });
    let other = db.gnosis.create_entity(other).unwrap();

    let context = SalienceContext {
        current_session_id: Some("session-1".to_string()),
        ..Default::default()
    };

    let matching_score = db.gnosis.salience(&matching, &context);
    let other_score = db.gnosis.salience(&other, &context);

    assert!((0.0..=1.0).contains(&matching_score.total));
    assert!((0.0..=1.0).contains(&other_score.total));
    assert!(matching_score.context_relevance > other_score.context_relevance);
}
