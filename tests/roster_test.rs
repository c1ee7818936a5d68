//! Roster and Target Matcher Integration Tests

use clonebot::store::{keys, write_timestamp};
use clonebot::{
    AutomationTarget, ConversationKey, EngineConfig, MemoryStore, Roster, SenderIdentity,
    TargetMatcher, TokioClock,
};
use std::sync::Arc;

const NOW: i64 = 1_700_000_000;

fn ali() -> SenderIdentity {
    SenderIdentity {
        display_name: Some("Ali Khan".to_string()),
        contact_name: None,
        user_id: "923111111111".to_string(),
    }
}

#[tokio::test]
async fn test_removed_target_no_longer_matches() {
    let store = Arc::new(MemoryStore::new());
    let roster = Roster::new(store.clone());
    let matcher = TargetMatcher::new(
        store.clone(),
        Arc::new(TokioClock::starting_at(NOW)),
        &EngineConfig::default(),
    );
    let key = ConversationKey::new("923000000000", "923111111111@s.whatsapp.net");
    let target = AutomationTarget::new("ali").unwrap();

    assert!(matcher.should_automate(&key, &ali()).await.is_none());

    roster.add(key.account(), &target).await.unwrap();
    let matched = matcher.should_automate(&key, &ali()).await.unwrap();
    assert_eq!(matched.target, target);
    assert_eq!(matched.sender_label, "Ali Khan");

    roster.remove(key.account(), &target).await.unwrap();
    assert!(matcher.should_automate(&key, &ali()).await.is_none());
}

#[tokio::test]
async fn test_owner_precedence_over_any_roster() {
    let store = Arc::new(MemoryStore::new());
    let roster = Roster::new(store.clone());
    let matcher = TargetMatcher::new(
        store.clone(),
        Arc::new(TokioClock::starting_at(NOW)),
        &EngineConfig::default(),
    );
    let key = ConversationKey::new("923000000000", "923111111111@s.whatsapp.net");

    for pattern in ["ali", "khan", "9231", "a"] {
        roster
            .add(key.account(), &AutomationTarget::new(pattern).unwrap())
            .await
            .unwrap();
    }
    assert!(matcher.should_automate(&key, &ali()).await.is_some());

    write_timestamp(store.as_ref(), &keys::owner_activity(&key), NOW - 59, None).await;
    assert!(matcher.should_automate(&key, &ali()).await.is_none());
}

#[tokio::test]
async fn test_first_matching_target_wins() {
    let store = Arc::new(MemoryStore::new());
    let roster = Roster::new(store.clone());
    let matcher = TargetMatcher::new(
        store.clone(),
        Arc::new(TokioClock::starting_at(NOW)),
        &EngineConfig::default(),
    );
    let key = ConversationKey::new("923000000000", "chat");

    roster
        .add(key.account(), &AutomationTarget::new("Khan").unwrap())
        .await
        .unwrap();
    roster
        .add(key.account(), &AutomationTarget::new("Ali").unwrap())
        .await
        .unwrap();

    // Roster order is sorted, so "Ali" is tested before "Khan"
    let matched = matcher.should_automate(&key, &ali()).await.unwrap();
    assert_eq!(matched.target.pattern(), "Ali");
}
