// Copyright 2024 Campus Market Team.
//
// Tests for optimistic mutations and rollback

use campus_market::{
    apply_optimistic, MarketError, MutationNotices, NotificationKind, Outcome, SharedState, User,
};
use campus_store::StoreError;

#[derive(Debug, Clone, PartialEq)]
struct Item {
    id: u32,
    status: &'static str,
}

fn item(id: u32) -> Item {
    Item { id, status: "active" }
}

fn listing_notices(success: &str) -> MutationNotices {
    MutationNotices::new(
        success,
        "Permission denied: You can only edit your own ads.",
        "Action failed: {error}",
    )
}

#[tokio::test]
async fn test_failed_delete_restores_original_order() {
    let state = SharedState::new(vec![item(1), item(2), item(3)]);
    let original = state.get();

    let outcome = apply_optimistic(
        &state,
        |items: &mut Vec<Item>| items.retain(|i| i.id != 2),
        async { Err::<(), _>(StoreError::Unavailable("network down".into())) },
        &listing_notices("Ad deleted successfully"),
    )
    .await;

    assert!(!outcome.is_committed());
    assert_eq!(state.get(), original);
    assert_eq!(
        state.get().iter().map(|i| i.id).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(outcome.notification().kind, NotificationKind::Error);
    assert_eq!(outcome.notification().message, "Action failed: network down");
}

#[tokio::test]
async fn test_successful_status_update_is_kept() {
    let state = SharedState::new(vec![Item { id: 5, status: "active" }]);

    let outcome = apply_optimistic(
        &state,
        |items: &mut Vec<Item>| {
            for i in items.iter_mut().filter(|i| i.id == 5) {
                i.status = "sold";
            }
        },
        async { Ok::<_, StoreError>(()) },
        &listing_notices("Marked as sold"),
    )
    .await;

    assert_eq!(state.get(), vec![Item { id: 5, status: "sold" }]);
    match outcome {
        Outcome::Committed { notification, .. } => {
            assert_eq!(notification.kind, NotificationKind::Success);
            assert_eq!(notification.message, "Marked as sold");
        }
        Outcome::RolledBack { error, .. } => panic!("unexpected rollback: {}", error),
    }
}

#[tokio::test]
async fn test_denied_and_generic_failures_read_differently() {
    let notices = listing_notices("Marked as sold");

    let denied_state = SharedState::new(vec![item(1)]);
    let denied = apply_optimistic(
        &denied_state,
        |items: &mut Vec<Item>| items[0].status = "sold",
        async { Err::<(), _>(StoreError::PermissionDenied("update products/1".into())) },
        &notices,
    )
    .await;

    let failed_state = SharedState::new(vec![item(1)]);
    let failed = apply_optimistic(
        &failed_state,
        |items: &mut Vec<Item>| items[0].status = "sold",
        async { Err::<(), _>(StoreError::Unavailable("timeout".into())) },
        &notices,
    )
    .await;

    assert_eq!(
        denied.notification().message,
        "Permission denied: You can only edit your own ads."
    );
    assert_ne!(denied.notification().message, failed.notification().message);
    assert_eq!(denied_state.get(), vec![item(1)]);
    assert_eq!(failed_state.get(), vec![item(1)]);

    assert!(matches!(
        denied.into_result(),
        Err(MarketError::PermissionDenied(_))
    ));
    assert!(matches!(
        failed.into_result(),
        Err(MarketError::RemoteFailure(_))
    ));
}

#[tokio::test]
async fn test_profile_rollback_restores_every_field() {
    let before = User {
        id: "abc".into(),
        name: "Ada".into(),
        avatar: "https://img/ada.png".into(),
        is_verified: true,
        rating: 4.5,
        joined_date: "Oct 2026".into(),
        location: "Lagos".into(),
        university: Some("UNILAG".into()),
        department: Some("Physics".into()),
        bio: Some("Selling my old books".into()),
        phone: Some("0800".into()),
        email: Some("ada@uni.edu".into()),
        state: Some("Lagos".into()),
    };
    let state = SharedState::new(Some(before.clone()));
    let mut observer = state.subscribe();

    let renamed = User {
        name: "Ada O.".into(),
        ..before.clone()
    };
    let outcome = apply_optimistic(
        &state,
        |user: &mut Option<User>| *user = Some(renamed),
        async { Err::<(), _>(MarketError::RemoteFailure("offline".into())) },
        &MutationNotices::new(
            "Profile updated successfully",
            "Permission denied: You can only edit your own profile.",
            "Failed to update profile",
        ),
    )
    .await;

    assert_eq!(outcome.notification().message, "Failed to update profile");
    assert_eq!(state.get(), Some(before.clone()));
    assert!(observer.has_changed().unwrap());
    assert_eq!(*observer.borrow_and_update(), Some(before));
}
