// Copyright 2024 Campus Market Team.
//
// Tests for AuthManager

use campus_auth::{AuthError, AuthManager};
use tempfile::NamedTempFile;

async fn open_manager(path: &NamedTempFile) -> AuthManager {
    AuthManager::open(path.path().to_path_buf())
        .await
        .expect("Failed to open auth manager")
}

#[tokio::test]
async fn test_sign_up_signs_in() {
    let temp_file = NamedTempFile::new().unwrap();
    let auth = open_manager(&temp_file).await;
    let state = auth.on_auth_state_changed();
    assert!(state.borrow().is_none());

    let session = auth
        .sign_up("Ada@Uni.edu", "secret1")
        .await
        .expect("Failed to sign up");

    assert_eq!(session.email, "ada@uni.edu");
    assert_eq!(session.uid.len(), 32);
    assert!(session.uid.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(state.borrow().as_ref(), Some(&session));
    assert_eq!(auth.current_session(), Some(session));
}

#[tokio::test]
async fn test_sign_up_validation() {
    let temp_file = NamedTempFile::new().unwrap();
    let auth = open_manager(&temp_file).await;

    let weak = auth.sign_up("ada@uni.edu", "12345").await.unwrap_err();
    assert!(matches!(weak, AuthError::WeakPassword(6)));

    let bad_email = auth.sign_up("ada.uni.edu", "secret1").await.unwrap_err();
    assert!(matches!(bad_email, AuthError::InvalidEmail(_)));

    auth.sign_up("ada@uni.edu", "secret1").await.unwrap();
    let duplicate = auth.sign_up("ADA@uni.edu", "secret2").await.unwrap_err();
    assert!(matches!(duplicate, AuthError::EmailAlreadyInUse(_)));
}

#[tokio::test]
async fn test_sign_in_and_sign_out() {
    let temp_file = NamedTempFile::new().unwrap();
    let auth = open_manager(&temp_file).await;

    let created = auth.sign_up("ada@uni.edu", "secret1").await.unwrap();
    auth.sign_out();
    assert!(auth.current_session().is_none());

    let wrong = auth.sign_in("ada@uni.edu", "secret2").await.unwrap_err();
    assert!(matches!(wrong, AuthError::InvalidCredential));

    let unknown = auth.sign_in("bob@uni.edu", "secret1").await.unwrap_err();
    assert!(matches!(unknown, AuthError::InvalidCredential));

    let session = auth.sign_in("ada@uni.edu", "secret1").await.unwrap();
    assert_eq!(session.uid, created.uid);
    assert_eq!(auth.current_session().map(|s| s.uid), Some(created.uid));
}

#[tokio::test]
async fn test_repeated_failures_are_throttled() {
    let temp_file = NamedTempFile::new().unwrap();
    let auth = open_manager(&temp_file).await;
    auth.sign_up("ada@uni.edu", "secret1").await.unwrap();
    auth.sign_out();

    for _ in 0..5 {
        let err = auth.sign_in("ada@uni.edu", "nope!!").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential));
    }

    let throttled = auth.sign_in("ada@uni.edu", "secret1").await.unwrap_err();
    assert!(matches!(throttled, AuthError::TooManyRequests));
    assert!(throttled.user_message().contains("Too many failed attempts"));
}

#[tokio::test]
async fn test_password_reset_flow() {
    let temp_file = NamedTempFile::new().unwrap();
    let auth = open_manager(&temp_file).await;
    auth.sign_up("ada@uni.edu", "secret1").await.unwrap();
    auth.sign_out();

    let missing = auth.send_password_reset("bob@uni.edu").await.unwrap_err();
    assert!(matches!(missing, AuthError::UserNotFound(_)));

    let reset = auth.send_password_reset("ada@uni.edu").await.unwrap();
    assert_eq!(reset.email, "ada@uni.edu");

    auth.confirm_password_reset(&reset.token, "newsecret")
        .await
        .expect("Failed to reset password");

    // Tokens are single use
    let reused = auth
        .confirm_password_reset(&reset.token, "another1")
        .await
        .unwrap_err();
    assert!(matches!(reused, AuthError::InvalidResetToken));

    assert!(auth.sign_in("ada@uni.edu", "secret1").await.is_err());
    auth.sign_in("ada@uni.edu", "newsecret").await.unwrap();
}

#[tokio::test]
async fn test_accounts_persist_across_reopen() {
    let temp_file = NamedTempFile::new().unwrap();
    let uid = {
        let auth = open_manager(&temp_file).await;
        auth.sign_up("ada@uni.edu", "secret1").await.unwrap().uid
    };

    let auth = open_manager(&temp_file).await;
    assert!(auth.current_session().is_none());
    let session = auth.sign_in("ada@uni.edu", "secret1").await.unwrap();
    assert_eq!(session.uid, uid);
}
