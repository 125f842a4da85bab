//! End to end walk through of the main flows with fixed values

use crate::helpers::{bearer, get_customers, spawn_app, TestApp, TestUser};
use aquaserv_client_core::{LoginOutcome, MemoryStorage, SessionStorage};
use aquaserv_shared::{
    const_config::storage::STORAGE_KEY_USER_ID,
    uac::{PermissionKey, PermissionSet},
};
use std::sync::Arc;

fn jane() -> TestUser {
    TestUser {
        id: "u1".try_into().unwrap(),
        name: "Jane".try_into().unwrap(),
        email: "jane@example.com".to_string(),
        password: "correct-horse-battery".to_string(),
        role: "technician".to_string(),
        role_permissions: vec!["customers.read", "customers.write"].into(),
    }
}

async fn login_jane(app: &TestApp) -> TestUser {
    let jane = jane();
    app.backend.add_user(jane.clone());
    let outcome = app.core_client.login(&jane.login_args()).await.unwrap();
    assert_eq!(outcome, LoginOutcome::Success);
    jane
}

#[tokio::test]
async fn scenario_login_then_resolve_permissions() {
    // Arrange
    let app = spawn_app().await;
    app.backend.script_tokens(["abc123"]);

    // Act
    login_jane(&app).await;

    // Assert
    let session = app.core_client.session();
    assert!(session.is_authenticated());
    assert_eq!(session.access_token.unwrap().expose(), "abc123");
    let user = session.user.unwrap();
    assert_eq!(user.id.as_ref(), "u1");
    assert_eq!(user.name.as_ref(), "Jane");
    assert_eq!(
        app.backend.authorization_headers_for("/users/me/permissions"),
        vec![bearer("abc123")]
    );
    let expected: PermissionSet = vec!["customers.read", "customers.write"].into();
    assert_eq!(session.permissions, expected);
}

#[tokio::test]
async fn scenario_expired_call_retried_with_new_token() {
    // Arrange
    let app = spawn_app().await;
    app.backend.script_tokens(["abc123", "def456"]);
    login_jane(&app).await;
    let expected = get_customers(&app.core_client).await.unwrap();
    app.backend.expire_all_tokens();

    // Act
    let actual = get_customers(&app.core_client).await.unwrap();

    // Assert
    assert_eq!(actual, expected);
    assert_eq!(
        app.backend.authorization_headers_for("/customers"),
        vec![bearer("abc123"), bearer("abc123"), bearer("def456")]
    );
}

#[tokio::test]
async fn scenario_no_user_id_goes_straight_to_login() {
    // Arrange
    let app = spawn_app().await;
    let storage = MemoryStorage::new();
    let client = app.new_client(Arc::new(storage.clone()));
    client.login(&app.test_user.login_args()).await.unwrap();
    storage.remove(STORAGE_KEY_USER_ID).unwrap();
    let client = app.new_client(Arc::new(storage.clone()));
    app.backend.expire_all_tokens();

    // Act
    let actual = get_customers(&client).await.unwrap_err();

    // Assert
    assert!(actual.is_session_expired(), "{actual:?}");
    assert_eq!(app.backend.refresh_calls(), 0);
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn scenario_toggle_role_permission() {
    // Arrange
    let app = spawn_app().await;
    let mut target = jane();
    target.role_permissions.insert(PermissionKey::from("orders.delete"));
    app.backend.add_user(target.clone());
    app.login_admin_assert().await;
    let key = PermissionKey::from("orders.delete");

    // Act
    let revoked = app
        .core_client
        .toggle_user_permission(&target.id, &key)
        .await
        .unwrap();
    let restored = app
        .core_client
        .toggle_user_permission(&target.id, &key)
        .await
        .unwrap();

    // Assert
    assert!(revoked.overrides.revoked.contains_key(&key));
    assert!(!revoked.effective_permissions.contains_key(&key));
    assert!(!restored.overrides.revoked.contains_key(&key));
    assert!(restored.effective_permissions.contains_key(&key));
    assert_eq!(restored.effective_permissions, target.role_permissions);
}
