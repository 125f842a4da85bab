use crate::helpers::{bearer, get_customers, record_events, spawn_app, PERMISSION_CUSTOMERS_READ};
use aquaserv_client_core::{AuthState, LoginOutcome, SessionEvent};
use aquaserv_shared::{
    const_config::storage::STORAGE_ALL_KEYS,
    req_args::{LoginReqArgs, RegisterReqArgs},
    telemetry::LogBuffer,
};
use std::sync::Arc;

#[tokio::test]
async fn login_success_stores_session_and_permissions() {
    // Arrange
    let app = spawn_app().await;
    let events = record_events(&app.core_client);

    // Act
    let outcome = app.login().await.unwrap();

    // Assert
    assert_eq!(outcome, LoginOutcome::Success);
    assert!(app.core_client.is_authenticated());
    assert_eq!(app.core_client.auth_state(), AuthState::LoggedIn);
    assert_eq!(
        app.core_client.user_info(),
        Some(app.test_user.user_info())
    );
    assert_eq!(app.core_client.user_id(), Some(app.test_user.id.clone()));
    assert_eq!(
        app.core_client.permissions(),
        app.test_user.role_permissions
    );
    assert!(app.core_client.has_permission(PERMISSION_CUSTOMERS_READ));
    let mut expected_keys: Vec<String> = STORAGE_ALL_KEYS.iter().map(|x| x.to_string()).collect();
    expected_keys.sort();
    assert_eq!(app.storage.keys(), expected_keys);
    assert_eq!(*events.lock().unwrap(), vec![SessionEvent::LoggedIn]);
}

#[tokio::test]
async fn login_failure_invalid_password() {
    // Arrange
    let app = spawn_app().await;
    let login_args = app
        .test_user
        .login_args()
        .password("random-password".to_string().into());

    // Act
    let actual = app.core_client.login(&login_args).await.unwrap_err();

    // Assert
    assert_eq!(actual.status().map(|x| x.as_u16()), Some(401));
    assert_eq!(actual.to_string(), "Invalid email or password");
    assert!(!app.core_client.is_authenticated());
    assert_eq!(app.core_client.auth_state(), AuthState::LoggedOut);
    assert!(app.storage.is_empty(), "{:?}", app.storage.keys());
    assert_eq!(app.backend.refresh_calls(), 0, "login is never recovered");
}

#[tokio::test]
async fn login_failure_unknown_user() {
    // Arrange
    let app = spawn_app().await;
    let login_args = LoginReqArgs::new("nobody@example.com", "random-password".to_string().into());

    // Act
    let actual = app.core_client.login(&login_args).await.unwrap_err();

    // Assert
    assert_eq!(actual.to_string(), "Invalid email or password");
    assert!(app.core_client.session().access_token.is_none());
}

#[tokio::test]
async fn failed_login_keeps_existing_session() {
    // Arrange
    let app = spawn_app().await;
    app.login_assert().await;
    let token_before = app.current_token();
    let bad_args = app
        .admin_user
        .login_args()
        .password("random-password".to_string().into());

    // Act
    let actual = app.core_client.login(&bad_args).await;

    // Assert
    assert!(actual.is_err());
    assert_eq!(app.current_token(), token_before);
    assert_eq!(app.core_client.auth_state(), AuthState::LoggedIn);
}

#[tokio::test]
async fn login_succeeds_when_permissions_unavailable() {
    // Arrange
    let app = spawn_app().await;
    app.backend.set_fail_permissions(true);

    // Act
    let outcome = app.login().await.unwrap();

    // Assert
    assert_eq!(outcome, LoginOutcome::SuccessWithoutPermissions);
    assert!(!outcome.is_permissions_loaded());
    assert!(app.core_client.is_authenticated());
    assert!(app.core_client.permissions().is_empty());
    assert!(!app.core_client.has_permission(PERMISSION_CUSTOMERS_READ));
}

#[tokio::test]
async fn auth_endpoints_never_carry_a_token() {
    // Arrange
    let app = spawn_app().await;
    app.login_assert().await;
    let first_token = app.current_token().unwrap();

    // Act - Login again while already holding a token
    app.login_assert().await;

    // Assert
    let login_headers = app.backend.authorization_headers_for("/auth/login");
    assert_eq!(login_headers, vec![None, None]);
    let permission_headers = app.backend.authorization_headers_for("/users/me/permissions");
    assert_eq!(permission_headers[0], bearer(&first_token));
    assert_eq!(
        permission_headers[1],
        bearer(&app.current_token().unwrap())
    );
}

#[tokio::test]
async fn register_signs_in_new_user() {
    // Arrange
    let app = spawn_app().await;
    let register_args = RegisterReqArgs::new(
        "New Customer",
        "new-customer@example.com",
        "a-long-password".to_string().into(),
    )
    .unwrap()
    .phone(Some("555-0100".to_string()));

    // Act
    let outcome = app.core_client.register(&register_args).await.unwrap();

    // Assert
    assert_eq!(outcome, LoginOutcome::Success);
    let user_info = app.core_client.user_info().unwrap();
    assert_eq!(user_info.name.as_ref(), "New Customer");
    assert_eq!(user_info.email.as_deref(), Some("new-customer@example.com"));
    assert!(app.core_client.has_permission(PERMISSION_CUSTOMERS_READ));
    assert_eq!(
        app.backend.authorization_headers_for("/auth/register"),
        vec![None]
    );
}

#[tokio::test]
async fn register_duplicate_email_rejected() {
    // Arrange
    let app = spawn_app().await;
    let register_args = RegisterReqArgs::new(
        "Copy Cat",
        app.test_user.email.as_str(),
        "a-long-password".to_string().into(),
    )
    .unwrap();

    // Act
    let actual = app.core_client.register(&register_args).await.unwrap_err();

    // Assert
    assert_eq!(actual.status().map(|x| x.as_u16()), Some(409));
    assert_eq!(actual.to_string(), "Email already registered");
    assert!(!app.core_client.is_authenticated());
}

#[tokio::test]
async fn tokens_never_reach_the_logs() {
    // Arrange
    let app = spawn_app().await;
    app.backend
        .script_tokens(["login-token-7f3a9c", "refreshed-token-2b8e4d"]);
    let (logs, _guard) = LogBuffer::capture_thread("info");

    // Act - Login, refresh and restore from storage all handle a token
    app.login_assert().await;
    app.backend.expire_all_tokens();
    get_customers(&app.core_client).await.unwrap();
    let reloaded = app.new_client(Arc::new(app.storage.clone()));

    // Assert
    assert!(reloaded.is_authenticated());
    assert_eq!(app.current_token().as_deref(), Some("refreshed-token-2b8e4d"));
    let logs = logs.contents();
    assert!(logs.contains("PROCESS_RESPONSE"), "nothing captured: {logs}");
    assert!(!logs.contains("login-token-7f3a9c"), "{logs}");
    assert!(!logs.contains("refreshed-token-2b8e4d"), "{logs}");
}
