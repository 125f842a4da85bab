use crate::helpers::{bearer, get_customers, record_events, spawn_app};
use aquaserv_client_core::{AuthState, SessionEvent};

#[tokio::test]
async fn login_logout_round_trip() {
    // Arrange
    let app = spawn_app().await;
    assert!(
        !app.core_client.is_authenticated(),
        "should not be logged in before logging in"
    );
    app.login_assert().await;
    let token = app.current_token().unwrap();
    let events = record_events(&app.core_client);

    // Act
    let actual = app.core_client.logout().await;

    // Assert
    assert!(actual.is_ok(), "{actual:?}");
    assert!(!app.core_client.is_authenticated());
    assert_eq!(app.core_client.auth_state(), AuthState::LoggedOut);
    assert!(app.core_client.user_info().is_none());
    assert!(app.core_client.permissions().is_empty());
    assert!(app.storage.is_empty(), "{:?}", app.storage.keys());
    assert_eq!(app.backend.logout_calls(), 1);
    assert_eq!(
        app.backend.authorization_headers_for("/auth/logout"),
        vec![bearer(&token)]
    );
    assert!(!app.backend.is_token_valid(&token));
    assert_eq!(*events.lock().unwrap(), vec![SessionEvent::LoggedOut]);
}

#[tokio::test]
async fn logout_clears_local_state_even_if_server_rejects() {
    // Arrange
    let app = spawn_app().await;
    app.login_assert().await;
    app.backend.expire_all_tokens();
    app.backend.set_always_unauthorized(true);

    // Act
    let _ = app.core_client.logout().await;

    // Assert
    assert!(!app.core_client.is_authenticated());
    assert!(app.storage.is_empty(), "{:?}", app.storage.keys());
    assert_eq!(app.backend.refresh_calls(), 0, "logout is never recovered");
    assert_eq!(app.core_client.auth_state(), AuthState::LoggedOut);
}

#[tokio::test]
async fn logout_without_session_skips_server() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let actual = app.core_client.logout().await;

    // Assert
    assert!(actual.is_ok(), "{actual:?}");
    assert_eq!(app.backend.logout_calls(), 0);
}

#[tokio::test]
async fn calls_after_logout_do_not_refresh() {
    // Arrange
    let app = spawn_app().await;
    app.login_assert().await;
    app.core_client.logout().await.unwrap();

    // Act
    let actual = get_customers(&app.core_client).await.unwrap_err();

    // Assert
    assert!(actual.is_session_expired(), "{actual:?}");
    assert_eq!(app.backend.refresh_calls(), 0);
}
