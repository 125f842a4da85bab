use crate::helpers::{get_customers, spawn_app};
use aquaserv_client_core::{AuthState, FileStorage, LoginOutcome, SessionStorage};
use aquaserv_shared::const_config::storage::{STORAGE_KEY_PERMISSIONS, STORAGE_KEY_USER};
use std::sync::Arc;

#[tokio::test]
async fn session_restored_from_shared_storage() {
    // Arrange
    let app = spawn_app().await;
    app.login_assert().await;

    // Act - Simulates a restart of the application
    let reloaded = app.new_client(Arc::new(app.storage.clone()));

    // Assert
    assert!(reloaded.is_authenticated());
    assert_eq!(reloaded.auth_state(), AuthState::LoggedIn);
    assert_eq!(reloaded.session(), app.core_client.session());
    let customers = get_customers(&reloaded).await.unwrap();
    assert_eq!(customers.len(), 2);
}

#[tokio::test]
async fn session_restored_from_file() {
    // Arrange
    let app = spawn_app().await;
    let path = std::env::temp_dir().join(format!("aquaserv-session-{}.json", uuid::Uuid::new_v4()));
    let client = app.new_client(Arc::new(FileStorage::new(&path)));
    client.login(&app.test_user.login_args()).await.unwrap();

    // Act
    let reloaded = app.new_client(Arc::new(FileStorage::new(&path)));

    // Assert
    assert_eq!(reloaded.user_info(), Some(app.test_user.user_info()));
    assert_eq!(reloaded.permissions(), app.test_user.role_permissions);
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn corrupt_stored_user_is_ignored() {
    // Arrange
    let app = spawn_app().await;
    app.login_assert().await;
    app.storage.set(STORAGE_KEY_USER, "{not json").unwrap();
    app.storage.set(STORAGE_KEY_PERMISSIONS, "42").unwrap();

    // Act
    let reloaded = app.new_client(Arc::new(app.storage.clone()));

    // Assert
    assert!(reloaded.is_authenticated());
    assert!(reloaded.user_info().is_none());
    assert!(reloaded.permissions().is_empty());
    assert_eq!(reloaded.user_id(), Some(app.test_user.id.clone()));
}

#[tokio::test]
async fn logout_removes_session_file_entries() {
    // Arrange
    let app = spawn_app().await;
    let path = std::env::temp_dir().join(format!("aquaserv-session-{}.json", uuid::Uuid::new_v4()));
    let storage = Arc::new(FileStorage::new(&path));
    let client = app.new_client(storage.clone());
    client.login(&app.test_user.login_args()).await.unwrap();

    // Act
    client.logout().await.unwrap();

    // Assert
    assert!(storage.get(STORAGE_KEY_USER).unwrap().is_none());
    let reloaded = app.new_client(Arc::new(FileStorage::new(&path)));
    assert!(!reloaded.is_authenticated());
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn login_succeeds_with_corrupt_session_file() {
    // Arrange
    let app = spawn_app().await;
    let path = std::env::temp_dir().join(format!("aquaserv-session-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, "{not json").unwrap();
    let client = app.new_client(Arc::new(FileStorage::new(&path)));
    assert!(!client.is_authenticated());

    // Act
    let outcome = client.login(&app.test_user.login_args()).await.unwrap();

    // Assert - The session lives in memory only and the client stays usable
    assert_eq!(outcome, LoginOutcome::Success);
    assert!(client.is_authenticated());
    assert_eq!(client.permissions(), app.test_user.role_permissions);
    assert_eq!(get_customers(&client).await.unwrap().len(), 2);
    client.logout().await.unwrap();
    assert!(!client.is_authenticated());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    let _ = std::fs::remove_file(path);
}
