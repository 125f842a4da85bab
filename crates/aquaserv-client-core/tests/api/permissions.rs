use crate::helpers::{spawn_app, PERMISSION_CUSTOMERS_READ, PERMISSION_USERS_MANAGE};
use aquaserv_shared::uac::{PermissionKey, PermissionOverrides, PermissionSet};

#[tokio::test]
async fn resolve_permissions_applies_overrides() {
    // Arrange
    let app = spawn_app().await;
    app.login_assert().await;
    app.backend.set_overrides(
        &app.test_user.id,
        PermissionOverrides {
            granted: vec!["reports.export"].into(),
            revoked: vec!["customers.write"].into(),
        },
    );

    // Act
    let actual = app.core_client.resolve_permissions().await;

    // Assert
    let expected: PermissionSet = vec![PERMISSION_CUSTOMERS_READ, "reports.export"].into();
    assert_eq!(actual, expected);
    assert_eq!(app.core_client.permissions(), expected);
    assert!(!app.core_client.has_permission("customers.write"));
}

#[tokio::test]
async fn resolve_permissions_failure_leaves_none() {
    // Arrange
    let app = spawn_app().await;
    app.login_assert().await;
    assert!(!app.core_client.permissions().is_empty());
    app.backend.set_fail_permissions(true);

    // Act
    let actual = app.core_client.resolve_permissions().await;

    // Assert
    assert!(actual.is_empty());
    assert!(app.core_client.permissions().is_empty());
    assert!(app.core_client.is_authenticated(), "session is kept");
}

#[tokio::test]
async fn admin_reads_user_permissions() {
    // Arrange
    let app = spawn_app().await;
    app.login_admin_assert().await;

    // Act
    let actual = app
        .core_client
        .get_user_permissions(&app.test_user.id)
        .await
        .unwrap();

    // Assert
    assert_eq!(actual.role_permissions, app.test_user.role_permissions);
    assert!(actual.overrides.is_empty());
    assert_eq!(actual.effective_permissions, app.test_user.role_permissions);
}

#[tokio::test]
async fn toggle_role_permission_revokes_then_restores() {
    // Arrange
    let app = spawn_app().await;
    app.login_admin_assert().await;
    let key = PermissionKey::from("customers.write");

    // Act - Turn off a permission the role grants
    let revoked = app
        .core_client
        .toggle_user_permission(&app.test_user.id, &key)
        .await
        .unwrap();

    // Assert
    assert!(!revoked.effective_permissions.contains_key(&key));
    assert!(revoked.overrides.revoked.contains_key(&key));
    assert!(revoked.overrides.granted.is_empty());

    // Act - Turn it back on
    let restored = app
        .core_client
        .toggle_user_permission(&app.test_user.id, &key)
        .await
        .unwrap();

    // Assert - back to what the role gives with nothing left over
    assert!(restored.effective_permissions.contains_key(&key));
    assert!(restored.overrides.is_empty());
    assert_eq!(
        app.backend.overrides(&app.test_user.id),
        Some(PermissionOverrides::default())
    );
}

#[tokio::test]
async fn toggle_extra_permission_grants_then_removes() {
    // Arrange
    let app = spawn_app().await;
    app.login_admin_assert().await;
    let key = PermissionKey::from("reports.export");

    // Act
    let granted = app
        .core_client
        .toggle_user_permission(&app.test_user.id, &key)
        .await
        .unwrap();
    let removed = app
        .core_client
        .toggle_user_permission(&app.test_user.id, &key)
        .await
        .unwrap();

    // Assert
    assert!(granted.effective_permissions.contains_key(&key));
    assert!(granted.overrides.granted.contains_key(&key));
    assert!(!removed.effective_permissions.contains_key(&key));
    assert!(removed.overrides.is_empty());
}

#[tokio::test]
async fn changing_own_permissions_reloads_them() {
    // Arrange
    let app = spawn_app().await;
    app.login_admin_assert().await;
    let key = PermissionKey::from("reports.export");
    assert!(!app.core_client.has_permission(key.as_str()));
    let calls_before = app.backend.permission_calls();

    // Act
    app.core_client
        .toggle_user_permission(&app.admin_user.id, &key)
        .await
        .unwrap();

    // Assert
    assert!(app.core_client.has_permission(key.as_str()));
    assert_eq!(app.backend.permission_calls(), calls_before + 1);
}

#[tokio::test]
async fn update_without_manage_permission_is_forbidden() {
    // Arrange
    let app = spawn_app().await;
    app.login_assert().await;
    assert!(!app.core_client.has_permission(PERMISSION_USERS_MANAGE));

    // Act
    let actual = app
        .core_client
        .update_user_permissions(&app.admin_user.id, &PermissionOverrides::default())
        .await
        .unwrap_err();

    // Assert
    assert_eq!(actual.status().map(|x| x.as_u16()), Some(403));
    assert_eq!(app.backend.refresh_calls(), 0);
}
