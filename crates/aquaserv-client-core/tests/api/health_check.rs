use crate::helpers::spawn_app;

#[tokio::test]
async fn health_check_works() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let actual = app.core_client.health_check().await;

    // Assert
    assert!(actual.is_ok(), "{actual:?}");
    assert!(!app.core_client.is_authenticated());
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    // Arrange
    let app = spawn_app().await;
    let client = aquaserv_test_helper::build_client(
        "http://127.0.0.1:1",
        std::sync::Arc::new(aquaserv_client_core::MemoryStorage::new()),
    );

    // Act
    let actual = client.health_check().await.unwrap_err();

    // Assert
    assert!(actual.is_network(), "{actual:?}");
    assert_eq!(app.backend.request_log().len(), 0);
}
