#![warn(unused_crate_dependencies)]

use aquaserv_client_core::{
    Client, ClientConfig, ClientError, LoginOutcome, MemoryStorage, SessionEvent, SessionStorage,
};
use aquaserv_shared::telemetry;
use std::fmt::Debug;
use std::ops::Deref;
use std::sync::{Arc, LazyLock, Mutex};
use uuid::Uuid;

mod mock_backend;

pub use mock_backend::{
    start_mock_backend, MockBackend, RecordedRequest, TestUser, PERMISSION_CUSTOMERS_READ,
    PERMISSION_USERS_MANAGE, REFRESH_COOKIE_NAME,
};

// Ensure that the `tracing` stack is only initialised once
pub static TRACING: LazyLock<String> = LazyLock::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let log_name = format!("client_tests{}", Uuid::new_v4());
        let path = telemetry::start_file_tracing(&log_name, "info").unwrap();
        format!("Traces for tests being written to: {path:?}")
    } else {
        let subscriber = telemetry::get_subscriber("test", "info", std::io::sink);
        telemetry::init_subscriber(subscriber).unwrap();
        "Traces set to std::io::sink".to_string()
    }
});

pub struct TestApp {
    pub address: String,
    pub backend: Arc<MockBackend>,
    pub test_user: TestUser,
    pub admin_user: TestUser,
    /// What `core_client` persists its session to
    pub storage: MemoryStorage,
    pub core_client: Client,
}

impl Debug for TestApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestApp")
            .field("address", &self.address)
            .field("test_user", &self.test_user)
            .field("admin_user", &self.admin_user)
            .finish()
    }
}

/// Empty function for use when a call back isn't needed
pub fn no_cb(_: SessionEvent) {}

pub fn port_to_test_address(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

/// Starts a fresh backend seeded with a staff user and an admin then builds a
/// client for it that is not logged in
pub async fn spawn_app() -> TestApp {
    start_tracing();
    let backend = Arc::new(MockBackend::default());
    let test_user = TestUser::generate("staff", &[PERMISSION_CUSTOMERS_READ, "customers.write"]);
    let admin_user = TestUser::generate(
        "admin",
        &[PERMISSION_CUSTOMERS_READ, PERMISSION_USERS_MANAGE],
    );
    backend.add_user(test_user.clone());
    backend.add_user(admin_user.clone());
    let port = start_mock_backend(Arc::clone(&backend)).expect("failed to start mock backend");
    let address = port_to_test_address(port);
    let storage = MemoryStorage::new();
    let core_client = build_client(&address, Arc::new(storage.clone()));
    TestApp {
        address,
        backend,
        test_user,
        admin_user,
        storage,
        core_client,
    }
}

pub fn build_client(address: &str, storage: Arc<dyn SessionStorage>) -> Client {
    Client::new(&ClientConfig::new(address), storage).expect("failed to build client")
}

impl TestApp {
    pub async fn login(&self) -> Result<LoginOutcome, ClientError> {
        self.core_client.login(&self.test_user.login_args()).await
    }

    pub async fn login_assert(&self) {
        let outcome = self.login().await.expect("login failed");
        assert_eq!(outcome, LoginOutcome::Success);
    }

    pub async fn login_admin_assert(&self) {
        let outcome = self
            .core_client
            .login(&self.admin_user.login_args())
            .await
            .expect("admin login failed");
        assert_eq!(outcome, LoginOutcome::Success);
    }

    /// Another client talking to the same backend with its own session
    pub fn new_client(&self, storage: Arc<dyn SessionStorage>) -> Client {
        build_client(&self.address, storage)
    }

    pub fn current_token(&self) -> Option<String> {
        self.core_client
            .session()
            .access_token
            .map(|x| x.expose().to_string())
    }
}

/// Collects every event the client emits
pub fn record_events(client: &Client) -> Arc<Mutex<Vec<SessionEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    client.set_session_listener(move |event| {
        sink.lock().expect("events mutex poisoned").push(event);
    });
    events
}

fn start_tracing() {
    // Accessing TRACING also forces the LazyLock to initialize
    let logging_msg = TRACING.deref();
    println!("{logging_msg}");
}
