use anyhow::Context as _;
use aquaserv_shared::{
    const_config::path::PATH_HEALTH_CHECK,
    id::UserId,
    token::AccessToken,
    uac::{PermissionSet, UserInfo},
};
use credentials::{AuthState, CredentialStore, Session};
use recovery::SharedRefresh;
use request::{ApiRequest, ApiResponse};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::info;

use crate::{ClientConfig, ClientError, MemoryStorage, SessionStorage};

pub mod api;
pub mod credentials;
mod recovery;
pub mod request;

#[derive(Debug, Clone)]
pub struct Client {
    api_client: reqwest::Client,
    inner: Arc<Mutex<ClientInner>>,
}

/// Held by work stored inside [`ClientInner`] so it does not own itself
#[derive(Debug, Clone)]
struct WeakClient {
    api_client: reqwest::Client,
    inner: Weak<Mutex<ClientInner>>,
}

impl WeakClient {
    fn upgrade(&self) -> Option<Client> {
        Some(Client {
            api_client: self.api_client.clone(),
            inner: self.inner.upgrade()?,
        })
    }
}

struct ClientInner {
    server_address: String,
    credentials: CredentialStore,
    auth_state: AuthState,
    /// Set while a refresh is outstanding so concurrent callers share it
    refresh_in_flight: Option<SharedRefresh>,
    session_listener: Option<Arc<dyn Fn(SessionEvent) + Send + Sync>>,
}

#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    /// Logged in but the permissions could not be loaded so none are granted
    SuccessWithoutPermissions,
}

/// Notifications about changes to the session that the UI may want to react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    LoggedOut,
    TokenRefreshed,
    /// The session could not be recovered and was cleared. The UI is expected
    /// to send the user back to the login screen
    SessionExpired,
}

pub trait SessionListener: Fn(SessionEvent) + Send + Sync + 'static {}
impl<T> SessionListener for T where T: Fn(SessionEvent) + Send + Sync + 'static {}

impl LoginOutcome {
    /// Returns `true` if the login outcome is [`Success`].
    ///
    /// [`Success`]: LoginOutcome::Success
    #[must_use]
    pub fn is_permissions_loaded(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl ClientInner {
    #[tracing::instrument(skip(storage))]
    fn new(server_address: String, storage: Arc<dyn SessionStorage>) -> Self {
        let credentials = CredentialStore::load(storage);
        let auth_state = if credentials.session().is_authenticated() {
            AuthState::LoggedIn
        } else {
            AuthState::LoggedOut
        };
        Self {
            server_address,
            credentials,
            auth_state,
            refresh_in_flight: None,
            session_listener: None,
        }
    }

    /// Any refresh still running belongs to the old session so it is dropped too
    fn clear_session(&mut self) {
        self.credentials.clear();
        self.refresh_in_flight = None;
    }
}

impl Client {
    /// Restores any session found in `storage`, no network call is made
    #[tracing::instrument(name = "NEW CLIENT-CORE")]
    pub fn new(config: &ClientConfig, storage: Arc<dyn SessionStorage>) -> anyhow::Result<Self> {
        let api_client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout())
            .build()
            .context("unable to create reqwest client")?;
        let server_address = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            api_client,
            inner: Arc::new(Mutex::new(ClientInner::new(server_address, storage))),
        })
    }

    /// Client that does not persist the session anywhere
    pub fn new_in_memory<S: Into<String>>(server_address: S) -> anyhow::Result<Self> {
        Self::new(
            &ClientConfig::new(server_address),
            Arc::new(MemoryStorage::new()),
        )
    }

    /// Replaces any previously registered listener
    pub fn set_session_listener<F: SessionListener>(&self, listener: F) {
        self.lock_inner().session_listener = Some(Arc::new(listener));
    }

    /// Sends the request and returns the response if it was successful
    ///
    /// The access token is attached unless the path is one of the auth
    /// endpoints. If the session has expired it is refreshed and the request
    /// replayed once
    #[tracing::instrument(skip(self))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let response = self.execute(request).await?;
        process_response(response).await
    }

    /// Same as [`Self::send`] but decodes the body as JSON
    pub async fn send_json<U>(&self, request: ApiRequest) -> Result<U, ClientError>
    where
        U: Debug + serde::de::DeserializeOwned,
    {
        self.send(request).await?.json()
    }

    /// Same as [`Self::send`] but ignores any body returned
    pub async fn send_empty(&self, request: ApiRequest) -> Result<(), ClientError> {
        self.send(request).await.map(|_| ())
    }

    #[tracing::instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), ClientError> {
        self.send_empty(PATH_HEALTH_CHECK.into()).await
    }

    /// Transmits the request once with the token given (if any)
    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&AccessToken>,
    ) -> Result<reqwest::Response, ClientError> {
        transmit(&self.api_client, self.path_to_url(request.path()), request, token).await
    }

    #[tracing::instrument(ret, skip(self))]
    fn path_to_url(&self, path: &str) -> String {
        format!("{}{path}", &self.lock_inner().server_address)
    }

    /// Epoch and token to use for the next attempt of a call
    fn current_credentials(&self) -> (u64, Option<AccessToken>) {
        let guard = self.lock_inner();
        (
            guard.credentials.epoch(),
            guard.credentials.session().access_token.clone(),
        )
    }

    /// Handle that does not keep the session state alive
    fn downgrade(&self) -> WeakClient {
        WeakClient {
            api_client: self.api_client.clone(),
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, ClientInner> {
        self.inner.lock().expect("client-core mutex poisoned")
    }

    /// Calls the listener without holding the lock so it is free to use the
    /// client
    fn notify(&self, event: SessionEvent) {
        let listener = self.lock_inner().session_listener.clone();
        info!(?event, "session event");
        if let Some(listener) = listener {
            listener(event);
        }
    }

    fn set_auth_state(&self, state: AuthState) {
        self.lock_inner().auth_state = state;
    }

    pub fn session(&self) -> Session {
        self.lock_inner().credentials.session().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock_inner().credentials.session().is_authenticated()
    }

    pub fn auth_state(&self) -> AuthState {
        self.lock_inner().auth_state
    }

    pub fn user_info(&self) -> Option<UserInfo> {
        self.lock_inner().credentials.session().user.clone()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.lock_inner().credentials.session().user_id.clone()
    }

    pub fn permissions(&self) -> PermissionSet {
        self.lock_inner().credentials.session().permissions.clone()
    }

    pub fn has_permission(&self, key: &str) -> bool {
        self.lock_inner()
            .credentials
            .session()
            .permissions
            .contains(key)
    }
}

impl Debug for ClientInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientInner")
            .field("server_address", &self.server_address)
            .field("credentials", &self.credentials)
            .field("auth_state", &self.auth_state)
            .field("refresh_in_flight", &self.refresh_in_flight.is_some())
            .field("has_session_listener", &self.session_listener.is_some())
            .finish()
    }
}

/// Sends the request once. A single place for every outgoing call
///
/// The token is left off for the auth endpoints
#[tracing::instrument(skip(api_client, token), fields(has_token))]
async fn transmit(
    api_client: &reqwest::Client,
    url: String,
    request: &ApiRequest,
    token: Option<&AccessToken>,
) -> Result<reqwest::Response, ClientError> {
    let mut builder = api_client.request(request.method().clone(), url);
    if !request.query_pairs().is_empty() {
        builder = builder.query(request.query_pairs());
    }
    if let Some(body) = request.body() {
        builder = builder.json(body);
    }
    if let Some(timeout) = request.timeout_override() {
        builder = builder.timeout(timeout);
    }
    let token = token.filter(|t| !t.is_empty() && !request.is_auth_exempt());
    tracing::Span::current().record("has_token", token.is_some());
    if let Some(token) = token {
        builder = builder.header(reqwest::header::AUTHORIZATION, token.bearer_header_value());
    }
    builder.send().await.map_err(|e| {
        info!("Request failed to send: {e:#?}");
        ClientError::Network(e)
    })
}

/// Reads the body and sorts the response into success or [`ClientError::Http`]
///
/// Bodies of successful responses may hold tokens so only the status is traced
#[tracing::instrument(skip(response), fields(status = %response.status()), err(Debug))]
async fn process_response(response: reqwest::Response) -> Result<ApiResponse, ClientError> {
    let status = response.status();
    let body = response.text().await.map_err(ClientError::Network)?;
    if status.is_success() {
        Ok(ApiResponse { status, body })
    } else {
        Err(ClientError::Http { status, body })
    }
}
