//! Stand in for the AquaServ backend. Keeps everything in memory and exposes
//! switches and counters so tests can force the situations the client needs to
//! recover from

use actix_web::{
    body::MessageBody,
    cookie::Cookie,
    dev::{ServiceRequest, ServiceResponse},
    http::header::AUTHORIZATION,
    middleware::{from_fn, Next},
    web, App, HttpRequest, HttpResponse, HttpServer,
};
use anyhow::Context as _;
use aquaserv_shared::{
    id::UserId,
    req_args::{LoginReqArgs, RefreshReqArgs, RegisterReqArgs},
    token::AccessToken,
    uac::{
        AuthResponse, DisplayName, EffectivePermissionsResponse, ErrorResponse,
        PermissionOverrides, PermissionSet, RefreshResponse, UserInfo, UserPermissionsResponse,
    },
};
use secrecy::ExposeSecret as _;
use std::{
    collections::{HashMap, VecDeque},
    net::TcpListener,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};
use tracing::info;
use tracing_actix_web::TracingLogger;
use uuid::Uuid;

pub const REFRESH_COOKIE_NAME: &str = "refresh_session";
/// Permission needed to view or change another user's permissions
pub const PERMISSION_USERS_MANAGE: &str = "users.manage";
/// Permission needed for `GET /customers`
pub const PERMISSION_CUSTOMERS_READ: &str = "customers.read";

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: UserId,
    pub name: DisplayName,
    pub email: String,
    pub password: String,
    pub role: String,
    pub role_permissions: PermissionSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
}

#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<BackendState>,
    login_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    permission_calls: AtomicUsize,
    fail_refresh: AtomicBool,
    fail_permissions: AtomicBool,
    always_unauthorized: AtomicBool,
    refresh_delay_ms: AtomicU64,
    customers_delay_ms: AtomicU64,
}

#[derive(Debug, Default)]
struct BackendState {
    users: HashMap<UserId, StoredUser>,
    access_tokens: HashMap<String, UserId>,
    refresh_sessions: HashMap<String, UserId>,
    scripted_tokens: VecDeque<String>,
    request_log: Vec<RecordedRequest>,
}

#[derive(Debug)]
struct StoredUser {
    user: TestUser,
    overrides: PermissionOverrides,
}

impl TestUser {
    pub fn generate(role: &str, role_permissions: &[&str]) -> Self {
        let unique = &Uuid::new_v4().to_string()[..8];
        Self {
            id: format!("{role}-{unique}")
                .try_into()
                .expect("generated user id is valid"),
            name: format!("Test {role}")
                .try_into()
                .expect("generated name is valid"),
            email: format!("{role}-{unique}@example.com"),
            password: Uuid::new_v4().to_string(),
            role: role.to_string(),
            role_permissions: role_permissions.iter().copied().collect(),
        }
    }

    pub fn login_args(&self) -> LoginReqArgs {
        LoginReqArgs::new(self.email.clone(), self.password.clone().into())
    }

    pub fn user_info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
        }
    }
}

impl StoredUser {
    fn effective_permissions(&self) -> PermissionSet {
        self.overrides.effective(&self.user.role_permissions)
    }

    fn permissions_response(&self) -> UserPermissionsResponse {
        UserPermissionsResponse::new(self.user.role_permissions.clone(), self.overrides.clone())
    }
}

impl BackendState {
    fn issue_access_token(&mut self, user_id: &UserId) -> AccessToken {
        let token = self
            .scripted_tokens
            .pop_front()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.access_tokens.insert(token.clone(), user_id.clone());
        token.into()
    }

    fn find_by_email(&self, email: &str) -> Option<&StoredUser> {
        self.users.values().find(|x| x.user.email == email)
    }
}

impl MockBackend {
    pub fn add_user(&self, user: TestUser) {
        self.lock_state().users.insert(
            user.id.clone(),
            StoredUser {
                user,
                overrides: PermissionOverrides::default(),
            },
        );
    }

    /// Tokens handed out next, in order. Once used up tokens are random again
    pub fn script_tokens<I, S>(&self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock_state()
            .scripted_tokens
            .extend(tokens.into_iter().map(Into::into));
    }

    /// Every access token handed out so far stops working. Refresh sessions
    /// are kept so the client is able to recover
    pub fn expire_all_tokens(&self) {
        self.lock_state().access_tokens.clear();
    }

    pub fn is_token_valid(&self, token: &str) -> bool {
        self.lock_state().access_tokens.contains_key(token)
    }

    pub fn set_overrides(&self, user_id: &UserId, overrides: PermissionOverrides) {
        if let Some(stored) = self.lock_state().users.get_mut(user_id) {
            stored.overrides = overrides;
        }
    }

    pub fn overrides(&self, user_id: &UserId) -> Option<PermissionOverrides> {
        self.lock_state()
            .users
            .get(user_id)
            .map(|x| x.overrides.clone())
    }

    pub fn set_fail_refresh(&self, value: bool) {
        self.fail_refresh.store(value, Ordering::SeqCst);
    }

    pub fn set_fail_permissions(&self, value: bool) {
        self.fail_permissions.store(value, Ordering::SeqCst);
    }

    /// Protected routes reject every token, including freshly refreshed ones
    pub fn set_always_unauthorized(&self, value: bool) {
        self.always_unauthorized.store(value, Ordering::SeqCst);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.refresh_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Slows down the protected customers route to trigger client timeouts
    pub fn set_customers_delay(&self, delay: Duration) {
        self.customers_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn permission_calls(&self) -> usize {
        self.permission_calls.load(Ordering::SeqCst)
    }

    pub fn request_log(&self) -> Vec<RecordedRequest> {
        self.lock_state().request_log.clone()
    }

    /// Authorization headers sent to `path`, in the order received
    pub fn authorization_headers_for(&self, path: &str) -> Vec<Option<String>> {
        self.lock_state()
            .request_log
            .iter()
            .filter(|x| x.path == path)
            .map(|x| x.authorization.clone())
            .collect()
    }

    fn record(&self, path: &str, authorization: Option<String>) {
        self.lock_state().request_log.push(RecordedRequest {
            path: path.to_string(),
            authorization,
        });
    }

    fn authorized_user(&self, req: &HttpRequest) -> Option<UserId> {
        if self.always_unauthorized.load(Ordering::SeqCst) {
            return None;
        }
        let token = req
            .headers()
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?;
        self.lock_state().access_tokens.get(token).cloned()
    }

    /// Resolves the caller or gives the response to send back
    fn require_user(&self, req: &HttpRequest) -> Result<UserId, HttpResponse> {
        self.authorized_user(req)
            .ok_or_else(|| error_response(HttpResponse::Unauthorized(), "Unauthorized"))
    }

    fn require_permission(&self, user_id: &UserId, key: &str) -> Result<(), HttpResponse> {
        let has_permission = self
            .lock_state()
            .users
            .get(user_id)
            .is_some_and(|x| x.effective_permissions().contains(key));
        if has_permission {
            Ok(())
        } else {
            Err(error_response(
                HttpResponse::Forbidden(),
                &format!("Missing permission: {key}"),
            ))
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().expect("mock backend mutex poisoned")
    }
}

/// Starts the backend on a random local port and returns the port
pub fn start_mock_backend(backend: Arc<MockBackend>) -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("failed to bind random port")?;
    let port = listener
        .local_addr()
        .context("failed to get local address")?
        .port();
    let backend = web::Data::from(backend);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(from_fn(record_request))
            .wrap(TracingLogger::default())
            .app_data(backend.clone())
            .route("/auth/login", web::post().to(login))
            .route("/auth/register", web::post().to(register))
            .route("/auth/refresh", web::post().to(refresh))
            .route("/auth/logout", web::post().to(logout))
            .route("/users/me/permissions", web::get().to(my_permissions))
            .route("/users/{id}/permissions", web::get().to(user_permissions))
            .route("/users/{id}/permissions", web::put().to(update_user_permissions))
            .route("/customers", web::get().to(customers))
            .route("/health_check", web::get().to(health_check))
    })
    .workers(2)
    .listen(listener)
    .context("failed to listen on bound port")?
    .run();
    tokio::spawn(server);
    info!(port, "mock backend started");
    Ok(port)
}

async fn record_request(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    if let Some(backend) = req.app_data::<web::Data<MockBackend>>() {
        let authorization = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .map(str::to_string);
        backend.record(req.path(), authorization);
    }
    next.call(req).await
}

fn error_response(mut builder: actix_web::HttpResponseBuilder, message: &str) -> HttpResponse {
    builder.json(ErrorResponse {
        message: message.to_string(),
    })
}

fn refresh_cookie(value: String) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE_NAME, value)
        .path("/")
        .http_only(true)
        .finish()
}

/// Issues the access token and the refresh session for a successful sign in
fn start_session(backend: &MockBackend, user: UserInfo) -> HttpResponse {
    let session_id = Uuid::new_v4().to_string();
    let access_token = {
        let mut state = backend.lock_state();
        state
            .refresh_sessions
            .insert(session_id.clone(), user.id.clone());
        state.issue_access_token(&user.id)
    };
    HttpResponse::Ok()
        .cookie(refresh_cookie(session_id))
        .json(AuthResponse { access_token, user })
}

#[tracing::instrument(skip(backend))]
async fn login(
    backend: web::Data<MockBackend>,
    web::Json(req_args): web::Json<LoginReqArgs>,
) -> HttpResponse {
    backend.login_calls.fetch_add(1, Ordering::SeqCst);
    let user = backend
        .lock_state()
        .find_by_email(&req_args.email)
        .filter(|x| x.user.password == req_args.password.expose_secret())
        .map(|x| x.user.user_info());
    match user {
        Some(user) => start_session(&backend, user),
        None => error_response(HttpResponse::Unauthorized(), "Invalid email or password"),
    }
}

#[tracing::instrument(skip(backend))]
async fn register(
    backend: web::Data<MockBackend>,
    web::Json(req_args): web::Json<RegisterReqArgs>,
) -> HttpResponse {
    if backend.lock_state().find_by_email(&req_args.email).is_some() {
        return error_response(HttpResponse::Conflict(), "Email already registered");
    }
    let mut user = TestUser::generate("customer", &[PERMISSION_CUSTOMERS_READ]);
    user.name = req_args.name;
    user.email = req_args.email;
    user.password = req_args.password.expose_secret().to_string();
    let user_info = user.user_info();
    backend.add_user(user);
    start_session(&backend, user_info)
}

#[tracing::instrument(skip(backend, req))]
async fn refresh(
    backend: web::Data<MockBackend>,
    req: HttpRequest,
    web::Json(req_args): web::Json<RefreshReqArgs>,
) -> HttpResponse {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = backend.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if backend.fail_refresh.load(Ordering::SeqCst) {
        return error_response(HttpResponse::Unauthorized(), "Refresh session expired");
    }
    let Some(cookie) = req.cookie(REFRESH_COOKIE_NAME) else {
        return error_response(HttpResponse::Unauthorized(), "No refresh session");
    };
    let mut state = backend.lock_state();
    if state.refresh_sessions.get(cookie.value()) != Some(&req_args.user_id) {
        return error_response(HttpResponse::Unauthorized(), "Refresh session not valid");
    }
    let access_token = state.issue_access_token(&req_args.user_id);
    HttpResponse::Ok().json(RefreshResponse { access_token })
}

#[tracing::instrument(skip(backend, req))]
async fn logout(backend: web::Data<MockBackend>, req: HttpRequest) -> HttpResponse {
    backend.logout_calls.fetch_add(1, Ordering::SeqCst);
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|x| x.to_str().ok())
        .and_then(|x| x.strip_prefix("Bearer "))
        .map(str::to_string);
    let mut state = backend.lock_state();
    if let Some(token) = token {
        state.access_tokens.remove(&token);
    }
    if let Some(cookie) = req.cookie(REFRESH_COOKIE_NAME) {
        state.refresh_sessions.remove(cookie.value());
    }
    let mut removal = refresh_cookie(String::new());
    removal.make_removal();
    HttpResponse::Ok().cookie(removal).finish()
}

#[tracing::instrument(skip(backend, req))]
async fn my_permissions(backend: web::Data<MockBackend>, req: HttpRequest) -> HttpResponse {
    backend.permission_calls.fetch_add(1, Ordering::SeqCst);
    let user_id = match backend.require_user(&req) {
        Ok(x) => x,
        Err(response) => return response,
    };
    if backend.fail_permissions.load(Ordering::SeqCst) {
        return error_response(HttpResponse::InternalServerError(), "Permissions unavailable");
    }
    let effective_permissions = backend
        .lock_state()
        .users
        .get(&user_id)
        .map(StoredUser::effective_permissions)
        .unwrap_or_default();
    HttpResponse::Ok().json(EffectivePermissionsResponse {
        effective_permissions,
    })
}

/// Caller must be signed in and allowed to manage users
fn check_user_management(
    backend: &MockBackend,
    req: &HttpRequest,
    target: &str,
) -> Result<UserId, HttpResponse> {
    let caller = backend.require_user(req)?;
    backend.require_permission(&caller, PERMISSION_USERS_MANAGE)?;
    UserId::try_from(target)
        .map_err(|e| error_response(HttpResponse::BadRequest(), &e.to_string()))
}

#[tracing::instrument(skip(backend, req))]
async fn user_permissions(
    backend: web::Data<MockBackend>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    let target = match check_user_management(&backend, &req, &path) {
        Ok(x) => x,
        Err(response) => return response,
    };
    match backend.lock_state().users.get(&target) {
        Some(stored) => HttpResponse::Ok().json(stored.permissions_response()),
        None => error_response(HttpResponse::NotFound(), "User not found"),
    }
}

#[tracing::instrument(skip(backend, req))]
async fn update_user_permissions(
    backend: web::Data<MockBackend>,
    req: HttpRequest,
    path: web::Path<String>,
    web::Json(overrides): web::Json<PermissionOverrides>,
) -> HttpResponse {
    let target = match check_user_management(&backend, &req, &path) {
        Ok(x) => x,
        Err(response) => return response,
    };
    if !overrides.is_consistent() {
        return error_response(
            HttpResponse::BadRequest(),
            "A permission cannot be both granted and revoked",
        );
    }
    let mut state = backend.lock_state();
    match state.users.get_mut(&target) {
        Some(stored) => {
            stored.overrides = overrides;
            HttpResponse::Ok().json(stored.permissions_response())
        }
        None => error_response(HttpResponse::NotFound(), "User not found"),
    }
}

#[tracing::instrument(skip(backend, req))]
async fn customers(backend: web::Data<MockBackend>, req: HttpRequest) -> HttpResponse {
    let delay = backend.customers_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let check = backend.require_user(&req).and_then(|user_id| {
        backend.require_permission(&user_id, PERMISSION_CUSTOMERS_READ)
    });
    if let Err(response) = check {
        return response;
    }
    HttpResponse::Ok().json(serde_json::json!([
        { "id": 1, "name": "Blue Lagoon Pools" },
        { "id": 2, "name": "Coral Reef Aquatics" },
    ]))
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}
