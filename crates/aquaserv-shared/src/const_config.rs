//! Stores settings that are not expected to need to change but grouped together
//! for discoverability and reuse. Each constant should be prefixed by the module
//! name to allow importing the constant only and still be readable

pub mod client {
    use std::time::Duration;

    pub const CLIENT_DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Applied to every call unless the configuration or the individual
    /// request says otherwise
    pub const CLIENT_DEFAULT_REQUEST_TIMEOUT: Duration =
        Duration::from_secs(CLIENT_DEFAULT_REQUEST_TIMEOUT_SECS);
}

/// Keys used to persist the session. Each is read and written on its own but
/// they are always cleared together
pub mod storage {
    pub const STORAGE_KEY_ACCESS_TOKEN: &str = "access_token";
    pub const STORAGE_KEY_USER: &str = "user";
    pub const STORAGE_KEY_PERMISSIONS: &str = "permissions";
    pub const STORAGE_KEY_USER_ID: &str = "user_id";

    pub const STORAGE_ALL_KEYS: [&str; 4] = [
        STORAGE_KEY_ACCESS_TOKEN,
        STORAGE_KEY_USER,
        STORAGE_KEY_PERMISSIONS,
        STORAGE_KEY_USER_ID,
    ];
}

pub mod path {
    mod path_spec;
    use crate::id::UserId;
    pub use path_spec::PathSpec;

    const AUTH_LOGIN: &str = "/auth/login";
    const AUTH_REFRESH: &str = "/auth/refresh";
    const AUTH_REGISTER: &str = "/auth/register";

    pub const PATH_AUTH_LOGIN: PathSpec = PathSpec::post(AUTH_LOGIN);
    pub const PATH_AUTH_LOGOUT: PathSpec = PathSpec::post("/auth/logout");
    pub const PATH_AUTH_REFRESH: PathSpec = PathSpec::post(AUTH_REFRESH);
    pub const PATH_AUTH_REGISTER: PathSpec = PathSpec::post(AUTH_REGISTER);
    pub const PATH_HEALTH_CHECK: PathSpec = PathSpec::get("/health_check");
    pub const PATH_USERS_ME_PERMISSIONS: PathSpec = PathSpec::get("/users/me/permissions");
    pub const PATH_USERS_PREFIX: &str = "/users";

    /// Calls to these paths never carry the bearer token and a 401 from them is
    /// returned to the caller as is
    pub const PATH_AUTH_EXEMPT: [&str; 3] = [AUTH_LOGIN, AUTH_REGISTER, AUTH_REFRESH];

    /// Ignores any query string and trailing slash
    pub fn is_auth_exempt(path: &str) -> bool {
        let path = path.split('?').next().unwrap_or_default();
        let path = path.trim_end_matches('/');
        PATH_AUTH_EXEMPT.contains(&path)
    }

    /// Path used to view or edit the permission overrides of a single user
    pub fn user_permissions_path(user_id: &UserId) -> String {
        format!("{PATH_USERS_PREFIX}/{user_id}/permissions")
    }
}
