use std::fmt::Display;

use reqwest::Method;

/// A fixed backend route. Routes with an id in them are built at runtime
/// instead, see [`super::user_permissions_path`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSpec {
    pub method: Method,
    pub path: &'static str,
}

impl PathSpec {
    const fn new(method: Method, path: &'static str) -> Self {
        Self { method, path }
    }

    pub const fn get(path: &'static str) -> Self {
        Self::new(Method::GET, path)
    }

    pub const fn post(path: &'static str) -> Self {
        Self::new(Method::POST, path)
    }

    /// Auth routes are called without an access token and a 401 from them is
    /// final
    pub fn is_auth_exempt(&self) -> bool {
        super::is_auth_exempt(self.path)
    }
}

impl Display for PathSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
