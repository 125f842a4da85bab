use std::{fmt::Debug, time::Duration};

use aquaserv_shared::const_config::path::{is_auth_exempt, PathSpec};
use reqwest::{Method, StatusCode};

use crate::ClientError;

/// Describes one call to the backend, relative to the server address
#[derive(Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    query: Vec<(String, String)>,
    timeout: Option<Duration>,
}

/// A successful (2xx) response with the body already read
#[derive(Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Wraps a request for the length of one logical call so that it is only ever
/// replayed once after a session recovery
#[derive(Debug)]
pub(crate) struct PendingCall {
    request: ApiRequest,
    retried: bool,
}

impl ApiRequest {
    pub fn new<P: Into<String>>(method: Method, path: P) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: Vec::new(),
            timeout: None,
        }
    }

    pub fn get<P: Into<String>>(path: P) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post<P: Into<String>>(path: P) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put<P: Into<String>>(path: P) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete<P: Into<String>>(path: P) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serializes `body` as the JSON body of the request
    pub fn json<T: serde::Serialize + ?Sized>(self, body: &T) -> Result<Self, ClientError> {
        let value = serde_json::to_value(body).map_err(ClientError::Encode)?;
        Ok(self.json_value(value))
    }

    pub fn json_value(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Overrides the timeout set on the client for this request only
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub(crate) fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub(crate) fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    /// Login, registration and refresh go out without a bearer token and are
    /// never retried
    pub fn is_auth_exempt(&self) -> bool {
        is_auth_exempt(&self.path)
    }
}

impl From<PathSpec> for ApiRequest {
    fn from(value: PathSpec) -> Self {
        Self::new(value.method, value.path)
    }
}

impl Debug for ApiRequest {
    // WARNING: The body is not printed as it may contain credentials
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("has_body", &self.body.is_some())
            .field("query", &self.query)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Debug for ApiResponse {
    // WARNING: The body is not printed as it may contain tokens
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiResponse")
            .field("status", &self.status)
            .field("body_len", &self.body.len())
            .finish()
    }
}

impl ApiResponse {
    /// Decodes the body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_str(&self.body).map_err(|e| {
            tracing::error!(?e, "failed to decode response body");
            ClientError::Decode(e.to_string())
        })
    }
}

impl PendingCall {
    pub(crate) fn new(request: ApiRequest) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    pub(crate) fn request(&self) -> &ApiRequest {
        &self.request
    }

    pub(crate) fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        debug_assert!(!self.retried, "a call may only be replayed once");
        self.retried = true;
    }
}
