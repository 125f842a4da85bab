use aquaserv_shared::uac::ErrorResponse;
use reqwest::StatusCode;

/// Ways a call to the backend can fail
///
/// A 401 on a normal call never reaches the caller as [`ClientError::Http`],
/// it is either recovered from or reported as [`ClientError::SessionExpired`]
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No response was received (includes timeouts)
    #[error("unable to reach the server")]
    Network(#[source] reqwest::Error),

    #[error("{}", http_error_message(status, body))]
    Http { status: StatusCode, body: String },

    /// The session could not be recovered and has been cleared
    #[error("your session has expired, please sign in again")]
    SessionExpired,

    /// The response body was not what was expected
    #[error("unexpected response from the server: {0}")]
    Decode(String),

    #[error("failed to encode request body")]
    Encode(#[source] serde_json::Error),
}

impl ClientError {
    /// Returns `true` if the client error is [`SessionExpired`].
    ///
    /// [`SessionExpired`]: ClientError::SessionExpired
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if the client error is [`Network`].
    ///
    /// [`Network`]: ClientError::Network
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(..))
    }

    /// The status code if a response was received
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Prefers the `message` the backend sent, then the raw body, then the status
fn http_error_message(status: &StatusCode, body: &str) -> String {
    if let Ok(ErrorResponse { message }) = serde_json::from_str(body) {
        return message;
    }
    if body.trim().is_empty() {
        format!("request failed with status code: {status} and no body")
    } else {
        body.to_string()
    }
}
