use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// A 401 on a non-login call. The credential has already been evicted and
    /// the navigator sent to `redirect`, which now shows the login screen.
    #[error("Session expired - log in again to continue at {redirect}")]
    SessionExpired { redirect: String },

    #[error("HTTP {status}: {summary}")]
    Status {
        status: StatusCode,
        /// Server-provided message (`message` or `title` in a JSON body)
        message: Option<String>,
        /// The server message, or the truncated raw body when there is none
        summary: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull a human-readable message out of an error body.
    fn server_message(body: &str) -> Option<String> {
        let json: Value = serde_json::from_str(body).ok()?;
        ["message", "title"]
            .iter()
            .filter_map(|key| json.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|m| !m.is_empty())
            .map(str::to_string)
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::server_message(body);
        let summary = message
            .clone()
            .unwrap_or_else(|| Self::truncate_body(body));
        ApiError::Status {
            status,
            message,
            summary,
        }
    }

    /// HTTP status of the failure, when the server answered
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::SessionExpired { .. } => Some(StatusCode::UNAUTHORIZED),
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Server-provided message, if any
    pub fn server_provided_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired { .. })
    }
}
