//! Login, logout and the authenticated/login decision.

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::navigation::Route;

use super::context::SessionContext;
use super::store::StoreError;

/// Where a successful login lands when nothing was pending
pub const DEFAULT_LANDING_PATH: &str = "/";

/// Where logout sends the user
pub const LOGGED_OUT_PATH: &str = "/login";

/// Shown when the server rejects a login without saying why
const LOGIN_FAILED_MESSAGE: &str = "Login failed";

/// Shown when a 2xx login response carries no token
const UNEXPECTED_RESPONSE_MESSAGE: &str = "Unexpected response from server";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("{}", describe_field_errors(.0))]
    Invalid(Vec<FieldError>),

    /// The server refused the login or could not be reached
    #[error("{0}")]
    Rejected(String),

    #[error("Failed to save session: {0}")]
    Storage(#[from] StoreError),
}

fn describe_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Email/password pair posted to the login endpoint
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Form checks done before anything is sent
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.email.is_empty() {
            errors.push(FieldError {
                field: "email",
                message: "Email is required",
            });
        } else if !looks_like_email(&self.email) {
            errors.push(FieldError {
                field: "email",
                message: "Invalid email address",
            });
        }
        if self.password.is_empty() {
            errors.push(FieldError {
                field: "password",
                message: "Password is required",
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// `local@domain.tld` with no whitespace and exactly one `@`
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Token from a login response: `data.token` first, then top-level `token`.
fn extract_token(body: &Value) -> Option<String> {
    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    };
    non_empty(body.get("data").and_then(|d| d.get("token"))).or_else(|| non_empty(body.get("token")))
}

/// What the application should render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Sidebar shell showing the given screen
    Shell(Route),
    Login,
    /// Reachable with or without a session
    ServerDown,
}

/// Owns the credential lifecycle. The session is authenticated exactly when
/// the token store holds a credential; nothing else is cached.
#[derive(Clone)]
pub struct SessionController {
    client: ApiClient,
}

impl SessionController {
    pub fn new(client: ApiClient) -> Self {
        let controller = Self { client };
        if controller.is_authenticated() {
            info!("Restored stored session");
        } else {
            debug!("No stored session");
        }
        controller
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    fn context(&self) -> &SessionContext {
        self.client.context()
    }

    pub fn is_authenticated(&self) -> bool {
        self.context().tokens().is_present()
    }

    /// Decide what to render for the navigator's current location
    pub fn view(&self) -> View {
        let route = Route::from_location(&self.client.navigator().current_location());
        match route {
            Route::ServerDown => View::ServerDown,
            route if route.is_public() => View::Login,
            route if self.is_authenticated() => View::Shell(route),
            _ => View::Login,
        }
    }

    /// Send an unauthenticated user to the login screen, resuming at
    /// `location` once they log in. No banner is queued: nothing expired.
    pub fn defer_to_login(&self, location: &str) -> Result<(), StoreError> {
        self.context().set_pending_redirect(location)?;
        debug!(redirect = %location, "Login required");
        self.client.navigator().navigate(LOGGED_OUT_PATH);
        Ok(())
    }

    /// The one-shot banner for the login screen
    pub fn take_auth_message(&self) -> Option<String> {
        self.context().take_auth_message()
    }

    /// Log in and navigate to the pending redirect or the dashboard.
    ///
    /// Returns the location navigated to. On failure nothing stored changes.
    pub async fn login(&self, request: &LoginRequest) -> Result<String, LoginError> {
        request.validate().map_err(LoginError::Invalid)?;

        let body = json!({ "email": request.email, "password": request.password });
        let response = self
            .client
            .post(self.client.login_path(), body)
            .await
            .map_err(|e| {
                warn!(error = %e, "Login failed");
                LoginError::Rejected(login_failure_message(&e))
            })?;

        let token = extract_token(&response)
            .ok_or_else(|| LoginError::Rejected(UNEXPECTED_RESPONSE_MESSAGE.to_string()))?;
        self.context().tokens().set(&token)?;

        let target = match self.context().take_pending_redirect() {
            Ok(Some(redirect)) => redirect,
            Ok(None) => DEFAULT_LANDING_PATH.to_string(),
            Err(e) => {
                warn!(error = %e, "Failed to read pending redirect");
                DEFAULT_LANDING_PATH.to_string()
            }
        };

        info!(redirect = %target, "Logged in");
        self.client.navigator().navigate(&target);
        Ok(target)
    }

    /// Drop the credential locally and show the login screen. No network call.
    pub fn logout(&self) -> Result<(), StoreError> {
        self.context().tokens().clear()?;
        info!("Logged out");
        self.client.navigator().navigate(LOGGED_OUT_PATH);
        Ok(())
    }
}

fn login_failure_message(error: &ApiError) -> String {
    error
        .server_provided_message()
        .unwrap_or(LOGIN_FAILED_MESSAGE)
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================
