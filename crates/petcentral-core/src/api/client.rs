//! API client for the PetCentral admin REST API.
//!
//! Every call the console makes goes through `ApiClient::request`, which
//! wraps the transport call in two steps:
//!
//! - before send: attach `Authorization: Bearer <token>` when a credential exists
//! - after receive: on a 401 from anything but the login endpoint, evict the
//!   credential, remember where the user was and send them back there (which
//!   now renders the login screen); map every other failure to `ApiError`
//!
//! There is no retry and no queuing. Each call is independent.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::auth::SessionContext;
use crate::config::Config;
use crate::navigation::{split_location, Navigator};
use crate::probe::HealthCheck;

use super::request::{Method, Payload, RequestConfig};
use super::ApiError;

/// Unversioned login route from before `/api/auth/login`.
/// Still treated as a login call so its 401s are not intercepted.
const LEGACY_LOGIN_PATH: &str = "/login";

/// API client for the admin backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    login_path: String,
    health_path: String,
    context: SessionContext,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    /// Create a client bound to `config.api_base_url`.
    pub fn new(
        config: &Config,
        context: SessionContext,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let base_url = config.api_base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::InvalidRequest(format!(
                "Unsupported API base URL: {}",
                config.api_base_url
            )));
        }

        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            base_url,
            login_path: normalize_path(&config.login_path),
            health_path: normalize_path(&config.health_path),
            context,
            navigator,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, normalize_path(path))
    }

    /// Whether `path` addresses the login endpoint (current or legacy route)
    pub fn is_login_path(&self, path: &str) -> bool {
        let (path, _) = split_location(path);
        let path = normalize_path(path);
        let path = path.trim_end_matches('/');
        path == self.login_path.trim_end_matches('/') || path == LEGACY_LOGIN_PATH
    }

    // ===== Request pipeline =====

    /// Headers for an outgoing call. The bearer token is inserted last so
    /// caller-supplied headers cannot replace it.
    fn outgoing_headers(&self, config: Option<&RequestConfig>) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();

        if let Some(config) = config {
            for (name, value) in &config.headers {
                let name = header::HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| ApiError::InvalidRequest(format!("Invalid header name: {}", name)))?;
                let value = header::HeaderValue::from_str(value)
                    .map_err(|_| ApiError::InvalidRequest(format!("Invalid value for header {}", name)))?;
                headers.insert(name, value);
            }
        }

        if let Some(token) = self.context.token() {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                ApiError::InvalidRequest("Stored token is not a valid header value".to_string())
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// Inspect a response before the caller sees it.
    async fn intercept_response(&self, path: &str, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED && !self.is_login_path(path) {
            return Err(self.expire_session(path));
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }

    fn expire_session(&self, path: &str) -> ApiError {
        let location = self.navigator.current_location();
        warn!(path = path, redirect = %location, "Unauthorized - clearing session");

        if let Err(e) = self.context.evict(&location) {
            error!(error = %e, "Failed to record session eviction");
        }
        self.navigator.navigate(&location);

        ApiError::SessionExpired { redirect: location }
    }

    async fn decode_body(response: Response) -> Result<Value, ApiError> {
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(_) => String::from_utf8(bytes.to_vec())
                .map(Value::String)
                .map_err(|_| ApiError::InvalidResponse("Body is neither JSON nor text".to_string())),
        }
    }

    /// Issue a request and return the decoded body of a 2xx response.
    ///
    /// JSON payloads are sent as `application/json`, multipart payloads as
    /// `multipart/form-data`. A non-JSON text body comes back as a JSON
    /// string and an empty body as `null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        payload: Option<Payload>,
        config: Option<&RequestConfig>,
    ) -> Result<Value, ApiError> {
        let url = self.url(path);
        let mut builder = self
            .client
            .request(method.into(), &url)
            .headers(self.outgoing_headers(config)?);

        if let Some(config) = config.filter(|c| !c.query.is_empty()) {
            builder = builder.query(&config.query);
        }

        builder = match payload {
            Some(Payload::Json(body)) => builder.json(&body),
            Some(Payload::Multipart(body)) => {
                debug!(fields = ?body.field_names(), "Attaching multipart form");
                builder.multipart(body.into_form()?)
            }
            None => builder,
        };

        debug!(method = method.as_str(), path = path, "Sending request");
        let response = builder.send().await.map_err(|e| {
            warn!(method = method.as_str(), path = path, error = %e, "Request failed");
            ApiError::Network(e)
        })?;
        debug!(
            method = method.as_str(),
            path = path,
            status = response.status().as_u16(),
            "Received response"
        );

        let response = self.intercept_response(path, response).await?;
        Self::decode_body(response).await
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::Get, path, None, None).await
    }

    pub async fn get_with(&self, path: &str, config: &RequestConfig) -> Result<Value, ApiError> {
        self.request(Method::Get, path, None, Some(config)).await
    }

    /// GET and deserialize into `T`
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        config: Option<&RequestConfig>,
    ) -> Result<T, ApiError> {
        let value = self.request(Method::Get, path, None, config).await?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e)))
    }

    pub async fn post(&self, path: &str, payload: impl Into<Payload>) -> Result<Value, ApiError> {
        self.request(Method::Post, path, Some(payload.into()), None).await
    }

    pub async fn put(&self, path: &str, payload: impl Into<Payload>) -> Result<Value, ApiError> {
        self.request(Method::Put, path, Some(payload.into()), None).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::Delete, path, None, None).await
    }

    // ===== Health =====

    /// Unauthenticated reachability check against the health path.
    ///
    /// Bypasses the request pipeline: no token is sent and a 401 here never
    /// touches the session.
    pub async fn ping(&self) -> bool {
        let url = self.url(&self.health_path);
        match self.client.get(&url).send().await {
            Ok(response) => {
                let status = response.status();
                debug!(status = status.as_u16(), "Health check response");
                status.is_success()
            }
            Err(e) => {
                debug!(error = %e, "Health check failed");
                false
            }
        }
    }
}

impl HealthCheck for ApiClient {
    fn check(&self) -> BoxFuture<'_, bool> {
        Box::pin(self.ping())
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

// ============================================================================
// Tests
// ============================================================================
