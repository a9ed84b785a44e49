//! Core library for the PetCentral admin console.
//!
//! The console's screens are thin CRUD views. What they share lives here:
//!
//! - `auth`: persistent session slots, the token store, and the session
//!   controller that handles login/logout
//! - `api`: the HTTP gateway every request goes through, which attaches the
//!   bearer token and turns a 401 into a redirect to the login screen
//! - `probe`: polling of the health endpoint that gates the dashboard
//! - `navigation`: routes and the navigator the gateway redirects through
//! - `config`: on-disk configuration with environment overrides

pub mod api;
pub mod auth;
pub mod config;
pub mod navigation;
pub mod probe;

pub use api::{ApiClient, ApiError};
pub use auth::{LoginError, LoginRequest, SessionContext, SessionController, View};
pub use config::Config;
pub use navigation::{HistoryNavigator, Navigator, Route};
pub use probe::{AvailabilityProber, HealthCheck, ProbePolicy, ProbeState};
