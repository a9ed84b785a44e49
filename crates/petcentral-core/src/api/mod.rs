//! HTTP gateway to the PetCentral admin API.
//!
//! This module provides the `ApiClient` that every screen routes its calls
//! through. It attaches the stored bearer token to each request and turns a
//! 401 into a session eviction plus a redirect back to the login screen.

pub mod client;
pub mod error;
pub mod request;
pub mod resources;

pub use client::ApiClient;
pub use error::ApiError;
pub use request::{Method, MultipartBody, Payload, RequestConfig};
pub use resources::{AdminResource, ListQuery, ADMIN_API_PREFIX};
