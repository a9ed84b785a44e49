//! Authentication module for managing the admin session.
//!
//! This module provides:
//! - `KeyValueStore`: persistent slots (file, OS keychain or memory)
//! - `TokenStore`: the single bearer credential
//! - `SessionContext`: credential plus the one-shot redirect and banner
//! - `SessionController`: login, logout and the authenticated/login decision

pub mod context;
pub mod session;
pub mod store;
pub mod token;

pub use context::{SessionContext, AUTH_MESSAGE_KEY, NOT_LOGGED_IN_MESSAGE, REDIRECT_KEY};
pub use session::{FieldError, LoginError, LoginRequest, SessionController, View};
pub use store::{FileStore, KeyValueStore, KeyringStore, MemoryStore, StoreError};
pub use token::{TokenStore, TOKEN_KEY};
