use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::store::{KeyValueStore, StoreError};

/// Storage key for the bearer token
pub const TOKEN_KEY: &str = "token";

/// Holds the single bearer credential for this session.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Get the stored token. Read failures are logged and reported as no token.
    pub fn get(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                None
            }
        }
    }

    /// Persist a token, replacing any previous one
    pub fn set(&self, token: &str) -> Result<(), StoreError> {
        self.store.set(TOKEN_KEY, token)
    }

    /// Remove the token. Redirect and message slots are untouched.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(TOKEN_KEY)
    }

    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }

    /// When the current token was written, if the backend tracks it
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        if !self.is_present() {
            return None;
        }
        self.store.updated_at(TOKEN_KEY).ok().flatten()
    }
}
