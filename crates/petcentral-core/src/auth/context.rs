//! Shared session slots: credential, pending redirect and auth message.
//!
//! `SessionContext` is created once and handed to both the API gateway and
//! the session controller. Only the gateway's 401 handling and the
//! controller (login, logout, deferred login) write to it.

use std::sync::Arc;

use tracing::warn;

use super::store::{KeyValueStore, StoreError};
use super::token::TokenStore;

/// Storage key for the location to restore after the next login
pub const REDIRECT_KEY: &str = "redirectAfterLogin";

/// Storage key for the one-shot login banner
pub const AUTH_MESSAGE_KEY: &str = "authMessage";

/// Banner shown after the gateway evicts an expired credential
pub const NOT_LOGGED_IN_MESSAGE: &str = "You are not logged in";

#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn KeyValueStore>,
    tokens: TokenStore,
}

impl SessionContext {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            tokens: TokenStore::new(store.clone()),
            store,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Shortcut for `tokens().get()`
    pub fn token(&self) -> Option<String> {
        self.tokens.get()
    }

    /// Peek at the pending redirect without consuming it
    pub fn pending_redirect(&self) -> Option<String> {
        self.read(REDIRECT_KEY)
    }

    /// Consume the pending redirect. A second call returns `None`.
    pub fn take_pending_redirect(&self) -> Result<Option<String>, StoreError> {
        let redirect = self.store.get(REDIRECT_KEY)?;
        if redirect.is_some() {
            self.store.remove(REDIRECT_KEY)?;
        }
        Ok(redirect.filter(|r| !r.is_empty()))
    }

    /// Peek at the auth message without consuming it
    pub fn auth_message(&self) -> Option<String> {
        self.read(AUTH_MESSAGE_KEY)
    }

    /// Read-then-clear the login banner.
    pub fn take_auth_message(&self) -> Option<String> {
        let message = self.read(AUTH_MESSAGE_KEY)?;
        if let Err(e) = self.store.remove(AUTH_MESSAGE_KEY) {
            warn!(error = %e, "Failed to clear auth message");
        }
        Some(message)
    }

    /// Record where to land after the next login. Leaves the credential and
    /// the banner alone.
    pub fn set_pending_redirect(&self, location: &str) -> Result<(), StoreError> {
        self.store.set(REDIRECT_KEY, location)
    }

    /// Drop the credential after an authorization failure.
    ///
    /// Records `location` as the pending redirect (overwriting any stale one)
    /// and queues the "not logged in" banner.
    pub fn evict(&self, location: &str) -> Result<(), StoreError> {
        self.tokens.clear()?;
        self.store.set(REDIRECT_KEY, location)?;
        self.store.set(AUTH_MESSAGE_KEY, NOT_LOGGED_IN_MESSAGE)
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read session value");
                None
            }
        }
    }
}
