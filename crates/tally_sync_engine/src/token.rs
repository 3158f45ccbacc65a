//! Access token contract.

use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fmt;

/// Secure token storage consumed by the engine and the HTTP client.
///
/// Storage mechanics (keychain, keystore, encrypted file) belong to the host.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns true if a usable access token is present.
    async fn has_valid_token(&self) -> bool;

    /// Returns the current access token.
    async fn access_token(&self) -> Option<String>;

    /// Obtains a fresh access token after the server rejected the current one.
    ///
    /// Returns true if a new token is available. The default cannot refresh.
    async fn refresh(&self) -> Result<bool> {
        Ok(false)
    }
}

/// A token store holding a fixed token.
#[derive(Default)]
pub struct StaticTokenStore {
    token: RwLock<Option<String>>,
}

impl StaticTokenStore {
    /// Creates a store; blank tokens count as absent.
    pub fn new(token: Option<String>) -> Self {
        let store = Self::default();
        if let Some(token) = token {
            store.set(token);
        }
        store
    }

    /// Replaces the token.
    pub fn set(&self, token: impl Into<String>) {
        let token = token.into().trim().to_string();
        *self.token.write() = (!token.is_empty()).then_some(token);
    }

    /// Removes the token.
    pub fn clear(&self) {
        *self.token.write() = None;
    }
}

impl fmt::Debug for StaticTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = self.token.read().as_ref().map(|_| "[REDACTED]");
        f.debug_struct("StaticTokenStore")
            .field("token", &token)
            .finish()
    }
}

#[async_trait]
impl TokenStore for StaticTokenStore {
    async fn has_valid_token(&self) -> bool {
        self.token.read().is_some()
    }

    async fn access_token(&self) -> Option<String> {
        self.token.read().clone()
    }
}
