//! Session credential storage.
//!
//! The bearer token lives in storage owned by the auth collaborator; the
//! fetch client only reads it and, on a 401, evicts it. The trait keeps the
//! session an explicit capability so tests can inject fakes.

use std::sync::Arc;
use std::sync::RwLock;

use tracing::debug;

/// Read/evict access to the session credential.
pub trait SessionStore: Send + Sync {
    /// Current bearer token, if a session exists.
    fn token(&self) -> Option<String>;

    /// Store a new bearer token.
    fn set_token(&self, token: &str);

    /// Remove the credential (session teardown).
    fn clear(&self);
}

/// Single in-memory credential store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    token: RwLock<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor with a token already present.
    pub fn with_token(token: &str) -> Self {
        let store = Self::new();
        store.set_token(token);
        store
    }
}

impl SessionStore for MemorySessionStore {
    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    fn set_token(&self, token: &str) {
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token.to_string());
        }
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }
    }
}

/// Credential store pair: one durable across restarts, one scoped to the
/// current tab/window.
///
/// Reads prefer the durable store. `clear` evicts from both, which is the
/// 401 contract: after a rejected credential no copy may survive.
pub struct LayeredSessionStore {
    durable: Arc<dyn SessionStore>,
    scoped: Arc<dyn SessionStore>,
}

impl LayeredSessionStore {
    pub fn new(durable: Arc<dyn SessionStore>, scoped: Arc<dyn SessionStore>) -> Self {
        Self { durable, scoped }
    }

    /// Store the token in the tab-scoped backend only (non-"remember me"
    /// logins).
    pub fn set_scoped_token(&self, token: &str) {
        self.scoped.set_token(token);
    }
}

impl SessionStore for LayeredSessionStore {
    fn token(&self) -> Option<String> {
        self.durable.token().or_else(|| self.scoped.token())
    }

    fn set_token(&self, token: &str) {
        self.durable.set_token(token);
    }

    fn clear(&self) {
        debug!("clearing session credential from both stores");
        self.durable.clear();
        self.scoped.clear();
    }
}
