//! Bearer credential resolution.
//!
//! The transport asks a [`TokenSource`] for the current credential each time
//! it sends a request. [`TokenHolder`] is the mutable implementation shared
//! between whoever edits the token (the console) and the transport.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Resolves the bearer token to attach to an outgoing request.
pub trait TokenSource: Send + Sync {
    /// The current token, or `None` to send the request unauthenticated.
    fn current_token(&self) -> Option<String>;
}

impl TokenSource for Option<String> {
    fn current_token(&self) -> Option<String> {
        self.clone().filter(|t| !t.is_empty())
    }
}

impl TokenSource for String {
    fn current_token(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.clone())
    }
}

/// Shared, settable bearer token.
///
/// Clones share the same slot. Writes are last-write-wins; a request reads
/// the slot once when it is sent, so a `set` never affects requests that are
/// already in flight.
#[derive(Clone, Default)]
pub struct TokenHolder {
    inner: Arc<RwLock<Option<String>>>,
}

impl TokenHolder {
    /// Create an empty holder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a holder pre-populated with `token` (empty means none).
    pub fn with_token(token: Option<String>) -> Self {
        let holder = Self::new();
        if let Some(token) = token {
            holder.set(token);
        }
        holder
    }

    /// Current token, if any.
    pub fn get(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the token. Empty or whitespace-only input clears it.
    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        let next = (!token.trim().is_empty()).then_some(token);
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Remove the token.
    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Whether a token is currently set.
    pub fn is_set(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl TokenSource for TokenHolder {
    fn current_token(&self) -> Option<String> {
        self.get()
    }
}

impl fmt::Debug for TokenHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenHolder")
            .field("token", &if self.is_set() { "<set>" } else { "<none>" })
            .finish()
    }
}
