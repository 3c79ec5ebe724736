//! Authentication Abstraction
//!
//! The core never performs sign-in itself; it only asks the host who the
//! current user is before talking to the remote store.

use async_trait::async_trait;
use std::fmt;

use crate::error::Result;

/// Authenticated user identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    /// Bearer token for the remote store
    pub token: String,
    /// Stable user identifier; remote payloads are keyed by it
    pub user_id: String,
}

impl Identity {
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Source of the current user's identity.
///
/// Returns `Ok(None)` when nobody is signed in; the sync engine treats that
/// as an authentication failure for the attempt.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn get_identity(&self) -> Result<Option<Identity>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_debug_redacts_token() {
        let identity = Identity::new("secret-token", "user-1");
        let debug = format!("{:?}", identity);
        assert!(debug.contains("REDACTED"));
        assert!(debug.contains("user-1"));
        assert!(!debug.contains("secret-token"));
    }
}
