//! Static Identity Provider

use async_trait::async_trait;
use bridge_traits::{
    auth::{AuthProvider, Identity},
    error::Result,
};
use parking_lot::RwLock;

/// Identity provider holding a single signed-in user.
///
/// Desktop shells call [`set_identity`](Self::set_identity) after their own
/// sign-in flow completes and [`clear`](Self::clear) on sign-out.
#[derive(Default)]
pub struct StaticAuthProvider {
    identity: RwLock<Option<Identity>>,
}

impl StaticAuthProvider {
    pub fn new(identity: Option<Identity>) -> Self {
        Self {
            identity: RwLock::new(identity),
        }
    }

    pub fn signed_in(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(Some(Identity::new(token, user_id)))
    }

    pub fn set_identity(&self, identity: Identity) {
        *self.identity.write() = Some(identity);
    }

    pub fn clear(&self) {
        *self.identity.write() = None;
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn get_identity(&self) -> Result<Option<Identity>> {
        Ok(self.identity.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let provider = StaticAuthProvider::default();
        assert!(provider.get_identity().await.unwrap().is_none());

        provider.set_identity(Identity::new("token", "user-1"));
        let identity = provider.get_identity().await.unwrap().unwrap();
        assert_eq!(identity.user_id, "user-1");

        provider.clear();
        assert!(provider.get_identity().await.unwrap().is_none());
    }
}
