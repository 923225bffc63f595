use crate::domain_model::*;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const PRINCIPAL_KEY: &str = "principal";

/// Persistent holder of the session's credentials and principal.
///
/// Values are opaque to the store. A pair where either token is missing is
/// reported as absent.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load_credentials(&self) -> Result<Option<CredentialPair>, StoreError>;
    async fn save_credentials(&self, pair: &CredentialPair) -> Result<(), StoreError>;
    async fn load_principal(&self) -> Result<Option<Principal>, StoreError>;
    async fn save_principal(&self, principal: &Principal) -> Result<(), StoreError>;
    /// Removes access token, refresh token and principal together.
    async fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("corrupt value under {key}: {reason}")]
    Corrupt { key: &'static str, reason: String },
}
