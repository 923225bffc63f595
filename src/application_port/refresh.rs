use crate::domain_model::*;
use crate::domain_port::TransportError;

/// Outcome of a failed refresh. Cloned once per waiter when the single
/// in-flight refresh settles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token available")]
    MissingRefreshToken,
    #[error("refresh rejected with status {status}")]
    Rejected { status: u16, body: String },
    #[error("refresh transport error: {0}")]
    Transport(String),
    #[error("refresh response malformed: {0}")]
    Decode(String),
    #[error("refresh abandoned before completion")]
    Abandoned,
}

impl From<TransportError> for RefreshError {
    fn from(error: TransportError) -> Self {
        RefreshError::Transport(error.to_string())
    }
}

/// Exchanges a refresh token for a new credential pair with exactly one
/// network call.
#[async_trait::async_trait]
pub trait RefreshTokens: Send + Sync {
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<CredentialPair, RefreshError>;
}
