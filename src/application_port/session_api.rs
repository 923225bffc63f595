use crate::application_port::RefreshError;
use crate::domain_model::*;
use crate::domain_port::{StoreError, TransportError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// 401 from a credential-issuing endpoint. The session is left as it was.
    #[error("credentials rejected ({})", .0.status)]
    Unauthorized(HttpResponse),
    /// 401 that could not be recovered. The session has been torn down.
    #[error("session expired ({})", .0.status)]
    SessionExpired(HttpResponse),
    /// The refresh call failed. The session has been torn down.
    #[error("token refresh failed: {0}")]
    RefreshFailed(RefreshError),
    /// Non-2xx response surfaced by a typed API call.
    #[error("request failed with status {}", .0.status)]
    Status(HttpResponse),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl SessionError {
    /// True when the caller should send the user back through login.
    pub fn is_not_authenticated(&self) -> bool {
        matches!(
            self,
            SessionError::SessionExpired(_) | SessionError::RefreshFailed(_)
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            SessionError::Unauthorized(r)
            | SessionError::SessionExpired(r)
            | SessionError::Status(r) => Some(r.status),
            SessionError::RefreshFailed(RefreshError::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(error: serde_json::Error) -> Self {
        SessionError::Decode(error.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Body returned by login, signup and refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(alias = "accessToken")]
    pub token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl AuthResponse {
    pub fn credentials(&self) -> CredentialPair {
        CredentialPair::new(self.token.clone(), self.refresh_token.clone())
            .with_expiry(self.expires_in)
    }

    pub fn principal(&self) -> Option<Principal> {
        Some(Principal {
            id: self.user_id?,
            email: self.email.clone().unwrap_or_default(),
            name: self.name.clone(),
        })
    }
}

/// Account record from `GET {auth}/user/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_email_verified: Option<bool>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}

/// The composed session surface every request-issuing component goes through.
#[async_trait::async_trait]
pub trait SessionApi: Send + Sync {
    /// Sends a request with the current access token attached, refreshing and
    /// replaying once if the token turns out to be expired.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SessionError>;
    async fn login(&self, input: LoginInput) -> Result<AuthResponse, SessionError>;
    async fn signup(&self, input: SignupInput) -> Result<AuthResponse, SessionError>;
    /// Ends the session locally even if the remote logout call fails.
    async fn logout(&self) -> Result<(), SessionError>;
    fn state(&self) -> SessionState;
}
