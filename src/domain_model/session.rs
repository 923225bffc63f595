use crate::domain_model::*;

/// In-memory view of the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub credentials: Option<CredentialPair>,
    pub principal: Option<Principal>,
}

impl SessionState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn authenticated(credentials: CredentialPair, principal: Option<Principal>) -> Self {
        Self {
            credentials: Some(credentials),
            principal,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        self.credentials.as_ref().map(|c| &c.access_token)
    }

    pub fn refresh_token(&self) -> Option<&RefreshToken> {
        self.credentials.as_ref().map(|c| &c.refresh_token)
    }
}
