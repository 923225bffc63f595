use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Calls the auth service's refresh endpoint directly on the transport, so
/// the stale access token is never attached and a 401 here is never
/// intercepted.
pub struct HttpRefreshExecutor {
    transport: Arc<dyn HttpTransport>,
    url: String,
}

impl HttpRefreshExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoints: &ServiceEndpoints) -> Self {
        Self {
            transport,
            url: endpoints.refresh_token(),
        }
    }
}

#[async_trait::async_trait]
impl RefreshTokens for HttpRefreshExecutor {
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<CredentialPair, RefreshError> {
        let request = HttpRequest::post(self.url.as_str())
            .json(json!({ "refreshToken": refresh_token.expose() }));
        let response = self.transport.execute(&request).await?;
        if !response.is_success() {
            debug!(status = response.status, "refresh endpoint rejected the token");
            return Err(RefreshError::Rejected {
                status: response.status,
                body: response.body,
            });
        }
        let body: AuthResponse = response
            .json()
            .map_err(|e| RefreshError::Decode(e.to_string()))?;
        Ok(body.credentials())
    }
}
