use crate::api::*;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    pub is_locked_out: bool,
    pub remaining_attempts: i32,
    pub max_attempts: i32,
    pub lockout_remaining_seconds: i64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRecord {
    pub id: i64,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default)]
    pub operating_system: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub logged_in_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub suspicious: Option<bool>,
    #[serde(default)]
    pub suspicious_reason: Option<String>,
}

/// One live refresh token on the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub id: i64,
    #[serde(default)]
    pub device_info: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub expires_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub is_current: Option<bool>,
}

/// Account security views served by the auth service.
pub struct AccountApi {
    session: Arc<dyn SessionApi>,
    endpoints: ServiceEndpoints,
}

impl AccountApi {
    pub fn new(session: Arc<dyn SessionApi>, endpoints: &ServiceEndpoints) -> Self {
        Self {
            session,
            endpoints: endpoints.clone(),
        }
    }

    pub async fn rate_limit_info(&self, email: &str) -> Result<RateLimitInfo, SessionError> {
        let request = HttpRequest::get(self.endpoints.rate_limit(email));
        fetch_json(self.session.as_ref(), request).await
    }

    pub async fn login_history(&self, user_id: UserId) -> Result<Vec<LoginRecord>, SessionError> {
        let request = HttpRequest::get(self.endpoints.login_history(user_id));
        fetch_json(self.session.as_ref(), request).await
    }

    pub async fn active_sessions(&self, user_id: UserId) -> Result<Vec<ActiveSession>, SessionError> {
        let request = HttpRequest::get(self.endpoints.active_sessions(user_id));
        fetch_json(self.session.as_ref(), request).await
    }
}
