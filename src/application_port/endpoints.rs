use crate::domain_model::UserId;

/// Path fragments that identify credential-issuing endpoints. A 401 from any
/// of these is a genuine rejection and never triggers a refresh.
pub const DEFAULT_AUTH_PATH_MARKERS: &[&str] = &[
    "/login",
    "/signup",
    "/verify-firebase-token",
    "/refresh-token",
];

/// Base URLs of the remote services.
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    pub auth: String,
    pub inventory: String,
    pub waiting_room: String,
    pub booking: String,
}

impl ServiceEndpoints {
    pub fn local() -> Self {
        Self {
            auth: "http://localhost:8081/api/auth".to_owned(),
            inventory: "http://localhost:8082/api/inventory/events".to_owned(),
            waiting_room: "http://localhost:8083/waiting-room".to_owned(),
            booking: "http://localhost:8084/api/bookings".to_owned(),
        }
    }

    pub fn login(&self) -> String {
        format!("{}/login", self.auth)
    }

    pub fn signup(&self) -> String {
        format!("{}/signup", self.auth)
    }

    pub fn refresh_token(&self) -> String {
        format!("{}/refresh-token", self.auth)
    }

    pub fn logout(&self) -> String {
        format!("{}/logout", self.auth)
    }

    pub fn logout_all(&self, user_id: UserId) -> String {
        format!("{}/logout-all/{}", self.auth, user_id)
    }

    pub fn validate_token(&self) -> String {
        format!("{}/validate-token", self.auth)
    }

    pub fn user(&self, user_id: UserId) -> String {
        format!("{}/user/{}", self.auth, user_id)
    }

    pub fn rate_limit(&self, email: &str) -> String {
        format!("{}/rate-limit/{}", self.auth, email)
    }

    pub fn login_history(&self, user_id: UserId) -> String {
        format!("{}/login-history/{}", self.auth, user_id)
    }

    pub fn active_sessions(&self, user_id: UserId) -> String {
        format!("{}/active-sessions/{}", self.auth, user_id)
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoints: ServiceEndpoints,
    pub auth_path_markers: Vec<String>,
}

impl SessionConfig {
    pub fn new(endpoints: ServiceEndpoints) -> Self {
        Self {
            endpoints,
            auth_path_markers: DEFAULT_AUTH_PATH_MARKERS
                .iter()
                .map(|m| (*m).to_owned())
                .collect(),
        }
    }

    pub fn is_credential_endpoint(&self, url: &str) -> bool {
        let path = strip_query(url);
        self.auth_path_markers.iter().any(|m| path.contains(m.as_str()))
    }
}

fn strip_query(url: &str) -> &str {
    url.split_once('?').map(|(p, _)| p).unwrap_or(url)
}
