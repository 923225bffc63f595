use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const BASE: &str = "http://fake.local";

#[derive(Default)]
struct BackendState {
    next_serial: u64,
    access_tokens: HashSet<String>,
    refresh_tokens: HashSet<String>,
    denied_paths: Vec<String>,
    fail_logout: bool,
    refresh_unreachable: bool,
    requests: Vec<HttpRequest>,
}

/// In-process stand-in for the auth service plus one protected resource.
///
/// Refresh tokens are single-use; access tokens stay valid until
/// [`FakeAuthBackend::expire_access_tokens`]. Protected paths live under
/// `/protected/` and honour `?status=` and `?delay_ms=` query parameters.
pub struct FakeAuthBackend {
    state: Mutex<BackendState>,
    refresh_calls: AtomicUsize,
    refresh_delay: Option<Duration>,
}

impl Default for FakeAuthBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAuthBackend {
    pub const EMAIL: &'static str = "fan@example.com";
    pub const PASSWORD: &'static str = "front-row";
    pub const USER_ID: i64 = 42;

    pub fn new() -> Self {
        Self {
            state: Mutex::new(BackendState::default()),
            refresh_calls: AtomicUsize::new(0),
            refresh_delay: None,
        }
    }

    /// Makes every refresh call take `delay`, widening the window in which
    /// concurrent requests can pile up behind it.
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    pub fn endpoints(&self) -> ServiceEndpoints {
        ServiceEndpoints {
            auth: format!("{BASE}/api/auth"),
            inventory: format!("{BASE}/api/inventory/events"),
            waiting_room: format!("{BASE}/waiting-room"),
            booking: format!("{BASE}/api/bookings"),
        }
    }

    pub fn protected(&self, name: &str) -> HttpRequest {
        HttpRequest::get(format!("{BASE}/protected/{name}"))
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issues a valid pair without going over the wire.
    pub fn issue_pair(&self) -> CredentialPair {
        let mut state = self.lock();
        state.next_serial += 1;
        let serial = state.next_serial;
        let pair = CredentialPair::new(format!("access-{serial}"), format!("refresh-{serial}"));
        state
            .access_tokens
            .insert(pair.access_token.expose().to_owned());
        state
            .refresh_tokens
            .insert(pair.refresh_token.expose().to_owned());
        pair
    }

    pub fn expire_access_tokens(&self) {
        self.lock().access_tokens.clear();
    }

    pub fn revoke_refresh_tokens(&self) {
        self.lock().refresh_tokens.clear();
    }

    /// Protected paths containing `fragment` answer 401 to every token.
    pub fn deny_path(&self, fragment: &str) {
        self.lock().denied_paths.push(fragment.to_owned());
    }

    pub fn fail_logout(&self) {
        self.lock().fail_logout = true;
    }

    /// The refresh endpoint stops answering; calls fail at the transport.
    pub fn drop_refresh_connections(&self) {
        self.lock().refresh_unreachable = true;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Every request received, in arrival order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    pub fn protected_requests(&self) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.contains("/protected/"))
            .collect()
    }

    fn auth_body(&self, pair: &CredentialPair, email: &str) -> String {
        json!({
            "token": pair.access_token.expose(),
            "refreshToken": pair.refresh_token.expose(),
            "tokenType": "Bearer",
            "userId": Self::USER_ID,
            "email": email,
            "name": "Front Row Fan",
            "expiresIn": 900,
        })
        .to_string()
    }

    fn login(&self, request: &HttpRequest) -> HttpResponse {
        let body = request.body.clone().unwrap_or_default();
        let matches = body["email"] == Self::EMAIL && body["password"] == Self::PASSWORD;
        if !matches {
            return HttpResponse::new(401, r#"{"message":"Invalid email or password"}"#);
        }
        HttpResponse::new(200, self.auth_body(&self.issue_pair(), Self::EMAIL))
    }

    fn signup(&self, request: &HttpRequest) -> HttpResponse {
        let body = request.body.clone().unwrap_or_default();
        let email = body["email"].as_str().unwrap_or_default();
        if email == Self::EMAIL {
            return HttpResponse::new(400, r#"{"message":"Email already registered"}"#);
        }
        HttpResponse::new(201, self.auth_body(&self.issue_pair(), email))
    }

    async fn refresh(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        if self.lock().refresh_unreachable {
            return Err(TransportError::Connect("auth service unreachable".to_owned()));
        }
        let presented = request
            .body
            .as_ref()
            .and_then(|b| b["refreshToken"].as_str())
            .unwrap_or_default()
            .to_owned();
        let consumed = self.lock().refresh_tokens.remove(&presented);
        if !consumed {
            return Ok(HttpResponse::new(401, r#"{"message":"Invalid refresh token"}"#));
        }
        Ok(HttpResponse::new(200, self.auth_body(&self.issue_pair(), Self::EMAIL)))
    }

    fn logout(&self) -> HttpResponse {
        if self.lock().fail_logout {
            return HttpResponse::new(500, "");
        }
        HttpResponse::new(200, r#"{"message":"Logged out successfully"}"#)
    }

    fn bearer_is_valid(&self, request: &HttpRequest) -> bool {
        let state = self.lock();
        request
            .bearer_token()
            .is_some_and(|t| state.access_tokens.contains(t))
    }

    fn logout_all(&self, request: &HttpRequest, user_id: &str) -> HttpResponse {
        if !self.bearer_is_valid(request) {
            return HttpResponse::new(401, r#"{"message":"Unauthorized"}"#);
        }
        if user_id != Self::USER_ID.to_string() {
            return HttpResponse::new(403, r#"{"message":"Forbidden"}"#);
        }
        let mut state = self.lock();
        state.access_tokens.clear();
        state.refresh_tokens.clear();
        HttpResponse::new(200, r#"{"message":"Logged out from all devices successfully"}"#)
    }

    fn validate_token(&self, request: &HttpRequest) -> HttpResponse {
        if !self.bearer_is_valid(request) {
            return HttpResponse::new(401, r#"{"message":"Unauthorized"}"#);
        }
        HttpResponse::new(200, json!({ "valid": true, "userId": Self::USER_ID }).to_string())
    }

    fn user(&self, request: &HttpRequest, user_id: &str) -> HttpResponse {
        if !self.bearer_is_valid(request) {
            return HttpResponse::new(401, r#"{"message":"Unauthorized"}"#);
        }
        if user_id != Self::USER_ID.to_string() {
            return HttpResponse::new(404, r#"{"message":"User not found"}"#);
        }
        let body = json!({
            "id": Self::USER_ID,
            "email": Self::EMAIL,
            "name": "Front Row Fan",
            "provider": "LOCAL",
            "isActive": true,
            "isEmailVerified": false,
            "createdAt": "2026-01-05T09:30:00",
        });
        HttpResponse::new(200, body.to_string())
    }

    async fn protected_resource(&self, request: &HttpRequest) -> HttpResponse {
        let (path, query) = request
            .url
            .split_once('?')
            .unwrap_or((request.url.as_str(), ""));
        let param = |name: &str| {
            query
                .split('&')
                .filter_map(|kv| kv.split_once('='))
                .find(|(k, _)| *k == name)
                .and_then(|(_, v)| v.parse::<u64>().ok())
        };

        let authorized = {
            let state = self.lock();
            let denied = state.denied_paths.iter().any(|d| path.contains(d.as_str()));
            let valid = request
                .bearer_token()
                .is_some_and(|t| state.access_tokens.contains(t));
            valid && !denied
        };

        if let Some(delay_ms) = param("delay_ms") {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if !authorized {
            return HttpResponse::new(401, r#"{"message":"Unauthorized"}"#);
        }
        let status = param("status").and_then(|s| u16::try_from(s).ok()).unwrap_or(200);
        HttpResponse::new(status, json!({ "path": path }).to_string())
    }
}

#[async_trait::async_trait]
impl HttpTransport for FakeAuthBackend {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.lock().requests.push(request.clone());

        let path = request.url.strip_prefix(BASE).unwrap_or(request.url.as_str());
        let response = match (request.method, path) {
            (Method::Post, "/api/auth/login") => self.login(request),
            (Method::Post, "/api/auth/signup") => self.signup(request),
            (Method::Post, "/api/auth/refresh-token") => self.refresh(request).await?,
            (Method::Post, "/api/auth/logout") => self.logout(),
            (Method::Get, "/api/auth/validate-token") => self.validate_token(request),
            (Method::Post, p) if p.starts_with("/api/auth/logout-all/") => {
                self.logout_all(request, &p["/api/auth/logout-all/".len()..])
            }
            (Method::Get, p) if p.starts_with("/api/auth/user/") => {
                self.user(request, &p["/api/auth/user/".len()..])
            }
            _ if path.starts_with("/protected/") => self.protected_resource(request).await,
            _ => HttpResponse::new(404, ""),
        };
        Ok(response)
    }
}
