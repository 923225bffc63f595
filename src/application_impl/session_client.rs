use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{Instrument, debug, info, info_span, warn};

/// Owned session object: attaches credentials, refreshes them at most once
/// concurrently, and replays requests that failed on an expired token.
pub struct SessionClient {
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn RefreshTokens>,
    coordinator: RefreshCoordinator,
    config: SessionConfig,
    state: RwLock<SessionState>,
    /// Bumped by every login, restore and teardown. A refresh only installs
    /// its pair into the generation it started from.
    epoch: AtomicU64,
    /// Serialises writes to store and state.
    writes: tokio::sync::Mutex<()>,
}

impl SessionClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn CredentialStore>,
        config: SessionConfig,
    ) -> Self {
        let refresher = Arc::new(HttpRefreshExecutor::new(
            transport.clone(),
            &config.endpoints,
        ));
        Self::with_refresher(transport, store, refresher, config)
    }

    pub fn with_refresher(
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn RefreshTokens>,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            store,
            refresher,
            coordinator: RefreshCoordinator::new(),
            config,
            state: RwLock::new(SessionState::empty()),
            epoch: AtomicU64::new(0),
            writes: tokio::sync::Mutex::new(()),
        }
    }

    /// Builds a client and rehydrates the session from the store.
    pub async fn restore(
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn CredentialStore>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let client = Self::new(transport, store, config);
        client.rehydrate().await?;
        Ok(client)
    }

    pub async fn rehydrate(&self) -> Result<(), SessionError> {
        let _writes = self.writes.lock().await;
        let restored = match self.store.load_credentials().await? {
            Some(pair) => SessionState::authenticated(pair, self.store.load_principal().await?),
            None => SessionState::empty(),
        };
        info!(
            authenticated = restored.is_authenticated(),
            "session rehydrated from store"
        );
        self.begin_epoch(restored);
        Ok(())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state(SessionState::is_authenticated)
    }

    pub fn principal(&self) -> Option<Principal> {
        self.read_state(|s| s.principal.clone())
    }

    fn read_state<T>(&self, f: impl FnOnce(&SessionState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn replace_state(&self, next: SessionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Starts a new session generation. Caller holds `writes`.
    fn begin_epoch(&self, next: SessionState) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.replace_state(next);
    }

    fn current_access_token(&self) -> Option<AccessToken> {
        self.read_state(|s| s.access_token().cloned())
    }

    fn has_refresh_token(&self) -> bool {
        self.read_state(|s| s.refresh_token().is_some())
    }

    async fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse, SessionError> {
        let mut attempt = Attempt::FIRST;
        let mut replay_token: Option<AccessToken> = None;
        loop {
            let epoch = self.epoch();
            let token = replay_token.take().or_else(|| self.current_access_token());
            let outbound = decorate(&request, token.as_ref());
            let response = self.transport.execute(&outbound).await?;

            match classify(
                &self.config,
                &outbound,
                &response,
                attempt,
                self.has_refresh_token(),
            ) {
                Disposition::PassThrough => return Ok(response),
                Disposition::Reject => return Err(SessionError::Unauthorized(response)),
                Disposition::Teardown => {
                    warn!(
                        attempt = attempt.count(),
                        "request unauthorized and unrecoverable, ending session"
                    );
                    self.teardown_from(epoch).await;
                    return Err(SessionError::SessionExpired(response));
                }
                Disposition::Refresh => {
                    let fresh = self
                        .token_for_replay(token.as_ref())
                        .await
                        .map_err(SessionError::RefreshFailed)?;
                    debug!(attempt = attempt.count(), "replaying with refreshed token");
                    replay_token = Some(fresh);
                    attempt = attempt.next();
                }
            }
        }
    }

    /// Token to replay a 401'd request with. If the session already moved
    /// past the token the request was sent with, that newer token is used
    /// without another refresh.
    async fn token_for_replay(
        &self,
        sent_with: Option<&AccessToken>,
    ) -> Result<AccessToken, RefreshError> {
        if let Some(current) = self.current_access_token() {
            if sent_with != Some(&current) {
                debug!("access token changed since the request was sent");
                return Ok(current);
            }
        }
        self.coordinator.run(|| self.perform_refresh()).await
    }

    /// Runs only in the coordinator's owning caller.
    async fn perform_refresh(&self) -> Result<AccessToken, RefreshError> {
        let epoch = self.epoch();
        let Some(refresh_token) = self.read_state(|s| s.refresh_token().cloned()) else {
            self.teardown_from(epoch).await;
            return Err(RefreshError::MissingRefreshToken);
        };

        let outcome = self.refresher.refresh(&refresh_token).await;

        let _writes = self.writes.lock().await;
        if self.epoch() != epoch {
            info!("session ended or replaced during refresh, discarding outcome");
            return Err(RefreshError::Abandoned);
        }
        match outcome {
            Ok(pair) => {
                let access_token = pair.access_token.clone();
                if let Err(e) = self.store.save_credentials(&pair).await {
                    warn!(error = %e, "refreshed credentials could not be persisted");
                }
                let principal = self.principal();
                self.replace_state(SessionState::authenticated(pair, principal));
                info!("token refresh succeeded");
                Ok(access_token)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, ending session");
                self.clear_session().await;
                Err(e)
            }
        }
    }

    /// Clears store and in-memory state together.
    async fn teardown(&self) {
        let _writes = self.writes.lock().await;
        self.clear_session().await;
    }

    /// Tears down only if no login, restore or teardown happened since `epoch`.
    async fn teardown_from(&self, epoch: u64) {
        let _writes = self.writes.lock().await;
        if self.epoch() == epoch {
            self.clear_session().await;
        } else {
            debug!("session already replaced, skipping teardown");
        }
    }

    /// Caller holds `writes`.
    async fn clear_session(&self) {
        self.begin_epoch(SessionState::empty());
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "credential store could not be cleared");
        }
    }

    async fn establish(&self, response: &AuthResponse) -> Result<(), SessionError> {
        let pair = response.credentials();
        let principal = response.principal();
        let _writes = self.writes.lock().await;
        self.store.clear().await?;
        self.store.save_credentials(&pair).await?;
        if let Some(principal) = &principal {
            self.store.save_principal(principal).await?;
        }
        self.begin_epoch(SessionState::authenticated(pair, principal));
        Ok(())
    }

    /// Credential-issuing call: plain transport, no bearer, no interception.
    async fn issue(&self, request: HttpRequest) -> Result<AuthResponse, SessionError> {
        let response = self.transport.execute(&request).await?;
        if response.is_unauthorized() {
            return Err(SessionError::Unauthorized(response));
        }
        if !response.is_success() {
            return Err(SessionError::Status(response));
        }
        let body: AuthResponse = response.json()?;
        self.establish(&body).await?;
        Ok(body)
    }

    /// Revokes every session of `user_id` on the auth service.
    pub async fn logout_all(&self, user_id: UserId) -> Result<(), SessionError> {
        let response = self
            .send(HttpRequest::post(self.config.endpoints.logout_all(user_id)))
            .await?;
        if !response.is_success() {
            return Err(SessionError::Status(response));
        }
        self.teardown().await;
        Ok(())
    }

    /// Asks the auth service whether the current access token is valid.
    pub async fn validate_token(&self) -> Result<serde_json::Value, SessionError> {
        let response = self
            .send(HttpRequest::get(self.config.endpoints.validate_token()))
            .await?;
        if !response.is_success() {
            return Err(SessionError::Status(response));
        }
        Ok(response.json()?)
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<UserProfile, SessionError> {
        let response = self
            .send(HttpRequest::get(self.config.endpoints.user(user_id)))
            .await?;
        if !response.is_success() {
            return Err(SessionError::Status(response));
        }
        Ok(response.json()?)
    }
}

#[async_trait::async_trait]
impl SessionApi for SessionClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SessionError> {
        let span = info_span!(
            "session_send",
            request_id = %uuid::Uuid::new_v4(),
            method = %request.method,
            url = %request.url,
        );
        self.dispatch(request).instrument(span).await
    }

    async fn login(&self, input: LoginInput) -> Result<AuthResponse, SessionError> {
        let request = HttpRequest::post(self.config.endpoints.login()).json(json!(input));
        let response = self
            .issue(request)
            .instrument(info_span!("session_login"))
            .await?;
        info!(user_id = ?response.user_id, "logged in");
        Ok(response)
    }

    async fn signup(&self, input: SignupInput) -> Result<AuthResponse, SessionError> {
        let request = HttpRequest::post(self.config.endpoints.signup()).json(json!(input));
        let response = self
            .issue(request)
            .instrument(info_span!("session_signup"))
            .await?;
        info!(user_id = ?response.user_id, "signed up");
        Ok(response)
    }

    async fn logout(&self) -> Result<(), SessionError> {
        let pair = self.read_state(|s| s.credentials.clone());
        if let Some(pair) = pair {
            let request = decorate(
                &HttpRequest::post(self.config.endpoints.logout())
                    .json(json!({ "refreshToken": pair.refresh_token.expose() })),
                Some(&pair.access_token),
            );
            match self.transport.execute(&request).await {
                Ok(response) if !response.is_success() => {
                    warn!(status = response.status, "remote logout rejected");
                }
                Err(e) => warn!(error = %e, "remote logout failed"),
                Ok(_) => {}
            }
        }
        self.teardown().await;
        info!("logged out");
        Ok(())
    }

    fn state(&self) -> SessionState {
        self.read_state(SessionState::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemoryCredentialStore;
    use futures_util::future::join_all;
    use std::time::Duration;

    fn client_for(backend: &Arc<FakeAuthBackend>, store: &Arc<MemoryCredentialStore>) -> SessionClient {
        SessionClient::new(
            backend.clone(),
            store.clone(),
            SessionConfig::new(backend.endpoints()),
        )
    }

    async fn logged_in(backend: &Arc<FakeAuthBackend>) -> (SessionClient, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let client = client_for(backend, &store);
        client
            .login(LoginInput {
                email: FakeAuthBackend::EMAIL.to_owned(),
                password: FakeAuthBackend::PASSWORD.to_owned(),
            })
            .await
            .unwrap();
        (client, store)
    }

    #[tokio::test]
    async fn login_populates_store_and_state() {
        let backend = Arc::new(FakeAuthBackend::new());
        let (client, store) = logged_in(&backend).await;

        let state = client.state();
        assert!(state.is_authenticated());
        assert_eq!(state.principal.unwrap().email, FakeAuthBackend::EMAIL);
        assert_eq!(
            store.raw(ACCESS_TOKEN_KEY).as_deref(),
            Some(state.credentials.unwrap().access_token.expose())
        );
        assert!(store.raw(PRINCIPAL_KEY).is_some());
    }

    #[tokio::test]
    async fn bad_login_is_rejected_without_refresh() {
        let backend = Arc::new(FakeAuthBackend::new());
        let store = Arc::new(MemoryCredentialStore::new());
        let client = client_for(&backend, &store);

        let result = client
            .login(LoginInput {
                email: FakeAuthBackend::EMAIL.to_owned(),
                password: "wrong".to_owned(),
            })
            .await;

        assert!(matches!(result, Err(SessionError::Unauthorized(_))));
        assert_eq!(backend.refresh_calls(), 0);
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_request_replayed() {
        let backend = Arc::new(FakeAuthBackend::new());
        let (client, store) = logged_in(&backend).await;
        let t1 = client.current_access_token().unwrap();
        backend.expire_access_tokens();

        let response = client.send(backend.protected("bookings")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(backend.refresh_calls(), 1);
        let t2 = client.current_access_token().unwrap();
        assert_ne!(t1, t2);
        assert_eq!(store.raw(ACCESS_TOKEN_KEY).as_deref(), Some(t2.expose()));
        let replayed = backend.protected_requests().pop().unwrap();
        assert_eq!(replayed.bearer_token(), Some(t2.expose()));
    }

    #[tokio::test]
    async fn concurrent_401s_trigger_exactly_one_refresh() {
        let backend = Arc::new(FakeAuthBackend::new().with_refresh_delay(Duration::from_millis(50)));
        let (client, _store) = logged_in(&backend).await;
        backend.expire_access_tokens();

        let requests = ["a", "b", "c"].map(|name| client.send(backend.protected(name)));
        let responses = join_all(requests).await;

        assert_eq!(backend.refresh_calls(), 1);
        let fresh = client.current_access_token().unwrap();
        for response in responses {
            assert_eq!(response.unwrap().status, 200);
        }
        let replays: Vec<_> = backend
            .protected_requests()
            .into_iter()
            .filter(|r| r.bearer_token() == Some(fresh.expose()))
            .map(|r| r.url)
            .collect();
        assert_eq!(replays.len(), 3);
        assert!(replays[0].ends_with("/a"));
        assert!(replays[1].ends_with("/b"));
        assert!(replays[2].ends_with("/c"));
    }

    #[tokio::test]
    async fn late_401_after_refresh_reuses_new_token() {
        let backend = Arc::new(FakeAuthBackend::new());
        let (client, _store) = logged_in(&backend).await;
        backend.expire_access_tokens();

        let (slow, fast) = tokio::join!(
            client.send(backend.protected("slow?delay_ms=50")),
            client.send(backend.protected("fast")),
        );

        assert_eq!(fast.unwrap().status, 200);
        assert_eq!(slow.unwrap().status, 200);
        assert_eq!(backend.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn missing_refresh_token_tears_down_without_refresh_call() {
        let backend = Arc::new(FakeAuthBackend::new());
        let store = Arc::new(MemoryCredentialStore::new());
        let client = client_for(&backend, &store);

        let result = client.send(backend.protected("bookings")).await;

        match result {
            Err(SessionError::SessionExpired(response)) => assert_eq!(response.status, 401),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.refresh_calls(), 0);
        assert!(store.is_empty());
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn refresh_failure_rejects_all_waiters_and_clears_session() {
        let backend = Arc::new(FakeAuthBackend::new().with_refresh_delay(Duration::from_millis(20)));
        let (client, store) = logged_in(&backend).await;
        backend.expire_access_tokens();
        backend.revoke_refresh_tokens();

        let results = join_all(["a", "b", "c"].map(|n| client.send(backend.protected(n)))).await;

        assert_eq!(backend.refresh_calls(), 1);
        for result in results {
            let error = result.unwrap_err();
            assert!(error.is_not_authenticated(), "{error:?}");
            assert!(matches!(
                error,
                SessionError::RefreshFailed(RefreshError::Rejected { status: 401, .. })
            ));
        }
        assert!(store.is_empty());
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn still_unauthorized_after_replay_is_terminal() {
        let backend = Arc::new(FakeAuthBackend::new());
        let (client, store) = logged_in(&backend).await;
        backend.deny_path("/forbidden");

        let result = client.send(backend.protected("forbidden")).await;

        assert!(matches!(result, Err(SessionError::SessionExpired(_))));
        assert_eq!(backend.refresh_calls(), 1);
        assert_eq!(backend.protected_requests().len(), 2);
        assert!(store.is_empty());
        assert!(client.principal().is_none());
    }

    #[tokio::test]
    async fn other_error_statuses_pass_through() {
        let backend = Arc::new(FakeAuthBackend::new());
        let (client, _store) = logged_in(&backend).await;

        let response = client.send(backend.protected("missing?status=404")).await.unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(backend.refresh_calls(), 0);
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_even_when_remote_fails() {
        let backend = Arc::new(FakeAuthBackend::new());
        let (client, store) = logged_in(&backend).await;
        backend.fail_logout();

        client.logout().await.unwrap();

        assert!(store.is_empty());
        assert_eq!(client.state(), SessionState::empty());
    }

    #[tokio::test]
    async fn restore_rehydrates_from_store() {
        let backend = Arc::new(FakeAuthBackend::new());
        let pair = backend.issue_pair();
        let store = Arc::new(MemoryCredentialStore::with_credentials(&pair));

        let client = SessionClient::restore(
            backend.clone(),
            store.clone(),
            SessionConfig::new(backend.endpoints()),
        )
        .await
        .unwrap();

        assert!(client.is_authenticated());
        let response = client.send(backend.protected("bookings")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(
            backend.protected_requests()[0].bearer_token(),
            Some(pair.access_token.expose())
        );
    }

    #[tokio::test]
    async fn signup_populates_store_and_state() {
        let backend = Arc::new(FakeAuthBackend::new());
        let store = Arc::new(MemoryCredentialStore::new());
        let client = client_for(&backend, &store);

        let response = client
            .signup(SignupInput {
                email: "newcomer@example.com".to_owned(),
                password: "balcony".to_owned(),
                name: "Newcomer".to_owned(),
            })
            .await
            .unwrap();

        assert_eq!(client.principal().unwrap().email, "newcomer@example.com");
        assert_eq!(
            store.raw(ACCESS_TOKEN_KEY).as_deref(),
            Some(response.token.as_str())
        );
        assert!(store.raw(REFRESH_TOKEN_KEY).is_some());
        assert!(store.raw(PRINCIPAL_KEY).unwrap().contains("newcomer@example.com"));
    }

    #[tokio::test]
    async fn logout_during_refresh_stays_logged_out() {
        let backend = Arc::new(FakeAuthBackend::new().with_refresh_delay(Duration::from_millis(200)));
        let (client, store) = logged_in(&backend).await;
        backend.expire_access_tokens();

        let (result, _) = tokio::join!(client.send(backend.protected("bookings")), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            client.logout().await.unwrap();
        });

        assert!(matches!(
            result,
            Err(SessionError::RefreshFailed(RefreshError::Abandoned))
        ));
        assert_eq!(backend.refresh_calls(), 1);
        assert!(store.is_empty());
        assert_eq!(client.state(), SessionState::empty());
    }

    #[tokio::test]
    async fn login_during_refresh_keeps_the_new_login() {
        let backend = Arc::new(FakeAuthBackend::new().with_refresh_delay(Duration::from_millis(200)));
        let (client, store) = logged_in(&backend).await;
        backend.expire_access_tokens();

        let (result, relogin) = tokio::join!(client.send(backend.protected("bookings")), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            client
                .login(LoginInput {
                    email: FakeAuthBackend::EMAIL.to_owned(),
                    password: FakeAuthBackend::PASSWORD.to_owned(),
                })
                .await
                .unwrap()
        });

        assert!(matches!(
            result,
            Err(SessionError::RefreshFailed(RefreshError::Abandoned))
        ));
        assert_eq!(
            client.current_access_token().unwrap().expose(),
            relogin.token
        );
        assert_eq!(store.raw(ACCESS_TOKEN_KEY), Some(relogin.token));
    }

    #[tokio::test]
    async fn refresh_transport_failure_rejects_all_waiters_and_clears_session() {
        let backend = Arc::new(FakeAuthBackend::new().with_refresh_delay(Duration::from_millis(20)));
        let (client, store) = logged_in(&backend).await;
        backend.expire_access_tokens();
        backend.drop_refresh_connections();

        let results = join_all(["a", "b", "c"].map(|n| client.send(backend.protected(n)))).await;

        assert_eq!(backend.refresh_calls(), 1);
        for result in results {
            assert!(matches!(
                result,
                Err(SessionError::RefreshFailed(RefreshError::Transport(_)))
            ));
        }
        assert!(store.is_empty());
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn logout_all_tears_down_after_success() {
        let backend = Arc::new(FakeAuthBackend::new());
        let (client, store) = logged_in(&backend).await;

        client
            .logout_all(UserId(FakeAuthBackend::USER_ID))
            .await
            .unwrap();

        assert!(store.is_empty());
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn logout_all_rejection_keeps_session() {
        let backend = Arc::new(FakeAuthBackend::new());
        let (client, store) = logged_in(&backend).await;

        let error = client.logout_all(UserId(7)).await.unwrap_err();

        assert!(matches!(error, SessionError::Status(ref r) if r.status == 403));
        assert!(client.is_authenticated());
        assert!(!store.is_empty());
    }

    #[tokio::test]
    async fn validate_token_refreshes_an_expired_token() {
        let backend = Arc::new(FakeAuthBackend::new());
        let (client, _store) = logged_in(&backend).await;
        backend.expire_access_tokens();

        let body = client.validate_token().await.unwrap();

        assert_eq!(body["valid"], true);
        assert_eq!(backend.refresh_calls(), 1);
        let validations: Vec<_> = backend
            .requests()
            .into_iter()
            .filter(|r| r.url.ends_with("/validate-token"))
            .collect();
        assert_eq!(validations.len(), 2);
        assert_eq!(
            validations[1].bearer_token(),
            client.current_access_token().as_ref().map(AccessToken::expose)
        );
    }

    #[tokio::test]
    async fn get_user_decodes_profile() {
        let backend = Arc::new(FakeAuthBackend::new());
        let (client, _store) = logged_in(&backend).await;

        let profile = client
            .get_user(UserId(FakeAuthBackend::USER_ID))
            .await
            .unwrap();

        assert_eq!(profile.email, FakeAuthBackend::EMAIL);
        assert_eq!(profile.is_active, Some(true));
        let error = client.get_user(UserId(7)).await.unwrap_err();
        assert_eq!(error.status(), Some(404));
    }

    #[tokio::test]
    async fn restore_with_partial_store_is_logged_out() {
        let backend = Arc::new(FakeAuthBackend::new());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"accessToken":"access-1"}"#).unwrap();

        let client = SessionClient::restore(
            backend.clone(),
            Arc::new(crate::infra_file::FileCredentialStore::new(&path)),
            SessionConfig::new(backend.endpoints()),
        )
        .await
        .unwrap();

        assert!(!client.is_authenticated());
        assert_eq!(client.state(), SessionState::empty());
    }
}
