use crate::application_port::SessionConfig;
use crate::domain_model::*;

/// What to do with a completed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Hand the response to the caller untouched.
    PassThrough,
    /// 401 from a credential-issuing endpoint; surface it, keep the session.
    Reject,
    /// Unrecoverable 401; clear the session and surface it.
    Teardown,
    /// Refresh the access token and replay the request once.
    Refresh,
}

/// Classifies a response. Depends only on its inputs.
pub fn classify(
    config: &SessionConfig,
    request: &HttpRequest,
    response: &HttpResponse,
    attempt: Attempt,
    has_refresh_token: bool,
) -> Disposition {
    if !response.is_unauthorized() {
        return Disposition::PassThrough;
    }
    if config.is_credential_endpoint(&request.url) {
        return Disposition::Reject;
    }
    if !has_refresh_token || !attempt.may_retry() {
        return Disposition::Teardown;
    }
    Disposition::Refresh
}
