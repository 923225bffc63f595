use crate::domain_model::*;

/// Returns a copy of `request` carrying `token` as a bearer credential, or
/// the request unchanged when there is no token.
pub fn decorate(request: &HttpRequest, token: Option<&AccessToken>) -> HttpRequest {
    let mut outbound = request.clone();
    if let Some(token) = token {
        outbound.set_header(AUTHORIZATION, token.bearer());
    }
    outbound
}
