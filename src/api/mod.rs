//! Typed clients for the remote services, layered over [`SessionApi`].

mod account;
mod booking;
mod inventory;
mod waiting_room;

pub use account::*;
pub use booking::*;
pub use inventory::*;
pub use waiting_room::*;

use crate::application_port::*;
use crate::domain_model::*;
use serde::de::DeserializeOwned;

/// Sends through the session and decodes a 2xx body; other statuses become
/// `SessionError::Status`.
async fn fetch_json<T: DeserializeOwned>(
    session: &dyn SessionApi,
    request: HttpRequest,
) -> Result<T, SessionError> {
    let response = session.send(request).await?;
    if !response.is_success() {
        return Err(SessionError::Status(response));
    }
    Ok(response.json()?)
}

async fn expect_success(session: &dyn SessionApi, request: HttpRequest) -> Result<(), SessionError> {
    let response = session.send(request).await?;
    if !response.is_success() {
        return Err(SessionError::Status(response));
    }
    Ok(())
}
