//! Fires a burst of requests at an expired session and shows that a single
//! refresh serves all of them.
//!
//! $ cargo run --bin herd_demo -- 25

use boxoffice::application_impl::*;
use boxoffice::application_port::*;
use boxoffice::infra_memory::*;
use boxoffice::logger::*;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _logger = Logger::new_bootstrap();
    let burst: usize = std::env::args()
        .nth(1)
        .map(|n| n.parse())
        .transpose()?
        .unwrap_or(10);

    let backend =
        Arc::new(FakeAuthBackend::new().with_refresh_delay(Duration::from_millis(200)));
    let session = Arc::new(SessionClient::new(
        backend.clone(),
        Arc::new(MemoryCredentialStore::new()),
        SessionConfig::new(backend.endpoints()),
    ));
    session
        .login(LoginInput {
            email: FakeAuthBackend::EMAIL.to_owned(),
            password: FakeAuthBackend::PASSWORD.to_owned(),
        })
        .await?;

    backend.expire_access_tokens();
    info!(burst, "access token expired, sending burst");

    let started = Instant::now();
    let handles = (0..burst).map(|i| {
        let session = session.clone();
        let request = backend.protected(&format!("seat-map/{i}"));
        tokio::spawn(async move { session.send(request).await })
    });
    let results = join_all(handles).await;

    let ok = results
        .iter()
        .filter(|r| matches!(r, Ok(Ok(response)) if response.is_success()))
        .count();
    info!(
        ok,
        burst,
        refresh_calls = backend.refresh_calls(),
        elapsed = ?started.elapsed(),
        "burst finished"
    );
    Ok(())
}
