use crate::application_port::RefreshError;
use crate::domain_model::AccessToken;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info};

type Outcome = Result<AccessToken, RefreshError>;

#[derive(Default)]
struct Flight {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

/// Collapses concurrent refresh needs into a single refresh call.
///
/// The first caller runs the refresh; callers arriving while it is in flight
/// are queued and all receive its outcome, in the order they arrived. The
/// lock is never held across an await point.
#[derive(Default)]
pub struct RefreshCoordinator {
    flight: Mutex<Flight>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Flight> {
        self.flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    /// Number of callers currently waiting on the in-flight refresh.
    pub fn queued(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Runs `refresh` unless one is already running, in which case waits for
    /// that one's outcome instead. `refresh` is only invoked by the owner.
    pub async fn run<F, Fut>(&self, refresh: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let waiter = {
            let mut flight = self.lock();
            if flight.in_flight {
                let (tx, rx) = oneshot::channel();
                flight.waiters.push(tx);
                debug!(position = flight.waiters.len(), "refresh in flight, queued");
                Some(rx)
            } else {
                flight.in_flight = true;
                None
            }
        };

        if let Some(rx) = waiter {
            return rx.await.unwrap_or(Err(RefreshError::Abandoned));
        }

        info!("starting token refresh");
        let mut guard = FlightGuard {
            coordinator: self,
            settled: false,
        };
        let outcome = refresh().await;
        guard.settle(&outcome);
        outcome
    }

    fn settle(&self, outcome: &Outcome) {
        let waiters = {
            let mut flight = self.lock();
            flight.in_flight = false;
            std::mem::take(&mut flight.waiters)
        };
        info!(
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "token refresh settled"
        );
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Releases the flight if the owning future is dropped mid-refresh, so
/// queued callers are rejected rather than left pending.
struct FlightGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl FlightGuard<'_> {
    fn settle(&mut self, outcome: &Outcome) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.settle(&Err(RefreshError::Abandoned));
        }
    }
}
